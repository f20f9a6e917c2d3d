//! Version triples, release versions, and declared version requirements.
//!
//! ProcessWire describes releases with three labelled integer constants and
//! modules with either dotted strings (`"1.2.3"`) or packed integers (`123`).
//! Both forms normalise to a [`VersionTriple`]. A version that cannot be
//! determined is represented explicitly by [`ReleaseVersion::Unknown`] and is
//! never compared as `0.0.0`.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A `major.minor.revision` version, ordered field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionTriple {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Revision component.
    pub revision: u32,
}

impl VersionTriple {
    /// Create a version from its three components.
    #[must_use]
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Decode a packed module version such as `123` (`1.2.3`) or `1203`
    /// (`12.0.3`): the last digit is the revision, the one before it the
    /// minor, and everything else the major.
    ///
    /// # Examples
    ///
    /// ```
    /// use wirefetch::version::VersionTriple;
    ///
    /// assert_eq!(VersionTriple::from_module_integer(123), VersionTriple::new(1, 2, 3));
    /// assert_eq!(VersionTriple::from_module_integer(5), VersionTriple::new(0, 0, 5));
    /// ```
    #[must_use]
    pub fn from_module_integer(value: u64) -> Self {
        let revision = value % 10;
        let minor = (value / 10) % 10;
        let major = value / 100;
        Self {
            major: u32::try_from(major).unwrap_or(u32::MAX),
            minor: u32::try_from(minor).unwrap_or(u32::MAX),
            revision: u32::try_from(revision).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// A version string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version string `{input}`")]
pub struct VersionParseError {
    input: String,
}

impl VersionParseError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_owned(),
        }
    }
}

impl FromStr for VersionTriple {
    type Err = VersionParseError;

    /// Parse `1.2.3`, `v1.2`, or `3`; missing components default to zero
    /// and pre-release or build suffixes (`-beta`, `+build`) are ignored.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let unprefixed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let core = unprefixed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return Err(VersionParseError::new(input));
        }

        let mut parts = [0_u32; 3];
        let mut count = 0;
        for (slot, piece) in parts.iter_mut().zip(core.split('.')) {
            *slot = piece
                .parse::<u32>()
                .map_err(|_| VersionParseError::new(input))?;
            count += 1;
        }
        if count == 0 || core.split('.').count() > 3 {
            return Err(VersionParseError::new(input));
        }

        let [major, minor, revision] = parts;
        Ok(Self::new(major, minor, revision))
    }
}

impl Serialize for VersionTriple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The version of a release or module, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseVersion {
    /// The version was determined.
    Known(VersionTriple),
    /// The source did not expose a recognisable version.
    #[default]
    Unknown,
}

impl ReleaseVersion {
    /// Return the triple when the version is known.
    #[must_use]
    pub const fn known(self) -> Option<VersionTriple> {
        match self {
            Self::Known(triple) => Some(triple),
            Self::Unknown => None,
        }
    }

    /// Return `true` when the version is known.
    #[must_use]
    pub const fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Compare two versions. Returns `None` when either side is unknown,
    /// because an unknown version cannot be ordered.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cmp::Ordering;
    /// use wirefetch::version::{ReleaseVersion, VersionTriple};
    ///
    /// let old = ReleaseVersion::Known(VersionTriple::new(1, 2, 3));
    /// let new = ReleaseVersion::Known(VersionTriple::new(1, 3, 0));
    /// assert_eq!(new.compare(&old), Some(Ordering::Greater));
    /// assert_eq!(new.compare(&ReleaseVersion::Unknown), None);
    /// ```
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Known(left), Self::Known(right)) => Some(left.cmp(right)),
            _ => None,
        }
    }
}

impl From<VersionTriple> for ReleaseVersion {
    fn from(triple: VersionTriple) -> Self {
        Self::Known(triple)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(triple) => triple.fmt(f),
            Self::Unknown => f.write_str("?"),
        }
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(triple) => triple.serialize(serializer),
            Self::Unknown => serializer.serialize_none(),
        }
    }
}

/// Parse a module version as ProcessWire writes it.
///
/// Digit-only values are packed integers (`"101"` is `1.0.1`); anything else
/// is read as a dotted version. Unparseable input is [`ReleaseVersion::Unknown`].
#[must_use]
pub fn parse_module_version(raw: &str) -> ReleaseVersion {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse::<u64>()
            .map(|packed| ReleaseVersion::Known(VersionTriple::from_module_integer(packed)))
            .unwrap_or_default();
    }
    trimmed
        .parse::<VersionTriple>()
        .map(ReleaseVersion::Known)
        .unwrap_or_default()
}

/// A module version as it appears in JSON: a packed integer or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum JsonVersion {
    Number(u64),
    Text(String),
}

impl JsonVersion {
    pub(crate) fn to_release_version(&self) -> ReleaseVersion {
        match self {
            Self::Number(packed) => {
                ReleaseVersion::Known(VersionTriple::from_module_integer(*packed))
            }
            Self::Text(text) => parse_module_version(text),
        }
    }
}

/// A comparison operator in a version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterOrEqual,
    /// `>`
    Greater,
}

impl Comparator {
    /// Operators in match order; two-character forms come first.
    const SYMBOLS: [(&'static str, Self); 9] = [
        (">=", Self::GreaterOrEqual),
        ("<=", Self::LessOrEqual),
        ("!=", Self::NotEqual),
        ("<>", Self::NotEqual),
        ("==", Self::Equal),
        ("=", Self::Equal),
        (">", Self::Greater),
        ("<", Self::Less),
        ("!", Self::NotEqual),
    ];

    /// Canonical symbol for display.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
        }
    }

    /// Parse an operator symbol.
    #[must_use]
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        Self::SYMBOLS
            .iter()
            .find(|(text, _)| *text == symbol)
            .map(|(_, comparator)| *comparator)
    }

    /// Split a leading operator from `expression`, returning the operator and
    /// the remainder.
    fn split_prefix(expression: &str) -> Option<(Self, &str)> {
        Self::SYMBOLS.iter().find_map(|(text, comparator)| {
            expression
                .strip_prefix(text)
                .map(|rest| (*comparator, rest))
        })
    }

    /// Whether `installed.cmp(required)` satisfies this operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Less => matches!(ordering, Ordering::Less),
            Self::LessOrEqual => !matches!(ordering, Ordering::Greater),
            Self::Equal => matches!(ordering, Ordering::Equal),
            Self::NotEqual => !matches!(ordering, Ordering::Equal),
            Self::GreaterOrEqual => !matches!(ordering, Ordering::Less),
            Self::Greater => matches!(ordering, Ordering::Greater),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A declared dependency on another component's version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionRequirement {
    /// How the installed version is compared.
    pub comparator: Comparator,
    /// The version the installed one is compared against.
    pub version: VersionTriple,
}

impl VersionRequirement {
    /// Create a requirement.
    #[must_use]
    pub const fn new(comparator: Comparator, version: VersionTriple) -> Self {
        Self {
            comparator,
            version,
        }
    }

    /// Build a requirement from an `[operator, version]` pair.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when the operator or version is invalid.
    pub fn from_pair(operator: &str, version: &str) -> Result<Self, VersionParseError> {
        let comparator =
            Comparator::parse(operator).ok_or_else(|| VersionParseError::new(operator))?;
        let version = module_triple(version).ok_or_else(|| VersionParseError::new(version))?;
        Ok(Self::new(comparator, version))
    }

    /// Parse `">=3.0.0"`, `"> 1.2"`, or a bare `"1.0.0"` (read as `>=`).
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when no version follows the operator.
    pub fn parse(expression: &str) -> Result<Self, VersionParseError> {
        let trimmed = expression.trim();
        let (comparator, rest) =
            Comparator::split_prefix(trimmed).unwrap_or((Comparator::GreaterOrEqual, trimmed));
        let version = module_triple(rest).ok_or_else(|| VersionParseError::new(expression))?;
        Ok(Self::new(comparator, version))
    }

    /// Whether `installed` meets this requirement.
    #[must_use]
    pub fn is_satisfied_by(&self, installed: &VersionTriple) -> bool {
        self.comparator.accepts(installed.cmp(&self.version))
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparator, self.version)
    }
}

impl Serialize for VersionRequirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.comparator.symbol(), self.version.to_string()).serialize(serializer)
    }
}

fn module_triple(raw: &str) -> Option<VersionTriple> {
    parse_module_version(raw).known()
}

/// Split a dependency declaration such as `"ProcessWire>=3.0.0"` into the
/// component name and its requirement. Declarations without a version
/// constraint yield `None`.
#[must_use]
pub fn parse_requirement_entry(entry: &str) -> Option<(String, VersionRequirement)> {
    let entry = entry.trim();
    let split_at = entry.find(['<', '>', '=', '!'])?;
    let (name, constraint) = entry.split_at(split_at);
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let requirement = VersionRequirement::parse(constraint).ok()?;
    Some((name.to_owned(), requirement))
}

/// Map an ordering to `-1`, `0`, or `1`.
#[must_use]
pub const fn ordering_sign(ordering: Ordering) -> i8 {
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}
