//! Remote module directory lookups.

use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::settings::ModuleServiceSettings;
use crate::version::{JsonVersion, ReleaseVersion, VersionRequirement, parse_requirement_entry};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum number of modules returned by one bulk lookup.
pub const BULK_LIMIT: usize = 100;

const BULK_FIELDS: &str = "module_version,version,requires_versions";
const SUCCESS: &str = "success";

/// A module as listed by a bulk lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModule {
    /// Module class name.
    pub class_name: String,
    /// Latest published version.
    pub version: ReleaseVersion,
    /// Requirements of the latest version.
    pub requires_versions: BTreeMap<String, VersionRequirement>,
}

/// A module as returned by the single-item endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModuleDetail {
    /// Latest published version.
    pub version: ReleaseVersion,
    /// Requirements of the latest version.
    pub requires_versions: BTreeMap<String, VersionRequirement>,
    /// Project page, typically a repository URL.
    pub project_url: Option<String>,
}

/// Remote source of published module versions.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleCatalog {
    /// Look up several modules at once. Unknown names are omitted from the
    /// answer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogUnavailable`] when the lookup fails.
    fn lookup_many(&self, names: &[String]) -> Result<Vec<RemoteModule>>;

    /// Look up one module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogUnavailable`] when the lookup fails or the
    /// service reports an error.
    fn lookup_one(&self, name: &str) -> Result<RemoteModuleDetail>;
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    items: Option<Vec<BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    class_name: String,
    module_version: Option<JsonVersion>,
    #[serde(default)]
    requires_versions: Value,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    status: Option<String>,
    error: Option<String>,
    module_version: Option<JsonVersion>,
    #[serde(default)]
    requires_versions: Value,
    project_url: Option<String>,
}

/// [`ModuleCatalog`] backed by the JSON export service.
pub struct HttpModuleCatalog<'a> {
    transport: &'a dyn HttpTransport,
    settings: &'a ModuleServiceSettings,
}

impl<'a> HttpModuleCatalog<'a> {
    /// Create a catalog client.
    #[must_use]
    pub fn new(transport: &'a dyn HttpTransport, settings: &'a ModuleServiceSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// URL of the bulk lookup for `names`.
    #[must_use]
    pub fn bulk_url(&self, names: &[String]) -> String {
        format!(
            "{}?apikey={}&limit={BULK_LIMIT}&field={BULK_FIELDS}&class_name={}",
            self.settings.url,
            self.settings.key,
            names.join(",")
        )
    }

    /// URL of the single-item lookup for `name`.
    #[must_use]
    pub fn detail_url(&self, name: &str) -> String {
        format!(
            "{}/{name}/?apikey={}",
            self.settings.url.trim_end_matches('/'),
            self.settings.key
        )
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        log::debug!("querying module catalog: {url}");
        let body = self
            .transport
            .get_text(url)
            .map_err(|err| unavailable(err.to_string()))?;
        serde_json::from_str(&body).map_err(|err| unavailable(format!("invalid response: {err}")))
    }
}

fn unavailable(reason: impl Into<String>) -> Error {
    Error::CatalogUnavailable {
        reason: reason.into(),
    }
}

fn version_of(raw: Option<&JsonVersion>) -> ReleaseVersion {
    raw.map_or(ReleaseVersion::Unknown, JsonVersion::to_release_version)
}

impl ModuleCatalog for HttpModuleCatalog<'_> {
    fn lookup_many(&self, names: &[String]) -> Result<Vec<RemoteModule>> {
        let response: BulkResponse = self.get_json(&self.bulk_url(names))?;
        let items = response
            .items
            .ok_or_else(|| unavailable("response has no items"))?;
        Ok(items
            .into_iter()
            .map(|item| RemoteModule {
                version: version_of(item.module_version.as_ref()),
                requires_versions: requirements_from_json(&item.requires_versions),
                class_name: item.class_name,
            })
            .collect())
    }

    fn lookup_one(&self, name: &str) -> Result<RemoteModuleDetail> {
        let response: DetailResponse = self.get_json(&self.detail_url(name))?;
        if response.status.as_deref() != Some(SUCCESS) {
            return Err(unavailable(
                response
                    .error
                    .unwrap_or_else(|| format!("no data for module {name}")),
            ));
        }
        Ok(RemoteModuleDetail {
            version: version_of(response.module_version.as_ref()),
            requires_versions: requirements_from_json(&response.requires_versions),
            project_url: response.project_url,
        })
    }
}

/// Decode a `requires_versions` value.
///
/// Objects map component names to `[operator, version]` pairs or to
/// `"operator version"` strings. Arrays hold `"Name>=1.0.0"` entries.
/// Anything unreadable is skipped.
#[must_use]
pub fn requirements_from_json(value: &Value) -> BTreeMap<String, VersionRequirement> {
    match value {
        Value::Object(entries) => entries
            .iter()
            .filter_map(|(name, spec)| {
                let requirement = match spec {
                    Value::Array(pair) => match pair.as_slice() {
                        [Value::String(operator), version] => {
                            VersionRequirement::from_pair(operator, &scalar_text(version)?).ok()
                        }
                        _ => None,
                    },
                    Value::String(expression) => VersionRequirement::parse(expression).ok(),
                    _ => None,
                };
                if requirement.is_none() {
                    log::debug!("skipping unreadable requirement on {name}: {spec}");
                }
                requirement.map(|requirement| (name.clone(), requirement))
            })
            .collect(),
        Value::Array(entries) => entries
            .iter()
            .filter_map(Value::as_str)
            .filter_map(parse_requirement_entry)
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubTransport;
    use crate::version::{Comparator, VersionTriple};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn settings() -> ModuleServiceSettings {
        ModuleServiceSettings {
            url: "https://modules.test/export-json/".to_owned(),
            key: "pw300".to_owned(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_owned()).collect()
    }

    #[rstest]
    fn builds_service_urls(settings: ModuleServiceSettings) {
        let transport = StubTransport::default();
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        assert_eq!(
            catalog.bulk_url(&names(&["Hello", "Blog"])),
            "https://modules.test/export-json/?apikey=pw300&limit=100&field=module_version,version,requires_versions&class_name=Hello,Blog"
        );
        assert_eq!(
            catalog.detail_url("Hello"),
            "https://modules.test/export-json/Hello/?apikey=pw300"
        );
    }

    #[rstest]
    fn bulk_lookup_decodes_items(settings: ModuleServiceSettings) {
        let url = "https://modules.test/export-json/?apikey=pw300&limit=100&field=module_version,version,requires_versions&class_name=Hello,Blog";
        let body = json!({
            "items": [
                {"class_name": "Hello", "module_version": "1.3.0", "requires_versions": {"ProcessWire": [">=", "3.0.0"]}},
                {"class_name": "Blog", "module_version": 241, "requires_versions": []}
            ]
        });
        let transport = StubTransport::default().with_text(url, body.to_string());
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        let modules = catalog
            .lookup_many(&names(&["Hello", "Blog"]))
            .expect("lookup succeeds");

        assert_eq!(modules.len(), 2);
        let hello = modules.first().expect("hello");
        assert_eq!(hello.version, ReleaseVersion::Known(VersionTriple::new(1, 3, 0)));
        assert_eq!(
            hello.requires_versions.get("ProcessWire"),
            Some(&VersionRequirement::new(
                Comparator::GreaterOrEqual,
                VersionTriple::new(3, 0, 0)
            ))
        );
        let blog = modules.get(1).expect("blog");
        assert_eq!(blog.version, ReleaseVersion::Known(VersionTriple::new(2, 4, 1)));
        assert!(blog.requires_versions.is_empty());
    }

    #[rstest]
    #[case::missing_items(r#"{"error": "bad key"}"#)]
    #[case::not_json("<html>maintenance</html>")]
    fn unusable_bulk_response_is_unavailable(
        settings: ModuleServiceSettings,
        #[case] body: &str,
    ) {
        let transport = StubTransport::default();
        let catalog = HttpModuleCatalog::new(&transport, &settings);
        let url = catalog.bulk_url(&names(&["Hello"]));
        let transport = transport.with_text(url, body);
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        let err = catalog
            .lookup_many(&names(&["Hello"]))
            .expect_err("unavailable");
        assert!(matches!(err, Error::CatalogUnavailable { .. }));
    }

    #[rstest]
    fn transport_failure_is_unavailable(settings: ModuleServiceSettings) {
        let transport = StubTransport::default();
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        let err = catalog.lookup_one("Hello").expect_err("404");
        assert!(matches!(err, Error::CatalogUnavailable { .. }));
    }

    #[rstest]
    fn detail_lookup_reads_project_url(settings: ModuleServiceSettings) {
        let body = json!({
            "status": "success",
            "module_version": "2.0.1",
            "requires_versions": {"ProcessWire": ">= 3.0.100"},
            "project_url": "https://github.test/ryan/Hello"
        });
        let transport = StubTransport::default().with_text(
            "https://modules.test/export-json/Hello/?apikey=pw300",
            body.to_string(),
        );
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        let detail = catalog.lookup_one("Hello").expect("lookup succeeds");

        assert_eq!(detail.version, ReleaseVersion::Known(VersionTriple::new(2, 0, 1)));
        assert_eq!(detail.project_url.as_deref(), Some("https://github.test/ryan/Hello"));
        assert_eq!(detail.requires_versions.len(), 1);
    }

    #[rstest]
    fn detail_error_status_is_unavailable(settings: ModuleServiceSettings) {
        let body = json!({"status": "error", "error": "Unknown module"});
        let transport = StubTransport::default().with_text(
            "https://modules.test/export-json/Nope/?apikey=pw300",
            body.to_string(),
        );
        let catalog = HttpModuleCatalog::new(&transport, &settings);

        let err = catalog.lookup_one("Nope").expect_err("error status");
        assert!(matches!(err, Error::CatalogUnavailable { ref reason } if reason == "Unknown module"));
    }

    #[rstest]
    #[case::pair_object(json!({"Foo": ["<", "2.0.0"]}), Comparator::Less)]
    #[case::string_object(json!({"Foo": "!= 2.0.0"}), Comparator::NotEqual)]
    #[case::entry_array(json!(["Foo=2.0.0"]), Comparator::Equal)]
    fn decodes_requirement_shapes(#[case] value: Value, #[case] comparator: Comparator) {
        let requirements = requirements_from_json(&value);
        assert_eq!(
            requirements.get("Foo"),
            Some(&VersionRequirement::new(comparator, VersionTriple::new(2, 0, 0)))
        );
    }

    #[test]
    fn unreadable_requirements_are_skipped() {
        let value = json!({"Foo": ["~", "2.0.0"], "Bar": 7});
        assert!(requirements_from_json(&value).is_empty());
        assert!(requirements_from_json(&Value::Null).is_empty());
    }
}
