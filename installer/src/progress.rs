//! Download progress lines on stderr.

use std::io::Write;
use wirefetch::http::ProgressObserver;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Reporting interval for downloads without a known size.
const UNSIZED_STEP: u64 = 1024 * 1024;

/// Render `bytes` in binary units with two decimals.
///
/// # Examples
///
/// ```
/// use wirefetch_installer::progress::format_size;
///
/// assert_eq!(format_size(0), "0.00 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    reason = "display rounding to two decimals"
)]
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS.iter().skip(1) {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = *next;
    }
    format!("{value:.2} {unit}")
}

/// [`ProgressObserver`] printing one line per tenth of the download.
pub struct StderrProgress<'w> {
    stderr: &'w mut dyn Write,
    last_step: Option<u64>,
}

impl<'w> StderrProgress<'w> {
    /// Report to `stderr`.
    pub fn new(stderr: &'w mut dyn Write) -> Self {
        Self {
            stderr,
            last_step: None,
        }
    }

    fn write_line(&mut self, line: &str) {
        if writeln!(self.stderr, "{line}").is_err() {
            // Progress is cosmetic; ignore write failures.
        }
    }
}

impl ProgressObserver for StderrProgress<'_> {
    fn on_progress(&mut self, total: Option<u64>, downloaded: u64) {
        let step = match total {
            Some(0) => return,
            Some(size) => downloaded.saturating_mul(10) / size,
            None => downloaded / UNSIZED_STEP,
        };
        if self.last_step == Some(step) {
            return;
        }
        self.last_step = Some(step);
        let line = match total {
            Some(size) => format!(
                "  {} / {} ({}%)",
                format_size(downloaded),
                format_size(size),
                step.min(10) * 10
            ),
            None => format!("  {}", format_size(downloaded)),
        };
        self.write_line(&line);
    }
}
