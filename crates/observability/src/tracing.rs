//! Tracing subscriber initialization.
//!
//! Mapper operations and backend calls emit spans from the `mongomap` crate;
//! `RUST_LOG=mongomap=debug` shows collection-handle resolution and cursor use.
//! `MONGOMAP_LOG_FORMAT` selects `json` (default) or `compact` output.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";
const FORMAT_VAR: &str = "MONGOMAP_LOG_FORMAT";

/// Output format of the process-wide subscriber.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Compact,
}

impl LogFormat {
    /// Parse a format name (case-insensitive); unknown names fall back to JSON.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Self::Compact,
            _ => Self::Json,
        }
    }

    fn from_env() -> Self {
        std::env::var(FORMAT_VAR)
            .map(|name| Self::from_name(&name))
            .unwrap_or_default()
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing with the format from `MONGOMAP_LOG_FORMAT`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env());
}

/// Initialize tracing with an explicit output format.
pub fn init_with(format: LogFormat) {
    let builder = tracing_subscriber::fmt().with_env_filter(filter());
    let _ = match format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

/// Initialize compact output routed through the libtest writer.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .compact()
        .with_test_writer()
        .try_init();
}
