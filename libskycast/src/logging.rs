//! Logging setup shared by the Skycast binaries
//!
//! All diagnostics go to stderr through `tracing`; stdout is reserved for
//! command output. The default filter is `info` so that retry warnings and
//! skipped-image notices are visible without any flags.
//!
//! # Examples
//!
//! ```no_run
//! // Respect SKYCAST_LOG_FORMAT / SKYCAST_LOG_LEVEL
//! libskycast::logging::init_from_env(false);
//! ```

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Initialize logging with an explicit format and level filter.
///
/// `RUST_LOG` still wins when set, so per-module filtering keeps working.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed.
pub fn init(format: LogFormat, level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .init();
        }
    }
}

/// Initialize logging from the environment.
///
/// Respects `SKYCAST_LOG_FORMAT` (text, json, pretty) and
/// `SKYCAST_LOG_LEVEL`; falls back to text format at info level. A true
/// `verbose` flag overrides the level to debug.
pub fn init_from_env(verbose: bool) {
    let format = std::env::var("SKYCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("SKYCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };

    init(format, &level);
}
