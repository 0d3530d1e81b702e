//! Logging setup for the Crosspost server
//!
//! Output format and level come from CLI flags or from the
//! `CROSSPOST_LOG_FORMAT` / `CROSSPOST_LOG_LEVEL` environment variables.
//! `RUST_LOG`, when set, always wins over the configured level.
//!
//! ```no_run
//! use libcrosspost::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false)
//!     .init()
//!     .expect("logging already initialized");
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Noisy dependencies are held at `warn` unless explicitly overridden.
const QUIET_TARGETS: &str = "sqlx=warn,hyper=warn,reqwest=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain text lines
    #[default]
    Text,
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line colored output for local development
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

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Build from `CROSSPOST_LOG_FORMAT` and `CROSSPOST_LOG_LEVEL`
    ///
    /// Unparseable formats fall back to text.
    pub fn from_env() -> Self {
        let format = std::env::var("CROSSPOST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = std::env::var("CROSSPOST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, false)
    }

    /// Filter directives used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        let level = if self.verbose { "debug" } else { self.level.as_str() };
        format!("{},{}", level, QUIET_TARGETS)
    }

    /// Install the global subscriber
    ///
    /// Fails if a subscriber has already been installed.
    pub fn init(&self) -> Result<(), String> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()));

        let result = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        result.map_err(|e| format!("Failed to initialize logging: {}", e))
    }
}
