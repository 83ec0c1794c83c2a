//! Tracing infrastructure.
//!
//! Structured logging via the `tracing` and `tracing-subscriber` crates:
//! environment-based filtering, multiple output formats, and a log level taken
//! from the configuration. The per-row console echo of decoded packets is
//! emitted at TRACE level under the `voltacq::echo` target, so it can be
//! enabled independently (`RUST_LOG=voltacq::echo=trace`) or silenced without
//! affecting acquisition.

use crate::config::Settings;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Output format for tracing.
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact format without colors (for production)
    Compact,
    /// JSON format for structured logging (for log aggregation)
    Json,
}

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to enable ANSI colors (only for Pretty format)
    pub with_ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a telemetry config from the application settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, String> {
        let level = parse_log_level(&settings.application.log_level)?;
        Ok(Self {
            level,
            ..Default::default()
        })
    }

    /// Set output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Initialize tracing from the application settings.
///
/// This is the recommended way to initialize logging for the binary. The
/// `RUST_LOG` environment variable, when set, overrides the configured level.
pub fn init_from_settings(settings: &Settings) -> Result<(), String> {
    init(TelemetryConfig::from_settings(settings)?)
}

/// Initialize the global tracing subscriber.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(config: TelemetryConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let fmt_layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.with_ansi)
            .with_span_events(FmtSpan::NONE)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(config.with_ansi)
            .boxed(),
        OutputFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("failed to initialize tracing: {e}"))
}

fn parse_log_level(level: &str) -> Result<Level, String> {
    match level {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(format!(
            "Invalid log level '{other}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_levels() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("error").unwrap(), Level::ERROR);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn config_from_settings_uses_configured_level() {
        let mut settings = Settings::default();
        settings.application.log_level = "debug".to_string();
        let config = TelemetryConfig::from_settings(&settings).unwrap();
        assert_eq!(config.level, Level::DEBUG);
    }
}
