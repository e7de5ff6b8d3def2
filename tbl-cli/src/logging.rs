//! Tracing subscriber setup with format selection.

use anyhow::{Context, Result};
use std::env;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON format for structured logging.
    Json,
    /// Human-readable pretty format with colors.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::default(),
        })
    }
}

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// Log level filter (e.g., "warn", "info,tbl_core=trace").
    log_filter: String,
    include_location: bool,
    include_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "warn".to_string(),
            include_location: false,
            include_target: true,
        }
    }
}

impl TracingConfig {
    /// Create a new builder.
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TBL_LOG_FORMAT`: "json", "pretty", or "compact"
    /// - `TBL_LOG_LEVEL` or `RUST_LOG`: Log filter string
    /// - `TBL_LOG_LOCATION`: "true" to include source locations
    ///
    /// `default_filter` applies when neither filter variable is set.
    pub fn from_env(default_filter: &str) -> Self {
        let log_format = env::var("TBL_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_else(|| {
                if std::io::stderr().is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Compact
                }
            });

        let log_filter = env::var("TBL_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| default_filter.to_string());

        let include_location = env::var("TBL_LOG_LOCATION")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        Self::builder()
            .log_format(log_format)
            .log_filter(log_filter)
            .include_location(include_location)
            .build()
    }

    /// Get the log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Get the log filter.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Check if source location should be included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Check if target should be included.
    pub fn include_target(&self) -> bool {
        self.include_target
    }
}

/// Builder for TracingConfig.
#[derive(Debug, Clone, Default)]
pub struct TracingConfigBuilder {
    log_format: Option<LogFormat>,
    log_filter: Option<String>,
    include_location: Option<bool>,
}

impl TracingConfigBuilder {
    /// Set the log format.
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    /// Set the log filter.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Set whether to include source locations.
    pub fn include_location(mut self, include: bool) -> Self {
        self.include_location = Some(include);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TracingConfig {
        let defaults = TracingConfig::default();
        TracingConfig {
            log_format: self.log_format.unwrap_or(defaults.log_format),
            log_filter: self.log_filter.unwrap_or(defaults.log_filter),
            include_location: self.include_location.unwrap_or(defaults.include_location),
            include_target: defaults.include_target,
        }
    }
}

/// Initialize the global subscriber. Logs go to stderr so command output
/// on stdout stays clean.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_new(config.log_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target())
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target()),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target()),
            )
            .try_init(),
    }
    .context("Failed to initialize tracing subscriber")
}
