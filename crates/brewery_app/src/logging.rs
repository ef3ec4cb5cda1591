//! Tracing setup and the `logger` registration.
//!
//! [`init_logging`] installs a global `tracing` subscriber from a
//! [`LoggingConfig`]. Installation is idempotent: when a subscriber is
//! already set (by the host application or an earlier boot) the call is a
//! no-op.
//!
//! Boot creates a [`Logger`] before discovery starts, so every boot phase is
//! traced, and registers that handle as a value under the `logger` key.
//!
//! # Example
//!
//! ```
//! use brewery_app::{LogFormat, LoggingConfig, init_logging};
//!
//! let config = LoggingConfig {
//!     level: "debug".into(),
//!     format: LogFormat::Compact,
//!     ..LoggingConfig::default()
//! };
//! init_logging(&config);
//! tracing::debug!("logging ready");
//! ```

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// LogFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// LoggingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// The `logging` section of the boot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Maximum level: `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Target-specific directives such as `brewery=debug,hyper=warn`.
    /// Overrides `level` when set and valid.
    #[serde(alias = "envfilter", skip_serializing_if = "Option::is_none")]
    pub env_filter: Option<String>,
    /// Emit span enter/exit events.
    #[serde(alias = "spanevents")]
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl LoggingConfig {
    /// The configured level, or `None` if it does not parse.
    #[must_use]
    pub fn parsed_level(&self) -> Option<Level> {
        self.level.trim().parse().ok()
    }

    fn filter(&self, level: Level) -> EnvFilter {
        match &self.env_filter {
            Some(directives) => {
                EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
            }
            None => EnvFilter::new(level.as_str()),
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// Returns `true` if this call installed it, `false` if a subscriber was
/// already set. An unparsable level falls back to `info` with a warning.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let level = config.parsed_level();
    let effective = level.unwrap_or(Level::INFO);
    let filter = config.filter(effective);

    let span_events = if config.span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(span_events),
            )
            .try_init()
            .is_ok(),
    };

    if level.is_none() {
        tracing::warn!(level = %config.level, "unknown log level, using info");
    }
    if installed {
        tracing::info!(level = %effective, format = ?config.format, "logging initialized");
    } else {
        tracing::debug!("a tracing subscriber is already installed");
    }
    installed
}

// ─────────────────────────────────────────────────────────────────────────────
// Logger
// ─────────────────────────────────────────────────────────────────────────────

/// The value registered under the `logger` key.
#[derive(Debug, Clone)]
pub struct Logger {
    config: LoggingConfig,
    installed: bool,
}

impl Logger {
    /// Installs logging for `config` and returns the handle.
    #[must_use]
    pub fn init(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
            installed: init_logging(config),
        }
    }

    /// The configuration logging was initialized from.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Whether this logger installed the global subscriber.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        let config = LoggingConfig {
            level: "DEBUG".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.parsed_level(), Some(Level::DEBUG));

        let config = LoggingConfig {
            level: "chatty".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(config.parsed_level(), None);
    }

    #[test]
    fn second_initialization_is_a_no_op() {
        let config = LoggingConfig {
            format: LogFormat::Compact,
            ..LoggingConfig::default()
        };
        init_logging(&config);
        assert!(!init_logging(&config));
        assert!(!Logger::init(&config).is_installed());
    }

    #[test]
    fn deserializes_camel_case_keys() {
        let config: LoggingConfig = serde_json::from_value(serde_json::json!({
            "level": "warn",
            "format": "json",
            "envFilter": "brewery=trace",
            "spanEvents": true,
        }))
        .unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.env_filter.as_deref(), Some("brewery=trace"));
        assert!(config.span_events);
    }
}
