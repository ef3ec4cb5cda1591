//! Boot configuration and its loader.

use crate::error::BootError;
use crate::logging::LoggingConfig;
use brewery_datasource::{ConnectionPolicy, DEFAULT_CONNECT_TIMEOUT};
use core::time::Duration;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "BREWERY";

// ─────────────────────────────────────────────────────────────────────────────
// BootConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Everything boot needs to know, registered under the `config` key.
///
/// ```toml
/// [app]
/// root = "."
///
/// [app.sources]
/// app = ["src/app"]
/// dataSource = ["src/infra/datasources"]
/// model = ["src/infra/models"]
/// repository = ["src/infra/repositories"]
/// middleware = ["src/interfaces/middlewares"]
/// controller = ["src/interfaces/controllers"]
/// router = "src/interfaces/router.toml"
///
/// [app.connection]
/// policy = "required"
/// timeoutMs = 5000
///
/// [logging]
/// level = "info"
/// format = "compact"
///
/// [settings]
/// greeting = "hello"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootConfig {
    /// Application layout and boot behavior.
    pub app: AppConfig,
    /// Logging setup.
    pub logging: LoggingConfig,
    /// Free-form application settings.
    pub settings: BTreeMap<String, Value>,
}

impl BootConfig {
    /// Directory relative source locations are resolved against.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.app.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns a free-form setting.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}

/// The `app` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Base directory for relative locations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Where each component kind lives.
    pub sources: Sources,
    /// What boot does with datasource connections.
    pub connection: ConnectionConfig,
}

/// Source locations per component kind.
///
/// Every list may name several locations; for keyed kinds a later location
/// overrides an earlier one with the same unit name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sources {
    /// Use-case locations.
    pub app: Vec<String>,
    /// Datasource spec locations.
    #[serde(alias = "datasource")]
    pub data_source: Vec<String>,
    /// Model definition locations.
    pub model: Vec<String>,
    /// Repository locations.
    pub repository: Vec<String>,
    /// Middleware locations.
    pub middleware: Vec<String>,
    /// Controller locations.
    pub controller: Vec<String>,
    /// Router manifest location. Without one the server gets an empty router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,
}

/// How boot treats datasource `connect()` results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Wait for every connection; failures abort boot.
    #[default]
    Required,
    /// Log outcomes in the background.
    Advisory,
}

/// The `app.connection` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionConfig {
    /// Required or advisory.
    pub policy: ConnectionMode,
    /// Deadline for required connections, in milliseconds.
    #[serde(alias = "timeoutms")]
    pub timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            policy: ConnectionMode::Required,
            timeout_ms: u64::try_from(DEFAULT_CONNECT_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl ConnectionConfig {
    /// The policy handed to the binder's pending connections.
    #[must_use]
    pub fn policy(&self) -> ConnectionPolicy {
        match self.policy {
            ConnectionMode::Required => ConnectionPolicy::Required {
                timeout: Duration::from_millis(self.timeout_ms),
            },
            ConnectionMode::Advisory => ConnectionPolicy::Advisory,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConfigLoader
// ─────────────────────────────────────────────────────────────────────────────

/// Loads a [`BootConfig`] from layered sources.
///
/// Sources are merged in this order, later ones overriding earlier:
/// 1. [`BootConfig::default()`]
/// 2. The TOML file, if one is set and exists
/// 3. Environment variables with the prefix, nested keys split on `__`
///    (`BREWERY_LOGGING__LEVEL=debug`)
///
/// A relative `app.root` is resolved against the config file's directory.
/// Without `app.root`, the config file's directory is used, then the
/// current directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_owned(),
        }
    }
}

impl ConfigLoader {
    /// Creates a loader with no file and the `BREWERY` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TOML file to read.
    #[must_use]
    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the environment variable prefix (without the trailing `_`).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// The configured file, if any.
    #[must_use]
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The merged providers, before extraction.
    #[must_use]
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(BootConfig::default()));

        if let Some(path) = &self.config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
                tracing::debug!(path = %path.display(), "configuration file loaded");
            } else {
                tracing::warn!(path = %path.display(), "configuration file not found, using defaults");
            }
        }

        figment.merge(Env::prefixed(&format!("{}_", self.env_prefix)).split("__"))
    }

    /// Loads and resolves the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BootError::Config`] if a source is malformed or a value has
    /// the wrong type.
    pub fn load(&self) -> Result<BootConfig, BootError> {
        let mut config: BootConfig = self.figment().extract()?;
        config.app.root = Some(self.resolve_root(config.app.root.take()));
        tracing::debug!(root = %config.root().display(), "configuration resolved");
        Ok(config)
    }

    fn resolve_root(&self, root: Option<PathBuf>) -> PathBuf {
        let base = self
            .config_path
            .as_deref()
            .filter(|path| path.exists())
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        match root {
            Some(root) if root.is_absolute() => root,
            Some(root) => base.join(root),
            None => base,
        }
    }
}
