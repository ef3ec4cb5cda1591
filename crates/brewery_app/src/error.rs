//! Boot errors.

use brewery_datasource::BindError;
use brewery_loader::{ComponentKind, DiscoveryError};
use brewery_registry::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort [`Application`](crate::Application) boot.
///
/// A failed boot never yields a partial application; datasources bound
/// before the failure are disconnected first.
#[derive(Debug, Error)]
pub enum BootError {
    /// The configuration could not be loaded or deserialized.
    #[error("configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    /// A source location could not be discovered.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// A manifest is malformed.
    #[error("invalid manifest {}: {reason}", .path.display())]
    InvalidManifest {
        /// The manifest file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// A manifest names a factory the catalog does not provide.
    #[error("no {kind} factory `{key}` in the component catalog (required by {})", .path.display())]
    MissingFactory {
        /// The component kind.
        kind: ComponentKind,
        /// The missing factory key.
        key: String,
        /// The manifest that references it.
        path: PathBuf,
    },

    /// Datasources or models could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// A registration could not be resolved.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A required datasource connection failed or timed out.
    #[error("{0}")]
    Connection(#[source] BindError),

    /// A discovery task panicked or was cancelled.
    #[error("boot task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<figment::Error> for BootError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

impl BootError {
    /// Creates an [`InvalidManifest`](Self::InvalidManifest) error.
    pub fn invalid_manifest(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`MissingFactory`](Self::MissingFactory) error.
    pub fn missing_factory(
        kind: ComponentKind,
        key: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self::MissingFactory {
            kind,
            key: key.into(),
            path: path.into(),
        }
    }
}
