//! Error types for connectors, binding and repositories.

use core::time::Duration;
use thiserror::Error;

/// Boxed error returned by connector, model and store implementations.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors raised while resolving or driving a connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The built-in key is not known.
    #[error("Invalid connector {key}")]
    UnknownConnector {
        /// The requested key.
        key: String,
    },

    /// A known built-in could not be loaded.
    #[error("unable to load connector `{key}`: {source}")]
    ConnectorLoad {
        /// The requested key.
        key: String,
        /// Why loading failed.
        #[source]
        source: BoxError,
    },

    /// The reference is neither a built-in key nor a connector instance.
    #[error(
        "Invalid connector {reason}, connector must be one of default connectors or a connector instance"
    )]
    InvalidConnector {
        /// Description of what was supplied.
        reason: String,
    },

    /// A connector extension was called that the connector does not provide.
    #[error("connector `{connector}` has no extension `{name}`")]
    UnknownExtension {
        /// The connector's name.
        connector: String,
        /// The requested extension.
        name: String,
    },

    /// A connector extension failed.
    #[error("connector extension `{name}` failed: {source}")]
    Extension {
        /// The extension name.
        name: String,
        /// The extension's error.
        #[source]
        source: BoxError,
    },
}

impl ConnectorError {
    /// Creates an [`InvalidConnector`](Self::InvalidConnector).
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConnector {
            reason: reason.into(),
        }
    }
}

/// Errors that abort binding datasources and models.
///
/// No partial binding is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum BindError {
    /// A model names a datasource that was not declared.
    #[error("Datasource \"{datasource}\" defined in model \"{model}\" doesn't exist")]
    MissingDatasource {
        /// The model's name.
        model: String,
        /// The datasource it references.
        datasource: String,
    },

    /// Two models share a name, across or within datasources.
    #[error(
        "model \"{model}\" is defined more than once (datasources \"{first}\" and \"{second}\")"
    )]
    DuplicateModelName {
        /// The duplicated name.
        model: String,
        /// Datasource of the first definition.
        first: String,
        /// Datasource of the later definition.
        second: String,
    },

    /// Two datasource specs share a name.
    #[error("datasource \"{name}\" is declared more than once")]
    DuplicateDatasource {
        /// The duplicated name.
        name: String,
    },

    /// The datasource's connector could not be resolved.
    #[error("datasource \"{datasource}\": {source}")]
    Connector {
        /// The datasource name.
        datasource: String,
        /// The resolution failure.
        #[source]
        source: ConnectorError,
    },

    /// `initialize` failed.
    #[error("datasource \"{datasource}\" failed to initialize: {source}")]
    Initialize {
        /// The datasource name.
        datasource: String,
        /// The connector's error.
        #[source]
        source: BoxError,
    },

    /// A model's `define` function failed.
    #[error("model \"{model}\" failed to define on datasource \"{datasource}\": {source}")]
    Define {
        /// The model name.
        model: String,
        /// Its datasource.
        datasource: String,
        /// The define error.
        #[source]
        source: BoxError,
    },

    /// A model's `associate` hook failed.
    #[error("model \"{model}\" failed to associate: {source}")]
    Associate {
        /// The model name.
        model: String,
        /// The hook's error.
        #[source]
        source: BoxError,
    },

    /// Schema synchronization failed.
    #[error("datasource \"{datasource}\" failed to sync: {source}")]
    Sync {
        /// The datasource name.
        datasource: String,
        /// The sync error.
        #[source]
        source: BoxError,
    },

    /// `connect` failed under a policy that requires connections.
    #[error("DataSource {datasource} has failed to establish connection: {source}")]
    Connect {
        /// The datasource name.
        datasource: String,
        /// The connect error.
        #[source]
        source: BoxError,
    },

    /// `connect` did not finish before the deadline.
    #[error("DataSource {datasource} did not connect within {timeout:?}")]
    ConnectTimeout {
        /// The datasource name.
        datasource: String,
        /// The configured deadline.
        timeout: Duration,
    },
}

impl BindError {
    /// Returns `true` for errors detected before any connector was touched.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingDatasource { .. }
                | Self::DuplicateModelName { .. }
                | Self::DuplicateDatasource { .. }
        )
    }
}

/// Errors returned by [`BaseRepository`](crate::BaseRepository) operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No entity with the given id exists.
    #[error("NotFoundError: {model} with id {id} can't be found.")]
    NotFound {
        /// The model name.
        model: String,
        /// The requested id.
        id: u64,
    },

    /// The model does not expose an entity store.
    #[error("model \"{model}\" does not support repository operations")]
    Unsupported {
        /// The model name.
        model: String,
    },

    /// The underlying store failed.
    #[error("{model}: {source}")]
    Store {
        /// The model name.
        model: String,
        /// The store's error.
        #[source]
        source: BoxError,
    },

    /// A transaction could not be committed.
    #[error("{model}: transaction failed: {source}")]
    Transaction {
        /// The model name.
        model: String,
        /// The commit error.
        #[source]
        source: BoxError,
    },
}

impl RepositoryError {
    /// The `details` string for a not-found error.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Self::NotFound { model, id } => Some(format!("{model} with id {id} can't be found.")),
            _ => None,
        }
    }
}
