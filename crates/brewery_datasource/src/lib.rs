//! Datasources, connectors and models for Brewery.
//!
//! This crate turns declarative datasource specs and model definitions into
//! live datasource handles and bound models:
//!
//! - [`ConnectorRegistry`] - resolves [`ConnectorRef`]s to [`Connector`]s
//! - [`DatasourceBinder`] - initializes datasources, defines and associates models
//! - [`PendingConnections`] - the `connect()` calls started while binding
//! - [`BaseRepository`] - generic CRUD over a bound model
//!
//! The `memory` connector is bundled and backs the crate's tests.
//!
//! # Example
//!
//! ```
//! use brewery_datasource::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let connectors = ConnectorRegistry::default();
//! let binding = DatasourceBinder::new(&connectors)
//!     .bind(
//!         vec![DatasourceSpec::new("main", "memory", json!({}))],
//!         vec![ModelDefinition::new("User", "main", |handle, _types| {
//!             Ok(Arc::new(MemoryModel::define("User", handle)?) as Arc<dyn Model>)
//!         })],
//!     )
//!     .await
//!     .unwrap();
//! binding.connections.settle(ConnectionPolicy::default()).await.unwrap();
//!
//! let users = BaseRepository::new(Arc::clone(&binding.models["User"]));
//! let created = users.add(json!({ "email": "ada@example.com" })).await.unwrap();
//! assert_eq!(users.get_by_id(1).await.unwrap(), created);
//! # });
//! ```

mod binder;
mod connection;
mod connector;
mod error;
mod memory;
mod model;
mod registry;
mod repository;
mod types;

pub use binder::{Binding, DatasourceBinder, DatasourceSpec, validate};
pub use connection::{
    ConnectionOutcome, ConnectionPolicy, DEFAULT_CONNECT_TIMEOUT, PendingConnections,
    disconnect_all,
};
pub use connector::{
    Connector, ConnectorBuilder, ConnectorEvent, ConnectorRef, DatasourceHandle, ExtensionFn,
    Extensions, FnConnector, SyncMode,
};
pub use error::{BindError, BoxError, ConnectorError, RepositoryError};
pub use memory::{MemoryConnector, MemoryDatabase, MemoryModel, MemoryTable};
pub use model::{DefineFn, EntityStore, Filter, Model, ModelDefinition, ModelMap, Transaction};
pub use registry::{BUILTIN_PREFIX, ConnectorLoader, ConnectorRegistry};
pub use repository::BaseRepository;
pub use types::{DataType, TypeDescriptors};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        BaseRepository, BindError, Binding, ConnectionPolicy, Connector, ConnectorBuilder,
        ConnectorError, ConnectorRef, ConnectorRegistry, DataType, DatasourceBinder,
        DatasourceHandle, DatasourceSpec, EntityStore, MemoryConnector, MemoryDatabase,
        MemoryModel, Model, ModelDefinition, ModelMap, RepositoryError, SyncMode,
        TypeDescriptors,
    };
}
