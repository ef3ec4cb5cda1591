//! The connector capability interface.
//!
//! A [`Connector`] turns a datasource's configuration into a
//! [`DatasourceHandle`] and owns the connection lifecycle. Connectors are
//! referenced from datasource specs through [`ConnectorRef`] and may carry an
//! [`Extensions`] table of extra named operations.

use crate::error::{BoxError, ConnectorError};
use crate::model::ModelMap;
use crate::types::TypeDescriptors;
use async_trait::async_trait;
use downcast_rs::{DowncastSync, impl_downcast};
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// DatasourceHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Schema synchronization requested by a datasource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncMode {
    /// Leave the schema alone.
    #[default]
    Off,
    /// Create missing tables.
    Create,
    /// Create missing tables and alter existing ones to match.
    Alter,
}

impl SyncMode {
    /// Derives the mode from `sync` and `alter` configuration flags.
    #[must_use]
    pub fn from_flags(sync: bool, alter: bool) -> Self {
        match (sync, alter) {
            (false, _) => Self::Off,
            (true, false) => Self::Create,
            (true, true) => Self::Alter,
        }
    }

    /// Reads `sync` / `alter` booleans from a connector config object.
    #[must_use]
    pub fn from_config(config: &Value) -> Self {
        let flag = |name: &str| config.get(name).and_then(Value::as_bool).unwrap_or(false);
        Self::from_flags(flag("sync"), flag("alter"))
    }
}

/// A live datasource produced by [`Connector::initialize`].
///
/// Model `define` functions receive the handle and downcast it to the
/// concrete type their connector produces.
#[async_trait]
pub trait DatasourceHandle: DowncastSync {
    /// Schema synchronization this datasource asks for.
    fn sync_mode(&self) -> SyncMode {
        SyncMode::Off
    }

    /// Synchronizes the schema of `models`.
    ///
    /// Called once per datasource, after every model on it has been defined
    /// and associated, and only when [`sync_mode`](Self::sync_mode) is not
    /// [`SyncMode::Off`].
    async fn sync(&self, _mode: SyncMode, _models: &ModelMap) -> Result<(), BoxError> {
        Ok(())
    }
}

impl_downcast!(sync DatasourceHandle);

impl core::fmt::Debug for dyn DatasourceHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("DatasourceHandle")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connector
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle notifications emitted by connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// `initialize` returned a handle.
    Initialized,
    /// `connect` completed.
    Connected,
    /// `disconnect` completed.
    Disconnected,
}

/// A datasource connector.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connector name used in logs.
    fn name(&self) -> &str;

    /// Builds a datasource handle from the datasource configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    fn initialize(&self, config: &Value) -> Result<Arc<dyn DatasourceHandle>, BoxError>;

    /// Establishes the connection.
    async fn connect(&self) -> Result<(), BoxError>;

    /// Tears the connection down.
    async fn disconnect(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Type table handed to model `define` functions.
    fn type_descriptors(&self) -> TypeDescriptors {
        TypeDescriptors::standard()
    }

    /// Extra named operations this connector offers.
    fn extensions(&self) -> &Extensions {
        Extensions::empty()
    }
}

impl core::fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Connector({})", self.name())
    }
}

impl dyn Connector {
    /// Invokes the extension `name` with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::UnknownExtension`] if no such extension is
    /// registered, or [`ConnectorError::Extension`] if it fails.
    pub fn call_extension(&self, name: &str, args: &Value) -> Result<Value, ConnectorError> {
        let extension =
            self.extensions()
                .get(name)
                .ok_or_else(|| ConnectorError::UnknownExtension {
                    connector: self.name().to_owned(),
                    name: name.to_owned(),
                })?;
        extension(args).map_err(|source| ConnectorError::Extension {
            name: name.to_owned(),
            source,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extensions
// ─────────────────────────────────────────────────────────────────────────────

/// A named connector operation.
pub type ExtensionFn = Arc<dyn Fn(&Value) -> Result<Value, BoxError> + Send + Sync>;

static EMPTY_EXTENSIONS: Lazy<Extensions> = Lazy::new(Extensions::default);

/// Extension table composed when a connector is constructed.
#[derive(Clone, Default)]
pub struct Extensions {
    table: IndexMap<String, ExtensionFn>,
}

impl core::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.table.keys()).finish()
    }
}

impl Extensions {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared empty table.
    #[must_use]
    pub fn empty() -> &'static Self {
        &EMPTY_EXTENSIONS
    }

    /// Adds an extension, replacing any with the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, extension: F)
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.table.insert(name.into(), Arc::new(extension));
    }

    /// Chaining variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, extension: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.insert(name, extension);
        self
    }

    /// Looks up an extension.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExtensionFn> {
        self.table.get(name)
    }

    /// Extension names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectorRef
// ─────────────────────────────────────────────────────────────────────────────

/// How a datasource spec names its connector.
#[derive(Clone)]
pub enum ConnectorRef {
    /// A key in the [`ConnectorRegistry`](crate::ConnectorRegistry) built-in table.
    Builtin(String),
    /// A connector supplied directly.
    Instance(Arc<dyn Connector>),
}

impl core::fmt::Debug for ConnectorRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Builtin(key) => f.debug_tuple("Builtin").field(key).finish(),
            Self::Instance(connector) => f.debug_tuple("Instance").field(&connector.name()).finish(),
        }
    }
}

impl ConnectorRef {
    /// References a built-in connector by key.
    pub fn builtin(key: impl Into<String>) -> Self {
        Self::Builtin(key.into())
    }

    /// Wraps a connector instance.
    pub fn instance<C: Connector>(connector: C) -> Self {
        Self::Instance(Arc::new(connector))
    }
}

impl From<&str> for ConnectorRef {
    fn from(key: &str) -> Self {
        Self::builtin(key)
    }
}

impl From<Arc<dyn Connector>> for ConnectorRef {
    fn from(connector: Arc<dyn Connector>) -> Self {
        Self::Instance(connector)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectorBuilder
// ─────────────────────────────────────────────────────────────────────────────

type InitializeFn = Arc<dyn Fn(&Value) -> Result<Arc<dyn DatasourceHandle>, BoxError> + Send + Sync>;
type LifecycleFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
type EventFn = Arc<dyn Fn(&str, ConnectorEvent) + Send + Sync>;

/// Composes a [`Connector`] from closures.
///
/// # Example
///
/// ```
/// use brewery_datasource::{Connector, ConnectorBuilder, DatasourceHandle, MemoryDatabase};
/// use serde_json::{Value, json};
/// use std::sync::Arc;
///
/// let connector = ConnectorBuilder::new("cache")
///     .initialize(|config: &Value| {
///         Ok(Arc::new(MemoryDatabase::from_config(config)) as Arc<dyn DatasourceHandle>)
///     })
///     .connect(|| async { Ok(()) })
///     .extension("ping", |_args: &Value| Ok(json!("pong")))
///     .build()
///     .unwrap();
///
/// let connector: Arc<dyn Connector> = Arc::new(connector);
/// assert_eq!(connector.call_extension("ping", &json!(null)).unwrap(), json!("pong"));
/// ```
pub struct ConnectorBuilder {
    name: String,
    initialize: Option<InitializeFn>,
    connect: Option<LifecycleFn>,
    disconnect: Option<LifecycleFn>,
    types: TypeDescriptors,
    extensions: Extensions,
    on_event: Option<EventFn>,
}

impl ConnectorBuilder {
    /// Starts a connector called `name` with the standard type table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialize: None,
            connect: None,
            disconnect: None,
            types: TypeDescriptors::standard(),
            extensions: Extensions::new(),
            on_event: None,
        }
    }

    /// Sets the initialize function.
    #[must_use]
    pub fn initialize<F>(mut self, initialize: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn DatasourceHandle>, BoxError> + Send + Sync + 'static,
    {
        self.initialize = Some(Arc::new(initialize));
        self
    }

    /// Sets the connect function.
    #[must_use]
    pub fn connect<F, Fut>(mut self, connect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.connect = Some(Arc::new(move || connect().boxed()));
        self
    }

    /// Sets the disconnect function. Defaults to a no-op.
    #[must_use]
    pub fn disconnect<F, Fut>(mut self, disconnect: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.disconnect = Some(Arc::new(move || disconnect().boxed()));
        self
    }

    /// Replaces the type table.
    #[must_use]
    pub fn types(mut self, types: TypeDescriptors) -> Self {
        self.types = types;
        self
    }

    /// Adds an extension.
    #[must_use]
    pub fn extension<F>(mut self, name: impl Into<String>, extension: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.extensions.insert(name, extension);
        self
    }

    /// Observes lifecycle events.
    #[must_use]
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, ConnectorEvent) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(listener));
        self
    }

    /// Finishes the connector.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::InvalidConnector`] if `initialize` or
    /// `connect` was never set.
    pub fn build(self) -> Result<FnConnector, ConnectorError> {
        let initialize = self
            .initialize
            .ok_or_else(|| ConnectorError::invalid(format!("{} (missing initialize)", self.name)))?;
        let connect = self
            .connect
            .ok_or_else(|| ConnectorError::invalid(format!("{} (missing connect)", self.name)))?;

        Ok(FnConnector {
            name: self.name,
            initialize,
            connect,
            disconnect: self.disconnect,
            types: self.types,
            extensions: self.extensions,
            on_event: self.on_event,
        })
    }
}

/// A connector assembled by [`ConnectorBuilder`].
pub struct FnConnector {
    name: String,
    initialize: InitializeFn,
    connect: LifecycleFn,
    disconnect: Option<LifecycleFn>,
    types: TypeDescriptors,
    extensions: Extensions,
    on_event: Option<EventFn>,
}

impl core::fmt::Debug for FnConnector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FnConnector")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl FnConnector {
    fn emit(&self, event: ConnectorEvent) {
        tracing::trace!(connector = %self.name, ?event, "connector event");
        if let Some(listener) = &self.on_event {
            listener(&self.name, event);
        }
    }
}

#[async_trait]
impl Connector for FnConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, config: &Value) -> Result<Arc<dyn DatasourceHandle>, BoxError> {
        let handle = (self.initialize)(config)?;
        self.emit(ConnectorEvent::Initialized);
        Ok(handle)
    }

    async fn connect(&self) -> Result<(), BoxError> {
        (self.connect)().await?;
        self.emit(ConnectorEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BoxError> {
        if let Some(disconnect) = &self.disconnect {
            disconnect().await?;
        }
        self.emit(ConnectorEvent::Disconnected);
        Ok(())
    }

    fn type_descriptors(&self) -> TypeDescriptors {
        self.types.clone()
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use serde_json::json;

    fn memory_builder() -> ConnectorBuilder {
        ConnectorBuilder::new("test").initialize(|config: &Value| {
            Ok(Arc::new(MemoryDatabase::from_config(config)) as Arc<dyn DatasourceHandle>)
        })
    }

    #[test]
    fn sync_mode_from_config_flags() {
        assert_eq!(SyncMode::from_config(&json!({})), SyncMode::Off);
        assert_eq!(SyncMode::from_config(&json!({ "sync": true })), SyncMode::Create);
        assert_eq!(
            SyncMode::from_config(&json!({ "sync": true, "alter": true })),
            SyncMode::Alter
        );
        assert_eq!(SyncMode::from_config(&json!({ "alter": true })), SyncMode::Off);
    }

    #[test]
    fn builder_requires_connect() {
        let err = memory_builder().build().unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidConnector { ref reason } if reason.contains("connect")));
    }

    #[test]
    fn unknown_extension_is_reported() {
        let connector: Arc<dyn Connector> = Arc::new(
            memory_builder()
                .connect(|| async { Ok(()) })
                .build()
                .unwrap(),
        );
        let err = connector.call_extension("vacuum", &json!(null)).unwrap_err();
        assert!(matches!(err, ConnectorError::UnknownExtension { ref name, .. } if name == "vacuum"));
    }

    #[tokio::test]
    async fn lifecycle_events_are_emitted() {
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let connector = memory_builder()
            .connect(|| async { Ok(()) })
            .on_event(move |_, event| sink.lock().push(event))
            .build()
            .unwrap();

        connector.initialize(&json!({})).unwrap();
        connector.connect().await.unwrap();
        connector.disconnect().await.unwrap();

        assert_eq!(
            events.lock().as_slice(),
            [
                ConnectorEvent::Initialized,
                ConnectorEvent::Connected,
                ConnectorEvent::Disconnected
            ]
        );
    }
}
