//! Binding datasource specs and model definitions.

use crate::connection::{PendingConnections, disconnect_all};
use crate::connector::{Connector, ConnectorRef, DatasourceHandle, SyncMode};
use crate::error::BindError;
use crate::model::{ModelDefinition, ModelMap};
use crate::registry::ConnectorRegistry;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A datasource to bind: a unique name, its connector and its configuration.
#[derive(Debug, Clone)]
pub struct DatasourceSpec {
    /// Unique datasource name.
    pub name: String,
    /// Which connector to use.
    pub connector: ConnectorRef,
    /// Opaque connector configuration.
    pub config: Value,
}

impl DatasourceSpec {
    /// Creates a spec.
    pub fn new(name: impl Into<String>, connector: impl Into<ConnectorRef>, config: Value) -> Self {
        Self {
            name: name.into(),
            connector: connector.into(),
            config,
        }
    }
}

/// The output of a successful bind.
///
/// Datasources and models are never rebound; a new bind needs a new boot.
#[derive(Debug)]
pub struct Binding {
    /// Datasource handles by datasource name, in declaration order.
    pub datasources: IndexMap<String, Arc<dyn DatasourceHandle>>,
    /// The connector behind each datasource.
    pub connectors: IndexMap<String, Arc<dyn Connector>>,
    /// Every bound model, across datasources.
    pub models: ModelMap,
    /// Connections started during binding.
    pub connections: PendingConnections,
}

/// Binds datasources and models in a fixed order.
///
/// 1. Validate names and references; nothing is initialized on failure.
/// 2. Resolve and initialize each connector, starting its `connect()`.
/// 3. Per datasource, in declaration order: define its models, then associate each
///    once, then sync if the datasource asks for it.
/// 4. Merge every datasource's models into one map.
///
/// Any failure after step 1 disconnects what was initialized and returns the
/// original error.
#[derive(Debug)]
pub struct DatasourceBinder<'r> {
    connectors: &'r ConnectorRegistry,
}

impl<'r> DatasourceBinder<'r> {
    /// Creates a binder resolving connectors through `connectors`.
    #[must_use]
    pub fn new(connectors: &'r ConnectorRegistry) -> Self {
        Self { connectors }
    }

    /// Binds `specs` and `models`.
    ///
    /// Must run inside a Tokio runtime; `connect()` calls are spawned on it.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindError`] encountered.
    pub async fn bind(
        &self,
        specs: Vec<DatasourceSpec>,
        models: Vec<ModelDefinition>,
    ) -> Result<Binding, BindError> {
        validate(&specs, &models)?;

        let mut datasources = IndexMap::with_capacity(specs.len());
        let mut connectors = IndexMap::with_capacity(specs.len());
        let mut connections = PendingConnections::default();

        match self
            .bind_inner(specs, models, &mut datasources, &mut connectors, &mut connections)
            .await
        {
            Ok(bound) => Ok(Binding {
                datasources,
                connectors,
                models: bound,
                connections,
            }),
            Err(error) => {
                tracing::error!(error = %error, "binding failed, releasing datasources");
                connections.abort();
                disconnect_all(&connectors).await;
                Err(error)
            }
        }
    }

    async fn bind_inner(
        &self,
        specs: Vec<DatasourceSpec>,
        models: Vec<ModelDefinition>,
        datasources: &mut IndexMap<String, Arc<dyn DatasourceHandle>>,
        connectors: &mut IndexMap<String, Arc<dyn Connector>>,
        connections: &mut PendingConnections,
    ) -> Result<ModelMap, BindError> {
        for spec in specs {
            let connector =
                self.connectors
                    .resolve(&spec.connector)
                    .map_err(|source| BindError::Connector {
                        datasource: spec.name.clone(),
                        source,
                    })?;
            let handle = connector
                .initialize(&spec.config)
                .map_err(|source| BindError::Initialize {
                    datasource: spec.name.clone(),
                    source,
                })?;
            tracing::debug!(datasource = %spec.name, connector = %connector.name(), "datasource initialized");

            connectors.insert(spec.name.clone(), Arc::clone(&connector));
            connections.start(&spec.name, &connector);
            datasources.insert(spec.name, handle);
        }

        let datasources: &IndexMap<String, Arc<dyn DatasourceHandle>> = datasources;
        let connectors: &IndexMap<String, Arc<dyn Connector>> = connectors;

        // Groups follow declaration order; definition order is kept within a group.
        let mut bound = ModelMap::with_capacity(models.len());
        for name in datasources.keys() {
            let definitions: Vec<&ModelDefinition> = models
                .iter()
                .filter(|definition| definition.datasource == *name)
                .collect();
            if definitions.is_empty() {
                continue;
            }
            let group = self
                .bind_group(name, &definitions, datasources, connectors)
                .await?;
            bound.extend(group);
        }
        Ok(bound)
    }

    async fn bind_group(
        &self,
        datasource: &str,
        definitions: &[&ModelDefinition],
        datasources: &IndexMap<String, Arc<dyn DatasourceHandle>>,
        connectors: &IndexMap<String, Arc<dyn Connector>>,
    ) -> Result<ModelMap, BindError> {
        // Both maps are populated for every validated datasource.
        let (Some(handle), Some(connector)) = (datasources.get(datasource), connectors.get(datasource))
        else {
            return Err(BindError::MissingDatasource {
                model: definitions
                    .first()
                    .map(|definition| definition.name.clone())
                    .unwrap_or_default(),
                datasource: datasource.to_owned(),
            });
        };
        let types = connector.type_descriptors();

        let mut group = ModelMap::with_capacity(definitions.len());
        for definition in definitions {
            let model = definition
                .define(handle, &types)
                .map_err(|source| BindError::Define {
                    model: definition.name.clone(),
                    datasource: datasource.to_owned(),
                    source,
                })?;
            group.insert(definition.name.clone(), model);
        }

        for (name, model) in &group {
            model.associate(&group).map_err(|source| BindError::Associate {
                model: name.clone(),
                source,
            })?;
        }

        let mode = handle.sync_mode();
        if mode != SyncMode::Off {
            handle
                .sync(mode, &group)
                .await
                .map_err(|source| BindError::Sync {
                    datasource: datasource.to_owned(),
                    source,
                })?;
        }

        tracing::debug!(
            datasource = %datasource,
            models = ?group.keys().collect::<Vec<_>>(),
            sync = ?mode,
            "models bound"
        );
        Ok(group)
    }
}

/// Checks names and references before any connector is touched.
///
/// # Errors
///
/// Returns [`BindError::DuplicateDatasource`], [`BindError::MissingDatasource`]
/// or [`BindError::DuplicateModelName`].
pub fn validate(specs: &[DatasourceSpec], models: &[ModelDefinition]) -> Result<(), BindError> {
    let mut names = HashSet::with_capacity(specs.len());
    for spec in specs {
        if !names.insert(spec.name.as_str()) {
            return Err(BindError::DuplicateDatasource {
                name: spec.name.clone(),
            });
        }
    }

    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(models.len());
    for model in models {
        if !names.contains(model.datasource.as_str()) {
            return Err(BindError::MissingDatasource {
                model: model.name.clone(),
                datasource: model.datasource.clone(),
            });
        }
        if let Some(first) = seen.insert(model.name.as_str(), model.datasource.as_str()) {
            return Err(BindError::DuplicateModelName {
                model: model.name.clone(),
                first: first.to_owned(),
                second: model.datasource.clone(),
            });
        }
    }
    Ok(())
}
