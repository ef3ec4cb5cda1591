//! Model definitions, bound models and the entity store capability.

use crate::connector::DatasourceHandle;
use crate::error::BoxError;
use crate::types::TypeDescriptors;
use async_trait::async_trait;
use downcast_rs::{DowncastSync, impl_downcast};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Bound models keyed by name, in definition order.
pub type ModelMap = IndexMap<String, Arc<dyn Model>>;

/// Equality filter for [`EntityStore::find_all`]. An empty filter matches everything.
pub type Filter = Map<String, Value>;

/// A datasource-bound model.
pub trait Model: DowncastSync {
    /// The model's name.
    fn name(&self) -> &str;

    /// Wires associations to sibling models on the same datasource.
    ///
    /// Called exactly once, after every model in `siblings` has been defined.
    ///
    /// # Errors
    ///
    /// Returns an error if an association target is missing or invalid.
    fn associate(&self, _siblings: &ModelMap) -> Result<(), BoxError> {
        Ok(())
    }

    /// CRUD access, for models backed by a store.
    fn store(&self) -> Option<&dyn EntityStore> {
        None
    }
}

impl_downcast!(sync Model);

impl core::fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Model({})", self.name())
    }
}

/// Signature of a model's define function.
pub type DefineFn =
    Arc<dyn Fn(&Arc<dyn DatasourceHandle>, &TypeDescriptors) -> Result<Arc<dyn Model>, BoxError> + Send + Sync>;

/// A model declaration waiting to be bound.
#[derive(Clone)]
pub struct ModelDefinition {
    /// Unique model name.
    pub name: String,
    /// Name of the datasource the model lives on.
    pub datasource: String,
    define: DefineFn,
}

impl core::fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("name", &self.name)
            .field("datasource", &self.datasource)
            .finish_non_exhaustive()
    }
}

impl ModelDefinition {
    /// Creates a definition from a define function.
    pub fn new<F>(name: impl Into<String>, datasource: impl Into<String>, define: F) -> Self
    where
        F: Fn(&Arc<dyn DatasourceHandle>, &TypeDescriptors) -> Result<Arc<dyn Model>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::from_fn(name, datasource, Arc::new(define))
    }

    /// Creates a definition from a shared define function.
    pub fn from_fn(name: impl Into<String>, datasource: impl Into<String>, define: DefineFn) -> Self {
        Self {
            name: name.into(),
            datasource: datasource.into(),
            define,
        }
    }

    /// Instantiates the model against a datasource.
    ///
    /// # Errors
    ///
    /// Propagates the define function's error.
    pub fn define(
        &self,
        handle: &Arc<dyn DatasourceHandle>,
        types: &TypeDescriptors,
    ) -> Result<Arc<dyn Model>, BoxError> {
        (self.define)(handle, types)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EntityStore
// ─────────────────────────────────────────────────────────────────────────────

/// Persistence operations a model may expose to repositories.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Returns every entity matching `filter`.
    async fn find_all(&self, filter: &Filter) -> Result<Vec<Value>, BoxError>;

    /// Returns the entity with primary key `id`, if any.
    async fn find_by_pk(&self, id: u64) -> Result<Option<Value>, BoxError>;

    /// Inserts `entity` and returns it as stored.
    async fn create(&self, entity: Value) -> Result<Value, BoxError>;

    /// Deletes the entity with primary key `id`.
    async fn destroy(&self, id: u64) -> Result<(), BoxError>;

    /// Number of stored entities.
    async fn count(&self) -> Result<u64, BoxError>;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>, BoxError>;
}

/// A unit of work over an [`EntityStore`].
#[async_trait]
pub trait Transaction: Send {
    /// Stages an update of entity `id` with `changes` and returns the result.
    async fn update(&mut self, id: u64, changes: Value) -> Result<Value, BoxError>;

    /// Applies all staged changes.
    async fn commit(self: Box<Self>) -> Result<(), BoxError>;

    /// Discards all staged changes.
    async fn rollback(self: Box<Self>) -> Result<(), BoxError>;
}
