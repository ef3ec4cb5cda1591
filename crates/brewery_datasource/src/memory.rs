//! The bundled in-memory connector.
//!
//! Useful for tests and demos: every datasource gets its own
//! [`MemoryDatabase`], models become [`MemoryModel`]s over a
//! [`MemoryTable`], and repositories work against them unchanged.

use crate::connector::{Connector, DatasourceHandle, SyncMode};
use crate::error::BoxError;
use crate::model::{EntityStore, Filter, Model, ModelMap, Transaction};
use crate::types::DataType;
use async_trait::async_trait;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// MemoryConnector
// ─────────────────────────────────────────────────────────────────────────────

/// Connector behind the `memory` built-in key.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    databases: Mutex<Vec<Arc<MemoryDatabase>>>,
}

impl MemoryConnector {
    /// Creates a connector with no databases yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn initialize(&self, config: &Value) -> Result<Arc<dyn DatasourceHandle>, BoxError> {
        let database = Arc::new(MemoryDatabase::from_config(config));
        self.databases.lock().push(Arc::clone(&database));
        Ok(database as Arc<dyn DatasourceHandle>)
    }

    async fn connect(&self) -> Result<(), BoxError> {
        for database in self.databases.lock().iter() {
            database.connected.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BoxError> {
        for database in self.databases.lock().iter() {
            database.connected.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryDatabase
// ─────────────────────────────────────────────────────────────────────────────

/// A set of in-memory tables.
///
/// Reads `sync` and `alter` booleans from its configuration. Tables carry no
/// schema, so synchronizing only creates missing tables and records the
/// request.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    sync: SyncMode,
    tables: RwLock<IndexMap<String, Arc<MemoryTable>>>,
    connected: AtomicBool,
    syncs: Mutex<Vec<(SyncMode, Vec<String>)>>,
}

impl MemoryDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new(sync: SyncMode) -> Self {
        Self {
            sync,
            ..Self::default()
        }
    }

    /// Creates an empty database configured from a datasource spec.
    #[must_use]
    pub fn from_config(config: &Value) -> Self {
        Self::new(SyncMode::from_config(config))
    }

    /// Returns the table `name`, creating it if needed.
    pub fn table(&self, name: &str) -> Arc<MemoryTable> {
        if let Some(table) = self.tables.read().get(name) {
            return Arc::clone(table);
        }
        let mut tables = self.tables.write();
        Arc::clone(
            tables
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(MemoryTable::new(name))),
        )
    }

    /// Names of existing tables.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Whether the owning connector has connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Every sync request received, with the model names it covered.
    #[must_use]
    pub fn sync_history(&self) -> Vec<(SyncMode, Vec<String>)> {
        self.syncs.lock().clone()
    }
}

#[async_trait]
impl DatasourceHandle for MemoryDatabase {
    fn sync_mode(&self) -> SyncMode {
        self.sync
    }

    async fn sync(&self, mode: SyncMode, models: &ModelMap) -> Result<(), BoxError> {
        let names: Vec<String> = models.keys().cloned().collect();
        for name in &names {
            self.table(name);
        }
        tracing::debug!(?mode, tables = ?names, "memory database synchronized");
        self.syncs.lock().push((mode, names));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryTable
// ─────────────────────────────────────────────────────────────────────────────

/// Rows keyed by an auto-incremented primary key.
#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    rows: RwLock<BTreeMap<u64, Value>>,
    next_id: AtomicU64,
}

impl MemoryTable {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Returns a copy of row `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Value> {
        self.rows.read().get(&id).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryModel
// ─────────────────────────────────────────────────────────────────────────────

/// A model stored in a [`MemoryTable`].
///
/// Declared attributes are type-checked on write; an attribute-less model
/// accepts any object. `belongs_to` targets are checked when associations are
/// wired.
#[derive(Debug)]
pub struct MemoryModel {
    name: String,
    table: Arc<MemoryTable>,
    attributes: IndexMap<String, DataType>,
    belongs_to: Vec<String>,
    associations: OnceCell<Vec<String>>,
}

impl MemoryModel {
    /// Defines `name` on a memory datasource.
    ///
    /// # Errors
    ///
    /// Fails if `handle` was not produced by the memory connector.
    pub fn define(name: impl Into<String>, handle: &Arc<dyn DatasourceHandle>) -> Result<Self, BoxError> {
        let name = name.into();
        let database = handle
            .as_ref()
            .downcast_ref::<MemoryDatabase>()
            .ok_or_else(|| format!("model `{name}` requires a memory datasource"))?;
        Ok(Self {
            table: database.table(&name),
            name,
            attributes: IndexMap::new(),
            belongs_to: Vec::new(),
            associations: OnceCell::new(),
        })
    }

    /// Declares a typed attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, ty: DataType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Declares an association to a sibling model.
    #[must_use]
    pub fn belongs_to(mut self, target: impl Into<String>) -> Self {
        self.belongs_to.push(target.into());
        self
    }

    /// Associations wired so far; empty until [`Model::associate`] runs.
    #[must_use]
    pub fn associations(&self) -> &[String] {
        self.associations.get().map_or(&[], Vec::as_slice)
    }

    /// The backing table.
    #[must_use]
    pub fn table(&self) -> &Arc<MemoryTable> {
        &self.table
    }

    /// The declared attributes.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, DataType> {
        &self.attributes
    }
}

impl Model for MemoryModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn associate(&self, siblings: &ModelMap) -> Result<(), BoxError> {
        if let Some(missing) = self
            .belongs_to
            .iter()
            .find(|target| !siblings.contains_key(target.as_str()))
        {
            return Err(format!(
                "association target `{missing}` of `{}` is not defined on the same datasource",
                self.name
            )
            .into());
        }
        self.associations
            .set(self.belongs_to.clone())
            .map_err(|_| format!("`{}` was already associated", self.name).into())
    }

    fn store(&self) -> Option<&dyn EntityStore> {
        Some(self)
    }
}

fn check_fields(
    model: &str,
    attributes: &IndexMap<String, DataType>,
    fields: &Map<String, Value>,
) -> Result<(), BoxError> {
    if attributes.is_empty() {
        return Ok(());
    }
    for (field, value) in fields {
        if field == "id" {
            continue;
        }
        let ty = attributes
            .get(field)
            .ok_or_else(|| format!("`{model}` has no attribute `{field}`"))?;
        if !ty.accepts(value) {
            return Err(format!("`{model}.{field}` expects {ty:?}, got {value}").into());
        }
    }
    Ok(())
}

fn as_object(model: &str, value: Value) -> Result<Map<String, Value>, BoxError> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(format!("`{model}` entities must be objects, got {other}").into()),
    }
}

fn row_matches(row: &Value, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(field, expected)| row.get(field) == Some(expected))
}

#[async_trait]
impl EntityStore for MemoryModel {
    async fn find_all(&self, filter: &Filter) -> Result<Vec<Value>, BoxError> {
        Ok(self
            .table
            .rows
            .read()
            .values()
            .filter(|row| row_matches(row, filter))
            .cloned()
            .collect())
    }

    async fn find_by_pk(&self, id: u64) -> Result<Option<Value>, BoxError> {
        Ok(self.table.get(id))
    }

    async fn create(&self, entity: Value) -> Result<Value, BoxError> {
        let mut fields = as_object(&self.name, entity)?;
        check_fields(&self.name, &self.attributes, &fields)?;

        let id = self.table.next_id.fetch_add(1, Ordering::SeqCst);
        fields.insert("id".to_owned(), Value::from(id));
        let row = Value::Object(fields);
        self.table.rows.write().insert(id, row.clone());
        Ok(row)
    }

    async fn destroy(&self, id: u64) -> Result<(), BoxError> {
        self.table.rows.write().remove(&id);
        Ok(())
    }

    async fn count(&self) -> Result<u64, BoxError> {
        Ok(self.table.len() as u64)
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, BoxError> {
        Ok(Box::new(MemoryTransaction {
            model: self.name.clone(),
            table: Arc::clone(&self.table),
            attributes: self.attributes.clone(),
            staged: BTreeMap::new(),
        }))
    }
}

/// Staged updates over a [`MemoryTable`], applied on commit.
struct MemoryTransaction {
    model: String,
    table: Arc<MemoryTable>,
    attributes: IndexMap<String, DataType>,
    staged: BTreeMap<u64, Value>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn update(&mut self, id: u64, changes: Value) -> Result<Value, BoxError> {
        let changes = as_object(&self.model, changes)?;
        check_fields(&self.model, &self.attributes, &changes)?;

        let current = match self.staged.get(&id) {
            Some(row) => row.clone(),
            None => self
                .table
                .get(id)
                .ok_or_else(|| format!("{} with id {id} can't be found.", self.model))?,
        };
        let mut fields = as_object(&self.model, current)?;
        for (field, value) in changes {
            if field != "id" {
                fields.insert(field, value);
            }
        }
        let row = Value::Object(fields);
        self.staged.insert(id, row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), BoxError> {
        let mut rows = self.table.rows.write();
        for (id, row) in self.staged {
            rows.insert(id, row);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BoxError> {
        tracing::trace!(model = %self.model, staged = self.staged.len(), "transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_model(database: &Arc<dyn DatasourceHandle>) -> MemoryModel {
        MemoryModel::define("User", database)
            .unwrap()
            .attribute("email", DataType::String)
            .attribute("age", DataType::Integer)
    }

    fn database() -> Arc<dyn DatasourceHandle> {
        Arc::new(MemoryDatabase::new(SyncMode::Off))
    }

    #[tokio::test]
    async fn create_assigns_ids_and_checks_types() {
        let database = database();
        let users = user_model(&database);

        let first = users.create(json!({ "email": "a@b.c", "age": 3 })).await.unwrap();
        let second = users.create(json!({ "email": "d@e.f" })).await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 2);
        assert_eq!(users.count().await.unwrap(), 2);

        let err = users.create(json!({ "age": "old" })).await.unwrap_err();
        assert!(err.to_string().contains("User.age"));
        let err = users.create(json!({ "nickname": "x" })).await.unwrap_err();
        assert!(err.to_string().contains("nickname"));
    }

    #[tokio::test]
    async fn find_all_filters_by_equality() {
        let database = database();
        let users = user_model(&database);
        users.create(json!({ "email": "a", "age": 1 })).await.unwrap();
        users.create(json!({ "email": "b", "age": 2 })).await.unwrap();

        let mut filter = Filter::new();
        filter.insert("age".into(), json!(2));
        let found = users.find_all(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["email"], "b");
        assert_eq!(users.find_all(&Filter::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transaction_applies_only_on_commit() {
        let database = database();
        let users = user_model(&database);
        users.create(json!({ "email": "a", "age": 1 })).await.unwrap();

        let mut tx = users.begin().await.unwrap();
        let staged = tx.update(1, json!({ "age": 2 })).await.unwrap();
        assert_eq!(staged["age"], 2);
        assert_eq!(users.table().get(1).unwrap()["age"], 1);
        tx.rollback().await.unwrap();
        assert_eq!(users.table().get(1).unwrap()["age"], 1);

        let mut tx = users.begin().await.unwrap();
        tx.update(1, json!({ "age": 5 })).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(users.table().get(1).unwrap()["age"], 5);
    }

    #[test]
    fn models_on_the_same_database_share_tables_by_name() {
        let database = database();
        let a = MemoryModel::define("Post", &database).unwrap();
        let b = MemoryModel::define("Post", &database).unwrap();
        assert!(Arc::ptr_eq(a.table(), b.table()));
    }

    #[test]
    fn define_rejects_foreign_handles() {
        struct Other;
        impl DatasourceHandle for Other {}

        let handle: Arc<dyn DatasourceHandle> = Arc::new(Other);
        assert!(MemoryModel::define("User", &handle).is_err());
    }

    #[test]
    fn associate_runs_once() {
        let database = database();
        let user: Arc<dyn Model> = Arc::new(MemoryModel::define("User", &database).unwrap());
        let post = Arc::new(MemoryModel::define("Post", &database).unwrap().belongs_to("User"));

        let mut siblings = ModelMap::new();
        siblings.insert("User".into(), user);
        siblings.insert("Post".into(), Arc::clone(&post) as Arc<dyn Model>);

        post.associate(&siblings).unwrap();
        assert_eq!(post.associations(), ["User"]);
        assert!(post.associate(&siblings).is_err());
    }
}
