//! Generic CRUD over a bound model.

use crate::error::RepositoryError;
use crate::model::{EntityStore, Filter, Model};
use serde_json::Value;
use std::sync::Arc;

/// Data access for one model, backed by the model's [`EntityStore`].
///
/// Updates run inside a transaction: committed on success, rolled back when
/// the update fails.
#[derive(Debug, Clone)]
pub struct BaseRepository {
    model: Arc<dyn Model>,
}

impl BaseRepository {
    /// Creates a repository for `model`.
    #[must_use]
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self { model }
    }

    /// The model this repository serves.
    #[must_use]
    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Entities matching `filter`; an empty filter returns all of them.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] if the store fails.
    pub async fn get_all(&self, filter: &Filter) -> Result<Vec<Value>, RepositoryError> {
        self.store()?
            .find_all(filter)
            .await
            .map_err(|source| self.store_error(source))
    }

    /// The entity with primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no such entity exists.
    pub async fn get_by_id(&self, id: u64) -> Result<Value, RepositoryError> {
        self.store()?
            .find_by_pk(id)
            .await
            .map_err(|source| self.store_error(source))?
            .ok_or_else(|| self.not_found(id))
    }

    /// Stores `entity` and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] if the store rejects the entity.
    pub async fn add(&self, entity: Value) -> Result<Value, RepositoryError> {
        self.store()?
            .create(entity)
            .await
            .map_err(|source| self.store_error(source))
    }

    /// Deletes the entity with primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] if no such entity exists.
    pub async fn remove(&self, id: u64) -> Result<(), RepositoryError> {
        self.get_by_id(id).await?;
        self.store()?
            .destroy(id)
            .await
            .map_err(|source| self.store_error(source))
    }

    /// Applies `changes` to entity `id` inside a transaction and returns the
    /// updated entity.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] if no such entity exists
    /// - [`RepositoryError::Store`] if the update fails (after rollback)
    /// - [`RepositoryError::Transaction`] if the commit fails
    pub async fn update(&self, id: u64, changes: Value) -> Result<Value, RepositoryError> {
        self.get_by_id(id).await?;
        let store = self.store()?;

        let mut transaction = store
            .begin()
            .await
            .map_err(|source| self.transaction_error(source))?;
        match transaction.update(id, changes).await {
            Ok(updated) => {
                transaction
                    .commit()
                    .await
                    .map_err(|source| self.transaction_error(source))?;
                Ok(updated)
            }
            Err(source) => {
                if let Err(rollback) = transaction.rollback().await {
                    tracing::warn!(model = %self.model.name(), error = %rollback, "rollback failed");
                }
                Err(self.store_error(source))
            }
        }
    }

    /// Number of stored entities.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Store`] if the store fails.
    pub async fn count(&self) -> Result<u64, RepositoryError> {
        self.store()?
            .count()
            .await
            .map_err(|source| self.store_error(source))
    }

    fn store(&self) -> Result<&dyn EntityStore, RepositoryError> {
        self.model.store().ok_or_else(|| RepositoryError::Unsupported {
            model: self.model.name().to_owned(),
        })
    }

    fn not_found(&self, id: u64) -> RepositoryError {
        RepositoryError::NotFound {
            model: self.model.name().to_owned(),
            id,
        }
    }

    fn store_error(&self, source: crate::error::BoxError) -> RepositoryError {
        RepositoryError::Store {
            model: self.model.name().to_owned(),
            source,
        }
    }

    fn transaction_error(&self, source: crate::error::BoxError) -> RepositoryError {
        RepositoryError::Transaction {
            model: self.model.name().to_owned(),
            source,
        }
    }
}
