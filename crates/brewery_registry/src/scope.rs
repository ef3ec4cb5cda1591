//! Per-context resolution scopes.

use crate::error::RegistryError;
use crate::registration::Instance;
use crate::registry::{Registry, downcast, resolve_entry};
use core::any::Any;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// A child resolution context, typically one per request.
///
/// Scoped registrations are constructed at most once per scope and cached
/// until the scope is dropped. Singletons and values resolve exactly as they
/// do on the parent [`Registry`].
///
/// # Example
///
/// ```
/// use brewery_registry::{Registration, RegistryBuilder};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let registry = RegistryBuilder::new()
///     .with("req", Registration::scoped(Vec::<String>::new(), |inj| {
///         Ok(RequestId(inj.scope().map_or(0, |scope| scope.id())))
///     }))
///     .build();
///
/// let a = registry.create_scope();
/// let b = registry.create_scope();
///
/// let first = a.resolve_as::<RequestId>("req").unwrap();
/// assert!(Arc::ptr_eq(&first, &a.resolve_as::<RequestId>("req").unwrap()));
/// assert!(!Arc::ptr_eq(&first, &b.resolve_as::<RequestId>("req").unwrap()));
/// ```
pub struct Scope {
    id: u64,
    registry: Registry,
    cache: Mutex<HashMap<String, Arc<OnceCell<Instance>>>>,
}

impl core::fmt::Debug for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("cached", &self.cached())
            .finish()
    }
}

impl Scope {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Process-unique identifier of this scope.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registry this scope was created from.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolves `key` within this scope.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::resolve`], except scoped keys are allowed.
    pub fn resolve(&self, key: &str) -> Result<Instance, RegistryError> {
        resolve_entry(&self.registry, Some(self), key, &[])
    }

    /// Resolves `key` as `T` within this scope.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), plus [`RegistryError::TypeMismatch`].
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        downcast(key, self.resolve(key)?)
    }

    /// Resolves `key` as `T` within this scope and clones the value out.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_as`](Self::resolve_as).
    pub fn resolve_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Result<T, RegistryError> {
        self.resolve_as::<T>(key).map(|value| T::clone(&value))
    }

    /// Number of scoped values constructed so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Returns the cell for `key`, creating it on first use.
    ///
    /// The map lock is released before the cell is initialized, so a scoped
    /// constructor may resolve other scoped keys from the same scope.
    pub(crate) fn cell(&self, key: &str) -> Arc<OnceCell<Instance>> {
        let mut cache = self.cache.lock();
        Arc::clone(
            cache
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }
}
