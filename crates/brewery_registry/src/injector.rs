//! Constructor-side access to the registry.

use crate::error::RegistryError;
use crate::registration::Instance;
use crate::registry::{Registry, RegistryHandle, downcast, resolve_entry};
use crate::scope::Scope;
use core::any::Any;
use hashbrown::HashMap;
use std::sync::Arc;

/// Handed to every constructor while it runs.
///
/// Declared dependencies are resolved before the constructor is called, so
/// [`get`](Self::get) on one of them never fails for lack of a registration.
/// Undeclared keys are resolved lazily through the same registry and scope.
pub struct Injector<'a> {
    registry: &'a Registry,
    scope: Option<&'a Scope>,
    /// Resolution path ending with the key under construction.
    path: Vec<String>,
    resolved: HashMap<String, Instance>,
}

impl<'a> Injector<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        scope: Option<&'a Scope>,
        path: Vec<String>,
        resolved: HashMap<String, Instance>,
    ) -> Self {
        Self {
            registry,
            scope,
            path,
            resolved,
        }
    }

    /// Returns the key currently being constructed.
    #[must_use]
    pub fn key(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    /// Returns the resolution path, outermost key first.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns the scope this resolution runs in, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope
    }

    /// Returns a weak handle to the registry, safe to keep inside singletons.
    #[must_use]
    pub fn handle(&self) -> RegistryHandle {
        self.registry.handle()
    }

    /// Resolves `key` as a type-erased instance.
    ///
    /// # Errors
    ///
    /// Returns any [`RegistryError`] raised while resolving `key`.
    pub fn instance(&self, key: &str) -> Result<Instance, RegistryError> {
        if let Some(instance) = self.resolved.get(key) {
            return Ok(Arc::clone(instance));
        }
        resolve_entry(self.registry, self.scope, key, &self.path)
    }

    /// Resolves `key` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TypeMismatch`] if `key` holds another type, or
    /// any error raised while resolving it.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        downcast(key, self.instance(key)?)
    }

    /// Resolves `key` as `T` and clones the value out.
    ///
    /// Convenient for registrations that store handles such as `Arc<dyn Trait>`.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Result<T, RegistryError> {
        self.get::<T>(key).map(|value| T::clone(&value))
    }
}

impl core::fmt::Debug for Injector<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Injector")
            .field("path", &self.path)
            .field("scoped", &self.scope.is_some())
            .finish()
    }
}
