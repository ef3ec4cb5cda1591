//! The registry builder and the frozen registry.

use crate::error::RegistryError;
use crate::injector::Injector;
use crate::registration::{Constructor, Instance, Lifetime, Registration, Resolver};
use crate::scope::Scope;
use core::any::Any;
use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};

// ─────────────────────────────────────────────────────────────────────────────
// RegistryBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects registrations before the registry is frozen.
///
/// Registering a key twice replaces the earlier registration. Once
/// [`build`](Self::build) is called no further registrations are possible.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: IndexMap<String, Registration>,
}

impl core::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `registration` under `key`, replacing any earlier one.
    pub fn register(&mut self, key: impl Into<String>, registration: Registration) -> &mut Self {
        let key = key.into();
        if let Some(previous) = self.entries.insert(key.clone(), registration) {
            tracing::debug!(
                key = %key,
                previous = %previous.lifetime(),
                "registration replaced"
            );
        }
        self
    }

    /// Chaining variant of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, registration: Registration) -> Self {
        self.register(key, registration);
        self
    }

    /// Returns `true` if `key` has been registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freezes the registrations into a [`Registry`].
    #[must_use]
    pub fn build(self) -> Registry {
        let entries = self
            .entries
            .into_iter()
            .map(|(key, registration)| {
                let entry = Entry {
                    registration,
                    singleton: OnceCell::new(),
                };
                (key, entry)
            })
            .collect();

        Registry {
            inner: Arc::new(RegistryInner { entries }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

struct Entry {
    registration: Registration,
    singleton: OnceCell<Instance>,
}

pub(crate) struct RegistryInner {
    entries: IndexMap<String, Entry>,
}

/// A frozen set of registrations.
///
/// Cloning is cheap and every clone shares the same singleton cache.
/// Singleton and value resolution is safe from any number of threads; each
/// singleton is constructed exactly once, guarded by its own cell rather than
/// a registry-wide lock.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Starts a new [`RegistryBuilder`].
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Resolves `key` outside of any scope.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Unresolved`] if `key` or one of its dependencies is unknown
    /// - [`RegistryError::ScopeRequired`] if `key` (or a dependency) is scoped
    /// - [`RegistryError::CyclicDependency`] if construction loops back on itself
    /// - [`RegistryError::Construction`] if a constructor fails
    pub fn resolve(&self, key: &str) -> Result<Instance, RegistryError> {
        resolve_entry(self, None, key, &[])
    }

    /// Resolves `key` as `T`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve), plus [`RegistryError::TypeMismatch`].
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        downcast(key, self.resolve(key)?)
    }

    /// Resolves `key` as `T` and clones the value out.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_as`](Self::resolve_as).
    pub fn resolve_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Result<T, RegistryError> {
        self.resolve_as::<T>(key).map(|value| T::clone(&value))
    }

    /// Opens a new resolution scope.
    #[must_use]
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Returns a weak handle that does not keep the registry alive.
    #[must_use]
    pub fn handle(&self) -> RegistryHandle {
        RegistryHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns `true` if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.keys().map(String::as_str)
    }

    /// Number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns the lifetime registered for `key`.
    #[must_use]
    pub fn lifetime(&self, key: &str) -> Option<Lifetime> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.registration.lifetime())
    }

    /// Returns the declared dependencies of `key`.
    #[must_use]
    pub fn dependencies(&self, key: &str) -> Option<&[String]> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.registration.dependencies())
    }

    /// Checks every declared dependency without constructing anything.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError::Unresolved`] or
    /// [`RegistryError::CyclicDependency`] found, walking keys in
    /// registration order.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (key, entry) in &self.inner.entries {
            if let Some(missing) = entry
                .registration
                .dependencies()
                .iter()
                .find(|dependency| !self.contains(dependency))
            {
                return Err(RegistryError::unresolved(missing.as_str(), Some(key)));
            }
        }

        let mut done = HashSet::new();
        for key in self.inner.entries.keys() {
            let mut path = Vec::new();
            self.visit(key, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn visit<'k>(
        &'k self,
        key: &'k str,
        path: &mut Vec<&'k str>,
        done: &mut HashSet<&'k str>,
    ) -> Result<(), RegistryError> {
        if done.contains(key) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|k| *k == key) {
            let mut cycle: Vec<String> = path[start..].iter().map(|k| (*k).to_owned()).collect();
            cycle.push(key.to_owned());
            return Err(RegistryError::CyclicDependency { path: cycle });
        }

        path.push(key);
        if let Some(entry) = self.inner.entries.get(key) {
            for dependency in entry.registration.dependencies() {
                self.visit(dependency, path, done)?;
            }
        }
        path.pop();
        done.insert(key);
        Ok(())
    }
}

/// A weak reference to a [`Registry`].
///
/// Singletons that need registry access after construction (routers,
/// per-request scope middleware) hold this instead of a [`Registry`] so the
/// registry and its cached singletons do not keep each other alive.
#[derive(Clone)]
pub struct RegistryHandle {
    inner: Weak<RegistryInner>,
}

impl core::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl RegistryHandle {
    /// Upgrades to a strong [`Registry`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::RegistryDropped`] if the registry is gone.
    pub fn upgrade(&self) -> Result<Registry, RegistryError> {
        self.inner
            .upgrade()
            .map(|inner| Registry { inner })
            .ok_or(RegistryError::RegistryDropped)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn downcast<T: Any + Send + Sync>(
    key: &str,
    instance: Instance,
) -> Result<Arc<T>, RegistryError> {
    instance
        .downcast::<T>()
        .map_err(|_| RegistryError::TypeMismatch {
            key: key.to_owned(),
            expected: core::any::type_name::<T>(),
        })
}

/// Resolves `key`, with `path` holding the keys currently under construction.
///
/// The cycle check runs before any cell is touched, so a self-dependent
/// singleton fails instead of blocking on its own initialization.
pub(crate) fn resolve_entry(
    registry: &Registry,
    scope: Option<&Scope>,
    key: &str,
    path: &[String],
) -> Result<Instance, RegistryError> {
    if let Some(start) = path.iter().position(|k| k == key) {
        let mut cycle = path[start..].to_vec();
        cycle.push(key.to_owned());
        return Err(RegistryError::CyclicDependency { path: cycle });
    }

    let entry = registry
        .inner
        .entries
        .get(key)
        .ok_or_else(|| RegistryError::unresolved(key, path.last().map(String::as_str)))?;

    let (dependencies, construct) = match &entry.registration.resolver {
        Resolver::Value(value) => return Ok(Arc::clone(value)),
        Resolver::Factory {
            dependencies,
            construct,
        } => (dependencies.as_slice(), construct),
    };

    match entry.registration.lifetime() {
        // Singletons never see the caller's scope.
        Lifetime::Singleton => entry
            .singleton
            .get_or_try_init(|| construct_with(registry, None, key, path, dependencies, construct))
            .map(Arc::clone),
        Lifetime::Scoped => {
            let scope = scope.ok_or_else(|| RegistryError::ScopeRequired {
                key: key.to_owned(),
            })?;
            scope
                .cell(key)
                .get_or_try_init(|| {
                    construct_with(registry, Some(scope), key, path, dependencies, construct)
                })
                .map(Arc::clone)
        }
        Lifetime::Transient | Lifetime::Value => {
            construct_with(registry, scope, key, path, dependencies, construct)
        }
    }
}

fn construct_with(
    registry: &Registry,
    scope: Option<&Scope>,
    key: &str,
    path: &[String],
    dependencies: &[String],
    construct: &Constructor,
) -> Result<Instance, RegistryError> {
    let mut next = Vec::with_capacity(path.len() + 1);
    next.extend_from_slice(path);
    next.push(key.to_owned());

    let mut resolved = HashMap::with_capacity(dependencies.len());
    for dependency in dependencies {
        let instance = resolve_entry(registry, scope, dependency, &next)?;
        resolved.insert(dependency.clone(), instance);
    }

    tracing::trace!(key, depth = path.len(), "constructing registration");
    let injector = Injector::new(registry, scope, next, resolved);
    construct(&injector).map_err(|error| RegistryError::from_constructor(key, error))
}
