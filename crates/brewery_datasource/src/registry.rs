//! Connector resolution.

use crate::connector::{Connector, ConnectorRef};
use crate::error::{BoxError, ConnectorError};
use crate::memory::MemoryConnector;
use std::collections::HashMap;
use std::sync::Arc;

/// Produces a fresh connector for a built-in key.
pub type ConnectorLoader = Arc<dyn Fn() -> Result<Arc<dyn Connector>, BoxError> + Send + Sync>;

/// Prefix accepted in front of built-in keys (`builtin-sql` is `sql`).
pub const BUILTIN_PREFIX: &str = "builtin-";

/// Resolves [`ConnectorRef`]s to connector instances.
///
/// The built-in table starts with:
///
/// | Key | Connector |
/// |-----|-----------|
/// | `memory` | [`MemoryConnector`] |
/// | `sql` | placeholder that fails to load until a SQL driver is registered |
///
/// Applications extend or override it with
/// [`register_builtin`](Self::register_builtin) before binding.
///
/// # Example
///
/// ```
/// use brewery_datasource::{ConnectorRef, ConnectorRegistry};
///
/// let registry = ConnectorRegistry::default();
/// let memory = registry.resolve(&ConnectorRef::from("memory")).unwrap();
/// assert_eq!(memory.name(), "memory");
///
/// assert!(registry.resolve(&ConnectorRef::from("builtin-sql")).is_err());
/// assert!(registry.resolve(&ConnectorRef::from("mongo")).is_err());
/// ```
#[derive(Clone)]
pub struct ConnectorRegistry {
    builtins: HashMap<String, ConnectorLoader>,
}

impl core::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("builtins", &self.builtin_names())
            .finish()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin("memory", || Ok(Arc::new(MemoryConnector::new()) as Arc<dyn Connector>));
        registry.register_builtin("sql", || {
            Err("no SQL driver registered; register one under the `sql` key".into())
        });
        registry
    }
}

impl ConnectorRegistry {
    /// Creates a registry with no built-ins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            builtins: HashMap::new(),
        }
    }

    /// Registers (or replaces) a built-in connector.
    ///
    /// The loader runs once per datasource that references `key`.
    pub fn register_builtin<F>(&mut self, key: impl AsRef<str>, loader: F) -> &mut Self
    where
        F: Fn() -> Result<Arc<dyn Connector>, BoxError> + Send + Sync + 'static,
    {
        let key = canonical(key.as_ref()).to_owned();
        if self.builtins.insert(key.clone(), Arc::new(loader)).is_some() {
            tracing::debug!(key = %key, "built-in connector replaced");
        }
        self
    }

    /// Returns `true` if `key` names a built-in.
    #[must_use]
    pub fn has_builtin(&self, key: &str) -> bool {
        self.builtins.contains_key(canonical(key))
    }

    /// Built-in keys, sorted.
    #[must_use]
    pub fn builtin_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.builtins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolves a reference to a connector. No I/O happens here.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::UnknownConnector`] for an unknown built-in key
    /// - [`ConnectorError::ConnectorLoad`] if a known built-in fails to load
    pub fn resolve(&self, reference: &ConnectorRef) -> Result<Arc<dyn Connector>, ConnectorError> {
        match reference {
            ConnectorRef::Instance(connector) => Ok(Arc::clone(connector)),
            ConnectorRef::Builtin(key) => {
                let loader = self.builtins.get(canonical(key)).ok_or_else(|| {
                    ConnectorError::UnknownConnector {
                        key: key.clone(),
                    }
                })?;
                loader().map_err(|source| {
                    tracing::error!(key = %key, error = %source, "unable to load built-in connector");
                    ConnectorError::ConnectorLoad {
                        key: key.clone(),
                        source,
                    }
                })
            }
        }
    }
}

fn canonical(key: &str) -> &str {
    key.strip_prefix(BUILTIN_PREFIX).unwrap_or(key)
}
