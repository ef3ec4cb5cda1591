//! Compiled component factories.
//!
//! Manifests on disk say *which* components an application has; the
//! [`ComponentCatalog`] supplies the code behind them. Each manifest names a
//! factory key (defaulting to its unit name) that must be present here.

use crate::middleware::Middleware;
use crate::router::Router;
use brewery_datasource::{BaseRepository, Connector, DatasourceHandle, DefineFn, Model, TypeDescriptors};
use brewery_loader::ComponentKind;
use brewery_registry::{BoxError, Constructor, Injector, Instance};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a repository over its bound model.
pub type RepositoryFactory = Arc<dyn Fn(Arc<dyn Model>) -> Result<Instance, BoxError> + Send + Sync>;

/// Builds the router, with registry access.
pub type RouterFactory = Arc<dyn Fn(&Injector<'_>) -> Result<Router, BoxError> + Send + Sync>;

/// A constructor plus the registry keys it depends on.
#[derive(Clone)]
pub struct Recipe {
    /// Keys resolved before the constructor runs.
    pub dependencies: Vec<String>,
    /// The type-erased constructor.
    pub construct: Constructor,
}

impl core::fmt::Debug for Recipe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Recipe")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl Recipe {
    fn new<T, F, D>(dependencies: D, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            construct: Arc::new(move |inj: &Injector<'_>| {
                construct(inj).map(|value| Arc::new(value) as Instance)
            }),
        }
    }
}

/// Factories for every component kind, keyed by factory name.
///
/// # Example
///
/// ```
/// use brewery_app::{ComponentCatalog, Router};
/// use brewery_datasource::{BaseRepository, MemoryModel, Model};
/// use std::sync::Arc;
///
/// struct ListUsers {
///     users: Arc<BaseRepository>,
/// }
///
/// let mut catalog = ComponentCatalog::new();
/// catalog
///     .model("User", |handle, _types| {
///         Ok(Arc::new(MemoryModel::define("User", handle)?) as Arc<dyn Model>)
///     })
///     .use_case("listUsers", ["userRepository"], |inj| {
///         Ok(ListUsers { users: inj.get::<BaseRepository>("userRepository")? })
///     })
///     .router("router", |_inj| Ok(Router::new()));
///
/// assert_eq!(catalog.keys(brewery_loader::ComponentKind::UseCase), ["listUsers"]);
/// ```
#[derive(Clone, Default)]
pub struct ComponentCatalog {
    pub(crate) use_cases: HashMap<String, Recipe>,
    pub(crate) controllers: HashMap<String, Recipe>,
    pub(crate) middleware: HashMap<String, Arc<dyn Middleware>>,
    pub(crate) repositories: HashMap<String, RepositoryFactory>,
    pub(crate) models: HashMap<String, DefineFn>,
    pub(crate) connectors: HashMap<String, Arc<dyn Connector>>,
    pub(crate) routers: HashMap<String, RouterFactory>,
}

impl core::fmt::Debug for ComponentCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ComponentCatalog")
            .field("use_cases", &self.keys(ComponentKind::UseCase))
            .field("controllers", &self.keys(ComponentKind::Controller))
            .field("middleware", &self.keys(ComponentKind::Middleware))
            .field("repositories", &self.keys(ComponentKind::Repository))
            .field("models", &self.keys(ComponentKind::ModelDefinition))
            .field("connectors", &self.keys(ComponentKind::DatasourceSpec))
            .field("routers", &self.keys(ComponentKind::Router))
            .finish()
    }
}

impl ComponentCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a use-case constructor. Use-cases are built on every resolution.
    pub fn use_case<T, F, D>(&mut self, key: impl Into<String>, dependencies: D, construct: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        self.use_cases.insert(key.into(), Recipe::new(dependencies, construct));
        self
    }

    /// Adds a controller constructor. Controllers are singletons.
    pub fn controller<T, F, D>(&mut self, key: impl Into<String>, dependencies: D, construct: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        self.controllers.insert(key.into(), Recipe::new(dependencies, construct));
        self
    }

    /// Adds a middleware instance.
    pub fn middleware<M: Middleware>(&mut self, key: impl Into<String>, middleware: M) -> &mut Self {
        self.middleware.insert(key.into(), Arc::new(middleware));
        self
    }

    /// Adds a repository factory. Repositories without one use
    /// [`BaseRepository`].
    pub fn repository<T, F>(&mut self, key: impl Into<String>, construct: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<dyn Model>) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.repositories.insert(
            key.into(),
            Arc::new(move |model| construct(model).map(|value| Arc::new(value) as Instance)),
        );
        self
    }

    /// Adds a model `define` function.
    pub fn model<F>(&mut self, key: impl Into<String>, define: F) -> &mut Self
    where
        F: Fn(&Arc<dyn DatasourceHandle>, &TypeDescriptors) -> Result<Arc<dyn Model>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.models.insert(key.into(), Arc::new(define));
        self
    }

    /// Adds a connector instance, referenced from datasource manifests as
    /// `connector = { instance = "key" }`.
    pub fn connector<C: Connector>(&mut self, key: impl Into<String>, connector: C) -> &mut Self {
        self.connectors.insert(key.into(), Arc::new(connector));
        self
    }

    /// Adds a router factory.
    pub fn router<F>(&mut self, key: impl Into<String>, build: F) -> &mut Self
    where
        F: Fn(&Injector<'_>) -> Result<Router, BoxError> + Send + Sync + 'static,
    {
        self.routers.insert(key.into(), Arc::new(build));
        self
    }

    /// Factory keys registered for `kind`, sorted. Connector instances are
    /// listed under [`ComponentKind::DatasourceSpec`].
    #[must_use]
    pub fn keys(&self, kind: ComponentKind) -> Vec<&str> {
        let mut keys: Vec<&str> = match kind {
            ComponentKind::UseCase => self.use_cases.keys().map(String::as_str).collect(),
            ComponentKind::Controller => self.controllers.keys().map(String::as_str).collect(),
            ComponentKind::Middleware => self.middleware.keys().map(String::as_str).collect(),
            ComponentKind::Repository => self.repositories.keys().map(String::as_str).collect(),
            ComponentKind::ModelDefinition => self.models.keys().map(String::as_str).collect(),
            ComponentKind::DatasourceSpec => self.connectors.keys().map(String::as_str).collect(),
            ComponentKind::Router => self.routers.keys().map(String::as_str).collect(),
        };
        keys.sort_unstable();
        keys
    }
}

/// The factory used for repositories that do not name one.
pub(crate) fn base_repository() -> RepositoryFactory {
    Arc::new(|model| Ok(Arc::new(BaseRepository::new(model)) as Instance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewery_datasource::{MemoryConnector, MemoryDatabase, SyncMode};

    #[test]
    fn keys_are_listed_per_kind() {
        let mut catalog = ComponentCatalog::new();
        catalog
            .controller("users", Vec::<String>::new(), |_| Ok(()))
            .controller("posts", Vec::<String>::new(), |_| Ok(()))
            .connector("primary", MemoryConnector::new());

        assert_eq!(catalog.keys(ComponentKind::Controller), ["posts", "users"]);
        assert_eq!(catalog.keys(ComponentKind::DatasourceSpec), ["primary"]);
        assert!(catalog.keys(ComponentKind::Router).is_empty());
    }

    #[test]
    fn base_repository_wraps_the_model() {
        let handle: Arc<dyn DatasourceHandle> = Arc::new(MemoryDatabase::new(SyncMode::Off));
        let model: Arc<dyn Model> =
            Arc::new(brewery_datasource::MemoryModel::define("User", &handle).unwrap());

        let instance = base_repository()(Arc::clone(&model)).unwrap();
        let repository = instance.downcast::<BaseRepository>().unwrap();
        assert!(Arc::ptr_eq(repository.model(), &model));
    }
}
