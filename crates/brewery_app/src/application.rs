//! Boot orchestration.
//!
//! Boot runs in fixed phases:
//!
//! 1. **Discover** every source location concurrently.
//! 2. **Link** manifests to catalog factories. Nothing is connected yet.
//! 3. **Bind** datasources and models; connects start here.
//! 4. **Register** everything in the dependency registry, in the order
//!    `config`, use-cases, datasources, models, repositories,
//!    `containerMiddleware`, middleware, controllers, `router`, `logger`,
//!    `server`.
//! 5. **Validate** the registry graph and resolve the server.
//! 6. **Settle** pending connections under the configured policy.
//!
//! Any failure after binding disconnects every datasource before the error is
//! returned.

use crate::catalog::ComponentCatalog;
use crate::config::BootConfig;
use crate::error::BootError;
use crate::logging::Logger;
use crate::manifest::{self, Linked};
use crate::middleware::{Middleware, ScopePerRequest};
use crate::router::Router;
use crate::server::Server;
use crate::serverless::ServerlessAdapter;
use brewery_datasource::{
    Binding, Connector, ConnectorRegistry, DatasourceBinder, DatasourceHandle, Model, ModelMap,
    disconnect_all,
};
use brewery_loader::{ComponentDescriptor, ComponentKind, ComponentLoader, Discovered, FsLoader};
use brewery_registry::{BoxError, Constructor, Injector, Instance, Lifetime, Registration, Registry};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Registry key of the boot configuration.
pub const CONFIG_KEY: &str = "config";
/// Registry key of the per-request scope middleware.
pub const CONTAINER_MIDDLEWARE_KEY: &str = "containerMiddleware";
/// Registry key of the router.
pub const ROUTER_KEY: &str = "router";
/// Registry key of the logger.
pub const LOGGER_KEY: &str = "logger";
/// Registry key of the server.
pub const SERVER_KEY: &str = "server";

const NO_DEPENDENCIES: [&str; 0] = [];

fn constructor<F>(construct: F) -> Constructor
where
    F: Fn(&Injector<'_>) -> Result<Instance, BoxError> + Send + Sync + 'static,
{
    Arc::new(construct)
}

// ─────────────────────────────────────────────────────────────────────────────
// AppBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Configures and boots an [`Application`].
///
/// # Example
///
/// ```no_run
/// use brewery_app::{Application, BootConfig, ComponentCatalog};
///
/// # async fn run() -> Result<(), brewery_app::BootError> {
/// let app = Application::builder(BootConfig::default())
///     .catalog(ComponentCatalog::new())
///     .boot()
///     .await?;
/// let adapter = app.serverless_adapter();
/// # drop(adapter);
/// app.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct AppBuilder {
    config: BootConfig,
    catalog: ComponentCatalog,
    connectors: ConnectorRegistry,
    loader: Option<Arc<dyn ComponentLoader>>,
}

impl core::fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppBuilder")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("connectors", &self.connectors)
            .field("custom_loader", &self.loader.is_some())
            .finish()
    }
}

impl AppBuilder {
    fn new(config: BootConfig) -> Self {
        Self {
            config,
            catalog: ComponentCatalog::default(),
            connectors: ConnectorRegistry::default(),
            loader: None,
        }
    }

    /// Sets the component catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: ComponentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replaces the built-in connector table.
    #[must_use]
    pub fn connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = connectors;
        self
    }

    /// Uses `loader` instead of a filesystem loader rooted at
    /// [`BootConfig::root`].
    #[must_use]
    pub fn loader(mut self, loader: impl ComponentLoader) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Boots the application.
    ///
    /// Must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the first [`BootError`] raised by any phase. No partial
    /// application is returned.
    pub async fn boot(self) -> Result<Application, BootError> {
        let started = Instant::now();
        let logger = Logger::init(&self.config.logging);
        let config = Arc::new(self.config);
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FsLoader::new(config.root())) as Arc<dyn ComponentLoader>);

        let sources = discover(&loader, &config).await?;
        let linked = link(&self.catalog, sources)?;
        tracing::debug!(
            datasources = linked.datasources.len(),
            models = linked.models.len(),
            use_cases = linked.use_cases.len(),
            repositories = linked.repositories.len(),
            middleware = linked.middleware.len(),
            controllers = linked.controllers.len(),
            "components linked"
        );

        let Linked {
            datasources,
            models,
            use_cases,
            repositories,
            middleware,
            controllers,
            router,
        } = linked;
        let Binding {
            datasources,
            connectors,
            models,
            connections,
        } = DatasourceBinder::new(&self.connectors).bind(datasources, models).await?;

        let assembled = assemble(Assembly {
            config: Arc::clone(&config),
            logger,
            use_cases,
            datasources: &datasources,
            models: &models,
            repositories,
            middleware,
            controllers,
            router,
        });
        let (registry, server) = match assembled {
            Ok(assembled) => assembled,
            Err(error) => {
                tracing::error!(error = %error, "boot failed, releasing datasources");
                connections.abort();
                disconnect_all(&connectors).await;
                return Err(error);
            }
        };

        if let Err(error) = connections.settle(config.app.connection.policy()).await {
            tracing::error!(error = %error, "datasource connection failed, releasing datasources");
            disconnect_all(&connectors).await;
            return Err(BootError::Connection(error));
        }

        tracing::info!(
            registrations = registry.len(),
            routes = server.router().len(),
            elapsed_ms = started.elapsed().as_millis(),
            "application booted"
        );
        Ok(Application {
            config,
            registry,
            server,
            models,
            datasources,
            connectors,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Raw descriptors per kind.
struct Sources {
    use_cases: IndexMap<String, ComponentDescriptor>,
    datasources: Vec<ComponentDescriptor>,
    models: Vec<ComponentDescriptor>,
    repositories: IndexMap<String, ComponentDescriptor>,
    middleware: IndexMap<String, ComponentDescriptor>,
    controllers: IndexMap<String, ComponentDescriptor>,
    router: Option<ComponentDescriptor>,
}

async fn discover_kind(
    loader: &Arc<dyn ComponentLoader>,
    kind: ComponentKind,
    locations: &[String],
) -> Result<Discovered, BootError> {
    let loader = Arc::clone(loader);
    let locations = locations.to_vec();
    let discovered = tokio::task::spawn_blocking(move || loader.discover_kind(kind, &locations)).await??;
    tracing::debug!(kind = %kind, count = discovered.len(), "definitions discovered");
    Ok(discovered)
}

async fn discover_router(
    loader: &Arc<dyn ComponentLoader>,
    location: Option<&str>,
) -> Result<Option<ComponentDescriptor>, BootError> {
    let Some(location) = location.map(str::to_owned) else {
        return Ok(None);
    };
    let loader = Arc::clone(loader);
    let descriptor =
        tokio::task::spawn_blocking(move || loader.load_single(ComponentKind::Router, &location)).await??;
    Ok(Some(descriptor))
}

async fn discover(loader: &Arc<dyn ComponentLoader>, config: &BootConfig) -> Result<Sources, BootError> {
    let sources = &config.app.sources;
    let (use_cases, datasources, models, repositories, middleware, controllers, router) = tokio::try_join!(
        discover_kind(loader, ComponentKind::UseCase, &sources.app),
        discover_kind(loader, ComponentKind::DatasourceSpec, &sources.data_source),
        discover_kind(loader, ComponentKind::ModelDefinition, &sources.model),
        discover_kind(loader, ComponentKind::Repository, &sources.repository),
        discover_kind(loader, ComponentKind::Middleware, &sources.middleware),
        discover_kind(loader, ComponentKind::Controller, &sources.controller),
        discover_router(loader, sources.router.as_deref()),
    )?;

    Ok(Sources {
        use_cases: use_cases.into_keyed(),
        datasources: datasources.into_sequence(),
        models: models.into_sequence(),
        repositories: repositories.into_keyed(),
        middleware: middleware.into_keyed(),
        controllers: controllers.into_keyed(),
        router,
    })
}

fn link(catalog: &ComponentCatalog, sources: Sources) -> Result<Linked, BootError> {
    Ok(Linked {
        datasources: sources
            .datasources
            .iter()
            .map(|descriptor| manifest::datasource(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        models: sources
            .models
            .iter()
            .map(|descriptor| manifest::model(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        use_cases: sources
            .use_cases
            .values()
            .map(|descriptor| manifest::use_case(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        repositories: sources
            .repositories
            .values()
            .map(|descriptor| manifest::repository(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        middleware: sources
            .middleware
            .values()
            .map(|descriptor| manifest::middleware(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        controllers: sources
            .controllers
            .values()
            .map(|descriptor| manifest::controller(descriptor, catalog))
            .collect::<Result<_, _>>()?,
        router: sources
            .router
            .as_ref()
            .map(|descriptor| manifest::router(descriptor, catalog))
            .transpose()?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

struct Assembly<'b> {
    config: Arc<BootConfig>,
    logger: Logger,
    use_cases: Vec<manifest::LinkedUnit>,
    datasources: &'b IndexMap<String, Arc<dyn DatasourceHandle>>,
    models: &'b ModelMap,
    repositories: Vec<manifest::LinkedRepository>,
    middleware: Vec<(String, Arc<dyn Middleware>)>,
    controllers: Vec<manifest::LinkedUnit>,
    router: Option<crate::catalog::RouterFactory>,
}

fn assemble(assembly: Assembly<'_>) -> Result<(Registry, Arc<Server>), BootError> {
    let mut builder = Registry::builder();

    builder.register(CONFIG_KEY, Registration::shared(assembly.config));

    for unit in assembly.use_cases {
        builder.register(
            unit.key,
            Registration::from_constructor(Lifetime::Transient, unit.recipe.dependencies, unit.recipe.construct),
        );
    }

    for (name, handle) in assembly.datasources {
        builder.register(name.as_str(), Registration::value(Arc::clone(handle)));
    }

    for (name, model) in assembly.models {
        builder.register(name.as_str(), Registration::value(Arc::clone(model)));
    }

    for repository in assembly.repositories {
        let model = repository.model.clone();
        let factory = repository.factory;
        builder.register(
            repository.key,
            Registration::from_constructor(
                Lifetime::Singleton,
                [repository.model],
                constructor(move |inj| {
                    let bound = inj.get_cloned::<Arc<dyn Model>>(&model)?;
                    factory(bound)
                }),
            ),
        );
    }

    builder.register(
        CONTAINER_MIDDLEWARE_KEY,
        Registration::singleton(NO_DEPENDENCIES, |inj| {
            Ok(Arc::new(ScopePerRequest::new(inj.handle())) as Arc<dyn Middleware>)
        }),
    );

    let middleware_keys: Vec<String> = assembly.middleware.iter().map(|(key, _)| key.clone()).collect();
    for (key, middleware) in assembly.middleware {
        builder.register(key, Registration::value(middleware));
    }

    let controller_keys: Vec<String> = assembly.controllers.iter().map(|unit| unit.key.clone()).collect();
    for unit in assembly.controllers {
        builder.register(
            unit.key,
            Registration::from_constructor(Lifetime::Singleton, unit.recipe.dependencies, unit.recipe.construct),
        );
    }

    let router = match assembly.router {
        Some(factory) => Registration::singleton(controller_keys.clone(), move |inj| factory(inj)),
        None => Registration::value(Router::new()),
    };
    builder.register(ROUTER_KEY, router);

    builder.register(LOGGER_KEY, Registration::value(assembly.logger));

    let mut server_dependencies = vec![
        ROUTER_KEY.to_owned(),
        CONTAINER_MIDDLEWARE_KEY.to_owned(),
        LOGGER_KEY.to_owned(),
    ];
    server_dependencies.extend(middleware_keys.iter().cloned());
    server_dependencies.extend(controller_keys.iter().cloned());
    builder.register(
        SERVER_KEY,
        Registration::singleton(server_dependencies, move |inj| {
            let router = inj.get::<Router>(ROUTER_KEY)?;
            let container = inj.get_cloned::<Arc<dyn Middleware>>(CONTAINER_MIDDLEWARE_KEY)?;
            let middleware = middleware_keys
                .iter()
                .map(|key| inj.get_cloned::<Arc<dyn Middleware>>(key))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Server::new(router, container)
                .with_middleware(middleware)
                .with_controllers(controller_keys.iter().cloned()))
        }),
    );

    let registry = builder.build();
    registry.validate()?;
    let server = registry.resolve_as::<Server>(SERVER_KEY)?;
    Ok((registry, server))
}

// ─────────────────────────────────────────────────────────────────────────────
// Application
// ─────────────────────────────────────────────────────────────────────────────

/// A booted application.
pub struct Application {
    config: Arc<BootConfig>,
    registry: Registry,
    server: Arc<Server>,
    models: ModelMap,
    datasources: IndexMap<String, Arc<dyn DatasourceHandle>>,
    connectors: IndexMap<String, Arc<dyn Connector>>,
}

impl core::fmt::Debug for Application {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Application")
            .field("registrations", &self.registry.len())
            .field("server", &self.server)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("datasources", &self.datasources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Application {
    /// Starts configuring an application.
    #[must_use]
    pub fn builder(config: BootConfig) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// Boots with the default connectors and a filesystem loader.
    ///
    /// # Errors
    ///
    /// See [`AppBuilder::boot`].
    pub async fn boot(config: BootConfig, catalog: ComponentCatalog) -> Result<Self, BootError> {
        Self::builder(config).catalog(catalog).boot().await
    }

    /// The assembled server.
    #[must_use]
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// An adapter feeding platform events to the server.
    #[must_use]
    pub fn serverless_adapter(&self) -> ServerlessAdapter {
        ServerlessAdapter::new(self.server.transport())
    }

    /// The dependency registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every bound model.
    #[must_use]
    pub fn models(&self) -> &ModelMap {
        &self.models
    }

    /// Datasource handles by name.
    #[must_use]
    pub fn datasources(&self) -> &IndexMap<String, Arc<dyn DatasourceHandle>> {
        &self.datasources
    }

    /// The configuration the application booted with.
    #[must_use]
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Disconnects every datasource, newest first.
    pub async fn shutdown(self) {
        disconnect_all(&self.connectors).await;
        tracing::info!("application stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(kind: ComponentKind, file: &str) -> ComponentDescriptor {
        ComponentDescriptor::new(kind, format!("/app/{file}"), json!({}))
    }

    fn keyed(descriptors: impl IntoIterator<Item = ComponentDescriptor>) -> IndexMap<String, ComponentDescriptor> {
        descriptors
            .into_iter()
            .map(|descriptor| (descriptor.key().to_owned(), descriptor))
            .collect()
    }

    fn sources(controllers: IndexMap<String, ComponentDescriptor>) -> Sources {
        Sources {
            use_cases: keyed([descriptor(ComponentKind::UseCase, "listUsers.toml")]),
            datasources: Vec::new(),
            models: Vec::new(),
            repositories: IndexMap::new(),
            middleware: IndexMap::new(),
            controllers,
            router: None,
        }
    }

    struct ListUsers;

    #[test]
    fn link_resolves_catalog_factories() {
        let mut catalog = ComponentCatalog::new();
        catalog.use_case("listUsers", NO_DEPENDENCIES, |_| Ok(ListUsers));

        let linked = link(&catalog, sources(IndexMap::new())).unwrap();
        assert_eq!(linked.use_cases.len(), 1);
        assert_eq!(linked.use_cases[0].key, "listUsers");
        assert!(linked.controllers.is_empty());
        assert!(linked.router.is_none());
    }

    #[test]
    fn link_rejects_a_missing_factory() {
        let mut catalog = ComponentCatalog::new();
        catalog.use_case("listUsers", NO_DEPENDENCIES, |_| Ok(ListUsers));

        let controllers = keyed([descriptor(ComponentKind::Controller, "users.toml")]);
        let err = link(&catalog, sources(controllers)).err().unwrap();
        assert!(matches!(
            err,
            BootError::MissingFactory { kind: ComponentKind::Controller, ref key, .. } if key == "users"
        ));
    }
}
