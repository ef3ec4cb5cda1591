//! Boot orchestration for Brewery applications.
//!
//! An application is described twice: by manifests on disk, discovered from
//! the locations in [`BootConfig`], and by a [`ComponentCatalog`] that maps
//! each manifest's factory key to compiled code. [`Application::boot`] joins
//! the two, binds datasources and models, registers every component and
//! returns an [`Application`] exposing its [`Server`] and a
//! [`ServerlessAdapter`].
//!
//! # Registry keys
//!
//! | Key | Lifetime | Value |
//! |-----|----------|-------|
//! | `config` | value | `BootConfig` |
//! | use-case names | transient | catalog type |
//! | datasource names | value | `Arc<dyn DatasourceHandle>` |
//! | model names | value | `Arc<dyn Model>` |
//! | repository names | singleton | `BaseRepository` or catalog type |
//! | `containerMiddleware` | singleton | `Arc<dyn Middleware>` |
//! | middleware names | value | `Arc<dyn Middleware>` |
//! | controller names | singleton | catalog type |
//! | `router` | singleton | [`Router`] |
//! | `logger` | value | [`Logger`] |
//! | `server` | singleton | [`Server`] |

mod application;
mod catalog;
mod config;
mod error;
mod http;
mod logging;
mod manifest;
mod middleware;
mod router;
mod server;
mod serverless;

pub use application::{
    AppBuilder, Application, CONFIG_KEY, CONTAINER_MIDDLEWARE_KEY, LOGGER_KEY, ROUTER_KEY,
    SERVER_KEY,
};
pub use catalog::{ComponentCatalog, Recipe, RepositoryFactory, RouterFactory};
pub use config::{
    AppConfig, BootConfig, ConfigLoader, ConnectionConfig, ConnectionMode, DEFAULT_ENV_PREFIX,
    Sources,
};
pub use error::BootError;
pub use http::{Context, Request, Response};
pub use logging::{LogFormat, Logger, LoggingConfig, init_logging};
pub use middleware::{Flow, Middleware, ScopePerRequest};
pub use router::{Handler, Router};
pub use server::{RequestHandler, Server};
pub use serverless::{ServerlessAdapter, ServerlessEvent, ServerlessResponse};

/// Commonly used application types.
pub mod prelude {
    pub use crate::{
        AppBuilder, Application, BootConfig, BootError, ComponentCatalog, ConfigLoader, Context,
        Flow, Middleware, Request, Response, Router, Server, ServerlessAdapter,
    };
}
