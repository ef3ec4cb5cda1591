//! Request middleware.

use crate::http::{Context, Response};
use async_trait::async_trait;
use brewery_registry::{BoxError, RegistryHandle};
use std::sync::Arc;

/// What a middleware decided.
#[derive(Debug)]
pub enum Flow {
    /// Hand the request to the next middleware, then the router.
    Continue,
    /// Answer immediately.
    Respond(Response),
}

/// A hook run for every request before routing.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Inspects or adjusts the request.
    ///
    /// # Errors
    ///
    /// An error is turned into an error response and stops the request.
    async fn handle(&self, ctx: &mut Context) -> Result<Flow, BoxError>;
}

impl core::fmt::Debug for dyn Middleware {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Middleware({})", self.name())
    }
}

/// Opens one registry scope per request.
///
/// Registered under `containerMiddleware` and always run first, so scoped
/// registrations resolved by later middleware and handlers share one cache
/// for the request and are dropped with it.
#[derive(Debug, Clone)]
pub struct ScopePerRequest {
    registry: RegistryHandle,
}

impl ScopePerRequest {
    /// Creates the middleware over a registry handle.
    #[must_use]
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Middleware for ScopePerRequest {
    fn name(&self) -> &str {
        "containerMiddleware"
    }

    async fn handle(&self, ctx: &mut Context) -> Result<Flow, BoxError> {
        let scope = self.registry.upgrade()?.create_scope();
        tracing::trace!(scope = scope.id(), path = %ctx.request.path, "request scope opened");
        ctx.set_scope(Arc::new(scope));
        Ok(Flow::Continue)
    }
}
