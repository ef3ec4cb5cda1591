//! The assembled server and its transport handle.

use crate::http::{Context, Request, Response, error_response};
use crate::middleware::{Flow, Middleware};
use crate::router::Router;
use std::sync::Arc;
use tokio::time::Instant;

/// Router plus middleware, registered under the `server` key.
///
/// Every request runs the container middleware first (opening the request
/// scope), then the application middleware in declaration order, then the
/// router.
pub struct Server {
    router: Arc<Router>,
    container: Arc<dyn Middleware>,
    middleware: Vec<Arc<dyn Middleware>>,
    controllers: Vec<String>,
}

impl core::fmt::Debug for Server {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Server")
            .field("router", &self.router)
            .field("middleware", &self.middleware_names())
            .field("controllers", &self.controllers)
            .finish()
    }
}

impl Server {
    /// Creates a server from its router and scope-per-request middleware.
    #[must_use]
    pub fn new(router: Arc<Router>, container: Arc<dyn Middleware>) -> Self {
        Self {
            router,
            container,
            middleware: Vec::new(),
            controllers: Vec::new(),
        }
    }

    /// Appends application middleware.
    #[must_use]
    pub fn with_middleware(mut self, middleware: impl IntoIterator<Item = Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(middleware);
        self
    }

    /// Records the controllers the router was built over.
    #[must_use]
    pub fn with_controllers(mut self, controllers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.controllers.extend(controllers.into_iter().map(Into::into));
        self
    }

    /// The router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Application middleware names, in run order.
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&str> {
        self.middleware.iter().map(|middleware| middleware.name()).collect()
    }

    /// Controller keys.
    #[must_use]
    pub fn controllers(&self) -> &[String] {
        &self.controllers
    }

    /// Handles one request.
    pub async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();
        let mut ctx = Context::new(request);

        let response = 'chain: {
            for middleware in core::iter::once(&self.container).chain(&self.middleware) {
                match middleware.handle(&mut ctx).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Respond(response)) => break 'chain response,
                    Err(error) => {
                        tracing::warn!(middleware = %middleware.name(), error = %error, "middleware failed");
                        break 'chain error_response(error.as_ref());
                    }
                }
            }
            self.router.dispatch(ctx).await
        };

        tracing::debug!(
            method = %method,
            path = %path,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis(),
            "request handled"
        );
        response
    }

    /// A cloneable handle that feeds requests to this server.
    #[must_use]
    pub fn transport(self: &Arc<Self>) -> RequestHandler {
        RequestHandler {
            server: Arc::clone(self),
        }
    }
}

/// The server's transport handle, shared with adapters.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    server: Arc<Server>,
}

impl RequestHandler {
    /// Handles one request.
    pub async fn handle(&self, request: Request) -> Response {
        self.server.handle(request).await
    }

    /// The server behind this handle.
    #[must_use]
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::ScopePerRequest;
    use async_trait::async_trait;
    use brewery_registry::{BoxError, Registration, Registry};
    use serde_json::json;

    struct Gate;

    #[async_trait]
    impl Middleware for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn handle(&self, ctx: &mut Context) -> Result<Flow, BoxError> {
            if ctx.request.header("authorization").is_none() {
                return Ok(Flow::Respond(Response::error(401, "unauthorized")));
            }
            Ok(Flow::Continue)
        }
    }

    fn server(registry: &Registry) -> Arc<Server> {
        let mut router = Router::new();
        router.get("/whoami", |ctx: Context| async move {
            match ctx.resolve_as::<String>("currentUser") {
                Ok(user) => Ok(Response::ok(json!({ "user": user.as_str() }))),
                Err(error) => Err(BoxError::from(error)),
            }
        });
        let container: Arc<dyn Middleware> = Arc::new(ScopePerRequest::new(registry.handle()));
        Arc::new(
            Server::new(Arc::new(router), container)
                .with_middleware([Arc::new(Gate) as Arc<dyn Middleware>])
                .with_controllers(["users"]),
        )
    }

    #[tokio::test]
    async fn requests_pass_middleware_then_router() {
        let registry = Registry::builder()
            .with(
                "currentUser",
                Registration::scoped(Vec::<String>::new(), |_| Ok(String::from("ada"))),
            )
            .build();
        let transport = server(&registry).transport();

        let denied = transport.handle(Request::new("GET", "/whoami")).await;
        assert_eq!(denied.status, 401);

        let allowed = transport
            .handle(Request::new("GET", "/whoami").with_header("Authorization", "token"))
            .await;
        assert_eq!(allowed.status, 200);
        assert_eq!(allowed.body, json!({ "user": "ada" }));
    }

    #[test]
    fn reports_its_composition() {
        let registry = Registry::builder().build();
        let server = server(&registry);
        assert_eq!(server.middleware_names(), ["gate"]);
        assert_eq!(server.controllers(), ["users"]);
        assert_eq!(server.router().len(), 1);
    }
}
