//! Path routing.

use crate::http::{Context, Response, error_response};
use brewery_registry::BoxError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A route handler.
pub type Handler = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<Response, BoxError>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

struct Route {
    method: String,
    pattern: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn capture(&self, path: &[&str]) -> Option<BTreeMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_owned());
                }
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|part| !part.is_empty()).collect()
}

/// Maps method and path patterns to handlers.
///
/// Patterns are `/`-separated; a segment starting with `:` captures that
/// path segment under its name. Routes are tried in registration order.
///
/// # Example
///
/// ```
/// use brewery_app::{Context, Response, Router};
/// use serde_json::json;
///
/// let mut router = Router::new();
/// router.get("/users/:id", |ctx: Context| async move {
///     let id = ctx.request.param("id").unwrap_or_default().to_owned();
///     Ok(Response::ok(json!({ "id": id })))
/// });
/// assert_eq!(router.routes().collect::<Vec<_>>(), [("GET", "/users/:id")]);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl core::fmt::Debug for Router {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.routes()).finish()
    }
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    pub fn route<F, Fut>(&mut self, method: &str, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        let segments = split(pattern)
            .into_iter()
            .map(|part| match part.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Literal(part.to_owned()),
            })
            .collect();
        self.routes.push(Route {
            method: method.to_ascii_uppercase(),
            pattern: pattern.to_owned(),
            segments,
            handler: Arc::new(move |ctx| handler(ctx).boxed()),
        });
        self
    }

    /// Adds a `GET` route.
    pub fn get<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.route("GET", pattern, handler)
    }

    /// Adds a `POST` route.
    pub fn post<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.route("POST", pattern, handler)
    }

    /// Adds a `PUT` route.
    pub fn put<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.route("PUT", pattern, handler)
    }

    /// Adds a `PATCH` route.
    pub fn patch<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.route("PATCH", pattern, handler)
    }

    /// Adds a `DELETE` route.
    pub fn delete<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, BoxError>> + Send + 'static,
    {
        self.route("DELETE", pattern, handler)
    }

    /// `(method, pattern)` for every route, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|route| (route.method.as_str(), route.pattern.as_str()))
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the handler matching the request.
    ///
    /// Unknown paths get `404`, known paths with another method `405`.
    /// Handler errors become error responses.
    pub async fn dispatch(&self, mut ctx: Context) -> Response {
        let path = split(&ctx.request.path);
        let mut path_matched = false;

        for route in &self.routes {
            let Some(params) = route.capture(&path) else {
                continue;
            };
            if route.method != ctx.request.method {
                path_matched = true;
                continue;
            }
            ctx.request.params = params;
            let handler = Arc::clone(&route.handler);
            return match handler(ctx).await {
                Ok(response) => response,
                Err(error) => error_response(error.as_ref()),
            };
        }

        if path_matched {
            Response::error(405, format!("method {} not allowed", ctx.request.method))
        } else {
            Response::error(404, format!("no route for {}", ctx.request.path))
        }
    }
}
