//! Transport-neutral request and response types.

use brewery_datasource::RepositoryError;
use brewery_registry::{RegistryError, Scope};
use core::any::Any;
use core::error::Error;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An incoming request.
///
/// Header names are stored lowercase. `params` is filled by the
/// [`Router`](crate::Router) from `:param` path segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// Uppercase HTTP method.
    pub method: String,
    /// Path without query string.
    pub path: String,
    /// Lowercased header names to values.
    pub headers: BTreeMap<String, String>,
    /// Parsed body; `Null` when empty.
    pub body: Value,
    /// Path parameters captured by the matched route.
    pub params: BTreeMap<String, String>,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Looks a header up by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns a captured path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// An outgoing response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Response body; `Null` for none.
    pub body: Value,
}

impl Response {
    /// A response with `status` and no body.
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Value::Null,
        }
    }

    /// `200 OK` with a JSON body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// A JSON response.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    /// An error response with a `{ "error": message }` body.
    #[must_use]
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What handlers and middleware see for one request.
///
/// The scope is opened by the `containerMiddleware` registration before any
/// other middleware runs and dropped with the context.
#[derive(Debug)]
pub struct Context {
    /// The request being handled.
    pub request: Request,
    scope: Option<Arc<Scope>>,
}

impl Context {
    /// Wraps a request with no scope yet.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            scope: None,
        }
    }

    /// The request's registry scope, once opened.
    #[must_use]
    pub fn scope(&self) -> Option<&Arc<Scope>> {
        self.scope.as_ref()
    }

    /// Attaches a registry scope.
    pub fn set_scope(&mut self, scope: Arc<Scope>) {
        self.scope = Some(scope);
    }

    /// Resolves `key` through the request scope.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ScopeRequired`] if no scope was opened, or any
    /// resolution error.
    pub fn resolve_as<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        self.require_scope(key)?.resolve_as(key)
    }

    /// Resolves `key` through the request scope and clones the value out.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_as`](Self::resolve_as).
    pub fn resolve_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Result<T, RegistryError> {
        self.require_scope(key)?.resolve_cloned(key)
    }

    fn require_scope(&self, key: &str) -> Result<&Scope, RegistryError> {
        self.scope
            .as_deref()
            .ok_or_else(|| RegistryError::ScopeRequired { key: key.to_owned() })
    }
}

/// Maps a handler or middleware failure to a response.
///
/// Repository not-found errors become `404` with their `details`; anything
/// else is logged and becomes `500`.
pub(crate) fn error_response(error: &(dyn Error + Send + Sync + 'static)) -> Response {
    if let Some(details) = error
        .downcast_ref::<RepositoryError>()
        .and_then(RepositoryError::details)
    {
        return Response::json(404, json!({ "error": "NotFoundError", "details": details }));
    }
    tracing::error!(error = %error, "request failed");
    Response::error(500, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let request = Request::new("get", "/users").with_header("X-Request-Id", "abc");
        assert_eq!(request.method, "GET");
        assert_eq!(request.header("x-request-id"), Some("abc"));
        assert_eq!(request.header("X-REQUEST-ID"), Some("abc"));
    }

    #[test]
    fn error_responses_carry_a_message() {
        let response = Response::error(404, "missing");
        assert_eq!(response.status, 404);
        assert_eq!(response.body, json!({ "error": "missing" }));
        assert_eq!(response.headers["content-type"], "application/json");
        assert!(!response.is_success());
    }

    #[test]
    fn not_found_errors_map_to_404() {
        let error = RepositoryError::NotFound {
            model: "Post".into(),
            id: 3,
        };
        let response = error_response(&error);
        assert_eq!(response.status, 404);
        assert_eq!(response.body["details"], "Post with id 3 can't be found.");

        let response = error_response(&RepositoryError::Unsupported {
            model: "Post".into(),
        });
        assert_eq!(response.status, 500);
    }

    #[test]
    fn resolving_without_a_scope_fails() {
        let context = Context::new(Request::new("GET", "/"));
        let err = context.resolve_as::<String>("user").unwrap_err();
        assert!(matches!(err, RegistryError::ScopeRequired { ref key } if key == "user"));
    }
}
