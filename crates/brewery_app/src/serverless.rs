//! API-gateway style event adapter.
//!
//! Events and results follow the shape most function platforms use for HTTP
//! triggers:
//!
//! ```json
//! { "httpMethod": "POST", "path": "/users", "headers": {}, "body": "{\"email\":\"a@b.c\"}" }
//! { "statusCode": 201, "headers": { "content-type": "application/json" }, "body": "{...}" }
//! ```

use crate::http::{Request, Response};
use crate::server::RequestHandler;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// An incoming HTTP-trigger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessEvent {
    /// HTTP method.
    pub http_method: String,
    /// Request path.
    pub path: String,
    /// Request headers; may be `null`.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Raw request body; may be `null`.
    #[serde(default)]
    pub body: Option<String>,
}

/// The result handed back to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Serialized body.
    pub body: String,
}

impl From<ServerlessEvent> for Request {
    fn from(event: ServerlessEvent) -> Self {
        let body = match event.body.as_deref().map(str::trim) {
            None | Some("") => Value::Null,
            Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned())),
        };
        let mut request = Request::new(&event.http_method, event.path).with_body(body);
        for (name, value) in event.headers.unwrap_or_default() {
            request = request.with_header(name, value);
        }
        request
    }
}

impl From<Response> for ServerlessResponse {
    fn from(response: Response) -> Self {
        let body = match response.body {
            Value::Null => String::new(),
            Value::String(text) => text,
            other => other.to_string(),
        };
        Self {
            status_code: response.status,
            headers: response.headers,
            body,
        }
    }
}

/// Feeds platform events to the server's transport handle.
#[derive(Debug, Clone)]
pub struct ServerlessAdapter {
    transport: RequestHandler,
}

impl ServerlessAdapter {
    /// Wraps a transport handle.
    #[must_use]
    pub fn new(transport: RequestHandler) -> Self {
        Self { transport }
    }

    /// Handles a typed event.
    pub async fn handle(&self, event: ServerlessEvent) -> ServerlessResponse {
        self.transport.handle(event.into()).await.into()
    }

    /// Handles a raw JSON event and returns the JSON result.
    ///
    /// A malformed event yields a `400` result instead of an error.
    pub async fn invoke(&self, event: Value) -> Value {
        let response = match serde_json::from_value::<ServerlessEvent>(event) {
            Ok(event) => self.handle(event).await,
            Err(error) => {
                tracing::warn!(error = %error, "malformed serverless event");
                Response::error(400, format!("invalid event: {error}")).into()
            }
        };
        serde_json::to_value(&response).unwrap_or_else(|_| json!({ "statusCode": 500 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_become_requests() {
        let event: ServerlessEvent = serde_json::from_value(json!({
            "httpMethod": "post",
            "path": "/users",
            "headers": { "Content-Type": "application/json" },
            "body": "{\"email\":\"ada@example.com\"}",
        }))
        .unwrap();

        let request = Request::from(event);
        assert_eq!(request.method, "POST");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, json!({ "email": "ada@example.com" }));
    }

    #[test]
    fn non_json_bodies_stay_text() {
        let request = Request::from(ServerlessEvent {
            http_method: "PUT".into(),
            path: "/notes/1".into(),
            headers: None,
            body: Some("plain words".into()),
        });
        assert_eq!(request.body, json!("plain words"));
    }

    #[test]
    fn responses_serialize_their_body() {
        let response = ServerlessResponse::from(Response::ok(json!({ "id": 1 })));
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"id":1}"#);

        let empty = ServerlessResponse::from(Response::new(204));
        assert_eq!(empty.body, "");
    }
}
