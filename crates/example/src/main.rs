//! Example Brewery service CLI.
//!
//! Boots the sample project and replays a few requests through the
//! serverless adapter.
//!
//! # Usage
//!
//! ```bash
//! brewery-demo [project_dir]
//! ```
//!
//! Configuration comes from `<project_dir>/brewery.toml`, overridable with
//! `BREWERY_*` variables (for example `BREWERY_LOGGING__LEVEL=debug`).

use brewery_app::{Application, ConfigLoader};
use serde_json::json;
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let project = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("project"), PathBuf::from);

    let config = ConfigLoader::new()
        .with_config_path(project.join("brewery.toml"))
        .load()
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });

    let app = Application::boot(config, example::catalog())
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        });
    let adapter = app.serverless_adapter();

    let script = [
        json!({ "httpMethod": "POST", "path": "/users", "body": r#"{"email":"ada@example.com","name":"Ada"}"# }),
        json!({ "httpMethod": "POST", "path": "/users/1/posts", "body": r#"{"title":"Notes","body":"On the engine"}"# }),
        json!({ "httpMethod": "GET", "path": "/users/1" }),
        json!({ "httpMethod": "GET", "path": "/users/2" }),
        json!({ "httpMethod": "GET", "path": "/users" }),
    ];
    for event in script {
        let result = adapter.invoke(event).await;
        tracing::info!(status = %result["statusCode"], body = %result["body"], "response");
    }

    app.shutdown().await;
}
