//! Integration tests for datasource binding.

use brewery_datasource::prelude::*;
use brewery_datasource::{BoxError, ConnectorEvent};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn memory_model(name: &'static str, datasource: &str) -> ModelDefinition {
    ModelDefinition::new(name, datasource, move |handle, _types| {
        Ok(Arc::new(MemoryModel::define(name, handle)?) as Arc<dyn Model>)
    })
}

fn post_model(datasource: &str) -> ModelDefinition {
    ModelDefinition::new("Post", datasource, |handle, _types| {
        Ok(Arc::new(MemoryModel::define("Post", handle)?.belongs_to("User")) as Arc<dyn Model>)
    })
}

/// A memory-backed connector that records its lifecycle events.
fn recording_connector(name: &str, events: Arc<Mutex<Vec<ConnectorEvent>>>) -> Arc<dyn Connector> {
    let connector = ConnectorBuilder::new(name)
        .initialize(|config| Ok(Arc::new(MemoryDatabase::from_config(config)) as Arc<dyn DatasourceHandle>))
        .connect(|| async { Ok(()) })
        .on_event(move |_, event| events.lock().push(event))
        .build()
        .expect("connector should build");
    Arc::new(connector)
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_datasource_defines_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let definition = ModelDefinition::new("User", "analytics", move |handle, _types| {
        counted.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryModel::define("User", handle)?) as Arc<dyn Model>)
    });

    let events = Arc::new(Mutex::new(Vec::new()));
    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(
            vec![DatasourceSpec::new(
                "main",
                recording_connector("main", Arc::clone(&events)),
                json!({}),
            )],
            vec![definition],
        )
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        "Datasource \"analytics\" defined in model \"User\" doesn't exist"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(events.lock().is_empty(), "no connector should be initialized");
}

#[tokio::test]
async fn duplicate_model_names_are_rejected() {
    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(
            vec![
                DatasourceSpec::new("a", "memory", json!({})),
                DatasourceSpec::new("b", "memory", json!({})),
            ],
            vec![memory_model("User", "a"), memory_model("User", "b")],
        )
        .await
        .unwrap_err();

    match err {
        BindError::DuplicateModelName { model, first, second } => {
            assert_eq!(model, "User");
            assert_eq!(first, "a");
            assert_eq!(second, "b");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn duplicate_datasource_names_are_rejected() {
    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(
            vec![
                DatasourceSpec::new("main", "memory", json!({})),
                DatasourceSpec::new("main", "memory", json!({})),
            ],
            Vec::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::DuplicateDatasource { ref name } if name == "main"));
}

#[tokio::test]
async fn unknown_connector_key_fails() {
    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(vec![DatasourceSpec::new("main", "couch", json!({}))], Vec::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BindError::Connector {
            source: ConnectorError::UnknownConnector { .. },
            ..
        }
    ));
    assert!(err.to_string().contains("main"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Binding
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn builtin_sql_key_binds_associated_models() {
    let mut connectors = ConnectorRegistry::default();
    connectors.register_builtin("builtin-sql", || {
        let connector = ConnectorBuilder::new("sql")
            .initialize(|config| Ok(Arc::new(MemoryDatabase::from_config(config)) as Arc<dyn DatasourceHandle>))
            .connect(|| async { Ok(()) })
            .build()?;
        Ok(Arc::new(connector) as Arc<dyn Connector>)
    });

    let binding = DatasourceBinder::new(&connectors)
        .bind(
            vec![DatasourceSpec::new("db", "builtin-sql", json!({}))],
            vec![memory_model("User", "db"), post_model("db")],
        )
        .await
        .unwrap();

    assert_eq!(binding.datasources.keys().collect::<Vec<_>>(), ["db"]);
    assert_eq!(binding.models.keys().collect::<Vec<_>>(), ["User", "Post"]);
    assert_eq!(binding.connectors["db"].name(), "sql");

    let post = binding.models["Post"]
        .downcast_ref::<MemoryModel>()
        .expect("Post is a memory model");
    assert_eq!(post.associations(), ["User"]);

    binding
        .connections
        .settle(ConnectionPolicy::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn associations_resolve_models_defined_later() {
    let connectors = ConnectorRegistry::default();
    let binding = DatasourceBinder::new(&connectors)
        .bind(
            vec![DatasourceSpec::new("db", "memory", json!({}))],
            vec![post_model("db"), memory_model("User", "db")],
        )
        .await
        .unwrap();

    assert_eq!(binding.models.keys().collect::<Vec<_>>(), ["Post", "User"]);
    let post = binding.models["Post"]
        .downcast_ref::<MemoryModel>()
        .expect("Post is a memory model");
    assert_eq!(post.associations(), ["User"]);
}

#[tokio::test]
async fn associations_stay_within_a_datasource() {
    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(
            vec![
                DatasourceSpec::new("users", "memory", json!({})),
                DatasourceSpec::new("content", "memory", json!({})),
            ],
            vec![memory_model("User", "users"), post_model("content")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::Associate { ref model, .. } if model == "Post"));
}

#[tokio::test]
async fn datasources_without_models_are_still_exposed() {
    let connectors = ConnectorRegistry::default();
    let binding = DatasourceBinder::new(&connectors)
        .bind(
            vec![
                DatasourceSpec::new("main", "memory", json!({})),
                DatasourceSpec::new("cache", "memory", json!({})),
            ],
            vec![memory_model("User", "main")],
        )
        .await
        .unwrap();

    assert_eq!(binding.datasources.len(), 2);
    assert_eq!(binding.connections.len(), 2);
    assert_eq!(binding.models.len(), 1);
}

#[tokio::test]
async fn sync_runs_after_every_model_is_associated() {
    let connectors = ConnectorRegistry::default();
    let binding = DatasourceBinder::new(&connectors)
        .bind(
            vec![DatasourceSpec::new(
                "main",
                "memory",
                json!({ "sync": true, "alter": true }),
            )],
            vec![memory_model("User", "main"), post_model("main")],
        )
        .await
        .unwrap();

    let database = binding.datasources["main"]
        .downcast_ref::<MemoryDatabase>()
        .expect("memory datasource");
    assert_eq!(
        database.sync_history(),
        [(SyncMode::Alter, vec!["User".to_owned(), "Post".to_owned()])]
    );
}

#[tokio::test]
async fn define_failure_disconnects_initialized_datasources() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let failing = ModelDefinition::new("Broken", "main", |_handle, _types| {
        Err::<Arc<dyn Model>, BoxError>("bad definition".into())
    });

    let connectors = ConnectorRegistry::default();
    let err = DatasourceBinder::new(&connectors)
        .bind(
            vec![DatasourceSpec::new(
                "main",
                recording_connector("main", Arc::clone(&events)),
                json!({}),
            )],
            vec![failing],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BindError::Define { ref model, .. } if model == "Broken"));
    let events = events.lock();
    assert_eq!(events.first(), Some(&ConnectorEvent::Initialized));
    assert_eq!(events.last(), Some(&ConnectorEvent::Disconnected));
}

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

const MODELS: [&str; 4] = ["Account", "Invoice", "Payment", "Refund"];

fn bind_in_order(order: &[usize]) -> Vec<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        let definitions = order
            .iter()
            .map(|&index| {
                let datasource = if index % 2 == 0 { "primary" } else { "replica" };
                memory_model(MODELS[index], datasource)
            })
            .collect();

        let connectors = ConnectorRegistry::default();
        let binding = DatasourceBinder::new(&connectors)
            .bind(
                vec![
                    DatasourceSpec::new("primary", "memory", json!({})),
                    DatasourceSpec::new("replica", "memory", json!({})),
                ],
                definitions,
            )
            .await
            .expect("bind");
        let mut names: Vec<String> = binding.models.keys().cloned().collect();
        names.sort();
        names
    })
}

proptest! {
    #[test]
    fn model_order_does_not_change_the_result(order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()) {
        let bound = bind_in_order(&order);
        prop_assert_eq!(bound, MODELS.iter().map(|name| (*name).to_owned()).collect::<Vec<_>>());
    }
}
