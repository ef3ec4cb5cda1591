//! Linking discovered manifests to catalog factories.
//!
//! Everything here runs before any connector is touched, so a missing
//! factory or malformed manifest aborts boot with nothing to undo.

use crate::catalog::{ComponentCatalog, Recipe, RepositoryFactory, RouterFactory, base_repository};
use crate::error::BootError;
use crate::middleware::Middleware;
use brewery_datasource::{BindError, ConnectorError, ConnectorRef, DatasourceSpec, ModelDefinition};
use brewery_loader::{ComponentDescriptor, ComponentKind};
use serde_json::Value;
use std::sync::Arc;

/// Default router factory key.
pub const DEFAULT_ROUTER_FACTORY: &str = "router";

/// A keyed unit linked to its constructor.
#[derive(Debug, Clone)]
pub(crate) struct LinkedUnit {
    pub(crate) key: String,
    pub(crate) recipe: Recipe,
}

/// A repository linked to its model and factory.
#[derive(Clone)]
pub(crate) struct LinkedRepository {
    pub(crate) key: String,
    pub(crate) model: String,
    pub(crate) factory: RepositoryFactory,
}

/// Everything boot registers, linked and validated.
#[derive(Default)]
pub(crate) struct Linked {
    pub(crate) datasources: Vec<DatasourceSpec>,
    pub(crate) models: Vec<ModelDefinition>,
    pub(crate) use_cases: Vec<LinkedUnit>,
    pub(crate) repositories: Vec<LinkedRepository>,
    pub(crate) middleware: Vec<(String, Arc<dyn Middleware>)>,
    pub(crate) controllers: Vec<LinkedUnit>,
    pub(crate) router: Option<RouterFactory>,
}

fn optional_str<'d>(descriptor: &'d ComponentDescriptor, field: &str) -> Result<Option<&'d str>, BootError> {
    match descriptor.field(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => Err(BootError::invalid_manifest(
            &descriptor.path,
            format!("`{field}` must be a string, got {other}"),
        )),
    }
}

fn required_str<'d>(descriptor: &'d ComponentDescriptor, field: &str) -> Result<&'d str, BootError> {
    optional_str(descriptor, field)?
        .ok_or_else(|| BootError::invalid_manifest(&descriptor.path, format!("missing `{field}`")))
}

/// `factory` field, defaulting to the unit key.
fn factory_key(descriptor: &ComponentDescriptor) -> Result<&str, BootError> {
    Ok(optional_str(descriptor, "factory")?.unwrap_or_else(|| descriptor.key()))
}

pub(crate) fn datasource(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<DatasourceSpec, BootError> {
    let name = optional_str(descriptor, "name")?.unwrap_or(&descriptor.stem).to_owned();
    let invalid = |reason: String| {
        BootError::Bind(BindError::Connector {
            datasource: name.clone(),
            source: ConnectorError::invalid(reason),
        })
    };

    let connector = match descriptor.field("connector") {
        Some(Value::String(key)) => ConnectorRef::builtin(key.as_str()),
        Some(Value::Object(table)) => match (table.get("instance"), table.get("builtin")) {
            (Some(Value::String(key)), None) => {
                let connector = catalog.connectors.get(key).ok_or_else(|| {
                    BootError::missing_factory(ComponentKind::DatasourceSpec, key.as_str(), &descriptor.path)
                })?;
                ConnectorRef::Instance(Arc::clone(connector))
            }
            (None, Some(Value::String(key))) => ConnectorRef::builtin(key.as_str()),
            _ => {
                return Err(invalid(format!(
                    "{} must name exactly one `instance` or `builtin` key",
                    Value::Object(table.clone())
                )));
            }
        },
        Some(other) => {
            return Err(invalid(format!(
                "{other}, connector must be a built-in key or a catalog connector instance"
            )));
        }
        None => return Err(invalid("no connector given".to_owned())),
    };

    let config = descriptor
        .field("config")
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    Ok(DatasourceSpec::new(name, connector, config))
}

pub(crate) fn model(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<ModelDefinition, BootError> {
    let name = optional_str(descriptor, "name")?.unwrap_or(&descriptor.stem);
    let datasource = required_str(descriptor, "datasource")?;
    let definition = optional_str(descriptor, "definition")?.unwrap_or(name);
    let define = catalog.models.get(definition).ok_or_else(|| {
        BootError::missing_factory(ComponentKind::ModelDefinition, definition, &descriptor.path)
    })?;
    Ok(ModelDefinition::from_fn(name, datasource, Arc::clone(define)))
}

fn unit(
    descriptor: &ComponentDescriptor,
    recipes: &std::collections::HashMap<String, Recipe>,
) -> Result<LinkedUnit, BootError> {
    let factory = factory_key(descriptor)?;
    let recipe = recipes
        .get(factory)
        .ok_or_else(|| BootError::missing_factory(descriptor.kind, factory, &descriptor.path))?;
    Ok(LinkedUnit {
        key: descriptor.key().to_owned(),
        recipe: recipe.clone(),
    })
}

pub(crate) fn use_case(descriptor: &ComponentDescriptor, catalog: &ComponentCatalog) -> Result<LinkedUnit, BootError> {
    unit(descriptor, &catalog.use_cases)
}

pub(crate) fn controller(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<LinkedUnit, BootError> {
    unit(descriptor, &catalog.controllers)
}

pub(crate) fn middleware(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<(String, Arc<dyn Middleware>), BootError> {
    let factory = factory_key(descriptor)?;
    let middleware = catalog
        .middleware
        .get(factory)
        .ok_or_else(|| BootError::missing_factory(ComponentKind::Middleware, factory, &descriptor.path))?;
    Ok((descriptor.key().to_owned(), Arc::clone(middleware)))
}

pub(crate) fn repository(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<LinkedRepository, BootError> {
    let model = required_str(descriptor, "model")?.to_owned();
    let factory = match optional_str(descriptor, "factory")? {
        Some(key) => Arc::clone(catalog.repositories.get(key).ok_or_else(|| {
            BootError::missing_factory(ComponentKind::Repository, key, &descriptor.path)
        })?),
        None => base_repository(),
    };
    Ok(LinkedRepository {
        key: descriptor.key().to_owned(),
        model,
        factory,
    })
}

pub(crate) fn router(
    descriptor: &ComponentDescriptor,
    catalog: &ComponentCatalog,
) -> Result<RouterFactory, BootError> {
    let factory = optional_str(descriptor, "factory")?.unwrap_or(DEFAULT_ROUTER_FACTORY);
    catalog
        .routers
        .get(factory)
        .cloned()
        .ok_or_else(|| BootError::missing_factory(ComponentKind::Router, factory, &descriptor.path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewery_datasource::MemoryConnector;
    use serde_json::json;

    fn descriptor(kind: ComponentKind, file: &str, manifest: Value) -> ComponentDescriptor {
        ComponentDescriptor::new(kind, format!("/app/{file}"), manifest)
    }

    #[test]
    fn datasource_connector_forms() {
        let mut catalog = ComponentCatalog::new();
        catalog.connector("cache", MemoryConnector::new());

        let spec = datasource(
            &descriptor(ComponentKind::DatasourceSpec, "main.toml", json!({ "connector": "builtin-sql" })),
            &catalog,
        )
        .unwrap();
        assert_eq!(spec.name, "main");
        assert!(matches!(spec.connector, ConnectorRef::Builtin(ref key) if key == "builtin-sql"));
        assert_eq!(spec.config, json!({}));

        let spec = datasource(
            &descriptor(
                ComponentKind::DatasourceSpec,
                "cache.toml",
                json!({ "name": "sessions", "connector": { "instance": "cache" }, "config": { "sync": true } }),
            ),
            &catalog,
        )
        .unwrap();
        assert_eq!(spec.name, "sessions");
        assert!(matches!(spec.connector, ConnectorRef::Instance(_)));
        assert_eq!(spec.config["sync"], true);
    }

    #[test]
    fn datasource_rejects_other_connector_values() {
        let catalog = ComponentCatalog::new();
        let err = datasource(
            &descriptor(ComponentKind::DatasourceSpec, "main.toml", json!({ "connector": 42 })),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            BootError::Bind(BindError::Connector {
                source: ConnectorError::InvalidConnector { .. },
                ..
            })
        ));

        let err = datasource(
            &descriptor(
                ComponentKind::DatasourceSpec,
                "main.toml",
                json!({ "connector": { "instance": "nope" } }),
            ),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BootError::MissingFactory { ref key, .. } if key == "nope"));
    }

    #[test]
    fn model_definition_defaults_to_its_name() {
        let mut catalog = ComponentCatalog::new();
        catalog.model("User", |handle, _| {
            Ok(Arc::new(brewery_datasource::MemoryModel::define("User", handle)?)
                as Arc<dyn brewery_datasource::Model>)
        });

        let definition = model(
            &descriptor(ComponentKind::ModelDefinition, "user.toml", json!({ "name": "User", "datasource": "main" })),
            &catalog,
        )
        .unwrap();
        assert_eq!(definition.name, "User");
        assert_eq!(definition.datasource, "main");

        let err = model(
            &descriptor(ComponentKind::ModelDefinition, "post.toml", json!({ "datasource": "main" })),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BootError::MissingFactory { ref key, .. } if key == "post"));

        let err = model(
            &descriptor(ComponentKind::ModelDefinition, "user.toml", json!({ "name": "User" })),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BootError::InvalidManifest { .. }));
    }

    #[test]
    fn units_use_their_factory_key() {
        let mut catalog = ComponentCatalog::new();
        catalog.use_case("createUser", ["userRepository"], |_| Ok(()));

        let linked = use_case(
            &descriptor(ComponentKind::UseCase, "signup.toml", json!({ "factory": "createUser" })),
            &catalog,
        )
        .unwrap();
        assert_eq!(linked.key, "signup");
        assert_eq!(linked.recipe.dependencies, ["userRepository"]);

        let err = controller(&descriptor(ComponentKind::Controller, "users.toml", json!({})), &catalog)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BootError::MissingFactory { kind: ComponentKind::Controller, ref key, .. } if key == "users"
        ));
    }

    #[test]
    fn repositories_need_a_model() {
        let catalog = ComponentCatalog::new();
        let linked = repository(
            &descriptor(ComponentKind::Repository, "userRepository.toml", json!({ "model": "User" })),
            &catalog,
        )
        .unwrap();
        assert_eq!(linked.key, "userRepository");
        assert_eq!(linked.model, "User");

        let err = repository(
            &descriptor(ComponentKind::Repository, "userRepository.toml", json!({ "model": 1 })),
            &catalog,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BootError::InvalidManifest { .. }));
    }
}
