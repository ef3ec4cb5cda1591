//! Discovered component descriptors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The kind of component a location holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    /// Application use-cases.
    UseCase,
    /// Datasource connector specs.
    DatasourceSpec,
    /// Data-model definitions.
    ModelDefinition,
    /// Repositories bound to a model.
    Repository,
    /// Request middleware.
    Middleware,
    /// Request controllers.
    Controller,
    /// The router factory.
    Router,
}

impl ComponentKind {
    /// Every kind, in boot registration order.
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::UseCase,
        ComponentKind::DatasourceSpec,
        ComponentKind::ModelDefinition,
        ComponentKind::Repository,
        ComponentKind::Middleware,
        ComponentKind::Controller,
        ComponentKind::Router,
    ];

    /// Whether units of this kind are addressed by their file name.
    ///
    /// Datasource specs and model definitions carry their own `name` field
    /// and are discovered as an ordered sequence instead.
    #[must_use]
    pub fn is_keyed(self) -> bool {
        !matches!(self, Self::DatasourceSpec | Self::ModelDefinition)
    }

    /// Human-readable label used in logs and errors.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::UseCase => "use-case",
            Self::DatasourceSpec => "datasource",
            Self::ModelDefinition => "model",
            Self::Repository => "repository",
            Self::Middleware => "middleware",
            Self::Controller => "controller",
            Self::Router => "router",
        }
    }
}

impl core::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One discovered definition file.
///
/// Produced by a [`ComponentLoader`](crate::ComponentLoader) and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    /// What the definition describes.
    pub kind: ComponentKind,
    /// Symbolic name for keyed kinds; `None` for datasource specs and models.
    pub name: Option<String>,
    /// File name up to its first `.`.
    pub stem: String,
    /// Where the definition was read from.
    pub path: PathBuf,
    /// The parsed definition.
    pub manifest: Value,
}

impl ComponentDescriptor {
    /// Creates a descriptor, deriving `stem` and `name` from `path`.
    #[must_use]
    pub fn new(kind: ComponentKind, path: impl Into<PathBuf>, manifest: Value) -> Self {
        let path = path.into();
        let stem = base_name(&path);
        let name = kind.is_keyed().then(|| stem.clone());
        Self {
            kind,
            name,
            stem,
            path,
            manifest,
        }
    }

    /// Key used when descriptors are collected into a mapping.
    #[must_use]
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.stem)
    }

    /// Returns a string field from the manifest.
    #[must_use]
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.manifest.get(field).and_then(Value::as_str)
    }

    /// Returns a raw field from the manifest.
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.manifest.get(field)
    }
}

/// File name up to its first `.`, so `user.repository.toml` becomes `user`.
pub(crate) fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_owned))
        .unwrap_or_default()
}

/// Result of discovering one kind across its locations.
#[derive(Debug, Clone, PartialEq)]
pub enum Discovered {
    /// Keyed by base name; later locations overwrite earlier ones.
    Keyed(IndexMap<String, ComponentDescriptor>),
    /// Every definition in discovery order.
    Sequence(Vec<ComponentDescriptor>),
}

impl Discovered {
    /// Number of discovered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Keyed(map) => map.len(),
            Self::Sequence(list) => list.len(),
        }
    }

    /// Returns `true` if nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts into a keyed mapping, keying sequences by [`ComponentDescriptor::key`].
    #[must_use]
    pub fn into_keyed(self) -> IndexMap<String, ComponentDescriptor> {
        match self {
            Self::Keyed(map) => map,
            Self::Sequence(list) => list
                .into_iter()
                .map(|descriptor| (descriptor.key().to_owned(), descriptor))
                .collect(),
        }
    }

    /// Converts into an ordered sequence.
    #[must_use]
    pub fn into_sequence(self) -> Vec<ComponentDescriptor> {
        match self {
            Self::Keyed(map) => map.into_values().collect(),
            Self::Sequence(list) => list,
        }
    }
}
