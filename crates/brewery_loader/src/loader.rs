//! The [`ComponentLoader`] trait and its filesystem implementation.

use crate::descriptor::{ComponentDescriptor, ComponentKind, Discovered};
use crate::error::DiscoveryError;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Enumerates component definitions from declared locations.
///
/// Implementors only provide [`discover_location`](Self::discover_location);
/// the keyed/sequence merging across locations is shared.
pub trait ComponentLoader: Send + Sync + 'static {
    /// Discovers every definition under a single location, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if the location is missing, empty, or
    /// holds a file that is not a definition.
    fn discover_location(
        &self,
        kind: ComponentKind,
        location: &str,
    ) -> Result<Vec<ComponentDescriptor>, DiscoveryError>;

    /// Discovers definitions across `locations`.
    ///
    /// With `keyed`, definitions are keyed by base name and a later location
    /// overwrites an earlier one. Without it, definitions are concatenated in
    /// location order. An empty `locations` list yields an empty result.
    ///
    /// # Errors
    ///
    /// Fails on the first location that fails.
    fn discover(
        &self,
        kind: ComponentKind,
        locations: &[String],
        keyed: bool,
    ) -> Result<Discovered, DiscoveryError> {
        if keyed {
            let mut map = IndexMap::new();
            for location in locations {
                for descriptor in self.discover_location(kind, location)? {
                    let key = descriptor.key().to_owned();
                    if let Some(previous) = map.insert(key.clone(), descriptor) {
                        tracing::debug!(
                            kind = %kind,
                            key = %key,
                            replaced = %previous.path.display(),
                            "definition overridden by later location"
                        );
                    }
                }
            }
            Ok(Discovered::Keyed(map))
        } else {
            let mut list = Vec::new();
            for location in locations {
                list.extend(self.discover_location(kind, location)?);
            }
            Ok(Discovered::Sequence(list))
        }
    }

    /// Discovers `kind` using its natural shape (see [`ComponentKind::is_keyed`]).
    ///
    /// # Errors
    ///
    /// Same as [`discover`](Self::discover).
    fn discover_kind(
        &self,
        kind: ComponentKind,
        locations: &[String],
    ) -> Result<Discovered, DiscoveryError> {
        self.discover(kind, locations, kind.is_keyed())
    }

    /// Loads a single-definition location such as the router.
    ///
    /// When the location is a directory holding several definitions, the last
    /// one in discovery order is used.
    ///
    /// # Errors
    ///
    /// Same as [`discover_location`](Self::discover_location).
    fn load_single(
        &self,
        kind: ComponentKind,
        location: &str,
    ) -> Result<ComponentDescriptor, DiscoveryError> {
        self.discover_location(kind, location)?
            .pop()
            .ok_or_else(|| DiscoveryError::EmptyLocation {
                location: location.to_owned(),
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FsLoader
// ─────────────────────────────────────────────────────────────────────────────

/// Extensions recognised as definition files.
pub const DEFINITION_EXTENSIONS: [&str; 2] = ["toml", "json"];

/// Discovers definition files on the local filesystem.
///
/// Locations are resolved against `root` unless absolute. Directories are
/// walked recursively in file-name order; hidden entries are skipped.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    /// Creates a loader resolving relative locations against `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory relative locations are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a declared location to a path.
    #[must_use]
    pub fn resolve(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }

    fn read(&self, kind: ComponentKind, path: &Path) -> Result<ComponentDescriptor, DiscoveryError> {
        let text = std::fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = parse_definition(path, &text)?;
        tracing::debug!(kind = %kind, path = %path.display(), "discovered definition");
        Ok(ComponentDescriptor::new(kind, path, manifest))
    }
}

impl ComponentLoader for FsLoader {
    fn discover_location(
        &self,
        kind: ComponentKind,
        location: &str,
    ) -> Result<Vec<ComponentDescriptor>, DiscoveryError> {
        let base = self.resolve(location);
        if !base.exists() {
            return Err(DiscoveryError::MissingLocation {
                location: location.to_owned(),
                path: base,
            });
        }

        if base.is_file() {
            if !is_definition(&base) {
                return Err(DiscoveryError::InvalidEntry {
                    path: base,
                    location: location.to_owned(),
                });
            }
            return Ok(vec![self.read(kind, &base)?]);
        }

        let mut found = Vec::new();
        let walker = WalkDir::new(&base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(|source| DiscoveryError::Walk {
                location: location.to_owned(),
                source,
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if !is_definition(entry.path()) {
                return Err(DiscoveryError::InvalidEntry {
                    path: entry.into_path(),
                    location: location.to_owned(),
                });
            }
            found.push(self.read(kind, entry.path())?);
        }

        if found.is_empty() {
            return Err(DiscoveryError::EmptyLocation {
                location: location.to_owned(),
            });
        }
        Ok(found)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn is_definition(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| DEFINITION_EXTENSIONS.contains(&ext))
}

/// Parses a definition file by extension.
///
/// # Errors
///
/// Returns [`DiscoveryError::Parse`] if the text is not valid for its format.
pub fn parse_definition(path: &Path, text: &str) -> Result<Value, DiscoveryError> {
    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        _ => toml::from_str::<Value>(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| DiscoveryError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
