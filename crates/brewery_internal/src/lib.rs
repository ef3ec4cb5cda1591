//! # Brewery Internal Library
//!
//! Re-exports the Brewery crates for convenience.

/// Layer 1: lifetime-aware dependency registry.
pub use brewery_registry;

/// Layer 1: component manifest discovery.
pub use brewery_loader;

/// Layer 2: connectors, datasource binding and repositories.
pub use brewery_datasource;

/// Layer 3: boot orchestration and the server boundary.
pub use brewery_app;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use brewery_app::prelude::*;
    pub use brewery_datasource::prelude::*;
    pub use brewery_loader::{ComponentDescriptor, ComponentKind, ComponentLoader, FsLoader};
    pub use brewery_registry::prelude::*;
}
