//! Component manifest discovery for Brewery.
//!
//! A Brewery application declares, per component kind, the locations its
//! definitions live in. This crate turns those locations into
//! [`ComponentDescriptor`]s without instantiating anything:
//!
//! - [`ComponentLoader`] - discovery contract, with location merging built in
//! - [`FsLoader`] - walks directories for `.toml` and `.json` definitions
//! - [`Discovered`] - keyed mapping or ordered sequence, per kind
//!
//! # Example
//!
//! ```no_run
//! use brewery_loader::{ComponentKind, ComponentLoader, FsLoader};
//!
//! let loader = FsLoader::new("/srv/app");
//! let use_cases = loader
//!     .discover(ComponentKind::UseCase, &["src/app".into()], true)
//!     .unwrap()
//!     .into_keyed();
//!
//! for (name, descriptor) in &use_cases {
//!     println!("{name}: {}", descriptor.path.display());
//! }
//! ```

mod descriptor;
mod error;
mod loader;

pub use descriptor::{ComponentDescriptor, ComponentKind, Discovered};
pub use error::DiscoveryError;
pub use loader::{ComponentLoader, DEFINITION_EXTENSIONS, FsLoader, parse_definition};
