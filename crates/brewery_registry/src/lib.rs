//! Lifetime-aware dependency registry for Brewery.
//!
//! `brewery_registry` maps symbolic keys to registrations and resolves them on
//! demand:
//!
//! - [`RegistryBuilder`] - collects registrations, then freezes into a [`Registry`]
//! - [`Registration`] - a [`Lifetime`] paired with a value or constructor
//! - [`Scope`] - per-context cache for scoped registrations
//! - [`Injector`] - what a constructor sees while it runs
//!
//! # Lifetimes
//!
//! | Lifetime | Behavior |
//! |----------|----------|
//! | [`Lifetime::Singleton`] | constructed once, shared by the registry |
//! | [`Lifetime::Scoped`] | constructed once per [`Scope`] |
//! | [`Lifetime::Transient`] | constructed on every resolution |
//! | [`Lifetime::Value`] | never constructed, handed out as registered |
//!
//! Constructors name their dependencies by key. Those keys are resolved
//! first, recursively, and a constructor that depends on itself fails with
//! [`RegistryError::CyclicDependency`].
//!
//! # Example
//!
//! ```
//! use brewery_registry::{Registration, Registry};
//! use std::sync::Arc;
//!
//! struct Database;
//! struct UserRepository { db: Arc<Database> }
//!
//! let registry = Registry::builder()
//!     .with("db", Registration::value(Database))
//!     .with("users", Registration::singleton(["db"], |inj| {
//!         Ok(UserRepository { db: inj.get::<Database>("db")? })
//!     }))
//!     .build();
//!
//! let users = registry.resolve_as::<UserRepository>("users").unwrap();
//! let again = registry.resolve_as::<UserRepository>("users").unwrap();
//! assert!(Arc::ptr_eq(&users, &again));
//! ```

mod error;
mod injector;
mod registration;
mod registry;
mod scope;

pub use error::{BoxError, RegistryError};
pub use injector::Injector;
pub use registration::{Constructor, Instance, Lifetime, Registration};
pub use registry::{Registry, RegistryBuilder, RegistryHandle};
pub use scope::Scope;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        BoxError, Injector, Lifetime, Registration, Registry, RegistryBuilder, RegistryError,
        RegistryHandle, Scope,
    };
}
