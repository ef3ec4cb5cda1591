//! Application composition for Rust services.
//!
//! Brewery discovers component manifests, binds datasources and models, and
//! wires use-cases, repositories, middleware, controllers and a router into a
//! lifetime-aware registry before handing back a ready [`Application`].
//!
//! [`Application`]: brewery_internal::brewery_app::Application

pub use brewery_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use brewery_internal::prelude::*;
}
