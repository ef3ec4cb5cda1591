//! Registrations: a lifetime policy paired with a resolver.

use crate::error::BoxError;
use crate::injector::Injector;
use core::any::Any;
use core::fmt;
use std::sync::Arc;

/// A resolved, type-erased registry value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor stored by factory registrations.
pub type Constructor = Arc<dyn Fn(&Injector<'_>) -> Result<Instance, BoxError> + Send + Sync>;

/// How long a resolved value lives and who shares it.
///
/// | Lifetime | Constructed | Shared by |
/// |----------|-------------|-----------|
/// | [`Singleton`](Lifetime::Singleton) | once, on first resolution | the whole registry |
/// | [`Scoped`](Lifetime::Scoped) | once per scope | one scope |
/// | [`Transient`](Lifetime::Transient) | on every resolution | nobody |
/// | [`Value`](Lifetime::Value) | never | the whole registry |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the registry's whole life.
    Singleton,
    /// One instance per [`Scope`](crate::Scope).
    Scoped,
    /// A fresh instance per resolution.
    Transient,
    /// A pre-built value handed out as-is.
    Value,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Singleton => "singleton",
            Self::Scoped => "scoped",
            Self::Transient => "transient",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub(crate) enum Resolver {
    Value(Instance),
    Factory {
        dependencies: Vec<String>,
        construct: Constructor,
    },
}

/// A lifetime policy paired with the means of producing a value.
///
/// # Example
///
/// ```
/// use brewery_registry::{Registration, RegistryBuilder};
///
/// struct Greeter { greeting: String }
///
/// let mut builder = RegistryBuilder::new();
/// builder
///     .register("greeting", Registration::value(String::from("hello")))
///     .register(
///         "greeter",
///         Registration::singleton(["greeting"], |inj| {
///             let greeting = inj.get::<String>("greeting")?;
///             Ok(Greeter { greeting: greeting.as_ref().clone() })
///         }),
///     );
///
/// let registry = builder.build();
/// let greeter = registry.resolve_as::<Greeter>("greeter").unwrap();
/// assert_eq!(greeter.greeting, "hello");
/// ```
#[derive(Clone)]
pub struct Registration {
    lifetime: Lifetime,
    pub(crate) resolver: Resolver,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

impl Registration {
    /// Registers a fixed value. It is never constructed by the registry.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    /// Registers an already shared value without copying it.
    ///
    /// Every resolution returns a clone of `value`'s `Arc`, so mutations made
    /// through interior mutability are visible to all holders.
    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            lifetime: Lifetime::Value,
            resolver: Resolver::Value(value),
        }
    }

    /// Registers a constructor whose result is shared for the registry's life.
    pub fn singleton<T, F, D>(dependencies: D, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self::factory(Lifetime::Singleton, dependencies, construct)
    }

    /// Registers a constructor whose result is shared within one scope.
    pub fn scoped<T, F, D>(dependencies: D, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self::factory(Lifetime::Scoped, dependencies, construct)
    }

    /// Registers a constructor invoked on every resolution.
    pub fn transient<T, F, D>(dependencies: D, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self::factory(Lifetime::Transient, dependencies, construct)
    }

    /// Registers a typed constructor under an explicit lifetime.
    ///
    /// # Panics
    ///
    /// Panics if `lifetime` is [`Lifetime::Value`]; use [`value`](Self::value).
    pub fn factory<T, F, D>(lifetime: Lifetime, dependencies: D, construct: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, BoxError> + Send + Sync + 'static,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let construct: Constructor = Arc::new(move |inj: &Injector<'_>| {
            construct(inj).map(|value| Arc::new(value) as Instance)
        });
        Self::from_constructor(lifetime, dependencies, construct)
    }

    /// Registers a type-erased constructor under an explicit lifetime.
    ///
    /// # Panics
    ///
    /// Panics if `lifetime` is [`Lifetime::Value`].
    pub fn from_constructor<D>(lifetime: Lifetime, dependencies: D, construct: Constructor) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
    {
        assert!(
            lifetime != Lifetime::Value,
            "value registrations are built with Registration::value"
        );
        Self {
            lifetime,
            resolver: Resolver::Factory {
                dependencies: dependencies.into_iter().map(Into::into).collect(),
                construct,
            },
        }
    }

    /// Returns the lifetime policy.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Returns the declared dependency keys, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        match &self.resolver {
            Resolver::Value(_) => &[],
            Resolver::Factory { dependencies, .. } => dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_registration_has_no_dependencies() {
        let registration = Registration::value(42_u32);
        assert_eq!(registration.lifetime(), Lifetime::Value);
        assert!(registration.dependencies().is_empty());
    }

    #[test]
    fn factory_keeps_dependency_order() {
        let registration = Registration::transient(["b", "a"], |_| Ok(()));
        assert_eq!(registration.lifetime(), Lifetime::Transient);
        assert_eq!(registration.dependencies(), ["b", "a"]);
    }

    #[test]
    #[should_panic(expected = "value registrations")]
    fn factory_rejects_value_lifetime() {
        let _ = Registration::factory(Lifetime::Value, Vec::<String>::new(), |_| Ok(1_u8));
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(Lifetime::Scoped.to_string(), "scoped");
    }
}
