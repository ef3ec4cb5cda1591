//! Error types for registry resolution.

use thiserror::Error;

/// Boxed error returned by user-supplied constructors.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving a key from the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registration exists for the requested key.
    #[error(
        "could not resolve `{key}`{}",
        .requested_by.as_deref().map(|by| format!(" (required by `{by}`)")).unwrap_or_default()
    )]
    Unresolved {
        /// The missing key.
        key: String,
        /// The registration whose constructor asked for it, if any.
        requested_by: Option<String>,
    },

    /// A constructor depends on itself, directly or transitively.
    #[error("cyclic dependency: {}", .path.join(" -> "))]
    CyclicDependency {
        /// Resolution path, starting and ending with the same key.
        path: Vec<String>,
    },

    /// A scoped registration was resolved outside of a [`Scope`](crate::Scope).
    #[error("`{key}` is scoped and can only be resolved from a scope")]
    ScopeRequired {
        /// The scoped key.
        key: String,
    },

    /// The resolved value is not of the requested type.
    #[error("`{key}` is not a `{expected}`")]
    TypeMismatch {
        /// The resolved key.
        key: String,
        /// Name of the type the caller asked for.
        expected: &'static str,
    },

    /// A constructor returned an error.
    #[error("failed to construct `{key}`: {source}")]
    Construction {
        /// The key being constructed.
        key: String,
        /// The constructor's error.
        #[source]
        source: BoxError,
    },

    /// A weak [`RegistryHandle`](crate::RegistryHandle) outlived its registry.
    #[error("registry has been dropped")]
    RegistryDropped,
}

impl RegistryError {
    /// Creates an [`Unresolved`](Self::Unresolved) error.
    pub fn unresolved(key: impl Into<String>, requested_by: Option<&str>) -> Self {
        Self::Unresolved {
            key: key.into(),
            requested_by: requested_by.map(str::to_owned),
        }
    }

    /// Returns the key this error is about, when there is one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Unresolved { key, .. }
            | Self::ScopeRequired { key }
            | Self::TypeMismatch { key, .. }
            | Self::Construction { key, .. } => Some(key),
            Self::CyclicDependency { path } => path.last().map(String::as_str),
            Self::RegistryDropped => None,
        }
    }

    /// Wraps a constructor failure.
    ///
    /// Registry errors raised by nested resolution inside the constructor are
    /// passed through unchanged so the innermost cause stays visible.
    pub(crate) fn from_constructor(key: &str, error: BoxError) -> Self {
        match error.downcast::<RegistryError>() {
            Ok(inner) => *inner,
            Err(source) => Self::Construction {
                key: key.to_owned(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_message_names_requester() {
        let err = RegistryError::unresolved("ghost", Some("userService"));
        assert_eq!(
            err.to_string(),
            "could not resolve `ghost` (required by `userService`)"
        );

        let err = RegistryError::unresolved("ghost", None);
        assert_eq!(err.to_string(), "could not resolve `ghost`");
    }

    #[test]
    fn cycle_message_shows_path() {
        let err = RegistryError::CyclicDependency {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency: a -> b -> a");
        assert_eq!(err.key(), Some("a"));
    }

    #[test]
    fn constructor_errors_unwrap_nested_registry_errors() {
        let nested: BoxError = Box::new(RegistryError::unresolved("ghost", Some("b")));
        let err = RegistryError::from_constructor("a", nested);
        assert!(matches!(err, RegistryError::Unresolved { ref key, .. } if key == "ghost"));

        let plain: BoxError = "boom".into();
        let err = RegistryError::from_constructor("a", plain);
        assert!(matches!(err, RegistryError::Construction { ref key, .. } if key == "a"));
    }
}
