//! Error types for component discovery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while discovering component definitions.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A declared location does not exist.
    #[error("source location `{location}` does not exist ({})", .path.display())]
    MissingLocation {
        /// The location as declared.
        location: String,
        /// The resolved path.
        path: PathBuf,
    },

    /// A declared location holds no definition files.
    #[error("source location `{location}` contains no definitions")]
    EmptyLocation {
        /// The location as declared.
        location: String,
    },

    /// A non-definition file sits under a declared location.
    #[error("invalid file {} in source {location}", .path.display())]
    InvalidEntry {
        /// The offending file.
        path: PathBuf,
        /// The location it was found under.
        location: String,
    },

    /// A definition file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// The unreadable file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Walking a location failed.
    #[error("failed to walk source location `{location}`: {source}")]
    Walk {
        /// The location being walked.
        location: String,
        /// The underlying error.
        #[source]
        source: walkdir::Error,
    },

    /// A definition file is not valid TOML or JSON.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse {
        /// The unparsable file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

impl DiscoveryError {
    /// The declared location involved, where known.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::MissingLocation { location, .. }
            | Self::EmptyLocation { location }
            | Self::InvalidEntry { location, .. }
            | Self::Walk { location, .. } => Some(location),
            Self::Io { .. } | Self::Parse { .. } => None,
        }
    }
}
