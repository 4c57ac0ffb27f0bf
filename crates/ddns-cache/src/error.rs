//! Error types for the record cache
//!
//! Every store operation surfaces its failure to the caller; nothing here is
//! retried or swallowed.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the record cache
#[derive(Error, Debug)]
pub enum Error {
    /// Item or section does not exist
    #[error("Not found: {}", path.display())]
    NotFound {
        /// Resolved filesystem location
        path: PathBuf,
    },

    /// Stored content is not valid JSON or does not match the requested type
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        /// Resolved filesystem location
        path: PathBuf,
        /// Underlying parser error
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("Failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    /// Directory creation, write, rename or delete failure
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Location the operation was acting on
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Item operation invoked on a subsection record
    #[error("Not an item: {name} is a subsection")]
    NotAnItem {
        /// Decoded record name
        name: String,
    },

    /// Section path with an empty segment
    #[error("Invalid section path {path:?}: segment {index} is empty")]
    EmptySegment {
        /// Section path as given
        path: Vec<String>,
        /// Position of the first empty segment
        index: usize,
    },

    /// Caller broke an API contract (e.g. notifier started twice)
    #[error("Misuse: {0}")]
    Misuse(String),

    /// Filesystem watch could not be established
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an I/O error
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an error for a failed lookup, mapping `ErrorKind::NotFound` to
    /// [`Error::NotFound`]
    pub fn lookup(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Create a decode error
    pub fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Create a "not an item" error
    pub fn not_an_item(name: impl Into<String>) -> Self {
        Self::NotAnItem { name: name.into() }
    }

    /// Create a misuse error
    pub fn empty_segment<S: AsRef<str>>(section: &[S], index: usize) -> Self {
        Self::EmptySegment {
            path: section.iter().map(|s| s.as_ref().to_string()).collect(),
            index,
        }
    }

    pub fn misuse(msg: impl Into<String>) -> Self {
        Self::Misuse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the addressed item or section is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
