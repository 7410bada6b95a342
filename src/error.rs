use std::io;
use std::path::{Path, PathBuf};

use crate::location::Namespace;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, NestError>;

/// The primary error type for all operations in the `nest` crate.
#[derive(Debug, thiserror::Error)]
pub enum NestError {
    /// A required argument was missing or empty. Always a programmer error.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A named location was linked a second time.
    #[error("{namespace} location '{name}' is already linked to '{previous}'")]
    AlreadyLinked {
        namespace: Namespace,
        name: String,
        previous: String,
    },

    /// A `relative-to` reference or an explicit lookup named an undeclared location.
    #[error("missing {namespace} location definition for '{name}'")]
    MissingLocation { namespace: Namespace, name: String },

    /// A location was declared but never linked to a path.
    #[error("{namespace} location '{name}' has not been linked to a path")]
    UnlinkedLocation { namespace: Namespace, name: String },

    /// A chain of `relative-to` references loops back on itself.
    #[error("cyclic {namespace} location chain: {}", chain.join(" -> "))]
    CyclicLocation {
        namespace: Namespace,
        chain: Vec<String>,
    },

    /// An attachment block carried an id no handler is registered for.
    #[error("unrecognized attachment handler id '{0}'")]
    UnrecognizedHandlerId(String),

    /// An attachment block could not be decoded.
    #[error("malformed attachment: {0}")]
    MalformedAttachment(String),

    /// The archive could not be built.
    #[error("failed to build nest: {0}")]
    Build(String),

    /// The archive could not be expanded.
    #[error("failed to expand nest: {0}")]
    Expand(String),

    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io { source: io::Error, path: PathBuf },

    /// The underlying ZIP container reported an error.
    #[error("ZIP container error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl NestError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        NestError::InvalidArgument(what.into())
    }

    pub(crate) fn io(source: io::Error, path: impl AsRef<Path>) -> Self {
        NestError::Io {
            source,
            path: path.as_ref().to_path_buf(),
        }
    }
}

// Generic IO error conversion that doesn't carry a path
impl From<io::Error> for NestError {
    fn from(err: io::Error) -> Self {
        NestError::Io {
            source: err,
            path: PathBuf::new(),
        }
    }
}

/// Attaches the offending path to an I/O result.
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| NestError::io(e, path))
    }
}
