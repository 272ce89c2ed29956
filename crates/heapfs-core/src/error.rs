//! Storage error types.

use std::io;
use thiserror::Error;

/// Storage engine error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The disk cannot satisfy an allocation.
    #[error("out of space: requested {requested} blocks, {available} available")]
    OutOfSpace { requested: usize, available: usize },

    /// Argument rejected at the point of call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Path string that the path type cannot parse.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a regular file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Directory not empty.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Symbolic link resolution exceeded the depth limit.
    #[error("too many symbolic links: {0}")]
    TooManySymlinks(String),

    /// Feature not enabled for this instance.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Attribute view or attribute not known to any provider.
    #[error("unsupported attribute: {0}")]
    UnsupportedAttribute(String),

    /// Configuration document that does not parse.
    #[error("config parse error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// I/O error from an external source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Create an OutOfSpace error.
    pub fn out_of_space(requested: usize, available: usize) -> Self {
        Self::OutOfSpace {
            requested,
            available,
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a TooManySymlinks error.
    pub fn too_many_symlinks(path: impl Into<String>) -> Self {
        Self::TooManySymlinks(path.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an UnsupportedAttribute error.
    pub fn unsupported_attribute(attribute: impl Into<String>) -> Self {
        Self::UnsupportedAttribute(attribute.into())
    }

    /// Returns true for capacity exhaustion.
    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Self::OutOfSpace { .. })
    }
}

/// Convert StoreError to std::io::Error for callers speaking the std vocabulary.
impl From<StoreError> for io::Error {
    fn from(e: StoreError) -> Self {
        match e {
            e @ StoreError::OutOfSpace { .. } => {
                io::Error::new(io::ErrorKind::StorageFull, e.to_string())
            }
            StoreError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            e @ StoreError::InvalidPath { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
            }
            StoreError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            StoreError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            StoreError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            StoreError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            StoreError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            StoreError::TooManySymlinks(msg) => {
                io::Error::other(format!("too many symbolic links: {msg}"))
            }
            StoreError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            StoreError::UnsupportedAttribute(msg) => {
                io::Error::new(io::ErrorKind::Unsupported, msg)
            }
            e @ StoreError::Config(_) => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
            StoreError::Io(e) => e,
        }
    }
}

/// Storage result type.
pub type StoreResult<T> = Result<T, StoreError>;
