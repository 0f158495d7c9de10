use std::io;

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No value is stored under the key.
    #[error("no record stored under `{key}`")]
    NotFound {
        /// Requested key.
        key: String,
    },
    /// The key cannot be mapped onto the backend (empty, path separators, ...).
    #[error("invalid storage key `{key}`")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },
    /// Reading or writing the backing medium failed.
    #[error("storage i/o failed for `{key}`")]
    Io {
        /// Key being read or written.
        key: String,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
    /// Encoding a record before writing failed.
    #[error("failed to serialize record `{key}`")]
    Serialize {
        /// Key being read or written.
        key: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored record could not be decoded.
    #[error("failed to deserialize record `{key}`")]
    Deserialize {
        /// Key being read or written.
        key: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Wrap an i/o failure, turning `NotFound` into [`StorageError::NotFound`].
    pub fn io(key: impl Into<String>, source: io::Error) -> Self {
        let key = key.into();
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound { key }
        } else {
            StorageError::Io { key, source }
        }
    }

    /// True when the failure only means the record is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}
