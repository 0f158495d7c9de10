//! Content-addressable key/value persistence used by the game store.

mod fs;
mod memory;

use futures::future::BoxFuture;

use crate::dao::storage::{StorageError, StorageResult};

pub use self::fs::FsKeyedStore;
pub use self::memory::MemoryKeyedStore;

/// Abstraction over a durable byte store addressed by string keys.
///
/// `put` must be atomic: a concurrent `get` observes either the previous value
/// or the new one, never a truncated mix of both.
pub trait KeyedStore: Send + Sync {
    /// Replace the value under `key`.
    fn put(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>>;
    /// Value under `key`, or [`StorageError::NotFound`].
    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Vec<u8>>>;
    /// Whether a value is stored under `key`.
    fn contains(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Check that the backing medium is usable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Keys become file names, so only a conservative alphabet is accepted.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
        })
    }
}
