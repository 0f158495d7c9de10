use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, ready};

use crate::dao::storage::{StorageError, StorageResult};

use super::{KeyedStore, validate_key};

/// Volatile store used for tests and throwaway servers.
#[derive(Clone, Default)]
pub struct MemoryKeyedStore {
    records: Arc<DashMap<String, Arc<[u8]>>>,
}

impl MemoryKeyedStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl KeyedStore for MemoryKeyedStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        let result = validate_key(key).map(|()| {
            self.records.insert(key.to_string(), Arc::from(bytes));
        });
        Box::pin(ready(result))
    }

    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Vec<u8>>> {
        let result = self
            .records
            .get(key)
            .map(|entry| entry.value().to_vec())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            });
        Box::pin(ready(result))
    }

    fn contains(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.records.contains_key(key))))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}
