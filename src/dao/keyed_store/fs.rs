use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

use super::{KeyedStore, validate_key};

/// Directory-backed store keeping one file per key.
#[derive(Clone)]
pub struct FsKeyedStore {
    root: Arc<Path>,
}

impl FsKeyedStore {
    /// Open (and create if needed) the directory holding the records.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root: PathBuf = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Io {
                key: root.display().to_string(),
                source,
            })?;
        Ok(Self {
            root: Arc::from(root.as_path()),
        })
    }

    /// Directory the records live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl KeyedStore for FsKeyedStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        let key = key.to_string();
        let target = self.record_path(&key);
        let staging = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));
        Box::pin(async move {
            let target = target?;
            // The rename replaces the old record in one step, so readers never
            // see a shorter value layered over the tail of a longer one.
            fs::write(&staging, &bytes)
                .await
                .map_err(|source| StorageError::Io {
                    key: key.clone(),
                    source,
                })?;
            if let Err(source) = fs::rename(&staging, &target).await {
                let _ = fs::remove_file(&staging).await;
                return Err(StorageError::Io { key, source });
            }
            debug!(key = %key, bytes = bytes.len(), "record written");
            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'static, StorageResult<Vec<u8>>> {
        let key = key.to_string();
        let target = self.record_path(&key);
        Box::pin(async move {
            let target = target?;
            fs::read(&target)
                .await
                .map_err(|source| StorageError::io(key, source))
        })
    }

    fn contains(&self, key: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let key = key.to_string();
        let target = self.record_path(&key);
        Box::pin(async move {
            match target {
                Ok(target) => fs::try_exists(&target)
                    .await
                    .map_err(|source| StorageError::Io { key, source }),
                // A key that cannot exist on disk is simply not contained.
                Err(StorageError::InvalidKey { .. }) => Ok(false),
                Err(err) => Err(err),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let root = self.root.clone();
        Box::pin(async move {
            let metadata = fs::metadata(&root)
                .await
                .map_err(|source| StorageError::Io {
                    key: root.display().to_string(),
                    source,
                })?;
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(StorageError::Io {
                    key: root.display().to_string(),
                    source: std::io::Error::other("storage root is not a directory"),
                })
            }
        })
    }
}
