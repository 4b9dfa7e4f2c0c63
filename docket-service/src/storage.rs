//! Blob storage for uploaded files.
//!
//! The pipeline only needs put/get/delete by relative path, so storage is a
//! trait; the service ships a filesystem implementation rooted in the data
//! directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{StorageError, ServiceResult};

/// Key-value blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> ServiceResult<()>;
    async fn get(&self, path: &str) -> ServiceResult<Bytes>;
    async fn delete(&self, path: &str) -> ServiceResult<()>;
}

/// Blob store backed by a directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> ServiceResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> ServiceResult<()> {
        let target = self.resolve(path)?;
        let key = path.to_string();
        debug!(path = %path, size = data.len(), content_type = %content_type, "Storing blob");

        // Write to a temp file in the target directory, then rename into place
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let io_err = |source| StorageError::Io {
                path: key.clone(),
                source,
            };
            let parent = target.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(parent).map_err(io_err)?;
            let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
            temp.write_all(&data).map_err(io_err)?;
            temp.persist(&target).map_err(|e| io_err(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io {
            path: path.to_string(),
            source: std::io::Error::other(e),
        })??;

        Ok(())
    }

    async fn get(&self, path: &str) -> ServiceResult<Bytes> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }
            .into()),
            Err(e) => Err(StorageError::Io {
                path: path.to_string(),
                source: e,
            }
            .into()),
        }
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            // Deleting a missing blob is not an error
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                path: path.to_string(),
                source: e,
            }
            .into()),
        }
    }
}

/// In-memory blob store for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: dashmap::DashMap<String, Bytes>,
}

#[cfg(test)]
impl MemoryBlobStore {
    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }
}

#[cfg(test)]
#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, data: Bytes, _content_type: &str) -> ServiceResult<()> {
        self.blobs.insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> ServiceResult<Bytes> {
        self.blobs
            .get(path)
            .map(|b| b.value().clone())
            .ok_or_else(|| {
                StorageError::NotFound {
                    path: path.to_string(),
                }
                .into()
            })
    }

    async fn delete(&self, path: &str) -> ServiceResult<()> {
        self.blobs.remove(path);
        Ok(())
    }
}
