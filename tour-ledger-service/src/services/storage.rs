use crate::services::store::BlobStore;
use async_trait::async_trait;
use service_core::error::AppError;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Blob store rooted at a local directory.
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self { base_path })
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid blob path: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::StorageError(anyhow::anyhow!("Failed to create {:?}: {}", parent, e))
            })?;
        }
        fs::write(&path, data).await.map_err(|e| {
            AppError::StorageError(anyhow::anyhow!("Upload to {} failed: {}", key, e))
        })?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                AppError::StorageError(anyhow::anyhow!("Removal of {} failed: {}", key, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tour-ledger-blobs-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn upload_then_remove() {
        let root = scratch_dir();
        let store = LocalBlobStore::new(&root).await.unwrap();

        store
            .upload("user-1/booking-1/invoice.pdf", b"%PDF".to_vec())
            .await
            .unwrap();
        assert!(root.join("user-1/booking-1/invoice.pdf").exists());

        store.remove("user-1/booking-1/invoice.pdf").await.unwrap();
        assert!(!root.join("user-1/booking-1/invoice.pdf").exists());

        // Removing a missing blob is not an error.
        store.remove("user-1/booking-1/invoice.pdf").await.unwrap();

        let _ = fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn rejects_paths_escaping_the_root() {
        let root = scratch_dir();
        let store = LocalBlobStore::new(&root).await.unwrap();

        let err = store.upload("../outside.pdf", vec![1]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.remove("/etc/passwd").await.is_err());

        let _ = fs::remove_dir_all(&root).await;
    }
}
