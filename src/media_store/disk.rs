/// Disk-based media backend
use crate::{
    error::{MarketError, MarketResult},
    media_store::MediaBackend,
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Disk storage backend
///
/// Files are sharded into subdirectories named after the first two
/// characters of their random part, so `banner_3fa1...webp` lands in
/// `{base}/3f/banner_3fa1...webp`.
#[derive(Clone)]
pub struct DiskMediaBackend {
    base_path: PathBuf,
}

impl DiskMediaBackend {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn media_path(&self, name: &str) -> PathBuf {
        let random_part = name.rsplit('_').next().unwrap_or(name);
        match random_part.get(0..2) {
            Some(shard) => self.base_path.join(shard).join(name),
            None => self.base_path.join("_").join(name),
        }
    }
}

#[async_trait]
impl MediaBackend for DiskMediaBackend {
    async fn put(&self, name: &str, data: Vec<u8>) -> MarketResult<()> {
        let path = self.media_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MarketError::MediaStorage(format!("Failed to create media directory: {}", e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| MarketError::MediaStorage(format!("Failed to write {}: {}", name, e)))
    }

    async fn get(&self, name: &str) -> MarketResult<Option<Vec<u8>>> {
        match fs::read(self.media_path(name)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MarketError::MediaStorage(format!(
                "Failed to read {}: {}",
                name, e
            ))),
        }
    }

    async fn delete(&self, name: &str) -> MarketResult<()> {
        match fs::remove_file(self.media_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MarketError::MediaStorage(format!(
                "Failed to delete {}: {}",
                name, e
            ))),
        }
    }

    async fn exists(&self, name: &str) -> MarketResult<bool> {
        Ok(fs::try_exists(self.media_path(name)).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let backend = DiskMediaBackend::new(dir.path().to_path_buf());

        backend.put("ab12cd.png", b"png bytes".to_vec()).await.unwrap();
        assert_eq!(
            backend.get("ab12cd.png").await.unwrap(),
            Some(b"png bytes".to_vec())
        );
        assert!(backend.exists("ab12cd.png").await.unwrap());

        backend.delete("ab12cd.png").await.unwrap();
        assert!(!backend.exists("ab12cd.png").await.unwrap());
        assert_eq!(backend.get("ab12cd.png").await.unwrap(), None);

        // Deleting twice is fine
        backend.delete("ab12cd.png").await.unwrap();
    }

    #[test]
    fn test_sharding_skips_prefix() {
        let backend = DiskMediaBackend::new(PathBuf::from("/uploads"));
        assert_eq!(
            backend.media_path("banner_3fa1.webp"),
            PathBuf::from("/uploads/3f/banner_3fa1.webp")
        );
        assert_eq!(
            backend.media_path("9c0d.jpg"),
            PathBuf::from("/uploads/9c/9c0d.jpg")
        );
    }
}
