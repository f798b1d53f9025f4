/// Uploaded media storage
///
/// Listing images and banner media are validated against an allow-list,
/// sniffed so the bytes match the declared type, and written under a random
/// name through a [`MediaBackend`].

pub mod disk;

use crate::{
    config::StorageConfig,
    error::{MarketError, MarketResult},
    metrics,
};
use async_trait::async_trait;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub use disk::DiskMediaBackend;

/// Public path prefix under which stored media is served
pub const MEDIA_URL_PREFIX: &str = "/api/uploads";

/// Media storage backend
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn put(&self, name: &str, data: Vec<u8>) -> MarketResult<()>;

    async fn get(&self, name: &str) -> MarketResult<Option<Vec<u8>>>;

    async fn delete(&self, name: &str) -> MarketResult<()>;

    async fn exists(&self, name: &str) -> MarketResult<bool>;
}

/// Which upload endpoint the file came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Ad images
    Listing,
    /// Admin banner media: images or short videos
    Banner,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Listing => "listing",
            UploadKind::Banner => "banner",
        }
    }

    fn rejection(&self) -> &'static str {
        match self {
            UploadKind::Listing => "Invalid file type. Allowed: JPG, PNG, WebP, GIF",
            UploadKind::Banner => "Invalid file type. Allowed: JPG, PNG, WebP, GIF, MP4, WebM",
        }
    }
}

/// Accepted content types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Mp4,
    Webm,
}

impl MediaFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaFormat::Jpeg),
            "image/png" => Some(MediaFormat::Png),
            "image/webp" => Some(MediaFormat::Webp),
            "image/gif" => Some(MediaFormat::Gif),
            "video/mp4" => Some(MediaFormat::Mp4),
            "video/webm" => Some(MediaFormat::Webm),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaFormat::Jpeg),
            "png" => Some(MediaFormat::Png),
            "webp" => Some(MediaFormat::Webp),
            "gif" => Some(MediaFormat::Gif),
            "mp4" => Some(MediaFormat::Mp4),
            "webm" => Some(MediaFormat::Webm),
            _ => None,
        }
    }

    /// Identify the format from the file's leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            return Some(MediaFormat::Mp4);
        }
        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Some(MediaFormat::Webm);
        }

        match image::guess_format(data).ok()? {
            ImageFormat::Jpeg => Some(MediaFormat::Jpeg),
            ImageFormat::Png => Some(MediaFormat::Png),
            ImageFormat::WebP => Some(MediaFormat::Webp),
            ImageFormat::Gif => Some(MediaFormat::Gif),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Webm => "video/webm",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Jpeg => "jpg",
            MediaFormat::Png => "png",
            MediaFormat::Webp => "webp",
            MediaFormat::Gif => "gif",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Webm => "webm",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaFormat::Mp4 | MediaFormat::Webm)
    }
}

/// Response for a stored upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMedia {
    pub url: String,
    pub filename: String,
    pub is_video: bool,
    pub content_type: String,
}

/// Media store: validation in front of a backend
#[derive(Clone)]
pub struct MediaStore {
    backend: Arc<dyn MediaBackend>,
    image_limit: usize,
    video_limit: usize,
}

impl MediaStore {
    pub fn new(backend: Arc<dyn MediaBackend>, image_limit: usize, video_limit: usize) -> Self {
        Self {
            backend,
            image_limit,
            video_limit,
        }
    }

    /// Disk-backed store rooted at the configured upload directory
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(
            Arc::new(DiskMediaBackend::new(storage.upload_directory.clone())),
            storage.image_upload_limit,
            storage.video_upload_limit,
        )
    }

    /// Largest upload any endpoint accepts
    pub fn max_upload_size(&self) -> usize {
        self.image_limit.max(self.video_limit)
    }

    /// Validate and store an upload under a fresh random name
    pub async fn store(
        &self,
        kind: UploadKind,
        declared_type: Option<&str>,
        data: Vec<u8>,
    ) -> MarketResult<StoredMedia> {
        let format = declared_type
            .and_then(MediaFormat::from_content_type)
            .filter(|f| kind == UploadKind::Banner || !f.is_video())
            .ok_or_else(|| MarketError::Validation(kind.rejection().to_string()))?;

        let limit = if format.is_video() {
            self.video_limit
        } else {
            self.image_limit
        };
        if data.len() > limit {
            return Err(MarketError::Validation(format!(
                "File too large. Max: {}MB",
                limit / (1024 * 1024)
            )));
        }

        if MediaFormat::sniff(&data) != Some(format) {
            return Err(MarketError::Validation(
                "File content does not match its declared type".to_string(),
            ));
        }

        let random = Uuid::new_v4().simple().to_string();
        let filename = match kind {
            UploadKind::Listing => format!("{}.{}", random, format.extension()),
            UploadKind::Banner => format!("banner_{}.{}", random, format.extension()),
        };

        self.backend.put(&filename, data).await?;
        metrics::record_upload(kind.as_str());
        tracing::info!("Stored {} upload {}", kind.as_str(), filename);

        Ok(StoredMedia {
            url: format!("{}/{}", MEDIA_URL_PREFIX, filename),
            filename,
            is_video: format.is_video(),
            content_type: format.content_type().to_string(),
        })
    }

    /// Stored bytes and content type; `None` for unknown or malformed names
    pub async fn open(&self, filename: &str) -> MarketResult<Option<(Vec<u8>, &'static str)>> {
        if !is_safe_name(filename) {
            return Ok(None);
        }

        let content_type = filename
            .rsplit_once('.')
            .and_then(|(_, ext)| MediaFormat::from_extension(ext))
            .map(|f| f.content_type())
            .unwrap_or("application/octet-stream");

        Ok(self
            .backend
            .get(filename)
            .await?
            .map(|data| (data, content_type)))
    }

    pub async fn delete(&self, filename: &str) -> MarketResult<()> {
        if !is_safe_name(filename) {
            return Err(MarketError::Validation("Invalid filename".to_string()));
        }
        self.backend.delete(filename).await
    }
}

/// Names this store generates: ASCII alphanumerics, `_` and a single extension dot
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name.matches('.').count() <= 1
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PNG: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];
    const MP4: &[u8] = &[0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'm', b'p', b'4', b'2'];

    fn store(dir: &std::path::Path) -> MediaStore {
        MediaStore::new(Arc::new(DiskMediaBackend::new(dir.to_path_buf())), 64, 128)
    }

    #[test]
    fn test_sniff() {
        assert_eq!(MediaFormat::sniff(PNG), Some(MediaFormat::Png));
        assert_eq!(MediaFormat::sniff(MP4), Some(MediaFormat::Mp4));
        assert_eq!(
            MediaFormat::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            Some(MediaFormat::Webm)
        );
        assert_eq!(MediaFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(MediaFormat::Jpeg));
        assert_eq!(MediaFormat::sniff(b"plain text"), None);
    }

    #[tokio::test]
    async fn test_store_and_open_listing_image() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let stored = store
            .store(UploadKind::Listing, Some("image/png"), PNG.to_vec())
            .await
            .unwrap();
        assert!(stored.filename.ends_with(".png"));
        assert_eq!(stored.url, format!("/api/uploads/{}", stored.filename));
        assert!(!stored.is_video);

        let (data, content_type) = store.open(&stored.filename).await.unwrap().unwrap();
        assert_eq!(data, PNG);
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn test_listing_rejects_video_and_mismatch() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        assert!(matches!(
            store.store(UploadKind::Listing, Some("video/mp4"), MP4.to_vec()).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            store.store(UploadKind::Listing, Some("image/jpeg"), PNG.to_vec()).await,
            Err(MarketError::Validation(_))
        ));
        assert!(matches!(
            store.store(UploadKind::Listing, None, PNG.to_vec()).await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_banner_video_and_size_limits() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let stored = store
            .store(UploadKind::Banner, Some("video/mp4"), MP4.to_vec())
            .await
            .unwrap();
        assert!(stored.is_video);
        assert!(stored.filename.starts_with("banner_"));

        let mut big_image = PNG.to_vec();
        big_image.resize(65, 0);
        match store
            .store(UploadKind::Banner, Some("image/png"), big_image)
            .await
            .unwrap_err()
        {
            MarketError::Validation(msg) => assert!(msg.starts_with("File too large")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.open("../secret").await.unwrap().is_none());
        assert!(store.open("a/b.png").await.unwrap().is_none());
        assert!(store.open("missing.png").await.unwrap().is_none());
    }
}
