//! Directory-backed object store.

use super::{encode_key, validate_key, ObjectStore};
use crate::config::StorageProvider;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Stores objects as files under a root directory that is published
/// elsewhere (a static file server or CDN) under `base_url`.
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_key(key)?))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, encode_key(key))
    }

    async fn upload(&self, local_path: &Path, key: &str, _content_type: &str) -> Result<String> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = tokio::fs::copy(local_path, &target).await?;
        info!("Stored {} ({} bytes)", key, bytes);
        Ok(self.public_url(key))
    }

    async fn download_to(&self, key: &str, local_path: &Path) -> Result<u64> {
        let source = self.object_path(key)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(GatewayError::NotFound(format!("Object not found: {}", key)));
        }
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(tokio::fs::copy(&source, local_path).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)?).await?)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.object_path(key)?).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_object_store() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("clip.mp4");
        std::fs::write(&source, b"video-bytes").unwrap();

        let store = LocalObjectStore::new(root.path(), "https://cdn.example/objects/");

        let url = store
            .upload(&source, "downloads/clip.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/objects/downloads/clip.mp4");
        assert!(store.exists("downloads/clip.mp4").await.unwrap());

        let key = store.key_from_url(&url).unwrap();
        let copy = scratch.path().join("back").join("clip.mp4");
        assert_eq!(store.download_to(&key, &copy).await.unwrap(), 11);
        assert_eq!(std::fs::read(&copy).unwrap(), b"video-bytes");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_public_url_is_encoded() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let source = scratch.path().join("clip.mp4");
        std::fs::write(&source, b"x").unwrap();
        let store = LocalObjectStore::new(root.path(), "https://cdn.example");

        let url = store
            .upload(&source, "downloads/Top 10 #shorts.mp4", "video/mp4")
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/downloads/Top%2010%20%23shorts.mp4");
        assert!(root.path().join("downloads/Top 10 #shorts.mp4").exists());
        assert_eq!(
            store.key_from_url(&url).as_deref(),
            Some("downloads/Top 10 #shorts.mp4")
        );
    }

    #[tokio::test]
    async fn test_missing_object_and_bad_keys() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(root.path(), "https://cdn.example");

        let err = store
            .download_to("downloads/none.mp4", &root.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));

        assert!(store.exists("../escape").await.is_err());
        assert!(store.key_from_url("https://other.example/downloads/a.mp4").is_none());
    }
}
