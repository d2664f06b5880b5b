//! Object storage abstraction for vidgate.
//!
//! Downloaded files can be relayed to an object store instead of being served
//! from the download directory. Stores hand back a public or presigned URL
//! for each object.

mod http;
mod local;
mod s3;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

use crate::config::{Settings, StorageProvider};
use crate::delivery::encode_component;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Prefix for keys of relayed downloads.
pub const DOWNLOAD_KEY_PREFIX: &str = "downloads";

/// Trait for object storage implementations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Provider this store implements.
    fn provider(&self) -> StorageProvider;

    /// Public URL of an object.
    fn public_url(&self, key: &str) -> String;

    /// Upload a local file and return the URL callers should use for it.
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<String>;

    /// Time-limited URL for an object. Stores without signing fall back to
    /// the public URL.
    async fn presigned_url(&self, key: &str, _expires: Duration) -> Result<String> {
        Ok(self.public_url(validate_key(key)?))
    }

    /// Fetch an object into a local file. Returns the number of bytes written.
    async fn download_to(&self, key: &str, local_path: &Path) -> Result<u64>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Recover the key from a URL produced by [`ObjectStore::public_url`].
    fn key_from_url(&self, url: &str) -> Option<String> {
        let base = self.public_url("");
        let encoded = url.strip_prefix(&base)?;
        let encoded = encoded.split(['?', '#']).next().unwrap_or_default();
        let key = urlencoding::decode(encoded).ok()?;
        validate_key(&key).ok().map(String::from)
    }
}

/// Object key for a downloaded file.
pub fn object_key(file_name: &str) -> String {
    format!("{}/{}", DOWNLOAD_KEY_PREFIX, file_name)
}

/// Percent-encode each segment of a key for use in a URL path. Separators
/// between segments are kept.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject keys that are empty, absolute or escape their prefix.
pub fn validate_key(key: &str) -> Result<&str> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(GatewayError::Storage(format!("Invalid object key: {:?}", key)));
    }
    Ok(key)
}

/// Create the object store selected in settings, if any.
pub fn create_store(settings: &Settings) -> Result<Option<Arc<dyn ObjectStore>>> {
    let store: Arc<dyn ObjectStore> = match settings.storage.provider {
        StorageProvider::None => return Ok(None),
        StorageProvider::Local => Arc::new(LocalObjectStore::new(
            settings.storage_dir(),
            &settings.storage.public_base_url,
        )),
        StorageProvider::Http => {
            if settings.storage.endpoint.trim().is_empty() {
                return Err(GatewayError::Config(
                    "storage.endpoint is required for the http provider".into(),
                ));
            }
            Arc::new(HttpObjectStore::new(
                &settings.storage.endpoint,
                non_empty(&settings.storage.public_base_url),
                settings.storage.token.clone(),
            )?)
        }
        StorageProvider::S3 => Arc::new(S3ObjectStore::from_settings(&settings.storage)?),
    };
    Ok(Some(store))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("downloads/clip.mp4").is_ok());
        for bad in ["", "/abs.mp4", "a/../b", "a//b", "./a", "a\\b", "dir/"] {
            assert!(validate_key(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_encode_key_keeps_separators() {
        assert_eq!(
            encode_key("downloads/Top 10 #shorts?.mp4"),
            "downloads/Top%2010%20%23shorts%3F.mp4"
        );
        assert_eq!(encode_key("downloads/100%.mp4"), "downloads/100%25.mp4");
        assert_eq!(encode_key(""), "");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("clip.mp4"), "downloads/clip.mp4");
    }

    #[test]
    fn test_create_store_by_provider() {
        let mut settings = Settings::default();
        assert!(create_store(&settings).unwrap().is_none());

        settings.storage.provider = StorageProvider::Local;
        let store = create_store(&settings).unwrap().unwrap();
        assert_eq!(store.provider(), StorageProvider::Local);

        settings.storage.provider = StorageProvider::Http;
        assert!(matches!(create_store(&settings), Err(GatewayError::Config(_))));

        settings.storage.endpoint = "http://127.0.0.1:9000/bucket".into();
        settings.storage.public_base_url = String::new();
        let store = create_store(&settings).unwrap().unwrap();
        assert_eq!(store.public_url("k.mp4"), "http://127.0.0.1:9000/bucket/k.mp4");

        settings.storage.provider = StorageProvider::S3;
        assert!(matches!(create_store(&settings), Err(GatewayError::Config(_))));

        settings.storage.endpoint = String::new();
        settings.storage.bucket = "media".into();
        settings.storage.access_key_id = Some("AKIDEXAMPLE".into());
        settings.storage.secret_access_key = Some("secret".into());
        let store = create_store(&settings).unwrap().unwrap();
        assert_eq!(store.provider(), StorageProvider::S3);
        assert_eq!(
            store.public_url("k.mp4"),
            "https://media.s3.us-east-1.amazonaws.com/k.mp4"
        );
    }

    #[tokio::test]
    async fn test_unsigned_stores_presign_to_public_url() {
        let store = LocalObjectStore::new("/srv/objects", "https://cdn.example");
        let url = store
            .presigned_url("downloads/a b.mp4", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/downloads/a%20b.mp4");
        assert!(store.presigned_url("", Duration::from_secs(60)).await.is_err());
    }
}
