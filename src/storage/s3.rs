//! Object store backed by Amazon S3 or an S3-compatible service.

use super::{encode_key, validate_key, ObjectStore};
use crate::config::{StorageProvider, StorageSettings};
use crate::delivery::content_disposition;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Stores objects in one bucket using SigV4-signed requests.
///
/// Credentials and region come from [`StorageSettings`], which picks up the
/// usual `AWS_*` variables. With `presign_urls` set, uploads hand back a
/// presigned GET URL instead of the plain object URL.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base: String,
    presign_expiry: Option<Duration>,
}

impl S3ObjectStore {
    pub fn from_settings(storage: &StorageSettings) -> Result<Self> {
        let bucket = storage.bucket.trim();
        if bucket.is_empty() {
            return Err(GatewayError::Config(
                "storage.bucket (AWS_S3_BUCKET) is required for the s3 provider".into(),
            ));
        }

        let (Some(key_id), Some(secret)) = (
            storage.access_key_id.as_deref(),
            storage.secret_access_key.as_deref(),
        ) else {
            return Err(GatewayError::Config(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY are required for the s3 provider".into(),
            ));
        };

        let region = storage.region.trim().to_string();
        let credentials = Credentials::new(
            key_id,
            secret,
            storage.session_token.clone(),
            None,
            "vidgate-settings",
        );

        let mut config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .force_path_style(storage.force_path_style);

        let endpoint = storage.endpoint.trim().trim_end_matches('/');
        let public_base = if endpoint.is_empty() {
            format!("https://{}.s3.{}.amazonaws.com", bucket, region)
        } else {
            config = config.endpoint_url(endpoint);
            custom_endpoint_base(endpoint, bucket, storage.force_path_style)?
        };

        Ok(Self {
            client: Client::from_conf(config.build()),
            bucket: bucket.to_string(),
            public_base,
            presign_expiry: storage.presign_urls.then(|| storage.presign_expiry()),
        })
    }
}

/// Object URL prefix for a custom endpoint: `<endpoint>/<bucket>` in path
/// style, `<scheme>://<bucket>.<host>` otherwise.
fn custom_endpoint_base(endpoint: &str, bucket: &str, path_style: bool) -> Result<String> {
    let mut url = url::Url::parse(endpoint)
        .map_err(|e| GatewayError::Config(format!("Invalid storage endpoint: {}", e)))?;

    if path_style {
        return Ok(format!("{}/{}", endpoint, bucket));
    }

    let host = url
        .host_str()
        .ok_or_else(|| GatewayError::Config(format!("Storage endpoint has no host: {}", endpoint)))?
        .to_string();
    url.set_host(Some(&format!("{}.{}", bucket, host)))
        .map_err(|e| GatewayError::Config(format!("Invalid bucket host: {}", e)))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn sdk_failure<E>(action: &str, key: &str, err: SdkError<E>) -> GatewayError
where
    E: std::error::Error + 'static,
{
    GatewayError::Storage(format!("{} {} failed: {}", action, key, DisplayErrorContext(&err)))
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    err.raw_response()
        .is_some_and(|response| response.status().as_u16() == 404)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::S3
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, encode_key(key))
    }

    #[instrument(skip(self, local_path))]
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let disposition = content_disposition(&file_name)?;

        let body = ByteStream::from_path(local_path).await.map_err(|e| {
            GatewayError::Storage(format!("Cannot read {}: {}", local_path.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_disposition(disposition.to_str().unwrap_or("attachment"))
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_failure("Upload of", key, e))?;

        info!("Uploaded {} to bucket {}", key, self.bucket);
        match self.presign_expiry {
            Some(expires) => self.presigned_url(key, expires).await,
            None => Ok(self.public_url(key)),
        }
    }

    async fn presigned_url(&self, key: &str, expires: Duration) -> Result<String> {
        validate_key(key)?;
        let config = PresigningConfig::expires_in(expires)
            .map_err(|e| GatewayError::Storage(format!("Invalid presign expiry: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition("attachment")
            .presigned(config)
            .await
            .map_err(|e| sdk_failure("Presigning", key, e))?;

        Ok(request.uri().to_string())
    }

    async fn download_to(&self, key: &str, local_path: &Path) -> Result<u64> {
        validate_key(key)?;
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if is_not_found(&e) => {
                return Err(GatewayError::NotFound(format!("Object not found: {}", key)))
            }
            Err(e) => return Err(sdk_failure("Download of", key, e)),
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut reader = output.body.into_async_read();
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        debug!("Fetched {} into {:?} ({} bytes)", key, local_path, written);
        Ok(written)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(sdk_failure("Lookup of", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(sdk_failure("Delete of", key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path as UrlPath, State},
        http::StatusCode,
        routing::get,
        Router,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn storage(endpoint: &str, path_style: bool) -> StorageSettings {
        StorageSettings {
            provider: StorageProvider::S3,
            endpoint: endpoint.to_string(),
            bucket: "media".into(),
            region: "eu-west-1".into(),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into()),
            force_path_style: path_style,
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_bucket_and_credentials() {
        let mut settings = storage("", false);
        settings.bucket = " ".into();
        assert!(matches!(
            S3ObjectStore::from_settings(&settings),
            Err(GatewayError::Config(_))
        ));

        let mut settings = storage("", false);
        settings.secret_access_key = None;
        assert!(matches!(
            S3ObjectStore::from_settings(&settings),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_public_urls() {
        let aws = S3ObjectStore::from_settings(&storage("", false)).unwrap();
        assert_eq!(
            aws.public_url("downloads/a b.mp4"),
            "https://media.s3.eu-west-1.amazonaws.com/downloads/a%20b.mp4"
        );

        let minio = S3ObjectStore::from_settings(&storage("http://127.0.0.1:9000/", true)).unwrap();
        assert_eq!(
            minio.public_url("downloads/a.mp4"),
            "http://127.0.0.1:9000/media/downloads/a.mp4"
        );

        let r2 = S3ObjectStore::from_settings(&storage("https://acct.r2.example", false)).unwrap();
        assert_eq!(
            r2.public_url("downloads/a.mp4"),
            "https://media.acct.r2.example/downloads/a.mp4"
        );
    }

    #[tokio::test]
    async fn test_presigned_url_is_signed_and_maps_back_to_key() {
        let store = S3ObjectStore::from_settings(&storage("http://127.0.0.1:9000", true)).unwrap();
        let key = "downloads/Top 10 #shorts.mp4";

        let url = store
            .presigned_url(key, Duration::from_secs(600))
            .await
            .unwrap();

        assert!(
            url.starts_with("http://127.0.0.1:9000/media/downloads/Top%2010%20%23shorts.mp4?"),
            "{url}"
        );
        assert!(url.contains("X-Amz-Expires=600"), "{url}");
        assert!(url.contains("X-Amz-Signature="), "{url}");
        assert!(url.contains("AKIDEXAMPLE"), "{url}");
        assert_eq!(store.key_from_url(&url).as_deref(), Some(key));

        assert!(store.presigned_url("../x", Duration::from_secs(60)).await.is_err());
    }

    type Bucket = Arc<Mutex<HashMap<String, Vec<u8>>>>;

    async fn get_object(
        State(bucket): State<Bucket>,
        UrlPath(key): UrlPath<String>,
    ) -> std::result::Result<Vec<u8>, StatusCode> {
        bucket.lock().get(&key).cloned().ok_or(StatusCode::NOT_FOUND)
    }

    async fn delete_object(State(bucket): State<Bucket>, UrlPath(key): UrlPath<String>) -> StatusCode {
        bucket.lock().remove(&key);
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn test_reads_and_deletes_against_compatible_endpoint() {
        let bucket: Bucket = Arc::default();
        bucket
            .lock()
            .insert("downloads/clip.mp4".into(), b"0123456789".to_vec());
        let app = Router::new()
            .route("/media/{*key}", get(get_object).delete(delete_object))
            .with_state(bucket.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let store =
            S3ObjectStore::from_settings(&storage(&format!("http://{}", addr), true)).unwrap();

        assert!(store.exists("downloads/clip.mp4").await.unwrap());
        assert!(!store.exists("downloads/missing.mp4").await.unwrap());

        let scratch = tempfile::tempdir().unwrap();
        let copy = scratch.path().join("copy.mp4");
        assert_eq!(store.download_to("downloads/clip.mp4", &copy).await.unwrap(), 10);
        assert_eq!(std::fs::read(&copy).unwrap(), b"0123456789");

        let err = store
            .download_to("downloads/missing.mp4", &copy)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));

        store.delete("downloads/clip.mp4").await.unwrap();
        assert!(bucket.lock().is_empty());
    }
}
