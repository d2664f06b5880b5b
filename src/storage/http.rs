//! Object store speaking plain HTTP verbs against a bucket endpoint.

use super::{encode_key, validate_key, ObjectStore};
use crate::config::StorageProvider;
use crate::delivery::content_disposition;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Body, Client, RequestBuilder, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument};

/// Objects live at `<endpoint>/<key>`: PUT uploads, GET downloads, HEAD
/// checks existence and DELETE removes. An optional bearer token is sent with every
/// request.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    public_base: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, public_base: Option<&str>, token: Option<String>) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&endpoint)
            .map_err(|e| GatewayError::Config(format!("Invalid storage endpoint: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            client,
            public_base: public_base
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| endpoint.clone()),
            endpoint,
            token,
        })
    }

    fn object_url(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.endpoint, encode_key(validate_key(key)?)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn storage_failure(action: &str, key: &str, status: StatusCode) -> GatewayError {
    GatewayError::Storage(format!("{} {} failed with status {}", action, key, status))
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Http
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, encode_key(key))
    }

    #[instrument(skip(self, local_path))]
    async fn upload(&self, local_path: &Path, key: &str, content_type: &str) -> Result<String> {
        let url = self.object_url(key)?;
        let file = tokio::fs::File::open(local_path).await?;
        let length = file.metadata().await?.len();
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let disposition = content_disposition(&file_name)?;

        let response = self
            .authorize(self.client.put(&url))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, length)
            .header(header::CONTENT_DISPOSITION, disposition)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(storage_failure("Upload of", key, response.status()));
        }

        info!("Uploaded {} ({} bytes)", key, length);
        Ok(self.public_url(key))
    }

    async fn download_to(&self, key: &str, local_path: &Path) -> Result<u64> {
        let url = self.object_url(key)?;
        let response = self.authorize(self.client.get(&url)).send().await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(GatewayError::NotFound(format!("Object not found: {}", key)))
            }
            s => return Err(storage_failure("Download of", key, s)),
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Fetched {} into {:?} ({} bytes)", key, local_path, written);
        Ok(written)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key)?;
        let response = self.authorize(self.client.head(&url)).send().await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(storage_failure("Lookup of", key, s)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = self.object_url(key)?;
        let response = self.authorize(self.client.delete(&url)).send().await?;

        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => Err(storage_failure("Delete of", key, s)),
        }
    }
}
