use super::json_body;
use crate::delivery::{content_type_for, encode_component, file_response, remove_quietly};
use crate::download::DownloadOutcome;
use crate::error::Result;
use crate::server::AppState;
use crate::storage::object_key;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DOWNLOAD_READY_MESSAGE: &str = "click the below link to download your file";

#[derive(Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    platform: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    success: bool,
    message: &'static str,
    file_name: String,
    file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s3_url: Option<String>,
}

async fn run_download(state: &AppState, body: DownloadBody) -> Result<DownloadOutcome> {
    let url = body.url.unwrap_or_default();
    let platform = body.platform.unwrap_or_default();
    state.downloads.download(&url, &platform).await
}

/// `POST /api/yt-download`: download, then point the caller at the file.
///
/// With an object store configured the file is relayed there and the store
/// URL is returned instead of a local download link.
pub async fn download(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Json<DownloadResponse>> {
    let outcome = run_download(&state, json_body(body)?).await?;

    let mut response = DownloadResponse {
        success: true,
        message: DOWNLOAD_READY_MESSAGE,
        file_name: outcome.file_name.clone(),
        file_size: outcome.size_bytes,
        download_url: None,
        s3_url: None,
    };

    match &state.store {
        Some(store) => {
            let key = object_key(&outcome.file_name);
            let url = store
                .upload(&outcome.path, &key, &content_type_for(&outcome.path))
                .await?;
            info!("Relayed {} to {}", outcome.file_name, url);
            if state.settings.storage.remove_local_after_upload {
                remove_quietly(&outcome.path);
            }
            response.s3_url = Some(url);
        }
        None => {
            response.download_url = Some(format!(
                "/api/download-file/{}",
                encode_component(&outcome.file_name)
            ));
        }
    }

    Ok(Json(response))
}

/// `POST /api/yt-download/stream`: download and stream the file back in the
/// same response, removing it afterwards.
pub async fn download_stream(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<DownloadBody>, JsonRejection>,
) -> Result<Response> {
    let outcome = run_download(&state, json_body(body)?).await?;
    info!("Streaming {} ({} bytes)", outcome.file_name, outcome.size_bytes);
    file_response(&outcome.path, &outcome.file_name, true).await
}
