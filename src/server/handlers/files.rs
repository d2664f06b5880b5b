use crate::delivery::{file_in_dir, file_response};
use crate::download::{is_partial, WORK_DIR_NAME};
use crate::error::Result;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

#[derive(Serialize)]
pub struct FileEntry {
    filename: String,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct FileListResponse {
    success: bool,
    files: Vec<FileEntry>,
    count: usize,
}

/// `GET /api/download-file/{filename}`
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response> {
    let path = file_in_dir(state.downloads.download_dir(), &filename)?;
    let name = filename.as_str();

    if name == WORK_DIR_NAME || !path.is_file() {
        warn!("Requested file not found: {}", name);
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": "File not found",
                "requestedFile": name,
            })),
        )
            .into_response());
    }

    file_response(&path, name, false).await
}

/// `GET /api/files`: finished downloads, newest first.
pub async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<FileListResponse>> {
    let dir = state.downloads.download_dir();
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(FileListResponse {
                success: true,
                files,
                count: 0,
            }))
        }
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if filename.starts_with('.') || is_partial(&filename) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!("Skipping {}: {}", filename, e);
                continue;
            }
        };

        files.push(FileEntry {
            filename,
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    let count = files.len();

    Ok(Json(FileListResponse {
        success: true,
        files,
        count,
    }))
}
