//! Returning downloaded files over HTTP.

use crate::error::{GatewayError, Result};
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Content type used when the extension is unknown.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Content type for a media file, guessed from its extension.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Accept a caller-supplied file name only if it is a single path component.
///
/// Dots are fine inside a name (`Wait... what.mp4`); only the `.` and `..`
/// entries themselves are refused.
pub fn sanitize_file_name(name: &str) -> Result<&str> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');

    if invalid {
        return Err(GatewayError::InvalidInput("Invalid filename".into()));
    }
    Ok(name)
}

/// Resolve a caller-supplied file name to a path directly inside `dir`.
pub fn file_in_dir(dir: &Path, name: &str) -> Result<PathBuf> {
    let name = sanitize_file_name(name)?;
    let path = dir.join(name);
    if path.parent() != Some(dir) || path.file_name().and_then(|n| n.to_str()) != Some(name) {
        return Err(GatewayError::InvalidInput("Invalid filename".into()));
    }
    Ok(path)
}

/// Percent-encode a value for use as a single URL path segment.
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// `Content-Disposition` value with an ASCII fallback name and the exact
/// name percent-encoded in `filename*`.
pub fn content_disposition(file_name: &str) -> Result<HeaderValue> {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();
    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        encode_component(file_name)
    ))
    .map_err(|e| GatewayError::InvalidInput(format!("Invalid filename: {}", e)))
}

/// Removes a file when dropped.
///
/// Owned by a response body so the file disappears once the body is finished,
/// fails, or is dropped because the client went away.
#[derive(Debug)]
pub struct CleanupGuard {
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        remove_quietly(&self.path);
    }
}

/// Remove a file, logging instead of failing.
pub fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Stream a file as an attachment.
///
/// With `cleanup` the file is deleted once the body is done with it.
pub async fn file_response(path: &Path, file_name: &str, cleanup: bool) -> Result<Response> {
    let guard = cleanup.then(|| CleanupGuard::new(path));

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GatewayError::NotFound("File not found".into()))
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _owned = &guard;
        chunk
    });

    let mut response = Body::from_stream(stream).into_response();
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, content_disposition(file_name)?);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Ok(value) = HeaderValue::from_str(&content_type_for(path)) {
        headers.insert(header::CONTENT_TYPE, value);
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.webm")), "video/webm");
        assert_eq!(content_type_for(Path::new("a.MKV")), "video/x-matroska");
        assert_eq!(content_type_for(Path::new("noext")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_sanitize_file_name() {
        for good in ["My Clip.mp4", "Wait... what.mp4", "x..mp4", ".hidden.mp4", "..trailing"] {
            assert_eq!(sanitize_file_name(good).unwrap(), good);
        }
        for bad in ["", " ", ".", "..", "../etc/passwd", "a/b.mp4", "a\\b.mp4", "nul\0.mp4"] {
            assert!(sanitize_file_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_file_in_dir() {
        let dir = Path::new("/srv/downloads");
        assert_eq!(
            file_in_dir(dir, "Wait... what.mp4").unwrap(),
            dir.join("Wait... what.mp4")
        );
        assert!(file_in_dir(dir, "..").is_err());
        assert!(file_in_dir(dir, "../downloads/x.mp4").is_err());
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("my clip #1.mp4"), "my%20clip%20%231.mp4");
        assert_eq!(encode_component("a/b"), "a%2Fb");
    }

    #[test]
    fn test_content_disposition_encodes_unicode() {
        let value = content_disposition("Café \"live\".mp4").unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"Caf_ _live_.mp4\""));
        assert!(value.ends_with("filename*=UTF-8''Caf%C3%A9%20%22live%22.mp4"));
    }

    #[tokio::test]
    async fn test_file_response_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.webm");
        std::fs::write(&path, b"webm-data").unwrap();

        let response = file_response(&path, "clip.webm", false).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/webm");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "9");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"webm-data");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_removed_after_body_completes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        let response = file_response(&path, "clip.mp4", true).await.unwrap();
        assert!(path.exists());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"data");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_removed_when_body_dropped_unread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        let response = file_response(&path, "clip.mp4", true).await.unwrap();
        drop(response);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_response(&dir.path().join("gone.mp4"), "gone.mp4", false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
