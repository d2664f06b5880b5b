//! One download request from validation to a file in the download directory.

use super::{DownloadAttempt, Invoker, Reconciler, ResolutionTier, ResolvedFile};
use crate::config::{ReconcilerSettings, Settings};
use crate::error::{GatewayError, Result};
use regex::Regex;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Name of the directory holding per-request work directories.
pub const WORK_DIR_NAME: &str = ".work";

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("Invalid regex"));

/// A finished download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub request_id: Uuid,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub tier: ResolutionTier,
    pub ambiguous: bool,
}

/// Runs downloads into a shared download directory.
///
/// With request isolation each attempt gets its own work directory, so the
/// before/after diff only ever sees that attempt's files. The result is then
/// moved up into the download directory. Without isolation attempts share
/// the download directory and are serialised.
pub struct DownloadService {
    download_dir: PathBuf,
    invoker: Invoker,
    reconciler: ReconcilerSettings,
    isolate_requests: bool,
    platforms: Vec<String>,
    shared_dir_lock: Mutex<()>,
}

impl DownloadService {
    pub fn new(settings: &Settings) -> Self {
        Self {
            download_dir: settings.download_dir(),
            invoker: Invoker::new(&settings.downloader),
            reconciler: settings.reconciler.clone(),
            isolate_requests: settings.downloader.isolate_requests,
            platforms: settings
                .downloader
                .supported_platforms
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            shared_dir_lock: Mutex::new(()),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Check a download request before anything is spawned.
    pub fn validate(&self, url: &str, platform: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(GatewayError::InvalidInput("URL is required".into()));
        }
        if platform.trim().is_empty() {
            return Err(GatewayError::InvalidInput("Platform is required".into()));
        }
        if !URL_PATTERN.is_match(url.trim()) {
            return Err(GatewayError::InvalidInput("Invalid URL format".into()));
        }
        if !self.platforms.contains(&platform.trim().to_lowercase()) {
            return Err(GatewayError::InvalidInput(format!(
                "Unsupported platform. Supported platforms: {}",
                self.platforms.join(", ")
            )));
        }
        Ok(())
    }

    /// Download `url` and return the file it produced.
    #[instrument(skip(self), fields(url = %url, platform = %platform))]
    pub async fn download(&self, url: &str, platform: &str) -> Result<DownloadOutcome> {
        self.validate(url, platform)?;
        let url = url.trim();
        std::fs::create_dir_all(&self.download_dir)?;

        let request_id = Uuid::new_v4();
        info!("Starting download {}", request_id);

        let (resolved, ambiguous) = if self.isolate_requests {
            self.download_isolated(request_id, url).await?
        } else {
            let _guard = self.shared_dir_lock.lock().await;
            self.run_attempt(request_id, url, &self.download_dir).await?
        };

        let size_bytes = std::fs::metadata(&resolved.path)?.len();
        info!("Download {} ready: {} ({} bytes)", request_id, resolved.file_name, size_bytes);

        Ok(DownloadOutcome {
            request_id,
            file_name: resolved.file_name,
            path: resolved.path,
            size_bytes,
            tier: resolved.tier,
            ambiguous,
        })
    }

    async fn run_attempt(
        &self,
        request_id: Uuid,
        url: &str,
        output_dir: &Path,
    ) -> Result<(ResolvedFile, bool)> {
        let mut attempt = DownloadAttempt::begin_with_id(request_id, url, output_dir)?;

        let output = self.invoker.invoke(url, output_dir).await?;
        attempt.raw_tool_output = output.stdout;

        let reconciler = Reconciler::new(output_dir, &self.reconciler);
        let resolved = reconciler.reconcile(&mut attempt).await?;
        if attempt.ambiguous {
            warn!("Download {} matched more than one candidate file", request_id);
        }
        Ok((resolved, attempt.ambiguous))
    }

    async fn download_isolated(&self, request_id: Uuid, url: &str) -> Result<(ResolvedFile, bool)> {
        let work_dir = self
            .download_dir
            .join(WORK_DIR_NAME)
            .join(request_id.to_string());
        std::fs::create_dir_all(&work_dir)?;

        let result = match self.run_attempt(request_id, url, &work_dir).await {
            Ok((resolved, ambiguous)) => promote(&resolved, &self.download_dir, request_id)
                .map(|path| {
                    let file_name = file_name_of(&path).unwrap_or(resolved.file_name);
                    (
                        ResolvedFile {
                            file_name,
                            path,
                            tier: resolved.tier,
                        },
                        ambiguous,
                    )
                }),
            Err(e) => Err(e),
        };

        if let Err(e) = std::fs::remove_dir_all(&work_dir) {
            warn!("Failed to remove work directory {}: {}", work_dir.display(), e);
        }

        result
    }
}

/// Move a resolved file from its work directory into `dest_dir`.
///
/// The file is hard-linked under its own name, or under the request id
/// prefixed name when that is taken. Linking fails instead of replacing, so
/// concurrent requests producing the same title never overwrite each other.
fn promote(resolved: &ResolvedFile, dest_dir: &Path, request_id: Uuid) -> Result<PathBuf> {
    let short_id = &request_id.simple().to_string()[..8];
    let candidates = [
        dest_dir.join(&resolved.file_name),
        dest_dir.join(format!("{}-{}", short_id, resolved.file_name)),
    ];

    for target in candidates {
        match place_exclusive(&resolved.path, &target) {
            Ok(()) => {
                debug!("Moved {} to {}", resolved.path.display(), target.display());
                if let Err(e) = std::fs::remove_file(&resolved.path) {
                    debug!("Work copy {} not removed: {}", resolved.path.display(), e);
                }
                return Ok(target);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} is taken", target.display());
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(GatewayError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free name for {}", resolved.file_name),
    )))
}

/// Create `target` from `source` without ever replacing an existing file.
/// Filesystems without hard links get an exclusive copy.
fn place_exclusive(source: &Path, target: &Path) -> std::io::Result<()> {
    match std::fs::hard_link(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            debug!("Hard link failed ({}), copying instead", e);
            let mut input = std::fs::File::open(source)?;
            let mut output = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target)?;
            if let Err(e) = std::io::copy(&mut input, &mut output) {
                drop(output);
                let _ = std::fs::remove_file(target);
                return Err(e);
            }
            Ok(())
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(String::from)
}
