//! Download result reconciliation.
//!
//! yt-dlp is asked to print the final path of what it wrote, but that line
//! cannot be relied on: depending on the tool version, retries and partial
//! failures it prints zero, one or several path-like lines. The reconciler
//! therefore works from the filesystem first and from the tool output second:
//!
//! 1. **New file**: exactly one file appeared between the before and after
//!    snapshots.
//! 2. **Output line**: a line of tool output names an existing media file
//!    inside the output directory.
//! 3. **Most recent**: the newest file in the directory, if it is younger than
//!    the recency window.
//!
//! The order is load-bearing. Trusting the output over the diff brings back
//! the case where a leftover file from an earlier request is returned.

use super::snapshot::{is_partial, DirectorySnapshot};
use super::DownloadAttempt;
use crate::config::ReconcilerSettings;
use crate::error::{GatewayError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};

/// Which reconciliation tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    NewFile,
    OutputLine,
    MostRecent,
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::NewFile => write!(f, "new-file"),
            ResolutionTier::OutputLine => write!(f, "output-line"),
            ResolutionTier::MostRecent => write!(f, "most-recent"),
        }
    }
}

/// The file chosen as the result of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub file_name: String,
    pub path: PathBuf,
    pub tier: ResolutionTier,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub file: Option<ResolvedFile>,
    /// More than one file qualified as new or recent.
    pub ambiguous: bool,
}

/// Modification time of a regular file, `None` for anything else.
type StatFn = fn(&Path) -> std::io::Result<Option<SystemTime>>;

fn modified_if_file(path: &Path) -> std::io::Result<Option<SystemTime>> {
    let metadata = std::fs::symlink_metadata(path)?;
    if metadata.is_file() {
        metadata.modified().map(Some)
    } else {
        Ok(None)
    }
}

/// Picks the file a download produced out of a directory and tool output.
#[derive(Debug, Clone)]
pub struct Reconciler {
    output_dir: PathBuf,
    settle_delay: Duration,
    recency_window: Duration,
    extensions: Vec<String>,
    stat: StatFn,
}

impl Reconciler {
    pub fn new(output_dir: impl Into<PathBuf>, settings: &ReconcilerSettings) -> Self {
        Self {
            output_dir: output_dir.into(),
            settle_delay: settings.settle_delay(),
            recency_window: settings.recency_window(),
            extensions: settings
                .media_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            stat: modified_if_file,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    #[cfg(test)]
    fn with_stat(mut self, stat: StatFn) -> Self {
        self.stat = stat;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Wait for the filesystem to settle, snapshot the directory again and
    /// resolve the attempt. The outcome is recorded on `attempt`.
    #[instrument(skip_all, fields(attempt = %attempt.id))]
    pub async fn reconcile(&self, attempt: &mut DownloadAttempt) -> Result<ResolvedFile> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let after = DirectorySnapshot::capture(&self.output_dir)?;
        let resolution = self.resolve(
            &attempt.snapshot_before,
            &after,
            &attempt.raw_tool_output,
            SystemTime::now(),
        );

        attempt.snapshot_after = Some(after);
        attempt.ambiguous = resolution.ambiguous;
        attempt.resolved = resolution.file.clone();

        match resolution.file {
            Some(file) => {
                info!("Resolved {} via {} tier", file.file_name, file.tier);
                Ok(file)
            }
            None => {
                warn!("No downloaded file could be identified");
                Err(GatewayError::NoFileFound)
            }
        }
    }

    /// Run the three tiers against the given snapshots and output.
    ///
    /// Reads the filesystem but never modifies it; with the same inputs and
    /// directory contents it returns the same result.
    pub fn resolve(
        &self,
        before: &DirectorySnapshot,
        after: &DirectorySnapshot,
        raw_output: &str,
        now: SystemTime,
    ) -> Resolution {
        let new_files = after.new_since(before);
        let mut ambiguous = new_files.len() > 1;

        if let [only] = new_files.as_slice() {
            let path = self.output_dir.join(only);
            if path.is_file() {
                return Resolution {
                    file: Some(ResolvedFile {
                        file_name: only.clone(),
                        path,
                        tier: ResolutionTier::NewFile,
                    }),
                    ambiguous,
                };
            }
            debug!("New file {} vanished before it could be checked", only);
        } else {
            debug!("{} new files in snapshot diff, scanning tool output", new_files.len());
        }

        if let Some(file) = self.scan_output(raw_output) {
            return Resolution {
                file: Some(file),
                ambiguous,
            };
        }

        let (recent, recent_count) = self.most_recent(now);
        ambiguous |= recent_count > 1;

        Resolution {
            file: recent,
            ambiguous,
        }
    }

    /// Tier 2: the first output line naming an existing media file in the
    /// output directory.
    fn scan_output(&self, raw_output: &str) -> Option<ResolvedFile> {
        let needles = self.dir_needles();

        for line in raw_output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !self.has_media_extension(line) {
                continue;
            }

            let Some(start) = needles.iter().find_map(|n| line.find(n.as_str())) else {
                continue;
            };

            let path = PathBuf::from(&line[start..]);
            if !path.is_file() {
                debug!("Output line names missing file: {}", path.display());
                continue;
            }

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };

            return Some(ResolvedFile {
                file_name,
                path,
                tier: ResolutionTier::OutputLine,
            });
        }

        None
    }

    /// Tier 3: the newest file, if it is inside the recency window. Also
    /// returns how many files fall inside the window.
    fn most_recent(&self, now: SystemTime) -> (Option<ResolvedFile>, usize) {
        let entries = match std::fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.output_dir.display(), e);
                return (None, 0);
            }
        };

        let mut newest: Option<(SystemTime, String)> = None;
        let mut recent_count = 0;

        for entry in entries.flatten() {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_partial(&name) {
                continue;
            }

            let modified = match (self.stat)(&entry.path()) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping {}: stat failed: {}", name, e);
                    continue;
                }
            };

            if self.age(now, modified) <= self.recency_window {
                recent_count += 1;
            }

            let newer = newest.as_ref().map_or(true, |(best, best_name)| {
                modified > *best || (modified == *best && name < *best_name)
            });
            if newer {
                newest = Some((modified, name));
            }
        }

        let file = newest.and_then(|(modified, name)| {
            let age = self.age(now, modified);
            if age > self.recency_window {
                debug!(
                    "Newest file {} is {}s old, outside the {}s window",
                    name,
                    age.as_secs(),
                    self.recency_window.as_secs()
                );
                return None;
            }

            let path = self.output_dir.join(&name);
            path.is_file().then(|| ResolvedFile {
                file_name: name,
                path,
                tier: ResolutionTier::MostRecent,
            })
        });

        (file, recent_count)
    }

    fn age(&self, now: SystemTime, modified: SystemTime) -> Duration {
        now.duration_since(modified).unwrap_or(Duration::ZERO)
    }

    fn has_media_extension(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| lower.ends_with(&format!(".{}", ext)))
    }

    /// Spellings of the output directory that may appear in tool output.
    fn dir_needles(&self) -> Vec<String> {
        let full = self.output_dir.to_string_lossy();
        let full = full.trim_end_matches('/');
        let mut needles = vec![full.to_string()];

        let bare = full.trim_start_matches("./");
        if bare != full && !bare.is_empty() {
            needles.push(bare.to_string());
        }

        needles.retain(|n| !n.is_empty());
        needles
    }
}
