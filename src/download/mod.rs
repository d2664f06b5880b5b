//! Video downloads through yt-dlp.
//!
//! A download runs in three steps: the [`Invoker`] spawns the tool, the
//! [`Reconciler`] works out which file the tool produced, and the
//! [`DownloadService`] ties both together for one request and hands the
//! result to delivery.

mod invoker;
mod reconciler;
mod service;
mod snapshot;

pub use invoker::{access_restriction, InvocationMethod, Invoker, ToolOutput};
pub use reconciler::{Reconciler, Resolution, ResolutionTier, ResolvedFile};
pub use service::{DownloadOutcome, DownloadService, WORK_DIR_NAME};
pub use snapshot::{is_partial, DirectorySnapshot};

#[cfg(all(test, unix))]
pub(crate) use invoker::tests as invoker_tests;

use crate::error::Result;
use std::path::Path;
use uuid::Uuid;

/// State of a single download request. Never persisted.
#[derive(Debug, Clone)]
pub struct DownloadAttempt {
    pub id: Uuid,
    pub requested_url: String,
    pub snapshot_before: DirectorySnapshot,
    pub raw_tool_output: String,
    pub snapshot_after: Option<DirectorySnapshot>,
    pub resolved: Option<ResolvedFile>,
    pub ambiguous: bool,
}

impl DownloadAttempt {
    /// Start an attempt by snapshotting `output_dir`.
    pub fn begin(url: &str, output_dir: &Path) -> Result<Self> {
        Self::begin_with_id(Uuid::new_v4(), url, output_dir)
    }

    pub fn begin_with_id(id: Uuid, url: &str, output_dir: &Path) -> Result<Self> {
        Ok(Self {
            id,
            requested_url: url.to_string(),
            snapshot_before: DirectorySnapshot::capture(output_dir)?,
            raw_tool_output: String::new(),
            snapshot_after: None,
            resolved: None,
            ambiguous: false,
        })
    }
}
