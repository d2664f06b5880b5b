//! Directory listings taken around a tool invocation.

use crate::error::Result;
use std::collections::BTreeSet;
use std::path::Path;

/// Suffixes of files yt-dlp is still writing or has abandoned.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// Whether a file name looks like an in-progress download artifact.
pub fn is_partial(name: &str) -> bool {
    let lower = name.to_lowercase();
    PARTIAL_SUFFIXES.iter().any(|s| lower.ends_with(s)) || lower.contains(".part-frag")
}

/// The set of regular file names present in a directory at one point in time.
///
/// Subdirectories and partial download artifacts are not part of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    names: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// List `dir`. A missing directory yields an empty snapshot.
    pub fn capture(dir: &Path) -> Result<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let names = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !is_partial(name))
            .collect();

        Ok(Self { names })
    }

    /// Build a snapshot from known names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Names present here but absent from `before`, in sorted order.
    pub fn new_since(&self, before: &DirectorySnapshot) -> Vec<String> {
        self.names.difference(&before.names).cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
