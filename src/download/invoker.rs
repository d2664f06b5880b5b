//! yt-dlp invocation.
//!
//! The tool is run with a compact argument set first. If that fails or times
//! out it is run once more with an expanded set (browser user agent, retries,
//! `--ignore-errors`). Access restrictions and a missing binary are final and
//! skip the second run.

use crate::config::DownloaderSettings;
use crate::error::{GatewayError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Markers yt-dlp prints when a video needs an authenticated session.
const ACCESS_MARKERS: &[&str] = &[
    "sign in to confirm",
    "sign in to view",
    "login required",
    "this video is private",
];

/// How the tool is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMethod {
    /// Minimal arguments plus `--print after_move:filepath`.
    Structured,
    /// The structured arguments plus user-agent, retry and ignore-errors flags.
    Expanded,
}

impl std::fmt::Display for InvocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationMethod::Structured => write!(f, "structured"),
            InvocationMethod::Expanded => write!(f, "expanded"),
        }
    }
}

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub method: InvocationMethod,
    pub stdout: String,
    pub stderr: String,
}

/// Return the first stderr line that reports an access restriction.
pub fn access_restriction(stderr: &str) -> Option<String> {
    stderr
        .lines()
        .map(str::trim)
        .find(|line| {
            let lower = line.to_lowercase();
            ACCESS_MARKERS.iter().any(|m| lower.contains(m))
        })
        .map(String::from)
}

/// Spawns yt-dlp for one URL.
#[derive(Debug, Clone)]
pub struct Invoker {
    binary: String,
    output_template: String,
    format: String,
    timeout: Duration,
    user_agent: String,
    retries: u32,
    sleep_interval_secs: u32,
}

impl Invoker {
    pub fn new(settings: &DownloaderSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            output_template: settings.output_template.clone(),
            format: settings.format.clone(),
            timeout: settings.timeout(),
            user_agent: settings.user_agent.clone(),
            retries: settings.retries,
            sleep_interval_secs: settings.sleep_interval_secs,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Argument list for `method`, writing into `output_dir`.
    pub fn arguments(&self, method: InvocationMethod, url: &str, output_dir: &Path) -> Vec<String> {
        let template = output_dir.join(&self.output_template);

        let mut args = vec![
            url.to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--format".to_string(),
            self.format.clone(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];

        if method == InvocationMethod::Expanded {
            let retries = self.retries.to_string();
            args.extend([
                "--user-agent".to_string(),
                self.user_agent.clone(),
                "--retries".to_string(),
                retries.clone(),
                "--fragment-retries".to_string(),
                retries,
                "--sleep-interval".to_string(),
                self.sleep_interval_secs.to_string(),
                "--ignore-errors".to_string(),
                "--no-warnings".to_string(),
            ]);
        }

        args
    }

    /// Download `url` into `output_dir`, falling back to the expanded
    /// invocation when the structured one fails.
    #[instrument(skip(self, output_dir), fields(url = %url))]
    pub async fn invoke(&self, url: &str, output_dir: &Path) -> Result<ToolOutput> {
        match self.run(InvocationMethod::Structured, url, output_dir).await {
            Ok(output) => Ok(output),
            Err(e @ (GatewayError::AccessBlocked(_) | GatewayError::ToolNotFound(_))) => Err(e),
            Err(e) => {
                warn!("Structured invocation failed, retrying with expanded arguments: {}", e);
                self.run(InvocationMethod::Expanded, url, output_dir).await
            }
        }
    }

    async fn run(&self, method: InvocationMethod, url: &str, output_dir: &Path) -> Result<ToolOutput> {
        let args = self.arguments(method, url, output_dir);
        debug!("Running {} {}", self.binary, args.join(" "));

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GatewayError::ToolNotFound(self.binary.clone())
                } else {
                    GatewayError::ToolInvocationFailed(format!("{} execution failed: {}", self.binary, e))
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GatewayError::ToolInvocationFailed(format!(
                    "{} execution failed: {}",
                    self.binary, e
                )))
            }
            Err(_) => {
                return Err(GatewayError::ToolInvocationFailed(format!(
                    "{} {} invocation timed out after {}s",
                    self.binary,
                    method,
                    self.timeout.as_secs()
                )))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if let Some(line) = access_restriction(&stderr) {
            return Err(GatewayError::AccessBlocked(line));
        }

        if !output.status.success() {
            return Err(GatewayError::ToolInvocationFailed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                last_lines(&stderr, 5)
            )));
        }

        info!("{} invocation finished", method);
        Ok(ToolOutput {
            method,
            stdout,
            stderr,
        })
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}
