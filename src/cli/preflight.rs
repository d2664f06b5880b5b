//! Pre-flight checks before starting work.
//!
//! Catches a missing download tool or LLM key up front instead of on the
//! first request that needs it.

use crate::config::Settings;
use crate::error::{GatewayError, Result};
use std::process::Command;

/// What is about to run.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Downloads need the extraction tool.
    Download,
    /// Chat needs an LLM API key.
    Chat,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Download => check_tool(&settings.downloader.binary),
        Operation::Chat => check_api_key(settings),
    }
}

fn check_api_key(settings: &Settings) -> Result<()> {
    match settings.llm.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(GatewayError::Config(
            "OPENROUTER_API_KEY not set. Set it with: export OPENROUTER_API_KEY='sk-or-...'"
                .to_string(),
        )),
    }
}

/// Check that an external tool runs.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(GatewayError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(GatewayError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(GatewayError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
