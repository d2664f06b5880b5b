//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{Settings, StorageProvider};
use crate::download::WORK_DIR_NAME;
use console::style;
use std::path::Path;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    /// Downgrade an error to a warning for optional requirements.
    fn optional(mut self) -> Self {
        if self.status == CheckStatus::Error {
            self.status = CheckStatus::Warning;
        }
        self
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, results: &[CheckResult]) {
    println!("{}", style(title).bold());
    for result in results {
        result.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("vidgate doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = [
        (
            "External Tools",
            vec![
                check_tool(&settings.downloader.binary, "--version", install_hint_ytdlp()),
                check_tool("ffmpeg", "-version", install_hint_ffmpeg()).optional(),
            ],
        ),
        (
            "API Configuration",
            vec![check_openrouter_key(settings), check_gateway_key(settings)],
        ),
        ("Directories", vec![check_download_dir(&settings.download_dir())]),
        ("Object Storage", vec![check_storage(settings)]),
        ("Configuration", vec![check_config_file()]),
    ];

    for (title, results) in &sections {
        print_section(title, results);
    }

    let all = sections.iter().flat_map(|(_, results)| results);
    let errors = all.clone().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = all.filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before starting the gateway.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! vidgate is ready to serve.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, version_arg: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn check_openrouter_key(settings: &Settings) -> CheckResult {
    match settings.llm.api_key.as_deref() {
        Some(key) if key.starts_with("sk-or-") => CheckResult::ok(
            "OPENROUTER_API_KEY",
            &format!("configured ({})", mask(key)),
        ),
        Some(key) if !key.trim().is_empty() => CheckResult::warning(
            "OPENROUTER_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-or-... (OpenRouter API key)",
        ),
        _ => CheckResult::error(
            "OPENROUTER_API_KEY",
            "not set",
            "Set with: export OPENROUTER_API_KEY='sk-or-...'",
        ),
    }
}

fn check_gateway_key(settings: &Settings) -> CheckResult {
    match settings.server.api_key.as_deref() {
        Some(key) if !key.trim().is_empty() => CheckResult::ok("API_KEY", "configured"),
        _ if settings.server.allow_unauthenticated => CheckResult::warning(
            "API_KEY",
            "not set, protected routes are open",
            "Set with: export API_KEY='...' (clients send it as x-api-key)",
        ),
        _ => CheckResult::error(
            "API_KEY",
            "not set, protected routes reject every request",
            "Set with: export API_KEY='...' (clients send it as x-api-key)",
        ),
    }
}

fn check_download_dir(dir: &Path) -> CheckResult {
    if !dir.exists() {
        return CheckResult::warning(
            "Download directory",
            &format!("{} (will be created)", dir.display()),
            "Directory will be created on first download",
        );
    }

    let leftovers = std::fs::read_dir(dir.join(WORK_DIR_NAME))
        .map(|entries| entries.count())
        .unwrap_or(0);
    if leftovers > 0 {
        return CheckResult::warning(
            "Download directory",
            &format!("{} ({} stale work directories)", dir.display(), leftovers),
            &format!("Safe to delete {} while the gateway is stopped", dir.join(WORK_DIR_NAME).display()),
        );
    }

    CheckResult::ok("Download directory", &dir.display().to_string())
}

fn check_storage(settings: &Settings) -> CheckResult {
    let storage = &settings.storage;
    match storage.provider {
        StorageProvider::None => CheckResult::ok("Provider", "none (files served locally)"),
        StorageProvider::Local if storage.public_base_url.trim().is_empty() => CheckResult::error(
            "Provider",
            "local store without public_base_url",
            "Set storage.public_base_url to where the store directory is published",
        ),
        StorageProvider::Local => CheckResult::ok(
            "Provider",
            &format!("local ({})", settings.storage_dir().display()),
        ),
        StorageProvider::Http if storage.endpoint.trim().is_empty() => CheckResult::error(
            "Provider",
            "http store without endpoint",
            "Set storage.endpoint to the bucket URL",
        ),
        StorageProvider::Http => CheckResult::ok("Provider", &format!("http ({})", storage.endpoint)),
        StorageProvider::S3 if storage.bucket.trim().is_empty() => CheckResult::error(
            "Provider",
            "s3 store without bucket",
            "Set with: export AWS_S3_BUCKET='...'",
        ),
        StorageProvider::S3
            if storage.access_key_id.is_none() || storage.secret_access_key.is_none() =>
        {
            CheckResult::error(
                "Provider",
                "s3 store without credentials",
                "Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
            )
        }
        StorageProvider::S3 => CheckResult::ok(
            "Provider",
            &format!("s3 ({} in {})", storage.bucket, storage.region),
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: vidgate config init",
        )
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}
