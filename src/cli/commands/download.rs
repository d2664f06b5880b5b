//! Download command - fetch one video from the command line.

use crate::cli::preflight::{self, Operation};
use crate::cli::{format_size, Output};
use crate::config::Settings;
use crate::download::DownloadService;

/// Download a single URL into the download directory.
pub async fn run_download(url: &str, platform: &str, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Download, &settings)?;

    let service = DownloadService::new(&settings);
    service.validate(url, platform)?;

    let spinner = Output::spinner(&format!("Downloading {}", url));
    let result = service.download(url, platform).await;
    spinner.finish_and_clear();

    let outcome = result?;
    Output::success(&format!("Downloaded {}", outcome.file_name));
    Output::kv("Path", &outcome.path.display().to_string());
    Output::kv("Size", &format_size(outcome.size_bytes));
    Output::kv("Resolved by", &outcome.tier.to_string());
    if outcome.ambiguous {
        Output::warning("More than one candidate file matched; check the result.");
    }

    Ok(())
}
