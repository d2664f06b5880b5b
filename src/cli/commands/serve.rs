//! Serve command - start the HTTP gateway.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server::{self, AppState};
use std::sync::Arc;

/// Run the HTTP gateway.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    for operation in [Operation::Download, Operation::Chat] {
        if let Err(e) = preflight::check(operation, &settings) {
            Output::warning(&e.to_string());
        }
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let download_dir = settings.download_dir();
    let storage = settings.storage.provider;

    let state = Arc::new(AppState::from_settings(settings)?);

    Output::header("vidgate");
    println!();
    Output::success(&format!("Listening on http://{}:{}", host, port));
    Output::kv("Downloads", &download_dir.display().to_string());
    Output::kv("Object storage", &storage.to_string());
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Download", "POST /api/yt-download");
    Output::kv("Download + stream", "POST /api/yt-download/stream");
    Output::kv("Fetch file", "GET  /api/download-file/{filename}");
    Output::kv("List files", "GET  /api/files");
    Output::kv("Chat", "POST /api/chat");
    Output::kv("Portfolio assistant", "POST /api/chat/portfolio-assistant");
    Output::kv("Persona chat", "POST /api/persona-chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    server::run(state, &host, port).await
}
