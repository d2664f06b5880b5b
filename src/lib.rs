//! vidgate - yt-dlp download and LLM chat gateway
//!
//! A thin HTTP backend that downloads videos with `yt-dlp`, works out which
//! file the tool actually produced, and hands it back to the caller (or an
//! object store). It also proxies chat messages to an OpenAI-compatible
//! completion API.
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `download` - Tool invocation and download-result reconciliation
//! - `delivery` - Streaming files back over HTTP
//! - `storage` - Object storage abstraction
//! - `chat` - Chat completion proxying
//! - `server` - HTTP routes, auth and rate limiting
//!
//! # Example
//!
//! ```rust,no_run
//! use vidgate::config::Settings;
//! use vidgate::download::DownloadService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let service = DownloadService::new(&settings);
//!
//!     let outcome = service
//!         .download("https://www.youtube.com/watch?v=dQw4w9WgXcQ", "youtube")
//!         .await?;
//!     println!("{} ({} bytes)", outcome.path.display(), outcome.size_bytes);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
pub mod openai;
pub mod server;
pub mod storage;

pub use error::{GatewayError, Result};
