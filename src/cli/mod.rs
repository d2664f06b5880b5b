//! CLI module for vidgate.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{format_size, Output};

use clap::{Parser, Subcommand};

/// vidgate - yt-dlp download and LLM chat gateway
///
/// Serves an HTTP API that downloads videos with yt-dlp, hands the files back
/// to callers or an object store, and proxies chat to OpenRouter.
#[derive(Parser, Debug)]
#[command(name = "vidgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port or $PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Download a single video into the download directory
    Download {
        /// Video URL
        url: String,

        /// Platform the URL belongs to
        #[arg(short, long, default_value = "youtube")]
        platform: String,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download() {
        let cli = Cli::parse_from(["vidgate", "-vv", "download", "https://youtu.be/x", "-p", "instagram"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Download { url, platform } => {
                assert_eq!(url, "https://youtu.be/x");
                assert_eq!(platform, "instagram");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["vidgate", "serve", "--port", "8080"]);
        assert!(matches!(
            cli.command,
            Commands::Serve { host: None, port: Some(8080) }
        ));
    }
}
