//! Configuration settings for vidgate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub downloader: DownloaderSettings,
    pub reconciler: ReconcilerSettings,
    pub llm: LlmSettings,
    pub storage: StorageSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory that receives downloaded files.
    pub download_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            download_dir: "./downloads".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Shared secret expected in the `x-api-key` header.
    pub api_key: Option<String>,
    /// Serve protected routes without a key when `api_key` is unset.
    /// Off by default: no key means protected routes reject everything.
    pub allow_unauthenticated: bool,
    /// Origins allowed by CORS. Empty allows only the local dev frontend
    /// (`http://localhost:5173`).
    pub allowed_origins: Vec<String>,
    /// Length of one rate-limit window in seconds.
    pub rate_limit_window_secs: u64,
    /// Requests allowed per client within one window.
    pub rate_limit_max: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_key: None,
            allow_unauthenticated: false,
            allowed_origins: Vec::new(),
            rate_limit_window_secs: 15 * 60,
            rate_limit_max: 100,
        }
    }
}

/// External download tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderSettings {
    /// Name or path of the yt-dlp binary.
    pub binary: String,
    /// Output filename template, relative to the work directory.
    pub output_template: String,
    /// Format selector passed to `--format`.
    pub format: String,
    /// Wall-clock limit for one invocation.
    pub timeout_secs: u64,
    /// User agent sent by the expanded invocation.
    pub user_agent: String,
    /// Retry count for the expanded invocation.
    pub retries: u32,
    /// Seconds to sleep between requests in the expanded invocation.
    pub sleep_interval_secs: u32,
    /// Run each request in its own work directory.
    pub isolate_requests: bool,
    /// Platforms accepted by the download endpoints.
    pub supported_platforms: Vec<String>,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            output_template: "%(title)s.%(ext)s".to_string(),
            format: "best[ext=mp4]/best".to_string(),
            timeout_secs: 300, // 5 minutes
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
            retries: 3,
            sleep_interval_secs: 1,
            isolate_requests: true,
            supported_platforms: vec!["youtube".to_string(), "instagram".to_string()],
        }
    }
}

impl DownloaderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Download result reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerSettings {
    /// Sleep before the after-snapshot, in milliseconds.
    pub settle_delay_ms: u64,
    /// Maximum age accepted by the most-recent-file fallback.
    pub recency_window_secs: u64,
    /// Extensions recognised when scanning tool output.
    pub media_extensions: Vec<String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2000,
            recency_window_secs: 300,
            media_extensions: vec!["mp4".to_string(), "webm".to_string(), "mkv".to_string()],
        }
    }
}

impl ReconcilerSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }
}

/// Chat completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// API key. Usually supplied through `OPENROUTER_API_KEY`.
    pub api_key: Option<String>,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Model used by the persona chat.
    pub persona_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum accepted length of a single chat message.
    pub max_message_chars: usize,
    /// Sent as `HTTP-Referer`.
    pub site_url: String,
    /// Sent as `X-Title`.
    pub site_name: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            default_model: "mistralai/mistral-7b-instruct:free".to_string(),
            persona_model: "microsoft/wizardlm-2-8x22b".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            max_message_chars: 1000,
            site_url: "http://localhost:3000".to_string(),
            site_name: "vidgate".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Object storage provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    /// Files are served from the download directory.
    #[default]
    None,
    /// Files are copied into a directory published under a base URL.
    Local,
    /// Files are uploaded with plain HTTP verbs to a bucket endpoint.
    Http,
    /// Files are uploaded to an S3 bucket with signed requests.
    S3,
}

impl std::str::FromStr for StorageProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(StorageProvider::None),
            "local" => Ok(StorageProvider::Local),
            "http" => Ok(StorageProvider::Http),
            "s3" => Ok(StorageProvider::S3),
            _ => Err(format!("Unknown storage provider: {}", s)),
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageProvider::None => write!(f, "none"),
            StorageProvider::Local => write!(f, "local"),
            StorageProvider::Http => write!(f, "http"),
            StorageProvider::S3 => write!(f, "s3"),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub provider: StorageProvider,
    /// Directory used by the local provider.
    pub local_dir: String,
    /// Public URL prefix for stored objects.
    pub public_base_url: String,
    /// Bucket endpoint used by the http provider. For the s3 provider an
    /// optional custom endpoint (MinIO, R2 and the like).
    pub endpoint: String,
    /// Bearer token for the http provider. Usually supplied through `STORAGE_TOKEN`.
    pub token: Option<String>,
    /// Remove the downloaded file once it has been uploaded.
    pub remove_local_after_upload: bool,
    /// Bucket used by the s3 provider (`AWS_S3_BUCKET`).
    pub bucket: String,
    /// Region used by the s3 provider (`AWS_REGION`).
    pub region: String,
    /// `AWS_ACCESS_KEY_ID`
    pub access_key_id: Option<String>,
    /// `AWS_SECRET_ACCESS_KEY`
    pub secret_access_key: Option<String>,
    /// `AWS_SESSION_TOKEN`
    pub session_token: Option<String>,
    /// Address objects as `<endpoint>/<bucket>/<key>`.
    pub force_path_style: bool,
    /// Hand out presigned GET URLs instead of public object URLs.
    pub presign_urls: bool,
    /// Lifetime of presigned URLs in seconds.
    pub presign_expiry_secs: u64,
}

impl StorageSettings {
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProvider::None,
            local_dir: "~/.vidgate/objects".to_string(),
            public_base_url: "http://localhost:3000/objects".to_string(),
            endpoint: String::new(),
            token: None,
            remove_local_after_upload: true,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            force_path_style: false,
            presign_urls: false,
            presign_expiry_secs: 3600,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file contents.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply deployment overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENROUTER_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(key) = non_empty("API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = non_empty("SITE_URL") {
            self.llm.site_url = url;
        }
        if let Some(name) = non_empty("SITE_NAME") {
            self.llm.site_name = name;
        }
        if let Some(origins) = non_empty("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(token) = non_empty("STORAGE_TOKEN") {
            self.storage.token = Some(token);
        }
        if let Some(bucket) = non_empty("AWS_S3_BUCKET") {
            self.storage.bucket = bucket;
        }
        if let Some(region) = non_empty("AWS_REGION") {
            self.storage.region = region;
        }
        if let Some(id) = non_empty("AWS_ACCESS_KEY_ID") {
            self.storage.access_key_id = Some(id);
        }
        if let Some(secret) = non_empty("AWS_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = Some(secret);
        }
        if let Some(token) = non_empty("AWS_SESSION_TOKEN") {
            self.storage.session_token = Some(token);
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GatewayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidgate")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded download directory path.
    pub fn download_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.download_dir)
    }

    /// Get the expanded local object storage directory.
    pub fn storage_dir(&self) -> PathBuf {
        Self::expand_path(&self.storage.local_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_gateway_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.general.download_dir, "./downloads");
        assert_eq!(settings.downloader.timeout(), Duration::from_secs(300));
        assert_eq!(settings.reconciler.recency_window(), Duration::from_secs(300));
        assert_eq!(settings.server.rate_limit_max, 100);
        assert!(settings.downloader.isolate_requests);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [reconciler]
            recency_window_secs = 120

            [storage]
            provider = "local"
            "#,
        )
        .unwrap();

        assert_eq!(settings.reconciler.recency_window_secs, 120);
        assert_eq!(settings.reconciler.settle_delay_ms, 2000);
        assert_eq!(settings.storage.provider, StorageProvider::Local);
        assert_eq!(settings.llm.max_tokens, 1000);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENROUTER_API_KEY", "sk-or-test"),
            ("API_KEY", "secret"),
            ("PORT", "8080"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("SITE_NAME", "  "),
            ("AWS_S3_BUCKET", "media"),
            ("AWS_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-or-test"));
        assert_eq!(settings.server.api_key.as_deref(), Some("secret"));
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(settings.llm.site_name, "vidgate");
        assert_eq!(settings.storage.bucket, "media");
        assert_eq!(settings.storage.region, "eu-west-1");
        assert_eq!(settings.storage.access_key_id.as_deref(), Some("AKIDEXAMPLE"));
        assert_eq!(settings.storage.secret_access_key, None);
    }

    #[test]
    fn test_storage_provider_parse() {
        assert_eq!("S3".parse::<StorageProvider>().unwrap(), StorageProvider::S3);
        assert_eq!("http".parse::<StorageProvider>().unwrap(), StorageProvider::Http);
        assert!("ftp".parse::<StorageProvider>().is_err());
    }
}
