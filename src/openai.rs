//! OpenAI-compatible client configuration for the chat provider.

use crate::config::LlmSettings;
use crate::error::{GatewayError, Result};
use async_openai::{config::OpenAIConfig, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Create a client for the configured OpenAI-compatible endpoint.
///
/// OpenRouter uses `HTTP-Referer` and `X-Title` to attribute traffic, so both
/// are sent as default headers on every request.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("http-referer"),
        header_value("site_url", &settings.site_url)?,
    );
    headers.insert(
        HeaderName::from_static("x-title"),
        header_value("site_name", &settings.site_name)?,
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| GatewayError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let config = OpenAIConfig::new()
        .with_api_base(settings.api_base.trim_end_matches('/'))
        .with_api_key(settings.api_key.clone().unwrap_or_default());

    Ok(Client::with_config(config).with_http_client(http_client))
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| GatewayError::Config(format!("llm.{} is not a valid header value", field)))
}
