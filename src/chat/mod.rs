//! Chat completion proxying.
//!
//! Requests are assembled from an optional system prompt, the caller's chat
//! history and the new message, then forwarded to an OpenAI-compatible API.

mod openrouter;

pub use openrouter::OpenRouterChat;

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply text used when the provider returns no content.
pub const EMPTY_REPLY: &str = "No response generated";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system: Option<String>,
    pub history: Vec<ChatMessage>,
    pub message: String,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            history: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Flatten into the message list sent to the provider: system prompt,
    /// history in order, then the new user message.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.message.clone()));
        messages
    }
}

/// A completion reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub model_used: String,
}

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Generate a reply for the request.
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply>;
}

/// Validate a chat message against the configured length limit.
pub fn validate_message(message: Option<&str>, max_chars: usize) -> Result<&str> {
    let message = match message {
        Some(m) if !m.trim().is_empty() => m,
        _ => {
            return Err(GatewayError::InvalidInput(
                "Message is required and should be a string".into(),
            ))
        }
    };

    if message.chars().count() > max_chars {
        return Err(GatewayError::InvalidInput(format!(
            "Message too long. Max {} characters allowed",
            max_chars
        )));
    }

    Ok(message)
}

/// Validate the optional `model` field of a chat body.
pub fn validate_model(model: Option<&Value>) -> Result<Option<&str>> {
    match model {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(model)) => Ok(Some(model.as_str())),
        Some(_) => Err(GatewayError::InvalidInput("Model should be a string".into())),
    }
}
