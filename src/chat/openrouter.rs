//! OpenRouter chat completions.

use super::{ChatCompleter, ChatMessage, ChatReply, ChatRequest, ChatRole, EMPTY_REPLY};
use crate::config::LlmSettings;
use crate::error::{GatewayError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, error, instrument};

/// Chat completer backed by an OpenAI-compatible endpoint (OpenRouter by default).
pub struct OpenRouterChat {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterChat {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(settings)?,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| GatewayError::Llm(e.to_string()))?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| GatewayError::Llm(e.to_string()))?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| GatewayError::Llm(e.to_string()))?
            .into(),
    };
    Ok(built)
}

#[async_trait]
impl ChatCompleter for OpenRouterChat {
    #[instrument(skip(self, request), fields(model = %request.model, history = request.history.len()))]
    #[allow(deprecated)]
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let messages = request
            .messages()
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        debug!("Sending {} messages", messages.len());

        let completion = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| GatewayError::Llm(e.to_string()))?;

        let response = self.client.chat().create(completion).await.map_err(|e| {
            error!("Chat completion failed: {}", e);
            GatewayError::Llm(format!("Failed to generate response: {}", e))
        })?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        Ok(ChatReply {
            response: text,
            model_used: request.model,
        })
    }
}
