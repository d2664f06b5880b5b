use super::json_body;
use crate::chat::{validate_message, validate_model, ChatMessage, ChatReply, ChatRequest};
use crate::error::Result;
use crate::server::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

// === Request/Response Types ===

#[derive(Deserialize)]
pub struct ChatBody {
    /// Kept loose so a non-string message or model gets the validation error.
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    model: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioBody {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    chat_history: Option<Vec<ChatMessage>>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    model: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaBody {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    chat_history: Option<Vec<ChatMessage>>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    success: bool,
    data: ChatReply,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantData {
    response: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Serialize)]
pub struct AssistantResponse {
    success: bool,
    data: AssistantData,
}

fn model_or_default(model: Option<&str>, default: &str) -> String {
    model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

// === Handlers ===

/// `POST /api/chat`: one user message, no system prompt.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let body = json_body(body)?;
    let llm = &state.settings.llm;
    let message = validate_message(body.message.as_ref().and_then(Value::as_str), llm.max_message_chars)?;
    let model = model_or_default(validate_model(body.model.as_ref())?, &llm.default_model);

    info!("Chat request for model {}", model);
    let reply = state.chat.complete(ChatRequest::new(model, message)).await?;

    Ok(Json(ChatResponse {
        success: true,
        data: reply,
    }))
}

/// `POST /api/chat/portfolio-assistant`
pub async fn portfolio_assistant(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<PortfolioBody>, JsonRejection>,
) -> Result<Json<AssistantResponse>> {
    let body = json_body(body)?;
    let llm = &state.settings.llm;
    let message = validate_message(body.message.as_ref().and_then(Value::as_str), llm.max_message_chars)?;
    let model = model_or_default(validate_model(body.model.as_ref())?, &llm.default_model);

    let request = ChatRequest::new(model, message)
        .with_system(state.prompts.chat.portfolio.clone())
        .with_history(body.chat_history.unwrap_or_default());
    let reply = state.chat.complete(request).await?;

    Ok(Json(AssistantResponse {
        success: true,
        data: AssistantData {
            response: reply.response,
            model: reply.model_used,
            session_id: body.session_id,
        },
    }))
}

/// `POST /api/persona-chat`, also mounted as `/api/pappu-ai`.
pub async fn persona_chat(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<PersonaBody>, JsonRejection>,
) -> Result<Json<AssistantResponse>> {
    let body = json_body(body)?;
    let llm = &state.settings.llm;
    let message = validate_message(body.message.as_ref().and_then(Value::as_str), llm.max_message_chars)?;

    let system = state.prompts.chat.persona_system(body.category.as_deref());
    let request = ChatRequest::new(llm.persona_model.clone(), message)
        .with_system(system)
        .with_history(body.chat_history.unwrap_or_default());
    let reply = state.chat.complete(request).await?;

    Ok(Json(AssistantResponse {
        success: true,
        data: AssistantData {
            response: reply.response,
            model: reply.model_used,
            session_id: None,
        },
    }))
}
