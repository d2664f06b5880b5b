//! API key check for protected routes.

use super::AppState;
use crate::error::GatewayError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` does not match the configured key.
///
/// Without a configured key every request is rejected, unless the server
/// is explicitly set to `allow_unauthenticated`.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let server = &state.settings.server;
    let Some(expected) = server.api_key.as_deref().filter(|k| !k.is_empty()) else {
        if server.allow_unauthenticated {
            return next.run(req).await;
        }
        warn!("Rejected request to {}: no API key configured", req.uri().path());
        return GatewayError::Unauthorized.into_response();
    };

    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(expected) {
        warn!("Unauthorized request to {}", req.uri().path());
        return GatewayError::Unauthorized.into_response();
    }

    next.run(req).await
}
