//! Fixed-window request limiting per client address.

use super::AppState;
use crate::error::{GatewayError, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Bucket used when the peer address is unknown.
const UNKNOWN_CLIENT: &str = "unknown";

/// Number of tracked clients above which expired windows are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client in fixed windows.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `client`.
    pub fn check(&self, client: &str) -> Result<()> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> Result<()> {
        let mut clients = self.clients.lock();

        if clients.len() > PRUNE_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return Err(GatewayError::RateLimited);
        }
        entry.count += 1;
        Ok(())
    }
}

fn client_key(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware rejecting clients that exhausted their window.
pub async fn limit_by_client(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    if let Err(e) = state.limiter.check(&client) {
        warn!("Rate limit exceeded for {}", client);
        return e.into_response();
    }
    next.run(req).await
}
