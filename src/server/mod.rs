//! HTTP API server.
//!
//! Routes live under `/api`; `/health` is public. Every `/api` route except
//! file downloads requires the API key, and the whole `/api` tree is rate
//! limited per client address.

mod auth;
pub mod handlers;
mod rate_limit;

pub use auth::API_KEY_HEADER;
pub use rate_limit::RateLimiter;

use crate::chat::{ChatCompleter, OpenRouterChat};
use crate::config::{Prompts, Settings};
use crate::download::DownloadService;
use crate::error::Result;
use crate::storage::{create_store, ObjectStore};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Origin allowed when none are configured.
const DEV_ORIGIN: &str = "http://localhost:5173";

/// Shared application state.
pub struct AppState {
    pub settings: Settings,
    pub prompts: Prompts,
    pub downloads: DownloadService,
    pub chat: Arc<dyn ChatCompleter>,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub limiter: RateLimiter,
}

impl AppState {
    /// Build the state with the collaborators selected in settings.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;
        let chat: Arc<dyn ChatCompleter> = Arc::new(OpenRouterChat::new(&settings.llm)?);
        let store = create_store(&settings)?;
        Ok(Self::new(settings, prompts, chat, store))
    }

    pub fn new(
        settings: Settings,
        prompts: Prompts,
        chat: Arc<dyn ChatCompleter>,
        store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        let limiter = RateLimiter::new(
            Duration::from_secs(settings.server.rate_limit_window_secs),
            settings.server.rate_limit_max,
        );
        Self {
            downloads: DownloadService::new(&settings),
            settings,
            prompts,
            chat,
            store,
            limiter,
        }
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let configured: Vec<HeaderValue> = settings
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    let origins = if configured.is_empty() {
        vec![HeaderValue::from_static(DEV_ORIGIN)]
    } else {
        configured
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
        .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_LENGTH])
}

/// Assemble the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    use handlers::{chat, download, files};

    let protected = Router::new()
        .route("/yt-download", post(download::download))
        .route("/yt-download/stream", post(download::download_stream))
        .route("/files", get(files::list_files))
        .route("/chat", post(chat::chat))
        .route("/chat/portfolio-assistant", post(chat::portfolio_assistant))
        .route("/persona-chat", post(chat::persona_chat))
        .route("/pappu-ai", post(chat::persona_chat))
        .route_layer(from_fn_with_state(state.clone(), auth::require_api_key));

    let api = Router::new()
        .route("/download-file/{filename}", get(files::download_file))
        .merge(protected)
        .fallback(handlers::api_not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit::limit_by_client));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let server = &state.settings.server;
    if server.api_key.is_none() {
        if server.allow_unauthenticated {
            warn!("No API key configured and allow_unauthenticated is set; protected routes are open");
        } else {
            warn!("No API key configured; protected routes will answer 401");
        }
    }
    if state.settings.llm.api_key.is_none() {
        warn!("OPENROUTER_API_KEY is not set; chat routes will fail");
    }

    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatReply, ChatRequest, ChatRole};
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    /// Echoes the last message and records every request.
    #[derive(Default)]
    struct EchoChat {
        seen: Mutex<Vec<ChatRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatCompleter for EchoChat {
        async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
            self.seen.lock().push(request.clone());
            if self.fail {
                return Err(GatewayError::Llm("upstream 502".into()));
            }
            Ok(ChatReply {
                response: format!("echo: {}", request.message),
                model_used: request.model,
            })
        }
    }

    struct Harness {
        state: Arc<AppState>,
        chat: Arc<EchoChat>,
        _dir: tempfile::TempDir,
    }

    fn harness_with(configure: impl FnOnce(&mut Settings)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.download_dir = dir.path().join("downloads").display().to_string();
        settings.server.api_key = Some("test-key".into());
        configure(&mut settings);

        let chat = Arc::new(EchoChat::default());
        let state = Arc::new(AppState::new(
            settings,
            Prompts::default(),
            chat.clone(),
            None,
        ));
        Harness {
            state,
            chat,
            _dir: dir,
        }
    }

    fn harness() -> Harness {
        harness_with(|_| {})
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(API_KEY_HEADER, "test-key")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(API_KEY_HEADER, "test-key")
            .body(Body::empty())
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let h = harness();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_need_key() {
        let h = harness();
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header(API_KEY_HEADER, "wrong")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();

        let (status, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "success": false, "error": "Invalid API key" }));
        assert!(h.chat.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_server_key_rejects_protected_routes() {
        let h = harness_with(|s| s.server.api_key = None);
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();

        let (status, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid API key");
        assert!(h.chat.seen.lock().is_empty());

        // an empty header must not match an unset key either
        let (status, _) = send(
            &h.state,
            Request::builder()
                .uri("/api/files")
                .header(API_KEY_HEADER, "")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unauthenticated_mode_is_opt_in() {
        let h = harness_with(|s| {
            s.server.api_key = None;
            s.server.allow_unauthenticated = true;
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"hi"}"#))
            .unwrap();

        let (status, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["response"], "echo: hi");
    }

    async fn allowed_origin(state: &Arc<AppState>, origin: &str) -> Option<String> {
        let request = Request::builder()
            .uri("/health")
            .header("origin", origin)
            .body(Body::empty())
            .unwrap();
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_without_origins_allows_only_dev_frontend() {
        let h = harness();
        assert_eq!(
            allowed_origin(&h.state, DEV_ORIGIN).await.as_deref(),
            Some(DEV_ORIGIN)
        );
        assert_eq!(allowed_origin(&h.state, "https://evil.example").await, None);

        let h = harness_with(|s| s.server.allowed_origins = vec!["https://app.example".into()]);
        assert_eq!(
            allowed_origin(&h.state, "https://app.example").await.as_deref(),
            Some("https://app.example")
        );
        assert_eq!(allowed_origin(&h.state, DEV_ORIGIN).await, None);
    }

    #[tokio::test]
    async fn test_unknown_routes() {
        let h = harness();
        let (status, body) = send(&h.state, get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "API endpoint not found");

        let (status, body) = send(&h.state, get("/elsewhere")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Endpoint not found");
    }

    #[tokio::test]
    async fn test_chat_uses_default_model_without_system_prompt() {
        let h = harness();
        let (status, body) = send(&h.state, post_json("/api/chat", json!({ "message": "hi" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["response"], "echo: hi");
        assert_eq!(body["data"]["model_used"], h.state.settings.llm.default_model);

        let seen = h.chat.seen.lock();
        assert_eq!(seen[0].system, None);
        assert!(seen[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_chat_validation() {
        let h = harness();
        let (status, body) = send(&h.state, post_json("/api/chat", json!({ "message": 42 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message is required and should be a string");

        let (status, body) = send(
            &h.state,
            post_json("/api/chat", json!({ "message": "hi", "model": ["a", "b"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Model should be a string");

        let (status, body) = send(
            &h.state,
            post_json("/api/chat/portfolio-assistant", json!({ "message": "hi", "model": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Model should be a string");
        assert!(h.chat.seen.lock().is_empty());

        let long = "x".repeat(1001);
        let (status, body) = send(&h.state, post_json("/api/chat", json!({ "message": long }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Message too long. Max 1000 characters allowed");

        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header(API_KEY_HEADER, "test-key")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_portfolio_assistant_passes_history_and_session() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            post_json(
                "/api/chat/portfolio-assistant",
                json!({
                    "message": "what do you build?",
                    "sessionId": "abc",
                    "chatHistory": [
                        { "role": "user", "content": "hello" },
                        { "role": "assistant", "content": "hi there" }
                    ]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sessionId"], "abc");
        assert_eq!(body["data"]["response"], "echo: what do you build?");

        let seen = h.chat.seen.lock();
        assert_eq!(seen[0].system.as_deref(), Some(h.state.prompts.chat.portfolio.as_str()));
        assert_eq!(seen[0].history.len(), 2);
        assert_eq!(seen[0].history[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_persona_chat_uses_category_and_persona_model() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            post_json(
                "/api/persona-chat",
                json!({ "message": "I'm tired", "category": "Health" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["model"], h.state.settings.llm.persona_model);
        assert!(body["data"].get("sessionId").is_none());

        let seen = h.chat.seen.lock();
        let system = seen[0].system.as_deref().unwrap();
        assert!(system.contains(&h.state.prompts.chat.health));
        assert!(system.contains(&h.state.prompts.chat.portfolio));
    }

    #[tokio::test]
    async fn test_chat_uses_requested_model() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            post_json("/api/chat", json!({ "message": "hi", "model": "openai/gpt-4o-mini" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["model_used"], "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_pappu_ai_is_persona_chat() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            post_json("/api/pappu-ai", json!({ "message": "hello", "category": "Career" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["model"], h.state.settings.llm.persona_model);
        let seen = h.chat.seen.lock();
        assert_eq!(seen[0].model, h.state.settings.llm.persona_model);
        assert!(seen[0].system.is_some());
    }

    #[tokio::test]
    async fn test_llm_failure_is_masked() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.download_dir = dir.path().display().to_string();
        settings.server.api_key = Some("test-key".into());
        let chat = Arc::new(EchoChat {
            fail: true,
            ..Default::default()
        });
        let state = Arc::new(AppState::new(settings, Prompts::default(), chat, None));

        let (status, body) = send(&state, post_json("/api/chat", json!({ "message": "hi" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to generate response");
    }

    #[tokio::test]
    async fn test_download_validation() {
        let h = harness();
        let cases = [
            (json!({ "platform": "youtube" }), "URL is required"),
            (json!({ "url": "https://youtu.be/x" }), "Platform is required"),
            (json!({ "url": "ftp://x", "platform": "youtube" }), "Invalid URL format"),
            (
                json!({ "url": "https://x.com/v", "platform": "vimeo" }),
                "Unsupported platform. Supported platforms: youtube, instagram",
            ),
        ];

        for (payload, expected) in cases {
            let (status, body) = send(&h.state, post_json("/api/yt-download", payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], expected);
        }
    }

    #[tokio::test]
    async fn test_download_file_serving() {
        let h = harness();
        let dir = h.state.downloads.download_dir().to_path_buf();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("my clip.mp4"), b"bytes").unwrap();

        // no API key needed for file downloads
        let request = Request::builder()
            .uri("/api/download-file/my%20clip.mp4")
            .body(Body::empty())
            .unwrap();
        let response = build_router(h.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "video/mp4");
        assert!(response.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"my clip.mp4\""));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"bytes");
        assert!(dir.join("my clip.mp4").exists());

        let (status, body) = send(&h.state, get("/api/download-file/missing.mp4")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["requestedFile"], "missing.mp4");

        let (status, _) = send(&h.state, get("/api/download-file/..%2Fsecret")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&h.state, get("/api/download-file/..")).await;
        assert_ne!(status, StatusCode::OK);

        std::fs::write(dir.join("Wait... what.mp4"), b"dots").unwrap();
        let response = build_router(h.state.clone())
            .oneshot(get("/api/download-file/Wait...%20what.mp4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"dots");

        std::fs::create_dir_all(dir.join(".work")).unwrap();
        let (status, _) = send(&h.state, get("/api/download-file/.work")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_files() {
        let h = harness();
        let (status, body) = send(&h.state, get("/api/files")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let dir = h.state.downloads.download_dir().to_path_buf();
        std::fs::create_dir_all(dir.join(".work")).unwrap();
        std::fs::write(dir.join("a.mp4"), b"aaaa").unwrap();
        std::fs::write(dir.join("b.mp4.part"), b"b").unwrap();

        let (_, body) = send(&h.state, get("/api/files")).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["files"][0]["filename"], "a.mp4");
        assert_eq!(body["files"][0]["size"], 4);
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let h = harness_with(|s| s.server.rate_limit_max = 2);

        for _ in 0..2 {
            let (status, _) = send(&h.state, get("/api/files")).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&h.state, get("/api/files")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Too many requests, please try again later");

        // health is outside /api
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, _) = send(&h.state, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[cfg(unix)]
    mod with_tool {
        use super::*;
        use crate::download::invoker_tests::{fake_tool, WRITES_CLIP};
        use crate::download::WORK_DIR_NAME;
        use crate::storage::LocalObjectStore;

        fn tool_harness(extra: impl FnOnce(&mut Settings)) -> (Harness, tempfile::TempDir) {
            tool_harness_with(WRITES_CLIP, extra)
        }

        fn tool_harness_with(
            script: &str,
            extra: impl FnOnce(&mut Settings),
        ) -> (Harness, tempfile::TempDir) {
            let tools = tempfile::tempdir().unwrap();
            let tool = fake_tool(tools.path(), script);
            let h = harness_with(|s| {
                s.downloader.binary = tool.display().to_string();
                s.reconciler.settle_delay_ms = 0;
                extra(s);
            });
            (h, tools)
        }

        #[tokio::test]
        async fn test_download_returns_link() {
            let (h, _tools) = tool_harness(|_| {});
            let (status, body) = send(
                &h.state,
                post_json(
                    "/api/yt-download",
                    json!({ "url": "https://www.youtube.com/watch?v=x", "platform": "YouTube" }),
                ),
            )
            .await;

            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["fileName"], "clip.mp4");
            assert_eq!(body["fileSize"], 5);
            assert_eq!(body["downloadUrl"], "/api/download-file/clip.mp4");
            assert_eq!(body["message"], "click the below link to download your file");
            assert!(body.get("s3Url").is_none());

            let dir = h.state.downloads.download_dir();
            assert!(dir.join("clip.mp4").exists());
            assert_eq!(std::fs::read_dir(dir.join(WORK_DIR_NAME)).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_dotted_title_link_is_served() {
            let script = WRITES_CLIP.replace("clip.mp4", "Wait... what.mp4");
            let (h, _tools) = tool_harness_with(&script, |_| {});

            let (status, body) = send(
                &h.state,
                post_json(
                    "/api/yt-download",
                    json!({ "url": "https://youtu.be/x", "platform": "youtube" }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["fileName"], "Wait... what.mp4");

            let link = body["downloadUrl"].as_str().unwrap();
            assert_eq!(link, "/api/download-file/Wait...%20what.mp4");
            let response = build_router(h.state.clone()).oneshot(get(link)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&bytes[..], b"video");
        }

        #[tokio::test]
        async fn test_stream_removes_file_afterwards() {
            let (h, _tools) = tool_harness(|_| {});
            let response = build_router(h.state.clone())
                .oneshot(post_json(
                    "/api/yt-download/stream",
                    json!({ "url": "https://www.instagram.com/reel/x", "platform": "instagram" }),
                ))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()["content-length"], "5");
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(&bytes[..], b"video");
            assert!(!h.state.downloads.download_dir().join("clip.mp4").exists());
        }

        #[tokio::test]
        async fn test_download_relays_to_object_store() {
            let objects = tempfile::tempdir().unwrap();
            let (h, _tools) = tool_harness(|_| {});
            let store: Arc<dyn ObjectStore> =
                Arc::new(LocalObjectStore::new(objects.path(), "https://cdn.example"));
            let state = Arc::new(AppState::new(
                h.state.settings.clone(),
                Prompts::default(),
                h.chat.clone(),
                Some(store),
            ));

            let (status, body) = send(
                &state,
                post_json(
                    "/api/yt-download",
                    json!({ "url": "https://youtu.be/x", "platform": "youtube" }),
                ),
            )
            .await;

            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["s3Url"], "https://cdn.example/downloads/clip.mp4");
            assert!(body.get("downloadUrl").is_none());
            assert!(objects.path().join("downloads/clip.mp4").exists());
            assert!(!state.downloads.download_dir().join("clip.mp4").exists());
        }
    }
}
