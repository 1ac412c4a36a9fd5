//! HTTP gateway for SousChef.
//!
//! Routes:
//! - `GET  /health`
//! - `POST /chat`                multipart `message` JSON + optional `attachment`
//! - `POST /chat/stream`         same input, server-sent progress events
//! - `POST /recipes/bulk-upload` multipart `file` (.yaml / .yml)
//!
//! Everything except `/health` requires `Authorization: Bearer <token>`.
//!
//! Built on Axum.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use souschef_assistant::Assistant;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub use auth::{StaticTenantDirectory, TenantDirectory};
pub use error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Assistant,
    pub tenants: Arc<dyn TenantDirectory>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, max_body_bytes: usize) -> Router {
    let api = Router::new()
        .route("/chat", post(handlers::chat_handler))
        .route("/chat/stream", post(handlers::chat_stream_handler))
        .route("/recipes/bulk-upload", post(handlers::bulk_upload_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build everything from `config` and serve until the process exits.
pub async fn start(config: souschef_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let assistant = souschef_assistant::build_assistant(&config).await?;
    let tenants = StaticTenantDirectory::new(&config.gateway.tokens);
    if tenants.is_empty() {
        warn!("No gateway tokens configured; every authenticated route will answer 401");
    }

    let state = Arc::new(GatewayState {
        assistant,
        tenants: Arc::new(tenants),
    });
    let app = build_router(state, config.gateway.max_body_bytes);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use souschef_assistant::testing::{make_tool_call, SequentialMockProvider, StaticFetcher};
    use souschef_assistant::{AssistantSettings, Collaborators, PromptAssembler, TokenBudgeter};
    use souschef_core::message::{TenantId, ThreadId};
    use souschef_core::store::ConversationStore;
    use souschef_index::InMemoryIndex;
    use souschef_store::InMemoryStore;
    use std::collections::HashMap;
    use tower::ServiceExt;

    const BOUNDARY: &str = "souschef-test-boundary";

    struct TestApp {
        router: Router,
        index: Arc<InMemoryIndex>,
        store: Arc<InMemoryStore>,
    }

    fn test_app(provider: SequentialMockProvider) -> TestApp {
        let index = Arc::new(InMemoryIndex::new());
        let store = Arc::new(InMemoryStore::new());
        let assistant = Assistant::new(
            Collaborators {
                provider: Arc::new(provider),
                index: index.clone(),
                store: store.clone(),
                fetcher: Arc::new(StaticFetcher::empty()),
            },
            PromptAssembler::with_default_template(TokenBudgeter::estimate()),
            AssistantSettings::default(),
        )
        .unwrap();

        let tokens = HashMap::from([
            ("alice-token".to_string(), "alice".to_string()),
            ("bob-token".to_string(), "bob".to_string()),
        ]);
        let state = Arc::new(GatewayState {
            assistant,
            tenants: Arc::new(StaticTenantDirectory::new(&tokens)),
        });
        TestApp {
            router: build_router(state, 1024 * 1024),
            index,
            store,
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
                    );
                }
                Part::File(name, filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(multipart_body(parts))).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = test_app(SequentialMockProvider::new(vec![]));

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.router.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn chat_requires_known_token() {
        let app = test_app(SequentialMockProvider::new(vec![]));
        let parts = [Part::Text("message", r#"{"message":"hi"}"#)];

        let response = app.router.clone().oneshot(post("/chat", None, &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.router.oneshot(post("/chat", Some("forged"), &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn chat_returns_reply_and_thread() {
        let app = test_app(SequentialMockProvider::single_text("Make gazpacho."));
        let parts = [Part::Text("message", r#"{"message":"cold soup?"}"#)];

        let response = app.router.oneshot(post("/chat", Some("alice-token"), &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["response"], "Make gazpacho.");
        let thread_id = ThreadId::from(json["thread_id"].as_str().unwrap());
        let thread = app.store.get_thread(&thread_id).await.unwrap().unwrap();
        assert_eq!(thread.tenant, TenantId::from("alice"));
        assert_eq!(thread.messages.len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_json_is_400() {
        let app = test_app(SequentialMockProvider::new(vec![]));
        let parts = [Part::Text("message", "not json")];

        let response = app.router.oneshot(post("/chat", Some("alice-token"), &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid JSON payload");
    }

    #[tokio::test]
    async fn other_tenants_thread_is_404() {
        let app = test_app(SequentialMockProvider::single_text("never"));
        let thread = app.store.create_thread(&TenantId::from("alice")).await.unwrap();
        let payload = format!(r#"{{"message":"hi","thread_id":"{}"}}"#, thread.id);
        let parts = [Part::Text("message", &payload)];

        let response = app.router.oneshot(post("/chat", Some("bob-token"), &parts)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Conversation not found");
    }

    #[tokio::test]
    async fn stream_emits_sse_frames() {
        let app = test_app(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("add_recipe", serde_json::json!({"recipe_yaml": "title: Soup"}))],
            "Saved!",
        ));
        let parts = [Part::Text("message", r#"{"message":"save my soup"}"#)];

        let response = app
            .router
            .oneshot(post("/chat/stream", Some("alice-token"), &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let text = body_text(response).await;
        let frames: Vec<serde_json::Value> = text
            .split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect();

        assert_eq!(frames.first().unwrap()["type"], "status");
        assert!(frames.iter().any(|f| f["type"] == "tool_use" && f["tool"] == "add_recipe"));
        let response_frame = &frames[frames.len() - 2];
        assert_eq!(response_frame["type"], "response");
        assert_eq!(response_frame["content"], "Saved!");
        assert_eq!(frames.last().unwrap(), &serde_json::json!({"type": "end"}));
        assert_eq!(app.index.count("user_alice").await, 1);
    }

    #[tokio::test]
    async fn bulk_upload_imports_into_callers_namespace() {
        let app = test_app(SequentialMockProvider::new(vec![]));
        let yaml = b"recipes:\n  - recipe:\n      title: Soup\n  - recipe:\n      title: Cake\n";
        let parts = [Part::File("file", "recipes.yaml", yaml)];

        let response = app
            .router
            .oneshot(post("/recipes/bulk-upload", Some("bob-token"), &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["recipes_added"], 2);
        assert_eq!(json["errors"], serde_json::json!([]));
        assert_eq!(app.index.count("user_bob").await, 2);
        assert_eq!(app.index.count("user_alice").await, 0);
    }

    #[tokio::test]
    async fn bulk_upload_rejects_non_yaml_files() {
        let app = test_app(SequentialMockProvider::new(vec![]));
        let parts = [Part::File("file", "recipes.json", b"{}")];

        let response = app
            .router
            .oneshot(post("/recipes/bulk-upload", Some("bob-token"), &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "File must be a YAML file (.yaml or .yml)");
    }

    #[tokio::test]
    async fn bulk_upload_rejects_invalid_utf8() {
        let app = test_app(SequentialMockProvider::new(vec![]));
        let parts = [Part::File("file", "recipes.yml", &[0xff, 0xfe, 0x00])];

        let response = app
            .router
            .oneshot(post("/recipes/bulk-upload", Some("bob-token"), &parts))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "File must be valid UTF-8 encoded text");
    }
}
