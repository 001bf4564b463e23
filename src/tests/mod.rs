
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::de::DeserializeOwned;
use tracing::level_filters::LevelFilter;

use crate::{
    app,
    common::app_state::AppState,
    config::config::{AppConfig, GeminiConfig, ServerConfig},
    quiz::models::{Quiz, QuizQuestion},
    saved::store::QuizStore,
};

pub fn setup_logging() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `n` questions where option `A{i}` is always the right one.
pub fn sample_quiz(n: usize) -> Quiz {
    (0..n)
        .map(|i| QuizQuestion {
            question: format!("Question {}", i),
            options: vec![format!("A{}", i), format!("B{}", i), format!("C{}", i)],
            answer: format!("A{}", i),
        })
        .collect()
}

pub fn gemini_config(base_url: &str, api_key: Option<&str>) -> GeminiConfig {
    GeminiConfig {
        api_key: api_key.map(String::from),
        model: "gemini-test".into(),
        base_url: base_url.into(),
        timeout_secs: 5,
    }
}

pub fn test_config(base_url: &str, api_key: Option<&str>) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            address: "127.0.0.1".into(),
            port: 0,
            log_level: "debug".into(),
        },
        gemini: gemini_config(base_url, api_key),
        database_url: None,
    }
}

pub fn test_router(upstream: &MockUpstream, api_key: Option<&str>) -> Router {
    let config = test_config(&upstream.base_url, api_key);
    let state = AppState::new(&config, QuizStore::memory()).unwrap();
    app(state)
}

/// Router without a reachable model, for persistence tests.
pub fn test_router_with_store(store: QuizStore) -> Router {
    let config = test_config("http://127.0.0.1:9", None);
    let state = AppState::new(&config, store).unwrap();
    app(state)
}

/// Serves the full app on an ephemeral port and returns its base url.
pub async fn spawn_app(store: QuizStore) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = test_router_with_store(store);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

enum MockReply {
    Text(String),
    Status(StatusCode),
}

struct MockState {
    reply: MockReply,
    hits: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_api_key: Mutex<Option<String>>,
}

/// Stand-in for the Gemini `generateContent` endpoint.
pub struct MockUpstream {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub async fn text(text: &str) -> Self {
        Self::spawn(MockReply::Text(text.to_string())).await
    }

    pub async fn status(status: StatusCode) -> Self {
        Self::spawn(MockReply::Status(status)).await
    }

    async fn spawn(reply: MockReply) -> Self {
        let state = Arc::new(MockState {
            reply,
            hits: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_api_key: Mutex::new(None),
        });

        let router = Router::new()
            .route("/v1beta/{*rest}", post(generate_content))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.state.last_prompt.lock().unwrap().clone()
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.state.last_api_key.lock().unwrap().clone()
    }
}

async fn generate_content(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_api_key.lock().unwrap() = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *state.last_prompt.lock().unwrap() = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .map(String::from);

    match &state.reply {
        MockReply::Text(text) => Json(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        }))
        .into_response(),
        MockReply::Status(status) => {
            (*status, Json(serde_json::json!({ "error": { "message": "mock failure" } })))
                .into_response()
        }
    }
}
