use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use tracing::{error, info, warn};

use crate::AppState;
use crate::assistant::{SERVER_ERROR_REPLY, ShopAssistant};
use crate::config::AppConfig;
use crate::llm::{ChatCompletionsClient, ChatModel, Embedder};
use crate::pages;
use crate::rag::{RagError, RetrievalQa, Retriever, VectorStore};

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let settings = config.llm.to_settings();
    info!(
        name: "llm.config.loaded",
        base_url = %settings.base_url,
        model = %settings.model,
        fallback_model = %settings.fallback_model,
        "LLM configuration loaded"
    );

    let client = Arc::new(ChatCompletionsClient::new(settings)?);

    // A server without a collection still answers, from an empty context
    let store = match VectorStore::load(&config.rag.persist_dir, &config.rag.collection).await {
        Ok(store) => {
            info!(
                name: "rag.collection.loaded",
                collection = %store.collection(),
                records = store.len(),
                embedding_model = %store.embedding_model(),
                built_at = %store.built_at(),
                "Vector collection loaded"
            );
            store
        }
        Err(RagError::MissingCollection(path)) => {
            warn!(
                name: "rag.collection.missing",
                path = %path.display(),
                "No vector collection found; run `build-index` first"
            );
            VectorStore::new(&config.rag.collection, &config.llm.embedding_model)
        }
        Err(e) => return Err(e.into()),
    };

    let assistant = build_assistant(&config, client, store);

    let state = AppState {
        assistant: Arc::new(assistant),
        config: Arc::clone(&config),
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Wires the retrieval chain and reply policy around one model client.
pub fn build_assistant(
    config: &AppConfig,
    client: Arc<ChatCompletionsClient>,
    store: VectorStore,
) -> ShopAssistant {
    // One client serves both roles
    let embedder = Arc::clone(&client) as Arc<dyn Embedder>;
    let retriever = Retriever::new(Arc::new(store), embedder, config.rag.top_k);
    let qa = RetrievalQa::new(retriever, client as Arc<dyn ChatModel>);
    ShopAssistant::new(qa, &config.llm.model, &config.llm.fallback_model)
}

/// Build the application router.
///
/// `/chat` enforces the request timeout itself so that it still answers
/// with its JSON shape; every other route gets a plain 408.
pub fn router(state: AppState) -> Router {
    let timeout_duration = state.config.server.request_timeout();

    let site = Router::new()
        .route("/", get(index_handler))
        .route("/favicon.ico", get(favicon_handler))
        .nest_service("/static", ServeDir::new(&state.config.server.static_dir))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ));

    Router::new()
        .route("/chat", post(chat_handler))
        .merge(site)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the chat endpoint. Anything else in the body is ignored.
#[derive(Debug, Default)]
struct ChatRequest {
    message: String,
}

impl ChatRequest {
    /// Lenient parse: a missing, non-JSON or non-object body, or a
    /// non-string message, all read as an empty message.
    fn from_body(body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
            .unwrap_or_default();
        Self { message }
    }

    fn message(&self) -> &str {
        &self.message
    }
}

/// Response from the chat endpoint.
#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

/// GET / - chat page.
async fn index_handler() -> impl IntoResponse {
    Html(pages::index_page())
}

/// GET /favicon.ico - deliberately empty.
async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// POST /chat - always 200 with `{"response": ...}`, timeouts included.
async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Json<ChatResponse> {
    let req = ChatRequest::from_body(&body);
    info!(
        name: "chat.request",
        chars = req.message().chars().count(),
        "Received chat request"
    );

    let budget = state.config.server.request_timeout();
    let reply = state.assistant.reply(req.message());
    let response = match tokio::time::timeout(budget, reply).await {
        Ok(response) => response,
        Err(_) => {
            error!(
                name: "chat.timeout",
                timeout_secs = budget.as_secs(),
                "Chat reply timed out"
            );
            SERVER_ERROR_REPLY.to_string()
        }
    };
    Json(ChatResponse { response })
}
