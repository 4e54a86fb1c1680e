use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, http::StatusCode, routing::post};

use storefront_chat::AppState;
use storefront_chat::assistant::ShopAssistant;
use storefront_chat::config::AppConfig;
use storefront_chat::llm::{ChatModel, Embedder, LlmError, Message};
use storefront_chat::rag::{Document as CatalogueDoc, RetrievalQa, Retriever, VectorStore};
use storefront_chat::server::router;
use storefront_chat::widget::{
    ChatWidget, Document, EMPTY_REPLY, Event, HttpTransport, MemoryDocument, NETWORK_ERROR_REPLY,
    NO_JSON_REPLY, SendOutcome, WidgetBindings,
};

struct Flat;

#[async_trait]
impl Embedder for Flat {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|_| vec![1.0]).collect())
    }
}

/// Answers from the catalogue context it was given.
struct Clerk;

#[async_trait]
impl ChatModel for Clerk {
    async fn complete(&self, _model: &str, messages: &[Message]) -> Result<String, LlmError> {
        let prompt = &messages[0].content;
        Ok(if prompt.contains("price: 24") {
            "The Canvas Tote costs $24.".to_string()
        } else {
            "I don't have that information.".to_string()
        })
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn storefront() -> String {
    let mut store = VectorStore::new("products", "flat");
    store.add(CatalogueDoc::new("name: Canvas Tote\nprice: 24"), vec![1.0]);
    let qa = RetrievalQa::new(
        Retriever::new(Arc::new(store), Arc::new(Flat), 3),
        Arc::new(Clerk),
    );
    let config = AppConfig::load_from_args(["storefront-chat"]).unwrap();
    let state = AppState {
        assistant: Arc::new(ShopAssistant::new(qa, "primary", "fallback")),
        config: Arc::new(config),
    };
    serve(router(state)).await
}

fn widget(
    base: &str,
    timeout: Option<Duration>,
) -> (Rc<MemoryDocument>, ChatWidget<MemoryDocument, HttpTransport>) {
    let page = Rc::new(MemoryDocument::chat_page());
    let transport = HttpTransport::with_timeout(base, "/chat", timeout).unwrap();
    let widget =
        ChatWidget::attach(Rc::clone(&page), transport, &WidgetBindings::default()).unwrap();
    (page, widget)
}

fn bubbles(
    page: &MemoryDocument,
    widget: &ChatWidget<MemoryDocument, HttpTransport>,
) -> Vec<(String, String)> {
    let container = *widget.container().unwrap();
    page.children(container)
        .into_iter()
        .map(|b| (page.class_name(b), page.text(b)))
        .collect()
}

#[tokio::test]
async fn test_round_trip_through_server() {
    let base = storefront().await;
    let (page, widget) = widget(&base, None);

    page.set_value(widget.input(), "  How much is the tote?  ");
    let mut event = Event::new();
    let outcome = widget.on_submit(&mut event).await;

    assert!(event.default_prevented());
    assert_eq!(
        outcome,
        SendOutcome::Replied {
            text: "The Canvas Tote costs $24.".into()
        }
    );
    assert_eq!(
        bubbles(&page, &widget),
        vec![
            ("msg user".to_string(), "How much is the tote?".to_string()),
            ("msg ai".to_string(), "The Canvas Tote costs $24.".to_string()),
        ]
    );
    assert_eq!(page.value(widget.input()), "");
    assert!(!page.is_disabled(widget.send_button()));
    assert!(!widget.is_in_flight());
}

#[tokio::test]
async fn test_server_empty_message_reply_is_rendered() {
    let base = storefront().await;
    let (page, widget) = widget(&base, None);

    // Blank to the server, not to the widget.
    let outcome = widget.send_message("\u{a0}").await;
    assert_eq!(
        outcome,
        SendOutcome::Replied {
            text: "Please enter a message.".into()
        }
    );
    assert_eq!(bubbles(&page, &widget).len(), 2);
}

#[tokio::test]
async fn test_non_json_error_page() {
    let app = Router::new().route(
        "/chat",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "<h1>Internal Server Error</h1>") }),
    );
    let base = serve(app).await;
    let (page, widget) = widget(&base, None);

    let outcome = widget.send_message("hello").await;
    assert_eq!(
        outcome,
        SendOutcome::Replied {
            text: NO_JSON_REPLY.into()
        }
    );
    assert_eq!(bubbles(&page, &widget)[1].1, NO_JSON_REPLY);
}

#[tokio::test]
async fn test_json_without_response_field() {
    let app = Router::new().route(
        "/chat",
        post(|| async { axum::Json(serde_json::json!({"answer": "misnamed"})) }),
    );
    let base = serve(app).await;
    let (page, widget) = widget(&base, None);

    widget.send_message("hello").await;
    assert_eq!(bubbles(&page, &widget)[1].1, EMPTY_REPLY);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (page, widget) = widget(&format!("http://{addr}"), None);

    let outcome = widget.send_message("anyone there?").await;
    assert_eq!(outcome, SendOutcome::NetworkError);
    assert_eq!(
        bubbles(&page, &widget),
        vec![
            ("msg user".to_string(), "anyone there?".to_string()),
            ("msg ai".to_string(), NETWORK_ERROR_REPLY.to_string()),
        ]
    );
    assert!(!page.is_disabled(widget.send_button()));
    assert!(!widget.is_in_flight());
}

#[tokio::test]
async fn test_client_timeout_is_a_network_error() {
    let app = Router::new().route(
        "/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "late"
        }),
    );
    let base = serve(app).await;
    let (page, widget) = widget(&base, Some(Duration::from_millis(200)));

    let outcome = widget.send_message("hello").await;
    assert_eq!(outcome, SendOutcome::NetworkError);
    assert_eq!(bubbles(&page, &widget)[1].1, NETWORK_ERROR_REPLY);
}
