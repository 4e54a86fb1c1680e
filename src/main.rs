//! Storefront chat server and tools.
//!
//! Entry point: serves the shopping assistant (default), builds the product
//! index, or chats with a running server from the terminal.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use storefront_chat::config::{AppConfig, Cli, Command, load_dotenv};
use storefront_chat::llm::ChatCompletionsClient;
use storefront_chat::rag::build_vector_store;
use storefront_chat::server::start_server;
use storefront_chat::widget::{
    ChatWidget, Document, Event, HttpTransport, MemoryDocument, Role,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    load_dotenv();

    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load_from_cli(&cli).context("Configuration error")?);

    match cli.command.clone().unwrap_or(Command::Serve {
        port: None,
        host: None,
    }) {
        Command::Serve { .. } => {
            if config.llm.api_key.is_none() {
                warn!("GOOGLE_API_KEY not found. Create a .env with GOOGLE_API_KEY=...");
            }
            start_server(config).await
        }
        Command::BuildIndex { .. } => build_index(&config).await,
        Command::Chat { .. } => chat(&config).await,
    }
}

async fn build_index(config: &AppConfig) -> anyhow::Result<()> {
    let settings = config.llm.to_settings();
    let embedder = ChatCompletionsClient::new(settings)?;
    let opts = config.rag.index_options(&config.llm.embedding_model);

    info!(
        name: "rag.index.started",
        csv = %opts.csv_path.display(),
        collection = %opts.collection,
        "Building vector store"
    );

    let report = build_vector_store(&opts, &embedder).await?;
    println!(
        "Vector store built: {} documents, {} chunks -> {}",
        report.documents,
        report.chunks,
        report.path.display()
    );
    Ok(())
}

/// Drives the chat widget over an in-memory copy of the chat page, one
/// submitted line at a time.
async fn chat(config: &AppConfig) -> anyhow::Result<()> {
    let widget_cfg = &config.widget;
    let transport = HttpTransport::with_timeout(
        &widget_cfg.server_url,
        &widget_cfg.endpoint,
        widget_cfg.request_timeout(),
    )?;
    info!(
        name: "widget.chat.connected",
        url = %transport.url(),
        "Chatting with server"
    );

    let page = Rc::new(MemoryDocument::chat_page());
    let widget = ChatWidget::attach(Rc::clone(&page), transport, &widget_cfg.bindings())?;
    let container = widget
        .container()
        .copied()
        .context("chat page has no message container")?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = 0;

    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        page.set_value(widget.input(), &line);
        widget.on_submit(&mut Event::new()).await;

        // Echo only the AI bubbles; the user's line is already on screen.
        let bubbles = page.children(container);
        for bubble in &bubbles[shown..] {
            if page.class_name(*bubble) == Role::Ai.bubble_class() {
                let text = page.text(*bubble);
                stdout.write_all(format!("ai> {text}\n").as_bytes()).await?;
            }
        }
        shown = bubbles.len();
    }

    stdout.write_all(b"\n").await?;
    Ok(())
}
