use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::llm::{LlmSettings, Provider};
use crate::rag::{CsvOptions, IndexOptions};
use crate::widget::WidgetBindings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the chat page and the /chat endpoint (default)
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,
    },
    /// Build the product vector collection from the catalogue CSV
    BuildIndex {
        /// Catalogue CSV path
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Chat with a running server from the terminal
    Chat {
        /// Base URL of the chat server
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub widget: WidgetConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout_secs: u64,
    pub static_dir: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub fallback_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("fallback_model", &self.fallback_model)
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    pub csv_path: PathBuf,
    pub persist_dir: PathBuf,
    pub collection: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetConfig {
    /// Server the terminal client talks to.
    pub server_url: String,
    pub endpoint: String,
    /// Unset means no client-side timeout.
    pub request_timeout_secs: Option<u64>,
    pub form_id: String,
    pub input_id: String,
    pub send_button_id: String,
    pub container_id: String,
}

impl LlmConfig {
    pub fn to_settings(&self) -> LlmSettings {
        LlmSettings {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: self.model.clone(),
            fallback_model: self.fallback_model.clone(),
            embedding_model: self.embedding_model.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.timeout_secs),
            provider: Provider::detect_from_url(&self.base_url),
        }
    }
}

impl RagConfig {
    pub fn index_options(&self, embedding_model: &str) -> IndexOptions {
        IndexOptions {
            csv_path: self.csv_path.clone(),
            csv: CsvOptions::default(),
            persist_dir: self.persist_dir.clone(),
            collection: self.collection.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            embedding_model: embedding_model.to_string(),
        }
    }
}

impl ServerConfig {
    /// Deadline for one request. `/chat` answers with its apology when it
    /// runs out, other routes with 408.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl WidgetConfig {
    /// Element ids from config; fallback selectors stay the built-in ones.
    pub fn bindings(&self) -> WidgetBindings {
        let mut b = WidgetBindings::default();
        b.form.id.clone_from(&self.form_id);
        b.input.id.clone_from(&self.input_id);
        b.send_button.id.clone_from(&self.send_button_id);
        b.container.id.clone_from(&self.container_id);
        b
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Loads `.env` from the working directory, then from the parent directory
/// if `GOOGLE_API_KEY` is still unset.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
    if env::var("GOOGLE_API_KEY").is_err() {
        let _ = dotenvy::from_path("../.env");
    }
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::load_from_cli(&cli)
    }

    pub fn load_from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 5000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.request_timeout_secs", 120)?
            .set_default("server.static_dir", "static")?
            .set_default("llm.base_url", crate::llm::DEFAULT_BASE_URL)?
            .set_default("llm.model", "gemini-1.5-flash")?
            .set_default("llm.fallback_model", "gemini-1.5-flash-8b")?
            .set_default("llm.embedding_model", "text-embedding-004")?
            .set_default("llm.temperature", 0.3)?
            .set_default("llm.max_output_tokens", 256)?
            .set_default("llm.max_retries", 2)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("rag.csv_path", "products.csv")?
            .set_default("rag.persist_dir", "chroma_db")?
            .set_default("rag.collection", crate::rag::DEFAULT_COLLECTION)?
            .set_default("rag.chunk_size", 800)?
            .set_default("rag.chunk_overlap", 100)?
            .set_default("rag.top_k", 3)?
            .set_default("widget.server_url", "http://127.0.0.1:5000")?
            .set_default("widget.endpoint", crate::widget::DEFAULT_ENDPOINT)?
            .set_default("widget.form_id", "chat-form")?
            .set_default("widget.input_id", "user-input")?
            .set_default("widget.send_button_id", "send-btn")?
            .set_default("widget.container_id", "chat-box")?;

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment variables, e.g. STOREFRONT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("STOREFRONT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Unprefixed variables the deployment already uses
        if let Ok(key) = env::var("GOOGLE_API_KEY") {
            builder = builder.set_override("llm.api_key", key)?;
        }
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                builder = builder.set_override("llm.model", model)?;
            }
        }

        // 5. CLI flags
        match &cli.command {
            Some(Command::Serve { port, host }) => {
                if let Some(port) = port {
                    builder = builder.set_override("server.port", i64::from(*port))?;
                }
                if let Some(host) = host {
                    builder = builder.set_override("server.host", host.as_str())?;
                }
            }
            Some(Command::BuildIndex { csv: Some(csv) }) => {
                builder = builder.set_override("rag.csv_path", csv.display().to_string())?;
            }
            Some(Command::Chat { url: Some(url) }) => {
                builder = builder.set_override("widget.server_url", url.as_str())?;
            }
            _ => {}
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.llm.base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "llm.base_url cannot be empty".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "llm.model cannot be empty".to_string(),
            ));
        }
        if self.rag.top_k == 0 {
            return Err(config::ConfigError::Message(
                "rag.top_k must be at least 1".to_string(),
            ));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(config::ConfigError::Message(
                "rag.chunk_overlap must be smaller than rag.chunk_size".to_string(),
            ));
        }
        Ok(())
    }
}
