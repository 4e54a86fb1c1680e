//! Outbound request from the widget to the chat endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Endpoint path the widget posts to.
pub const DEFAULT_ENDPOINT: &str = "/chat";

/// Reply text used when the body is not JSON.
pub const NO_JSON_REPLY: &str = "Server returned no JSON.";

/// Reply text used when the JSON carries no usable `response`.
pub const EMPTY_REPLY: &str = "No response.";

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Failure below the HTTP layer (DNS, refused connection, timeout, ...).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{0}")]
    Other(String),
}

/// A response that arrived, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    /// `None` when the body could not be read.
    pub body: Option<String>,
}

impl RawReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: Some(body.into()),
        }
    }
}

/// Decoded reply of the chat endpoint.
///
/// Any JSON value is accepted; `response` is only taken when it is a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub response: Option<String>,
}

impl ChatReply {
    /// Decodes a reply body, substituting [`NO_JSON_REPLY`] for bodies that
    /// are missing or not JSON.
    pub fn from_body(body: Option<&str>) -> Self {
        let Some(value) = body.and_then(|b| serde_json::from_str::<serde_json::Value>(b).ok())
        else {
            return Self {
                response: Some(NO_JSON_REPLY.to_string()),
            };
        };
        Self {
            response: value
                .get("response")
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string),
        }
    }

    /// Text to render: the response if non-empty, else [`EMPTY_REPLY`].
    pub fn display_text(&self) -> &str {
        match self.response.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => EMPTY_REPLY,
        }
    }
}

/// Sends chat requests on behalf of the widget.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_chat(&self, req: &ChatRequest) -> Result<RawReply, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn post_chat(&self, req: &ChatRequest) -> Result<RawReply, TransportError> {
        (**self).post_chat(req).await
    }
}

/// reqwest-backed transport posting JSON to `{base_url}{endpoint}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, endpoint: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, endpoint, None)
    }

    /// Like [`HttpTransport::new`], with an optional whole-request timeout.
    pub fn with_timeout(
        base_url: &str,
        endpoint: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(base_url)?.join(endpoint)?;
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            http: builder.build()?,
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn post_chat(&self, req: &ChatRequest) -> Result<RawReply, TransportError> {
        let resp = self.http.post(self.url.clone()).json(req).send().await?;
        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "failed to read chat reply body");
                None
            }
        };
        Ok(RawReply { status, body })
    }
}
