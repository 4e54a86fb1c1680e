//! Provider-specific URL handling.
//!
//! All supported providers speak the `OpenAI` wire format; they differ in
//! where the versioned API root lives.

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini through its OpenAI-compatible endpoint
    /// (`generativelanguage.googleapis.com/v1beta/openai`).
    Gemini,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Generic OpenAI-compatible provider (Ollama, vLLM, LM Studio, ...)
    Generic,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use storefront_chat::llm::Provider;
    ///
    /// let provider = Provider::detect_from_url("https://generativelanguage.googleapis.com/v1beta/openai");
    /// assert_eq!(provider, Provider::Gemini);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("generativelanguage.googleapis.com") {
            Self::Gemini
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    #[must_use]
    pub fn build_chat_url(self, base_url: &str) -> String {
        format!("{}/chat/completions", self.api_root(base_url))
    }

    /// Build the embeddings URL for this provider.
    #[must_use]
    pub fn build_embeddings_url(self, base_url: &str) -> String {
        format!("{}/embeddings", self.api_root(base_url))
    }

    fn api_root(self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            // the compatibility base URL already carries its version segment
            Self::Gemini => base.to_string(),
            Self::OpenAI | Self::Generic if base.ends_with("/v1") => base.to_string(),
            Self::OpenAI | Self::Generic => format!("{base}/v1"),
        }
    }
}
