//! Anthropic Messages API binding (provider id `claude`).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as a top-level field
//! - Reply text joined from all `text` content blocks

use async_trait::async_trait;
use dirflow_core::error::GatewayError;
use dirflow_core::message::ChatMessage;
use dirflow_core::provider::{ProviderBinding, ProviderKind, ProviderRequest};
use serde::Deserialize;
use tracing::debug;

use crate::{bad_shape, missing_credential, send_request};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Anthropic native Messages API binding.
pub struct AnthropicBinding {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicBinding {
    /// Create a binding on a shared HTTP client.
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.7,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn build_body(&self, request: ProviderRequest, model: &str) -> serde_json::Value {
        let (system, messages) = request.into_system_and_messages();
        let messages: Vec<ChatMessage> = messages;

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        body
    }

    fn extract_text(raw: &str) -> Result<String, GatewayError> {
        let resp: AnthropicResponse = serde_json::from_str(raw).map_err(|e| {
            bad_shape(
                ProviderKind::Claude,
                format!("Failed to parse Anthropic response: {e}"),
            )
        })?;

        let text = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(bad_shape(ProviderKind::Claude, "response contained no text blocks"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ProviderBinding for AnthropicBinding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, request: ProviderRequest, model: &str) -> Result<String, GatewayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(missing_credential(ProviderKind::Claude, "ANTHROPIC_API_KEY"));
        };

        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_body(request, model);

        debug!(provider = "claude", model = %model, "Sending completion request");

        let raw = send_request(
            ProviderKind::Claude,
            self.client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        Self::extract_text(&raw)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
