//! OpenAI-compatible chat completions binding.
//!
//! Serves two providers:
//! - `openai`, authenticated with a Bearer token
//! - `local`, an Ollama (or any OpenAI-compatible) server that needs no key

use async_trait::async_trait;
use dirflow_core::error::GatewayError;
use dirflow_core::message::ChatMessage;
use dirflow_core::provider::{ProviderBinding, ProviderKind, ProviderRequest};
use serde::Deserialize;
use tracing::debug;

use crate::{bad_shape, missing_credential, send_request};

/// A binding for any endpoint exposing `/chat/completions`.
pub struct OpenAiCompatBinding {
    kind: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatBinding {
    /// The hosted OpenAI API.
    pub fn openai(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::new(ProviderKind::OpenAi, client, "https://api.openai.com/v1", api_key)
    }

    /// A local Ollama server. Ollama doesn't need a key.
    pub fn local(client: reqwest::Client, base_url: Option<&str>) -> Self {
        Self::new(
            ProviderKind::Local,
            client,
            base_url.unwrap_or("http://localhost:11434/v1"),
            None,
        )
    }

    fn new(
        kind: ProviderKind,
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            max_tokens: 2048,
            temperature: 0.7,
        }
    }

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
        let messages: Vec<ChatMessage> = request.into_messages();
        serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    fn extract_text(&self, raw: &str) -> Result<String, GatewayError> {
        let resp: ChatCompletionResponse = serde_json::from_str(raw)
            .map_err(|e| bad_shape(self.kind, format!("Failed to parse response: {e}")))?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| bad_shape(self.kind, "no choices[0].message.content in response"))
    }
}

#[async_trait]
impl ProviderBinding for OpenAiCompatBinding {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn has_credential(&self) -> bool {
        self.kind == ProviderKind::Local || self.api_key.is_some()
    }

    async fn send(&self, request: ProviderRequest, model: &str) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(request, model);

        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);

        match (&self.api_key, self.kind) {
            (Some(key), _) => req = req.bearer_auth(key),
            (None, ProviderKind::Local) => {}
            (None, _) => return Err(missing_credential(self.kind, "OPENAI_API_KEY")),
        }

        debug!(provider = %self.kind, model = %model, url = %url, "Sending completion request");

        let raw = send_request(self.kind, req).await?;
        self.extract_text(&raw)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
