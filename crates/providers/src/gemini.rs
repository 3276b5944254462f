//! Google Gemini `generateContent` binding.
//!
//! The whole conversation is sent as a single text part. Authentication
//! uses the `x-goog-api-key` header.

use async_trait::async_trait;
use dirflow_core::error::GatewayError;
use dirflow_core::provider::{ProviderBinding, ProviderKind, ProviderRequest};
use serde::Deserialize;
use tracing::debug;

use crate::{bad_shape, missing_credential, send_request};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const TOP_K: u32 = 40;
const TOP_P: f32 = 0.95;

pub struct GeminiBinding {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiBinding {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
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

    fn build_body(&self, request: ProviderRequest) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [{ "text": request.into_content() }]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "topK": TOP_K,
                "topP": TOP_P,
                "maxOutputTokens": self.max_tokens,
            }
        })
    }

    fn extract_text(raw: &str) -> Result<String, GatewayError> {
        let resp: GenerateContentResponse = serde_json::from_str(raw).map_err(|e| {
            bad_shape(ProviderKind::Gemini, format!("Failed to parse Gemini response: {e}"))
        })?;

        let text = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(bad_shape(
                ProviderKind::Gemini,
                "no candidates[0].content.parts text in response",
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl ProviderBinding for GeminiBinding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, request: ProviderRequest, model: &str) -> Result<String, GatewayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(missing_credential(ProviderKind::Gemini, "GOOGLE_API_KEY"));
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = self.build_body(request);

        debug!(provider = "gemini", model = %model, "Sending completion request");

        let raw = send_request(
            ProviderKind::Gemini,
            self.client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .header("Content-Type", "application/json")
                .json(&body),
        )
        .await?;

        Self::extract_text(&raw)
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}
