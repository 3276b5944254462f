//! Request context — the ambient state a caller sends with each message.
//!
//! [`RawContext`] is what arrives on the wire: every field optional and
//! loosely typed where front-ends are known to be sloppy. The context
//! preparer turns it into a fully populated [`RequestContext`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::history::ConversationHistory;

/// A caller-supplied system prompt replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPromptSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_prompt_name")]
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub description: String,
}

fn default_prompt_name() -> String {
    "Unknown".into()
}

impl CustomPromptSpec {
    /// Whether this prompt replaces the base system prompt.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.content.trim().is_empty()
    }
}

/// Context exactly as received; nothing here is trusted yet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContext {
    #[serde(default)]
    pub current_path: Option<String>,

    /// Entries that are not strings are dropped during preparation.
    #[serde(default, deserialize_with = "array_or_none")]
    pub file_list: Option<Vec<serde_json::Value>>,

    #[serde(default)]
    pub current_file: Option<String>,

    #[serde(default)]
    pub open_file_info: Option<String>,

    #[serde(default)]
    pub custom_prompt: Option<serde_json::Value>,

    /// Entries that do not have the turn shape are dropped during preparation.
    #[serde(default, deserialize_with = "array_or_none")]
    pub conversation_history: Option<Vec<serde_json::Value>>,
}

/// A list field that is not a JSON array is treated as absent.
fn array_or_none<'de, D>(deserializer: D) -> Result<Option<Vec<serde_json::Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Array(items)) => Ok(Some(items)),
        _ => Ok(None),
    }
}

/// Normalized, bounded context for a single exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub current_path: String,
    pub file_list: Vec<String>,
    pub current_file: Option<String>,
    pub open_file_info: Option<String>,
    pub custom_prompt: Option<CustomPromptSpec>,
    pub conversation_history: ConversationHistory,
}

impl RequestContext {
    /// The custom prompt, if it is enabled and non-empty.
    pub fn active_custom_prompt(&self) -> Option<&CustomPromptSpec> {
        self.custom_prompt.as_ref().filter(|p| p.is_active())
    }
}

/// One chat exchange as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub context: RawContext,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            provider: None,
            model: None,
            context: RawContext::default(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: RawContext) -> Self {
        self.context = context;
        self
    }
}
