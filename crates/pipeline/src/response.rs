//! The outcome of one exchange, as returned to callers.
//!
//! Success, partial success and fallback all share this shape; optional
//! fields are omitted when empty.

use chrono::{DateTime, Utc};
use dirflow_core::command::Command;
use dirflow_core::provider::ProviderKind;
use dirflow_security::RejectedCommand;
use serde::Serialize;
use uuid::Uuid;

use crate::fallback::{ErrorType, FallbackReply};
use crate::router::{AgentUsed, PersonaKey};
use crate::search::SearchOutcome;

pub const NEW_CHAT_NOTE: &str =
    "This conversation is getting long. If you are moving to a new topic, consider starting a new chat.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub message: String,
    pub commands: Vec<Command>,
    pub provider: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub parse_success: bool,
    pub warning: Option<String>,
    pub should_suggest_new_chat: bool,
    pub history_count: usize,
    pub fallback_mode: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<RejectedCommand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub custom_prompt_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_prompt_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<AgentUsed>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_results: Vec<SearchOutcome>,

    pub request_id: Uuid,
}

impl OrchestrationResult {
    /// A result with no commands and no optional fields set.
    pub fn new(request_id: Uuid, provider: ProviderKind, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            commands: Vec::new(),
            provider: provider.to_string(),
            model: model.into(),
            timestamp: Utc::now(),
            parse_success: true,
            warning: None,
            should_suggest_new_chat: false,
            history_count: 0,
            fallback_mode: false,
            validation_errors: Vec::new(),
            error_type: None,
            error: None,
            custom_prompt_used: false,
            custom_prompt_name: None,
            agent_used: None,
            search_results: Vec::new(),
            request_id,
        }
    }

    /// A fallback-mode result built from the responder's reply.
    pub fn fallback(request_id: Uuid, provider: ProviderKind, model: impl Into<String>, reply: FallbackReply) -> Self {
        let mut result = Self::new(request_id, provider, model, reply.message);
        result.fallback_mode = true;
        result.warning = Some(format!("fallback response used: {}", reply.error_type.as_str()));
        result.error_type = Some(reply.error_type);
        result.error = Some(reply.error);
        result
    }

    /// Append the advisory notes for the fields already set on this result.
    pub fn annotate(&mut self) {
        if self.should_suggest_new_chat && !self.message.contains(NEW_CHAT_NOTE) {
            self.message.push_str("\n\n");
            self.message.push_str(NEW_CHAT_NOTE);
        }
        if self.custom_prompt_used {
            if let Some(name) = &self.custom_prompt_name {
                self.message
                    .push_str(&format!("\n\nAnswered using the custom prompt \"{name}\"."));
            }
        }
        if let Some(agent) = self
            .agent_used
            .as_ref()
            .filter(|a| a.key != PersonaKey::GeneralAssistant)
        {
            self.message
                .push_str(&format!("\n\nHandled by the {}.", agent.name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::PersonaRouter;

    fn result() -> OrchestrationResult {
        OrchestrationResult::new(Uuid::new_v4(), ProviderKind::Claude, "claude-3-5-haiku-20241022", "done")
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let json = serde_json::to_value(result()).unwrap();
        assert_eq!(json["provider"], "claude");
        assert_eq!(json["parseSuccess"], true);
        assert!(json["warning"].is_null());
        assert!(json.get("validationErrors").is_none());
        assert!(json.get("errorType").is_none());
        assert!(json.get("agentUsed").is_none());
        assert!(json.get("searchResults").is_none());
        assert!(json["requestId"].is_string());
    }

    #[test]
    fn fallback_sets_error_fields() {
        let reply = FallbackReply {
            message: "sorry".into(),
            error_type: ErrorType::RateLimited,
            error: "claude: rate limited".into(),
        };
        let json = serde_json::to_value(OrchestrationResult::fallback(
            Uuid::new_v4(),
            ProviderKind::Claude,
            "m",
            reply,
        ))
        .unwrap();
        assert_eq!(json["fallbackMode"], true);
        assert_eq!(json["errorType"], "rate-limited");
        assert_eq!(json["commands"], serde_json::json!([]));
    }

    #[test]
    fn annotate_appends_notes_once() {
        let mut r = result();
        r.should_suggest_new_chat = true;
        r.custom_prompt_used = true;
        r.custom_prompt_name = Some("Reviewer".into());
        r.agent_used = Some(AgentUsed::from(PersonaRouter::persona(PersonaKey::FileExpert)));
        r.annotate();

        assert!(r.message.starts_with("done\n\n"));
        assert_eq!(r.message.matches(NEW_CHAT_NOTE).count(), 1);
        assert!(r.message.contains("custom prompt \"Reviewer\""));
        assert!(r.message.ends_with("Handled by the File Operations Expert."));
    }

    #[test]
    fn general_assistant_is_not_announced() {
        let mut r = result();
        r.agent_used = Some(AgentUsed::from(PersonaRouter::persona(PersonaKey::GeneralAssistant)));
        r.annotate();
        assert_eq!(r.message, "done");
    }
}
