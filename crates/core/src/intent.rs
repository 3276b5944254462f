//! Structured intent — what a backend reply means before validation.

use serde::{Deserialize, Serialize};

use crate::command::ProposedCommand;

/// Warning attached when a reply does not follow the JSON contract.
pub const PARSE_WARNING: &str = "could not parse structured response";

/// The parsed, pre-validation result of a single backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredIntent {
    pub message: String,
    pub commands: Vec<ProposedCommand>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StructuredIntent {
    pub fn parsed(message: impl Into<String>, commands: Vec<ProposedCommand>) -> Self {
        Self {
            message: message.into(),
            commands,
            success: true,
            warning: None,
        }
    }

    /// The reply could not be read as an intent; keep the text as-is.
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            message: raw.into(),
            commands: Vec::new(),
            success: false,
            warning: Some(PARSE_WARNING.into()),
        }
    }
}
