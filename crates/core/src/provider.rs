//! Provider binding trait — the abstraction over language-model backends.
//!
//! A binding knows how to translate a [`ProviderRequest`] into one backend's
//! wire format, send it once, and hand back the raw reply text.
//!
//! Implementations: Claude (Anthropic Messages API), OpenAI chat completions,
//! Gemini `generateContent`, and a local Ollama endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, GatewayError};
use crate::message::{ChatMessage, Role};

/// The supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    OpenAi,
    Gemini,
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [Self::Claude, Self::OpenAi, Self::Gemini, Self::Local];

    /// The identifier used on the wire and in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Local => "local",
        }
    }

    /// The request shape this backend expects.
    pub fn request_shape(&self) -> RequestShape {
        match self {
            Self::Claude => RequestShape::SystemAndMessages,
            Self::OpenAi | Self::Local => RequestShape::Messages,
            Self::Gemini => RequestShape::Content,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            "local" => Ok(Self::Local),
            other => Err(Error::config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Which [`ProviderRequest`] variant a backend consumes natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    SystemAndMessages,
    Messages,
    Content,
}

/// A fully built prompt, in one of the three wire shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ProviderRequest {
    /// Top-level system prompt plus user/assistant turns.
    SystemAndMessages {
        system: String,
        messages: Vec<ChatMessage>,
    },
    /// Turns with the system prompt as the leading `system` message.
    Messages { messages: Vec<ChatMessage> },
    /// One concatenated prompt string.
    Content { content: String },
}

impl ProviderRequest {
    pub fn shape(&self) -> RequestShape {
        match self {
            Self::SystemAndMessages { .. } => RequestShape::SystemAndMessages,
            Self::Messages { .. } => RequestShape::Messages,
            Self::Content { .. } => RequestShape::Content,
        }
    }

    /// Split into an optional system prompt and the remaining turns.
    ///
    /// System-role messages anywhere in a `Messages` request are joined into
    /// the system prompt.
    pub fn into_system_and_messages(self) -> (Option<String>, Vec<ChatMessage>) {
        match self {
            Self::SystemAndMessages { system, messages } => {
                let system = (!system.is_empty()).then_some(system);
                (system, messages)
            }
            Self::Messages { messages } => {
                let mut system_parts = Vec::new();
                let mut rest = Vec::with_capacity(messages.len());
                for msg in messages {
                    match msg.role {
                        Role::System => system_parts.push(msg.content),
                        _ => rest.push(msg),
                    }
                }
                let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
                (system, rest)
            }
            Self::Content { content } => (None, vec![ChatMessage::user(content)]),
        }
    }

    /// Flatten into role-tagged messages with a leading system message.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Self::Messages { messages } => messages,
            other => {
                let (system, rest) = other.into_system_and_messages();
                let mut messages = Vec::with_capacity(rest.len() + 1);
                if let Some(system) = system {
                    messages.push(ChatMessage::system(system));
                }
                messages.extend(rest);
                messages
            }
        }
    }

    /// Flatten into a single prompt string.
    pub fn into_content(self) -> String {
        match self {
            Self::Content { content } => content,
            other => other
                .into_messages()
                .into_iter()
                .map(|m| format!("[{}]\n{}", m.role.as_str(), m.content))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// The wire binding for one backend.
///
/// Bindings translate and transport only; timeouts, fallback and
/// interpretation of the reply belong to the caller.
#[async_trait]
pub trait ProviderBinding: Send + Sync {
    /// Which backend family this binding talks to.
    fn kind(&self) -> ProviderKind;

    /// Whether a credential is configured (always true for keyless backends).
    fn has_credential(&self) -> bool {
        true
    }

    /// Send the request once and return the reply text.
    async fn send(&self, request: ProviderRequest, model: &str) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!(" openai ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!(matches!(
            "mistral".parse::<ProviderKind>(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn shapes_per_provider() {
        assert_eq!(ProviderKind::Claude.request_shape(), RequestShape::SystemAndMessages);
        assert_eq!(ProviderKind::Local.request_shape(), RequestShape::Messages);
        assert_eq!(ProviderKind::Gemini.request_shape(), RequestShape::Content);
    }

    #[test]
    fn system_extraction_from_messages() {
        let req = ProviderRequest::Messages {
            messages: vec![
                ChatMessage::system("Be terse"),
                ChatMessage::user("hi"),
                ChatMessage::assistant("hello"),
            ],
        };
        let (system, rest) = req.into_system_and_messages();
        assert_eq!(system.as_deref(), Some("Be terse"));
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].role, Role::User);
    }

    #[test]
    fn system_and_messages_flatten_to_leading_system() {
        let req = ProviderRequest::SystemAndMessages {
            system: "rules".into(),
            messages: vec![ChatMessage::user("q")],
        };
        let messages = req.into_messages();
        assert_eq!(messages[0], ChatMessage::system("rules"));
        assert_eq!(messages[1], ChatMessage::user("q"));
    }

    #[test]
    fn content_request_becomes_single_user_turn() {
        let req = ProviderRequest::Content {
            content: "everything".into(),
        };
        let (system, rest) = req.into_system_and_messages();
        assert!(system.is_none());
        assert_eq!(rest, vec![ChatMessage::user("everything")]);
    }

    #[test]
    fn messages_flatten_to_content() {
        let req = ProviderRequest::Messages {
            messages: vec![ChatMessage::system("s"), ChatMessage::user("u")],
        };
        assert_eq!(req.into_content(), "[system]\ns\n\n[user]\nu");
    }
}
