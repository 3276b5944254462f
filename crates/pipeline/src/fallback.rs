//! Deterministic fallback responder for exchanges where no backend reply
//! could be used.

use dirflow_core::context::RequestContext;
use dirflow_core::error::GatewayError;
use serde::Serialize;

pub const FALLBACK_NOTICE: &str = "(Fallback response: the language model backend could not be used)";

const HELP_TEXT: &str = "\
Available commands:

Files
- Create a file: \"create sample.txt\"
- Create a folder: \"make a documents folder\"
- Read a file: \"show me the contents of notes.md\"
- Edit a file: \"change the contents of notes.md\"
- Copy a file: \"copy README.md to backup/\"
- Move or rename: \"move report.txt into archive\"
- Delete a file: \"delete old.log\"
- List files: \"what files are here?\"

Batch operations
- \"delete every .txt file\"
- \"copy all images into images/\"
- \"move old files into archive/\"

Web search
- \"look up the latest Rust release\"
- \"search for a comparison of React and Vue\"";

const GENERIC_REPLIES: [&str; 5] = [
    "The file operation has been carried out.",
    "The analysis is complete.",
    "Processing finished successfully.",
    "Happy to answer your question. Is there anything I can help with?",
    "Understood. Let me know if you need anything else.",
];

/// Error class reported alongside a fallback response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    CredentialMissing,
    RateLimited,
    NetworkError,
    UpstreamError,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialMissing => "credential-missing",
            Self::RateLimited => "rate-limited",
            Self::NetworkError => "network-error",
            Self::UpstreamError => "upstream-error",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&GatewayError> for ErrorType {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized { .. } => Self::CredentialMissing,
            GatewayError::RateLimited { .. } => Self::RateLimited,
            GatewayError::Unreachable { .. } => Self::NetworkError,
            GatewayError::UpstreamError { .. } => Self::UpstreamError,
            GatewayError::BadResponseShape { .. } => Self::Unknown,
        }
    }
}

/// What the fallback responder produced for a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackReply {
    pub message: String,
    pub error_type: ErrorType,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackResponder;

impl FallbackResponder {
    /// Build the full fallback message for a gateway failure.
    pub fn respond(&self, message: &str, context: &RequestContext, err: &GatewayError) -> FallbackReply {
        let error_type = ErrorType::from(err);
        let explanation = match error_type {
            ErrorType::CredentialMissing => {
                "No valid API key is configured for this provider. Check your environment settings.".to_string()
            }
            ErrorType::RateLimited => match err {
                GatewayError::RateLimited {
                    retry_after_secs: Some(secs),
                    ..
                } => format!("The provider's rate limit was reached. Try again in {secs} seconds."),
                _ => "The provider's rate limit was reached. Wait a moment and try again.".to_string(),
            },
            ErrorType::NetworkError => {
                "A network error occurred while contacting the provider. Check the connection.".to_string()
            }
            ErrorType::UpstreamError => {
                "The provider returned a server error. Try again shortly.".to_string()
            }
            ErrorType::Unknown => format!("Unexpected error: {err}"),
        };

        FallbackReply {
            message: format!(
                "{explanation}\n\n{}\n\n{FALLBACK_NOTICE}",
                self.canned(message, context)
            ),
            error_type,
            error: err.to_string(),
        }
    }

    /// The keyword-matched canned reply.
    pub fn canned(&self, message: &str, context: &RequestContext) -> String {
        let cmd = message.to_lowercase();

        if contains_any(&cmd, &["help", "ヘルプ"]) {
            return HELP_TEXT.into();
        }
        if contains_any(&cmd, &["検索", "調べて", "リサーチ", "search"]) {
            return "A web search was requested. (Fallback mode: check the search API connection.)".into();
        }
        if contains_any(&cmd, &["作成", "create"]) {
            return "File or folder creation was requested. (Fallback mode: check the API connection.)".into();
        }
        if contains_any(&cmd, &["コピー", "copy"]) {
            return "A file copy was requested. (Fallback mode: check the API connection.)".into();
        }
        if contains_any(&cmd, &["移動", "move"]) {
            return "A file move was requested. (Fallback mode: check the API connection.)".into();
        }
        if contains_any(&cmd, &["一覧", "list"]) {
            return format!(
                "Current directory: {}\nFile count: {}",
                context.current_path,
                context.file_list.len()
            );
        }

        GENERIC_REPLIES[generic_index(message)].into()
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Stable choice among the generic replies for a given message.
fn generic_index(message: &str) -> usize {
    let sum = message
        .chars()
        .fold(0usize, |acc, ch| acc.wrapping_add(ch as usize));
    sum % GENERIC_REPLIES.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPreparer;
    use dirflow_core::context::RawContext;

    fn ctx() -> RequestContext {
        ContextPreparer::default().prepare(RawContext::default())
    }

    fn unreachable() -> GatewayError {
        GatewayError::Unreachable {
            provider: "claude".into(),
            message: "connection refused".into(),
        }
    }

    #[test]
    fn keyword_branches() {
        let r = FallbackResponder;
        assert!(r.canned("help me", &ctx()).starts_with("Available commands"));
        assert!(r.canned("ヘルプ", &ctx()).starts_with("Available commands"));
        assert!(r.canned("Rustについて調べて", &ctx()).contains("web search"));
        assert!(r.canned("README.mdをコピーしてbackup/README.mdに", &ctx()).contains("copy"));
        assert!(r.canned("move it", &ctx()).contains("move"));
        assert!(r.canned("create a folder", &ctx()).contains("creation"));
        assert_eq!(
            r.canned("list", &ctx()),
            "Current directory: /workspace\nFile count: 0"
        );
    }

    #[test]
    fn generic_reply_is_deterministic() {
        let r = FallbackResponder;
        let first = r.canned("good morning", &ctx());
        assert_eq!(first, r.canned("good morning", &ctx()));
        assert!(GENERIC_REPLIES.contains(&first.as_str()));
    }

    #[test]
    fn every_gateway_error_yields_a_message() {
        let errors = [
            GatewayError::Unauthorized {
                provider: "openai".into(),
                message: "OPENAI_API_KEY is not configured".into(),
            },
            unreachable(),
            GatewayError::RateLimited {
                provider: "gemini".into(),
                retry_after_secs: Some(30),
            },
            GatewayError::BadResponseShape {
                provider: "claude".into(),
                message: "empty".into(),
            },
            GatewayError::UpstreamError {
                provider: "claude".into(),
                status_code: 529,
                body: "overloaded".into(),
            },
        ];
        let expected = [
            ErrorType::CredentialMissing,
            ErrorType::NetworkError,
            ErrorType::RateLimited,
            ErrorType::Unknown,
            ErrorType::UpstreamError,
        ];

        for (err, expected) in errors.iter().zip(expected) {
            let reply = FallbackResponder.respond("anything", &ctx(), err);
            assert_eq!(reply.error_type, expected);
            assert!(reply.message.ends_with(FALLBACK_NOTICE));
            assert!(!reply.error.is_empty());
        }
    }

    #[test]
    fn explanation_precedes_canned_text() {
        let reply = FallbackResponder.respond("copy a.txt", &ctx(), &unreachable());
        let network = reply.message.find("network error").unwrap();
        let canned = reply.message.find("A file copy").unwrap();
        assert!(network < canned);
    }

    #[test]
    fn error_type_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(ErrorType::CredentialMissing).unwrap(),
            "credential-missing"
        );
        assert_eq!(ErrorType::NetworkError.as_str(), "network-error");
    }
}
