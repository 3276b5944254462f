//! Provider bindings and the single-attempt gateway for Dirflow.
//!
//! All bindings implement `dirflow_core::ProviderBinding`.
//! The gateway selects the binding for a request's provider, bounds the call
//! with the configured timeout, and performs exactly one attempt.

pub mod anthropic;
pub mod gateway;
pub mod gemini;
pub mod openai_compat;

pub use anthropic::AnthropicBinding;
pub use gateway::{ProviderGateway, build_from_config};
pub use gemini::GeminiBinding;
pub use openai_compat::OpenAiCompatBinding;

use dirflow_core::error::GatewayError;
use dirflow_core::provider::ProviderKind;
use tracing::warn;

/// Send a prepared request and return the body of a 2xx reply.
///
/// Non-2xx statuses are classified here so every binding maps them the same way.
pub(crate) async fn send_request(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
) -> Result<String, GatewayError> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::Unreachable {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if status.is_success() {
        return response.text().await.map_err(|e| GatewayError::Unreachable {
            provider: provider.to_string(),
            message: format!("body read failed: {e}"),
        });
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let body = response.text().await.unwrap_or_default();
    warn!(provider = %provider, status = status.as_u16(), body = %body, "Provider returned error");

    Err(classify_status(provider, status.as_u16(), retry_after, body))
}

/// Map a non-2xx status to a gateway error.
pub(crate) fn classify_status(
    provider: ProviderKind,
    status: u16,
    retry_after_secs: Option<u64>,
    body: String,
) -> GatewayError {
    let provider = provider.to_string();
    match status {
        429 => GatewayError::RateLimited {
            provider,
            retry_after_secs,
        },
        401 | 403 => GatewayError::Unauthorized {
            provider,
            message: format!("credential rejected (HTTP {status})"),
        },
        _ => GatewayError::UpstreamError {
            provider,
            status_code: status,
            body,
        },
    }
}

/// The error for a binding whose credential was never configured.
pub(crate) fn missing_credential(provider: ProviderKind, var: &str) -> GatewayError {
    GatewayError::Unauthorized {
        provider: provider.to_string(),
        message: format!("{var} is not configured"),
    }
}

/// The error for a 2xx body that does not have the expected shape.
pub(crate) fn bad_shape(provider: ProviderKind, message: impl Into<String>) -> GatewayError {
    GatewayError::BadResponseShape {
        provider: provider.to_string(),
        message: message.into(),
    }
}
