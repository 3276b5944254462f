//! Provider gateway: one bounded call to the selected backend.
//!
//! The gateway never retries. Timeouts and transport failures surface as
//! [`GatewayError::Unreachable`] so the pipeline can fall back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dirflow_config::{AppConfig, ProviderRegistry};
use dirflow_core::error::GatewayError;
use dirflow_core::provider::{ProviderBinding, ProviderKind, ProviderRequest};
use tracing::{debug, warn};

use crate::anthropic::AnthropicBinding;
use crate::gemini::GeminiBinding;
use crate::openai_compat::OpenAiCompatBinding;

/// Routes provider requests to the registered binding.
pub struct ProviderGateway {
    bindings: HashMap<ProviderKind, Arc<dyn ProviderBinding>>,
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(timeout: Duration) -> Self {
        Self {
            bindings: HashMap::new(),
            timeout,
        }
    }

    /// Register a binding under its own kind, replacing any previous one.
    pub fn register(&mut self, binding: Arc<dyn ProviderBinding>) {
        self.bindings.insert(binding.kind(), binding);
    }

    pub fn with_binding(mut self, binding: Arc<dyn ProviderBinding>) -> Self {
        self.register(binding);
        self
    }

    pub fn supports(&self, kind: ProviderKind) -> bool {
        self.bindings.contains_key(&kind)
    }

    /// Whether the binding for `kind` holds a credential.
    pub fn has_credential(&self, kind: ProviderKind) -> bool {
        self.bindings.get(&kind).is_some_and(|b| b.has_credential())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform exactly one call to the binding for `kind`.
    pub async fn call(
        &self,
        request: ProviderRequest,
        kind: ProviderKind,
        model: &str,
    ) -> Result<String, GatewayError> {
        let binding = self.bindings.get(&kind).ok_or_else(|| GatewayError::Unreachable {
            provider: kind.to_string(),
            message: "no binding registered".into(),
        })?;

        debug!(provider = %kind, model = %model, shape = ?request.shape(), "Calling provider");

        match tokio::time::timeout(self.timeout, binding.send(request, model)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = %kind,
                    timeout_secs = self.timeout.as_secs(),
                    "Provider call timed out"
                );
                Err(GatewayError::Unreachable {
                    provider: kind.to_string(),
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                })
            }
        }
    }
}

/// Build a gateway with a binding for every provider in the registry.
pub fn build_from_config(config: &AppConfig, registry: &ProviderRegistry) -> ProviderGateway {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to configure HTTP client, using defaults");
            reqwest::Client::new()
        });

    let mut gateway = ProviderGateway::new(timeout);

    for kind in ProviderKind::ALL {
        let Some(entry) = registry.get(kind) else {
            continue;
        };
        let key = entry.api_key.clone();
        let (max_tokens, temperature) = (config.max_tokens, config.temperature);

        let binding: Arc<dyn ProviderBinding> = match kind {
            ProviderKind::Claude => Arc::new(
                AnthropicBinding::new(client.clone(), key)
                    .with_base_url(&entry.api_url)
                    .with_generation(max_tokens, temperature),
            ),
            ProviderKind::OpenAi => Arc::new(
                OpenAiCompatBinding::openai(client.clone(), key)
                    .with_base_url(&entry.api_url)
                    .with_generation(max_tokens, temperature),
            ),
            ProviderKind::Gemini => Arc::new(
                GeminiBinding::new(client.clone(), key)
                    .with_base_url(&entry.api_url)
                    .with_generation(max_tokens, temperature),
            ),
            ProviderKind::Local => Arc::new(
                OpenAiCompatBinding::local(client.clone(), Some(entry.api_url.as_str()))
                    .with_generation(max_tokens, temperature),
            ),
        };
        gateway.register(binding);
    }

    gateway
}
