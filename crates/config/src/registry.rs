//! Provider registry — the immutable table of backends, endpoints and models.
//!
//! Built once from [`AppConfig`] by layering the user's overrides over the
//! built-in defaults. Nothing mutates it after construction.

use dirflow_core::provider::ProviderKind;
use serde::Serialize;
use std::collections::HashMap;

use crate::{AppConfig, ConfigError};

/// Resolved settings for one backend.
#[derive(Clone)]
pub struct ProviderEntry {
    pub kind: ProviderKind,
    pub display_name: &'static str,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Accepted models. Empty means any model name is accepted.
    pub models: Vec<String>,
    pub default_model: String,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &crate::redact(&self.api_key))
            .field("models", &self.models)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl ProviderEntry {
    /// Whether the backend can be called at all.
    pub fn is_available(&self) -> bool {
        self.kind == ProviderKind::Local || self.api_key.is_some()
    }

    fn builtin(kind: ProviderKind) -> Self {
        let (display_name, api_url, models, default_model): (_, _, &[&str], _) = match kind {
            ProviderKind::Claude => (
                "Claude",
                "https://api.anthropic.com",
                &[
                    "claude-3-haiku-20240307",
                    "claude-3-5-haiku-20241022",
                    "claude-sonnet-4-20250514",
                    "claude-opus-4-1-20250805",
                ],
                "claude-3-5-haiku-20241022",
            ),
            ProviderKind::OpenAi => (
                "OpenAI GPT",
                "https://api.openai.com/v1",
                &["gpt-4.1-mini", "gpt-4", "gpt-4-turbo"],
                "gpt-4",
            ),
            ProviderKind::Gemini => (
                "Google Gemini",
                "https://generativelanguage.googleapis.com/v1beta",
                &["gemini-2.5-flash-lite", "gemini-2.5-flash", "gemini-2.5-pro"],
                "gemini-2.5-flash",
            ),
            ProviderKind::Local => (
                "Local LLM",
                "http://localhost:11434/v1",
                &["phi3:latest", "llama3:latest", "gemma3:4b", "gpt-oss:20b"],
                "phi3:latest",
            ),
        };

        Self {
            kind,
            display_name,
            api_url: api_url.into(),
            api_key: None,
            models: models.iter().map(|m| m.to_string()).collect(),
            default_model: default_model.into(),
        }
    }
}

/// Externally visible availability of one backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub available: bool,
    pub models: Vec<String>,
    pub default_model: String,
}

/// All configured backends, keyed by kind.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    entries: HashMap<ProviderKind, ProviderEntry>,
    default_provider: ProviderKind,
}

impl ProviderRegistry {
    /// Build the registry from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let default_provider = config.default_provider_kind()?;
        let mut entries = HashMap::new();

        for kind in ProviderKind::ALL {
            let mut entry = ProviderEntry::builtin(kind);
            if let Some(overrides) = config.provider(kind) {
                if let Some(url) = &overrides.api_url {
                    entry.api_url = url.trim_end_matches('/').to_string();
                }
                if let Some(models) = &overrides.models {
                    entry.models = models.clone();
                }
                if let Some(model) = &overrides.default_model {
                    entry.default_model = model.clone();
                }
                entry.api_key = overrides.api_key.clone();
            }

            if !entry.models.is_empty() && !entry.models.contains(&entry.default_model) {
                return Err(ConfigError::UnknownModel {
                    provider: kind.as_str().into(),
                    model: entry.default_model,
                });
            }
            entries.insert(kind, entry);
        }

        Ok(Self {
            entries,
            default_provider,
        })
    }

    pub fn default_provider(&self) -> ProviderKind {
        self.default_provider
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderEntry> {
        self.entries.get(&kind)
    }

    /// Parse a provider identifier, falling back to the default when absent.
    pub fn resolve_provider(&self, requested: Option<&str>) -> Result<ProviderKind, ConfigError> {
        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(self.default_provider),
            Some(name) => name
                .parse()
                .map_err(|_| ConfigError::UnknownProvider(name.to_string())),
        }
    }

    /// Pick the model for a call: the requested one if accepted, else the default.
    pub fn resolve_model(
        &self,
        kind: ProviderKind,
        requested: Option<&str>,
    ) -> Result<String, ConfigError> {
        let entry = self
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownProvider(kind.as_str().into()))?;

        match requested.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(entry.default_model.clone()),
            Some(model) if entry.models.is_empty() || entry.models.iter().any(|m| m == model) => {
                Ok(model.to_string())
            }
            Some(model) => Err(ConfigError::UnknownModel {
                provider: kind.as_str().into(),
                model: model.to_string(),
            }),
        }
    }

    /// Status of every backend, in a stable order.
    pub fn status(&self) -> Vec<ProviderStatus> {
        ProviderKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind))
            .map(|entry| ProviderStatus {
                name: entry.display_name.into(),
                available: entry.is_available(),
                models: entry.models.clone(),
                default_model: entry.default_model.clone(),
            })
            .collect()
    }
}
