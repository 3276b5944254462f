//! Configuration loading, validation, and the provider registry for Dirflow.
//!
//! Loads configuration from `~/.dirflow/config.toml` (or an explicit path)
//! with environment variable overrides for credentials. Everything is resolved
//! once at startup; after that the configuration and the [`ProviderRegistry`]
//! built from it are read-only and shared behind `Arc`.

mod registry;

pub use registry::{ProviderEntry, ProviderRegistry, ProviderStatus};

use dirflow_core::HistoryLimits;
use dirflow_core::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Upper bounds the history limits are clamped to.
const HISTORY_ITEMS_CEILING: usize = 50;
const HISTORY_CHARS_CEILING: usize = 50_000;

/// The root configuration structure.
///
/// Maps directly to `~/.dirflow/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Provider used when a request names none
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Upper bound on a single backend call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Max tokens per backend reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-provider overrides, keyed by provider id (`claude`, `openai`, ...)
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "claude".into()
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("default_provider", &self.default_provider)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("history", &self.history)
            .field("gateway", &self.gateway)
            .field("security", &self.security)
            .field("routing", &self.routing)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .finish()
    }
}

/// Conversation history bounds and context defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_max_file_list")]
    pub max_file_list: usize,

    /// `currentPath` used when a request omits it
    #[serde(default = "default_workspace")]
    pub default_path: String,
}

fn default_max_items() -> usize {
    dirflow_core::history::DEFAULT_MAX_ITEMS
}
fn default_max_chars() -> usize {
    dirflow_core::history::DEFAULT_MAX_CHARS
}
fn default_max_file_list() -> usize {
    1000
}
fn default_workspace() -> String {
    "/workspace".into()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_chars: default_max_chars(),
            max_file_list: default_max_file_list(),
            default_path: default_workspace(),
        }
    }
}

impl HistoryConfig {
    /// Reconciliation bounds, clamped to the supported ceiling.
    pub fn limits(&self) -> HistoryLimits {
        HistoryLimits {
            max_items: self.max_items.min(HISTORY_ITEMS_CEILING),
            max_chars: self.max_chars.min(HISTORY_CHARS_CEILING),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Cross-origin callers allowed by CORS. Empty = same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3001
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            allowed_origins: vec![],
        }
    }
}

/// What to do with absolute paths outside the sandbox root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutsideSandboxPolicy {
    /// Refuse the command.
    #[default]
    Reject,
    /// Accept the command and record an advisory.
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_workspace")]
    pub sandbox_root: String,

    #[serde(default)]
    pub outside_sandbox: OutsideSandboxPolicy,

    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,

    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,

    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

fn default_forbidden_paths() -> Vec<String> {
    [
        "/etc",
        "/var",
        "/usr",
        "/bin",
        "/sbin",
        "/root",
        "C:\\Windows",
        "C:\\Program Files",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_max_batch_items() -> usize {
    100
}
fn default_max_query_chars() -> usize {
    500
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            sandbox_root: default_workspace(),
            outside_sandbox: OutsideSandboxPolicy::default(),
            forbidden_paths: default_forbidden_paths(),
            max_batch_items: default_max_batch_items(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

/// Specialist persona routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Overrides for one provider. Unset fields keep the built-in values.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Replaces the built-in model list. An empty list accepts any model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

/// Environment variables holding provider credentials.
const CREDENTIAL_VARS: [(ProviderKind, &str); 3] = [
    (ProviderKind::Claude, "ANTHROPIC_API_KEY"),
    (ProviderKind::OpenAi, "OPENAI_API_KEY"),
    (ProviderKind::Gemini, "GOOGLE_API_KEY"),
];

impl AppConfig {
    /// Load configuration from the default path (~/.dirflow/config.toml).
    ///
    /// Credentials missing from the file are taken from the environment:
    /// - `ANTHROPIC_API_KEY` for claude
    /// - `OPENAI_API_KEY` for openai
    /// - `GOOGLE_API_KEY` for gemini
    ///
    /// `DIRFLOW_PROVIDER` and `DIRFLOW_PORT` override the file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Like [`AppConfig::load`] but from an explicit file.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (kind, var) in CREDENTIAL_VARS {
            let entry = self.providers.entry(kind.as_str().to_string()).or_default();
            if entry.api_key.is_none() {
                entry.api_key = lookup(var).filter(|v| !v.trim().is_empty());
            }
        }

        if let Some(provider) = lookup("DIRFLOW_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(port) = lookup("DIRFLOW_PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dirflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        if self.history.max_items == 0 || self.history.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "history limits must be > 0".into(),
            ));
        }

        if self.security.max_batch_items == 0 || self.security.max_query_chars == 0 {
            return Err(ConfigError::ValidationError(
                "security limits must be > 0".into(),
            ));
        }

        self.default_provider_kind()?;
        for name in self.providers.keys() {
            name.parse::<ProviderKind>()
                .map_err(|_| ConfigError::UnknownProvider(name.clone()))?;
        }

        Ok(())
    }

    pub fn default_provider_kind(&self) -> Result<ProviderKind, ConfigError> {
        self.default_provider
            .parse()
            .map_err(|_| ConfigError::UnknownProvider(self.default_provider.clone()))
    }

    /// Overrides configured for `kind`, if any.
    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.providers.get(kind.as_str())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            request_timeout_secs: default_request_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            history: HistoryConfig::default(),
            gateway: GatewayConfig::default(),
            security: SecurityConfig::default(),
            routing: RoutingConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("Unknown model '{model}' for provider '{provider}'")]
    UnknownModel { provider: String, model: String },
}

impl From<ConfigError> for dirflow_core::Error {
    fn from(err: ConfigError) -> Self {
        dirflow_core::Error::config(err.to_string())
    }
}
