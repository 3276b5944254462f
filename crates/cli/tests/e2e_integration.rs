//! End-to-end tests for the Dirflow exchange pipeline.
//!
//! These drive the orchestrator built from configuration, with scripted
//! provider bindings standing in for the network, and check the externally
//! observable result of each scenario.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use dirflow_config::{AppConfig, OutsideSandboxPolicy, ProviderRegistry};
use dirflow_core::command::Command;
use dirflow_core::context::{ChatRequest, RawContext};
use dirflow_core::error::GatewayError;
use dirflow_core::provider::{ProviderBinding, ProviderKind, ProviderRequest};
use dirflow_pipeline::{ErrorType, Orchestrator};
use dirflow_providers::ProviderGateway;
use dirflow_security::{CommandValidator, ValidationPolicy};
use serde_json::json;

// ── Scripted binding ─────────────────────────────────────────────────────

/// Returns one scripted reply per call and counts calls.
struct ScriptedBinding {
    kind: ProviderKind,
    reply: Result<String, GatewayError>,
    calls: Mutex<usize>,
}

impl ScriptedBinding {
    fn text(kind: ProviderKind, text: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply: Ok(text.into()),
            calls: Mutex::new(0),
        })
    }

    fn failing(kind: ProviderKind, err: GatewayError) -> Arc<Self> {
        Arc::new(Self {
            kind,
            reply: Err(err),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ProviderBinding for ScriptedBinding {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn send(&self, _request: ProviderRequest, _model: &str) -> Result<String, GatewayError> {
        *self.calls.lock().unwrap() += 1;
        self.reply.clone()
    }
}

fn orchestrator_with(config: &AppConfig, binding: Arc<ScriptedBinding>) -> Orchestrator {
    let registry = ProviderRegistry::from_config(config).unwrap();
    let gateway = ProviderGateway::new(Duration::from_secs(config.request_timeout_secs))
        .with_binding(binding);
    let validator = CommandValidator::new(ValidationPolicy::from(&config.security));
    Orchestrator::new(Arc::new(registry), Arc::new(gateway), Arc::new(validator))
}

fn orchestrator(binding: Arc<ScriptedBinding>) -> Orchestrator {
    orchestrator_with(&AppConfig::default(), binding)
}

fn all_gateway_errors() -> Vec<GatewayError> {
    vec![
        GatewayError::Unauthorized {
            provider: "claude".into(),
            message: "ANTHROPIC_API_KEY is not configured".into(),
        },
        GatewayError::Unreachable {
            provider: "claude".into(),
            message: "connection refused".into(),
        },
        GatewayError::RateLimited {
            provider: "claude".into(),
            retry_after_secs: None,
        },
        GatewayError::BadResponseShape {
            provider: "claude".into(),
            message: "missing content".into(),
        },
        GatewayError::UpstreamError {
            provider: "claude".into(),
            status_code: 502,
            body: "bad gateway".into(),
        },
    ]
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_copy_request_with_unreachable_provider_falls_back() {
    let binding = ScriptedBinding::failing(
        ProviderKind::Claude,
        GatewayError::Unreachable {
            provider: "claude".into(),
            message: "connection refused".into(),
        },
    );
    let result = orchestrator(binding.clone())
        .process(ChatRequest::new("README.mdをコピーしてbackup/README.mdに"))
        .await
        .unwrap();

    assert_eq!(binding.calls(), 1, "exactly one attempt");
    assert!(result.fallback_mode);
    assert!(result.commands.is_empty());
    assert_eq!(result.error_type, Some(ErrorType::NetworkError));
    assert!(result.message.contains("Fallback response"));
}

#[tokio::test]
async fn e2e_every_gateway_error_falls_back() {
    for err in all_gateway_errors() {
        let binding = ScriptedBinding::failing(ProviderKind::Claude, err.clone());
        let result = orchestrator(binding)
            .process(ChatRequest::new("create notes.txt"))
            .await
            .unwrap();

        assert!(result.fallback_mode, "{err} should fall back");
        assert!(result.commands.is_empty());
        assert!(!result.message.trim().is_empty());
        assert!(result.error_type.is_some());
        assert_eq!(result.error.as_deref(), Some(err.to_string().as_str()));
    }
}

#[tokio::test]
async fn e2e_structured_reply_yields_one_command() {
    let binding = ScriptedBinding::text(
        ProviderKind::Claude,
        r#"{"message":"ok","commands":[{"action":"create_file","path":"a.txt"}]}"#,
    );
    let result = orchestrator(binding)
        .process(ChatRequest::new("make a.txt"))
        .await
        .unwrap();

    assert!(result.parse_success);
    assert!(!result.fallback_mode);
    assert_eq!(
        result.commands,
        vec![Command::CreateFile {
            path: "a.txt".into(),
            content: None
        }]
    );
}

#[tokio::test]
async fn e2e_wildcard_delete_is_dropped() {
    let binding = ScriptedBinding::text(
        ProviderKind::Claude,
        r#"Sure! {"message":"deleting everything","commands":[{"action":"delete_file","path":"*"}]}"#,
    );
    let result = orchestrator(binding)
        .process(ChatRequest::new("delete everything"))
        .await
        .unwrap();

    assert!(result.parse_success);
    assert!(result.commands.is_empty());
    assert_eq!(result.validation_errors.len(), 1);
    assert_eq!(result.validation_errors[0].action.as_deref(), Some("delete_file"));
}

#[tokio::test]
async fn e2e_long_history_suggests_new_chat() {
    let turns: Vec<_> = (0..16)
        .map(|i| json!({"user": format!("question {i}"), "ai": "answer"}))
        .collect();
    let context: RawContext = serde_json::from_value(json!({
        "currentPath": "/workspace/projects",
        "conversationHistory": turns
    }))
    .unwrap();

    let binding = ScriptedBinding::text(ProviderKind::Claude, r#"{"message":"ok","commands":[]}"#);
    let result = orchestrator(binding)
        .process(ChatRequest::new("one more").with_context(context))
        .await
        .unwrap();

    assert!(result.should_suggest_new_chat);
    assert_eq!(result.history_count, 15);
}

#[tokio::test]
async fn e2e_mixed_batch_keeps_only_safe_commands() {
    let binding = ScriptedBinding::text(
        ProviderKind::Claude,
        &json!({
            "message": "working on it",
            "commands": [
                {"action": "delete_file", "path": "../etc/passwd"},
                {"action": "web_search", "query": "x".repeat(501)},
                {"action": "batch_delete", "paths": (0..101).map(|i| format!("f{i}.txt")).collect::<Vec<_>>()},
                {"action": "read_file", "path": "notes.md"},
                {"action": "format_disk"}
            ]
        })
        .to_string(),
    );
    let result = orchestrator(binding)
        .process(ChatRequest::new("tidy up"))
        .await
        .unwrap();

    assert_eq!(result.commands, vec![Command::ReadFile { path: "notes.md".into() }]);
    let rejected: Vec<_> = result.validation_errors.iter().map(|r| r.index).collect();
    assert_eq!(rejected, vec![0, 1, 2, 4]);
}

#[tokio::test]
async fn e2e_outside_sandbox_policy_is_configurable() {
    let reply = r#"{"message":"ok","commands":[{"action":"read_file","path":"/srv/data/report.txt"}]}"#;

    let rejected = orchestrator(ScriptedBinding::text(ProviderKind::Claude, reply))
        .process(ChatRequest::new("read the report"))
        .await
        .unwrap();
    assert!(rejected.commands.is_empty());

    let mut config = AppConfig::default();
    config.security.outside_sandbox = OutsideSandboxPolicy::Warn;
    let warned = orchestrator_with(&config, ScriptedBinding::text(ProviderKind::Claude, reply))
        .process(ChatRequest::new("read the report"))
        .await
        .unwrap();
    assert_eq!(warned.commands.len(), 1);
    assert!(warned.warning.is_some());
}

#[tokio::test]
async fn e2e_explicit_provider_and_model() {
    let binding = ScriptedBinding::text(ProviderKind::OpenAi, r#"{"message":"hi","commands":[]}"#);
    let result = orchestrator(binding.clone())
        .process(ChatRequest::new("hello").with_provider("openai").with_model("gpt-4-turbo"))
        .await
        .unwrap();

    assert_eq!(binding.calls(), 1);
    assert_eq!(result.provider, "openai");
    assert_eq!(result.model, "gpt-4-turbo");

    let err = orchestrator(binding)
        .process(ChatRequest::new("hello").with_provider("openai").with_model("gpt-99"))
        .await
        .unwrap_err();
    assert!(matches!(err, dirflow_core::Error::Config { .. }));
}

#[tokio::test]
async fn e2e_result_serializes_camel_case() {
    let binding = ScriptedBinding::text(ProviderKind::Claude, "no json here");
    let result = orchestrator(binding)
        .process(ChatRequest::new("hello"))
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    for key in [
        "message",
        "commands",
        "provider",
        "model",
        "timestamp",
        "parseSuccess",
        "warning",
        "shouldSuggestNewChat",
        "historyCount",
        "fallbackMode",
        "requestId",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["parseSuccess"], false);
}
