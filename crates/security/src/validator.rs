//! Command validator: schema and security checks over proposed commands.
//!
//! A proposed command passes through, in order:
//! 1. Action allow-list
//! 2. Required and optional field shapes
//! 3. Web-search query and options
//! 4. Deletion safety (root, wildcards, sandbox root)
//! 5. Path policy for every named path
//!
//! Destructive actions and critical deletion targets are audit-logged but
//! not rejected. Validation never mutates its input.

use dirflow_config::{OutsideSandboxPolicy, SecurityConfig};
use dirflow_core::command::{Command, CommandAction, FieldKind, SearchProvider};
use dirflow_core::error::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::audit::{AuditEvent, AuditLogger, AuditOutcome};
use crate::path::{PathCheck, PathPolicy};

const AUDIT_ACTOR: &str = "model";
const MIN_SEARCH_RESULTS: u64 = 1;
const MAX_SEARCH_RESULTS: u64 = 20;

/// Deletion targets that earn an advisory.
pub const CRITICAL_FILES: [&str; 7] = [
    "package.json",
    ".env",
    "config.json",
    "settings.json",
    ".git",
    "node_modules",
    "README.md",
];

/// Limits the validator enforces.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub paths: PathPolicy,
    pub outside_sandbox: OutsideSandboxPolicy,
    pub max_batch_items: usize,
    pub max_query_chars: usize,
}

impl From<&SecurityConfig> for ValidationPolicy {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            paths: PathPolicy::from(config),
            outside_sandbox: config.outside_sandbox,
            max_batch_items: config.max_batch_items,
            max_query_chars: config.max_query_chars,
        }
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::from(&SecurityConfig::default())
    }
}

/// A command that passed validation, with any advisories it raised.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCommand {
    pub command: Command,
    pub advisories: Vec<String>,
}

/// A dropped command, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCommand {
    pub index: usize,
    pub action: Option<String>,
    pub reason: String,
}

/// Per-item outcome of validating a list of proposed commands.
#[derive(Debug, Clone, Default)]
pub struct BatchValidation {
    pub accepted: Vec<Command>,
    pub advisories: Vec<String>,
    pub rejected: Vec<RejectedCommand>,
}

/// Static description of the validator's rules.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorStats {
    pub allowed_actions: Vec<&'static str>,
    pub allowed_action_count: usize,
    pub dangerous_actions: Vec<&'static str>,
    pub dangerous_action_count: usize,
    pub critical_files: Vec<&'static str>,
    pub max_batch_items: usize,
    pub max_query_chars: usize,
    pub max_search_results: u64,
    pub search_providers: Vec<&'static str>,
    pub sandbox_root: String,
    pub outside_sandbox: OutsideSandboxPolicy,
}

/// Validates proposed commands against the schema and security policy.
#[derive(Debug)]
pub struct CommandValidator {
    policy: ValidationPolicy,
    audit: AuditLogger,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new(ValidationPolicy::default())
    }
}

impl CommandValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            audit: AuditLogger::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validate a single proposed command.
    pub fn validate(&self, proposed: &Value) -> Result<ValidatedCommand, ValidationError> {
        let obj = proposed.as_object().ok_or(ValidationError::NotAnObject)?;

        let action_name = obj
            .get("action")
            .and_then(Value::as_str)
            .ok_or(ValidationError::MissingAction)?;
        let action: CommandAction =
            action_name
                .parse()
                .map_err(|_| ValidationError::UnknownAction {
                    action: action_name.to_string(),
                })?;

        for (field, kind) in action.required_fields() {
            match obj.get(*field) {
                None | Some(Value::Null) => {
                    return Err(ValidationError::MissingField {
                        action: action.to_string(),
                        field: field.to_string(),
                    });
                }
                Some(value) => self.check_field(action, field, *kind, value)?,
            }
        }
        for (field, kind) in action.optional_fields() {
            if let Some(value) = obj.get(*field).filter(|v| !v.is_null()) {
                self.check_field(action, field, *kind, value)?;
            }
        }

        if action == CommandAction::WebSearch {
            self.check_search(obj)?;
        }

        let command: Command =
            serde_json::from_value(proposed.clone()).map_err(|e| ValidationError::InvalidType {
                action: action.to_string(),
                field: "command".into(),
                expected: format!("a well-formed command ({e})"),
            })?;

        let mut advisories = Vec::new();

        if action.is_deletion() {
            for path in command.paths() {
                self.check_deletion(path)?;
            }
        }

        for path in command.paths().into_iter().filter(|p| !p.trim().is_empty()) {
            if self.policy.paths.check(path)? == PathCheck::OutsideSandbox {
                advisories.push(format!(
                    "{action}: '{path}' is outside the sandbox root '{}'",
                    self.policy.paths.sandbox_root()
                ));
                self.audit.log(
                    AuditEvent::PathOutsideSandbox { path: path.into() },
                    AUDIT_ACTOR,
                    path,
                    AuditOutcome::Warned,
                    None,
                );
            }
        }

        if action.is_deletion() {
            for path in command.paths().into_iter().filter(|p| is_critical(p)) {
                advisories.push(format!("{action}: '{path}' is a critical project file"));
                self.audit.log(
                    AuditEvent::CriticalTarget { path: path.into() },
                    AUDIT_ACTOR,
                    path,
                    AuditOutcome::Warned,
                    Some(action.to_string()),
                );
            }
        }

        if action.is_destructive() {
            self.audit.log(
                AuditEvent::DestructiveCommand {
                    action: action.to_string(),
                },
                AUDIT_ACTOR,
                &command.paths().join(", "),
                AuditOutcome::Allowed,
                None,
            );
        }

        debug!(action = %action, advisories = advisories.len(), "Command validated");
        Ok(ValidatedCommand {
            command,
            advisories,
        })
    }

    /// Validate every proposed command, keeping the ones that pass.
    pub fn validate_all(&self, proposed: &[Value]) -> BatchValidation {
        let mut batch = BatchValidation::default();

        for (index, item) in proposed.iter().enumerate() {
            match self.validate(item) {
                Ok(validated) => {
                    batch.accepted.push(validated.command);
                    batch.advisories.extend(validated.advisories);
                }
                Err(err) => {
                    let action = item
                        .get("action")
                        .and_then(Value::as_str)
                        .map(String::from);
                    let reason = err.reason();
                    warn!(index, action = ?action, reason = %reason, "Command rejected");
                    self.audit.log(
                        AuditEvent::CommandRejected {
                            action: action.clone(),
                        },
                        AUDIT_ACTOR,
                        &format!("commands[{index}]"),
                        AuditOutcome::Denied,
                        Some(reason.clone()),
                    );
                    batch.rejected.push(RejectedCommand {
                        index,
                        action,
                        reason,
                    });
                }
            }
        }

        batch
    }

    pub fn stats(&self) -> ValidatorStats {
        let allowed_actions: Vec<_> = CommandAction::ALL.iter().map(|a| a.as_str()).collect();
        let dangerous_actions: Vec<_> = CommandAction::ALL
            .iter()
            .filter(|a| a.is_destructive())
            .map(|a| a.as_str())
            .collect();

        ValidatorStats {
            allowed_action_count: allowed_actions.len(),
            allowed_actions,
            dangerous_action_count: dangerous_actions.len(),
            dangerous_actions,
            critical_files: CRITICAL_FILES.to_vec(),
            max_batch_items: self.policy.max_batch_items,
            max_query_chars: self.policy.max_query_chars,
            max_search_results: MAX_SEARCH_RESULTS,
            search_providers: SearchProvider::ALL.iter().map(|p| p.as_str()).collect(),
            sandbox_root: self.policy.paths.sandbox_root().to_string(),
            outside_sandbox: self.policy.outside_sandbox,
        }
    }

    // --- Field checks ---

    fn check_field(
        &self,
        action: CommandAction,
        field: &str,
        kind: FieldKind,
        value: &Value,
    ) -> Result<(), ValidationError> {
        let invalid = |expected: &str| ValidationError::InvalidType {
            action: action.to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
        };
        let empty = || ValidationError::EmptyField {
            action: action.to_string(),
            field: field.to_string(),
        };

        match kind {
            FieldKind::Content => {
                value.as_str().ok_or_else(|| invalid("a string"))?;
            }
            FieldKind::Text => {
                let text = value.as_str().ok_or_else(|| invalid("a string"))?;
                if text.trim().is_empty() {
                    return Err(empty());
                }
            }
            FieldKind::TextList => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid("an array of strings"))?;
                if items.is_empty() {
                    return Err(ValidationError::EmptyBatch {
                        field: field.to_string(),
                    });
                }
                if items.len() > self.policy.max_batch_items {
                    return Err(ValidationError::BatchTooLarge {
                        field: field.to_string(),
                        count: items.len(),
                        limit: self.policy.max_batch_items,
                    });
                }
                for item in items {
                    let text = item.as_str().ok_or_else(|| invalid("an array of strings"))?;
                    if text.trim().is_empty() {
                        return Err(empty());
                    }
                }
            }
        }
        Ok(())
    }

    fn check_search(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidSearch { reason };

        let query = obj.get("query").and_then(Value::as_str).unwrap_or_default();
        let query_chars = query.chars().count();
        if query_chars > self.policy.max_query_chars {
            return Err(invalid(format!(
                "query is {query_chars} characters, limit is {}",
                self.policy.max_query_chars
            )));
        }

        let Some(options) = obj.get("options").filter(|v| !v.is_null()) else {
            return Ok(());
        };
        let options = options
            .as_object()
            .ok_or_else(|| invalid("options must be an object".into()))?;

        if let Some(max) = options.get("maxResults") {
            match max.as_u64() {
                Some(n) if (MIN_SEARCH_RESULTS..=MAX_SEARCH_RESULTS).contains(&n) => {}
                _ => {
                    return Err(invalid(format!(
                        "maxResults must be an integer between {MIN_SEARCH_RESULTS} and {MAX_SEARCH_RESULTS}"
                    )));
                }
            }
        }

        if let Some(provider) = options.get("provider") {
            let known = provider
                .as_str()
                .is_some_and(|p| SearchProvider::ALL.iter().any(|sp| sp.as_str() == p));
            if !known {
                return Err(invalid(format!("unsupported search provider {provider}")));
            }
        }

        for field in ["language", "region"] {
            if let Some(code) = options.get(field) {
                let valid = code.as_str().is_some_and(|c| c.chars().count() == 2);
                if !valid {
                    return Err(invalid(format!("{field} must be a two-character code")));
                }
            }
        }

        for field in ["filterDomains", "excludeDomains"] {
            if let Some(domains) = options.get(field) {
                let valid = domains
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_string));
                if !valid {
                    return Err(invalid(format!("{field} must be an array of strings")));
                }
            }
        }

        Ok(())
    }

    fn check_deletion(&self, path: &str) -> Result<(), ValidationError> {
        let trimmed = path.trim();
        let unsafe_target = matches!(trimmed, "/" | "." | "./" | "*")
            || trimmed.contains(['*', '?'])
            || self.policy.paths.is_sandbox_root(trimmed);

        if unsafe_target {
            return Err(ValidationError::UnsafeDeletion { path: path.into() });
        }
        Ok(())
    }
}

/// Whether any component of `path` names a critical project file.
fn is_critical(path: &str) -> bool {
    path.replace('\\', "/").split('/').any(|component| {
        CRITICAL_FILES
            .iter()
            .any(|critical| component.eq_ignore_ascii_case(critical))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEntry, AuditSink};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct MemorySink(Arc<Mutex<Vec<AuditEntry>>>);

    impl AuditSink for MemorySink {
        fn record(&self, entry: &AuditEntry) {
            self.0.lock().unwrap().push(entry.clone());
        }
    }

    fn validator() -> CommandValidator {
        CommandValidator::default().with_audit(AuditLogger::disabled())
    }

    fn audited() -> (CommandValidator, Arc<Mutex<Vec<AuditEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let validator = CommandValidator::default()
            .with_audit(AuditLogger::with_sinks(vec![Box::new(MemorySink(entries.clone()))]));
        (validator, entries)
    }

    #[test]
    fn accepts_create_file() {
        let validated = validator()
            .validate(&json!({"action": "create_file", "path": "a.txt"}))
            .unwrap();
        assert_eq!(
            validated.command,
            Command::CreateFile {
                path: "a.txt".into(),
                content: None
            }
        );
        assert!(validated.advisories.is_empty());
    }

    #[test]
    fn rejects_non_objects_and_unknown_actions() {
        assert_eq!(
            validator().validate(&json!("create_file")),
            Err(ValidationError::NotAnObject)
        );
        assert_eq!(
            validator().validate(&json!({"path": "a.txt"})),
            Err(ValidationError::MissingAction)
        );
        assert!(matches!(
            validator().validate(&json!({"action": "format_disk"})),
            Err(ValidationError::UnknownAction { action }) if action == "format_disk"
        ));
    }

    #[test]
    fn required_fields_checked() {
        assert!(matches!(
            validator().validate(&json!({"action": "copy_file", "source": "a.txt"})),
            Err(ValidationError::MissingField { field, .. }) if field == "destination"
        ));
        assert!(matches!(
            validator().validate(&json!({"action": "read_file", "path": "   "})),
            Err(ValidationError::EmptyField { .. })
        ));
        assert!(matches!(
            validator().validate(&json!({"action": "read_file", "path": 42})),
            Err(ValidationError::InvalidType { .. })
        ));
    }

    #[test]
    fn empty_content_is_allowed() {
        let validated = validator()
            .validate(&json!({"action": "edit_file", "path": "a.txt", "content": ""}))
            .unwrap();
        assert_eq!(validated.command.action(), CommandAction::EditFile);

        assert!(validator()
            .validate(&json!({"action": "list_files"}))
            .is_ok());
    }

    #[test]
    fn delete_with_traversal_rejected() {
        assert!(matches!(
            validator().validate(&json!({"action": "delete_file", "path": "../etc/passwd"})),
            Err(ValidationError::PathTraversal { .. })
        ));
    }

    #[test]
    fn destination_paths_checked_too() {
        assert!(matches!(
            validator().validate(&json!({
                "action": "copy_file", "source": "a.txt", "destination": "/etc/cron.d/job"
            })),
            Err(ValidationError::ForbiddenPath { .. })
        ));
    }

    #[test]
    fn unsafe_deletions_rejected() {
        let paths = [
            "/", ".", "./", "*", "logs/*.txt", "file?.md", "/workspace", "/workspace/",
            "/workspace/.", "/workspace/./",
        ];
        for path in paths {
            assert!(
                matches!(
                    validator().validate(&json!({"action": "delete_file", "path": path})),
                    Err(ValidationError::UnsafeDeletion { .. })
                ),
                "{path} should be refused"
            );
        }
        assert!(matches!(
            validator().validate(&json!({"action": "batch_delete", "paths": ["a.txt", "*"]})),
            Err(ValidationError::UnsafeDeletion { .. })
        ));
    }

    #[test]
    fn wildcards_allowed_outside_deletion() {
        assert!(validator()
            .validate(&json!({"action": "create_file", "path": "what?.md"}))
            .is_ok());
    }

    #[test]
    fn batch_limits() {
        let paths: Vec<String> = (0..101).map(|i| format!("f{i}.txt")).collect();
        assert!(matches!(
            validator().validate(&json!({"action": "batch_delete", "paths": paths})),
            Err(ValidationError::BatchTooLarge { count: 101, limit: 100, .. })
        ));
        assert!(matches!(
            validator().validate(&json!({"action": "batch_copy", "sources": [], "destination": "b"})),
            Err(ValidationError::EmptyBatch { .. })
        ));
        assert!(matches!(
            validator().validate(&json!({"action": "batch_move", "sources": ["a", 1], "destination": "b"})),
            Err(ValidationError::InvalidType { .. })
        ));

        let paths: Vec<String> = (0..100).map(|i| format!("f{i}.txt")).collect();
        assert!(validator()
            .validate(&json!({"action": "batch_delete", "paths": paths}))
            .is_ok());
    }

    #[test]
    fn search_query_length() {
        let long = "q".repeat(501);
        assert!(matches!(
            validator().validate(&json!({"action": "web_search", "query": long})),
            Err(ValidationError::InvalidSearch { .. })
        ));
        let at_limit = "検".repeat(500);
        assert!(validator()
            .validate(&json!({"action": "web_search", "query": at_limit}))
            .is_ok());
    }

    #[test]
    fn search_options_checked() {
        let v = validator();
        let search = |options: Value| json!({"action": "web_search", "query": "rust", "options": options});

        assert!(v.validate(&search(json!({"maxResults": 5, "provider": "tavily", "language": "ja", "region": "JP", "filterDomains": ["docs.rs"]}))).is_ok());
        assert!(v.validate(&search(json!("fast"))).is_err());
        assert!(v.validate(&search(json!({"maxResults": 0}))).is_err());
        assert!(v.validate(&search(json!({"maxResults": 21}))).is_err());
        assert!(v.validate(&search(json!({"maxResults": 2.5}))).is_err());
        assert!(v.validate(&search(json!({"provider": "bing"}))).is_err());
        assert!(v.validate(&search(json!({"language": "jpn"}))).is_err());
        assert!(v.validate(&search(json!({"excludeDomains": "spam.com"}))).is_err());

        let validated = v.validate(&search(json!({"maxResults": 3}))).unwrap();
        match validated.command {
            Command::WebSearch { options, .. } => {
                assert_eq!(options.unwrap().max_results, Some(3));
            }
            other => panic!("Expected WebSearch, got: {other:?}"),
        }
    }

    #[test]
    fn critical_target_is_advisory_and_audited() {
        let (v, entries) = audited();
        let validated = v
            .validate(&json!({"action": "delete_file", "path": "package.json"}))
            .unwrap();
        assert_eq!(validated.advisories.len(), 1);

        let entries = entries.lock().unwrap();
        assert!(entries
            .iter()
            .any(|e| matches!(e.event, AuditEvent::CriticalTarget { .. })));
        assert!(entries
            .iter()
            .any(|e| matches!(&e.event, AuditEvent::DestructiveCommand { action } if action == "delete_file")));
    }

    #[test]
    fn outside_sandbox_warn_policy_adds_advisory() {
        let policy = ValidationPolicy::from(&SecurityConfig {
            outside_sandbox: OutsideSandboxPolicy::Warn,
            ..SecurityConfig::default()
        });
        let v = CommandValidator::new(policy).with_audit(AuditLogger::disabled());
        let validated = v
            .validate(&json!({"action": "read_file", "path": "/home/me/notes.md"}))
            .unwrap();
        assert_eq!(validated.advisories.len(), 1);
        assert!(validated.advisories[0].contains("outside the sandbox"));
    }

    #[test]
    fn validate_all_partial_acceptance() {
        let (v, entries) = audited();
        let batch = v.validate_all(&[
            json!({"action": "create_file", "path": "a.txt"}),
            json!({"action": "delete_file", "path": "*"}),
            json!("garbage"),
            json!({"action": "list_files", "path": "docs"}),
        ]);

        assert_eq!(batch.accepted.len(), 2);
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected[0].index, 1);
        assert_eq!(batch.rejected[0].action.as_deref(), Some("delete_file"));
        assert_eq!(batch.rejected[1].index, 2);
        assert_eq!(batch.rejected[1].action, None);

        let denied = entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.outcome == AuditOutcome::Denied)
            .count();
        assert_eq!(denied, 2);
    }

    #[test]
    fn validation_does_not_mutate_input() {
        let proposed = json!({"action": "create_file", "path": " spaced.txt ", "extra": true});
        let before = proposed.clone();
        let _ = validator().validate(&proposed);
        assert_eq!(proposed, before);
    }

    #[test]
    fn stats_describe_rules() {
        let stats = validator().stats();
        assert_eq!(stats.allowed_action_count, 12);
        assert_eq!(stats.dangerous_action_count, 4);
        assert_eq!(stats.max_batch_items, 100);
        assert_eq!(stats.max_query_chars, 500);
        assert_eq!(stats.search_providers, vec!["auto", "tavily", "google", "duckduckgo"]);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["outsideSandbox"], "reject");
    }
}
