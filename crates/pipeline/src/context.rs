//! Context preparation — turns a caller's raw context into a bounded,
//! fully populated [`RequestContext`].
//!
//! Preparation never fails: malformed pieces are dropped and absent fields
//! take defaults.

use dirflow_config::HistoryConfig;
use dirflow_core::context::{CustomPromptSpec, RawContext, RequestContext};
use dirflow_core::history::{ConversationHistory, ConversationTurn, HistoryLimits};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_CURRENT_PATH: &str = "/workspace";
pub const DEFAULT_MAX_FILE_LIST: usize = 1000;

/// Lexical signals that the user may be starting a new topic.
const CONTEXT_SWITCH_KEYWORDS: [&str; 12] = [
    "new", "different", "change", "switch", "help", "新しい", "別の", "違う", "切り替え", "ヘルプ",
    "使い方", "機能",
];

/// A single "help" is not a topic switch.
const MIN_TURNS_FOR_SWITCH: usize = 3;

/// Size figures for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMetadata {
    pub history_count: usize,
    pub file_count: usize,
    pub has_custom_prompt: bool,
    pub has_open_file: bool,
    pub context_size: usize,
}

#[derive(Debug, Clone)]
pub struct ContextPreparer {
    limits: HistoryLimits,
    max_file_list: usize,
    default_path: String,
}

impl Default for ContextPreparer {
    fn default() -> Self {
        Self::new(HistoryLimits::default(), DEFAULT_MAX_FILE_LIST, DEFAULT_CURRENT_PATH)
    }
}

impl ContextPreparer {
    pub fn new(limits: HistoryLimits, max_file_list: usize, default_path: impl Into<String>) -> Self {
        Self {
            limits,
            max_file_list,
            default_path: default_path.into(),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.limits(), config.max_file_list, config.default_path.clone())
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn max_file_list(&self) -> usize {
        self.max_file_list
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }

    /// Build the normalized context for one exchange.
    pub fn prepare(&self, raw: RawContext) -> RequestContext {
        let current_path = non_blank(raw.current_path).unwrap_or_else(|| self.default_path.clone());

        let file_list: Vec<String> = raw
            .file_list
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| entry.as_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .take(self.max_file_list)
            .map(String::from)
            .collect();

        let custom_prompt = raw.custom_prompt.and_then(|value| {
            if !value.is_object() {
                return None;
            }
            serde_json::from_value::<CustomPromptSpec>(value)
                .map_err(|e| debug!(error = %e, "Ignoring malformed custom prompt"))
                .ok()
        });

        let supplied = raw.conversation_history.unwrap_or_default();
        let supplied_count = supplied.len();
        let turns: Vec<ConversationTurn> = supplied
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        let conversation_history = ConversationHistory::reconcile(turns, self.limits);

        if conversation_history.len() < supplied_count {
            debug!(
                supplied = supplied_count,
                kept = conversation_history.len(),
                "History reconciled"
            );
        }

        RequestContext {
            current_path,
            file_list,
            current_file: non_blank(raw.current_file),
            open_file_info: raw.open_file_info.filter(|info| !info.is_empty()),
            custom_prompt,
            conversation_history,
        }
    }

    /// Advisory: whether the caller should start a fresh conversation.
    pub fn should_suggest_new_chat(&self, context: &RequestContext) -> bool {
        let history = &context.conversation_history;

        if history.len() >= self.limits.max_items || history.total_chars() >= self.limits.max_chars {
            return true;
        }

        if history.len() < MIN_TURNS_FOR_SWITCH {
            return false;
        }

        history.last().is_some_and(|turn| {
            let user = turn.user.to_lowercase();
            CONTEXT_SWITCH_KEYWORDS.iter().any(|kw| user.contains(kw))
        })
    }

    pub fn metadata(context: &RequestContext) -> ContextMetadata {
        let prompt_size = context.custom_prompt.as_ref().map_or(0, |p| {
            p.content.chars().count() + p.name.chars().count() + p.description.chars().count()
        });
        let file_list_size: usize = context.file_list.iter().map(|f| f.chars().count()).sum();

        ContextMetadata {
            history_count: context.conversation_history.len(),
            file_count: context.file_list.len(),
            has_custom_prompt: context.custom_prompt.as_ref().is_some_and(|p| p.enabled),
            has_open_file: context.current_file.is_some(),
            context_size: context.current_path.chars().count()
                + file_list_size
                + context.current_file.as_deref().map_or(0, |f| f.chars().count())
                + context.open_file_info.as_deref().map_or(0, |f| f.chars().count())
                + context.conversation_history.total_chars()
                + prompt_size,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn raw(value: Value) -> RawContext {
        serde_json::from_value(value).unwrap()
    }

    fn turns(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"user": format!("question {i}"), "ai": format!("answer {i}")}))
            .collect()
    }

    #[test]
    fn defaults_fill_empty_context() {
        let ctx = ContextPreparer::default().prepare(RawContext::default());
        assert_eq!(ctx.current_path, "/workspace");
        assert!(ctx.file_list.is_empty());
        assert!(ctx.current_file.is_none());
        assert!(ctx.custom_prompt.is_none());
        assert!(ctx.conversation_history.is_empty());
    }

    #[test]
    fn wrong_typed_lists_prepare_as_empty() {
        let ctx = ContextPreparer::default().prepare(raw(json!({
            "fileList": 42,
            "conversationHistory": "not a list"
        })));
        assert!(ctx.file_list.is_empty());
        assert!(ctx.conversation_history.is_empty());
    }

    #[test]
    fn file_list_normalized() {
        let ctx = ContextPreparer::default().prepare(raw(json!({
            "fileList": [" a.txt ", 7, "", null, "docs/b.md", "   "]
        })));
        assert_eq!(ctx.file_list, vec!["a.txt", "docs/b.md"]);
    }

    #[test]
    fn file_list_capped_in_order() {
        let files: Vec<String> = (0..1500).map(|i| format!("f{i}")).collect();
        let ctx = ContextPreparer::default().prepare(raw(json!({ "fileList": files })));
        assert_eq!(ctx.file_list.len(), 1000);
        assert_eq!(ctx.file_list[0], "f0");
        assert_eq!(ctx.file_list[999], "f999");
    }

    #[test]
    fn malformed_history_entries_dropped() {
        let ctx = ContextPreparer::default().prepare(raw(json!({
            "conversationHistory": [
                {"user": "hi", "ai": "hello there"},
                "not a turn",
                {"assistant": "orphan"},
                {"user": "", "ai": "empty question"},
                {"user": "ok", "ai": "no"}
            ]
        })));
        assert_eq!(ctx.conversation_history.len(), 1);
        assert_eq!(ctx.conversation_history.turns()[0].user, "hi");
    }

    #[test]
    fn custom_prompt_parsed_or_ignored() {
        let ctx = ContextPreparer::default().prepare(raw(json!({
            "customPrompt": {"enabled": true, "content": "Be brief."}
        })));
        let prompt = ctx.active_custom_prompt().unwrap();
        assert_eq!(prompt.name, "Unknown");

        let ctx = ContextPreparer::default().prepare(raw(json!({ "customPrompt": "yes" })));
        assert!(ctx.custom_prompt.is_none());
    }

    #[test]
    fn sixteen_turns_suggest_new_chat() {
        let preparer = ContextPreparer::default();
        let ctx = preparer.prepare(raw(json!({ "conversationHistory": turns(16) })));
        assert_eq!(ctx.conversation_history.len(), 15);
        assert!(preparer.should_suggest_new_chat(&ctx));
    }

    #[test]
    fn long_history_suggests_new_chat() {
        let preparer = ContextPreparer::new(
            HistoryLimits {
                max_items: 15,
                max_chars: 100,
            },
            DEFAULT_MAX_FILE_LIST,
            DEFAULT_CURRENT_PATH,
        );
        let ctx = preparer.prepare(raw(json!({
            "conversationHistory": [{"user": "x".repeat(60), "ai": "y".repeat(40)}]
        })));
        assert_eq!(ctx.conversation_history.total_chars(), 100);
        assert!(preparer.should_suggest_new_chat(&ctx));
    }

    #[test]
    fn keyword_needs_three_turns() {
        let preparer = ContextPreparer::default();

        let short = preparer.prepare(raw(json!({
            "conversationHistory": [{"user": "help", "ai": "Here is how"}]
        })));
        assert!(!preparer.should_suggest_new_chat(&short));

        let mut history = turns(2);
        history.push(json!({"user": "Switch to a DIFFERENT project", "ai": "sure thing"}));
        let long = preparer.prepare(raw(json!({ "conversationHistory": history })));
        assert!(preparer.should_suggest_new_chat(&long));

        let mut history = turns(2);
        history.push(json!({"user": "別のフォルダを見せて", "ai": "わかりました"}));
        let japanese = preparer.prepare(raw(json!({ "conversationHistory": history })));
        assert!(preparer.should_suggest_new_chat(&japanese));

        let plain = preparer.prepare(raw(json!({ "conversationHistory": turns(3) })));
        assert!(!preparer.should_suggest_new_chat(&plain));
    }

    #[test]
    fn metadata_counts() {
        let ctx = ContextPreparer::default().prepare(raw(json!({
            "currentPath": "/w",
            "fileList": ["ab"],
            "currentFile": "ab",
            "customPrompt": {"enabled": true, "name": "n", "content": "c"}
        })));
        let meta = ContextPreparer::metadata(&ctx);
        assert_eq!(meta.file_count, 1);
        assert!(meta.has_custom_prompt);
        assert!(meta.has_open_file);
        assert_eq!(meta.context_size, 2 + 2 + 2 + 1 + 1);
    }
}
