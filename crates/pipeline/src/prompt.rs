//! Prompt construction for each provider's request shape.
//!
//! The system prompt is either an active custom prompt (verbatim) or a base
//! template with placeholders substituted and the JSON response contract
//! appended. History is rendered as role turns or as a transcript block,
//! depending on [`RequestShape`].

use dirflow_core::context::RequestContext;
use dirflow_core::history::ConversationTurn;
use dirflow_core::message::ChatMessage;
use dirflow_core::provider::{ProviderKind, ProviderRequest, RequestShape};

/// Default base template when no persona is selected.
pub const BASE_PROMPT: &str = "\
You are a file management assistant working inside a virtual workspace.
Help the user organize, create, read, edit and search for files.

Workspace state:
- Current directory: {{CURRENT_PATH}}
- Number of files: {{FILE_COUNT}}
- Currently editing: {{CURRENT_FILE}}
- Previous exchanges: {{HISTORY_COUNT}}

Files in the current directory:
{{FILE_LIST}}

Use relative paths whenever possible. Never touch system directories.";

/// Appended to every non-custom system prompt.
pub const RESPONSE_CONTRACT: &str = r#"Always reply with a single JSON object and nothing else:
{"message": "<reply to the user>", "commands": [ ... ]}

Each command is an object with an "action" field. Available actions:
- create_file {"path", "content"?}
- create_directory {"path"}
- delete_file {"path"}
- copy_file {"source", "destination"}
- move_file {"source", "destination"}
- read_file {"path"}
- edit_file {"path", "content"}
- list_files {"path"?}
- batch_delete {"paths": [...]} (at most 100 paths)
- batch_copy {"sources": [...], "destination"}
- batch_move {"sources": [...], "destination"}
- web_search {"query", "options"?: {"maxResults" 1-20, "provider" auto|tavily|google|duckduckgo, "language", "region", "filterDomains", "excludeDomains"}}

Use an empty "commands" array when no action is needed."#;

const NO_CURRENT_FILE: &str = "none";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_history_items: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(dirflow_core::history::DEFAULT_MAX_ITEMS)
    }
}

impl PromptBuilder {
    pub fn new(max_history_items: usize) -> Self {
        Self { max_history_items }
    }

    /// The system prompt for this exchange.
    pub fn system_prompt(&self, context: &RequestContext, base_template: &str) -> String {
        if let Some(custom) = context.active_custom_prompt() {
            return custom.content.clone();
        }
        format!("{}\n\n{RESPONSE_CONTRACT}", substitute(base_template, context))
    }

    /// Build the provider-shaped request.
    pub fn build(
        &self,
        provider: ProviderKind,
        context: &RequestContext,
        base_template: &str,
        user_message: &str,
    ) -> ProviderRequest {
        let system = self.system_prompt(context, base_template);
        let final_user = final_user_message(context, user_message);
        let history = context.conversation_history.recent(self.max_history_items);

        match provider.request_shape() {
            RequestShape::SystemAndMessages => {
                let mut messages = history_messages(history);
                messages.push(ChatMessage::user(final_user));
                ProviderRequest::SystemAndMessages { system, messages }
            }
            RequestShape::Messages => {
                let mut messages = vec![ChatMessage::system(system)];
                messages.extend(history_messages(history));
                messages.push(ChatMessage::user(final_user));
                ProviderRequest::Messages { messages }
            }
            RequestShape::Content => {
                let content = format!(
                    "[System prompt]\n{system}\n\n[Conversation so far]\n{}[Current question]\n[User]\n{final_user}",
                    transcript(history)
                );
                ProviderRequest::Content { content }
            }
        }
    }
}

/// Replace template placeholders with values from the context.
pub fn substitute(template: &str, context: &RequestContext) -> String {
    let file_list =
        serde_json::to_string_pretty(&context.file_list).unwrap_or_else(|_| "[]".into());

    template
        .replace("{{CURRENT_PATH}}", &context.current_path)
        .replace("{{FILE_COUNT}}", &context.file_list.len().to_string())
        .replace("{{FILE_LIST}}", &file_list)
        .replace(
            "{{HISTORY_COUNT}}",
            &context.conversation_history.len().to_string(),
        )
        .replace(
            "{{CURRENT_FILE}}",
            context.current_file.as_deref().unwrap_or(NO_CURRENT_FILE),
        )
}

fn final_user_message(context: &RequestContext, user_message: &str) -> String {
    let mut block = format!(
        "[Context]\nCurrent directory: {}\nFile count: {}\nCurrently editing: {}",
        context.current_path,
        context.file_list.len(),
        context.current_file.as_deref().unwrap_or(NO_CURRENT_FILE),
    );

    if let Some(custom) = context.active_custom_prompt() {
        block.push_str(&format!("\nCustom prompt: {} (active)", custom.name));
    }
    if let Some(info) = &context.open_file_info {
        block.push_str(&format!("\n\n[Open file]\n{info}"));
    }

    format!("{user_message}\n\n{block}")
}

fn history_messages(history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2);
    for turn in history {
        messages.push(ChatMessage::user(turn.user.clone()));
        if let Some(reply) = turn.assistant.as_deref().filter(|r| !r.is_empty()) {
            messages.push(ChatMessage::assistant(reply));
        }
    }
    messages
}

fn transcript(history: &[ConversationTurn]) -> String {
    let mut text = String::new();
    for turn in history {
        text.push_str(&format!("[User]\n{}\n\n", turn.user));
        if let Some(reply) = turn.assistant.as_deref().filter(|r| !r.is_empty()) {
            text.push_str(&format!("[Assistant]\n{}\n\n", reply_text(reply)));
        }
    }
    text
}

/// A stored reply that is itself a JSON intent is shown by its message.
fn reply_text(reply: &str) -> String {
    serde_json::from_str::<serde_json::Value>(reply)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| reply.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextPreparer;
    use dirflow_core::context::RawContext;
    use dirflow_core::message::Role;
    use serde_json::json;

    fn context(value: serde_json::Value) -> RequestContext {
        ContextPreparer::default().prepare(serde_json::from_value::<RawContext>(value).unwrap())
    }

    #[test]
    fn placeholders_substituted() {
        let ctx = context(json!({
            "currentPath": "/workspace/docs",
            "fileList": ["a.md", "b.md"],
            "currentFile": "a.md"
        }));
        let prompt = PromptBuilder::default().system_prompt(&ctx, BASE_PROMPT);
        assert!(prompt.contains("Current directory: /workspace/docs"));
        assert!(prompt.contains("Number of files: 2"));
        assert!(prompt.contains("Currently editing: a.md"));
        assert!(prompt.contains("\"b.md\""));
        assert!(prompt.contains("Previous exchanges: 0"));
        assert!(prompt.contains(RESPONSE_CONTRACT));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn custom_prompt_replaces_system_prompt() {
        let ctx = context(json!({
            "customPrompt": {"enabled": true, "name": "Pirate", "content": "Talk like a pirate."}
        }));
        let request = PromptBuilder::default().build(ProviderKind::Claude, &ctx, BASE_PROMPT, "hi");
        match request {
            ProviderRequest::SystemAndMessages { system, messages } => {
                assert_eq!(system, "Talk like a pirate.");
                assert!(messages[0].content.contains("Custom prompt: Pirate (active)"));
            }
            other => panic!("Expected SystemAndMessages, got: {other:?}"),
        }
    }

    #[test]
    fn disabled_custom_prompt_is_ignored() {
        let ctx = context(json!({
            "customPrompt": {"enabled": false, "name": "Pirate", "content": "Talk like a pirate."}
        }));
        let prompt = PromptBuilder::default().system_prompt(&ctx, BASE_PROMPT);
        assert!(prompt.starts_with("You are a file management assistant"));
    }

    #[test]
    fn role_shapes_alternate_history() {
        let ctx = context(json!({
            "conversationHistory": [
                {"user": "make a file", "ai": "{\"message\":\"done\",\"commands\":[]}"},
                {"user": "thanks"}
            ]
        }));
        let request = PromptBuilder::default().build(ProviderKind::OpenAi, &ctx, BASE_PROMPT, "list files");
        let ProviderRequest::Messages { messages } = request else {
            panic!("Expected Messages");
        };
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::User]
        );
        assert!(messages[4].content.starts_with("list files\n\n[Context]"));
    }

    #[test]
    fn content_shape_renders_transcript() {
        let ctx = context(json!({
            "conversationHistory": [
                {"user": "make a file", "ai": "{\"message\":\"Created it.\",\"commands\":[]}"}
            ],
            "openFileInfo": "a.md: 12 lines"
        }));
        let request = PromptBuilder::default().build(ProviderKind::Gemini, &ctx, BASE_PROMPT, "what now?");
        let ProviderRequest::Content { content } = request else {
            panic!("Expected Content");
        };
        assert!(content.starts_with("[System prompt]\n"));
        assert!(content.contains("[Assistant]\nCreated it.\n"));
        assert!(!content.contains("{\"message\":\"Created it.\""));
        assert!(content.contains("[Current question]\n[User]\nwhat now?"));
        assert!(content.contains("[Open file]\na.md: 12 lines"));
    }

    #[test]
    fn history_truncated_to_recent_items() {
        let history: Vec<_> = (0..10)
            .map(|i| json!({"user": format!("q{i}"), "ai": format!("answer {i}")}))
            .collect();
        let ctx = context(json!({ "conversationHistory": history }));
        let request = PromptBuilder::new(2).build(ProviderKind::Claude, &ctx, BASE_PROMPT, "now");
        let ProviderRequest::SystemAndMessages { messages, .. } = request else {
            panic!("Expected SystemAndMessages");
        };
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "q8");
    }
}
