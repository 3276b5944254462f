//! Persona router — picks a specialist base prompt for the user's message.
//!
//! Routing is keyword scoring over the message, so an exchange still makes
//! exactly one backend call.

use dirflow_core::command::CommandAction;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaKey {
    FileExpert,
    WebSearchExpert,
    GeneralAssistant,
}

impl PersonaKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileExpert => "file_expert",
            Self::WebSearchExpert => "web_search_expert",
            Self::GeneralAssistant => "general_assistant",
        }
    }
}

/// A specialist system prompt and the actions it is expected to emit.
#[derive(Debug)]
pub struct Persona {
    pub key: PersonaKey,
    pub name: &'static str,
    pub description: &'static str,
    pub actions: &'static [CommandAction],
    pub template: &'static str,
}

/// Which persona handled an exchange, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentUsed {
    pub key: PersonaKey,
    pub name: String,
}

impl From<&Persona> for AgentUsed {
    fn from(persona: &Persona) -> Self {
        Self {
            key: persona.key,
            name: persona.name.into(),
        }
    }
}

const FILE_KEYWORDS: &[&str] = &[
    "file", "folder", "directory", "create", "delete", "remove", "copy", "move", "rename",
    "list", "read", "edit", "write", "save", "ファイル", "フォルダ", "ディレクトリ", "作成",
    "作って", "削除", "消して", "コピー", "移動", "一覧", "読んで", "編集", "名前", "保存",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "search", "look up", "google", "find out", "research", "latest", "news", "web", "検索",
    "調べて", "リサーチ", "最新", "ニュース", "探して",
];

pub static PERSONAS: [Persona; 3] = [
    Persona {
        key: PersonaKey::FileExpert,
        name: "File Operations Expert",
        description: "Creates, reads, edits, deletes, copies, moves and lists files and directories, including batch operations.",
        actions: &[
            CommandAction::CreateFile,
            CommandAction::CreateDirectory,
            CommandAction::DeleteFile,
            CommandAction::CopyFile,
            CommandAction::MoveFile,
            CommandAction::ReadFile,
            CommandAction::EditFile,
            CommandAction::ListFiles,
            CommandAction::BatchDelete,
            CommandAction::BatchCopy,
            CommandAction::BatchMove,
        ],
        template: "\
You are a file operations expert. Turn the user's instructions into file system commands.

Workspace state:
- Current directory: {{CURRENT_PATH}}
- Number of files: {{FILE_COUNT}}
- Currently editing: {{CURRENT_FILE}}

Files in the current directory:
{{FILE_LIST}}

Generate one or more commands that carry out the request exactly. When creating files,
include concrete content. Use paths relative to the current directory.",
    },
    Persona {
        key: PersonaKey::WebSearchExpert,
        name: "Web Search Expert",
        description: "Finds information on the internet to answer the user's questions.",
        actions: &[CommandAction::WebSearch],
        template: "\
You are a web search expert. Turn the user's question into a single web_search command
with the best query and options (maxResults defaults to 10; set language and region
when the question implies them).

Current directory: {{CURRENT_PATH}} ({{FILE_COUNT}} files). Previous exchanges: {{HISTORY_COUNT}}.",
    },
    Persona {
        key: PersonaKey::GeneralAssistant,
        name: "General Assistant",
        description: "Answers general questions that need neither file operations nor web search.",
        actions: &[],
        template: "\
You are a friendly and capable general assistant for a file management workspace.
Answer questions and chat helpfully. If the user seems to want a file operation or a web
search, ask for the concrete details you need (file names, contents, search keywords).

Current directory: {{CURRENT_PATH}} ({{FILE_COUNT}} files).",
    },
];

#[derive(Debug, Clone)]
pub struct PersonaRouter {
    enabled: bool,
}

impl Default for PersonaRouter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PersonaRouter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn personas() -> &'static [Persona] {
        &PERSONAS
    }

    pub fn persona(key: PersonaKey) -> &'static Persona {
        match key {
            PersonaKey::FileExpert => &PERSONAS[0],
            PersonaKey::WebSearchExpert => &PERSONAS[1],
            PersonaKey::GeneralAssistant => &PERSONAS[2],
        }
    }

    /// Select a persona, or `None` when routing is disabled.
    pub fn route(&self, message: &str) -> Option<&'static Persona> {
        if !self.enabled {
            return None;
        }

        let lowered = message.to_lowercase();
        let file_score = score(&lowered, FILE_KEYWORDS);
        let search_score = score(&lowered, SEARCH_KEYWORDS);

        let key = if file_score == 0 && search_score == 0 {
            PersonaKey::GeneralAssistant
        } else if search_score > file_score {
            PersonaKey::WebSearchExpert
        } else {
            PersonaKey::FileExpert
        };

        debug!(persona = key.as_str(), file_score, search_score, "Persona selected");
        Some(Self::persona(key))
    }
}

fn score(message: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| message.contains(*kw)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(message: &str) -> PersonaKey {
        PersonaRouter::default().route(message).unwrap().key
    }

    #[test]
    fn file_requests_go_to_file_expert() {
        assert_eq!(route("Create a file called notes.txt"), PersonaKey::FileExpert);
        assert_eq!(route("README.mdをコピーしてbackup/README.mdに"), PersonaKey::FileExpert);
    }

    #[test]
    fn search_requests_go_to_search_expert() {
        assert_eq!(route("Search for the latest Rust news"), PersonaKey::WebSearchExpert);
        assert_eq!(route("最新のAI技術について調べて"), PersonaKey::WebSearchExpert);
    }

    #[test]
    fn ties_go_to_file_expert() {
        // one file keyword, one search keyword
        assert_eq!(route("search my folder"), PersonaKey::FileExpert);
    }

    #[test]
    fn no_matches_go_to_general_assistant() {
        assert_eq!(route("How are you today?"), PersonaKey::GeneralAssistant);
    }

    #[test]
    fn disabled_router_selects_nothing() {
        assert!(PersonaRouter::new(false).route("create a file").is_none());
    }

    #[test]
    fn persona_lookup_is_consistent() {
        for persona in PersonaRouter::personas() {
            assert_eq!(PersonaRouter::persona(persona.key).key, persona.key);
        }
        assert!(PersonaRouter::persona(PersonaKey::FileExpert)
            .actions
            .iter()
            .all(|a| a.is_file_operation()));
    }

    #[test]
    fn agent_used_serializes_key() {
        let used = AgentUsed::from(PersonaRouter::persona(PersonaKey::WebSearchExpert));
        let json = serde_json::to_value(&used).unwrap();
        assert_eq!(json["key"], "web_search_expert");
        assert_eq!(json["name"], "Web Search Expert");
    }
}
