//! Command domain types.
//!
//! A backend *proposes* commands as loose JSON objects. Only after the
//! validator has accepted one does it become a [`Command`], the tagged union
//! handed to executors. The `action` field is the discriminator on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A command as emitted by a backend, before validation.
pub type ProposedCommand = serde_json::Value;

/// A validated, executor-ready command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    CreateFile {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    CreateDirectory {
        path: String,
    },
    DeleteFile {
        path: String,
    },
    CopyFile {
        source: String,
        destination: String,
    },
    MoveFile {
        source: String,
        destination: String,
    },
    ReadFile {
        path: String,
    },
    EditFile {
        path: String,
        content: String,
    },
    ListFiles {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    BatchDelete {
        paths: Vec<String>,
    },
    BatchCopy {
        sources: Vec<String>,
        destination: String,
    },
    BatchMove {
        sources: Vec<String>,
        destination: String,
    },
    WebSearch {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<SearchOptions>,
    },
}

impl Command {
    pub fn action(&self) -> CommandAction {
        match self {
            Self::CreateFile { .. } => CommandAction::CreateFile,
            Self::CreateDirectory { .. } => CommandAction::CreateDirectory,
            Self::DeleteFile { .. } => CommandAction::DeleteFile,
            Self::CopyFile { .. } => CommandAction::CopyFile,
            Self::MoveFile { .. } => CommandAction::MoveFile,
            Self::ReadFile { .. } => CommandAction::ReadFile,
            Self::EditFile { .. } => CommandAction::EditFile,
            Self::ListFiles { .. } => CommandAction::ListFiles,
            Self::BatchDelete { .. } => CommandAction::BatchDelete,
            Self::BatchCopy { .. } => CommandAction::BatchCopy,
            Self::BatchMove { .. } => CommandAction::BatchMove,
            Self::WebSearch { .. } => CommandAction::WebSearch,
        }
    }

    /// Every path this command touches, in field order.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::CreateFile { path, .. }
            | Self::CreateDirectory { path }
            | Self::DeleteFile { path }
            | Self::ReadFile { path }
            | Self::EditFile { path, .. } => vec![path.as_str()],
            Self::CopyFile {
                source,
                destination,
            }
            | Self::MoveFile {
                source,
                destination,
            } => vec![source.as_str(), destination.as_str()],
            Self::ListFiles { path } => path.as_deref().into_iter().collect(),
            Self::BatchDelete { paths } => paths.iter().map(String::as_str).collect(),
            Self::BatchCopy {
                sources,
                destination,
            }
            | Self::BatchMove {
                sources,
                destination,
            } => sources
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(destination.as_str()))
                .collect(),
            Self::WebSearch { .. } => Vec::new(),
        }
    }
}

/// The closed set of actions a backend may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    CreateFile,
    CreateDirectory,
    DeleteFile,
    CopyFile,
    MoveFile,
    ReadFile,
    EditFile,
    ListFiles,
    BatchDelete,
    BatchCopy,
    BatchMove,
    WebSearch,
}

/// Shape of a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty string.
    Text,
    /// String that may be empty.
    Content,
    /// Array of strings.
    TextList,
}

impl CommandAction {
    pub const ALL: [CommandAction; 12] = [
        Self::CreateFile,
        Self::CreateDirectory,
        Self::DeleteFile,
        Self::CopyFile,
        Self::MoveFile,
        Self::ReadFile,
        Self::EditFile,
        Self::ListFiles,
        Self::BatchDelete,
        Self::BatchCopy,
        Self::BatchMove,
        Self::WebSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateFile => "create_file",
            Self::CreateDirectory => "create_directory",
            Self::DeleteFile => "delete_file",
            Self::CopyFile => "copy_file",
            Self::MoveFile => "move_file",
            Self::ReadFile => "read_file",
            Self::EditFile => "edit_file",
            Self::ListFiles => "list_files",
            Self::BatchDelete => "batch_delete",
            Self::BatchCopy => "batch_copy",
            Self::BatchMove => "batch_move",
            Self::WebSearch => "web_search",
        }
    }

    /// Required fields and their expected shape.
    pub fn required_fields(&self) -> &'static [(&'static str, FieldKind)] {
        use FieldKind::*;
        match self {
            Self::CreateFile
            | Self::CreateDirectory
            | Self::DeleteFile
            | Self::ReadFile => &[("path", Text)],
            Self::CopyFile | Self::MoveFile => &[("source", Text), ("destination", Text)],
            Self::EditFile => &[("path", Text), ("content", Content)],
            Self::ListFiles => &[],
            Self::BatchDelete => &[("paths", TextList)],
            Self::BatchCopy | Self::BatchMove => &[("sources", TextList), ("destination", Text)],
            Self::WebSearch => &[("query", Text)],
        }
    }

    /// Optional fields that must still have the right shape when present.
    pub fn optional_fields(&self) -> &'static [(&'static str, FieldKind)] {
        match self {
            Self::CreateFile => &[("content", FieldKind::Content)],
            Self::ListFiles => &[("path", FieldKind::Content)],
            _ => &[],
        }
    }

    /// Actions that remove or relocate data.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DeleteFile | Self::BatchDelete | Self::MoveFile | Self::BatchMove
        )
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::DeleteFile | Self::BatchDelete)
    }

    /// Actions whose fields name filesystem paths.
    pub fn is_file_operation(&self) -> bool {
        !matches!(self, Self::WebSearch)
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or(())
    }
}

/// Search engines a `web_search` command may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    #[default]
    Auto,
    Tavily,
    Google,
    Duckduckgo,
}

impl SearchProvider {
    pub const ALL: [SearchProvider; 4] = [Self::Auto, Self::Tavily, Self::Google, Self::Duckduckgo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tavily => "tavily",
            Self::Google => "google",
            Self::Duckduckgo => "duckduckgo",
        }
    }
}

/// Options attached to a `web_search` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<SearchProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_domains: Vec<String>,
}
