//! # Dirflow Core
//!
//! Domain types, traits, and error definitions for the Dirflow command
//! orchestration pipeline. This crate has **no framework dependencies**:
//! it defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The two external seams are traits defined here:
//! - [`ProviderBinding`] for language-model backends
//! - [`SearchBackend`] for web search
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stand-ins without touching the network.

pub mod command;
pub mod context;
pub mod error;
pub mod history;
pub mod intent;
pub mod message;
pub mod provider;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use command::{Command, CommandAction, ProposedCommand, SearchOptions, SearchProvider};
pub use context::{ChatRequest, CustomPromptSpec, RawContext, RequestContext};
pub use error::{Error, GatewayError, Result, SearchError, ValidationError};
pub use history::{ConversationHistory, ConversationTurn, HistoryLimits};
pub use intent::StructuredIntent;
pub use message::{ChatMessage, Role};
pub use provider::{ProviderBinding, ProviderKind, ProviderRequest, RequestShape};
pub use search::{SearchBackend, SearchHit};
