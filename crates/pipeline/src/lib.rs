//! The Dirflow exchange pipeline.
//!
//! Turns a caller's message and context into a validated
//! [`OrchestrationResult`]:
//! - [`ContextPreparer`] normalizes and bounds the caller's context
//! - [`PersonaRouter`] picks a specialist base prompt
//! - [`PromptBuilder`] renders the request for the provider's shape
//! - [`parser::parse`] extracts the structured intent from the reply
//! - [`FallbackResponder`] answers when no backend reply is usable
//! - [`Orchestrator`] drives one exchange end to end

pub mod context;
pub mod fallback;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod response;
pub mod router;
pub mod search;

pub use context::{ContextMetadata, ContextPreparer};
pub use fallback::{ErrorType, FallbackReply, FallbackResponder};
pub use orchestrator::Orchestrator;
pub use prompt::PromptBuilder;
pub use response::OrchestrationResult;
pub use router::{AgentUsed, Persona, PersonaKey, PersonaRouter};
pub use search::SearchOutcome;

// Re-exported so callers can cancel without depending on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
