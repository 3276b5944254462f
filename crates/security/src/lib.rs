//! Security layer for Dirflow — path policy, audit logging, and command validation.
//!
//! Provides:
//! - **Path policy**: lexical sandboxing of command paths to the workspace root
//! - **Audit logging**: structured events for destructive and rejected commands
//! - **Command validation**: schema and security checks over backend-proposed commands

pub mod audit;
pub mod path;
pub mod validator;

pub use audit::{AuditEntry, AuditEvent, AuditLogger, AuditOutcome, AuditSink, TracingSink};
pub use path::{PathCheck, PathPolicy};
pub use validator::{
    BatchValidation, CommandValidator, RejectedCommand, ValidatedCommand, ValidationPolicy,
    ValidatorStats,
};
