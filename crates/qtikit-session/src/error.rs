//! Error types for route building, path enumeration, and session control.

use crate::session::SessionState;
use qtikit_eval::{EvalError, RuleError, VariableError};
use std::time::Duration;
use thiserror::Error;

/// A branch rule pointing somewhere it must not.
#[derive(Debug, Clone, Error)]
pub enum BranchTargetError {
    /// The target identifier names no component of the test.
    #[error("branch target '{0}' does not exist")]
    UnknownTarget(String),

    /// The target sits at or before the branch's origin.
    #[error("branch from '{from}' to '{target}' goes backward")]
    BackwardBranch { from: String, target: String },

    /// The target is the branch's own owner.
    #[error("branch on '{0}' targets itself")]
    RecursiveBranch(String),
}

/// A typed failure raised by the session state machine.
///
/// Any of these leaves the session exactly as it was before the failed
/// call; the prior state remains authoritative.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested action is not legal in the current state.
    #[error("cannot {action} while the session is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// `begin_attempt` past the resolved attempt limit.
    #[error("no attempts remain on item '{item}' (maximum {max_attempts})")]
    AttemptsExhausted { item: String, max_attempts: u32 },

    /// `move_next` before the minimum time of a scope being left.
    #[error("minimum time not reached on '{scope}': {remaining:?} remain")]
    MinimumTimeNotReached { scope: String, remaining: Duration },

    /// `move_back` inside a linear test part.
    #[error("cannot move back in linear test part '{0}'")]
    BackwardNavigation(String),

    /// A snapshot built for a different test or route shape.
    #[error("snapshot does not match test '{0}'")]
    SnapshotMismatch(String),

    #[error(transparent)]
    Branch(#[from] BranchTargetError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Variable(#[from] VariableError),
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no stored session with id '{0}'")]
    NotFound(String),

    #[error("a session with id '{0}' already exists")]
    AlreadyExists(String),

    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}
