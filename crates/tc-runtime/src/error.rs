//! Engine-wide error type.
//!
//! `EngineError` is the sum of every failure kind a caller of `Core` can
//! observe; `status_hint` carries a fixed HTTP-status mapping for each
//! without pulling in an HTTP crate (routing frameworks at the edge
//! translate `status_hint()` into their own response type).

use std::time::Duration;

use tc_governance::{AgentId, Phase, ScoringError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid evaluation input: {0}")]
    InvalidEvaluation(#[from] ScoringError),

    #[error("agent {agent_id} is missing mandatory context: {missing_paths:?}")]
    IncompleteContext {
        agent_id: AgentId,
        missing_paths: Vec<String>,
    },

    #[error("agent {agent_id} output fails schema validation: {errors:?}")]
    SchemaViolation { agent_id: AgentId, errors: Vec<String> },

    #[error("phase {phase} is locked: {blockers:?}")]
    LockBlocked {
        phase: Phase,
        blockers: Vec<String>,
        actions: Vec<String>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("defense-file storage failure: {0}")]
    StorageFailure(String),

    #[error("transient upstream failure: {0}")]
    Transient(String),
}

impl From<tc_synapse::ContextError> for EngineError {
    fn from(e: tc_synapse::ContextError) -> Self {
        EngineError::IncompleteContext {
            agent_id: e.agent_id,
            missing_paths: e.missing_paths,
        }
    }
}

impl EngineError {
    /// HTTP status an adapter at the edge should respond with: 400 invalid
    /// input, 403 lock-blocked, 422 schema violations, 503 storage/upstream
    /// failures, 504 timeouts. Never exposes internals.
    pub fn status_hint(&self) -> u16 {
        match self {
            EngineError::InvalidEvaluation(_) => 400,
            EngineError::IncompleteContext { .. } => 422,
            EngineError::SchemaViolation { .. } => 422,
            EngineError::LockBlocked { .. } => 403,
            EngineError::Cancelled => 499,
            EngineError::Timeout(_) => 504,
            EngineError::StorageFailure(_) => 503,
            EngineError::Transient(_) => 503,
        }
    }
}
