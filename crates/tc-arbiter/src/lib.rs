//! Phase Orchestrator (C5) and State Machine (C7): agent scheduling within
//! a phase, consensus evaluation, and the legal project-state transition
//! graph (consulting `tc_gate` for hard-lock-gated moves).

pub mod orchestrator;
pub mod state_machine;

pub use orchestrator::{AgentRunner, PhaseOrchestrator, PhaseVerdict, DEFAULT_T_AGENT};
pub use state_machine::{
    ConsensusOutcome, ProjectState, StateMachine, TransitionError, TransitionLogEntry,
    DEFAULT_ACTOR, MAX_REVISION_CYCLES,
};
