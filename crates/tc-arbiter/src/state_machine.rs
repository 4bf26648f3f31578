//! C7 — State Machine.
//!
//! Legal project states and transitions, grounded on
//! `original_source/backend/services/state_machine.py`'s `ProjectStateMachine`
//! (there `ProjectState`/`AgentDecision`; transition table and consensus
//! logic kept, hard-lock consultation against `tc_gate` added).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tc_gate::{evaluate_lock, GateError, LockContext};
use tc_governance::{AgentId, Decision, Phase, Project};

/// Maximum number of `IterativeReview` cycles before escalating to a human.
pub const MAX_REVISION_CYCLES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    Intake,
    ParallelValidation,
    Consolidation,
    IterativeReview,
    ApprovedF0,
    RejectedF0,
    HumanEscalated,
    FormalizationLegal,
    Execution,
    Delivery,
    Payment,
    Closed,
}

impl ProjectState {
    /// The phase a transition *into* this state is gated by, if any.
    fn hard_lock_phase(self) -> Option<Phase> {
        match self {
            ProjectState::Execution => Some(Phase::F2),
            ProjectState::Payment => Some(Phase::F8),
            _ => None,
        }
    }

    fn valid_next_states(self) -> &'static [ProjectState] {
        use ProjectState::*;
        match self {
            Intake => &[ParallelValidation],
            ParallelValidation => &[Consolidation],
            Consolidation => &[ApprovedF0, RejectedF0, IterativeReview],
            IterativeReview => &[Consolidation, HumanEscalated],
            ApprovedF0 => &[FormalizationLegal],
            RejectedF0 => &[Closed],
            HumanEscalated => &[ApprovedF0, RejectedF0, Closed],
            FormalizationLegal => &[Execution, RejectedF0, HumanEscalated],
            Execution => &[Delivery, HumanEscalated],
            Delivery => &[Payment, Execution, HumanEscalated],
            Payment => &[Closed, HumanEscalated],
            Closed => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusOutcome {
    pub consensus: bool,
    pub next_state: ProjectState,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub project_id: String,
    pub from: ProjectState,
    pub to: ProjectState,
    pub reason: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub is_valid: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransitionError {
    #[error("transition from {from:?} to {to:?} is not a legal state-machine move")]
    IllegalTransition {
        from: ProjectState,
        to: ProjectState,
    },
    #[error("transition to {to:?} is gated by hard lock {phase}, blocked on: {blockers:?}")]
    LockBlocked {
        to: ProjectState,
        phase: Phase,
        blockers: Vec<String>,
    },
    #[error(transparent)]
    Gate(#[from] GateError),
}

#[derive(Default)]
pub struct StateMachine;

impl StateMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn initial_state(&self) -> ProjectState {
        ProjectState::Intake
    }

    pub fn can_transition(&self, from: ProjectState, to: ProjectState) -> bool {
        from.valid_next_states().contains(&to)
    }

    /// Unanimous `Approve` → `ApprovedF0`; unanimous `Reject` → `RejectedF0`;
    /// anything else is a conflict that routes to `IterativeReview`. Only
    /// `can_block` agents' decisions should be passed in.
    pub fn evaluate_consensus(&self, decisions: &BTreeMap<AgentId, Decision>) -> ConsensusOutcome {
        let all_approve = decisions.values().all(|d| *d == Decision::Approve);
        let all_reject = decisions.values().all(|d| *d == Decision::Reject);

        if all_approve && !decisions.is_empty() {
            return ConsensusOutcome {
                consensus: true,
                next_state: ProjectState::ApprovedF0,
                reason: "Consenso positivo - Todos los agentes aprueban".to_string(),
            };
        }
        if all_reject && !decisions.is_empty() {
            return ConsensusOutcome {
                consensus: true,
                next_state: ProjectState::RejectedF0,
                reason: "Consenso negativo - Todos los agentes rechazan".to_string(),
            };
        }

        ConsensusOutcome {
            consensus: false,
            next_state: ProjectState::IterativeReview,
            reason: format!("Conflicto detectado - Decisiones: {decisions:?}"),
        }
    }

    pub fn should_escalate_to_human(&self, revision_cycle: u32) -> bool {
        revision_cycle >= MAX_REVISION_CYCLES
    }

    /// Majority vote used once `should_escalate_to_human` is true: a tie
    /// still goes to a human rather than being decided algorithmically.
    pub fn next_state_on_escalation(&self, decisions: &BTreeMap<AgentId, Decision>) -> ProjectState {
        let approvals = decisions
            .values()
            .filter(|d| matches!(d, Decision::Approve | Decision::ApproveWithConditions))
            .count();
        let rejections = decisions
            .values()
            .filter(|d| matches!(d, Decision::Reject | Decision::RequestChanges))
            .count();

        match approvals.cmp(&rejections) {
            std::cmp::Ordering::Greater => ProjectState::ApprovedF0,
            std::cmp::Ordering::Less => ProjectState::RejectedF0,
            std::cmp::Ordering::Equal => ProjectState::HumanEscalated,
        }
    }

    /// Attempt a transition. Refuses illegal moves outright; for a move into
    /// a hard-lock-gated state, consults `tc_gate::evaluate_lock` first and
    /// refuses if the lock isn't released.
    pub fn transition(
        &self,
        project: &Project,
        from: ProjectState,
        to: ProjectState,
        reason: impl Into<String>,
        actor: impl Into<String>,
        lock_ctx: &LockContext,
        now: DateTime<Utc>,
    ) -> Result<TransitionLogEntry, TransitionError> {
        if !self.can_transition(from, to) {
            return Err(TransitionError::IllegalTransition { from, to });
        }

        if let Some(phase) = to.hard_lock_phase() {
            let result = evaluate_lock(project, phase, lock_ctx)?;
            if !result.released {
                return Err(TransitionError::LockBlocked {
                    to,
                    phase,
                    blockers: result.blockers,
                });
            }
        }

        Ok(TransitionLogEntry {
            project_id: project.project_id.to_string(),
            from,
            to,
            reason: reason.into(),
            actor: actor.into(),
            timestamp: now,
            is_valid: true,
        })
    }
}

/// Default actor recorded for transitions the orchestrator drives rather
/// than a specific human or agent.
pub const DEFAULT_ACTOR: &str = "A2_PMO";
