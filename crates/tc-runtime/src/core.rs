//! `Core`: the composition root. Every component is constructed once here
//! and injected into whatever consumes it — no module-level singletons.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;

use tc_arbiter::{
    AgentRunner as AgentRunnerTrait, PhaseOrchestrator, PhaseVerdict, ProjectState, StateMachine,
    TransitionError, TransitionLogEntry,
};
use tc_gate::LockContext;
use tc_governance::{
    AgentConfig, EvaluationInput, HumanReviewContext, LedgerEvent, OutputValidator, Phase,
    Project, ScoreResult, ScoringEngine,
};
use tc_nexus::EventStreamHub;

use crate::agent_runner::AgentRunnerImpl;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger_store::ProjectLedgers;
use crate::schemas::default_schema_registry;
use crate::traits::{LlmProvider, Persistence};

pub struct Core {
    pub config: EngineConfig,
    pub scoring: ScoringEngine,
    pub validator: Arc<OutputValidator>,
    pub orchestrator: PhaseOrchestrator,
    pub state_machine: StateMachine,
    pub ledgers: Arc<ProjectLedgers>,
    pub hub: EventStreamHub,
    agent_runner: Arc<dyn AgentRunnerTrait>,
}

impl Core {
    pub fn new(llm: Arc<dyn LlmProvider>, persistence: Arc<dyn Persistence>, config: EngineConfig) -> Self {
        let validator = Arc::new(default_schema_registry());
        let hub = EventStreamHub::new(tc_nexus::DEFAULT_QUEUE_CAPACITY);
        let ledgers = Arc::new(ProjectLedgers::new(persistence));
        let agent_runner: Arc<dyn AgentRunnerTrait> = Arc::new(AgentRunnerImpl::build(
            llm,
            validator.clone(),
            ledgers.clone(),
            hub.clone(),
            config.agent_timeout,
        ));

        Self {
            orchestrator: PhaseOrchestrator::new(config.agent_timeout),
            config,
            scoring: ScoringEngine::new(),
            validator,
            state_machine: StateMachine::new(),
            ledgers,
            hub,
            agent_runner,
        }
    }

    /// C1: risk-score an evaluation.
    pub fn score(
        &self,
        input: &EvaluationInput,
        review_ctx: HumanReviewContext,
    ) -> Result<ScoreResult, EngineError> {
        self.scoring.score(input, review_ctx).map_err(EngineError::from)
    }

    /// C5: run one phase to completion. Never fails outright: a phase that
    /// is cancelled mid-flight or exceeds `T_phase` comes back as a partial
    /// verdict with `incomplete` set, not an error (see `PhaseVerdict`).
    pub async fn run_phase(
        &self,
        project: &Project,
        phase: Phase,
        independent: &[AgentConfig],
        ordered: &[AgentConfig],
        cancel: Arc<AtomicBool>,
    ) -> PhaseVerdict {
        self.orchestrator
            .run_phase(
                project,
                phase,
                independent,
                ordered,
                self.agent_runner.clone(),
                cancel,
                self.hub.clone(),
            )
            .await
    }

    /// C7: attempt a state transition, consulting C6 for hard-lock-gated
    /// moves, and append the outcome to the defense file either way.
    pub async fn transition(
        &self,
        project: &Project,
        from: ProjectState,
        to: ProjectState,
        reason: impl Into<String> + Send,
        actor: impl Into<String> + Send,
        lock_ctx: &LockContext,
    ) -> Result<TransitionLogEntry, EngineError> {
        let result = self
            .state_machine
            .transition(project, from, to, reason, actor, lock_ctx, Utc::now());

        match result {
            Ok(entry) => {
                self.ledgers
                    .append(&project.project_id, LedgerEvent::PhaseTransition { from, to })
                    .await?;
                Ok(entry)
            }
            Err(TransitionError::LockBlocked { phase, blockers, .. }) => {
                self.ledgers
                    .append(
                        &project.project_id,
                        LedgerEvent::LockEvaluation {
                            phase,
                            released: false,
                            blockers: blockers.clone(),
                        },
                    )
                    .await?;
                let actions = tc_gate::actions_for_blockers(&blockers);
                Err(EngineError::LockBlocked { phase, blockers, actions })
            }
            Err(TransitionError::IllegalTransition { from, to }) => {
                Err(EngineError::Transient(format!(
                    "illegal transition {from:?} -> {to:?}"
                )))
            }
            Err(TransitionError::Gate(e)) => Err(EngineError::Transient(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tc_governance::{AgentId, Decision, ProjectId, RiskBreakdown, TenantId, Typology};

    use crate::traits::{CompletionRequest, LlmError, PersistenceError};

    struct StubLlm;
    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
            Ok(r#"{"decision": "APPROVE", "rationale": "ok"}"#.to_string())
        }
    }

    struct NullPersistence;
    #[async_trait]
    impl Persistence for NullPersistence {
        async fn append(
            &self,
            _project_id: &tc_governance::ProjectId,
            entry: tc_governance::LedgerEntry,
        ) -> Result<String, PersistenceError> {
            Ok(entry.entry_hash)
        }
        async fn read(
            &self,
            _project_id: &tc_governance::ProjectId,
        ) -> Result<Vec<tc_governance::LedgerEntry>, PersistenceError> {
            Ok(Vec::new())
        }
    }

    fn project() -> Project {
        Project {
            project_id: ProjectId("p1".into()),
            tenant_id: TenantId("t1".into()),
            name: "demo".into(),
            typology: Typology::Consulting,
            amount: dec!(1_000_000),
            current_phase: Phase::F0,
            risk_score_total: 10,
            risk_breakdown: RiskBreakdown::default(),
            human_review_obtained: false,
            completed_phases: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn core() -> Core {
        Core::new(Arc::new(StubLlm), Arc::new(NullPersistence), EngineConfig::default())
    }

    fn agent_config(agent_id: AgentId, can_block: bool) -> AgentConfig {
        AgentConfig {
            agent_id,
            participating_phases: BTreeSet::from([Phase::F0]),
            can_block,
            issues_critical_approval: false,
            output_schema_id: "v1".into(),
            mandatory_context_fields: vec![],
            desirable_context_fields: vec![],
        }
    }

    #[tokio::test]
    async fn run_phase_aggregates_approve() {
        let core = core();
        let independent = vec![agent_config(AgentId::A1Sponsor, true)];
        let ordered = vec![agent_config(AgentId::A7Defense, false)];
        let verdict = core
            .run_phase(&project(), Phase::F0, &independent, &ordered, Arc::new(AtomicBool::new(false)))
            .await;
        assert_eq!(verdict.aggregate, Decision::Approve);
        assert!(!verdict.incomplete);
    }

    #[tokio::test]
    async fn transition_into_execution_is_blocked_without_sponsor_approval() {
        let core = core();
        let err = core
            .transition(
                &project(),
                ProjectState::FormalizationLegal,
                ProjectState::Execution,
                "advance",
                "A2_PMO",
                &LockContext::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_hint(), 403);
    }
}
