//! C5 — Phase Orchestrator.
//!
//! Schedules a phase's agents: independent-tier agents run concurrently,
//! ordered-tier agents run serially afterwards with prior deliberations
//! available to them (typically `A7_DEFENSE`, which summarizes the phase).
//! Grounded on `tc-arbiter`'s original `Coordinator` (concurrent work behind
//! an `Arc`, bounded by a global timeout) but driving Agent Runner calls
//! instead of resource locks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use tc_governance::{AgentConfig, AgentId, Decision, Deliberation, Phase, Project};
use tc_nexus::{EventStatus, EventStreamHub, StreamEvent};

/// Default per-agent timeout (`T_agent`).
pub const DEFAULT_T_AGENT: Duration = Duration::from_secs(60);

/// The orchestrator's view of C4: run one agent end-to-end and return its
/// deliberation. Implemented by `tc_runtime::AgentRunnerImpl`; kept as a
/// trait here so `tc-arbiter` does not depend on the runtime crate.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(
        &self,
        config: &AgentConfig,
        project: &Project,
        phase: Phase,
        prior_deliberations: &[Deliberation],
    ) -> Deliberation;
}

#[derive(Debug, Clone)]
pub struct PhaseVerdict {
    pub decisions_by_agent: BTreeMap<tc_governance::AgentId, Decision>,
    pub deliberations: Vec<Deliberation>,
    pub aggregate: Decision,
    pub required_human_review: bool,
    /// Set when one or more `can_block` agents were skipped (cancellation)
    /// or did not return before `T_phase` expired. `decisions_by_agent` and
    /// `deliberations` only cover the agents that did complete.
    pub incomplete: bool,
}

pub struct PhaseOrchestrator {
    t_agent: Duration,
}

impl Default for PhaseOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_T_AGENT)
    }
}

impl PhaseOrchestrator {
    pub fn new(t_agent: Duration) -> Self {
        Self { t_agent }
    }

    /// Run a phase to completion. `cancel` may be flipped to `true`
    /// concurrently to stop spawning new independent-tier runs immediately.
    /// Agents skipped by cancellation, and any agent still outstanding once
    /// `T_phase` expires, are reported via `hub` as `cancelled` error events
    /// and leave the returned verdict marked `incomplete`.
    pub async fn run_phase(
        &self,
        project: &Project,
        phase: Phase,
        independent: &[AgentConfig],
        ordered: &[AgentConfig],
        runner: Arc<dyn AgentRunner>,
        cancel: Arc<AtomicBool>,
        hub: EventStreamHub,
    ) -> PhaseVerdict {
        let t_phase = self.t_agent * 3;
        let deadline = tokio::time::Instant::now() + t_phase;

        let mut deliberations = Vec::new();
        let mut incomplete = false;

        let mut handles = Vec::new();
        for config in independent {
            if cancel.load(Ordering::SeqCst) {
                incomplete = true;
                self.publish_cancelled(&hub, project, phase, config.agent_id).await;
                continue;
            }
            let runner = runner.clone();
            let agent_id = config.agent_id;
            let config = config.clone();
            let project = project.clone();
            handles.push((
                agent_id,
                tokio::spawn(async move { runner.run(&config, &project, phase, &[]).await }),
            ));
        }

        for (agent_id, handle) in handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(deliberation)) => deliberations.push(deliberation),
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "agent task panicked");
                    incomplete = true;
                    self.publish_cancelled(&hub, project, phase, agent_id).await;
                }
                Err(_) => {
                    incomplete = true;
                    self.publish_cancelled(&hub, project, phase, agent_id).await;
                }
            }
        }

        for config in ordered {
            if cancel.load(Ordering::SeqCst) || tokio::time::Instant::now() >= deadline {
                incomplete = true;
                self.publish_cancelled(&hub, project, phase, config.agent_id).await;
                continue;
            }
            match tokio::time::timeout_at(deadline, runner.run(config, project, phase, &deliberations)).await {
                Ok(deliberation) => deliberations.push(deliberation),
                Err(_) => {
                    incomplete = true;
                    self.publish_cancelled(&hub, project, phase, config.agent_id).await;
                }
            }
        }

        let mut verdict = aggregate_verdict(independent, ordered, deliberations);
        verdict.incomplete = incomplete;
        verdict
    }

    async fn publish_cancelled(&self, hub: &EventStreamHub, project: &Project, phase: Phase, agent_id: AgentId) {
        hub.publish(
            &project.project_id,
            StreamEvent::new(
                EventStatus::Error,
                serde_json::json!({
                    "reason": "cancelled",
                    "phase": phase,
                    "agent_id": agent_id,
                }),
                false,
            ),
        )
        .await;
    }
}

fn aggregate_verdict(
    independent: &[AgentConfig],
    ordered: &[AgentConfig],
    deliberations: Vec<Deliberation>,
) -> PhaseVerdict {
    let can_block_agents: std::collections::BTreeSet<_> = independent
        .iter()
        .chain(ordered.iter())
        .filter(|c| c.can_block)
        .map(|c| c.agent_id)
        .collect();

    let mut decisions_by_agent = BTreeMap::new();
    let mut required_human_review = false;
    for d in &deliberations {
        decisions_by_agent.insert(d.agent_id, d.decision);
        required_human_review |= d.requires_human_review;
    }

    let all_can_block_approve = can_block_agents.iter().all(|agent_id| {
        matches!(
            decisions_by_agent.get(agent_id),
            Some(Decision::Approve) | Some(Decision::ApproveWithConditions)
        )
    });

    let aggregate = if all_can_block_approve {
        Decision::Approve
    } else {
        // Surface the most severe decision among can_block agents.
        decisions_by_agent
            .iter()
            .filter(|(agent_id, _)| can_block_agents.contains(*agent_id))
            .map(|(_, decision)| *decision)
            .max_by_key(severity)
            .unwrap_or(Decision::RequestChanges)
    };

    PhaseVerdict {
        decisions_by_agent,
        deliberations,
        aggregate,
        required_human_review,
        incomplete: false,
    }
}

fn severity(decision: &Decision) -> u8 {
    match decision {
        Decision::Approve => 0,
        Decision::ApproveWithConditions => 1,
        Decision::RequestChanges => 2,
        Decision::Reject => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tc_governance::{AgentId, ProjectId, RiskBreakdown, TenantId, Typology, ValidationStatus};

    struct AlwaysApprove;

    #[async_trait]
    impl AgentRunner for AlwaysApprove {
        async fn run(
            &self,
            config: &AgentConfig,
            project: &Project,
            phase: Phase,
            _prior: &[Deliberation],
        ) -> Deliberation {
            Deliberation {
                id: uuid::Uuid::new_v4(),
                project_id: project.project_id.clone(),
                phase,
                agent_id: config.agent_id,
                decision: Decision::Approve,
                structured_output: serde_json::Map::new(),
                risk_contribution: RiskBreakdown::default(),
                requires_human_review: false,
                created_at: Utc::now(),
                validation_status: ValidationStatus::Valid,
                corrections_applied: vec![],
            }
        }
    }

    fn project() -> Project {
        Project {
            project_id: ProjectId("p1".into()),
            tenant_id: TenantId("t1".into()),
            name: "test".into(),
            typology: Typology::Consulting,
            amount: dec!(500_000),
            current_phase: Phase::F0,
            risk_score_total: 10,
            risk_breakdown: RiskBreakdown::default(),
            human_review_obtained: false,
            completed_phases: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config(agent_id: AgentId, can_block: bool) -> AgentConfig {
        AgentConfig {
            agent_id,
            participating_phases: BTreeSet::from([Phase::F0]),
            can_block,
            issues_critical_approval: false,
            output_schema_id: "test_v1".into(),
            mandatory_context_fields: vec![],
            desirable_context_fields: vec![],
        }
    }

    fn hub() -> EventStreamHub {
        EventStreamHub::new(tc_nexus::DEFAULT_QUEUE_CAPACITY)
    }

    #[tokio::test]
    async fn unanimous_approval_aggregates_to_approve() {
        let orchestrator = PhaseOrchestrator::new(Duration::from_millis(500));
        let independent = vec![config(AgentId::A1Sponsor, true)];
        let ordered = vec![config(AgentId::A7Defense, false)];
        let verdict = orchestrator
            .run_phase(
                &project(),
                Phase::F0,
                &independent,
                &ordered,
                Arc::new(AlwaysApprove),
                Arc::new(AtomicBool::new(false)),
                hub(),
            )
            .await;
        assert_eq!(verdict.aggregate, Decision::Approve);
        assert_eq!(verdict.deliberations.len(), 2);
        assert!(!verdict.incomplete);
    }

    #[tokio::test]
    async fn cancellation_before_spawn_marks_phase_incomplete_and_publishes_event() {
        let orchestrator = PhaseOrchestrator::new(Duration::from_millis(500));
        let independent = vec![config(AgentId::A1Sponsor, true)];
        let ordered = vec![config(AgentId::A7Defense, false)];
        let cancel = Arc::new(AtomicBool::new(true));
        let hub = hub();
        let proj = project();
        let mut handle = hub.subscribe(proj.project_id.clone()).await;
        let verdict = orchestrator
            .run_phase(
                &proj,
                Phase::F0,
                &independent,
                &ordered,
                Arc::new(AlwaysApprove),
                cancel,
                hub,
            )
            .await;
        assert!(verdict.incomplete);
        assert!(verdict.deliberations.is_empty());

        let mut saw_cancelled = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(100), handle.receiver.recv()).await
        {
            if event.status == EventStatus::Error && event.payload["reason"] == "cancelled" {
                saw_cancelled = true;
                break;
            }
        }
        assert!(saw_cancelled);
    }

    struct NeverResolves;

    #[async_trait]
    impl AgentRunner for NeverResolves {
        async fn run(
            &self,
            _config: &AgentConfig,
            _project: &Project,
            _phase: Phase,
            _prior: &[Deliberation],
        ) -> Deliberation {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    #[tokio::test]
    async fn phase_timeout_produces_partial_incomplete_verdict() {
        let orchestrator = PhaseOrchestrator::new(Duration::from_millis(10));
        let independent = vec![config(AgentId::A1Sponsor, true)];
        let ordered = vec![];
        let verdict = orchestrator
            .run_phase(
                &project(),
                Phase::F0,
                &independent,
                &ordered,
                Arc::new(NeverResolves),
                Arc::new(AtomicBool::new(false)),
                hub(),
            )
            .await;
        assert!(verdict.incomplete);
        assert!(verdict.deliberations.is_empty());
    }
}
