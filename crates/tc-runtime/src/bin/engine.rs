//! Demo CLI: wires a [`tc_runtime::Core`] with mock external interfaces and
//! drives one project from F0 through F2 without any HTTP surface.

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use tc_arbiter::ProjectState;
use tc_gate::LockContext;
use tc_governance::{
    AgentConfig, AgentId, Decision, LedgerEntry, Phase, Project, ProjectId, RiskBreakdown,
    TenantId, Typology,
};
use tc_runtime::{
    CompletionRequest, Core, EngineConfig, LlmError, LlmProvider, Persistence, PersistenceError,
};

/// Always approves, with agent-appropriate critical-approval flags so the
/// F2 lock has something to evaluate.
struct DemoLlm;

#[async_trait]
impl LlmProvider for DemoLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        Ok(r#"{"decision": "APPROVE", "rationale": "demo approval", "budget_confirmed": true}"#
            .to_string())
    }
}

struct InMemoryPersistence {
    store: Mutex<std::collections::HashMap<ProjectId, Vec<LedgerEntry>>>,
}

impl InMemoryPersistence {
    fn new() -> Self {
        Self {
            store: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn append(
        &self,
        project_id: &ProjectId,
        entry: LedgerEntry,
    ) -> Result<String, PersistenceError> {
        let mut store = self.store.lock().await;
        let hash = entry.entry_hash.clone();
        store.entry(project_id.clone()).or_default().push(entry);
        Ok(hash)
    }

    async fn read(&self, project_id: &ProjectId) -> Result<Vec<LedgerEntry>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store.get(project_id).cloned().unwrap_or_default())
    }
}

fn agent_config(agent_id: AgentId, phase: Phase, can_block: bool) -> AgentConfig {
    AgentConfig {
        agent_id,
        participating_phases: BTreeSet::from([phase]),
        can_block,
        issues_critical_approval: false,
        output_schema_id: "demo_v1".into(),
        mandatory_context_fields: vec![],
        desirable_context_fields: vec![],
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = EngineConfig::from_env();
    let core = Core::new(Arc::new(DemoLlm), Arc::new(InMemoryPersistence::new()), config);

    let mut project = Project {
        project_id: ProjectId("demo-001".into()),
        tenant_id: TenantId("tenant-demo".into()),
        name: "Consulting engagement demo".into(),
        typology: Typology::Consulting,
        amount: dec!(1_500_000),
        current_phase: Phase::F0,
        risk_score_total: 0,
        risk_breakdown: RiskBreakdown::default(),
        human_review_obtained: false,
        completed_phases: BTreeSet::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    tracing::info!(project_id = %project.project_id, "running phase F0");
    let independent = vec![
        agent_config(AgentId::A1Sponsor, Phase::F0, true),
        agent_config(AgentId::A3Fiscal, Phase::F0, true),
        agent_config(AgentId::A5Finance, Phase::F0, true),
    ];
    let ordered = vec![agent_config(AgentId::A7Defense, Phase::F0, false)];

    let verdict = core
        .run_phase(&project, Phase::F0, &independent, &ordered, Arc::new(AtomicBool::new(false)))
        .await;
    println!("F0 verdict: {:?}", verdict.aggregate);

    if verdict.aggregate == Decision::Approve {
        project.mark_phase_completed(Phase::F0);
        core.transition(
            &project,
            ProjectState::Intake,
            ProjectState::ParallelValidation,
            "F0 agents approved",
            "A2_PMO",
            &LockContext::default(),
        )
        .await?;
    }

    // F1 (SOW) is out of scope for this demo's agent roster; mark it
    // completed directly to exercise the F2 hard lock.
    project.mark_phase_completed(Phase::F1);

    let lock_ctx = LockContext {
        a1_sponsor_approved: true,
        a3_fiscal_approved: true,
        a5_finance_budget_confirmed: true,
        has_unresolved_critical_flag: false,
        ..Default::default()
    };

    match core
        .transition(
            &project,
            ProjectState::FormalizationLegal,
            ProjectState::Execution,
            "F2 lock released",
            "A2_PMO",
            &lock_ctx,
        )
        .await
    {
        Ok(entry) => {
            project.current_phase = Phase::F2;
            println!("F2 transition accepted: {entry:?}");
        }
        Err(e) => {
            println!("F2 transition blocked (status {}): {e}", e.status_hint());
        }
    }

    let ledger = core.ledgers.entries(&project.project_id).await;
    println!("defense file has {} entries", ledger.len());

    Ok(())
}
