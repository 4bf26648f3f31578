//! C4 — Agent Runner.
//!
//! Implements `tc_arbiter::AgentRunner`: context → prompt → LLM (with
//! retry) → validate → persist → emit. Never mutates project state — that
//! stays the orchestrator's job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use tc_arbiter::AgentRunner as AgentRunnerTrait;
use tc_governance::{
    AgentConfig, AgentId, Decision, Deliberation, LedgerEvent, OutcomeStatus, OutputValidator,
    Phase, Project, RiskBreakdown, Supplier, TenantId, ValidationStatus,
};
use tc_nexus::{EventStatus, EventStreamHub, StreamEvent};
use tc_synapse::ContextAssembler;

use crate::ledger_store::ProjectLedgers;
use crate::prompts::build_prompt;
use crate::traits::{CompletionRequest, LlmError, LlmProvider};

/// Retry backoff for transient LLM failures: 2 retries at 2s then 6s.
const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(2), Duration::from_secs(6)];

pub struct AgentRunnerImpl {
    pub llm: Arc<dyn LlmProvider>,
    pub validator: Arc<OutputValidator>,
    pub assembler: ContextAssembler,
    pub ledgers: Arc<ProjectLedgers>,
    pub hub: EventStreamHub,
    pub agent_timeout: Duration,
    pub max_tokens: u32,
}

impl AgentRunnerImpl {
    /// Ancillary inputs C3 needs that aren't on `Project` itself. A demo
    /// wiring can always pass `None`/empty; a full deployment resolves
    /// these from the document store / tenant registry before each call.
    pub fn build(
        llm: Arc<dyn LlmProvider>,
        validator: Arc<OutputValidator>,
        ledgers: Arc<ProjectLedgers>,
        hub: EventStreamHub,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            validator,
            assembler: ContextAssembler::new(),
            ledgers,
            hub,
            agent_timeout,
            max_tokens: 2048,
        }
    }

    async fn call_llm_with_retry(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut attempt = 0usize;
        loop {
            match self.llm.complete(request.clone()).await {
                Ok(text) => return Ok(text),
                Err(LlmError::Transient(msg)) if attempt < RETRY_BACKOFF.len() => {
                    warn!(attempt, error = %msg, "transient LLM failure, retrying");
                    tokio::time::sleep(RETRY_BACKOFF[attempt]).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn invalid_deliberation(
        &self,
        project: &Project,
        phase: Phase,
        agent_id: AgentId,
        reason: String,
    ) -> Deliberation {
        Deliberation {
            id: Uuid::new_v4(),
            project_id: project.project_id.clone(),
            phase,
            agent_id,
            decision: Decision::RequestChanges,
            structured_output: serde_json::Map::from_iter([(
                "error".to_string(),
                Value::String(reason),
            )]),
            risk_contribution: RiskBreakdown::default(),
            requires_human_review: false,
            created_at: chrono::Utc::now(),
            validation_status: ValidationStatus::Invalid,
            corrections_applied: Vec::new(),
        }
    }
}

#[async_trait]
impl AgentRunnerTrait for AgentRunnerImpl {
    async fn run(
        &self,
        config: &AgentConfig,
        project: &Project,
        phase: Phase,
        prior_deliberations: &[Deliberation],
    ) -> Deliberation {
        let started_at = Instant::now();

        // Step 1: assemble context, mandatory-validation enabled.
        let context = match self.assembler.assemble(
            config,
            None::<&TenantId>,
            project,
            None::<&Supplier>,
            &[],
            prior_deliberations,
            json!({"phase": phase.to_string()}),
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                let deliberation = self.invalid_deliberation(
                    project,
                    phase,
                    config.agent_id,
                    format!("incomplete context: {e}"),
                );
                self.record_failure(project, phase, &deliberation, started_at).await;
                return deliberation;
            }
        };

        // Step 2: build prompt.
        let prompt = build_prompt(config, phase, project.typology, &context);

        // Step 3: call the LLM with retry/backoff on transient failures only.
        let request = CompletionRequest {
            prompt,
            max_tokens: self.max_tokens,
            timeout: self.agent_timeout,
        };
        let raw_response = match tokio::time::timeout(self.agent_timeout, self.call_llm_with_retry(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                let deliberation = self.invalid_deliberation(
                    project,
                    phase,
                    config.agent_id,
                    format!("LLM call failed: {e}"),
                );
                self.record_failure(project, phase, &deliberation, started_at).await;
                return deliberation;
            }
            Err(_) => {
                let deliberation = self.invalid_deliberation(
                    project,
                    phase,
                    config.agent_id,
                    format!("agent timed out after {:?}", self.agent_timeout),
                );
                self.record_failure(project, phase, &deliberation, started_at).await;
                return deliberation;
            }
        };

        // Step 4: parse and validate/correct.
        let mut output: Value = match serde_json::from_str(&raw_response) {
            Ok(v) => v,
            Err(e) => {
                let deliberation = self.invalid_deliberation(
                    project,
                    phase,
                    config.agent_id,
                    format!("response is not valid JSON: {e}"),
                );
                self.record_failure(project, phase, &deliberation, started_at).await;
                return deliberation;
            }
        };

        let outcome = match self.validator.validate_and_correct(config.agent_id, &mut output) {
            Ok(o) => o,
            Err(e) => {
                let deliberation = self.invalid_deliberation(
                    project,
                    phase,
                    config.agent_id,
                    format!("{e}"),
                );
                self.record_failure(project, phase, &deliberation, started_at).await;
                return deliberation;
            }
        };

        let deliberation = self.build_deliberation(project, phase, config.agent_id, output, outcome);

        // Step 6: append to the defense file.
        if let Err(e) = self
            .ledgers
            .append(
                &project.project_id,
                LedgerEvent::Deliberation {
                    agent_id: config.agent_id,
                    phase,
                    deliberation_id: deliberation.id,
                },
            )
            .await
        {
            warn!(error = %e, "defense-file append failed, agent run recorded as failed");
        }

        // Step 7: emit an event with agent id, decision and elapsed time.
        self.hub
            .publish(
                &project.project_id,
                StreamEvent::new(
                    EventStatus::InProgress,
                    json!({
                        "agent_id": config.agent_id.to_string(),
                        "decision": deliberation.decision,
                        "elapsed_ms": started_at.elapsed().as_millis(),
                    }),
                    false,
                ),
            )
            .await;

        deliberation
    }
}

impl AgentRunnerImpl {
    async fn record_failure(
        &self,
        project: &Project,
        phase: Phase,
        deliberation: &Deliberation,
        started_at: Instant,
    ) {
        let _ = self
            .ledgers
            .append(
                &project.project_id,
                LedgerEvent::Deliberation {
                    agent_id: deliberation.agent_id,
                    phase,
                    deliberation_id: deliberation.id,
                },
            )
            .await;

        self.hub
            .publish(
                &project.project_id,
                StreamEvent::new(
                    EventStatus::InProgress,
                    json!({
                        "agent_id": deliberation.agent_id.to_string(),
                        "decision": deliberation.decision,
                        "elapsed_ms": started_at.elapsed().as_millis(),
                        "validation_status": "invalid",
                    }),
                    false,
                ),
            )
            .await;

        info!(agent_id = %deliberation.agent_id, phase = %phase, "agent run recorded as failed, phase continues");
    }

    fn build_deliberation(
        &self,
        project: &Project,
        phase: Phase,
        agent_id: AgentId,
        output: Value,
        outcome: tc_governance::ValidationOutcome,
    ) -> Deliberation {
        let decision = output
            .get("decision")
            .and_then(|v| serde_json::from_value::<Decision>(v.clone()).ok())
            .unwrap_or(Decision::RequestChanges);

        let requires_human_review = output
            .get("requires_human_review")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let risk_contribution = output
            .get("risk_contribution")
            .and_then(|v| serde_json::from_value::<RiskBreakdown>(v.clone()).ok())
            .unwrap_or_default();

        let validation_status = if outcome.completeness < 0.5 {
            ValidationStatus::Invalid
        } else {
            match outcome.status {
                OutcomeStatus::Valid => ValidationStatus::Valid,
                OutcomeStatus::Corrected => ValidationStatus::Corrected,
                OutcomeStatus::Invalid => ValidationStatus::Invalid,
            }
        };

        let decision = if matches!(validation_status, ValidationStatus::Invalid) {
            Decision::RequestChanges
        } else {
            decision
        };

        Deliberation {
            id: Uuid::new_v4(),
            project_id: project.project_id.clone(),
            phase,
            agent_id,
            decision,
            structured_output: output.as_object().cloned().unwrap_or_default(),
            risk_contribution,
            requires_human_review,
            created_at: chrono::Utc::now(),
            validation_status,
            corrections_applied: outcome.corrections_applied,
        }
    }
}
