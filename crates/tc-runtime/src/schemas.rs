//! Default C2 schema registry for every agent. Every schema requires a
//! `decision` field (one of the four [`tc_governance::Decision`] values) —
//! C4 reads it back out to populate the deliberation's `decision`.

use tc_governance::{AgentId, FieldType, OutputValidator, Schema};

const DECISION_VALUES: &[&str] = &[
    "APPROVE",
    "APPROVE_WITH_CONDITIONS",
    "REQUEST_CHANGES",
    "REJECT",
];

fn base_schema() -> Schema {
    Schema::default()
        .field("decision", true, FieldType::Enum(DECISION_VALUES))
        .field("rationale", true, FieldType::String)
        .field("requires_human_review", false, FieldType::Bool)
        .field("risk_contribution", false, FieldType::Object)
}

/// Builds the registry the composition root hands to `AgentRunnerImpl`.
/// `A3_FISCAL` additionally requires the pillar-conclusion and
/// evidence-checklist fields its fiscal deliberations must carry.
pub fn default_schema_registry() -> OutputValidator {
    let mut validator = OutputValidator::new();

    validator.register(AgentId::A1Sponsor, base_schema());
    validator.register(AgentId::A2Pmo, base_schema());
    validator.register(
        AgentId::A3Fiscal,
        base_schema()
            .field("conclusion_per_pillar", true, FieldType::NestedDetailMinLen(50))
            .field("checklist_required_evidence", true, FieldType::ArrayMinItems(3))
            .field("vbc_fiscal", false, FieldType::Bool),
    );
    validator.register(
        AgentId::A4Legal,
        base_schema().field("vbc_legal", false, FieldType::Bool),
    );
    validator.register(
        AgentId::A5Finance,
        base_schema()
            .field("budget_confirmed", false, FieldType::Bool)
            .field("three_way_match_delta_pct", false, FieldType::Number),
    );
    validator.register(AgentId::A6Supplier, base_schema());
    validator.register(AgentId::A7Defense, base_schema());

    validator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_agent_id_is_registered() {
        let validator = default_schema_registry();
        let mut output = serde_json::json!({"decision": "APPROVE", "rationale": "ok"});
        for agent_id in [
            AgentId::A1Sponsor,
            AgentId::A2Pmo,
            AgentId::A4Legal,
            AgentId::A5Finance,
            AgentId::A6Supplier,
            AgentId::A7Defense,
        ] {
            let outcome = validator
                .validate_and_correct(agent_id, &mut output.clone())
                .unwrap();
            assert_ne!(outcome.status, tc_governance::OutcomeStatus::Invalid);
        }
    }

    #[test]
    fn a3_fiscal_requires_pillar_conclusions_and_evidence_checklist() {
        let validator = default_schema_registry();
        let mut output = serde_json::json!({"decision": "APPROVE", "rationale": "ok"});
        let outcome = validator
            .validate_and_correct(AgentId::A3Fiscal, &mut output)
            .unwrap();
        assert_eq!(outcome.status, tc_governance::OutcomeStatus::Invalid);
    }
}
