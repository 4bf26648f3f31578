//! C3 — Context Assembler.
//!
//! Builds the per-agent context map from project, supplier, documents and
//! prior deliberations, restricted to that agent's declared mandatory and
//! desirable field paths. Pure and deterministic: identical inputs always
//! produce an identical map (content-wise; key order carries no meaning).

use chrono::Utc;
use serde_json::{Map, Value};

use tc_governance::{AgentConfig, AgentId, Deliberation, Document, Project, Supplier, TenantId};

#[derive(Debug, Clone, thiserror::Error)]
#[error("agent {agent_id} is missing mandatory context fields: {missing_paths:?}")]
pub struct ContextError {
    pub agent_id: AgentId,
    pub missing_paths: Vec<String>,
}

/// The assembled, schema-restricted context handed to an agent, plus the
/// `_meta` block consumers may log but must never branch logic on.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentContext {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub _meta: ContextMeta,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextMeta {
    pub agent_id: AgentId,
    pub assembled_at: chrono::DateTime<Utc>,
    pub included_paths: Vec<String>,
}

#[derive(Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble context for `config.agent_id`. `extras` is an arbitrary
    /// caller-supplied value available under the `extras` root key (e.g.
    /// phase checklist state, regulatory extracts already fetched).
    pub fn assemble(
        &self,
        config: &AgentConfig,
        tenant: Option<&TenantId>,
        project: &Project,
        supplier: Option<&Supplier>,
        documents: &[Document],
        prior_deliberations: &[Deliberation],
        extras: Value,
    ) -> Result<AgentContext, ContextError> {
        self.assemble_with_validation(
            config,
            tenant,
            project,
            supplier,
            documents,
            prior_deliberations,
            extras,
            true,
        )
    }

    /// As [`Self::assemble`], but lets the caller skip mandatory-field
    /// validation (used by diagnostics/tooling, never by the Agent Runner).
    pub fn assemble_with_validation(
        &self,
        config: &AgentConfig,
        tenant: Option<&TenantId>,
        project: &Project,
        supplier: Option<&Supplier>,
        documents: &[Document],
        prior_deliberations: &[Deliberation],
        extras: Value,
        validate_mandatory: bool,
    ) -> Result<AgentContext, ContextError> {
        let source = build_source_tree(tenant, project, supplier, documents, prior_deliberations, extras);

        let mut wanted: Vec<&str> = config
            .mandatory_context_fields
            .iter()
            .chain(config.desirable_context_fields.iter())
            .map(|s| s.as_str())
            .collect();
        wanted.sort_unstable();
        wanted.dedup();

        let mut fields = Map::new();
        let mut included_paths = Vec::new();
        for path in &wanted {
            if let Some(value) = get_path(&source, path) {
                set_path(&mut fields, path, value);
                included_paths.push(path.to_string());
            }
        }

        if validate_mandatory {
            let missing_paths: Vec<String> = config
                .mandatory_context_fields
                .iter()
                .filter(|p| {
                    get_path(&source, p)
                        .map(is_empty_value)
                        .unwrap_or(true)
                })
                .cloned()
                .collect();

            if !missing_paths.is_empty() {
                return Err(ContextError {
                    agent_id: config.agent_id,
                    missing_paths,
                });
            }
        }

        Ok(AgentContext {
            fields,
            _meta: ContextMeta {
                agent_id: config.agent_id,
                assembled_at: Utc::now(),
                included_paths,
            },
        })
    }
}

fn build_source_tree(
    tenant: Option<&TenantId>,
    project: &Project,
    supplier: Option<&Supplier>,
    documents: &[Document],
    prior_deliberations: &[Deliberation],
    extras: Value,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "project".to_string(),
        serde_json::to_value(project).unwrap_or(Value::Null),
    );
    root.insert(
        "supplier".to_string(),
        supplier
            .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
            .unwrap_or(Value::Null),
    );
    root.insert(
        "company".to_string(),
        tenant
            .map(|t| Value::String(t.0.clone()))
            .unwrap_or(Value::Null),
    );
    root.insert(
        "documents".to_string(),
        serde_json::to_value(documents).unwrap_or(Value::Array(vec![])),
    );
    root.insert(
        "prior_deliberations".to_string(),
        serde_json::to_value(prior_deliberations).unwrap_or(Value::Array(vec![])),
    );
    root.insert("extras".to_string(), extras);
    Value::Object(root)
}

fn get_path(source: &Value, path: &str) -> Option<Value> {
    let mut current = source;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}

fn set_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set_path_segments(root, &segments, value);
}

fn set_path_segments(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(nested) = entry {
                set_path_segments(nested, rest, value);
            }
        }
    }
}

fn is_empty_value(value: Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tc_governance::{Phase, ProjectId, RiskBreakdown, Typology};

    fn sample_project() -> Project {
        Project {
            project_id: ProjectId("p1".into()),
            tenant_id: TenantId("t1".into()),
            name: "Consulting engagement".into(),
            typology: Typology::Consulting,
            amount: dec!(1_500_000),
            current_phase: Phase::F1,
            risk_score_total: 0,
            risk_breakdown: RiskBreakdown::default(),
            human_review_obtained: false,
            completed_phases: BTreeSet::from([Phase::F0]),
            created_at: ChronoUtc::now(),
            updated_at: ChronoUtc::now(),
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            agent_id: AgentId::A3Fiscal,
            participating_phases: BTreeSet::from([Phase::F2]),
            can_block: true,
            issues_critical_approval: true,
            output_schema_id: "a3_fiscal_v1".into(),
            mandatory_context_fields: vec!["project.typology".into(), "project.amount".into()],
            desirable_context_fields: vec!["extras.regulatory_extract".into()],
        }
    }

    #[test]
    fn assembles_only_declared_fields() {
        let assembler = ContextAssembler::new();
        let project = sample_project();
        let ctx = assembler
            .assemble(
                &config(),
                None,
                &project,
                None,
                &[],
                &[],
                serde_json::json!({"regulatory_extract": "art. 27 LISR"}),
            )
            .unwrap();
        assert!(ctx.fields.get("project").is_some());
        assert!(ctx.fields["project"].get("name").is_none());
        assert_eq!(ctx.fields["project"]["typology"], serde_json::json!("CONSULTING"));
        assert_eq!(ctx._meta.included_paths.len(), 3);
    }

    #[test]
    fn missing_mandatory_field_fails_closed() {
        let assembler = ContextAssembler::new();
        let mut cfg = config();
        cfg.mandatory_context_fields.push("supplier.rfc".into());
        let project = sample_project();
        let err = assembler
            .assemble(&cfg, None, &project, None, &[], &[], Value::Null)
            .unwrap_err();
        assert!(err.missing_paths.contains(&"supplier.rfc".to_string()));
    }

    #[test]
    fn assembly_is_deterministic() {
        let assembler = ContextAssembler::new();
        let project = sample_project();
        let a = assembler
            .assemble(&config(), None, &project, None, &[], &[], Value::Null)
            .unwrap();
        let b = assembler
            .assemble(&config(), None, &project, None, &[], &[], Value::Null)
            .unwrap();
        assert_eq!(a.fields, b.fields);
    }
}
