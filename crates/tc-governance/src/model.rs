//! Core domain model: projects, suppliers, documents, agent configuration and
//! deliberations.
//!
//! Types here are shared by every other crate in the workspace; nothing in
//! this module calls out to an LLM, a database, or the network.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally-unique project identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque document identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub String);

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque tenant scoping key. The core does not partition data beyond
/// carrying this value alongside a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// The fixed 10-phase project lifecycle. Ordered by declaration so that
/// `current_phase` advancement is a plain integer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::F0,
        Phase::F1,
        Phase::F2,
        Phase::F3,
        Phase::F4,
        Phase::F5,
        Phase::F6,
        Phase::F7,
        Phase::F8,
        Phase::F9,
    ];

    /// Whether this phase is a hard lock whose advancement predicate must
    /// hold (see `tc_gate::evaluate_lock`).
    pub fn is_hard_lock(self) -> bool {
        matches!(self, Phase::F2 | Phase::F6 | Phase::F8)
    }

    /// The presentation alias used by the original `E1_ESTRATEGIA..`
    /// naming scheme. F0..F9 remains canonical; this is display-only.
    pub fn alias(self) -> &'static str {
        match self {
            Phase::F0 => "E1_ESTRATEGIA",
            Phase::F1 => "E2_SOW",
            Phase::F2 => "E3_CANDADO_INICIO",
            Phase::F3 => "E4_EJECUCION",
            Phase::F4 => "E5_MONITOREO",
            Phase::F5 => "E6_ACEPTACION",
            Phase::F6 => "E7_CANDADO_FACTURA",
            Phase::F7 => "E8_AUDITORIA",
            Phase::F8 => "E9_CANDADO_PAGO",
            Phase::F9 => "E10_CIERRE",
        }
    }

    pub fn next(self) -> Option<Phase> {
        let idx = Self::ALL.iter().position(|p| *p == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Service typology. Drives `human_review_required` and F8's
/// transfer-pricing-study requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Typology {
    Consulting,
    IntragroupManagementFee,
    SoftwareSaas,
    Restructuring,
    Marketing,
    TechnicalAssistance,
    Licensing,
    Other,
}

/// Relationship between the project's company and the supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    IndependentThird,
    RelatedParty,
    RelatedPartyNational,
}

impl RelationshipType {
    /// A related-party relationship type begins with `related_party`.
    pub fn is_related_party(self) -> bool {
        matches!(
            self,
            RelationshipType::RelatedParty | RelationshipType::RelatedPartyNational
        )
    }
}

/// Per-pillar risk breakdown, each clamped to 0..25 by the scoring engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub business_reason: u8,
    pub economic_benefit: u8,
    pub materiality: u8,
    pub traceability: u8,
}

impl RiskBreakdown {
    pub fn total(&self) -> u8 {
        (self.business_reason as u16
            + self.economic_benefit as u16
            + self.materiality as u16
            + self.traceability as u16)
            .min(100) as u8
    }
}

/// A procurement/expense project traversing the F0..F9 lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub name: String,
    pub typology: Typology,
    /// MXN, fixed-point.
    pub amount: Decimal,
    pub current_phase: Phase,
    pub risk_score_total: u8,
    pub risk_breakdown: RiskBreakdown,
    pub human_review_obtained: bool,
    /// Phases whose *latest* attempt completed successfully. A phase
    /// retried after `ITERATIVE_REVIEW` or `HUMAN_ESCALATED` is removed
    /// from this set until it completes again.
    pub completed_phases: BTreeSet<Phase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn mark_phase_completed(&mut self, phase: Phase) {
        self.completed_phases.insert(phase);
        self.updated_at = Utc::now();
    }

    pub fn mark_phase_reopened(&mut self, phase: Phase) {
        self.completed_phases.remove(&phase);
        self.updated_at = Utc::now();
    }

    pub fn is_phase_completed(&self, phase: Phase) -> bool {
        self.completed_phases.contains(&phase)
    }
}

/// Status of a supplier on the regulator's EFOS (simulated-operations)
/// blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EfosStatus {
    Clean,
    Presumed,
    Definitive,
    Cleared,
}

/// A supplier, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub rfc: String,
    pub relationship_type: RelationshipType,
    pub efos_status: EfosStatus,
    pub history_score: u8,
}

impl Supplier {
    pub fn efos_flag(&self) -> bool {
        matches!(self.efos_status, EfosStatus::Presumed | EfosStatus::Definitive)
    }
}

/// Document kind. `Contract` and `Invoice` are append-only: corrections are
/// new documents that supersede via `supersedes_doc_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contract,
    Invoice,
    Sow,
    PaymentProof,
    TpStudy,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    pub project_id: ProjectId,
    pub doc_type: DocumentType,
    pub hash_sha256: String,
    pub uploaded_at: DateTime<Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub supersedes_doc_id: Option<DocId>,
}

/// Canonical agent identifiers participating in deliberations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentId {
    A1Sponsor,
    A2Pmo,
    A3Fiscal,
    A4Legal,
    A5Finance,
    A6Supplier,
    A7Defense,
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentId::A1Sponsor => "A1_SPONSOR",
            AgentId::A2Pmo => "A2_PMO",
            AgentId::A3Fiscal => "A3_FISCAL",
            AgentId::A4Legal => "A4_LEGAL",
            AgentId::A5Finance => "A5_FINANCE",
            AgentId::A6Supplier => "A6_SUPPLIER",
            AgentId::A7Defense => "A7_DEFENSE",
        };
        write!(f, "{s}")
    }
}

/// Static per-release configuration for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: AgentId,
    pub participating_phases: BTreeSet<Phase>,
    pub can_block: bool,
    pub issues_critical_approval: bool,
    pub output_schema_id: String,
    pub mandatory_context_fields: Vec<String>,
    pub desirable_context_fields: Vec<String>,
}

/// An agent's decision on a deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    ApproveWithConditions,
    RequestChanges,
    Reject,
}

/// Outcome of schema validation for a deliberation's structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Valid,
    Corrected,
    Invalid,
}

/// An immutable record of one agent's output for one phase of one project.
/// Re-running an agent appends a new record rather than overwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliberation {
    pub id: Uuid,
    pub project_id: ProjectId,
    pub phase: Phase,
    pub agent_id: AgentId,
    pub decision: Decision,
    pub structured_output: serde_json::Map<String, serde_json::Value>,
    pub risk_contribution: RiskBreakdown,
    pub requires_human_review: bool,
    pub created_at: DateTime<Utc>,
    pub validation_status: ValidationStatus,
    pub corrections_applied: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ordering_is_monotonic_by_declaration() {
        assert!(Phase::F0 < Phase::F2);
        assert!(Phase::F2 < Phase::F9);
    }

    #[test]
    fn hard_locks_are_exactly_f2_f6_f8() {
        let locks: Vec<Phase> = Phase::ALL.iter().copied().filter(|p| p.is_hard_lock()).collect();
        assert_eq!(locks, vec![Phase::F2, Phase::F6, Phase::F8]);
    }

    #[test]
    fn risk_breakdown_total_clamps_at_100() {
        let b = RiskBreakdown {
            business_reason: 25,
            economic_benefit: 25,
            materiality: 25,
            traceability: 25,
        };
        assert_eq!(b.total(), 100);
    }

    #[test]
    fn reopening_a_phase_clears_completion() {
        let mut project = Project {
            project_id: ProjectId("p1".into()),
            tenant_id: TenantId("t1".into()),
            name: "test".into(),
            typology: Typology::Consulting,
            amount: Decimal::new(1_000_000, 0),
            current_phase: Phase::F0,
            risk_score_total: 0,
            risk_breakdown: RiskBreakdown::default(),
            human_review_obtained: false,
            completed_phases: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        project.mark_phase_completed(Phase::F0);
        assert!(project.is_phase_completed(Phase::F0));
        project.mark_phase_reopened(Phase::F0);
        assert!(!project.is_phase_completed(Phase::F0));
    }
}
