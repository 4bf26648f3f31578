//! Tax-compliance domain model, risk scoring, output validation and the
//! hash-chained defense file store.
//!
//! # Structure
//!
//! - `model`: shared types — projects, suppliers, documents, agents.
//! - `rfc`: Mexican RFC validation and CFDI UUID extraction.
//! - `scoring`: the 12-criteria risk Scoring Engine (C1).
//! - `validator`: per-agent structured-output validation (C2).
//! - `ledger`: the hash-chained Defense File Store (C9).

pub mod ledger;
pub mod model;
pub mod rfc;
pub mod scoring;
pub mod validator;

pub use ledger::{DefenseFile, LedgerEntry, LedgerError, LedgerEvent};
pub use model::{
    AgentConfig, AgentId, Decision, Deliberation, DocId, Document, DocumentType, EfosStatus,
    Phase, Project, ProjectId, RelationshipType, RiskBreakdown, Supplier, TenantId, Typology,
    ValidationStatus,
};
pub use rfc::{extract_cfdi_uuids, Rfc, RfcError};
pub use scoring::{
    EvaluationInput, HumanReviewClass, HumanReviewContext, RiskLevel, ScoreResult, ScoringEngine,
    ScoringError, SupplierEvaluation, SupplierRiskLevel, SupplierScoreResult,
};
pub use validator::{FieldSpec, FieldType, OutcomeStatus, OutputValidator, Schema, ValidationError, ValidationOutcome};
