//! C6 — Lock Evaluator.
//!
//! `evaluate_lock` is a pure function: given a project, the phase being
//! advanced to, and a [`LockContext`] snapshot of everything the predicate
//! needs, it returns whether the lock releases and, if not, why. It never
//! reads deliberations, documents or suppliers itself — callers (the
//! orchestrator) assemble `LockContext` from those sources.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tc_governance::{Phase, Project, Typology};

/// Precomputed facts the three hard locks predicate on. Assembling this from
/// raw deliberations/documents is the orchestrator's job, not the
/// evaluator's — keeping `evaluate_lock` pure and trivially testable.
#[derive(Debug, Clone, Default)]
pub struct LockContext {
    // F2 — may-start-execution
    pub a1_sponsor_approved: bool,
    pub a3_fiscal_approved: bool,
    pub a5_finance_budget_confirmed: bool,
    pub has_unresolved_critical_flag: bool,

    // F6 — may-accept-invoice
    pub materiality_completeness_pct: u8,
    pub vbc_fiscal_issued: bool,
    pub vbc_legal_issued: bool,
    pub invoice_description_specific: bool,
    pub three_way_match_delta_pct: Decimal,

    // F8 — may-release-payment
    pub a5_finance_approved: bool,
    pub transfer_pricing_study_on_file: bool,
    /// C1's `human_review_required` verdict (amount, typology, EFOS flag,
    /// related-party, or score ≥ 60 — whatever C1 decided), not re-derived
    /// from `risk_score_total` here.
    pub human_review_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockResult {
    pub released: bool,
    pub blockers: Vec<String>,
}

impl LockResult {
    fn released() -> Self {
        Self {
            released: true,
            blockers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    #[error("phase {0} is not a hard lock (must be F2, F6 or F8)")]
    NotAHardLock(Phase),
}

/// Evaluate whether `project` may advance into `phase`. `phase` must be one
/// of F2, F6, F8 — any other value is a caller error.
pub fn evaluate_lock(
    project: &Project,
    phase: Phase,
    ctx: &LockContext,
) -> Result<LockResult, GateError> {
    match phase {
        Phase::F2 => Ok(evaluate_f2(project, ctx)),
        Phase::F6 => Ok(evaluate_f6(project, ctx)),
        Phase::F8 => Ok(evaluate_f8(project, ctx)),
        other => Err(GateError::NotAHardLock(other)),
    }
}

fn evaluate_f2(project: &Project, ctx: &LockContext) -> LockResult {
    let mut blockers = Vec::new();

    if !project.is_phase_completed(Phase::F0) {
        blockers.push("F0 no completada".to_string());
    }
    if !project.is_phase_completed(Phase::F1) {
        blockers.push("F1 no completada".to_string());
    }
    if !ctx.a1_sponsor_approved {
        blockers.push("Falta aprobación de A1-Sponsor".to_string());
    }
    if !ctx.a3_fiscal_approved {
        blockers.push("Falta aprobación de A3-Fiscal".to_string());
    }
    if !ctx.a5_finance_budget_confirmed {
        blockers.push("Presupuesto del proyecto sin confirmar por A5-Finanzas".to_string());
    }
    if ctx.has_unresolved_critical_flag {
        blockers.push("Proyecto tiene un indicador crítico sin resolver".to_string());
    }

    if blockers.is_empty() {
        LockResult::released()
    } else {
        LockResult {
            released: false,
            blockers,
        }
    }
}

fn evaluate_f6(project: &Project, ctx: &LockContext) -> LockResult {
    let mut blockers = Vec::new();

    if !project.is_phase_completed(Phase::F5) {
        blockers.push("F5 no completada".to_string());
    }
    if ctx.materiality_completeness_pct < 80 {
        blockers.push(format!(
            "Matriz de materialidad al {}%, se requiere 80% mínimo",
            ctx.materiality_completeness_pct
        ));
    }
    if !ctx.vbc_fiscal_issued {
        blockers.push("VBC Fiscal (A3) pendiente".to_string());
    }
    if !ctx.vbc_legal_issued {
        blockers.push("VBC Legal (A4) pendiente".to_string());
    }
    if !ctx.invoice_description_specific {
        blockers.push("CFDI con descripción genérica".to_string());
    }
    if ctx.three_way_match_delta_pct.abs() > Decimal::new(5, 0) {
        blockers.push(format!(
            "3-way match excede tolerancia de 5% (delta {}%)",
            ctx.three_way_match_delta_pct
        ));
    }

    if blockers.is_empty() {
        LockResult::released()
    } else {
        LockResult {
            released: false,
            blockers,
        }
    }
}

fn evaluate_f8(project: &Project, ctx: &LockContext) -> LockResult {
    let mut blockers = Vec::new();

    if !project.is_phase_completed(Phase::F6) {
        blockers.push("F6 no completada".to_string());
    }
    if !project.is_phase_completed(Phase::F7) {
        blockers.push("F7 no completada".to_string());
    }
    if !ctx.a5_finance_approved {
        blockers.push("Falta validación de A5-Finanzas".to_string());
    }
    if ctx.human_review_required && !project.human_review_obtained {
        blockers.push("Revisión humana pendiente".to_string());
    }
    if project.typology == Typology::IntragroupManagementFee && !ctx.transfer_pricing_study_on_file
    {
        blockers.push("Estudio de Precios de Transferencia faltante".to_string());
    }

    if blockers.is_empty() {
        LockResult::released()
    } else {
        LockResult {
            released: false,
            blockers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use tc_governance::{ProjectId, RiskBreakdown, TenantId};

    fn base_project() -> Project {
        Project {
            project_id: ProjectId("p1".into()),
            tenant_id: TenantId("t1".into()),
            name: "test".into(),
            typology: Typology::Consulting,
            amount: dec!(1_000_000),
            current_phase: Phase::F2,
            risk_score_total: 30,
            risk_breakdown: RiskBreakdown::default(),
            human_review_obtained: false,
            completed_phases: BTreeSet::from([Phase::F0, Phase::F1]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn f2_releases_when_all_predicates_hold() {
        let project = base_project();
        let ctx = LockContext {
            a1_sponsor_approved: true,
            a3_fiscal_approved: true,
            a5_finance_budget_confirmed: true,
            ..Default::default()
        };
        let result = evaluate_lock(&project, Phase::F2, &ctx).unwrap();
        assert!(result.released);
        assert!(result.blockers.is_empty());
    }

    #[test]
    fn f2_blocks_without_a1_sponsor_approval() {
        let project = base_project();
        let ctx = LockContext {
            a3_fiscal_approved: true,
            a5_finance_budget_confirmed: true,
            ..Default::default()
        };
        let result = evaluate_lock(&project, Phase::F2, &ctx).unwrap();
        assert!(!result.released);
        assert!(result.blockers.iter().any(|b| b.contains("A1")));
    }

    #[test]
    fn f6_blocks_on_three_way_match_over_tolerance() {
        let mut project = base_project();
        project
            .completed_phases
            .insert(Phase::F5);
        let ctx = LockContext {
            materiality_completeness_pct: 90,
            vbc_fiscal_issued: true,
            vbc_legal_issued: true,
            invoice_description_specific: true,
            three_way_match_delta_pct: dec!(7),
            ..Default::default()
        };
        let result = evaluate_lock(&project, Phase::F6, &ctx).unwrap();
        assert!(!result.released);
        assert!(result
            .blockers
            .iter()
            .any(|b| b.contains("3-way") || b.contains("match")));
    }

    #[test]
    fn f8_requires_transfer_pricing_study_for_intragroup_fee() {
        let mut project = base_project();
        project.typology = Typology::IntragroupManagementFee;
        project.completed_phases = BTreeSet::from([
            Phase::F0,
            Phase::F1,
            Phase::F2,
            Phase::F3,
            Phase::F4,
            Phase::F5,
            Phase::F6,
            Phase::F7,
        ]);
        let ctx = LockContext {
            a5_finance_approved: true,
            transfer_pricing_study_on_file: false,
            ..Default::default()
        };
        let result = evaluate_lock(&project, Phase::F8, &ctx).unwrap();
        assert!(!result.released);
        assert!(result
            .blockers
            .iter()
            .any(|b| b.contains("Precios de Transferencia")));
    }

    #[test]
    fn f8_blocks_on_human_review_required_even_with_low_score() {
        let mut project = base_project();
        project.risk_score_total = 30;
        project.completed_phases = BTreeSet::from([
            Phase::F0,
            Phase::F1,
            Phase::F2,
            Phase::F3,
            Phase::F4,
            Phase::F5,
            Phase::F6,
            Phase::F7,
        ]);
        let ctx = LockContext {
            a5_finance_approved: true,
            human_review_required: true,
            ..Default::default()
        };
        let result = evaluate_lock(&project, Phase::F8, &ctx).unwrap();
        assert!(!result.released);
        assert!(result.blockers.iter().any(|b| b.contains("Revisión humana")));
    }

    #[test]
    fn non_hard_lock_phase_is_rejected() {
        let project = base_project();
        let err = evaluate_lock(&project, Phase::F3, &LockContext::default()).unwrap_err();
        assert!(matches!(err, GateError::NotAHardLock(Phase::F3)));
    }
}
