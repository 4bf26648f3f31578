//! C1 — Scoring Engine.
//!
//! Computes the 12-criteria risk score from four weighted pillars and maps
//! score + flags to a human-review class. Pure, deterministic, no I/O.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::{RelationshipType, RiskBreakdown, Typology};

/// Amount threshold above which human review is mandatory regardless of
/// score.
pub const AMOUNT_HUMAN_REVIEW_THRESHOLD: Decimal = dec!(5_000_000);
/// Risk-score threshold above which human review is mandatory.
pub const RISK_SCORE_HUMAN_REVIEW_THRESHOLD: u8 = 60;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScoringError {
    #[error("evaluation field '{field}' has value {value}, which is outside the allowed set {allowed:?}")]
    InvalidEvaluation {
        field: &'static str,
        value: i32,
        allowed: &'static [i32],
    },
}

macro_rules! check_allowed {
    ($field:expr, $value:expr, $allowed:expr) => {
        if !$allowed.contains(&$value) {
            return Err(ScoringError::InvalidEvaluation {
                field: $field,
                value: $value,
                allowed: $allowed,
            });
        }
    };
}

/// Raw sub-criteria scores for the `business_reason` pillar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusinessReasonInput {
    pub link_to_core_activity: i32,
    pub economic_objective: i32,
    pub amount_coherence: i32,
}

/// Raw sub-criteria scores for the `economic_benefit` pillar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EconomicBenefitInput {
    pub benefit_identification: i32,
    pub roi_model: i32,
    pub time_horizon: i32,
}

/// Raw sub-criteria scores for the `materiality` pillar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaterialityInput {
    pub formalization: i32,
    pub execution_evidence: i32,
    pub document_coherence: i32,
}

/// Raw sub-criteria scores for the `traceability` pillar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraceabilityInput {
    pub preservation: i32,
    pub integrity: i32,
    pub timeline: i32,
}

/// The complete 12-criteria evaluation submitted for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub business_reason: BusinessReasonInput,
    pub economic_benefit: EconomicBenefitInput,
    pub materiality: MaterialityInput,
    pub traceability: TraceabilityInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HumanReviewClass {
    Automated,
    Discretionary,
    Mandatory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub risk_score_total: u8,
    pub risk_score_per_pillar: RiskBreakdown,
    pub level: RiskLevel,
    pub human_review_required: bool,
    pub human_review_class: HumanReviewClass,
}

/// Parameters that, alongside the raw score, decide `human_review_required`.
#[derive(Debug, Clone, Copy)]
pub struct HumanReviewContext {
    pub amount: Decimal,
    pub typology: Typology,
    pub efos_flag: bool,
    pub relationship_type: RelationshipType,
}

#[derive(Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score a 12-criteria evaluation. Fails closed on any sub-score outside
    /// its allowed discrete set rather than silently rounding.
    pub fn score(
        &self,
        input: &EvaluationInput,
        review_ctx: HumanReviewContext,
    ) -> Result<ScoreResult, ScoringError> {
        check_allowed!(
            "business_reason.link_to_core_activity",
            input.business_reason.link_to_core_activity,
            &[0, 3, 5, 10]
        );
        check_allowed!(
            "business_reason.economic_objective",
            input.business_reason.economic_objective,
            &[0, 5, 10]
        );
        check_allowed!(
            "business_reason.amount_coherence",
            input.business_reason.amount_coherence,
            &[0, 3, 5, 10]
        );
        check_allowed!(
            "economic_benefit.benefit_identification",
            input.economic_benefit.benefit_identification,
            &[0, 5, 10]
        );
        check_allowed!(
            "economic_benefit.roi_model",
            input.economic_benefit.roi_model,
            &[0, 5, 10]
        );
        check_allowed!(
            "economic_benefit.time_horizon",
            input.economic_benefit.time_horizon,
            &[0, 3, 5]
        );
        check_allowed!(
            "materiality.formalization",
            input.materiality.formalization,
            &[0, 3, 5]
        );
        check_allowed!(
            "materiality.execution_evidence",
            input.materiality.execution_evidence,
            &[0, 5, 10]
        );
        check_allowed!(
            "materiality.document_coherence",
            input.materiality.document_coherence,
            &[0, 5, 10]
        );
        check_allowed!(
            "traceability.preservation",
            input.traceability.preservation,
            &[0, 5, 10]
        );
        check_allowed!(
            "traceability.integrity",
            input.traceability.integrity,
            &[0, 5, 10]
        );
        check_allowed!(
            "traceability.timeline",
            input.traceability.timeline,
            &[0, 3, 4, 5]
        );

        let business_reason = clamp_pillar(
            input.business_reason.link_to_core_activity
                + input.business_reason.economic_objective
                + input.business_reason.amount_coherence,
        );
        let economic_benefit = clamp_pillar(
            input.economic_benefit.benefit_identification
                + input.economic_benefit.roi_model
                + input.economic_benefit.time_horizon,
        );
        let materiality = clamp_pillar(
            input.materiality.formalization
                + input.materiality.execution_evidence
                + input.materiality.document_coherence,
        );
        let traceability = clamp_pillar(
            input.traceability.preservation
                + input.traceability.integrity
                + input.traceability.timeline,
        );

        let per_pillar = RiskBreakdown {
            business_reason,
            economic_benefit,
            materiality,
            traceability,
        };
        let total = per_pillar.total();

        let level = match total {
            0..=39 => RiskLevel::Low,
            40..=59 => RiskLevel::Medium,
            60..=79 => RiskLevel::High,
            _ => RiskLevel::Critical,
        };

        let human_review_required = review_ctx.amount > AMOUNT_HUMAN_REVIEW_THRESHOLD
            || total >= RISK_SCORE_HUMAN_REVIEW_THRESHOLD
            || matches!(
                review_ctx.typology,
                Typology::IntragroupManagementFee | Typology::Restructuring
            )
            || review_ctx.efos_flag
            || review_ctx.relationship_type.is_related_party();

        let human_review_class = match total {
            0..=39 => HumanReviewClass::Automated,
            40..=59 => HumanReviewClass::Discretionary,
            _ => HumanReviewClass::Mandatory,
        };

        Ok(ScoreResult {
            risk_score_total: total,
            risk_score_per_pillar: per_pillar,
            level,
            human_review_required,
            human_review_class,
        })
    }
}

fn clamp_pillar(raw: i32) -> u8 {
    raw.clamp(0, 25) as u8
}

// ---------------------------------------------------------------------------
// Supplier risk sub-scorer, grounded on the supplier-evaluation shape of
// the upstream Python scoring service this was ported from.
// ---------------------------------------------------------------------------

/// Inputs mirroring the original A6 supplier-risk criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupplierEvaluation {
    pub has_rfc: bool,
    pub has_legal_representative: bool,
    pub has_verified_fiscal_address: bool,
    pub has_corporate_purpose_on_file: bool,
    pub has_verifiable_website: bool,
    pub has_operating_address: bool,
    pub capital_social_over_100k: bool,
    pub years_since_incorporation: u32,
    pub has_positive_32d_opinion: bool,
    pub has_verified_csf: bool,
    pub has_verified_repse: bool,
    pub on_69b_definitive_list: bool,
    pub on_69b_presumed_list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplierRiskLevel {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierScoreResult {
    pub total: u8,
    pub level: SupplierRiskLevel,
    pub critical_flags: Vec<&'static str>,
}

impl ScoringEngine {
    pub fn score_supplier(&self, s: &SupplierEvaluation) -> SupplierScoreResult {
        let mut legal = 0i32;
        if s.has_rfc {
            legal += 5;
        }
        if s.has_legal_representative {
            legal += 4;
        }
        if s.has_verified_fiscal_address {
            legal += 4;
        }
        if s.has_corporate_purpose_on_file {
            legal += 4;
        }
        legal += 3; // razon_social is assumed present whenever an RFC exists
        let legal = legal.clamp(0, 20);

        let mut material = 0i32;
        if s.has_verifiable_website {
            material += 8;
        }
        if s.has_operating_address {
            material += 7;
        }
        if s.capital_social_over_100k {
            material += 10;
        }
        material += match s.years_since_incorporation {
            0 => 0,
            1 => 5,
            _ => 10,
        };
        let material = material.clamp(0, 35);

        let mut fiscal = if s.on_69b_definitive_list {
            -35
        } else if s.on_69b_presumed_list {
            0
        } else {
            15
        };
        if s.has_positive_32d_opinion {
            fiscal += 10;
        }
        if s.has_verified_csf {
            fiscal += 5;
        }
        if s.has_verified_repse {
            fiscal += 5;
        }
        let fiscal = fiscal.clamp(0, 35);

        let history = if s.has_verifiable_website { 10 } else { 0 };

        let total = (legal + material + fiscal + history).clamp(0, 100) as u8;

        let level = match total {
            80..=100 => SupplierRiskLevel::Low,
            70..=79 => SupplierRiskLevel::MediumLow,
            60..=69 => SupplierRiskLevel::Medium,
            50..=59 => SupplierRiskLevel::MediumHigh,
            40..=49 => SupplierRiskLevel::High,
            _ => SupplierRiskLevel::Critical,
        };

        let mut critical_flags = Vec::new();
        if s.on_69b_definitive_list {
            critical_flags.push("DEFINITIVO_EFOS_69B");
        }
        if !s.has_rfc {
            critical_flags.push("SIN_RFC_ACTIVO");
        }

        SupplierScoreResult {
            total,
            level,
            critical_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> HumanReviewContext {
        HumanReviewContext {
            amount: dec!(1_500_000),
            typology: Typology::Consulting,
            efos_flag: false,
            relationship_type: RelationshipType::IndependentThird,
        }
    }

    #[test]
    fn low_risk_approve_path_scenario_1() {
        // amount=1_500_000, typology=CONSULTING, scores {3,5,5, 5,5,3, 3,10,5, 5,5,3} => total 57
        let input = EvaluationInput {
            business_reason: BusinessReasonInput {
                link_to_core_activity: 3,
                economic_objective: 5,
                amount_coherence: 5,
            },
            economic_benefit: EconomicBenefitInput {
                benefit_identification: 5,
                roi_model: 5,
                time_horizon: 3,
            },
            materiality: MaterialityInput {
                formalization: 3,
                execution_evidence: 10,
                document_coherence: 5,
            },
            traceability: TraceabilityInput {
                preservation: 5,
                integrity: 5,
                timeline: 3,
            },
        };
        let result = ScoringEngine::new().score(&input, ctx()).unwrap();
        assert_eq!(result.risk_score_total, 57);
        assert_eq!(result.level, RiskLevel::Medium);
        assert!(!result.human_review_required);
        assert_eq!(result.human_review_class, HumanReviewClass::Discretionary);
    }

    #[test]
    fn high_risk_block_scenario_2() {
        let input = EvaluationInput {
            business_reason: BusinessReasonInput {
                link_to_core_activity: 10,
                economic_objective: 10,
                amount_coherence: 10,
            },
            economic_benefit: EconomicBenefitInput {
                benefit_identification: 10,
                roi_model: 10,
                time_horizon: 5,
            },
            materiality: MaterialityInput {
                formalization: 5,
                execution_evidence: 10,
                document_coherence: 10,
            },
            traceability: TraceabilityInput {
                preservation: 10,
                integrity: 10,
                timeline: 5,
            },
        };
        let ctx = HumanReviewContext {
            amount: dec!(8_000_000),
            typology: Typology::IntragroupManagementFee,
            efos_flag: false,
            relationship_type: RelationshipType::IndependentThird,
        };
        let result = ScoringEngine::new().score(&input, ctx).unwrap();
        assert!(result.human_review_required);
    }

    #[test]
    fn rejects_subscore_outside_allowed_set() {
        let input = EvaluationInput {
            business_reason: BusinessReasonInput {
                link_to_core_activity: 7, // not in {0,3,5,10}
                economic_objective: 5,
                amount_coherence: 5,
            },
            economic_benefit: EconomicBenefitInput {
                benefit_identification: 5,
                roi_model: 5,
                time_horizon: 3,
            },
            materiality: MaterialityInput {
                formalization: 3,
                execution_evidence: 10,
                document_coherence: 5,
            },
            traceability: TraceabilityInput {
                preservation: 5,
                integrity: 5,
                timeline: 3,
            },
        };
        let err = ScoringEngine::new().score(&input, ctx()).unwrap_err();
        match err {
            ScoringError::InvalidEvaluation { field, .. } => {
                assert_eq!(field, "business_reason.link_to_core_activity");
            }
        }
    }

    #[test]
    fn pillar_clamps_at_25_even_if_sum_exceeds() {
        let input = EvaluationInput {
            business_reason: BusinessReasonInput {
                link_to_core_activity: 10,
                economic_objective: 10,
                amount_coherence: 10,
            },
            economic_benefit: EconomicBenefitInput {
                benefit_identification: 0,
                roi_model: 0,
                time_horizon: 0,
            },
            materiality: MaterialityInput {
                formalization: 0,
                execution_evidence: 0,
                document_coherence: 0,
            },
            traceability: TraceabilityInput {
                preservation: 0,
                integrity: 0,
                timeline: 0,
            },
        };
        let result = ScoringEngine::new().score(&input, ctx()).unwrap();
        assert_eq!(result.risk_score_per_pillar.business_reason, 25);
        assert_eq!(result.risk_score_total, 25);
    }

    #[test]
    fn human_review_class_thresholds() {
        assert_eq!(level_for(39), RiskLevel::Low);
        assert_eq!(level_for(40), RiskLevel::Medium);
        assert_eq!(level_for(59), RiskLevel::Medium);
        assert_eq!(level_for(60), RiskLevel::High);
        assert_eq!(level_for(80), RiskLevel::Critical);
    }

    fn level_for(total: u8) -> RiskLevel {
        match total {
            0..=39 => RiskLevel::Low,
            40..=59 => RiskLevel::Medium,
            60..=79 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    #[test]
    fn supplier_definitive_efos_flag_is_critical() {
        let engine = ScoringEngine::new();
        let eval = SupplierEvaluation {
            on_69b_definitive_list: true,
            has_rfc: true,
            ..Default::default()
        };
        let result = engine.score_supplier(&eval);
        assert!(result.critical_flags.contains(&"DEFINITIVO_EFOS_69B"));
    }
}
