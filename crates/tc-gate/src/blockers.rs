//! Blocker-to-action mapping table.
//!
//! Grounded on `original_source/backend/middleware/candados_middleware.py`'s
//! `obtener_acciones_para_bloqueos`: each blocker string returned by
//! [`crate::evaluator::evaluate_lock`] is matched, in order, against a table
//! of regexes and turned into a human actionable next step. First match
//! wins, mirroring the original's `if/elif` chain.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

struct Rule {
    pattern: Lazy<Regex>,
    action: &'static str,
}

macro_rules! rule {
    ($pattern:literal, $action:literal) => {
        Rule {
            pattern: Lazy::new(|| Regex::new($pattern).unwrap()),
            action: $action,
        }
    };
}

static RULES: &[Rule] = &[
    rule!(r"(?i)f0.*completada", "Completar fase F0 (Aprobación BEE)"),
    rule!(r"(?i)f1.*completada", "Completar fase F1 (SOW)"),
    rule!(r"(?i)f5.*completada", "Completar fase F5 (Aceptación técnica)"),
    rule!(r"(?i)f6.*completada", "Completar fase F6 (VBC)"),
    rule!(r"(?i)f7.*completada", "Completar fase F7 (Auditoría interna)"),
    rule!(r"(?i)presupuesto", "Confirmar presupuesto del proyecto con Finanzas (A5)"),
    rule!(r"(?i)revisión humana", "Obtener aprobación de revisión humana"),
    rule!(r"(?i)materialidad", "Completar matriz de materialidad al 80% mínimo"),
    rule!(
        r"(?i)vbc fiscal",
        "Obtener VBC (Visto Bueno de Cumplimiento) de Fiscal (A3)"
    ),
    rule!(
        r"(?i)vbc legal",
        "Obtener VBC (Visto Bueno de Cumplimiento) de Legal (A4)"
    ),
    rule!(
        r"(?i)cfdi.*genéric",
        "Asegurar que el CFDI tenga descripción específica del servicio"
    ),
    rule!(r"(?i)cfdi", "Cargar CFDI del proveedor"),
    rule!(
        r"(?i)3-way|match",
        "Verificar que diferencia de 3-way match sea menor a 5%"
    ),
    rule!(
        r"(?i)\btp\b|transferencia",
        "Agregar estudio de Precios de Transferencia vigente"
    ),
    rule!(r"(?i)a1.*sponsor", "Obtener aprobación de A1-Sponsor"),
    rule!(r"(?i)a3.*fiscal", "Obtener aprobación de A3-Fiscal"),
    rule!(r"(?i)a4.*legal", "Obtener aprobación de A4-Legal"),
    rule!(r"(?i)a5.*finanzas", "Obtener validación de A5-Finanzas"),
];

/// Maps each blocker to its suggested remediation action, deduplicating
/// repeated actions while preserving first-seen order.
pub fn actions_for_blockers(blockers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut actions = Vec::new();

    for blocker in blockers {
        let action = RULES
            .iter()
            .find(|r| r.pattern.is_match(blocker))
            .map(|r| r.action.to_string())
            .unwrap_or_else(|| format!("Resolver: {blocker}"));

        if seen.insert(action.clone()) {
            actions.push(action);
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_blocker_maps_to_sponsor_action() {
        let actions = actions_for_blockers(&["Falta aprobación de A1-Sponsor".to_string()]);
        assert_eq!(actions, vec!["Obtener aprobación de A1-Sponsor"]);
    }

    #[test]
    fn three_way_match_blocker_maps_correctly() {
        let actions =
            actions_for_blockers(&["3-way match excede tolerancia de 5%".to_string()]);
        assert_eq!(
            actions,
            vec!["Verificar que diferencia de 3-way match sea menor a 5%"]
        );
    }

    #[test]
    fn unrecognized_blocker_falls_back_to_generic_resolve() {
        let actions = actions_for_blockers(&["algo inesperado".to_string()]);
        assert_eq!(actions, vec!["Resolver: algo inesperado"]);
    }

    #[test]
    fn duplicate_actions_are_deduplicated() {
        let actions = actions_for_blockers(&[
            "F0 no completada".to_string(),
            "F0 aún no completada por sponsor".to_string(),
        ]);
        assert_eq!(actions.len(), 1);
    }
}
