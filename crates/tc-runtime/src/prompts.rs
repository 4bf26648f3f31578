//! Prompt assembly for C4: system role + regulatory extract (by typology)
//! + phase checklist + serialized context + response-schema hint,
//! concatenated in that order.

use tc_governance::{AgentConfig, Phase, Typology};
use tc_synapse::AgentContext;

/// Short regulatory reminder selected by the project's typology. Not a
/// substitute for the real CFF/LISR text a production deployment would
/// inject here — a fixed placeholder per typology is enough to ground the
/// prompt shape.
pub fn regulatory_extract(typology: Typology) -> &'static str {
    match typology {
        Typology::Consulting => {
            "CFF Art. 69-B: la materialidad de servicios de consultoría exige evidencia de \
             entregables y razón de negocio distinta al ahorro fiscal."
        }
        Typology::IntragroupManagementFee => {
            "LISR Art. 179: cuotas de administración intragrupo requieren estudio de Precios \
             de Transferencia vigente y comparables arm's length."
        }
        Typology::SoftwareSaas => {
            "CFDI debe describir la licencia/suscripción específica; evitar conceptos genéricos."
        }
        Typology::Restructuring => {
            "Reestructuras corporativas elevan automáticamente la clase de revisión humana."
        }
        Typology::Marketing => "Evidencia de campaña y métricas de alcance sustentan materialidad.",
        Typology::TechnicalAssistance => {
            "Asistencia técnica requiere bitácora de horas y entregable técnico verificable."
        }
        Typology::Licensing => "Contrato de licencia debe especificar alcance territorial y vigencia.",
        Typology::Other => "Aplican los criterios generales de materialidad y razón de negocio.",
    }
}

/// One line per phase describing what must be true to consider it done.
pub fn phase_checklist(phase: Phase) -> &'static str {
    match phase {
        Phase::F0 => "F0: aprobación BEE (razón de negocio + beneficio económico).",
        Phase::F1 => "F1: SOW firmado y alcance acordado.",
        Phase::F2 => "F2: candado de inicio de ejecución (A1/A3/A5 + presupuesto).",
        Phase::F3 => "F3: ejecución en curso, monitoreo de entregables.",
        Phase::F4 => "F4: monitoreo continuo de avance.",
        Phase::F5 => "F5: aceptación técnica del entregable.",
        Phase::F6 => "F6: candado de factura (VBC fiscal/legal + 3-way match).",
        Phase::F7 => "F7: auditoría interna del expediente.",
        Phase::F8 => "F8: candado de pago (revisión humana + TP si aplica).",
        Phase::F9 => "F9: cierre del proyecto.",
    }
}

pub fn build_prompt(config: &AgentConfig, phase: Phase, typology: Typology, context: &AgentContext) -> String {
    let serialized_context =
        serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());

    format!(
        "ROLE: You are {agent_id}, a deliberation agent in a tax-compliance workflow.\n\
         REGULATORY EXTRACT: {extract}\n\
         PHASE CHECKLIST: {checklist}\n\
         CONTEXT: {context}\n\
         RESPONSE SCHEMA: respond with a single JSON object containing at least \
         `decision` (one of APPROVE, APPROVE_WITH_CONDITIONS, REQUEST_CHANGES, REJECT) \
         and `rationale` (string).",
        agent_id = config.agent_id,
        extract = regulatory_extract(typology),
        checklist = phase_checklist(phase),
        context = serialized_context,
    )
}
