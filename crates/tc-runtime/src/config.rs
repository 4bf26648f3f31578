//! `EngineConfig`: env-var configuration. Parses from the environment with
//! a documented default, logs what was picked, and never fails startup
//! over a missing or malformed var.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tunable engine parameters, each with a documented default.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub agent_timeout: Duration,
    pub phase_timeout: Duration,
    pub amount_human_review_threshold: Decimal,
    pub risk_score_human_review_threshold: u8,
    pub materiality_min_percent: u8,
    pub three_way_match_tolerance: Decimal,
    pub review_iteration_cap: u32,
    pub stream_keepalive: Duration,
    pub stream_session_idle_gc: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(60),
            phase_timeout: Duration::from_secs(180),
            amount_human_review_threshold: dec!(5_000_000),
            risk_score_human_review_threshold: 60,
            materiality_min_percent: 80,
            three_way_match_tolerance: dec!(0.05),
            review_iteration_cap: 2,
            stream_keepalive: Duration::from_secs(15),
            stream_session_idle_gc: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    /// Read every option from the environment, falling back to the
    /// defaults and logging which source won. Never panics on a malformed
    /// value — it's logged and the default is kept.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            agent_timeout: env_secs("AGENT_TIMEOUT_SECONDS", defaults.agent_timeout),
            phase_timeout: env_secs("PHASE_TIMEOUT_SECONDS", defaults.phase_timeout),
            amount_human_review_threshold: env_decimal(
                "AMOUNT_HUMAN_REVIEW_THRESHOLD",
                defaults.amount_human_review_threshold,
            ),
            risk_score_human_review_threshold: env_u8(
                "RISK_SCORE_HUMAN_REVIEW_THRESHOLD",
                defaults.risk_score_human_review_threshold,
            ),
            materiality_min_percent: env_u8(
                "MATERIALITY_MIN_PERCENT",
                defaults.materiality_min_percent,
            ),
            three_way_match_tolerance: env_decimal(
                "THREE_WAY_MATCH_TOLERANCE",
                defaults.three_way_match_tolerance,
            ),
            review_iteration_cap: env_u32("REVIEW_ITERATION_CAP", defaults.review_iteration_cap),
            stream_keepalive: env_secs("STREAM_KEEPALIVE_SECONDS", defaults.stream_keepalive),
            stream_session_idle_gc: env_secs(
                "STREAM_SESSION_IDLE_GC_SECONDS",
                defaults.stream_session_idle_gc,
            ),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(name, raw, "malformed duration env var, keeping default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u8(name: &str, default: u8) -> u8 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(name: &str, default: Decimal) -> Decimal {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
