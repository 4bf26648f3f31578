//! C9 — Defense File Store.
//!
//! An append-only, hash-chained journal of every deliberation, phase
//! transition and lock evaluation for a project, grounded on
//! `original_source/backend/routes/defense_files_routes.py`'s notion of a
//! tamper-evident audit trail (there backed by pCloud; here the storage
//! backend is abstracted away and only the chain discipline is kept).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{AgentId, Phase, ProjectId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("entry {index} breaks the hash chain: expected prev_hash {expected}, found {found}")]
    ChainBroken {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("entry {index} hash does not match its own content")]
    ContentTampered { index: usize },
    #[error("failed to canonicalize entry payload: {0}")]
    Canonicalization(#[from] serde_json::Error),
}

/// The `prev_hash` recorded on the first entry of every project's chain.
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// What kind of fact this ledger entry records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deliberation {
        agent_id: AgentId,
        phase: Phase,
        deliberation_id: uuid::Uuid,
    },
    PhaseTransition {
        from: Phase,
        to: Phase,
    },
    LockEvaluation {
        phase: Phase,
        released: bool,
        blockers: Vec<String>,
    },
    HumanReview {
        phase: Phase,
        reviewer: String,
        decision: String,
    },
}

/// One link in the chain. `entry_hash` covers `project_id`, `sequence`,
/// `recorded_at`, `event` and `prev_hash` — changing any of them, or the
/// order of entries, is detectable on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub project_id: ProjectId,
    pub sequence: usize,
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// In-memory, append-only hash chain for one project. Persistence is the
/// caller's responsibility (via `tc_runtime`'s `Persistence` trait); this
/// type only enforces chain discipline.
#[derive(Debug, Clone)]
pub struct DefenseFile {
    project_id: ProjectId,
    entries: Vec<LedgerEntry>,
}

impl DefenseFile {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            entries: Vec::new(),
        }
    }

    /// Rehydrate a chain previously read from storage, verifying it as we go.
    pub fn from_entries(
        project_id: ProjectId,
        entries: Vec<LedgerEntry>,
    ) -> Result<Self, LedgerError> {
        let file = Self {
            project_id,
            entries,
        };
        file.verify()?;
        Ok(file)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn head_hash(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.entry_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Append one event, computing its hash from the current chain head.
    pub fn append(
        &mut self,
        event: LedgerEvent,
        recorded_at: DateTime<Utc>,
    ) -> Result<&LedgerEntry, LedgerError> {
        let sequence = self.entries.len();
        let prev_hash = self.head_hash().to_string();
        let entry_hash = compute_entry_hash(&self.project_id, sequence, recorded_at, &event, &prev_hash)?;

        self.entries.push(LedgerEntry {
            project_id: self.project_id.clone(),
            sequence,
            recorded_at,
            event,
            prev_hash,
            entry_hash,
        });
        Ok(self.entries.last().unwrap())
    }

    /// Recompute every hash and confirm the chain has not been tampered
    /// with or reordered.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let mut expected_prev = GENESIS_HASH.to_string();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                return Err(LedgerError::ChainBroken {
                    index,
                    expected: expected_prev,
                    found: entry.prev_hash.clone(),
                });
            }
            let recomputed = compute_entry_hash(
                &entry.project_id,
                entry.sequence,
                entry.recorded_at,
                &entry.event,
                &entry.prev_hash,
            )?;
            if recomputed != entry.entry_hash {
                return Err(LedgerError::ContentTampered { index });
            }
            expected_prev = entry.entry_hash.clone();
        }
        Ok(())
    }
}

fn compute_entry_hash(
    project_id: &ProjectId,
    sequence: usize,
    recorded_at: DateTime<Utc>,
    event: &LedgerEvent,
    prev_hash: &str,
) -> Result<String, LedgerError> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        project_id: &'a str,
        sequence: usize,
        recorded_at: DateTime<Utc>,
        event: &'a LedgerEvent,
        prev_hash: &'a str,
    }

    // `serde_json` preserves struct field declaration order (not a sorted
    // map), which is sufficient for canonicalization here since the shape
    // is fixed rather than an arbitrary user-supplied map.
    let canonical = Canonical {
        project_id: &project_id.0,
        sequence,
        recorded_at,
        event,
        prev_hash,
    };
    let bytes = serde_json::to_vec(&canonical)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn pid() -> ProjectId {
        ProjectId("proj-1".to_string())
    }

    #[test]
    fn first_entry_chains_to_genesis() {
        let mut file = DefenseFile::new(pid());
        file.append(
            LedgerEvent::PhaseTransition {
                from: Phase::F0,
                to: Phase::F1,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(file.entries()[0].prev_hash, GENESIS_HASH);
    }

    #[test]
    fn verify_passes_on_untouched_chain() {
        let mut file = DefenseFile::new(pid());
        file.append(
            LedgerEvent::Deliberation {
                agent_id: AgentId::A3Fiscal,
                phase: Phase::F2,
                deliberation_id: Uuid::nil(),
            },
            Utc::now(),
        )
        .unwrap();
        file.append(
            LedgerEvent::LockEvaluation {
                phase: Phase::F2,
                released: true,
                blockers: vec![],
            },
            Utc::now(),
        )
        .unwrap();
        assert!(file.verify().is_ok());
    }

    #[test]
    fn tampering_with_an_entry_is_detected() {
        let mut file = DefenseFile::new(pid());
        file.append(
            LedgerEvent::PhaseTransition {
                from: Phase::F0,
                to: Phase::F1,
            },
            Utc::now(),
        )
        .unwrap();
        file.entries[0].event = LedgerEvent::PhaseTransition {
            from: Phase::F0,
            to: Phase::F9,
        };
        let err = file.verify().unwrap_err();
        assert!(matches!(err, LedgerError::ContentTampered { index: 0 }));
    }

    #[test]
    fn reordering_entries_breaks_the_chain() {
        let mut file = DefenseFile::new(pid());
        file.append(
            LedgerEvent::PhaseTransition {
                from: Phase::F0,
                to: Phase::F1,
            },
            Utc::now(),
        )
        .unwrap();
        file.append(
            LedgerEvent::PhaseTransition {
                from: Phase::F1,
                to: Phase::F2,
            },
            Utc::now(),
        )
        .unwrap();
        file.entries.swap(0, 1);
        assert!(matches!(
            file.verify().unwrap_err(),
            LedgerError::ChainBroken { index: 0, .. }
        ));
    }

    #[test]
    fn from_entries_rejects_broken_chain_on_load() {
        let mut file = DefenseFile::new(pid());
        file.append(
            LedgerEvent::PhaseTransition {
                from: Phase::F0,
                to: Phase::F1,
            },
            Utc::now(),
        )
        .unwrap();
        let mut entries = file.entries().to_vec();
        entries[0].prev_hash = "deadbeef".repeat(8);
        assert!(DefenseFile::from_entries(pid(), entries).is_err());
    }
}
