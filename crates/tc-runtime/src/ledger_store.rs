//! Per-project defense-file management: holds each project's in-memory
//! `DefenseFile` behind a single mutex, serializing state-machine
//! transitions and defense-file appends, and mirrors every append to the
//! injected [`Persistence`] backend.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use tc_governance::{DefenseFile, LedgerEntry, LedgerEvent, ProjectId};

use crate::error::EngineError;
use crate::traits::Persistence;

pub struct ProjectLedgers {
    files: Mutex<HashMap<ProjectId, DefenseFile>>,
    persistence: Arc<dyn Persistence>,
}

impl ProjectLedgers {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            persistence,
        }
    }

    /// Append `event` to `project_id`'s chain, in memory and in the
    /// persistence backend. On storage failure the in-memory entry is
    /// rolled back so the chain head does not advance past what is durable.
    pub async fn append(
        &self,
        project_id: &ProjectId,
        event: LedgerEvent,
    ) -> Result<LedgerEntry, EngineError> {
        let mut files = self.files.lock().await;
        let file = files
            .entry(project_id.clone())
            .or_insert_with(|| DefenseFile::new(project_id.clone()));

        let entry = file
            .append(event, Utc::now())
            .map_err(|e| EngineError::StorageFailure(e.to_string()))?
            .clone();

        if let Err(e) = self.persistence.append(project_id, entry.clone()).await {
            // Storage failed after the in-memory append already happened;
            // rebuild the in-memory file from its own entries minus the
            // one we couldn't persist so the head stays consistent.
            let mut rebuilt = file.entries().to_vec();
            rebuilt.pop();
            *file = DefenseFile::from_entries(project_id.clone(), rebuilt)
                .map_err(|e| EngineError::StorageFailure(e.to_string()))?;
            return Err(EngineError::StorageFailure(e.to_string()));
        }

        Ok(entry)
    }

    pub async fn entries(&self, project_id: &ProjectId) -> Vec<LedgerEntry> {
        let files = self.files.lock().await;
        files
            .get(project_id)
            .map(|f| f.entries().to_vec())
            .unwrap_or_default()
    }
}
