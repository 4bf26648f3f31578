//! External interfaces: the seams the core depends on but does not
//! implement itself, expressed as `async_trait`s since each of these
//! genuinely talks to the outside world.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tc_governance::{DocId, Document, DocumentType, LedgerEntry, ProjectId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Timeouts and 5xx-equivalent upstream failures. Retryable.
    #[error("transient LLM failure: {0}")]
    Transient(String),
    /// Anything else (bad request, auth failure, content filtered). Not
    /// retried.
    #[error("permanent LLM failure: {0}")]
    Permanent(String),
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Consumed by C4. A single method; the core does not care which model is
/// behind it, only that the timeout and transient/permanent distinction in
/// [`LlmError`] is honored.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("append failed: {0}")]
    AppendFailed(String),
    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Consumed by C9. `append` durably records an already hash-chained entry
/// and confirms the head; `read` rehydrates a project's chain on restart.
/// Atomicity of `append` (journal entry, then head pointer, then fsync) is
/// the implementation's responsibility, not the trait's.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn append(
        &self,
        project_id: &ProjectId,
        entry: LedgerEntry,
    ) -> Result<String, PersistenceError>;

    async fn read(&self, project_id: &ProjectId) -> Result<Vec<LedgerEntry>, PersistenceError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub doc_type: Option<DocumentType>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DocumentStoreError {
    #[error("document {0} not found")]
    NotFound(DocId),
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Consumed by C3 (to list evidence) and C6 (three-way match, invoice
/// description checks read document metadata upstream of `LockContext`).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(
        &self,
        project_id: &ProjectId,
        filter: DocumentFilter,
    ) -> Result<Vec<Document>, DocumentStoreError>;

    async fn get_content(&self, doc_id: &DocId) -> Result<Vec<u8>, DocumentStoreError>;
}
