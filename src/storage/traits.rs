//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{DocumentStatus, TaskKind, TaskStatus};
use crate::storage::{
    DocumentRecord, LinkRecord, NewDocument, SummaryRecord, TaskRecord, Transition,
};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every method is a single atomic operation against the store. Coordination
/// between concurrently running crawl units relies on that atomicity alone,
/// so implementations must be shareable across tasks.
pub trait Storage: Send + Sync {
    // ===== Documents =====

    /// Inserts a document unless one with the same URL already exists
    ///
    /// # Returns
    ///
    /// The stored document and `true` if this call created it. When the URL
    /// was already present the existing row is returned unchanged with `false`.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if `parent_id` is set and the depth is not the
    /// parent's depth plus one, or the parent does not exist.
    fn upsert_document_if_absent(
        &self,
        document: &NewDocument<'_>,
    ) -> StorageResult<(DocumentRecord, bool)>;

    /// Gets a document by ID
    fn get_document(&self, id: i64) -> StorageResult<Option<DocumentRecord>>;

    /// Gets a document by normalized URL
    fn get_document_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Moves a document to `to` if its current status is one of `from`
    ///
    /// `error` replaces the recorded error message (`None` clears it).
    fn transition_status(
        &self,
        id: i64,
        from: &[DocumentStatus],
        to: DocumentStatus,
        error: Option<&str>,
    ) -> StorageResult<Transition>;

    /// Writes fetched content and moves the document from processing to completed
    fn complete_document(&self, id: i64, title: &str, content: &str)
        -> StorageResult<Transition>;

    /// Records an error on a document without changing its status
    fn record_document_error(&self, id: i64, error: &str) -> StorageResult<()>;

    /// Gets all documents in a specific status
    fn get_documents_by_status(&self, status: DocumentStatus)
        -> StorageResult<Vec<DocumentRecord>>;

    /// Gets the direct children of a document, oldest first
    fn get_children(&self, parent_id: i64) -> StorageResult<Vec<DocumentRecord>>;

    /// Marks every processing document in the subtree rooted at `root_id` as failed
    ///
    /// Returns the number of documents updated.
    fn fail_processing_in_tree(&self, root_id: i64, error: &str) -> StorageResult<u64>;

    /// Marks every processing document as failed (crash recovery)
    fn fail_interrupted(&self, error: &str) -> StorageResult<u64>;

    // ===== Summaries =====

    /// Inserts a summary unless the document already has one
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if the document is not `completed`.
    fn insert_summary_if_absent(
        &self,
        document_id: i64,
        text: &str,
        model_used: &str,
    ) -> StorageResult<(SummaryRecord, bool)>;

    /// Gets the summary of a document
    fn get_summary(&self, document_id: i64) -> StorageResult<Option<SummaryRecord>>;

    // ===== Links =====

    /// Records a link seen on a document (ignored if already recorded)
    fn record_link(
        &self,
        from_document_id: i64,
        to_url: &str,
        to_title: Option<&str>,
        followed: bool,
    ) -> StorageResult<()>;

    /// Gets all links recorded for a document
    fn get_outgoing_links(&self, from_document_id: i64) -> StorageResult<Vec<LinkRecord>>;

    // ===== Tasks =====

    /// Creates a pending task record
    fn create_task(
        &self,
        task_id: &str,
        kind: TaskKind,
        document_id: Option<i64>,
    ) -> StorageResult<TaskRecord>;

    /// Gets a task by its external identifier
    fn get_task(&self, task_id: &str) -> StorageResult<Option<TaskRecord>>;

    /// Updates the status and outcome of a task
    fn update_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts documents by status
    fn count_documents_by_status(&self, status: DocumentStatus) -> StorageResult<u64>;

    /// Gets total document count
    fn count_total_documents(&self) -> StorageResult<u64>;

    /// Gets total summary count
    fn count_summaries(&self) -> StorageResult<u64>;

    /// Gets total recorded link count
    fn count_links(&self) -> StorageResult<u64>;

    /// Counts tasks by status
    fn count_tasks_by_status(&self, status: TaskStatus) -> StorageResult<u64>;

    /// Gets document count breakdown by depth
    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, u64>>;
}
