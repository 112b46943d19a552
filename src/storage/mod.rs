//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Document lifecycle persistence with guarded status transitions
//! - Summary records (one per document)
//! - Link relationship tracking
//! - Task records for status polling

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{DocumentStatus, TaskKind, TaskStatus};
use crate::DigestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_storage(path: &Path) -> Result<SqliteStorage, DigestError> {
    SqliteStorage::new(path)
}

/// Represents a document in the database
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub content: String,
    pub status: DocumentStatus,
    pub depth: u32,
    pub parent_id: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Attributes for a document row that may not exist yet
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub url: &'a str,
    pub title: &'a str,
    pub content: &'a str,
    pub status: DocumentStatus,
    pub depth: u32,
    pub parent_id: Option<i64>,
}

impl<'a> NewDocument<'a> {
    /// A root document awaiting its first crawl
    pub fn pending_root(url: &'a str) -> Self {
        Self {
            url,
            title: "",
            content: "",
            status: DocumentStatus::Pending,
            depth: 0,
            parent_id: None,
        }
    }
}

/// Represents a generated summary
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub id: i64,
    pub document_id: i64,
    pub text: String,
    pub model_used: String,
    pub created_at: String,
}

/// Represents a link seen on a document
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub from_document_id: i64,
    pub to_url: String,
    pub to_title: Option<String>,
    /// True when the link produced a new child document
    pub followed: bool,
    pub discovered_at: String,
}

/// Represents an externally visible task record
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: i64,
    pub task_id: String,
    pub kind: TaskKind,
    pub document_id: Option<i64>,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Outcome of a guarded status update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The document was in an expected status and has been updated
    Applied,
    /// The document exists but its status was not in the expected set
    Rejected { current: DocumentStatus },
    /// No document with that id exists
    Missing,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}
