//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! The connection sits behind a mutex that is held for exactly one store
//! operation; operations that read-then-write run inside an immediate
//! transaction so separate processes sharing the file stay consistent too.

use crate::state::{DocumentStatus, TaskKind, TaskStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    DocumentRecord, LinkRecord, NewDocument, SummaryRecord, TaskRecord, Transition,
};
use crate::DigestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DOCUMENT_COLUMNS: &str = "id, url, title, content, status, depth, parent_id, error_message,
     created_at, updated_at";

const TASK_COLUMNS: &str =
    "id, task_id, kind, document_id, status, result, error, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(DigestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, DigestError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, DigestError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        status: DocumentStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(DocumentStatus::Failed),
        depth: row.get(5)?,
        parent_id: row.get(6)?,
        error_message: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        text: row.get(2)?,
        model_used: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRecord> {
    Ok(TaskRecord {
        id: row.get(0)?,
        task_id: row.get(1)?,
        kind: TaskKind::from_db_string(&row.get::<_, String>(2)?).unwrap_or(TaskKind::Fetch),
        document_id: row.get(3)?,
        status: TaskStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(TaskStatus::Failed),
        result: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn query_document_by_url(conn: &Connection, url: &str) -> StorageResult<Option<DocumentRecord>> {
    let document = conn
        .query_row(
            &format!("SELECT {} FROM documents WHERE url = ?1", DOCUMENT_COLUMNS),
            params![url],
            document_from_row,
        )
        .optional()?;
    Ok(document)
}

fn query_status(conn: &Connection, id: i64) -> StorageResult<Option<DocumentStatus>> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM documents WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(status.map(|s| DocumentStatus::from_db_string(&s).unwrap_or(DocumentStatus::Failed)))
}

fn query_summary(conn: &Connection, document_id: i64) -> StorageResult<Option<SummaryRecord>> {
    let summary = conn
        .query_row(
            "SELECT id, document_id, text, model_used, created_at
             FROM summaries WHERE document_id = ?1",
            params![document_id],
            summary_from_row,
        )
        .optional()?;
    Ok(summary)
}

fn query_task(conn: &Connection, task_id: &str) -> StorageResult<Option<TaskRecord>> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE task_id = ?1", TASK_COLUMNS),
            params![task_id],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

/// Builds a SQL list of status literals; the values are fixed identifiers
fn status_list(statuses: &[DocumentStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.to_db_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Storage for SqliteStorage {
    // ===== Documents =====

    fn upsert_document_if_absent(
        &self,
        document: &NewDocument<'_>,
    ) -> StorageResult<(DocumentRecord, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = query_document_by_url(&tx, document.url)? {
            return Ok((existing, false));
        }

        match document.parent_id {
            Some(parent_id) => {
                let parent_depth: Option<u32> = tx
                    .query_row(
                        "SELECT depth FROM documents WHERE id = ?1",
                        params![parent_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match parent_depth {
                    None => {
                        return Err(StorageError::ConstraintViolation(format!(
                            "parent document {} does not exist",
                            parent_id
                        )))
                    }
                    Some(depth) if depth + 1 != document.depth => {
                        return Err(StorageError::ConstraintViolation(format!(
                            "child depth {} does not follow parent depth {}",
                            document.depth, depth
                        )))
                    }
                    Some(_) => {}
                }
            }
            None if document.depth != 0 => {
                return Err(StorageError::ConstraintViolation(format!(
                    "document without parent must have depth 0, got {}",
                    document.depth
                )));
            }
            None => {}
        }

        let now = now();
        let inserted = tx.execute(
            "INSERT INTO documents (url, title, content, status, depth, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(url) DO NOTHING",
            params![
                document.url,
                document.title,
                document.content,
                document.status.to_db_string(),
                document.depth,
                document.parent_id,
                now
            ],
        )?;

        let stored = query_document_by_url(&tx, document.url)?.ok_or_else(|| {
            StorageError::Database(format!("document {} vanished after insert", document.url))
        })?;
        tx.commit()?;

        Ok((stored, inserted == 1))
    }

    fn get_document(&self, id: i64) -> StorageResult<Option<DocumentRecord>> {
        let conn = self.lock()?;
        let document = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id],
                document_from_row,
            )
            .optional()?;
        Ok(document)
    }

    fn get_document_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>> {
        let conn = self.lock()?;
        query_document_by_url(&conn, url)
    }

    fn transition_status(
        &self,
        id: i64,
        from: &[DocumentStatus],
        to: DocumentStatus,
        error: Option<&str>,
    ) -> StorageResult<Transition> {
        let conn = self.lock()?;

        let updated = if from.is_empty() {
            0
        } else {
            conn.execute(
                &format!(
                    "UPDATE documents SET status = ?1, error_message = ?2, updated_at = ?3
                     WHERE id = ?4 AND status IN ({})",
                    status_list(from)
                ),
                params![to.to_db_string(), error, now(), id],
            )?
        };

        if updated == 1 {
            return Ok(Transition::Applied);
        }

        Ok(match query_status(&conn, id)? {
            Some(current) => Transition::Rejected { current },
            None => Transition::Missing,
        })
    }

    fn complete_document(
        &self,
        id: i64,
        title: &str,
        content: &str,
    ) -> StorageResult<Transition> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE documents SET title = ?1, content = ?2, status = ?3, error_message = NULL,
             updated_at = ?4 WHERE id = ?5 AND status = ?6",
            params![
                title,
                content,
                DocumentStatus::Completed.to_db_string(),
                now(),
                id,
                DocumentStatus::Processing.to_db_string()
            ],
        )?;

        if updated == 1 {
            return Ok(Transition::Applied);
        }

        Ok(match query_status(&conn, id)? {
            Some(current) => Transition::Rejected { current },
            None => Transition::Missing,
        })
    }

    fn record_document_error(&self, id: i64, error: &str) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE documents SET error_message = ?1, updated_at = ?2 WHERE id = ?3",
            params![error, now(), id],
        )?;
        if updated == 0 {
            return Err(StorageError::DocumentNotFound(id));
        }
        Ok(())
    }

    fn get_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE status = ?1 ORDER BY id",
            DOCUMENT_COLUMNS
        ))?;

        let documents = stmt
            .query_map(params![status.to_db_string()], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn get_children(&self, parent_id: i64) -> StorageResult<Vec<DocumentRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE parent_id = ?1 ORDER BY id",
            DOCUMENT_COLUMNS
        ))?;

        let documents = stmt
            .query_map(params![parent_id], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    fn fail_processing_in_tree(&self, root_id: i64, error: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "WITH RECURSIVE tree(id) AS (
                 SELECT id FROM documents WHERE id = ?1
                 UNION ALL
                 SELECT d.id FROM documents d JOIN tree t ON d.parent_id = t.id
             )
             UPDATE documents SET status = ?2, error_message = ?3, updated_at = ?4
             WHERE status = ?5 AND id IN (SELECT id FROM tree)",
            params![
                root_id,
                DocumentStatus::Failed.to_db_string(),
                error,
                now(),
                DocumentStatus::Processing.to_db_string()
            ],
        )?;
        Ok(updated as u64)
    }

    fn fail_interrupted(&self, error: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE documents SET status = ?1, error_message = ?2, updated_at = ?3
             WHERE status = ?4",
            params![
                DocumentStatus::Failed.to_db_string(),
                error,
                now(),
                DocumentStatus::Processing.to_db_string()
            ],
        )?;
        Ok(updated as u64)
    }

    // ===== Summaries =====

    fn insert_summary_if_absent(
        &self,
        document_id: i64,
        text: &str,
        model_used: &str,
    ) -> StorageResult<(SummaryRecord, bool)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = query_summary(&tx, document_id)? {
            return Ok((existing, false));
        }

        match query_status(&tx, document_id)? {
            None => {
                return Err(StorageError::ConstraintViolation(format!(
                    "cannot summarize missing document {}",
                    document_id
                )))
            }
            Some(DocumentStatus::Completed) => {}
            Some(status) => {
                return Err(StorageError::ConstraintViolation(format!(
                    "cannot summarize document {} in status {}",
                    document_id, status
                )))
            }
        }

        let inserted = tx.execute(
            "INSERT INTO summaries (document_id, text, model_used, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(document_id) DO NOTHING",
            params![document_id, text, model_used, now()],
        )?;

        let stored = query_summary(&tx, document_id)?.ok_or_else(|| {
            StorageError::Database(format!("summary for {} vanished after insert", document_id))
        })?;
        tx.commit()?;

        Ok((stored, inserted == 1))
    }

    fn get_summary(&self, document_id: i64) -> StorageResult<Option<SummaryRecord>> {
        let conn = self.lock()?;
        query_summary(&conn, document_id)
    }

    // ===== Links =====

    fn record_link(
        &self,
        from_document_id: i64,
        to_url: &str,
        to_title: Option<&str>,
        followed: bool,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO links (from_document_id, to_url, to_title, followed, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![from_document_id, to_url, to_title, followed, now()],
        )?;
        Ok(())
    }

    fn get_outgoing_links(&self, from_document_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT from_document_id, to_url, to_title, followed, discovered_at
             FROM links WHERE from_document_id = ?1 ORDER BY id",
        )?;

        let links = stmt
            .query_map(params![from_document_id], |row| {
                Ok(LinkRecord {
                    from_document_id: row.get(0)?,
                    to_url: row.get(1)?,
                    to_title: row.get(2)?,
                    followed: row.get(3)?,
                    discovered_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(links)
    }

    // ===== Tasks =====

    fn create_task(
        &self,
        task_id: &str,
        kind: TaskKind,
        document_id: Option<i64>,
    ) -> StorageResult<TaskRecord> {
        let conn = self.lock()?;
        let now = now();
        conn.execute(
            "INSERT INTO tasks (task_id, kind, document_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                task_id,
                kind.to_db_string(),
                document_id,
                TaskStatus::Pending.to_db_string(),
                now
            ],
        )?;

        query_task(&conn, task_id)?
            .ok_or_else(|| StorageError::TaskNotFound(task_id.to_string()))
    }

    fn get_task(&self, task_id: &str) -> StorageResult<Option<TaskRecord>> {
        let conn = self.lock()?;
        query_task(&conn, task_id)
    }

    fn update_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE tasks SET status = ?1, result = ?2, error = ?3, updated_at = ?4
             WHERE task_id = ?5",
            params![status.to_db_string(), result, error, now(), task_id],
        )?;
        if updated == 0 {
            return Err(StorageError::TaskNotFound(task_id.to_string()));
        }
        Ok(())
    }

    // ===== Statistics =====

    fn count_documents_by_status(&self, status: DocumentStatus) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_documents(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_summaries(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_links(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_tasks_by_status(&self, status: TaskStatus) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, u64>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT depth, COUNT(*) FROM documents GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)))?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_URL: &str = "https://en.wikipedia.org/wiki/Rust";

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn insert_root(storage: &SqliteStorage) -> DocumentRecord {
        let (doc, created) = storage
            .upsert_document_if_absent(&NewDocument::pending_root(ROOT_URL))
            .unwrap();
        assert!(created);
        doc
    }

    fn completed_child<'a>(url: &'a str, parent: &DocumentRecord) -> NewDocument<'a> {
        NewDocument {
            url,
            title: "Child",
            content: "child text",
            status: DocumentStatus::Completed,
            depth: parent.depth + 1,
            parent_id: Some(parent.id),
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::open_in_memory().is_ok());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digest.db");
        {
            let storage = SqliteStorage::new(&path).unwrap();
            insert_root(&storage);
        }
        let reopened = SqliteStorage::new(&path).unwrap();
        assert!(reopened.get_document_by_url(ROOT_URL).unwrap().is_some());
    }

    #[test]
    fn test_upsert_creates_pending_root() {
        let storage = storage();
        let doc = insert_root(&storage);

        assert!(doc.id > 0);
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.depth, 0);
        assert_eq!(doc.parent_id, None);
    }

    #[test]
    fn test_upsert_existing_leaves_attributes_unchanged() {
        let storage = storage();
        let root = insert_root(&storage);

        let again = NewDocument {
            url: ROOT_URL,
            title: "Other title",
            content: "other content",
            status: DocumentStatus::Completed,
            depth: 0,
            parent_id: None,
        };
        let (doc, created) = storage.upsert_document_if_absent(&again).unwrap();

        assert!(!created);
        assert_eq!(doc, root);
        assert_eq!(storage.count_total_documents().unwrap(), 1);
    }

    #[test]
    fn test_upsert_enforces_child_depth() {
        let storage = storage();
        let root = insert_root(&storage);

        let mut child = completed_child("https://en.wikipedia.org/wiki/Cargo", &root);
        child.depth = 3;
        let result = storage.upsert_document_if_absent(&child);
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));

        let child = completed_child("https://en.wikipedia.org/wiki/Cargo", &root);
        let (doc, created) = storage.upsert_document_if_absent(&child).unwrap();
        assert!(created);
        assert_eq!(doc.depth, 1);
        assert_eq!(doc.parent_id, Some(root.id));
    }

    #[test]
    fn test_upsert_rejects_missing_parent_and_deep_root() {
        let storage = storage();

        let orphan = NewDocument {
            url: "https://en.wikipedia.org/wiki/Orphan",
            title: "",
            content: "",
            status: DocumentStatus::Pending,
            depth: 1,
            parent_id: Some(42),
        };
        assert!(matches!(
            storage.upsert_document_if_absent(&orphan),
            Err(StorageError::ConstraintViolation(_))
        ));

        let deep_root = NewDocument {
            parent_id: None,
            ..orphan
        };
        assert!(matches!(
            storage.upsert_document_if_absent(&deep_root),
            Err(StorageError::ConstraintViolation(_))
        ));
        assert_eq!(storage.count_total_documents().unwrap(), 0);
    }

    #[test]
    fn test_transition_guard() {
        let storage = storage();
        let root = insert_root(&storage);

        let applied = storage
            .transition_status(
                root.id,
                &[DocumentStatus::Pending],
                DocumentStatus::Processing,
                None,
            )
            .unwrap();
        assert_eq!(applied, Transition::Applied);

        // A second claim sees the document already processing
        let rejected = storage
            .transition_status(
                root.id,
                &[DocumentStatus::Pending],
                DocumentStatus::Processing,
                None,
            )
            .unwrap();
        assert_eq!(
            rejected,
            Transition::Rejected {
                current: DocumentStatus::Processing
            }
        );

        let missing = storage
            .transition_status(999, &[DocumentStatus::Pending], DocumentStatus::Failed, None)
            .unwrap();
        assert_eq!(missing, Transition::Missing);
    }

    #[test]
    fn test_transition_records_error() {
        let storage = storage();
        let root = insert_root(&storage);

        storage
            .transition_status(
                root.id,
                &[DocumentStatus::Pending, DocumentStatus::Processing],
                DocumentStatus::Failed,
                Some("not found"),
            )
            .unwrap();

        let doc = storage.get_document(root.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.error_message.as_deref(), Some("not found"));
    }

    #[test]
    fn test_complete_document_requires_processing() {
        let storage = storage();
        let root = insert_root(&storage);

        let early = storage.complete_document(root.id, "Rust", "text").unwrap();
        assert_eq!(
            early,
            Transition::Rejected {
                current: DocumentStatus::Pending
            }
        );

        storage
            .transition_status(
                root.id,
                &[DocumentStatus::Pending],
                DocumentStatus::Processing,
                None,
            )
            .unwrap();
        assert!(storage
            .complete_document(root.id, "Rust", "Rust is a language.")
            .unwrap()
            .is_applied());

        let doc = storage.get_document(root.id).unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.title, "Rust");
        assert_eq!(doc.content, "Rust is a language.");
    }

    #[test]
    fn test_summary_inserted_once() {
        let storage = storage();
        let root = insert_root(&storage);
        let (child, _) = storage
            .upsert_document_if_absent(&completed_child(
                "https://en.wikipedia.org/wiki/Cargo",
                &root,
            ))
            .unwrap();

        let (first, created) = storage
            .insert_summary_if_absent(child.id, "short", "groq-gemma2-9b-it")
            .unwrap();
        assert!(created);

        let (second, created) = storage
            .insert_summary_if_absent(child.id, "different", "other-model")
            .unwrap();
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(storage.count_summaries().unwrap(), 1);
    }

    #[test]
    fn test_summary_requires_completed_document() {
        let storage = storage();
        let root = insert_root(&storage);

        let result = storage.insert_summary_if_absent(root.id, "short", "model");
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));

        let result = storage.insert_summary_if_absent(12345, "short", "model");
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
        assert_eq!(storage.count_summaries().unwrap(), 0);
    }

    #[test]
    fn test_fail_processing_in_tree_only_touches_subtree() {
        let storage = storage();
        let root = insert_root(&storage);
        let (child, _) = storage
            .upsert_document_if_absent(&NewDocument {
                url: "https://en.wikipedia.org/wiki/Cargo",
                title: "",
                content: "",
                status: DocumentStatus::Pending,
                depth: 1,
                parent_id: Some(root.id),
            })
            .unwrap();
        let (other, _) = storage
            .upsert_document_if_absent(&NewDocument::pending_root(
                "https://en.wikipedia.org/wiki/Go",
            ))
            .unwrap();

        for id in [root.id, child.id, other.id] {
            storage
                .transition_status(id, &[DocumentStatus::Pending], DocumentStatus::Processing, None)
                .unwrap();
        }

        let failed = storage.fail_processing_in_tree(root.id, "timed out").unwrap();
        assert_eq!(failed, 2);

        let other = storage.get_document(other.id).unwrap().unwrap();
        assert_eq!(other.status, DocumentStatus::Processing);
        let child = storage.get_document(child.id).unwrap().unwrap();
        assert_eq!(child.status, DocumentStatus::Failed);
        assert_eq!(child.error_message.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_fail_interrupted() {
        let storage = storage();
        let root = insert_root(&storage);
        storage
            .transition_status(
                root.id,
                &[DocumentStatus::Pending],
                DocumentStatus::Processing,
                None,
            )
            .unwrap();

        assert_eq!(storage.fail_interrupted("interrupted").unwrap(), 1);
        assert_eq!(
            storage
                .get_documents_by_status(DocumentStatus::Failed)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_links_are_recorded_once() {
        let storage = storage();
        let root = insert_root(&storage);

        storage
            .record_link(root.id, "https://en.wikipedia.org/wiki/Cargo", Some("Cargo"), true)
            .unwrap();
        storage
            .record_link(root.id, "https://en.wikipedia.org/wiki/Cargo", Some("Cargo"), false)
            .unwrap();

        let links = storage.get_outgoing_links(root.id).unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].followed);
        assert_eq!(links[0].to_title.as_deref(), Some("Cargo"));
    }

    #[test]
    fn test_task_lifecycle() {
        let storage = storage();
        let root = insert_root(&storage);

        let task = storage
            .create_task("fetch_abc", TaskKind::Fetch, Some(root.id))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.kind, TaskKind::Fetch);
        assert_eq!(task.document_id, Some(root.id));

        storage
            .update_task("fetch_abc", TaskStatus::Completed, Some("{}"), None)
            .unwrap();
        let task = storage.get_task("fetch_abc").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("{}"));

        assert!(storage.get_task("missing").unwrap().is_none());
        assert!(matches!(
            storage.update_task("missing", TaskStatus::Failed, None, Some("x")),
            Err(StorageError::TaskNotFound(_))
        ));
        assert_eq!(storage.count_tasks_by_status(TaskStatus::Completed).unwrap(), 1);
    }

    #[test]
    fn test_depth_breakdown_and_children() {
        let storage = storage();
        let root = insert_root(&storage);
        for url in [
            "https://en.wikipedia.org/wiki/Cargo",
            "https://en.wikipedia.org/wiki/Clippy",
        ] {
            storage
                .upsert_document_if_absent(&completed_child(url, &root))
                .unwrap();
        }

        let breakdown = storage.get_depth_breakdown().unwrap();
        assert_eq!(breakdown.get(&0), Some(&1));
        assert_eq!(breakdown.get(&1), Some(&2));

        let children = storage.get_children(root.id).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].url, "https://en.wikipedia.org/wiki/Cargo");
    }
}
