//! Entry points for starting and inspecting background work
//!
//! [`CrawlService`] validates requests against the store, creates the
//! pending document and task records, and hands the work to the
//! [`Dispatcher`]. Every start call returns as soon as the job is queued.

use crate::config::CrawlerConfig;
use crate::crawler::{Coordinator, Dispatcher, Job};
use crate::state::{DocumentStatus, TaskKind, TaskStatus};
use crate::storage::{DocumentRecord, NewDocument, Storage, TaskRecord, Transition};
use crate::url::document_key;
use crate::{DigestError, Result};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Acknowledgement of a queued job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task_id: String,
    pub document_id: i64,
    pub url: String,
    pub status: TaskStatus,
}

/// A stored summary together with its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryView {
    pub url: String,
    pub title: String,
    pub summary: String,
    pub model_used: String,
    pub created_at: String,
}

pub struct CrawlService {
    storage: Arc<dyn Storage>,
    dispatcher: Dispatcher,
}

impl CrawlService {
    /// Creates the service and starts its background worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(storage: Arc<dyn Storage>, coordinator: Coordinator, config: &CrawlerConfig) -> Self {
        let timeout = match config.crawl_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let dispatcher = Dispatcher::spawn(
            coordinator,
            storage.clone(),
            config.max_concurrent_crawls,
            timeout,
        );

        Self {
            storage,
            dispatcher,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Starts a recursive crawl rooted at `url`
    ///
    /// A URL that was never seen becomes a new root. A document that
    /// previously failed is reset to `pending` and crawled again at its
    /// recorded depth. Any other known document is rejected.
    ///
    /// # Errors
    ///
    /// * `Url` - the URL cannot be normalized
    /// * `AlreadyExists` - the document is pending, processing or completed
    pub fn start_crawl(&self, url: &str) -> Result<Submission> {
        let key = document_key(url)?;

        let document = match self.storage.get_document_by_url(&key)? {
            Some(existing) if existing.status.is_resubmittable() => {
                match self.storage.transition_status(
                    existing.id,
                    &[DocumentStatus::Failed],
                    DocumentStatus::Pending,
                    None,
                )? {
                    Transition::Applied => {
                        tracing::info!("Resubmitting failed document {} ({})", existing.id, key);
                        existing
                    }
                    _ => return Err(DigestError::AlreadyExists(format!(
                        "{} was resubmitted concurrently",
                        key
                    ))),
                }
            }
            Some(existing) => {
                return Err(DigestError::AlreadyExists(format!(
                    "{} is already {}",
                    key, existing.status
                )))
            }
            None => {
                let (document, created) = self
                    .storage
                    .upsert_document_if_absent(&NewDocument::pending_root(&key))?;
                if !created {
                    return Err(DigestError::AlreadyExists(format!(
                        "{} was submitted concurrently",
                        key
                    )));
                }
                document
            }
        };

        let task_id = format!("fetch_{}", Uuid::new_v4().simple());
        self.dispatch(
            &task_id,
            TaskKind::Fetch,
            document.id,
            Job::Crawl {
                task_id: task_id.clone(),
                document_id: document.id,
                url: key.clone(),
                depth: document.depth,
            },
        )?;

        Ok(Submission {
            task_id,
            document_id: document.id,
            url: key,
            status: TaskStatus::Pending,
        })
    }

    /// Starts summary generation for an already fetched document
    ///
    /// # Errors
    ///
    /// * `NotFound` - no document for `url`
    /// * `AlreadyExists` - the document already has a summary
    /// * `Precondition` - the document is not completed or has no text
    pub fn start_summarize(&self, url: &str) -> Result<Submission> {
        let key = document_key(url)?;
        let document = self.document_by_url(&key)?;

        if self.storage.get_summary(document.id)?.is_some() {
            return Err(DigestError::AlreadyExists(format!(
                "summary for {} already exists",
                key
            )));
        }
        if document.status != DocumentStatus::Completed {
            return Err(DigestError::Precondition(format!(
                "{} is {}, not completed",
                key, document.status
            )));
        }
        if document.content.trim().is_empty() {
            return Err(DigestError::Precondition(format!("{} has no text", key)));
        }

        let task_id = format!("summary_{}", Uuid::new_v4().simple());
        self.dispatch(
            &task_id,
            TaskKind::Summarize,
            document.id,
            Job::Summarize {
                task_id: task_id.clone(),
                document_id: document.id,
                text: document.content,
            },
        )?;

        Ok(Submission {
            task_id,
            document_id: document.id,
            url: key,
            status: TaskStatus::Pending,
        })
    }

    fn dispatch(&self, task_id: &str, kind: TaskKind, document_id: i64, job: Job) -> Result<()> {
        self.storage.create_task(task_id, kind, Some(document_id))?;

        if let Err(e) = self.dispatcher.submit(job) {
            self.storage
                .update_task(task_id, TaskStatus::Failed, None, Some(&e.to_string()))?;
            return Err(e);
        }

        tracing::debug!("Queued {} task {} for document {}", kind, task_id, document_id);
        Ok(())
    }

    pub fn document(&self, id: i64) -> Result<DocumentRecord> {
        lookup_document(self.storage.as_ref(), id)
    }

    pub fn document_by_url(&self, url: &str) -> Result<DocumentRecord> {
        lookup_document_by_url(self.storage.as_ref(), url)
    }

    pub fn summary(&self, url: &str) -> Result<SummaryView> {
        lookup_summary(self.storage.as_ref(), url)
    }

    pub fn task(&self, task_id: &str) -> Result<TaskRecord> {
        lookup_task(self.storage.as_ref(), task_id)
    }

    /// Waits for all queued work to finish
    pub async fn shutdown(self) -> Result<()> {
        self.dispatcher.shutdown().await
    }
}

/// Gets a document by ID, reporting absence as `NotFound`
pub fn lookup_document(storage: &dyn Storage, id: i64) -> Result<DocumentRecord> {
    storage
        .get_document(id)?
        .ok_or_else(|| DigestError::NotFound(format!("document {}", id)))
}

/// Gets the document stored for a URL after normalizing it
pub fn lookup_document_by_url(storage: &dyn Storage, url: &str) -> Result<DocumentRecord> {
    let key = document_key(url)?;
    storage
        .get_document_by_url(&key)?
        .ok_or_else(|| DigestError::NotFound(format!("document for {}", key)))
}

/// Gets the summary of the document stored for a URL
pub fn lookup_summary(storage: &dyn Storage, url: &str) -> Result<SummaryView> {
    let document = lookup_document_by_url(storage, url)?;
    let summary = storage
        .get_summary(document.id)?
        .ok_or_else(|| DigestError::NotFound(format!("summary for {}", document.url)))?;

    Ok(SummaryView {
        url: document.url,
        title: document.title,
        summary: summary.text,
        model_used: summary.model_used,
        created_at: summary.created_at,
    })
}

pub fn lookup_task(storage: &dyn Storage, task_id: &str) -> Result<TaskRecord> {
    storage
        .get_task(task_id)?
        .ok_or_else(|| DigestError::NotFound(format!("task {}", task_id)))
}
