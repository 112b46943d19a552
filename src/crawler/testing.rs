//! In-process fakes for the source, summarizer and storage seams

use crate::source::{DocumentSource, FetchResult, SourceDocument, SourceError, SourceLink};
use crate::state::{DocumentStatus, TaskKind, TaskStatus};
use crate::storage::{
    DocumentRecord, LinkRecord, NewDocument, SqliteStorage, Storage, StorageError,
    StorageResult, SummaryRecord, TaskRecord, Transition,
};
use crate::summarizer::{Summarizer, SummarizerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn article(name: &str) -> String {
    format!("https://en.wikipedia.org/wiki/{}", name)
}

pub fn link(name: &str, text: &str) -> SourceLink {
    SourceLink {
        url: article(name),
        title: name.replace('_', " "),
        text: text.to_string(),
    }
}

enum Page {
    Found(SourceDocument),
    Error,
}

/// Serves canned pages; unknown URLs are reported as not found
pub struct FakeSource {
    pages: HashMap<String, Page>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_page(mut self, name: &str, text: &str, links: Vec<SourceLink>) -> Self {
        self.pages.insert(
            article(name),
            Page::Found(SourceDocument {
                title: name.replace('_', " "),
                text: text.to_string(),
                links,
            }),
        );
        self
    }

    pub fn with_error(mut self, name: &str) -> Self {
        self.pages.insert(article(name), Page::Error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<FetchResult, SourceError> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.pages.get(url) {
            Some(Page::Found(doc)) => Ok(FetchResult::Found(doc.clone())),
            Some(Page::Error) => Err(SourceError::Status {
                url: url.to_string(),
                status: 500,
            }),
            None => Ok(FetchResult::NotFound),
        }
    }
}

/// Summarizes by echoing a prefix; fails for texts containing `fail_on`
pub struct FakeSummarizer {
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn new() -> Self {
        Self {
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    fn model_id(&self) -> &str {
        "fake-model"
    }

    async fn generate(&self, text: &str) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.fail_on {
            Some(marker) if text.contains(marker.as_str()) => Err(SummarizerError::Api {
                status: 500,
                message: "model unavailable".to_string(),
            }),
            _ => Ok(format!("summary: {}", text.chars().take(20).collect::<String>())),
        }
    }
}

/// In-memory store whose `record_link` fails for one target URL
pub struct FailingLinkStorage {
    inner: SqliteStorage,
    failing_url: String,
}

impl FailingLinkStorage {
    pub fn new(failing_url: &str) -> Self {
        Self {
            inner: SqliteStorage::open_in_memory().unwrap(),
            failing_url: failing_url.to_string(),
        }
    }
}

impl Storage for FailingLinkStorage {
    fn upsert_document_if_absent(
        &self,
        document: &NewDocument<'_>,
    ) -> StorageResult<(DocumentRecord, bool)> {
        self.inner.upsert_document_if_absent(document)
    }

    fn get_document(&self, id: i64) -> StorageResult<Option<DocumentRecord>> {
        self.inner.get_document(id)
    }

    fn get_document_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>> {
        self.inner.get_document_by_url(url)
    }

    fn transition_status(
        &self,
        id: i64,
        from: &[DocumentStatus],
        to: DocumentStatus,
        error: Option<&str>,
    ) -> StorageResult<Transition> {
        self.inner.transition_status(id, from, to, error)
    }

    fn complete_document(&self, id: i64, title: &str, content: &str)
        -> StorageResult<Transition> {
        self.inner.complete_document(id, title, content)
    }

    fn record_document_error(&self, id: i64, error: &str) -> StorageResult<()> {
        self.inner.record_document_error(id, error)
    }

    fn get_documents_by_status(&self, status: DocumentStatus)
        -> StorageResult<Vec<DocumentRecord>> {
        self.inner.get_documents_by_status(status)
    }

    fn get_children(&self, parent_id: i64) -> StorageResult<Vec<DocumentRecord>> {
        self.inner.get_children(parent_id)
    }

    fn fail_processing_in_tree(&self, root_id: i64, error: &str) -> StorageResult<u64> {
        self.inner.fail_processing_in_tree(root_id, error)
    }

    fn fail_interrupted(&self, error: &str) -> StorageResult<u64> {
        self.inner.fail_interrupted(error)
    }

    fn insert_summary_if_absent(
        &self,
        document_id: i64,
        text: &str,
        model_used: &str,
    ) -> StorageResult<(SummaryRecord, bool)> {
        self.inner.insert_summary_if_absent(document_id, text, model_used)
    }

    fn get_summary(&self, document_id: i64) -> StorageResult<Option<SummaryRecord>> {
        self.inner.get_summary(document_id)
    }

    fn record_link(
        &self,
        from_document_id: i64,
        to_url: &str,
        to_title: Option<&str>,
        followed: bool,
    ) -> StorageResult<()> {
        if to_url == self.failing_url {
            return Err(StorageError::Database("disk I/O error".to_string()));
        }
        self.inner.record_link(from_document_id, to_url, to_title, followed)
    }

    fn get_outgoing_links(&self, from_document_id: i64) -> StorageResult<Vec<LinkRecord>> {
        self.inner.get_outgoing_links(from_document_id)
    }

    fn create_task(
        &self,
        task_id: &str,
        kind: TaskKind,
        document_id: Option<i64>,
    ) -> StorageResult<TaskRecord> {
        self.inner.create_task(task_id, kind, document_id)
    }

    fn get_task(&self, task_id: &str) -> StorageResult<Option<TaskRecord>> {
        self.inner.get_task(task_id)
    }

    fn update_task(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<&str>,
        error: Option<&str>,
    ) -> StorageResult<()> {
        self.inner.update_task(task_id, status, result, error)
    }

    fn count_documents_by_status(&self, status: DocumentStatus) -> StorageResult<u64> {
        self.inner.count_documents_by_status(status)
    }

    fn count_total_documents(&self) -> StorageResult<u64> {
        self.inner.count_total_documents()
    }

    fn count_summaries(&self) -> StorageResult<u64> {
        self.inner.count_summaries()
    }

    fn count_links(&self) -> StorageResult<u64> {
        self.inner.count_links()
    }

    fn count_tasks_by_status(&self, status: TaskStatus) -> StorageResult<u64> {
        self.inner.count_tasks_by_status(status)
    }

    fn get_depth_breakdown(&self) -> StorageResult<HashMap<u32, u64>> {
        self.inner.get_depth_breakdown()
    }
}
