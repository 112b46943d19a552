//! Crawl coordinator - recursive fetch and summarize orchestration
//!
//! One call to [`Coordinator::run_crawl`] processes a document and the bounded
//! tree of linked documents below it:
//! - Claiming the document (`pending` → `processing`)
//! - Fetching it from the document source
//! - Storing its content and summarizing it
//! - Creating child documents for its links until the depth bound
//!
//! All coordination with other crawl units happens through atomic store
//! operations, so two overlapping crawls never duplicate a document.

use crate::config::CrawlerConfig;
use crate::source::{DocumentSource, FetchResult, SourceDocument, SourceLink};
use crate::state::DocumentStatus;
use crate::storage::{NewDocument, Storage, SummaryRecord, Transition};
use crate::summarizer::Summarizer;
use crate::url::document_key;
use crate::{DigestError, Result};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Title stored when the source returns none
pub const UNKNOWN_TITLE: &str = "Unknown Title";

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bounds applied to every crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    pub max_depth: u32,
    pub link_fanout: usize,
    pub expand_children: bool,
}

impl From<&CrawlerConfig> for CrawlSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            link_fanout: config.link_fanout,
            expand_children: config.expand_children,
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

/// Counters collected while crawling one root document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub documents_fetched: u64,
    pub children_created: u64,
    pub links_skipped: u64,
    pub summaries_created: u64,
    pub summary_failures: u64,
    pub branch_failures: u64,
}

/// Result of a summarization request
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeOutcome {
    /// A new summary was generated and stored
    Created(SummaryRecord),
    /// The document already had a summary; nothing was generated
    Existing(SummaryRecord),
}

impl SummarizeOutcome {
    pub fn summary(&self) -> &SummaryRecord {
        match self {
            Self::Created(summary) | Self::Existing(summary) => summary,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Main crawl coordinator structure
#[derive(Clone)]
pub struct Coordinator {
    storage: Arc<dyn Storage>,
    source: Arc<dyn DocumentSource>,
    summarizer: Arc<dyn Summarizer>,
    settings: CrawlSettings,
}

impl Coordinator {
    pub fn new(
        storage: Arc<dyn Storage>,
        source: Arc<dyn DocumentSource>,
        summarizer: Arc<dyn Summarizer>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            storage,
            source,
            summarizer,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls a document and the linked documents below it
    ///
    /// # Arguments
    ///
    /// * `document_id` - An existing `pending` document
    /// * `url` - Normalized URL to fetch
    /// * `depth` - Depth of the document (0 for a root)
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The document completed; child failures are counted
    /// * `Err(DigestError)` - The document could not be claimed or fetched
    pub async fn run_crawl(&self, document_id: i64, url: &str, depth: u32) -> Result<CrawlReport> {
        tracing::info!("Starting crawl of {} (document {}, depth {})", url, document_id, depth);

        let stored = self.storage.get_document(document_id)?.ok_or_else(|| {
            DigestError::Precondition(format!("document {} does not exist", document_id))
        })?;
        if stored.depth != depth {
            return Err(DigestError::Precondition(format!(
                "document {} is stored at depth {}, not {}",
                document_id, stored.depth, depth
            )));
        }

        let mut report = CrawlReport::default();
        self.crawl_document(document_id, url, depth, &mut report)
            .await?;

        tracing::info!(
            "Crawl of {} finished: {} fetched, {} children, {} summaries, {} failures",
            url,
            report.documents_fetched,
            report.children_created,
            report.summaries_created,
            report.branch_failures + report.summary_failures
        );

        Ok(report)
    }

    fn crawl_document<'a>(
        &'a self,
        document_id: i64,
        url: &'a str,
        depth: u32,
        report: &'a mut CrawlReport,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.storage.transition_status(
                document_id,
                &[DocumentStatus::Pending],
                DocumentStatus::Processing,
                None,
            )? {
                Transition::Applied => {}
                Transition::Missing => {
                    return Err(DigestError::Precondition(format!(
                        "document {} does not exist",
                        document_id
                    )))
                }
                Transition::Rejected { current } => {
                    return Err(DigestError::AlreadyExists(format!(
                        "document {} is already {}",
                        document_id, current
                    )))
                }
            }

            let fetched = match self.fetch_and_store(document_id, url).await {
                Ok(fetched) => fetched,
                Err(e) => return Err(self.mark_failed(document_id, e)),
            };
            report.documents_fetched += 1;

            self.summarize_counted(document_id, &fetched.text, report)
                .await;

            if depth >= self.settings.max_depth {
                tracing::debug!("Depth bound reached at {}, not following links", url);
                return Ok(());
            }

            for link in fetched.links.iter().take(self.settings.link_fanout) {
                let mut child_id = None;
                if let Err(e) = self
                    .follow_link(document_id, depth, link, &mut child_id, report)
                    .await
                {
                    tracing::warn!("Branch {} under {} failed: {}", link.url, url, e);
                    report.branch_failures += 1;
                    self.record_branch_failure(document_id, child_id, link, &e);
                }
            }

            Ok(())
        })
    }

    /// Fetches a claimed document and moves it to `completed`
    async fn fetch_and_store(&self, document_id: i64, url: &str) -> Result<SourceDocument> {
        let fetched = match self.source.fetch(url).await {
            Ok(FetchResult::Found(doc)) => doc,
            Ok(FetchResult::NotFound) => {
                return Err(DigestError::NotFound(format!("no document at {}", url)))
            }
            Err(source) => {
                return Err(DigestError::Source {
                    url: url.to_string(),
                    source,
                })
            }
        };

        if fetched.text.trim().is_empty() {
            return Err(DigestError::EmptyContent {
                url: url.to_string(),
            });
        }

        let title = if fetched.title.trim().is_empty() {
            UNKNOWN_TITLE
        } else {
            fetched.title.as_str()
        };

        match self
            .storage
            .complete_document(document_id, title, &fetched.text)?
        {
            Transition::Applied => Ok(fetched),
            Transition::Rejected { current } => Err(DigestError::Precondition(format!(
                "document {} became {} while being fetched",
                document_id, current
            ))),
            Transition::Missing => Err(DigestError::Precondition(format!(
                "document {} was removed while being fetched",
                document_id
            ))),
        }
    }

    /// Records a failure on a document and hands the error back
    fn mark_failed(&self, document_id: i64, error: DigestError) -> DigestError {
        let message = error.to_string();
        tracing::warn!("Document {} failed: {}", document_id, message);

        if let Err(e) = self.storage.transition_status(
            document_id,
            &[DocumentStatus::Pending, DocumentStatus::Processing],
            DocumentStatus::Failed,
            Some(&message),
        ) {
            tracing::error!("Could not record failure of document {}: {}", document_id, e);
        }

        error
    }

    /// Records a failed branch on the child it created, or on the parent
    fn record_branch_failure(
        &self,
        parent_id: i64,
        child_id: Option<i64>,
        link: &SourceLink,
        error: &DigestError,
    ) {
        let message = format!("link {} failed: {}", link.url, error);

        let recorded = match child_id {
            Some(child_id) => self
                .storage
                .transition_status(
                    child_id,
                    &[
                        DocumentStatus::Pending,
                        DocumentStatus::Processing,
                        DocumentStatus::Completed,
                    ],
                    DocumentStatus::Failed,
                    Some(&message),
                )
                .map(|_| ()),
            None => self.storage.record_document_error(parent_id, &message),
        };

        if let Err(e) = recorded {
            tracing::error!("Could not record failure of {}: {}", link.url, e);
        }
    }

    /// Creates (and in expansion mode crawls) the child document for a link
    ///
    /// `child_id` is set as soon as this call has created a child row.
    async fn follow_link(
        &self,
        parent_id: i64,
        parent_depth: u32,
        link: &SourceLink,
        child_id: &mut Option<i64>,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let child_url = document_key(&link.url)?;

        if !self.settings.expand_children && link.text.trim().is_empty() {
            tracing::debug!("Skipping {}: no inline text", child_url);
            self.storage
                .record_link(parent_id, &child_url, Some(&link.title), false)?;
            report.links_skipped += 1;
            return Ok(());
        }

        let title = if link.title.trim().is_empty() {
            UNKNOWN_TITLE
        } else {
            link.title.as_str()
        };

        let child = if self.settings.expand_children {
            NewDocument {
                url: &child_url,
                title: "",
                content: "",
                status: DocumentStatus::Pending,
                depth: parent_depth + 1,
                parent_id: Some(parent_id),
            }
        } else {
            NewDocument {
                url: &child_url,
                title,
                content: &link.text,
                status: DocumentStatus::Completed,
                depth: parent_depth + 1,
                parent_id: Some(parent_id),
            }
        };

        let (child, created) = self.storage.upsert_document_if_absent(&child)?;
        if created {
            *child_id = Some(child.id);
        }
        self.storage
            .record_link(parent_id, &child_url, Some(&link.title), created)?;

        if !created {
            tracing::debug!("Skipping {}: already known as document {}", child_url, child.id);
            report.links_skipped += 1;
            return Ok(());
        }
        report.children_created += 1;

        if self.settings.expand_children {
            self.crawl_document(child.id, &child_url, child.depth, report)
                .await
        } else {
            self.summarize_counted(child.id, &child.content, report)
                .await;
            Ok(())
        }
    }

    async fn summarize_counted(&self, document_id: i64, text: &str, report: &mut CrawlReport) {
        match self.summarize(document_id, text).await {
            Ok(outcome) => {
                if outcome.is_created() {
                    report.summaries_created += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Summary for document {} failed: {}", document_id, e);
                report.summary_failures += 1;
            }
        }
    }

    /// Generates and stores the summary of a completed document
    ///
    /// A document that already has a summary is left alone and its existing
    /// summary is reported. A summarizer failure is recorded on the document,
    /// which stays `completed`.
    pub async fn summarize(&self, document_id: i64, text: &str) -> Result<SummarizeOutcome> {
        if text.trim().is_empty() {
            return Err(DigestError::Precondition(format!(
                "document {} has no text to summarize",
                document_id
            )));
        }

        let document = self.storage.get_document(document_id)?.ok_or_else(|| {
            DigestError::Precondition(format!("document {} does not exist", document_id))
        })?;
        if document.status != DocumentStatus::Completed {
            return Err(DigestError::Precondition(format!(
                "document {} is {}, not completed",
                document_id, document.status
            )));
        }

        if let Some(existing) = self.storage.get_summary(document_id)? {
            return Ok(SummarizeOutcome::Existing(existing));
        }

        let generated = match self.summarizer.generate(text).await {
            Ok(generated) => generated,
            Err(source) => {
                if let Err(e) = self
                    .storage
                    .record_document_error(document_id, &source.to_string())
                {
                    tracing::error!("Could not record summary failure for {}: {}", document_id, e);
                }
                return Err(DigestError::Summarizer {
                    document_id,
                    source,
                });
            }
        };

        let (summary, created) = self.storage.insert_summary_if_absent(
            document_id,
            &generated,
            self.summarizer.model_id(),
        )?;

        Ok(if created {
            SummarizeOutcome::Created(summary)
        } else {
            SummarizeOutcome::Existing(summary)
        })
    }
}
