//! Background dispatch of crawl and summarize jobs
//!
//! Jobs are handed over a channel to a single worker loop that runs each one
//! as its own tokio task, bounded by a semaphore. Every job is an error
//! boundary: its outcome is written to the task record and logged, and
//! nothing escapes to the submitter or to other jobs.

use crate::crawler::{CrawlReport, Coordinator};
use crate::state::TaskStatus;
use crate::storage::Storage;
use crate::{DigestError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// A unit of background work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Recursive crawl rooted at a pending document
    Crawl {
        task_id: String,
        document_id: i64,
        url: String,
        depth: u32,
    },
    /// Summary generation for a completed document
    Summarize {
        task_id: String,
        document_id: i64,
        text: String,
    },
}

impl Job {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Crawl { task_id, .. } | Self::Summarize { task_id, .. } => task_id,
        }
    }
}

/// Runs one job and records its outcome on the task record
struct JobRunner {
    coordinator: Coordinator,
    storage: Arc<dyn Storage>,
    crawl_timeout: Option<Duration>,
}

impl JobRunner {
    async fn run(&self, job: Job) {
        let task_id = job.task_id().to_string();

        if let Err(e) = self
            .storage
            .update_task(&task_id, TaskStatus::Running, None, None)
        {
            tracing::error!("Could not mark task {} running: {}", task_id, e);
        }

        let outcome = match job {
            Job::Crawl {
                document_id,
                url,
                depth,
                ..
            } => self
                .crawl(document_id, &url, depth)
                .await
                .and_then(|report| serde_json::to_string(&report).map_err(DigestError::from)),
            Job::Summarize {
                document_id, text, ..
            } => self
                .coordinator
                .summarize(document_id, &text)
                .await
                .map(|outcome| {
                    serde_json::json!({
                        "summary_id": outcome.summary().id,
                        "created": outcome.is_created(),
                    })
                    .to_string()
                }),
        };

        let recorded = match &outcome {
            Ok(result) => {
                tracing::info!("Task {} completed", task_id);
                self.storage
                    .update_task(&task_id, TaskStatus::Completed, Some(result), None)
            }
            Err(e) => {
                if e.is_expected() {
                    tracing::warn!("Task {} rejected: {}", task_id, e);
                } else {
                    tracing::error!("Task {} failed: {}", task_id, e);
                }
                self.storage
                    .update_task(&task_id, TaskStatus::Failed, None, Some(&e.to_string()))
            }
        };

        if let Err(e) = recorded {
            tracing::error!("Could not record outcome of task {}: {}", task_id, e);
        }
    }

    async fn crawl(&self, document_id: i64, url: &str, depth: u32) -> Result<CrawlReport> {
        let crawl = self.coordinator.run_crawl(document_id, url, depth);

        let Some(limit) = self.crawl_timeout else {
            return crawl.await;
        };

        match tokio::time::timeout(limit, crawl).await {
            Ok(result) => result,
            Err(_) => {
                let error = DigestError::Timeout {
                    url: url.to_string(),
                    seconds: limit.as_secs(),
                };
                let failed = self
                    .storage
                    .fail_processing_in_tree(document_id, &error.to_string())?;
                tracing::warn!(
                    "Crawl of {} timed out, marked {} documents failed",
                    url,
                    failed
                );
                Err(error)
            }
        }
    }
}

/// Hands jobs to the background worker
pub struct Dispatcher {
    sender: mpsc::UnboundedSender<Job>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Starts the worker loop on the current tokio runtime
    ///
    /// # Arguments
    ///
    /// * `coordinator` - Coordinator used by every job
    /// * `storage` - Store holding the task records
    /// * `max_concurrent` - Number of jobs allowed to run at once
    /// * `crawl_timeout` - Wall-clock bound for one crawl job
    pub fn spawn(
        coordinator: Coordinator,
        storage: Arc<dyn Storage>,
        max_concurrent: usize,
        crawl_timeout: Option<Duration>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let runner = Arc::new(JobRunner {
            coordinator,
            storage,
            crawl_timeout,
        });
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let worker = tokio::spawn(worker_loop(receiver, runner, semaphore));

        Self { sender, worker }
    }

    /// Queues a job without waiting for it to run
    pub fn submit(&self, job: Job) -> Result<()> {
        self.sender
            .send(job)
            .map_err(|e| DigestError::Dispatch(format!("worker stopped, dropped {}", e.0.task_id())))
    }

    /// Stops accepting jobs and waits for every queued and running job
    pub async fn shutdown(self) -> Result<()> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| DigestError::Dispatch(format!("worker loop ended abnormally: {}", e)))
    }
}

async fn worker_loop(
    mut receiver: mpsc::UnboundedReceiver<Job>,
    runner: Arc<JobRunner>,
    semaphore: Arc<Semaphore>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(job) = receiver.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        tracing::debug!("Dispatching task {}", job.task_id());
        let runner = runner.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            runner.run(job).await;
        });
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            tracing::error!("Background job aborted: {}", e);
        }
    }
}
