//! Statistics generation from the digest database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{DocumentStatus, TaskStatus};
use crate::storage::Storage;
use crate::Result;
use std::collections::HashMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of documents known to the store
    pub total_documents: u64,

    /// Count of documents by status
    pub documents_by_status: HashMap<DocumentStatus, u64>,

    /// Count of documents by depth
    pub depth_breakdown: HashMap<u32, u64>,

    /// Number of stored summaries
    pub total_summaries: u64,

    /// Number of recorded links
    pub total_links: u64,

    /// Count of task records by status
    pub tasks_by_status: HashMap<TaskStatus, u64>,
}

impl CrawlStatistics {
    fn documents_in(&self, status: DocumentStatus) -> u64 {
        self.documents_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Percentage of documents that completed
    pub fn completion_rate(&self) -> f64 {
        if self.total_documents == 0 {
            return 0.0;
        }
        (self.documents_in(DocumentStatus::Completed) as f64 / self.total_documents as f64)
            * 100.0
    }

    /// Percentage of completed documents that have a summary
    pub fn summary_coverage(&self) -> f64 {
        let completed = self.documents_in(DocumentStatus::Completed);
        if completed == 0 {
            return 0.0;
        }
        (self.total_summaries as f64 / completed as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(DigestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CrawlStatistics> {
    let mut documents_by_status = HashMap::new();
    for status in DocumentStatus::all_statuses() {
        let count = storage.count_documents_by_status(status)?;
        if count > 0 {
            documents_by_status.insert(status, count);
        }
    }

    let mut tasks_by_status = HashMap::new();
    for status in [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ] {
        let count = storage.count_tasks_by_status(status)?;
        if count > 0 {
            tasks_by_status.insert(status, count);
        }
    }

    Ok(CrawlStatistics {
        total_documents: storage.count_total_documents()?,
        documents_by_status,
        depth_breakdown: storage.get_depth_breakdown()?,
        total_summaries: storage.count_summaries()?,
        total_links: storage.count_links()?,
        tasks_by_status,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Digest Statistics ===\n");

    println!("Overview:");
    println!("  Total documents: {}", stats.total_documents);
    println!("  Summaries stored: {}", stats.total_summaries);
    println!("  Links recorded: {}", stats.total_links);
    println!();

    println!("Documents by Status:");
    let mut status_counts: Vec<_> = stats.documents_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_documents > 0 {
            (*count as f64 / stats.total_documents as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("Documents by Depth:");
        let mut depths: Vec<_> = stats.depth_breakdown.iter().collect();
        depths.sort_by_key(|(depth, _)| **depth);

        for (depth, count) in depths {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.tasks_by_status.is_empty() {
        println!("Tasks:");
        let mut task_counts: Vec<_> = stats.tasks_by_status.iter().collect();
        task_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (status, count) in task_counts {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    println!(
        "Completion Rate: {:.1}% ({} / {} documents completed)",
        stats.completion_rate(),
        stats.documents_in(DocumentStatus::Completed),
        stats.total_documents
    );
    println!("Summary Coverage: {:.1}%", stats.summary_coverage());
}
