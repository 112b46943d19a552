//! Crawler module for recursive document fetching and summarization
//!
//! This module contains the core crawling logic, including:
//! - Recursive fetch/summarize orchestration with depth and fanout bounds
//! - Background dispatch with bounded concurrency
//! - The entry points used by the command line front end

mod coordinator;
mod dispatcher;
mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{
    Coordinator, CrawlReport, CrawlSettings, SummarizeOutcome, UNKNOWN_TITLE,
};
pub use dispatcher::{Dispatcher, Job};
pub use service::{
    lookup_document, lookup_document_by_url, lookup_summary, lookup_task, CrawlService,
    Submission, SummaryView,
};
