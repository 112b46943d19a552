//! Output module for reporting on crawl results
//!
//! This module handles:
//! - Recording and printing crawl statistics
//! - Exporting a crawl tree with its summaries as markdown

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_tree, load_tree, write_markdown_export, ExportNode};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
