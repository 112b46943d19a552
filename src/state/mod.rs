//! State module for tracking crawl progress
//!
//! This module provides the lifecycle states persisted in the store.
//!
//! # Components
//!
//! - `DocumentStatus`: Lifecycle of a document (pending, processing, completed, failed)
//! - `TaskKind` / `TaskStatus`: Kind and lifecycle of an externally visible task record

mod document_status;
mod task_state;

// Re-export main types
pub use document_status::DocumentStatus;
pub use task_state::{TaskKind, TaskStatus};
