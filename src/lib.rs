//! wiki-digest: recursive document fetching and summarization
//!
//! This crate takes a seed article URL, fetches its text from a document
//! source, follows a bounded number of linked articles to a bounded depth,
//! and stores a generated summary for every fetched document. All progress
//! lives in the document store so crawls are resumable and queryable.

pub mod config;
pub mod crawler;
pub mod output;
pub mod source;
pub mod state;
pub mod storage;
pub mod summarizer;
pub mod url;

use thiserror::Error;

/// Main error type for wiki-digest operations
#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Source error for {url}: {source}")]
    Source {
        url: String,
        source: source::SourceError,
    },

    #[error("Source returned no content for {url}")]
    EmptyContent { url: String },

    #[error("Summarization failed for document {document_id}: {source}")]
    Summarizer {
        document_id: i64,
        source: summarizer::SummarizerError,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Crawl of {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Dispatcher is not accepting work: {0}")]
    Dispatch(String),

    #[error("Failed to serialize task result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DigestError {
    /// Returns true for failures reported by the source or summarizer adapters
    pub fn is_adapter_failure(&self) -> bool {
        matches!(
            self,
            Self::Source { .. } | Self::EmptyContent { .. } | Self::Summarizer { .. }
        )
    }

    /// Returns true for outcomes the caller should treat as expected rejections
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::AlreadyExists(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for wiki-digest operations
pub type Result<T> = std::result::Result<T, DigestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, CrawlService, Dispatcher};
pub use state::{DocumentStatus, TaskKind, TaskStatus};
pub use url::normalize_url;
