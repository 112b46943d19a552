//! Document source adapters
//!
//! A document source turns a document URL into its title, plain text and a
//! bounded list of linked documents that carry their own text. The crawl
//! coordinator only sees the [`DocumentSource`] trait.

mod wikipedia;

pub use wikipedia::{title_from_url, WikipediaSource};

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// A linked document returned together with its parent
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLink {
    pub url: String,
    pub title: String,
    pub text: String,
}

/// A fetched document
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub title: String,
    pub text: String,
    /// Linked documents in source order, already bounded by the adapter
    pub links: Vec<SourceLink>,
}

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Found(SourceDocument),
    /// The source has no document for this URL
    NotFound,
}

/// Errors reported by a document source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },

    #[error("Source returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Not a document URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

/// Trait for document source implementations
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetches a document and its bounded set of linked documents
    async fn fetch(&self, url: &str) -> Result<FetchResult, SourceError>;
}

/// Builds an HTTP client that identifies the crawler
///
/// Format of the user agent: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}
