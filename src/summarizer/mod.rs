//! Summarization adapters
//!
//! A summarizer turns document text into a short generated summary and
//! reports the model identifier that is stored with every summary.

mod chat;

pub use chat::ChatSummarizer;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a summarizer
#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("Request to summarization API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Summarization API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Summarization API returned no text")]
    EmptyResponse,

    #[error("Could not decode summarization response: {0}")]
    Decode(String),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),
}

/// Trait for summarization model clients
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Identifier recorded as `model_used` on generated summaries
    fn model_id(&self) -> &str;

    /// Generates a summary for the given text
    async fn generate(&self, text: &str) -> Result<String, SummarizerError>;
}

/// Truncates text to at most `max_chars` characters without splitting one
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
