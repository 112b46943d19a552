//! OpenAI-compatible chat completions summarizer
//!
//! Works with any provider exposing `POST {endpoint}/chat/completions`
//! (Groq by default).

use crate::config::{SummarizerConfig, UserAgentConfig};
use crate::source::build_http_client;
use crate::summarizer::{truncate_chars, Summarizer, SummarizerError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// Summarizer backed by a chat completions API
pub struct ChatSummarizer {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    model_id: String,
    prompt: String,
    max_input_chars: usize,
}

impl ChatSummarizer {
    /// Creates a summarizer, reading the API key from the configured variable
    pub fn from_env(
        config: &SummarizerConfig,
        user_agent: &UserAgentConfig,
    ) -> Result<Self, SummarizerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SummarizerError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(config, user_agent, api_key)
    }

    pub fn new(
        config: &SummarizerConfig,
        user_agent: &UserAgentConfig,
        api_key: String,
    ) -> Result<Self, SummarizerError> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(&config.endpoint),
            api_key,
            model: config.model.clone(),
            model_id: config.model_id(),
            prompt: config.prompt.clone(),
            max_input_chars: config.max_input_chars,
        })
    }

    fn render_prompt(&self, text: &str) -> String {
        self.prompt
            .replace("{text}", truncate_chars(text, self.max_input_chars))
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, text: &str) -> Result<String, SummarizerError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: self.render_prompt(text),
            }],
        };

        debug!("POST {} ({} chars)", self.endpoint, text.len());
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| SummarizerError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(SummarizerError::EmptyResponse)
    }
}
