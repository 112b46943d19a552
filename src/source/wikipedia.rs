//! MediaWiki API document source
//!
//! Fetches plain-text extracts through the `action=query` API. The article
//! title is taken from the `/wiki/` segment of the document URL; linked
//! articles are probed one at a time until enough of them have text.

use crate::config::{SourceConfig, UserAgentConfig};
use crate::source::{
    build_http_client, DocumentSource, FetchResult, SourceDocument, SourceError, SourceLink,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    links: Vec<ApiLink>,
}

#[derive(Debug, Deserialize)]
struct ApiLink {
    title: String,
}

/// Document source backed by a MediaWiki installation (Wikipedia by default)
pub struct WikipediaSource {
    client: Client,
    api_endpoint: String,
    article_base_url: String,
    link_fanout: usize,
}

impl WikipediaSource {
    /// Creates a source from configuration
    ///
    /// `link_fanout` bounds how many linked articles with text are returned
    /// for each fetched document.
    pub fn new(
        config: &SourceConfig,
        user_agent: &UserAgentConfig,
        link_fanout: usize,
    ) -> Result<Self, SourceError> {
        let client = build_http_client(
            user_agent,
            Duration::from_secs(config.request_timeout_secs),
        )
        .map_err(SourceError::Client)?;

        Ok(Self {
            client,
            api_endpoint: config.api_endpoint.clone(),
            article_base_url: config.article_base_url.clone(),
            link_fanout,
        })
    }

    /// Builds the canonical article URL for a title
    pub fn article_url(&self, title: &str) -> String {
        format!("{}{}", self.article_base_url, title.replace(' ', "_"))
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Option<ApiPage>, SourceError> {
        let response = self
            .client
            .get(&self.api_endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("explaintext", "1"),
                ("redirects", "1"),
            ])
            .query(params)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: self.api_endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.api_endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let raw = response.text().await.map_err(|source| SourceError::Http {
            url: self.api_endpoint.clone(),
            source,
        })?;
        let parsed: QueryResponse =
            serde_json::from_str(&raw).map_err(|e| SourceError::Decode {
                url: self.api_endpoint.clone(),
                message: e.to_string(),
            })?;

        let page = parsed
            .query
            .and_then(|body| body.pages.into_iter().next())
            .filter(|page| !page.missing && !page.invalid);

        Ok(page)
    }

    /// Fetches only the plain-text extract of an article
    async fn extract(&self, title: &str) -> Result<Option<String>, SourceError> {
        let page = self
            .query(&[("prop", "extracts"), ("titles", title)])
            .await?;
        Ok(page.and_then(|p| p.extract))
    }
}

#[async_trait]
impl DocumentSource for WikipediaSource {
    async fn fetch(&self, url: &str) -> Result<FetchResult, SourceError> {
        let title = title_from_url(url)?;

        let page = match self
            .query(&[
                ("prop", "extracts|links"),
                ("titles", title.as_str()),
                ("plnamespace", "0"),
                ("pllimit", "max"),
            ])
            .await?
        {
            Some(page) => page,
            None => return Ok(FetchResult::NotFound),
        };

        let mut links = Vec::new();
        for link in &page.links {
            if links.len() >= self.link_fanout {
                break;
            }

            // A linked article that cannot be probed is dropped, not the parent
            let text = match self.extract(&link.title).await {
                Ok(text) => text.unwrap_or_default(),
                Err(e) => {
                    warn!("Skipping link {}: {}", link.title, e);
                    continue;
                }
            };
            if text.trim().is_empty() {
                debug!("Skipping link without text: {}", link.title);
                continue;
            }

            links.push(SourceLink {
                url: self.article_url(&link.title),
                title: link.title.clone(),
                text,
            });
        }

        Ok(FetchResult::Found(SourceDocument {
            title: page.title,
            text: page.extract.unwrap_or_default(),
            links,
        }))
    }
}

/// Extracts the article title from a `/wiki/<Title>` URL
///
/// Percent-escapes are decoded and underscores become spaces.
pub fn title_from_url(url: &str) -> Result<String, SourceError> {
    let parsed = url::Url::parse(url).map_err(|_| SourceError::InvalidUrl(url.to_string()))?;

    let raw = parsed
        .path()
        .split_once("/wiki/")
        .map(|(_, title)| title)
        .filter(|title| !title.is_empty())
        .ok_or_else(|| SourceError::InvalidUrl(url.to_string()))?;

    let decoded =
        urlencoding::decode(raw).map_err(|_| SourceError::InvalidUrl(url.to_string()))?;

    Ok(decoded.replace('_', " "))
}
