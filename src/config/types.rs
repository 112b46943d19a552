use serde::Deserialize;

/// Main configuration structure for wiki-digest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum recursion distance from the root document
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of linked documents followed from one document
    #[serde(rename = "link-fanout", default = "default_link_fanout")]
    pub link_fanout: usize,

    /// Fetch each new child from the source and keep expanding it,
    /// instead of trusting the inline content returned with the parent
    #[serde(rename = "expand-children", default)]
    pub expand_children: bool,

    /// Number of crawl units allowed to run at the same time
    #[serde(rename = "max-concurrent-crawls", default = "default_max_concurrent_crawls")]
    pub max_concurrent_crawls: usize,

    /// Wall-clock bound for one root crawl, in seconds (0 disables it)
    #[serde(rename = "crawl-timeout-secs", default = "default_crawl_timeout_secs")]
    pub crawl_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            link_fanout: default_link_fanout(),
            expand_children: false,
            max_concurrent_crawls: default_max_concurrent_crawls(),
            crawl_timeout_secs: default_crawl_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Document source (MediaWiki API) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// MediaWiki `api.php` endpoint
    #[serde(rename = "api-endpoint", default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Base URL that article titles are appended to
    #[serde(rename = "article-base-url", default = "default_article_base_url")]
    pub article_base_url: String,

    #[serde(rename = "request-timeout-secs", default = "default_source_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            article_base_url: default_article_base_url(),
            request_timeout_secs: default_source_timeout_secs(),
        }
    }
}

/// Summarization model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerConfig {
    /// Provider label, recorded as part of the model identifier
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Prompt template; `{text}` is replaced with the document text
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Maximum characters of document text sent to the model
    #[serde(rename = "max-input-chars", default = "default_max_input_chars")]
    pub max_input_chars: usize,

    #[serde(rename = "request-timeout-secs", default = "default_summarizer_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl SummarizerConfig {
    /// Identifier stored alongside every generated summary
    pub fn model_id(&self) -> String {
        format!("{}-{}", self.provider, self.model)
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: default_summarizer_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            prompt: default_prompt(),
            max_input_chars: default_max_input_chars(),
            request_timeout_secs: default_summarizer_timeout_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_max_depth() -> u32 {
    5
}

fn default_link_fanout() -> usize {
    5
}

fn default_max_concurrent_crawls() -> usize {
    4
}

fn default_crawl_timeout_secs() -> u64 {
    900
}

fn default_api_endpoint() -> String {
    "https://en.wikipedia.org/w/api.php".to_string()
}

fn default_article_base_url() -> String {
    "https://en.wikipedia.org/wiki/".to_string()
}

fn default_source_timeout_secs() -> u64 {
    30
}

fn default_provider() -> String {
    "groq".to_string()
}

fn default_summarizer_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "gemma2-9b-it".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_prompt() -> String {
    "Summarize the following text: {text}".to_string()
}

fn default_max_input_chars() -> usize {
    24_000
}

fn default_summarizer_timeout_secs() -> u64 {
    60
}
