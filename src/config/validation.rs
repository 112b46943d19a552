use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, SourceConfig, SummarizerConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on `max-depth`; deeper crawls fan out beyond any useful size
const MAX_DEPTH_LIMIT: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_source_config(&config.source)?;
    validate_summarizer_config(&config.summarizer)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_depth > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_depth must be at most {}, got {}",
            MAX_DEPTH_LIMIT, config.max_depth
        )));
    }

    if config.link_fanout < 1 || config.link_fanout > 50 {
        return Err(ConfigError::Validation(format!(
            "link_fanout must be between 1 and 50, got {}",
            config.link_fanout
        )));
    }

    if config.max_concurrent_crawls < 1 || config.max_concurrent_crawls > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_crawls must be between 1 and 64, got {}",
            config.max_concurrent_crawls
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates document source configuration
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    validate_http_url("api_endpoint", &config.api_endpoint)?;
    validate_http_url("article_base_url", &config.article_base_url)?;

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "source request_timeout_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates summarizer configuration
fn validate_summarizer_config(config: &SummarizerConfig) -> Result<(), ConfigError> {
    validate_http_url("summarizer endpoint", &config.endpoint)?;

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    if !config.prompt.contains("{text}") {
        return Err(ConfigError::Validation(
            "prompt must contain the {text} placeholder".to_string(),
        ));
    }

    if config.max_input_chars < 100 {
        return Err(ConfigError::Validation(format!(
            "max_input_chars must be >= 100, got {}",
            config.max_input_chars
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "summarizer request_timeout_secs must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Must contain exactly one @ with text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
