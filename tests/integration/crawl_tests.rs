//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the MediaWiki API and the chat
//! completions API, and run full crawls through the service against an
//! on-disk SQLite database.

use std::path::Path;
use std::sync::Arc;
use wiki_digest::config::{
    Config, CrawlerConfig, OutputConfig, SourceConfig, SummarizerConfig, UserAgentConfig,
};
use wiki_digest::crawler::{Coordinator, CrawlService, CrawlSettings};
use wiki_digest::source::WikipediaSource;
use wiki_digest::state::{DocumentStatus, TaskStatus};
use wiki_digest::storage::{SqliteStorage, Storage};
use wiki_digest::summarizer::ChatSummarizer;
use wiki_digest::DigestError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the given mock servers
fn create_test_config(wiki: &MockServer, llm: &MockServer, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            crawl_timeout_secs: 30,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        source: SourceConfig {
            api_endpoint: format!("{}/w/api.php", wiki.uri()),
            request_timeout_secs: 5,
            ..SourceConfig::default()
        },
        summarizer: SummarizerConfig {
            endpoint: format!("{}/openai/v1", llm.uri()),
            request_timeout_secs: 5,
            ..SummarizerConfig::default()
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn build_service(config: &Config) -> (Arc<SqliteStorage>, CrawlService) {
    let db_path = Path::new(&config.output.database_path);
    let storage = Arc::new(SqliteStorage::new(db_path).unwrap());
    let source = WikipediaSource::new(
        &config.source,
        &config.user_agent,
        config.crawler.link_fanout,
    )
    .unwrap();
    let summarizer =
        ChatSummarizer::new(&config.summarizer, &config.user_agent, "test-key".to_string())
            .unwrap();

    let coordinator = Coordinator::new(
        storage.clone(),
        Arc::new(source),
        Arc::new(summarizer),
        CrawlSettings::from(&config.crawler),
    );
    let service = CrawlService::new(storage.clone(), coordinator, &config.crawler);
    (storage, service)
}

async fn mount_page(server: &MockServer, title: &str, extract: &str, links: &[&str]) {
    let links: Vec<_> = links
        .iter()
        .map(|t| serde_json::json!({ "ns": 0, "title": t }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "extracts|links"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": { "pages": [ { "title": title, "extract": extract, "links": links } ] }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("prop", "extracts"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": { "pages": [ { "title": title, "extract": extract } ] }
        })))
        .mount(server)
        .await;
}

async fn mount_missing(server: &MockServer, title: &str) {
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("titles", title))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": { "pages": [ { "title": title, "missing": true } ] }
        })))
        .mount(server)
        .await;
}

async fn mount_chat(server: &MockServer, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": "A short summary." } } ]
        }))
    } else {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": { "message": "service unavailable" }
        }))
    };

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_with_summaries() {
    let wiki = MockServer::start().await;
    let llm = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("digest.db");

    mount_page(&wiki, "Rust", "Rust is a language.", &["Cargo", "Stub", "Ferris"]).await;
    mount_page(&wiki, "Cargo", "Cargo is the package manager.", &[]).await;
    mount_page(&wiki, "Stub", "", &[]).await;
    mount_page(&wiki, "Ferris", "Ferris is a crab.", &[]).await;
    mount_chat(&llm, 200).await;

    let config = create_test_config(&wiki, &llm, db_path.to_str().unwrap());
    let (storage, service) = build_service(&config);

    let submission = service
        .start_crawl("https://en.wikipedia.org/wiki/Rust")
        .unwrap();
    assert_eq!(submission.status, TaskStatus::Pending);
    service.shutdown().await.unwrap();

    let task = storage.get_task(&submission.task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed, "task error: {:?}", task.error);

    let root = storage.get_document(submission.document_id).unwrap().unwrap();
    assert_eq!(root.status, DocumentStatus::Completed);
    assert_eq!(root.title, "Rust");

    let children = storage.get_children(root.id).unwrap();
    let urls: Vec<_> = children.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://en.wikipedia.org/wiki/Cargo",
            "https://en.wikipedia.org/wiki/Ferris"
        ]
    );
    for child in &children {
        assert_eq!(child.depth, 1);
        assert_eq!(child.status, DocumentStatus::Completed);
    }

    assert_eq!(storage.count_summaries().unwrap(), 3);
    let summary = storage.get_summary(root.id).unwrap().unwrap();
    assert_eq!(summary.text, "A short summary.");
    assert_eq!(summary.model_used, "groq-gemma2-9b-it");
}

#[tokio::test]
async fn test_missing_article_fails_task() {
    let wiki = MockServer::start().await;
    let llm = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("digest.db");

    mount_missing(&wiki, "Nonexistent article").await;
    mount_chat(&llm, 200).await;

    let config = create_test_config(&wiki, &llm, db_path.to_str().unwrap());
    let (storage, service) = build_service(&config);

    let submission = service
        .start_crawl("https://en.wikipedia.org/wiki/Nonexistent_article")
        .unwrap();
    service.shutdown().await.unwrap();

    let task = storage.get_task(&submission.task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);

    let root = storage.get_document(submission.document_id).unwrap().unwrap();
    assert_eq!(root.status, DocumentStatus::Failed);
    assert!(root.error_message.is_some());
    assert_eq!(storage.count_summaries().unwrap(), 0);
    assert_eq!(storage.count_total_documents().unwrap(), 1);
}

#[tokio::test]
async fn test_summaries_can_be_generated_after_outage() {
    let wiki = MockServer::start().await;
    let down = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("digest.db");

    mount_page(&wiki, "Rust", "Rust is a language.", &[]).await;
    mount_chat(&down, 503).await;

    let config = create_test_config(&wiki, &down, db_path.to_str().unwrap());
    let (storage, service) = build_service(&config);
    let submission = service
        .start_crawl("https://en.wikipedia.org/wiki/Rust")
        .unwrap();
    service.shutdown().await.unwrap();

    let root = storage.get_document(submission.document_id).unwrap().unwrap();
    assert_eq!(root.status, DocumentStatus::Completed);
    assert!(root
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("service unavailable"));
    assert!(storage.get_summary(root.id).unwrap().is_none());
    drop(storage);

    // Second run against the same database with a healthy model
    let up = MockServer::start().await;
    mount_chat(&up, 200).await;
    let config = create_test_config(&wiki, &up, db_path.to_str().unwrap());
    let (storage, service) = build_service(&config);

    let submission = service
        .start_summarize("https://en.wikipedia.org/wiki/Rust")
        .unwrap();
    let again = service.start_crawl("https://en.wikipedia.org/wiki/Rust");
    assert!(matches!(again, Err(DigestError::AlreadyExists(_))));
    service.shutdown().await.unwrap();

    let task = storage.get_task(&submission.task_id).unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(storage.get_summary(root.id).unwrap().is_some());
}

#[tokio::test]
async fn test_expand_children_follows_links_to_depth_bound() {
    let wiki = MockServer::start().await;
    let llm = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("digest.db");

    mount_page(&wiki, "Alpha", "Alpha text.", &["Beta"]).await;
    mount_page(&wiki, "Beta", "Beta text.", &["Gamma"]).await;
    mount_page(&wiki, "Gamma", "Gamma text.", &[]).await;
    mount_chat(&llm, 200).await;

    let mut config = create_test_config(&wiki, &llm, db_path.to_str().unwrap());
    config.crawler.expand_children = true;
    config.crawler.max_depth = 1;
    let (storage, service) = build_service(&config);

    let submission = service
        .start_crawl("https://en.wikipedia.org/wiki/Alpha")
        .unwrap();
    service.shutdown().await.unwrap();

    let beta = storage
        .get_document_by_url("https://en.wikipedia.org/wiki/Beta")
        .unwrap()
        .unwrap();
    assert_eq!(beta.status, DocumentStatus::Completed);
    assert_eq!(beta.content, "Beta text.");
    assert_eq!(beta.parent_id, Some(submission.document_id));
    assert!(storage
        .get_document_by_url("https://en.wikipedia.org/wiki/Gamma")
        .unwrap()
        .is_none());
    assert_eq!(storage.count_summaries().unwrap(), 2);
}
