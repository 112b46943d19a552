//! wiki-digest main entry point
//!
//! This is the command-line interface for the wiki-digest crawler.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wiki_digest::config::{load_config_with_hash, Config};
use wiki_digest::crawler::{
    lookup_document, lookup_document_by_url, lookup_summary, lookup_task, Coordinator,
    CrawlService, CrawlSettings, Submission,
};
use wiki_digest::output::{load_statistics, load_tree, print_statistics, write_markdown_export};
use wiki_digest::source::WikipediaSource;
use wiki_digest::storage::{open_storage, SqliteStorage, Storage};
use wiki_digest::summarizer::ChatSummarizer;

/// wiki-digest: recursive article fetching and summarization
///
/// Fetches an article, follows a bounded number of its links to a bounded
/// depth, and stores a generated summary for every fetched article.
#[derive(Parser, Debug)]
#[command(name = "wiki-digest")]
#[command(version)]
#[command(about = "Recursive article fetching and summarization", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "wiki-digest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl an article and the articles it links to, then wait for completion
    Crawl {
        /// Article URL, e.g. https://en.wikipedia.org/wiki/Rust
        url: String,
    },

    /// Generate the summary of an already fetched article
    Summarize { url: String },

    /// Show a stored document
    Status { document_id: i64 },

    /// Show a task record
    Task { task_id: String },

    /// Print the stored summary of an article
    Summary { url: String },

    /// Show statistics from the database
    Stats,

    /// Write a markdown report of a crawl tree
    Export {
        url: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Mark documents left processing by an interrupted run as failed
    Recover,

    /// Validate the configuration and print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Crawl { url } => handle_crawl(&config, &url).await,
        Command::Summarize { url } => handle_summarize(&config, &url).await,
        Command::Status { document_id } => handle_status(&config, document_id),
        Command::Task { task_id } => handle_task(&config, &task_id),
        Command::Summary { url } => handle_summary(&config, &url),
        Command::Stats => handle_stats(&config),
        Command::Export { url, output } => handle_export(&config, &url, output.as_deref()),
        Command::Recover => handle_recover(&config),
        Command::CheckConfig => {
            handle_check_config(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wiki_digest=info,warn"),
            1 => EnvFilter::new("wiki_digest=debug,info"),
            2 => EnvFilter::new("wiki_digest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<Arc<SqliteStorage>> {
    let path = Path::new(&config.output.database_path);
    let storage = open_storage(path)
        .with_context(|| format!("failed to open database {}", path.display()))?;
    Ok(Arc::new(storage))
}

/// Wires storage, source and summarizer into a running service
fn build_service(config: &Config) -> anyhow::Result<CrawlService> {
    let storage = open_database(config)?;

    let source = WikipediaSource::new(
        &config.source,
        &config.user_agent,
        config.crawler.link_fanout,
    )
    .context("failed to build document source")?;
    let summarizer = ChatSummarizer::from_env(&config.summarizer, &config.user_agent)
        .context("failed to build summarizer")?;

    let coordinator = Coordinator::new(
        storage.clone(),
        Arc::new(source),
        Arc::new(summarizer),
        CrawlSettings::from(&config.crawler),
    );

    Ok(CrawlService::new(storage, coordinator, &config.crawler))
}

/// Waits for the background job and prints the final task record
async fn finish(service: CrawlService, submission: &Submission) -> anyhow::Result<()> {
    println!("Task {} queued for {}", submission.task_id, submission.url);

    let storage = service.storage().clone();
    service.shutdown().await?;

    let task = lookup_task(storage.as_ref(), &submission.task_id)?;
    println!("Task {}: {}", task.task_id, task.status);
    if let Some(result) = &task.result {
        println!("  Result: {}", result);
    }
    if let Some(error) = &task.error {
        println!("  Error: {}", error);
    }

    let document = lookup_document(storage.as_ref(), submission.document_id)?;
    println!("Document {}: {}", document.id, document.status);

    Ok(())
}

async fn handle_crawl(config: &Config, url: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Crawl bounds: depth {}, fanout {}, expand children: {}",
        config.crawler.max_depth,
        config.crawler.link_fanout,
        config.crawler.expand_children
    );

    let service = build_service(config)?;
    let submission = match service.start_crawl(url) {
        Ok(submission) => submission,
        Err(e) => {
            service.shutdown().await?;
            return Err(e).context("crawl was not started");
        }
    };

    finish(service, &submission).await
}

async fn handle_summarize(config: &Config, url: &str) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let submission = match service.start_summarize(url) {
        Ok(submission) => submission,
        Err(e) => {
            service.shutdown().await?;
            return Err(e).context("summary was not started");
        }
    };

    finish(service, &submission).await
}

fn handle_status(config: &Config, document_id: i64) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let document = lookup_document(storage.as_ref(), document_id)?;

    println!("Document {}", document.id);
    println!("  URL: {}", document.url);
    println!("  Title: {}", document.title);
    println!("  Status: {}", document.status);
    println!("  Depth: {}", document.depth);
    if let Some(parent_id) = document.parent_id {
        println!("  Parent: {}", parent_id);
    }
    if let Some(error) = &document.error_message {
        println!("  Error: {}", error);
    }
    println!(
        "  Summary: {}",
        if storage.get_summary(document.id)?.is_some() {
            "yes"
        } else {
            "no"
        }
    );
    println!("  Children: {}", storage.get_children(document.id)?.len());
    println!("  Updated: {}", document.updated_at);

    Ok(())
}

fn handle_task(config: &Config, task_id: &str) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let task = lookup_task(storage.as_ref(), task_id)?;

    println!("Task {}", task.task_id);
    println!("  Kind: {}", task.kind);
    println!("  Status: {}", task.status);
    if let Some(document_id) = task.document_id {
        println!("  Document: {}", document_id);
    }
    if let Some(result) = &task.result {
        println!("  Result: {}", result);
    }
    if let Some(error) = &task.error {
        println!("  Error: {}", error);
    }
    println!("  Created: {}", task.created_at);
    println!("  Updated: {}", task.updated_at);

    Ok(())
}

fn handle_summary(config: &Config, url: &str) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let view = lookup_summary(storage.as_ref(), url)?;

    println!("# {}\n", view.title);
    println!("{}\n", view.summary);
    println!("({}, {}, {})", view.url, view.model_used, view.created_at);

    Ok(())
}

fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(storage.as_ref())?;
    print_statistics(&stats);

    Ok(())
}

fn handle_export(config: &Config, url: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let root = lookup_document_by_url(storage.as_ref(), url)?;
    let tree = load_tree(storage.as_ref(), root)?;

    match output {
        Some(path) => {
            let written = write_markdown_export(&tree, path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Exported {} documents to: {}", written, path.display());
        }
        None => print!("{}", wiki_digest::output::format_markdown_tree(&tree)),
    }

    Ok(())
}

fn handle_recover(config: &Config) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let failed = storage.fail_interrupted("interrupted before completion")?;
    println!("✓ Marked {} interrupted documents as failed", failed);
    Ok(())
}

fn handle_check_config(config: &Config) {
    println!("=== wiki-digest Configuration ===\n");

    println!("Crawler:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Link fanout: {}", config.crawler.link_fanout);
    println!("  Expand children: {}", config.crawler.expand_children);
    println!(
        "  Max concurrent crawls: {}",
        config.crawler.max_concurrent_crawls
    );
    println!("  Crawl timeout: {}s", config.crawler.crawl_timeout_secs);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nSource:");
    println!("  API endpoint: {}", config.source.api_endpoint);
    println!("  Article base URL: {}", config.source.article_base_url);

    println!("\nSummarizer:");
    println!("  Model: {}", config.summarizer.model_id());
    println!("  Endpoint: {}", config.summarizer.endpoint);
    println!(
        "  API key variable: {} ({})",
        config.summarizer.api_key_env,
        if std::env::var(&config.summarizer.api_key_env).is_ok() {
            "set"
        } else {
            "not set"
        }
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}
