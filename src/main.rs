//! Ingestion Worker main entry point
//!
//! This is the command-line interface for the queue-driven ingestion worker.

use anyhow::Context;
use clap::Parser;
use ingestion_worker::config::{load_layered, Config};
use ingestion_worker::conversion::FileConverter;
use ingestion_worker::crawler::{CrawlOrchestrator, HttpCrawlEngine};
use ingestion_worker::queue::{NatsTransport, Publisher};
use ingestion_worker::worker::{run_consumer, ConcurrencyLimiter, Dispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Ingestion Worker: crawls pages and converts documents on demand
///
/// Consumes ingestion tasks from NATS JetStream, runs them with bounded
/// concurrency, and publishes extracted content or failures back to the queue.
#[derive(Parser, Debug)]
#[command(name = "ingestion-worker")]
#[command(version)]
#[command(about = "Queue-driven content ingestion worker", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults and environment only when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate and print the resolved configuration without connecting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    let (config, config_hash) = load_layered(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    match (&cli.config, &config_hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash)
        }
        _ => tracing::info!("Configuration loaded from defaults and environment"),
    }

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    run(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG`, when set, takes precedence over the flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            // Only show errors
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("ingestion_worker=info,warn"),
                1 => EnvFilter::new("ingestion_worker=debug,info"),
                2 => EnvFilter::new("ingestion_worker=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the configuration the worker would run with
fn print_dry_run(config: &Config) {
    println!("=== Ingestion Worker Dry Run ===\n");

    println!("Queue:");
    println!("  NATS URL: {}", config.queue.nats_url);
    println!("  Stream: {}", config.queue.stream);
    println!("  Task subject: {}", config.queue.task_subject);
    println!("  Result subject: {}", config.queue.result_subject);
    println!("  Consumer: {}", config.queue.consumer);
    println!(
        "  Dead-letter subject: {}",
        config.queue.dead_letter_subject.as_deref().unwrap_or("(disabled)")
    );
    println!("  Ack wait: {}s", config.queue.ack_wait_secs);
    println!("  Await publish ack: {}", config.queue.await_publish_ack);

    println!("\nWorker:");
    println!("  Concurrency: {}", config.worker.concurrency);
    println!("  Max retries: {}", config.worker.max_retries);
    println!("  Retry backoff: {}s per attempt", config.worker.retry_backoff_secs);
    println!("  Decode retry delay: {}s", config.worker.decode_retry_delay_secs);
    println!("  Conversion workers: {}", config.worker.conversion_workers);

    println!("\nCrawler:");
    println!("  Page timeout: {}ms", config.crawler.page_timeout_ms);
    println!("  Crawl timeout: {}ms", config.crawler.crawl_timeout_ms);
    println!("  Manifest timeout: {}ms", config.crawler.manifest_timeout_ms);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);
    println!(
        "  Page cache: {} ({} pages, {}s)",
        config.crawler.cache_enabled, config.crawler.cache_capacity, config.crawler.cache_ttl_secs
    );
    println!("  User agent: {}", config.user_agent.header_value());

    println!("\nLLM filter:");
    println!("  Model: {}", config.llm.model);
    println!("  Chunk token threshold: {}", config.llm.chunk_token_threshold);
    println!(
        "  API key: {}",
        if config.llm.api_key.is_some() { "[REDACTED]" } else { "(not set)" }
    );

    println!("\nConversion:");
    println!(
        "  Engine: {}",
        config.conversion.docling_url.as_deref().unwrap_or("local")
    );

    println!("\n✓ Configuration is valid");
}

/// Connects to the broker and processes tasks until a shutdown signal arrives
async fn run(config: Config) -> anyhow::Result<()> {
    let transport = NatsTransport::connect(&config.queue)
        .await
        .context("Failed to connect to the message queue")?;

    let engine = HttpCrawlEngine::from_config(&config).context("Failed to build HTTP client")?;
    let orchestrator = Arc::new(CrawlOrchestrator::from_config(Arc::new(engine), &config));
    let converter = FileConverter::from_config(&config);
    let limiter = ConcurrencyLimiter::new(config.worker.concurrency as usize);
    let publisher: Arc<dyn Publisher> = Arc::new(transport.publisher());

    let source = transport
        .source(limiter.capacity())
        .await
        .context("Failed to bind the task consumer")?;

    let dispatcher = Arc::new(Dispatcher::from_config(
        &config,
        orchestrator,
        converter,
        publisher,
        limiter,
    ));

    tracing::info!("Ingestion worker started");
    run_consumer(source, dispatcher.clone(), shutdown_signal()).await;

    tracing::info!("Final statistics: {}", dispatcher.stats().snapshot());
    transport.close().await;
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
