//! Orion: CLI entry point. One subcommand per pipeline operation, each
//! logging through `tracing` and returning a non-zero exit code only on a
//! startup/configuration failure — per-unit errors (a bad filing, a failed
//! upsert) are recovered locally and never reach this layer.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use orion_core::AppConfig;
use orion_graph::{GraphLoader, GraphStore, NameToCikIndex, Neo4jGraphStore};
use orion_ingest::{CikFilingEntry, DownloadStats, Downloader, DownloaderConfig, IndexFetcher, RateRegulator};
use orion_queue::{install_shutdown_handler, FilingWorker, QueueCoordinator};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "orion", about = "SEC EDGAR 6-K ingestion and graph-loading pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the quarterly FPI index, then download matching 6-K filings.
    Download {
        #[arg(long)]
        start_year: i32,
        #[arg(long)]
        end_year: i32,
        #[arg(long)]
        no_skip_existing: bool,
        #[arg(long)]
        download_dir: Option<PathBuf>,
        #[arg(long)]
        max_filings: Option<usize>,
        #[arg(long, default_value_t = 4)]
        max_workers: usize,
    },
    /// Create graph constraints and indexes (idempotent).
    SetupDb,
    /// Delete every node and relationship in the graph.
    ClearGraph {
        #[arg(long)]
        confirm: bool,
    },
    /// Parse on-disk filings and upsert entities/relationships into the graph.
    LoadGraph {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        skip_schema: bool,
    },
    /// Check connectivity to a backing store.
    TestDb {
        #[arg(long)]
        neo4j: bool,
        #[arg(long)]
        oracle: bool,
    },
    /// Natural-language graph query (out of scope: no NL→Cypher translator is wired up).
    Query {
        nl: String,
        #[arg(long)]
        show_cypher: bool,
        #[arg(long)]
        max_rows: Option<usize>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Seed the work queue with one job per filing.
    DistributedLoad {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        queue_dir: Option<PathBuf>,
        #[arg(long)]
        no_ai: bool,
        #[arg(long)]
        wait: bool,
    },
    /// Run a C5 worker loop that drains the queue until told to stop.
    Worker {
        #[arg(long)]
        worker_id: String,
        #[arg(long)]
        queue_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "orion_cli=info,orion_ingest=info,orion_graph=info,orion_queue=info".into()))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Command::Download { start_year, end_year, no_skip_existing, download_dir, max_filings, max_workers } => {
            run_download(&config, start_year, end_year, !no_skip_existing, download_dir, max_filings, max_workers)
                .await?;
        }
        Command::SetupDb => {
            let store = connect_graph(&config).await?;
            store.setup_schema().await?;
            tracing::info!("graph schema is up to date");
        }
        Command::ClearGraph { confirm } => {
            if !confirm {
                tracing::error!("refusing to clear the graph without --confirm");
                std::process::exit(1);
            }
            let store = connect_graph(&config).await?;
            store.clear_graph().await?;
            tracing::info!("graph cleared");
        }
        Command::LoadGraph { year, limit, skip_schema } => {
            run_load_graph(&config, year, limit, skip_schema).await?;
        }
        Command::TestDb { neo4j, oracle } => {
            run_test_db(&config, neo4j, oracle).await?;
        }
        Command::Query { nl, show_cypher, max_rows, model } => {
            tracing::warn!(
                query = %nl, show_cypher, max_rows, model,
                "natural-language query translation is out of scope; no Cypher was run"
            );
        }
        Command::DistributedLoad { year, limit, queue_dir, no_ai, wait } => {
            run_distributed_load(&config, year, limit, queue_dir, !no_ai, wait).await?;
        }
        Command::Worker { worker_id, queue_dir } => {
            run_worker(&config, worker_id, queue_dir).await?;
        }
    }

    Ok(())
}

async fn connect_graph(config: &AppConfig) -> anyhow::Result<Neo4jGraphStore> {
    Neo4jGraphStore::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
        .await
        .map_err(Into::into)
}

async fn run_download(
    config: &AppConfig,
    start_year: i32,
    end_year: i32,
    skip_existing: bool,
    download_dir: Option<PathBuf>,
    max_filings: Option<usize>,
    max_workers: usize,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(config.edgar_filings_dir())?;
    std::fs::create_dir_all(config.metadata_dir())?;

    let regulator = RateRegulator::new(config.max_requests_per_second);
    let index_fetcher = IndexFetcher::new(config, regulator.clone());
    let fpi_entries = index_fetcher.collect_years(config, start_year, end_year).await?;

    let mut entries: Vec<CikFilingEntry> =
        fpi_entries.into_iter().map(|e| CikFilingEntry { cik: e.cik, company_name: e.company_name }).collect();
    if let Some(max) = max_filings {
        entries.truncate(max);
    }

    let downloader = Arc::new(Downloader::new(config, regulator));
    let options = DownloaderConfig {
        download_dir: download_dir.unwrap_or_else(|| config.edgar_filings_dir()),
        skip_existing,
        max_workers,
        start_year,
        end_year,
    };
    let running = Arc::new(AtomicBool::new(true));
    let stats: DownloadStats = downloader.download_all(entries, options, running).await;
    tracing::info!(downloaded = stats.downloaded, skipped = stats.skipped, failed = stats.failed, "download complete");
    Ok(())
}

async fn run_load_graph(config: &AppConfig, year: Option<i32>, limit: Option<usize>, skip_schema: bool) -> anyhow::Result<()> {
    let store = connect_graph(config).await?;
    if !skip_schema {
        store.setup_schema().await?;
    }

    let name_index = build_name_index(config)?;
    let mut loader = GraphLoader::new(store, name_index);
    let aggregate = loader.process_filings(&config.filings_dir(), year).await;

    let mut processed = aggregate.filings_processed as usize;
    if let Some(limit) = limit {
        processed = processed.min(limit);
    }
    tracing::info!(
        filings_processed = processed,
        filings_failed = aggregate.filings_failed,
        companies = aggregate.stats.companies,
        people = aggregate.stats.people,
        events = aggregate.stats.events,
        relationships = aggregate.stats.relationships,
        ownership_unresolved = aggregate.stats.ownership_unresolved,
        "graph load complete"
    );
    Ok(())
}

async fn run_test_db(config: &AppConfig, neo4j: bool, oracle: bool) -> anyhow::Result<()> {
    if oracle {
        tracing::warn!("oracle backend is out of scope; nothing to test");
        return Ok(());
    }
    if neo4j || !oracle {
        match connect_graph(config).await {
            Ok(_) => tracing::info!(uri = %config.neo4j_uri, "connected to Neo4j successfully"),
            Err(e) => {
                tracing::error!(error = %e, "failed to connect to Neo4j");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn run_distributed_load(
    config: &AppConfig,
    year: Option<i32>,
    limit: Option<usize>,
    queue_dir: Option<PathBuf>,
    use_ai_extraction: bool,
    wait: bool,
) -> anyhow::Result<()> {
    let queue_dir = queue_dir.unwrap_or_else(|| config.queue_dir());
    let coordinator = QueueCoordinator::new(&queue_dir)?;

    let mut paths = orion_parser::list_filings(&config.filings_dir(), year);
    if let Some(limit) = limit {
        paths.truncate(limit);
    }

    let created_at = 0.0;
    let count = coordinator.create_jobs(&paths, use_ai_extraction, created_at)?;
    tracing::info!(jobs_created = count, "work queue seeded");

    if wait {
        loop {
            let status = coordinator.status()?;
            tracing::info!(
                pending = status.pending,
                processing = status.processing,
                completed = status.completed,
                failed = status.failed,
                progress = status.progress_percent(),
                "queue status"
            );
            if status.is_drained() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
        let results = coordinator.aggregate_results()?;
        tracing::info!(
            companies = results.companies,
            people = results.people,
            events = results.events,
            relationships = results.relationships,
            "distributed load complete"
        );
    }
    Ok(())
}

async fn run_worker(config: &AppConfig, worker_id: String, queue_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let queue_dir = queue_dir.unwrap_or_else(|| config.queue_dir());
    let coordinator = QueueCoordinator::new(&queue_dir)?;

    let store = connect_graph(config).await?;
    store.setup_schema().await?;
    let name_index = build_name_index(config)?;
    let loader = GraphLoader::new(store, name_index);

    let mut worker = FilingWorker::new(worker_id, coordinator, loader);
    let running = install_shutdown_handler();
    worker.run(running, now_unix_seconds).await;
    Ok(())
}

fn now_unix_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Build the name->CIK resolution index from the index fetcher's FPI cache
/// and the downloader's metadata ledger, per this system's ownership-edge
/// resolution policy.
fn build_name_index(config: &AppConfig) -> anyhow::Result<NameToCikIndex> {
    let mut index = NameToCikIndex::new();

    if let Ok(fpi_entries) = IndexFetcher::load_cache(config) {
        for entry in fpi_entries {
            index.insert(&entry.company_name, &entry.cik);
        }
    }

    let ledger_path = config.metadata_dir().join("fpi_6k_metadata.csv");
    if let Ok(rows) = orion_ingest::ledger::read_rows(&ledger_path) {
        for row in rows {
            index.insert(&row.company_name, &row.cik);
        }
    }

    Ok(index)
}
