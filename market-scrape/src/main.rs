use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use market_data_services::{
    select_store, MarketPipeline, PipelineLimits, ScrapeConfig, SessionManager, SessionOptions,
    StoreSettings, DEFAULT_RUN_LIMIT,
};
use tracing::{info, Level};

/// One-shot market listing scrape
///
/// Launches a headless browser, loads the listing, stores up to `--limit`
/// rows and exits. Without a reachable database the rows only live for the
/// duration of the process, which is still useful together with `--export`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maximum rows to collect
    #[arg(short = 'n', long, default_value_t = DEFAULT_RUN_LIMIT)]
    limit: usize,

    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Postgres TLS mode ("require" enables TLS)
    #[arg(long, env = "PGSSL")]
    pg_ssl: Option<String>,

    /// Browser executable to try before the well-known install paths
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Print the stored rows as CSV after the run
    #[arg(short = 'x', long)]
    export: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

impl Args {
    /// Parse log level from string
    fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            database_url: self.database_url.clone(),
            require_tls: StoreSettings::tls_required(self.pg_ssl.as_deref()),
            ..StoreSettings::default()
        }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            executable_override: self.chrome_path.clone(),
            ..SessionOptions::default()
        }
    }

    /// Reads are capped at the run size so `--export` shows this run's rows.
    fn limits(&self) -> PipelineLimits {
        PipelineLimits {
            run_limit: self.limit,
            read_limit_max: self.limit,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Initialize logging to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Configuration:");
    info!("  Limit: {}", args.limit);
    info!("  Database configured: {}", args.database_url.is_some());
    if let Some(path) = &args.chrome_path {
        info!("  Browser override: {}", path.display());
    }

    let store = select_store(&args.store_settings()).await;
    let sessions = Arc::new(SessionManager::new(args.session_options()));
    let pipeline = MarketPipeline::new(
        Arc::clone(&sessions),
        ScrapeConfig::default(),
        store,
        args.limits(),
    )
    .context("Failed to build scrape pipeline")?;

    let result = pipeline.run(args.limit).await;
    sessions.shutdown().await;
    let outcome = result.context("Scrape cycle failed")?;

    println!("Saved {} rows from {}", outcome.saved, outcome.source_url);

    if args.export {
        let table = pipeline
            .export_table(None)
            .await
            .context("Failed to export rows")?;
        print!("{}", table);
    }

    Ok(())
}
