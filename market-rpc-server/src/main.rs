mod config;
mod error;
mod handler;
mod protocol;
mod scheduler;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use market_data_services::{select_store, MarketPipeline, ScrapeConfig, SessionManager, StoreSettings};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{ServerConfig, DEFAULT_SCHEDULE};
use handler::MarketHandler;
use scheduler::{parse_schedule, Scheduler};
use server::RpcServer;

#[derive(Parser)]
#[command(name = "market-rpc-server")]
#[command(about = "Scheduled market listing scraper with a JSON-RPC read API")]
struct Cli {
    /// Server host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Postgres connection string; without it snapshots live in memory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Postgres TLS mode ("require" enables TLS)
    #[arg(long, env = "PGSSL")]
    pg_ssl: Option<String>,

    /// Cron expression for scheduled cycles (5 or 6 fields)
    #[arg(long, env = "SCRAPE_CRON", default_value = DEFAULT_SCHEDULE)]
    schedule: String,

    /// Disable scheduled cycles; only markets.run triggers a scrape
    #[arg(long)]
    no_schedule: bool,

    /// Rows collected per cycle
    #[arg(long, default_value = "12")]
    run_limit: usize,

    /// Upper bound on rows returned by any read
    #[arg(long, default_value = "50")]
    read_limit_max: usize,

    /// Browser executable to try before the well-known install paths
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            database_url: self.database_url,
            require_tls: StoreSettings::tls_required(self.pg_ssl.as_deref()),
            schedule: self.schedule,
            schedule_enabled: !self.no_schedule,
            run_limit: self.run_limit,
            read_limit_max: self.read_limit_max,
            chrome_path: self.chrome_path,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "market_rpc_server={},market_data_services={}",
                cli.log_level, cli.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.into_config();
    log_config(&config);

    let schedule = if config.schedule_enabled {
        Some(parse_schedule(&config.schedule)?)
    } else {
        None
    };

    let store = select_store(&config.store_settings()).await;
    let sessions = Arc::new(SessionManager::new(config.session_options()));
    let pipeline = Arc::new(
        MarketPipeline::new(
            Arc::clone(&sessions),
            ScrapeConfig::default(),
            store,
            config.limits(),
        )
        .context("Failed to build scrape pipeline")?,
    );

    let shutdown = CancellationToken::new();

    let scheduler_handle = schedule.map(|schedule| {
        let scheduler = Scheduler::new(Arc::clone(&pipeline), schedule);
        tokio::spawn(scheduler.run(shutdown.clone()))
    });

    let server = RpcServer::new(Arc::new(MarketHandler::new(Arc::clone(&pipeline))));
    let addr = config.listen_addr();
    let server_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move { server.run(&addr, server_shutdown).await });

    tokio::select! {
        () = await_shutdown() => {}
        result = server_handle => match result {
            Ok(Ok(())) => tracing::info!("Server stopped"),
            Ok(Err(e)) => tracing::error!("Server failed: {:#}", e),
            Err(e) => tracing::error!("Server task panicked: {}", e),
        },
    }

    shutdown.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = handle.await;
    }
    sessions.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn log_config(config: &ServerConfig) {
    tracing::info!("Market JSON-RPC Server Starting");
    tracing::info!("Configuration:");
    tracing::info!("  Listen: {}", config.listen_addr());
    tracing::info!(
        "  Schedule: {}",
        if config.schedule_enabled { config.schedule.as_str() } else { "disabled" }
    );
    tracing::info!("  Run limit: {}", config.run_limit);
    tracing::info!("  Read limit max: {}", config.read_limit_max);
    tracing::info!("  Database configured: {}", config.database_url.is_some());
    tracing::info!("  Postgres TLS: {}", config.require_tls);
}

/// Load .env from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}
