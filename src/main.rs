//! Multi-chain indexer CLI.
//!
//! Subcommands:
//! - `run` - connect to the store and run every enabled chain until a
//!   shutdown signal arrives.
//! - `reload` - one-shot config-store reconciliation snapshot (no listeners
//!   are started); useful for validating operator-edited config before
//!   restarting `run`.
//! - `status` - print the configured chain/contract set from the store.
//!
//! `reload`/`status` report the config store's view, not a running `run`
//! process's live listener state — this crate has no HTTP control surface
//! (an explicit Non-goal) to query a sibling process, so there is no live
//! state to report outside of the process that's actually running `run`.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use multichain_indexer::config::{LoggingSettings, Settings};
use multichain_indexer::config_reloader::ConfigReloader;
use multichain_indexer::dispatcher::EventDispatcher;
use multichain_indexer::handlers::TransferHandler;
use multichain_indexer::ports::{ConfigStore, EventStore};
use multichain_indexer::store::PostgresStore;
use multichain_indexer::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "multichain-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration environment: selects `config/{environment}.toml`.
    #[arg(short, long, env = "INDEXER_ENVIRONMENT", default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the supervisor and config reload loop, blocking until shutdown.
    Run,
    /// Print a one-shot reconciliation snapshot from the config store.
    Reload,
    /// Print the chains and contracts currently configured in the store.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.environment) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = init_tracing(&settings.logging);

    let result = match cli.command {
        Commands::Run => run_indexer(settings).await,
        Commands::Reload => reload(settings).await,
        Commands::Status => status(settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "indexer exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(settings: &LoggingSettings) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&settings.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let (writer, guard) = match &settings.file_path {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("indexer.log"));
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if settings.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }
    Some(guard)
}

async fn connect_store(settings: &Settings) -> eyre::Result<PostgresStore> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .min_connections(settings.database.min_connections)
        .acquire_timeout(Duration::from_millis(settings.database.connect_timeout_ms))
        .connect(&settings.database.url)
        .await?;

    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    Ok(store)
}

async fn run_indexer(settings: Settings) -> eyre::Result<()> {
    info!(version = multichain_indexer::VERSION, "starting multi-chain indexer");

    let store = Arc::new(connect_store(&settings).await?);
    let config_store: Arc<dyn ConfigStore> = store.clone();
    let event_store: Arc<dyn EventStore> = store.clone();

    let dispatcher = Arc::new(EventDispatcher::default());
    dispatcher.register_handler(Arc::new(TransferHandler::new(event_store)));

    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&config_store),
        Arc::clone(&dispatcher),
        settings.scan,
    ));
    supervisor.start_all().await?;

    let reloader = Arc::new(ConfigReloader::new(
        Arc::clone(&supervisor),
        config_store,
        settings.scan.contract_refresh_interval_ms,
    ));
    reloader.start();

    info!("indexer running; awaiting SIGINT/SIGTERM");
    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    reloader.stop().await;
    supervisor.shutdown().await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn reload(settings: Settings) -> eyre::Result<()> {
    let store = connect_store(&settings).await?;
    let configs = store.get_chain_configs().await?;
    let enabled = configs.iter().filter(|c| c.enabled).count();

    info!(total = configs.len(), enabled, "config store reconciliation snapshot");
    for config in &configs {
        println!(
            "{:<6} {:<28} type={:<7} strategy={:<7} enabled={}",
            config.chain_id,
            config.name,
            config.chain_type,
            config.strategy,
            config.enabled
        );
    }
    Ok(())
}

async fn status(settings: Settings) -> eyre::Result<()> {
    let store = connect_store(&settings).await?;
    let configs = store.get_chain_configs().await?;

    for config in &configs {
        let contracts = store
            .get_contract_configs(config.chain_id)
            .await
            .unwrap_or_default();
        let enabled_contracts = contracts.iter().filter(|c| c.enabled).count();
        println!(
            "chain {} ({}): enabled={} effective_strategy={} contracts={}/{}",
            config.chain_id,
            config.name,
            config.enabled,
            config.effective_strategy(),
            enabled_contracts,
            contracts.len()
        );
    }
    Ok(())
}
