use anyhow::Context;
use clap::Parser;
use savesync::api::{create_api_server, ConfigTokens};
use savesync::config::{SharedConfig, SETTINGS_FILE};
use savesync::ledger::SyncLedger;
use savesync::metrics::{init_metrics, start_metrics_server, MetricsConfig};
use savesync::service::SaveSyncService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Game save synchronization server
#[derive(Parser)]
#[command(name = "savesync-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(short, long, default_value = SETTINGS_FILE)]
    config: PathBuf,

    /// Override the bind address from the settings file
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = SharedConfig::from_file(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.update(|c| c.bind_addr = bind)?;
    }
    let settings = config.snapshot();

    match settings.metrics_addr {
        Some(addr) => {
            start_metrics_server(MetricsConfig::with_addr(addr))?;
        }
        None => init_metrics(),
    }

    let ledger = SyncLedger::new(&settings.database_url)
        .await
        .with_context(|| format!("opening sync ledger {}", settings.database_url))?;
    let service = SaveSyncService::new(config.clone(), ledger);
    service
        .layout()
        .ensure_roots()
        .with_context(|| format!("creating storage under {}", settings.data_root.display()))?;

    #[cfg(unix)]
    spawn_reload_on_sighup(config.clone())?;

    let app = create_api_server(service, Arc::new(ConfigTokens::new(config)));

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;

    tracing::info!(
        addr = %settings.bind_addr,
        data_root = %settings.data_root.display(),
        backups_limit = settings.backups_limit,
        checksum = ?settings.checksum,
        "savesync server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Re-read the settings file whenever the process receives SIGHUP
#[cfg(unix)]
fn spawn_reload_on_sighup(config: SharedConfig) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            if let Err(e) = config.reload() {
                tracing::error!(error = %e, "settings reload failed, keeping previous settings");
            }
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
