use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use magic_academy::config;
use magic_academy::db;
use magic_academy::files::FsContentFiles;
use magic_academy::server::{self, AppState};

#[derive(Debug, Parser)]
#[command(author, version, about = "Serve lessons, games, vocabulary and books over HTTP")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = cfg.database_url();
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let files = Arc::new(FsContentFiles::from_config(&cfg));
    let state = AppState::new(pool.clone(), files);
    let app = server::app(state, &cfg);

    let addr = cfg.bind_address()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, database_url = %database_url, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
