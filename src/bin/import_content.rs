use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use magic_academy::config;
use magic_academy::db;
use magic_academy::db::import::import_content;
use magic_academy::model::ContentFile;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Seed lessons, home page cards and reorder games from a content export"
)]
struct Args {
    /// Content export (`{"pages": [...], "lessons": {...}, "reorderGames": [...]}`)
    file: PathBuf,

    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Language code for imported text; defaults to `app.default_language`.
    #[arg(long)]
    language: Option<String>,
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

    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let content: ContentFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let language = args.language.unwrap_or_else(|| cfg.app.default_language.clone());
    info!(
        file = %args.file.display(),
        lessons = content.lessons.len(),
        games = content.reorder_games.len(),
        "importing content"
    );
    let summary = import_content(&pool, &content, &language).await?;

    println!(
        "Lessons: {} added, {} skipped ({} tasks)",
        summary.lessons_added, summary.lessons_skipped, summary.tasks_added
    );
    println!(
        "Reorder games: {} added, {} skipped",
        summary.games_added, summary.games_skipped
    );
    Ok(())
}
