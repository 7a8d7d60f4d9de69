use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use magic_academy::config;
use magic_academy::db;
use magic_academy::db::import::import_lessons;
use magic_academy::model::LessonsFile;

#[derive(Debug, Parser)]
#[command(author, version, about = "Add lessons with their tasks from a JSON file")]
struct Args {
    /// Lessons file (`{"lessons": [...]}`)
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
    let parsed: LessonsFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let language = args.language.unwrap_or_else(|| cfg.app.default_language.clone());
    info!(file = %args.file.display(), count = parsed.lessons.len(), "adding lessons");
    let summary = import_lessons(&pool, &parsed.lessons, &language).await?;

    println!(
        "{} lessons added ({} tasks), {} already present",
        summary.lessons_added, summary.tasks_added, summary.lessons_skipped
    );
    Ok(())
}
