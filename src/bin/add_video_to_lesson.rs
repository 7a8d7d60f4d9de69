use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use magic_academy::config;
use magic_academy::db;
use magic_academy::db::import::{append_link_task, LinkTask};
use magic_academy::model::LinkKind;
use magic_academy::slug::link_kind_for;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Append a video or external link task to an existing lesson"
)]
struct Args {
    /// Lesson id or slug
    lesson: String,

    /// Video or page URL
    url: String,

    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Task title; defaults depend on the link type.
    #[arg(long)]
    title: Option<String>,

    /// Task text; a literal `\n` starts a new line.
    #[arg(long)]
    lines: Option<String>,

    /// Link type; detected from the URL when omitted.
    #[arg(long = "type", value_parser = ["youtube", "link"])]
    kind: Option<String>,

    /// Language code for the task text; defaults to `app.default_language`.
    #[arg(long)]
    language: Option<String>,
}

fn split_lines(raw: &str) -> Vec<String> {
    raw.replace("\\n", "\n")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_title(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Youtube => "Regarde la vidéo",
        LinkKind::Link => "Lien externe",
    }
}

fn default_lines(kind: LinkKind) -> Vec<String> {
    match kind {
        LinkKind::Youtube => vec!["Regarde la vidéo et répète les mots.".to_string()],
        LinkKind::Link => vec!["Ouvre le lien pour continuer.".to_string()],
    }
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

    let kind = args
        .kind
        .as_deref()
        .and_then(LinkKind::parse_kind)
        .unwrap_or_else(|| link_kind_for(&args.url));
    let lines = args
        .lines
        .as_deref()
        .map(split_lines)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| default_lines(kind));
    let task = LinkTask {
        url: args.url.clone(),
        kind,
        title: args
            .title
            .clone()
            .unwrap_or_else(|| default_title(kind).to_string()),
        lines,
    };

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let language = args.language.unwrap_or_else(|| cfg.app.default_language.clone());
    let (lesson_id, task_id) = append_link_task(&pool, &args.lesson, &task, &language).await?;
    println!(
        "Added {} task {} to lesson {}: {}",
        kind.as_str(),
        task_id,
        lesson_id,
        task.url
    );
    Ok(())
}
