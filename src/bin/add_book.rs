use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use magic_academy::config;
use magic_academy::db;
use magic_academy::db::import::import_books;
use magic_academy::model::{BookInput, BooksFile};

#[derive(Debug, Parser)]
#[command(author, version, about = "Register e-books from a JSON file or from flags")]
struct Args {
    /// Books file (`{"books": [...]}` or a single book object)
    file: Option<PathBuf>,

    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    title: Option<String>,

    /// Path of the PDF as served to the browser
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    pdf: Option<String>,

    #[arg(long, conflicts_with = "file")]
    cover: Option<String>,

    /// Defaults to a hyphenated slug of the title.
    #[arg(long, conflicts_with = "file")]
    slug: Option<String>,

    /// Number of pages
    #[arg(long = "pages", conflicts_with = "file")]
    page_count: Option<i64>,
}

impl Args {
    async fn books(&self) -> Result<Vec<BookInput>> {
        if let Some(path) = &self.file {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let parsed: BooksFile = serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            return Ok(parsed.into_books());
        }
        Ok(vec![BookInput {
            title: self.title.clone().unwrap_or_default(),
            pdf: self.pdf.clone().unwrap_or_default(),
            slug: self.slug.clone(),
            cover: self.cover.clone(),
            page_count: self.page_count,
        }])
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
    let books = args.books().await?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    for outcome in import_books(&pool, &books).await? {
        if outcome.created {
            println!("Added book {} (id {})", outcome.slug, outcome.id);
        } else {
            println!("Book {} already exists (id {})", outcome.slug, outcome.id);
        }
    }
    Ok(())
}
