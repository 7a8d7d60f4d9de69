use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use magic_academy::config;
use magic_academy::db::{self, LessonSummary};

#[derive(Debug, Parser)]
#[command(author, version, about = "Print a summary of the lesson database")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// How many recent lessons and audio-less tasks to list
    #[arg(long, default_value_t = 10)]
    limit: i64,

    /// Window for "recently added", in hours
    #[arg(long, default_value_t = 24)]
    hours: i64,
}

fn describe(lesson: &LessonSummary) -> String {
    format!(
        "#{:<4} {:<24} {:<40} tasks={:<3} preview={} created={}",
        lesson.id,
        lesson.slug.as_deref().unwrap_or("-"),
        lesson.title.as_deref().unwrap_or("(untitled)"),
        lesson.task_count,
        lesson.preview.as_deref().unwrap_or("-"),
        lesson.created_at.format("%Y-%m-%d %H:%M"),
    )
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
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let stats = db::content_stats(&pool).await?;
    println!("== Content ==");
    println!("lessons:       {}", stats.lessons);
    println!("tasks:         {}", stats.tasks);
    println!("images:        {}", stats.images);
    println!("audio files:   {}", stats.audio);
    println!("games:         {}", stats.games);
    println!("reorder games: {}", stats.reorder_games);
    println!("books:         {}", stats.books);

    println!("\n== {} most recent lessons ==", args.limit);
    for lesson in db::recent_lessons(&pool, args.limit).await? {
        println!("{}", describe(&lesson));
    }

    let empty = db::lessons_without_tasks(&pool).await?;
    println!("\n== Lessons without tasks ({}) ==", empty.len());
    for lesson in &empty {
        println!("{}", describe(lesson));
    }

    let silent = db::tasks_without_audio(&pool, args.limit).await?;
    println!("\n== Tasks without audio (first {}) ==", args.limit);
    for task in &silent {
        println!(
            "task #{} in lesson #{}: {}",
            task.id,
            task.lesson_id,
            task.title.as_deref().unwrap_or("(untitled)")
        );
    }

    let fresh = db::lessons_created_since(&pool, args.hours).await?;
    println!("\n== Added in the last {} hours ({}) ==", args.hours, fresh.len());
    for lesson in &fresh {
        println!("{}", describe(lesson));
    }
    Ok(())
}
