//! Batch writers used by the command-line import tools.
//!
//! Media and link rows are deduplicated on their natural key (image path,
//! audio path + language, game path, link URL) so re-running an import
//! reuses existing rows. Every public entry point runs in one transaction.

use super::Pool;
use crate::model::{
    BookInput, ContentFile, LessonInput, LinkKind, PageInput, ReorderGameInput, TaskInput,
};
use crate::slug::{lesson_slug, slugify};
use anyhow::{anyhow, Context, Result};
use sqlx::{Row, SqliteConnection};
use tracing::{info, instrument, warn};

use super::repo::Identifier;

/// Default tag given to lessons imported without one.
pub const DEFAULT_LESSON_TAG: &str = "Nouveau";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub lessons_added: usize,
    pub lessons_skipped: usize,
    pub tasks_added: usize,
    pub games_added: usize,
    pub games_skipped: usize,
}

/// Outcome of adding one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOutcome {
    pub id: i64,
    pub slug: String,
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Natural-key lookups
// ---------------------------------------------------------------------------

pub async fn get_or_create_language(conn: &mut SqliteConnection, code: &str) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM languages WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }
    let id = sqlx::query_scalar::<_, i64>("INSERT INTO languages (code) VALUES (?) RETURNING id")
        .bind(code)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

pub async fn insert_text(
    conn: &mut SqliteConnection,
    content: &str,
    language_id: i64,
) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO text_translations (content, language_id) VALUES (?, ?) RETURNING id",
    )
    .bind(content)
    .bind(language_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_optional_text(
    conn: &mut SqliteConnection,
    content: Option<&str>,
    language_id: i64,
) -> Result<Option<i64>> {
    match content {
        Some(text) => Ok(Some(insert_text(conn, text, language_id).await?)),
        None => Ok(None),
    }
}

pub async fn get_or_create_image(conn: &mut SqliteConnection, file_path: &str) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM images WHERE file_path = ?")
        .bind(file_path)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }
    let id = sqlx::query_scalar::<_, i64>("INSERT INTO images (file_path) VALUES (?) RETURNING id")
        .bind(file_path)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn optional_image(conn: &mut SqliteConnection, file_path: Option<&str>) -> Result<Option<i64>> {
    match file_path.filter(|p| !p.trim().is_empty()) {
        Some(path) => Ok(Some(get_or_create_image(conn, path).await?)),
        None => Ok(None),
    }
}

pub async fn get_or_create_audio(
    conn: &mut SqliteConnection,
    file_path: &str,
    language_id: i64,
) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM audio_content WHERE file_path = ? AND language_id = ?",
    )
    .bind(file_path)
    .bind(language_id)
    .fetch_optional(&mut *conn)
    .await?
    {
        return Ok(id);
    }
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO audio_content (file_path, language_id) VALUES (?, ?) RETURNING id",
    )
    .bind(file_path)
    .bind(language_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_or_create_game(
    conn: &mut SqliteConnection,
    title: Option<&str>,
    path: &str,
) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM games WHERE path = ?")
        .bind(path)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }
    let id =
        sqlx::query_scalar::<_, i64>("INSERT INTO games (title, path) VALUES (?, ?) RETURNING id")
            .bind(title)
            .bind(path)
            .fetch_one(&mut *conn)
            .await?;
    Ok(id)
}

pub async fn get_or_create_external_link(
    conn: &mut SqliteConnection,
    url: &str,
    kind: LinkKind,
) -> Result<i64> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM external_links WHERE link = ?")
        .bind(url)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(id);
    }
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO external_links (link, type) VALUES (?, ?) RETURNING id",
    )
    .bind(url)
    .bind(kind.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Numeric input is tried as an id first, then everything is tried as a slug.
pub async fn resolve_lesson_id(conn: &mut SqliteConnection, identifier: &str) -> Result<Option<i64>> {
    if let Identifier::Id(id) = Identifier::parse(identifier) {
        if let Some(found) = sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        {
            return Ok(Some(found));
        }
    }
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE slug = ?")
        .bind(identifier)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found)
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

/// Import a list of lessons in one transaction.
#[instrument(skip_all, fields(count = lessons.len()))]
pub async fn import_lessons(
    pool: &Pool,
    lessons: &[LessonInput],
    language: &str,
) -> Result<ImportSummary> {
    let mut tx = pool.begin().await?;
    let language_id = get_or_create_language(&mut tx, language).await?;
    let mut summary = ImportSummary::default();
    for lesson in lessons {
        insert_lesson(&mut tx, lesson, language_id, &mut summary).await?;
    }
    tx.commit().await?;
    info!(?summary, "lessons imported");
    Ok(summary)
}

/// Import a historical content export: lessons keyed by slug with their home
/// page cards merged in, plus reorder games. One transaction for everything.
#[instrument(skip_all)]
pub async fn import_content(
    pool: &Pool,
    content: &ContentFile,
    language: &str,
) -> Result<ImportSummary> {
    let mut tx = pool.begin().await?;
    let language_id = get_or_create_language(&mut tx, language).await?;
    let mut summary = ImportSummary::default();

    for (slug, lesson) in &content.lessons {
        let page = content.pages.iter().find(|p| &p.slug == slug);
        let merged = merge_page(slug, lesson, page);
        insert_lesson(&mut tx, &merged, language_id, &mut summary).await?;
    }
    for game in &content.reorder_games {
        insert_reorder_game(&mut tx, game, &mut summary).await?;
    }

    tx.commit().await?;
    info!(?summary, "content imported");
    Ok(summary)
}

/// Lesson fields win; the page card fills what the lesson leaves empty.
fn merge_page(slug: &str, lesson: &LessonInput, page: Option<&PageInput>) -> LessonInput {
    let mut merged = lesson.clone();
    merged.slug = Some(slug.to_string());
    if let Some(page) = page {
        merged.title = merged.title.or_else(|| page.title.clone());
        merged.description = merged.description.or_else(|| page.description.clone());
        merged.preview_image = merged.preview_image.or_else(|| page.cover.clone());
        merged.tag = merged.tag.or_else(|| page.tag.clone());
    }
    merged
}

async fn insert_lesson(
    conn: &mut SqliteConnection,
    lesson: &LessonInput,
    language_id: i64,
    summary: &mut ImportSummary,
) -> Result<()> {
    if let Some(slug) = lesson.slug.as_deref() {
        let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(id) = existing {
            warn!(slug, lesson_id = id, "lesson already exists; skipping");
            summary.lessons_skipped += 1;
            return Ok(());
        }
    }

    let title_id = insert_optional_text(conn, lesson.title.as_deref(), language_id).await?;
    let description_id =
        insert_optional_text(conn, lesson.description.as_deref(), language_id).await?;
    let main_image_id = optional_image(conn, lesson.main_image.as_deref()).await?;
    let preview_image_id = optional_image(conn, lesson.preview_image.as_deref()).await?;

    let breadcrumb = match (&lesson.breadcrumb, &lesson.title) {
        (Some(crumbs), _) => crumbs.clone(),
        (None, Some(title)) => vec![title.clone()],
        (None, None) => Vec::new(),
    };
    let breadcrumb_json = serde_json::to_string(&breadcrumb)?;
    let tag = lesson.tag.as_deref().unwrap_or(DEFAULT_LESSON_TAG);

    let lesson_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lessons (title_id, description_id, main_image_id, preview_image_id, \
                              image_alt, breadcrumb_json, tag) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(title_id)
    .bind(description_id)
    .bind(main_image_id)
    .bind(preview_image_id)
    .bind(lesson.image_alt.as_deref())
    .bind(&breadcrumb_json)
    .bind(tag)
    .fetch_one(&mut *conn)
    .await?;

    // The fallback slug embeds the id, so it is assigned after the insert.
    let slug = lesson
        .slug
        .clone()
        .unwrap_or_else(|| lesson_slug(lesson_id));
    sqlx::query("UPDATE lessons SET slug = ? WHERE id = ?")
        .bind(&slug)
        .bind(lesson_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to assign slug {slug}"))?;

    for (position, task) in lesson.tasks.iter().enumerate() {
        insert_task(conn, lesson_id, position as i64, task, language_id).await?;
        summary.tasks_added += 1;
    }
    summary.lessons_added += 1;
    info!(lesson_id, slug = %slug, tasks = lesson.tasks.len(), "lesson created");
    Ok(())
}

async fn insert_task(
    conn: &mut SqliteConnection,
    lesson_id: i64,
    position: i64,
    task: &TaskInput,
    language_id: i64,
) -> Result<i64> {
    let title_id = insert_optional_text(conn, task.title.as_deref(), language_id).await?;
    let image_id = optional_image(conn, task.image.as_deref()).await?;
    let game_id = match task.game.as_deref().filter(|g| !g.trim().is_empty()) {
        Some(path) => Some(get_or_create_game(conn, task.title.as_deref(), path).await?),
        None => None,
    };
    let link_id = match &task.link {
        Some(link) => Some(get_or_create_external_link(conn, &link.url, link.kind).await?),
        None => None,
    };

    let task_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lesson_tasks (lesson_id, position, title_id, image_id, game_id, external_link_id) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(lesson_id)
    .bind(position)
    .bind(title_id)
    .bind(image_id)
    .bind(game_id)
    .bind(link_id)
    .fetch_one(&mut *conn)
    .await?;

    let lines = task.lines.clone().into_lines();
    insert_task_lines(conn, task_id, &lines).await?;

    for (position, src) in task.audio_sources().into_iter().enumerate() {
        let audio_id = get_or_create_audio(conn, src, language_id).await?;
        sqlx::query("INSERT INTO lesson_task_audios (task_id, position, audio_id) VALUES (?, ?, ?)")
            .bind(task_id)
            .bind(position as i64)
            .bind(audio_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(task_id)
}

async fn insert_task_lines(conn: &mut SqliteConnection, task_id: i64, lines: &[String]) -> Result<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query("INSERT INTO lesson_task_lines (task_id, position, content) VALUES (?, ?, ?)")
            .bind(task_id)
            .bind(position as i64)
            .bind(line)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// A task that points at a video or web page, appended to an existing lesson.
#[derive(Debug, Clone)]
pub struct LinkTask {
    pub url: String,
    pub kind: LinkKind,
    pub title: String,
    pub lines: Vec<String>,
}

/// Append a link task at the end of a lesson. Returns `(lesson_id, task_id)`.
#[instrument(skip_all, fields(lesson = %lesson_identifier))]
pub async fn append_link_task(
    pool: &Pool,
    lesson_identifier: &str,
    task: &LinkTask,
    language: &str,
) -> Result<(i64, i64)> {
    let mut tx = pool.begin().await?;
    let lesson_id = resolve_lesson_id(&mut tx, lesson_identifier)
        .await?
        .ok_or_else(|| anyhow!("lesson not found: {}", lesson_identifier))?;
    let language_id = get_or_create_language(&mut tx, language).await?;

    // Next position is one past the current maximum (0 for an empty lesson).
    let max_position: Option<i64> =
        sqlx::query_scalar("SELECT MAX(position) FROM lesson_tasks WHERE lesson_id = ?")
            .bind(lesson_id)
            .fetch_one(&mut *tx)
            .await?;
    let position = max_position.map_or(0, |p| p + 1);

    let link_id = get_or_create_external_link(&mut tx, &task.url, task.kind).await?;
    let title_id = insert_text(&mut tx, &task.title, language_id).await?;
    let task_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lesson_tasks (lesson_id, position, title_id, external_link_id) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(lesson_id)
    .bind(position)
    .bind(title_id)
    .bind(link_id)
    .fetch_one(&mut *tx)
    .await?;
    insert_task_lines(&mut tx, task_id, &task.lines).await?;

    tx.commit().await?;
    info!(lesson_id, task_id, position, url = %task.url, "link task appended");
    Ok((lesson_id, task_id))
}

// ---------------------------------------------------------------------------
// Reorder games
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(count = games.len()))]
pub async fn import_reorder_games(pool: &Pool, games: &[ReorderGameInput]) -> Result<ImportSummary> {
    let mut tx = pool.begin().await?;
    let mut summary = ImportSummary::default();
    for game in games {
        insert_reorder_game(&mut tx, game, &mut summary).await?;
    }
    tx.commit().await?;
    Ok(summary)
}

async fn insert_reorder_game(
    conn: &mut SqliteConnection,
    game: &ReorderGameInput,
    summary: &mut ImportSummary,
) -> Result<()> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM reorder_games WHERE slug = ?")
        .bind(&game.slug)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        warn!(slug = %game.slug, game_id = id, "reorder game already exists; skipping");
        summary.games_skipped += 1;
        return Ok(());
    }

    let row = sqlx::query(
        "INSERT INTO reorder_games (id, slug, title, description) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(game.id)
    .bind(&game.slug)
    .bind(game.title.as_deref())
    .bind(game.description.as_deref())
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to insert reorder game {}", game.slug))?;
    let game_id: i64 = row.get("id");

    for (position, level) in game.levels.iter().enumerate() {
        let sentence_json = serde_json::to_string(&level.sentence)?;
        sqlx::query(
            "INSERT INTO reorder_levels (game_id, position, image, sentence_json, audio) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(game_id)
        .bind(position as i64)
        .bind(level.image.as_deref())
        .bind(&sentence_json)
        .bind(level.audio.as_deref())
        .execute(&mut *conn)
        .await?;
    }
    summary.games_added += 1;
    info!(game_id, slug = %game.slug, levels = game.levels.len(), "reorder game created");
    Ok(())
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

/// Add books in one transaction; an existing slug is reported and reused.
#[instrument(skip_all, fields(count = books.len()))]
pub async fn import_books(pool: &Pool, books: &[BookInput]) -> Result<Vec<BookOutcome>> {
    let mut tx = pool.begin().await?;
    let mut outcomes = Vec::with_capacity(books.len());
    for book in books {
        outcomes.push(insert_book(&mut tx, book).await?);
    }
    tx.commit().await?;
    Ok(outcomes)
}

async fn insert_book(conn: &mut SqliteConnection, book: &BookInput) -> Result<BookOutcome> {
    let slug = book
        .slug
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| slugify(&book.title, '-'));
    if slug.is_empty() {
        return Err(anyhow!("cannot derive a slug from title {:?}", book.title));
    }

    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM books WHERE slug = ?")
        .bind(&slug)
        .fetch_optional(&mut *conn)
        .await?
    {
        warn!(slug = %slug, book_id = id, "book already exists");
        return Ok(BookOutcome {
            id,
            slug,
            created: false,
        });
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO books (title, slug, cover_image, pdf_path, page_count) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&book.title)
    .bind(&slug)
    .bind(book.cover.as_deref())
    .bind(&book.pdf)
    .bind(book.page_count.unwrap_or(0))
    .fetch_one(&mut *conn)
    .await?;
    info!(book_id = id, slug = %slug, "book added");
    Ok(BookOutcome {
        id,
        slug,
        created: true,
    })
}
