use super::model::{ContentStats, LessonRow, LessonSummary, TaskRow, TaskSummary};
use super::Pool;
use crate::model::{
    lesson_duration, Book, ExternalLink, Lesson, LessonPreview, Level, LinkKind, ReorderGame,
    Task, TaskAudio,
};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use tracing::{instrument, warn};

/// A path segment that names an entity either by numeric id or by slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Id(i64),
    Slug(String),
}

impl Identifier {
    /// Integer-looking input takes precedence and is treated as an id.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(id) => Identifier::Id(id),
            Err(_) => Identifier::Slug(raw.to_string()),
        }
    }
}

/// Decode an embedded JSON column. NULL or blank yields the default; a parse
/// failure is logged and also yields the default so one bad row never fails
/// the whole request.
pub fn parse_json_column<T>(raw: Option<&str>, column: &'static str, owner: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return T::default();
    };
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(column, owner, error = %err, "malformed JSON column; substituting empty value");
            T::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

const LESSON_SELECT: &str = "SELECT l.id, l.slug, tt.content AS title, td.content AS description, \
            im.file_path AS main_image, ip.file_path AS preview_image, \
            l.image_alt, l.tag, l.breadcrumb_json \
     FROM lessons l \
     LEFT JOIN text_translations tt ON l.title_id = tt.id \
     LEFT JOIN text_translations td ON l.description_id = td.id \
     LEFT JOIN images im ON l.main_image_id = im.id \
     LEFT JOIN images ip ON l.preview_image_id = ip.id";

#[instrument(skip_all)]
pub async fn list_lesson_previews(pool: &Pool) -> Result<Vec<LessonPreview>> {
    let rows = sqlx::query(
        "SELECT l.id, l.slug, tt.content AS title, td.content AS description, \
                ip.file_path AS cover, l.tag, l.created_at, COUNT(lt.id) AS task_count \
         FROM lessons l \
         LEFT JOIN text_translations tt ON l.title_id = tt.id \
         LEFT JOIN text_translations td ON l.description_id = td.id \
         LEFT JOIN images ip ON l.preview_image_id = ip.id \
         LEFT JOIN lesson_tasks lt ON lt.lesson_id = l.id \
         WHERE l.slug IS NOT NULL \
         GROUP BY l.id \
         ORDER BY l.id ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to list lessons")?;

    let previews = rows
        .into_iter()
        .map(|row| {
            let task_count: i64 = row.get("task_count");
            LessonPreview {
                id: row.get("id"),
                slug: row.get("slug"),
                title: row.get("title"),
                description: row.get("description"),
                cover: row.get("cover"),
                tag: row.get("tag"),
                created_at: row.get("created_at"),
                task_count,
                duration: lesson_duration(task_count),
            }
        })
        .collect();
    Ok(previews)
}

pub async fn fetch_lesson_by_slug(pool: &Pool, slug: &str) -> Result<Option<Lesson>> {
    fetch_lesson(pool, &Identifier::Slug(slug.to_string())).await
}

#[instrument(skip(pool))]
pub async fn fetch_lesson(pool: &Pool, key: &Identifier) -> Result<Option<Lesson>> {
    let row = match key {
        Identifier::Id(id) => {
            let sql = format!("{LESSON_SELECT} WHERE l.id = ? AND l.slug IS NOT NULL");
            sqlx::query(&sql).bind(*id).fetch_optional(pool).await
        }
        Identifier::Slug(slug) => {
            let sql = format!("{LESSON_SELECT} WHERE l.slug = ?");
            sqlx::query(&sql).bind(slug.as_str()).fetch_optional(pool).await
        }
    }
    .context("failed to load lesson")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let lesson = lesson_row(&row);
    let breadcrumb: Vec<String> =
        parse_json_column(lesson.breadcrumb_json.as_deref(), "breadcrumb_json", &lesson.slug);
    let tasks = fetch_tasks(pool, lesson.id).await?;

    Ok(Some(Lesson {
        id: lesson.id,
        slug: lesson.slug,
        title: lesson.title,
        description: lesson.description,
        main_image: lesson.main_image,
        preview_image: lesson.preview_image,
        image_alt: lesson.image_alt,
        tag: lesson.tag,
        breadcrumb,
        tasks,
    }))
}

fn lesson_row(row: &SqliteRow) -> LessonRow {
    LessonRow {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        description: row.get("description"),
        main_image: row.get("main_image"),
        preview_image: row.get("preview_image"),
        image_alt: row.get("image_alt"),
        tag: row.get("tag"),
        breadcrumb_json: row.get("breadcrumb_json"),
    }
}

/// Tasks in position order, with lines and audio loaded in one query each
/// for the whole lesson.
async fn fetch_tasks(pool: &Pool, lesson_id: i64) -> Result<Vec<Task>> {
    let rows = sqlx::query(
        "SELECT lt.id, tt.content AS title, img.file_path AS image, g.path AS game, \
                el.link AS link_url, el.type AS link_type \
         FROM lesson_tasks lt \
         LEFT JOIN text_translations tt ON lt.title_id = tt.id \
         LEFT JOIN images img ON lt.image_id = img.id \
         LEFT JOIN games g ON lt.game_id = g.id \
         LEFT JOIN external_links el ON lt.external_link_id = el.id \
         WHERE lt.lesson_id = ? \
         ORDER BY lt.position ASC, lt.id ASC",
    )
    .bind(lesson_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to load tasks for lesson {lesson_id}"))?;

    let task_rows: Vec<TaskRow> = rows
        .iter()
        .map(|row| TaskRow {
            id: row.get("id"),
            title: row.get("title"),
            image: row.get("image"),
            game: row.get("game"),
            link_url: row.get("link_url"),
            link_type: row.get("link_type"),
        })
        .collect();
    let task_ids: Vec<i64> = task_rows.iter().map(|t| t.id).collect();

    let mut lines = fetch_grouped(
        pool,
        "SELECT task_id, content AS value FROM lesson_task_lines WHERE task_id IN (",
        &task_ids,
        "ORDER BY task_id, position",
    )
    .await
    .context("failed to load task lines")?;
    let mut audios = fetch_grouped(
        pool,
        "SELECT a.task_id, ac.file_path AS value FROM lesson_task_audios a \
         JOIN audio_content ac ON a.audio_id = ac.id WHERE a.task_id IN (",
        &task_ids,
        "ORDER BY a.task_id, a.position",
    )
    .await
    .context("failed to load task audio")?;

    let tasks = task_rows
        .into_iter()
        .map(|row| Task {
            title: row.title,
            lines: lines.remove(&row.id).unwrap_or_default(),
            image: row.image,
            audio: TaskAudio::from_sources(audios.remove(&row.id).unwrap_or_default()),
            game: row.game,
            link: row.link_url.map(|url| ExternalLink {
                url,
                kind: row
                    .link_type
                    .as_deref()
                    .and_then(LinkKind::parse_kind)
                    .unwrap_or(LinkKind::Link),
            }),
        })
        .collect();
    Ok(tasks)
}

/// Run `head <ids...>) order` and group the `value` column by `task_id`,
/// keeping row order within each group.
async fn fetch_grouped(
    pool: &Pool,
    head: &str,
    task_ids: &[i64],
    order: &str,
) -> Result<HashMap<i64, Vec<String>>> {
    let mut grouped: HashMap<i64, Vec<String>> = HashMap::new();
    if task_ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(head);
    let mut ids = qb.separated(", ");
    for id in task_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ");
    qb.push(order);

    let rows = qb.build().fetch_all(pool).await?;
    for row in rows {
        let task_id: i64 = row.get("task_id");
        let value: Option<String> = row.get("value");
        if let Some(value) = value {
            grouped.entry(task_id).or_default().push(value);
        }
    }
    Ok(grouped)
}

// ---------------------------------------------------------------------------
// Reorder games
// ---------------------------------------------------------------------------

#[instrument(skip(pool))]
pub async fn fetch_reorder_game(pool: &Pool, key: &Identifier) -> Result<Option<ReorderGame>> {
    let row = match key {
        Identifier::Id(id) => {
            sqlx::query("SELECT id, slug, title, description FROM reorder_games WHERE id = ?")
                .bind(*id)
                .fetch_optional(pool)
                .await
        }
        Identifier::Slug(slug) => {
            sqlx::query("SELECT id, slug, title, description FROM reorder_games WHERE slug = ?")
                .bind(slug.as_str())
                .fetch_optional(pool)
                .await
        }
    }
    .context("failed to load reorder game")?;

    let Some(row) = row else {
        return Ok(None);
    };
    let game_id: i64 = row.get("id");
    let slug: String = row.get("slug");

    let levels = sqlx::query(
        "SELECT image, sentence_json, audio FROM reorder_levels \
         WHERE game_id = ? ORDER BY position ASC, id ASC",
    )
    .bind(game_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to load levels for reorder game {game_id}"))?
    .into_iter()
    .map(|level| {
        let sentence_json: Option<String> = level.get("sentence_json");
        Level {
            image: level.get("image"),
            sentence: parse_json_column(sentence_json.as_deref(), "sentence_json", &slug),
            audio: level.get("audio"),
        }
    })
    .collect();

    Ok(Some(ReorderGame {
        id: game_id,
        title: row.get("title"),
        description: row.get("description"),
        slug,
        levels,
    }))
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

const BOOK_SELECT: &str =
    "SELECT id, title, slug, cover_image, pdf_path, page_count, created_at FROM books";

fn book_row(row: &SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        cover: row.get("cover_image"),
        pdf: row.get("pdf_path"),
        page_count: row.get("page_count"),
        created_at: row.get("created_at"),
    }
}

#[instrument(skip_all)]
pub async fn list_books(pool: &Pool) -> Result<Vec<Book>> {
    let sql = format!("{BOOK_SELECT} ORDER BY created_at DESC, id DESC");
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("failed to list books")?;
    Ok(rows.iter().map(book_row).collect())
}

#[instrument(skip(pool))]
pub async fn fetch_book_by_slug(pool: &Pool, slug: &str) -> Result<Option<Book>> {
    let sql = format!("{BOOK_SELECT} WHERE slug = ?");
    let row = sqlx::query(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to load book")?;
    Ok(row.as_ref().map(book_row))
}

pub async fn book_exists(pool: &Pool, slug: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM books WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("failed to look up book")?;
    Ok(found.is_some())
}

// ---------------------------------------------------------------------------
// Maintenance reports
// ---------------------------------------------------------------------------

const LESSON_SUMMARY_SELECT: &str = "SELECT l.id, l.slug, tt.content AS title, \
            (SELECT COUNT(*) FROM lesson_tasks WHERE lesson_id = l.id) AS task_count, \
            img.file_path AS preview, l.created_at \
     FROM lessons l \
     LEFT JOIN text_translations tt ON l.title_id = tt.id \
     LEFT JOIN images img ON l.preview_image_id = img.id";

fn lesson_summary(row: &SqliteRow) -> LessonSummary {
    LessonSummary {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        task_count: row.get("task_count"),
        preview: row.get("preview"),
        created_at: row.get("created_at"),
    }
}

pub async fn content_stats(pool: &Pool) -> Result<ContentStats> {
    let row = sqlx::query(
        "SELECT \
            (SELECT COUNT(*) FROM lessons) AS lessons, \
            (SELECT COUNT(*) FROM lesson_tasks) AS tasks, \
            (SELECT COUNT(*) FROM images) AS images, \
            (SELECT COUNT(*) FROM audio_content) AS audio, \
            (SELECT COUNT(*) FROM games) AS games, \
            (SELECT COUNT(*) FROM books) AS books, \
            (SELECT COUNT(*) FROM reorder_games) AS reorder_games",
    )
    .fetch_one(pool)
    .await
    .context("failed to count content")?;

    Ok(ContentStats {
        lessons: row.get("lessons"),
        tasks: row.get("tasks"),
        images: row.get("images"),
        audio: row.get("audio"),
        games: row.get("games"),
        books: row.get("books"),
        reorder_games: row.get("reorder_games"),
    })
}

pub async fn recent_lessons(pool: &Pool, limit: i64) -> Result<Vec<LessonSummary>> {
    let sql = format!("{LESSON_SUMMARY_SELECT} ORDER BY l.id DESC LIMIT ?");
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    Ok(rows.iter().map(lesson_summary).collect())
}

pub async fn lessons_without_tasks(pool: &Pool) -> Result<Vec<LessonSummary>> {
    let sql = format!(
        "{LESSON_SUMMARY_SELECT} \
         WHERE NOT EXISTS (SELECT 1 FROM lesson_tasks lt WHERE lt.lesson_id = l.id) \
         ORDER BY l.id ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    Ok(rows.iter().map(lesson_summary).collect())
}

pub async fn lessons_created_since(pool: &Pool, hours: i64) -> Result<Vec<LessonSummary>> {
    let sql = format!(
        "{LESSON_SUMMARY_SELECT} \
         WHERE datetime(l.created_at) >= datetime('now', ?) \
         ORDER BY datetime(l.created_at) DESC, l.id DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(format!("-{hours} hours"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(lesson_summary).collect())
}

pub async fn tasks_without_audio(pool: &Pool, limit: i64) -> Result<Vec<TaskSummary>> {
    let rows = sqlx::query(
        "SELECT lt.id, lt.lesson_id, tt.content AS title \
         FROM lesson_tasks lt \
         LEFT JOIN text_translations tt ON lt.title_id = tt.id \
         WHERE NOT EXISTS (SELECT 1 FROM lesson_task_audios a WHERE a.task_id = lt.id) \
         ORDER BY lt.lesson_id ASC, lt.position ASC \
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| TaskSummary {
            id: row.get("id"),
            lesson_id: row.get("lesson_id"),
            title: row.get("title"),
        })
        .collect())
}
