use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{instrument, warn};

use crate::db::{self, parse_json_column, Identifier};
use crate::error::{internal, AppError, Envelope};
use crate::model::{
    Book, BookDetail, BookPage, Lesson, LessonPreview, ReorderGame, VocabularyCollection,
    VocabularyLesson, VocabularyLessonSummary,
};
use crate::server::AppState;

pub type ApiResult<T> = Result<Json<Envelope<T>>, AppError>;

// ---------------------------------------------------------------------------
// Lessons
// ---------------------------------------------------------------------------

#[instrument(skip_all)]
pub async fn list_lessons(State(state): State<AppState>) -> ApiResult<Vec<LessonPreview>> {
    let lessons = db::list_lesson_previews(&state.pool)
        .await
        .map_err(internal("Failed to fetch lessons"))?;
    Ok(Envelope::ok(lessons))
}

/// `GET /api/lessons/{id_or_slug}`
#[instrument(skip(state))]
pub async fn get_lesson(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<Lesson> {
    lesson_response(&state, Identifier::parse(&id_or_slug)).await
}

/// `GET /api/lessons/slug/{slug}`
#[instrument(skip(state))]
pub async fn get_lesson_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Lesson> {
    lesson_response(&state, Identifier::Slug(slug)).await
}

async fn lesson_response(state: &AppState, key: Identifier) -> ApiResult<Lesson> {
    db::fetch_lesson(&state.pool, &key)
        .await
        .map_err(internal("Failed to fetch lesson"))?
        .map(Envelope::ok)
        .ok_or_else(|| AppError::NotFound("Lesson not found".into()))
}

// ---------------------------------------------------------------------------
// Games
// ---------------------------------------------------------------------------

#[instrument(skip(state))]
pub async fn get_reorder_game(
    State(state): State<AppState>,
    Path(id_or_slug): Path<String>,
) -> ApiResult<ReorderGame> {
    db::fetch_reorder_game(&state.pool, &Identifier::parse(&id_or_slug))
        .await
        .map_err(internal("Failed to fetch game data"))?
        .map(Envelope::ok)
        .ok_or_else(|| AppError::NotFound(format!("Game data not found for: {id_or_slug}")))
}

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

const VOCABULARY_FAILURE: &str = "Failed to load vocabulary data";

#[instrument(skip_all)]
pub async fn list_vocabulary_lessons(
    State(state): State<AppState>,
) -> ApiResult<Vec<VocabularyLessonSummary>> {
    let data = state
        .files
        .vocabulary()
        .await
        .map_err(internal(VOCABULARY_FAILURE))?;
    Ok(Envelope::ok(
        data.lessons.iter().map(VocabularyLessonSummary::from).collect(),
    ))
}

#[instrument(skip(state))]
pub async fn get_vocabulary_lesson(
    State(state): State<AppState>,
    Path(lesson_id): Path<String>,
) -> ApiResult<VocabularyLesson> {
    let id: i64 = lesson_id
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid lesson id: {lesson_id}")))?;
    let data = state
        .files
        .vocabulary()
        .await
        .map_err(internal(VOCABULARY_FAILURE))?;
    data.lessons
        .into_iter()
        .find(|lesson| lesson.id == id)
        .map(Envelope::ok)
        .ok_or_else(|| AppError::NotFound(format!("Lesson with ID {id} not found")))
}

#[instrument(skip_all)]
pub async fn all_vocabulary(State(state): State<AppState>) -> ApiResult<VocabularyCollection> {
    let data = state
        .files
        .vocabulary()
        .await
        .map_err(internal(VOCABULARY_FAILURE))?;
    let vocabulary: Vec<Value> = data
        .lessons
        .into_iter()
        .flat_map(|lesson| lesson.vocabulary)
        .collect();
    Ok(Envelope::ok(VocabularyCollection {
        total_count: vocabulary.len(),
        vocabulary,
    }))
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

/// Side file layout: `{"pages": {"<page number>": {...}}}`.
#[derive(Debug, Default, Deserialize)]
struct BookPagesDoc {
    #[serde(default)]
    pages: Map<String, Value>,
}

async fn load_book_pages(
    state: &AppState,
    slug: &str,
    failure: &'static str,
) -> Result<Map<String, Value>, AppError> {
    let raw = state
        .files
        .book_pages(slug)
        .await
        .map_err(internal(failure))?;
    let doc: BookPagesDoc = parse_json_column(raw.as_deref(), "book_pages", slug);
    Ok(doc.pages)
}

#[instrument(skip_all)]
pub async fn list_books(State(state): State<AppState>) -> ApiResult<Vec<Book>> {
    let books = db::list_books(&state.pool)
        .await
        .map_err(internal("Failed to fetch books"))?;
    Ok(Envelope::ok(books))
}

#[instrument(skip(state))]
pub async fn get_book(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<BookDetail> {
    const FAILURE: &str = "Failed to fetch book";
    let book = db::fetch_book_by_slug(&state.pool, &slug)
        .await
        .map_err(internal(FAILURE))?
        .ok_or_else(|| AppError::NotFound("Book not found".into()))?;
    let pages = load_book_pages(&state, &slug, FAILURE).await?;
    Ok(Envelope::ok(BookDetail { book, pages }))
}

#[instrument(skip(state))]
pub async fn get_book_page(
    State(state): State<AppState>,
    Path((slug, page_num)): Path<(String, String)>,
) -> ApiResult<BookPage> {
    const FAILURE: &str = "Failed to fetch page data";
    let page: u32 = page_num
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid page number: {page_num}")))?;

    let exists = db::book_exists(&state.pool, &slug)
        .await
        .map_err(internal(FAILURE))?;
    if !exists {
        return Err(AppError::NotFound("Book not found".into()));
    }

    let mut pages = load_book_pages(&state, &slug, FAILURE).await?;
    let entry = pages.remove(&page.to_string()).unwrap_or(Value::Null);
    Ok(Envelope::ok(page_entry(&slug, page, &entry)))
}

/// Each field of a side-file page entry falls back on its own, so a bad
/// `vocabulary` does not drop a valid `audio`.
fn page_entry(slug: &str, page: u32, entry: &Value) -> BookPage {
    let audio = match entry.get("audio") {
        None | Some(Value::Null) => None,
        Some(Value::String(src)) if src.is_empty() => None,
        Some(Value::String(src)) => Some(src.clone()),
        Some(other) => {
            warn!(slug, page, value = %other, "page audio is not a string; ignoring");
            None
        }
    };
    let vocabulary = match entry.get("vocabulary") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            warn!(slug, page, value = %other, "page vocabulary is not a list; ignoring");
            Vec::new()
        }
    };
    BookPage {
        page,
        audio,
        vocabulary,
    }
}
