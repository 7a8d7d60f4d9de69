//! Row slices returned by repository queries.
//!
//! These mirror the joined SELECTs one-to-one; assembly into the nested API
//! shapes in `crate::model` happens in `repo`.

use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct LessonRow {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub main_image: Option<String>,
    pub preview_image: Option<String>,
    pub image_alt: Option<String>,
    pub tag: Option<String>,
    pub breadcrumb_json: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: i64,
    pub title: Option<String>,
    pub image: Option<String>,
    pub game: Option<String>,
    pub link_url: Option<String>,
    pub link_type: Option<String>,
}

/// Totals printed by the status tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentStats {
    pub lessons: i64,
    pub tasks: i64,
    pub images: i64,
    pub audio: i64,
    pub games: i64,
    pub books: i64,
    pub reorder_games: i64,
}

#[derive(Debug, Clone)]
pub struct LessonSummary {
    pub id: i64,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub task_count: i64,
    pub preview: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: i64,
    pub lesson_id: i64,
    pub title: Option<String>,
}
