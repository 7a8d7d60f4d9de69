//! Shapes served by the API and accepted by the import tools.
//!
//! Output structs omit absent optional fields instead of emitting `null`;
//! collections (`lines`, `tasks`, `levels`, ...) are always present.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// API output
// ---------------------------------------------------------------------------

/// Lesson card for the home page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonPreview {
    pub id: i64,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub created_at: NaiveDateTime,
    pub task_count: i64,
    pub duration: String,
}

/// Minutes of activity budgeted per task in the preview duration.
pub const MINUTES_PER_TASK: i64 = 4;

pub fn lesson_duration(task_count: i64) -> String {
    format!("{} min", task_count * MINUTES_PER_TASK)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: i64,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub breadcrumb: Vec<String>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub audio: Option<TaskAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ExternalLink>,
}

/// Audio attached to a task. Flattened into the task object as either
/// `"audio": "<src>"` or `"audios": ["<src>", ...]`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub enum TaskAudio {
    #[serde(rename = "audio")]
    Single(String),
    #[serde(rename = "audios")]
    Many(Vec<String>),
}

impl TaskAudio {
    /// Collapse ordered sources: none → `None`, one → scalar, more → list.
    pub fn from_sources(mut sources: Vec<String>) -> Option<Self> {
        match sources.len() {
            0 => None,
            1 => sources.pop().map(TaskAudio::Single),
            _ => Some(TaskAudio::Many(sources)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalLink {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Youtube,
    Link,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Youtube => "youtube",
            LinkKind::Link => "link",
        }
    }

    pub fn parse_kind(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(LinkKind::Youtube),
            "link" => Some(LinkKind::Link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReorderGame {
    pub id: i64,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub levels: Vec<Level>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Level {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub sentence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    pub pdf: String,
    pub page_count: i64,
    pub created_at: NaiveDateTime,
}

/// Book plus the per-page metadata from its side file.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub pages: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookPage {
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub vocabulary: Vec<Value>,
}

/// Root of the vocabulary side file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VocabularyFile {
    #[serde(default)]
    pub lessons: Vec<VocabularyLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VocabularyLesson {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub vocabulary: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyLessonSummary {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub vocabulary_count: usize,
}

impl From<&VocabularyLesson> for VocabularyLessonSummary {
    fn from(lesson: &VocabularyLesson) -> Self {
        Self {
            id: lesson.id,
            name: lesson.name.clone(),
            description: lesson.description.clone(),
            vocabulary_count: lesson.vocabulary.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyCollection {
    pub vocabulary: Vec<Value>,
    pub total_count: usize,
}

// ---------------------------------------------------------------------------
// Import input
// ---------------------------------------------------------------------------

/// Historical flat-file export: lessons keyed by slug, home page cards,
/// reorder games.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentFile {
    #[serde(default)]
    pub pages: Vec<PageInput>,
    #[serde(default)]
    pub lessons: BTreeMap<String, LessonInput>,
    #[serde(default)]
    pub reorder_games: Vec<ReorderGameInput>,
}

/// Home page card; merged into the lesson with the same slug.
#[derive(Debug, Clone, Deserialize)]
pub struct PageInput {
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LessonsFile {
    #[serde(default)]
    pub lessons: Vec<LessonInput>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonInput {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub image_alt: Option<String>,
    #[serde(default)]
    pub breadcrumb: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Vec<TaskInput>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub lines: LinesInput,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub audios: Vec<String>,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub link: Option<ExternalLink>,
}

impl TaskInput {
    /// `audios` wins when present; otherwise the single `audio`.
    pub fn audio_sources(&self) -> Vec<&str> {
        if !self.audios.is_empty() {
            return self.audios.iter().map(String::as_str).collect();
        }
        self.audio.as_deref().into_iter().collect()
    }
}

/// Task text given either as an array or as one newline-joined string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LinesInput {
    Many(Vec<String>),
    Joined(String),
}

impl Default for LinesInput {
    fn default() -> Self {
        LinesInput::Many(Vec::new())
    }
}

impl LinesInput {
    pub fn into_lines(self) -> Vec<String> {
        match self {
            LinesInput::Many(lines) => lines,
            LinesInput::Joined(text) if text.is_empty() => Vec::new(),
            LinesInput::Joined(text) => text.split('\n').map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReorderGameInput {
    #[serde(default)]
    pub id: Option<i64>,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub levels: Vec<LevelInput>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LevelInput {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub sentence: Vec<String>,
    #[serde(default)]
    pub audio: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: String,
    pub pdf: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub page_count: Option<i64>,
}

/// Either `{"books": [...]}` or a single book object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BooksFile {
    Many { books: Vec<BookInput> },
    One(BookInput),
}

impl BooksFile {
    pub fn into_books(self) -> Vec<BookInput> {
        match self {
            BooksFile::Many { books } => books,
            BooksFile::One(book) => vec![book],
        }
    }
}
