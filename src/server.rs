//! Router assembly and the state shared by every handler.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::path::{Component, Path};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Pool;
use crate::files::ContentFiles;
use crate::handlers;

/// Created once in `main` and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub files: Arc<dyn ContentFiles>,
}

impl AppState {
    pub fn new(pool: Pool, files: Arc<dyn ContentFiles>) -> Self {
        Self { pool, files }
    }
}

/// JSON API routes only.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/lessons", get(handlers::list_lessons))
        .route("/api/lessons/slug/{slug}", get(handlers::get_lesson_by_slug))
        .route("/api/lessons/{id_or_slug}", get(handlers::get_lesson))
        .route(
            "/api/games/reorder/{id_or_slug}",
            get(handlers::get_reorder_game),
        )
        .route(
            "/api/vocabulary/lessons",
            get(handlers::list_vocabulary_lessons),
        )
        .route(
            "/api/vocabulary/lessons/{lesson_id}",
            get(handlers::get_vocabulary_lesson),
        )
        .route("/api/vocabulary/all", get(handlers::all_vocabulary))
        .route("/api/books", get(handlers::list_books))
        .route("/api/books/{slug}", get(handlers::get_book))
        .route(
            "/api/books/{slug}/page/{page_num}",
            get(handlers::get_book_page),
        )
        .with_state(state)
}

/// API plus static assets and request tracing.
pub fn app(state: AppState, cfg: &Config) -> Router {
    let hidden = Arc::new(HiddenFiles::for_database(&cfg.app.database_file));
    let data = Router::new()
        .fallback_service(ServeDir::new(cfg.data_dir()))
        .layer(middleware::from_fn_with_state(hidden, hide_database));

    api_router(state)
        .nest_service("/data", data)
        .nest_service("/assets", ServeDir::new(&cfg.server.assets_dir))
        .fallback_service(ServeDir::new(&cfg.server.public_dir))
        .layer(TraceLayer::new_for_http())
}

/// Relative paths inside the data directory that are never served: the
/// SQLite file and its journal siblings.
#[derive(Debug, Clone)]
pub struct HiddenFiles {
    paths: Vec<String>,
}

impl HiddenFiles {
    pub fn for_database(database_file: &str) -> Self {
        let base = normalize(database_file);
        let paths = if base.is_empty() {
            Vec::new()
        } else {
            ["", "-wal", "-shm", "-journal"]
                .iter()
                .map(|suffix| format!("{base}{suffix}"))
                .collect()
        };
        Self { paths }
    }

    /// `request_path` is the raw URI path below the mount point. It is decoded
    /// and normalized the same way the file service resolves it. Undecodable
    /// paths are treated as hidden.
    pub fn hides(&self, request_path: &str) -> bool {
        let Ok(decoded) = urlencoding::decode(request_path) else {
            return true;
        };
        let requested = normalize(&decoded);
        self.paths
            .iter()
            .any(|hidden| hidden.eq_ignore_ascii_case(&requested))
    }
}

/// Plain segments only: empty and `.` segments are dropped, `..` pops.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => segments.extend(segment.to_str()),
            Component::ParentDir => {
                segments.pop();
            }
            _ => {}
        }
    }
    segments.join("/")
}

async fn hide_database(
    State(hidden): State<Arc<HiddenFiles>>,
    req: Request,
    next: Next,
) -> Response {
    if hidden.hides(req.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}
