use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use magic_academy::config::{self, Config};
use magic_academy::db::{self, import};
use magic_academy::files::ContentFiles;
use magic_academy::model::{BookInput, ContentFile, VocabularyFile};
use magic_academy::server::{self, api_router, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Default)]
struct MemoryFiles {
    vocabulary: Option<VocabularyFile>,
    books: HashMap<String, String>,
}

#[async_trait]
impl ContentFiles for MemoryFiles {
    async fn vocabulary(&self) -> Result<VocabularyFile> {
        self.vocabulary
            .clone()
            .ok_or_else(|| anyhow!("vocabulary.json: no such file"))
    }

    async fn book_pages(&self, slug: &str) -> Result<Option<String>> {
        Ok(self.books.get(slug).cloned())
    }
}

fn vocabulary() -> VocabularyFile {
    serde_json::from_value(json!({
        "lessons": [
            {
                "id": 1,
                "name": "Les couleurs",
                "description": "Rouge, bleu, vert",
                "vocabulary": [{"fr": "rouge", "ru": "красный"}, {"fr": "bleu", "ru": "синий"}]
            },
            {
                "id": 2,
                "name": "Les animaux",
                "vocabulary": [{"fr": "chat", "ru": "кошка"}]
            }
        ]
    }))
    .unwrap()
}

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let content: ContentFile = serde_json::from_value(json!({
        "lessons": {
            "les-couleurs": {
                "title": "Les couleurs",
                "breadcrumb": ["Accueil", "Les couleurs"],
                "tasks": [
                    {"title": "Écoute", "lines": ["rouge"], "audio": "audio/rouge.mp3"},
                    {"title": "Répète", "audios": ["audio/a.mp3", "audio/b.mp3"]}
                ]
            }
        },
        "reorderGames": [
            {"slug": "phrase-1", "levels": [{"sentence": ["Le", "chat"], "image": "img/chat.png"}]},
            {"slug": "phrase-vide"}
        ]
    }))
    .unwrap();
    import::import_content(&pool, &content, "fr").await.unwrap();

    let books = [
        BookInput {
            title: "Le Petit Prince".into(),
            pdf: "books/petit-prince.pdf".into(),
            page_count: Some(3),
            ..Default::default()
        },
        BookInput {
            title: "Contes abîmés".into(),
            pdf: "books/contes.pdf".into(),
            ..Default::default()
        },
    ];
    import::import_books(&pool, &books).await.unwrap();
    pool
}

fn app(pool: sqlx::SqlitePool, files: MemoryFiles) -> Router {
    api_router(AppState::new(pool, Arc::new(files)))
}

fn full_files() -> MemoryFiles {
    let mut books = HashMap::new();
    books.insert(
        "le-petit-prince".to_string(),
        json!({
            "pages": {
                "2": {"audio": "books/petit-prince/2.mp3", "vocabulary": [{"fr": "mouton"}]},
                "3": {"audio": "books/petit-prince/3.mp3", "vocabulary": "pas une liste"},
                "4": {"audio": "books/petit-prince/4.mp3", "vocabulary": null}
            }
        })
        .to_string(),
    );
    books.insert("contes-abimes".to_string(), "{\"pages\": ".to_string());
    MemoryFiles {
        vocabulary: Some(vocabulary()),
        books,
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn lessons_list_and_detail() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/lessons").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let lessons = body["data"].as_array().unwrap();
    assert_eq!(lessons.len(), 1);
    assert_eq!(lessons[0]["slug"], json!("les-couleurs"));
    assert_eq!(lessons[0]["taskCount"], json!(2));
    assert_eq!(lessons[0]["duration"], json!("8 min"));
    let id = lessons[0]["id"].as_i64().unwrap();

    let (status, by_slug) = get(&app, "/api/lessons/slug/les-couleurs").await;
    assert_eq!(status, StatusCode::OK);
    let (_, by_id) = get(&app, &format!("/api/lessons/{id}")).await;
    let (_, by_either) = get(&app, "/api/lessons/les-couleurs").await;
    assert_eq!(by_slug, by_id);
    assert_eq!(by_slug, by_either);

    let lesson = &by_slug["data"];
    assert_eq!(lesson["breadcrumb"], json!(["Accueil", "Les couleurs"]));
    assert_eq!(lesson["tasks"][0]["audio"], json!("audio/rouge.mp3"));
    assert_eq!(lesson["tasks"][1]["audios"], json!(["audio/a.mp3", "audio/b.mp3"]));
}

#[tokio::test]
async fn missing_lessons_and_games_are_404() {
    let app = app(setup_pool().await, full_files());

    for uri in [
        "/api/lessons/999",
        "/api/lessons/slug/inconnue",
        "/api/lessons/inconnue",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, json!({"success": false, "message": "Lesson not found"}));
    }

    let (status, body) = get(&app, "/api/games/reorder/absent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn reorder_games_by_slug_and_id() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/games/reorder/phrase-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["levels"][0]["sentence"], json!(["Le", "chat"]));
    let id = body["data"]["id"].as_i64().unwrap();

    let (_, by_id) = get(&app, &format!("/api/games/reorder/{id}")).await;
    assert_eq!(by_id, body);

    let (status, empty) = get(&app, "/api/games/reorder/phrase-vide").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["data"]["levels"], json!([]));
}

#[tokio::test]
async fn vocabulary_endpoints() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/vocabulary/lessons").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            {"id": 1, "name": "Les couleurs", "description": "Rouge, bleu, vert", "vocabularyCount": 2},
            {"id": 2, "name": "Les animaux", "vocabularyCount": 1}
        ])
    );

    let (status, body) = get(&app, "/api/vocabulary/lessons/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vocabulary"], json!([{"fr": "chat", "ru": "кошка"}]));

    let (status, body) = get(&app, "/api/vocabulary/lessons/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (status, body) = get(&app, "/api/vocabulary/lessons/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Lesson with ID 42 not found"));

    let (status, body) = get(&app, "/api/vocabulary/all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalCount"], json!(3));
    assert_eq!(body["data"]["vocabulary"][2], json!({"fr": "chat", "ru": "кошка"}));
}

#[tokio::test]
async fn missing_vocabulary_file_is_a_generic_500() {
    let app = app(setup_pool().await, MemoryFiles::default());

    for uri in ["/api/vocabulary/lessons", "/api/vocabulary/lessons/1", "/api/vocabulary/all"] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(
            body,
            json!({"success": false, "message": "Failed to load vocabulary data"})
        );
    }
}

#[tokio::test]
async fn books_and_pages() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/books").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/api/books/le-petit-prince").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pageCount"], json!(3));
    assert_eq!(body["data"]["pdf"], json!("books/petit-prince.pdf"));
    assert_eq!(
        body["data"]["pages"]["2"]["audio"],
        json!("books/petit-prince/2.mp3")
    );

    let (status, body) = get(&app, "/api/books/le-petit-prince/page/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"page": 2, "audio": "books/petit-prince/2.mp3", "vocabulary": [{"fr": "mouton"}]})
    );

    // No entry at all.
    let (_, body) = get(&app, "/api/books/le-petit-prince/page/1").await;
    assert_eq!(body["data"], json!({"page": 1, "vocabulary": []}));

    // A bad vocabulary value keeps the page audio.
    let (status, body) = get(&app, "/api/books/le-petit-prince/page/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"page": 3, "audio": "books/petit-prince/3.mp3", "vocabulary": []})
    );
    let (status, body) = get(&app, "/api/books/le-petit-prince/page/4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"page": 4, "audio": "books/petit-prince/4.mp3", "vocabulary": []})
    );
}

#[tokio::test]
async fn malformed_book_side_file_yields_empty_pages() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/books/contes-abimes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pages"], json!({}));
    assert!(body["data"].get("cover").is_none());

    let (status, body) = get(&app, "/api/books/contes-abimes/page/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"page": 1, "vocabulary": []}));
}

#[tokio::test]
async fn book_errors_map_to_status_classes() {
    let app = app(setup_pool().await, full_files());

    let (status, body) = get(&app, "/api/books/inconnu").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "message": "Book not found"}));

    let (status, _) = get(&app, "/api/books/inconnu/page/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app, "/api/books/le-petit-prince/page/deux").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn storage_failures_do_not_leak_details() {
    let pool = setup_pool().await;
    sqlx::query("DROP TABLE books").execute(&pool).await.unwrap();
    let app = app(pool, full_files());

    let (status, body) = get(&app, "/api/books").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"success": false, "message": "Failed to fetch books"}));

    let (status, body) = get(&app, "/api/books/le-petit-prince").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["message"].as_str().unwrap().contains("no such table"));
}

#[tokio::test]
async fn malformed_breadcrumb_is_served_as_empty_list() {
    let pool = setup_pool().await;
    sqlx::query("UPDATE lessons SET breadcrumb_json = '{\"Accueil\"' WHERE slug = 'les-couleurs'")
        .execute(&pool)
        .await
        .unwrap();
    let app = app(pool, full_files());

    let (status, body) = get(&app, "/api/lessons/slug/les-couleurs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["breadcrumb"], json!([]));
    assert_eq!(body["data"]["tasks"].as_array().unwrap().len(), 2);
}

async fn status_of(app: &Router, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn data_directory_never_serves_the_database() {
    let td = tempfile::tempdir().unwrap();
    let data_dir = td.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join("magic_academy.sqlite"), b"SQLite format 3\0").unwrap();
    std::fs::write(data_dir.join("magic_academy.sqlite-wal"), b"wal").unwrap();
    std::fs::write(data_dir.join("notes.json"), b"{}").unwrap();

    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.app.data_dir = data_dir.to_string_lossy().to_string();
    cfg.server.public_dir = td.path().join("public").to_string_lossy().to_string();
    cfg.server.assets_dir = td.path().join("assets").to_string_lossy().to_string();

    let state = AppState::new(setup_pool().await, Arc::new(full_files()));
    let app = server::app(state, &cfg);

    assert_eq!(status_of(&app, "/data/notes.json").await, StatusCode::OK);
    for uri in [
        "/data/magic_academy.sqlite",
        "/data/magic%5Facademy.sqlite",
        "/data/./magic_academy.sqlite",
        "/data//magic_academy.sqlite",
        "/data/magic_academy.sqlite-wal",
        "/data/magic_academy%2Esqlite%2Dwal",
    ] {
        assert_eq!(status_of(&app, uri).await, StatusCode::NOT_FOUND, "{uri}");
    }
}
