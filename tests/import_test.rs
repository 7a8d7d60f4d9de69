use magic_academy::db::{self, import};
use magic_academy::db::import::LinkTask;
use magic_academy::model::{BookInput, ContentFile, LessonInput, LinkKind};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

fn content_export() -> ContentFile {
    serde_json::from_value(json!({
        "pages": [
            {
                "slug": "les-fruits",
                "title": "Titre de la carte",
                "description": "Les fruits de saison",
                "cover": "images/fruits-cover.png",
                "tag": "Vocabulaire"
            }
        ],
        "lessons": {
            "les-fruits": {
                "title": "Les fruits",
                "mainImage": "images/fruits.png",
                "tasks": [
                    {"title": "Pomme", "image": "images/pomme.png", "audio": "audio/pomme.mp3"},
                    {"title": "Poire", "image": "images/pomme.png", "audios": ["audio/poire.mp3", "audio/pomme.mp3"]},
                    {"title": "Jeu", "game": "games/memory.html"}
                ]
            },
            "les-legumes": {
                "title": "Les légumes",
                "mainImage": "images/fruits.png",
                "tasks": [
                    {"title": "Carotte", "audio": "audio/pomme.mp3", "game": "games/memory.html"}
                ]
            }
        },
        "reorderGames": [
            {"slug": "phrase-1", "levels": [{"sentence": ["Je", "mange", "une", "pomme"]}]}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn importing_twice_creates_no_duplicate_media() {
    let pool = setup_pool().await;
    let content = content_export();

    let first = import::import_content(&pool, &content, "fr").await.unwrap();
    assert_eq!(first.lessons_added, 2);
    assert_eq!(first.tasks_added, 4);
    assert_eq!(first.games_added, 1);

    let images = count(&pool, "images").await;
    let audio = count(&pool, "audio_content").await;
    let games = count(&pool, "games").await;
    // fruits.png, fruits-cover.png, pomme.png
    assert_eq!(images, 3);
    assert_eq!(audio, 2);
    assert_eq!(games, 1);

    let second = import::import_content(&pool, &content, "fr").await.unwrap();
    assert_eq!(second.lessons_added, 0);
    assert_eq!(second.lessons_skipped, 2);
    assert_eq!(second.games_skipped, 1);

    assert_eq!(count(&pool, "images").await, images);
    assert_eq!(count(&pool, "audio_content").await, audio);
    assert_eq!(count(&pool, "games").await, games);
    assert_eq!(count(&pool, "lessons").await, 2);
    assert_eq!(count(&pool, "lesson_tasks").await, 4);
    assert_eq!(count(&pool, "languages").await, 1);
}

#[tokio::test]
async fn page_cards_fill_gaps_without_overriding_lesson_fields() {
    let pool = setup_pool().await;
    import::import_content(&pool, &content_export(), "fr")
        .await
        .unwrap();

    let lesson = db::fetch_lesson_by_slug(&pool, "les-fruits")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lesson.title.as_deref(), Some("Les fruits"));
    assert_eq!(lesson.description.as_deref(), Some("Les fruits de saison"));
    assert_eq!(lesson.preview_image.as_deref(), Some("images/fruits-cover.png"));
    assert_eq!(lesson.tag.as_deref(), Some("Vocabulaire"));

    let legumes = db::fetch_lesson_by_slug(&pool, "les-legumes")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(legumes.tag.as_deref(), Some(import::DEFAULT_LESSON_TAG));
    assert_eq!(legumes.preview_image, None);
}

#[tokio::test]
async fn task_positions_are_contiguous_from_zero() {
    let pool = setup_pool().await;
    import::import_content(&pool, &content_export(), "fr")
        .await
        .unwrap();

    let positions: Vec<i64> = sqlx::query_scalar(
        "SELECT lt.position FROM lesson_tasks lt JOIN lessons l ON l.id = lt.lesson_id \
         WHERE l.slug = 'les-fruits' ORDER BY lt.position",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(positions, vec![0, 1, 2]);

    let audio_positions: Vec<i64> = sqlx::query_scalar(
        "SELECT a.position FROM lesson_task_audios a \
         JOIN lesson_tasks lt ON lt.id = a.task_id \
         JOIN lessons l ON l.id = lt.lesson_id \
         WHERE l.slug = 'les-fruits' AND lt.position = 1 ORDER BY a.position",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(audio_positions, vec![0, 1]);
}

#[tokio::test]
async fn link_task_is_appended_after_the_last_task() {
    let pool = setup_pool().await;
    import::import_content(&pool, &content_export(), "fr")
        .await
        .unwrap();

    let task = LinkTask {
        url: "https://www.youtube.com/watch?v=xyz".into(),
        kind: LinkKind::Youtube,
        title: "Regarde la vidéo".into(),
        lines: vec!["Chante avec nous".into()],
    };
    let (lesson_id, task_id) = import::append_link_task(&pool, "les-fruits", &task, "fr")
        .await
        .unwrap();

    let position: i64 = sqlx::query_scalar("SELECT position FROM lesson_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(position, 3);

    // Numeric identifiers address the lesson by id; the link row is reused.
    let (same_lesson, _) =
        import::append_link_task(&pool, &lesson_id.to_string(), &task, "fr")
            .await
            .unwrap();
    assert_eq!(same_lesson, lesson_id);
    assert_eq!(count(&pool, "external_links").await, 1);

    let lesson = db::fetch_lesson_by_slug(&pool, "les-fruits")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lesson.tasks.len(), 5);
    let last = lesson.tasks.last().unwrap();
    assert_eq!(last.lines, vec!["Chante avec nous"]);
    assert_eq!(last.link.as_ref().unwrap().kind, LinkKind::Youtube);
}

#[tokio::test]
async fn link_task_for_unknown_lesson_fails_without_writing() {
    let pool = setup_pool().await;
    let task = LinkTask {
        url: "https://example.org/conte".into(),
        kind: LinkKind::Link,
        title: "Lien externe".into(),
        lines: Vec::new(),
    };
    let err = import::append_link_task(&pool, "absente", &task, "fr")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("absente"));
    assert_eq!(count(&pool, "lesson_tasks").await, 0);
    assert_eq!(count(&pool, "external_links").await, 0);
}

#[tokio::test]
async fn link_task_on_empty_lesson_starts_at_zero() {
    let pool = setup_pool().await;
    let empty: LessonInput =
        serde_json::from_value(json!({"slug": "vide", "title": "Vide"})).unwrap();
    import::import_lessons(&pool, &[empty], "fr").await.unwrap();

    let task = LinkTask {
        url: "https://example.org".into(),
        kind: LinkKind::Link,
        title: "Lien externe".into(),
        lines: Vec::new(),
    };
    let (_, task_id) = import::append_link_task(&pool, "vide", &task, "fr")
        .await
        .unwrap();
    let position: i64 = sqlx::query_scalar("SELECT position FROM lesson_tasks WHERE id = ?")
        .bind(task_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(position, 0);
}

#[tokio::test]
async fn books_are_added_once_per_slug() {
    let pool = setup_pool().await;
    let book = BookInput {
        title: "Le Petit Prince".into(),
        pdf: "books/petit-prince.pdf".into(),
        cover: Some("books/petit-prince.jpg".into()),
        page_count: Some(96),
        ..Default::default()
    };

    let first = import::import_books(&pool, &[book.clone()]).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(first[0].created);
    assert_eq!(first[0].slug, "le-petit-prince");

    let again = import::import_books(&pool, &[book]).await.unwrap();
    assert!(!again[0].created);
    assert_eq!(again[0].id, first[0].id);
    assert_eq!(count(&pool, "books").await, 1);

    let stored = db::fetch_book_by_slug(&pool, "le-petit-prince")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.page_count, 96);
    assert_eq!(stored.cover.as_deref(), Some("books/petit-prince.jpg"));
    assert!(db::book_exists(&pool, "le-petit-prince").await.unwrap());
    assert!(!db::book_exists(&pool, "autre").await.unwrap());
}

#[tokio::test]
async fn status_reports_reflect_content() {
    let pool = setup_pool().await;
    import::import_content(&pool, &content_export(), "fr")
        .await
        .unwrap();
    let empty: LessonInput = serde_json::from_value(json!({"slug": "vide"})).unwrap();
    import::import_lessons(&pool, &[empty], "fr").await.unwrap();

    let stats = db::content_stats(&pool).await.unwrap();
    assert_eq!(stats.lessons, 3);
    assert_eq!(stats.tasks, 4);
    assert_eq!(stats.reorder_games, 1);
    assert_eq!(stats.books, 0);

    let recent = db::recent_lessons(&pool, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].slug.as_deref(), Some("vide"));

    let without_tasks = db::lessons_without_tasks(&pool).await.unwrap();
    assert_eq!(without_tasks.len(), 1);
    assert_eq!(without_tasks[0].task_count, 0);

    // Only the "Jeu" task has no audio.
    let silent = db::tasks_without_audio(&pool, 10).await.unwrap();
    assert_eq!(silent.len(), 1);
    assert_eq!(silent[0].title.as_deref(), Some("Jeu"));

    let fresh = db::lessons_created_since(&pool, 24).await.unwrap();
    assert_eq!(fresh.len(), 3);
}

#[tokio::test]
async fn concurrent_imports_do_not_duplicate_media() {
    let td = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/academy.sqlite", td.path().display());
    let pool = db::init_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let content = content_export();

    let (first, second) = tokio::join!(
        import::import_content(&pool, &content, "fr"),
        import::import_content(&pool, &content, "fr"),
    );
    // A losing writer may be rejected as busy; at least one run commits.
    assert!(first.is_ok() || second.is_ok(), "{first:?} / {second:?}");
    let added: usize = [&first, &second]
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|s| s.lessons_added)
        .sum();
    assert_eq!(added, 2);

    assert_eq!(count(&pool, "images").await, 3);
    assert_eq!(count(&pool, "audio_content").await, 2);
    assert_eq!(count(&pool, "games").await, 1);
    assert_eq!(count(&pool, "lessons").await, 2);
    assert_eq!(count(&pool, "lesson_tasks").await, 4);
}
