//! Flat JSON side files: the vocabulary collection and per-book page metadata.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::model::VocabularyFile;

/// Source of the JSON documents that live next to the database.
#[async_trait]
pub trait ContentFiles: Send + Sync {
    /// The whole vocabulary collection. Missing or malformed data is an error.
    async fn vocabulary(&self) -> Result<VocabularyFile>;

    /// Raw page-metadata document for a book; `None` when the book has none.
    async fn book_pages(&self, slug: &str) -> Result<Option<String>>;
}

/// Reads side files from the data directory on every call.
#[derive(Debug, Clone)]
pub struct FsContentFiles {
    vocabulary_path: PathBuf,
    books_dir: PathBuf,
}

impl FsContentFiles {
    pub fn new(vocabulary_path: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            vocabulary_path,
            books_dir: data_dir.join("books"),
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(cfg.vocabulary_path(), cfg.data_dir())
    }
}

#[async_trait]
impl ContentFiles for FsContentFiles {
    async fn vocabulary(&self) -> Result<VocabularyFile> {
        let raw = tokio::fs::read_to_string(&self.vocabulary_path)
            .await
            .with_context(|| format!("failed to read {}", self.vocabulary_path.display()))?;
        let parsed = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.vocabulary_path.display()))?;
        Ok(parsed)
    }

    async fn book_pages(&self, slug: &str) -> Result<Option<String>> {
        // Slugs come from the books table, but never let one escape the directory.
        if slug.is_empty() || slug.contains(|c| c == '/' || c == '\\') || slug.contains("..") {
            return Ok(None);
        }
        let path = self.books_dir.join(format!("{slug}.json"));
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }
}
