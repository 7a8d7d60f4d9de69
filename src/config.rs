//! Configuration loader and validator for the content backend.
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub server: Server,
    pub app: App,
}

/// HTTP listener and static directories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    pub bind_address: String,
    pub public_dir: String,
    pub assets_dir: String,
}

/// Storage locations and content defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub database_file: String,
    pub vocabulary_file: String,
    pub default_language: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` wins over the file-derived location.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/{}",
                self.app.data_dir.trim_end_matches('/'),
                self.app.database_file
            )
        })
    }

    /// `BIND_ADDRESS` wins over `server.bind_address`.
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let raw = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| self.server.bind_address.clone());
        raw.parse()
            .map_err(|_| ConfigError::Invalid("server.bind_address must be host:port"))
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.app.data_dir)
    }

    pub fn vocabulary_path(&self) -> PathBuf {
        self.data_dir().join(&self.app.vocabulary_file)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.bind_address.parse::<SocketAddr>().is_err() {
        return Err(ConfigError::Invalid("server.bind_address must be host:port"));
    }
    if cfg.server.public_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("server.public_dir must be non-empty"));
    }
    if cfg.server.assets_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("server.assets_dir must be non-empty"));
    }

    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.database_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.database_file must be non-empty"));
    }
    if cfg.app.vocabulary_file.trim().is_empty() {
        return Err(ConfigError::Invalid("app.vocabulary_file must be non-empty"));
    }
    if cfg.app.default_language.trim().is_empty() {
        return Err(ConfigError::Invalid("app.default_language must be non-empty"));
    }

    Ok(())
}

/// Returns the reference YAML content.
pub fn example() -> &'static str {
    r#"server:
  bind_address: "0.0.0.0:3000"
  public_dir: "./public"
  assets_dir: "./backend/assets"

app:
  data_dir: "./data"
  database_file: "magic_academy.sqlite"
  vocabulary_file: "vocabulary-fr-ru.json"
  default_language: "fr"
"#
}
