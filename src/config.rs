use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants;
use crate::error::{GradeError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `poly.json`, `scaler.json`, `pca.json`, `knn.json`
    pub dir: PathBuf,
    /// Name reported alongside every chained prediction
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Where the CLI looks for a CSV when `ingest` is run without a file
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/forages.db"),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            name: constants::CHAIN_MODEL_NAME.to_string(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Config {
    /// Load `config.toml` (or `$SMART_MINING_CONFIG`) and apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = env::var("SMART_MINING_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            GradeError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.path = database_path_from_url(&url);
        }
        if let Ok(dir) = env::var("MODEL_DIR") {
            self.model.dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("DATA_DIR") {
            self.ingest.data_dir = PathBuf::from(dir);
        }
        if let Ok(port) = env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| GradeError::Config(format!("PORT is not a valid port number: '{port}'")))?;
        }
        Ok(())
    }
}

/// Accepts `sqlite:///abs/path`, `sqlite://rel/path` or a bare path.
pub fn database_path_from_url(url: &str) -> PathBuf {
    let trimmed = url.trim();
    let path = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.model.dir, PathBuf::from("models"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100\n\n[model]\ndir = \"/srv/models\"").unwrap();

        let cfg = Config::from_file(file.path()).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.model.dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.model.name, constants::CHAIN_MODEL_NAME);
        assert_eq!(cfg.database.path, PathBuf::from("data/forages.db"));
    }

    #[test]
    fn database_url_forms() {
        assert_eq!(database_path_from_url("sqlite:///var/db/f.db"), PathBuf::from("/var/db/f.db"));
        assert_eq!(database_path_from_url("sqlite://local.db"), PathBuf::from("local.db"));
        assert_eq!(database_path_from_url("plain.db"), PathBuf::from("plain.db"));
    }
}
