//! sketchdb Configuration Module
//! Resolves the store root and loads/saves sketchdb.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name inside a project directory
pub const CONFIG_FILE: &str = "sketchdb.config.json";

/// Overrides the store root when set
pub const ROOT_ENV: &str = "SKETCHDB_ROOT";

/// Execution mode; `test` points the store at `tests/fixtures`
pub const MODE_ENV: &str = "SKETCHDB_ENV";

/// Store directory name used outside of tests
pub const DEFAULT_DIR_NAME: &str = "sketchdb_store";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store root; tables live under `<root>/tables`
    pub root: PathBuf,

    /// Total attempts for an insert with a generated id
    #[serde(default = "default_max_insert_attempts")]
    pub max_insert_attempts: u32,

    /// Pretty-print persisted rows
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_max_insert_attempts() -> u32 {
    5
}

fn default_pretty() -> bool {
    true
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_insert_attempts: default_max_insert_attempts(),
            pretty: default_pretty(),
        }
    }

    /// Resolve the store root from the process environment.
    ///
    /// `SKETCHDB_ROOT` wins; otherwise `SKETCHDB_ENV=test` selects
    /// `<cwd>/tests/fixtures` and anything else `<cwd>/sketchdb_store`.
    /// Reads the environment on every call, so tests can re-resolve after
    /// changing it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir()?;
        let root = std::env::var_os(ROOT_ENV).map(PathBuf::from);
        let mode = std::env::var(MODE_ENV).ok();
        Ok(Self::new(resolve_root(&cwd, root, mode.as_deref())))
    }

    pub fn with_max_insert_attempts(mut self, attempts: u32) -> Self {
        self.max_insert_attempts = attempts;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Attempt bound actually used; at least one attempt is always made
    pub fn insert_attempts(&self) -> u32 {
        self.max_insert_attempts.max(1)
    }

    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = std::fs::read_to_string(&config_path)?;
        let mut config: StoreConfig = serde_json::from_str(&content)?;
        if config.root.is_relative() {
            config.root = project_dir.join(&config.root);
        }
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let config_path = project_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}

fn resolve_root(cwd: &Path, root: Option<PathBuf>, mode: Option<&str>) -> PathBuf {
    match (root, mode) {
        (Some(root), _) if !root.as_os_str().is_empty() => cwd.join(root),
        (_, Some("test")) => cwd.join("tests").join("fixtures"),
        _ => cwd.join(DEFAULT_DIR_NAME),
    }
}
