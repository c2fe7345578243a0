//! Configuration file handling.
//!
//! Looks for `.config/tablesmith.toml` in the current directory or any
//! parent directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// The configuration surface. All of it is glue around the core: schema
/// selection, output naming, pool sizing, and the inclusion policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Schema to introspect.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Where generated output lands.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Package name for generated output.
    #[serde(default)]
    pub package: Option<String>,

    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default)]
    pub mode: Mode,

    /// Per-table settings, keyed by table name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            output: None,
            package: None,
            max_connections: default_max_connections(),
            mode: Mode::default(),
            tables: BTreeMap::new(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    16
}

/// Table selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Process every table, honoring per-table excludes.
    #[default]
    Normal,
    /// Process only tables explicitly marked `include`.
    Explicit,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    #[serde(default)]
    pub exclude: bool,

    #[serde(default)]
    pub include: bool,
}

impl Config {
    /// Whether a table participates in generation under the configured
    /// mode.
    pub fn should_process(&self, table: &str) -> bool {
        let entry = self.tables.get(table);
        match self.mode {
            Mode::Normal => !entry.is_some_and(|t| t.exclude),
            Mode::Explicit => entry.is_some_and(|t| t.include && !t.exclude),
        }
    }
}

/// Load configuration from an explicit path.
pub fn load_path(path: &Path) -> Result<Config, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Load configuration from `.config/tablesmith.toml`, searching up the
/// directory tree from the current directory.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(e.to_string()))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let config = load_path(&config_path)?;
    Ok((config, config_path))
}

/// Find `.config/tablesmith.toml` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".config/tablesmith.toml");
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no .config/tablesmith.toml found in current directory or any parent")]
    NotFound,

    #[error("failed to read configuration: {0}")]
    Io(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}
