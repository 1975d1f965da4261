//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::ingest::DEFAULT_MIN_TEST_COUNT;
use crate::registry::DEFAULT_TEST_PATH_MARKER;

/// Environment prefix; nested keys are separated by `__`.
const ENV_PREFIX: &str = "MORPHEUS_";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coverage database.
    pub database: DatabaseConfig,
    /// Ingestion rules.
    pub ingest: IngestConfig,
    /// File names inside an analysis output tree.
    pub layout: LayoutConfig,
    /// Output configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from an explicit file path.
    ///
    /// Errors if the file does not exist. Use this for explicit `--config` flags.
    /// Env vars with `MORPHEUS_` prefix override file values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file_exact(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Load configuration from directory, looking for morpheus.toml or
    /// .morpheus/morpheus.toml.
    ///
    /// Missing files are silently skipped (defaults are used).
    pub fn load_default(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(dir.join("morpheus.toml")))
            .merge(Toml::file(dir.join(".morpheus/morpheus.toml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::config(e.to_string()))
    }

    /// Create default config file content.
    pub fn default_toml() -> &'static str {
        include_str!("default_config.toml")
    }
}

/// Coverage database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `:memory:` keeps everything in memory.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("morpheus.db"),
        }
    }
}

/// Ingestion rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Declarations whose file path contains this are treated as test code.
    pub test_path_marker: String,
    /// Coverage payloads reporting fewer tests are rejected.
    pub min_test_count: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            test_path_marker: DEFAULT_TEST_PATH_MARKER.to_string(),
            min_test_count: DEFAULT_MIN_TEST_COUNT,
        }
    }
}

/// Layout of an analysis output tree: `<root>/<project>/<sha>/...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub methods_file: String,
    pub coverage_file: String,
    pub commit_file: String,
    /// Optional, one level above the commit directories.
    pub project_file: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            methods_file: "methods.json".to_string(),
            coverage_file: "coverage.json".to_string(),
            commit_file: "commit.json".to_string(),
            project_file: "project.json".to_string(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format.
    pub format: OutputFormat,
    /// Color output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON format.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'")),
        }
    }
}
