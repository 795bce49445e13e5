//! sigql configuration.
//!
//! Read from an explicit path, `./sigql.toml`, or
//! `<config dir>/sigql/config.toml`, falling back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SigqlError, SigqlResult};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "sigql.toml";

/// What to do with input that matches no token or shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leniency {
    /// Log, skip, and flag the statement with a note.
    #[default]
    Lenient,
    /// Fail the translation.
    Strict,
}

/// Column names of the event table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceColumns {
    pub case_id: String,
    pub activity: String,
    pub position: String,
}

impl Default for TraceColumns {
    fn default() -> Self {
        Self {
            case_id: "case_id".to_string(),
            activity: "activity".to_string(),
            position: "position".to_string(),
        }
    }
}

/// Settings for generating query files from a CSV of signal queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// CSV with `model_id` and `signal_query` columns
    pub input: PathBuf,

    /// Directory receiving one `model<k>/` folder per model
    pub output_dir: PathBuf,

    /// Catalog and schema prepended to every table name
    pub table_prefix: String,

    /// Sampling percentages; one output file per model and percentage
    pub percentages: Vec<u32>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/queries/signal_queries.csv"),
            output_dir: PathBuf::from("data/queries"),
            table_prefix: "postgresql.public".to_string(),
            percentages: (10..=100).step_by(10).collect(),
        }
    }
}

/// Main sigql configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub leniency: Leniency,
    pub columns: TraceColumns,
    pub batch: BatchConfig,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> SigqlResult<Self> {
        toml::from_str(content).map_err(|e| SigqlError::Config(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `./sigql.toml` and then the
    /// user config directory are tried; if neither exists the defaults apply.
    pub fn load(path: Option<&Path>) -> SigqlResult<Self> {
        if let Some(path) = path {
            let content = std::fs::read_to_string(path).map_err(|e| {
                SigqlError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            return Self::from_toml_str(&content);
        }

        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG))
            .chain(dirs::config_dir().map(|dir| dir.join("sigql").join("config.toml")));

        for candidate in candidates {
            if candidate.is_file() {
                tracing::debug!("Loading configuration from {}", candidate.display());
                let content = std::fs::read_to_string(&candidate)?;
                return Self::from_toml_str(&content);
            }
        }

        Ok(Self::default())
    }

    /// Create a new configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the leniency policy
    pub fn leniency(mut self, leniency: Leniency) -> Self {
        self.config.leniency = leniency;
        self
    }

    /// Set the event table columns
    pub fn columns(mut self, columns: TraceColumns) -> Self {
        self.config.columns = columns;
        self
    }

    /// Set the signal query CSV
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.batch.input = path.into();
        self
    }

    /// Set the output directory
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.batch.output_dir = path.into();
        self
    }

    /// Set the table prefix
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.batch.table_prefix = prefix.into();
        self
    }

    /// Set the sampling percentages
    pub fn percentages(mut self, percentages: Vec<u32>) -> Self {
        self.config.batch.percentages = percentages;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        self.config
    }
}
