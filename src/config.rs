/// Runtime settings
///
/// Priority: CLI args > `CARQUERY_*` environment > config file > defaults.
/// CLI overrides are applied by the binary on top of what `Settings::load`
/// returns.

use crate::executor::{FlushMode, DEFAULT_CHUNK_ROWS};
use crate::network::DEFAULT_MAX_MESSAGE_BYTES;
use crate::types::QueryError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "./carquery.toml";

const ENV_PREFIX: &str = "CARQUERY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_queries")]
    pub queries: PathBuf,
    /// Shared-memory pool size
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Records claimed per shared-memory work item
    #[serde(default = "default_chunk_rows")]
    pub chunk_rows: usize,
    /// Per-message bound for distributed transfers
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
    /// Participants for in-process distributed runs
    #[serde(default = "default_ranks")]
    pub ranks: usize,
    /// `None` picks the per-mode default
    #[serde(default)]
    pub flush: Option<FlushMode>,
}

fn default_database() -> PathBuf { PathBuf::from("db/db.txt") }
fn default_queries() -> PathBuf { PathBuf::from("db/sql.txt") }
fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
fn default_chunk_rows() -> usize { DEFAULT_CHUNK_ROWS }
fn default_max_chunk_bytes() -> usize { DEFAULT_MAX_MESSAGE_BYTES }
fn default_ranks() -> usize { 4 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: default_database(),
            queries: default_queries(),
            threads: default_threads(),
            chunk_rows: default_chunk_rows(),
            max_chunk_bytes: default_max_chunk_bytes(),
            ranks: default_ranks(),
            flush: None,
        }
    }
}

impl Settings {
    /// Load settings from `config_file` (required when given, otherwise
    /// `./carquery.toml` if it exists) and the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, QueryError> {
        Self::from_sources(
            config_file,
            Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        )
    }

    fn from_sources(config_file: Option<&Path>, env: Environment) -> Result<Self, QueryError> {
        let mut builder = Config::builder();

        match config_file {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
                info!("Loaded config from: {}", path.display());
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE));
                info!("Loaded config from: {}", DEFAULT_CONFIG_FILE);
            }
            None => {}
        }

        builder = builder.add_source(env);
        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings.normalized())
    }

    /// Clamp counts that must be at least one
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.threads = self.threads.max(1);
        self.chunk_rows = self.chunk_rows.max(1);
        self.ranks = self.ranks.max(1);
        self
    }
}
