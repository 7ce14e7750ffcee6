//! Application configuration.
//!
//! Values are layered: built-in defaults, then the optional TOML file under the
//! user's config directory, then `GAMEPICKER_*` environment variables. Nested
//! keys use `__` in the environment, e.g. `GAMEPICKER_ENRICHMENT__ITEM_DELAY_MS`.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pipeline::Strategy;

/// Directory name used under the platform config and cache directories.
pub const APP_DIR: &str = "gamepicker";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "GAMEPICKER";

const DEFAULT_CONFIG: &str = r#"# gamepicker configuration

# Steam Web API key. Can also be set with GAMEPICKER_STEAM_API_KEY.
# steam_api_key = ""

# Maximum number of low-playtime games enriched per analysis.
max_items = 300

# Games below this many minutes of playtime are candidates.
low_playtime_minutes = 60

# Per-request timeout for all HTTP calls.
request_timeout_secs = 30

[enrichment]
# "sequential" or "parallel"
strategy = "sequential"
# The storefront is unreliable for multi-id requests, keep this at 1.
sequential_batch_size = 1
parallel_batch_size = 20
inter_batch_delay_ms = 100
stagger_ms = 100
item_delay_ms = 50
max_retries = 1
max_concurrent_batches = 10
"#;

/// Tunables for the enrichment pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Strategy used for bulk enrichment.
    pub strategy: Strategy,
    /// Batch size for the sequential strategy.
    pub sequential_batch_size: usize,
    /// Batch size for the parallel-staggered strategy.
    pub parallel_batch_size: usize,
    /// Pause between consecutive sequential batches.
    pub inter_batch_delay_ms: u64,
    /// Start offset per batch index in the parallel strategy.
    pub stagger_ms: u64,
    /// Pause between items in progressive mode.
    pub item_delay_ms: u64,
    /// Extra attempts after the first failed request.
    pub max_retries: u32,
    /// Upper bound on simultaneously running parallel batches.
    pub max_concurrent_batches: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Sequential,
            sequential_batch_size: 1,
            parallel_batch_size: 20,
            inter_batch_delay_ms: 100,
            stagger_ms: 100,
            item_delay_ms: 50,
            max_retries: 1,
            max_concurrent_batches: 10,
        }
    }
}

impl EnrichmentConfig {
    /// Batch size configured for `strategy`.
    pub fn batch_size(&self, strategy: Strategy) -> usize {
        match strategy {
            Strategy::Sequential => self.sequential_batch_size,
            Strategy::ParallelStaggered => self.parallel_batch_size,
        }
    }

    /// Inter-batch delay as a [`Duration`].
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    /// Per-batch stagger as a [`Duration`].
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    /// Progressive inter-item delay as a [`Duration`].
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Steam Web API key used for identity and library calls.
    pub steam_api_key: Option<String>,
    /// Maximum number of games enriched per analysis run.
    pub max_items: usize,
    /// Low-playtime threshold in minutes.
    pub low_playtime_minutes: u32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Directory holding cached session snapshots.
    pub cache_root: PathBuf,
    /// Enrichment tunables.
    pub enrichment: EnrichmentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            steam_api_key: None,
            max_items: 300,
            low_playtime_minutes: 60,
            request_timeout_secs: 30,
            cache_root: default_cache_root(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration using `path` as the optional TOML layer.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults =
            Config::try_from(&AppConfig::default()).context("failed to build default config")?;

        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to load config from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Location of the user config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Default directory for cached session snapshots.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("sessions")
}

/// Write the commented default config file when none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}
