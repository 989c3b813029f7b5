//! Configuration system for Trainkit.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment -> explicit overrides. Configuration is
//! read from `~/.config/trainkit/config.toml` and/or `.trainkit/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{CheckpointStore, Device, FileCheckpointStore, InMemoryCheckpointStore};
use crate::error::ConfigError;
use crate::metric::{MetricKind, StreamingMetric};
use crate::persistence;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainkitConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Metrics the orchestrator should track, in report order.
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

/// Which engine variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Reference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,
    #[serde(default)]
    pub device: Device,
}

/// Where checkpoints are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Root directory for the filesystem backend.
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            dir: default_checkpoint_dir(),
        }
    }
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".trainkit/checkpoints")
}

impl CheckpointConfig {
    /// Construct the configured store.
    pub fn build_store(&self) -> Arc<dyn CheckpointStore> {
        match self.backend {
            StoreBackend::Memory => Arc::new(InMemoryCheckpointStore::new()),
            StoreBackend::Filesystem => Arc::new(FileCheckpointStore::new(self.dir.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for the stderr layer.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, a JSON log is also written to a daily file in this directory.
    #[serde(default)]
    pub json_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub kind: MetricKind,
    /// Report label; defaults to the kind name.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_true")]
    pub compute_on_call: bool,
}

fn default_true() -> bool {
    true
}

impl MetricConfig {
    pub fn build(&self) -> StreamingMetric {
        let label = self
            .label
            .clone()
            .unwrap_or_else(|| self.kind.name().to_string());
        StreamingMetric::new(self.kind, label).with_compute_on_call(self.compute_on_call)
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TRAINKIT_`)
/// 3. Workspace-local config (`.trainkit/config.toml`)
/// 4. User config (`~/.config/trainkit/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TrainkitConfig>,
) -> Result<TrainkitConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TrainkitConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "trainkit", "trainkit") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".trainkit").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // TRAINKIT_ENGINE__KIND, TRAINKIT_CHECKPOINT__BACKEND, ...
    figment = figment.merge(Env::prefixed("TRAINKIT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TrainkitConfig = figment.extract().map_err(Box::new)?;
    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}

/// Write a TOML snapshot of `config` to `path`, e.g. next to a run's logs.
pub fn save_config(config: &TrainkitConfig, path: &Path) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config)?;
    persistence::atomic_write(path, rendered.as_bytes()).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
