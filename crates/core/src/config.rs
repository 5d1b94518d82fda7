//! Application configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `UTTT_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::room::{DEFAULT_ROOM_CODE_LENGTH, MAX_ROOM_ID_LEN};

/// Directory under `~/.config` (and the data directory) owned by the app.
pub const APP_DIR: &str = "uttt";
/// Name of the configuration file inside [`APP_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# Ultimate tic-tac-toe room settings.

# Directory holding one JSON file per room.
# data_root = "/var/lib/uttt/rooms"

# Length of generated room codes.
room_code_length = 5

# Room events buffered per subscriber before the slowest one starts lagging.
broadcast_capacity = 64
"#;

/// Runtime settings shared by the store, the room service and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for persisted room records.
    pub data_root: PathBuf,
    /// Length of generated room codes.
    pub room_code_length: usize,
    /// Capacity of the room event broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
            broadcast_capacity: 64,
        }
    }
}

impl AppConfig {
    /// Default location of the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    /// Load from the default configuration path.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path`; a missing file leaves the defaults in place.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default(
                "data_root",
                defaults.data_root.to_string_lossy().to_string(),
            )?
            .set_default("room_code_length", defaults.room_code_length as i64)?
            .set_default("broadcast_capacity", defaults.broadcast_capacity as i64)?
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("UTTT"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_ROOM_ID_LEN).contains(&self.room_code_length),
            "room_code_length must be between 1 and {MAX_ROOM_ID_LEN}, got {}",
            self.room_code_length
        );
        ensure!(
            self.broadcast_capacity > 0,
            "broadcast_capacity must be positive"
        );
        Ok(())
    }
}

/// Default directory for room records.
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("rooms")
}

/// Directory for log files written by the binaries.
pub fn default_log_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs")
}

/// Write the commented default configuration if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_default_config_at(AppConfig::config_path())
}

/// Same as [`ensure_default_config`] for an explicit path.
pub fn ensure_default_config_at(path: impl Into<PathBuf>) -> Result<PathBuf> {
    let path = path.into();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(path)
}
