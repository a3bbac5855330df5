//! Server configuration, read from `pixelpet.toml`.
//!
//! Every field has a default so the file is optional. `PIXELPET_CONFIG`
//! points at a different file.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::game::SessionSettings;

pub const CONFIG_ENV_VAR: &str = "PIXELPET_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pixelpet.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub save_file: PathBuf,
    pub tick_ms: u64,
    pub autosave_secs: u64,
    pub starting_money: i32,
    pub restock_interval_seconds: u64,
    pub restock_quantity: i32,
    pub sell_multiplier: f32,
    pub hot_reload: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 2568)),
            data_dir: PathBuf::from("data"),
            save_file: PathBuf::from("data/Persistence.json"),
            tick_ms: 50, // 20 Hz
            autosave_secs: 60,
            starting_money: 100,
            restock_interval_seconds: 120,
            restock_quantity: 5,
            sell_multiplier: 0.5,
            hot_reload: true,
        }
    }
}

impl ServerConfig {
    /// Load from `PIXELPET_CONFIG` or `pixelpet.toml`, falling back to defaults
    pub fn load() -> Result<Self, String> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn ticks_per_second(&self) -> u64 {
        (1000 / self.tick_ms.max(1)).max(1)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            ticks_per_second: self.ticks_per_second(),
            restock_interval_seconds: self.restock_interval_seconds,
            sell_multiplier: self.sell_multiplier,
            default_restock_quantity: self.restock_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.ticks_per_second(), 20);
        assert_eq!(config.bind_addr.port(), 2568);
    }

    #[test]
    fn test_partial_file_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pixelpet.toml");
        std::fs::write(
            &path,
            r#"
bind_addr = "127.0.0.1:9000"
tick_ms = 100
starting_money = 250
save_file = "saves/slot.json"
"#,
        )
        .unwrap();

        let config = ServerConfig::load_from(&path).unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.starting_money, 250);
        assert_eq!(config.save_file, PathBuf::from("saves/slot.json"));
        assert_eq!(config.autosave_secs, 60);

        let settings = config.session_settings();
        assert_eq!(settings.ticks_per_second, 10);
        assert_eq!(settings.default_restock_quantity, 5);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pixelpet.toml");
        std::fs::write(&path, "tick_ms = \"fast\"").unwrap();
        assert!(ServerConfig::load_from(&path).is_err());
    }
}
