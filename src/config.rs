//! Prefetch tuning and application paths.
//!
//! `PrefetchConfig` is stored as JSON in `framefetch.json` inside the config
//! directory. A missing file means defaults.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "framefetch.json";
pub const LOG_FILE: &str = "framefetch.log";
const APP_DIR: &str = "framefetch";
const CONFIG_DIR_ENV: &str = "FRAMEFETCH_CONFIG_DIR";

/// Prefetch engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Window size the throttle never applies below
    pub throttle_min_ahead: u32,
    /// Minimum lead (frames) over the playhead before a worker yields
    pub throttle_min_margin: f32,
    /// Skip starting during playback when the frame cost estimate exceeds this
    pub max_playing_cost: f32,
    /// Frame cache capacity (entries)
    pub cache_capacity: usize,
    /// Fraction of available memory the cache may use (0.0-1.0)
    pub mem_fraction: f64,
    /// Memory reserved for the rest of the system (GB)
    pub reserve_gb: f64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            throttle_min_ahead: 5,
            throttle_min_margin: 2.0,
            max_playing_cost: 0.9,
            cache_capacity: 500,
            mem_fraction: 0.5,
            reserve_gb: 2.0,
        }
    }
}

impl PrefetchConfig {
    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }
}

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (FRAMEFETCH_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. FRAMEFETCH_CONFIG_DIR environment variable
/// 3. Local folder IF framefetch.json or framefetch.log exist there
/// 4. Platform-specific config directory from dirs-next (default)
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir).join(name)
}

/// Get path to a data file (logs). Same priority as [`config_file`], with the
/// platform data directory as default.
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir).join(name)
}

/// Create config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir);
    let data_dir = resolve_dir(config, dirs_next::data_dir);

    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform_dir: fn() -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir()
        && has_local_files(&current_dir)
    {
        return current_dir;
    }

    platform_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("framefetch-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(
            config_file("test.json", &config),
            PathBuf::from("/custom/test.json")
        );
        assert_eq!(data_file("a.log", &config), PathBuf::from("/custom/a.log"));
    }

    #[test]
    fn test_cli_dir_wins() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_defaults() {
        let config = PrefetchConfig::default();
        assert_eq!(config.throttle_min_ahead, 5);
        assert_eq!(config.throttle_min_margin, 2.0);
        assert_eq!(config.max_playing_cost, 0.9);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = temp_dir("missing");
        let config = PrefetchConfig::load(&dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(config, PrefetchConfig::default());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_and_load() {
        let dir = temp_dir("save");
        let path = dir.join(CONFIG_FILE);
        let config = PrefetchConfig {
            throttle_min_ahead: 8,
            cache_capacity: 42,
            ..PrefetchConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PrefetchConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = temp_dir("partial");
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "max_playing_cost": 1.5 }"#).unwrap();
        let config = PrefetchConfig::load(&path).unwrap();
        assert_eq!(config.max_playing_cost, 1.5);
        assert_eq!(config.throttle_min_ahead, 5);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = temp_dir("bad");
        let path = dir.join(CONFIG_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(PrefetchConfig::load(&path).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
