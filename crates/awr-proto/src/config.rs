use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub radios: RadiosConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player binary, resolved through `platform::find_player_binary`.
    #[serde(default = "default_player_binary")]
    pub binary: String,
    /// Extra arguments placed before `-slave`, e.g. `["-really-quiet"]`.
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// How long `shutdown` waits for the player to exit after `quit`
    /// before killing it.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

/// Where the genre/radio catalog lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiosConfig {
    #[serde(default = "default_radios_file")]
    pub radios_file: PathBuf,
}

impl PlayerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: default_player_binary(),
            extra_args: Vec::new(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl Default for RadiosConfig {
    fn default() -> Self {
        Self {
            radios_file: default_radios_file(),
        }
    }
}

fn default_player_binary() -> String {
    platform::player_binary_name().to_string()
}

fn default_shutdown_grace_ms() -> u64 {
    1000
}

fn default_radios_file() -> PathBuf {
    platform::config_dir().join("radios.json")
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.binary, platform::player_binary_name());
        assert!(config.player.extra_args.is_empty());
        assert_eq!(config.player.shutdown_grace(), Duration::from_secs(1));
        assert!(config.radios.radios_file.ends_with("awr/radios.json"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [player]
            shutdown_grace_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.player.shutdown_grace_ms, 250);
        assert_eq!(config.player.binary, platform::player_binary_name());
    }

    #[test]
    fn test_load_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.player.shutdown_grace_ms, 1000);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.player.binary, config.player.binary);
    }
}
