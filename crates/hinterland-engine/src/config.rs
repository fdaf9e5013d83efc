//! Engine configuration.
//!
//! Run length, tick rate, the scripted route and the nested world settings.
//! Loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use hinterland_world::WorldConfig;

/// Configuration file name.
pub const CONFIG_FILE: &str = "hinterland.toml";

/// Engine configuration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the `chunks/` folder
    pub save_dir: PathBuf,
    /// Frames to simulate before saving and exiting
    pub frames: u32,
    /// Player walk speed in pixels per second
    pub walk_speed: f32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Sleep out each frame's budget instead of running flat out
    pub realtime: bool,
    /// Frames between eviction passes
    pub eviction_interval: u32,
    /// Waypoints the player walks through, in world pixels, looping
    pub route: Vec<[i64; 2]>,
    /// World settings
    pub world: WorldConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves/world"),
            frames: 3600,
            walk_speed: 160.0,
            tick_rate: 60,
            realtime: false,
            eviction_interval: 30,
            route: vec![[0, 0], [2048, 0], [2048, 2048], [-1024, 2048], [0, 0]],
            world: WorldConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let mut config = match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        return Self::default();
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                return Self::default();
            },
        };

        config.validate();
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs_config_path() {
            config_dir.join("hinterland").join(CONFIG_FILE)
        } else {
            PathBuf::from(CONFIG_FILE)
        }
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(1, 240);
        self.walk_speed = self.walk_speed.clamp(0.0, 10_000.0);
        self.eviction_interval = self.eviction_interval.max(1);
        if self.route.is_empty() {
            self.route.push([0, 0]);
        }
        self.world.validate();
    }
}

/// Get platform-specific config directory.
fn dirs_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|home| PathBuf::from(home).join("Library/Application Support"))
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.chunk_size, 16);
        assert_eq!(config.route.first(), Some(&[0, 0]));
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.tick_rate = 0;
        config.eviction_interval = 0;
        config.route.clear();
        config.world.worker_threads = 0;

        config.validate();

        assert_eq!(config.tick_rate, 1);
        assert_eq!(config.eviction_interval, 1);
        assert_eq!(config.route, vec![[0, 0]]);
        assert_eq!(config.world.worker_threads, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = EngineConfig::default();
        config.frames = 120;
        config.realtime = true;
        config.world.seed = 12345;
        config.world.load_objects = false;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.frames, 120);
        assert!(loaded.realtime);
        assert_eq!(loaded.world.seed, 12345);
        assert!(!loaded.world.load_objects);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "frames = 10\n\n[world]\nseed = 7\n").expect("write");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.frames, 10);
        assert_eq!(loaded.world.seed, 7);
        assert_eq!(loaded.world.tile_size, 32);
        assert_eq!(loaded.tick_rate, 60);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "frames = \"many\"").expect("write");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.frames, EngineConfig::default().frames);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/config.toml");
        assert_eq!(config.frames, 3600);
    }

    #[test]
    fn test_config_toml_serialization() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");

        assert!(toml_str.contains("save_dir"));
        assert!(toml_str.contains("[world]"));
    }
}
