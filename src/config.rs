//! Configuration for agent-office
//!
//! Tunables for motion, collision handling and lifecycle timing are loaded
//! from `~/.config/agent-office/config.toml`. Every field has a default, so a
//! missing or partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum agents the office will animate at once
pub const MAX_AGENTS: usize = 32;

/// Application configuration loaded from file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OfficeConfig {
    /// Walking speed and frame pacing
    #[serde(default)]
    pub motion: MotionConfig,

    /// Collision wait windows and repath budget
    #[serde(default)]
    pub collision: CollisionConfig,

    /// Lifecycle and bubble timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Deterministic simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Motion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionConfig {
    /// Walking speed in pixels per second
    #[serde(default = "default_walk_speed")]
    pub walk_speed: f32,

    /// Frames per second for the tick loop
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            walk_speed: default_walk_speed(),
            frame_rate: default_frame_rate(),
        }
    }
}

fn default_walk_speed() -> f32 {
    150.0
}

fn default_frame_rate() -> f64 {
    60.0
}

/// Collision configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollisionConfig {
    /// Wait window (ms) for the agent that yields
    #[serde(default = "default_yield_wait")]
    pub yield_wait_ms: (u64, u64),

    /// Wait window (ms) for the agent that keeps priority
    #[serde(default = "default_short_wait")]
    pub short_wait_ms: (u64, u64),

    /// Repath attempts before an agent just keeps waiting
    #[serde(default = "default_max_repath_attempts")]
    pub max_repath_attempts: u32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            yield_wait_ms: default_yield_wait(),
            short_wait_ms: default_short_wait(),
            max_repath_attempts: default_max_repath_attempts(),
        }
    }
}

fn default_yield_wait() -> (u64, u64) {
    (800, 1400)
}

fn default_short_wait() -> (u64, u64) {
    (200, 500)
}

fn default_max_repath_attempts() -> u32 {
    3
}

/// Lifecycle timing configuration (all values in milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Minimum time a non-persistent bubble stays on screen
    #[serde(default = "default_bubble_min_display")]
    pub bubble_min_display_ms: u64,

    /// Delay between the first and second line of a conversation
    #[serde(default = "default_conversation_step")]
    pub conversation_step_ms: u64,

    /// Minimum dwell after the second line before walking on
    #[serde(default = "default_conversation_dwell")]
    pub conversation_dwell_ms: u64,

    /// Pause while standing at the boss desk
    #[serde(default = "default_boss_pause")]
    pub boss_pause_ms: u64,

    /// Pause inside the elevator before asking for the doors to close
    #[serde(default = "default_elevator_pause")]
    pub elevator_pause_ms: u64,

    /// Door close animation length
    #[serde(default = "default_door_close")]
    pub door_close_ms: u64,

    /// Length of the context-compaction animation (boss is busy)
    #[serde(default = "default_compaction")]
    pub compaction_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bubble_min_display_ms: default_bubble_min_display(),
            conversation_step_ms: default_conversation_step(),
            conversation_dwell_ms: default_conversation_dwell(),
            boss_pause_ms: default_boss_pause(),
            elevator_pause_ms: default_elevator_pause(),
            door_close_ms: default_door_close(),
            compaction_ms: default_compaction(),
        }
    }
}

fn default_bubble_min_display() -> u64 {
    3000
}

fn default_conversation_step() -> u64 {
    1500
}

fn default_conversation_dwell() -> u64 {
    1500
}

fn default_boss_pause() -> u64 {
    800
}

fn default_elevator_pause() -> u64 {
    600
}

fn default_door_close() -> u64 {
    700
}

fn default_compaction() -> u64 {
    10_000
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Seed for the office random source
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

fn default_seed() -> u64 {
    0x0FF1_CE
}

impl OfficeConfig {
    /// Load configuration from default path (~/.config/agent-office/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(&Self::default_path())
    }

    /// Get the default configuration path
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from("~/.config/agent-office/config.toml"),
            |dirs| dirs.config_dir().join("agent-office").join("config.toml"),
        )
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> crate::errors::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Generate example configuration file content
    pub fn example() -> String {
        r#"# Agent Office Configuration
# Place this file at ~/.config/agent-office/config.toml

[motion]
# Walking speed in pixels per second
walk_speed = 150.0
frame_rate = 60.0

[collision]
# Randomized wait windows in milliseconds (min, max)
yield_wait_ms = [800, 1400]
short_wait_ms = [200, 500]
max_repath_attempts = 3

[timing]
bubble_min_display_ms = 3000
conversation_step_ms = 1500
conversation_dwell_ms = 1500
boss_pause_ms = 800
elevator_pause_ms = 600
door_close_ms = 700
compaction_ms = 10000

[simulation]
seed = 1044942
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = OfficeConfig::load_from_path(&temp.path().join("nope.toml"));
        assert_eq!(config, OfficeConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[motion]\nwalk_speed = 90.0\n").unwrap();

        let config = OfficeConfig::load_from_path(&path);
        assert!((config.motion.walk_speed - 90.0).abs() < f32::EPSILON);
        assert_eq!(config.collision.max_repath_attempts, 3);
        assert_eq!(config.timing.bubble_min_display_ms, 3000);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[motion\nwalk_speed = ").unwrap();

        let config = OfficeConfig::load_from_path(&path);
        assert_eq!(config, OfficeConfig::default());
    }

    #[test]
    fn test_example_parses() {
        let config = OfficeConfig::parse(&OfficeConfig::example()).unwrap();
        assert_eq!(config.collision.yield_wait_ms, (800, 1400));
        assert_eq!(config.simulation.seed, 1_044_942);
    }
}
