use std::path::PathBuf;

use crate::game::constants::{grid, round};

/// Host configuration for running rounds
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Directory the file-backed save store writes to
    pub save_dir: PathBuf,
    /// Save slot to activate on startup (keeps the stored one if unset)
    pub slot: Option<String>,
    /// Grid width in tiles
    pub grid_width: u32,
    /// Grid height in tiles
    pub grid_height: u32,
    /// Boss rounds on every 6th stage (and forced boss rounds)
    pub boss_system_enabled: bool,
    /// Fixed RNG seed for reproducible rounds
    pub rng_seed: Option<u64>,
    /// Length of a fresh round in seconds
    pub round_time_secs: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("./saves"),
            slot: None,
            grid_width: grid::WIDTH,
            grid_height: grid::HEIGHT,
            boss_system_enabled: true,
            rng_seed: None,
            round_time_secs: round::ROUND_TIME,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl GameConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MINECLICKER_SAVE_DIR") {
            if dir.trim().is_empty() {
                tracing::warn!("MINECLICKER_SAVE_DIR is empty, using default");
            } else {
                config.save_dir = PathBuf::from(dir);
            }
        }

        if let Ok(slot) = std::env::var("MINECLICKER_SLOT") {
            if !slot.trim().is_empty() {
                config.slot = Some(slot.trim().to_string());
            }
        }

        if let Ok(width) = std::env::var("GRID_WIDTH") {
            match width.parse::<u32>() {
                Ok(parsed) if (1..=256).contains(&parsed) => config.grid_width = parsed,
                Ok(_) => tracing::warn!("GRID_WIDTH must be 1-256, using default"),
                Err(_) => tracing::warn!("Invalid GRID_WIDTH '{}', using default", width),
            }
        }

        if let Ok(height) = std::env::var("GRID_HEIGHT") {
            match height.parse::<u32>() {
                Ok(parsed) if (1..=256).contains(&parsed) => config.grid_height = parsed,
                Ok(_) => tracing::warn!("GRID_HEIGHT must be 1-256, using default"),
                Err(_) => tracing::warn!("Invalid GRID_HEIGHT '{}', using default", height),
            }
        }

        if let Ok(flag) = std::env::var("BOSS_SYSTEM") {
            if let Some(parsed) = parse_flag(&flag) {
                config.boss_system_enabled = parsed;
            } else {
                tracing::warn!("Invalid BOSS_SYSTEM '{}', using default", flag);
            }
        }

        if let Ok(seed) = std::env::var("RNG_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.rng_seed = Some(parsed);
            } else {
                tracing::warn!("Invalid RNG_SEED '{}', ignoring", seed);
            }
        }

        if let Ok(secs) = std::env::var("ROUND_TIME") {
            match secs.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.round_time_secs = parsed,
                Ok(_) => tracing::warn!("ROUND_TIME must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid ROUND_TIME '{}', using default", secs),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err("Grid dimensions must be at least 1x1".to_string());
        }
        if self.round_time_secs == 0 {
            return Err("round_time_secs must be at least 1".to_string());
        }
        if self.save_dir.as_os_str().is_empty() {
            return Err("save_dir cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.grid_width, 12);
        assert_eq!(config.grid_height, 13);
        assert_eq!(config.round_time_secs, 30);
        assert!(config.boss_system_enabled);
        assert!(config.slot.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_validate_rejects_zero_grid() {
        let config = GameConfig {
            grid_width: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = GameConfig::load_or_default();
        assert!(config.validate().is_ok());
    }
}
