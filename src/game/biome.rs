//! Biome selection
//!
//! Stages rotate through a fixed cycle of seven biomes. The frontend themes
//! the page from the biome id; nothing else in the round depends on it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Biome {
    #[default]
    Gras,
    Dirt,
    Stone,
    Ice,
    Dungeon,
    Crystal,
    Lava,
}

/// Rotation order: stage 1 -> gras, 2 -> dirt, ... 7 -> lava, 8 -> gras
pub const BIOME_CYCLE: [Biome; 7] = [
    Biome::Gras,
    Biome::Dirt,
    Biome::Stone,
    Biome::Ice,
    Biome::Dungeon,
    Biome::Crystal,
    Biome::Lava,
];

impl Biome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Biome::Gras => "gras",
            Biome::Dirt => "dirt",
            Biome::Stone => "stone",
            Biome::Ice => "ice",
            Biome::Dungeon => "dungeon",
            Biome::Crystal => "crystal",
            Biome::Lava => "lava",
        }
    }

    /// Map any stored biome string to a valid biome. Legacy names are
    /// translated; unknown or empty input yields the default.
    pub fn normalize(raw: &str) -> Biome {
        match raw.trim().to_lowercase().as_str() {
            "gras" | "grass" | "default" => Biome::Gras,
            "dirt" => Biome::Dirt,
            "stone" | "cave" => Biome::Stone,
            "ice" => Biome::Ice,
            "dungeon" => Biome::Dungeon,
            "crystal" => Biome::Crystal,
            "lava" => Biome::Lava,
            _ => Biome::Gras,
        }
    }

    /// Biome for a stage number (stages below 1 count as 1)
    pub fn for_stage(stage: u32) -> Biome {
        let s = stage.max(1);
        BIOME_CYCLE[((s - 1) % BIOME_CYCLE.len() as u32) as usize]
    }

    /// Floor texture file name for normal rounds
    pub fn floor_texture(&self) -> String {
        format!("{}.png", self.as_str())
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
