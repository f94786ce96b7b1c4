//! Gameplay constants
//!
//! Grouped by concern. Values here are the tuned defaults of the mining round;
//! anything a host may want to vary lives in `GameConfig` instead.

/// Grid geometry
pub mod grid {
    /// Edge length of one tile in page pixels
    pub const TILE_SIZE: f64 = 64.0;
    /// Default grid width in tiles
    pub const WIDTH: u32 = 12;
    /// Default grid height in tiles
    pub const HEIGHT: u32 = 13;
}

/// Round timing
pub mod round {
    /// Round length in seconds when the save has no positive remaining time
    pub const ROUND_TIME: u32 = 30;
    /// Timer countdown interval in milliseconds
    pub const TIMER_INTERVAL_MS: u64 = 1000;
    /// Area-of-effect combat interval in milliseconds (5 Hz)
    pub const AOE_INTERVAL_MS: u64 = 200;
    /// Regeneration / boost interval in milliseconds
    pub const BOOST_TICK_MS: u64 = 1000;
}

/// Permanent upgrade caps and effects
pub mod upgrades {
    /// Highest radius level that takes effect (boosts included)
    pub const MAX_RADIUS: u32 = 25;
    /// Highest amount level that takes effect
    pub const MAX_AMOUNT: u32 = 101;
    /// Base damage per combat tick
    pub const BASE_DAMAGE: f64 = 1.0;
    /// Additional damage per damage level
    pub const DAMAGE_PER_LEVEL: f64 = 0.5;
    /// Gold bonus per gold-boost level (5%)
    pub const GOLD_BOOST_PER_LEVEL: f64 = 0.05;
    /// Attack radius at level 0, in tiles
    pub const RADIUS_BASE_TILES: f64 = 0.5;
    /// Attack radius gained per level, in tiles
    pub const RADIUS_PER_LEVEL_TILES: f64 = 0.2;
}

/// Stage scaling and boss cadence
pub mod stage {
    /// Every n-th stage is a boss stage
    pub const BOSS_INTERVAL: u32 = 6;
    /// Stone HP growth per stage step (+7%)
    pub const HP_GROWTH: f64 = 0.07;
    /// Gold growth per stage step (+6%)
    pub const GOLD_GROWTH: f64 = 0.06;
    /// Upper bound on the fraction of tiles holding a stone
    pub const MAX_FILL_RATIO: f64 = 0.80;
}

/// Stone spawning and stats
pub mod stone {
    /// Spawn chance per tile at amount level 0
    pub const BASE_SPAWN_CHANCE: f64 = 0.4;
    /// Spawn chance gained per amount level
    pub const SPAWN_CHANCE_PER_LEVEL: f64 = 0.05;
    /// Spawn chance ceiling
    pub const MAX_SPAWN_CHANCE: f64 = 0.65;
    /// Chance that a spawned stone is rare
    pub const RARE_CHANCE: f64 = 0.1;
    /// Normal stone HP range (min, span)
    pub const HP_MIN: f64 = 12.0;
    pub const HP_SPAN: f64 = 8.0;
    /// Rare stone HP range (min, span)
    pub const RARE_HP_MIN: f64 = 60.0;
    pub const RARE_HP_SPAN: f64 = 20.0;
    /// Base gold value of a normal stone
    pub const GOLD: f64 = 3.0;
    /// Base gold value of a rare stone
    pub const RARE_GOLD: f64 = 10.0;
    /// Upper bound of the random payout variance (+0..20%)
    pub const PAYOUT_VARIANCE: f64 = 0.2;
}

/// Boss encounter
pub mod boss {
    pub const BASE_HP: f64 = 800.0;
    pub const BASE_GOLD: f64 = 300.0;
    /// Sprite rotation, one per boss block (6, 12, 18, ...)
    pub const SPRITES: [&str; 5] = [
        "boss_gold.png",
        "boss_crystal.png",
        "boss_lava_violet.png",
        "boss_demon_lava.png",
        "boss_mech.png",
    ];
    /// Floor rotation for boss rounds
    pub const FLOORS: [&str; 3] = [
        "boss_floor_lava.png",
        "boss_floor_rune.png",
        "boss_floor_void.png",
    ];
}

/// Player level curve and level-up rewards
pub mod level {
    /// Stones needed for level 1 -> 2
    pub const STONE_BASE: f64 = 40.0;
    /// Exponential growth of the stone requirement per level
    pub const STONE_GROWTH: f64 = 1.18;
    /// Permanent gold regeneration gained per level-up (gold/s)
    pub const REGEN_PER_LEVEL: f64 = 0.5;
}

/// Timed boosts granted on level-up
pub mod boost {
    pub const DAMAGE_MAGNITUDE: f64 = 0.5;
    pub const DAMAGE_DURATION_SECS: u32 = 10;
    pub const GOLD_MAGNITUDE: f64 = 0.5;
    pub const GOLD_DURATION_SECS: u32 = 10;
    /// Radius boosts are additive levels, not a multiplier
    pub const RADIUS_MAGNITUDE: f64 = 3.0;
    pub const RADIUS_DURATION_SECS: u32 = 8;
}

/// Attack radius in pixels for an (already clamped) radius level
#[inline]
pub fn radius_for_level(level: f64) -> f64 {
    grid::TILE_SIZE * (upgrades::RADIUS_BASE_TILES + upgrades::RADIUS_PER_LEVEL_TILES * level)
}
