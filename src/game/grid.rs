//! Round grid and entity generation
//!
//! The grid owns every entity of the round: one optional slot per tile.
//! The rendering layer mirrors this data and is never consulted for it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::biome::Biome;
use crate::game::constants::{boss, grid as consts, stage::BOSS_INTERVAL, stone};
use crate::game::stages::{boss_stage_for, gold_multiplier, max_fill_ratio, stone_hp_multiplier};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Stone,
    RareStone,
    Boss,
}

impl EntityKind {
    pub fn is_stone(&self) -> bool {
        matches!(self, EntityKind::Stone | EntityKind::RareStone)
    }
}

/// A destructible occupant of one tile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub hp: f64,
    pub max_hp: f64,
    /// Base payout before upgrades, boosts and variance
    pub gold_value: f64,
}

impl Entity {
    pub fn stone<R: Rng>(rare: bool, stage: u32, rng: &mut R) -> Self {
        let (min, span, gold, kind) = if rare {
            (stone::RARE_HP_MIN, stone::RARE_HP_SPAN, stone::RARE_GOLD, EntityKind::RareStone)
        } else {
            (stone::HP_MIN, stone::HP_SPAN, stone::GOLD, EntityKind::Stone)
        };
        let hp = (min + rng.gen::<f64>() * span) * stone_hp_multiplier(stage);
        Self {
            kind,
            hp,
            max_hp: hp,
            gold_value: gold * gold_multiplier(stage),
        }
    }

    pub fn boss(stage: u32) -> Self {
        let hp = boss::BASE_HP * stone_hp_multiplier(stage);
        Self {
            kind: EntityKind::Boss,
            hp,
            max_hp: hp,
            gold_value: boss::BASE_GOLD * gold_multiplier(stage),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.hp <= 0.0
    }

    /// Remaining HP fraction in [0, 1] for the HP bar
    pub fn hp_ratio(&self) -> f64 {
        if self.max_hp > 0.0 {
            (self.hp / self.max_hp).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Visual theme of the round, consumed by the frontend
#[derive(Debug, Clone, PartialEq)]
pub enum RoundTheme {
    /// Per-tile floor texture of the biome
    Normal { floor: String },
    /// One large floor image plus the boss sprite
    Boss {
        sprite: &'static str,
        floor: &'static str,
        /// Shift applied to the boss sprite so it sits on the grid midpoint
        offset: Vec2,
    },
}

/// Inputs for populating a round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnParams {
    pub is_boss_round: bool,
    /// Stage actually fought (drives scaling)
    pub stage: u32,
    /// Already capped amount upgrade level
    pub amount_level: u32,
    pub biome: Biome,
}

/// Per-tile spawn chance for an amount level
pub fn spawn_chance(amount_level: u32) -> f64 {
    (stone::BASE_SPAWN_CHANCE + amount_level as f64 * stone::SPAWN_CHANCE_PER_LEVEL)
        .min(stone::MAX_SPAWN_CHANCE)
}

/// Rotation index of the boss block containing `stage` (0 for stages 1-6)
fn boss_block_index(stage: u32) -> usize {
    let boss_stage = boss_stage_for(stage).max(BOSS_INTERVAL);
    (boss_stage.div_ceil(BOSS_INTERVAL) - 1) as usize
}

pub fn boss_sprite_for_stage(stage: u32) -> &'static str {
    boss::SPRITES[boss_block_index(stage) % boss::SPRITES.len()]
}

pub fn boss_floor_for_stage(stage: u32) -> &'static str {
    boss::FLOORS[boss_block_index(stage) % boss::FLOORS.len()]
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    /// Page position of the grid's top-left corner
    origin: Vec2,
    tiles: Vec<Option<Entity>>,
    theme: RoundTheme,
}

impl Grid {
    pub fn new(width: u32, height: u32, origin: Vec2) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            origin,
            tiles: vec![None; (width * height) as usize],
            theme: RoundTheme::Normal {
                floor: Biome::default().floor_texture(),
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
    }

    pub fn theme(&self) -> &RoundTheme {
        &self.theme
    }

    /// Index of the tile the boss occupies
    pub fn center_index(&self) -> usize {
        ((self.height / 2) * self.width + self.width / 2) as usize
    }

    /// Page-space center of tile `idx`
    pub fn tile_center(&self, idx: usize) -> Vec2 {
        let col = (idx as u32 % self.width) as f64;
        let row = (idx as u32 / self.width) as f64;
        self.origin + Vec2::new((col + 0.5) * consts::TILE_SIZE, (row + 0.5) * consts::TILE_SIZE)
    }

    /// Half-tile shift per even dimension, so a boss on the center tile
    /// appears on the grid midpoint instead of a tile corner
    pub fn boss_offset(&self) -> Vec2 {
        let half = consts::TILE_SIZE / 2.0;
        Vec2::new(
            if self.width % 2 == 0 { -half } else { 0.0 },
            if self.height % 2 == 0 { -half } else { 0.0 },
        )
    }

    /// Where the entity on tile `idx` is drawn (feedback effects anchor here)
    pub fn visual_center(&self, idx: usize) -> Vec2 {
        match self.entity(idx) {
            Some(e) if e.kind == EntityKind::Boss => self.tile_center(idx) + self.boss_offset(),
            _ => self.tile_center(idx),
        }
    }

    pub fn entity(&self, idx: usize) -> Option<&Entity> {
        self.tiles.get(idx).and_then(Option::as_ref)
    }

    pub fn entity_mut(&mut self, idx: usize) -> Option<&mut Entity> {
        self.tiles.get_mut(idx).and_then(Option::as_mut)
    }

    pub fn remove(&mut self, idx: usize) -> Option<Entity> {
        self.tiles.get_mut(idx).and_then(Option::take)
    }

    /// Place an entity, replacing whatever occupied the tile
    pub fn place(&mut self, idx: usize, entity: Entity) {
        if let Some(slot) = self.tiles.get_mut(idx) {
            *slot = Some(entity);
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = (usize, &Entity)> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|e| (i, e)))
    }

    pub fn stone_count(&self) -> u32 {
        self.entities().filter(|(_, e)| e.kind.is_stone()).count() as u32
    }

    pub fn has_boss(&self) -> bool {
        self.entities().any(|(_, e)| e.kind == EntityKind::Boss)
    }

    /// Rebuild the round's entities. Returns the number of stones spawned
    /// (always 0 for a boss round).
    pub fn populate<R: Rng>(&mut self, params: &SpawnParams, rng: &mut R) -> u32 {
        self.tiles.iter_mut().for_each(|t| *t = None);

        if params.is_boss_round {
            let idx = self.center_index().min(self.tiles.len() - 1);
            self.place(idx, Entity::boss(params.stage));
            self.theme = RoundTheme::Boss {
                sprite: boss_sprite_for_stage(params.stage),
                floor: boss_floor_for_stage(params.stage),
                offset: self.boss_offset(),
            };
            debug!("Boss spawned on tile {} for stage {}", idx, params.stage);
            return 0;
        }

        self.theme = RoundTheme::Normal {
            floor: params.biome.floor_texture(),
        };

        let chance = spawn_chance(params.amount_level);
        let max_stones = (self.tiles.len() as f64 * max_fill_ratio()).floor() as u32;
        let mut count = 0u32;

        for idx in 0..self.tiles.len() {
            if count >= max_stones {
                break;
            }
            if rng.gen::<f64>() < chance {
                let rare = rng.gen::<f64>() < stone::RARE_CHANCE;
                self.tiles[idx] = Some(Entity::stone(rare, params.stage, rng));
                count += 1;
            }
        }

        debug!(
            "Spawned {} stones (chance {:.2}, cap {}) for stage {}",
            count, chance, max_stones, params.stage
        );
        count
    }
}
