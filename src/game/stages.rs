//! Stage management
//!
//! Tracks the stage pointer, per-stage scaling and the boss cadence. Boss
//! stages are every 6th stage; failing a boss regresses to the stage just
//! before it, so the boss gate can never be skipped.

use std::collections::BTreeMap;

use tracing::debug;

use crate::game::constants::{grid, stage as consts};
use crate::save::{BossRecord, Persistence, SavePatch};

/// Is `stage` a boss stage (6, 12, 18, ...)?
pub fn is_boss_stage(stage: u32) -> bool {
    stage >= consts::BOSS_INTERVAL && stage % consts::BOSS_INTERVAL == 0
}

/// Smallest boss stage >= `stage`, or the last representable boss stage
pub fn boss_stage_for(stage: u32) -> u32 {
    let s = stage.max(1);
    s.div_ceil(consts::BOSS_INTERVAL)
        .checked_mul(consts::BOSS_INTERVAL)
        .unwrap_or(u32::MAX - u32::MAX % consts::BOSS_INTERVAL)
}

/// Regression target after losing to the boss of `boss_stage`
pub fn pre_boss_stage_for(boss_stage: u32) -> u32 {
    boss_stage.max(1).saturating_sub(1).max(1)
}

/// Stone HP scaling, +7% per stage step, never below 1
pub fn stone_hp_multiplier(stage: u32) -> f64 {
    let s = stage.max(1);
    (1.0 + consts::HP_GROWTH * (s - 1) as f64).max(1.0)
}

/// Gold scaling, +6% per stage step, never below 1
pub fn gold_multiplier(stage: u32) -> f64 {
    let s = stage.max(1);
    (1.0 + consts::GOLD_GROWTH * (s - 1) as f64).max(1.0)
}

/// Upper bound on the fraction of tiles that may hold a stone
pub fn max_fill_ratio() -> f64 {
    consts::MAX_FILL_RATIO
}

/// Normal rounds advance only on a full clear
pub fn should_advance(stones_remaining: u32) -> bool {
    stones_remaining == 0
}

/// Grid size for a stage. Constant for now; kept per-stage so layouts can grow later.
pub fn grid_size_for_stage(_stage: u32) -> (u32, u32) {
    (grid::WIDTH, grid::HEIGHT)
}

/// Stage pointer plus boss bookkeeping, written through to the active save
#[derive(Debug, Clone)]
pub struct StageManager {
    stage: u32,
    persistence: Persistence,
}

impl StageManager {
    pub fn new(persistence: Persistence) -> Self {
        Self {
            stage: 1,
            persistence,
        }
    }

    /// Seed the in-memory stage from the active save (1 if absent)
    pub fn init_from_save(&mut self) -> u32 {
        self.stage = self.persistence.read().map(|r| r.stage).unwrap_or(1).max(1);
        self.stage
    }

    pub fn current_stage(&self) -> u32 {
        self.stage
    }

    /// Set the stage (clamped to >= 1), optionally writing it through
    pub fn set_stage(&mut self, stage: u32, persist: bool) -> u32 {
        self.stage = stage.max(1);
        if persist {
            self.persist_stage();
        }
        self.stage
    }

    pub fn next_stage(&mut self, persist: bool) -> u32 {
        self.set_stage(self.stage.saturating_add(1), persist)
    }

    pub fn persist_stage(&self) -> bool {
        self.persistence.write_patch(&SavePatch::new().stage(self.stage))
    }

    /// Snapshot of the stored boss history
    pub fn boss_progress(&self) -> BTreeMap<u32, BossRecord> {
        self.persistence
            .read()
            .map(|r| r.boss_progress)
            .unwrap_or_default()
    }

    pub fn has_boss_attempt(&self, stage: u32) -> bool {
        self.boss_record(stage).attempted
    }

    pub fn has_boss_defeat(&self, stage: u32) -> bool {
        self.boss_record(stage).defeated
    }

    fn boss_record(&self, stage: u32) -> BossRecord {
        self.boss_progress()
            .get(&boss_stage_for(stage))
            .copied()
            .unwrap_or_default()
    }

    /// Mark the boss guarding `stage` as attempted, keeping any earlier defeat
    pub fn record_boss_attempt(&self, stage: u32) -> bool {
        let boss = boss_stage_for(stage);
        let mut progress = self.boss_progress();
        let entry = progress.entry(boss).or_default();
        entry.attempted = true;
        debug!("Boss {} attempt recorded (defeated={})", boss, entry.defeated);
        self.persistence
            .write_patch(&SavePatch::new().boss_progress(&progress))
    }

    /// Mark the boss guarding `stage` as attempted and defeated
    pub fn record_boss_defeat(&self, stage: u32) -> bool {
        let boss = boss_stage_for(stage);
        let mut progress = self.boss_progress();
        progress.insert(
            boss,
            BossRecord {
                attempted: true,
                defeated: true,
            },
        );
        debug!("Boss {} defeat recorded", boss);
        self.persistence
            .write_patch(&SavePatch::new().boss_progress(&progress))
    }

    /// Should the next round be a boss fight regardless of stage?
    pub fn force_boss_round(&self) -> bool {
        self.persistence
            .read()
            .map(|r| r.force_boss_round)
            .unwrap_or(false)
    }

    pub fn set_force_boss_round(&self, flag: bool) -> bool {
        self.persistence
            .write_patch(&SavePatch::new().force_boss_round(flag))
    }

    pub fn clear_force_boss_round(&self) -> bool {
        self.set_force_boss_round(false)
    }
}
