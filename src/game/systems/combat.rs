//! Area-of-effect combat
//!
//! Runs once per combat tick with the current cursor position. Every tile
//! whose center lies within the attack radius deals damage to its occupant;
//! destroyed occupants pay out gold and are removed from the grid.

use rand::Rng;
use tracing::{debug, info};

use crate::game::constants::{radius_for_level, stone};
use crate::game::events::RoundEvent;
use crate::game::grid::{EntityKind, Grid};
use crate::game::progression::ProgressionState;
use crate::game::round::RoundContext;
use crate::util::vec2::Vec2;

/// Attack radius in pixels for the current upgrades and boosts
pub fn attack_radius(progression: &ProgressionState) -> f64 {
    radius_for_level(progression.effective_radius_level())
}

/// Gold paid for destroying an entity worth `gold_value`
pub fn payout<R: Rng>(gold_value: f64, progression: &ProgressionState, rng: &mut R) -> f64 {
    let variance = 1.0 + rng.gen::<f64>() * stone::PAYOUT_VARIANCE;
    gold_value * progression.payout_multiplier() * variance
}

/// Resolve one combat tick. Tiles are evaluated in index order and every
/// evaluation finishes before this returns.
pub fn update<R: Rng>(
    grid: &mut Grid,
    progression: &mut ProgressionState,
    ctx: &RoundContext,
    cursor: Vec2,
    rng: &mut R,
) -> Vec<RoundEvent> {
    let mut events = Vec::new();
    if !cursor.is_finite() {
        return events;
    }

    let radius = attack_radius(progression);
    let radius_sq = radius * radius;
    let damage = progression.damage_per_tick();

    for idx in 0..grid.tile_count() {
        if grid.tile_center(idx).distance_sq_to(cursor) > radius_sq {
            continue;
        }

        // Tile may have been emptied earlier in this round
        let Some(entity) = grid.entity_mut(idx) else {
            continue;
        };
        entity.hp -= damage;
        if !entity.is_destroyed() {
            continue;
        }

        let position = grid.visual_center(idx);
        let Some(entity) = grid.remove(idx) else {
            continue;
        };

        let gain = payout(entity.gold_value, progression, rng);
        progression.add_gold(gain);
        events.push(RoundEvent::EntityDestroyed {
            tile: idx,
            kind: entity.kind,
            position,
            payout: gain,
        });

        match entity.kind {
            EntityKind::Stone | EntityKind::RareStone => {
                let left = progression.dec_stones_remaining();
                progression.inc_stone_counters();
                progression.try_level_up(rng);
                events.extend(progression.take_level_ups().into_iter().map(RoundEvent::LevelUp));
                debug!("Stone destroyed on tile {} (+{:.1} gold, {} left)", idx, gain, left);
            }
            EntityKind::Boss => {
                info!("Boss of stage {} defeated (+{:.1} gold)", ctx.run_stage, gain);
                events.push(RoundEvent::BossDefeated {
                    stage: ctx.run_stage,
                });
            }
        }
    }

    events
}
