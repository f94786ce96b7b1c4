//! Round events
//!
//! Produced by the tick functions of a round and consumed by the frontend
//! dispatcher. Events carry everything needed to render them.

use crate::game::grid::EntityKind;
use crate::game::outcome::RoundOutcome;
use crate::game::progression::LevelUp;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    /// An entity reached zero HP and was removed from its tile
    EntityDestroyed {
        tile: usize,
        kind: EntityKind,
        /// Where feedback effects should be anchored
        position: Vec2,
        payout: f64,
    },
    LevelUp(LevelUp),
    /// The boss of a boss round went down; the round ends on this tick
    BossDefeated { stage: u32 },
    TimerTicked { time_left: u32 },
    /// Passive regeneration credited gold
    GoldRegenerated { amount: f64 },
    /// The round finished and its outcome was persisted
    RoundEnded(RoundOutcome),
}

impl RoundEvent {
    /// Does this event change the gold display?
    pub fn touches_gold(&self) -> bool {
        matches!(
            self,
            RoundEvent::EntityDestroyed { .. } | RoundEvent::GoldRegenerated { .. }
        )
    }
}
