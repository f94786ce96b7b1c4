//! Round outcome and stage-advance decision
//!
//! Computes where the player goes after a round. Normal rounds advance only on
//! a full clear; boss rounds advance past the boss on a kill and regress to
//! the stage before it otherwise.

use serde::Serialize;

use crate::game::round::RoundContext;
use crate::game::stages::{pre_boss_stage_for, should_advance};
use crate::save::Phase;

/// How the round resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundResult {
    /// Normal round, every stone destroyed
    Cleared,
    /// Normal round, stones left when it stopped
    Incomplete,
    BossDefeated,
    BossFailed,
    /// Normal round interrupted; resumable from the paused save
    Paused,
}

/// Why the round stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    TimerExpired,
    BossDefeated,
    /// Host went away while the round was running
    Unloaded,
}

/// Final result of one round, returned from the termination path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundOutcome {
    pub result: RoundResult,
    pub reason: EndReason,
    pub base_stage: u32,
    pub run_stage: u32,
    pub is_boss_round: bool,
    /// Stage persisted for the next round
    pub next_stage: u32,
    /// Phase written to the save
    pub phase: Phase,
    pub stones_remaining: u32,
    /// Lifetime stones destroyed, this round included
    pub stones_total: u64,
    pub time_left: u32,
    pub gold: f64,
    pub level: u32,
}

impl RoundOutcome {
    pub fn advanced(&self) -> bool {
        self.next_stage > self.base_stage
    }

    pub fn regressed(&self) -> bool {
        self.next_stage < self.base_stage
    }
}

/// Result and next stage of a round that ended normally (timer or boss kill)
pub fn decide_next_stage(
    ctx: &RoundContext,
    boss_defeated: bool,
    stones_remaining: u32,
) -> (RoundResult, u32) {
    if ctx.is_boss_round {
        if boss_defeated {
            (RoundResult::BossDefeated, ctx.run_stage.saturating_add(1))
        } else {
            (RoundResult::BossFailed, pre_boss_stage_for(ctx.run_stage))
        }
    } else if should_advance(stones_remaining) {
        (RoundResult::Cleared, ctx.base_stage.saturating_add(1))
    } else {
        (RoundResult::Incomplete, ctx.base_stage)
    }
}

/// Result, next stage and phase for a round abandoned while running.
/// An unfinished boss fight counts as a lost attempt; anything else pauses.
pub fn decide_unload(ctx: &RoundContext, boss_defeated: bool) -> (RoundResult, u32, Phase) {
    if ctx.is_boss_round {
        let (result, next) = decide_next_stage(ctx, boss_defeated, 0);
        (result, next, Phase::Upgrades)
    } else {
        (RoundResult::Paused, ctx.base_stage, Phase::Paused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::biome::Biome;

    fn ctx(base_stage: u32, run_stage: u32, is_boss_round: bool) -> RoundContext {
        RoundContext {
            base_stage,
            run_stage,
            is_boss_round,
            biome: Biome::for_stage(run_stage),
        }
    }

    #[test]
    fn test_normal_round_advances_on_clear() {
        assert_eq!(decide_next_stage(&ctx(5, 5, false), false, 0), (RoundResult::Cleared, 6));
    }

    #[test]
    fn test_normal_round_holds_with_stones_left() {
        assert_eq!(decide_next_stage(&ctx(5, 5, false), false, 5), (RoundResult::Incomplete, 5));
    }

    #[test]
    fn test_boss_kill_advances_past_boss() {
        assert_eq!(decide_next_stage(&ctx(12, 12, true), true, 0), (RoundResult::BossDefeated, 13));
    }

    #[test]
    fn test_boss_loss_regresses() {
        assert_eq!(decide_next_stage(&ctx(12, 12, true), false, 0), (RoundResult::BossFailed, 11));
    }

    #[test]
    fn test_forced_boss_uses_run_stage() {
        // Forced boss on stage 8 fights the stage 12 boss
        assert_eq!(decide_next_stage(&ctx(8, 12, true), false, 3), (RoundResult::BossFailed, 11));
        assert_eq!(decide_next_stage(&ctx(8, 12, true), true, 3), (RoundResult::BossDefeated, 13));
    }

    #[test]
    fn test_unload_pauses_normal_round() {
        assert_eq!(
            decide_unload(&ctx(4, 4, false), false),
            (RoundResult::Paused, 4, Phase::Paused)
        );
    }

    #[test]
    fn test_unload_during_boss_counts_as_loss() {
        assert_eq!(
            decide_unload(&ctx(6, 6, true), false),
            (RoundResult::BossFailed, 5, Phase::Upgrades)
        );
    }

    #[test]
    fn test_outcome_direction() {
        let outcome = RoundOutcome {
            result: RoundResult::BossFailed,
            reason: EndReason::TimerExpired,
            base_stage: 12,
            run_stage: 12,
            is_boss_round: true,
            next_stage: 11,
            phase: Phase::Upgrades,
            stones_remaining: 0,
            stones_total: 0,
            time_left: 0,
            gold: 0.0,
            level: 1,
        };
        assert!(outcome.regressed());
        assert!(!outcome.advanced());
    }
}
