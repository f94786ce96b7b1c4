//! Progression state
//!
//! Authoritative mutable state of a round: gold, countdown, upgrade snapshot,
//! stone counters, player level, passive regeneration and timed boosts.
//! Boost effects are folded in at the point of use and never written back into
//! the permanent upgrade levels, so an expiring boost cannot corrupt them.

use rand::Rng;
use smallvec::SmallVec;
use tracing::info;

use crate::game::constants::{boost, level, upgrades as caps};
use crate::save::{Boost, BoostKind, SavePatch, SaveRecord, UpgradeSet};

/// Stones required to go from `level` to `level + 1`
pub fn stones_needed_for_level(level: u32) -> u64 {
    let steps = level.max(1).saturating_sub(1).min(i32::MAX as u32) as i32;
    (level::STONE_BASE * level::STONE_GROWTH.powi(steps)).ceil() as u64
}

/// Record of one applied level-up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelUp {
    /// Level reached
    pub level: u32,
    /// Boost granted as the reward
    pub boost: Boost,
}

#[derive(Debug, Clone)]
pub struct ProgressionState {
    gold: f64,
    time_left: u32,
    upgrades: UpgradeSet,
    stage: u32,
    stones_remaining: u32,
    stones_this_round: u64,
    stones_total: u64,
    level: u32,
    gold_regen_per_sec: f64,
    active_boosts: SmallVec<[Boost; 4]>,
    /// Level-ups applied since the last `take_level_ups`
    pending_level_ups: Vec<LevelUp>,
}

impl ProgressionState {
    /// Seed from a parsed save. A save without remaining time starts a full round.
    pub fn from_record(record: &SaveRecord, round_time: u32) -> Self {
        let time_left = if record.remaining_time > 0 {
            record.remaining_time
        } else {
            round_time
        };
        Self {
            gold: record.gold.max(0.0),
            time_left,
            upgrades: record.upgrades,
            stage: record.stage.max(1),
            stones_remaining: 0,
            stones_this_round: 0,
            stones_total: record.stones_total,
            level: record.level.max(1),
            gold_regen_per_sec: record.gold_regen_per_sec.max(0.0),
            active_boosts: record
                .active_boosts
                .iter()
                .filter(|b| b.remaining_sec > 0)
                .copied()
                .collect(),
            pending_level_ups: Vec::new(),
        }
    }

    // === Currency ===

    pub fn gold(&self) -> f64 {
        self.gold
    }

    /// Set gold; negative or non-finite values floor at 0
    pub fn set_gold(&mut self, gold: f64) {
        self.gold = if gold.is_finite() { gold.max(0.0) } else { 0.0 };
    }

    pub fn add_gold(&mut self, amount: f64) {
        self.set_gold(self.gold + amount);
    }

    // === Timer ===

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn set_time_left(&mut self, secs: u32) {
        self.time_left = secs;
    }

    /// One second off the countdown, floored at 0. Returns the new value.
    pub fn decrement_timer(&mut self) -> u32 {
        self.time_left = self.time_left.saturating_sub(1);
        self.time_left
    }

    // === Upgrades / stage ===

    pub fn upgrades(&self) -> &UpgradeSet {
        &self.upgrades
    }

    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn set_stage(&mut self, stage: u32) -> u32 {
        self.stage = stage.max(1);
        self.stage
    }

    // === Stone counters ===

    pub fn stones_remaining(&self) -> u32 {
        self.stones_remaining
    }

    pub fn set_stones_remaining(&mut self, n: u32) {
        self.stones_remaining = n;
    }

    pub fn dec_stones_remaining(&mut self) -> u32 {
        self.stones_remaining = self.stones_remaining.saturating_sub(1);
        self.stones_remaining
    }

    pub fn stones_this_round(&self) -> u64 {
        self.stones_this_round
    }

    pub fn stones_total(&self) -> u64 {
        self.stones_total
    }

    /// Count one destroyed stone toward the level curve and the lifetime total
    pub fn inc_stone_counters(&mut self) {
        self.stones_this_round += 1;
        self.stones_total += 1;
    }

    pub fn reset_stones_this_round(&mut self) {
        self.stones_this_round = 0;
    }

    // === Level ===

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn stones_to_next_level(&self) -> u64 {
        stones_needed_for_level(self.level).saturating_sub(self.stones_this_round)
    }

    /// Apply every level-up the round's stone count pays for. Returns how many
    /// were applied; details are queued for `take_level_ups`.
    pub fn try_level_up<R: Rng>(&mut self, rng: &mut R) -> u32 {
        let mut ups = 0;
        loop {
            let needed = stones_needed_for_level(self.level);
            if self.stones_this_round < needed {
                break;
            }
            self.stones_this_round -= needed;
            let boost = self.grant_level_up(rng);
            self.pending_level_ups.push(LevelUp {
                level: self.level,
                boost,
            });
            ups += 1;
        }
        ups
    }

    /// Raise the level by one: +0.5 gold/s regeneration and one random boost
    fn grant_level_up<R: Rng>(&mut self, rng: &mut R) -> Boost {
        self.level = self.level.saturating_add(1);
        self.gold_regen_per_sec = (self.gold_regen_per_sec + level::REGEN_PER_LEVEL).max(0.0);

        let roll: f64 = rng.gen();
        let boost = if roll < 1.0 / 3.0 {
            Boost {
                kind: BoostKind::Damage,
                magnitude: boost::DAMAGE_MAGNITUDE,
                remaining_sec: boost::DAMAGE_DURATION_SECS,
            }
        } else if roll < 2.0 / 3.0 {
            Boost {
                kind: BoostKind::Gold,
                magnitude: boost::GOLD_MAGNITUDE,
                remaining_sec: boost::GOLD_DURATION_SECS,
            }
        } else {
            Boost {
                kind: BoostKind::Radius,
                magnitude: boost::RADIUS_MAGNITUDE,
                remaining_sec: boost::RADIUS_DURATION_SECS,
            }
        };
        self.active_boosts.push(boost);
        info!(
            "Level up -> {} (regen {:.1}/s, boost {:?} x{} for {}s)",
            self.level, self.gold_regen_per_sec, boost.kind, boost.magnitude, boost.remaining_sec
        );
        boost
    }

    pub fn take_level_ups(&mut self) -> Vec<LevelUp> {
        std::mem::take(&mut self.pending_level_ups)
    }

    // === Regeneration & boosts ===

    pub fn gold_regen_per_sec(&self) -> f64 {
        self.gold_regen_per_sec
    }

    pub fn set_gold_regen_per_sec(&mut self, regen: f64) {
        self.gold_regen_per_sec = if regen.is_finite() { regen.max(0.0) } else { 0.0 };
    }

    /// Copy of the active boosts
    pub fn active_boosts(&self) -> Vec<Boost> {
        self.active_boosts.to_vec()
    }

    /// Add a timed boost; duration is floored with a minimum of one second
    pub fn add_boost(&mut self, kind: BoostKind, magnitude: f64, duration_secs: f64) {
        let magnitude = if magnitude.is_finite() { magnitude } else { 0.0 };
        let secs = if duration_secs.is_finite() {
            duration_secs.floor().max(1.0) as u32
        } else {
            1
        };
        self.active_boosts.push(Boost {
            kind,
            magnitude,
            remaining_sec: secs,
        });
    }

    /// Passive regeneration plus boost countdown. Zero or negative deltas
    /// change nothing.
    pub fn tick_regen_and_boosts(&mut self, delta_secs: f64) {
        let delta = if delta_secs.is_finite() { delta_secs.max(0.0) } else { 0.0 };
        let regen = self.gold_regen_per_sec * delta;
        if regen > 0.0 {
            self.add_gold(regen);
        }

        let whole = delta.floor() as u32;
        if whole > 0 && !self.active_boosts.is_empty() {
            for b in self.active_boosts.iter_mut() {
                b.remaining_sec = b.remaining_sec.saturating_sub(whole);
            }
        }
        self.active_boosts.retain(|b| b.remaining_sec > 0);
    }

    /// Product of (1 + magnitude) over active damage boosts
    pub fn effective_damage_multiplier(&self) -> f64 {
        self.product_for(BoostKind::Damage)
    }

    /// Product of (1 + magnitude) over active gold boosts
    pub fn effective_gold_multiplier(&self) -> f64 {
        self.product_for(BoostKind::Gold)
    }

    /// Sum of additive radius levels from active boosts
    pub fn radius_bonus(&self) -> f64 {
        self.active_boosts
            .iter()
            .filter(|b| b.kind == BoostKind::Radius)
            .map(|b| b.magnitude)
            .sum()
    }

    fn product_for(&self, kind: BoostKind) -> f64 {
        self.active_boosts
            .iter()
            .filter(|b| b.kind == kind)
            .fold(1.0, |acc, b| acc * (1.0 + b.magnitude))
    }

    // === Derived combat values ===

    /// Radius level in effect right now: permanent level plus boosts, capped
    pub fn effective_radius_level(&self) -> f64 {
        (self.upgrades.radius as f64 + self.radius_bonus())
            .clamp(0.0, caps::MAX_RADIUS as f64)
    }

    /// Amount level in effect (capped)
    pub fn effective_amount_level(&self) -> u32 {
        self.upgrades.amount.min(caps::MAX_AMOUNT)
    }

    /// Damage dealt to each entity in range per combat tick
    pub fn damage_per_tick(&self) -> f64 {
        (caps::BASE_DAMAGE + caps::DAMAGE_PER_LEVEL * self.upgrades.damage as f64)
            * self.effective_damage_multiplier()
    }

    /// Deterministic part of the payout multiplier (permanent upgrade x boosts)
    pub fn payout_multiplier(&self) -> f64 {
        (1.0 + self.upgrades.gold_boost as f64 * caps::GOLD_BOOST_PER_LEVEL)
            * self.effective_gold_multiplier()
    }

    // === Persistence ===

    /// Level/regen/boost fields for the round-boundary save
    pub fn level_boost_patch(&self) -> SavePatch {
        SavePatch::new()
            .level(self.level)
            .stones_total(self.stones_total)
            .gold_regen_per_sec(self.gold_regen_per_sec)
            .active_boosts(&self.active_boosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn state() -> ProgressionState {
        ProgressionState::from_record(&SaveRecord::default(), 30)
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_from_record_time() {
        assert_eq!(state().time_left(), 30);
        let record = SaveRecord { remaining_time: 12, ..SaveRecord::default() };
        assert_eq!(ProgressionState::from_record(&record, 30).time_left(), 12);
    }

    #[test]
    fn test_gold_never_negative() {
        let mut s = state();
        s.set_gold(-5.0);
        assert_eq!(s.gold(), 0.0);
        s.add_gold(10.0);
        s.add_gold(-25.0);
        assert_eq!(s.gold(), 0.0);
        s.set_gold(f64::NAN);
        assert_eq!(s.gold(), 0.0);
    }

    #[test]
    fn test_decrement_timer_floors() {
        let mut s = state();
        s.set_time_left(1);
        assert_eq!(s.decrement_timer(), 0);
        assert_eq!(s.decrement_timer(), 0);
    }

    #[test]
    fn test_stones_needed_curve() {
        assert_eq!(stones_needed_for_level(1), 40);
        assert_eq!(stones_needed_for_level(2), 48); // ceil(47.2)
        assert_eq!(stones_needed_for_level(3), 56); // ceil(55.696)
        assert_eq!(stones_needed_for_level(0), 40);
        for l in 1..40 {
            assert!(stones_needed_for_level(l + 1) >= stones_needed_for_level(l));
        }
    }

    #[test]
    fn test_stones_needed_huge_level_saturates() {
        assert_eq!(stones_needed_for_level(1 << 31), u64::MAX);
        assert_eq!(stones_needed_for_level(u32::MAX), u64::MAX);

        let record = SaveRecord {
            level: u32::MAX,
            ..SaveRecord::default()
        };
        let s = ProgressionState::from_record(&record, 30);
        assert_eq!(s.stones_to_next_level(), u64::MAX);
    }

    #[test]
    fn test_try_level_up_insufficient_is_noop() {
        let mut s = state();
        for _ in 0..39 {
            s.inc_stone_counters();
        }
        let before = (s.level(), s.stones_this_round(), s.gold_regen_per_sec());
        assert_eq!(s.try_level_up(&mut rng()), 0);
        assert_eq!((s.level(), s.stones_this_round(), s.gold_regen_per_sec()), before);
        assert!(s.active_boosts().is_empty());
        assert!(s.take_level_ups().is_empty());
    }

    #[test]
    fn test_try_level_up_exact_threshold() {
        let mut s = state();
        for _ in 0..stones_needed_for_level(1) {
            s.inc_stone_counters();
        }
        assert_eq!(s.try_level_up(&mut rng()), 1);
        assert_eq!(s.level(), 2);
        assert_eq!(s.stones_this_round(), 0);
        assert_eq!(s.stones_total(), 40);
        assert_eq!(s.gold_regen_per_sec(), 0.5);
        assert_eq!(s.active_boosts().len(), 1);
        let ups = s.take_level_ups();
        assert_eq!(ups.len(), 1);
        assert_eq!(ups[0].level, 2);
    }

    #[test]
    fn test_try_level_up_multi_jump() {
        let mut s = state();
        // 40 + 48 + 5 leftover
        for _ in 0..93 {
            s.inc_stone_counters();
        }
        assert_eq!(s.try_level_up(&mut rng()), 2);
        assert_eq!(s.level(), 3);
        assert_eq!(s.stones_this_round(), 5);
        assert_eq!(s.gold_regen_per_sec(), 1.0);
        assert_eq!(s.active_boosts().len(), 2);
    }

    #[test]
    fn test_level_up_boost_distribution() {
        let mut r = rng();
        let mut counts = [0u32; 3];
        for _ in 0..3000 {
            let mut s = state();
            for _ in 0..40 {
                s.inc_stone_counters();
            }
            s.try_level_up(&mut r);
            match s.active_boosts()[0].kind {
                BoostKind::Damage => counts[0] += 1,
                BoostKind::Gold => counts[1] += 1,
                BoostKind::Radius => counts[2] += 1,
            }
        }
        for c in counts {
            assert!(c > 800 && c < 1200, "uneven boost odds: {:?}", counts);
        }
    }

    #[test]
    fn test_boost_expiry() {
        let mut s = state();
        s.add_boost(BoostKind::Gold, 0.5, 1.0);
        assert_eq!(s.active_boosts().len(), 1);
        s.tick_regen_and_boosts(1.0);
        assert!(s.active_boosts().is_empty());
        s.tick_regen_and_boosts(1.0);
        assert!(s.active_boosts().is_empty());
    }

    #[test]
    fn test_zero_delta_idempotent() {
        let mut s = state();
        s.set_gold_regen_per_sec(2.0);
        s.add_boost(BoostKind::Damage, 0.5, 3.0);
        for _ in 0..5 {
            s.tick_regen_and_boosts(0.0);
        }
        assert_eq!(s.gold(), 0.0);
        assert_eq!(s.active_boosts()[0].remaining_sec, 3);
        s.tick_regen_and_boosts(-4.0);
        assert_eq!(s.active_boosts()[0].remaining_sec, 3);
    }

    #[test]
    fn test_regen_adds_gold() {
        let mut s = state();
        s.set_gold_regen_per_sec(1.5);
        s.tick_regen_and_boosts(1.0);
        s.tick_regen_and_boosts(1.0);
        assert!((s.gold() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_delta_never_negative() {
        let mut s = state();
        s.add_boost(BoostKind::Radius, 3.0, 2.0);
        s.add_boost(BoostKind::Radius, 3.0, 10.0);
        s.tick_regen_and_boosts(5.0);
        let boosts = s.active_boosts();
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].remaining_sec, 5);
    }

    #[test]
    fn test_add_boost_duration_floor() {
        let mut s = state();
        s.add_boost(BoostKind::Damage, 0.5, 0.2);
        s.add_boost(BoostKind::Damage, 0.5, 4.9);
        let boosts = s.active_boosts();
        assert_eq!(boosts[0].remaining_sec, 1);
        assert_eq!(boosts[1].remaining_sec, 4);
    }

    #[test]
    fn test_multipliers_neutral_and_stacking() {
        let mut s = state();
        assert_eq!(s.effective_damage_multiplier(), 1.0);
        assert_eq!(s.effective_gold_multiplier(), 1.0);
        assert_eq!(s.radius_bonus(), 0.0);

        s.add_boost(BoostKind::Damage, 0.5, 10.0);
        s.add_boost(BoostKind::Damage, 0.5, 10.0);
        assert!((s.effective_damage_multiplier() - 2.25).abs() < 1e-12);
        assert_eq!(s.effective_gold_multiplier(), 1.0);

        s.add_boost(BoostKind::Radius, 3.0, 8.0);
        s.add_boost(BoostKind::Radius, 3.0, 8.0);
        assert_eq!(s.radius_bonus(), 6.0);
    }

    #[test]
    fn test_radius_clamp_not_stored() {
        let record = SaveRecord {
            upgrades: UpgradeSet { radius: 24, ..UpgradeSet::default() },
            ..SaveRecord::default()
        };
        let mut s = ProgressionState::from_record(&record, 30);
        s.add_boost(BoostKind::Radius, 3.0, 1.0);
        assert_eq!(s.effective_radius_level(), 25.0);
        assert_eq!(s.upgrades().radius, 24);
        s.tick_regen_and_boosts(1.0);
        assert_eq!(s.effective_radius_level(), 24.0);
    }

    #[test]
    fn test_damage_and_payout() {
        let record = SaveRecord {
            upgrades: UpgradeSet { radius: 1, damage: 4, amount: 0, gold_boost: 2 },
            ..SaveRecord::default()
        };
        let mut s = ProgressionState::from_record(&record, 30);
        assert!((s.damage_per_tick() - 3.0).abs() < 1e-12);
        assert!((s.payout_multiplier() - 1.1).abs() < 1e-12);
        s.add_boost(BoostKind::Damage, 0.5, 5.0);
        s.add_boost(BoostKind::Gold, 0.5, 5.0);
        assert!((s.damage_per_tick() - 4.5).abs() < 1e-12);
        assert!((s.payout_multiplier() - 1.65).abs() < 1e-12);
    }

    #[test]
    fn test_boosts_loaded_from_record() {
        let record = SaveRecord {
            active_boosts: vec![
                Boost { kind: BoostKind::Gold, magnitude: 0.5, remaining_sec: 4 },
                Boost { kind: BoostKind::Gold, magnitude: 0.5, remaining_sec: 0 },
            ],
            ..SaveRecord::default()
        };
        let s = ProgressionState::from_record(&record, 30);
        assert_eq!(s.active_boosts().len(), 1);
    }

    #[test]
    fn test_level_boost_patch() {
        let mut s = state();
        s.inc_stone_counters();
        s.set_gold_regen_per_sec(1.0);
        let mut target = serde_json::Map::new();
        s.level_boost_patch().apply_to(&mut target);
        assert_eq!(target["level"], serde_json::json!(1));
        assert_eq!(target["stonesTotal"], serde_json::json!(1));
        assert_eq!(target["goldRegenPerSec"], serde_json::json!(1.0));
        assert_eq!(target["activeBoosts"], serde_json::json!([]));
    }
}
