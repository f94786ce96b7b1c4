//! Round metrics
//!
//! Lock-free counters updated by the round as it runs. The host logs them
//! as JSON when a round finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one host session
#[derive(Debug)]
pub struct RoundMetrics {
    // Combat
    pub combat_ticks: AtomicU64,
    pub entities_destroyed: AtomicU64,
    pub bosses_defeated: AtomicU64,

    // Economy
    pub gold_earned_centi: AtomicU64, // Stored as gold * 100 (e.g., 3.25 = 325)
    pub level_ups: AtomicU64,

    // Persistence
    pub save_writes: AtomicU64,
    pub save_write_failures: AtomicU64,

    // Rounds
    pub rounds_completed: AtomicU64,
    pub rounds_paused: AtomicU64,

    start_time: Instant,
}

impl RoundMetrics {
    pub fn new() -> Self {
        Self {
            combat_ticks: AtomicU64::new(0),
            entities_destroyed: AtomicU64::new(0),
            bosses_defeated: AtomicU64::new(0),
            gold_earned_centi: AtomicU64::new(0),
            level_ups: AtomicU64::new(0),
            save_writes: AtomicU64::new(0),
            save_write_failures: AtomicU64::new(0),
            rounds_completed: AtomicU64::new(0),
            rounds_paused: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_combat_tick(&self) {
        self.combat_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_destroyed(&self, boss: bool) {
        self.entities_destroyed.fetch_add(1, Ordering::Relaxed);
        if boss {
            self.bosses_defeated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Add earned gold; negative or non-finite amounts are ignored
    pub fn record_gold(&self, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            self.gold_earned_centi
                .fetch_add((amount * 100.0).round() as u64, Ordering::Relaxed);
        }
    }

    pub fn record_level_ups(&self, n: u64) {
        self.level_ups.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one persistence write and whether it reached the store
    pub fn record_save_write(&self, ok: bool) {
        self.save_writes.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.save_write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_round_end(&self, paused: bool) {
        if paused {
            self.rounds_paused.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rounds_completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn gold_earned(&self) -> f64 {
        self.gold_earned_centi.load(Ordering::Relaxed) as f64 / 100.0
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn to_json(&self) -> String {
        format!(
            r#"{{
  "combat": {{
    "ticks": {},
    "entities_destroyed": {},
    "bosses_defeated": {}
  }},
  "economy": {{
    "gold_earned": {:.2},
    "level_ups": {}
  }},
  "persistence": {{
    "writes": {},
    "write_failures": {}
  }},
  "rounds": {{
    "completed": {},
    "paused": {}
  }},
  "uptime_seconds": {}
}}"#,
            self.combat_ticks.load(Ordering::Relaxed),
            self.entities_destroyed.load(Ordering::Relaxed),
            self.bosses_defeated.load(Ordering::Relaxed),
            self.gold_earned(),
            self.level_ups.load(Ordering::Relaxed),
            self.save_writes.load(Ordering::Relaxed),
            self.save_write_failures.load(Ordering::Relaxed),
            self.rounds_completed.load(Ordering::Relaxed),
            self.rounds_paused.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }
}

impl Default for RoundMetrics {
    fn default() -> Self {
        Self::new()
    }
}
