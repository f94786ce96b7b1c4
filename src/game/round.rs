//! Round orchestration
//!
//! A round moves through `Loading -> Initializing -> Running -> Ending ->
//! Terminated`. The orchestrator owns the grid, the progression state and the
//! stage manager, runs the per-tick systems synchronously and writes the
//! outcome back to the save exactly once.
//!
//! Scheduling lives in [`crate::game::game_loop`]; everything here is plain
//! synchronous state transitions so it can be driven step by step in tests.

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::frontend::{Destination, HudSnapshot};
use crate::game::biome::Biome;
use crate::game::events::RoundEvent;
use crate::game::grid::{Grid, SpawnParams};
use crate::game::outcome::{decide_next_stage, decide_unload, EndReason, RoundOutcome, RoundResult};
use crate::game::progression::ProgressionState;
use crate::game::stages::{boss_stage_for, is_boss_stage, StageManager};
use crate::game::systems::combat;
use crate::metrics::RoundMetrics;
use crate::save::{LoadError, Persistence, Phase, SavePatch};
use crate::util::vec2::Vec2;

const START_TIME_KEY: &str = "startTime";

/// Lifecycle of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundState {
    #[default]
    Loading,
    Initializing,
    Running,
    Ending,
    Terminated,
}

/// What this round is, fixed at initialization and passed to the systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundContext {
    /// Stage stored in the save when the round began
    pub base_stage: u32,
    /// Stage actually fought (the boss stage in a boss round)
    pub run_stage: u32,
    pub is_boss_round: bool,
    pub biome: Biome,
}

impl RoundContext {
    /// Decide round mode and run stage for a base stage
    pub fn resolve(base_stage: u32, boss_system_enabled: bool, force_boss_round: bool) -> Self {
        let base_stage = base_stage.max(1);
        let base_is_boss = is_boss_stage(base_stage);
        let is_boss_round = boss_system_enabled && (base_is_boss || force_boss_round);
        let run_stage = if is_boss_round && !base_is_boss {
            boss_stage_for(base_stage)
        } else {
            base_stage
        };
        Self {
            base_stage,
            run_stage,
            is_boss_round,
            biome: Biome::for_stage(run_stage),
        }
    }
}

#[derive(Debug)]
pub struct Round {
    state: RoundState,
    persistence: Persistence,
    stages: StageManager,
    progression: ProgressionState,
    grid: Grid,
    ctx: RoundContext,
    boss_system_enabled: bool,
    /// Set by the combat tick when the boss goes down
    boss_defeated: bool,
    /// Set once termination logic has started; guards end and unload
    transitioning: bool,
    outcome: Option<RoundOutcome>,
    metrics: Arc<RoundMetrics>,
}

impl Round {
    /// Loading: read the active save. Anything but a `playing` save is a
    /// redirect and no round state is built.
    pub fn load(
        persistence: Persistence,
        config: &GameConfig,
        metrics: Arc<RoundMetrics>,
    ) -> Result<Self, LoadError> {
        let record = persistence.load_for_round().map_err(|e| {
            info!("Round not started: {} -> {}", e, e.redirect().path());
            e
        })?;
        debug!(
            "Loaded save v{} (stage {}, gold {:.1}, {}s left)",
            record.version, record.stage, record.gold, record.remaining_time
        );

        let progression = ProgressionState::from_record(&record, config.round_time_secs);
        let ctx = RoundContext::resolve(record.stage, false, false);

        Ok(Self {
            state: RoundState::Loading,
            stages: StageManager::new(persistence.clone()),
            persistence,
            progression,
            grid: Grid::new(config.grid_width, config.grid_height, Vec2::ZERO),
            ctx,
            boss_system_enabled: config.boss_system_enabled,
            boss_defeated: false,
            transitioning: false,
            outcome: None,
            metrics,
        })
    }

    /// Initializing: fix the round context, theme and populate the grid
    pub fn initialize<R: Rng>(&mut self, rng: &mut R) -> RoundContext {
        if self.state != RoundState::Loading {
            return self.ctx;
        }
        self.state = RoundState::Initializing;

        let base_stage = self.stages.init_from_save();
        let force_boss = self.boss_system_enabled && self.stages.force_boss_round();
        self.ctx = RoundContext::resolve(base_stage, self.boss_system_enabled, force_boss);
        self.progression.set_stage(base_stage);

        let params = SpawnParams {
            is_boss_round: self.ctx.is_boss_round,
            stage: self.ctx.run_stage,
            amount_level: self.progression.effective_amount_level(),
            biome: self.ctx.biome,
        };
        let spawned = self.grid.populate(&params, rng);
        self.progression.set_stones_remaining(spawned);
        self.progression.reset_stones_this_round();
        self.boss_defeated = false;

        info!(
            "Round initialized: stage {} (run {}), boss={}, biome={}, stones={}, time={}s",
            self.ctx.base_stage,
            self.ctx.run_stage,
            self.ctx.is_boss_round,
            self.ctx.biome,
            spawned,
            self.progression.time_left()
        );
        self.ctx
    }

    /// Running: stamp the start time and accept ticks
    pub fn start(&mut self) -> bool {
        if self.state != RoundState::Initializing {
            return false;
        }
        self.state = RoundState::Running;
        let now = chrono::Utc::now().timestamp_millis();
        self.persist(&SavePatch::new().start_time(now));
        true
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn context(&self) -> &RoundContext {
        &self.ctx
    }

    pub fn progression(&self) -> &ProgressionState {
        &self.progression
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Page position of the grid; tile centers follow it
    pub fn set_grid_origin(&mut self, origin: Vec2) {
        self.grid.set_origin(origin);
    }

    pub fn boss_defeated(&self) -> bool {
        self.boss_defeated
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state == RoundState::Running && !self.transitioning
    }

    pub fn hud(&self) -> HudSnapshot {
        HudSnapshot {
            gold: self.progression.gold(),
            level: self.progression.level(),
            stones_to_next_level: self.progression.stones_to_next_level(),
            stage: self.ctx.run_stage,
            is_boss_round: self.ctx.is_boss_round,
            time_left: self.progression.time_left(),
        }
    }

    // === Ticks ===

    /// 1 Hz countdown. Reaching zero ends the round.
    pub fn tick_timer(&mut self) -> Vec<RoundEvent> {
        if !self.is_running() {
            return Vec::new();
        }
        let time_left = self.progression.decrement_timer();
        let mut events = vec![RoundEvent::TimerTicked { time_left }];
        if time_left == 0 {
            if let Some(outcome) = self.end(EndReason::TimerExpired) {
                events.push(RoundEvent::RoundEnded(outcome));
            }
        }
        events
    }

    /// 5 Hz area-of-effect pass at `cursor`. A boss kill ends the round on
    /// the same tick.
    pub fn tick_combat<R: Rng>(&mut self, cursor: Vec2, rng: &mut R) -> Vec<RoundEvent> {
        if !self.is_running() {
            return Vec::new();
        }
        self.metrics.record_combat_tick();
        let mut events = combat::update(&mut self.grid, &mut self.progression, &self.ctx, cursor, rng);

        for event in &events {
            match event {
                RoundEvent::EntityDestroyed { kind, payout, .. } => {
                    self.metrics.record_destroyed(!kind.is_stone());
                    self.metrics.record_gold(*payout);
                }
                RoundEvent::LevelUp(_) => self.metrics.record_level_ups(1),
                RoundEvent::BossDefeated { .. } => self.boss_defeated = true,
                _ => {}
            }
        }

        if self.ctx.is_boss_round && self.boss_defeated {
            if let Some(outcome) = self.end(EndReason::BossDefeated) {
                events.push(RoundEvent::RoundEnded(outcome));
            }
        }
        events
    }

    /// 1 Hz passive regeneration and boost countdown
    pub fn tick_regen(&mut self, delta_secs: f64) -> Vec<RoundEvent> {
        if !self.is_running() {
            return Vec::new();
        }
        let before = self.progression.gold();
        self.progression.tick_regen_and_boosts(delta_secs);
        let amount = self.progression.gold() - before;
        if amount > 0.0 {
            self.metrics.record_gold(amount);
            vec![RoundEvent::GoldRegenerated { amount }]
        } else {
            Vec::new()
        }
    }

    // === Termination ===

    /// Ending: decide the next stage and persist the round. Runs at most once;
    /// later calls (and an unload after it) return `None`.
    pub fn end(&mut self, reason: EndReason) -> Option<RoundOutcome> {
        if self.transitioning || self.state != RoundState::Running {
            return None;
        }
        self.transitioning = true;
        self.state = RoundState::Ending;

        let stones_remaining = self.progression.stones_remaining();
        let (result, next_stage) = decide_next_stage(&self.ctx, self.boss_defeated, stones_remaining);
        self.settle_stage(result, next_stage);

        let patch = self
            .round_fields_patch(Phase::Upgrades, next_stage)
            .force_boss_round(false)
            .remove(START_TIME_KEY);
        self.persist(&patch);

        let outcome = self.build_outcome(result, reason, next_stage, Phase::Upgrades);
        info!(
            "Round ended ({:?}, {:?}): stage {} -> {}, gold {:.1}, {} stones left",
            reason, result, self.ctx.base_stage, next_stage, outcome.gold, stones_remaining
        );
        self.metrics.record_round_end(false);
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// Terminated: hand control to the upgrade shop after a normal end
    pub fn finish(&mut self) -> Option<Destination> {
        if self.state != RoundState::Ending {
            return None;
        }
        self.state = RoundState::Terminated;
        Some(Destination::Upgrades)
    }

    /// Unplanned termination while running. An unfinished boss fight is
    /// saved as a lost attempt; any other round is paused at its exact
    /// remaining time.
    pub fn unload(&mut self) -> Option<RoundOutcome> {
        if self.transitioning || self.state != RoundState::Running {
            return None;
        }
        self.transitioning = true;
        self.state = RoundState::Terminated;

        let (result, next_stage, phase) = decide_unload(&self.ctx, self.boss_defeated);
        let patch = if self.ctx.is_boss_round {
            self.settle_stage(result, next_stage);
            self.round_fields_patch(phase, next_stage)
                .force_boss_round(false)
                .remove(START_TIME_KEY)
        } else {
            self.round_fields_patch(phase, next_stage)
        };
        self.persist(&patch);

        let outcome = self.build_outcome(result, EndReason::Unloaded, next_stage, phase);
        info!(
            "Round unloaded ({:?}): saved as {} at stage {} with {}s left",
            result,
            phase.as_str(),
            next_stage,
            outcome.time_left
        );
        self.metrics.record_round_end(phase == Phase::Paused);
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// Boss bookkeeping and the stage pointer for a decided result
    fn settle_stage(&mut self, result: RoundResult, next_stage: u32) {
        match result {
            RoundResult::BossDefeated => {
                let ok = self.stages.record_boss_defeat(self.ctx.run_stage);
                self.metrics.record_save_write(ok);
            }
            RoundResult::BossFailed => {
                let ok = self.stages.record_boss_attempt(self.ctx.run_stage);
                self.metrics.record_save_write(ok);
            }
            _ => {}
        }
        if self.ctx.is_boss_round {
            let ok = self.stages.clear_force_boss_round();
            self.metrics.record_save_write(ok);
        }
        self.stages.set_stage(next_stage, false);
        self.progression.set_stage(next_stage);
    }

    /// Fields every round-boundary write carries
    fn round_fields_patch(&self, phase: Phase, stage: u32) -> SavePatch {
        SavePatch::new()
            .version()
            .phase(phase)
            .remaining_time(self.progression.time_left())
            .gold(self.progression.gold())
            .upgrades(self.progression.upgrades())
            .stage(stage)
            .biome(self.ctx.biome)
            .merge(self.progression.level_boost_patch())
    }

    fn build_outcome(
        &self,
        result: RoundResult,
        reason: EndReason,
        next_stage: u32,
        phase: Phase,
    ) -> RoundOutcome {
        RoundOutcome {
            result,
            reason,
            base_stage: self.ctx.base_stage,
            run_stage: self.ctx.run_stage,
            is_boss_round: self.ctx.is_boss_round,
            next_stage,
            phase,
            stones_remaining: self.progression.stones_remaining(),
            stones_total: self.progression.stones_total(),
            time_left: self.progression.time_left(),
            gold: self.progression.gold(),
            level: self.progression.level(),
        }
    }

    fn persist(&self, patch: &SavePatch) -> bool {
        let ok = self.persistence.write_patch(patch);
        self.metrics.record_save_write(ok);
        if !ok {
            warn!("Round state not saved; continuing in memory");
        }
        ok
    }
}
