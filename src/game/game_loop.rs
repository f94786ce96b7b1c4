//! Round scheduler
//!
//! Drives a [`Round`] with three independent tokio intervals: the 1 Hz
//! countdown, the 5 Hz combat pass and the 1 Hz regeneration tick. All three
//! run on one task inside a `select!`, so ticks never interleave and the
//! round needs no locking. Events from each tick go to the frontend before
//! the next tick is polled.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::frontend::{self, Frontend};
use crate::game::constants::round as timing;
use crate::game::events::RoundEvent;
use crate::game::outcome::RoundOutcome;
use crate::game::round::{Round, RoundState};
use crate::util::vec2::Vec2;

fn ticker(start: Instant, period_ms: u64) -> Interval {
    let period = Duration::from_millis(period_ms);
    let mut ticker = interval_at(start + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Run a round until it ends or the host unloads it.
///
/// `cursor` carries the latest pointer position. Setting `unload` to `true`
/// (or dropping its sender) aborts a running round through
/// [`Round::unload`]; a normal end navigates the frontend to the shop.
pub async fn run_round<F, R>(
    round: &mut Round,
    frontend: &mut F,
    cursor: watch::Receiver<Vec2>,
    mut unload: watch::Receiver<bool>,
    rng: &mut R,
) -> Option<RoundOutcome>
where
    F: Frontend + ?Sized,
    R: Rng,
{
    if round.state() == RoundState::Loading {
        round.initialize(rng);
    }
    if round.state() == RoundState::Initializing {
        let ctx = *round.context();
        frontend::present_initial(frontend, &round.hud(), ctx.biome, round.grid().theme());
        round.start();
    }
    if !round.is_running() {
        return round.outcome().cloned();
    }
    if *unload.borrow() {
        return round.unload();
    }

    let start = Instant::now();
    let mut timer = ticker(start, timing::TIMER_INTERVAL_MS);
    let mut combat = ticker(start, timing::AOE_INTERVAL_MS);
    let mut regen = ticker(start, timing::BOOST_TICK_MS);
    let regen_secs = timing::BOOST_TICK_MS as f64 / 1000.0;

    info!(
        "Round loop started (timer {}ms, combat {}ms, regen {}ms)",
        timing::TIMER_INTERVAL_MS,
        timing::AOE_INTERVAL_MS,
        timing::BOOST_TICK_MS
    );

    loop {
        let events = tokio::select! {
            _ = timer.tick() => round.tick_timer(),
            _ = combat.tick() => {
                let position = *cursor.borrow();
                round.tick_combat(position, rng)
            }
            _ = regen.tick() => round.tick_regen(regen_secs),
            changed = unload.changed() => {
                if changed.is_err() || *unload.borrow() {
                    debug!("Unload requested");
                    return round.unload();
                }
                continue;
            }
        };

        if events.is_empty() {
            continue;
        }
        frontend::dispatch(frontend, &round.hud(), &events);

        let ended = events.into_iter().find_map(|e| match e {
            RoundEvent::RoundEnded(outcome) => Some(outcome),
            _ => None,
        });
        if let Some(outcome) = ended {
            if let Some(destination) = round.finish() {
                frontend.navigate(destination);
            }
            return Some(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::frontend::{Destination, HeadlessFrontend};
    use crate::game::outcome::{EndReason, RoundResult};
    use crate::metrics::RoundMetrics;
    use crate::save::{KeyValueStore, MemoryStore, Persistence, Phase, SaveRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn round_for(raw: &str) -> (Arc<MemoryStore>, Round, Arc<RoundMetrics>) {
        let store = Arc::new(MemoryStore::with_slot("slot_1", raw));
        let metrics = Arc::new(RoundMetrics::new());
        let round = Round::load(Persistence::new(store.clone()), &GameConfig::default(), metrics.clone())
            .expect("playing save");
        (store, round, metrics)
    }

    fn saved(store: &MemoryStore) -> SaveRecord {
        SaveRecord::from_json(&store.get("slot_1").unwrap().unwrap()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expiry_navigates_to_shop() {
        let (store, mut round, metrics) = round_for(r#"{"phase":"playing","stage":2,"remainingTime":3}"#);
        let mut fe = HeadlessFrontend::new();
        // Cursor far away from every tile
        let (_cursor_tx, cursor_rx) = watch::channel(Vec2::new(-10_000.0, -10_000.0));
        let (_unload_tx, unload_rx) = watch::channel(false);
        let mut rng = StdRng::seed_from_u64(1);

        let started = Instant::now();
        let outcome = run_round(&mut round, &mut fe, cursor_rx, unload_rx, &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.reason, EndReason::TimerExpired);
        assert_eq!(outcome.result, RoundResult::Incomplete);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(fe.timer, "00:00");
        assert_eq!(fe.stage, "Stage: 2");
        assert_eq!(fe.navigated_to, Some(Destination::Upgrades));
        assert_eq!(round.state(), RoundState::Terminated);
        assert_eq!(saved(&store).phase, Phase::Upgrades);
        // 5 combat ticks per second
        assert!(metrics.combat_ticks.load(Ordering::Relaxed) >= 14);
    }

    #[tokio::test(start_paused = true)]
    async fn test_boss_kill_ends_before_timer() {
        let (store, mut round, _) =
            round_for(r#"{"phase":"playing","stage":6,"upgrades":{"radius":1,"damage":4000}}"#);
        let mut rng = StdRng::seed_from_u64(2);
        round.initialize(&mut rng);
        let boss_tile = round.grid().center_index();
        let target = round.grid().tile_center(boss_tile);

        let mut fe = HeadlessFrontend::new();
        let (_cursor_tx, cursor_rx) = watch::channel(target);
        let (_unload_tx, unload_rx) = watch::channel(false);

        let started = Instant::now();
        let outcome = run_round(&mut round, &mut fe, cursor_rx, unload_rx, &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.reason, EndReason::BossDefeated);
        assert_eq!(outcome.next_stage, 7);
        assert_eq!(outcome.time_left, 30);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fe.stage, "Stage: 6 (Boss)");
        assert_eq!(fe.feedback_count, 1);
        assert_eq!(fe.navigated_to, Some(Destination::Upgrades));
        let record = saved(&store);
        assert_eq!(record.stage, 7);
        assert!(record.boss_progress[&6].defeated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_signal_pauses_round() {
        let (store, mut round, metrics) = round_for(r#"{"phase":"playing","stage":3,"remainingTime":20}"#);
        let mut fe = HeadlessFrontend::new();
        let (_cursor_tx, cursor_rx) = watch::channel(Vec2::new(-10_000.0, -10_000.0));
        let (unload_tx, unload_rx) = watch::channel(false);
        let mut rng = StdRng::seed_from_u64(3);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5_500)).await;
            let _ = unload_tx.send(true);
        });

        let outcome = run_round(&mut round, &mut fe, cursor_rx, unload_rx, &mut rng)
            .await
            .unwrap();
        assert_eq!(outcome.reason, EndReason::Unloaded);
        assert_eq!(outcome.result, RoundResult::Paused);
        assert_eq!(outcome.time_left, 15);
        assert_eq!(fe.navigated_to, None);

        let record = saved(&store);
        assert_eq!(record.phase, Phase::Paused);
        assert_eq!(record.remaining_time, 15);
        assert_eq!(metrics.rounds_paused.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_updates_reach_combat() {
        let (_, mut round, _) = round_for(r#"{"phase":"playing","stage":1,"remainingTime":2,"upgrades":{"damage":400}}"#);
        let mut rng = StdRng::seed_from_u64(4);
        round.initialize(&mut rng);
        let first = round
            .grid()
            .entities()
            .map(|(i, _)| i)
            .next()
            .expect("stones spawned");
        let target = round.grid().tile_center(first);

        let mut fe = HeadlessFrontend::new();
        let (cursor_tx, cursor_rx) = watch::channel(Vec2::new(-10_000.0, -10_000.0));
        let (_unload_tx, unload_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = cursor_tx.send(target);
        });

        let outcome = run_round(&mut round, &mut fe, cursor_rx, unload_rx, &mut rng)
            .await
            .unwrap();
        assert!(round.grid().entity(first).is_none());
        assert!(fe.feedback_count >= 1);
        assert!(outcome.gold > 0.0);
        assert!(fe.gold.starts_with("Gold: "));
    }
}
