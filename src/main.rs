use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mineclicker_core::config::GameConfig;
use mineclicker_core::frontend::{redirect, HeadlessFrontend};
use mineclicker_core::game::constants::round::AOE_INTERVAL_MS;
use mineclicker_core::game::game_loop::run_round;
use mineclicker_core::game::round::Round;
use mineclicker_core::metrics::RoundMetrics;
use mineclicker_core::save::{FileStore, Persistence, Phase, SavePatch};
use mineclicker_core::util::vec2::Vec2;

/// Slot used when neither the config nor the store names one
const DEFAULT_SLOT: &str = "slot_1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Mine Clicker headless host v{}", env!("CARGO_PKG_VERSION"));

    let config = GameConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        "Configuration loaded: saves in {}, grid {}x{}, boss system {}",
        config.save_dir.display(),
        config.grid_width,
        config.grid_height,
        if config.boss_system_enabled { "on" } else { "off" }
    );

    let metrics = Arc::new(RoundMetrics::new());
    let persistence = Persistence::new(Arc::new(FileStore::new(&config.save_dir)));
    prepare_slot(&persistence, &config)?;

    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut frontend = HeadlessFrontend::new();
    let mut round = match Round::load(persistence, &config, metrics.clone()) {
        Ok(round) => round,
        Err(e) => {
            warn!("Cannot enter round: {}", e);
            redirect(&mut frontend, &e);
            return Ok(());
        }
    };
    round.initialize(&mut rng);

    // Cursor sweeps the grid row by row, one tile per combat tick
    let centers: Vec<Vec2> = (0..round.grid().tile_count())
        .map(|i| round.grid().tile_center(i))
        .collect();
    let (cursor_tx, cursor_rx) = watch::channel(centers.first().copied().unwrap_or(Vec2::ZERO));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(AOE_INTERVAL_MS));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        for center in centers.iter().cycle() {
            ticker.tick().await;
            if cursor_tx.send(*center).is_err() {
                break;
            }
        }
    });

    // Ctrl+C behaves like closing the page
    let (unload_tx, unload_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = unload_tx.send(true);
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                // Keep the sender alive so the round is not unloaded
                std::future::pending::<()>().await;
            }
        }
    });

    match run_round(&mut round, &mut frontend, cursor_rx, unload_rx, &mut rng).await {
        Some(outcome) => {
            info!(
                "Round finished: {:?} via {:?}, stage {} -> {}, gold {:.1}, level {}",
                outcome.result,
                outcome.reason,
                outcome.base_stage,
                outcome.next_stage,
                outcome.gold,
                outcome.level
            );
            info!("Outcome: {}", serde_json::to_string(&outcome)?);
        }
        None => warn!("Round stopped without an outcome"),
    }

    info!("Metrics: {}", metrics.to_json());
    Ok(())
}

/// Activate the configured slot and make sure it holds a save ready to play
fn prepare_slot(persistence: &Persistence, config: &GameConfig) -> anyhow::Result<()> {
    let slot = config
        .slot
        .clone()
        .or_else(|| persistence.slot_key())
        .unwrap_or_else(|| DEFAULT_SLOT.to_string());
    persistence.activate_slot(&slot)?;

    match persistence.read() {
        None => {
            info!("Creating fresh save in slot '{}'", slot);
            if !persistence.write_patch(&SavePatch::new().version().phase(Phase::Playing).stage(1)) {
                anyhow::bail!("Could not create save in slot '{}'", slot);
            }
        }
        Some(record) if record.phase != Phase::Playing => {
            // Stand in for the shop's "next round" button
            info!("Slot '{}' is {}, starting the next round", slot, record.phase.as_str());
            persistence.write_patch(&SavePatch::new().phase(Phase::Playing));
        }
        Some(_) => {}
    }
    Ok(())
}
