//! Frontend boundary
//!
//! The round never renders anything itself. It calls out to a [`Frontend`]
//! on defined events (HUD text updates, destruction feedback, biome theming,
//! navigation) and never reads anything back.

use tracing::{debug, info};

use crate::game::biome::Biome;
use crate::game::events::RoundEvent;
use crate::game::grid::{EntityKind, RoundTheme};
use crate::save::LoadError;
use crate::util::vec2::Vec2;

/// External pages the round can hand control to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Slot selection / title page
    Entry,
    /// Upgrade shop between rounds
    Upgrades,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Entry => "index.html",
            Destination::Upgrades => "upgrades.html",
        }
    }
}

/// Values shown in the HUD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HudSnapshot {
    pub gold: f64,
    pub level: u32,
    pub stones_to_next_level: u64,
    pub stage: u32,
    pub is_boss_round: bool,
    pub time_left: u32,
}

pub fn gold_text(gold: f64) -> String {
    let whole = if gold.is_finite() { gold.max(0.0).floor() } else { 0.0 };
    format!("Gold: {}", whole as u64)
}

pub fn level_text(level: u32, stones_to_next: u64) -> String {
    format!("Level {} - Stones to level-up: {}", level, stones_to_next)
}

pub fn stage_text(stage: u32, is_boss_round: bool) -> String {
    if is_boss_round {
        format!("Stage: {} (Boss)", stage)
    } else {
        format!("Stage: {}", stage)
    }
}

/// `MM:SS`
pub fn timer_text(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Rendering, effects and navigation collaborator
pub trait Frontend {
    fn set_gold_text(&mut self, text: &str);
    fn set_level_text(&mut self, text: &str);
    fn set_stage_text(&mut self, text: &str);
    fn set_timer_text(&mut self, text: &str);
    /// Particle / flash feedback where an entity was destroyed
    fn destruction_feedback(&mut self, position: Vec2, kind: EntityKind, payout: f64);
    fn apply_biome(&mut self, biome: Biome);
    fn apply_theme(&mut self, _theme: &RoundTheme) {}
    fn navigate(&mut self, destination: Destination);
}

/// Push the full HUD plus biome and theme when a round starts
pub fn present_initial<F: Frontend + ?Sized>(
    frontend: &mut F,
    hud: &HudSnapshot,
    biome: Biome,
    theme: &RoundTheme,
) {
    frontend.apply_biome(biome);
    frontend.apply_theme(theme);
    frontend.set_gold_text(&gold_text(hud.gold));
    frontend.set_level_text(&level_text(hud.level, hud.stones_to_next_level));
    frontend.set_stage_text(&stage_text(hud.stage, hud.is_boss_round));
    frontend.set_timer_text(&timer_text(hud.time_left));
}

/// Hand control to the page a failed load points at
pub fn redirect<F: Frontend + ?Sized>(frontend: &mut F, error: &LoadError) -> Destination {
    let destination = error.redirect();
    debug!("Load refused ({}), redirecting to {}", error, destination.path());
    frontend.navigate(destination);
    destination
}

/// Forward round events to the frontend. `hud` is the state after the events.
pub fn dispatch<F: Frontend + ?Sized>(frontend: &mut F, hud: &HudSnapshot, events: &[RoundEvent]) {
    let mut gold_dirty = false;
    let mut level_dirty = false;

    for event in events {
        match event {
            RoundEvent::EntityDestroyed {
                kind,
                position,
                payout,
                ..
            } => {
                frontend.destruction_feedback(*position, *kind, *payout);
                level_dirty = true;
            }
            RoundEvent::LevelUp(_) => level_dirty = true,
            RoundEvent::TimerTicked { time_left } => {
                frontend.set_timer_text(&timer_text(*time_left));
            }
            RoundEvent::BossDefeated { .. }
            | RoundEvent::GoldRegenerated { .. }
            | RoundEvent::RoundEnded(_) => {}
        }
        gold_dirty |= event.touches_gold();
    }

    if gold_dirty {
        frontend.set_gold_text(&gold_text(hud.gold));
    }
    if level_dirty {
        frontend.set_level_text(&level_text(hud.level, hud.stones_to_next_level));
    }
}

/// Frontend for hosts without a page: keeps the latest texts and logs the rest
#[derive(Debug, Default)]
pub struct HeadlessFrontend {
    pub gold: String,
    pub level: String,
    pub stage: String,
    pub timer: String,
    pub biome: Option<Biome>,
    pub feedback_count: u64,
    pub navigated_to: Option<Destination>,
}

impl HeadlessFrontend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontend for HeadlessFrontend {
    fn set_gold_text(&mut self, text: &str) {
        self.gold = text.to_string();
    }

    fn set_level_text(&mut self, text: &str) {
        self.level = text.to_string();
    }

    fn set_stage_text(&mut self, text: &str) {
        self.stage = text.to_string();
    }

    fn set_timer_text(&mut self, text: &str) {
        self.timer = text.to_string();
    }

    fn destruction_feedback(&mut self, position: Vec2, kind: EntityKind, payout: f64) {
        self.feedback_count += 1;
        debug!(
            "{:?} destroyed at ({:.0}, {:.0}) +{:.1} gold",
            kind, position.x, position.y, payout
        );
    }

    fn apply_biome(&mut self, biome: Biome) {
        self.biome = Some(biome);
        debug!("Biome: {}", biome);
    }

    fn apply_theme(&mut self, theme: &RoundTheme) {
        debug!("Theme: {:?}", theme);
    }

    fn navigate(&mut self, destination: Destination) {
        info!("Navigating to {}", destination.path());
        self.navigated_to = Some(destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hud() -> HudSnapshot {
        HudSnapshot {
            gold: 42.9,
            level: 3,
            stones_to_next_level: 17,
            stage: 6,
            is_boss_round: true,
            time_left: 75,
        }
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(gold_text(42.9), "Gold: 42");
        assert_eq!(gold_text(f64::NAN), "Gold: 0");
        assert_eq!(level_text(2, 48), "Level 2 - Stones to level-up: 48");
        assert_eq!(stage_text(6, true), "Stage: 6 (Boss)");
        assert_eq!(stage_text(5, false), "Stage: 5");
        assert_eq!(timer_text(30), "00:30");
        assert_eq!(timer_text(75), "01:15");
        assert_eq!(timer_text(0), "00:00");
    }

    #[test]
    fn test_destination_paths() {
        assert_eq!(Destination::Entry.path(), "index.html");
        assert_eq!(Destination::Upgrades.path(), "upgrades.html");
    }

    #[test]
    fn test_present_initial() {
        let mut fe = HeadlessFrontend::new();
        let theme = RoundTheme::Normal { floor: "ice.png".into() };
        present_initial(&mut fe, &hud(), Biome::Ice, &theme);
        assert_eq!(fe.biome, Some(Biome::Ice));
        assert_eq!(fe.gold, "Gold: 42");
        assert_eq!(fe.level, "Level 3 - Stones to level-up: 17");
        assert_eq!(fe.stage, "Stage: 6 (Boss)");
        assert_eq!(fe.timer, "01:15");
    }

    #[test]
    fn test_dispatch_destruction_updates_gold_and_level() {
        let mut fe = HeadlessFrontend::new();
        let events = vec![RoundEvent::EntityDestroyed {
            tile: 0,
            kind: EntityKind::Stone,
            position: Vec2::ZERO,
            payout: 3.3,
        }];
        dispatch(&mut fe, &hud(), &events);
        assert_eq!(fe.feedback_count, 1);
        assert_eq!(fe.gold, "Gold: 42");
        assert_eq!(fe.level, "Level 3 - Stones to level-up: 17");
        assert!(fe.timer.is_empty());
    }

    #[test]
    fn test_redirect_follows_load_error() {
        let mut fe = HeadlessFrontend::new();
        let err = LoadError::NotPlaying(crate::save::Phase::Paused);
        assert_eq!(redirect(&mut fe, &err), Destination::Upgrades);
        assert_eq!(fe.navigated_to, Some(Destination::Upgrades));

        let mut fe = HeadlessFrontend::new();
        redirect(&mut fe, &LoadError::NoActiveSlot);
        assert_eq!(fe.navigated_to, Some(Destination::Entry));
    }

    #[test]
    fn test_dispatch_timer_only() {
        let mut fe = HeadlessFrontend::new();
        dispatch(&mut fe, &hud(), &[RoundEvent::TimerTicked { time_left: 9 }]);
        assert_eq!(fe.timer, "00:09");
        assert!(fe.gold.is_empty());
        assert!(fe.level.is_empty());
    }
}
