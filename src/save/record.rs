//! Save record model and parse-once coercion
//!
//! A save is a loosely-typed JSON object written by several pages of the game.
//! It is validated exactly once here: every field of the wrong type or shape
//! falls back to its default, so nothing downstream re-checks it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::frontend::Destination;
use crate::game::biome::Biome;

/// Current save layout version
pub const SAVE_VERSION: u32 = 1;

/// Which page owns the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// A round is (or should be) running
    Playing,
    /// A round was interrupted and can be resumed
    Paused,
    /// Between rounds, in the upgrade shop
    #[default]
    Upgrades,
}

impl Phase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "playing" => Some(Phase::Playing),
            "paused" => Some(Phase::Paused),
            "upgrades" => Some(Phase::Upgrades),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Playing => "playing",
            Phase::Paused => "paused",
            Phase::Upgrades => "upgrades",
        }
    }
}

/// Permanent upgrade levels bought in the shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeSet {
    pub radius: u32,
    pub damage: u32,
    pub amount: u32,
    pub gold_boost: u32,
}

impl Default for UpgradeSet {
    fn default() -> Self {
        Self {
            radius: 1,
            damage: 0,
            amount: 0,
            gold_boost: 0,
        }
    }
}

/// Timed boost category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostKind {
    Damage,
    Gold,
    Radius,
}

impl BoostKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "damage" => Some(BoostKind::Damage),
            "gold" => Some(BoostKind::Gold),
            "radius" => Some(BoostKind::Radius),
            _ => None,
        }
    }
}

/// A timed modifier granted on level-up
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boost {
    #[serde(rename = "type")]
    pub kind: BoostKind,
    /// Multiplier bonus (damage/gold, e.g. 0.5 = +50%) or additive levels (radius)
    pub magnitude: f64,
    pub remaining_sec: u32,
}

/// Attempt/defeat history for one boss stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BossRecord {
    pub attempted: bool,
    pub defeated: bool,
}

/// Fully-defaulted save record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    pub version: u32,
    pub phase: Phase,
    pub stage: u32,
    pub gold: f64,
    /// Seconds left in an interrupted round; 0 means "start a fresh round"
    pub remaining_time: u32,
    pub upgrades: UpgradeSet,
    pub biome: Biome,
    pub level: u32,
    pub stones_total: u64,
    pub gold_regen_per_sec: f64,
    pub active_boosts: Vec<Boost>,
    pub boss_progress: BTreeMap<u32, BossRecord>,
    pub force_boss_round: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

impl Default for SaveRecord {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            phase: Phase::default(),
            stage: 1,
            gold: 0.0,
            remaining_time: 0,
            upgrades: UpgradeSet::default(),
            biome: Biome::default(),
            level: 1,
            stones_total: 0,
            gold_regen_per_sec: 0.0,
            active_boosts: Vec::new(),
            boss_progress: BTreeMap::new(),
            force_boss_round: false,
            start_time: None,
        }
    }
}

/// Why a round could not be entered
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("No active save slot")]
    NoActiveSlot,
    #[error("Save slot '{0}' is empty")]
    Missing(String),
    #[error("Save slot '{0}' is not a JSON object")]
    Malformed(String),
    #[error("Save is in phase '{}', not playing", .0.as_str())]
    NotPlaying(Phase),
}

impl LoadError {
    /// Page the player is sent to instead of entering the round
    pub fn redirect(&self) -> Destination {
        match self {
            LoadError::NotPlaying(_) => Destination::Upgrades,
            _ => Destination::Entry,
        }
    }
}

impl SaveRecord {
    /// Parse a raw save document. Only a non-object document is an error.
    pub fn from_json(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(Self::from_map(&map)),
            _ => None,
        }
    }

    /// Coerce every field of a save object, defaulting anything malformed
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();

        let phase = match map.get("phase").and_then(Value::as_str).and_then(Phase::parse) {
            Some(phase) => phase,
            None => {
                debug!("save: phase missing or unknown, defaulting to upgrades");
                defaults.phase
            }
        };

        let stage = to_num(map.get("stage"))
            .map(|s| (s.floor().max(1.0)) as u32)
            .unwrap_or(defaults.stage);

        let gold = to_num(map.get("gold")).map(|g| g.max(0.0)).unwrap_or(0.0);

        let remaining_time = to_num(map.get("remainingTime"))
            .filter(|t| *t > 0.0)
            .map(|t| t.floor() as u32)
            .unwrap_or(0);

        let upgrades = match map.get("upgrades") {
            Some(Value::Object(raw)) => parse_upgrades(raw),
            Some(other) => {
                debug!("save: upgrades has wrong shape ({}), using defaults", other);
                UpgradeSet::default()
            }
            None => UpgradeSet::default(),
        };

        let biome = map
            .get("biome")
            .and_then(Value::as_str)
            .map(Biome::normalize)
            .unwrap_or_default();

        let level = to_num(map.get("level"))
            .map(|l| l.floor().max(1.0) as u32)
            .unwrap_or(1);

        let stones_total = to_num(map.get("stonesTotal"))
            .map(|s| s.floor().max(0.0) as u64)
            .unwrap_or(0);

        // Older saves stored regen under its pre-release name
        let gold_regen_per_sec = to_num(map.get("goldRegenPerSec"))
            .or_else(|| to_num(map.get("pendingGoldRegen")))
            .map(|r| r.max(0.0))
            .unwrap_or(0.0);

        let active_boosts = match map.get("activeBoosts") {
            Some(Value::Array(items)) => items.iter().filter_map(parse_boost).collect(),
            _ => Vec::new(),
        };

        let boss_progress = match map.get("bossProgress") {
            Some(Value::Object(raw)) => parse_boss_progress(raw),
            _ => BTreeMap::new(),
        };

        let force_boss_round = map.get("forceBossRound").map(truthy).unwrap_or(false);

        let start_time = to_num(map.get("startTime")).map(|t| t as i64);

        let version = to_num(map.get("version"))
            .map(|v| v.max(1.0) as u32)
            .unwrap_or(SAVE_VERSION);

        Self {
            version,
            phase,
            stage,
            gold,
            remaining_time,
            upgrades,
            biome,
            level,
            stones_total,
            gold_regen_per_sec,
            active_boosts,
            boss_progress,
            force_boss_round,
            start_time,
        }
    }

    /// Full JSON object for a brand-new slot
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_upgrades(raw: &Map<String, Value>) -> UpgradeSet {
    let defaults = UpgradeSet::default();
    let level = |key: &str, fallback: u32| {
        to_num(raw.get(key))
            .map(|v| v.floor().max(0.0) as u32)
            .unwrap_or(fallback)
    };
    UpgradeSet {
        radius: level("radius", defaults.radius),
        damage: level("damage", defaults.damage),
        amount: level("amount", defaults.amount),
        gold_boost: level("goldBoost", defaults.gold_boost),
    }
}

fn parse_boost(raw: &Value) -> Option<Boost> {
    let obj = raw.as_object()?;
    let kind = obj.get("type").and_then(Value::as_str).and_then(BoostKind::parse)?;
    let magnitude = to_num(obj.get("magnitude")).unwrap_or(0.0);
    let remaining_sec = to_num(obj.get("remainingSec"))
        .map(|s| s.floor().max(0.0) as u32)
        .unwrap_or(0);
    if remaining_sec == 0 {
        return None;
    }
    Some(Boost {
        kind,
        magnitude,
        remaining_sec,
    })
}

fn parse_boss_progress(raw: &Map<String, Value>) -> BTreeMap<u32, BossRecord> {
    raw.iter()
        .filter_map(|(key, value)| {
            let stage = key.trim().parse::<u32>().ok()?;
            let obj = value.as_object();
            let flag = |name: &str| obj.and_then(|o| o.get(name)).map(truthy).unwrap_or(false);
            Some((
                stage,
                BossRecord {
                    attempted: flag("attempted"),
                    defeated: flag("defeated"),
                },
            ))
        })
        .collect()
}

/// Numeric coercion: numbers and numeric strings, finite only
pub(crate) fn to_num(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Loose truthiness for flags written by older pages
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
