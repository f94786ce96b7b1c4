//! Read-modify-write access to the active save slot
//!
//! Writes are shallow merges: a patch names the keys it sets or removes and
//! every other key already in the slot survives untouched. Patches are fully
//! built in memory before the read, so a failed write leaves the previous save
//! intact.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::save::record::{Boost, BossRecord, LoadError, Phase, SaveRecord, UpgradeSet, SAVE_VERSION};
use crate::save::store::{KeyValueStore, StoreError, CURRENT_SLOT_KEY};
use crate::game::biome::Biome;

/// A set of key updates applied to the stored save object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavePatch {
    /// `Some` sets the key, `None` removes it
    changes: Vec<(String, Option<Value>)>,
}

impl SavePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Set an arbitrary key to any serializable value
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => self.changes.push((key.to_string(), Some(v))),
            Err(e) => warn!("save patch: dropping unserializable '{}': {}", key, e),
        }
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.changes.push((key.to_string(), None));
        self
    }

    pub fn version(self) -> Self {
        self.set("version", SAVE_VERSION)
    }

    pub fn phase(self, phase: Phase) -> Self {
        self.set("phase", phase)
    }

    pub fn stage(self, stage: u32) -> Self {
        self.set("stage", stage)
    }

    pub fn gold(self, gold: f64) -> Self {
        self.set("gold", gold)
    }

    pub fn remaining_time(self, secs: u32) -> Self {
        self.set("remainingTime", secs)
    }

    pub fn upgrades(self, upgrades: &UpgradeSet) -> Self {
        self.set("upgrades", upgrades)
    }

    pub fn biome(self, biome: Biome) -> Self {
        self.set("biome", biome)
    }

    pub fn level(self, level: u32) -> Self {
        self.set("level", level)
    }

    pub fn stones_total(self, total: u64) -> Self {
        self.set("stonesTotal", total)
    }

    pub fn gold_regen_per_sec(self, regen: f64) -> Self {
        self.set("goldRegenPerSec", regen)
    }

    pub fn active_boosts(self, boosts: &[Boost]) -> Self {
        self.set("activeBoosts", boosts)
    }

    pub fn boss_progress(self, progress: &BTreeMap<u32, BossRecord>) -> Self {
        self.set("bossProgress", progress)
    }

    pub fn force_boss_round(self, flag: bool) -> Self {
        self.set("forceBossRound", flag)
    }

    pub fn start_time(self, millis: i64) -> Self {
        self.set("startTime", millis)
    }

    /// Append all changes of another patch (later keys win)
    pub fn merge(mut self, other: SavePatch) -> Self {
        self.changes.extend(other.changes);
        self
    }

    /// Apply onto a save object in place
    pub fn apply_to(&self, target: &mut Map<String, Value>) {
        for (key, value) in &self.changes {
            match value {
                Some(v) => {
                    target.insert(key.clone(), v.clone());
                }
                None => {
                    target.remove(key);
                }
            }
        }
    }
}

/// Active-slot persistence facade shared by the round components
#[derive(Clone)]
pub struct Persistence {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence").finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Key of the active slot, if any
    pub fn slot_key(&self) -> Option<String> {
        match self.backend.get(CURRENT_SLOT_KEY) {
            Ok(Some(key)) if !key.trim().is_empty() => Some(key),
            Ok(_) => None,
            Err(e) => {
                warn!("save: cannot read active slot: {}", e);
                None
            }
        }
    }

    /// Point the active-slot key at `slot`
    pub fn activate_slot(&self, slot: &str) -> Result<(), StoreError> {
        self.backend.set(CURRENT_SLOT_KEY, slot)
    }

    /// Raw save object of the active slot; absent, unreadable or non-object saves are `None`
    pub fn read_raw(&self) -> Option<Map<String, Value>> {
        let key = self.slot_key()?;
        let raw = match self.backend.get(&key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("save: cannot read slot '{}': {}", key, e);
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Parsed save of the active slot, defaults applied
    pub fn read(&self) -> Option<SaveRecord> {
        self.read_raw().map(|map| SaveRecord::from_map(&map))
    }

    /// Load the save for entering a round. Anything but a readable save in
    /// phase `playing` is a redirect.
    pub fn load_for_round(&self) -> Result<SaveRecord, LoadError> {
        let key = self.slot_key().ok_or(LoadError::NoActiveSlot)?;
        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Err(LoadError::Missing(key)),
            Err(e) => {
                warn!("save: cannot read slot '{}': {}", key, e);
                return Err(LoadError::Missing(key));
            }
        };
        let record = SaveRecord::from_json(&raw).ok_or_else(|| LoadError::Malformed(key))?;
        if record.phase != Phase::Playing {
            return Err(LoadError::NotPlaying(record.phase));
        }
        Ok(record)
    }

    /// Merge a patch into the active slot. Best effort: failures are logged
    /// and reported as `false`, never raised.
    pub fn write_patch(&self, patch: &SavePatch) -> bool {
        let Some(key) = self.slot_key() else {
            return false;
        };
        // Only an absent or non-object save may be replaced wholesale
        let mut base = match self.backend.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            Ok(None) => Map::new(),
            Err(e) => {
                warn!("save: cannot read slot '{}' before write, skipping: {}", key, e);
                return false;
            }
        };
        patch.apply_to(&mut base);
        let encoded = match serde_json::to_string(&Value::Object(base)) {
            Ok(s) => s,
            Err(e) => {
                warn!("save: encode failed for slot '{}': {}", key, e);
                return false;
            }
        };
        match self.backend.set(&key, &encoded) {
            Ok(()) => true,
            Err(e) => {
                warn!("save: write failed for slot '{}': {}", key, e);
                false
            }
        }
    }
}
