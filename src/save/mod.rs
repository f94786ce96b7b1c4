//! Save-slot persistence boundary

pub mod patch;
pub mod record;
pub mod store;

pub use patch::{Persistence, SavePatch};
pub use record::{Boost, BoostKind, BossRecord, LoadError, Phase, SaveRecord, UpgradeSet};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError, CURRENT_SLOT_KEY};
