//! RealmGuard core: zone lookup and setting resolution for shared 3D worlds.
//!
//! This crate is structured in a decentralized way:
//! - **[geometry]** — Volume shapes (cuboid, sphere, cylinder, slab) and their math
//! - **[tree]** — Per-domain spatial index from volumes to zones
//! - **[setting]** — Setting keys, values, flag sets and the registry
//! - **[host]** / **[target]** — Global and zone hosts, per-setting player targets
//! - **[domain]** — Zones of one world plus their index
//! - **[evaluator]** — Priority and target aware resolution of effective values
//! - **[realms]** — The shared context tying everything together
//! - **[record]** — Persisted form and the [`ZoneStore`] boundary
//! - **[selection]** — Wand selection state
//! - **[config]** — `config.toml` layout
//!
//! Nothing here does I/O except [`RealmConfig::load`]; storage lives in `realmguard-store`.

pub mod config;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod flags;
pub mod geometry;
pub mod host;
pub mod realms;
pub mod record;
pub mod selection;
pub mod setting;
mod sync;
pub mod target;
pub mod tree;

pub use config::RealmConfig;
pub use domain::{BulkEdit, Domain};
pub use error::{
    ConfigError, GeometryError, RealmError, SelectionError, SettingError, StoreError, ZoneError,
};
pub use evaluator::{Candidates, Evaluator, Resolution};
pub use flags::{Flag, FlagSet};
pub use geometry::Volume;
pub use host::{Global, HostRef, HostSettings, Priority, Zone, ZoneId};
pub use realms::Realms;
pub use record::{DomainRecord, HostRecord, Snapshot, ZoneRecord, ZoneStore};
pub use selection::{SelectionStore, Shape};
pub use setting::{Setting, SettingKey, SettingRegistry, SettingValue, StoredValue};
pub use target::{Target, TargetMode};
pub use tree::VolumeTree;

pub use realmguard_types::{Location, PermissionOracle, PlayerId, Subject};
