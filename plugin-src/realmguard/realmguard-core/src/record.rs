//! Serialized form of hosts and zones, and the store boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::geometry::Volume;
use crate::setting::StoredValue;
use crate::target::Target;

/// Settings and targets of one host, keyed by setting id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRecord {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, StoredValue>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, Target>,
}

impl HostRecord {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty() && self.targets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub name: String,
    /// Creation sequence, kept so equal-priority ordering survives a restart.
    pub sequence: u64,
    pub priority: i32,
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, StoredValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, Target>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub name: String,
    #[serde(default)]
    pub zones: Vec<ZoneRecord>,
}

impl DomainRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zones: Vec::new(),
        }
    }

    /// Insert or replace the zone with the same name.
    pub fn upsert(&mut self, zone: ZoneRecord) {
        match self.zones.iter_mut().find(|z| z.name == zone.name) {
            Some(existing) => *existing = zone,
            None => self.zones.push(zone),
        }
    }

    /// Returns whether a zone was removed.
    pub fn remove(&mut self, zone: &str) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.name != zone);
        self.zones.len() != before
    }
}

/// Everything persisted: the global host and every domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub global: HostRecord,
    pub domains: Vec<DomainRecord>,
}

/// Durable storage for zones and global settings. Callers save after each mutation and load
/// once on boot.
pub trait ZoneStore: Send + Sync {
    fn load(&self) -> Result<Snapshot, StoreError>;

    fn save_global(&self, global: &HostRecord) -> Result<(), StoreError>;

    /// Insert or replace one zone of `domain`.
    fn save_zone(&self, domain: &str, zone: &ZoneRecord) -> Result<(), StoreError>;

    /// Deleting a zone that is not stored is not an error.
    fn delete_zone(&self, domain: &str, zone: &str) -> Result<(), StoreError>;
}
