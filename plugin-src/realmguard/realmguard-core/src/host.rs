//! Settings hosts: the server-wide [`Global`] and per-domain [`Zone`]s.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI32, Ordering};

use realmguard_types::Subject;

use crate::error::{SettingError, ZoneError};
use crate::geometry::Volume;
use crate::setting::{Setting, SettingKey, SettingType, SettingValue};
use crate::sync::{read, write};
use crate::target::Target;

/// Name the global host answers to.
pub const GLOBAL_NAME: &str = "__global__";

/// Handle of a zone inside its domain. Ids grow with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneId(u64);

impl ZoneId {
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    /// Creation sequence number, used to break priority ties.
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolution order key. `Floor` sorts below every zone priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Floor,
    Zone(i32),
}

#[derive(Debug, Default)]
struct HostData {
    values: HashMap<String, SettingValue>,
    targets: HashMap<String, Target>,
}

/// Settings and targets owned by one host.
#[derive(Debug, Default)]
pub struct HostSettings {
    data: RwLock<HostData>,
}

impl HostSettings {
    /// Raw value configured on this host only.
    #[must_use]
    pub fn get_value(&self, id: &str) -> Option<SettingValue> {
        read(&self.data).values.get(id).cloned()
    }

    #[must_use]
    pub fn value<T: SettingType>(&self, setting: &Setting<T>) -> Option<T> {
        read(&self.data)
            .values
            .get(setting.id())
            .and_then(T::from_value)
    }

    #[must_use]
    pub fn has_value(&self, id: &str) -> bool {
        read(&self.data).values.contains_key(id)
    }

    /// Set a typed value, returning the previous one.
    pub fn set_value<T: SettingType>(&self, setting: &Setting<T>, value: T) -> Option<SettingValue> {
        write(&self.data)
            .values
            .insert(setting.id().to_owned(), value.into_value())
    }

    /// Set an erased value after checking it matches the key's kind.
    pub fn set_raw(
        &self,
        key: &SettingKey,
        value: SettingValue,
    ) -> Result<Option<SettingValue>, SettingError> {
        key.check(&value)?;
        Ok(write(&self.data).values.insert(key.id().to_owned(), value))
    }

    /// Unset a value. The setting's target goes with it.
    pub fn remove_value(&self, id: &str) -> Option<SettingValue> {
        let mut data = write(&self.data);
        data.targets.remove(id);
        data.values.remove(id)
    }

    #[must_use]
    pub fn target(&self, id: &str) -> Option<Target> {
        read(&self.data).targets.get(id).cloned()
    }

    /// Existing target for `id`, or a new one from `default` (kept in memory, not persisted).
    pub fn compute_target(&self, id: &str, default: impl FnOnce() -> Target) -> Target {
        if let Some(target) = read(&self.data).targets.get(id) {
            return target.clone();
        }
        write(&self.data)
            .targets
            .entry(id.to_owned())
            .or_insert_with(default)
            .clone()
    }

    /// Mutate the target for `id` in place, creating it from `default` first if needed.
    pub fn edit_target<R>(
        &self,
        id: &str,
        default: impl FnOnce() -> Target,
        edit: impl FnOnce(&mut Target) -> R,
    ) -> R {
        let mut data = write(&self.data);
        edit(data.targets.entry(id.to_owned()).or_insert_with(default))
    }

    pub fn remove_target(&self, id: &str) -> Option<Target> {
        write(&self.data).targets.remove(id)
    }

    /// Value this host contributes for `id` when resolving for `subject`, if any.
    pub(crate) fn applicable(
        &self,
        id: &str,
        subject: Option<&Subject>,
        player_restrictive: bool,
    ) -> Option<SettingValue> {
        let data = read(&self.data);
        let value = data.values.get(id)?;
        if let (Some(subject), true) = (subject, player_restrictive) {
            if let Some(target) = data.targets.get(id) {
                if !target.is_targeted(subject) {
                    return None;
                }
            }
        }
        Some(value.clone())
    }

    /// Sorted copy of values and targets, for persistence.
    #[must_use]
    pub fn snapshot(&self) -> (BTreeMap<String, SettingValue>, BTreeMap<String, Target>) {
        let data = read(&self.data);
        (
            data.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            data.targets.iter().map(|(k, t)| (k.clone(), t.clone())).collect(),
        )
    }

    /// Replace everything with restored data.
    pub(crate) fn restore(
        &self,
        values: impl IntoIterator<Item = (String, SettingValue)>,
        targets: impl IntoIterator<Item = (String, Target)>,
    ) {
        let mut data = write(&self.data);
        data.values = values.into_iter().collect();
        data.targets = targets.into_iter().collect();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.data).values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The server-wide host. Matches every point of every domain at the lowest priority.
#[derive(Debug, Default)]
pub struct Global {
    settings: HostSettings,
}

impl Global {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn settings(&self) -> &HostSettings {
        &self.settings
    }
}

/// A named, prioritized region of one domain.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    name: String,
    domain: String,
    priority: AtomicI32,
    volumes: RwLock<Vec<Volume>>,
    settings: HostSettings,
}

impl Zone {
    pub(crate) fn new(id: ZoneId, name: String, domain: String, priority: i32, volumes: Vec<Volume>) -> Self {
        Self {
            id,
            name,
            domain,
            priority: AtomicI32::new(priority),
            volumes: RwLock::new(volumes),
            settings: HostSettings::default(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ZoneId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the domain (world) the zone belongs to.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }

    pub fn set_priority(&self, priority: i32) {
        self.priority.store(priority, Ordering::Release);
    }

    #[must_use]
    pub const fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Copy of the zone's volumes, in order.
    #[must_use]
    pub fn volumes(&self) -> Vec<Volume> {
        read(&self.volumes).clone()
    }

    #[must_use]
    pub fn volume_count(&self) -> usize {
        read(&self.volumes).len()
    }

    /// Whether any of the zone's volumes contains the point. An empty zone contains nothing.
    #[must_use]
    pub fn contains(&self, x: f64, y: f64, z: f64) -> bool {
        read(&self.volumes).iter().any(|v| v.contains(x, y, z))
    }

    pub(crate) fn push_volume(&self, volume: Volume) {
        write(&self.volumes).push(volume);
    }

    /// Remove the volume at `index`. The owning domain must re-index the zone afterwards.
    pub(crate) fn remove_volume(&self, index: usize) -> Result<Volume, ZoneError> {
        let mut volumes = write(&self.volumes);
        if index >= volumes.len() {
            return Err(ZoneError::IndexOutOfBounds {
                index,
                len: volumes.len(),
            });
        }
        Ok(volumes.remove(index))
    }
}

/// One host, dispatched by kind.
#[derive(Debug, Clone, Copy)]
pub enum HostRef<'a> {
    Global(&'a Global),
    Zone(&'a Zone),
}

impl<'a> HostRef<'a> {
    #[must_use]
    pub fn name(&self) -> &'a str {
        match *self {
            Self::Global(_) => GLOBAL_NAME,
            Self::Zone(zone) => zone.name(),
        }
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        match *self {
            Self::Global(_) => Priority::Floor,
            Self::Zone(zone) => Priority::Zone(zone.priority()),
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &'a HostSettings {
        match *self {
            Self::Global(global) => global.settings(),
            Self::Zone(zone) => zone.settings(),
        }
    }

    #[must_use]
    pub const fn is_global(&self) -> bool {
        matches!(*self, Self::Global(_))
    }

    #[must_use]
    pub const fn as_zone(&self) -> Option<&'a Zone> {
        match *self {
            Self::Global(_) => None,
            Self::Zone(zone) => Some(zone),
        }
    }
}
