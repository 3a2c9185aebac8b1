//! One world: its zones and the volume tree indexing them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::config::{IndexConfig, WorldBounds};
use crate::error::ZoneError;
use crate::geometry::Volume;
use crate::host::{GLOBAL_NAME, Zone, ZoneId};
use crate::sync::{read, write};
use crate::tree::VolumeTree;

#[derive(Debug)]
struct DomainState {
    names: HashMap<String, ZoneId>,
    zones: BTreeMap<ZoneId, Arc<Zone>>,
    tree: VolumeTree,
    next_sequence: u64,
}

/// Zones of one world. Queries share the read lock; edits take the write lock, so a rebuild in
/// one domain never blocks lookups in another.
#[derive(Debug)]
pub struct Domain {
    name: String,
    world: WorldBounds,
    state: RwLock<DomainState>,
}

pub(crate) fn check_name(name: &str) -> Result<(), ZoneError> {
    if name.is_empty() || name == GLOBAL_NAME || name.chars().any(char::is_whitespace) {
        return Err(ZoneError::InvalidName(name.to_owned()));
    }
    Ok(())
}

impl Domain {
    #[must_use]
    pub fn new(name: impl Into<String>, world: WorldBounds, index: &IndexConfig) -> Self {
        Self {
            name: name.into(),
            world,
            state: RwLock::new(DomainState {
                names: HashMap::new(),
                zones: BTreeMap::new(),
                tree: VolumeTree::new(index),
                next_sequence: 0,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn world(&self) -> &WorldBounds {
        &self.world
    }

    /// Hold the write lock for several edits. Volumes are buffered and the tree is rebuilt once,
    /// when the guard drops.
    pub fn bulk_edit(&self) -> BulkEdit<'_> {
        BulkEdit {
            domain: self,
            state: write(&self.state),
        }
    }

    pub fn create_zone(
        &self,
        name: &str,
        priority: i32,
        volumes: Vec<Volume>,
    ) -> Result<Arc<Zone>, ZoneError> {
        self.bulk_edit().create_zone(name, priority, volumes)
    }

    pub fn remove_zone(&self, name: &str) -> Result<Arc<Zone>, ZoneError> {
        self.bulk_edit().remove_zone(name)
    }

    /// Append a volume to a zone. Returns its index.
    pub fn add_volume(&self, zone: &str, volume: Volume) -> Result<usize, ZoneError> {
        self.bulk_edit().add_volume(zone, volume)
    }

    /// Remove the volume at `index` from a zone and re-index it.
    pub fn remove_volume(&self, zone: &str, index: usize) -> Result<Volume, ZoneError> {
        self.bulk_edit().remove_volume(zone, index)
    }

    #[must_use]
    pub fn zone(&self, name: &str) -> Option<Arc<Zone>> {
        let state = read(&self.state);
        let id = state.names.get(name)?;
        state.zones.get(id).cloned()
    }

    #[must_use]
    pub fn zone_by_id(&self, id: ZoneId) -> Option<Arc<Zone>> {
        read(&self.state).zones.get(&id).cloned()
    }

    /// Every zone, in creation order.
    #[must_use]
    pub fn zones(&self) -> Vec<Arc<Zone>> {
        read(&self.state).zones.values().cloned().collect()
    }

    /// Zones containing the point, in creation order.
    #[must_use]
    pub fn containing(&self, x: f64, y: f64, z: f64) -> Vec<Arc<Zone>> {
        let state = read(&self.state);
        let zones: Vec<_> = state
            .tree
            .containing(x, y, z)
            .into_iter()
            .filter_map(|id| state.zones.get(&id).cloned())
            .collect();
        log::trace!(
            "realmguard: {} zone(s) at ({x}, {y}, {z}) in '{}'",
            zones.len(),
            self.name
        );
        zones
    }

    /// Zones with a volume intersecting `volume`, in creation order.
    #[must_use]
    pub fn intersecting(&self, volume: &Volume) -> Vec<Arc<Zone>> {
        let state = read(&self.state);
        state
            .tree
            .intersecting(volume)
            .into_iter()
            .filter_map(|id| state.zones.get(&id).cloned())
            .collect()
    }

    /// Names of zones a new volume would overlap.
    #[must_use]
    pub fn overlapping(&self, volume: &Volume) -> Vec<String> {
        self.intersecting(volume)
            .iter()
            .map(|zone| zone.name().to_owned())
            .collect()
    }

    /// Rebuild the tree from every zone's current volumes.
    pub fn reindex(&self) {
        let mut state = write(&self.state);
        let DomainState { zones, tree, .. } = &mut *state;
        for zone in zones.values() {
            tree.replace_zone(zone.id(), &zone.volumes());
        }
        tree.construct();
        log::debug!("realmguard: Re-indexed {} zone(s) in '{}'", zones.len(), self.name);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.state).zones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed volumes and volumes waiting for a rebuild.
    #[must_use]
    pub fn indexed(&self) -> (usize, usize) {
        let state = read(&self.state);
        (state.tree.len(), state.tree.pending())
    }
}

/// Write access to a [`Domain`]. The volume tree is rebuilt when this drops.
pub struct BulkEdit<'a> {
    domain: &'a Domain,
    state: RwLockWriteGuard<'a, DomainState>,
}

impl BulkEdit<'_> {
    pub fn create_zone(
        &mut self,
        name: &str,
        priority: i32,
        volumes: Vec<Volume>,
    ) -> Result<Arc<Zone>, ZoneError> {
        if volumes.is_empty() {
            return Err(ZoneError::NoVolumes);
        }
        let sequence = self.state.next_sequence;
        let zone = self.insert_zone(sequence, name, priority, volumes)?;
        log::info!(
            "realmguard: Created zone '{name}' in '{}' (priority {priority})",
            self.domain.name
        );
        Ok(zone)
    }

    /// Re-create a persisted zone under its original creation sequence. A zone saved after its
    /// last volume was removed comes back empty.
    pub(crate) fn restore_zone(
        &mut self,
        sequence: u64,
        name: &str,
        priority: i32,
        volumes: Vec<Volume>,
    ) -> Result<Arc<Zone>, ZoneError> {
        if self.state.zones.contains_key(&ZoneId::new(sequence)) {
            return Err(ZoneError::DuplicateName(name.to_owned()));
        }
        self.insert_zone(sequence, name, priority, volumes)
    }

    fn insert_zone(
        &mut self,
        sequence: u64,
        name: &str,
        priority: i32,
        volumes: Vec<Volume>,
    ) -> Result<Arc<Zone>, ZoneError> {
        check_name(name)?;
        if self.state.names.contains_key(name) {
            return Err(ZoneError::DuplicateName(name.to_owned()));
        }
        for volume in &volumes {
            volume.validate(&self.domain.world)?;
        }

        let id = ZoneId::new(sequence);
        for volume in &volumes {
            self.state.tree.put(*volume, id, false);
        }
        let zone = Arc::new(Zone::new(
            id,
            name.to_owned(),
            self.domain.name.clone(),
            priority,
            volumes,
        ));
        self.state.names.insert(name.to_owned(), id);
        self.state.zones.insert(id, Arc::clone(&zone));
        self.state.next_sequence = self.state.next_sequence.max(sequence + 1);
        Ok(zone)
    }

    fn lookup(&self, name: &str) -> Result<Arc<Zone>, ZoneError> {
        self.state
            .names
            .get(name)
            .and_then(|id| self.state.zones.get(id))
            .cloned()
            .ok_or_else(|| ZoneError::UnknownZone(name.to_owned()))
    }

    pub fn remove_zone(&mut self, name: &str) -> Result<Arc<Zone>, ZoneError> {
        let zone = self.lookup(name)?;
        self.state.names.remove(name);
        self.state.zones.remove(&zone.id());
        let dropped = self.state.tree.remove_zone(zone.id());
        log::info!(
            "realmguard: Removed zone '{name}' from '{}' ({dropped} volume(s))",
            self.domain.name
        );
        Ok(zone)
    }

    pub fn add_volume(&mut self, zone: &str, volume: Volume) -> Result<usize, ZoneError> {
        let zone = self.lookup(zone)?;
        volume.validate(&self.domain.world)?;
        zone.push_volume(volume);
        self.state.tree.put(volume, zone.id(), false);
        Ok(zone.volume_count() - 1)
    }

    /// Remove one volume by index. Removing the last one leaves the zone in place, covering nothing.
    pub fn remove_volume(&mut self, zone: &str, index: usize) -> Result<Volume, ZoneError> {
        let zone = self.lookup(zone)?;
        let removed = zone.remove_volume(index)?;
        self.state.tree.replace_zone(zone.id(), &zone.volumes());
        Ok(removed)
    }

    #[must_use]
    pub fn zone(&self, name: &str) -> Option<Arc<Zone>> {
        self.lookup(name).ok()
    }
}

impl Drop for BulkEdit<'_> {
    fn drop(&mut self) {
        if self.state.tree.is_dirty() {
            self.state.tree.construct();
            log::debug!(
                "realmguard: Rebuilt volume tree for '{}' ({} volume(s))",
                self.domain.name,
                self.state.tree.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain::new("overworld", WorldBounds::default(), &IndexConfig::default())
    }

    fn cube(min: f64, max: f64) -> Volume {
        Volume::cuboid([min, min, min], [max, max, max])
    }

    #[test]
    fn create_and_find() {
        let domain = domain();
        let zone = domain.create_zone("spawn", 10, vec![cube(0.0, 10.0)]).unwrap();
        assert_eq!(zone.domain(), "overworld");
        assert_eq!(domain.containing(5.0, 5.0, 5.0).len(), 1);
        assert!(domain.containing(50.0, 5.0, 5.0).is_empty());
        assert_eq!(domain.indexed(), (1, 0));
    }

    #[test]
    fn create_rejects_bad_input() {
        let domain = domain();
        domain.create_zone("spawn", 0, vec![cube(0.0, 10.0)]).unwrap();
        assert_eq!(
            domain.create_zone("spawn", 0, vec![cube(0.0, 1.0)]).unwrap_err(),
            ZoneError::DuplicateName("spawn".to_owned())
        );
        assert_eq!(domain.create_zone("empty", 0, Vec::new()).unwrap_err(), ZoneError::NoVolumes);
        assert!(matches!(
            domain.create_zone("flat", 0, vec![cube(1.0, 1.0)]),
            Err(ZoneError::InvalidVolume(_))
        ));
        assert!(matches!(
            domain.create_zone("my zone", 0, vec![cube(0.0, 1.0)]),
            Err(ZoneError::InvalidName(_))
        ));
        assert!(matches!(
            domain.create_zone(GLOBAL_NAME, 0, vec![cube(0.0, 1.0)]),
            Err(ZoneError::InvalidName(_))
        ));
        assert_eq!(domain.len(), 1);
        assert_eq!(domain.indexed(), (1, 0));
    }

    #[test]
    fn remove_zone_drops_volumes() {
        let domain = domain();
        domain.create_zone("a", 0, vec![cube(0.0, 10.0), cube(20.0, 30.0)]).unwrap();
        domain.remove_zone("a").unwrap();
        assert!(domain.containing(5.0, 5.0, 5.0).is_empty());
        assert!(domain.zone("a").is_none());
        assert_eq!(domain.indexed(), (0, 0));
        assert_eq!(
            domain.remove_zone("a").unwrap_err(),
            ZoneError::UnknownZone("a".to_owned())
        );
    }

    #[test]
    fn remove_volume_reindexes() {
        let domain = domain();
        domain.create_zone("a", 0, vec![cube(0.0, 10.0), cube(20.0, 30.0)]).unwrap();
        assert_eq!(domain.remove_volume("a", 0).unwrap(), cube(0.0, 10.0));
        assert!(domain.containing(5.0, 5.0, 5.0).is_empty());
        assert_eq!(domain.containing(25.0, 25.0, 25.0).len(), 1);
        assert_eq!(
            domain.remove_volume("a", 4).unwrap_err(),
            ZoneError::IndexOutOfBounds { index: 4, len: 1 }
        );
        assert_eq!(domain.remove_volume("a", 0).unwrap(), cube(20.0, 30.0));
        assert!(domain.containing(25.0, 25.0, 25.0).is_empty());
        assert_eq!(domain.zone("a").unwrap().volume_count(), 0);
        assert_eq!(domain.indexed(), (0, 0));
    }

    #[test]
    fn add_volume_extends_area() {
        let domain = domain();
        domain.create_zone("a", 0, vec![cube(0.0, 10.0)]).unwrap();
        assert_eq!(domain.add_volume("a", cube(100.0, 110.0)).unwrap(), 1);
        assert_eq!(domain.containing(105.0, 105.0, 105.0).len(), 1);
        assert!(domain.add_volume("b", cube(0.0, 1.0)).is_err());
    }

    #[test]
    fn bulk_edit_builds_once_on_drop() {
        let domain = domain();
        {
            let mut edit = domain.bulk_edit();
            for i in 0..10 {
                let min = f64::from(i) * 100.0;
                let column = Volume::cuboid([min, 0.0, min], [min + 10.0, 10.0, min + 10.0]);
                edit.create_zone(&format!("z{i}"), i, vec![column]).unwrap();
            }
            assert!(edit.zone("z3").is_some());
        }
        assert_eq!(domain.indexed(), (10, 0));
        assert_eq!(domain.containing(305.0, 5.0, 305.0)[0].name(), "z3");
    }

    #[test]
    fn zones_in_creation_order_and_overlaps() {
        let domain = domain();
        domain.create_zone("b", 0, vec![cube(0.0, 10.0)]).unwrap();
        domain.create_zone("a", 0, vec![cube(5.0, 15.0)]).unwrap();
        let names: Vec<_> = domain.zones().iter().map(|z| z.name().to_owned()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(domain.overlapping(&cube(8.0, 9.0)), ["b", "a"]);
        assert_eq!(domain.overlapping(&Volume::slab(100.0, 200.0)), Vec::<String>::new());
    }
}
