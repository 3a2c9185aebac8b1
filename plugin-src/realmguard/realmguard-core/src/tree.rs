//! Spatial index from volumes to the zones owning them, one per domain.
//!
//! Volumes are bucketed into a horizontal grid by their bounding box. Slabs (unbounded
//! horizontally) and volumes spanning more than `max_cells_per_volume` cells live in a `wide`
//! list that every query scans, so no lookup can miss them.
//!
//! Insertion is two-phase: [`VolumeTree::put`] buffers, [`VolumeTree::construct`] rebuilds the
//! grid. Buffered volumes are invisible to queries until the next construct. Removal is
//! immediate.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::IndexConfig;
use crate::geometry::{Aabb, Volume};
use crate::host::ZoneId;

#[derive(Debug, Clone, Copy)]
struct Entry {
    volume: Volume,
    zone: ZoneId,
}

type Cell = (i64, i64);

#[derive(Debug, Clone)]
pub struct VolumeTree {
    cell_size: f64,
    max_cells: u64,
    /// Indexed associations. Removed ones are tombstoned until the next construct.
    entries: Vec<Option<Entry>>,
    pending: Vec<Entry>,
    cells: HashMap<Cell, Vec<usize>>,
    wide: Vec<usize>,
    dirty: bool,
}

impl Default for VolumeTree {
    fn default() -> Self {
        Self::new(&IndexConfig::default())
    }
}

impl VolumeTree {
    #[must_use]
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            cell_size: config.cell_size,
            max_cells: config.max_cells_per_volume.max(1),
            entries: Vec::new(),
            pending: Vec::new(),
            cells: HashMap::new(),
            wide: Vec::new(),
            dirty: false,
        }
    }

    /// Register `volume` as part of `zone`. Returns false (and ignores it) if the volume is invalid.
    pub fn put(&mut self, volume: Volume, zone: ZoneId, rebuild_now: bool) -> bool {
        if !volume.is_valid() {
            log::warn!("realmguard: Ignoring invalid {} for zone {zone}", volume.kind());
            return false;
        }
        self.pending.push(Entry { volume, zone });
        self.dirty = true;
        if rebuild_now {
            self.construct();
        }
        true
    }

    /// Drop every volume of `zone`, indexed or buffered. Returns how many were dropped.
    pub fn remove_zone(&mut self, zone: ZoneId) -> usize {
        let mut removed = 0;
        for slot in &mut self.entries {
            if slot.is_some_and(|e| e.zone == zone) {
                *slot = None;
                removed += 1;
            }
        }
        let before = self.pending.len();
        self.pending.retain(|e| e.zone != zone);
        removed += before - self.pending.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Replace every volume of `zone` with `volumes`, buffered until the next construct.
    pub fn replace_zone<'a, I>(&mut self, zone: ZoneId, volumes: I)
    where
        I: IntoIterator<Item = &'a Volume>,
    {
        self.remove_zone(zone);
        for volume in volumes {
            self.put(*volume, zone, false);
        }
    }

    /// Rebuild the grid from every live association, including buffered ones.
    pub fn construct(&mut self) {
        let mut entries: Vec<Option<Entry>> = self.entries.drain(..).filter(Option::is_some).collect();
        entries.extend(self.pending.drain(..).map(Some));

        self.cells.clear();
        self.wide.clear();
        for (idx, entry) in entries.iter().enumerate() {
            let Some(entry) = entry else { continue };
            match self.cell_span(&entry.volume.bounds()) {
                Some((min, max)) => {
                    for cx in min.0..=max.0 {
                        for cz in min.1..=max.1 {
                            self.cells.entry((cx, cz)).or_default().push(idx);
                        }
                    }
                }
                None => self.wide.push(idx),
            }
        }
        self.entries = entries;
        self.dirty = false;
        log::trace!(
            "realmguard: Volume tree rebuilt ({} volumes, {} cells, {} wide)",
            self.entries.len(),
            self.cells.len(),
            self.wide.len()
        );
    }

    #[inline]
    fn cell_of(&self, x: f64, z: f64) -> Cell {
        (
            (x / self.cell_size).floor() as i64,
            (z / self.cell_size).floor() as i64,
        )
    }

    /// Grid cells covered by `bounds`, or `None` if it belongs in the wide list.
    fn cell_span(&self, bounds: &Aabb) -> Option<(Cell, Cell)> {
        if !bounds.is_horizontally_bounded() {
            return None;
        }
        let min = self.cell_of(bounds.min[0], bounds.min[2]);
        let max = self.cell_of(bounds.max[0], bounds.max[2]);
        let span_x = max.0.saturating_sub(min.0).saturating_add(1).unsigned_abs();
        let span_z = max.1.saturating_sub(min.1).saturating_add(1).unsigned_abs();
        if span_x.saturating_mul(span_z) > self.max_cells {
            return None;
        }
        Some((min, max))
    }

    fn live(&self, idx: usize) -> Option<&Entry> {
        self.entries.get(idx).and_then(Option::as_ref)
    }

    /// Zones with a volume containing the point, each once.
    #[must_use]
    pub fn containing(&self, x: f64, y: f64, z: f64) -> BTreeSet<ZoneId> {
        let cell = self.cell_of(x, z);
        self.cells
            .get(&cell)
            .into_iter()
            .flatten()
            .chain(&self.wide)
            .filter_map(|idx| self.live(*idx))
            .filter(|e| e.volume.contains(x, y, z))
            .map(|e| e.zone)
            .collect()
    }

    /// Zones with a volume intersecting `volume`, each once.
    #[must_use]
    pub fn intersecting(&self, volume: &Volume) -> BTreeSet<ZoneId> {
        if !volume.is_valid() {
            return BTreeSet::new();
        }
        let matches = |e: &&Entry| e.volume.intersects(volume);
        match self.cell_span(&volume.bounds()) {
            Some((min, max)) => {
                let mut candidates: HashSet<usize> = self.wide.iter().copied().collect();
                for cx in min.0..=max.0 {
                    for cz in min.1..=max.1 {
                        if let Some(bucket) = self.cells.get(&(cx, cz)) {
                            candidates.extend(bucket);
                        }
                    }
                }
                candidates
                    .into_iter()
                    .filter_map(|idx| self.live(idx))
                    .filter(matches)
                    .map(|e| e.zone)
                    .collect()
            }
            None => self
                .entries
                .iter()
                .flatten()
                .filter(matches)
                .map(|e| e.zone)
                .collect(),
        }
    }

    /// Indexed, live volumes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Volumes waiting for the next construct.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether anything changed since the last construct.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ZoneId {
        ZoneId::new(n)
    }

    fn cube(min: f64, max: f64) -> Volume {
        Volume::cuboid([min, min, min], [max, max, max])
    }

    #[test]
    fn put_is_invisible_until_construct() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), false);
        assert!(tree.containing(5.0, 5.0, 5.0).is_empty());
        assert_eq!(tree.pending(), 1);
        tree.construct();
        assert_eq!(tree.containing(5.0, 5.0, 5.0), BTreeSet::from([id(1)]));
        assert_eq!(tree.pending(), 0);
    }

    #[test]
    fn rebuild_now_is_immediately_visible() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), true);
        assert!(!tree.is_dirty());
        assert!(tree.containing(1.0, 1.0, 1.0).contains(&id(1)));
    }

    #[test]
    fn overlapping_volumes_of_one_zone_are_reported_once() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(7), false);
        tree.put(cube(5.0, 15.0), id(7), false);
        tree.construct();
        let found = tree.containing(7.0, 7.0, 7.0);
        assert_eq!(found.len(), 1);
        assert!(found.contains(&id(7)));
        assert_eq!(tree.containing(12.0, 12.0, 12.0), BTreeSet::from([id(7)]));
    }

    #[test]
    fn volumes_spanning_cells_are_found_everywhere() {
        let mut tree = VolumeTree::default();
        tree.put(Volume::cuboid([-100.0, 0.0, -100.0], [300.0, 10.0, 300.0]), id(1), true);
        for (x, z) in [(-99.0, -99.0), (0.0, 0.0), (130.0, 250.0), (299.0, 299.0)] {
            assert!(tree.containing(x, 5.0, z).contains(&id(1)), "missed ({x}, {z})");
        }
        assert!(tree.containing(301.0, 5.0, 0.0).is_empty());
    }

    #[test]
    fn slabs_and_huge_volumes_go_wide() {
        let mut tree = VolumeTree::default();
        tree.put(Volume::slab(-1.0, 1.0), id(1), false);
        tree.put(
            Volume::cuboid([-1.0e6, 0.0, -1.0e6], [1.0e6, 5.0, 1.0e6]),
            id(2),
            false,
        );
        tree.construct();
        assert_eq!(tree.wide.len(), 2);
        assert!(tree.cells.is_empty());
        assert_eq!(tree.containing(9.0e5, 0.0, -9.0e5), BTreeSet::from([id(1), id(2)]));
    }

    #[test]
    fn construct_is_idempotent() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), false);
        tree.put(Volume::sphere([100.0, 5.0, 100.0], 20.0), id(2), false);
        tree.construct();
        let first = (
            tree.containing(5.0, 5.0, 5.0),
            tree.intersecting(&cube(-50.0, 200.0)),
        );
        tree.construct();
        let second = (
            tree.containing(5.0, 5.0, 5.0),
            tree.intersecting(&cube(-50.0, 200.0)),
        );
        assert_eq!(first, second);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn removal_hides_zone_immediately() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), false);
        tree.put(cube(0.0, 10.0), id(2), false);
        tree.construct();
        assert_eq!(tree.remove_zone(id(1)), 1);
        assert_eq!(tree.containing(5.0, 5.0, 5.0), BTreeSet::from([id(2)]));
        tree.construct();
        assert_eq!(tree.containing(5.0, 5.0, 5.0), BTreeSet::from([id(2)]));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn replace_zone_swaps_volumes() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), true);
        let moved = [cube(100.0, 110.0)];
        tree.replace_zone(id(1), &moved);
        tree.construct();
        assert!(tree.containing(5.0, 5.0, 5.0).is_empty());
        assert!(tree.containing(105.0, 105.0, 105.0).contains(&id(1)));
    }

    #[test]
    fn intersecting_finds_overlaps_only() {
        let mut tree = VolumeTree::default();
        tree.put(cube(0.0, 10.0), id(1), false);
        tree.put(cube(200.0, 210.0), id(2), false);
        tree.put(Volume::slab(50.0, 60.0), id(3), false);
        tree.construct();
        assert_eq!(tree.intersecting(&cube(5.0, 20.0)), BTreeSet::from([id(1)]));
        assert_eq!(
            tree.intersecting(&Volume::slab(0.0, 300.0)),
            BTreeSet::from([id(1), id(2), id(3)])
        );
        assert_eq!(
            tree.intersecting(&Volume::cuboid([500.0, 55.0, 500.0], [510.0, 58.0, 510.0])),
            BTreeSet::from([id(3)])
        );
    }

    #[test]
    fn invalid_volumes_never_enter() {
        let mut tree = VolumeTree::default();
        assert!(!tree.put(Volume::sphere([0.0, 0.0, 0.0], -1.0), id(1), true));
        assert!(tree.is_empty());
        assert!(tree.intersecting(&Volume::slab(3.0, 3.0)).is_empty());
    }
}
