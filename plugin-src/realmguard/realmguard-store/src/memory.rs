use std::sync::{Mutex, PoisonError};

use realmguard_core::{DomainRecord, HostRecord, Snapshot, StoreError, ZoneRecord, ZoneStore};

/// Keeps everything in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Copy of what is currently stored.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn edit<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        f(&mut self.snapshot.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ZoneStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.snapshot())
    }

    fn save_global(&self, global: &HostRecord) -> Result<(), StoreError> {
        self.edit(|snapshot| snapshot.global = global.clone());
        Ok(())
    }

    fn save_zone(&self, domain: &str, zone: &ZoneRecord) -> Result<(), StoreError> {
        self.edit(|snapshot| {
            match snapshot.domains.iter_mut().find(|d| d.name == domain) {
                Some(record) => record.upsert(zone.clone()),
                None => {
                    let mut record = DomainRecord::new(domain);
                    record.upsert(zone.clone());
                    snapshot.domains.push(record);
                }
            }
        });
        Ok(())
    }

    fn delete_zone(&self, domain: &str, zone: &str) -> Result<(), StoreError> {
        self.edit(|snapshot| {
            if let Some(record) = snapshot.domains.iter_mut().find(|d| d.name == domain) {
                record.remove(zone);
            }
            snapshot.domains.retain(|d| !d.zones.is_empty());
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmguard_core::Volume;

    fn zone(name: &str) -> ZoneRecord {
        ZoneRecord {
            name: name.to_owned(),
            sequence: 0,
            priority: 0,
            volumes: vec![Volume::slab(0.0, 1.0)],
            settings: Default::default(),
            targets: Default::default(),
        }
    }

    #[test]
    fn save_and_delete_zones() {
        let store = MemoryStore::new();
        store.save_zone("overworld", &zone("a")).unwrap();
        store.save_zone("overworld", &zone("b")).unwrap();
        store.save_zone("nether", &zone("a")).unwrap();
        assert_eq!(store.load().unwrap().domains.len(), 2);

        store.delete_zone("nether", "a").unwrap();
        store.delete_zone("nether", "missing").unwrap();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.domains.len(), 1);
        assert_eq!(snapshot.domains[0].zones.len(), 2);
    }
}
