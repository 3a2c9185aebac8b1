//! Persistence adapters for RealmGuard.
//!
//! - **[`TomlStore`]** — one `global.toml` plus one `domains/<name>.toml` per world
//! - **[`MemoryStore`]** — keeps the snapshot in memory, for tests and ephemeral servers
//!
//! Both implement [`ZoneStore`]. Typical use: [`load_into`] once on boot, then save the touched
//! zone (or the global host) after every mutation.

mod memory;
mod toml_store;

pub use memory::MemoryStore;
pub use toml_store::TomlStore;

use realmguard_core::{RealmError, Realms, StoreError, Zone, ZoneStore};

/// Load everything from `store` into `realms`.
pub fn load_into(store: &dyn ZoneStore, realms: &Realms) -> Result<(), RealmError> {
    let snapshot = store.load()?;
    realms.restore(&snapshot)
}

/// Persist one zone's current state.
pub fn save_zone(store: &dyn ZoneStore, realms: &Realms, zone: &Zone) -> Result<(), StoreError> {
    store.save_zone(zone.domain(), &realms.zone_record(zone))
}

/// Persist the global host's current state.
pub fn save_global(store: &dyn ZoneStore, realms: &Realms) -> Result<(), StoreError> {
    store.save_global(&realms.global_record())
}

/// Write every domain and the global host. Zones the store still holds but `realms` no longer
/// has are deleted, so the store ends up matching memory.
pub fn save_all(store: &dyn ZoneStore, realms: &Realms) -> Result<(), StoreError> {
    let snapshot = realms.snapshot();
    let stored = store.load()?;
    store.save_global(&snapshot.global)?;

    let mut pruned = 0;
    for old in &stored.domains {
        let live = snapshot.domains.iter().find(|d| d.name == old.name);
        for zone in &old.zones {
            if !live.is_some_and(|d| d.zones.iter().any(|z| z.name == zone.name)) {
                store.delete_zone(&old.name, &zone.name)?;
                pruned += 1;
            }
        }
    }
    for domain in &snapshot.domains {
        for zone in &domain.zones {
            store.save_zone(&domain.name, zone)?;
        }
    }
    log::info!(
        "realmguard: Saved {} domain(s), pruned {pruned} stale zone(s)",
        snapshot.domains.len()
    );
    Ok(())
}
