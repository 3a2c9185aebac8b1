//! Settings shipped with RealmGuard.

use super::{Setting, SettingRegistry};
use crate::flags::FlagSet;

crate::define_flags! {
    /// Ways a player may move through a zone.
    pub enum Movement {
        Walk = "walk",
        Sprint = "sprint",
        Sneak = "sneak",
        Swim = "swim",
        Fly = "fly",
        Glide = "glide",
        Teleport = "teleport",
    }
}

crate::define_flags! {
    /// Mob categories allowed to spawn naturally.
    pub enum SpawnCategory {
        Monster = "monster",
        Creature = "creature",
        Ambient = "ambient",
        Water = "water",
    }
}

pub const BUILD: Setting<bool> = Setting::new("can-build", || true);
pub const BREAK: Setting<bool> = Setting::new("can-break", || true);
pub const INTERACT: Setting<bool> = Setting::new("can-interact", || true);
pub const EXPLODE: Setting<bool> = Setting::new("can-explode", || true).world_wide();
pub const PVP: Setting<bool> = Setting::new("pvp", || true);
/// Shown to players entering a zone. Empty means silent.
pub const GREETING: Setting<String> = Setting::new("greeting", String::new);
/// Currency charged on entry.
pub const ENTRY_FEE: Setting<i64> = Setting::new("entry-fee", || 0);
pub const MOVEMENT: Setting<FlagSet<Movement>> = Setting::new("movement", FlagSet::all);
pub const MOB_SPAWNING: Setting<FlagSet<SpawnCategory>> =
    Setting::new("mob-spawning", FlagSet::all).world_wide();

/// Register every built-in setting. Built-in ids are distinct and valid, so this cannot fail
/// on a fresh registry; already registered ids are skipped.
pub fn register_all(registry: &mut SettingRegistry) {
    let keys = [
        BUILD.key(),
        BREAK.key(),
        INTERACT.key(),
        EXPLODE.key(),
        PVP.key(),
        GREETING.key(),
        ENTRY_FEE.key(),
        MOVEMENT.key(),
        MOB_SPAWNING.key(),
    ];
    for key in keys {
        if registry.contains(key.id()) {
            continue;
        }
        if let Err(e) = registry.register_key(key) {
            log::error!("realmguard: Built-in setting rejected: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::Flag;

    #[test]
    fn registers_every_builtin_once() {
        let mut registry = SettingRegistry::new();
        register_all(&mut registry);
        assert_eq!(registry.len(), 9);
        register_all(&mut registry);
        assert_eq!(registry.len(), 9);
        assert!(registry.contains("mob-spawning"));
    }

    #[test]
    fn movement_defaults_to_everything() {
        let all = MOVEMENT.default_value();
        assert_eq!(all.iter().count(), Movement::VARIANTS.len());
        assert!(all.contains(Movement::Teleport));
    }
}
