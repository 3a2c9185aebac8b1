//! Shared types for RealmGuard crates.
//!
//! No server, geometry or storage dependencies — safe to use from any crate, including the
//! event and command layers that talk to the game server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identity of a player.
pub type PlayerId = Uuid;

/// Permission checked to decide whether a player ignores restrictive settings.
pub const DEFAULT_UNRESTRICTED_PERMISSION: &str = "realmguard.unrestricted";

/// A point inside a named world (domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub domain: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    #[must_use]
    pub fn new(domain: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            domain: domain.into(),
            x,
            y,
            z,
        }
    }
}

/// Opaque permission lookup provided by the game server.
pub trait PermissionOracle: Send + Sync {
    fn has_permission(&self, player: PlayerId, permission: &str) -> bool;
}

/// Oracle that grants nothing. Useful for consoles and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl PermissionOracle for DenyAll {
    fn has_permission(&self, _player: PlayerId, _permission: &str) -> bool {
        false
    }
}

/// The player a setting is being resolved for.
///
/// `unrestricted` is computed once per query (usually through [`Subject::resolve`]) so that
/// target filtering never calls back into the permission system per host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: PlayerId,
    pub unrestricted: bool,
    /// Permission groups the player belongs to.
    pub groups: BTreeSet<String>,
}

impl Subject {
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            unrestricted: false,
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_unrestricted(mut self, unrestricted: bool) -> Self {
        self.unrestricted = unrestricted;
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// Build a subject, asking `oracle` whether the player holds `unrestricted_permission`.
    #[must_use]
    pub fn resolve<I, S>(
        id: PlayerId,
        groups: I,
        oracle: &dyn PermissionOracle,
        unrestricted_permission: &str,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            unrestricted: oracle.has_permission(id, unrestricted_permission),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
