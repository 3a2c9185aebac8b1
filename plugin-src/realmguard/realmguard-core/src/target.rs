//! Per-(host, setting) filters over which players a value applies to.

use realmguard_types::{PlayerId, Subject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    /// Only listed players and groups are affected.
    Whitelist,
    /// Everyone except listed players and groups is affected.
    #[default]
    Blacklist,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub mode: TargetMode,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub players: BTreeSet<PlayerId>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
    /// Apply even to players holding the unrestricted permission.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub indiscriminate: bool,
}

impl Target {
    /// Matches every player: an empty blacklist.
    #[must_use]
    pub fn everyone() -> Self {
        Self::default()
    }

    /// Matches nobody until players or groups are added.
    #[must_use]
    pub fn nobody() -> Self {
        Self {
            mode: TargetMode::Whitelist,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_player(mut self, player: PlayerId) -> Self {
        self.players.insert(player);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    #[must_use]
    pub const fn indiscriminate(mut self, indiscriminate: bool) -> Self {
        self.indiscriminate = indiscriminate;
        self
    }

    /// Whether the subject is listed by id or by one of its groups.
    #[must_use]
    pub fn lists(&self, subject: &Subject) -> bool {
        self.players.contains(&subject.id) || subject.groups.iter().any(|g| self.groups.contains(g))
    }

    /// Whether the host's value applies to `subject`.
    ///
    /// Unrestricted players are never targeted unless the target is indiscriminate.
    #[must_use]
    pub fn is_targeted(&self, subject: &Subject) -> bool {
        if subject.unrestricted && !self.indiscriminate {
            return false;
        }
        match self.mode {
            TargetMode::Whitelist => self.lists(subject),
            TargetMode::Blacklist => !self.lists(subject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn whitelist_targets_only_listed_player() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let target = Target::nobody().with_player(x);
        assert!(target.is_targeted(&Subject::new(x)));
        assert!(!target.is_targeted(&Subject::new(y)));
    }

    #[test]
    fn blacklist_excludes_listed_group() {
        let target = Target::everyone().with_group("builders");
        let builder = Subject::new(Uuid::new_v4()).with_group("builders");
        let visitor = Subject::new(Uuid::new_v4()).with_group("visitors");
        assert!(!target.is_targeted(&builder));
        assert!(target.is_targeted(&visitor));
    }

    #[test]
    fn unrestricted_bypass_unless_indiscriminate() {
        let admin = Subject::new(Uuid::new_v4()).with_unrestricted(true);
        let target = Target::everyone();
        assert!(!target.is_targeted(&admin));
        assert!(target.clone().indiscriminate(true).is_targeted(&admin));
        // Indiscriminate still honours the lists.
        let listed = Target::nobody().indiscriminate(true);
        assert!(!listed.is_targeted(&admin));
        assert!(listed.with_player(admin.id).is_targeted(&admin));
    }

    #[test]
    fn serializes_compactly() {
        let target = Target::everyone();
        assert_eq!(toml::to_string(&target).unwrap().trim(), r#"mode = "blacklist""#);
    }
}
