//! Setting keys, values and the process-wide registry.
//!
//! Code refers to settings through typed [`Setting<T>`] handles (usually the constants in
//! [`builtin`]). Hosts store erased [`SettingValue`]s keyed by id, and the registry maps ids back
//! to an erased [`SettingKey`] for persistence and lookups by name.

pub mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::SettingError;
use crate::flags::{Flag, FlagBits, FlagSet};

/// How the values of several hosts combine into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinePolicy {
    /// Highest priority applicable host wins.
    Override,
    /// Flag decisions are layered from highest to lowest priority.
    Union,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Text,
    Flags,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "boolean"),
            Self::Int => write!(f, "integer"),
            Self::Text => write!(f, "text"),
            Self::Flags => write!(f, "flag set"),
        }
    }
}

/// A configured value, as stored on a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Flags(FlagBits),
}

impl SettingValue {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Text(_) => ValueKind::Text,
            Self::Flags(_) => ValueKind::Flags,
        }
    }
}

/// Rust types a setting can hold.
pub trait SettingType: Clone + Send + Sync + 'static {
    const KIND: ValueKind;
    const POLICY: CombinePolicy = CombinePolicy::Override;
    /// Flag names for flag set settings, empty otherwise.
    const FLAG_NAMES: &'static [&'static str] = &[];

    fn into_value(self) -> SettingValue;
    fn from_value(value: &SettingValue) -> Option<Self>;
}

impl SettingType for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn into_value(self) -> SettingValue {
        SettingValue::Bool(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl SettingType for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn into_value(self) -> SettingValue {
        SettingValue::Int(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl SettingType for String {
    const KIND: ValueKind = ValueKind::Text;

    fn into_value(self) -> SettingValue {
        SettingValue::Text(self)
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl<E: Flag> SettingType for FlagSet<E> {
    const KIND: ValueKind = ValueKind::Flags;
    const POLICY: CombinePolicy = CombinePolicy::Union;
    const FLAG_NAMES: &'static [&'static str] = E::NAMES;

    fn into_value(self) -> SettingValue {
        SettingValue::Flags(self.bits())
    }

    fn from_value(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Flags(bits) => Some(Self::from_bits(*bits)),
            _ => None,
        }
    }
}

/// Typed handle to a setting.
pub struct Setting<T: SettingType> {
    id: &'static str,
    player_restrictive: bool,
    default: fn() -> T,
    _value: PhantomData<fn() -> T>,
}

impl<T: SettingType> Setting<T> {
    /// A player-restrictive setting: targets on hosts decide which players a value applies to.
    #[must_use]
    pub const fn new(id: &'static str, default: fn() -> T) -> Self {
        Self {
            id,
            player_restrictive: true,
            default,
            _value: PhantomData,
        }
    }

    /// Mark the setting as applying to the world rather than to players; targets are ignored.
    #[must_use]
    pub const fn world_wide(mut self) -> Self {
        self.player_restrictive = false;
        self
    }

    #[must_use]
    pub const fn id(&self) -> &'static str {
        self.id
    }

    #[must_use]
    pub const fn is_player_restrictive(&self) -> bool {
        self.player_restrictive
    }

    #[must_use]
    pub fn default_value(&self) -> T {
        (self.default)()
    }

    /// Erased registry entry for this setting.
    #[must_use]
    pub fn key(&self) -> SettingKey {
        SettingKey {
            id: self.id,
            kind: T::KIND,
            policy: T::POLICY,
            player_restrictive: self.player_restrictive,
            default: self.default_value().into_value(),
            flag_names: T::FLAG_NAMES,
        }
    }
}

impl<T: SettingType> Clone for Setting<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: SettingType> Copy for Setting<T> {}

impl<T: SettingType> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("id", &self.id)
            .field("kind", &T::KIND)
            .finish()
    }
}

/// Erased, immutable registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingKey {
    id: &'static str,
    kind: ValueKind,
    policy: CombinePolicy,
    player_restrictive: bool,
    default: SettingValue,
    flag_names: &'static [&'static str],
}

impl SettingKey {
    #[must_use]
    pub const fn id(&self) -> &'static str {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    #[must_use]
    pub const fn policy(&self) -> CombinePolicy {
        self.policy
    }

    #[must_use]
    pub const fn is_player_restrictive(&self) -> bool {
        self.player_restrictive
    }

    #[must_use]
    pub const fn default_value(&self) -> &SettingValue {
        &self.default
    }

    #[must_use]
    pub const fn flag_names(&self) -> &'static [&'static str] {
        self.flag_names
    }

    /// Fail unless `value` has this key's kind.
    pub fn check(&self, value: &SettingValue) -> Result<(), SettingError> {
        if value.kind() == self.kind {
            Ok(())
        } else {
            Err(SettingError::KindMismatch {
                id: self.id.to_owned(),
                expected: self.kind,
                found: value.kind(),
            })
        }
    }

    /// Persisted form of a value; flags are written by name.
    #[must_use]
    pub fn encode(&self, value: &SettingValue) -> StoredValue {
        match value {
            SettingValue::Bool(b) => StoredValue::Bool(*b),
            SettingValue::Int(i) => StoredValue::Int(*i),
            SettingValue::Text(s) => StoredValue::Text(s.clone()),
            SettingValue::Flags(bits) => {
                let names = |mask: u64| {
                    self.flag_names
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, n)| (*n).to_owned())
                        .collect()
                };
                StoredValue::Flags(StoredFlags {
                    allow: names(bits.allow),
                    deny: names(bits.deny),
                })
            }
        }
    }

    pub fn decode(&self, stored: &StoredValue) -> Result<SettingValue, SettingError> {
        let value = match stored {
            StoredValue::Bool(b) => SettingValue::Bool(*b),
            StoredValue::Int(i) => SettingValue::Int(*i),
            StoredValue::Text(s) => SettingValue::Text(s.clone()),
            StoredValue::Flags(flags) => {
                let mask = |names: &[String]| -> Result<u64, SettingError> {
                    names.iter().try_fold(0u64, |acc, name| {
                        let index = self
                            .flag_names
                            .iter()
                            .position(|n| n == name)
                            .ok_or_else(|| SettingError::UnknownFlag {
                                id: self.id.to_owned(),
                                flag: name.clone(),
                            })?;
                        Ok(acc | 1 << index)
                    })
                };
                let deny = mask(&flags.deny)?;
                SettingValue::Flags(FlagBits {
                    allow: mask(&flags.allow)? & !deny,
                    deny,
                })
            }
        };
        self.check(&value)?;
        Ok(value)
    }
}

/// On-disk representation of a setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Flags(StoredFlags),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredFlags {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<String>,
}

/// Lowercase kebab-case: `can-build`, `mob-spawning`.
fn is_kebab_case(id: &str) -> bool {
    !id.is_empty()
        && !id.starts_with('-')
        && !id.ends_with('-')
        && !id.contains("--")
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Every setting the server knows about. Filled at start-up, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SettingRegistry {
    keys: BTreeMap<&'static str, SettingKey>,
}

impl SettingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every [`builtin`] setting.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    pub fn register<T: SettingType>(&mut self, setting: &Setting<T>) -> Result<(), SettingError> {
        self.register_key(setting.key())
    }

    pub fn register_key(&mut self, key: SettingKey) -> Result<(), SettingError> {
        if !is_kebab_case(key.id) {
            return Err(SettingError::InvalidId(key.id.to_owned()));
        }
        if self.keys.contains_key(key.id) {
            return Err(SettingError::Duplicate(key.id.to_owned()));
        }
        log::debug!("realmguard: Registered setting '{}' ({})", key.id, key.kind);
        self.keys.insert(key.id, key);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&SettingKey, SettingError> {
        self.keys
            .get(id)
            .ok_or_else(|| SettingError::Unregistered(id.to_owned()))
    }

    /// Fail unless `setting` is registered with a matching kind. Call when wiring listeners.
    pub fn require<T: SettingType>(&self, setting: &Setting<T>) -> Result<(), SettingError> {
        let key = self.get(setting.id)?;
        if key.kind == T::KIND {
            Ok(())
        } else {
            Err(SettingError::KindMismatch {
                id: setting.id.to_owned(),
                expected: key.kind,
                found: T::KIND,
            })
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettingKey> {
        self.keys.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::builtin::{self, Movement};
    use super::*;

    #[test]
    fn kebab_case_ids() {
        assert!(is_kebab_case("can-build"));
        assert!(is_kebab_case("pvp"));
        assert!(is_kebab_case("tier-2"));
        assert!(!is_kebab_case("CanBuild"));
        assert!(!is_kebab_case("can_build"));
        assert!(!is_kebab_case("-build"));
        assert!(!is_kebab_case("can--build"));
        assert!(!is_kebab_case(""));
    }

    #[test]
    fn duplicate_and_invalid_registration() {
        let mut registry = SettingRegistry::new();
        registry.register(&builtin::BUILD).unwrap();
        assert_eq!(
            registry.register(&builtin::BUILD),
            Err(SettingError::Duplicate("can-build".to_owned()))
        );
        let bad: Setting<bool> = Setting::new("Bad_Id", || false);
        assert_eq!(
            registry.register(&bad),
            Err(SettingError::InvalidId("Bad_Id".to_owned()))
        );
    }

    #[test]
    fn require_checks_kind() {
        let registry = SettingRegistry::with_builtin();
        assert!(registry.require(&builtin::BUILD).is_ok());
        let wrong: Setting<i64> = Setting::new("can-build", || 0);
        assert!(matches!(
            registry.require(&wrong),
            Err(SettingError::KindMismatch { .. })
        ));
        let unknown: Setting<bool> = Setting::new("can-fish", || true);
        assert_eq!(
            registry.require(&unknown),
            Err(SettingError::Unregistered("can-fish".to_owned()))
        );
    }

    #[test]
    fn policy_follows_value_type() {
        assert_eq!(builtin::BUILD.key().policy(), CombinePolicy::Override);
        assert_eq!(builtin::MOVEMENT.key().policy(), CombinePolicy::Union);
        assert!(!builtin::EXPLODE.is_player_restrictive());
    }

    #[test]
    fn flags_encode_by_name() {
        let key = builtin::MOVEMENT.key();
        let value = FlagSet::new()
            .with(Movement::Walk)
            .without(Movement::Fly)
            .into_value();
        let stored = key.encode(&value);
        assert_eq!(
            stored,
            StoredValue::Flags(StoredFlags {
                allow: vec!["walk".to_owned()],
                deny: vec!["fly".to_owned()],
            })
        );
        assert_eq!(key.decode(&stored).unwrap(), value);
    }

    #[test]
    fn decode_rejects_wrong_kind_and_unknown_flag() {
        let key = builtin::BUILD.key();
        assert!(matches!(
            key.decode(&StoredValue::Int(3)),
            Err(SettingError::KindMismatch { .. })
        ));
        let movement = builtin::MOVEMENT.key();
        let stored = StoredValue::Flags(StoredFlags {
            allow: vec!["teleport".to_owned(), "warp".to_owned()],
            deny: Vec::new(),
        });
        assert_eq!(
            movement.decode(&stored),
            Err(SettingError::UnknownFlag {
                id: "movement".to_owned(),
                flag: "warp".to_owned(),
            })
        );
    }

    #[test]
    fn stored_values_parse_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            settings: BTreeMap<String, StoredValue>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [settings]
            can-build = false
            entry-fee = 25
            greeting = "Welcome"
            movement = { allow = ["walk"], deny = ["fly"] }
            "#,
        )
        .unwrap();
        assert_eq!(doc.settings["can-build"], StoredValue::Bool(false));
        assert_eq!(doc.settings["entry-fee"], StoredValue::Int(25));
        assert_eq!(doc.settings["greeting"], StoredValue::Text("Welcome".to_owned()));
        assert!(matches!(doc.settings["movement"], StoredValue::Flags(_)));
    }
}
