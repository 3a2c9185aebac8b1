//! Error types for every fallible RealmGuard operation.

use thiserror::Error;

use crate::setting::ValueKind;

/// A volume that cannot be stored in a zone.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("volume has a non-finite coordinate")]
    NonFinite,
    #[error("volume is degenerate: {0}")]
    Degenerate(&'static str),
    #[error("volume lies entirely outside the world")]
    OutsideWorld,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneError {
    #[error("zone '{0}' already exists")]
    DuplicateName(String),
    #[error("zone '{0}' not found")]
    UnknownZone(String),
    #[error("zone name '{0}' is not allowed")]
    InvalidName(String),
    #[error("volume index {index} is out of bounds (zone has {len} volumes)")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("a zone needs at least one volume")]
    NoVolumes,
    #[error(transparent)]
    InvalidVolume(#[from] GeometryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("setting '{0}' is not registered")]
    Unregistered(String),
    #[error("setting '{0}' is registered twice")]
    Duplicate(String),
    #[error("setting id '{0}' must be lowercase kebab-case")]
    InvalidId(String),
    #[error("setting '{id}' holds {expected} values, got {found}")]
    KindMismatch {
        id: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("setting '{id}' has no flag named '{flag}'")]
    UnknownFlag { id: String, flag: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("set both positions first")]
    Incomplete,
    #[error(transparent)]
    InvalidVolume(#[from] GeometryError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure reported by a [`ZoneStore`](crate::record::ZoneStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },
    #[error("failed to encode {what}: {message}")]
    Encode { what: String, message: String },
}

/// Errors surfaced by [`Realms`](crate::Realms) level operations.
#[derive(Debug, Error)]
pub enum RealmError {
    #[error("zone '{zone}' in domain '{domain}': {source}")]
    Zone {
        domain: String,
        zone: String,
        #[source]
        source: ZoneError,
    },
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
