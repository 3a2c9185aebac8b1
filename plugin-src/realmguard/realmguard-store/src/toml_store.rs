use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use realmguard_core::{DomainRecord, HostRecord, Snapshot, StoreError, ZoneRecord, ZoneStore};
use serde::Serialize;
use serde::de::DeserializeOwned;

const GLOBAL_FILE: &str = "global.toml";
const DOMAINS_DIR: &str = "domains";

/// Zones stored as TOML under a root directory:
///
/// ```text
/// <root>/global.toml
/// <root>/domains/<domain>.toml
/// ```
///
/// A `:` in a domain name is written as `+` in its file name (`minecraft:the_nether` becomes
/// `minecraft+the_nether.toml`), which keeps the mapping one-to-one.
///
/// Every write goes to a temporary file that is then renamed over the target, so a crash never
/// leaves a half-written file behind.
#[derive(Debug)]
pub struct TomlStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on domain files.
    write_lock: Mutex<()>,
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    toml::from_str(&text)
        .map(Some)
        .map_err(|e| StoreError::Decode {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

fn write_toml<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), StoreError> {
    let text = toml::to_string(value).map_err(|e| StoreError::Encode {
        what: what.to_owned(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Domain names become file names; refuse anything that could escape the directory.
fn check_domain(domain: &str) -> Result<(), StoreError> {
    let ok = !domain.is_empty()
        && !domain.starts_with('.')
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::Encode {
            what: format!("domain '{domain}'"),
            message: "name cannot be used as a file name".to_owned(),
        })
    }
}

impl TomlStore {
    /// Store rooted at `root`. Directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn domain_path(&self, domain: &str) -> PathBuf {
        self.root
            .join(DOMAINS_DIR)
            .join(format!("{}.toml", domain.replace(':', "+")))
    }

    /// Read a domain file, refusing one whose recorded name does not match its path.
    fn read_domain(&self, path: &Path) -> Result<Option<DomainRecord>, StoreError> {
        let Some(record) = read_toml::<DomainRecord>(path)? else {
            return Ok(None);
        };
        if check_domain(&record.name).is_err() || self.domain_path(&record.name) != path {
            return Err(StoreError::Decode {
                path: path.display().to_string(),
                message: format!("file holds domain '{}'", record.name),
            });
        }
        Ok(Some(record))
    }

    fn load_domain(&self, domain: &str) -> Result<DomainRecord, StoreError> {
        Ok(self
            .read_domain(&self.domain_path(domain))?
            .unwrap_or_else(|| DomainRecord::new(domain)))
    }
}

impl ZoneStore for TomlStore {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let global: HostRecord = read_toml(&self.root.join(GLOBAL_FILE))?.unwrap_or_default();

        let dir = self.root.join(DOMAINS_DIR);
        let mut paths = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    paths.push(path);
                }
            }
        }
        paths.sort();

        let mut domains = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(domain) = self.read_domain(&path)? {
                domains.push(domain);
            }
        }
        log::info!(
            "realmguard: Loaded {} domain file(s) from {}",
            domains.len(),
            self.root.display()
        );
        Ok(Snapshot { global, domains })
    }

    fn save_global(&self, global: &HostRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        write_toml(&self.root.join(GLOBAL_FILE), global, "global settings")
    }

    fn save_zone(&self, domain: &str, zone: &ZoneRecord) -> Result<(), StoreError> {
        check_domain(domain)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut record = self.load_domain(domain)?;
        record.upsert(zone.clone());
        write_toml(&self.domain_path(domain), &record, domain)?;
        log::debug!("realmguard: Saved zone '{}' of '{domain}'", zone.name);
        Ok(())
    }

    fn delete_zone(&self, domain: &str, zone: &str) -> Result<(), StoreError> {
        check_domain(domain)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.domain_path(domain);
        let mut record = self.load_domain(domain)?;
        if !record.remove(zone) {
            return Ok(());
        }
        if record.zones.is_empty() {
            fs::remove_file(&path)?;
        } else {
            write_toml(&path, &record, domain)?;
        }
        log::debug!("realmguard: Deleted zone '{zone}' of '{domain}'");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names_must_be_file_safe() {
        assert!(check_domain("overworld").is_ok());
        assert!(check_domain("minecraft:the_nether").is_ok());
        assert!(check_domain("../etc").is_err());
        assert!(check_domain("a/b").is_err());
        assert!(check_domain("").is_err());
    }

    #[test]
    fn namespaced_domains_map_to_plain_files() {
        let store = TomlStore::new("/data/realmguard");
        assert_eq!(
            store.domain_path("minecraft:overworld"),
            Path::new("/data/realmguard/domains/minecraft+overworld.toml")
        );
        assert_ne!(store.domain_path("a:b"), store.domain_path("a_b"));
    }
}
