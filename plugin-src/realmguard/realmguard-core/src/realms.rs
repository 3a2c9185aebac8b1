//! The shared RealmGuard context: config, setting registry, the global host and every domain.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use realmguard_types::{Location, PermissionOracle, PlayerId, Subject};

use crate::config::RealmConfig;
use crate::domain::{Domain, check_name};
use crate::error::{RealmError, SettingError, ZoneError};
use crate::evaluator::Evaluator;
use crate::host::{Global, HostSettings, Zone};
use crate::record::{DomainRecord, HostRecord, Snapshot, ZoneRecord};
use crate::setting::{Setting, SettingRegistry, SettingType, SettingValue, StoredValue};
use crate::sync::{read, write};
use crate::target::Target;

/// Everything RealmGuard knows at runtime. Share it behind an `Arc`.
#[derive(Debug)]
pub struct Realms {
    config: RealmConfig,
    registry: SettingRegistry,
    global: Global,
    domains: RwLock<BTreeMap<String, Arc<Domain>>>,
}

type DecodedHost = (Vec<(String, SettingValue)>, Vec<(String, Target)>);

impl Realms {
    /// Build an empty context. The registry is frozen from here on.
    #[must_use]
    pub fn new(config: RealmConfig, registry: SettingRegistry) -> Self {
        log::info!(
            "realmguard: Starting with {} registered setting(s)",
            registry.len()
        );
        Self {
            config,
            registry,
            global: Global::new(),
            domains: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RealmConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &SettingRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn global(&self) -> &Global {
        &self.global
    }

    #[must_use]
    pub fn domain(&self, name: &str) -> Option<Arc<Domain>> {
        read(&self.domains).get(name).cloned()
    }

    /// The domain called `name`, created empty on first use (e.g. when a world loads).
    pub fn domain_or_create(&self, name: &str) -> Arc<Domain> {
        if let Some(domain) = self.domain(name) {
            return domain;
        }
        let mut domains = write(&self.domains);
        Arc::clone(domains.entry(name.to_owned()).or_insert_with(|| {
            log::info!("realmguard: Registered domain '{name}'");
            Arc::new(Domain::new(name, self.config.world, &self.config.index))
        }))
    }

    /// Every domain, sorted by name.
    #[must_use]
    pub fn domains(&self) -> Vec<Arc<Domain>> {
        read(&self.domains).values().cloned().collect()
    }

    #[must_use]
    pub const fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self)
    }

    /// Shorthand for [`Evaluator::value`].
    #[must_use]
    pub fn value<T: SettingType>(
        &self,
        location: &Location,
        setting: &Setting<T>,
        subject: Option<&Subject>,
    ) -> T {
        self.evaluator().value(location, setting, subject)
    }

    /// Subject for `player`, using the configured unrestricted permission.
    #[must_use]
    pub fn subject<I, S>(&self, player: PlayerId, groups: I, oracle: &dyn PermissionOracle) -> Subject
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Subject::resolve(player, groups, oracle, &self.config.permissions.unrestricted)
    }

    fn decode_host(
        &self,
        settings: &BTreeMap<String, StoredValue>,
        targets: &BTreeMap<String, Target>,
    ) -> Result<DecodedHost, SettingError> {
        let values = settings
            .iter()
            .map(|(id, stored)| {
                let key = self.registry.get(id)?;
                Ok((id.clone(), key.decode(stored)?))
            })
            .collect::<Result<Vec<_>, SettingError>>()?;
        let targets = targets
            .iter()
            .map(|(id, target)| {
                self.registry.get(id)?;
                Ok((id.clone(), target.clone()))
            })
            .collect::<Result<Vec<_>, SettingError>>()?;
        Ok((values, targets))
    }

    /// Names, sequences and volumes of persisted zones, checked against each other and against
    /// zones already loaded into the domain.
    fn check_zones(&self, domain: &DomainRecord) -> Result<(), RealmError> {
        let mut names = HashSet::new();
        let mut sequences = HashSet::new();
        if let Some(existing) = self.domain(&domain.name) {
            for zone in existing.zones() {
                names.insert(zone.name().to_owned());
                sequences.insert(zone.id().sequence());
            }
        }
        for zone in &domain.zones {
            let fail = |source: ZoneError| RealmError::Zone {
                domain: domain.name.clone(),
                zone: zone.name.clone(),
                source,
            };
            check_name(&zone.name).map_err(fail)?;
            if !names.insert(zone.name.clone()) || !sequences.insert(zone.sequence) {
                return Err(fail(ZoneError::DuplicateName(zone.name.clone())));
            }
            for volume in &zone.volumes {
                volume
                    .validate(&self.config.world)
                    .map_err(|e| fail(e.into()))?;
            }
        }
        Ok(())
    }

    /// Load persisted state. Stored settings and zone structure are both checked before
    /// anything is applied, so a rejected snapshot leaves the context untouched. Each domain's
    /// tree is built once.
    pub fn restore(&self, snapshot: &Snapshot) -> Result<(), RealmError> {
        let (global_values, global_targets) =
            self.decode_host(&snapshot.global.settings, &snapshot.global.targets)?;
        let mut domains = Vec::with_capacity(snapshot.domains.len());
        for domain in &snapshot.domains {
            self.check_zones(domain)?;
            let zones = domain
                .zones
                .iter()
                .map(|zone| Ok((zone, self.decode_host(&zone.settings, &zone.targets)?)))
                .collect::<Result<Vec<_>, SettingError>>()?;
            domains.push((domain.name.as_str(), zones));
        }

        self.global.settings().restore(global_values, global_targets);
        let mut restored = 0;
        for (name, zones) in domains {
            let domain = self.domain_or_create(name);
            let mut edit = domain.bulk_edit();
            for (record, (values, targets)) in zones {
                let zone = edit
                    .restore_zone(record.sequence, &record.name, record.priority, record.volumes.clone())
                    .map_err(|source| RealmError::Zone {
                        domain: name.to_owned(),
                        zone: record.name.clone(),
                        source,
                    })?;
                zone.settings().restore(values, targets);
                restored += 1;
            }
        }
        log::info!(
            "realmguard: Restored {restored} zone(s) across {} domain(s)",
            snapshot.domains.len()
        );
        Ok(())
    }

    fn host_settings_record(&self, settings: &HostSettings) -> HostRecord {
        let (values, targets) = settings.snapshot();
        let settings = values
            .iter()
            .filter_map(|(id, value)| match self.registry.get(id) {
                Ok(key) => Some((id.clone(), key.encode(value))),
                Err(e) => {
                    log::warn!("realmguard: Not saving '{id}': {e}");
                    None
                }
            })
            .collect();
        HostRecord { settings, targets }
    }

    #[must_use]
    pub fn global_record(&self) -> HostRecord {
        self.host_settings_record(self.global.settings())
    }

    #[must_use]
    pub fn zone_record(&self, zone: &Zone) -> ZoneRecord {
        let HostRecord { settings, targets } = self.host_settings_record(zone.settings());
        ZoneRecord {
            name: zone.name().to_owned(),
            sequence: zone.id().sequence(),
            priority: zone.priority(),
            volumes: zone.volumes(),
            settings,
            targets,
        }
    }

    /// Full persisted form of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let domains = self
            .domains()
            .iter()
            .map(|domain| DomainRecord {
                name: domain.name().to_owned(),
                zones: domain.zones().iter().map(|zone| self.zone_record(zone)).collect(),
            })
            .collect();
        Snapshot {
            global: self.global_record(),
            domains,
        }
    }
}
