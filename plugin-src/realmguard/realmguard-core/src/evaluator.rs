//! Resolves the effective value of a setting at a location.
//!
//! Candidate hosts are the zones containing the point plus [`Global`]. They are ordered by
//! priority (highest first, Global last, equal priorities by creation order) and then:
//!
//! * hosts without a value are skipped, and so are hosts whose target excludes the subject when
//!   the setting is player-restrictive;
//! * [`CombinePolicy::Override`] settings take the first remaining value;
//! * [`CombinePolicy::Union`] flag sets are layered top-down, each flag decided by the highest
//!   host that mentions it.
//!
//! Either way the setting default applies only when no host contributes.

use std::iter;
use std::sync::Arc;

use realmguard_types::{Location, Subject};

use crate::config::{ResolutionConfig, TieBreak};
use crate::error::SettingError;
use crate::flags::FlagBits;
use crate::host::{Global, HostRef, Zone};
use crate::realms::Realms;
use crate::setting::{CombinePolicy, Setting, SettingKey, SettingType, SettingValue, ValueKind};

/// Effective value together with the hosts that decided it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<T> {
    pub value: T,
    /// Names of deciding hosts, highest priority first. Empty when the default applied.
    pub sources: Vec<String>,
}

impl<T> Resolution<T> {
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Hosts applying at one location, in resolution order.
#[derive(Debug)]
pub struct Candidates<'a> {
    global: &'a Global,
    zones: Vec<Arc<Zone>>,
}

impl Candidates<'_> {
    /// Zones first, by priority, then Global.
    pub fn iter(&self) -> impl Iterator<Item = HostRef<'_>> {
        self.zones
            .iter()
            .map(|zone| HostRef::Zone(zone))
            .chain(iter::once(HostRef::Global(self.global)))
    }

    #[must_use]
    pub fn zones(&self) -> &[Arc<Zone>] {
        &self.zones
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.iter().map(|host| host.name().to_owned()).collect()
    }

    /// Number of hosts, Global included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len() + 1
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Erased description of what is being resolved.
struct Query<'q> {
    id: &'q str,
    kind: ValueKind,
    policy: CombinePolicy,
    player_restrictive: bool,
    default: SettingValue,
}

impl Query<'_> {
    fn typed<T: SettingType>(setting: &Setting<T>) -> Self {
        Query {
            id: setting.id(),
            kind: T::KIND,
            policy: T::POLICY,
            player_restrictive: setting.is_player_restrictive(),
            default: setting.default_value().into_value(),
        }
    }

    fn erased(key: &SettingKey) -> Self {
        Query {
            id: key.id(),
            kind: key.kind(),
            policy: key.policy(),
            player_restrictive: key.is_player_restrictive(),
            default: key.default_value().clone(),
        }
    }
}

/// Sort zones by priority, highest first. Priorities are read once so a concurrent
/// `set_priority` cannot break the sort.
fn order(zones: Vec<Arc<Zone>>, tie_break: TieBreak) -> Vec<Arc<Zone>> {
    let mut keyed: Vec<(i32, Arc<Zone>)> = zones.into_iter().map(|z| (z.priority(), z)).collect();
    keyed.sort_by(|(pa, a), (pb, b)| {
        pb.cmp(pa).then_with(|| match tie_break {
            TieBreak::OldestFirst => a.id().cmp(&b.id()),
            TieBreak::NewestFirst => b.id().cmp(&a.id()),
        })
    });
    keyed.into_iter().map(|(_, zone)| zone).collect()
}

fn combine<'h>(
    hosts: impl Iterator<Item = HostRef<'h>>,
    query: &Query<'_>,
    subject: Option<&Subject>,
    config: &ResolutionConfig,
) -> (SettingValue, Vec<String>) {
    let mut values = hosts.filter_map(|host| {
        let value = host
            .settings()
            .applicable(query.id, subject, query.player_restrictive)?;
        if value.kind() != query.kind {
            log::trace!(
                "realmguard: Skipping {} value of '{}' on '{}'",
                value.kind(),
                query.id,
                host.name()
            );
            return None;
        }
        Some((host.name(), value))
    });

    match query.policy {
        CombinePolicy::Override => match values.next() {
            Some((name, value)) => (value, vec![name.to_owned()]),
            None => (query.default.clone(), Vec::new()),
        },
        CombinePolicy::Union => {
            let layer = |bits: FlagBits| {
                if config.honour_denials {
                    bits
                } else {
                    bits.allowed_only()
                }
            };
            let mut acc = FlagBits::EMPTY;
            let mut applied = false;
            let mut sources = Vec::new();
            for (name, value) in values {
                let SettingValue::Flags(bits) = value else {
                    continue;
                };
                applied = true;
                let bits = layer(bits);
                if bits.decided() & !acc.decided() != 0 {
                    sources.push(name.to_owned());
                }
                acc = acc.layered_over(bits);
            }
            if applied {
                (SettingValue::Flags(acc), sources)
            } else {
                (query.default.clone(), Vec::new())
            }
        }
    }
}

/// Read-only view over a [`Realms`] answering setting queries.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    realms: &'a Realms,
}

impl<'a> Evaluator<'a> {
    #[must_use]
    pub const fn new(realms: &'a Realms) -> Self {
        Self { realms }
    }

    /// Hosts applying at `location`, in resolution order. An unknown domain yields Global only.
    #[must_use]
    pub fn hosts_at(&self, location: &Location) -> Candidates<'a> {
        let zones = self
            .realms
            .domain(&location.domain)
            .map(|domain| domain.containing(location.x, location.y, location.z))
            .unwrap_or_default();
        Candidates {
            global: self.realms.global(),
            zones: order(zones, self.realms.config().resolution.tie_break),
        }
    }

    /// Effective value of `setting` at `location`, for `subject` if given.
    #[must_use]
    pub fn value<T: SettingType>(
        &self,
        location: &Location,
        setting: &Setting<T>,
        subject: Option<&Subject>,
    ) -> T {
        self.explain(location, setting, subject).value
    }

    /// Like [`Evaluator::value`], also naming the deciding hosts.
    #[must_use]
    pub fn explain<T: SettingType>(
        &self,
        location: &Location,
        setting: &Setting<T>,
        subject: Option<&Subject>,
    ) -> Resolution<T> {
        let candidates = self.hosts_at(location);
        let (value, sources) = combine(
            candidates.iter(),
            &Query::typed(setting),
            subject,
            &self.realms.config().resolution,
        );
        log::trace!(
            "realmguard: '{}' at {}({}, {}, {}) decided by {sources:?}",
            setting.id(),
            location.domain,
            location.x,
            location.y,
            location.z
        );
        Resolution {
            value: T::from_value(&value).unwrap_or_else(|| setting.default_value()),
            sources,
        }
    }

    /// Server-wide value, consulting Global only.
    #[must_use]
    pub fn global_value<T: SettingType>(&self, setting: &Setting<T>, subject: Option<&Subject>) -> T {
        let (value, _) = combine(
            iter::once(HostRef::Global(self.realms.global())),
            &Query::typed(setting),
            subject,
            &self.realms.config().resolution,
        );
        T::from_value(&value).unwrap_or_else(|| setting.default_value())
    }

    /// Resolve a setting known only by id, e.g. from a command argument.
    pub fn evaluate_raw(
        &self,
        location: &Location,
        id: &str,
        subject: Option<&Subject>,
    ) -> Result<Resolution<SettingValue>, SettingError> {
        let key = self.realms.registry().get(id)?;
        let candidates = self.hosts_at(location);
        let (value, sources) = combine(
            candidates.iter(),
            &Query::erased(key),
            subject,
            &self.realms.config().resolution,
        );
        Ok(Resolution { value, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealmConfig;
    use crate::flags::FlagSet;
    use crate::geometry::Volume;
    use crate::host::ZoneId;
    use crate::setting::SettingRegistry;
    use crate::setting::builtin::{BUILD, ENTRY_FEE, MOVEMENT, Movement};
    use crate::target::Target;
    use uuid::Uuid;

    fn realms(config: RealmConfig) -> Realms {
        Realms::new(config, SettingRegistry::with_builtin())
    }

    fn cube(min: f64, max: f64) -> Volume {
        Volume::cuboid([min, min, min], [max, max, max])
    }

    fn at(x: f64) -> Location {
        Location::new("overworld", x, x, x)
    }

    #[test]
    fn default_when_nothing_is_set() {
        let realms = realms(RealmConfig::default());
        let eval = realms.evaluator();
        let resolution = eval.explain(&at(5.0), &BUILD, None);
        assert!(resolution.value);
        assert!(resolution.is_default());
        assert_eq!(eval.hosts_at(&at(5.0)).names(), ["__global__"]);
    }

    #[test]
    fn higher_priority_overrides() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let outer = domain.create_zone("outer", 1, vec![cube(0.0, 100.0)]).unwrap();
        let inner = domain.create_zone("inner", 5, vec![cube(10.0, 20.0)]).unwrap();
        realms.global().settings().set_value(&ENTRY_FEE, 1);
        outer.settings().set_value(&ENTRY_FEE, 2);
        inner.settings().set_value(&ENTRY_FEE, 3);

        let eval = realms.evaluator();
        assert_eq!(eval.value(&at(15.0), &ENTRY_FEE, None), 3);
        assert_eq!(eval.value(&at(50.0), &ENTRY_FEE, None), 2);
        assert_eq!(eval.value(&at(500.0), &ENTRY_FEE, None), 1);
        assert_eq!(eval.hosts_at(&at(15.0)).names(), ["inner", "outer", "__global__"]);

        inner.set_priority(0);
        assert_eq!(eval.value(&at(15.0), &ENTRY_FEE, None), 2);
    }

    #[test]
    fn tie_break_is_configurable() {
        let mut config = RealmConfig::default();
        for (tie_break, expected) in [(TieBreak::OldestFirst, 1), (TieBreak::NewestFirst, 2)] {
            config.resolution.tie_break = tie_break;
            let realms = realms(config.clone());
            let domain = realms.domain_or_create("overworld");
            let first = domain.create_zone("first", 0, vec![cube(0.0, 10.0)]).unwrap();
            let second = domain.create_zone("second", 0, vec![cube(0.0, 10.0)]).unwrap();
            first.settings().set_value(&ENTRY_FEE, 1);
            second.settings().set_value(&ENTRY_FEE, 2);
            assert_eq!(realms.evaluator().value(&at(5.0), &ENTRY_FEE, None), expected);
        }
    }

    #[test]
    fn union_layers_and_honours_denials() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let arena = domain.create_zone("arena", 10, vec![cube(0.0, 10.0)]).unwrap();
        let lobby = domain.create_zone("lobby", 1, vec![cube(0.0, 50.0)]).unwrap();
        realms
            .global()
            .settings()
            .set_value(&MOVEMENT, FlagSet::new().with(Movement::Walk));
        lobby
            .settings()
            .set_value(&MOVEMENT, FlagSet::new().with(Movement::Fly).with(Movement::Swim));
        arena
            .settings()
            .set_value(&MOVEMENT, FlagSet::new().without(Movement::Fly));

        let resolution = realms.evaluator().explain(&at(5.0), &MOVEMENT, None);
        assert!(resolution.value.contains(Movement::Walk));
        assert!(resolution.value.contains(Movement::Swim));
        assert!(!resolution.value.contains(Movement::Fly));
        assert!(resolution.value.denies(Movement::Fly));
        assert_eq!(resolution.sources, ["arena", "lobby", "__global__"]);
    }

    #[test]
    fn union_without_denials_is_additive() {
        let mut config = RealmConfig::default();
        config.resolution.honour_denials = false;
        let realms = realms(config);
        let domain = realms.domain_or_create("overworld");
        let arena = domain.create_zone("arena", 10, vec![cube(0.0, 10.0)]).unwrap();
        realms
            .global()
            .settings()
            .set_value(&MOVEMENT, FlagSet::new().with(Movement::Fly));
        arena
            .settings()
            .set_value(&MOVEMENT, FlagSet::new().without(Movement::Fly));
        assert!(
            realms
                .evaluator()
                .value(&at(5.0), &MOVEMENT, None)
                .contains(Movement::Fly)
        );
    }

    #[test]
    fn targets_filter_players() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let plot = domain.create_zone("plot", 1, vec![cube(0.0, 10.0)]).unwrap();
        let owner = Uuid::new_v4();
        plot.settings().set_value(&BUILD, true);
        realms.global().settings().set_value(&BUILD, false);
        plot.settings().edit_target(BUILD.id(), Target::nobody, |t| {
            t.players.insert(owner);
        });

        let eval = realms.evaluator();
        let stranger = Subject::new(Uuid::new_v4());
        assert!(eval.value(&at(5.0), &BUILD, Some(&Subject::new(owner))));
        assert!(!eval.value(&at(5.0), &BUILD, Some(&stranger)));
        // Without a subject the target is not consulted.
        assert!(eval.value(&at(5.0), &BUILD, None));
    }

    #[test]
    fn unknown_domain_uses_global_only() {
        let realms = realms(RealmConfig::default());
        realms.global().settings().set_value(&BUILD, false);
        let nether = Location::new("nether", 0.0, 0.0, 0.0);
        assert!(!realms.evaluator().value(&nether, &BUILD, None));
        assert_eq!(realms.evaluator().hosts_at(&nether).len(), 1);
    }

    #[test]
    fn global_value_ignores_zones() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let zone = domain.create_zone("a", 1, vec![cube(0.0, 10.0)]).unwrap();
        zone.settings().set_value(&ENTRY_FEE, 50);
        assert_eq!(realms.evaluator().global_value(&ENTRY_FEE, None), 0);
        realms.global().settings().set_value(&ENTRY_FEE, 7);
        assert_eq!(realms.evaluator().global_value(&ENTRY_FEE, None), 7);
    }

    #[test]
    fn evaluate_raw_by_id() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let zone = domain.create_zone("a", 1, vec![cube(0.0, 10.0)]).unwrap();
        zone.settings().set_value(&ENTRY_FEE, 9);
        let eval = realms.evaluator();
        let resolution = eval.evaluate_raw(&at(5.0), "entry-fee", None).unwrap();
        assert_eq!(resolution.value, SettingValue::Int(9));
        assert_eq!(resolution.sources, ["a"]);
        assert_eq!(
            eval.evaluate_raw(&at(5.0), "no-such", None),
            Err(SettingError::Unregistered("no-such".to_owned()))
        );
    }

    #[test]
    fn mismatched_kind_is_skipped() {
        let realms = realms(RealmConfig::default());
        let domain = realms.domain_or_create("overworld");
        let zone = domain.create_zone("a", 1, vec![cube(0.0, 10.0)]).unwrap();
        let wrong: Setting<i64> = Setting::new("can-build", || 0);
        zone.settings().set_value(&wrong, 4);
        assert!(realms.evaluator().value(&at(5.0), &BUILD, None));
    }

    #[test]
    fn order_by_priority_then_age() {
        let zone = |seq, name: &str, priority| {
            Arc::new(Zone::new(ZoneId::new(seq), name.to_owned(), "w".to_owned(), priority, Vec::new()))
        };
        let zones = vec![zone(0, "a", 1), zone(1, "b", 3), zone(2, "c", 3)];
        let names: Vec<_> = order(zones, TieBreak::OldestFirst)
            .iter()
            .map(|z| z.name().to_owned())
            .collect();
        assert_eq!(names, ["b", "c", "a"]);
    }
}
