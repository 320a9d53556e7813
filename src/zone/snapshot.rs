use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::ZoneName;
use crate::dns::enums::DNSResourceType;
use crate::dns::resource::DNSResource;

/// All records owned by one name, grouped by kind in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSets {
    sets: HashMap<DNSResourceType, Vec<DNSResource>>,
}

impl RecordSets {
    pub fn get(&self, kind: DNSResourceType) -> Option<&[DNSResource]> {
        self.sets.get(&kind).map(|records| records.as_slice())
    }

    pub fn contains(&self, kind: DNSResourceType) -> bool {
        self.sets.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DNSResourceType> + '_ {
        self.sets.keys().copied()
    }

    pub fn record_count(&self) -> usize {
        self.sets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub(crate) fn push(&mut self, record: DNSResource) {
        self.sets.entry(record.rtype).or_default().push(record);
    }
}

/// Result of looking a (name, kind) pair up in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// The name is not present at all
    NameError,
    /// The name exists but owns no records of the kind
    NoData { authority: Option<&'a DNSResource> },
    Answer {
        records: &'a [DNSResource],
        authority: Option<&'a DNSResource>,
    },
}

/// Immutable, point-in-time view of every configured name.
///
/// Produced by [`ZoneBuilder`](super::ZoneBuilder) and published through
/// [`ZoneStore`](super::ZoneStore). It is never modified after construction;
/// a reload replaces it wholesale.
#[derive(Debug, Clone)]
pub struct ZoneSnapshot {
    names: HashMap<ZoneName, RecordSets>,
    authority: HashMap<ZoneName, Arc<DNSResource>>,
    zones: Vec<ZoneName>,
    serial: u32,
    built_at: DateTime<Utc>,
}

impl ZoneSnapshot {
    pub(crate) fn from_parts(
        names: HashMap<ZoneName, RecordSets>,
        authority: HashMap<ZoneName, Arc<DNSResource>>,
        mut zones: Vec<ZoneName>,
        serial: u32,
        built_at: DateTime<Utc>,
    ) -> Self {
        zones.sort();
        zones.dedup();
        Self {
            names,
            authority,
            zones,
            serial,
            built_at,
        }
    }

    /// A snapshot that serves nothing; every query gets NXDOMAIN
    pub fn empty() -> Self {
        Self::from_parts(HashMap::new(), HashMap::new(), Vec::new(), 0, Utc::now())
    }

    pub fn lookup(&self, name: &ZoneName, kind: DNSResourceType) -> Lookup<'_> {
        let Some(sets) = self.names.get(name) else {
            return Lookup::NameError;
        };
        let authority = self.authority(name);
        match sets.get(kind) {
            Some(records) => Lookup::Answer { records, authority },
            None => Lookup::NoData { authority },
        }
    }

    pub fn records(&self, name: &ZoneName) -> Option<&RecordSets> {
        self.names.get(name)
    }

    pub fn authority(&self, name: &ZoneName) -> Option<&DNSResource> {
        self.authority.get(name).map(|record| record.as_ref())
    }

    /// Shared handle to the authority record, to check that hosts share it
    pub fn authority_handle(&self, name: &ZoneName) -> Option<&Arc<DNSResource>> {
        self.authority.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = (&ZoneName, &RecordSets)> {
        self.names.iter()
    }

    /// Zone apexes, sorted
    pub fn zones(&self) -> &[ZoneName] {
        &self.zones
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn record_count(&self) -> usize {
        self.names.values().map(RecordSets::record_count).sum()
    }

    /// Serial used in every synthesized SOA of this snapshot
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

impl Default for ZoneSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Two snapshots are equal when they serve the same data; the build time is
/// not compared.
impl PartialEq for ZoneSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
            && self.zones == other.zones
            && self.names == other.names
            && self.authority == other.authority
    }
}

impl Eq for ZoneSnapshot {}
