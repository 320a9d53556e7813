//! Turns a [`ZoneDefinition`] into a [`ZoneSnapshot`].

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{
    Result, ZoneDefinition, ZoneError, ZoneName, ZoneRecord, ZoneSnapshot, constants, registry,
    snapshot::RecordSets,
};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::{DNSResource, DNSResourceData};

/// Builds snapshots on behalf of one server identity.
///
/// The builder is a pure function of its input and the build time: it does no
/// I/O and never looks at a previously published snapshot.
#[derive(Debug, Clone)]
pub struct ZoneBuilder {
    server_name: ZoneName,
    admin_contact: ZoneName,
}

impl ZoneBuilder {
    pub fn new(server_name: ZoneName) -> Result<Self> {
        let admin_contact = server_name.prepend("dns")?;
        Ok(Self {
            server_name,
            admin_contact,
        })
    }

    pub fn server_name(&self) -> &ZoneName {
        &self.server_name
    }

    pub fn build(&self, definition: &ZoneDefinition) -> Result<ZoneSnapshot> {
        self.build_at(definition, &Local::now())
    }

    /// Build with an explicit clock reading for the SOA serial
    pub fn build_at<Tz: TimeZone>(
        &self,
        definition: &ZoneDefinition,
        now: &DateTime<Tz>,
    ) -> Result<ZoneSnapshot> {
        let serial = soa_serial(now);

        // Apexes first, so a declared SOA can be rejected regardless of which
        // zone lists the host.
        let apexes = definition
            .zones
            .keys()
            .map(|raw| ZoneName::parse(raw))
            .collect::<Result<HashSet<_>>>()?;

        let mut names: HashMap<ZoneName, RecordSets> = HashMap::new();
        let mut authority: HashMap<ZoneName, Arc<DNSResource>> = HashMap::new();
        let mut claims: HashMap<ZoneName, usize> = HashMap::new();
        let mut zone_ns: HashMap<ZoneName, Arc<DNSResource>> = HashMap::new();
        let mut zones = Vec::with_capacity(apexes.len());

        for (raw_zone, hosts) in &definition.zones {
            let apex = ZoneName::parse(raw_zone)?;

            let apex_sets = names.entry(apex.clone()).or_default();
            if !apex_sets.contains(DNSResourceType::SOA) {
                apex_sets.push(self.soa_record(&apex, serial));
            }
            let ns = zone_ns
                .entry(apex.clone())
                .or_insert_with(|| Arc::new(self.authority_record(&apex)))
                .clone();
            claim_authority(&mut authority, &mut claims, &apex, &apex, &ns);
            zones.push(apex.clone());

            for (raw_host, records) in hosts {
                let host = ZoneName::parse(raw_host)?;
                let sets = names.entry(host.clone()).or_default();

                for (token, values) in records {
                    let kind = registry::lookup(token)?;
                    if kind == DNSResourceType::SOA && apexes.contains(&host) {
                        return Err(ZoneError::DuplicateSoa(host));
                    }
                    for value in values {
                        let record = ZoneRecord::new(host.clone(), kind, value.as_str());
                        sets.push(record.to_dns_resource()?);
                    }
                }

                claim_authority(&mut authority, &mut claims, &host, &apex, &ns);
            }
        }

        let snapshot =
            ZoneSnapshot::from_parts(names, authority, zones, serial, now.with_timezone(&Utc));
        debug!(
            "Built snapshot: {} zones, {} names, {} records, serial {}",
            snapshot.zone_count(),
            snapshot.name_count(),
            snapshot.record_count(),
            serial
        );
        Ok(snapshot)
    }

    fn soa_record(&self, apex: &ZoneName, serial: u32) -> DNSResource {
        DNSResource {
            labels: apex.labels(),
            rtype: DNSResourceType::SOA,
            rclass: DNSResourceClass::IN,
            ttl: constants::DEFAULT_TTL,
            rdata: DNSResourceData::SOA {
                mname: self.server_name.to_string(),
                rname: self.admin_contact.to_string(),
                serial,
                refresh: constants::SOA_REFRESH,
                retry: constants::SOA_RETRY,
                expire: constants::SOA_EXPIRE,
                minimum: constants::SOA_MINIMUM,
            },
        }
    }

    fn authority_record(&self, apex: &ZoneName) -> DNSResource {
        DNSResource {
            labels: apex.labels(),
            rtype: DNSResourceType::NS,
            rclass: DNSResourceClass::IN,
            ttl: constants::DEFAULT_TTL,
            rdata: DNSResourceData::NS(self.server_name.to_string()),
        }
    }
}

/// Give `host` the authority record of `zone` unless a more specific zone
/// already claimed it. An apex always keeps its own authority.
fn claim_authority(
    authority: &mut HashMap<ZoneName, Arc<DNSResource>>,
    claims: &mut HashMap<ZoneName, usize>,
    host: &ZoneName,
    zone: &ZoneName,
    ns: &Arc<DNSResource>,
) {
    let strength = if host == zone {
        usize::MAX
    } else {
        zone.label_count()
    };
    if claims.get(host).is_some_and(|&held| held >= strength) {
        return;
    }
    claims.insert(host.clone(), strength);
    authority.insert(host.clone(), Arc::clone(ns));
}

/// SOA serial in `YYMMDDHHMM` form, wrapped into 32-bit serial space
pub fn soa_serial<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    let stamp = u64::from(now.year().rem_euclid(100) as u32) * 100_000_000
        + u64::from(now.month()) * 1_000_000
        + u64::from(now.day()) * 10_000
        + u64::from(now.hour()) * 100
        + u64::from(now.minute());
    (stamp % (1u64 << 32)) as u32
}
