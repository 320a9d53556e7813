//! Record type tokens accepted in zone definitions.

use super::{Result, ZoneError};
use crate::dns::enums::DNSResourceType;

/// Every kind a definition may declare, keyed by its mnemonic.
pub const SUPPORTED_TYPES: &[(&str, DNSResourceType)] = &[
    ("A", DNSResourceType::A),
    ("AAAA", DNSResourceType::AAAA),
    ("CAA", DNSResourceType::CAA),
    ("CNAME", DNSResourceType::CNAME),
    ("MX", DNSResourceType::MX),
    ("NS", DNSResourceType::NS),
    ("PTR", DNSResourceType::PTR),
    ("SOA", DNSResourceType::SOA),
    ("SRV", DNSResourceType::SRV),
    ("TXT", DNSResourceType::TXT),
];

/// Resolve a case-insensitive token such as `"aaaa"` or `"Mx"`.
pub fn lookup(token: &str) -> Result<DNSResourceType> {
    let wanted = token.trim();
    SUPPORTED_TYPES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ZoneError::UnknownRecordType(token.to_string()))
}
