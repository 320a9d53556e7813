use thiserror::Error;

use super::ZoneName;
use crate::dns::enums::DNSResourceType;

/// Errors raised while turning a zone definition into a snapshot.
///
/// Any of these aborts the whole build; the published snapshot is untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("Malformed {kind} record for {name} ({value:?}): {cause}")]
    MalformedRecord {
        name: ZoneName,
        kind: DNSResourceType,
        value: String,
        cause: String,
    },

    #[error("Invalid domain name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Zone {0} declares an SOA record at its apex; the apex SOA is generated")]
    DuplicateSoa(ZoneName),
}

pub type Result<T> = std::result::Result<T, ZoneError>;
