pub mod builder;
pub mod definition;
pub mod errors;
pub mod name;
pub mod record;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use builder::{ZoneBuilder, soa_serial};
pub use definition::{DefinitionError, HostRecords, ZoneDefinition};
pub use errors::{Result, ZoneError};
pub use name::ZoneName;
pub use record::ZoneRecord;
pub use snapshot::{Lookup, RecordSets, ZoneSnapshot};
pub use store::ZoneStore;

/// Zone constants
pub mod constants {
    /// TTL applied to every served record (1 hour)
    pub const DEFAULT_TTL: u32 = 3600;

    /// Timers carried by the synthesized apex SOA
    pub const SOA_REFRESH: u32 = 10000;
    pub const SOA_RETRY: u32 = 2400;
    pub const SOA_EXPIRE: u32 = 604800;
    pub const SOA_MINIMUM: u32 = 3600;
}
