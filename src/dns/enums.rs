use std::fmt;

/// Resource record types understood by the workbench.
///
/// Types the codec does not know are carried as `Unknown` so that a query for
/// them can still be answered (with NODATA or NXDOMAIN).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    CAA,
    Unknown(u16),
}

impl DNSResourceType {
    /// Presentation mnemonic, `TYPE<n>` for unknown codes (RFC 3597)
    pub fn as_str(&self) -> std::borrow::Cow<'static, str> {
        let name = match self {
            DNSResourceType::A => "A",
            DNSResourceType::NS => "NS",
            DNSResourceType::CNAME => "CNAME",
            DNSResourceType::SOA => "SOA",
            DNSResourceType::PTR => "PTR",
            DNSResourceType::MX => "MX",
            DNSResourceType::TXT => "TXT",
            DNSResourceType::AAAA => "AAAA",
            DNSResourceType::SRV => "SRV",
            DNSResourceType::OPT => "OPT",
            DNSResourceType::CAA => "CAA",
            DNSResourceType::Unknown(code) => return format!("TYPE{}", code).into(),
        };
        name.into()
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            12 => DNSResourceType::PTR,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            41 => DNSResourceType::OPT,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(value: DNSResourceType) -> Self {
        match value {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::PTR => 12,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::OPT => 41,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    ANY,
    Unknown(u16),
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::IN => f.write_str("IN"),
            DNSResourceClass::CS => f.write_str("CS"),
            DNSResourceClass::CH => f.write_str("CH"),
            DNSResourceClass::HS => f.write_str("HS"),
            DNSResourceClass::ANY => f.write_str("ANY"),
            DNSResourceClass::Unknown(code) => write!(f, "CLASS{}", code),
        }
    }
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            255 => DNSResourceClass::ANY,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(value: DNSResourceClass) -> Self {
        match value {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::ANY => 255,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

/// Response codes from RFC 1035
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl ResponseCode {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ResponseCode::NoError),
            1 => Some(ResponseCode::FormatError),
            2 => Some(ResponseCode::ServerFailure),
            3 => Some(ResponseCode::NameError),
            4 => Some(ResponseCode::NotImplemented),
            5 => Some(ResponseCode::Refused),
            _ => None,
        }
    }
}

/// Header opcodes. Only `Query` is served.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DnsOpcode {
    Query,
    IQuery,
    Status,
    Notify,
    Update,
    Other(u8),
}

impl From<u8> for DnsOpcode {
    fn from(value: u8) -> Self {
        match value {
            0 => DnsOpcode::Query,
            1 => DnsOpcode::IQuery,
            2 => DnsOpcode::Status,
            4 => DnsOpcode::Notify,
            5 => DnsOpcode::Update,
            x => DnsOpcode::Other(x),
        }
    }
}

impl From<DnsOpcode> for u8 {
    fn from(value: DnsOpcode) -> Self {
        match value {
            DnsOpcode::Query => 0,
            DnsOpcode::IQuery => 1,
            DnsOpcode::Status => 2,
            DnsOpcode::Notify => 4,
            DnsOpcode::Update => 5,
            DnsOpcode::Other(x) => x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(u16::from(DNSResourceType::CAA), 257);
        assert_eq!(DNSResourceType::from(28), DNSResourceType::AAAA);
        assert_eq!(DNSResourceType::from(99), DNSResourceType::Unknown(99));
        assert_eq!(u16::from(DNSResourceType::Unknown(99)), 99);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(DNSResourceType::MX.to_string(), "MX");
        assert_eq!(DNSResourceType::Unknown(65).to_string(), "TYPE65");
    }

    #[test]
    fn test_opcode() {
        assert_eq!(DnsOpcode::from(0), DnsOpcode::Query);
        assert_eq!(DnsOpcode::from(9), DnsOpcode::Other(9));
        assert_eq!(u8::from(DnsOpcode::Update), 5);
    }
}
