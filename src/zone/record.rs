use super::{Result, ZoneError, ZoneName, constants};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::resource::{DNSResource, DNSResourceData};
use std::net::{Ipv4Addr, Ipv6Addr};

/// A single declared value awaiting conversion into a resource record
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneRecord {
    /// Owner name
    pub name: ZoneName,
    /// Record type (A, AAAA, MX, etc.)
    pub rtype: DNSResourceType,
    /// Record data in presentation format
    pub rdata: String,
}

impl ZoneRecord {
    pub fn new(name: ZoneName, rtype: DNSResourceType, rdata: impl Into<String>) -> Self {
        Self {
            name,
            rtype,
            rdata: rdata.into(),
        }
    }

    /// Build the resource record, reporting failures as `MalformedRecord`
    pub fn to_dns_resource(&self) -> Result<DNSResource> {
        let rdata = self.parse_rdata().map_err(|cause| ZoneError::MalformedRecord {
            name: self.name.clone(),
            kind: self.rtype,
            value: self.rdata.clone(),
            cause,
        })?;

        Ok(DNSResource {
            labels: self.name.labels(),
            rtype: self.rtype,
            rclass: DNSResourceClass::IN,
            ttl: constants::DEFAULT_TTL,
            rdata,
        })
    }

    fn parse_rdata(&self) -> std::result::Result<DNSResourceData, String> {
        let fields = tokenize(&self.rdata)?;
        if fields.is_empty() {
            return Err("empty record data".to_string());
        }

        match self.rtype {
            DNSResourceType::A => parse_a_record(&fields),
            DNSResourceType::AAAA => parse_aaaa_record(&fields),
            DNSResourceType::NS => Ok(DNSResourceData::NS(single_name(&fields)?)),
            DNSResourceType::CNAME => Ok(DNSResourceData::CNAME(single_name(&fields)?)),
            DNSResourceType::PTR => Ok(DNSResourceData::PTR(single_name(&fields)?)),
            DNSResourceType::MX => parse_mx_record(&fields),
            DNSResourceType::SOA => parse_soa_record(&fields),
            DNSResourceType::TXT => Ok(parse_txt_record(&fields)),
            DNSResourceType::SRV => parse_srv_record(&fields),
            DNSResourceType::CAA => parse_caa_record(&fields),
            other => Err(format!("Unsupported record type: {}", other)),
        }
    }
}

fn expect_fields(fields: &[String], count: usize, what: &str) -> std::result::Result<(), String> {
    if fields.len() != count {
        return Err(format!(
            "{} requires {} field(s), got {}",
            what,
            count,
            fields.len()
        ));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(field: &str, what: &str) -> std::result::Result<T, String> {
    field
        .parse()
        .map_err(|_| format!("Invalid {}: {}", what, field))
}

fn parse_name(field: &str) -> std::result::Result<String, String> {
    ZoneName::parse(field)
        .map(|name| name.to_string())
        .map_err(|e| e.to_string())
}

fn single_name(fields: &[String]) -> std::result::Result<String, String> {
    expect_fields(fields, 1, "Record")?;
    parse_name(&fields[0])
}

fn parse_a_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    expect_fields(fields, 1, "A record")?;
    let addr: Ipv4Addr = fields[0]
        .parse()
        .map_err(|_| format!("Invalid IPv4 address: {}", fields[0]))?;
    Ok(DNSResourceData::A(addr))
}

fn parse_aaaa_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    expect_fields(fields, 1, "AAAA record")?;
    let addr: Ipv6Addr = fields[0]
        .parse()
        .map_err(|_| format!("Invalid IPv6 address: {}", fields[0]))?;
    Ok(DNSResourceData::AAAA(addr))
}

fn parse_mx_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    // MX format: preference exchange
    expect_fields(fields, 2, "MX record")?;
    Ok(DNSResourceData::MX {
        preference: parse_number(&fields[0], "MX preference")?,
        exchange: parse_name(&fields[1])?,
    })
}

fn parse_soa_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    // SOA format: mname rname serial refresh retry expire minimum
    expect_fields(fields, 7, "SOA record")?;
    Ok(DNSResourceData::SOA {
        mname: parse_name(&fields[0])?,
        rname: parse_name(&fields[1])?,
        serial: parse_number(&fields[2], "SOA serial")?,
        refresh: parse_number(&fields[3], "SOA refresh")?,
        retry: parse_number(&fields[4], "SOA retry")?,
        expire: parse_number(&fields[5], "SOA expire")?,
        minimum: parse_number(&fields[6], "SOA minimum")?,
    })
}

/// Every field becomes one character-string; fields over 255 bytes are split.
fn parse_txt_record(fields: &[String]) -> DNSResourceData {
    let mut strings = Vec::with_capacity(fields.len());
    for field in fields {
        let mut chunk = String::new();
        for c in field.chars() {
            if chunk.len() + c.len_utf8() > 255 {
                strings.push(std::mem::take(&mut chunk));
            }
            chunk.push(c);
        }
        strings.push(chunk);
    }
    DNSResourceData::TXT(strings)
}

fn parse_srv_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    // SRV format: priority weight port target
    expect_fields(fields, 4, "SRV record")?;
    Ok(DNSResourceData::SRV {
        priority: parse_number(&fields[0], "SRV priority")?,
        weight: parse_number(&fields[1], "SRV weight")?,
        port: parse_number(&fields[2], "SRV port")?,
        target: parse_name(&fields[3])?,
    })
}

fn parse_caa_record(fields: &[String]) -> std::result::Result<DNSResourceData, String> {
    // CAA format: flags tag value
    expect_fields(fields, 3, "CAA record")?;
    let flags = parse_number(&fields[0], "CAA flags")?;
    let tag = &fields[1];
    if tag.is_empty() || tag.len() > 255 || !tag.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(format!("Invalid CAA tag: {}", tag));
    }
    Ok(DNSResourceData::CAA {
        flags,
        tag: tag.to_ascii_lowercase(),
        value: fields[2].clone(),
    })
}

/// Split presentation data on whitespace, honoring double quotes and
/// backslash escapes inside them.
fn tokenize(input: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut field = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => field.push(escaped),
                        None => break,
                    },
                    _ => field.push(c),
                }
            }
            if !closed {
                return Err("Unterminated quoted string".to_string());
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);
    }

    Ok(fields)
}
