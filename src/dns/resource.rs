use bitstream_io::{BigEndian, BitRead, BitReader, Endianness};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::{
    ParseError,
    common::{MessageWriter, PacketComponent, labels_to_name, name_to_labels, read_name},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: DNSResourceData,
}

/// Structured RDATA. Names are stored fully qualified (trailing dot).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DNSResourceData {
    #[default]
    Empty,
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    NS(String),
    CNAME(String),
    PTR(String),
    MX {
        preference: u16,
        exchange: String,
    },
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    TXT(Vec<String>),
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    CAA {
        flags: u8,
        tag: String,
        value: String,
    },
    /// RDATA of a type without structured support, kept verbatim
    Raw(Vec<u8>),
}

impl DNSResource {
    /// Owner name in presentation form
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }

    /// SOA serial, if this is an SOA record
    pub fn soa_serial(&self) -> Option<u32> {
        match self.rdata {
            DNSResourceData::SOA { serial, .. } => Some(serial),
            _ => None,
        }
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name(),
            self.ttl,
            self.rclass,
            self.rtype,
            self.rdata
        )
    }
}

impl fmt::Display for DNSResourceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceData::Empty => Ok(()),
            DNSResourceData::A(addr) => write!(f, "{}", addr),
            DNSResourceData::AAAA(addr) => write!(f, "{}", addr),
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::PTR(name) => f.write_str(name),
            DNSResourceData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            DNSResourceData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{} {} {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            DNSResourceData::TXT(strings) => {
                let quoted: Vec<String> = strings.iter().map(|s| quote(s)).collect();
                f.write_str(&quoted.join(" "))
            }
            DNSResourceData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            DNSResourceData::CAA { flags, tag, value } => {
                write!(f, "{} {} {}", flags, tag, quote(value))
            }
            DNSResourceData::Raw(bytes) => {
                write!(f, "\\# {}", bytes.len())?;
                if !bytes.is_empty() {
                    f.write_str(" ")?;
                    for b in bytes {
                        write!(f, "{:02x}", b)?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl DNSResourceData {
    fn write(&self, writer: &mut MessageWriter) -> Result<(), ParseError> {
        match self {
            DNSResourceData::Empty => {}
            DNSResourceData::A(addr) => writer.put_bytes(&addr.octets()),
            DNSResourceData::AAAA(addr) => writer.put_bytes(&addr.octets()),
            DNSResourceData::NS(name)
            | DNSResourceData::CNAME(name)
            | DNSResourceData::PTR(name) => writer.put_name(&name_to_labels(name), true)?,
            DNSResourceData::MX {
                preference,
                exchange,
            } => {
                writer.put_u16(*preference);
                writer.put_name(&name_to_labels(exchange), true)?;
            }
            DNSResourceData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                writer.put_name(&name_to_labels(mname), true)?;
                writer.put_name(&name_to_labels(rname), true)?;
                for value in [serial, refresh, retry, expire, minimum] {
                    writer.put_u32(*value);
                }
            }
            DNSResourceData::TXT(strings) => {
                if strings.is_empty() {
                    writer.put_u8(0);
                }
                for s in strings {
                    if s.len() > 255 {
                        return Err(ParseError::InvalidRecordData(
                            "TXT string longer than 255 bytes".to_string(),
                        ));
                    }
                    writer.put_u8(s.len() as u8);
                    writer.put_bytes(s.as_bytes());
                }
            }
            DNSResourceData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                writer.put_u16(*priority);
                writer.put_u16(*weight);
                writer.put_u16(*port);
                // RFC 2782: the target is never compressed
                writer.put_name(&name_to_labels(target), false)?;
            }
            DNSResourceData::CAA { flags, tag, value } => {
                writer.put_u8(*flags);
                writer.put_u8(tag.len() as u8);
                writer.put_bytes(tag.as_bytes());
                writer.put_bytes(value.as_bytes());
            }
            DNSResourceData::Raw(bytes) => writer.put_bytes(bytes),
        }
        Ok(())
    }

    fn decode(rtype: DNSResourceType, data: &[u8], packet: &[u8]) -> Result<Self, ParseError> {
        let invalid = |what: &str| ParseError::InvalidRecordData(format!("{} {}", rtype, what));
        let mut reader = BitReader::endian(data, BigEndian);

        let rdata = match rtype {
            DNSResourceType::A => {
                let octets: [u8; 4] = data.try_into().map_err(|_| invalid("length"))?;
                DNSResourceData::A(Ipv4Addr::from(octets))
            }
            DNSResourceType::AAAA => {
                let octets: [u8; 16] = data.try_into().map_err(|_| invalid("length"))?;
                DNSResourceData::AAAA(Ipv6Addr::from(octets))
            }
            DNSResourceType::NS => DNSResourceData::NS(decode_name(&mut reader, packet)?),
            DNSResourceType::CNAME => DNSResourceData::CNAME(decode_name(&mut reader, packet)?),
            DNSResourceType::PTR => DNSResourceData::PTR(decode_name(&mut reader, packet)?),
            DNSResourceType::MX => {
                let preference = reader.read_var::<u16>(16)?;
                let exchange = decode_name(&mut reader, packet)?;
                DNSResourceData::MX {
                    preference,
                    exchange,
                }
            }
            DNSResourceType::SOA => DNSResourceData::SOA {
                mname: decode_name(&mut reader, packet)?,
                rname: decode_name(&mut reader, packet)?,
                serial: reader.read_var::<u32>(32)?,
                refresh: reader.read_var::<u32>(32)?,
                retry: reader.read_var::<u32>(32)?,
                expire: reader.read_var::<u32>(32)?,
                minimum: reader.read_var::<u32>(32)?,
            },
            DNSResourceType::TXT => {
                let mut strings = Vec::new();
                let mut rest = data;
                while let Some((&len, tail)) = rest.split_first() {
                    let chunk = tail.get(..len as usize).ok_or_else(|| invalid("string"))?;
                    strings.push(String::from_utf8_lossy(chunk).into_owned());
                    rest = &tail[len as usize..];
                }
                DNSResourceData::TXT(strings)
            }
            DNSResourceType::SRV => DNSResourceData::SRV {
                priority: reader.read_var::<u16>(16)?,
                weight: reader.read_var::<u16>(16)?,
                port: reader.read_var::<u16>(16)?,
                target: decode_name(&mut reader, packet)?,
            },
            DNSResourceType::CAA => {
                let (&flags, tail) = data.split_first().ok_or_else(|| invalid("flags"))?;
                let (&tag_len, tail) = tail.split_first().ok_or_else(|| invalid("tag"))?;
                let tag = tail.get(..tag_len as usize).ok_or_else(|| invalid("tag"))?;
                DNSResourceData::CAA {
                    flags,
                    tag: String::from_utf8_lossy(tag).into_owned(),
                    value: String::from_utf8_lossy(&tail[tag_len as usize..]).into_owned(),
                }
            }
            DNSResourceType::OPT | DNSResourceType::Unknown(_) => {
                DNSResourceData::Raw(data.to_vec())
            }
        };
        Ok(rdata)
    }
}

fn decode_name<E: Endianness>(
    reader: &mut BitReader<&[u8], E>,
    packet: &[u8],
) -> Result<String, ParseError> {
    Ok(labels_to_name(&read_name(reader, packet)?))
}

impl PacketComponent for DNSResource {
    fn write(&self, writer: &mut MessageWriter) -> Result<(), ParseError> {
        writer.put_name(&self.labels, true)?;
        writer.put_u16(self.rtype.into());
        writer.put_u16(self.rclass.into());
        writer.put_u32(self.ttl);

        let length_at = writer.position();
        writer.put_u16(0);
        self.rdata.write(writer)?;
        let rdlength = writer.position() - length_at - 2;
        let rdlength = u16::try_from(rdlength).map_err(|_| {
            ParseError::InvalidRecordData(format!("{} RDATA too long", self.rtype))
        })?;
        writer.patch_u16(length_at, rdlength);
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError> {
        self.labels = read_name(reader, packet)?;
        self.rtype = reader.read_var::<u16>(16)?.into();
        self.rclass = reader.read_var::<u16>(16)?.into();
        self.ttl = reader.read_var::<u32>(32)?;
        let rdlength = reader.read_var::<u16>(16)?;
        let mut buf = vec![0_u8; rdlength as usize];
        reader.read_bytes(&mut buf)?;
        self.rdata = DNSResourceData::decode(self.rtype, &buf, packet)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presentation_format() {
        let mx = DNSResourceData::MX {
            preference: 10,
            exchange: "mail.example.com.".to_string(),
        };
        assert_eq!(mx.to_string(), "10 mail.example.com.");

        let caa = DNSResourceData::CAA {
            flags: 0,
            tag: "issue".to_string(),
            value: "letsencrypt.org".to_string(),
        };
        assert_eq!(caa.to_string(), "0 issue \"letsencrypt.org\"");

        let txt = DNSResourceData::TXT(vec!["a \"b\"".to_string(), "c".to_string()]);
        assert_eq!(txt.to_string(), r#""a \"b\"" "c""#);
    }

    #[test]
    fn test_record_display() {
        let record = DNSResource {
            labels: vec!["example".to_string(), "com".to_string()],
            rtype: DNSResourceType::A,
            rclass: DNSResourceClass::IN,
            ttl: 3600,
            rdata: DNSResourceData::A(Ipv4Addr::new(1, 2, 3, 4)),
        };
        assert_eq!(record.to_string(), "example.com. 3600 IN A 1.2.3.4");
    }

    #[test]
    fn test_caa_rdata_decoding() {
        let data = [0u8, 5, b'i', b's', b's', b'u', b'e', b'c', b'a', b'.', b'o', b'r', b'g'];
        let rdata = DNSResourceData::decode(DNSResourceType::CAA, &data, &data).unwrap();
        assert_eq!(
            rdata,
            DNSResourceData::CAA {
                flags: 0,
                tag: "issue".to_string(),
                value: "ca.org".to_string(),
            }
        );
    }

    #[test]
    fn test_bad_address_length_is_rejected() {
        assert!(DNSResourceData::decode(DNSResourceType::A, &[1, 2, 3], &[]).is_err());
    }
}
