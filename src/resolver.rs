use crate::dns::{
    DNSPacket,
    enums::{DnsOpcode, ResponseCode},
    header::{CD_FLAG, DNSHeader},
};
use crate::zone::{Lookup, ZoneName, ZoneSnapshot};
use std::fmt;
use tracing::{debug, info};

/// How a query was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// No question in the request (FORMERR)
    FormatError,
    /// Several questions or a non-QUERY opcode (NOTIMP)
    NotImplemented,
    /// The queried name is not served (NXDOMAIN)
    NameError,
    /// The name is served but owns nothing of the queried type (NOERROR, empty)
    NoData,
    Answer,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::FormatError,
        Outcome::NotImplemented,
        Outcome::NameError,
        Outcome::NoData,
        Outcome::Answer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::FormatError => "formerr",
            Outcome::NotImplemented => "notimp",
            Outcome::NameError => "nxdomain",
            Outcome::NoData => "nodata",
            Outcome::Answer => "answer",
        }
    }

    pub fn rcode(&self) -> ResponseCode {
        match self {
            Outcome::FormatError => ResponseCode::FormatError,
            Outcome::NotImplemented => ResponseCode::NotImplemented,
            Outcome::NameError => ResponseCode::NameError,
            Outcome::NoData | Outcome::Answer => ResponseCode::NoError,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    pub response: DNSPacket,
}

/// Answers queries from a zone snapshot.
///
/// Resolution is a pure function of the query and the snapshot handed in;
/// callers take the snapshot from [`ZoneStore::current`](crate::zone::ZoneStore::current)
/// once per query so every answer is consistent with a single publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    compression: bool,
}

impl Resolver {
    pub fn new(compression: bool) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn resolve(&self, query: &DNSPacket, snapshot: &ZoneSnapshot) -> Resolution {
        let opcode = DnsOpcode::from(query.header.opcode);
        if opcode != DnsOpcode::Query || query.questions.len() > 1 {
            debug!(
                "Query id={} has opcode {:?} and {} questions, returning NOTIMP",
                query.header.id,
                opcode,
                query.questions.len()
            );
            return self.finish(query, Outcome::NotImplemented);
        }
        let Some(question) = query.questions.first() else {
            debug!("Query id={} has no questions, returning FORMERR", query.header.id);
            return self.finish(query, Outcome::FormatError);
        };

        info!("Query: {} {}", question.name(), question.qtype);

        let name = match ZoneName::from_labels(&question.labels) {
            Ok(name) => name,
            Err(e) => {
                debug!("Unservable query name: {}", e);
                return self.finish(query, Outcome::NameError);
            }
        };

        match snapshot.lookup(&name, question.qtype) {
            Lookup::NameError => self.finish(query, Outcome::NameError),
            Lookup::NoData { authority } => {
                let mut resolution = self.finish(query, Outcome::NoData);
                if let Some(ns) = authority {
                    resolution.response.header.aa = true;
                    resolution.response.authorities.push(ns.clone());
                }
                resolution
            }
            Lookup::Answer { records, authority } => {
                let mut resolution = self.finish(query, Outcome::Answer);
                resolution.response.answers.extend_from_slice(records);
                if let Some(ns) = authority {
                    resolution.response.header.aa = true;
                    resolution.response.authorities.push(ns.clone());
                }
                resolution
            }
        }
    }

    /// FORMERR reply for a message whose header decoded but whose body did not
    pub fn format_error(&self, header: &DNSHeader) -> DNSPacket {
        let mut response = DNSPacket {
            compress: self.compression,
            ..DNSPacket::default()
        };
        response.header.id = header.id;
        response.header.opcode = header.opcode;
        response.header.rd = header.rd;
        response.header.z = header.z & CD_FLAG;
        response.header.qr = true;
        response.header.rcode = ResponseCode::FormatError.to_u8();
        response
    }

    /// Reduce `response` to its header and question with TC set, for replies
    /// that do not fit a UDP datagram
    pub fn truncate(&self, response: &DNSPacket) -> DNSPacket {
        let mut truncated = response.clone();
        truncated.header.tc = true;
        truncated.answers.clear();
        truncated.authorities.clear();
        truncated.resources.clear();
        truncated
    }

    fn finish(&self, query: &DNSPacket, outcome: Outcome) -> Resolution {
        let mut response = DNSPacket {
            compress: self.compression,
            ..DNSPacket::default()
        };
        response.header.id = query.header.id;
        response.header.opcode = query.header.opcode;
        response.header.rd = query.header.rd;
        response.header.z = query.header.z & CD_FLAG;
        response.header.qr = true;
        response.header.ra = false;
        response.header.rcode = outcome.rcode().to_u8();
        if let Some(question) = query.questions.first() {
            response.questions.push(question.clone());
        }
        Resolution { outcome, response }
    }
}
