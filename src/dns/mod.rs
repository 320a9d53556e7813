pub mod common;
pub mod enums;
pub mod header;
pub mod question;
pub mod resource;

use bitstream_io::{BigEndian, BitReader};
use common::{MessageWriter, PacketComponent};
use enums::{DNSResourceType, ResponseCode};
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;
use tracing::trace;

/// Largest response that may be sent over UDP without EDNS
pub const MAX_UDP_PAYLOAD: usize = 512;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
    /// Apply name compression when serializing. Not part of the wire format.
    pub compress: bool,
}

#[derive(Debug)]
pub enum ParseError {
    InvalidHeader,
    InvalidLabel,
    NameTooLong,
    InvalidRecordData(String),
    InvalidBitStream(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::InvalidBitStream(e.to_string())
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidHeader => write!(f, "Invalid DNS header"),
            ParseError::InvalidLabel => write!(f, "Invalid DNS label"),
            ParseError::NameTooLong => write!(f, "DNS name too long"),
            ParseError::InvalidRecordData(e) => write!(f, "Invalid record data: {}", e),
            ParseError::InvalidBitStream(e) => write!(f, "Invalid bit stream: {}", e),
        }
    }
}

impl std::error::Error for ParseError {}

impl DNSPacket {
    /// Build a standard query with a single question
    pub fn query(id: u16, name: &str, qtype: DNSResourceType) -> Self {
        let mut packet = DNSPacket::default();
        packet.header.id = id;
        packet.header.rd = true;
        packet.header.qdcount = 1;
        packet.questions.push(DNSQuestion::new(name, qtype));
        packet
    }

    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        trace!("Parsing DNS packet, size: {} bytes", buf.len());
        let mut reader = BitReader::endian(buf, BigEndian);
        let mut packet = DNSPacket::default();
        packet
            .header
            .read(&mut reader, buf)
            .map_err(|_| ParseError::InvalidHeader)?;

        for _ in 0..packet.header.qdcount {
            let mut question = DNSQuestion::default();
            question.read(&mut reader, buf)?;
            packet.questions.push(question);
        }

        for _ in 0..packet.header.ancount {
            let mut answer = DNSResource::default();
            answer.read(&mut reader, buf)?;
            packet.answers.push(answer);
        }

        for _ in 0..packet.header.nscount {
            let mut authority = DNSResource::default();
            authority.read(&mut reader, buf)?;
            packet.authorities.push(authority);
        }

        for _ in 0..packet.header.arcount {
            let mut resource = DNSResource::default();
            resource.read(&mut reader, buf)?;
            packet.resources.push(resource);
        }

        Ok(packet)
    }

    /// Encode the packet. Section counts are taken from the sections
    /// themselves, not from the header fields.
    pub fn serialize(&self) -> Result<Vec<u8>, ParseError> {
        let mut writer = MessageWriter::new(self.compress);

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = self.resources.len() as u16;
        header.write(&mut writer)?;

        for question in &self.questions {
            question.write(&mut writer)?;
        }
        for answer in &self.answers {
            answer.write(&mut writer)?;
        }
        for authority in &self.authorities {
            authority.write(&mut writer)?;
        }
        for resource in &self.resources {
            resource.write(&mut writer)?;
        }

        Ok(writer.finish())
    }

    pub fn rcode(&self) -> Option<ResponseCode> {
        ResponseCode::from_u8(self.header.rcode)
    }
}
