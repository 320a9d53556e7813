use bitstream_io::{BitRead, BitReader, BitWrite, Endianness};

use super::{
    ParseError,
    common::{MessageWriter, PacketComponent},
};

/// Size of the fixed message header
pub const HEADER_LEN: usize = 12;

/// CD (checking disabled) within the 3-bit `z` field, which holds Z, AD, CD
pub const CD_FLAG: u8 = 0b001;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DNSHeader {
    /// Decode only the header of `buf`. Used to answer FORMERR to messages
    /// whose body is unreadable.
    pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
        if buf.len() < HEADER_LEN {
            return Err(ParseError::InvalidHeader);
        }
        let mut reader = BitReader::endian(&buf[..HEADER_LEN], bitstream_io::BigEndian);
        let mut header = DNSHeader::default();
        header.read(&mut reader, buf)?;
        Ok(header)
    }
}

impl PacketComponent for DNSHeader {
    fn write(&self, writer: &mut MessageWriter) -> Result<(), ParseError> {
        let mut bits = writer.bits();
        bits.write_var::<u16>(16, self.id)?;
        bits.write_var::<u8>(1, self.qr as u8)?;
        bits.write_var::<u8>(4, self.opcode)?;
        bits.write_var::<u8>(1, self.aa as u8)?;
        bits.write_var::<u8>(1, self.tc as u8)?;
        bits.write_var::<u8>(1, self.rd as u8)?;
        bits.write_var::<u8>(1, self.ra as u8)?;
        bits.write_var::<u8>(3, self.z)?;
        bits.write_var::<u8>(4, self.rcode)?;
        bits.write_var::<u16>(16, self.qdcount)?;
        bits.write_var::<u16>(16, self.ancount)?;
        bits.write_var::<u16>(16, self.nscount)?;
        bits.write_var::<u16>(16, self.arcount)?;
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        _packet: &[u8],
    ) -> Result<(), ParseError> {
        self.id = reader.read_var::<u16>(16)?;
        self.qr = reader.read_var::<u8>(1)? == 1;
        self.opcode = reader.read_var::<u8>(4)?;
        self.aa = reader.read_var::<u8>(1)? == 1;
        self.tc = reader.read_var::<u8>(1)? == 1;
        self.rd = reader.read_var::<u8>(1)? == 1;
        self.ra = reader.read_var::<u8>(1)? == 1;
        self.z = reader.read_var::<u8>(3)?;
        self.rcode = reader.read_var::<u8>(4)?;
        self.qdcount = reader.read_var::<u16>(16)?;
        self.ancount = reader.read_var::<u16>(16)?;
        self.nscount = reader.read_var::<u16>(16)?;
        self.arcount = reader.read_var::<u16>(16)?;
        Ok(())
    }
}
