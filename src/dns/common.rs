use bitstream_io::{BigEndian, BitRead, BitReader, BitWriter, Endianness};
use std::collections::HashMap;

use super::ParseError;

/// Longest encoded name allowed on the wire (RFC 1035 §2.3.4)
pub const MAX_NAME_LENGTH: usize = 255;
/// Longest single label allowed on the wire
pub const MAX_LABEL_LENGTH: usize = 63;
/// Compression pointers can only address the first 16KiB of a message
const MAX_POINTER_OFFSET: usize = 0x3FFF;
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write(&self, writer: &mut MessageWriter) -> Result<(), ParseError>;

    /// Read the component from `reader`. `packet` is the whole message and is
    /// used to follow compression pointers.
    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError>;
}

/// Read a possibly compressed domain name, returning its labels (root = empty).
pub fn read_name<E: Endianness>(
    reader: &mut BitReader<&[u8], E>,
    packet: &[u8],
) -> Result<Vec<String>, ParseError> {
    let mut labels = Vec::new();
    loop {
        let len = reader.read_var::<u8>(8)?;
        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    break;
                }
                let mut buf = vec![0; len as usize];
                reader.read_bytes(&mut buf)?;
                labels.push(label_from_bytes(buf)?);
            }
            0xC0 => {
                let low = reader.read_var::<u8>(8)?;
                let offset = (((len & 0x3F) as usize) << 8) | low as usize;
                labels.extend(decode_name_at(packet, offset)?);
                break;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }
    check_name_length(&labels)?;
    Ok(labels)
}

/// Decode the name starting at `offset` of `packet`, following pointers.
pub fn decode_name_at(packet: &[u8], mut offset: usize) -> Result<Vec<String>, ParseError> {
    let mut labels = Vec::new();
    let mut hops = 0;
    loop {
        let len = *packet.get(offset).ok_or(ParseError::InvalidLabel)?;
        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    return Ok(labels);
                }
                let start = offset + 1;
                let end = start + len as usize;
                let bytes = packet.get(start..end).ok_or(ParseError::InvalidLabel)?;
                labels.push(label_from_bytes(bytes.to_vec())?);
                if labels.len() > MAX_NAME_LENGTH / 2 {
                    return Err(ParseError::NameTooLong);
                }
                offset = end;
            }
            0xC0 => {
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(ParseError::InvalidLabel);
                }
                let low = *packet.get(offset + 1).ok_or(ParseError::InvalidLabel)?;
                offset = (((len & 0x3F) as usize) << 8) | low as usize;
            }
            _ => return Err(ParseError::InvalidLabel),
        }
    }
}

fn label_from_bytes(bytes: Vec<u8>) -> Result<String, ParseError> {
    String::from_utf8(bytes).map_err(|_| ParseError::InvalidLabel)
}

fn check_name_length(labels: &[String]) -> Result<(), ParseError> {
    let encoded: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
    if encoded > MAX_NAME_LENGTH {
        return Err(ParseError::NameTooLong);
    }
    Ok(())
}

/// Join labels into a fully-qualified presentation name (`"."` for the root).
pub fn labels_to_name(labels: &[String]) -> String {
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut name = labels.join(".");
    name.push('.');
    name
}

/// Split a presentation name into labels; the trailing dot is optional.
pub fn name_to_labels(name: &str) -> Vec<String> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect()
}

/// Output buffer for a whole message.
///
/// Fixed-width fields go straight into the buffer; the header's bit fields
/// are written through a `BitWriter` borrowed from it. When compression is
/// enabled every name suffix written is remembered and later occurrences are
/// replaced by a pointer.
pub struct MessageWriter {
    buf: Vec<u8>,
    compress: bool,
    /// Lowercased label sequence of every written suffix → its offset
    names: HashMap<Vec<String>, u16>,
}

impl MessageWriter {
    pub fn new(compress: bool) -> Self {
        Self {
            buf: Vec::with_capacity(512),
            compress,
            names: HashMap::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn bits(&mut self) -> BitWriter<&mut Vec<u8>, BigEndian> {
        BitWriter::endian(&mut self.buf, BigEndian)
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn patch_u16(&mut self, at: usize, value: u16) {
        self.buf[at..at + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Write a name. `compressible` is false for RDATA fields that must not be
    /// compressed (SRV targets).
    pub fn put_name(&mut self, labels: &[String], compressible: bool) -> Result<(), ParseError> {
        check_name_length(labels)?;
        for i in 0..labels.len() {
            let suffix: Vec<String> = labels[i..]
                .iter()
                .map(|label| label.to_ascii_lowercase())
                .collect();
            if self.compress && compressible {
                if let Some(&offset) = self.names.get(&suffix) {
                    self.put_u16(0xC000 | offset);
                    return Ok(());
                }
            }

            let label = &labels[i];
            if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
                return Err(ParseError::InvalidLabel);
            }
            let position = self.buf.len();
            if self.compress && position <= MAX_POINTER_OFFSET {
                self.names.entry(suffix).or_insert(position as u16);
            }
            self.put_u8(label.len() as u8);
            self.put_bytes(label.as_bytes());
        }
        self.put_u8(0);
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
