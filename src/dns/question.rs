use bitstream_io::{BitRead, BitReader, Endianness};

use super::{
    ParseError,
    common::{MessageWriter, PacketComponent, labels_to_name, name_to_labels, read_name},
    enums::{DNSResourceClass, DNSResourceType},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: &str, qtype: DNSResourceType) -> Self {
        Self {
            labels: name_to_labels(name),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }

    /// Queried name in presentation form, as received (case preserved)
    pub fn name(&self) -> String {
        labels_to_name(&self.labels)
    }
}

impl PacketComponent for DNSQuestion {
    fn write(&self, writer: &mut MessageWriter) -> Result<(), ParseError> {
        writer.put_name(&self.labels, true)?;
        writer.put_u16(self.qtype.into());
        writer.put_u16(self.qclass.into());
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet: &[u8],
    ) -> Result<(), ParseError> {
        let labels = read_name(reader, packet)?;
        let qtype = reader.read_var::<u16>(16)?.into();
        let qclass = reader.read_var::<u16>(16)?.into();
        *self = DNSQuestion {
            labels,
            qtype,
            qclass,
        };
        Ok(())
    }
}
