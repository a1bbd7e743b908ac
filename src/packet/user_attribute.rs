use std::io;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// User Attribute Packet. The subpacket structure inside (image
/// attributes, mostly) is carried opaquely; certification only ever hashes
/// the raw body.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.12
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    packet_version: Version,
    data: Vec<u8>,
}

impl UserAttribute {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        Ok(UserAttribute {
            packet_version,
            data: input.to_vec(),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}

impl PacketTrait for UserAttribute {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::UserAttribute
    }
}
