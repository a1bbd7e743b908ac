use std::io;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// Trust Packet. Keyring-local data with no defined format; carried
/// opaquely and never emitted in exported streams.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trust {
    packet_version: Version,
    data: Vec<u8>,
}

impl Trust {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        Ok(Trust {
            packet_version,
            data: input.to_vec(),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for Trust {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}

impl PacketTrait for Trust {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::Trust
    }
}
