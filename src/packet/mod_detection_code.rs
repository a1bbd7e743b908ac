use std::io;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// Modification Detection Code Packet, a SHA-1 over the preceding
/// plaintext. Only ever appears as the final piece inside a Tag 18 packet.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.14
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModDetectionCode {
    packet_version: Version,
    hash: [u8; 20],
}

impl ModDetectionCode {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure_eq!(input.len(), 20, "invalid mdc body length {}", input.len());

        let mut hash = [0u8; 20];
        hash.copy_from_slice(input);

        Ok(ModDetectionCode {
            packet_version,
            hash,
        })
    }

    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }
}

impl Serialize for ModDetectionCode {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.hash)?;
        Ok(())
    }
}

impl PacketTrait for ModDetectionCode {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::ModDetectionCode
    }
}
