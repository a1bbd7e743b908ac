use std::io;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// Sym. Encrypted Integrity Protected Data Packet. The ciphertext hides
/// the plaintext packets followed by their modification detection code.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.13
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymEncryptedProtectedData {
    packet_version: Version,
    data: Vec<u8>,
}

impl SymEncryptedProtectedData {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure!(!input.is_empty(), "missing version octet");
        crate::ensure_eq!(input[0], 1, "unsupported seipd version {}", input[0]);

        Ok(SymEncryptedProtectedData {
            packet_version,
            data: input[1..].to_vec(),
        })
    }

    pub fn from_ciphertext(data: Vec<u8>) -> Self {
        SymEncryptedProtectedData {
            packet_version: Version::default(),
            data,
        }
    }

    /// The raw ciphertext, without the version octet.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for SymEncryptedProtectedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[0x01])?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}

impl PacketTrait for SymEncryptedProtectedData {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::SymEncryptedProtectedData
    }
}
