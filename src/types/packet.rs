use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use num_derive::FromPrimitive;

use crate::errors::Result;
use crate::util::write_packet_length;

/// Packet tags as defined in RFC 4880.
/// Ref: https://tools.ietf.org/html/rfc4880#section-4.3
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Public-Key Encrypted Session Key Packet
    PublicKeyEncryptedSessionKey = 1,
    /// Signature Packet
    Signature = 2,
    /// Symmetric-Key Encrypted Session Key Packet
    SymKeyEncryptedSessionKey = 3,
    /// One-Pass Signature Packet
    OnePassSignature = 4,
    /// Secret-Key Packet
    SecretKey = 5,
    /// Public-Key Packet
    PublicKey = 6,
    /// Secret-Subkey Packet
    SecretSubkey = 7,
    /// Compressed Data Packet
    CompressedData = 8,
    /// Symmetrically Encrypted Data Packet
    SymEncryptedData = 9,
    /// Marker Packet
    Marker = 10,
    /// Literal Data Packet
    LiteralData = 11,
    /// Trust Packet
    Trust = 12,
    /// User ID Packet
    UserId = 13,
    /// Public-Subkey Packet
    PublicSubkey = 14,
    /// User Attribute Packet
    UserAttribute = 17,
    /// Sym. Encrypted and Integrity Protected Data Packet
    SymEncryptedProtectedData = 18,
    /// Modification Detection Code Packet
    ModDetectionCode = 19,
}

impl Tag {
    /// Partial body lengths are only legal on data packets.
    /// Ref: https://tools.ietf.org/html/rfc4880#section-4.2.2.4
    pub fn allows_partial(self) -> bool {
        matches!(
            self,
            Tag::CompressedData
                | Tag::SymEncryptedData
                | Tag::LiteralData
                | Tag::SymEncryptedProtectedData
        )
    }
}

/// Header format of a packet, old or new style.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum Version {
    /// Old Packet Format
    Old = 0,
    /// New Packet Format
    New = 1,
}

impl Default for Version {
    fn default() -> Self {
        Version::New
    }
}

impl Version {
    /// Writes a packet header for a definite-length body.
    ///
    /// Old style headers can only express tags up to 15, so larger tags
    /// are silently promoted to the new format.
    pub fn write_header(self, writer: &mut impl io::Write, tag: u8, len: usize) -> Result<()> {
        match self {
            Version::Old if tag < 16 => {
                if len < 256 {
                    writer.write_all(&[0b1000_0000 | tag << 2, len as u8])?;
                } else if len < 65536 {
                    writer.write_all(&[0b1000_0001 | tag << 2])?;
                    writer.write_u16::<BigEndian>(len as u16)?;
                } else {
                    writer.write_all(&[0b1000_0010 | tag << 2])?;
                    writer.write_u32::<BigEndian>(len as u32)?;
                }
            }
            _ => {
                writer.write_all(&[0b1100_0000 | tag])?;
                write_packet_length(len, writer)?;
            }
        }

        Ok(())
    }
}

/// The body length declared by a packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(usize),
    Indeterminate,
    Partial(usize),
}

impl From<usize> for PacketLength {
    fn from(val: usize) -> PacketLength {
        PacketLength::Fixed(val)
    }
}

/// Version of a key packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new_format() {
        let mut buf = Vec::new();
        Version::New
            .write_header(&mut buf, Tag::PublicKey as u8, 5)
            .unwrap();
        assert_eq!(buf, vec![0xc6, 0x05]);
    }

    #[test]
    fn test_header_old_format() {
        let mut buf = Vec::new();
        Version::Old
            .write_header(&mut buf, Tag::Signature as u8, 4)
            .unwrap();
        assert_eq!(buf, vec![0x88, 0x04]);

        let mut buf = Vec::new();
        Version::Old
            .write_header(&mut buf, Tag::Signature as u8, 300)
            .unwrap();
        assert_eq!(buf, vec![0x89, 0x01, 0x2c]);
    }

    #[test]
    fn test_old_format_promotes_large_tags() {
        let mut buf = Vec::new();
        Version::Old
            .write_header(&mut buf, Tag::SymEncryptedProtectedData as u8, 1)
            .unwrap();
        assert_eq!(buf[0], 0b1100_0000 | 18);
    }
}
