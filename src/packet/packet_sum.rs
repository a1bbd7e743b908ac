use std::io;

use crate::errors::{Error, Result};
use crate::packet::{
    write_packet, CompressedData, LiteralData, Marker, ModDetectionCode, OnePassSignature,
    PublicKey, PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymEncryptedProtectedData, SymKeyEncryptedSessionKey, Trust, UserAttribute,
    UserId,
};
use crate::ser::Serialize;
use crate::types::{Tag, Version};

/// The sum of all packet bodies, one variant per tag, with a raw-bytes
/// fallback for tags outside the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    OnePassSignature(OnePassSignature),
    SecretKey(SecretKey),
    PublicKey(PublicKey),
    SecretSubkey(SecretSubkey),
    CompressedData(CompressedData),
    SymEncryptedData(SymEncryptedData),
    Marker(Marker),
    LiteralData(LiteralData),
    Trust(Trust),
    UserId(UserId),
    PublicSubkey(PublicSubkey),
    UserAttribute(UserAttribute),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    ModDetectionCode(ModDetectionCode),
    Unknown(UnknownPacket),
}

impl Packet {
    /// The raw tag value of this packet.
    pub fn tag(&self) -> u8 {
        match self {
            Packet::PublicKeyEncryptedSessionKey(_) => Tag::PublicKeyEncryptedSessionKey as u8,
            Packet::Signature(_) => Tag::Signature as u8,
            Packet::SymKeyEncryptedSessionKey(_) => Tag::SymKeyEncryptedSessionKey as u8,
            Packet::OnePassSignature(_) => Tag::OnePassSignature as u8,
            Packet::SecretKey(_) => Tag::SecretKey as u8,
            Packet::PublicKey(_) => Tag::PublicKey as u8,
            Packet::SecretSubkey(_) => Tag::SecretSubkey as u8,
            Packet::CompressedData(_) => Tag::CompressedData as u8,
            Packet::SymEncryptedData(_) => Tag::SymEncryptedData as u8,
            Packet::Marker(_) => Tag::Marker as u8,
            Packet::LiteralData(_) => Tag::LiteralData as u8,
            Packet::Trust(_) => Tag::Trust as u8,
            Packet::UserId(_) => Tag::UserId as u8,
            Packet::PublicSubkey(_) => Tag::PublicSubkey as u8,
            Packet::UserAttribute(_) => Tag::UserAttribute as u8,
            Packet::SymEncryptedProtectedData(_) => Tag::SymEncryptedProtectedData as u8,
            Packet::ModDetectionCode(_) => Tag::ModDetectionCode as u8,
            Packet::Unknown(p) => p.raw_tag(),
        }
    }
}

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Packet::PublicKeyEncryptedSessionKey(p) => write_packet(writer, p),
            Packet::Signature(p) => write_packet(writer, p),
            Packet::SymKeyEncryptedSessionKey(p) => write_packet(writer, p),
            Packet::OnePassSignature(p) => write_packet(writer, p),
            Packet::SecretKey(p) => write_packet(writer, p),
            Packet::PublicKey(p) => write_packet(writer, p),
            Packet::SecretSubkey(p) => write_packet(writer, p),
            Packet::CompressedData(p) => write_packet(writer, p),
            Packet::SymEncryptedData(p) => write_packet(writer, p),
            Packet::Marker(p) => write_packet(writer, p),
            Packet::LiteralData(p) => write_packet(writer, p),
            Packet::Trust(p) => write_packet(writer, p),
            Packet::UserId(p) => write_packet(writer, p),
            Packet::PublicSubkey(p) => write_packet(writer, p),
            Packet::UserAttribute(p) => write_packet(writer, p),
            Packet::SymEncryptedProtectedData(p) => write_packet(writer, p),
            Packet::ModDetectionCode(p) => write_packet(writer, p),
            Packet::Unknown(p) => p.write_framed(writer),
        }
    }
}

macro_rules! impl_conversions {
    ($name:ident) => {
        impl From<$name> for Packet {
            fn from(p: $name) -> Packet {
                Packet::$name(p)
            }
        }

        impl TryFrom<Packet> for $name {
            type Error = Error;

            fn try_from(p: Packet) -> Result<$name> {
                match p {
                    Packet::$name(p) => Ok(p),
                    other => Err(Error::ContainerShapeViolation(format!(
                        "expected a {} packet, found tag {}",
                        stringify!($name),
                        other.tag()
                    ))),
                }
            }
        }
    };
}

impl_conversions!(PublicKeyEncryptedSessionKey);
impl_conversions!(Signature);
impl_conversions!(SymKeyEncryptedSessionKey);
impl_conversions!(OnePassSignature);
impl_conversions!(SecretKey);
impl_conversions!(PublicKey);
impl_conversions!(SecretSubkey);
impl_conversions!(CompressedData);
impl_conversions!(SymEncryptedData);
impl_conversions!(Marker);
impl_conversions!(LiteralData);
impl_conversions!(Trust);
impl_conversions!(UserId);
impl_conversions!(PublicSubkey);
impl_conversions!(UserAttribute);
impl_conversions!(SymEncryptedProtectedData);
impl_conversions!(ModDetectionCode);

/// A packet with a tag outside the taxonomy (including the experimental
/// range 60..63), kept as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPacket {
    packet_version: Version,
    tag: u8,
    data: Vec<u8>,
}

impl UnknownPacket {
    pub fn new(packet_version: Version, tag: u8, data: Vec<u8>) -> Self {
        UnknownPacket {
            packet_version,
            tag,
            data,
        }
    }

    pub fn raw_tag(&self) -> u8 {
        self.tag
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn write_framed<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.packet_version
            .write_header(writer, self.tag, self.data.len())?;
        writer.write_all(&self.data)?;
        Ok(())
    }
}
