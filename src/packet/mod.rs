mod compressed_data;
mod key;
mod literal_data;
mod many;
mod marker;
mod mod_detection_code;
mod one_pass_signature;
mod packet_sum;
mod public_key_encrypted_session_key;
pub mod signature;
mod single;
mod sym_encrypted_data;
mod sym_encrypted_protected_data;
mod sym_key_encrypted_session_key;
mod trust;
mod user_attribute;
mod user_id;

pub use self::compressed_data::*;
pub use self::key::*;
pub use self::literal_data::*;
pub use self::many::{from_slice, parser};
pub use self::marker::*;
pub use self::mod_detection_code::*;
pub use self::one_pass_signature::*;
pub use self::packet_sum::*;
pub use self::public_key_encrypted_session_key::*;
pub use self::signature::{
    Signature, SignatureConfig, SignatureType, SignatureVerification, SignatureVersion, Subpacket,
    SubpacketData,
};
pub use self::sym_encrypted_data::*;
pub use self::sym_encrypted_protected_data::*;
pub use self::sym_key_encrypted_session_key::*;
pub use self::trust::*;
pub use self::user_attribute::*;
pub use self::user_id::*;

use std::io;

use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::write_packet_length;

/// Common interface of all packet bodies.
pub trait PacketTrait: Serialize {
    fn packet_version(&self) -> Version;
    fn tag(&self) -> Tag;
}

/// Writes a full packet: header in the body's preferred dialect, then the
/// serialized body.
pub fn write_packet<W: io::Write>(writer: &mut W, packet: &impl PacketTrait) -> Result<()> {
    let body = packet.to_bytes()?;
    packet
        .packet_version()
        .write_header(writer, packet.tag() as u8, body.len())?;
    writer.write_all(&body)?;

    Ok(())
}

/// Writes a packet with a chunked body: partial chunks of `1 <<
/// chunk_power` octets, closed by a definite-length chunk. Only the data
/// packets may be framed this way.
pub fn write_packet_partial<W: io::Write>(
    writer: &mut W,
    tag: Tag,
    body: &[u8],
    chunk_power: u8,
) -> Result<()> {
    if !tag.allows_partial() {
        return Err(Error::UnknownPartial(tag as u8));
    }
    crate::ensure!(chunk_power <= 30, "chunk power {} too large", chunk_power);

    writer.write_all(&[0b1100_0000 | tag as u8])?;

    let chunk = 1usize << chunk_power;
    let mut rest = body;
    while rest.len() > chunk {
        writer.write_all(&[224 + chunk_power])?;
        writer.write_all(&rest[..chunk])?;
        rest = &rest[chunk..];
    }

    write_packet_length(rest.len(), writer)?;
    writer.write_all(rest)?;

    Ok(())
}
