use log::warn;
use nom::number::complete::{be_u16, be_u32, be_u8};
use nom::IResult;
use num_traits::FromPrimitive;

use crate::errors::{Error, Result};
use crate::packet::{
    CompressedData, LiteralData, Marker, ModDetectionCode, OnePassSignature, Packet, PublicKey,
    PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymEncryptedProtectedData, SymKeyEncryptedSessionKey, Trust, UnknownPacket,
    UserAttribute, UserId,
};
use crate::types::{PacketLength, Tag, Version};

/// Parses a new-format length octet sequence.
/// Ref: https://tools.ietf.org/html/rfc4880#section-4.2.2
fn read_packet_len(input: &[u8]) -> IResult<&[u8], PacketLength> {
    let (input, olen) = be_u8(input)?;
    match olen {
        // One-Octet Lengths
        0..=191 => Ok((input, PacketLength::Fixed(olen as usize))),
        // Two-Octet Lengths
        192..=223 => {
            let (input, second) = be_u8(input)?;
            Ok((
                input,
                PacketLength::Fixed(((olen as usize - 192) << 8) + 192 + second as usize),
            ))
        }
        // Partial Body Lengths
        224..=254 => Ok((input, PacketLength::Partial(1 << (olen as usize & 0x1f)))),
        // Five-Octet Lengths
        255 => {
            let (input, len) = be_u32(input)?;
            Ok((input, PacketLength::Fixed(len as usize)))
        }
    }
}

/// Parses a packet header in either dialect.
/// Ref: https://tools.ietf.org/html/rfc4880#section-4.2
fn packet_header(input: &[u8]) -> IResult<&[u8], (Version, u8, PacketLength)> {
    let (input, head) = be_u8(input)?;
    if head & 0x80 == 0 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }

    if head & 0x40 != 0 {
        // new format: six tag bits, then the length octets
        let tag = head & 0x3f;
        let (input, length) = read_packet_len(input)?;
        Ok((input, (Version::New, tag, length)))
    } else {
        // old format: four tag bits, two length-type bits
        let tag = (head >> 2) & 0x0f;
        let (input, length) = match head & 0b11 {
            0 => {
                let (input, len) = be_u8(input)?;
                (input, PacketLength::Fixed(len as usize))
            }
            1 => {
                let (input, len) = be_u16(input)?;
                (input, PacketLength::Fixed(len as usize))
            }
            2 => {
                let (input, len) = be_u32(input)?;
                (input, PacketLength::Fixed(len as usize))
            }
            _ => (input, PacketLength::Indeterminate),
        };
        Ok((input, (Version::Old, tag, length)))
    }
}

/// Reads one packet off the front of `input`, returning the remaining
/// bytes. Framing problems fail the outer `Result`; a body that does not
/// parse is reported in the inner one, so callers can skip it and go on.
#[allow(clippy::type_complexity)]
pub fn next_packet(input: &[u8]) -> Result<(&[u8], Result<Packet>)> {
    let (rest, (version, tag, length)) = packet_header(input)
        .map_err(|_| Error::MalformedHeader(format!("{} bytes remaining", input.len())))?;

    let (rest, body) = match length {
        PacketLength::Fixed(len) => {
            if rest.len() < len {
                return Err(Error::MalformedHeader(format!(
                    "declared length {} overruns the remaining {} bytes",
                    len,
                    rest.len()
                )));
            }
            (&rest[len..], rest[..len].to_vec())
        }
        PacketLength::Indeterminate => (&rest[rest.len()..], rest.to_vec()),
        PacketLength::Partial(first) => {
            match Tag::from_u8(tag) {
                Some(t) if t.allows_partial() => {}
                _ => return Err(Error::UnknownPartial(tag)),
            }

            read_partial_body(rest, first)?
        }
    };

    Ok((rest, body_parser(version, tag, &body)))
}

/// Reassembles a chunked body: any number of partial lengths, closed by a
/// definite length chunk.
fn read_partial_body(input: &[u8], first: usize) -> Result<(&[u8], Vec<u8>)> {
    let mut body = Vec::new();
    let mut rest = input;
    let mut chunk = PacketLength::Partial(first);

    loop {
        let len = match chunk {
            PacketLength::Partial(len) | PacketLength::Fixed(len) => len,
            PacketLength::Indeterminate => {
                return Err(Error::MalformedHeader(
                    "indeterminate length in a chunked body".into(),
                ))
            }
        };
        if rest.len() < len {
            return Err(Error::MalformedHeader(format!(
                "chunk length {} overruns the remaining {} bytes",
                len,
                rest.len()
            )));
        }

        body.extend_from_slice(&rest[..len]);
        rest = &rest[len..];

        if let PacketLength::Fixed(_) = chunk {
            // the final chunk carries a definite length
            return Ok((rest, body));
        }

        let (r, next) = read_packet_len(rest)
            .map_err(|_| Error::MalformedHeader("truncated chunk length".into()))?;
        rest = r;
        chunk = next;
    }
}

/// Dispatches a packet body to its parser by tag. Unknown tags are not
/// fatal: they come back as opaque packets preserving the raw bytes.
pub fn body_parser(version: Version, tag: u8, body: &[u8]) -> Result<Packet> {
    let Some(known) = Tag::from_u8(tag) else {
        warn!("{}", Error::UnknownTag(tag));
        return Ok(Packet::Unknown(UnknownPacket::new(
            version,
            tag,
            body.to_vec(),
        )));
    };

    match known {
        Tag::PublicKeyEncryptedSessionKey => {
            PublicKeyEncryptedSessionKey::from_slice(version, body).map(Into::into)
        }
        Tag::Signature => Signature::from_slice(version, body).map(Into::into),
        Tag::SymKeyEncryptedSessionKey => {
            SymKeyEncryptedSessionKey::from_slice(version, body).map(Into::into)
        }
        Tag::OnePassSignature => OnePassSignature::from_slice(version, body).map(Into::into),
        Tag::SecretKey => SecretKey::from_slice(version, body).map(Into::into),
        Tag::PublicKey => PublicKey::from_slice(version, body).map(Into::into),
        Tag::SecretSubkey => SecretSubkey::from_slice(version, body).map(Into::into),
        Tag::CompressedData => CompressedData::from_slice(version, body).map(Into::into),
        Tag::SymEncryptedData => SymEncryptedData::from_slice(version, body).map(Into::into),
        Tag::Marker => Marker::from_slice(version, body).map(Into::into),
        Tag::LiteralData => LiteralData::from_slice(version, body).map(Into::into),
        Tag::Trust => Trust::from_slice(version, body).map(Into::into),
        Tag::UserId => UserId::from_slice(version, body).map(Into::into),
        Tag::PublicSubkey => PublicSubkey::from_slice(version, body).map(Into::into),
        Tag::UserAttribute => UserAttribute::from_slice(version, body).map(Into::into),
        Tag::SymEncryptedProtectedData => {
            SymEncryptedProtectedData::from_slice(version, body).map(Into::into)
        }
        Tag::ModDetectionCode => ModDetectionCode::from_slice(version, body).map(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::Serialize;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_format_one_octet() {
        // tag 6, new format, length 5, body "Hello"
        let raw = hex!("c6 05 48 65 6c 6c 6f");

        let (rest, (version, tag, length)) = packet_header(&raw).unwrap();
        assert_eq!(version, Version::New);
        assert_eq!(tag, 6);
        assert_eq!(length, PacketLength::Fixed(5));
        assert_eq!(rest, b"Hello");
    }

    #[test]
    fn test_old_format_two_octet() {
        // tag 2, old format, two-octet length 4
        let raw = hex!("89 00 04 de ad be ef");

        let (rest, (version, tag, length)) = packet_header(&raw).unwrap();
        assert_eq!(version, Version::Old);
        assert_eq!(tag, 2);
        assert_eq!(length, PacketLength::Fixed(4));
        assert_eq!(rest, &hex!("de ad be ef"));
    }

    #[test]
    fn test_old_format_indeterminate() {
        // literal data via old format, indeterminate length
        let mut old = vec![0b1000_0000 | (11 << 2) | 3];
        old.extend_from_slice(&hex!("62 00 74 65 73 74 2e"));
        let (rest, (version, tag, length)) = packet_header(&old).unwrap();
        assert_eq!(version, Version::Old);
        assert_eq!(tag, 11);
        assert_eq!(length, PacketLength::Indeterminate);
        assert_eq!(rest.len(), 7);
    }

    #[test]
    fn test_length_overrun_is_malformed() {
        // declares 5 bytes, carries 2
        let raw = hex!("c6 05 48 65");
        assert!(matches!(
            next_packet(&raw),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_unknown_tag_is_opaque() {
        // tag 60 (experimental), new format
        let raw = hex!("fc 03 01 02 03");
        let (rest, packet) = next_packet(&raw).unwrap();
        assert!(rest.is_empty());

        match packet.unwrap() {
            Packet::Unknown(p) => {
                assert_eq!(p.raw_tag(), 60);
                assert_eq!(p.data(), &[1, 2, 3]);
            }
            other => panic!("expected unknown packet, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_packet_roundtrip() {
        let raw = hex!("fc 03 01 02 03");
        let (_, packet) = next_packet(&raw).unwrap();
        assert_eq!(packet.unwrap().to_bytes().unwrap(), raw.to_vec());
    }

    #[test]
    fn test_partial_not_allowed_for_tag() {
        // tag 13 (user id) with a partial length octet (0xe1 => 2 bytes)
        let raw = hex!("cd e1 61 61 00");
        assert!(matches!(
            next_packet(&raw),
            Err(Error::UnknownPartial(13))
        ));
    }

    #[test]
    fn test_partial_body_reassembly() {
        let literal = crate::packet::LiteralData::new("f", b"0123456789abcdef-tail".to_vec());
        let body = literal.to_bytes().unwrap();

        // chunk the body: 2^4 = 16 byte chunks, then a final definite chunk
        let mut framed = Vec::new();
        crate::packet::write_packet_partial(&mut framed, Tag::LiteralData, &body, 4).unwrap();

        let (rest, packet) = next_packet(&framed).unwrap();
        assert!(rest.is_empty());
        match packet.unwrap() {
            Packet::LiteralData(parsed) => assert_eq!(parsed, literal),
            other => panic!("expected literal data, got {:?}", other),
        }

        // the reassembled packet serializes identically to the unchunked one
        let plain = Packet::LiteralData(literal).to_bytes().unwrap();
        let (_, reparsed) = next_packet(&plain).unwrap();
        assert!(matches!(reparsed.unwrap(), Packet::LiteralData(_)));
    }
}
