use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use num_traits::FromPrimitive;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::Signature;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId, Version};
use crate::util::{read_string_lossy, write_packet_length};

/// A single signature subpacket with its critical bit.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.2.3.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subpacket {
    pub critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    pub fn regular(data: SubpacketData) -> Self {
        Subpacket {
            critical: false,
            data,
        }
    }

    pub fn critical(data: SubpacketData) -> Self {
        Subpacket {
            critical: true,
            data,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.data, SubpacketData::Unknown { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpacketData {
    SignatureCreationTime(DateTime<Utc>),
    /// Seconds after the creation time.
    SignatureExpirationTime(u32),
    ExportableCertification(bool),
    TrustSignature(u8, u8),
    RegularExpression(Vec<u8>),
    Revocable(bool),
    /// Seconds after the key creation time.
    KeyExpirationTime(u32),
    PreferredSymmetricAlgorithms(Vec<SymmetricKeyAlgorithm>),
    RevocationKey {
        class: u8,
        algorithm: PublicKeyAlgorithm,
        fingerprint: [u8; 20],
    },
    Issuer(KeyId),
    Notation {
        flags: [u8; 4],
        name: Vec<u8>,
        value: Vec<u8>,
    },
    PreferredHashAlgorithms(Vec<HashAlgorithm>),
    PreferredCompressionAlgorithms(Vec<CompressionAlgorithm>),
    KeyServerPreferences(Vec<u8>),
    PreferredKeyServer(String),
    PrimaryUserId(bool),
    PolicyUri(String),
    KeyFlags(Vec<u8>),
    SignersUserId(String),
    RevocationReason(u8, String),
    Features(Vec<u8>),
    EmbeddedSignature(Box<Signature>),
    Unknown {
        typ: u8,
        data: Vec<u8>,
    },
}

impl SubpacketData {
    fn typ(&self) -> u8 {
        match self {
            SubpacketData::SignatureCreationTime(_) => 2,
            SubpacketData::SignatureExpirationTime(_) => 3,
            SubpacketData::ExportableCertification(_) => 4,
            SubpacketData::TrustSignature(_, _) => 5,
            SubpacketData::RegularExpression(_) => 6,
            SubpacketData::Revocable(_) => 7,
            SubpacketData::KeyExpirationTime(_) => 9,
            SubpacketData::PreferredSymmetricAlgorithms(_) => 11,
            SubpacketData::RevocationKey { .. } => 12,
            SubpacketData::Issuer(_) => 16,
            SubpacketData::Notation { .. } => 20,
            SubpacketData::PreferredHashAlgorithms(_) => 21,
            SubpacketData::PreferredCompressionAlgorithms(_) => 22,
            SubpacketData::KeyServerPreferences(_) => 23,
            SubpacketData::PreferredKeyServer(_) => 24,
            SubpacketData::PrimaryUserId(_) => 25,
            SubpacketData::PolicyUri(_) => 26,
            SubpacketData::KeyFlags(_) => 27,
            SubpacketData::SignersUserId(_) => 28,
            SubpacketData::RevocationReason(_, _) => 29,
            SubpacketData::Features(_) => 30,
            SubpacketData::EmbeddedSignature(_) => 32,
            SubpacketData::Unknown { typ, .. } => *typ,
        }
    }

    fn body_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                buf.write_u32::<BigEndian>(t.timestamp() as u32)?;
            }
            SubpacketData::SignatureExpirationTime(t) | SubpacketData::KeyExpirationTime(t) => {
                buf.write_u32::<BigEndian>(*t)?;
            }
            SubpacketData::ExportableCertification(v)
            | SubpacketData::Revocable(v)
            | SubpacketData::PrimaryUserId(v) => {
                buf.write_u8(u8::from(*v))?;
            }
            SubpacketData::TrustSignature(depth, amount) => {
                buf.write_all(&[*depth, *amount])?;
            }
            SubpacketData::RegularExpression(re) => buf.write_all(re)?,
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                buf.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::RevocationKey {
                class,
                algorithm,
                fingerprint,
            } => {
                buf.write_all(&[*class, *algorithm as u8])?;
                buf.write_all(fingerprint)?;
            }
            SubpacketData::Issuer(id) => id.to_writer(&mut buf)?,
            SubpacketData::Notation { flags, name, value } => {
                buf.write_all(flags)?;
                buf.write_u16::<BigEndian>(name.len() as u16)?;
                buf.write_u16::<BigEndian>(value.len() as u16)?;
                buf.write_all(name)?;
                buf.write_all(value)?;
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                buf.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::PreferredCompressionAlgorithms(algs) => {
                buf.extend(algs.iter().map(|a| *a as u8));
            }
            SubpacketData::KeyServerPreferences(v)
            | SubpacketData::KeyFlags(v)
            | SubpacketData::Features(v) => buf.write_all(v)?,
            SubpacketData::PreferredKeyServer(s)
            | SubpacketData::PolicyUri(s)
            | SubpacketData::SignersUserId(s) => buf.write_all(s.as_bytes())?,
            SubpacketData::RevocationReason(code, reason) => {
                buf.write_u8(*code)?;
                buf.write_all(reason.as_bytes())?;
            }
            SubpacketData::EmbeddedSignature(sig) => sig.to_writer(&mut buf)?,
            SubpacketData::Unknown { data, .. } => buf.write_all(data)?,
        }

        Ok(buf)
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let body = self.data.body_bytes()?;
        write_packet_length(1 + body.len(), writer)?;
        writer.write_u8(self.data.typ() | if self.critical { 0x80 } else { 0 })?;
        writer.write_all(&body)?;

        Ok(())
    }
}

/// Subpacket lengths share the new-format octet forms, but have no partial
/// encoding: every first octet in 192..=254 starts a two-octet length.
fn read_subpacket_length(input: &[u8]) -> Result<(&[u8], usize)> {
    let first = *input
        .first()
        .ok_or_else(|| Error::MalformedHeader("empty subpacket length".into()))?
        as usize;

    if first < 192 {
        Ok((&input[1..], first))
    } else if first < 255 {
        crate::ensure!(input.len() >= 2, "truncated two-octet subpacket length");
        Ok((&input[2..], ((first - 192) << 8) + input[1] as usize + 192))
    } else {
        crate::ensure!(input.len() >= 5, "truncated five-octet subpacket length");
        Ok((&input[5..], BigEndian::read_u32(&input[1..5]) as usize))
    }
}

fn parse_data(typ: u8, data: &[u8]) -> Result<SubpacketData> {
    let take_u32 = |data: &[u8]| -> Result<u32> {
        crate::ensure_eq!(data.len(), 4, "expected 4 octets, got {}", data.len());
        Ok(BigEndian::read_u32(data))
    };
    let take_bool = |data: &[u8]| -> Result<bool> {
        crate::ensure_eq!(data.len(), 1, "expected 1 octet, got {}", data.len());
        Ok(data[0] != 0)
    };

    let parsed = match typ {
        2 => SubpacketData::SignatureCreationTime(
            Utc.timestamp_opt(i64::from(take_u32(data)?), 0)
                .single()
                .ok_or_else(|| Error::PacketError("invalid timestamp".into()))?,
        ),
        3 => SubpacketData::SignatureExpirationTime(take_u32(data)?),
        4 => SubpacketData::ExportableCertification(take_bool(data)?),
        5 => {
            crate::ensure_eq!(data.len(), 2, "invalid trust signature");
            SubpacketData::TrustSignature(data[0], data[1])
        }
        6 => SubpacketData::RegularExpression(data.to_vec()),
        7 => SubpacketData::Revocable(take_bool(data)?),
        9 => SubpacketData::KeyExpirationTime(take_u32(data)?),
        11 => SubpacketData::PreferredSymmetricAlgorithms(
            data.iter()
                .map(|id| {
                    SymmetricKeyAlgorithm::from_u8(*id).ok_or_else(|| {
                        Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", id))
                    })
                })
                .collect::<Result<_>>()?,
        ),
        12 => {
            crate::ensure_eq!(data.len(), 22, "invalid revocation key");
            let algorithm = PublicKeyAlgorithm::from_u8(data[1]).ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("public key algorithm {}", data[1]))
            })?;
            let mut fingerprint = [0u8; 20];
            fingerprint.copy_from_slice(&data[2..]);
            SubpacketData::RevocationKey {
                class: data[0],
                algorithm,
                fingerprint,
            }
        }
        16 => SubpacketData::Issuer(KeyId::from_slice(data)?),
        20 => {
            crate::ensure!(data.len() >= 8, "invalid notation");
            let name_len = BigEndian::read_u16(&data[4..6]) as usize;
            let value_len = BigEndian::read_u16(&data[6..8]) as usize;
            crate::ensure_eq!(data.len(), 8 + name_len + value_len, "invalid notation");
            let mut flags = [0u8; 4];
            flags.copy_from_slice(&data[..4]);
            SubpacketData::Notation {
                flags,
                name: data[8..8 + name_len].to_vec(),
                value: data[8 + name_len..].to_vec(),
            }
        }
        21 => SubpacketData::PreferredHashAlgorithms(
            data.iter()
                .map(|id| HashAlgorithm::try_from_u8(*id))
                .collect::<Result<_>>()?,
        ),
        22 => SubpacketData::PreferredCompressionAlgorithms(
            data.iter()
                .map(|id| {
                    CompressionAlgorithm::from_u8(*id).ok_or_else(|| {
                        Error::UnsupportedAlgorithm(format!("compression {}", id))
                    })
                })
                .collect::<Result<_>>()?,
        ),
        23 => SubpacketData::KeyServerPreferences(data.to_vec()),
        24 => SubpacketData::PreferredKeyServer(read_string_lossy(data)),
        25 => SubpacketData::PrimaryUserId(take_bool(data)?),
        26 => SubpacketData::PolicyUri(read_string_lossy(data)),
        27 => SubpacketData::KeyFlags(data.to_vec()),
        28 => SubpacketData::SignersUserId(read_string_lossy(data)),
        29 => {
            crate::ensure!(!data.is_empty(), "empty revocation reason");
            SubpacketData::RevocationReason(data[0], read_string_lossy(&data[1..]))
        }
        30 => SubpacketData::Features(data.to_vec()),
        32 => SubpacketData::EmbeddedSignature(Box::new(Signature::from_slice(
            Version::New,
            data,
        )?)),
        _ => SubpacketData::Unknown {
            typ,
            data: data.to_vec(),
        },
    };

    Ok(parsed)
}

/// Parses a full subpacket area. Subpackets that fail to parse are kept
/// raw rather than aborting the signature.
pub fn read_subpackets(input: &[u8]) -> Result<Vec<Subpacket>> {
    let mut rest = input;
    let mut out = Vec::new();

    while !rest.is_empty() {
        let (r, len) = read_subpacket_length(rest)?;
        crate::ensure!(len >= 1, "zero length subpacket");
        crate::ensure!(
            r.len() >= len,
            "subpacket length {} exceeds remaining {} octets",
            len,
            r.len()
        );

        let typ = r[0] & 0x7f;
        let critical = r[0] & 0x80 != 0;
        let data = match parse_data(typ, &r[1..len]) {
            Ok(data) => data,
            Err(err) => {
                warn!("unparseable subpacket type {}: {:?}", typ, err);
                SubpacketData::Unknown {
                    typ,
                    data: r[1..len].to_vec(),
                }
            }
        };

        out.push(Subpacket { critical, data });
        rest = &r[len..];
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roundtrip(subpackets: Vec<Subpacket>) {
        let mut buf = Vec::new();
        for sp in &subpackets {
            sp.to_writer(&mut buf).unwrap();
        }
        assert_eq!(read_subpackets(&buf).unwrap(), subpackets);
    }

    #[test]
    fn test_roundtrip() {
        roundtrip(vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc.timestamp_opt(1234567890, 0).unwrap(),
            )),
            Subpacket::regular(SubpacketData::Issuer(
                KeyId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
            )),
            Subpacket::critical(SubpacketData::KeyFlags(vec![0x03])),
            Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(vec![
                SymmetricKeyAlgorithm::AES256,
                SymmetricKeyAlgorithm::AES128,
            ])),
            Subpacket::regular(SubpacketData::Notation {
                flags: [0x80, 0, 0, 0],
                name: b"test@example.org".to_vec(),
                value: b"yes".to_vec(),
            }),
            Subpacket::regular(SubpacketData::RevocationReason(2, "compromised".into())),
            Subpacket::regular(SubpacketData::Unknown {
                typ: 105,
                data: vec![1, 2, 3],
            }),
        ]);
    }

    #[test]
    fn test_critical_bit() {
        let sp = Subpacket::critical(SubpacketData::PrimaryUserId(true));
        let buf = sp.to_bytes().unwrap();
        assert_eq!(buf, vec![0x02, 0x80 | 25, 0x01]);
    }

    #[test]
    fn test_length_overrun() {
        // declares 10 octets but only 3 remain
        assert!(read_subpackets(&[0x0a, 16, 1, 2]).is_err());
    }
}
