use std::io;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, TimeZone, Utc};
use num_traits::FromPrimitive;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{KeyVersion, PublicKeyTrait, PublicParams, Tag, Version};

/// The fields shared by all four key packet tags: the public portion of a
/// key.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.5.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubKeyInner {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    expiration: Option<u16>,
    public_params: PublicParams,
}

impl PubKeyInner {
    pub fn new(
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        expiration: Option<u16>,
        public_params: PublicParams,
    ) -> Result<Self> {
        if version == KeyVersion::V4 && expiration.is_some() {
            return Err(Error::MalformedKey(
                "v4 keys expire via signature subpackets, not the key packet".into(),
            ));
        }

        Ok(PubKeyInner {
            version,
            algorithm,
            created_at,
            expiration,
            public_params,
        })
    }

    /// Parses the public portion off the front of a key packet body.
    pub(crate) fn from_slice_prefix(input: &[u8]) -> Result<(&[u8], Self)> {
        crate::ensure!(input.len() >= 6, "key body too short: {}", input.len());

        let version = KeyVersion::from_u8(input[0])
            .ok_or_else(|| Error::MalformedKey(format!("unknown key version {}", input[0])))?;

        let created_at = Utc
            .timestamp_opt(i64::from(BigEndian::read_u32(&input[1..5])), 0)
            .single()
            .ok_or_else(|| Error::MalformedKey("invalid creation time".into()))?;

        let (expiration, alg_off) = match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                crate::ensure!(input.len() >= 8, "v3 key body too short");
                (Some(BigEndian::read_u16(&input[5..7])), 7)
            }
            KeyVersion::V4 => (None, 5),
        };

        let algorithm = PublicKeyAlgorithm::from_u8(input[alg_off]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("public key algorithm {}", input[alg_off]))
        })?;
        let (rest, public_params) = PublicParams::from_slice(algorithm, &input[alg_off + 1..])?;

        Ok((
            rest,
            PubKeyInner {
                version,
                algorithm,
                created_at,
                expiration: expiration.filter(|e| *e != 0),
                public_params,
            },
        ))
    }

    pub fn from_slice(input: &[u8]) -> Result<Self> {
        let (rest, key) = Self::from_slice_prefix(input)?;
        crate::ensure!(
            rest.is_empty(),
            "{} trailing bytes after public key",
            rest.len()
        );

        Ok(key)
    }
}

impl PublicKeyTrait for PubKeyInner {
    fn key_version(&self) -> KeyVersion {
        self.version
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    fn expiration(&self) -> Option<u16> {
        self.expiration
    }

    fn public_params(&self) -> &PublicParams {
        &self.public_params
    }
}

impl Serialize for PubKeyInner {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_key_bytes()?)?;
        Ok(())
    }
}

/// Public-Key Packet (Tag 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    packet_version: Version,
    inner: PubKeyInner,
}

/// Public-Subkey Packet (Tag 14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSubkey {
    packet_version: Version,
    inner: PubKeyInner,
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        impl $name {
            pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
                Ok($name {
                    packet_version,
                    inner: PubKeyInner::from_slice(input)?,
                })
            }

            pub fn from_inner(inner: PubKeyInner) -> Self {
                $name {
                    packet_version: Version::default(),
                    inner,
                }
            }

            pub fn inner(&self) -> &PubKeyInner {
                &self.inner
            }
        }

        impl PublicKeyTrait for $name {
            fn key_version(&self) -> KeyVersion {
                self.inner.key_version()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.inner.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.inner.created_at()
            }

            fn expiration(&self) -> Option<u16> {
                self.inner.expiration()
            }

            fn public_params(&self) -> &PublicParams {
                self.inner.public_params()
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.inner.to_writer(writer)
            }
        }

        impl PacketTrait for $name {
            fn packet_version(&self) -> Version {
                self.packet_version
            }

            fn tag(&self) -> Tag {
                $tag
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mpi;
    use pretty_assertions::assert_eq;

    fn rsa_key() -> PubKeyInner {
        PubKeyInner::new(
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            Utc.timestamp_opt(1500000000, 0).unwrap(),
            None,
            PublicParams::RSA {
                n: Mpi::from_slice(&[0xc5; 128]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let key = PublicKey::from_inner(rsa_key());
        let bytes = key.to_bytes().unwrap();
        assert_eq!(bytes[0], 4);
        let parsed = PublicKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed.inner(), key.inner());
    }

    #[test]
    fn test_fingerprint_and_key_id() {
        let key = rsa_key();
        let fp = key.fingerprint().unwrap();
        assert_eq!(fp.len(), 20);
        assert_eq!(key.key_id().unwrap().as_ref(), &fp[12..]);
        // deterministic
        assert_eq!(fp, key.fingerprint().unwrap());
    }
}
