use std::io;

use num_traits::FromPrimitive;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::signature::SignatureType;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{KeyId, Tag, Version};

/// One-Pass Signature Packet, announcing an upcoming signature so readers
/// can hash the literal data in a single pass.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnePassSignature {
    packet_version: Version,
    version: u8,
    typ: SignatureType,
    hash_algorithm: HashAlgorithm,
    pka: PublicKeyAlgorithm,
    key_id: KeyId,
    /// Zero when another one-pass signature follows, non-zero otherwise.
    last: u8,
}

impl OnePassSignature {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure_eq!(input.len(), 13, "invalid body length {}", input.len());
        crate::ensure_eq!(input[0], 3, "unsupported version {}", input[0]);

        let typ = SignatureType::from_u8(input[1])
            .ok_or_else(|| Error::PacketError(format!("invalid signature type {}", input[1])))?;
        let hash_algorithm = HashAlgorithm::try_from_u8(input[2])?;
        let pka = PublicKeyAlgorithm::from_u8(input[3])
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("public key algorithm {}", input[3])))?;
        let key_id = KeyId::from_slice(&input[4..12])?;

        Ok(OnePassSignature {
            packet_version,
            version: input[0],
            typ,
            hash_algorithm,
            pka,
            key_id,
            last: input[12],
        })
    }

    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pka: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Self {
        OnePassSignature {
            packet_version: Version::default(),
            version: 3,
            typ,
            hash_algorithm,
            pka,
            key_id,
            last: 1,
        }
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn pka(&self) -> PublicKeyAlgorithm {
        self.pka
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    pub fn is_nested(&self) -> bool {
        self.last == 0
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[
            self.version,
            self.typ as u8,
            self.hash_algorithm as u8,
            self.pka as u8,
        ])?;
        self.key_id.to_writer(writer)?;
        writer.write_all(&[self.last])?;

        Ok(())
    }
}

impl PacketTrait for OnePassSignature {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::OnePassSignature
    }
}
