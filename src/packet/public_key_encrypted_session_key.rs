use std::io;

use num_traits::FromPrimitive;
use rand::{CryptoRng, Rng};

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{read_mpi, KeyId, Mpi, PublicKeyTrait, Tag, Version};

/// Public-Key Encrypted Session Key Packet (Tag 1).
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_version: Version,
    version: u8,
    id: KeyId,
    pka: PublicKeyAlgorithm,
    mpis: Vec<Mpi>,
}

impl PublicKeyEncryptedSessionKey {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure!(input.len() >= 10, "body too short: {}", input.len());
        crate::ensure_eq!(input[0], 3, "unsupported version {}", input[0]);

        let id = KeyId::from_slice(&input[1..9])?;
        let pka = PublicKeyAlgorithm::from_u8(input[9]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("public key algorithm {}", input[9]))
        })?;

        let mut mpis = Vec::new();
        let mut rest = &input[10..];
        while !rest.is_empty() {
            let (r, mpi) = read_mpi(rest)?;
            mpis.push(mpi);
            rest = r;
        }

        Ok(PublicKeyEncryptedSessionKey {
            packet_version,
            version: input[0],
            id,
            pka,
            mpis,
        })
    }

    /// Wraps `sym_id || session_key || checksum` to `key`.
    pub fn from_session_key<R: CryptoRng + Rng>(
        rng: &mut R,
        key: &impl PublicKeyTrait,
        payload: &[u8],
    ) -> Result<Self> {
        Ok(PublicKeyEncryptedSessionKey {
            packet_version: Version::default(),
            version: 3,
            id: key.key_id()?,
            pka: key.algorithm(),
            mpis: key.encrypt_session_key(rng, payload)?,
        })
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn pka(&self) -> PublicKeyAlgorithm {
        self.pka
    }

    pub fn mpis(&self) -> &[Mpi] {
        &self.mpis
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version])?;
        self.id.to_writer(writer)?;
        writer.write_all(&[self.pka as u8])?;
        for mpi in &self.mpis {
            mpi.to_writer(writer)?;
        }

        Ok(())
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::PublicKeyEncryptedSessionKey
    }
}
