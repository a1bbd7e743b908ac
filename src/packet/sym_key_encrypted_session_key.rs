use std::io;

use num_traits::FromPrimitive;
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{StringToKey, Tag, Version, DEFAULT_ITER_COUNT};

/// Symmetric-Key Encrypted Session Key Packet (Tag 3).
///
/// Without an encrypted session key, the S2K output itself is the session
/// key for the data packet that follows.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymKeyEncryptedSessionKey {
    packet_version: Version,
    version: u8,
    sym_algorithm: SymmetricKeyAlgorithm,
    s2k: StringToKey,
    encrypted_key: Option<Vec<u8>>,
}

impl SymKeyEncryptedSessionKey {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure!(input.len() >= 2, "body too short: {}", input.len());
        crate::ensure_eq!(input[0], 4, "unsupported version {}", input[0]);

        let sym_algorithm = SymmetricKeyAlgorithm::from_u8(input[1]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", input[1]))
        })?;
        let (rest, s2k) = StringToKey::from_slice(&input[2..])?;

        let encrypted_key = if rest.is_empty() {
            None
        } else {
            Some(rest.to_vec())
        };

        Ok(SymKeyEncryptedSessionKey {
            packet_version,
            version: input[0],
            sym_algorithm,
            s2k,
            encrypted_key,
        })
    }

    /// Builds a passphrase-only packet: the derived key doubles as the
    /// session key.
    pub fn new<R: CryptoRng + Rng>(rng: &mut R, sym_algorithm: SymmetricKeyAlgorithm) -> Self {
        SymKeyEncryptedSessionKey {
            packet_version: Version::default(),
            version: 4,
            sym_algorithm,
            s2k: StringToKey::new_iterated(rng, HashAlgorithm::SHA256, DEFAULT_ITER_COUNT),
            encrypted_key: None,
        }
    }

    pub fn sym_algorithm(&self) -> SymmetricKeyAlgorithm {
        self.sym_algorithm
    }

    pub fn s2k(&self) -> &StringToKey {
        &self.s2k
    }

    /// Recovers `(algorithm, session_key)` using `passphrase`.
    pub fn session_key(&self, passphrase: &str) -> Result<(SymmetricKeyAlgorithm, Vec<u8>)> {
        let derived = self
            .s2k
            .derive_key(passphrase, self.sym_algorithm.key_size())?;

        match &self.encrypted_key {
            None => Ok((self.sym_algorithm, derived)),
            Some(blob) => {
                // the embedded key is CFB encrypted with a zero IV and
                // prefixed by its own algorithm octet
                let iv = vec![0u8; self.sym_algorithm.block_size()];
                let decrypted = self.sym_algorithm.decrypt_with_iv(&derived, &iv, blob)?;
                crate::ensure!(!decrypted.is_empty(), "empty encrypted session key");

                let alg = SymmetricKeyAlgorithm::from_u8(decrypted[0]).ok_or_else(|| {
                    Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", decrypted[0]))
                })?;
                Ok((alg, decrypted[1..].to_vec()))
            }
        }
    }
}

impl Serialize for SymKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version, self.sym_algorithm as u8])?;
        self.s2k.to_writer(writer)?;
        if let Some(key) = &self.encrypted_key {
            writer.write_all(key)?;
        }

        Ok(())
    }
}

impl PacketTrait for SymKeyEncryptedSessionKey {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::SymKeyEncryptedSessionKey
    }
}
