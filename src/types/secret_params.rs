use std::io;

use zeroize::Zeroize;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{read_mpi, Mpi, StringToKey};

/// Storage of the secret half of a key packet: either parsed plaintext
/// MPIs, or the symmetric ciphertext blob still holding them. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }
}

/// Decrypted secret key material. Zeroed on drop.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub enum PlainSecretParams {
    RSA { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
    DSA { x: Mpi },
    Elgamal { x: Mpi },
}

impl PlainSecretParams {
    /// Parses the secret MPIs of `alg` from a decrypted blob. The blob must
    /// be consumed exactly.
    pub fn from_slice(alg: PublicKeyAlgorithm, input: &[u8]) -> Result<Self> {
        let (rest, params) = match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let (rest, d) = read_mpi(input)?;
                let (rest, p) = read_mpi(rest)?;
                let (rest, q) = read_mpi(rest)?;
                let (rest, u) = read_mpi(rest)?;
                (rest, PlainSecretParams::RSA { d, p, q, u })
            }
            PublicKeyAlgorithm::DSA => {
                let (rest, x) = read_mpi(input)?;
                (rest, PlainSecretParams::DSA { x })
            }
            PublicKeyAlgorithm::Elgamal => {
                let (rest, x) = read_mpi(input)?;
                (rest, PlainSecretParams::Elgamal { x })
            }
            _ => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "secret params for {:?}",
                    alg
                )))
            }
        };

        if !rest.is_empty() {
            return Err(Error::MalformedKey(format!(
                "{} trailing bytes after secret mpis",
                rest.len()
            )));
        }

        Ok(params)
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::RSA { d, p, q, u } => {
                d.to_writer(writer)?;
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                u.to_writer(writer)?;
            }
            PlainSecretParams::DSA { x } | PlainSecretParams::Elgamal { x } => {
                x.to_writer(writer)?;
            }
        }

        Ok(())
    }
}

/// Secret key material still under its passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecretParams {
    /// CFB encrypted MPIs, checksum included.
    pub data: Vec<u8>,
    pub iv: Vec<u8>,
    pub encryption_algorithm: SymmetricKeyAlgorithm,
    pub string_to_key: StringToKey,
    /// 254 (SHA-1 checksum), 255 (simple checksum), or a bare symmetric
    /// algorithm id for pre-S2K keys.
    pub s2k_usage: u8,
}

impl EncryptedSecretParams {
    pub fn checksum_len(&self) -> usize {
        match self.s2k_usage {
            254 => 20,
            _ => 2,
        }
    }
}
