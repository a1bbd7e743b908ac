use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use num_traits::FromPrimitive;
use rand::{CryptoRng, Rng};
use zeroize::Zeroize;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::checksum;
use crate::errors::{Error, Result};
use crate::packet::key::{PubKeyInner, PublicKey, PublicSubkey};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{
    EncryptedSecretParams, KeyVersion, PlainSecretParams, PublicKeyTrait, PublicParams,
    SecretKeyTrait, SecretParams, StringToKey, Tag, Version, DEFAULT_ITER_COUNT,
};

/// Secret-Key Packet (Tag 5).
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.5.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    packet_version: Version,
    details: PubKeyInner,
    secret_params: SecretParams,
}

/// Secret-Subkey Packet (Tag 7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSubkey {
    packet_version: Version,
    details: PubKeyInner,
    secret_params: SecretParams,
}

/// Parses the secret portion following the public fields, keyed off the
/// S2K usage octet.
fn read_secret_params(alg: PublicKeyAlgorithm, input: &[u8]) -> Result<SecretParams> {
    crate::ensure!(!input.is_empty(), "missing s2k usage octet");

    let usage = input[0];
    let rest = &input[1..];

    match usage {
        0 => {
            crate::ensure!(rest.len() >= 2, "missing secret key checksum");
            let (data, expected) = rest.split_at(rest.len() - 2);
            if checksum::calculate_simple(data) != BigEndian::read_u16(expected) {
                return Err(Error::MalformedKey("plaintext mpi checksum mismatch".into()));
            }

            Ok(SecretParams::Plain(PlainSecretParams::from_slice(
                alg, data,
            )?))
        }
        254 | 255 => {
            crate::ensure!(!rest.is_empty(), "missing symmetric algorithm");
            let sym = SymmetricKeyAlgorithm::from_u8(rest[0]).ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", rest[0]))
            })?;
            let (rest, s2k) = StringToKey::from_slice(&rest[1..])?;

            let bs = sym.block_size();
            crate::ensure!(rest.len() > bs, "missing iv or secret material");

            Ok(SecretParams::Encrypted(EncryptedSecretParams {
                data: rest[bs..].to_vec(),
                iv: rest[..bs].to_vec(),
                encryption_algorithm: sym,
                string_to_key: s2k,
                s2k_usage: usage,
            }))
        }
        id => {
            // pre-S2K keys name the cipher directly; MD5 of the passphrase
            // is the implied derivation
            let sym = SymmetricKeyAlgorithm::from_u8(id).ok_or_else(|| {
                Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", id))
            })?;

            let bs = sym.block_size();
            crate::ensure!(rest.len() > bs, "missing iv or secret material");

            Ok(SecretParams::Encrypted(EncryptedSecretParams {
                data: rest[bs..].to_vec(),
                iv: rest[..bs].to_vec(),
                encryption_algorithm: sym,
                string_to_key: StringToKey::Simple {
                    hash: HashAlgorithm::MD5,
                },
                s2k_usage: usage,
            }))
        }
    }
}

fn write_secret_params(params: &SecretParams, writer: &mut impl io::Write) -> Result<()> {
    match params {
        SecretParams::Plain(plain) => {
            writer.write_u8(0)?;
            let bytes = plain.to_bytes()?;
            writer.write_all(&bytes)?;
            writer.write_u16::<BigEndian>(checksum::calculate_simple(&bytes))?;
        }
        SecretParams::Encrypted(enc) => {
            writer.write_u8(enc.s2k_usage)?;
            if matches!(enc.s2k_usage, 254 | 255) {
                writer.write_u8(enc.encryption_algorithm as u8)?;
                enc.string_to_key.to_writer(writer)?;
            }
            writer.write_all(&enc.iv)?;
            writer.write_all(&enc.data)?;
        }
    }

    Ok(())
}

/// Encrypts plaintext secret parameters under `passphrase`, with a SHA-1
/// checksum inside the ciphertext (usage octet 254).
pub(crate) fn lock_secret_params<R: CryptoRng + Rng>(
    rng: &mut R,
    plain: &PlainSecretParams,
    passphrase: &str,
) -> Result<EncryptedSecretParams> {
    let alg = SymmetricKeyAlgorithm::AES128;
    let s2k = StringToKey::new_iterated(rng, HashAlgorithm::SHA256, DEFAULT_ITER_COUNT);

    let mut key = s2k.derive_key(passphrase, alg.key_size())?;
    let mut iv = vec![0u8; alg.block_size()];
    rng.fill_bytes(&mut iv);

    let mut plaintext = plain.to_bytes()?;
    let hash = HashAlgorithm::SHA1.digest(&plaintext)?;
    plaintext.extend_from_slice(&hash);

    let data = alg.encrypt_with_iv(&key, &iv, &plaintext)?;
    plaintext.zeroize();
    key.zeroize();

    Ok(EncryptedSecretParams {
        data,
        iv,
        encryption_algorithm: alg,
        string_to_key: s2k,
        s2k_usage: 254,
    })
}

macro_rules! impl_secret_key {
    ($name:ident, $tag:expr, $public:ident) => {
        impl $name {
            pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
                let (rest, details) = PubKeyInner::from_slice_prefix(input)?;
                let secret_params = read_secret_params(details.algorithm(), rest)?;

                Ok($name {
                    packet_version,
                    details,
                    secret_params,
                })
            }

            pub fn new(details: PubKeyInner, secret_params: SecretParams) -> Self {
                $name {
                    packet_version: Version::default(),
                    details,
                    secret_params,
                }
            }

            /// Builds a key packet from fresh secret material, locking it
            /// when a passphrase is given.
            pub fn from_plain<R: CryptoRng + Rng>(
                rng: &mut R,
                details: PubKeyInner,
                plain: PlainSecretParams,
                passphrase: Option<&str>,
            ) -> Result<Self> {
                let secret_params = match passphrase {
                    Some(pw) => SecretParams::Encrypted(lock_secret_params(rng, &plain, pw)?),
                    None => SecretParams::Plain(plain),
                };

                Ok($name::new(details, secret_params))
            }

            /// The public half of this key.
            pub fn public_key(&self) -> $public {
                $public::from_inner(self.details.clone())
            }

            /// Re-encrypts the secret material under a new passphrase, or
            /// stores it in the clear when `new` is `None`.
            pub fn set_passphrase<R: CryptoRng + Rng>(
                &self,
                rng: &mut R,
                old: &str,
                new: Option<&str>,
            ) -> Result<Self> {
                self.unlock(old, |plain| {
                    let secret_params = match new {
                        Some(pw) => {
                            SecretParams::Encrypted(lock_secret_params(rng, plain, pw)?)
                        }
                        None => SecretParams::Plain(plain.clone()),
                    };

                    Ok($name {
                        packet_version: self.packet_version,
                        details: self.details.clone(),
                        secret_params,
                    })
                })
            }
        }

        impl PublicKeyTrait for $name {
            fn key_version(&self) -> KeyVersion {
                self.details.key_version()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.details.algorithm()
            }

            fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
                self.details.created_at()
            }

            fn expiration(&self) -> Option<u16> {
                self.details.expiration()
            }

            fn public_params(&self) -> &PublicParams {
                self.details.public_params()
            }
        }

        impl SecretKeyTrait for $name {
            fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.details.to_writer(writer)?;
                write_secret_params(&self.secret_params, writer)
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

impl_secret_key!(SecretKey, Tag::SecretKey, PublicKey);
impl_secret_key!(SecretSubkey, Tag::SecretSubkey, PublicSubkey);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mpi;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn dsa_details() -> PubKeyInner {
        PubKeyInner::new(
            KeyVersion::V4,
            PublicKeyAlgorithm::DSA,
            Utc.timestamp_opt(1400000000, 0).unwrap(),
            None,
            PublicParams::DSA {
                p: Mpi::from_slice(&[0xfd; 64]),
                q: Mpi::from_slice(&[0xad; 20]),
                g: Mpi::from_slice(&[0x02]),
                y: Mpi::from_slice(&[0x77; 64]),
            },
        )
        .unwrap()
    }

    fn dsa_plain() -> PlainSecretParams {
        PlainSecretParams::DSA {
            x: Mpi::from_slice(&[0x13; 20]),
        }
    }

    #[test]
    fn test_plain_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let key = SecretKey::from_plain(&mut rng, dsa_details(), dsa_plain(), None).unwrap();

        let bytes = key.to_bytes().unwrap();
        let parsed = SecretKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, key);

        parsed
            .unlock("", |plain| {
                assert_eq!(plain, &dsa_plain());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_locked_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key =
            SecretKey::from_plain(&mut rng, dsa_details(), dsa_plain(), Some("hunter2")).unwrap();
        assert!(key.secret_params().is_encrypted());

        let bytes = key.to_bytes().unwrap();
        let parsed = SecretKey::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, key);

        parsed
            .unlock("hunter2", |plain| {
                assert_eq!(plain, &dsa_plain());
                Ok(())
            })
            .unwrap();

        assert!(matches!(
            parsed.unlock("wrong", |_| Ok(())),
            Err(Error::WrongPassphrase(_))
        ));
    }

    #[test]
    fn test_set_passphrase() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let key =
            SecretKey::from_plain(&mut rng, dsa_details(), dsa_plain(), Some("old")).unwrap();

        let rekeyed = key.set_passphrase(&mut rng, "old", Some("new")).unwrap();
        rekeyed.unlock("new", |_| Ok(())).unwrap();
        assert!(matches!(
            rekeyed.unlock("old", |_| Ok(())),
            Err(Error::WrongPassphrase(_))
        ));

        let bare = key.set_passphrase(&mut rng, "old", None).unwrap();
        assert!(!bare.secret_params().is_encrypted());
    }

    #[test]
    fn test_corrupted_plain_checksum() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let key = SecretKey::from_plain(&mut rng, dsa_details(), dsa_plain(), None).unwrap();
        let mut bytes = key.to_bytes().unwrap();
        let len = bytes.len();
        bytes[len - 1] ^= 0xff;

        assert!(matches!(
            SecretKey::from_slice(Version::New, &bytes),
            Err(Error::MalformedKey(_))
        ));
    }
}
