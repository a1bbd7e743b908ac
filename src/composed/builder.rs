use chrono::{TimeZone, Utc};
use rand::{CryptoRng, Rng};

use crate::composed::key::{SignedSecretKey, SignedSecretSubKey, SignedUser};
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::rsa;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::{
    PubKeyInner, SecretKey, SecretSubkey, SignatureConfig, SignatureType, Subpacket, SubpacketData,
    UserId,
};
use crate::types::{KeyVersion, Mpi, PlainSecretParams, PublicParams};

fn rsa_key_parts<R: CryptoRng + Rng>(
    rng: &mut R,
    bits: usize,
) -> Result<(PublicParams, PlainSecretParams)> {
    let (n, e, d, p, q, u) = rsa::generate_key(rng, bits)?;

    Ok((
        PublicParams::RSA {
            n: Mpi::from_biguint(&n),
            e: Mpi::from_biguint(&e),
        },
        PlainSecretParams::RSA {
            d: Mpi::from_biguint(&d),
            p: Mpi::from_biguint(&p),
            q: Mpi::from_biguint(&q),
            u: Mpi::from_biguint(&u),
        },
    ))
}

/// Generates a fresh RSA key: a signing/certifying primary key, one
/// encryption subkey bound to it, and a positive self-certification of
/// `user_id`. Secret material is locked under `passphrase` when given.
pub fn generate_rsa_key<R: CryptoRng + Rng>(
    rng: &mut R,
    bits: usize,
    user_id: &str,
    passphrase: Option<&str>,
) -> Result<SignedSecretKey> {
    let created = Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap();
    let unlock = passphrase.unwrap_or("");

    // primary
    let (public_params, secret_params) = rsa_key_parts(rng, bits)?;
    let details = PubKeyInner::new(
        KeyVersion::V4,
        PublicKeyAlgorithm::RSA,
        created,
        None,
        public_params,
    )?;
    let primary = SecretKey::from_plain(rng, details, secret_params, passphrase)?;

    // self certification
    let id = UserId::from_str(user_id);
    let mut config =
        SignatureConfig::v4_for_key(SignatureType::CertPositive, HashAlgorithm::SHA256, &primary)?;
    config.hashed_subpackets.extend([
        // certify and sign
        Subpacket::regular(SubpacketData::KeyFlags(vec![0x03])),
        Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(vec![
            SymmetricKeyAlgorithm::AES256,
            SymmetricKeyAlgorithm::AES192,
            SymmetricKeyAlgorithm::AES128,
        ])),
        Subpacket::regular(SubpacketData::PreferredHashAlgorithms(vec![
            HashAlgorithm::SHA256,
            HashAlgorithm::SHA512,
        ])),
    ]);
    let certification = config.sign_certification(rng, &primary, unlock, &primary, &id)?;

    // encryption subkey with its binding
    let (sub_public, sub_secret) = rsa_key_parts(rng, bits)?;
    let sub_details = PubKeyInner::new(
        KeyVersion::V4,
        PublicKeyAlgorithm::RSA,
        created,
        None,
        sub_public,
    )?;
    let subkey = SecretSubkey::from_plain(rng, sub_details, sub_secret, passphrase)?;

    let mut binding_config = SignatureConfig::v4_for_key(
        SignatureType::SubkeyBinding,
        HashAlgorithm::SHA256,
        &primary,
    )?;
    binding_config
        .hashed_subpackets
        // encrypt communications and storage
        .push(Subpacket::regular(SubpacketData::KeyFlags(vec![0x0c])));
    let binding = binding_config.sign_subkey_binding(rng, &primary, unlock, &subkey)?;

    Ok(SignedSecretKey {
        primary_key: primary,
        revocation_signatures: Vec::new(),
        direct_signatures: Vec::new(),
        users: vec![SignedUser {
            id,
            signatures: vec![certification],
        }],
        user_attributes: Vec::new(),
        secret_subkeys: vec![SignedSecretSubKey {
            key: subkey,
            signatures: vec![binding],
        }],
    })
}
