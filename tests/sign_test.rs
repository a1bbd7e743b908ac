use chrono::{TimeZone, Utc};
use num_bigint::prime::probably_prime;
use num_bigint::{BigUint, RandPrime};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use pgp_core::composed::{CleartextSignedMessage, Deserializable, StandaloneSignature};
use pgp_core::crypto::hash::HashAlgorithm;
use pgp_core::crypto::public_key::PublicKeyAlgorithm;
use pgp_core::errors::Error;
use pgp_core::packet::{PubKeyInner, SecretKey, Subpacket, SubpacketData};
use pgp_core::ser::Serialize;
use pgp_core::types::{KeyId, KeyVersion, Mpi, PlainSecretParams, PublicParams};

/// Builds a DSA key over a safe prime, so the subgroup order divides
/// p - 1 by construction.
fn dsa_test_key(rng: &mut ChaCha8Rng) -> SecretKey {
    let (p, q) = loop {
        let q: BigUint = rng.gen_prime(160);
        let p = &q * 2u32 + 1u32;
        if probably_prime(&p, 20) {
            break (p, q);
        }
    };
    let g = BigUint::from(4u32);

    let mut buf = vec![0u8; 32];
    rng.fill(&mut buf[..]);
    let x = BigUint::from_bytes_be(&buf) % &q;
    let y = g.modpow(&x, &p);

    let details = PubKeyInner::new(
        KeyVersion::V4,
        PublicKeyAlgorithm::DSA,
        Utc.timestamp_opt(1_500_000_000, 0).unwrap(),
        None,
        PublicParams::DSA {
            p: Mpi::from_biguint(&p),
            q: Mpi::from_biguint(&q),
            g: Mpi::from_biguint(&g),
            y: Mpi::from_biguint(&y),
        },
    )
    .unwrap();

    SecretKey::from_plain(
        rng,
        details,
        PlainSecretParams::DSA {
            x: Mpi::from_biguint(&x),
        },
        None,
    )
    .unwrap()
}

#[test]
fn test_dsa_detached_signature() {
    let mut rng = ChaCha8Rng::seed_from_u64(200);
    let key = dsa_test_key(&mut rng);

    let sig =
        StandaloneSignature::sign_detached(&mut rng, &key, "", HashAlgorithm::SHA256, b"hello")
            .unwrap();

    sig.verify(&key, b"hello").unwrap();

    // altering the document must fail
    match sig.verify(&key, b"Hello") {
        Err(Error::BadSignature(_)) => {}
        other => panic!("expected BadSignature, got {:?}", other),
    }
}

#[test]
fn test_unhashed_area_is_not_covered() {
    let mut rng = ChaCha8Rng::seed_from_u64(201);
    let key = dsa_test_key(&mut rng);

    let mut sig =
        StandaloneSignature::sign_detached(&mut rng, &key, "", HashAlgorithm::SHA256, b"data")
            .unwrap();

    // replace the issuer in the unhashed area; the digest does not cover it
    sig.signature.config.unhashed_subpackets = vec![Subpacket::regular(SubpacketData::Issuer(
        KeyId::from_slice(&[0xde; 8]).unwrap(),
    ))];

    sig.signature.verify(&key, b"data").unwrap();
}

#[test]
fn test_critical_unknown_subpacket_invalidates() {
    let mut rng = ChaCha8Rng::seed_from_u64(202);
    let key = dsa_test_key(&mut rng);

    let mut sig =
        StandaloneSignature::sign_detached(&mut rng, &key, "", HashAlgorithm::SHA256, b"data")
            .unwrap();

    sig.signature
        .config
        .hashed_subpackets
        .push(Subpacket::critical(SubpacketData::Unknown {
            typ: 110,
            data: vec![1],
        }));

    assert!(matches!(
        sig.signature.verify(&key, b"data"),
        Err(Error::BadSignature(_))
    ));
}

#[test]
fn test_detached_signature_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(203);
    let key = dsa_test_key(&mut rng);

    let sig =
        StandaloneSignature::sign_detached(&mut rng, &key, "", HashAlgorithm::SHA1, b"archive")
            .unwrap();

    let bytes = sig.to_bytes().unwrap();
    let parsed = StandaloneSignature::from_slice(&bytes).unwrap();
    assert_eq!(parsed, sig);
    parsed.verify(&key, b"archive").unwrap();
}

#[test]
fn test_standalone_signature() {
    let mut rng = ChaCha8Rng::seed_from_u64(204);
    let key = dsa_test_key(&mut rng);

    let sig = StandaloneSignature::sign_standalone(&mut rng, &key, "", HashAlgorithm::SHA256)
        .unwrap();

    // a standalone signature covers only its own trailer
    sig.signature.verify(&key, b"").unwrap();
}

#[test]
fn test_cleartext_signature() {
    let mut rng = ChaCha8Rng::seed_from_u64(205);
    let key = dsa_test_key(&mut rng);

    let text = "Dear recipient,   \nthis line is canonical.\n";
    let msg = CleartextSignedMessage::sign(&mut rng, text, &key, "", HashAlgorithm::SHA256)
        .unwrap();

    msg.verify(&key).unwrap();
    assert_eq!(msg.text(), text);

    // trailing whitespace is stripped before hashing, so it does not
    // affect the signature
    let relaxed = CleartextSignedMessage::new(
        "Dear recipient,\nthis line is canonical.\n",
        msg.signature.clone(),
    );
    relaxed.verify(&key).unwrap();

    // content changes do
    let tampered = CleartextSignedMessage::new("entirely different text\n", msg.signature);
    assert!(matches!(
        tampered.verify(&key),
        Err(Error::BadSignature(_))
    ));
}

#[test]
fn test_left16_matches_digest() {
    let mut rng = ChaCha8Rng::seed_from_u64(206);
    let key = dsa_test_key(&mut rng);

    let mut sig =
        StandaloneSignature::sign_detached(&mut rng, &key, "", HashAlgorithm::SHA256, b"xyz")
            .unwrap();

    // corrupting left16 must be caught before any public key operation
    sig.signature.left16 = [
        sig.signature.left16[0].wrapping_add(1),
        sig.signature.left16[1],
    ];
    assert!(matches!(
        sig.signature.verify(&key, b"xyz"),
        Err(Error::BadSignature(_))
    ));
}
