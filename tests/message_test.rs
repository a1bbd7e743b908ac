use pgp_core::composed::{generate_rsa_key, Deserializable, Message};
use pgp_core::crypto::hash::HashAlgorithm;
use pgp_core::crypto::sym::SymmetricKeyAlgorithm;
use pgp_core::errors::Error;
use pgp_core::packet::SignatureVerification;
use pgp_core::ser::Serialize;
use pgp_core::types::CompressionAlgorithm;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const PASSPHRASE: &str = "correct battery staple";

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let mut rng = ChaCha8Rng::seed_from_u64(100);
    let key = generate_rsa_key(&mut rng, 1024, "Alice <alice@example.org>", Some(PASSPHRASE))
        .expect("key generation");
    let public = key.public_key();

    let encrypted = Message::new_literal("test.txt", b"hello\n")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::AES256,
            &[public.encryption_key().unwrap()],
            true,
        )
        .expect("encryption");

    // through the wire
    let bytes = encrypted.to_bytes().unwrap();
    let parsed = Message::from_slice(&bytes).expect("reparse");

    let decrypted = parsed.decrypt(PASSPHRASE, &[&key]).expect("decryption");
    assert_eq!(decrypted.get_content().unwrap(), b"hello\n");
    assert_eq!(decrypted.get_literal().unwrap().file_name(), "test.txt");
}

#[test]
fn test_decrypt_with_wrong_passphrase() {
    let mut rng = ChaCha8Rng::seed_from_u64(101);
    let key = generate_rsa_key(&mut rng, 1024, "Bob <bob@example.org>", Some(PASSPHRASE)).unwrap();
    let public = key.public_key();

    let encrypted = Message::new_literal("f", b"payload")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::AES256,
            &[public.encryption_key().unwrap()],
            true,
        )
        .unwrap();

    match encrypted.decrypt("not the passphrase", &[&key]) {
        Err(Error::WrongPassphrase(_)) => {}
        other => panic!("expected WrongPassphrase, got {:?}", other),
    }
}

#[test]
fn test_tampered_ciphertext_yields_mdc_mismatch() {
    let mut rng = ChaCha8Rng::seed_from_u64(102);
    let key = generate_rsa_key(&mut rng, 1024, "Carol <carol@example.org>", Some(PASSPHRASE))
        .unwrap();
    let public = key.public_key();

    let encrypted = Message::new_literal("f", b"super secret")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::AES256,
            &[public.encryption_key().unwrap()],
            true,
        )
        .unwrap();

    let mut bytes = encrypted.to_bytes().unwrap();
    // flip a bit well inside the seipd ciphertext, which ends the stream
    let pos = bytes.len() - 5;
    bytes[pos] ^= 0x40;

    let parsed = Message::from_slice(&bytes).unwrap();
    match parsed.decrypt(PASSPHRASE, &[&key]) {
        Err(Error::MdcMismatch(_)) => {}
        other => panic!("expected MdcMismatch, got {:?}", other),
    }
}

#[test]
fn test_legacy_unprotected_encryption() {
    let mut rng = ChaCha8Rng::seed_from_u64(103);
    let key = generate_rsa_key(&mut rng, 1024, "Dan <dan@example.org>", None).unwrap();
    let public = key.public_key();

    let encrypted = Message::new_literal("f", b"old style")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::CAST5,
            &[public.encryption_key().unwrap()],
            false,
        )
        .unwrap();

    let decrypted = encrypted.decrypt("", &[&key]).unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"old style");
}

#[test]
fn test_sign_compress_encrypt_pipeline() {
    let mut rng = ChaCha8Rng::seed_from_u64(104);
    let key = generate_rsa_key(&mut rng, 1024, "Erin <erin@example.org>", Some(PASSPHRASE))
        .unwrap();
    let public = key.public_key();

    let encrypted = Message::new_literal("doc", b"signed and sealed")
        .sign(&mut rng, &key.primary_key, PASSPHRASE, HashAlgorithm::SHA256)
        .expect("signing")
        .compress(CompressionAlgorithm::ZIP)
        .expect("compression")
        .encrypt_to_keys(
            &mut rng,
            SymmetricKeyAlgorithm::AES128,
            &[public.encryption_key().unwrap()],
            true,
        )
        .expect("encryption");

    let bytes = encrypted.to_bytes().unwrap();
    let decrypted = Message::from_slice(&bytes)
        .unwrap()
        .decrypt(PASSPHRASE, &[&key])
        .expect("decryption");

    // the decrypted message is the one-pass signed message
    assert!(decrypted.is_one_pass_signed());
    assert_eq!(decrypted.get_content().unwrap(), b"signed and sealed");
    assert_eq!(
        decrypted.verify(&public).unwrap(),
        SignatureVerification::Valid
    );
}

#[test]
fn test_verify_with_unrelated_key_is_undetermined() {
    let mut rng = ChaCha8Rng::seed_from_u64(105);
    let signer = generate_rsa_key(&mut rng, 1024, "Frank <frank@example.org>", None).unwrap();
    let stranger = generate_rsa_key(&mut rng, 1024, "Grace <grace@example.org>", None).unwrap();

    let signed = Message::new_literal("f", b"who signed this?")
        .sign(&mut rng, &signer.primary_key, "", HashAlgorithm::SHA256)
        .unwrap();

    assert_eq!(
        signed.verify(&stranger.public_key()).unwrap(),
        SignatureVerification::Undetermined
    );
    assert_eq!(
        signed.verify(&signer.public_key()).unwrap(),
        SignatureVerification::Valid
    );
}

#[test]
fn test_password_only_message() {
    let mut rng = ChaCha8Rng::seed_from_u64(106);

    let encrypted = Message::new_literal("f", b"shared secret")
        .encrypt_with_password(&mut rng, SymmetricKeyAlgorithm::AES256, "opensesame", true)
        .unwrap();

    let bytes = encrypted.to_bytes().unwrap();
    let decrypted = Message::from_slice(&bytes)
        .unwrap()
        .decrypt_with_password("opensesame")
        .unwrap();
    assert_eq!(decrypted.get_content().unwrap(), b"shared secret");

    // a wrong passphrase garbles the stream; it must not decrypt cleanly
    assert!(Message::from_slice(&bytes)
        .unwrap()
        .decrypt_with_password("wrong")
        .is_err());
}
