use std::io;
use std::iter::Peekable;

use byteorder::{BigEndian, WriteBytesExt};
use log::warn;
use num_traits::FromPrimitive;
use rand::{CryptoRng, Rng};

use crate::composed::key::SignedSecretKey;
use crate::composed::shared::Deserializable;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::checksum;
use crate::errors::{Error, Result};
use crate::packet::{
    self, CompressedData, LiteralData, OnePassSignature, Packet, PublicKeyEncryptedSessionKey,
    Signature, SignatureConfig, SignatureType, SignatureVerification, SymEncryptedData,
    SymEncryptedProtectedData, SymKeyEncryptedSessionKey, write_packet,
};
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, PublicKeyTrait, SecretKeyTrait};

/// An OpenPGP message, one of the four container grammars of RFC 4880.
/// Ref: https://tools.ietf.org/html/rfc4880#section-11.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Literal(LiteralData),
    Compressed(CompressedData),
    Signed {
        /// The message the signature applies to.
        message: Option<Box<Message>>,
        one_pass_signature: Option<OnePassSignature>,
        signature: Signature,
    },
    Encrypted {
        esk: Vec<Esk>,
        edata: Edata,
    },
}

/// Encrypted session key packets leading an encrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Esk {
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
}

impl Serialize for Esk {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => write_packet(writer, p),
            Esk::SymKeyEncryptedSessionKey(p) => write_packet(writer, p),
        }
    }
}

/// The encrypted data packet of a message, with or without integrity
/// protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edata {
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
}

impl Edata {
    pub fn decrypt(&self, alg: SymmetricKeyAlgorithm, key: &[u8]) -> Result<Vec<u8>> {
        match self {
            Edata::SymEncryptedData(d) => {
                let (plaintext, quick_check) = alg.decrypt(key, d.data())?;
                if !quick_check {
                    warn!(
                        "{}",
                        Error::QuickCheckFailed("returning unverified plaintext".into())
                    );
                }
                Ok(plaintext)
            }
            Edata::SymEncryptedProtectedData(d) => alg.decrypt_protected(key, d.data()),
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Edata::SymEncryptedProtectedData(_))
    }
}

impl Serialize for Edata {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Edata::SymEncryptedData(p) => write_packet(writer, p),
            Edata::SymEncryptedProtectedData(p) => write_packet(writer, p),
        }
    }
}

impl Message {
    pub fn new_literal(file_name: impl Into<String>, data: &[u8]) -> Self {
        Message::Literal(LiteralData::new(file_name, data.to_vec()))
    }

    /// Wraps this message in a Compressed Data packet.
    pub fn compress(&self, alg: CompressionAlgorithm) -> Result<Message> {
        Ok(Message::Compressed(CompressedData::compress(
            alg,
            &self.to_bytes()?,
        )?))
    }

    /// Unwraps one level of compression, leaving other messages untouched.
    pub fn decompress(self) -> Result<Message> {
        match self {
            Message::Compressed(data) => {
                let packets = packet::from_slice(&data.decompress()?)?;
                let mut messages = Message::from_packets(packets)?;
                crate::ensure_eq!(messages.len(), 1, "expected a single compressed message");
                Ok(messages.remove(0))
            }
            other => Ok(other),
        }
    }

    /// Signs this message inline, producing the one-pass shape
    /// `OnePassSignature . message . Signature`.
    pub fn sign<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        hash: HashAlgorithm,
    ) -> Result<Message> {
        let content = self
            .get_literal()
            .ok_or_else(|| {
                Error::ContainerShapeViolation("nothing to sign: no literal data".into())
            })?
            .data()
            .to_vec();

        let config = SignatureConfig::v4_for_key(SignatureType::Binary, hash, key)?;
        let signature = config.sign_document(rng, key, passphrase, &content)?;
        let one_pass_signature =
            OnePassSignature::new(SignatureType::Binary, hash, key.algorithm(), key.key_id()?);

        Ok(Message::Signed {
            message: Some(Box::new(self)),
            one_pass_signature: Some(one_pass_signature),
            signature,
        })
    }

    /// Verifies the signature of a signed message against `key`.
    ///
    /// Returns `Undetermined` when the signature names a different signer
    /// than `key`, so nothing can be decided with the material at hand.
    pub fn verify(&self, key: &impl PublicKeyTrait) -> Result<SignatureVerification> {
        let Message::Signed {
            message, signature, ..
        } = self
        else {
            return Err(Error::ContainerShapeViolation(
                "not a signed message".into(),
            ));
        };

        if let Some(issuer) = signature.issuer() {
            if !issuer.is_wildcard() && *issuer != key.key_id()? {
                return Ok(SignatureVerification::Undetermined);
            }
        }

        let data = message
            .as_ref()
            .and_then(|m| m.get_literal())
            .map(|l| l.data().to_vec())
            .unwrap_or_default();

        match signature.verify(key, &data) {
            Ok(()) => Ok(SignatureVerification::Valid),
            Err(Error::BadSignature(err)) => {
                warn!("bad signature: {}", err);
                Ok(SignatureVerification::Invalid)
            }
            Err(err) => Err(err),
        }
    }

    /// Encrypts this message to the given public keys.
    pub fn encrypt_to_keys<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        keys: &[&impl PublicKeyTrait],
        protected: bool,
    ) -> Result<Message> {
        crate::ensure!(!keys.is_empty(), "no recipient keys");

        let session_key = alg.new_session_key(rng);

        // sym_id || key || 16 bit additive checksum, the EME payload
        let mut payload = Vec::with_capacity(session_key.len() + 3);
        payload.push(alg as u8);
        payload.extend_from_slice(&session_key);
        payload.write_u16::<BigEndian>(checksum::calculate_simple(&session_key))?;

        let mut esk = Vec::with_capacity(keys.len());
        for key in keys {
            esk.push(Esk::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_session_key(rng, *key, &payload)?,
            ));
        }

        let edata = self.encrypt_data(rng, alg, &session_key, protected)?;

        Ok(Message::Encrypted { esk, edata })
    }

    /// Encrypts this message under a passphrase: the S2K-derived key is the
    /// session key.
    pub fn encrypt_with_password<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        passphrase: &str,
        protected: bool,
    ) -> Result<Message> {
        let skesk = SymKeyEncryptedSessionKey::new(rng, alg);
        let (_, session_key) = skesk.session_key(passphrase)?;

        let edata = self.encrypt_data(rng, alg, &session_key, protected)?;

        Ok(Message::Encrypted {
            esk: vec![Esk::SymKeyEncryptedSessionKey(skesk)],
            edata,
        })
    }

    fn encrypt_data<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        alg: SymmetricKeyAlgorithm,
        session_key: &[u8],
        protected: bool,
    ) -> Result<Edata> {
        let plaintext = self.to_bytes()?;

        if protected {
            Ok(Edata::SymEncryptedProtectedData(
                SymEncryptedProtectedData::from_ciphertext(alg.encrypt_protected(
                    rng,
                    session_key,
                    &plaintext,
                )?),
            ))
        } else {
            Ok(Edata::SymEncryptedData(SymEncryptedData::from_ciphertext(
                alg.encrypt(rng, session_key, &plaintext)?,
            )))
        }
    }

    /// Decrypts an encrypted message with one of the given secret keys,
    /// peeling compression and returning the carried message.
    pub fn decrypt(&self, key_passphrase: &str, keys: &[&SignedSecretKey]) -> Result<Message> {
        let Message::Encrypted { esk, edata } = self else {
            return Err(Error::ContainerShapeViolation(
                "not an encrypted message".into(),
            ));
        };

        for key in keys {
            for esk_packet in esk {
                let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk_packet else {
                    continue;
                };

                if let Some(payload) =
                    key.decrypt_session_key_matching(key_passphrase, pkesk)?
                {
                    return Self::decrypt_payload(&payload, edata);
                }
            }
        }

        Err(Error::NoEncryptingKey(
            "no secret key matches any session key packet".into(),
        ))
    }

    /// Decrypts an encrypted message with a passphrase via its Tag 3
    /// packet.
    pub fn decrypt_with_password(&self, passphrase: &str) -> Result<Message> {
        let Message::Encrypted { esk, edata } = self else {
            return Err(Error::ContainerShapeViolation(
                "not an encrypted message".into(),
            ));
        };

        let skesk = esk
            .iter()
            .find_map(|esk| match esk {
                Esk::SymKeyEncryptedSessionKey(skesk) => Some(skesk),
                _ => None,
            })
            .ok_or_else(|| {
                Error::NoEncryptingKey("no passphrase protected session key packet".into())
            })?;

        let (alg, session_key) = skesk.session_key(passphrase)?;
        let plaintext = edata.decrypt(alg, &session_key)?;

        Self::message_from_plaintext(&plaintext)
    }

    /// Splits `sym_id || key || checksum`, validates it and decrypts.
    fn decrypt_payload(payload: &[u8], edata: &Edata) -> Result<Message> {
        crate::ensure!(payload.len() >= 4, "session key payload too short");

        let alg = SymmetricKeyAlgorithm::from_u8(payload[0]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("symmetric algorithm {}", payload[0]))
        })?;
        let (session_key, expected) = payload[1..].split_at(payload.len() - 3);
        crate::ensure_eq!(
            session_key.len(),
            alg.key_size(),
            "invalid session key length {}",
            session_key.len()
        );
        checksum::simple(expected, session_key)?;

        let plaintext = edata.decrypt(alg, session_key)?;
        Self::message_from_plaintext(&plaintext)
    }

    fn message_from_plaintext(plaintext: &[u8]) -> Result<Message> {
        let packets = packet::from_slice(plaintext)?;
        let mut messages = Message::from_packets(packets)?;
        crate::ensure_eq!(messages.len(), 1, "expected a single decrypted message");

        messages.remove(0).decompress()
    }

    /// The literal data packet held by this message, if any.
    pub fn get_literal(&self) -> Option<&LiteralData> {
        match self {
            Message::Literal(literal) => Some(literal),
            Message::Signed { message, .. } => message.as_ref().and_then(|m| m.get_literal()),
            _ => None,
        }
    }

    /// The clear bytes of the innermost literal packet.
    pub fn get_content(&self) -> Option<&[u8]> {
        self.get_literal().map(|l| l.data())
    }

    pub fn is_one_pass_signed(&self) -> bool {
        match self {
            Message::Signed {
                one_pass_signature, ..
            } => one_pass_signature.is_some(),
            _ => false,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.get_literal().is_some()
    }
}

fn next_message(packets: &mut Peekable<impl Iterator<Item = Packet>>) -> Result<Option<Message>> {
    let Some(packet) = packets.next() else {
        return Ok(None);
    };

    match packet {
        Packet::LiteralData(literal) => Ok(Some(Message::Literal(literal))),
        Packet::CompressedData(data) => Ok(Some(Message::Compressed(data))),
        Packet::Marker(_) => next_message(packets),
        Packet::OnePassSignature(ops) => {
            let message = next_message(packets)?.map(Box::new);
            match packets.next() {
                Some(Packet::Signature(signature)) => Ok(Some(Message::Signed {
                    message,
                    one_pass_signature: Some(ops),
                    signature,
                })),
                _ => Err(Error::ContainerShapeViolation(
                    "one-pass signature without a closing signature".into(),
                )),
            }
        }
        Packet::Signature(signature) => {
            let message = next_message(packets)?.map(Box::new);
            Ok(Some(Message::Signed {
                message,
                one_pass_signature: None,
                signature,
            }))
        }
        Packet::PublicKeyEncryptedSessionKey(_) | Packet::SymKeyEncryptedSessionKey(_) => {
            let mut esk = vec![match packet {
                Packet::PublicKeyEncryptedSessionKey(p) => Esk::PublicKeyEncryptedSessionKey(p),
                Packet::SymKeyEncryptedSessionKey(p) => Esk::SymKeyEncryptedSessionKey(p),
                _ => unreachable!(),
            }];

            while matches!(
                packets.peek(),
                Some(Packet::PublicKeyEncryptedSessionKey(_))
                    | Some(Packet::SymKeyEncryptedSessionKey(_))
            ) {
                match packets.next().expect("peeked") {
                    Packet::PublicKeyEncryptedSessionKey(p) => {
                        esk.push(Esk::PublicKeyEncryptedSessionKey(p))
                    }
                    Packet::SymKeyEncryptedSessionKey(p) => {
                        esk.push(Esk::SymKeyEncryptedSessionKey(p))
                    }
                    _ => unreachable!(),
                }
            }

            let edata = match packets.next() {
                Some(Packet::SymEncryptedData(d)) => Edata::SymEncryptedData(d),
                Some(Packet::SymEncryptedProtectedData(d)) => {
                    Edata::SymEncryptedProtectedData(d)
                }
                _ => {
                    return Err(Error::ContainerShapeViolation(
                        "session key packets without an encrypted data packet".into(),
                    ))
                }
            };

            Ok(Some(Message::Encrypted { esk, edata }))
        }
        Packet::SymEncryptedData(d) => Ok(Some(Message::Encrypted {
            esk: Vec::new(),
            edata: Edata::SymEncryptedData(d),
        })),
        Packet::SymEncryptedProtectedData(d) => Ok(Some(Message::Encrypted {
            esk: Vec::new(),
            edata: Edata::SymEncryptedProtectedData(d),
        })),
        other => Err(Error::ContainerShapeViolation(format!(
            "unexpected packet tag {} in a message",
            other.tag()
        ))),
    }
}

impl Deserializable for Message {
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
        let mut iter = packets.into_iter().peekable();
        let mut messages = Vec::new();

        while let Some(message) = next_message(&mut iter)? {
            messages.push(message);
        }

        Ok(messages)
    }
}

impl Serialize for Message {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Message::Literal(literal) => write_packet(writer, literal),
            Message::Compressed(data) => write_packet(writer, data),
            Message::Signed {
                message,
                one_pass_signature,
                signature,
            } => {
                if let Some(ops) = one_pass_signature {
                    write_packet(writer, ops)?;
                    if let Some(message) = message {
                        message.to_writer(writer)?;
                    }
                    write_packet(writer, signature)
                } else {
                    write_packet(writer, signature)?;
                    if let Some(message) = message {
                        message.to_writer(writer)?;
                    }
                    Ok(())
                }
            }
            Message::Encrypted { esk, edata } => {
                for esk_packet in esk {
                    esk_packet.to_writer(writer)?;
                }
                edata.to_writer(writer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_literal_roundtrip() {
        let msg = Message::new_literal("test.txt", b"hello\n");
        let bytes = msg.to_bytes().unwrap();
        let parsed = Message::from_slice(&bytes).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.get_content().unwrap(), b"hello\n");
    }

    #[test]
    fn test_compressed_roundtrip() {
        let msg = Message::new_literal("a", b"some text, compressed")
            .compress(CompressionAlgorithm::ZLIB)
            .unwrap();
        let parsed = Message::from_slice(&msg.to_bytes().unwrap()).unwrap();
        let inner = parsed.decompress().unwrap();
        assert_eq!(inner.get_content().unwrap(), b"some text, compressed");
    }

    #[test]
    fn test_password_encryption_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let msg = Message::new_literal("f", b"under a passphrase");

        let encrypted = msg
            .encrypt_with_password(&mut rng, SymmetricKeyAlgorithm::AES128, "correct horse", true)
            .unwrap();

        // container shape survives serialization
        let parsed = Message::from_slice(&encrypted.to_bytes().unwrap()).unwrap();
        let decrypted = parsed.decrypt_with_password("correct horse").unwrap();
        assert_eq!(decrypted.get_content().unwrap(), b"under a passphrase");
    }

    #[test]
    fn test_shape_violations() {
        // a user id packet is not a message
        let uid = Packet::UserId(crate::packet::UserId::from_str("a"));
        assert!(matches!(
            Message::from_packets(vec![uid]),
            Err(Error::ContainerShapeViolation(_))
        ));

        let msg = Message::new_literal("f", b"x");
        assert!(matches!(
            msg.decrypt_with_password("pw"),
            Err(Error::ContainerShapeViolation(_))
        ));
    }
}
