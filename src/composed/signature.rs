use std::io;

use rand::{CryptoRng, Rng};

use crate::composed::shared::Deserializable;
use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{write_packet, Packet, Signature, SignatureConfig, SignatureType};
use crate::ser::Serialize;
use crate::types::{PublicKeyTrait, SecretKeyTrait};

/// A detached signature: a lone Signature packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneSignature {
    pub signature: Signature,
}

impl StandaloneSignature {
    pub fn new(signature: Signature) -> Self {
        StandaloneSignature { signature }
    }

    /// Signs `data` as a binary document, detached.
    pub fn sign_detached<R: CryptoRng + Rng>(
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        hash: HashAlgorithm,
        data: &[u8],
    ) -> Result<Self> {
        let config = SignatureConfig::v4_for_key(SignatureType::Binary, hash, key)?;
        let signature = config.sign_document(rng, key, passphrase, data)?;

        Ok(StandaloneSignature { signature })
    }

    /// Issues a standalone signature (type 0x02): a signature over its own
    /// trailer only.
    pub fn sign_standalone<R: CryptoRng + Rng>(
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        hash: HashAlgorithm,
    ) -> Result<Self> {
        let config = SignatureConfig::v4_for_key(SignatureType::Standalone, hash, key)?;
        let signature = config.sign_document(rng, key, passphrase, &[])?;

        Ok(StandaloneSignature { signature })
    }

    /// Verifies this signature over `data`.
    pub fn verify(&self, key: &impl PublicKeyTrait, data: &[u8]) -> Result<()> {
        self.signature.verify(key, data)
    }
}

impl Deserializable for StandaloneSignature {
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
        packets
            .into_iter()
            .map(|packet| match packet {
                Packet::Signature(signature) => Ok(StandaloneSignature { signature }),
                other => Err(Error::ContainerShapeViolation(format!(
                    "expected only signature packets, found tag {}",
                    other.tag()
                ))),
            })
            .collect()
    }
}

impl Serialize for StandaloneSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_packet(writer, &self.signature)
    }
}

/// A cleartext signed message: the canonical text plus an embedded
/// detached signature. The armor framing around it is the concern of the
/// caller.
/// Ref: https://tools.ietf.org/html/rfc4880#section-7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleartextSignedMessage {
    text: String,
    pub signature: StandaloneSignature,
}

impl CleartextSignedMessage {
    pub fn new(text: impl Into<String>, signature: StandaloneSignature) -> Self {
        CleartextSignedMessage {
            text: text.into(),
            signature,
        }
    }

    /// Signs `text` as a canonical text document (type 0x01).
    pub fn sign<R: CryptoRng + Rng>(
        rng: &mut R,
        text: &str,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        hash: HashAlgorithm,
    ) -> Result<Self> {
        let config = SignatureConfig::v4_for_key(SignatureType::Text, hash, key)?;
        let canonical = Self::canonicalize(text);
        let signature = config.sign(rng, key, passphrase, &[canonical.as_slice()])?;

        Ok(CleartextSignedMessage {
            text: text.to_string(),
            signature: StandaloneSignature { signature },
        })
    }

    pub fn verify(&self, key: &impl PublicKeyTrait) -> Result<()> {
        let canonical = Self::canonicalize(&self.text);
        self.signature
            .signature
            .verify_digest(key, &[canonical.as_slice()])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The digest input: trailing spaces and tabs removed from every line,
    /// line endings normalized to `<CR><LF>`.
    fn canonicalize(text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(line.trim_end_matches([' ', '\t', '\r']).as_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonicalize() {
        assert_eq!(
            CleartextSignedMessage::canonicalize("a \nb\t\r\nc"),
            b"a\r\nb\r\nc".to_vec()
        );
        assert_eq!(CleartextSignedMessage::canonicalize(""), Vec::<u8>::new());
        assert_eq!(
            CleartextSignedMessage::canonicalize("one\n"),
            b"one\r\n".to_vec()
        );
    }
}
