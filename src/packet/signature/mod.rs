mod subpacket;

pub use self::subpacket::*;

use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::user_attribute::UserAttribute;
use crate::packet::user_id::UserId;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{read_mpi, KeyId, Mpi, PublicKeyTrait, SecretKeyTrait, Tag, Version};

/// Ref: https://tools.ietf.org/html/rfc4880#section-5.2.1
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum SignatureType {
    /// Signature of a binary document
    Binary = 0x00,
    /// Signature of a canonical text document
    Text = 0x01,
    Standalone = 0x02,
    /// Generic certification of a User ID and Public-Key packet
    CertGeneric = 0x10,
    /// Persona certification
    CertPersona = 0x11,
    /// Casual certification
    CertCasual = 0x12,
    /// Positive certification
    CertPositive = 0x13,
    SubkeyBinding = 0x18,
    /// Primary Key Binding, issued by a signing subkey
    KeyBinding = 0x19,
    /// Signature directly on a key
    Key = 0x1f,
    KeyRevocation = 0x20,
    SubkeyRevocation = 0x28,
    CertRevocation = 0x30,
    Timestamp = 0x40,
    ThirdParty = 0x50,
}

impl SignatureType {
    pub fn is_certification(self) -> bool {
        matches!(
            self,
            SignatureType::CertGeneric
                | SignatureType::CertPersona
                | SignatureType::CertCasual
                | SignatureType::CertPositive
        )
    }

    pub fn is_revocation(self) -> bool {
        matches!(
            self,
            SignatureType::KeyRevocation
                | SignatureType::SubkeyRevocation
                | SignatureType::CertRevocation
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum SignatureVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,
}

impl SignatureVersion {
    fn is_v3(self) -> bool {
        matches!(self, SignatureVersion::V2 | SignatureVersion::V3)
    }
}

/// Outcome of verifying a signature against a candidate signer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SignatureVerification {
    Valid,
    Invalid,
    /// The signer is not known, so nothing can be said.
    Undetermined,
}

/// Everything that determines the digest of a signature: its metadata and
/// the hashed subpacket area. The unhashed area travels along but is not
/// covered by the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureConfig {
    pub version: SignatureVersion,
    pub typ: SignatureType,
    pub pka: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,
    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,
    /// V3 signatures carry the creation time outside any subpacket.
    pub created: Option<DateTime<Utc>>,
    /// V3 signatures carry the issuer outside any subpacket.
    pub issuer: Option<KeyId>,
}

impl SignatureConfig {
    pub fn v4(typ: SignatureType, pka: PublicKeyAlgorithm, hash_alg: HashAlgorithm) -> Self {
        SignatureConfig {
            version: SignatureVersion::V4,
            typ,
            pka,
            hash_alg,
            hashed_subpackets: Vec::new(),
            unhashed_subpackets: Vec::new(),
            created: None,
            issuer: None,
        }
    }

    /// A V4 config carrying the conventional subpackets: creation time in
    /// the hashed area, issuer in the unhashed one.
    pub fn v4_for_key(
        typ: SignatureType,
        hash_alg: HashAlgorithm,
        key: &impl PublicKeyTrait,
    ) -> Result<Self> {
        let mut config = Self::v4(typ, key.algorithm(), hash_alg);
        config.hashed_subpackets = vec![Subpacket::regular(SubpacketData::SignatureCreationTime(
            Utc.timestamp_opt(Utc::now().timestamp(), 0).unwrap(),
        ))];
        config.unhashed_subpackets =
            vec![Subpacket::regular(SubpacketData::Issuer(key.key_id()?))];

        Ok(config)
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        if self.version.is_v3() {
            return self.created.as_ref();
        }
        self.hashed_subpackets.iter().find_map(|sp| match &sp.data {
            SubpacketData::SignatureCreationTime(t) => Some(t),
            _ => None,
        })
    }

    pub fn issuer(&self) -> Option<&KeyId> {
        if self.version.is_v3() {
            return self.issuer.as_ref();
        }
        self.hashed_subpackets
            .iter()
            .chain(self.unhashed_subpackets.iter())
            .find_map(|sp| match &sp.data {
                SubpacketData::Issuer(id) => Some(id),
                _ => None,
            })
    }

    fn hashed_area_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for sp in &self.hashed_subpackets {
            sp.to_writer(&mut buf)?;
        }
        Ok(buf)
    }

    /// The trailer appended to the content bytes before hashing.
    /// Ref: https://tools.ietf.org/html/rfc4880#section-5.2.4
    fn digest_trailer(&self) -> Result<Vec<u8>> {
        if self.version.is_v3() {
            let created = self.created.as_ref().ok_or_else(|| {
                Error::BadSignature("v3 signature without creation time".into())
            })?;

            let mut buf = Vec::with_capacity(5);
            buf.write_u8(self.typ as u8)?;
            buf.write_u32::<BigEndian>(created.timestamp() as u32)?;
            return Ok(buf);
        }

        let area = self.hashed_area_bytes()?;
        let mut buf = Vec::with_capacity(area.len() + 12);
        buf.write_all(&[
            self.version as u8,
            self.typ as u8,
            self.pka as u8,
            self.hash_alg as u8,
        ])?;
        buf.write_u16::<BigEndian>(area.len() as u16)?;
        buf.write_all(&area)?;
        // final trailer: length of the hashed material, including the six
        // octets preceding the subpacket area
        buf.write_all(&[0x04, 0xff])?;
        buf.write_u32::<BigEndian>(6 + area.len() as u32)?;

        Ok(buf)
    }

    /// Hashes the content pieces followed by the signature trailer.
    pub fn compute_digest(&self, content: &[&[u8]]) -> Result<Vec<u8>> {
        let mut hasher = self.hash_alg.new_hasher()?;
        for chunk in content {
            hasher.update(chunk);
        }
        hasher.update(&self.digest_trailer()?);

        Ok(hasher.finalize_reset().to_vec())
    }

    /// The framing of user data in certification preimages. V3 signatures
    /// hash the bare bytes.
    fn user_frame(&self, prefix: u8, bytes: &[u8]) -> Vec<u8> {
        if self.version.is_v3() {
            return bytes.to_vec();
        }

        let mut buf = Vec::with_capacity(bytes.len() + 5);
        buf.push(prefix);
        buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        buf.extend_from_slice(bytes);
        buf
    }

    /// Produces a signature over the assembled content bytes.
    pub fn sign<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        content: &[&[u8]],
    ) -> Result<Signature> {
        let digest = self.compute_digest(content)?;
        let left16 = [digest[0], digest[1]];
        let mpis = key.create_signature(rng, passphrase, self.hash_alg, &digest)?;

        Ok(Signature {
            packet_version: Version::default(),
            config: self,
            left16,
            mpis,
        })
    }

    /// Signs a binary or canonical text document.
    pub fn sign_document<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        data: &[u8],
    ) -> Result<Signature> {
        let content = document_content(self.typ, data)?;
        self.sign(rng, key, passphrase, &[content.as_slice()])
    }

    /// Certifies `(signee, id)` with `key`.
    pub fn sign_certification<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        signee: &impl PublicKeyTrait,
        id: &UserId,
    ) -> Result<Signature> {
        crate::ensure!(
            self.typ.is_certification() || self.typ == SignatureType::CertRevocation,
            "invalid certification type {:?}",
            self.typ
        );

        let key_bytes = signee.to_signing_bytes()?;
        let user_bytes = self.user_frame(0xb4, id.id().as_bytes());
        self.sign(rng, key, passphrase, &[key_bytes.as_slice(), user_bytes.as_slice()])
    }

    /// Binds `subkey` to `primary` (type 0x18, or 0x28 for revocations).
    pub fn sign_subkey_binding<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        primary: &impl SecretKeyTrait,
        passphrase: &str,
        subkey: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        let primary_bytes = primary.to_signing_bytes()?;
        let subkey_bytes = subkey.to_signing_bytes()?;
        self.sign(rng, primary, passphrase, &[primary_bytes.as_slice(), subkey_bytes.as_slice()])
    }

    /// Issues a direct key signature or key revocation over `signee`.
    pub fn sign_key<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &impl SecretKeyTrait,
        passphrase: &str,
        signee: &impl PublicKeyTrait,
    ) -> Result<Signature> {
        let key_bytes = signee.to_signing_bytes()?;
        self.sign(rng, key, passphrase, &[key_bytes.as_slice()])
    }
}

/// Content bytes of a document signature, by type.
fn document_content(typ: SignatureType, data: &[u8]) -> Result<Vec<u8>> {
    match typ {
        SignatureType::Binary => Ok(data.to_vec()),
        SignatureType::Text => Ok(text_to_crlf(data)),
        SignatureType::Standalone | SignatureType::Timestamp | SignatureType::ThirdParty => {
            Ok(Vec::new())
        }
        t => Err(Error::BadSignature(format!(
            "{:?} is not a document signature type",
            t
        ))),
    }
}

/// Normalizes line endings to `<CR><LF>`, the canonical form hashed by
/// text signatures.
pub(crate) fn text_to_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' if i + 1 < data.len() && data[i + 1] == b'\n' => {
                out.extend_from_slice(b"\r\n");
                i += 2;
            }
            b'\r' | b'\n' => {
                out.extend_from_slice(b"\r\n");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Signature Packet (Tag 2).
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    packet_version: Version,
    pub config: SignatureConfig,
    /// The left 16 bits of the signed digest.
    pub left16: [u8; 2],
    pub mpis: Vec<Mpi>,
}

impl Signature {
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure!(!input.is_empty(), "empty signature body");

        let version = SignatureVersion::from_u8(input[0])
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("signature version {}", input[0])))?;

        if version.is_v3() {
            Self::from_slice_v3(packet_version, version, input)
        } else {
            Self::from_slice_v4(packet_version, version, input)
        }
    }

    fn from_slice_v3(packet_version: Version, version: SignatureVersion, input: &[u8]) -> Result<Self> {
        crate::ensure!(input.len() >= 19, "v3 body too short: {}", input.len());
        crate::ensure_eq!(input[1], 5, "invalid v3 hashed material length {}", input[1]);

        let typ = SignatureType::from_u8(input[2])
            .ok_or_else(|| Error::PacketError(format!("invalid signature type {}", input[2])))?;
        let created = Utc
            .timestamp_opt(i64::from(BigEndian::read_u32(&input[3..7])), 0)
            .single()
            .ok_or_else(|| Error::PacketError("invalid timestamp".into()))?;
        let issuer = KeyId::from_slice(&input[7..15])?;
        let pka = PublicKeyAlgorithm::from_u8(input[15]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("public key algorithm {}", input[15]))
        })?;
        let hash_alg = HashAlgorithm::try_from_u8(input[16])?;
        let left16 = [input[17], input[18]];
        let mpis = read_mpis(&input[19..])?;

        Ok(Signature {
            packet_version,
            config: SignatureConfig {
                version,
                typ,
                pka,
                hash_alg,
                hashed_subpackets: Vec::new(),
                unhashed_subpackets: Vec::new(),
                created: Some(created),
                issuer: Some(issuer),
            },
            left16,
            mpis,
        })
    }

    fn from_slice_v4(packet_version: Version, version: SignatureVersion, input: &[u8]) -> Result<Self> {
        crate::ensure!(input.len() >= 10, "v4 body too short: {}", input.len());

        let typ = SignatureType::from_u8(input[1])
            .ok_or_else(|| Error::PacketError(format!("invalid signature type {}", input[1])))?;
        let pka = PublicKeyAlgorithm::from_u8(input[2]).ok_or_else(|| {
            Error::UnsupportedAlgorithm(format!("public key algorithm {}", input[2]))
        })?;
        let hash_alg = HashAlgorithm::try_from_u8(input[3])?;

        let hashed_len = BigEndian::read_u16(&input[4..6]) as usize;
        crate::ensure!(input.len() >= 6 + hashed_len + 2, "truncated hashed area");
        let hashed_subpackets = read_subpackets(&input[6..6 + hashed_len])?;

        let rest = &input[6 + hashed_len..];
        let unhashed_len = BigEndian::read_u16(&rest[..2]) as usize;
        crate::ensure!(rest.len() >= 2 + unhashed_len + 2, "truncated unhashed area");
        let unhashed_subpackets = read_subpackets(&rest[2..2 + unhashed_len])?;

        let rest = &rest[2 + unhashed_len..];
        let left16 = [rest[0], rest[1]];
        let mpis = read_mpis(&rest[2..])?;

        Ok(Signature {
            packet_version,
            config: SignatureConfig {
                version,
                typ,
                pka,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
                created: None,
                issuer: None,
            },
            left16,
            mpis,
        })
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    pub fn issuer(&self) -> Option<&KeyId> {
        self.config.issuer()
    }

    /// Checks the reconstructed digest against the stored signature.
    pub fn verify_digest(&self, key: &impl PublicKeyTrait, content: &[&[u8]]) -> Result<()> {
        // a critical subpacket we cannot interpret invalidates the signature
        if let Some(sp) = self
            .config
            .hashed_subpackets
            .iter()
            .find(|sp| sp.critical && sp.is_unknown())
        {
            return Err(Error::BadSignature(format!(
                "critical unknown subpacket {:?}",
                sp.data
            )));
        }

        let digest = self.config.compute_digest(content)?;
        if digest[..2] != self.left16 {
            return Err(Error::BadSignature(
                "left 16 bits of the digest differ".into(),
            ));
        }

        key.verify_signature(self.config.hash_alg, &digest, &self.mpis)
    }

    /// Verifies a document signature (binary or canonical text) over `data`.
    pub fn verify(&self, key: &impl PublicKeyTrait, data: &[u8]) -> Result<()> {
        let content = document_content(self.typ(), data)?;
        self.verify_digest(key, &[content.as_slice()])
    }

    /// Verifies a certification (0x10..0x13, or its revocation 0x30) of
    /// `(signee, id)`.
    pub fn verify_certification(
        &self,
        key: &impl PublicKeyTrait,
        signee: &impl PublicKeyTrait,
        id: &UserId,
    ) -> Result<()> {
        let key_bytes = signee.to_signing_bytes()?;
        let user_bytes = self.config.user_frame(0xb4, id.id().as_bytes());
        self.verify_digest(key, &[key_bytes.as_slice(), user_bytes.as_slice()])
    }

    pub fn verify_attribute_certification(
        &self,
        key: &impl PublicKeyTrait,
        signee: &impl PublicKeyTrait,
        attr: &UserAttribute,
    ) -> Result<()> {
        let key_bytes = signee.to_signing_bytes()?;
        let user_bytes = self.config.user_frame(0xd1, attr.data());
        self.verify_digest(key, &[key_bytes.as_slice(), user_bytes.as_slice()])
    }

    /// Verifies a subkey binding (0x18, 0x19 or 0x28) between `primary` and
    /// `subkey`, checked against the signing key `key`.
    pub fn verify_binding(
        &self,
        key: &impl PublicKeyTrait,
        primary: &impl PublicKeyTrait,
        subkey: &impl PublicKeyTrait,
    ) -> Result<()> {
        let primary_bytes = primary.to_signing_bytes()?;
        let subkey_bytes = subkey.to_signing_bytes()?;
        self.verify_digest(key, &[primary_bytes.as_slice(), subkey_bytes.as_slice()])
    }

    /// Verifies a direct key signature or key revocation (0x1f, 0x20) over
    /// `signee`.
    pub fn verify_key(&self, key: &impl PublicKeyTrait, signee: &impl PublicKeyTrait) -> Result<()> {
        let key_bytes = signee.to_signing_bytes()?;
        self.verify_digest(key, &[key_bytes.as_slice()])
    }
}

fn read_mpis(input: &[u8]) -> Result<Vec<Mpi>> {
    let mut mpis = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (r, mpi) = read_mpi(rest)?;
        mpis.push(mpi);
        rest = r;
    }
    Ok(mpis)
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let config = &self.config;
        writer.write_u8(config.version as u8)?;

        if config.version.is_v3() {
            let created = config
                .created
                .as_ref()
                .ok_or_else(|| Error::BadSignature("v3 signature without creation time".into()))?;
            let issuer = config
                .issuer
                .as_ref()
                .ok_or_else(|| Error::BadSignature("v3 signature without issuer".into()))?;

            writer.write_u8(5)?;
            writer.write_u8(config.typ as u8)?;
            writer.write_u32::<BigEndian>(created.timestamp() as u32)?;
            issuer.to_writer(writer)?;
            writer.write_all(&[config.pka as u8, config.hash_alg as u8])?;
        } else {
            writer.write_all(&[
                config.typ as u8,
                config.pka as u8,
                config.hash_alg as u8,
            ])?;

            let hashed = config.hashed_area_bytes()?;
            writer.write_u16::<BigEndian>(hashed.len() as u16)?;
            writer.write_all(&hashed)?;

            let mut unhashed = Vec::new();
            for sp in &config.unhashed_subpackets {
                sp.to_writer(&mut unhashed)?;
            }
            writer.write_u16::<BigEndian>(unhashed.len() as u16)?;
            writer.write_all(&unhashed)?;
        }

        writer.write_all(&self.left16)?;
        for mpi in &self.mpis {
            mpi.to_writer(writer)?;
        }

        Ok(())
    }
}

impl PacketTrait for Signature {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::Signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_to_crlf() {
        assert_eq!(text_to_crlf(b"a\nb"), b"a\r\nb".to_vec());
        assert_eq!(text_to_crlf(b"a\r\nb"), b"a\r\nb".to_vec());
        assert_eq!(text_to_crlf(b"a\rb\n"), b"a\r\nb\r\n".to_vec());
        assert_eq!(text_to_crlf(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_v4_roundtrip() {
        let sig = Signature {
            packet_version: Version::New,
            config: SignatureConfig {
                version: SignatureVersion::V4,
                typ: SignatureType::Binary,
                pka: PublicKeyAlgorithm::RSA,
                hash_alg: HashAlgorithm::SHA256,
                hashed_subpackets: vec![Subpacket::regular(SubpacketData::SignatureCreationTime(
                    Utc.timestamp_opt(1000000000, 0).unwrap(),
                ))],
                unhashed_subpackets: vec![Subpacket::regular(SubpacketData::Issuer(
                    KeyId::from_slice(&[8, 7, 6, 5, 4, 3, 2, 1]).unwrap(),
                ))],
                created: None,
                issuer: None,
            },
            left16: [0xab, 0xcd],
            mpis: vec![Mpi::from_slice(&[0x01, 0x02, 0x03])],
        };

        let bytes = sig.to_bytes().unwrap();
        let parsed = Signature::from_slice(Version::New, &bytes).unwrap();
        assert_eq!(parsed, sig);
        assert!(parsed.issuer().is_some());
        assert!(parsed.created().is_some());
    }

    #[test]
    fn test_v3_roundtrip() {
        let sig = Signature {
            packet_version: Version::Old,
            config: SignatureConfig {
                version: SignatureVersion::V3,
                typ: SignatureType::Text,
                pka: PublicKeyAlgorithm::DSA,
                hash_alg: HashAlgorithm::SHA1,
                hashed_subpackets: Vec::new(),
                unhashed_subpackets: Vec::new(),
                created: Some(Utc.timestamp_opt(987654321, 0).unwrap()),
                issuer: Some(KeyId::from_slice(&[1; 8]).unwrap()),
            },
            left16: [0x00, 0x11],
            mpis: vec![Mpi::from_slice(&[0x11]), Mpi::from_slice(&[0x22])],
        };

        let bytes = sig.to_bytes().unwrap();
        let parsed = Signature::from_slice(Version::Old, &bytes).unwrap();
        assert_eq!(parsed, sig);
    }
}
