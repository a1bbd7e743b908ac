use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use rand::{CryptoRng, Rng};
use zeroize::Zeroize;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::{checksum, dsa, elgamal, pkcs1, rsa};
use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::types::{
    KeyId, KeyVersion, Mpi, PlainSecretParams, PublicParams, SecretParams,
};
use crate::util::left_pad;

/// Shared view of the public half of a key packet (tags 5, 6, 7 and 14).
pub trait PublicKeyTrait {
    fn key_version(&self) -> KeyVersion;
    fn algorithm(&self) -> PublicKeyAlgorithm;
    fn created_at(&self) -> &DateTime<Utc>;
    /// V2/V3 validity period in days.
    fn expiration(&self) -> Option<u16>;
    fn public_params(&self) -> &PublicParams;

    /// The serialized public key body, shared between the four key tags.
    fn to_key_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u8(self.key_version() as u8)?;
        buf.write_u32::<BigEndian>(self.created_at().timestamp() as u32)?;
        if matches!(self.key_version(), KeyVersion::V2 | KeyVersion::V3) {
            buf.write_u16::<BigEndian>(self.expiration().unwrap_or(0))?;
        }
        buf.write_u8(self.algorithm() as u8)?;
        self.public_params().to_writer(&mut buf)?;

        Ok(buf)
    }

    /// `0x99 || len16 || body`, the framing hashed for fingerprints,
    /// certifications and bindings.
    fn to_signing_bytes(&self) -> Result<Vec<u8>> {
        let body = self.to_key_bytes()?;
        let mut buf = Vec::with_capacity(body.len() + 3);
        buf.write_u8(0x99)?;
        buf.write_u16::<BigEndian>(body.len() as u16)?;
        buf.extend_from_slice(&body);

        Ok(buf)
    }

    /// Ref: https://tools.ietf.org/html/rfc4880#section-12.2
    fn fingerprint(&self) -> Result<Vec<u8>> {
        match self.key_version() {
            KeyVersion::V4 => HashAlgorithm::SHA1.digest(&self.to_signing_bytes()?),
            KeyVersion::V2 | KeyVersion::V3 => {
                // MD5 over the bare magnitudes
                let mut buf = Vec::new();
                match self.public_params() {
                    PublicParams::RSA { n, e } => {
                        buf.extend_from_slice(n.as_bytes());
                        buf.extend_from_slice(e.as_bytes());
                    }
                    PublicParams::DSA { p, q, g, y } => {
                        for mpi in [p, q, g, y] {
                            buf.extend_from_slice(mpi.as_bytes());
                        }
                    }
                    PublicParams::Elgamal { p, g, y } => {
                        for mpi in [p, g, y] {
                            buf.extend_from_slice(mpi.as_bytes());
                        }
                    }
                    PublicParams::Unknown { data } => buf.extend_from_slice(data),
                }
                HashAlgorithm::MD5.digest(&buf)
            }
        }
    }

    fn key_id(&self) -> Result<KeyId> {
        match self.key_version() {
            KeyVersion::V4 => {
                let fp = self.fingerprint()?;
                KeyId::from_slice(&fp[fp.len() - 8..])
            }
            KeyVersion::V2 | KeyVersion::V3 => {
                // the low 64 bits of the modulus
                let magnitude = match self.public_params() {
                    PublicParams::RSA { n, .. } => n.as_bytes(),
                    PublicParams::DSA { p, .. } | PublicParams::Elgamal { p, .. } => p.as_bytes(),
                    PublicParams::Unknown { data } => data,
                };
                let id = left_pad(magnitude, magnitude.len().max(8));
                KeyId::from_slice(&id[id.len() - 8..])
            }
        }
    }

    /// Checks a raw signature against `digest`.
    fn verify_signature(&self, hash: HashAlgorithm, digest: &[u8], sig: &[Mpi]) -> Result<()> {
        match self.public_params() {
            PublicParams::RSA { n, e } => {
                crate::ensure_eq!(sig.len(), 1, "rsa signatures carry a single mpi");
                rsa::verify(
                    &n.to_biguint(),
                    &e.to_biguint(),
                    hash,
                    digest,
                    sig[0].as_bytes(),
                )
            }
            PublicParams::DSA { p, q, g, y } => {
                crate::ensure_eq!(sig.len(), 2, "dsa signatures carry two mpis");
                dsa::verify(
                    &p.to_biguint(),
                    &q.to_biguint(),
                    &g.to_biguint(),
                    &y.to_biguint(),
                    digest,
                    &sig[0].to_biguint(),
                    &sig[1].to_biguint(),
                )
            }
            PublicParams::Elgamal { .. } => Err(Error::UnsupportedAlgorithm(
                "elgamal signatures are not verified".into(),
            )),
            PublicParams::Unknown { .. } => Err(Error::UnsupportedAlgorithm(format!(
                "signatures for {:?}",
                self.algorithm()
            ))),
        }
    }

    /// Wraps a session key payload with EME-PKCS1 and encrypts it to this
    /// key, yielding the MPIs of a Tag 1 packet.
    fn encrypt_session_key<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        plain: &[u8],
    ) -> Result<Vec<Mpi>> {
        match self.public_params() {
            PublicParams::RSA { n, e } => {
                let n = n.to_biguint();
                let k = (n.bits() + 7) / 8;
                let em = pkcs1::eme_pkcs1v15_encode(rng, k, plain)?;
                let c = rsa::encrypt_raw(&n, &e.to_biguint(), &BigUint::from_bytes_be(&em))?;
                Ok(vec![Mpi::from_biguint(&c)])
            }
            PublicParams::Elgamal { p, g, y } => {
                let p = p.to_biguint();
                let k = (p.bits() + 7) / 8;
                let em = pkcs1::eme_pkcs1v15_encode(rng, k, plain)?;
                let (c1, c2) = elgamal::encrypt(
                    rng,
                    &p,
                    &g.to_biguint(),
                    &y.to_biguint(),
                    &BigUint::from_bytes_be(&em),
                )?;
                Ok(vec![Mpi::from_biguint(&c1), Mpi::from_biguint(&c2)])
            }
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "encryption to {:?}",
                self.algorithm()
            ))),
        }
    }
}

/// Shared view of the secret half of a key packet (tags 5 and 7).
pub trait SecretKeyTrait: PublicKeyTrait {
    fn secret_params(&self) -> &SecretParams;

    /// Derives the unlock key from `passphrase`, decrypts the secret MPIs,
    /// verifies their checksum and hands the plaintext parameters to
    /// `work`. The decrypted material is zeroed before returning.
    fn unlock<F, T>(&self, passphrase: &str, work: F) -> Result<T>
    where
        F: FnOnce(&PlainSecretParams) -> Result<T>,
        Self: Sized,
    {
        match self.secret_params() {
            SecretParams::Plain(plain) => work(plain),
            SecretParams::Encrypted(enc) => {
                let mut key = enc
                    .string_to_key
                    .derive_key(passphrase, enc.encryption_algorithm.key_size())?;
                let mut decrypted =
                    enc.encryption_algorithm
                        .decrypt_with_iv(&key, &enc.iv, &enc.data)?;
                key.zeroize();

                if decrypted.len() < enc.checksum_len() {
                    decrypted.zeroize();
                    return Err(Error::MalformedKey(
                        "secret material shorter than its checksum".into(),
                    ));
                }

                let split = decrypted.len() - enc.checksum_len();
                let ok = match enc.s2k_usage {
                    254 => {
                        HashAlgorithm::SHA1.digest(&decrypted[..split])? == decrypted[split..]
                    }
                    _ => {
                        checksum::calculate_simple(&decrypted[..split])
                            == u16::from_be_bytes([decrypted[split], decrypted[split + 1]])
                    }
                };
                if !ok {
                    decrypted.zeroize();
                    return Err(Error::WrongPassphrase(format!(
                        "checksum mismatch unlocking key {}",
                        self.key_id()?
                    )));
                }

                let plain = PlainSecretParams::from_slice(self.algorithm(), &decrypted[..split]);
                decrypted.zeroize();

                work(&plain?)
            }
        }
    }

    /// Produces the signature MPIs over `digest`.
    fn create_signature<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        passphrase: &str,
        hash: HashAlgorithm,
        digest: &[u8],
    ) -> Result<Vec<Mpi>>
    where
        Self: Sized,
    {
        self.unlock(passphrase, |plain| {
            match (self.public_params(), plain) {
                (PublicParams::RSA { n, .. }, PlainSecretParams::RSA { d, .. }) => {
                    let sig = rsa::sign(&n.to_biguint(), &d.to_biguint(), hash, digest)?;
                    Ok(vec![Mpi::from_slice(&sig)])
                }
                (PublicParams::DSA { p, q, g, .. }, PlainSecretParams::DSA { x }) => {
                    let (r, s) = dsa::sign(
                        rng,
                        &p.to_biguint(),
                        &q.to_biguint(),
                        &g.to_biguint(),
                        &x.to_biguint(),
                        digest,
                    )?;
                    Ok(vec![Mpi::from_biguint(&r), Mpi::from_biguint(&s)])
                }
                (PublicParams::Elgamal { .. }, _) => Err(Error::UnsupportedAlgorithm(
                    "elgamal signatures are never emitted".into(),
                )),
                _ => Err(Error::MalformedKey(
                    "secret and public parameters disagree".into(),
                )),
            }
        })
    }

    /// Unwraps the session key payload of a Tag 1 packet addressed to this
    /// key. The returned bytes are `sym_id || key || checksum`.
    fn decrypt_session_key(&self, passphrase: &str, mpis: &[Mpi]) -> Result<Vec<u8>>
    where
        Self: Sized,
    {
        self.unlock(passphrase, |plain| {
            let em = match (self.public_params(), plain) {
                (PublicParams::RSA { n, .. }, PlainSecretParams::RSA { d, .. }) => {
                    crate::ensure_eq!(mpis.len(), 1, "rsa encrypted session keys carry one mpi");
                    let n = n.to_biguint();
                    let k = (n.bits() + 7) / 8;
                    let m = rsa::decrypt_raw(&n, &d.to_biguint(), &mpis[0].to_biguint())?;
                    left_pad(&m.to_bytes_be(), k)
                }
                (PublicParams::Elgamal { p, .. }, PlainSecretParams::Elgamal { x }) => {
                    crate::ensure_eq!(
                        mpis.len(),
                        2,
                        "elgamal encrypted session keys carry two mpis"
                    );
                    let p = p.to_biguint();
                    let k = (p.bits() + 7) / 8;
                    let m = elgamal::decrypt(
                        &p,
                        &x.to_biguint(),
                        &mpis[0].to_biguint(),
                        &mpis[1].to_biguint(),
                    )?;
                    left_pad(&m.to_bytes_be(), k)
                }
                _ => {
                    return Err(Error::UnsupportedAlgorithm(format!(
                        "session key decryption with {:?}",
                        self.algorithm()
                    )))
                }
            };

            Ok(pkcs1::eme_pkcs1v15_decode(&em)?.to_vec())
        })
    }
}
