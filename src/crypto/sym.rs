use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cast5::Cast5;
use cipher::{BlockEncrypt, KeyInit};
use des::TdesEde3;
use generic_array::GenericArray;
use idea::Idea;
use log::warn;
use num_derive::FromPrimitive;
use rand::{CryptoRng, Rng};
use sha1::{Digest, Sha1};
use twofish::Twofish;

use crate::errors::{Error, Result};

/// Available symmetric key algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880#section-9.2
#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive)]
#[repr(u8)]
pub enum SymmetricKeyAlgorithm {
    /// Plaintext or unencrypted data
    Plaintext = 0,
    IDEA = 1,
    /// TripleDES (DES-EDE, 168 bit key derived from 192)
    TripleDES = 2,
    /// CAST5 (128 bit key, as per RFC 2144)
    CAST5 = 3,
    /// Blowfish (128 bit key, 16 rounds)
    Blowfish = 4,
    AES128 = 7,
    AES192 = 8,
    AES256 = 9,
    /// Twofish with 256-bit key
    Twofish = 10,
}

/// The serialized header of a Modification Detection Code packet: new
/// format, tag 19, length 20. It is itself part of the hashed data.
const MDC_HEADER: [u8; 2] = [0xd3, 0x14];

/// Standard CFB encryption over `data`, using the block cipher `C` keyed
/// with `key` and an initial shift register of `iv`.
fn cfb_encrypt<C: BlockEncrypt + KeyInit>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    let cipher =
        C::new_from_slice(key).map_err(|_| Error::MalformedKey("invalid key length".into()))?;

    let bs = iv.len();
    debug_assert_eq!(bs, C::block_size());

    let mut fr = iv.to_vec();
    let mut fre = vec![0u8; bs];

    for chunk in data.chunks_mut(bs) {
        fre.copy_from_slice(&fr);
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut fre));
        for (c, f) in chunk.iter_mut().zip(fre.iter()) {
            *c ^= f;
        }
        fr[..chunk.len()].copy_from_slice(chunk);
    }

    Ok(())
}

/// Inverse of `cfb_encrypt`. CFB decryption only ever uses the forward
/// direction of the block cipher.
fn cfb_decrypt<C: BlockEncrypt + KeyInit>(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<()> {
    let cipher =
        C::new_from_slice(key).map_err(|_| Error::MalformedKey("invalid key length".into()))?;

    let bs = iv.len();
    debug_assert_eq!(bs, C::block_size());

    let mut fr = iv.to_vec();
    let mut fre = vec![0u8; bs];

    for chunk in data.chunks_mut(bs) {
        fre.copy_from_slice(&fr);
        cipher.encrypt_block(GenericArray::from_mut_slice(&mut fre));
        fr[..chunk.len()].copy_from_slice(chunk);
        for (p, f) in chunk.iter_mut().zip(fre.iter()) {
            *p ^= f;
        }
    }

    Ok(())
}

macro_rules! with_cipher {
    ($alg:expr, $f:ident ( $($args:expr),* )) => {
        match $alg {
            SymmetricKeyAlgorithm::Plaintext => Err(Error::UnsupportedAlgorithm(
                "plaintext is not an encryption algorithm".into(),
            )),
            SymmetricKeyAlgorithm::IDEA => $f::<Idea>($($args),*),
            SymmetricKeyAlgorithm::TripleDES => $f::<TdesEde3>($($args),*),
            SymmetricKeyAlgorithm::CAST5 => $f::<Cast5>($($args),*),
            SymmetricKeyAlgorithm::Blowfish => $f::<Blowfish>($($args),*),
            SymmetricKeyAlgorithm::AES128 => $f::<Aes128>($($args),*),
            SymmetricKeyAlgorithm::AES192 => $f::<Aes192>($($args),*),
            SymmetricKeyAlgorithm::AES256 => $f::<Aes256>($($args),*),
            SymmetricKeyAlgorithm::Twofish => $f::<Twofish>($($args),*),
        }
    };
}

impl SymmetricKeyAlgorithm {
    /// Key size in octets.
    pub fn key_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish
            | SymmetricKeyAlgorithm::AES128 => 16,
            SymmetricKeyAlgorithm::TripleDES | SymmetricKeyAlgorithm::AES192 => 24,
            SymmetricKeyAlgorithm::AES256 | SymmetricKeyAlgorithm::Twofish => 32,
        }
    }

    /// Block size in octets.
    pub fn block_size(self) -> usize {
        match self {
            SymmetricKeyAlgorithm::Plaintext => 0,
            SymmetricKeyAlgorithm::IDEA
            | SymmetricKeyAlgorithm::TripleDES
            | SymmetricKeyAlgorithm::CAST5
            | SymmetricKeyAlgorithm::Blowfish => 8,
            SymmetricKeyAlgorithm::AES128
            | SymmetricKeyAlgorithm::AES192
            | SymmetricKeyAlgorithm::AES256
            | SymmetricKeyAlgorithm::Twofish => 16,
        }
    }

    /// Generates a fresh session key for this algorithm.
    pub fn new_session_key<R: CryptoRng + Rng>(self, rng: &mut R) -> Vec<u8> {
        let mut key = vec![0u8; self.key_size()];
        rng.fill_bytes(&mut key);
        key
    }

    /// Plain full-block CFB with a caller supplied IV. Used for secret key
    /// material and encrypted session keys, which carry no prefix.
    pub fn encrypt_with_iv(self, key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut data = plaintext.to_vec();
        with_cipher!(self, cfb_encrypt(key, iv, &mut data))?;
        Ok(data)
    }

    pub fn decrypt_with_iv(self, key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut data = ciphertext.to_vec();
        with_cipher!(self, cfb_decrypt(key, iv, &mut data))?;
        Ok(data)
    }

    /// OpenPGP CFB encryption with resynchronization, the data layer of the
    /// Symmetrically Encrypted Data packet (Tag 9).
    /// Ref: https://tools.ietf.org/html/rfc4880#section-13.9
    pub fn encrypt<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        if self == SymmetricKeyAlgorithm::Plaintext {
            return Err(Error::UnsupportedAlgorithm(
                "plaintext is not an encryption algorithm".into(),
            ));
        }

        let bs = self.block_size();

        let mut out = self.make_prefix(rng);
        out.extend_from_slice(plaintext);

        let zeros = vec![0u8; bs];
        with_cipher!(self, cfb_encrypt(key, &zeros, &mut out[..bs + 2]))?;

        // resync: the shift register reloads from the last bs octets of the
        // prefix ciphertext
        let iv = out[2..bs + 2].to_vec();
        with_cipher!(self, cfb_encrypt(key, &iv, &mut out[bs + 2..]))?;

        Ok(out)
    }

    /// Inverse of `encrypt`. The returned flag reports whether the prefix
    /// quick check held; on failure the plaintext is still handed back, but
    /// must be treated as unverified.
    pub fn decrypt(self, key: &[u8], ciphertext: &[u8]) -> Result<(Vec<u8>, bool)> {
        let bs = self.block_size();
        crate::ensure!(
            ciphertext.len() >= bs + 2,
            "ciphertext too short for the {} octet prefix",
            bs + 2
        );

        let mut prefix = ciphertext[..bs + 2].to_vec();
        let zeros = vec![0u8; bs];
        with_cipher!(self, cfb_decrypt(key, &zeros, &mut prefix))?;

        let quick_check = prefix[bs - 2] == prefix[bs] && prefix[bs - 1] == prefix[bs + 1];
        if !quick_check {
            warn!(
                "{}",
                Error::QuickCheckFailed("prefix repetition does not match".into())
            );
        }

        let mut data = ciphertext[bs + 2..].to_vec();
        let iv = &ciphertext[2..bs + 2];
        with_cipher!(self, cfb_decrypt(key, iv, &mut data))?;

        Ok((data, quick_check))
    }

    /// CFB encryption without resynchronization plus the SHA-1 modification
    /// detection envelope, the data layer of the Sym. Encrypted Integrity
    /// Protected Data packet (Tag 18).
    /// Ref: https://tools.ietf.org/html/rfc4880#section-5.13
    pub fn encrypt_protected<R: CryptoRng + Rng>(
        self,
        rng: &mut R,
        key: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        if self == SymmetricKeyAlgorithm::Plaintext {
            return Err(Error::UnsupportedAlgorithm(
                "plaintext is not an encryption algorithm".into(),
            ));
        }

        let bs = self.block_size();

        let mut out = self.make_prefix(rng);
        out.reserve(plaintext.len() + 22);
        out.extend_from_slice(plaintext);
        out.extend_from_slice(&MDC_HEADER);

        let mdc = Sha1::digest(&out);
        out.extend_from_slice(&mdc[..]);

        let zeros = vec![0u8; bs];
        with_cipher!(self, cfb_encrypt(key, &zeros, &mut out))?;

        Ok(out)
    }

    /// Inverse of `encrypt_protected`. A modification detection mismatch is
    /// fatal: no plaintext is returned.
    pub fn decrypt_protected(self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let bs = self.block_size();
        crate::ensure!(
            ciphertext.len() >= bs + 2 + 22,
            "ciphertext too short for prefix and mdc"
        );

        let mut data = ciphertext.to_vec();
        let zeros = vec![0u8; bs];
        with_cipher!(self, cfb_decrypt(key, &zeros, &mut data))?;

        if data[bs - 2] != data[bs] || data[bs - 1] != data[bs + 1] {
            warn!(
                "{}",
                Error::QuickCheckFailed("prefix repetition does not match".into())
            );
        }

        let (hashed, mdc) = data.split_at(data.len() - 22);
        if mdc[..2] != MDC_HEADER {
            return Err(Error::MdcMismatch(
                "data does not end in a modification detection code packet".into(),
            ));
        }

        let mut hasher = Sha1::new();
        hasher.update(hashed);
        hasher.update(MDC_HEADER);
        if hasher.finalize()[..] != mdc[2..] {
            return Err(Error::MdcMismatch("sha1 over the plaintext differs".into()));
        }

        Ok(hashed[bs + 2..].to_vec())
    }

    /// `block_size` random octets followed by a repetition of the last two.
    fn make_prefix<R: CryptoRng + Rng>(self, rng: &mut R) -> Vec<u8> {
        let bs = self.block_size();
        let mut prefix = vec![0u8; bs + 2];
        rng.fill_bytes(&mut prefix[..bs]);
        prefix[bs] = prefix[bs - 2];
        prefix[bs + 1] = prefix[bs - 1];
        prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const ALGS: &[SymmetricKeyAlgorithm] = &[
        SymmetricKeyAlgorithm::IDEA,
        SymmetricKeyAlgorithm::TripleDES,
        SymmetricKeyAlgorithm::CAST5,
        SymmetricKeyAlgorithm::Blowfish,
        SymmetricKeyAlgorithm::AES128,
        SymmetricKeyAlgorithm::AES192,
        SymmetricKeyAlgorithm::AES256,
        SymmetricKeyAlgorithm::Twofish,
    ];

    #[test]
    fn test_resync_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let msg = b"the quick brown fox jumps over the lazy dog";

        for alg in ALGS {
            let key = alg.new_session_key(&mut rng);
            let ct = alg.encrypt(&mut rng, &key, msg).unwrap();
            assert_eq!(ct.len(), msg.len() + alg.block_size() + 2);

            let (pt, quick_check) = alg.decrypt(&key, &ct).unwrap();
            assert!(quick_check, "quick check failed for {:?}", alg);
            assert_eq!(&pt[..], &msg[..], "{:?}", alg);
        }
    }

    #[test]
    fn test_protected_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let msg = b"it was the best of times, it was the worst of times";

        for alg in ALGS {
            let key = alg.new_session_key(&mut rng);
            let ct = alg.encrypt_protected(&mut rng, &key, msg).unwrap();
            assert_eq!(ct.len(), msg.len() + alg.block_size() + 2 + 22);

            let pt = alg.decrypt_protected(&key, &ct).unwrap();
            assert_eq!(&pt[..], &msg[..], "{:?}", alg);
        }
    }

    #[test]
    fn test_mdc_detects_tampering() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let alg = SymmetricKeyAlgorithm::AES256;
        let key = alg.new_session_key(&mut rng);
        let ct = alg.encrypt_protected(&mut rng, &key, b"attack at dawn").unwrap();

        // a single flipped bit anywhere must trip the mdc
        for pos in 0..ct.len() {
            let mut tampered = ct.clone();
            tampered[pos] ^= 0x04;
            match alg.decrypt_protected(&key, &tampered) {
                Err(Error::MdcMismatch(_)) => {}
                other => panic!("tampering at {} not detected: {:?}", pos, other),
            }
        }
    }

    #[test]
    fn test_wrong_key_fails_quick_check() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = alg.new_session_key(&mut rng);
        let other_key = alg.new_session_key(&mut rng);
        let ct = alg.encrypt(&mut rng, &key, b"some data").unwrap();

        let (_, quick_check) = alg.decrypt(&other_key, &ct).unwrap();
        assert!(!quick_check);
    }

    #[test]
    fn test_with_iv_roundtrip() {
        let alg = SymmetricKeyAlgorithm::AES128;
        let key = vec![7u8; 16];
        let iv = vec![3u8; 16];
        // not block aligned on purpose
        let msg = b"0123456789abcdefghij";

        let ct = alg.encrypt_with_iv(&key, &iv, msg).unwrap();
        assert_eq!(ct.len(), msg.len());
        let pt = alg.decrypt_with_iv(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..], &msg[..]);
    }
}
