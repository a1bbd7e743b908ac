use digest::{Digest, DynDigest};
use md5::Md5;
use num_derive::FromPrimitive;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::errors::{Error, Result};

/// Available hash algorithms.
/// Ref: https://tools.ietf.org/html/rfc4880#section-9.4
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive)]
#[repr(u8)]
pub enum HashAlgorithm {
    MD5 = 1,
    SHA1 = 2,
    RIPEMD160 = 3,
    SHA256 = 8,
    SHA384 = 9,
    SHA512 = 10,
    SHA224 = 11,
}

impl HashAlgorithm {
    /// Creates a new incremental hasher for this algorithm.
    pub fn new_hasher(self) -> Result<Box<dyn DynDigest>> {
        match self {
            HashAlgorithm::MD5 => Ok(Box::new(Md5::new())),
            HashAlgorithm::SHA1 => Ok(Box::new(Sha1::new())),
            HashAlgorithm::RIPEMD160 => Ok(Box::new(Ripemd160::new())),
            HashAlgorithm::SHA256 => Ok(Box::new(Sha256::new())),
            HashAlgorithm::SHA384 => Ok(Box::new(Sha384::new())),
            HashAlgorithm::SHA512 => Ok(Box::new(Sha512::new())),
            HashAlgorithm::SHA224 => Ok(Box::new(Sha224::new())),
        }
    }

    /// Calculates the digest of `data`.
    pub fn digest(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = self.new_hasher()?;
        hasher.update(data);
        Ok(hasher.finalize_reset().to_vec())
    }

    /// Digest size in octets.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 | HashAlgorithm::RIPEMD160 => 20,
            HashAlgorithm::SHA224 => 28,
            HashAlgorithm::SHA256 => 32,
            HashAlgorithm::SHA384 => 48,
            HashAlgorithm::SHA512 => 64,
        }
    }

    pub fn try_from_u8(id: u8) -> Result<Self> {
        num_traits::FromPrimitive::from_u8(id)
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("hash algorithm {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_digest_sizes() {
        for alg in [
            HashAlgorithm::MD5,
            HashAlgorithm::SHA1,
            HashAlgorithm::RIPEMD160,
            HashAlgorithm::SHA224,
            HashAlgorithm::SHA256,
            HashAlgorithm::SHA384,
            HashAlgorithm::SHA512,
        ] {
            assert_eq!(alg.digest(b"abc").unwrap().len(), alg.digest_size());
        }
    }

    #[test]
    fn test_sha1_abc() {
        assert_eq!(
            HashAlgorithm::SHA1.digest(b"abc").unwrap(),
            hex!("a9993e364706816aba3e25717850c26c9cd0d89d").to_vec()
        );
    }

    #[test]
    fn test_unknown_id() {
        assert!(HashAlgorithm::try_from_u8(4).is_err());
        assert!(HashAlgorithm::try_from_u8(2).is_ok());
    }
}
