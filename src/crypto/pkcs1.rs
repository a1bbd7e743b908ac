use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{Error, Result};

/// EME-PKCS1-v1_5 encoding of a message block, used to wrap session keys.
/// Produces `0x00 0x02 || PS || 0x00 || M` of exactly `k` octets, where PS
/// is at least 8 non-zero random octets.
/// Ref: https://tools.ietf.org/html/rfc4880#section-13.1.1
pub fn eme_pkcs1v15_encode<R: CryptoRng + Rng>(
    rng: &mut R,
    k: usize,
    message: &[u8],
) -> Result<Vec<u8>> {
    if message.len() + 11 > k {
        return Err(Error::BadPadding(format!(
            "{} octet message does not fit {} octet modulus",
            message.len(),
            k
        )));
    }

    let mut em = vec![0u8; k];
    em[1] = 0x02;
    let ps_end = k - message.len() - 1;
    for b in em[2..ps_end].iter_mut() {
        // padding octets must be non-zero; redraw rather than mask
        *b = loop {
            let candidate: u8 = rng.gen();
            if candidate != 0 {
                break candidate;
            }
        };
    }
    // em[ps_end] stays zero, separating the padding from the message
    em[ps_end + 1..].copy_from_slice(message);

    Ok(em)
}

/// Inverse of `eme_pkcs1v15_encode`, returning the embedded message.
/// Ref: https://tools.ietf.org/html/rfc4880#section-13.1.2
pub fn eme_pkcs1v15_decode(em: &[u8]) -> Result<&[u8]> {
    if em.len() < 11 || em[0] != 0x00 || em[1] != 0x02 {
        return Err(Error::BadPadding("block does not start with 00 02".into()));
    }

    let sep = em[2..]
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::BadPadding("no zero separator after padding".into()))?;
    if sep < 8 {
        return Err(Error::BadPadding(format!(
            "only {} octets of padding before the separator",
            sep
        )));
    }

    Ok(&em[2 + sep + 1..])
}

/// The fixed ASN.1 DER prefix of `DigestInfo` for `alg`.
/// Ref: https://tools.ietf.org/html/rfc8017#section-9.2
fn digestinfo_prefix(alg: HashAlgorithm) -> Result<&'static [u8]> {
    let prefix: &[u8] = match alg {
        HashAlgorithm::MD5 => &[
            0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x05,
            0x05, 0x00, 0x04, 0x10,
        ],
        HashAlgorithm::SHA1 => &[
            0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04,
            0x14,
        ],
        HashAlgorithm::RIPEMD160 => &[
            0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x24, 0x03, 0x02, 0x01, 0x05, 0x00, 0x04,
            0x14,
        ],
        HashAlgorithm::SHA224 => &[
            0x30, 0x2d, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x04, 0x05, 0x00, 0x04, 0x1c,
        ],
        HashAlgorithm::SHA256 => &[
            0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x01, 0x05, 0x00, 0x04, 0x20,
        ],
        HashAlgorithm::SHA384 => &[
            0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x02, 0x05, 0x00, 0x04, 0x30,
        ],
        HashAlgorithm::SHA512 => &[
            0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02,
            0x03, 0x05, 0x00, 0x04, 0x40,
        ],
    };

    Ok(prefix)
}

/// EMSA-PKCS1-v1_5 encoding of a digest, used for RSA signatures.
/// Produces `0x00 0x01 || 0xFF.. || 0x00 || DigestInfo(alg, digest)` of
/// exactly `k` octets.
/// Ref: https://tools.ietf.org/html/rfc4880#section-13.1.3
pub fn emsa_pkcs1v15_encode(alg: HashAlgorithm, digest: &[u8], k: usize) -> Result<Vec<u8>> {
    crate::ensure_eq!(
        digest.len(),
        alg.digest_size(),
        "digest length {} does not match {:?}",
        digest.len(),
        alg
    );

    let prefix = digestinfo_prefix(alg)?;
    let t_len = prefix.len() + digest.len();
    if k < t_len + 11 {
        return Err(Error::BadPadding(format!(
            "{} octet modulus too short for {:?} digest info",
            k, alg
        )));
    }

    let mut em = vec![0xff; k];
    em[0] = 0x00;
    em[1] = 0x01;
    em[k - t_len - 1] = 0x00;
    em[k - t_len..k - digest.len()].copy_from_slice(prefix);
    em[k - digest.len()..].copy_from_slice(digest);

    Ok(em)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_eme_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let message = [0u8; 16];

        let em = eme_pkcs1v15_encode(&mut rng, 128, &message).unwrap();
        assert_eq!(em.len(), 128);
        assert_eq!(&em[..2], &[0x00, 0x02]);
        // 128 - 16 - 3 random non-zero octets
        assert_eq!(em[2..111].iter().filter(|b| **b == 0).count(), 0);
        assert_eq!(em[111], 0x00);
        assert_eq!(&em[112..], &message[..]);

        assert_eq!(eme_pkcs1v15_decode(&em).unwrap(), &message[..]);
    }

    #[test]
    fn test_eme_message_too_long() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = eme_pkcs1v15_encode(&mut rng, 32, &[1u8; 22]).unwrap_err();
        assert!(matches!(err, Error::BadPadding(_)));
    }

    #[test]
    fn test_eme_decode_rejects_bad_blocks() {
        // wrong leading pair
        assert!(eme_pkcs1v15_decode(&[0x00, 0x01, 1, 1, 1, 1, 1, 1, 1, 1, 0, 9]).is_err());
        // no separator
        assert!(eme_pkcs1v15_decode(&[0x00, 0x02, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]).is_err());
        // separator after fewer than 8 padding octets
        assert!(eme_pkcs1v15_decode(&[0x00, 0x02, 1, 1, 1, 1, 1, 1, 1, 0, 9, 9]).is_err());

        let ok = eme_pkcs1v15_decode(&[0x00, 0x02, 1, 2, 3, 4, 5, 6, 7, 8, 0, 9]).unwrap();
        assert_eq!(ok, &[9]);
    }

    #[test]
    fn test_emsa_shape() {
        let digest = HashAlgorithm::SHA1.digest(b"abc").unwrap();
        let em = emsa_pkcs1v15_encode(HashAlgorithm::SHA1, &digest, 64).unwrap();
        assert_eq!(em.len(), 64);
        assert_eq!(&em[..2], &[0x00, 0x01]);
        assert_eq!(&em[64 - 20..], &digest[..]);
        // deterministic
        let em2 = emsa_pkcs1v15_encode(HashAlgorithm::SHA1, &digest, 64).unwrap();
        assert_eq!(em, em2);

        let err = emsa_pkcs1v15_encode(HashAlgorithm::SHA512, &[0u8; 64], 64).unwrap_err();
        assert!(matches!(err, Error::BadPadding(_)));
    }
}
