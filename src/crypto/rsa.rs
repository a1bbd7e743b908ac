use num_bigint::{BigUint, ModInverse, RandPrime};
use rand::{CryptoRng, Rng};

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::pkcs1;
use crate::errors::{Error, Result};
use crate::util::left_pad;

/// Textbook RSA. All padding happens in `crypto::pkcs1`, so the encoded
/// block is handled as a bare message representative here.
pub fn encrypt_raw(n: &BigUint, e: &BigUint, m: &BigUint) -> Result<BigUint> {
    crate::ensure!(m < n, "rsa message representative out of range");
    Ok(m.modpow(e, n))
}

pub fn decrypt_raw(n: &BigUint, d: &BigUint, c: &BigUint) -> Result<BigUint> {
    crate::ensure!(c < n, "rsa ciphertext representative out of range");
    Ok(c.modpow(d, n))
}

/// Signs `digest` by EMSA-PKCS1-v1_5 encoding it to the width of `n`.
pub fn sign(n: &BigUint, d: &BigUint, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>> {
    let k = (n.bits() + 7) / 8;
    let em = pkcs1::emsa_pkcs1v15_encode(hash, digest, k)?;
    let s = decrypt_raw(n, d, &BigUint::from_bytes_be(&em))?;

    Ok(s.to_bytes_be())
}

pub fn verify(
    n: &BigUint,
    e: &BigUint,
    hash: HashAlgorithm,
    digest: &[u8],
    sig: &[u8],
) -> Result<()> {
    let k = (n.bits() + 7) / 8;
    let s = BigUint::from_bytes_be(sig);
    if &s >= n {
        return Err(Error::BadSignature(
            "rsa signature representative out of range".into(),
        ));
    }

    let em = left_pad(&s.modpow(e, n).to_bytes_be(), k);
    let expected = pkcs1::emsa_pkcs1v15_encode(hash, digest, k)?;
    if em != expected {
        return Err(Error::BadSignature("emsa encoding differs".into()));
    }

    Ok(())
}

/// Generates an RSA key. Returns `(n, e, d, p, q, u)` with `p < q` and
/// `u = p^-1 mod q`, the secret layout of RFC 4880 key packets.
pub fn generate_key<R: CryptoRng + Rng>(
    rng: &mut R,
    bits: usize,
) -> Result<(BigUint, BigUint, BigUint, BigUint, BigUint, BigUint)> {
    let e = BigUint::from(65537u32);

    loop {
        let mut p: BigUint = rng.gen_prime(bits / 2);
        let mut q: BigUint = rng.gen_prime(bits - bits / 2);
        if p == q {
            continue;
        }
        if p > q {
            std::mem::swap(&mut p, &mut q);
        }

        let n = &p * &q;
        if n.bits() != bits {
            continue;
        }

        let phi = (&p - 1u32) * (&q - 1u32);
        let d = match (&e).mod_inverse(&phi).and_then(|d| d.to_biguint()) {
            Some(d) => d,
            None => continue,
        };
        let u = match (&p).mod_inverse(&q).and_then(|u| u.to_biguint()) {
            Some(u) => u,
            None => continue,
        };

        return Ok((n, e, d, p, q, u));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (n, e, d, _, _, _) = generate_key(&mut rng, 1024).unwrap();

        let digest = HashAlgorithm::SHA256.digest(b"hello").unwrap();
        let sig = sign(&n, &d, HashAlgorithm::SHA256, &digest).unwrap();
        verify(&n, &e, HashAlgorithm::SHA256, &digest, &sig).unwrap();

        let other = HashAlgorithm::SHA256.digest(b"Hello").unwrap();
        assert!(matches!(
            verify(&n, &e, HashAlgorithm::SHA256, &other, &sig),
            Err(Error::BadSignature(_))
        ));
    }

    #[test]
    fn test_encrypt_decrypt_raw() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (n, e, d, _, _, _) = generate_key(&mut rng, 1024).unwrap();

        let m = BigUint::from(1234567890u64);
        let c = encrypt_raw(&n, &e, &m).unwrap();
        assert_eq!(decrypt_raw(&n, &d, &c).unwrap(), m);
    }

    #[test]
    fn test_key_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (n, _, _, p, q, u) = generate_key(&mut rng, 512).unwrap();
        assert!(p < q);
        assert_eq!(&p * &q, n);
        assert_eq!((&u * &p) % &q, BigUint::from(1u32));
    }
}
