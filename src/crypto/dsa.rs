use num_bigint::{BigUint, ModInverse};
use num_traits::Zero;
use rand::{CryptoRng, Rng};

use crate::errors::{Error, Result};

/// Reduces a digest to the leftmost `bits(q)` bits, as required when the
/// digest is wider than the subgroup order.
/// Ref: https://tools.ietf.org/html/rfc4880#section-13.6
fn truncate_digest(digest: &[u8], q: &BigUint) -> BigUint {
    let q_bits = q.bits();
    let take = digest.len().min((q_bits + 7) / 8);
    let mut z = BigUint::from_bytes_be(&digest[..take]);
    if take * 8 > q_bits {
        z >>= take * 8 - q_bits;
    }
    z
}

fn random_below<R: CryptoRng + Rng>(rng: &mut R, bound: &BigUint) -> BigUint {
    let mut buf = vec![0u8; (bound.bits() + 7) / 8 + 8];
    rng.fill_bytes(&mut buf);
    BigUint::from_bytes_be(&buf) % bound
}

/// DSA signature over a digest. The digest is signed directly, without an
/// EMSA encoding step.
pub fn sign<R: CryptoRng + Rng>(
    rng: &mut R,
    p: &BigUint,
    q: &BigUint,
    g: &BigUint,
    x: &BigUint,
    digest: &[u8],
) -> Result<(BigUint, BigUint)> {
    let z = truncate_digest(digest, q);

    loop {
        // per-signature secret in [1, q-1]
        let k = random_below(rng, &(q - 1u32)) + 1u32;

        let r = g.modpow(&k, p) % q;
        if r.is_zero() {
            continue;
        }

        let k_inv = match (&k).mod_inverse(q).and_then(|i| i.to_biguint()) {
            Some(i) => i,
            None => continue,
        };
        let s = (k_inv * (&z + x * &r)) % q;
        if s.is_zero() {
            continue;
        }

        return Ok((r, s));
    }
}

pub fn verify(
    p: &BigUint,
    q: &BigUint,
    g: &BigUint,
    y: &BigUint,
    digest: &[u8],
    r: &BigUint,
    s: &BigUint,
) -> Result<()> {
    if r.is_zero() || r >= q || s.is_zero() || s >= q {
        return Err(Error::BadSignature("dsa r or s out of range".into()));
    }

    let w = (s)
        .mod_inverse(q)
        .and_then(|i| i.to_biguint())
        .ok_or_else(|| Error::BadSignature("dsa s is not invertible".into()))?;

    let z = truncate_digest(digest, q);
    let u1 = (&z * &w) % q;
    let u2 = (r * &w) % q;
    let v = ((g.modpow(&u1, p) * y.modpow(&u2, p)) % p) % q;

    if &v != r {
        return Err(Error::BadSignature("dsa verification equation failed".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use num_bigint::prime::probably_prime;
    use num_bigint::RandPrime;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Builds a small DSA parameter set around a safe prime, so that
    /// q divides p - 1 by construction.
    fn test_params(rng: &mut ChaCha8Rng) -> (BigUint, BigUint, BigUint) {
        loop {
            let q: BigUint = rng.gen_prime(128);
            let p = &q * 2u32 + 1u32;
            if !probably_prime(&p, 20) {
                continue;
            }
            // subgroup generator of order q
            let g = BigUint::from(2u32).modpow(&BigUint::from(2u32), &p);
            return (p, q, g);
        }
    }

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (p, q, g) = test_params(&mut rng);
        let x = random_below(&mut rng, &(&q - 1u32)) + 1u32;
        let y = g.modpow(&x, &p);

        let digest = HashAlgorithm::SHA256.digest(b"hello").unwrap();
        let (r, s) = sign(&mut rng, &p, &q, &g, &x, &digest).unwrap();
        verify(&p, &q, &g, &y, &digest, &r, &s).unwrap();

        // flipping a single digest bit must fail
        let mut bad = digest.clone();
        bad[0] ^= 1;
        assert!(matches!(
            verify(&p, &q, &g, &y, &bad, &r, &s),
            Err(Error::BadSignature(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (p, q, g) = test_params(&mut rng);
        let y = g.modpow(&BigUint::from(5u32), &p);
        let digest = HashAlgorithm::SHA1.digest(b"x").unwrap();

        assert!(verify(&p, &q, &g, &y, &digest, &BigUint::zero(), &q).is_err());
        assert!(verify(&p, &q, &g, &y, &digest, &q, &BigUint::from(1u32)).is_err());
    }

    #[test]
    fn test_truncate_digest() {
        let q = BigUint::from(0x8000u32); // 16 bits
        let digest = [0xff, 0xff, 0xff, 0xff];
        let z = truncate_digest(&digest, &q);
        assert_eq!(z, BigUint::from(0xffffu32));
    }
}
