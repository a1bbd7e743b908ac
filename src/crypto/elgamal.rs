use num_bigint::{BigUint, ModInverse};
use rand::{CryptoRng, Rng};

use crate::errors::{Error, Result};

fn random_below<R: CryptoRng + Rng>(rng: &mut R, bound: &BigUint) -> BigUint {
    let mut buf = vec![0u8; (bound.bits() + 7) / 8 + 8];
    rng.fill_bytes(&mut buf);
    BigUint::from_bytes_be(&buf) % bound
}

/// Elgamal encryption of a message representative, yielding the pair
/// `(g^k, m * y^k)`.
pub fn encrypt<R: CryptoRng + Rng>(
    rng: &mut R,
    p: &BigUint,
    g: &BigUint,
    y: &BigUint,
    m: &BigUint,
) -> Result<(BigUint, BigUint)> {
    crate::ensure!(m < p, "elgamal message representative out of range");

    // ephemeral secret in [1, p-2]
    let k = random_below(rng, &(p - 2u32)) + 1u32;

    let c1 = g.modpow(&k, p);
    let c2 = (m * y.modpow(&k, p)) % p;

    Ok((c1, c2))
}

pub fn decrypt(p: &BigUint, x: &BigUint, c1: &BigUint, c2: &BigUint) -> Result<BigUint> {
    let s = c1.modpow(x, p);
    let s_inv = s
        .mod_inverse(p)
        .and_then(|i| i.to_biguint())
        .ok_or_else(|| Error::MalformedKey("elgamal shared secret not invertible".into()))?;

    Ok((c2 * s_inv) % p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::RandPrime;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_roundtrip() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let p: BigUint = rng.gen_prime(256);
        let g = BigUint::from(5u32);
        let x = random_below(&mut rng, &(&p - 2u32)) + 1u32;
        let y = g.modpow(&x, &p);

        let m = BigUint::from(0xdeadbeefu32);
        let (c1, c2) = encrypt(&mut rng, &p, &g, &y, &m).unwrap();
        assert_eq!(decrypt(&p, &x, &c1, &c2).unwrap(), m);
    }
}
