use std::fmt;
use std::io;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use num_bigint::BigUint;
use zeroize::Zeroize;

use crate::errors::{Error, Result};
use crate::ser::Serialize;
use crate::util::{bit_length, strip_leading_zeros};

/// A Multi-Precision Integer: a big-endian magnitude prefixed on the wire
/// by its length in bits.
/// Ref: https://tools.ietf.org/html/rfc4880#section-3.2
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Mpi(Vec<u8>);

impl Mpi {
    /// Constructs an MPI from raw big-endian bytes, normalizing away
    /// leading zero octets. Zero is represented as the empty magnitude.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(strip_leading_zeros(raw).to_vec())
    }

    pub fn from_biguint(n: &BigUint) -> Self {
        Mpi::from_slice(&n.to_bytes_be())
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bit_len(&self) -> usize {
        bit_length(&self.0)
    }

    /// Byte length of the magnitude.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Mpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mpi({} bits, {})", self.bit_len(), hex::encode(&self.0))
    }
}

impl Zeroize for Mpi {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.bit_len() as u16)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

/// Reads a single MPI off the front of `input`, returning the rest.
pub fn read_mpi(input: &[u8]) -> Result<(&[u8], Mpi)> {
    if input.len() < 2 {
        return Err(Error::TruncatedMpi(format!(
            "{} bytes left, need at least 2 for the bit count",
            input.len()
        )));
    }

    let bits = BigEndian::read_u16(input) as usize;
    let len = (bits + 7) / 8;
    let rest = &input[2..];
    if rest.len() < len {
        return Err(Error::TruncatedMpi(format!(
            "declared {} bits ({} bytes), only {} bytes left",
            bits,
            len,
            rest.len()
        )));
    }

    Ok((&rest[len..], Mpi::from_slice(&rest[..len])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roundtrip() {
        for raw in [
            &[][..],
            &[0x01][..],
            &[0x7f, 0xff][..],
            &[0x01, 0x00, 0x00][..],
            &[0xde, 0xad, 0xbe, 0xef][..],
        ] {
            let mpi = Mpi::from_slice(raw);
            let encoded = mpi.to_bytes().unwrap();
            let (rest, decoded) = read_mpi(&encoded).unwrap();
            assert!(rest.is_empty());
            assert_eq!(decoded, mpi);
        }
    }

    #[test]
    fn test_zero() {
        let zero = Mpi::from_slice(&[0, 0, 0]);
        assert!(zero.is_zero());
        assert_eq!(zero.to_bytes().unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_encoded_bit_length_is_minimal() {
        // 511 needs 9 bits even when passed with leading zeros
        let mpi = Mpi::from_slice(&[0x00, 0x01, 0xff]);
        assert_eq!(mpi.bit_len(), 9);
        assert_eq!(mpi.to_bytes().unwrap(), vec![0x00, 0x09, 0x01, 0xff]);
    }

    #[test]
    fn test_biguint_roundtrip() {
        let n = BigUint::from(65537u32);
        let mpi = Mpi::from_biguint(&n);
        assert_eq!(mpi.to_biguint(), n);
        assert_eq!(mpi.bit_len(), 17);
    }

    #[test]
    fn test_truncated() {
        // declares 16 bits but carries a single byte
        let err = read_mpi(&[0x00, 0x10, 0xab]).unwrap_err();
        assert!(matches!(err, Error::TruncatedMpi(_)));

        let err = read_mpi(&[0x00]).unwrap_err();
        assert!(matches!(err, Error::TruncatedMpi(_)));
    }
}
