use byteorder::{BigEndian, ByteOrder};

use crate::errors::{Error, Result};

/// 16 bit additive checksum over `data`, modulo 65536.
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.5.3
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, b| sum.wrapping_add(u16::from(*b)))
}

/// Verifies the two octet checksum trailing a session key.
pub fn simple(expected: &[u8], data: &[u8]) -> Result<()> {
    if expected.len() != 2 || BigEndian::read_u16(expected) != calculate_simple(data) {
        return Err(Error::ChecksumMismatch(format!(
            "expected {}, calculated {:04x}",
            hex::encode(expected),
            calculate_simple(data)
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple() {
        assert_eq!(calculate_simple(&[]), 0);
        assert_eq!(calculate_simple(&[1, 2, 3]), 6);
        // wraps mod 2^16
        assert_eq!(calculate_simple(&[0xff; 257]), (0xff * 257 % 65536) as u16);

        assert!(simple(&[0x00, 0x06], &[1, 2, 3]).is_ok());
        assert!(matches!(
            simple(&[0x00, 0x07], &[1, 2, 3]),
            Err(Error::ChecksumMismatch(_))
        ));
    }
}
