use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;

/// Writes a length in the new-format encoding, shared between new style
/// packet headers and signature subpackets.
/// Ref: https://tools.ietf.org/html/rfc4880#section-4.2.2
pub fn write_packet_length(len: usize, writer: &mut impl io::Write) -> Result<()> {
    if len < 192 {
        writer.write_u8(len as u8)?;
    } else if len < 8384 {
        writer.write_u8(((len - 192) / 256 + 192) as u8)?;
        writer.write_u8(((len - 192) % 256) as u8)?;
    } else {
        writer.write_u8(255)?;
        writer.write_u32::<BigEndian>(len as u32)?;
    }

    Ok(())
}

/// Number of octets `write_packet_length` will produce for `len`.
pub fn packet_length_len(len: usize) -> usize {
    if len < 192 {
        1
    } else if len < 8384 {
        2
    } else {
        5
    }
}

pub fn read_string_lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_string()
}

pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let offset = bytes.iter().take_while(|b| **b == 0).count();
    &bytes[offset..]
}

/// Bit length of a big-endian magnitude without leading zero octets.
pub fn bit_length(bytes: &[u8]) -> usize {
    match bytes.first() {
        None => 0,
        Some(first) => (bytes.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
    }
}

/// Left pads `bytes` with zeros to exactly `size` octets.
pub fn left_pad(bytes: &[u8], size: usize) -> Vec<u8> {
    debug_assert!(bytes.len() <= size);

    let mut out = vec![0u8; size];
    out[size - bytes.len()..].copy_from_slice(bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_packet_length() {
        let cases: &[(usize, &[u8])] = &[
            (0, &[0x00]),
            (191, &[0xbf]),
            (192, &[0xc0, 0x00]),
            (1723, &[0xc5, 0xfb]),
            (8383, &[0xdf, 0xff]),
            (8384, &[0xff, 0x00, 0x00, 0x20, 0xc0]),
        ];

        for (len, expected) in cases {
            let mut buf = Vec::new();
            write_packet_length(*len, &mut buf).unwrap();
            assert_eq!(&buf[..], *expected, "length {}", len);
            assert_eq!(buf.len(), packet_length_len(*len));
        }
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(&[]), 0);
        assert_eq!(bit_length(&[0x01]), 1);
        assert_eq!(bit_length(&[0xff]), 8);
        assert_eq!(bit_length(&[0x01, 0x00]), 9);
        assert_eq!(bit_length(&[0x80, 0x00, 0x00]), 24);
    }

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros(&[0, 0, 1, 0]), &[1, 0][..]);
        assert_eq!(strip_leading_zeros(&[1, 2]), &[1, 2][..]);
        assert_eq!(strip_leading_zeros(&[0, 0]), &[][..]);
    }
}
