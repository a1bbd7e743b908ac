use std::fmt;
use std::io;

use crate::errors::Result;
use crate::ser::Serialize;

/// An 8 octet key identifier, the low 64 bits of the fingerprint for V4
/// keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId([u8; 8]);

impl KeyId {
    pub fn from_slice(input: &[u8]) -> Result<KeyId> {
        crate::ensure_eq!(input.len(), 8, "invalid key id length {}", input.len());

        let mut raw = [0u8; 8];
        raw.copy_from_slice(input);
        Ok(KeyId(raw))
    }

    pub fn as_ref(&self) -> &[u8] {
        &self.0
    }

    /// An all-zero key id is the wildcard, matching any key.
    /// Ref: https://tools.ietf.org/html/rfc4880#section-5.1
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(self.0))
    }
}

impl Serialize for KeyId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice() {
        let id = KeyId::from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x11, 0x22, 0x33]).unwrap();
        assert_eq!(id.to_string(), "DEADBEEF00112233");
        assert!(!id.is_wildcard());
        assert!(KeyId::from_slice(&[0u8; 8]).unwrap().is_wildcard());
        assert!(KeyId::from_slice(&[1, 2, 3]).is_err());
    }
}
