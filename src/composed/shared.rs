use std::io::Read;

use crate::errors::{Error, Result};
use crate::packet::{self, Packet};

/// Compositions are ordered packet sequences with a declared shape. This
/// trait turns raw bytes or parsed packets into them.
pub trait Deserializable: Sized {
    /// Parses a single composition from raw bytes.
    fn from_bytes(bytes: impl Read) -> Result<Self> {
        let mut all = Self::from_bytes_many(bytes)?;
        crate::ensure!(all.len() < 2, "expected a single composition");

        all.pop()
            .ok_or_else(|| Error::ContainerShapeViolation("no composition found".into()))
    }

    /// Parses a single composition from a slice.
    fn from_slice(input: &[u8]) -> Result<Self> {
        Self::from_bytes(input)
    }

    /// Parses every composition in a raw byte stream.
    fn from_bytes_many(bytes: impl Read) -> Result<Vec<Self>> {
        let packets = packet::parser(bytes)?;

        Self::from_packets(packets)
    }

    /// Shapes a list of packets into compositions.
    fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>>;
}
