use std::io::{self, Read, Write};

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::Compression;
use num_traits::FromPrimitive;

use crate::errors::{Error, Result};
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Tag, Version};

/// Compressed Data Packet
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.6
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    packet_version: Version,
    compression_algorithm: CompressionAlgorithm,
    compressed_data: Vec<u8>,
}

impl CompressedData {
    /// Parses a `CompressedData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        crate::ensure!(!input.is_empty(), "compressed data packet is empty");

        let alg = CompressionAlgorithm::from_u8(input[0])
            .ok_or_else(|| Error::UnsupportedAlgorithm(format!("compression {}", input[0])))?;

        Ok(CompressedData {
            packet_version,
            compression_algorithm: alg,
            compressed_data: input[1..].to_vec(),
        })
    }

    /// Compresses `data` under `alg`.
    pub fn compress(alg: CompressionAlgorithm, data: &[u8]) -> Result<Self> {
        let compressed_data = match alg {
            CompressionAlgorithm::Uncompressed => data.to_vec(),
            CompressionAlgorithm::ZIP => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionAlgorithm::ZLIB => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionAlgorithm::BZip2 => {
                return Err(Error::UnsupportedAlgorithm("bzip2 compression".into()))
            }
        };

        Ok(CompressedData {
            packet_version: Version::default(),
            compression_algorithm: alg,
            compressed_data,
        })
    }

    /// Recovers the packet stream held inside.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression_algorithm {
            CompressionAlgorithm::Uncompressed => Ok(self.compressed_data.clone()),
            CompressionAlgorithm::ZIP => {
                let mut out = Vec::new();
                DeflateDecoder::new(&self.compressed_data[..]).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionAlgorithm::ZLIB => {
                let mut out = Vec::new();
                ZlibDecoder::new(&self.compressed_data[..]).read_to_end(&mut out)?;
                Ok(out)
            }
            CompressionAlgorithm::BZip2 => {
                Err(Error::UnsupportedAlgorithm("bzip2 compression".into()))
            }
        }
    }

    pub fn compression_algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    pub fn compressed_data(&self) -> &[u8] {
        &self.compressed_data
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.compression_algorithm as u8])?;
        writer.write_all(&self.compressed_data)?;
        Ok(())
    }
}

impl PacketTrait for CompressedData {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::CompressedData
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roundtrip() {
        let data = b"a packet stream, repeated: a packet stream".to_vec();
        for alg in [
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
        ] {
            let packet = CompressedData::compress(alg, &data).unwrap();
            let bytes = packet.to_bytes().unwrap();
            let parsed = CompressedData::from_slice(Version::New, &bytes).unwrap();
            assert_eq!(parsed.decompress().unwrap(), data, "{:?}", alg);
        }
    }

    #[test]
    fn test_bzip2_unsupported() {
        assert!(matches!(
            CompressedData::compress(CompressionAlgorithm::BZip2, b"x"),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
