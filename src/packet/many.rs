use std::io::Read;

use log::{debug, warn};

use crate::errors::Result;
use crate::packet::{single, Packet};

/// Parses a packet stream from a slice. Packets whose bodies do not parse
/// are skipped with a warning; framing errors abort.
pub fn from_slice(input: &[u8]) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        let (r, parsed) = single::next_packet(rest)?;
        match parsed {
            Ok(packet) => {
                debug!("-- parsed packet tag {} --", packet.tag());
                packets.push(packet);
            }
            Err(err) => {
                warn!("skipping invalid packet: {:?}", err);
            }
        }
        rest = r;
    }

    Ok(packets)
}

/// Parses all packets from the given reader.
pub fn parser(mut input: impl Read) -> Result<Vec<Packet>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;

    from_slice(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::Serialize;
    use crate::packet::LiteralData;
    use crate::types::Tag;

    #[test]
    fn test_stream_with_invalid_packet() {
        let good = Packet::LiteralData(LiteralData::new("a", b"one".to_vec()));

        let mut stream = good.to_bytes().unwrap();
        // a marker packet with a corrupt body parses as a framing-ok,
        // body-bad packet and is skipped
        stream.extend_from_slice(&[0xca, 0x03, b'X', b'G', b'P']);
        stream.extend_from_slice(&good.to_bytes().unwrap());

        let packets = from_slice(&stream).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(packets
            .iter()
            .all(|p| p.tag() == Tag::LiteralData as u8));
    }
}
