use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use nom::bytes::complete::take;
use nom::combinator::{map, map_opt, rest};
use nom::number::complete::{be_u32, be_u8};
use nom::IResult;
use num_traits::FromPrimitive;

use crate::errors::Result;
use crate::packet::PacketTrait;
use crate::ser::Serialize;
use crate::types::{Tag, Version};
use crate::util::read_string_lossy;

/// The magic filename marking a message as "for your eyes only".
const CONSOLE: &str = "_CONSOLE";

/// Literal Data Packet
/// Ref: https://tools.ietf.org/html/rfc4880#section-5.9
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    packet_version: Version,
    mode: DataMode,
    file_name: String,
    created: DateTime<Utc>,
    data: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',
}

#[rustfmt::skip]
fn parse(i: &[u8]) -> IResult<&[u8], (DataMode, String, DateTime<Utc>, &[u8])> {
    let (i, mode)     = map_opt(be_u8, DataMode::from_u8)(i)?;
    let (i, name_len) = be_u8(i)?;
    let (i, name)     = map(take(name_len), read_string_lossy)(i)?;
    let (i, created)  = map_opt(be_u32, |v| Utc.timestamp_opt(i64::from(v), 0).single())(i)?;
    let (i, data)     = rest(i)?;

    Ok((i, (mode, name, created, data)))
}

impl LiteralData {
    /// Parses a `LiteralData` packet from the given slice.
    pub fn from_slice(packet_version: Version, input: &[u8]) -> Result<Self> {
        let (_, (mode, file_name, created, data)) = parse(input)?;

        if file_name == CONSOLE {
            warn!("literal data is marked for your eyes only");
        }

        Ok(LiteralData {
            packet_version,
            mode,
            file_name,
            created,
            data: data.to_vec(),
        })
    }

    /// Wraps binary data for encryption or signing. The creation time is
    /// left at the epoch, matching detached use.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        LiteralData {
            packet_version: Version::default(),
            mode: DataMode::Binary,
            file_name: file_name.into(),
            created: Utc.timestamp_opt(0, 0).unwrap(),
            data,
        }
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the special `_CONSOLE` filename asks the receiver not to
    /// write this data to disk.
    pub fn is_console(&self) -> bool {
        self.file_name == CONSOLE
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        crate::ensure!(
            self.file_name.len() < 256,
            "literal file name too long: {}",
            self.file_name.len()
        );

        writer.write_u8(self.mode as u8)?;
        writer.write_u8(self.file_name.len() as u8)?;
        writer.write_all(self.file_name.as_bytes())?;
        writer.write_u32::<BigEndian>(self.created.timestamp() as u32)?;
        writer.write_all(&self.data)?;

        Ok(())
    }
}

impl PacketTrait for LiteralData {
    fn packet_version(&self) -> Version {
        self.packet_version
    }

    fn tag(&self) -> Tag {
        Tag::LiteralData
    }
}
