//! Virtual 2315 image format.
//!
//! A 365-byte header followed by the cartridge payload:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 10 | magic `89 "2315" 0D 0A 1A 00 00` |
//! | 10 | 4 | version `"1.3\0"` |
//! | 14 | 11 | cartridge id |
//! | 25 | 200 | description |
//! | 225 | 20 | creation date |
//! | 245 | 100 | controller label |
//! | 345 | 20 | bit rate, cylinders, sectors, heads, µs/sector (u32 BE) |
//!
//! Text fields are NUL padded. The payload holds one 642-byte record (321
//! words) per pair of sector marks, cylinder-major then head.

use std::io::{ErrorKind, Read, Write};

use thiserror::Error;

use super::{StorageError, StorageResult};
use crate::hardware::DeviceRam;
use crate::state::{CartridgeLabel, Geometry};

pub const MAGIC: [u8; 10] = [0x89, b'2', b'3', b'1', b'5', 0x0D, 0x0A, 0x1A, 0x00, 0x00];
pub const VERSION: [u8; 4] = *b"1.3\0";

const ID_LEN: usize = 11;
const DESCRIPTION_LEN: usize = 200;
const DATE_LEN: usize = 20;
const CONTROLLER_LEN: usize = 100;

pub const HEADER_LEN: usize =
    MAGIC.len() + VERSION.len() + ID_LEN + DESCRIPTION_LEN + DATE_LEN + CONTROLLER_LEN + 5 * 4;

/// Bytes per 321-word sector record.
pub const SECTOR_BYTES: usize = 642;

/// Largest geometry a header may declare.
pub const MAX_CYLINDERS: u32 = 1024;
pub const MAX_HEADS: u32 = 16;
pub const MAX_SECTORS_PER_TRACK: u32 = 64;

/// Why a header was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header truncated or inconsistent")]
    Malformed,

    #[error("not a 2315 image")]
    BadType,

    #[error("unsupported image version")]
    BadVersion,
}

/// Parsed image header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageHeader {
    pub label: CartridgeLabel,
    pub geometry: Geometry,
}

impl ImageHeader {
    /// Parse a header from the start of `reader`.
    pub fn read_from<R: Read>(reader: &mut R) -> StorageResult<Self> {
        let mut raw = [0u8; HEADER_LEN];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => StorageError::Header(HeaderError::Malformed),
            _ => StorageError::Io(e),
        })?;
        Ok(Self::decode(&raw)?)
    }

    /// Decode a complete header.
    pub fn decode(raw: &[u8; HEADER_LEN]) -> Result<Self, HeaderError> {
        let mut fields = Fields { raw, pos: 0 };
        if fields.take(MAGIC.len()) != MAGIC {
            return Err(HeaderError::BadType);
        }
        if fields.take(VERSION.len()) != VERSION {
            return Err(HeaderError::BadVersion);
        }

        let label = CartridgeLabel {
            id: fields.text(ID_LEN),
            description: fields.text(DESCRIPTION_LEN),
            date: fields.text(DATE_LEN),
        };
        let controller = fields.text(CONTROLLER_LEN);
        let geometry = Geometry {
            controller,
            bit_rate: fields.word(),
            cylinders: fields.word(),
            sectors_per_track: fields.word(),
            heads: fields.word(),
            microseconds_per_sector: fields.word(),
        };

        if !(1..=MAX_CYLINDERS).contains(&geometry.cylinders)
            || !(2..=MAX_SECTORS_PER_TRACK).contains(&geometry.sectors_per_track)
            || !(1..=MAX_HEADS).contains(&geometry.heads)
        {
            return Err(HeaderError::Malformed);
        }
        Ok(Self { label, geometry })
    }

    /// Encode the header. Text longer than its field is truncated.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        let mut pos = 0;
        let mut put = |bytes: &[u8], len: usize| {
            let n = bytes.len().min(len);
            raw[pos..pos + n].copy_from_slice(&bytes[..n]);
            pos += len;
        };

        put(&MAGIC, MAGIC.len());
        put(&VERSION, VERSION.len());
        put(self.label.id.as_bytes(), ID_LEN);
        put(self.label.description.as_bytes(), DESCRIPTION_LEN);
        put(self.label.date.as_bytes(), DATE_LEN);
        put(self.geometry.controller.as_bytes(), CONTROLLER_LEN);
        let g = &self.geometry;
        for word in [
            g.bit_rate,
            g.cylinders,
            g.sectors_per_track,
            g.heads,
            g.microseconds_per_sector,
        ] {
            put(&word.to_be_bytes(), 4);
        }
        raw
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> StorageResult<()> {
        writer.write_all(&self.encode())?;
        Ok(())
    }
}

/// Sequential field reader over a header buffer.
struct Fields<'a> {
    raw: &'a [u8; HEADER_LEN],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let raw: &'a [u8; HEADER_LEN] = self.raw;
        let field = &raw[self.pos..self.pos + len];
        self.pos += len;
        field
    }

    fn text(&mut self, len: usize) -> String {
        let field = self.take(len);
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        String::from_utf8_lossy(&field[..end]).into_owned()
    }

    fn word(&mut self) -> u32 {
        let field = self.take(4);
        u32::from_be_bytes([field[0], field[1], field[2], field[3]])
    }
}

/// Number of sector records in the payload, or `None` if it overflows.
pub fn sector_count(geometry: &Geometry) -> Option<usize> {
    let records = u64::from(geometry.cylinders)
        .checked_mul(u64::from(geometry.heads))?
        .checked_mul(u64::from(geometry.sectors_per_track / 2))?;
    usize::try_from(records).ok()
}

/// Payload length in bytes, or `None` if it overflows.
pub fn payload_len(geometry: &Geometry) -> Option<usize> {
    sector_count(geometry)?.checked_mul(SECTOR_BYTES)
}

/// Device RAM address of sector record `index`.
fn record_address(index: usize) -> Result<u32, HeaderError> {
    index
        .checked_mul(SECTOR_BYTES)
        .and_then(|address| u32::try_from(address).ok())
        .ok_or(HeaderError::Malformed)
}

/// Copy the payload from `reader` into device RAM starting at address 0.
pub fn load_payload<R: Read>(
    reader: &mut R,
    geometry: &Geometry,
    ram: &mut dyn DeviceRam,
) -> StorageResult<()> {
    let records = sector_count(geometry).ok_or(HeaderError::Malformed)?;
    let mut record = [0u8; SECTOR_BYTES];
    for index in 0..records {
        let address = record_address(index)?;
        reader.read_exact(&mut record).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => StorageError::ShortRead {
                expected: records * SECTOR_BYTES,
            },
            _ => StorageError::Io(e),
        })?;
        ram.write_block(address, &record)?;
    }
    Ok(())
}

/// Copy the payload out of device RAM into `writer`.
pub fn store_payload<W: Write>(
    writer: &mut W,
    geometry: &Geometry,
    ram: &mut dyn DeviceRam,
) -> StorageResult<()> {
    let records = sector_count(geometry).ok_or(HeaderError::Malformed)?;
    let mut record = [0u8; SECTOR_BYTES];
    for index in 0..records {
        ram.read_block(record_address(index)?, &mut record)?;
        writer.write_all(&record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusError;

    struct VecRam(Vec<u8>);

    impl DeviceRam for VecRam {
        fn write_block(&mut self, address: u32, data: &[u8]) -> Result<(), BusError> {
            let start = address as usize;
            self.0[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }

        fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), BusError> {
            let start = address as usize;
            buf.copy_from_slice(&self.0[start..start + buf.len()]);
            Ok(())
        }
    }

    fn sample_header() -> ImageHeader {
        ImageHeader {
            label: CartridgeLabel {
                id: "DMS2V12".into(),
                description: "Disk Monitor System".into(),
                date: "1969-04-01".into(),
            },
            geometry: Geometry::default(),
        }
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(HEADER_LEN, 365);
        let raw = sample_header().encode();
        assert_eq!(&raw[..10], &MAGIC);
        assert_eq!(&raw[10..14], b"1.3\0");
        assert_eq!(&raw[14..21], b"DMS2V12");
        assert_eq!(&raw[245..253], b"IBM 1130");
        // bit rate 720000 = 0x000AFC80
        assert_eq!(&raw[345..349], &[0x00, 0x0A, 0xFC, 0x80]);
        assert_eq!(&raw[349..353], &203u32.to_be_bytes());
    }

    #[test]
    fn test_decode_encoded_header() {
        let header = sample_header();
        assert_eq!(ImageHeader::decode(&header.encode()), Ok(header));
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let mut raw = sample_header().encode();
        raw[1] = b'X';
        assert_eq!(ImageHeader::decode(&raw), Err(HeaderError::BadType));

        let mut raw = sample_header().encode();
        raw[12] = b'2';
        assert_eq!(ImageHeader::decode(&raw), Err(HeaderError::BadVersion));
    }

    #[test]
    fn test_rejects_zero_geometry() {
        let mut header = sample_header();
        header.geometry.cylinders = 0;
        assert_eq!(ImageHeader::decode(&header.encode()), Err(HeaderError::Malformed));
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let raw = sample_header().encode();
        let mut short = &raw[..100];
        assert!(matches!(
            ImageHeader::read_from(&mut short),
            Err(StorageError::Header(HeaderError::Malformed))
        ));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let mut header = sample_header();
        header.label.id = "ABCDEFGHIJKLMNOP".into();
        let decoded = ImageHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.label.id, "ABCDEFGHIJK");
    }

    #[test]
    fn test_default_payload_size() {
        let geometry = Geometry::default();
        assert_eq!(payload_len(&geometry), Some(1_042_608));
        assert_eq!(HEADER_LEN + 1_042_608, 1_042_973);
    }

    #[test]
    fn test_rejects_oversized_geometry() {
        for (cylinders, sectors, heads) in [
            (MAX_CYLINDERS + 1, 8, 2),
            (203, MAX_SECTORS_PER_TRACK + 1, 2),
            (203, 8, MAX_HEADS + 1),
            (u32::MAX, u32::MAX, u32::MAX),
        ] {
            let mut header = sample_header();
            header.geometry.cylinders = cylinders;
            header.geometry.sectors_per_track = sectors;
            header.geometry.heads = heads;
            assert_eq!(
                ImageHeader::decode(&header.encode()),
                Err(HeaderError::Malformed),
                "{cylinders}x{sectors}x{heads}"
            );
        }

        let mut header = sample_header();
        header.geometry.cylinders = MAX_CYLINDERS;
        header.geometry.sectors_per_track = MAX_SECTORS_PER_TRACK;
        header.geometry.heads = MAX_HEADS;
        assert!(ImageHeader::decode(&header.encode()).is_ok());
    }

    #[test]
    fn test_overflowing_geometry_is_not_streamed() {
        let geometry = Geometry {
            cylinders: u32::MAX,
            sectors_per_track: u32::MAX,
            heads: u32::MAX,
            ..Geometry::default()
        };
        let mut ram = VecRam(vec![0; SECTOR_BYTES]);
        let mut source: &[u8] = &[0; SECTOR_BYTES];
        assert!(matches!(
            load_payload(&mut source, &geometry, &mut ram),
            Err(StorageError::Header(HeaderError::Malformed))
        ));
        assert!(matches!(
            store_payload(&mut Vec::new(), &geometry, &mut ram),
            Err(StorageError::Header(HeaderError::Malformed))
        ));
    }

    #[test]
    fn test_payload_streaming() {
        let geometry = Geometry {
            cylinders: 2,
            sectors_per_track: 4,
            heads: 1,
            ..Geometry::default()
        };
        let len = payload_len(&geometry).unwrap();
        let source: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let mut ram = VecRam(vec![0; len]);
        load_payload(&mut source.as_slice(), &geometry, &mut ram).unwrap();
        assert_eq!(ram.0, source);

        let mut out = Vec::new();
        store_payload(&mut out, &geometry, &mut ram).unwrap();
        assert_eq!(out, source);

        let mut short = &source[..len - 1];
        assert!(matches!(
            load_payload(&mut short, &geometry, &mut ram),
            Err(StorageError::ShortRead { expected }) if expected == len
        ));
    }
}
