//! Fixed preamble header of an XG file.
//!
//! Every XG file starts with an 8232-byte header: magic, version, header
//! size, thumbnail pointer, GUID, and four fixed UTF-16LE metadata slots.
//! Validation order is size → magic → declared header size; nothing past a
//! failed check is decoded.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use uuid::Uuid;

use crate::error::FormatError;

/// Raw bytes `52 47 4D 48` ("RGMH") read as a little-endian u32.
pub const MAGIC: u32 = 0x484D_4752;
pub const HEADER_VERSION: u32 = 1;
/// Total size of the preamble, also the value of its own size field.
pub const HEADER_SIZE: usize = 8232;

/// Each metadata slot holds 1024 UTF-16 code units (2048 bytes).
const STRING_UNITS: usize = 1024;

#[derive(Debug, Clone)]
pub struct RichGameHeader {
    pub magic: u32,
    pub version: u32,
    pub header_size: u32,
    pub thumbnail_offset: u64,
    pub thumbnail_size: u32,
    pub guid: Uuid,
    pub game_name: String,
    pub save_name: String,
    pub level_name: String,
    pub comments: String,
}

impl RichGameHeader {
    /// Decode the fixed preamble from the first [`HEADER_SIZE`] bytes of a
    /// file. Pure function; the caller owns all I/O.
    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_SIZE {
            return Err(FormatError::TooSmall {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let mut cur = Cursor::new(buf);
        let magic = read_u32(&mut cur);
        if magic != MAGIC {
            return Err(FormatError::InvalidMagic {
                expected: MAGIC,
                actual: magic,
            });
        }
        let version = read_u32(&mut cur);
        let header_size = read_u32(&mut cur);
        if header_size as usize != HEADER_SIZE {
            return Err(FormatError::InvalidHeaderSize {
                expected: HEADER_SIZE as u32,
                actual: header_size,
            });
        }

        let thumbnail_offset = cur.read_u64::<LittleEndian>().unwrap_or(0);
        let thumbnail_size = read_u32(&mut cur);

        let mut guid_bytes = [0u8; 16];
        guid_bytes.copy_from_slice(&buf[24..40]);
        // Stored with little-endian 4+2+2 components followed by 8 raw
        // bytes, the Windows GUID layout.
        let guid = Uuid::from_bytes_le(guid_bytes);

        let game_name = decode_utf16_slot(&buf[36..36 + 2 * STRING_UNITS]);
        let save_name = decode_utf16_slot(&buf[2084..2084 + 2 * STRING_UNITS]);
        let level_name = decode_utf16_slot(&buf[4132..4132 + 2 * STRING_UNITS]);
        let comments = decode_utf16_slot(&buf[6180..6180 + 2 * STRING_UNITS]);

        Ok(Self {
            magic,
            version,
            header_size,
            thumbnail_offset,
            thumbnail_size,
            guid,
            game_name,
            save_name,
            level_name,
            comments,
        })
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_size > 0
    }
}

fn read_u32(cur: &mut Cursor<&[u8]>) -> u32 {
    // Length was checked up front; reads inside HEADER_SIZE cannot fail.
    cur.read_u32::<LittleEndian>().unwrap_or(0)
}

/// Decode one fixed 2048-byte UTF-16LE slot, truncated at the first NUL
/// code unit. Invalid UTF-16 degrades to a hex dump of the slot instead of
/// failing the header decode.
fn decode_utf16_slot(slot: &[u8]) -> String {
    let units: Vec<u16> = slot
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    match String::from_utf16(&units[..end]) {
        Ok(s) => s,
        Err(_) => {
            log::warn!("metadata slot is not valid UTF-16, keeping hex dump");
            hex::encode(slot)
        }
    }
}
