//! Flat payload reader for self-contained XG files.
//!
//! Some XG files carry no archive layer: after the preamble header and an
//! optional JPEG thumbnail, the rest of the file is one zlib stream of
//! concatenated record slots. The whole remainder is inflated in a single
//! pass and sliced into [`SLOT_SIZE`](crate::record::SLOT_SIZE) windows.

use std::io::{Read, Seek, SeekFrom};

use crate::codec::{Codec, ZlibCodec};
use crate::error::Result;
use crate::header::{RichGameHeader, HEADER_SIZE};
use crate::record::RecordStream;

/// JPEG start-of-image marker; a thumbnail without it is treated as absent.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// A fully inflated flat XG file: header, optional thumbnail, and the
/// decompressed record payload.
#[derive(Debug)]
pub struct FlatFile {
    pub header: RichGameHeader,
    pub thumbnail: Option<Vec<u8>>,
    payload: Vec<u8>,
}

impl FlatFile {
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        Self::read_with_codec(reader, ZlibCodec)
    }

    pub fn read_with_codec<R: Read + Seek, C: Codec>(mut reader: R, codec: C) -> Result<Self> {
        let mut head = vec![0u8; HEADER_SIZE];
        let got = read_full(&mut reader, &mut head)?;
        head.truncate(got);
        let header = RichGameHeader::decode(&head)?;

        let mut thumbnail = None;
        let mut payload_start = HEADER_SIZE as u64;
        if header.has_thumbnail() {
            reader.seek(SeekFrom::Start(header.thumbnail_offset))?;
            let mut thumb = vec![0u8; header.thumbnail_size as usize];
            reader.read_exact(&mut thumb)?;
            if thumb.len() >= 2 && thumb[..2] == JPEG_SOI {
                payload_start = header.thumbnail_offset + u64::from(header.thumbnail_size);
                thumbnail = Some(thumb);
            } else {
                log::warn!("thumbnail lacks the JPEG SOI marker, treating as absent");
            }
        }

        reader.seek(SeekFrom::Start(payload_start))?;
        let payload = codec.inflate_all(&mut reader)?;
        log::debug!(
            "flat payload inflated to {} bytes ({} slots)",
            payload.len(),
            payload.len() / crate::record::SLOT_SIZE
        );

        Ok(Self {
            header,
            thumbnail,
            payload,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the file and iterate its record slots.
    pub fn into_records(self) -> RecordStream {
        RecordStream::new(self.payload)
    }
}

/// Read until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
