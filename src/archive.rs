//! Trailer-indexed archive container.
//!
//! XG files bundle their sub-files (game header, game records, rollouts,
//! comments) in a small archive that is read from the end:
//!
//! 1. a 36-byte trailer at `end − 36` carries the whole-archive CRC32, the
//!    file count, and the registry/data sizes;
//! 2. the registry (one 532-byte entry per file, zlib-compressed when the
//!    trailer says so) sits immediately before the trailer;
//! 3. the data section sits immediately before the registry; entry `start`
//!    offsets are relative to its beginning.
//!
//! The whole-archive CRC32 covers data section + registry, excluding the
//! trailer itself, and is verified before the registry is parsed. Each
//! extracted file is CRC-checked against its registry entry; extraction
//! either yields exactly `osize` verified bytes or an explicit error.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher;

use crate::codec::{crc32, Codec, ZlibCodec, INFLATE_CHUNK};
use crate::error::{IntegrityError, Result, XgError};

/// On-disk size of [`ArchiveTrailer`].
pub const TRAILER_SIZE: u64 = 36;
/// On-disk size of one registry entry.
pub const ENTRY_SIZE: usize = 532;

/// The 36-byte record at the end of every archive.
#[derive(Debug, Clone)]
pub struct ArchiveTrailer {
    pub crc: u32,
    pub file_count: i32,
    pub version: i32,
    pub registry_size: i32,
    pub archive_size: i32,
    pub compressed_registry: bool,
}

impl ArchiveTrailer {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let crc = reader.read_u32::<LittleEndian>()?;
        let file_count = reader.read_i32::<LittleEndian>()?;
        let version = reader.read_i32::<LittleEndian>()?;
        let registry_size = reader.read_i32::<LittleEndian>()?;
        let archive_size = reader.read_i32::<LittleEndian>()?;
        let compressed_registry = reader.read_i32::<LittleEndian>()? != 0;
        let mut reserved = [0u8; 12];
        reader.read_exact(&mut reserved)?;
        Ok(Self {
            crc,
            file_count,
            version,
            registry_size,
            archive_size,
            compressed_registry,
        })
    }
}

/// One 532-byte registry entry.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub osize: i32,
    pub csize: i32,
    /// Byte offset relative to the start of the data section.
    pub start: i32,
    pub crc: u32,
    /// 0 means zlib-compressed, any other value means stored verbatim.
    /// The inverted sense is part of the wire format.
    pub compressed_flag: u8,
    pub compression_level: u8,
}

impl FileEntry {
    pub fn decode(buf: &[u8]) -> io::Result<Self> {
        if buf.len() < ENTRY_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "registry entry truncated",
            ));
        }
        let name = pascal_string(&buf[0..256]);
        let path = pascal_string(&buf[256..512]);
        let mut cur = Cursor::new(&buf[512..]);
        let osize = cur.read_i32::<LittleEndian>()?;
        let csize = cur.read_i32::<LittleEndian>()?;
        let start = cur.read_i32::<LittleEndian>()?;
        let crc = cur.read_u32::<LittleEndian>()?;
        let compressed_flag = cur.read_u8()?;
        cur.set_position(cur.position() + 2); // reserved
        let compression_level = cur.read_u8()?;
        Ok(Self {
            name,
            path,
            osize,
            csize,
            start,
            crc,
            compressed_flag,
            compression_level,
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed_flag == 0
    }
}

/// Length-prefixed string in a fixed-size field: one length byte followed
/// by up to 255 data bytes, no terminator.
fn pascal_string(field: &[u8]) -> String {
    let len = (field[0] as usize).min(field.len() - 1);
    String::from_utf8_lossy(&field[1..1 + len]).into_owned()
}

/// Read-side archive handle. Owns the stream cursor; all operations seek.
pub struct ArchiveContainer<R: Read + Seek, C: Codec = ZlibCodec> {
    reader: R,
    codec: C,
    trailer: ArchiveTrailer,
    entries: Vec<FileEntry>,
    data_start: u64,
}

impl<R: Read + Seek> ArchiveContainer<R> {
    /// Open an archive with the production zlib codec.
    pub fn open(reader: R) -> Result<Self> {
        Self::with_codec(reader, ZlibCodec)
    }
}

impl<R: Read + Seek, C: Codec> ArchiveContainer<R, C> {
    /// Open an archive: locate the trailer, verify the whole-archive CRC32,
    /// then parse the registry.
    pub fn with_codec(mut reader: R, codec: C) -> Result<Self> {
        let end = reader.seek(SeekFrom::End(0))?;
        if end < TRAILER_SIZE {
            return Err(malformed(format!(
                "stream of {end} bytes cannot hold a {TRAILER_SIZE}-byte trailer"
            )));
        }
        reader.seek(SeekFrom::Start(end - TRAILER_SIZE))?;
        let trailer = ArchiveTrailer::read(&mut reader)?;

        if trailer.file_count < 0 || trailer.registry_size < 0 || trailer.archive_size < 0 {
            return Err(malformed(format!(
                "negative trailer geometry (files {}, registry {}, data {})",
                trailer.file_count, trailer.registry_size, trailer.archive_size
            )));
        }
        let registry_pos = (end - TRAILER_SIZE)
            .checked_sub(trailer.registry_size as u64)
            .ok_or_else(|| malformed("registry size exceeds stream length".into()))?;
        let data_start = registry_pos
            .checked_sub(trailer.archive_size as u64)
            .ok_or_else(|| malformed("archive size exceeds stream length".into()))?;

        verify_archive_crc(&mut reader, data_start, end - TRAILER_SIZE, trailer.crc)?;

        reader.seek(SeekFrom::Start(registry_pos))?;
        let registry_len = trailer.file_count as usize * ENTRY_SIZE;
        let registry = if trailer.compressed_registry {
            codec.inflate_bounded(&mut reader, trailer.registry_size as u64, registry_len)?
        } else {
            let mut raw = vec![0u8; trailer.registry_size as usize];
            reader.read_exact(&mut raw)?;
            raw
        };
        if registry.len() < registry_len {
            return Err(malformed(format!(
                "registry holds {} bytes, {} entries need {}",
                registry.len(),
                trailer.file_count,
                registry_len
            )));
        }

        let mut entries = Vec::with_capacity(trailer.file_count as usize);
        for chunk in registry.chunks_exact(ENTRY_SIZE).take(trailer.file_count as usize) {
            entries.push(FileEntry::decode(chunk)?);
        }
        log::debug!(
            "archive opened: {} file(s), data section at {data_start}",
            entries.len()
        );

        Ok(Self {
            reader,
            codec,
            trailer,
            entries,
            data_start,
        })
    }

    pub fn trailer(&self) -> &ArchiveTrailer {
        &self.trailer
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Extract one file: streaming inflate (or raw copy for stored
    /// entries), then CRC32 verification of the decompressed bytes.
    pub fn extract(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        self.reader
            .seek(SeekFrom::Start(self.data_start + entry.start as u64))?;
        let data = if entry.is_compressed() {
            self.codec.inflate_bounded(
                &mut self.reader,
                entry.csize as u64,
                entry.osize as usize,
            )?
        } else {
            let mut raw = vec![0u8; entry.csize as usize];
            self.reader.read_exact(&mut raw)?;
            raw
        };

        let actual = crc32(&data);
        if actual != entry.crc {
            return Err(IntegrityError::FileCrcMismatch {
                name: entry.name.clone(),
                expected: entry.crc,
                actual,
            }
            .into());
        }
        Ok(data)
    }

    /// Extract the registry entry at `index`.
    pub fn extract_at(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| malformed(format!("no registry entry {index}")))?;
        self.extract(&entry)
    }

    /// Extract every file in registry order.
    pub fn extract_all(&mut self) -> Result<Vec<(FileEntry, Vec<u8>)>> {
        let entries = self.entries.clone();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = self.extract(&entry)?;
            out.push((entry, data));
        }
        Ok(out)
    }
}

fn verify_archive_crc<R: Read + Seek>(
    reader: &mut R,
    from: u64,
    to: u64,
    expected: u32,
) -> Result<()> {
    reader.seek(SeekFrom::Start(from))?;
    let mut hasher = Hasher::new();
    let mut chunk = [0u8; INFLATE_CHUNK];
    let mut remaining = to - from;
    while remaining > 0 {
        let want = (remaining.min(INFLATE_CHUNK as u64)) as usize;
        reader.read_exact(&mut chunk[..want])?;
        hasher.update(&chunk[..want]);
        remaining -= want as u64;
    }
    let actual = hasher.finalize();
    if actual != expected {
        return Err(IntegrityError::ArchiveCrcMismatch { expected, actual }.into());
    }
    Ok(())
}

fn malformed(msg: String) -> XgError {
    XgError::Io(io::Error::new(io::ErrorKind::InvalidData, msg))
}
