//! Segment-level walk over an XG file.
//!
//! For callers that want the raw sub-files rather than decoded records:
//! a pull-based sequence of named segments in a fixed order — preamble
//! header, thumbnail (when present), then one segment per archived file in
//! registry order. The walk shares a single cursor with the archive
//! reader, so it is finite and non-restartable; re-iterating means
//! reopening the source.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use crate::archive::ArchiveContainer;
use crate::error::{FormatError, Result};
use crate::header::{RichGameHeader, HEADER_SIZE};
use crate::record::RecordStream;

/// Secondary magic carried in-band by the game sub-file.
pub const GAME_FILE_MARKER: &[u8; 4] = b"DMLI";
/// Offset of [`GAME_FILE_MARKER`] from the start of the game segment.
pub const GAME_FILE_MARKER_OFFSET: usize = 556;

/// Semantic role of a segment, keyed on the archived file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    /// The fixed preamble header.
    Header,
    /// Embedded JPEG thumbnail.
    Thumbnail,
    /// `temp.xgi` — game header sub-file.
    GameHeader,
    /// `temp.xg` — the record slots.
    GameFile,
    /// `temp.xgr` — rollout data.
    Rollouts,
    /// `temp.xgc` — comment text.
    Comments,
    /// Any name this decoder does not recognise.
    Unknown,
}

impl SegmentRole {
    pub fn from_name(name: &str) -> Self {
        match name {
            "temp.xgi" => SegmentRole::GameHeader,
            "temp.xg" => SegmentRole::GameFile,
            "temp.xgr" => SegmentRole::Rollouts,
            "temp.xgc" => SegmentRole::Comments,
            _ => SegmentRole::Unknown,
        }
    }
}

/// One named segment: role, length, and a readable view of its bytes.
#[derive(Debug)]
pub struct Segment {
    pub name: String,
    pub role: SegmentRole,
    data: Vec<u8>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn reader(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.data)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Walks an XG file segment by segment. Segments are produced on demand;
/// stopping early simply leaves the remaining ones unread.
pub struct SegmentWalker<R: Read + Seek> {
    header: RichGameHeader,
    pending_header: Option<Vec<u8>>,
    pending_thumbnail: Option<Vec<u8>>,
    archive: ArchiveContainer<R>,
    next_entry: usize,
}

impl<R: Read + Seek> SegmentWalker<R> {
    pub fn open(mut reader: R) -> Result<Self> {
        let mut head = vec![0u8; HEADER_SIZE];
        let got = read_full(&mut reader, &mut head)?;
        head.truncate(got);
        let header = RichGameHeader::decode(&head)?;

        let pending_thumbnail = if header.has_thumbnail() {
            reader.seek(SeekFrom::Start(header.thumbnail_offset))?;
            let mut thumb = vec![0u8; header.thumbnail_size as usize];
            reader.read_exact(&mut thumb)?;
            Some(thumb)
        } else {
            None
        };

        let archive = ArchiveContainer::open(reader)?;
        Ok(Self {
            header,
            pending_header: Some(head),
            pending_thumbnail,
            archive,
            next_entry: 0,
        })
    }

    pub fn header(&self) -> &RichGameHeader {
        &self.header
    }

    /// Produce the next segment, or `None` once the archive is exhausted.
    pub fn next_segment(&mut self) -> Result<Option<Segment>> {
        if let Some(data) = self.pending_header.take() {
            return Ok(Some(Segment {
                name: "header".to_owned(),
                role: SegmentRole::Header,
                data,
            }));
        }
        if let Some(data) = self.pending_thumbnail.take() {
            return Ok(Some(Segment {
                name: "thumbnail".to_owned(),
                role: SegmentRole::Thumbnail,
                data,
            }));
        }

        let entry = match self.archive.entries().get(self.next_entry) {
            Some(e) => e.clone(),
            None => return Ok(None),
        };
        self.next_entry += 1;

        let data = self.archive.extract(&entry)?;
        let role = SegmentRole::from_name(&entry.name);
        if role == SegmentRole::GameFile {
            let marker_end = GAME_FILE_MARKER_OFFSET + GAME_FILE_MARKER.len();
            if data.len() < marker_end
                || &data[GAME_FILE_MARKER_OFFSET..marker_end] != GAME_FILE_MARKER
            {
                return Err(FormatError::InvalidGameFile {
                    offset: GAME_FILE_MARKER_OFFSET as u64,
                }
                .into());
            }
        }

        Ok(Some(Segment {
            name: entry.name,
            role,
            data,
        }))
    }
}

impl<R: Read + Seek> Iterator for SegmentWalker<R> {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_segment().transpose()
    }
}

/// Archive-side record driver: walk segments up to the game sub-file and
/// iterate its slots. The flat-file counterpart is
/// [`FlatFile::into_records`](crate::flat::FlatFile::into_records); both end
/// in the same [`RecordStream`].
pub fn game_records<R: Read + Seek>(reader: R) -> Result<RecordStream> {
    let mut walker = SegmentWalker::open(reader)?;
    while let Some(segment) = walker.next_segment()? {
        if segment.role == SegmentRole::GameFile {
            return Ok(RecordStream::new(segment.into_bytes()));
        }
    }
    Err(io::Error::new(io::ErrorKind::NotFound, "archive has no game sub-file").into())
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
