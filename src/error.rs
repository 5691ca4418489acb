use std::io;
use thiserror::Error;

/// Structural violations in the fixed preamble or a named sub-file.
///
/// These abort the unit being decoded (the whole file, or one segment) and
/// always carry the expected and observed values.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("header too small: need {expected} bytes, have {actual}")]
    TooSmall { expected: usize, actual: usize },
    #[error("invalid magic number: expected {expected:#010x}, found {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },
    #[error("header size field: expected {expected}, found {actual}")]
    InvalidHeaderSize { expected: u32, actual: u32 },
    #[error("game file marker missing at segment offset {offset}")]
    InvalidGameFile { offset: u64 },
}

/// CRC32 disagreements between stored and computed checksums.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("archive checksum mismatch: trailer has {expected:#010x}, computed {actual:#010x}")]
    ArchiveCrcMismatch { expected: u32, actual: u32 },
    #[error("checksum mismatch in '{name}': index has {expected:#010x}, computed {actual:#010x}")]
    FileCrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },
}

/// Decompression and record-slot failures.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("zlib decompression failed: {reason}")]
    DecompressionFailed { reason: String },
    #[error("record truncated: need {needed} bytes, {available} remain")]
    TruncatedRecord { needed: usize, available: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Umbrella error for every decode operation in this crate.
#[derive(Error, Debug)]
pub enum XgError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, XgError>;
