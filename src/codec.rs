//! Compression and checksum seams.
//!
//! The container and flat-stream decoders never call `flate2` directly;
//! they go through the [`Codec`] trait so the seek/CRC/slicing logic can be
//! unit-tested against any inflate implementation. [`ZlibCodec`] is the one
//! used in production.

use std::io::Read;

use crc32fast::Hasher;
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::CodecError;

/// Input chunk size for streaming inflate. Compressed bytes are pulled from
/// the source in chunks of this size, never all at once.
pub const INFLATE_CHUNK: usize = 32 * 1024;

/// CRC32 (IEEE) of a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub trait Codec {
    /// Inflate until exactly `expected` decompressed bytes have been
    /// produced, reading at most `input_len` compressed bytes from `input`
    /// in [`INFLATE_CHUNK`]-sized pieces. Input beyond the zlib stream is
    /// never requested, so bytes belonging to a following entry stay put.
    fn inflate_bounded(
        &self,
        input: &mut dyn Read,
        input_len: u64,
        expected: usize,
    ) -> Result<Vec<u8>, CodecError>;

    /// Inflate one whole zlib stream to its end marker.
    fn inflate_all(&self, input: &mut dyn Read) -> Result<Vec<u8>, CodecError>;
}

/// The production codec: zlib via `flate2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZlibCodec;

impl Codec for ZlibCodec {
    fn inflate_bounded(
        &self,
        input: &mut dyn Read,
        input_len: u64,
        expected: usize,
    ) -> Result<Vec<u8>, CodecError> {
        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(expected);
        let mut in_chunk = [0u8; INFLATE_CHUNK];
        let mut out_chunk = [0u8; INFLATE_CHUNK];
        let mut remaining = input_len;
        let mut buf_len = 0usize;
        let mut buf_pos = 0usize;

        while out.len() < expected {
            if buf_pos == buf_len {
                if remaining == 0 {
                    return Err(short_stream(expected, out.len()));
                }
                let want = (remaining.min(INFLATE_CHUNK as u64)) as usize;
                input.read_exact(&mut in_chunk[..want])?;
                remaining -= want as u64;
                buf_len = want;
                buf_pos = 0;
            }

            let space = (expected - out.len()).min(INFLATE_CHUNK);
            let before_in = inflater.total_in();
            let before_out = inflater.total_out();
            let status = inflater
                .decompress(
                    &in_chunk[buf_pos..buf_len],
                    &mut out_chunk[..space],
                    FlushDecompress::None,
                )
                .map_err(|e| CodecError::DecompressionFailed {
                    reason: e.to_string(),
                })?;

            buf_pos += (inflater.total_in() - before_in) as usize;
            let produced = (inflater.total_out() - before_out) as usize;
            out.extend_from_slice(&out_chunk[..produced]);

            match status {
                Status::StreamEnd => break,
                Status::Ok => {}
                Status::BufError => {
                    // No forward progress possible: input exhausted and the
                    // stream has not ended.
                    if produced == 0 && buf_pos == buf_len && remaining == 0 {
                        return Err(short_stream(expected, out.len()));
                    }
                }
            }
        }

        if out.len() < expected {
            return Err(short_stream(expected, out.len()));
        }
        Ok(out)
    }

    fn inflate_all(&self, input: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(input)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::DecompressionFailed {
                reason: e.to_string(),
            })?;
        Ok(out)
    }
}

fn short_stream(expected: usize, got: usize) -> CodecError {
    CodecError::DecompressionFailed {
        reason: format!("stream ended after {got} of {expected} bytes"),
    }
}
