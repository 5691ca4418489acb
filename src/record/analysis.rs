//! Engine analysis sub-structures nested inside move and cube records.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::CodecError;

use super::{read_f32_array, read_i32_array, read_i8_array};

/// Number of candidate plies an analysis block holds.
pub const CANDIDATES: usize = 32;
/// Equity vector width: win/gammon/backgammon terms for both sides plus
/// the cubeless total.
pub const EQUITY_TERMS: usize = 7;

/// Per-candidate evaluation depth marker (4 bytes on disk).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalLevel {
    pub level: i16,
    pub is_double: bool,
}

impl EvalLevel {
    fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let level = reader.read_i16::<LittleEndian>()?;
        let is_double = reader.read_u8()? != 0;
        let _reserved = reader.read_u8()?;
        Ok(Self { level, is_double })
    }
}

/// Checker-play analysis block nested inside a move record: the analysed
/// position plus up to [`CANDIDATES`] evaluated plies.
#[derive(Debug, Clone)]
pub struct BestMoveAnalysis {
    pub position: [i8; 26],
    pub dice: [i8; 2],
    pub level: i32,
    pub score: [i32; 2],
    pub cube_value: i32,
    pub cube_owner: i32,
    pub crawford: i32,
    pub jacoby: i32,
    pub move_count: i32,
    /// Board snapshot after each candidate ply.
    pub positions_played: [[i8; 26]; CANDIDATES],
    /// From/to point pairs, 8 signed bytes per candidate.
    pub candidate_moves: [[i8; 8]; CANDIDATES],
    pub eval_levels: [EvalLevel; CANDIDATES],
    pub equities: [[f32; EQUITY_TERMS]; CANDIDATES],
}

impl BestMoveAnalysis {
    pub const SIZE: usize = 2184;

    /// Fails closed: fewer than [`Self::SIZE`] bytes is a
    /// [`CodecError::TruncatedRecord`], never a partial decode.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < Self::SIZE {
            return Err(CodecError::TruncatedRecord {
                needed: Self::SIZE,
                available: buf.len(),
            });
        }
        Self::read(&mut io::Cursor::new(&buf[..Self::SIZE])).map_err(CodecError::Io)
    }

    fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let position = read_i8_array(&mut reader)?;
        let dice = read_i8_array(&mut reader)?;
        let level = reader.read_i32::<LittleEndian>()?;
        let score = read_i32_array(&mut reader)?;
        let cube_value = reader.read_i32::<LittleEndian>()?;
        let cube_owner = reader.read_i32::<LittleEndian>()?;
        let crawford = reader.read_i32::<LittleEndian>()?;
        let jacoby = reader.read_i32::<LittleEndian>()?;
        let move_count = reader.read_i32::<LittleEndian>()?;

        let mut positions_played = [[0i8; 26]; CANDIDATES];
        for snapshot in positions_played.iter_mut() {
            *snapshot = read_i8_array(&mut reader)?;
        }
        let mut candidate_moves = [[0i8; 8]; CANDIDATES];
        for ply in candidate_moves.iter_mut() {
            *ply = read_i8_array(&mut reader)?;
        }
        let mut eval_levels = [EvalLevel::default(); CANDIDATES];
        for lvl in eval_levels.iter_mut() {
            *lvl = EvalLevel::read(&mut reader)?;
        }
        let mut equities = [[0f32; EQUITY_TERMS]; CANDIDATES];
        for eq in equities.iter_mut() {
            *eq = read_f32_array(&mut reader)?;
        }
        let mut reserved = [0u8; 12];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            position,
            dice,
            level,
            score,
            cube_value,
            cube_owner,
            crawford,
            jacoby,
            move_count,
            positions_played,
            candidate_moves,
            eval_levels,
            equities,
        })
    }
}

/// Double/take analysis block nested inside a cube record.
#[derive(Debug, Clone)]
pub struct DoubleAnalysis {
    pub position: [i8; 26],
    pub level: i32,
    pub score: [i32; 2],
    pub cube_value: i32,
    pub cube_owner: i32,
    pub jacoby: i32,
    pub crawford: i32,
    pub flag_double: i32,
    pub beaver: i32,
    pub equities_no_double: [f32; EQUITY_TERMS],
    pub equities_double: [f32; EQUITY_TERMS],
    pub eq_no_double: f32,
    pub eq_double: f32,
    pub eq_drop: f32,
}

impl DoubleAnalysis {
    pub const SIZE: usize = 132;

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < Self::SIZE {
            return Err(CodecError::TruncatedRecord {
                needed: Self::SIZE,
                available: buf.len(),
            });
        }
        Self::read(&mut io::Cursor::new(&buf[..Self::SIZE])).map_err(CodecError::Io)
    }

    fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let position = read_i8_array(&mut reader)?;
        let level = reader.read_i32::<LittleEndian>()?;
        let score = read_i32_array(&mut reader)?;
        let cube_value = reader.read_i32::<LittleEndian>()?;
        let cube_owner = reader.read_i32::<LittleEndian>()?;
        let jacoby = reader.read_i32::<LittleEndian>()?;
        let crawford = reader.read_i32::<LittleEndian>()?;
        let flag_double = reader.read_i32::<LittleEndian>()?;
        let beaver = reader.read_i32::<LittleEndian>()?;
        let equities_no_double = read_f32_array(&mut reader)?;
        let equities_double = read_f32_array(&mut reader)?;
        let eq_no_double = reader.read_f32::<LittleEndian>()?;
        let eq_double = reader.read_f32::<LittleEndian>()?;
        let eq_drop = reader.read_f32::<LittleEndian>()?;
        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;

        Ok(Self {
            position,
            level,
            score,
            cube_value,
            cube_owner,
            jacoby,
            crawford,
            flag_double,
            beaver,
            equities_no_double,
            equities_double,
            eq_no_double,
            eq_double,
            eq_drop,
        })
    }
}
