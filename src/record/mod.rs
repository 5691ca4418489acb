//! Game-event record codec.
//!
//! The game sub-file is a run of fixed 2560-byte slots, one per match
//! event. Byte 8 of a slot is the discriminant; bytes 0..8 carry the
//! writing tool's in-memory bookkeeping and are ignored. Shorter variants
//! leave the slot tail unused. All integers are little-endian; the error
//! metric fields decode as plain 8-byte doubles.
//!
//! Decoding a slot either yields a fully populated record or fails closed —
//! a nested analysis block with too few bytes left is a
//! [`CodecError::TruncatedRecord`], never a half-filled record. The
//! [`RecordStream`] driver downgrades such failures (and unrecognised
//! discriminants) to [`GameRecord::Unknown`] so one bad slot never aborts
//! its siblings.

pub mod analysis;

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::CodecError;

pub use analysis::{BestMoveAnalysis, DoubleAnalysis, EvalLevel};

/// Every record slot is exactly this many bytes on disk.
pub const SLOT_SIZE: usize = 2560;
/// Offset of the discriminant byte within a slot.
pub const KIND_OFFSET: usize = 8;

/// Slot discriminant values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    MatchHeader,
    GameHeader,
    Cube,
    Move,
    GameFooter,
    MatchFooter,
    Unknown(u8),
}

impl EntryKind {
    pub fn from_byte(value: u8) -> Self {
        match value {
            0 => EntryKind::MatchHeader,
            1 => EntryKind::GameHeader,
            2 => EntryKind::Cube,
            3 => EntryKind::Move,
            4 => EntryKind::GameFooter,
            5 => EntryKind::MatchFooter,
            other => EntryKind::Unknown(other),
        }
    }
}

/// Opens a match: both player names and the match length.
#[derive(Debug, Clone)]
pub struct MatchHeaderRecord {
    pub player1: String,
    pub player2: String,
    pub match_length: i32,
}

/// Opens one game within a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameHeaderRecord {
    pub score1: i32,
    pub score2: i32,
}

/// A doubling-cube decision with its engine analysis.
#[derive(Debug, Clone)]
pub struct CubeRecord {
    pub active_player: i32,
    pub double: i32,
    pub take: i32,
    pub beaver: i32,
    pub raccoon: i32,
    pub cube_value: i32,
    pub position: [i8; 26],
    pub analysis: DoubleAnalysis,
    pub err_cube: f64,
    /// ASCII dice digits as rolled, e.g. `"63"`.
    pub dice_rolled: String,
    pub err_take: f64,
    pub rollout_index: i32,
    pub computer_choice: i32,
    pub analyze_count: i32,
    pub err_beaver: f64,
    pub err_raccoon: f64,
    pub analyze_count_rollout: i32,
    pub valid: i32,
    pub tutor_cube: i32,
    pub tutor_take: i32,
    pub err_tutor_cube: f64,
    pub err_tutor_take: f64,
    pub flagged: bool,
    pub comment_id: i32,
}

/// A checker play with its engine analysis.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub position_start: [i8; 26],
    pub position_end: [i8; 26],
    pub active_player: i32,
    /// From/to steps, `-1` marks unused slots.
    pub moves: [i32; 8],
    pub dice: [i32; 2],
    pub cube_value: i32,
    pub err_move: f64,
    pub analysis: BestMoveAnalysis,
    pub played: bool,
    pub analyze_count: i32,
    pub analyze_level: i32,
    pub invalid: i32,
    pub rollout_index: i32,
    pub computer_choice: i32,
    pub initial_equity: f64,
    pub tutor_move: i32,
    pub err_tutor_move: f64,
    pub flagged: bool,
    pub comment_id: i32,
}

/// Closes one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFooterRecord {
    pub score1: i32,
    pub score2: i32,
    pub winner: i32,
}

/// Closes the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchFooterRecord {
    pub score1: i32,
    pub score2: i32,
    pub winner: i32,
}

/// Forward-compatibility fallback: the raw slot as a hex dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRecord {
    pub entry_type: u8,
    pub payload_hex: String,
}

/// One decoded match event.
#[derive(Debug, Clone)]
pub enum GameRecord {
    MatchHeader(MatchHeaderRecord),
    GameHeader(GameHeaderRecord),
    Cube(CubeRecord),
    Move(MoveRecord),
    GameFooter(GameFooterRecord),
    MatchFooter(MatchFooterRecord),
    Unknown(UnknownRecord),
}

impl GameRecord {
    /// Decode one slot, dispatching on the discriminant byte.
    pub fn decode(slot: &[u8]) -> Result<Self, CodecError> {
        if slot.len() < SLOT_SIZE {
            return Err(CodecError::TruncatedRecord {
                needed: SLOT_SIZE,
                available: slot.len(),
            });
        }
        Ok(match EntryKind::from_byte(slot[KIND_OFFSET]) {
            EntryKind::MatchHeader => GameRecord::MatchHeader(decode_match_header(slot)?),
            EntryKind::GameHeader => GameRecord::GameHeader(decode_game_header(slot)?),
            EntryKind::Cube => GameRecord::Cube(decode_cube(slot)?),
            EntryKind::Move => GameRecord::Move(decode_move(slot)?),
            EntryKind::GameFooter => GameRecord::GameFooter(decode_game_footer(slot)?),
            EntryKind::MatchFooter => GameRecord::MatchFooter(decode_match_footer(slot)?),
            EntryKind::Unknown(_) => GameRecord::Unknown(unknown_fallback(slot)),
        })
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            GameRecord::MatchHeader(_) => EntryKind::MatchHeader,
            GameRecord::GameHeader(_) => EntryKind::GameHeader,
            GameRecord::Cube(_) => EntryKind::Cube,
            GameRecord::Move(_) => EntryKind::Move,
            GameRecord::GameFooter(_) => EntryKind::GameFooter,
            GameRecord::MatchFooter(_) => EntryKind::MatchFooter,
            GameRecord::Unknown(u) => EntryKind::Unknown(u.entry_type),
        }
    }
}

fn unknown_fallback(slot: &[u8]) -> UnknownRecord {
    UnknownRecord {
        entry_type: slot[KIND_OFFSET],
        payload_hex: hex::encode(&slot[..SLOT_SIZE]),
    }
}

fn decode_match_header(slot: &[u8]) -> Result<MatchHeaderRecord, CodecError> {
    let player1 = pascal_field(&slot[9..50]);
    let player2 = pascal_field(&slot[50..91]);
    let mut cur = Cursor::new(slot);
    cur.set_position(91);
    let match_length = cur.read_i32::<LittleEndian>()?;
    Ok(MatchHeaderRecord {
        player1,
        player2,
        match_length,
    })
}

fn decode_game_header(slot: &[u8]) -> Result<GameHeaderRecord, CodecError> {
    let mut cur = Cursor::new(slot);
    cur.set_position(9);
    Ok(GameHeaderRecord {
        score1: cur.read_i32::<LittleEndian>()?,
        score2: cur.read_i32::<LittleEndian>()?,
    })
}

fn decode_cube(slot: &[u8]) -> Result<CubeRecord, CodecError> {
    let mut cur = Cursor::new(slot);
    cur.set_position(9);
    let active_player = cur.read_i32::<LittleEndian>()?;
    let double = cur.read_i32::<LittleEndian>()?;
    let take = cur.read_i32::<LittleEndian>()?;
    let beaver = cur.read_i32::<LittleEndian>()?;
    let raccoon = cur.read_i32::<LittleEndian>()?;
    let cube_value = cur.read_i32::<LittleEndian>()?;
    let position = read_i8_array(&mut cur)?;

    let analysis = DoubleAnalysis::decode(&slot[59..])?;
    cur.set_position(59 + DoubleAnalysis::SIZE as u64);

    let err_cube = cur.read_f64::<LittleEndian>()?;
    let mut dice = [0u8; 2];
    cur.read_exact(&mut dice)?;
    let dice_rolled = String::from_utf8_lossy(&dice).into_owned();
    let err_take = cur.read_f64::<LittleEndian>()?;
    let rollout_index = cur.read_i32::<LittleEndian>()?;
    let computer_choice = cur.read_i32::<LittleEndian>()?;
    let analyze_count = cur.read_i32::<LittleEndian>()?;
    let err_beaver = cur.read_f64::<LittleEndian>()?;
    let err_raccoon = cur.read_f64::<LittleEndian>()?;
    let analyze_count_rollout = cur.read_i32::<LittleEndian>()?;
    let valid = cur.read_i32::<LittleEndian>()?;
    let tutor_cube = cur.read_i32::<LittleEndian>()?;
    let tutor_take = cur.read_i32::<LittleEndian>()?;
    let err_tutor_cube = cur.read_f64::<LittleEndian>()?;
    let err_tutor_take = cur.read_f64::<LittleEndian>()?;
    let flagged = cur.read_u8()? != 0;
    let comment_id = cur.read_i32::<LittleEndian>()?;

    Ok(CubeRecord {
        active_player,
        double,
        take,
        beaver,
        raccoon,
        cube_value,
        position,
        analysis,
        err_cube,
        dice_rolled,
        err_take,
        rollout_index,
        computer_choice,
        analyze_count,
        err_beaver,
        err_raccoon,
        analyze_count_rollout,
        valid,
        tutor_cube,
        tutor_take,
        err_tutor_cube,
        err_tutor_take,
        flagged,
        comment_id,
    })
}

fn decode_move(slot: &[u8]) -> Result<MoveRecord, CodecError> {
    let mut cur = Cursor::new(slot);
    cur.set_position(9);
    let position_start = read_i8_array(&mut cur)?;
    let position_end = read_i8_array(&mut cur)?;
    let active_player = cur.read_i32::<LittleEndian>()?;
    let moves = read_i32_array(&mut cur)?;
    let dice = read_i32_array(&mut cur)?;
    let cube_value = cur.read_i32::<LittleEndian>()?;
    let err_move = cur.read_f64::<LittleEndian>()?;

    let analysis = BestMoveAnalysis::decode(&slot[117..])?;
    cur.set_position(117 + BestMoveAnalysis::SIZE as u64);

    let played = cur.read_u8()? != 0;
    let analyze_count = cur.read_i32::<LittleEndian>()?;
    let analyze_level = cur.read_i32::<LittleEndian>()?;
    let invalid = cur.read_i32::<LittleEndian>()?;
    let rollout_index = cur.read_i32::<LittleEndian>()?;
    let computer_choice = cur.read_i32::<LittleEndian>()?;
    let initial_equity = cur.read_f64::<LittleEndian>()?;
    let tutor_move = cur.read_i32::<LittleEndian>()?;
    let err_tutor_move = cur.read_f64::<LittleEndian>()?;
    let flagged = cur.read_u8()? != 0;
    let comment_id = cur.read_i32::<LittleEndian>()?;

    Ok(MoveRecord {
        position_start,
        position_end,
        active_player,
        moves,
        dice,
        cube_value,
        err_move,
        analysis,
        played,
        analyze_count,
        analyze_level,
        invalid,
        rollout_index,
        computer_choice,
        initial_equity,
        tutor_move,
        err_tutor_move,
        flagged,
        comment_id,
    })
}

fn decode_game_footer(slot: &[u8]) -> Result<GameFooterRecord, CodecError> {
    let mut cur = Cursor::new(slot);
    cur.set_position(9);
    let score1 = cur.read_i32::<LittleEndian>()?;
    let score2 = cur.read_i32::<LittleEndian>()?;
    // One pad byte before the winner field; the match footer has none.
    cur.set_position(18);
    let winner = cur.read_i32::<LittleEndian>()?;
    Ok(GameFooterRecord {
        score1,
        score2,
        winner,
    })
}

fn decode_match_footer(slot: &[u8]) -> Result<MatchFooterRecord, CodecError> {
    let mut cur = Cursor::new(slot);
    cur.set_position(9);
    let score1 = cur.read_i32::<LittleEndian>()?;
    let score2 = cur.read_i32::<LittleEndian>()?;
    let winner = cur.read_i32::<LittleEndian>()?;
    Ok(MatchFooterRecord {
        score1,
        score2,
        winner,
    })
}

/// Length-prefixed name in a fixed-size field (here 41 bytes: one length
/// byte plus up to 40 characters).
fn pascal_field(field: &[u8]) -> String {
    let len = (field[0] as usize).min(field.len() - 1);
    String::from_utf8_lossy(&field[1..1 + len]).into_owned()
}

// ── wire helpers shared with the analysis sub-structures ────────────────────

pub(crate) fn read_i8_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[i8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf.map(|b| b as i8))
}

pub(crate) fn read_i32_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[i32; N]> {
    let mut out = [0i32; N];
    for v in out.iter_mut() {
        *v = reader.read_i32::<LittleEndian>()?;
    }
    Ok(out)
}

pub(crate) fn read_f32_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[f32; N]> {
    let mut out = [0f32; N];
    for v in out.iter_mut() {
        *v = reader.read_f32::<LittleEndian>()?;
    }
    Ok(out)
}

// ── slot stream ─────────────────────────────────────────────────────────────

/// Iterator over consecutive [`SLOT_SIZE`]-byte windows of a decompressed
/// payload. Slots that fail to decode surface as [`GameRecord::Unknown`]
/// rather than ending the stream; a trailing remainder shorter than one
/// slot is dropped as padding.
pub struct RecordStream {
    buf: Vec<u8>,
    pos: usize,
}

impl RecordStream {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of whole slots the payload holds.
    pub fn slot_count(&self) -> usize {
        self.buf.len() / SLOT_SIZE
    }
}

impl Iterator for RecordStream {
    type Item = GameRecord;

    fn next(&mut self) -> Option<GameRecord> {
        if self.pos + SLOT_SIZE > self.buf.len() {
            let leftover = self.buf.len() - self.pos;
            if leftover > 0 {
                log::debug!("dropping {leftover} trailing payload bytes");
                self.pos = self.buf.len();
            }
            return None;
        }
        let slot = &self.buf[self.pos..self.pos + SLOT_SIZE];
        self.pos += SLOT_SIZE;
        Some(match GameRecord::decode(slot) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("record slot failed to decode ({e}), keeping raw fallback");
                GameRecord::Unknown(unknown_fallback(slot))
            }
        })
    }
}
