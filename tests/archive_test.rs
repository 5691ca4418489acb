use std::fs::File;
use std::io::{Cursor, Write as _};

use proptest::prelude::*;
use tempfile::NamedTempFile;

use xgfile::codec::crc32;
use xgfile::header::HEADER_SIZE;
use xgfile::record::SLOT_SIZE;
use xgfile::segment::{GAME_FILE_MARKER, GAME_FILE_MARKER_OFFSET};
use xgfile::{
    ArchiveContainer, FlatFile, FormatError, GameRecord, IntegrityError, RichGameHeader,
    SegmentRole, SegmentWalker, XgError,
};

// ── fixture builders ─────────────────────────────────────────────────────────

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn base_header() -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(b"RGMH");
    buf[4..8].copy_from_slice(&1u32.to_le_bytes());
    buf[8..12].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
    buf
}

fn set_thumbnail(buf: &mut [u8], offset: u64, size: u32) {
    buf[12..20].copy_from_slice(&offset.to_le_bytes());
    buf[20..24].copy_from_slice(&size.to_le_bytes());
}

fn set_utf16(buf: &mut [u8], offset: usize, text: &str) {
    for (i, unit) in text.encode_utf16().enumerate() {
        buf[offset + 2 * i..offset + 2 * i + 2].copy_from_slice(&unit.to_le_bytes());
    }
}

/// Assemble a standalone archive: data section, registry, 36-byte trailer.
/// `files` is (name, contents, stored); stored entries are copied verbatim,
/// the rest are zlib-compressed.
fn build_archive(files: &[(&str, &[u8], bool)], compressed_registry: bool) -> Vec<u8> {
    let mut data_section = Vec::new();
    let mut registry = Vec::new();

    for (name, contents, stored) in files {
        let start = data_section.len() as i32;
        let on_disk = if *stored {
            contents.to_vec()
        } else {
            deflate(contents)
        };
        data_section.extend_from_slice(&on_disk);

        let mut entry = [0u8; 532];
        entry[0] = name.len() as u8;
        entry[1..1 + name.len()].copy_from_slice(name.as_bytes());
        entry[512..516].copy_from_slice(&(contents.len() as i32).to_le_bytes());
        entry[516..520].copy_from_slice(&(on_disk.len() as i32).to_le_bytes());
        entry[520..524].copy_from_slice(&start.to_le_bytes());
        entry[524..528].copy_from_slice(&crc32(contents).to_le_bytes());
        entry[528] = u8::from(*stored);
        entry[531] = if *stored { 0 } else { 6 };
        registry.extend_from_slice(&entry);
    }

    let registry_on_disk = if compressed_registry {
        deflate(&registry)
    } else {
        registry
    };

    let data_len = data_section.len();
    let mut archive = data_section;
    archive.extend_from_slice(&registry_on_disk);
    let crc = crc32(&archive);

    archive.extend_from_slice(&crc.to_le_bytes());
    archive.extend_from_slice(&(files.len() as i32).to_le_bytes());
    archive.extend_from_slice(&1i32.to_le_bytes());
    archive.extend_from_slice(&(registry_on_disk.len() as i32).to_le_bytes());
    archive.extend_from_slice(&(data_len as i32).to_le_bytes());
    archive.extend_from_slice(&i32::from(compressed_registry).to_le_bytes());
    archive.extend_from_slice(&[0u8; 12]);
    archive
}

/// Recompute and patch the trailer CRC after bytes inside the archive have
/// been edited, so only per-file verification can notice.
fn repair_trailer_crc(archive: &mut [u8]) {
    let body_end = archive.len() - 36;
    let crc = crc32(&archive[..body_end]);
    archive[body_end..body_end + 4].copy_from_slice(&crc.to_le_bytes());
}

/// Game sub-file content: record slots from offset 0, with the in-band
/// marker bytes inside the first slot's unused tail.
fn game_file_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 2 * SLOT_SIZE];
    bytes[8] = 0; // match header slot
    bytes[SLOT_SIZE + 8] = 5; // match footer slot
    bytes[GAME_FILE_MARKER_OFFSET..GAME_FILE_MARKER_OFFSET + 4].copy_from_slice(GAME_FILE_MARKER);
    bytes
}

// ── header ───────────────────────────────────────────────────────────────────

#[test]
fn header_decodes_guid_and_metadata() {
    let mut buf = base_header();
    buf[24..36].copy_from_slice(&[
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
    ]);
    set_utf16(&mut buf, 2084, "7 point match");
    set_utf16(&mut buf, 4132, "World class");

    let header = RichGameHeader::decode(&buf).unwrap();
    assert_eq!(header.version, 1);
    // Little-endian 4+2+2 components, then raw bytes.
    assert_eq!(header.guid.to_string(), "04030201-0605-0807-090a-0b0c00000000");
    assert_eq!(header.game_name, "");
    assert_eq!(header.save_name, "7 point match");
    assert_eq!(header.level_name, "World class");
    assert!(!header.has_thumbnail());
}

#[test]
fn header_one_byte_short_is_too_small() {
    let buf = base_header();
    let err = RichGameHeader::decode(&buf[..HEADER_SIZE - 1]).unwrap_err();
    assert!(matches!(err, FormatError::TooSmall { .. }));
}

#[test]
fn header_size_field_must_match() {
    let mut buf = base_header();
    buf[8..12].copy_from_slice(&8000u32.to_le_bytes());
    let err = RichGameHeader::decode(&buf).unwrap_err();
    match err {
        FormatError::InvalidHeaderSize { expected, actual } => {
            assert_eq!(expected, HEADER_SIZE as u32);
            assert_eq!(actual, 8000);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_utf16_metadata_degrades_to_hex() {
    let mut buf = base_header();
    // Unpaired surrogate: not valid UTF-16.
    buf[36..38].copy_from_slice(&0xD800u16.to_le_bytes());
    let header = RichGameHeader::decode(&buf).unwrap();
    assert_eq!(header.game_name.len(), 2 * 2048);
    assert!(header.game_name.starts_with("00d8"));
}

proptest! {
    #[test]
    fn any_wrong_magic_is_rejected(magic in any::<[u8; 4]>()) {
        prop_assume!(&magic != b"RGMH");
        let mut buf = base_header();
        buf[0..4].copy_from_slice(&magic);
        let err = RichGameHeader::decode(&buf).unwrap_err();
        prop_assert!(matches!(err, FormatError::InvalidMagic { .. }), "expected InvalidMagic error");
    }
}

// ── archive container ────────────────────────────────────────────────────────

#[test]
fn archive_roundtrip_mixed_entries() {
    let files: Vec<(&str, &[u8], bool)> = vec![
        ("temp.xgi", b"game header bytes, compressed", false),
        ("temp.xg", b"record payload that deflates fine", false),
        ("temp.xgc", b"stored comment text", true),
    ];
    let archive = build_archive(&files, false);

    let mut container = ArchiveContainer::open(Cursor::new(archive)).unwrap();
    assert_eq!(container.entries().len(), 3);
    assert!(container.entries()[0].is_compressed());
    assert!(!container.entries()[2].is_compressed());

    for (i, (name, contents, _)) in files.iter().enumerate() {
        assert_eq!(container.entries()[i].name, *name);
        let extracted = container.extract_at(i).unwrap();
        assert_eq!(extracted, *contents, "mismatch for {name}");
    }
}

#[test]
fn compressed_registry_is_inflated_before_parsing() {
    let files: Vec<(&str, &[u8], bool)> = vec![
        ("temp.xgi", b"alpha", false),
        ("temp.xgr", b"rollout data rollout data", false),
    ];
    let archive = build_archive(&files, true);

    let mut container = ArchiveContainer::open(Cursor::new(archive)).unwrap();
    assert!(container.trailer().compressed_registry);
    assert_eq!(container.entries().len(), 2);
    assert_eq!(container.extract_at(1).unwrap(), b"rollout data rollout data");
}

#[test]
fn flipped_payload_byte_fails_archive_crc() {
    let mut archive = build_archive(&[("temp.xgi", b"some data here", false)], false);
    archive[3] ^= 0x40; // inside the data section
    let err = match ArchiveContainer::open(Cursor::new(archive)) {
        Err(e) => e,
        Ok(_) => panic!("corrupted archive opened cleanly"),
    };
    assert!(matches!(
        err,
        XgError::Integrity(IntegrityError::ArchiveCrcMismatch { .. })
    ));
}

#[test]
fn flipped_registry_byte_fails_archive_crc() {
    let mut archive = build_archive(&[("temp.xgi", b"some data here", false)], false);
    let registry_byte = archive.len() - 36 - 100; // inside the 532-byte entry
    archive[registry_byte] ^= 0x01;
    let err = match ArchiveContainer::open(Cursor::new(archive)) {
        Err(e) => e,
        Ok(_) => panic!("corrupted archive opened cleanly"),
    };
    assert!(matches!(
        err,
        XgError::Integrity(IntegrityError::ArchiveCrcMismatch { .. })
    ));
}

#[test]
fn corrupted_file_bytes_fail_only_that_entry() {
    let files: Vec<(&str, &[u8], bool)> = vec![
        ("temp.xgi", b"first file, left intact", false),
        ("temp.xgc", b"stored text that gets corrupted", true),
    ];
    let mut archive = build_archive(&files, false);

    // Corrupt one byte inside the second (stored) entry's data, then fix
    // the trailer CRC so the archive-level check still passes.
    let second_start = deflate(files[0].1).len();
    archive[second_start + 4] ^= 0x20;
    repair_trailer_crc(&mut archive);

    let mut container = ArchiveContainer::open(Cursor::new(archive)).unwrap();
    assert_eq!(container.extract_at(0).unwrap(), files[0].1);

    let err = container.extract_at(1).unwrap_err();
    match err {
        XgError::Integrity(IntegrityError::FileCrcMismatch { name, expected, actual }) => {
            assert_eq!(name, "temp.xgc");
            assert_ne!(expected, actual);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── segment walker ───────────────────────────────────────────────────────────

#[test]
fn walker_yields_header_then_files_with_roles() {
    let game_file = game_file_bytes();
    let files: Vec<(&str, &[u8], bool)> = vec![
        ("temp.xgi", b"game header sub-file", false),
        ("temp.xg", &game_file, false),
        ("temp.xgr", b"rollouts", false),
        ("temp.xgc", b"comments", true),
        ("extra.bin", b"future sub-file", true),
    ];

    let mut xg = base_header();
    xg.extend_from_slice(&build_archive(&files, false));

    let tmp = NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), &xg).unwrap();

    let mut walker = SegmentWalker::open(File::open(tmp.path()).unwrap()).unwrap();
    let mut seen = Vec::new();
    while let Some(segment) = walker.next_segment().unwrap() {
        seen.push((segment.name.clone(), segment.role, segment.len()));
    }

    assert_eq!(seen.len(), 6);
    assert_eq!(seen[0], ("header".to_owned(), SegmentRole::Header, HEADER_SIZE));
    assert_eq!(seen[1].1, SegmentRole::GameHeader);
    assert_eq!(seen[2], ("temp.xg".to_owned(), SegmentRole::GameFile, 2 * SLOT_SIZE));
    assert_eq!(seen[3].1, SegmentRole::Rollouts);
    assert_eq!(seen[4].1, SegmentRole::Comments);
    assert_eq!(seen[5], ("extra.bin".to_owned(), SegmentRole::Unknown, 15));
}

#[test]
fn walker_emits_thumbnail_segment_when_present() {
    let mut thumb = vec![0u8; 64];
    thumb[0] = 0xFF;
    thumb[1] = 0xD8;

    let mut xg = base_header();
    set_thumbnail(&mut xg, HEADER_SIZE as u64, thumb.len() as u32);
    xg.extend_from_slice(&thumb);
    xg.extend_from_slice(&build_archive(&[("temp.xgc", b"notes", true)], false));

    let mut walker = SegmentWalker::open(Cursor::new(xg)).unwrap();
    let first = walker.next_segment().unwrap().unwrap();
    assert_eq!(first.role, SegmentRole::Header);
    let second = walker.next_segment().unwrap().unwrap();
    assert_eq!(second.role, SegmentRole::Thumbnail);
    assert_eq!(second.len(), 64);
    let third = walker.next_segment().unwrap().unwrap();
    assert_eq!(third.role, SegmentRole::Comments);
    assert!(walker.next_segment().unwrap().is_none());
}

#[test]
fn walker_rejects_game_file_without_marker() {
    let bad_game = vec![0u8; 2 * SLOT_SIZE]; // marker bytes left zeroed
    let mut xg = base_header();
    xg.extend_from_slice(&build_archive(&[("temp.xg", &bad_game, false)], false));

    let mut walker = SegmentWalker::open(Cursor::new(xg)).unwrap();
    walker.next_segment().unwrap(); // header
    let err = walker.next_segment().unwrap_err();
    assert!(matches!(
        err,
        XgError::Format(FormatError::InvalidGameFile { offset: 556 })
    ));
}

#[test]
fn game_records_driver_reaches_the_slots() {
    let game_file = game_file_bytes();
    let files: Vec<(&str, &[u8], bool)> = vec![
        ("temp.xgi", b"game header sub-file", false),
        ("temp.xg", &game_file, false),
    ];
    let mut xg = base_header();
    xg.extend_from_slice(&build_archive(&files, false));

    let records: Vec<GameRecord> = xgfile::game_records(Cursor::new(xg)).unwrap().collect();
    assert_eq!(records.len(), 2);
    assert!(matches!(records[0], GameRecord::MatchHeader(_)));
    assert!(matches!(records[1], GameRecord::MatchFooter(_)));
}

// ── flat stream ──────────────────────────────────────────────────────────────

#[test]
fn flat_file_decodes_thumbnail_and_records() {
    let mut slots = vec![0u8; 2 * SLOT_SIZE + 77]; // 77 bytes of tail padding
    slots[8] = 1; // game header slot
    slots[9..13].copy_from_slice(&2i32.to_le_bytes());
    slots[SLOT_SIZE + 8] = 4; // game footer slot
    slots[SLOT_SIZE + 18..SLOT_SIZE + 22].copy_from_slice(&1i32.to_le_bytes());

    let mut thumb = vec![0u8; 128];
    thumb[0] = 0xFF;
    thumb[1] = 0xD8;

    let mut xg = base_header();
    set_thumbnail(&mut xg, HEADER_SIZE as u64, thumb.len() as u32);
    xg.extend_from_slice(&thumb);
    xg.extend_from_slice(&deflate(&slots));

    let flat = FlatFile::read(Cursor::new(xg)).unwrap();
    assert_eq!(flat.thumbnail.as_ref().map(Vec::len), Some(128));

    let records: Vec<GameRecord> = flat.into_records().collect();
    assert_eq!(records.len(), 2);
    match &records[0] {
        GameRecord::GameHeader(r) => assert_eq!(r.score1, 2),
        other => panic!("wrong variant: {:?}", other.kind()),
    }
    match &records[1] {
        GameRecord::GameFooter(r) => assert_eq!(r.winner, 1),
        other => panic!("wrong variant: {:?}", other.kind()),
    }
}

#[test]
fn flat_file_without_soi_treats_thumbnail_as_absent() {
    let mut slots = vec![0u8; SLOT_SIZE];
    slots[8] = 1;

    let payload = deflate(&slots);
    let mut xg = base_header();
    // The header claims a thumbnail exactly where the zlib payload starts;
    // the payload does not begin with FF D8, so no thumbnail exists.
    set_thumbnail(&mut xg, HEADER_SIZE as u64, payload.len().min(64) as u32);
    xg.extend_from_slice(&payload);

    let flat = FlatFile::read(Cursor::new(xg)).unwrap();
    assert!(flat.thumbnail.is_none());
    assert_eq!(flat.into_records().count(), 1);
}

#[test]
fn flat_file_with_garbage_payload_is_decompression_failure() {
    let mut xg = base_header();
    xg.extend_from_slice(b"this is definitely not a zlib stream");

    let err = FlatFile::read(Cursor::new(xg)).unwrap_err();
    assert!(matches!(
        err,
        XgError::Codec(xgfile::CodecError::DecompressionFailed { .. })
    ));
}
