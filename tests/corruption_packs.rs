//! Corruption tests: damaged or hostile pack bytes
//!
//! Every case must fail with a typed error and leave the context usable.

use lotoo::header::{CENTRAL_ENTRY_SIZE, EOCD_SIZE, LOCAL_HEADER_SIZE};
use lotoo::{ByteSource, Context, ContextConfig, LotooError, MemorySource, PackWriter, Result};

fn valid_pack(count: usize) -> Vec<u8> {
    let mut writer = PackWriter::new();
    for i in 0..count {
        writer
            .add_quiz(&format!("answer{:03}.txt", i), format!("question{:03}", i))
            .unwrap();
    }
    writer.finish().unwrap()
}

fn load(bytes: Vec<u8>) -> Result<u32> {
    let mut ctx = Context::new();
    let handle = ctx.load_pack(MemorySource::new(bytes))?;
    let count = ctx.pack(handle)?.quiz_count();
    Ok(count)
}

fn directory_offset(bytes: &[u8]) -> usize {
    let eocd = &bytes[bytes.len() - EOCD_SIZE..];
    u32::from_le_bytes(eocd[16..20].try_into().unwrap()) as usize
}

#[test]
fn test_empty_source() {
    assert!(matches!(load(Vec::new()), Err(LotooError::InvalidMagic)));
}

#[test]
fn test_random_bytes() {
    let bytes: Vec<u8> = (0..10_000u32).map(|i| (i * 7 + 3) as u8).collect();
    assert!(matches!(load(bytes), Err(LotooError::InvalidMagic)));
}

#[test]
fn test_missing_end_record() {
    let mut bytes = valid_pack(10);
    bytes.truncate(bytes.len() - EOCD_SIZE);
    assert!(matches!(load(bytes), Err(LotooError::InvalidMagic)));
}

#[test]
fn test_directory_past_end() {
    let mut bytes = valid_pack(10);
    let len = bytes.len();
    // Declare a directory far bigger than the file
    bytes[len - EOCD_SIZE + 12..len - EOCD_SIZE + 16].copy_from_slice(&1_000_000u32.to_le_bytes());
    assert!(matches!(load(bytes), Err(LotooError::Truncated { .. })));
}

#[test]
fn test_truncated_tail_is_not_a_pack() {
    let bytes = valid_pack(10);
    // Cut through the central directory; the end record goes with it
    let cut = directory_offset(&bytes) + 10;
    assert!(matches!(
        load(bytes[..cut].to_vec()),
        Err(LotooError::InvalidMagic)
    ));
}

#[test]
fn test_entry_count_overruns_directory() {
    let mut bytes = valid_pack(3);
    let len = bytes.len();
    bytes[len - EOCD_SIZE + 8..len - EOCD_SIZE + 10].copy_from_slice(&9u16.to_le_bytes());
    bytes[len - EOCD_SIZE + 10..len - EOCD_SIZE + 12].copy_from_slice(&9u16.to_le_bytes());
    assert!(load(bytes).is_err());
}

#[test]
fn test_deflated_entry_rejected() {
    let mut bytes = valid_pack(3);
    let dir = directory_offset(&bytes);
    // Compression method of the first central entry
    bytes[dir + 10..dir + 12].copy_from_slice(&8u16.to_le_bytes());
    assert!(matches!(
        load(bytes),
        Err(LotooError::UnsupportedCompression { method: 8, .. })
    ));
}

#[test]
fn test_corrupt_central_signature() {
    let mut bytes = valid_pack(3);
    let dir = directory_offset(&bytes);
    bytes[dir] = b'X';
    assert!(load(bytes).is_err());
}

#[test]
fn test_flipped_payload_byte() {
    let mut bytes = valid_pack(3);
    // Payload of the first member follows its 30-byte header and name
    let payload = LOCAL_HEADER_SIZE + "answer000.txt".len();
    bytes[payload] ^= 0xFF;

    let mut ctx = Context::new();
    let handle = ctx.load_pack(MemorySource::new(bytes.clone())).unwrap();
    let pack = ctx.pack(handle).unwrap();
    assert!(matches!(pack.quiz(0), Err(LotooError::ChecksumMismatch { .. })));
    assert!(pack.quiz(1).is_ok());

    // Checksums can be switched off
    let config = ContextConfig {
        verify_checksums: false,
        ..ContextConfig::default()
    };
    let mut ctx = Context::with_config(config, None).unwrap();
    let handle = ctx.load_pack(MemorySource::new(bytes)).unwrap();
    assert!(ctx.pack(handle).unwrap().quiz(0).is_ok());
}

#[test]
fn test_broken_local_header() {
    let mut bytes = valid_pack(3);
    bytes[0] = b'Z';

    let mut ctx = Context::new();
    let handle = ctx.load_pack(MemorySource::new(bytes)).unwrap();
    let pack = ctx.pack(handle).unwrap();
    assert!(pack.quiz(0).is_err());
    assert!(pack.quiz(2).is_ok());
}

#[test]
fn test_flagged_name_with_invalid_utf8() {
    let mut bytes = valid_pack(3);
    let dir = directory_offset(&bytes);
    // Second byte of the first entry's name; its UTF-8 flag stays set
    bytes[dir + CENTRAL_ENTRY_SIZE + 1] = 0xFF;
    assert!(matches!(load(bytes), Err(LotooError::InvalidEntry(_))));
}

#[test]
fn test_legacy_name_bounds_use_stored_length() {
    let mut bytes = valid_pack(3);
    // The last member's data ends right where the directory starts
    let last = directory_offset(&bytes) + 2 * (CENTRAL_ENTRY_SIZE + "answer002.txt".len());
    bytes[last + 8..last + 10].copy_from_slice(&0u16.to_le_bytes());
    bytes[last + CENTRAL_ENTRY_SIZE + 3] = 0xFF;

    let mut ctx = Context::new();
    let handle = ctx.load_pack(MemorySource::new(bytes)).unwrap();
    let pack = ctx.pack(handle).unwrap();
    assert_eq!(pack.quiz_count(), 3);

    let quiz = pack.quiz(2).unwrap();
    assert_eq!(quiz.name.as_ref(), "ans\u{FFFD}er002");
    assert_eq!(quiz.data, b"question002".to_vec());
}

#[test]
fn test_title_containing_end_signature() {
    // A well-formed but empty end record hidden in the title
    let title = format!("Quiz night PK\u{5}\u{6}{} and more", "\0".repeat(18));
    let mut writer = PackWriter::new().with_title(title.clone());
    for i in 0..3 {
        writer
            .add_quiz(&format!("answer{:03}.txt", i), format!("question{:03}", i))
            .unwrap();
    }
    let bytes = writer.finish().unwrap();

    let mut ctx = Context::new();
    let handle = ctx.load_pack(MemorySource::new(bytes)).unwrap();
    let pack = ctx.pack(handle).unwrap();
    assert_eq!(pack.quiz_count(), 3);
    assert_eq!(pack.title(), title);
}

#[test]
fn test_trailing_bytes_after_end_record() {
    let mut bytes = {
        let mut writer = PackWriter::new().with_title("Capitals");
        writer.add_quiz("Paris.txt", "Capital of France?").unwrap();
        writer.finish().unwrap()
    };
    bytes.extend_from_slice(b"junk");
    assert_eq!(load(bytes).unwrap(), 1);
}

/// Source that claims more bytes than it can deliver
struct LyingSource {
    inner: MemorySource,
    claimed: u64,
}

impl ByteSource for LyingSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.inner.total_size() {
            return Ok(0);
        }
        self.inner.read_at(offset, buf)
    }

    fn total_size(&self) -> u64 {
        self.claimed
    }
}

#[test]
fn test_source_running_dry() {
    let bytes = valid_pack(3);
    let claimed = bytes.len() as u64 + 100_000;
    let source = LyingSource {
        inner: MemorySource::new(bytes),
        claimed,
    };

    let mut ctx = Context::new();
    let err = ctx.load_pack(source).unwrap_err();
    assert!(matches!(
        err,
        LotooError::SourceRead { .. } | LotooError::InvalidMagic
    ));
    assert!(!err.is_recoverable());

    // The context survives the failure
    assert!(ctx.load_pack(MemorySource::new(valid_pack(3))).is_ok());
}
