//! Compound File Binary (OLE2) container handling.
//!
//! A compound file is a miniature FAT filesystem: a 512-byte header, a
//! FAT of 32-bit next-sector ids located through the DIFAT, a directory
//! of 128-byte entries chained through the FAT, and a MiniFAT allocating
//! 64-byte mini-sectors (inside a mini-stream owned by the root entry)
//! to streams smaller than 4096 bytes.
//!
//! Reference: [MS-CFB] — Compound File Binary File Format

pub mod reader;
pub mod writer;

/// Compound file signature, the first 8 bytes of every file.
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Header length; also the offset at which sector 0 begins.
pub const HEADER_LEN: usize = 512;

/// Length of one directory entry.
pub const DIR_ENTRY_LEN: usize = 128;

/// Mini-sector length (mini-sector shift is always 6).
pub const MINI_SECTOR_LEN: usize = 64;

/// Streams smaller than this live in the mini-stream.
pub const MINI_STREAM_CUTOFF: u64 = 4096;

/// Number of DIFAT entries stored inline in the header.
pub const HEADER_DIFAT_LEN: usize = 109;

// ── FAT sentinels ───────────────────────────────────────────────────────

/// Unallocated sector.
pub const FREESECT: u32 = 0xFFFF_FFFF;
/// Last sector of a chain.
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Sector holds FAT entries.
pub const FATSECT: u32 = 0xFFFF_FFFD;
/// Sector holds DIFAT entries.
pub const DIFSECT: u32 = 0xFFFF_FFFC;
/// Largest id naming a real sector; anything above is a sentinel.
pub const MAX_REGULAR_SECTOR: u32 = 0xFFFF_FFFA;

// ── Directory entry types ───────────────────────────────────────────────

pub const TYPE_STORAGE: u8 = 1;
pub const TYPE_STREAM: u8 = 2;
pub const TYPE_ROOT: u8 = 5;

/// "No sibling/child" marker in directory entry SID fields.
pub const NO_STREAM: u32 = 0xFFFF_FFFF;
