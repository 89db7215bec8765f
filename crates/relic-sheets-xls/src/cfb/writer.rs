//! Minimal CFB container writing.
//!
//! Packs a single stream into a compliant compound file: header, payload
//! sectors, one directory sector, and an inline-DIFAT FAT. The payload is
//! padded to at least 4096 bytes so it always lives in the regular FAT
//! and no MiniFAT is emitted.

use crate::biff::parser::{put_u16, put_u32};
use crate::cfb::{
    DIR_ENTRY_LEN, ENDOFCHAIN, FATSECT, FREESECT, HEADER_DIFAT_LEN, HEADER_LEN,
    MINI_STREAM_CUTOFF, NO_STREAM, SIGNATURE, TYPE_ROOT, TYPE_STREAM,
};
use crate::error::{XlsError, XlsResult};

const SECTOR_LEN: usize = 512;
const FAT_ENTRIES_PER_SECTOR: usize = SECTOR_LEN / 4;

/// Build a compound file holding `payload` as a single stream named
/// `stream_name`.
///
/// Layout: payload sectors `0..P`, one directory sector `P`, then `F` FAT
/// sectors, with `F` minimal such that `P + 1 + F <= F * 128`. All FAT
/// sector ids fit the header's inline DIFAT.
pub fn build(stream_name: &str, payload: &[u8]) -> XlsResult<Vec<u8>> {
    let mut padded = payload.to_vec();
    if padded.len() < MINI_STREAM_CUTOFF as usize {
        padded.resize(MINI_STREAM_CUTOFF as usize, 0);
    }
    if padded.len() % SECTOR_LEN != 0 {
        let rounded = (padded.len() / SECTOR_LEN + 1) * SECTOR_LEN;
        padded.resize(rounded, 0);
    }
    let payload_sectors = padded.len() / SECTOR_LEN;

    // F = ceil((P + 1) / 127): each FAT sector describes 128 sectors but
    // must also describe itself.
    let fat_sectors =
        (payload_sectors + 1 + FAT_ENTRIES_PER_SECTOR - 2) / (FAT_ENTRIES_PER_SECTOR - 1);
    if fat_sectors > HEADER_DIFAT_LEN {
        return Err(XlsError::Parse(format!(
            "stream of {} bytes does not fit an inline DIFAT",
            payload.len()
        )));
    }

    let dir_sid = payload_sectors as u32;
    let total_sectors = payload_sectors + 1 + fat_sectors;

    let mut fat: Vec<u32> = vec![FREESECT; fat_sectors * FAT_ENTRIES_PER_SECTOR];
    for i in 0..payload_sectors {
        fat[i] = if i + 1 == payload_sectors {
            ENDOFCHAIN
        } else {
            (i + 1) as u32
        };
    }
    fat[payload_sectors] = ENDOFCHAIN; // single-sector directory chain
    for i in 0..fat_sectors {
        fat[payload_sectors + 1 + i] = FATSECT;
    }

    // Directory sector: root + the stream + two unallocated entries
    let mut dir = vec![0u8; SECTOR_LEN];
    write_dir_entry(
        &mut dir[..DIR_ENTRY_LEN],
        "Root Entry",
        TYPE_ROOT,
        1,
        ENDOFCHAIN,
        0,
    );
    write_dir_entry(
        &mut dir[DIR_ENTRY_LEN..2 * DIR_ENTRY_LEN],
        stream_name,
        TYPE_STREAM,
        NO_STREAM,
        0,
        padded.len() as u64,
    );

    let mut out = Vec::with_capacity(HEADER_LEN + total_sectors * SECTOR_LEN);
    out.extend_from_slice(&SIGNATURE);
    out.extend_from_slice(&[0u8; 16]); // CLSID
    put_u16(&mut out, 0x003E); // minor version
    put_u16(&mut out, 0x0003); // major version
    put_u16(&mut out, 0xFFFE); // byte order mark (little-endian)
    put_u16(&mut out, 0x0009); // sector shift: 512-byte sectors
    put_u16(&mut out, 0x0006); // mini-sector shift: 64-byte mini-sectors
    out.extend_from_slice(&[0u8; 6]); // reserved
    put_u32(&mut out, 0); // directory sector count (version 4 only)
    put_u32(&mut out, fat_sectors as u32);
    put_u32(&mut out, dir_sid);
    put_u32(&mut out, 0); // transaction signature
    put_u32(&mut out, MINI_STREAM_CUTOFF as u32);
    put_u32(&mut out, ENDOFCHAIN); // first MiniFAT sector: none
    put_u32(&mut out, 0); // MiniFAT sector count
    put_u32(&mut out, ENDOFCHAIN); // first DIFAT sector: all inline
    put_u32(&mut out, 0); // DIFAT sector count
    for i in 0..HEADER_DIFAT_LEN {
        if i < fat_sectors {
            put_u32(&mut out, (payload_sectors + 1 + i) as u32);
        } else {
            put_u32(&mut out, FREESECT);
        }
    }
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.extend_from_slice(&padded);
    out.extend_from_slice(&dir);
    for &entry in &fat {
        put_u32(&mut out, entry);
    }
    Ok(out)
}

fn write_dir_entry(
    buf: &mut [u8],
    name: &str,
    entry_type: u8,
    child: u32,
    start_sector: u32,
    size: u64,
) {
    let units: Vec<u16> = name.encode_utf16().take(31).collect();
    for (i, unit) in units.iter().enumerate() {
        buf[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    let name_len = ((units.len() + 1) * 2) as u16; // bytes, including the NUL
    buf[64..66].copy_from_slice(&name_len.to_le_bytes());
    buf[66] = entry_type;
    buf[67] = 1; // black node
    buf[68..72].copy_from_slice(&NO_STREAM.to_le_bytes()); // left sibling
    buf[72..76].copy_from_slice(&NO_STREAM.to_le_bytes()); // right sibling
    buf[76..80].copy_from_slice(&child.to_le_bytes());
    // CLSID, state bits and timestamps stay zero
    buf[116..120].copy_from_slice(&start_sector.to_le_bytes());
    buf[120..128].copy_from_slice(&size.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_shape() {
        let file = build("Book", b"hello").unwrap();

        assert_eq!(&file[..8], &SIGNATURE);
        assert_eq!(u16::from_le_bytes([file[26], file[27]]), 3); // major version
        assert_eq!(u16::from_le_bytes([file[30], file[31]]), 9); // sector shift
        assert_eq!(u16::from_le_bytes([file[32], file[33]]), 6); // mini shift
        assert_eq!(u32::from_le_bytes(file[56..60].try_into().unwrap()), 4096);
        // No MiniFAT
        assert_eq!(
            u32::from_le_bytes(file[60..64].try_into().unwrap()),
            ENDOFCHAIN
        );
        assert_eq!(u32::from_le_bytes(file[64..68].try_into().unwrap()), 0);
        // No DIFAT extension
        assert_eq!(
            u32::from_le_bytes(file[68..72].try_into().unwrap()),
            ENDOFCHAIN
        );
        assert_eq!(u32::from_le_bytes(file[72..76].try_into().unwrap()), 0);
    }

    #[test]
    fn test_small_payload_layout() {
        // A 5-byte payload pads to 4096 = 8 sectors; one directory sector
        // and one FAT sector follow.
        let file = build("Book", b"hello").unwrap();
        assert_eq!(file.len(), HEADER_LEN + 10 * SECTOR_LEN);

        // First directory sector id
        assert_eq!(u32::from_le_bytes(file[48..52].try_into().unwrap()), 8);
        // One FAT sector, listed first in the inline DIFAT
        assert_eq!(u32::from_le_bytes(file[44..48].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(file[76..80].try_into().unwrap()), 9);
        assert_eq!(
            u32::from_le_bytes(file[80..84].try_into().unwrap()),
            FREESECT
        );
    }

    #[test]
    fn test_fat_chains_terminate() {
        let payload = vec![0x5Au8; 5000];
        let file = build("Book", &payload).unwrap();

        let fat_sid = u32::from_le_bytes(file[76..80].try_into().unwrap()) as usize;
        let fat_at = HEADER_LEN + fat_sid * SECTOR_LEN;
        let fat: Vec<u32> = file[fat_at..fat_at + SECTOR_LEN]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();

        // Walk the payload chain from sector 0
        let mut sid = 0u32;
        let mut hops = 0;
        while sid != ENDOFCHAIN {
            sid = fat[sid as usize];
            hops += 1;
            assert!(hops <= fat.len(), "payload chain does not terminate");
        }
        // 5000 bytes round up to 10 sectors
        assert_eq!(hops, 10);

        // Directory chain is a single sector
        let dir_sid = u32::from_le_bytes(file[48..52].try_into().unwrap());
        assert_eq!(fat[dir_sid as usize], ENDOFCHAIN);
        // The FAT marks itself
        assert_eq!(fat[fat_sid], FATSECT);
    }

    #[test]
    fn test_directory_entries() {
        let file = build("Book", b"x").unwrap();
        let dir_at = HEADER_LEN + 8 * SECTOR_LEN;

        // Root entry: "Root Entry", type 5
        let root = &file[dir_at..dir_at + DIR_ENTRY_LEN];
        assert_eq!(u16::from_le_bytes([root[64], root[65]]), 22);
        assert_eq!(root[66], TYPE_ROOT);
        assert_eq!(u32::from_le_bytes(root[76..80].try_into().unwrap()), 1);

        // Stream entry: "Book", type 2, start sector 0, padded size
        let entry = &file[dir_at + DIR_ENTRY_LEN..dir_at + 2 * DIR_ENTRY_LEN];
        assert_eq!(&entry[..8], &[b'B', 0, b'o', 0, b'o', 0, b'k', 0]);
        assert_eq!(u16::from_le_bytes([entry[64], entry[65]]), 10);
        assert_eq!(entry[66], TYPE_STREAM);
        assert_eq!(u32::from_le_bytes(entry[116..120].try_into().unwrap()), 0);
        assert_eq!(
            u64::from_le_bytes(entry[120..128].try_into().unwrap()),
            4096
        );
    }
}
