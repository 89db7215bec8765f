//! BIFF string decoding.
//!
//! BIFF8 Unicode strings:
//! - Header: char_count + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed (1 byte per UTF-16 code
//!   unit, high byte zero), 1 = uncompressed UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended string data follows (Asian phonetic)
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended data size follows
//! - Then the character data, then the runs, then the extended data
//!
//! BIFF5 strings are plain byte strings in the workbook codepage with a
//! 1-byte length prefix.
//!
//! In the SST, strings can span CONTINUE records. A split inside the
//! character data restates the flags byte at the start of the
//! continuation, and the compression bit may flip there: the remaining
//! code units decode with the new width.

use crate::biff::parser::{read_u16, read_u32, read_u8};
use crate::codepage;
use crate::error::{XlsError, XlsResult};

/// Read a BIFF5 byte string (1-byte length prefix, codepage-encoded).
///
/// Used for BIFF5 BOUNDSHEET names and LABEL bodies.
pub fn read_byte_string(data: &[u8], offset: &mut usize, codepage: u16) -> XlsResult<String> {
    let len = read_u8(data, offset)? as usize;
    if *offset + len > data.len() {
        return Err(XlsError::Parse(format!(
            "byte string data too short: need {} bytes at offset {}, have {}",
            len,
            *offset,
            data.len() - *offset
        )));
    }
    let text = codepage::decode_bytes(&data[*offset..*offset + len], codepage);
    *offset += len;
    Ok(text)
}

/// Read a BIFF8 Unicode string with a 2-byte length prefix.
///
/// Used for LABEL bodies and BOUNDSHEET names in BIFF8 substreams. This
/// does NOT handle CONTINUE boundaries — use [`parse_sst`] for the shared
/// string table.
pub fn read_unicode_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let char_count = read_u16(data, offset)?;
    let flags = read_u8(data, offset)?;

    let is_rich = (flags & 0x08) != 0;
    let has_ext = (flags & 0x04) != 0;

    let run_count = if is_rich { read_u16(data, offset)? } else { 0 };
    let ext_size = if has_ext { read_u32(data, offset)? } else { 0 };

    let text = read_character_data(data, offset, char_count, flags)?;

    // Skip rich text runs (4 bytes each: char_pos u16 + font_idx u16)
    if is_rich {
        *offset += run_count as usize * 4;
    }
    // Skip extended string data
    if has_ext {
        *offset += ext_size as usize;
    }

    Ok(text)
}

/// Read character data (no header) given char_count and the flags byte.
fn read_character_data(
    data: &[u8],
    offset: &mut usize,
    char_count: u16,
    flags: u8,
) -> XlsResult<String> {
    let is_wide = (flags & 0x01) != 0;
    let count = char_count as usize;
    let byte_len = if is_wide { count * 2 } else { count };

    if *offset + byte_len > data.len() {
        return Err(XlsError::Parse(format!(
            "string data too short: need {} bytes at offset {}, have {}",
            byte_len,
            *offset,
            data.len() - *offset
        )));
    }

    let mut units = Vec::with_capacity(count);
    if is_wide {
        for i in 0..count {
            let lo = data[*offset + i * 2];
            let hi = data[*offset + i * 2 + 1];
            units.push(u16::from_le_bytes([lo, hi]));
        }
    } else {
        // Compressed: each byte is the low byte of a UTF-16 code unit
        units.extend(data[*offset..*offset + count].iter().map(|&b| b as u16));
    }
    *offset += byte_len;

    String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))
}

/// Parse the SST (Shared String Table) from its record fragments: the SST
/// body followed by the bodies of its CONTINUE records, in stream order.
///
/// The SST body starts with:
/// - `total_refs` (u32) — total string refs in the workbook
/// - `unique_count` (u32) — number of unique strings in this table
/// - Then `unique_count` Unicode string entries
///
/// A damaged table yields the strings decoded so far rather than failing
/// the whole read.
pub fn parse_sst(fragments: &[&[u8]]) -> XlsResult<Vec<String>> {
    let mut cur = FragmentCursor::new(fragments);

    let _total_refs = cur.read_u32()?;
    let unique_count = cur.read_u32()? as usize;

    let mut strings = Vec::with_capacity(unique_count.min(4096));
    for i in 0..unique_count {
        match read_sst_string(&mut cur) {
            Ok(s) => strings.push(s),
            Err(e) => {
                log::warn!("SST ends early at string {i}/{unique_count}: {e}");
                break;
            }
        }
    }

    Ok(strings)
}

fn read_sst_string(cur: &mut FragmentCursor) -> XlsResult<String> {
    let cch = cur.read_u16()? as usize;
    let flags = cur.read_u8()?;

    let is_rich = (flags & 0x08) != 0;
    let has_ext = (flags & 0x04) != 0;
    let run_count = if is_rich { cur.read_u16()? } else { 0 };
    let ext_size = if has_ext { cur.read_u32()? } else { 0 };

    let mut units = Vec::with_capacity(cch.min(crate::biff::records::MAX_RECORD_BODY));
    read_units(cur, cch, (flags & 0x01) != 0, &mut units)?;

    // Rich runs and extended data trail the characters; both are skipped
    cur.skip(run_count as usize * 4)?;
    cur.skip(ext_size as usize)?;

    String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 in SST: {e}")))
}

/// Read `count` UTF-16 code units, honoring flag restatement at each
/// CONTINUE boundary crossed inside the character data.
fn read_units(
    cur: &mut FragmentCursor,
    count: usize,
    mut wide: bool,
    units: &mut Vec<u16>,
) -> XlsResult<()> {
    let mut remaining = count;
    while remaining > 0 {
        let avail = cur.fragment_remaining();
        if avail == 0 {
            // Split mid-string: the continuation restates the flags byte
            // and the compression bit may flip.
            let flags = cur.read_u8()?;
            wide = (flags & 0x01) != 0;
            continue;
        }
        if wide {
            if avail < 2 {
                return Err(XlsError::Parse(
                    "UTF-16 code unit split across CONTINUE boundary".into(),
                ));
            }
            let n = remaining.min(avail / 2);
            for _ in 0..n {
                let lo = cur.read_u8()?;
                let hi = cur.read_u8()?;
                units.push(u16::from_le_bytes([lo, hi]));
            }
            remaining -= n;
        } else {
            let n = remaining.min(avail);
            for _ in 0..n {
                units.push(cur.read_u8()? as u16);
            }
            remaining -= n;
        }
    }
    Ok(())
}

/// Cursor over the SST body and its CONTINUE fragments.
struct FragmentCursor<'a> {
    fragments: &'a [&'a [u8]],
    frag: usize,
    pos: usize,
}

impl<'a> FragmentCursor<'a> {
    fn new(fragments: &'a [&'a [u8]]) -> Self {
        Self {
            fragments,
            frag: 0,
            pos: 0,
        }
    }

    /// Advance past exhausted fragments; false when all data is consumed.
    fn normalize(&mut self) -> bool {
        while self.frag < self.fragments.len() && self.pos >= self.fragments[self.frag].len() {
            self.frag += 1;
            self.pos = 0;
        }
        self.frag < self.fragments.len()
    }

    /// Bytes left in the current fragment; 0 only when fully consumed.
    fn fragment_remaining(&mut self) -> usize {
        if self.normalize() {
            self.fragments[self.frag].len() - self.pos
        } else {
            0
        }
    }

    fn read_u8(&mut self) -> XlsResult<u8> {
        if !self.normalize() {
            return Err(XlsError::Parse("SST record data exhausted".into()));
        }
        let b = self.fragments[self.frag][self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> XlsResult<u16> {
        let lo = self.read_u8()?;
        let hi = self.read_u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_u32(&mut self) -> XlsResult<u32> {
        let lo = u32::from(self.read_u16()?);
        let hi = u32::from(self.read_u16()?);
        Ok(hi << 16 | lo)
    }

    fn skip(&mut self, mut n: usize) -> XlsResult<()> {
        while n > 0 {
            if !self.normalize() {
                return Err(XlsError::Parse("SST record data exhausted in skip".into()));
            }
            let step = (self.fragments[self.frag].len() - self.pos).min(n);
            self.pos += step;
            n -= step;
        }
        Ok(())
    }
}
