//! CFB container reading.
//!
//! Validates the header, materializes the FAT through the DIFAT, walks
//! the directory, and resolves named streams through the FAT or MiniFAT.
//! Every chain walk is capped at `file_size / sector_size + 1` hops so a
//! corrupt table cannot loop forever.

use encoding_rs::UTF_16LE;

use crate::biff::parser::{read_u16, read_u32, read_u64};
use crate::cfb::{
    DIR_ENTRY_LEN, HEADER_DIFAT_LEN, HEADER_LEN, MAX_REGULAR_SECTOR, MINI_SECTOR_LEN,
    MINI_STREAM_CUTOFF, SIGNATURE, TYPE_ROOT, TYPE_STREAM,
};
use crate::error::{XlsError, XlsResult};

/// Header fields the reader needs.
#[derive(Debug)]
struct Header {
    sector_size: usize,
    first_dir_sid: u32,
    first_minifat_sid: u32,
    minifat_sectors: u32,
    first_difat_sid: u32,
}

/// A named entry in the compound-file directory.
#[derive(Debug)]
struct DirEntry {
    name: String,
    entry_type: u8,
    start_sector: u32,
    size: u64,
}

/// Read-side view of a compound file.
///
/// Construction materializes the FAT, MiniFAT, directory and mini-stream
/// once; [`CfbReader::stream`] then resolves a named stream to its bytes.
/// The reader never mutates, so repeated lookups return identical data.
pub struct CfbReader<'a> {
    data: &'a [u8],
    sector_size: usize,
    max_hops: usize,
    fat: Vec<u32>,
    minifat: Vec<u32>,
    mini_stream: Vec<u8>,
    entries: Vec<DirEntry>,
}

impl<'a> CfbReader<'a> {
    /// Open a compound file held in memory.
    pub fn open(data: &'a [u8]) -> XlsResult<Self> {
        let header = parse_header(data)?;
        let sector_size = header.sector_size;
        let max_hops = data.len() / sector_size + 1;

        let fat = load_fat(data, sector_size, max_hops, &header)?;

        let dir_bytes = read_chain(data, sector_size, &fat, header.first_dir_sid, max_hops)?;
        let entries = parse_directory(&dir_bytes)?;

        let minifat: Vec<u32> = if header.minifat_sectors > 0 {
            read_chain(data, sector_size, &fat, header.first_minifat_sid, max_hops)?
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes(c.try_into().expect("4-byte chunk")))
                .collect()
        } else {
            Vec::new()
        };

        // The root entry's regular chain holds the mini-stream
        let mini_stream = match entries.iter().find(|e| e.entry_type == TYPE_ROOT) {
            Some(root) if root.start_sector <= MAX_REGULAR_SECTOR => {
                let mut bytes =
                    read_chain(data, sector_size, &fat, root.start_sector, max_hops)?;
                bytes.truncate(root.size.min(bytes.len() as u64) as usize);
                bytes
            }
            _ => Vec::new(),
        };

        Ok(Self {
            data,
            sector_size,
            max_hops,
            fat,
            minifat,
            mini_stream,
            entries,
        })
    }

    /// Look up a stream by name (case-insensitive) and return its bytes,
    /// or `None` when no stream entry matches.
    pub fn stream(&self, name: &str) -> XlsResult<Option<Vec<u8>>> {
        let entry = match self
            .entries
            .iter()
            .find(|e| e.entry_type == TYPE_STREAM && e.name.eq_ignore_ascii_case(name))
        {
            Some(e) => e,
            None => return Ok(None),
        };

        let bytes = if entry.size < MINI_STREAM_CUTOFF {
            self.read_mini_chain(entry.start_sector, entry.size)?
        } else {
            let mut bytes = read_chain(
                self.data,
                self.sector_size,
                &self.fat,
                entry.start_sector,
                self.max_hops,
            )?;
            bytes.truncate(entry.size.min(bytes.len() as u64) as usize);
            bytes
        };
        Ok(Some(bytes))
    }

    /// Names of all stream entries, for diagnostics.
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == TYPE_STREAM)
            .map(|e| e.name.as_str())
    }

    /// Follow a MiniFAT chain through the mini-stream.
    fn read_mini_chain(&self, start: u32, size: u64) -> XlsResult<Vec<u8>> {
        let max_hops = self.mini_stream.len() / MINI_SECTOR_LEN + 1;
        let mut out = Vec::new();
        let mut sid = start;
        let mut hops = 0usize;

        while sid <= MAX_REGULAR_SECTOR {
            hops += 1;
            if hops > max_hops {
                return Err(XlsError::Parse(
                    "MiniFAT chain does not terminate".to_string(),
                ));
            }
            let begin = sid as usize * MINI_SECTOR_LEN;
            if begin >= self.mini_stream.len() {
                return Err(XlsError::Parse(format!("mini-sector {sid} out of range")));
            }
            let end = self.mini_stream.len().min(begin + MINI_SECTOR_LEN);
            out.extend_from_slice(&self.mini_stream[begin..end]);

            sid = *self
                .minifat
                .get(sid as usize)
                .ok_or_else(|| XlsError::Parse(format!("mini-sector {sid} beyond the MiniFAT")))?;
        }

        out.truncate(size.min(out.len() as u64) as usize);
        Ok(out)
    }
}

fn parse_header(data: &[u8]) -> XlsResult<Header> {
    if data.len() < HEADER_LEN {
        return Err(XlsError::NotXls("file shorter than a compound-file header"));
    }
    if data[..8] != SIGNATURE {
        return Err(XlsError::NotXls("bad OLE2 signature"));
    }

    let mut off = 30;
    let sector_shift = read_u16(data, &mut off)?;
    let mini_shift = read_u16(data, &mut off)?;
    let sector_size = match sector_shift {
        9 => 512,
        12 => 4096,
        _ => return Err(XlsError::NotXls("unsupported sector size")),
    };
    if mini_shift != 6 {
        return Err(XlsError::NotXls("unsupported mini-sector size"));
    }

    let mut off = 48;
    let first_dir_sid = read_u32(data, &mut off)?;
    let mut off = 60;
    let first_minifat_sid = read_u32(data, &mut off)?;
    let minifat_sectors = read_u32(data, &mut off)?;
    let first_difat_sid = read_u32(data, &mut off)?;

    Ok(Header {
        sector_size,
        first_dir_sid,
        first_minifat_sid,
        minifat_sectors,
        first_difat_sid,
    })
}

/// Slice out sector `sid`. The final sector of a truncated file may come
/// back short; chain readers tolerate that and the stream-size truncation
/// bounds what callers see.
fn sector_bytes(data: &[u8], sector_size: usize, sid: u32) -> XlsResult<&[u8]> {
    let start = (sid as usize)
        .checked_mul(sector_size)
        .and_then(|v| v.checked_add(HEADER_LEN))
        .ok_or_else(|| XlsError::Parse(format!("sector {sid} offset overflows")))?;
    if start >= data.len() {
        return Err(XlsError::Parse(format!("sector {sid} out of range")));
    }
    let end = data.len().min(start + sector_size);
    Ok(&data[start..end])
}

/// Build the FAT: inline DIFAT entries plus the DIFAT extension chain,
/// then the entries of every listed FAT sector in order.
fn load_fat(
    data: &[u8],
    sector_size: usize,
    max_hops: usize,
    header: &Header,
) -> XlsResult<Vec<u32>> {
    let mut fat_sids: Vec<u32> = Vec::new();

    let mut off = 76;
    for _ in 0..HEADER_DIFAT_LEN {
        let sid = read_u32(&data[..HEADER_LEN], &mut off)?;
        if sid <= MAX_REGULAR_SECTOR {
            fat_sids.push(sid);
        }
    }

    // Each DIFAT extension sector holds sector_size/4 - 1 FAT sector ids
    // followed by the next DIFAT sector id in its last 4 bytes.
    let mut sid = header.first_difat_sid;
    let mut hops = 0usize;
    while sid <= MAX_REGULAR_SECTOR {
        hops += 1;
        if hops > max_hops {
            return Err(XlsError::Parse("DIFAT chain does not terminate".to_string()));
        }
        let sector = sector_bytes(data, sector_size, sid)?;
        if sector.len() < sector_size {
            return Err(XlsError::Parse(format!("DIFAT sector {sid} truncated")));
        }
        for chunk in sector[..sector_size - 4].chunks_exact(4) {
            let s = u32::from_le_bytes(chunk.try_into().expect("4-byte chunk"));
            if s <= MAX_REGULAR_SECTOR {
                fat_sids.push(s);
            }
        }
        sid = u32::from_le_bytes(
            sector[sector_size - 4..]
                .try_into()
                .expect("4-byte DIFAT tail"),
        );
    }

    let mut fat = Vec::with_capacity(fat_sids.len() * (sector_size / 4));
    for &fat_sid in &fat_sids {
        let sector = sector_bytes(data, sector_size, fat_sid)?;
        for chunk in sector.chunks_exact(4) {
            fat.push(u32::from_le_bytes(chunk.try_into().expect("4-byte chunk")));
        }
    }
    Ok(fat)
}

/// Concatenate the sectors of a FAT chain starting at `start`.
fn read_chain(
    data: &[u8],
    sector_size: usize,
    fat: &[u32],
    start: u32,
    max_hops: usize,
) -> XlsResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut sid = start;
    let mut hops = 0usize;

    while sid <= MAX_REGULAR_SECTOR {
        hops += 1;
        if hops > max_hops {
            return Err(XlsError::Parse("FAT chain does not terminate".to_string()));
        }
        out.extend_from_slice(sector_bytes(data, sector_size, sid)?);
        sid = *fat
            .get(sid as usize)
            .ok_or_else(|| XlsError::Parse(format!("sector {sid} beyond the FAT")))?;
    }
    Ok(out)
}

/// Slice directory sectors into 128-byte entries. Unallocated entries
/// (no name) are dropped; names lose their trailing NUL.
fn parse_directory(bytes: &[u8]) -> XlsResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    for raw in bytes.chunks_exact(DIR_ENTRY_LEN) {
        let mut off = 64;
        let name_len = read_u16(raw, &mut off)? as usize;
        if name_len < 2 || name_len > 64 {
            continue;
        }
        let (name, _, _) = UTF_16LE.decode(&raw[..name_len - 2]);
        let entry_type = raw[66];

        let mut off = 116;
        let start_sector = read_u32(raw, &mut off)?;
        let size = read_u64(raw, &mut off)?;

        entries.push(DirEntry {
            name: name.into_owned(),
            entry_type,
            start_sector,
            size,
        });
    }
    Ok(entries)
}
