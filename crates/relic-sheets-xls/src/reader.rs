//! XLS (BIFF) reader.
//!
//! Opens the compound-file container, reads the `Workbook` (or `Book`)
//! stream, parses the globals substream, then decodes each sheet's cells
//! from the offset its BOUNDSHEET record points at.

use std::path::Path;

use relic_sheets_core::{CellValue, Workbook, Worksheet};

use crate::biff::parser::{read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{parse_sst, read_byte_string, read_unicode_string};
use crate::biff::{parse_bof, RecordCursor};
use crate::cfb::reader::CfbReader;
use crate::error::{XlsError, XlsResult};

/// XLS file reader.
pub struct XlsReader;

/// Metadata for a sheet parsed from a BOUNDSHEET record.
#[derive(Debug)]
struct SheetInfo {
    /// Absolute byte offset of the sheet's BOF in the workbook stream.
    offset: u32,
    /// Sheet visibility: 0 = visible, 1 = hidden, 2 = very hidden.
    state: u8,
    /// Sheet type: 0 = worksheet, 2 = chart, 6 = macro/VBA.
    sheet_type: u8,
    /// Sheet name.
    name: String,
}

/// State collected from the workbook globals substream.
#[derive(Debug)]
struct Globals {
    /// BOF version word of the globals substream (0x0500 or 0x0600).
    biff_version: u16,
    /// Codepage for 8-bit strings; defaults to cp1252.
    codepage: u16,
    /// DATEMODE: 1904 date system in use.
    date_1904: bool,
    /// BOUNDSHEET entries in file order.
    sheets: Vec<SheetInfo>,
    /// Shared string table, indexed by LABELSST records.
    sst: Vec<String>,
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<Workbook> {
        let data = std::fs::read(path)?;
        Self::read_bytes(&data)
    }

    /// Read an XLS file already held in memory.
    pub fn read_bytes(data: &[u8]) -> XlsResult<Workbook> {
        let cfb = CfbReader::open(data)?;

        // BIFF8 names the stream "Workbook"; BIFF5 uses "Book"
        let stream = if let Some(s) = cfb.stream("Workbook")? {
            log::debug!("reading 'Workbook' stream ({} bytes)", s.len());
            s
        } else if let Some(s) = cfb.stream("Book")? {
            log::debug!("reading 'Book' stream ({} bytes)", s.len());
            s
        } else {
            return Err(XlsError::MissingWorkbookStream);
        };

        Self::parse_workbook_stream(&stream)
    }

    /// Parse a raw workbook stream into the workbook model.
    fn parse_workbook_stream(stream: &[u8]) -> XlsResult<Workbook> {
        let globals = Self::parse_globals(stream)?;

        let mut workbook = Workbook::new();
        workbook.set_date_1904(globals.date_1904);

        for info in &globals.sheets {
            // Only worksheets (type 0); charts and macro sheets are skipped
            if info.sheet_type != 0 {
                log::debug!(
                    "skipping non-worksheet substream '{}' (type {})",
                    info.name,
                    info.sheet_type
                );
                continue;
            }
            if info.state != 0 {
                log::debug!("sheet '{}' is hidden (state {})", info.name, info.state);
            }

            let mut ws = Worksheet::new(&info.name);
            Self::parse_sheet_cells(stream, info, &globals, &mut ws)?;
            workbook.add_sheet(ws)?;
        }

        Ok(workbook)
    }

    /// Walk the globals substream: from offset 0 to the first EOF after
    /// the globals BOF, collecting BOUNDSHEET, SST (with its CONTINUE
    /// spill), CODEPAGE and DATEMODE. Unknown records are skipped.
    fn parse_globals(stream: &[u8]) -> XlsResult<Globals> {
        let mut cursor = RecordCursor::new(stream);
        let mut globals = Globals {
            biff_version: records::BIFF8_VERSION,
            codepage: 1252,
            date_1904: false,
            sheets: Vec::new(),
            sst: Vec::new(),
        };
        let mut in_globals = false;

        while let Some(rec) = cursor.next_record() {
            match rec.sid {
                records::BOF if !in_globals => {
                    let (version, dt) = parse_bof(rec.data)?;
                    if dt != records::BOF_WORKBOOK_GLOBALS {
                        log::debug!("first BOF has substream type 0x{dt:04X}, not globals");
                    }
                    globals.biff_version = version;
                    in_globals = true;
                }
                records::EOF if in_globals => break,
                records::BOUNDSHEET if in_globals => {
                    globals.sheets.push(Self::parse_boundsheet(
                        rec.data,
                        globals.biff_version,
                        globals.codepage,
                    )?);
                }
                records::SST if in_globals && globals.sst.is_empty() => {
                    // The logical SST payload spans the following CONTINUEs
                    let mut fragments = vec![rec.data];
                    loop {
                        let mark = cursor.position();
                        match cursor.next_record() {
                            Some(next) if next.sid == records::CONTINUE => {
                                fragments.push(next.data);
                            }
                            Some(_) => {
                                cursor.seek(mark);
                                break;
                            }
                            None => break,
                        }
                    }
                    globals.sst = parse_sst(&fragments)?;
                }
                records::CODEPAGE if in_globals => {
                    if rec.data.len() >= 2 {
                        globals.codepage = u16::from_le_bytes([rec.data[0], rec.data[1]]);
                    }
                }
                records::DATEMODE if in_globals => {
                    if rec.data.len() >= 2 {
                        globals.date_1904 =
                            u16::from_le_bytes([rec.data[0], rec.data[1]]) == 1;
                    }
                }
                _ => {}
            }
        }

        if !in_globals {
            return Err(XlsError::Parse("no workbook globals BOF found".to_string()));
        }
        Ok(globals)
    }

    /// BOUNDSHEET: offset(4) + state(1) + type(1) + name.
    ///
    /// The name is a byte string in BIFF5 and a Unicode string in BIFF8.
    fn parse_boundsheet(data: &[u8], biff_version: u16, codepage: u16) -> XlsResult<SheetInfo> {
        let mut off = 0;
        let offset = read_u32(data, &mut off)?;
        let state = read_u8(data, &mut off)?;
        let sheet_type = read_u8(data, &mut off)?;
        let name = if biff_version == records::BIFF5_VERSION {
            read_byte_string(data, &mut off, codepage)?
        } else {
            read_unicode_string(data, &mut off)?
        };

        Ok(SheetInfo {
            offset,
            state,
            sheet_type,
            name,
        })
    }

    /// Decode one sheet's cells: seek to its BOF, then iterate to the
    /// matching EOF. Records inside nested substreams (embedded charts)
    /// are ignored.
    fn parse_sheet_cells(
        stream: &[u8],
        info: &SheetInfo,
        globals: &Globals,
        ws: &mut Worksheet,
    ) -> XlsResult<()> {
        let offset = info.offset as usize;
        if offset >= stream.len() {
            return Err(XlsError::Parse(format!(
                "sheet '{}' offset {} out of range",
                info.name, info.offset
            )));
        }

        let mut cursor = RecordCursor::new(stream);
        cursor.seek(offset);

        let bof = cursor.next_record().ok_or_else(|| {
            XlsError::Parse(format!("sheet '{}' substream truncated", info.name))
        })?;
        if bof.sid != records::BOF {
            return Err(XlsError::Parse(format!(
                "sheet '{}' offset does not point at a BOF",
                info.name
            )));
        }
        let (version, _dt) = parse_bof(bof.data)?;
        let biff5 = version == records::BIFF5_VERSION;

        let mut depth = 1u32;
        while let Some(rec) = cursor.next_record() {
            match rec.sid {
                records::BOF => depth += 1,
                records::EOF => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ if depth > 1 => {}
                records::NUMBER => Self::parse_number(rec.data, ws)?,
                records::RK => Self::parse_rk(rec.data, ws)?,
                records::MULRK => Self::parse_mulrk(rec.data, ws)?,
                records::LABEL => Self::parse_label(rec.data, ws, biff5, globals.codepage)?,
                records::LABELSST => Self::parse_labelsst(rec.data, ws, &globals.sst)?,
                records::FORMULA => Self::parse_formula(rec.data, ws)?,
                _ => {}
            }
        }

        Ok(())
    }

    // ── Cell record parsers ──────────────────────────────────────────────

    /// NUMBER: row(2) + col(2) + xf(2) + f64(8)
    fn parse_number(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let col = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;
        let value = read_f64(data, &mut off)?;

        ws.set_cell_value_at(row, col, CellValue::Number(value));
        Ok(())
    }

    /// RK: row(2) + col(2) + xf(2) + rk(4)
    fn parse_rk(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let col = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;
        let value = read_rk(data, &mut off)?;

        ws.set_cell_value_at(row, col, CellValue::Number(value));
        Ok(())
    }

    /// MULRK: row(2) + first_col(2) + [xf(2) + rk(4)]* + last_col(2)
    fn parse_mulrk(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        if data.len() < 6 {
            return Err(XlsError::Parse("MULRK record too short".to_string()));
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let first_col = read_u16(data, &mut off)?;

        let last_col = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
        let rk_data_end = data.len() - 2;

        let mut col = first_col;
        while off + 6 <= rk_data_end && col <= last_col {
            let _xf = read_u16(data, &mut off)?;
            let value = read_rk(data, &mut off)?;
            ws.set_cell_value_at(row, col, CellValue::Number(value));
            if col == last_col {
                break;
            }
            col += 1;
        }

        Ok(())
    }

    /// LABEL: row(2) + col(2) + xf(2) + string.
    ///
    /// BIFF5 stores a codepage byte string with a u8 length; BIFF8 a
    /// Unicode string with a u16 length and flags byte.
    fn parse_label(data: &[u8], ws: &mut Worksheet, biff5: bool, codepage: u16) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let col = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;
        let text = if biff5 {
            read_byte_string(data, &mut off, codepage)?
        } else {
            read_unicode_string(data, &mut off)?
        };

        ws.set_cell_value_at(row, col, CellValue::Text(text));
        Ok(())
    }

    /// LABELSST: row(2) + col(2) + xf(2) + sst_index(4).
    ///
    /// An out-of-range index drops the cell rather than failing the read.
    fn parse_labelsst(data: &[u8], ws: &mut Worksheet, sst: &[String]) -> XlsResult<()> {
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let col = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;
        let sst_index = read_u32(data, &mut off)? as usize;

        match sst.get(sst_index) {
            Some(text) => ws.set_cell_value_at(row, col, CellValue::Text(text.clone())),
            None => log::debug!(
                "LABELSST index {sst_index} out of range (SST has {} strings)",
                sst.len()
            ),
        }
        Ok(())
    }

    /// FORMULA: row(2) + col(2) + xf(2) + result(8) + flags(2) + chn(4) + tokens.
    ///
    /// Only a cached numeric result produces a cell; result bytes 6..7
    /// equal 0xFFFF when the cache holds a string/bool/error discriminant.
    fn parse_formula(data: &[u8], ws: &mut Worksheet) -> XlsResult<()> {
        if data.len() < 14 {
            return Err(XlsError::Parse("FORMULA record too short".to_string()));
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)?;
        let col = read_u16(data, &mut off)?;
        let _xf = read_u16(data, &mut off)?;

        let result: [u8; 8] = data[6..14].try_into().expect("8-byte slice");
        if result[6] == 0xFF && result[7] == 0xFF {
            return Ok(());
        }

        let value = f64::from_le_bytes(result);
        if value.is_finite() {
            ws.set_cell_value_at(row, col, CellValue::Number(value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::parser::{patch_u32, put_f64, put_u16, put_u32};
    use pretty_assertions::assert_eq;

    fn record(out: &mut Vec<u8>, sid: u16, body: &[u8]) {
        put_u16(out, sid);
        put_u16(out, body.len() as u16);
        out.extend_from_slice(body);
    }

    fn bof(out: &mut Vec<u8>, version: u16, dt: u16) {
        let mut body = Vec::new();
        put_u16(&mut body, version);
        put_u16(&mut body, dt);
        put_u16(&mut body, 0);
        put_u16(&mut body, 0);
        record(out, records::BOF, &body);
    }

    /// Globals (BIFF8) with an SST and a single BOUNDSHEET whose offset
    /// is patched to the appended sheet substream.
    fn stream_with_sheet(sst_strings: &[&str], sheet_body: &[u8]) -> Vec<u8> {
        let mut stream = Vec::new();
        bof(&mut stream, records::BIFF8_VERSION, records::BOF_WORKBOOK_GLOBALS);

        let mut sst = Vec::new();
        put_u32(&mut sst, sst_strings.len() as u32);
        put_u32(&mut sst, sst_strings.len() as u32);
        for s in sst_strings {
            put_u16(&mut sst, s.len() as u16);
            sst.push(0x00);
            sst.extend_from_slice(s.as_bytes());
        }
        record(&mut stream, records::SST, &sst);

        let mut bs = Vec::new();
        put_u32(&mut bs, 0); // patched below
        bs.push(0); // visible
        bs.push(0); // worksheet
        put_u16(&mut bs, 2); // BIFF8 name: cch u16 + flags
        bs.push(0x00);
        bs.extend_from_slice(b"S1");
        let patch_at = stream.len() + 4;
        record(&mut stream, records::BOUNDSHEET, &bs);

        record(&mut stream, records::EOF, &[]);

        let sheet_at = stream.len() as u32;
        patch_u32(&mut stream, patch_at, sheet_at);

        let mut sheet = Vec::new();
        bof(&mut sheet, records::BIFF8_VERSION, records::BOF_WORKSHEET);
        sheet.extend_from_slice(sheet_body);
        record(&mut sheet, records::EOF, &[]);
        stream.extend_from_slice(&sheet);
        stream
    }

    fn cell_prefix(row: u16, col: u16) -> Vec<u8> {
        let mut body = Vec::new();
        put_u16(&mut body, row);
        put_u16(&mut body, col);
        put_u16(&mut body, 0); // xf
        body
    }

    #[test]
    fn test_number_and_rk_cells() {
        let mut cells = Vec::new();
        let mut body = cell_prefix(0, 0);
        put_f64(&mut body, 2.5);
        record(&mut cells, records::NUMBER, &body);

        let mut body = cell_prefix(0, 1);
        put_u32(&mut body, (42u32 << 2) | 0x02); // integer RK
        record(&mut cells, records::RK, &body);

        let stream = stream_with_sheet(&[], &cells);
        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        let ws = wb.worksheet(0).unwrap();

        assert_eq!(ws.name(), "S1");
        assert_eq!(ws.get_value_at(0, 0), Some(&CellValue::Number(2.5)));
        assert_eq!(ws.get_value_at(0, 1), Some(&CellValue::Number(42.0)));
    }

    #[test]
    fn test_labelsst_out_of_range_is_skipped() {
        let mut cells = Vec::new();
        let mut body = cell_prefix(0, 0);
        put_u32(&mut body, 5); // beyond the one-string SST
        record(&mut cells, records::LABELSST, &body);

        let mut body = cell_prefix(0, 1);
        put_u32(&mut body, 0);
        record(&mut cells, records::LABELSST, &body);

        let stream = stream_with_sheet(&["hi"], &cells);
        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        let ws = wb.worksheet(0).unwrap();

        assert_eq!(ws.get_value_at(0, 0), None);
        assert_eq!(ws.get_value_at(0, 1), Some(&CellValue::text("hi")));
        assert_eq!(ws.cell_count(), 1);
    }

    #[test]
    fn test_mulrk_expands_columns() {
        let mut body = Vec::new();
        put_u16(&mut body, 3); // row
        put_u16(&mut body, 1); // first col
        for value in [100i32, 200, 300] {
            put_u16(&mut body, 0); // xf
            put_u32(&mut body, ((value << 2) as u32) | 0x02);
        }
        put_u16(&mut body, 3); // last col

        let mut cells = Vec::new();
        record(&mut cells, records::MULRK, &body);

        let stream = stream_with_sheet(&[], &cells);
        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        let ws = wb.worksheet(0).unwrap();

        assert_eq!(ws.get_value_at(3, 1), Some(&CellValue::Number(100.0)));
        assert_eq!(ws.get_value_at(3, 2), Some(&CellValue::Number(200.0)));
        assert_eq!(ws.get_value_at(3, 3), Some(&CellValue::Number(300.0)));
        assert_eq!(ws.get_value_at(3, 4), None);
    }

    #[test]
    fn test_formula_cached_results() {
        let mut cells = Vec::new();

        // Cached numeric result
        let mut body = cell_prefix(0, 0);
        put_f64(&mut body, 7.25);
        put_u16(&mut body, 0); // flags
        put_u32(&mut body, 0); // chn
        record(&mut cells, records::FORMULA, &body);

        // Cached string discriminant: bytes 6..7 = 0xFFFF
        let mut body = cell_prefix(0, 1);
        body.extend_from_slice(&[0x00, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        put_u16(&mut body, 0);
        put_u32(&mut body, 0);
        record(&mut cells, records::FORMULA, &body);

        let stream = stream_with_sheet(&[], &cells);
        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        let ws = wb.worksheet(0).unwrap();

        assert_eq!(ws.get_value_at(0, 0), Some(&CellValue::Number(7.25)));
        assert_eq!(ws.get_value_at(0, 1), None);
    }

    #[test]
    fn test_biff5_label_and_boundsheet() {
        let mut stream = Vec::new();
        bof(&mut stream, records::BIFF5_VERSION, records::BOF_WORKBOOK_GLOBALS);

        // CODEPAGE: cp1252
        let mut cp = Vec::new();
        put_u16(&mut cp, 0x04E4);
        record(&mut stream, records::CODEPAGE, &cp);

        // BIFF5 BOUNDSHEET name: u8 length + bytes
        let mut bs = Vec::new();
        put_u32(&mut bs, 0);
        bs.push(0);
        bs.push(0);
        bs.push(4);
        bs.extend_from_slice(b"Caf\xE9"); // "Café" in cp1252
        let patch_at = stream.len() + 4;
        record(&mut stream, records::BOUNDSHEET, &bs);
        record(&mut stream, records::EOF, &[]);

        let sheet_at = stream.len() as u32;
        patch_u32(&mut stream, patch_at, sheet_at);

        bof(&mut stream, records::BIFF5_VERSION, records::BOF_WORKSHEET);
        let mut body = cell_prefix(1, 0);
        body.push(2);
        body.extend_from_slice(b"\xE9!"); // "é!"
        record(&mut stream, records::LABEL, &body);
        record(&mut stream, records::EOF, &[]);

        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        let ws = wb.worksheet(0).unwrap();
        assert_eq!(ws.name(), "Café");
        assert_eq!(ws.get_value_at(1, 0), Some(&CellValue::text("é!")));
    }

    #[test]
    fn test_datemode_sets_flag() {
        let mut stream = Vec::new();
        bof(&mut stream, records::BIFF8_VERSION, records::BOF_WORKBOOK_GLOBALS);
        let mut dm = Vec::new();
        put_u16(&mut dm, 1);
        record(&mut stream, records::DATEMODE, &dm);
        record(&mut stream, records::EOF, &[]);

        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        assert!(wb.date_1904());
        assert!(wb.is_empty());
    }

    #[test]
    fn test_missing_globals_bof_is_an_error() {
        let mut stream = Vec::new();
        record(&mut stream, records::EOF, &[]);
        assert!(matches!(
            XlsReader::parse_workbook_stream(&stream),
            Err(XlsError::Parse(_))
        ));
    }

    #[test]
    fn test_boundsheet_offset_out_of_range_is_an_error() {
        let mut stream = Vec::new();
        bof(&mut stream, records::BIFF8_VERSION, records::BOF_WORKBOOK_GLOBALS);
        let mut bs = Vec::new();
        put_u32(&mut bs, 0xFFFF); // far beyond the stream
        bs.push(0);
        bs.push(0);
        put_u16(&mut bs, 1);
        bs.push(0);
        bs.push(b'S');
        record(&mut stream, records::BOUNDSHEET, &bs);
        record(&mut stream, records::EOF, &[]);

        assert!(matches!(
            XlsReader::parse_workbook_stream(&stream),
            Err(XlsError::Parse(_))
        ));
    }

    #[test]
    fn test_unknown_records_are_skipped() {
        let mut cells = Vec::new();
        record(&mut cells, 0x1234, &[0xAB; 10]); // unknown id
        let mut body = cell_prefix(0, 0);
        put_f64(&mut body, 1.0);
        record(&mut cells, records::NUMBER, &body);

        let stream = stream_with_sheet(&[], &cells);
        let wb = XlsReader::parse_workbook_stream(&stream).unwrap();
        assert_eq!(
            wb.worksheet(0).unwrap().get_value_at(0, 0),
            Some(&CellValue::Number(1.0))
        );
    }
}
