//! XLS (BIFF5) writer.
//!
//! Builds a single-sheet BIFF5 workbook stream — a globals substream with
//! the sheet's offset back-patched into its BOUNDSHEET record, followed
//! by the worksheet substream — packs it into a minimal compound file as
//! the `Book` stream, and persists it atomically.

use std::io::Write;
use std::path::Path;

use crate::biff::parser::{patch_u32, put_f64, put_u16, put_u32};
use crate::biff::records;
use crate::cfb;
use crate::codepage;
use crate::error::{XlsError, XlsResult};

/// Longest byte string a LABEL record carries.
const MAX_LABEL_BYTES: usize = 255;

/// Longest sheet name in a BIFF5 BOUNDSHEET record.
const MAX_BOUNDSHEET_NAME_BYTES: usize = 31;

/// Input descriptor for the writer: one sheet of tabular text data.
///
/// Every row must have exactly as many cells as `headers`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSheet {
    /// Sheet name; must not be empty.
    pub name: String,
    /// Header row, written as text at row 0.
    pub headers: Vec<String>,
    /// Data rows, written from row 1 on. Cells that parse as finite
    /// numbers become NUMBER records, the rest become LABEL records.
    pub rows: Vec<Vec<String>>,
}

impl TableSheet {
    /// Convenience constructor from anything string-like.
    pub fn new<S, H, R>(name: S, headers: H, rows: R) -> Self
    where
        S: Into<String>,
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator,
        R::Item: IntoIterator,
        <R::Item as IntoIterator>::Item: Into<String>,
    {
        Self {
            name: name.into(),
            headers: headers.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

/// XLS file writer.
pub struct XlsWriter;

impl XlsWriter {
    /// Write a single-sheet workbook to a file path.
    ///
    /// The file is written atomically: bytes go to a temporary file in
    /// the target directory, which is then renamed over the destination.
    pub fn write_file<P: AsRef<Path>>(sheet: &TableSheet, path: P) -> XlsResult<()> {
        let bytes = Self::build(sheet)?;

        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(path).map_err(|e| XlsError::Io(e.error))?;
        Ok(())
    }

    /// Build the complete compound-file bytes without touching the
    /// filesystem.
    pub fn build(sheet: &TableSheet) -> XlsResult<Vec<u8>> {
        Self::validate(sheet)?;
        let worksheet = Self::build_worksheet(sheet);
        let workbook = Self::build_workbook(sheet, &worksheet);
        cfb::writer::build("Book", &workbook)
    }

    fn validate(sheet: &TableSheet) -> XlsResult<()> {
        if sheet.name.is_empty() {
            return Err(XlsError::EmptySheetName);
        }
        let expected = sheet.headers.len();
        for (row, cells) in sheet.rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(XlsError::InvalidGrid {
                    expected,
                    row,
                    got: cells.len(),
                });
            }
        }
        Ok(())
    }

    // ── Worksheet substream ──────────────────────────────────────────────

    /// BOF(worksheet), DIMENSIONS, one ROW per written row, the cells in
    /// row-major order, EOF.
    fn build_worksheet(sheet: &TableSheet) -> Vec<u8> {
        let width = sheet.headers.len() as u16;
        let row_count = (1 + sheet.rows.len()).min(u16::MAX as usize) as u16;

        let mut out = Vec::new();
        Self::put_bof(&mut out, records::BOF_WORKSHEET);

        // DIMENSIONS: row and column maxima are exclusive
        let mut body = Vec::with_capacity(10);
        put_u16(&mut body, 0);
        put_u16(&mut body, row_count);
        put_u16(&mut body, 0);
        put_u16(&mut body, width);
        put_u16(&mut body, 0); // reserved
        Self::put_record(&mut out, records::DIMENSIONS, &body);

        for row in 0..row_count {
            let mut body = Vec::with_capacity(16);
            put_u16(&mut body, row);
            put_u16(&mut body, 0); // first used column
            put_u16(&mut body, width); // last used column, exclusive
            put_u16(&mut body, 0x00FF); // default height
            put_u16(&mut body, 0);
            put_u16(&mut body, 0);
            put_u32(&mut body, 0); // flags
            Self::put_record(&mut out, records::ROW, &body);
        }

        for (col, text) in sheet.headers.iter().enumerate() {
            Self::put_label(&mut out, 0, col as u16, text);
        }
        for (i, cells) in sheet.rows.iter().enumerate() {
            let row = (1 + i).min(u16::MAX as usize) as u16;
            for (col, text) in cells.iter().enumerate() {
                match Self::numeric_value(text) {
                    Some(value) => Self::put_number(&mut out, row, col as u16, value),
                    None => Self::put_label(&mut out, row, col as u16, text),
                }
            }
        }

        Self::put_record(&mut out, records::EOF, &[]);
        out
    }

    /// A data cell becomes a NUMBER record when its trimmed text parses
    /// as a finite double, accepting `,` as the decimal separator.
    fn numeric_value(text: &str) -> Option<f64> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let normalized = trimmed.replace(',', ".");
        normalized.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    // ── Workbook globals substream ───────────────────────────────────────

    /// BOF(globals), CODEPAGE, WINDOW1, FONT, XF, BOUNDSHEET, EOF, then
    /// the worksheet bytes. The BOUNDSHEET offset field is patched once
    /// the worksheet's position is known.
    fn build_workbook(sheet: &TableSheet, worksheet: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(worksheet.len() + 160);
        Self::put_bof(&mut out, records::BOF_WORKBOOK_GLOBALS);

        // CODEPAGE: cp1252, matching the LABEL encoding below
        let mut body = Vec::with_capacity(2);
        put_u16(&mut body, 0x04E4);
        Self::put_record(&mut out, records::CODEPAGE, &body);

        // WINDOW1: fixed default window metrics, one selected tab
        let mut body = Vec::with_capacity(18);
        put_u16(&mut body, 360); // x position
        put_u16(&mut body, 270); // y position
        put_u16(&mut body, 14940); // width
        put_u16(&mut body, 9150); // height
        put_u16(&mut body, 0x0038); // h/v scroll bars and tabs visible
        put_u16(&mut body, 0); // active tab
        put_u16(&mut body, 0); // first displayed tab
        put_u16(&mut body, 1); // selected tabs
        put_u16(&mut body, 600); // tab bar width ratio
        Self::put_record(&mut out, records::WINDOW1, &body);

        // FONT: Arial 10pt, regular weight
        let mut body = Vec::with_capacity(16);
        put_u16(&mut body, 200); // height in twentieths of a point
        put_u16(&mut body, 0); // option flags
        put_u16(&mut body, 0x7FFF); // automatic color
        put_u16(&mut body, 400); // weight
        put_u16(&mut body, 0); // escapement
        body.push(0); // underline
        body.push(0); // family
        body.push(0); // charset
        body.push(0); // reserved
        body.push(5);
        body.extend_from_slice(b"Arial");
        Self::put_record(&mut out, records::FONT, &body);

        // XF: the single default cell format
        let mut body = Vec::with_capacity(16);
        put_u16(&mut body, 0); // font index
        put_u16(&mut body, 0); // number format index
        put_u16(&mut body, 0x0001); // cell-locked attribute
        for _ in 0..5 {
            put_u16(&mut body, 0);
        }
        Self::put_record(&mut out, records::XF, &body);

        // BOUNDSHEET: the offset field is patched after the worksheet
        // bytes land
        let mut body = Vec::new();
        put_u32(&mut body, 0);
        body.push(0); // visible
        body.push(0); // worksheet
        let mut name = codepage::encode_cp1252_lossy(&sheet.name);
        name.truncate(MAX_BOUNDSHEET_NAME_BYTES);
        body.push(name.len() as u8);
        body.extend_from_slice(&name);
        let patch_at = out.len() + 4; // skip the record header
        Self::put_record(&mut out, records::BOUNDSHEET, &body);

        Self::put_record(&mut out, records::EOF, &[]);

        let sheet_offset = out.len() as u32;
        out.extend_from_slice(worksheet);
        patch_u32(&mut out, patch_at, sheet_offset);
        out
    }

    // ── Record emission ──────────────────────────────────────────────────

    fn put_record(out: &mut Vec<u8>, sid: u16, body: &[u8]) {
        put_u16(out, sid);
        put_u16(out, body.len() as u16);
        out.extend_from_slice(body);
    }

    fn put_bof(out: &mut Vec<u8>, substream: u16) {
        let mut body = Vec::with_capacity(8);
        put_u16(&mut body, records::BIFF5_VERSION);
        put_u16(&mut body, substream);
        put_u16(&mut body, 0); // build id
        put_u16(&mut body, 0); // build year
        Self::put_record(out, records::BOF, &body);
    }

    fn put_number(out: &mut Vec<u8>, row: u16, col: u16, value: f64) {
        let mut body = Vec::with_capacity(14);
        put_u16(&mut body, row);
        put_u16(&mut body, col);
        put_u16(&mut body, 0); // xf
        put_f64(&mut body, value);
        Self::put_record(out, records::NUMBER, &body);
    }

    /// LABEL with a cp1252 byte string, capped at 255 bytes.
    fn put_label(out: &mut Vec<u8>, row: u16, col: u16, text: &str) {
        let mut bytes = codepage::encode_cp1252_lossy(text);
        bytes.truncate(MAX_LABEL_BYTES);

        let mut body = Vec::with_capacity(7 + bytes.len());
        put_u16(&mut body, row);
        put_u16(&mut body, col);
        put_u16(&mut body, 0); // xf
        body.push(bytes.len() as u8);
        body.extend_from_slice(&bytes);
        Self::put_record(out, records::LABEL, &body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biff::RecordCursor;
    use pretty_assertions::assert_eq;

    fn sheet(name: &str, headers: &[&str], rows: &[&[&str]]) -> TableSheet {
        TableSheet::new(
            name,
            headers.iter().copied(),
            rows.iter().map(|r| r.iter().copied()),
        )
    }

    #[test]
    fn test_empty_sheet_name_is_rejected() {
        let s = sheet("", &["A"], &[]);
        assert!(matches!(
            XlsWriter::build(&s),
            Err(XlsError::EmptySheetName)
        ));
    }

    #[test]
    fn test_ragged_grid_is_rejected() {
        let s = sheet("S", &["A", "B"], &[&["x"]]);
        match XlsWriter::build(&s) {
            Err(XlsError::InvalidGrid { expected, row, got }) => {
                assert_eq!((expected, row, got), (2, 0, 1));
            }
            other => panic!("expected InvalidGrid, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_value_policy() {
        assert_eq!(XlsWriter::numeric_value("42"), Some(42.0));
        assert_eq!(XlsWriter::numeric_value(" 7.5 "), Some(7.5));
        assert_eq!(XlsWriter::numeric_value("3,14"), Some(3.14));
        assert_eq!(XlsWriter::numeric_value("-1e3"), Some(-1000.0));
        assert_eq!(XlsWriter::numeric_value(""), None);
        assert_eq!(XlsWriter::numeric_value("   "), None);
        assert_eq!(XlsWriter::numeric_value("abc"), None);
        assert_eq!(XlsWriter::numeric_value("1,2,3"), None);
        assert_eq!(XlsWriter::numeric_value("inf"), None);
        assert_eq!(XlsWriter::numeric_value("NaN"), None);
    }

    #[test]
    fn test_worksheet_record_sequence() {
        let s = sheet("S", &["A", "B"], &[&["hi", "42"]]);
        let bytes = XlsWriter::build_worksheet(&s);

        let mut cursor = RecordCursor::new(&bytes);
        let mut sids = Vec::new();
        while let Some(rec) = cursor.next_record() {
            sids.push(rec.sid);
        }
        assert_eq!(
            sids,
            vec![
                records::BOF,
                records::DIMENSIONS,
                records::ROW,
                records::ROW,
                records::LABEL,
                records::LABEL,
                records::LABEL,
                records::NUMBER,
                records::EOF,
            ]
        );
    }

    #[test]
    fn test_dimensions_are_exclusive() {
        let s = sheet("S", &["A", "B", "C"], &[&["1", "2", "3"], &["4", "5", "6"]]);
        let bytes = XlsWriter::build_worksheet(&s);

        let mut cursor = RecordCursor::new(&bytes);
        let dims = loop {
            let rec = cursor.next_record().unwrap();
            if rec.sid == records::DIMENSIONS {
                break rec.data.to_vec();
            }
        };
        assert_eq!(u16::from_le_bytes([dims[0], dims[1]]), 0);
        assert_eq!(u16::from_le_bytes([dims[2], dims[3]]), 3); // 1 header + 2 rows
        assert_eq!(u16::from_le_bytes([dims[4], dims[5]]), 0);
        assert_eq!(u16::from_le_bytes([dims[6], dims[7]]), 3); // width
    }

    #[test]
    fn test_boundsheet_offset_is_patched() {
        let s = sheet("S", &["A"], &[]);
        let worksheet = XlsWriter::build_worksheet(&s);
        let workbook = XlsWriter::build_workbook(&s, &worksheet);

        let mut cursor = RecordCursor::new(&workbook);
        let mut globals_end = None;
        let mut patched = None;
        while let Some(rec) = cursor.next_record() {
            match rec.sid {
                records::BOUNDSHEET => {
                    patched =
                        Some(u32::from_le_bytes(rec.data[..4].try_into().unwrap()));
                }
                records::EOF => {
                    globals_end = Some(cursor.position());
                    break;
                }
                _ => {}
            }
        }
        let offset = patched.unwrap();
        assert_eq!(offset as usize, globals_end.unwrap());

        // The patched offset points at the worksheet BOF
        let mut cursor = RecordCursor::new(&workbook);
        cursor.seek(offset as usize);
        let rec = cursor.next_record().unwrap();
        assert_eq!(rec.sid, records::BOF);
        assert_eq!(u16::from_le_bytes([rec.data[2], rec.data[3]]), 0x0010);
    }

    #[test]
    fn test_label_encoding_is_lossy_and_capped() {
        let long = "x".repeat(300);
        let mut out = Vec::new();
        XlsWriter::put_label(&mut out, 0, 0, &long);
        let mut cursor = RecordCursor::new(&out);
        let rec = cursor.next_record().unwrap();
        assert_eq!(rec.data[6] as usize, MAX_LABEL_BYTES);
        assert_eq!(rec.data.len(), 7 + MAX_LABEL_BYTES);

        let mut out = Vec::new();
        XlsWriter::put_label(&mut out, 0, 0, "日本");
        let mut cursor = RecordCursor::new(&out);
        let rec = cursor.next_record().unwrap();
        assert_eq!(&rec.data[7..], b"??");
    }

    #[test]
    fn test_sheet_name_is_truncated() {
        let s = sheet(&"n".repeat(40), &["A"], &[]);
        let worksheet = XlsWriter::build_worksheet(&s);
        let workbook = XlsWriter::build_workbook(&s, &worksheet);

        let mut cursor = RecordCursor::new(&workbook);
        while let Some(rec) = cursor.next_record() {
            if rec.sid == records::BOUNDSHEET {
                assert_eq!(rec.data[6] as usize, MAX_BOUNDSHEET_NAME_BYTES);
                return;
            }
        }
        panic!("no BOUNDSHEET record");
    }
}
