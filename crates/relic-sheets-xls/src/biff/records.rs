//! BIFF record type constants.
//!
//! Reference: [MS-XLS] §2.3 — Record Enumeration

// ── Stream structure ────────────────────────────────────────────────────
pub const BOF: u16 = 0x0809;
pub const EOF: u16 = 0x000A;
pub const CONTINUE: u16 = 0x003C;

// ── Workbook globals ────────────────────────────────────────────────────
pub const CODEPAGE: u16 = 0x0042; // 8-bit text codepage (1200 = UTF-16 in BIFF8)
pub const DATEMODE: u16 = 0x0022; // 1900 vs 1904 date system (a.k.a. DATE1904)
pub const WINDOW1: u16 = 0x003D; // Workbook window metrics and tab state
pub const FONT: u16 = 0x0031; // Font definition
pub const XF: u16 = 0x00E0; // Extended Format (cell format record)
pub const BOUNDSHEET: u16 = 0x0085; // Sheet name, type, visibility, stream offset
pub const SST: u16 = 0x00FC; // Shared String Table

// ── Sheet structure ─────────────────────────────────────────────────────
pub const DIMENSIONS: u16 = 0x0200; // Used range (first/last row/col, exclusive max)
pub const ROW: u16 = 0x0208; // Row extent, height, flags

// ── Cell records ────────────────────────────────────────────────────────
pub const NUMBER: u16 = 0x0203; // Cell with IEEE 754 double
pub const RK: u16 = 0x027E; // Cell with compressed number (RK encoding)
pub const MULRK: u16 = 0x00BD; // Multiple RK values in one row
pub const LABEL: u16 = 0x0204; // Cell with inline string
pub const LABELSST: u16 = 0x00FD; // Cell containing SST string index
pub const FORMULA: u16 = 0x0006; // Formula cell with cached result

// ── BOF subtypes (the `dt` field) ───────────────────────────────────────
pub const BOF_WORKBOOK_GLOBALS: u16 = 0x0005;
pub const BOF_WORKSHEET: u16 = 0x0010;

// ── BOF version words ───────────────────────────────────────────────────
pub const BIFF5_VERSION: u16 = 0x0500;
pub const BIFF8_VERSION: u16 = 0x0600;

/// Per-record body limit; longer logical payloads spill into CONTINUE
/// records.
pub const MAX_RECORD_BODY: usize = 8224;
