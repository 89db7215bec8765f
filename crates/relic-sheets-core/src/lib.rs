//! # relic-sheets-core
//!
//! Core data structures for the relic-sheets spreadsheet library.
//!
//! This crate provides the fundamental types shared by the format engines:
//! - [`CellValue`] - Represents cell values (text, numbers, dates)
//! - [`Worksheet`] - A named sparse grid of cells
//! - [`Workbook`] - An ordered collection of worksheets
//! - [`dates`] - Excel serial date conversion helpers
//!
//! ## Example
//!
//! ```rust
//! use relic_sheets_core::{CellValue, Workbook, Worksheet};
//!
//! let mut sheet = Worksheet::new("Sheet1");
//! sheet.set_cell_value_at(0, 0, CellValue::text("Hello"));
//! sheet.set_cell_value_at(0, 1, CellValue::Number(42.0));
//!
//! let mut workbook = Workbook::new();
//! workbook.add_sheet(sheet).unwrap();
//! assert_eq!(workbook.sheet_count(), 1);
//! ```

pub mod cell;
pub mod dates;
pub mod error;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::CellValue;
pub use error::{Error, Result};
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows addressable by the legacy binary format
/// (row indices are 16-bit)
pub const MAX_ROWS: u32 = 65_536;

/// Maximum number of columns in a legacy worksheet
pub const MAX_COLS: u16 = 256;

/// Maximum length of a sheet name in characters
pub const MAX_SHEET_NAME_LEN: usize = 255;
