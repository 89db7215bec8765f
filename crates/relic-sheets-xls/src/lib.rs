//! # relic-sheets-xls
//!
//! Reader and writer for the legacy Excel binary format (.xls): an OLE2
//! compound-file container wrapping a BIFF record stream.
//!
//! The reader opens arbitrary third-party files, handling both BIFF5 and
//! BIFF8 layouts for the records it decodes; the writer emits a
//! single-sheet BIFF5 workbook inside a minimal compound file.
//!
//! ```no_run
//! use relic_sheets_xls::{TableSheet, XlsReader, XlsWriter};
//!
//! let sheet = TableSheet {
//!     name: "Report".to_string(),
//!     headers: vec!["Item".to_string(), "Qty".to_string()],
//!     rows: vec![vec!["bolt".to_string(), "42".to_string()]],
//! };
//! XlsWriter::write_file(&sheet, "report.xls").unwrap();
//!
//! let workbook = XlsReader::read_file("report.xls").unwrap();
//! assert_eq!(workbook.worksheet(0).unwrap().name(), "Report");
//! ```

pub mod biff;
pub mod cfb;
mod codepage;
pub mod error;
pub mod reader;
pub mod writer;

pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
pub use writer::{TableSheet, XlsWriter};
