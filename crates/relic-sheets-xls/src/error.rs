//! XLS error types

use thiserror::Error;

/// Result type for XLS operations
pub type XlsResult<T> = std::result::Result<T, XlsError>;

/// Errors that can occur during XLS reading/writing
#[derive(Debug, Error)]
pub enum XlsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not an OLE2 compound file
    #[error("Not an XLS file: {0}")]
    NotXls(&'static str),

    /// The compound file holds neither a `Workbook` nor a `Book` stream
    #[error("No Workbook or Book stream found in compound file")]
    MissingWorkbookStream,

    /// Structural corruption: truncated records, bad offsets, chain cycles
    #[error("Parse error: {0}")]
    Parse(String),

    /// Writer input has an empty sheet name
    #[error("Sheet name must not be empty")]
    EmptySheetName,

    /// Writer input row does not match the header width
    #[error("Row {row} has {got} cells, expected {expected}")]
    InvalidGrid {
        /// Number of cells every row must have (the header count)
        expected: usize,
        /// Index of the offending row
        row: usize,
        /// Number of cells the row actually has
        got: usize,
    },

    /// Core model error
    #[error("Core error: {0}")]
    Core(#[from] relic_sheets_core::Error),
}
