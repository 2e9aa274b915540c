//! Writer error types.

use std::path::PathBuf;

use polars::error::PolarsError;
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

/// Result type for writer operations.
pub type ExcelWriterResult<T> = std::result::Result<T, ExcelWriterError>;

/// Errors surfaced by [`crate::writer::ExcelWriter`].
#[derive(Debug, Error)]
pub enum ExcelWriterError {
    /// Output directory could not be created.
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spreadsheet library failure during sheet creation, cell write or save.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] XlsxError),

    /// Table source could not be read.
    #[error("table read error: {0}")]
    Table(#[from] PolarsError),

    /// Row length differs from header length and ragged rows are rejected.
    #[error("ragged row for {destination}: row has {n_len_row} cells, header has {n_len_header}")]
    RaggedRow {
        destination: String,
        n_len_row: usize,
        n_len_header: usize,
    },

    /// Operation attempted after `flush()`.
    #[error("Cannot write after flush().")]
    Flushed,

    #[error("row index overflow: {0}")]
    RowIndexOverflow(usize),

    #[error("column index overflow: {0}")]
    ColumnIndexOverflow(usize),

    /// Writer options failed validation.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}
