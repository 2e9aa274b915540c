//! `sheetkit_io_xlsx` v1:
//! Buffered multi-file, multi-sheet XLSX writer.
//!
//! Modules:
//! - `conf`   : constants and default presets
//! - `spec`   : models/options/reports
//! - `error`  : error type
//! - `util`   : pure helper functions
//! - `table`  : table sources for bulk ingestion
//! - `writer` : buffered writer session
pub mod conf;
pub mod error;
pub mod spec;
pub mod table;
pub mod util;
pub mod writer;

pub use conf::{
    N_INTEGER_TEXT_THRESHOLD, N_LEN_EXCEL_SHEET_NAME_MAX, N_PRECISION_DEFAULT, N_WIDTH_COL_MAX,
    TUP_EXCEL_ILLEGAL, derive_default_palette,
};
pub use error::{ExcelWriterError, ExcelWriterResult};
pub use spec::{
    EnumAutofitColumnsRule, EnumCellPayload, EnumCellValue, EnumFmtKey, SpecAutofitPolicy,
    SpecCellFormat, SpecCellWrite, SpecDestination, SpecExcelWriteOptions, SpecFlushReport,
    SpecSheetReport, SpecUniformStyle,
};
pub use table::{SpecTable, TableSource};
pub use util::{
    compute_column_widths, derive_cell_text, normalize_for_display, plan_cell_write,
    sanitize_sheet_name,
};
pub use writer::{ExcelWriter, FormatSet};
