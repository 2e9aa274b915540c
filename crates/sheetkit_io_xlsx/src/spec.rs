//! Shared XLSX specification models.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::conf::{
    C_FONT_NAME_DEFAULT, N_FONT_SIZE_DEFAULT, N_INTEGER_TEXT_THRESHOLD, N_PRECISION_DEFAULT,
    N_WIDTH_COL_MAX, N_WIDTH_COL_PADDING, TUP_FREEZE_CELL,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Scalar cell value buffered for a destination.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Missing/blank value.
    Blank,
    /// Integral number.
    Integer(i64),
    /// Real (floating-point) number.
    Real(f64),
    /// Text value.
    Text(String),
    /// Boolean value.
    Boolean(bool),
    /// Date without time of day.
    Date(NaiveDate),
    /// Date with time of day.
    Timestamp(NaiveDateTime),
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnumCellValue {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for EnumCellValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for EnumCellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<EnumCellValue>> From<Option<T>> for EnumCellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Blank, Into::into)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Destination

/// Output location of buffered rows: one sheet inside one file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecDestination {
    /// Output workbook path.
    pub file: PathBuf,
    /// Caller-facing sheet name (sanitized only when written).
    pub sheet: String,
}

impl SpecDestination {
    pub fn new(file: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sheet: sheet.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl fmt::Display for SpecDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.file.display(), self.sheet)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Format palette categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumFmtKey {
    /// Bold centered header cell.
    Header,
    /// Plain data cell.
    Data,
    /// Integer number (`0`).
    Integer,
    /// Two-decimal number (`0.00`).
    Float,
    /// Date and time of day.
    Timestamp,
    /// Centered with border.
    Center,
    /// Date-only with border.
    Date,
    /// Left-aligned with border.
    Left,
    /// Percentage (`0.00%`) with border.
    Percentage,
    /// Plain bordered cell.
    Border,
    /// Two-decimal bordered cell.
    BorderDecimal,
}

impl EnumFmtKey {
    /// Every palette category, in palette order.
    pub const ALL: [EnumFmtKey; 11] = [
        EnumFmtKey::Header,
        EnumFmtKey::Data,
        EnumFmtKey::Integer,
        EnumFmtKey::Float,
        EnumFmtKey::Timestamp,
        EnumFmtKey::Center,
        EnumFmtKey::Date,
        EnumFmtKey::Left,
        EnumFmtKey::Percentage,
        EnumFmtKey::Border,
        EnumFmtKey::BorderDecimal,
    ];
}

/// Cell format specification, converted to a `rust_xlsxwriter::Format` per file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
}

impl SpecCellFormat {
    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
        }
    }
}

/// Styling applied uniformly to every palette format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecUniformStyle {
    pub font_name: String,
    pub font_size: i64,
}

impl Default for SpecUniformStyle {
    fn default() -> Self {
        Self {
            font_name: C_FONT_NAME_DEFAULT.to_string(),
            font_size: N_FONT_SIZE_DEFAULT,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellWritePlan

/// Collaborator call selected for one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellPayload {
    /// Blank cell carrying only a format.
    Blank,
    /// Native numeric cell.
    Number(f64),
    /// Text cell.
    Text(String),
    /// Native boolean cell.
    Boolean(bool),
    /// Date cell, converted to an Excel serial by the collaborator.
    Date(NaiveDate),
    /// Date and time cell, converted to an Excel serial by the collaborator.
    DateTime(NaiveDateTime),
}

/// Result of type dispatch for one cell value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCellWrite {
    /// Palette format to apply.
    pub fmt_key: EnumFmtKey,
    /// Value to write.
    pub payload: EnumCellPayload,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit rule for column width inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumAutofitColumnsRule {
    /// Disable autofit.
    None,
    /// Infer width from header cells only.
    Header,
    /// Infer width from body cells only.
    Body,
    /// Infer width from both header and body cells (default).
    #[default]
    All,
}

/// Autofit policy applied to every flushed sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitPolicy {
    /// Autofit width inference rule.
    pub rule_columns: EnumAutofitColumnsRule,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitPolicy {
    fn default() -> Self {
        Self {
            rule_columns: EnumAutofitColumnsRule::All,
            width_cell_max: N_WIDTH_COL_MAX,
            width_cell_padding: N_WIDTH_COL_PADDING,
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecExcelWriteOptions {
    /// Decimal digits kept when ingesting tables.
    pub precision_default: usize,
    /// Integers at or above this value are written as text.
    pub integer_text_threshold: f64,
    /// Column width inference policy.
    pub policy_autofit: SpecAutofitPolicy,
    /// Font styling shared by every palette format.
    pub uniform_style: SpecUniformStyle,
    /// Frozen rows above the split.
    pub freeze_row: usize,
    /// Frozen columns left of the split.
    pub freeze_col: usize,
    /// Reject rows whose length differs from the declared header.
    pub if_reject_ragged_rows: bool,
}

impl Default for SpecExcelWriteOptions {
    fn default() -> Self {
        Self {
            precision_default: N_PRECISION_DEFAULT,
            integer_text_threshold: N_INTEGER_TEXT_THRESHOLD,
            policy_autofit: SpecAutofitPolicy::default(),
            uniform_style: SpecUniformStyle::default(),
            freeze_row: TUP_FREEZE_CELL.0,
            freeze_col: TUP_FREEZE_CELL.1,
            if_reject_ragged_rows: false,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One worksheet materialized by `flush`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetReport {
    /// Output workbook path.
    pub file: PathBuf,
    /// Actual sheet name in workbook.
    pub sheet_name: String,
    /// Zero-based header row.
    pub row_header: usize,
    /// Number of data rows written.
    pub n_rows: usize,
    /// Applied column widths (empty when autofit is disabled).
    pub widths: Vec<usize>,
    /// Frozen pane anchor `(row, col)`.
    pub freeze: (usize, usize),
}

/// Outcome of one `flush` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFlushReport {
    /// Sheets written, in destination creation order.
    pub sheets: Vec<SpecSheetReport>,
    /// Files saved, each exactly once.
    pub files_closed: Vec<PathBuf>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecFlushReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
