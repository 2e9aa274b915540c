//! Buffered writer session: rows are collected per (file, sheet) destination
//! and materialized into workbooks by a single terminal [`ExcelWriter::flush`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use polars::prelude::DataFrame;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, derive_default_palette};
use crate::error::{ExcelWriterError, ExcelWriterResult};
use crate::spec::{
    EnumCellPayload, EnumCellValue, EnumFmtKey, SpecCellFormat, SpecCellWrite, SpecDestination,
    SpecExcelWriteOptions, SpecFlushReport, SpecSheetReport, SpecUniformStyle,
};
use crate::table::{TableSource, derive_dataframe_from_ipc_bytes};
use crate::util::{
    cast_col_num, cast_row_num, compute_column_widths, normalize_for_display, plan_cell_write,
    sanitize_sheet_name,
};

////////////////////////////////////////////////////////////////////////////////
// #region FormatCatalog

/// Palette formats bound to one output file.
#[derive(Debug, Clone)]
pub struct FormatSet {
    /// Indexed by `EnumFmtKey` discriminant.
    l_fmt: Vec<Format>,
}

impl FormatSet {
    fn new(style: &SpecUniformStyle) -> Self {
        // BTreeMap iteration follows `EnumFmtKey` declaration order.
        let l_fmt = derive_default_palette(style)
            .values()
            .map(derive_rust_xlsx_format)
            .collect();
        Self { l_fmt }
    }

    /// Format for one palette category.
    pub fn format(&self, key: EnumFmtKey) -> &Format {
        &self.l_fmt[key as usize]
    }

    pub fn len(&self) -> usize {
        self.l_fmt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_fmt.is_empty()
    }
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    if border > 0 {
        FormatBorder::Thin
    } else {
        FormatBorder::None
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileHandleTable

/// One output workbook, saved exactly once.
struct ExcelBook {
    path_file_out: PathBuf,
    workbook: Workbook,
    formats: FormatSet,
    /// Lowercased names; Excel compares sheet names case-insensitively.
    set_sheet_names_existing: BTreeSet<String>,
    n_sheets: usize,
    if_closed: bool,
}

impl ExcelBook {
    fn new(path_file_out: PathBuf, style: &SpecUniformStyle) -> Self {
        Self {
            path_file_out,
            workbook: Workbook::new(),
            formats: FormatSet::new(style),
            set_sheet_names_existing: BTreeSet::new(),
            n_sheets: 0,
            if_closed: false,
        }
    }

    /// Add a worksheet; returns its index and final name.
    fn add_sheet(&mut self, name: &str) -> ExcelWriterResult<(usize, String)> {
        let sheet_name_unique = self.derive_unique_sheet_name(&sanitize_sheet_name(name, "_"));
        let worksheet = self.workbook.add_worksheet();
        let n_idx_worksheet = self.n_sheets;
        self.n_sheets += 1;
        worksheet.set_name(&sheet_name_unique)?;
        Ok((n_idx_worksheet, sheet_name_unique))
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_lowercase()) {
            return name.to_string();
        }

        // The suffix is kept whole; only the base is shortened to fit.
        let mut n_idx = 2usize;
        loop {
            let suffix = format!("__{n_idx}");
            let n_len_base = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(suffix.chars().count());
            let base_name: String = name.chars().take(n_len_base).collect();
            let candidate = format!("{base_name}{suffix}");
            if self.set_sheet_names_existing.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n_idx += 1;
        }
    }

    /// Create the parent directory and save. Returns `false` if already closed.
    ///
    /// The handle is marked closed before saving, so a failed save is never
    /// retried on the same handle.
    fn close(&mut self) -> ExcelWriterResult<bool> {
        if self.if_closed {
            return Ok(false);
        }
        self.if_closed = true;

        if let Some(path_dir) = self.path_file_out.parent()
            && !path_dir.as_os_str().is_empty()
            && !path_dir.exists()
        {
            debug!("creating output directory {}", path_dir.display());
            fs::create_dir_all(path_dir).map_err(|source| ExcelWriterError::CreateDir {
                path: path_dir.to_path_buf(),
                source,
            })?;
        }

        self.workbook.save(&self.path_file_out)?;
        Ok(true)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DestinationRegistry

/// Buffered state of one destination.
struct DestinationState {
    destination: SpecDestination,
    n_idx_book: usize,
    n_idx_worksheet: usize,
    sheet_name: String,
    header: Option<Vec<String>>,
    start_row: Option<usize>,
    rows: Vec<Vec<EnumCellValue>>,
}

impl DestinationState {
    fn header(&self) -> &[String] {
        self.header.as_deref().unwrap_or(&[])
    }
}

/// Stateful multi-file workbook writer.
///
/// Nothing touches the filesystem until [`Self::flush`], after which the
/// writer is terminal.
pub struct ExcelWriter {
    write_options: SpecExcelWriteOptions,
    l_books: Vec<ExcelBook>,
    dict_idx_book: BTreeMap<PathBuf, usize>,
    l_destinations: Vec<DestinationState>,
    dict_idx_destination: BTreeMap<SpecDestination, usize>,
    report: SpecFlushReport,
    if_flushed: bool,
}

impl Default for ExcelWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelWriter {
    /// Create writer with default options.
    pub fn new() -> Self {
        Self {
            write_options: SpecExcelWriteOptions::default(),
            l_books: Vec::new(),
            dict_idx_book: BTreeMap::new(),
            l_destinations: Vec::new(),
            dict_idx_destination: BTreeMap::new(),
            report: SpecFlushReport::default(),
            if_flushed: false,
        }
    }

    /// Create writer with validated options.
    pub fn with_options(write_options: SpecExcelWriteOptions) -> ExcelWriterResult<Self> {
        validate_write_options(&write_options)?;
        Ok(Self {
            write_options,
            ..Self::new()
        })
    }

    pub fn options(&self) -> &SpecExcelWriteOptions {
        &self.write_options
    }

    /// Whether [`Self::flush`] has been called.
    pub fn is_flushed(&self) -> bool {
        self.if_flushed
    }

    /// Return snapshot of the last flush report.
    pub fn report(&self) -> SpecFlushReport {
        self.report.clone()
    }

    /// Address an output file, creating its handle and format set on first use.
    ///
    /// The file is written at flush even if no sheet is ever added to it.
    pub fn open_book(&mut self, file: impl AsRef<Path>) -> ExcelWriterResult<&FormatSet> {
        self.ensure_formats(file)
    }

    /// Return the format set of `file`, building it once.
    pub fn ensure_formats(&mut self, file: impl AsRef<Path>) -> ExcelWriterResult<&FormatSet> {
        let n_idx_book = self.get_or_create_book(file.as_ref())?;
        Ok(&self.l_books[n_idx_book].formats)
    }

    /// Address a destination, creating its sheet on first use.
    pub fn open_sheet(&mut self, destination: &SpecDestination) -> ExcelWriterResult<()> {
        self.get_or_create_destination(destination).map(|_| ())
    }

    /// Set header fields and header row; each is only set by its first call.
    pub fn declare_header<I, S>(
        &mut self,
        destination: &SpecDestination,
        fields: I,
        start_row: usize,
    ) -> ExcelWriterResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let n_idx = self.get_or_create_destination(destination)?;
        let state = &mut self.l_destinations[n_idx];
        if state.header.is_none() {
            state.header = Some(fields.into_iter().map(Into::into).collect());
        }
        if state.start_row.is_none() {
            state.start_row = Some(start_row);
        }
        Ok(())
    }

    /// Set only the header row (first call wins).
    pub fn declare_start_row(
        &mut self,
        destination: &SpecDestination,
        start_row: usize,
    ) -> ExcelWriterResult<()> {
        let n_idx = self.get_or_create_destination(destination)?;
        let state = &mut self.l_destinations[n_idx];
        if state.start_row.is_none() {
            state.start_row = Some(start_row);
        }
        Ok(())
    }

    /// Buffer one row.
    ///
    /// Row length is not checked against the header unless
    /// `if_reject_ragged_rows` is set; ragged rows are written as-is.
    pub fn append_row(
        &mut self,
        destination: &SpecDestination,
        row: Vec<EnumCellValue>,
    ) -> ExcelWriterResult<()> {
        let n_idx = self.get_or_create_destination(destination)?;
        let state = &mut self.l_destinations[n_idx];

        if self.write_options.if_reject_ragged_rows
            && let Some(header) = &state.header
            && header.len() != row.len()
        {
            return Err(ExcelWriterError::RaggedRow {
                destination: destination.to_string(),
                n_len_row: row.len(),
                n_len_header: header.len(),
            });
        }

        state.rows.push(row);
        Ok(())
    }

    /// Buffer several rows in order.
    pub fn append_rows<I>(&mut self, destination: &SpecDestination, rows: I) -> ExcelWriterResult<()>
    where
        I: IntoIterator<Item = Vec<EnumCellValue>>,
    {
        for row in rows {
            self.append_row(destination, row)?;
        }
        Ok(())
    }

    /// Ingest a table with the default precision.
    pub fn ingest_table<T>(
        &mut self,
        table: &T,
        destination: &SpecDestination,
    ) -> ExcelWriterResult<()>
    where
        T: TableSource + ?Sized,
    {
        let precision = self.write_options.precision_default;
        self.ingest_table_with_precision(table, destination, precision)
    }

    /// Declare the header from the table's columns, then buffer every record
    /// after rounding it with [`normalize_for_display`].
    pub fn ingest_table_with_precision<T>(
        &mut self,
        table: &T,
        destination: &SpecDestination,
        precision: usize,
    ) -> ExcelWriterResult<()>
    where
        T: TableSource + ?Sized,
    {
        let l_records = table.records()?;
        self.declare_header(destination, table.column_names(), 0)?;
        for record in l_records {
            let row = record
                .into_iter()
                .map(|value| normalize_for_display(value, precision))
                .collect();
            self.append_row(destination, row)?;
        }
        Ok(())
    }

    /// Ingest an in-memory dataframe.
    pub fn ingest_dataframe(
        &mut self,
        df: &DataFrame,
        destination: &SpecDestination,
        precision: usize,
    ) -> ExcelWriterResult<()> {
        self.ingest_table_with_precision(df, destination, precision)
    }

    /// Ingest a dataframe from Polars IPC bytes.
    pub fn ingest_ipc_bytes(
        &mut self,
        v_ipc_df: &[u8],
        destination: &SpecDestination,
        precision: usize,
    ) -> ExcelWriterResult<()> {
        let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
        self.ingest_dataframe(&df, destination, precision)
    }

    /// Destinations in creation order.
    pub fn destinations(&self) -> impl Iterator<Item = &SpecDestination> {
        self.l_destinations.iter().map(|state| &state.destination)
    }

    pub fn header(&self, destination: &SpecDestination) -> Option<&[String]> {
        self.find_destination(destination)
            .and_then(|state| state.header.as_deref())
    }

    /// Header row of a known destination (0 unless declared).
    pub fn start_row(&self, destination: &SpecDestination) -> Option<usize> {
        self.find_destination(destination)
            .map(|state| state.start_row.unwrap_or(0))
    }

    pub fn rows(&self, destination: &SpecDestination) -> Option<&[Vec<EnumCellValue>]> {
        self.find_destination(destination)
            .map(|state| state.rows.as_slice())
    }

    /// Worksheet name used in the file (sanitized, de-duplicated).
    pub fn sheet_name(&self, destination: &SpecDestination) -> Option<&str> {
        self.find_destination(destination)
            .map(|state| state.sheet_name.as_str())
    }

    /// Column widths the destination would get at flush.
    pub fn compute_widths(&self, destination: &SpecDestination) -> Option<Vec<usize>> {
        self.find_destination(destination).map(|state| {
            compute_column_widths(
                state.header(),
                &state.rows,
                &self.write_options.policy_autofit,
            )
        })
    }

    /// Write every buffered destination, then save every file exactly once.
    ///
    /// Destinations are written in creation order. The writer is terminal
    /// afterwards, also when an I/O error aborts the flush; calling `flush`
    /// again returns the stored report without touching any file.
    pub fn flush(&mut self) -> ExcelWriterResult<SpecFlushReport> {
        if self.if_flushed {
            warn!("flush() called on an already flushed writer; ignoring");
            return Ok(self.report.clone());
        }
        self.if_flushed = true;

        let mut report = SpecFlushReport::default();

        for state in &self.l_destinations {
            if state.header().is_empty() && state.rows.is_empty() {
                continue;
            }
            let book = &mut self.l_books[state.n_idx_book];
            write_destination(book, state, &self.write_options, &mut report)?;
        }

        for book in &mut self.l_books {
            if book.close()? {
                info!("saved {}", book.path_file_out.display());
                report.files_closed.push(book.path_file_out.clone());
            }
        }

        self.report = report.clone();
        Ok(report)
    }

    fn find_destination(&self, destination: &SpecDestination) -> Option<&DestinationState> {
        self.dict_idx_destination
            .get(destination)
            .map(|n_idx| &self.l_destinations[*n_idx])
    }

    fn get_or_create_book(&mut self, file: &Path) -> ExcelWriterResult<usize> {
        if self.if_flushed {
            return Err(ExcelWriterError::Flushed);
        }
        if let Some(n_idx) = self.dict_idx_book.get(file) {
            return Ok(*n_idx);
        }

        debug!("opening workbook {}", file.display());
        let n_idx = self.l_books.len();
        self.l_books.push(ExcelBook::new(
            file.to_path_buf(),
            &self.write_options.uniform_style,
        ));
        self.dict_idx_book.insert(file.to_path_buf(), n_idx);
        Ok(n_idx)
    }

    fn get_or_create_destination(
        &mut self,
        destination: &SpecDestination,
    ) -> ExcelWriterResult<usize> {
        if self.if_flushed {
            return Err(ExcelWriterError::Flushed);
        }
        if let Some(n_idx) = self.dict_idx_destination.get(destination) {
            return Ok(*n_idx);
        }

        let n_idx_book = self.get_or_create_book(&destination.file)?;
        let (n_idx_worksheet, sheet_name) = self.l_books[n_idx_book].add_sheet(&destination.sheet)?;
        debug!("registered destination {destination} as sheet {sheet_name:?}");

        let n_idx = self.l_destinations.len();
        self.l_destinations.push(DestinationState {
            destination: destination.clone(),
            n_idx_book,
            n_idx_worksheet,
            sheet_name,
            header: None,
            start_row: None,
            rows: Vec::new(),
        });
        self.dict_idx_destination.insert(destination.clone(), n_idx);
        Ok(n_idx)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOrchestrator

fn validate_write_options(write_options: &SpecExcelWriteOptions) -> ExcelWriterResult<()> {
    if write_options.policy_autofit.width_cell_max == 0 {
        return Err(ExcelWriterError::InvalidOption(
            "policy_autofit.width_cell_max must be >= 1.".to_string(),
        ));
    }
    if write_options.policy_autofit.width_cell_max > 255 {
        return Err(ExcelWriterError::InvalidOption(
            "policy_autofit.width_cell_max must be <= 255.".to_string(),
        ));
    }
    let n_threshold = write_options.integer_text_threshold;
    if n_threshold.is_nan() || n_threshold <= 0.0 {
        return Err(ExcelWriterError::InvalidOption(
            "integer_text_threshold must be > 0.".to_string(),
        ));
    }
    if write_options.uniform_style.font_size <= 0 {
        return Err(ExcelWriterError::InvalidOption(
            "uniform_style.font_size must be > 0.".to_string(),
        ));
    }
    Ok(())
}

/// Header, freeze panes, data rows, then column widths for one destination.
fn write_destination(
    book: &mut ExcelBook,
    state: &DestinationState,
    write_options: &SpecExcelWriteOptions,
    report: &mut SpecFlushReport,
) -> ExcelWriterResult<()> {
    let ExcelBook {
        path_file_out,
        workbook,
        formats,
        ..
    } = book;
    let worksheet = workbook.worksheet_from_index(state.n_idx_worksheet)?;

    let header = state.header();
    let n_row_header = state.start_row.unwrap_or(0);
    write_header(worksheet, n_row_header, header, formats.format(EnumFmtKey::Header))?;

    worksheet.set_freeze_panes(
        cast_row_num(write_options.freeze_row)?,
        cast_col_num(write_options.freeze_col)?,
    )?;

    let mut n_rows_ragged = 0usize;
    for (n_idx_row, row) in state.rows.iter().enumerate() {
        if !header.is_empty() && row.len() != header.len() {
            n_rows_ragged += 1;
        }
        for (n_idx_col, value) in row.iter().enumerate() {
            write_cell_with_format(
                worksheet,
                n_row_header + 1 + n_idx_row,
                n_idx_col,
                value,
                formats,
                write_options.integer_text_threshold,
            )?;
        }
    }
    if n_rows_ragged > 0 {
        let c_msg = format!(
            "{}: {n_rows_ragged} row(s) differ from header length {}",
            state.destination,
            header.len()
        );
        warn!("{c_msg}");
        report.warn(c_msg);
    }

    let l_widths = compute_column_widths(header, &state.rows, &write_options.policy_autofit);
    for (n_idx_col, n_width) in l_widths.iter().enumerate() {
        worksheet.set_column_width(cast_col_num(n_idx_col)?, *n_width as f64)?;
    }

    info!(
        "wrote sheet {:?} of {} ({} rows)",
        state.sheet_name,
        path_file_out.display(),
        state.rows.len()
    );
    report.sheets.push(SpecSheetReport {
        file: path_file_out.clone(),
        sheet_name: state.sheet_name.clone(),
        row_header: n_row_header,
        n_rows: state.rows.len(),
        widths: l_widths,
        freeze: (write_options.freeze_row, write_options.freeze_col),
    });
    Ok(())
}

fn write_header(
    worksheet: &mut Worksheet,
    row_idx: usize,
    header: &[String],
    fmt_header: &Format,
) -> ExcelWriterResult<()> {
    let n_row = cast_row_num(row_idx)?;
    for (col_idx, cell_value) in header.iter().enumerate() {
        let n_col = cast_col_num(col_idx)?;
        if cell_value.is_empty() {
            worksheet.write_blank(n_row, n_col, fmt_header)?;
        } else {
            worksheet.write_string_with_format(n_row, n_col, cell_value, fmt_header)?;
        }
    }
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    formats: &FormatSet,
    integer_text_threshold: f64,
) -> ExcelWriterResult<()> {
    let SpecCellWrite { fmt_key, payload } = plan_cell_write(value, integer_text_threshold);
    let format = formats.format(fmt_key);
    let (n_row, n_col) = (cast_row_num(row_idx)?, cast_col_num(col_idx)?);

    match payload {
        EnumCellPayload::Blank => worksheet.write_blank(n_row, n_col, format)?,
        EnumCellPayload::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, val, format)?
        }
        EnumCellPayload::Text(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?
        }
        EnumCellPayload::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, val, format)?
        }
        EnumCellPayload::Date(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, &val, format)?
        }
        EnumCellPayload::DateTime(val) => {
            worksheet.write_datetime_with_format(n_row, n_col, &val, format)?
        }
    };
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
