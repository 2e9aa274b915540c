//! Stateless helper utilities used by the XLSX writer kernel.

use crate::conf::{N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::error::{ExcelWriterError, ExcelWriterResult};
use crate::spec::{
    EnumAutofitColumnsRule, EnumCellPayload, EnumCellValue, EnumFmtKey, SpecAutofitPolicy,
    SpecCellWrite,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueNormalization

/// Round reals to `precision` digits and collapse integral values to integers.
///
/// Integral values beyond the `i64` range become their plain digit text. Text
/// holding an integer literal is coerced as well. Non-finite reals and
/// non-numeric values pass through unchanged.
pub fn normalize_for_display(value: EnumCellValue, precision: usize) -> EnumCellValue {
    match value {
        EnumCellValue::Real(x) => {
            if !x.is_finite() {
                return EnumCellValue::Real(x);
            }
            let x_rounded = round_to_precision(x, precision);
            convert_integral_real(x_rounded).unwrap_or(EnumCellValue::Real(x_rounded))
        }
        EnumCellValue::Text(s) => match s.trim().parse::<i64>() {
            Ok(n) => EnumCellValue::Integer(n),
            Err(_) => EnumCellValue::Text(s),
        },
        other => other,
    }
}

fn round_to_precision(x: f64, precision: usize) -> f64 {
    format!("{x:.precision$}").parse::<f64>().unwrap_or(x)
}

fn convert_integral_real(x: f64) -> Option<EnumCellValue> {
    if x != x.trunc() {
        return None;
    }
    // 2^63 is exactly representable; anything at or above it overflows i64.
    if x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Some(EnumCellValue::Integer(x as i64))
    } else {
        Some(EnumCellValue::Text(format!("{x:.0}")))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellTypeDispatch

/// Select palette format and collaborator payload for one cell.
///
/// Integral values at or above `integer_text_threshold` and all other reals
/// are written as text so the workbook never shows a lossy or
/// locale-dependent rendering.
pub fn plan_cell_write(value: &EnumCellValue, integer_text_threshold: f64) -> SpecCellWrite {
    let (fmt_key, payload) = match value {
        EnumCellValue::Integer(n) if (*n as f64) < integer_text_threshold => {
            (EnumFmtKey::Integer, EnumCellPayload::Number(*n as f64))
        }
        EnumCellValue::Integer(n) => (EnumFmtKey::Data, EnumCellPayload::Text(n.to_string())),
        EnumCellValue::Real(x)
            if x.is_finite() && *x == x.trunc() && *x >= integer_text_threshold =>
        {
            (EnumFmtKey::Data, EnumCellPayload::Text(format!("{x:.0}")))
        }
        EnumCellValue::Real(x) => (EnumFmtKey::Float, EnumCellPayload::Text(derive_real_text(*x))),
        EnumCellValue::Timestamp(dt) => (EnumFmtKey::Timestamp, EnumCellPayload::DateTime(*dt)),
        EnumCellValue::Date(d) => (EnumFmtKey::Date, EnumCellPayload::Date(*d)),
        EnumCellValue::Text(s) => (EnumFmtKey::Data, EnumCellPayload::Text(s.clone())),
        EnumCellValue::Boolean(b) => (EnumFmtKey::Data, EnumCellPayload::Boolean(*b)),
        EnumCellValue::Blank => (EnumFmtKey::Data, EnumCellPayload::Blank),
    };
    SpecCellWrite { fmt_key, payload }
}

/// Text rendering of a real; integral values keep a `.0` suffix.
pub fn derive_real_text(x: f64) -> String {
    let c_text = x.to_string();
    if x.is_finite() && !c_text.contains(['.', 'e', 'E']) {
        format!("{c_text}.0")
    } else {
        c_text
    }
}

/// Raw text of a cell value, used for width inference.
pub fn derive_cell_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::Blank => String::new(),
        EnumCellValue::Integer(n) => n.to_string(),
        EnumCellValue::Real(x) => derive_real_text(*x),
        EnumCellValue::Text(s) => s.clone(),
        EnumCellValue::Boolean(b) => (if *b { "True" } else { "False" }).to_string(),
        EnumCellValue::Date(d) => d.to_string(),
        EnumCellValue::Timestamp(dt) => dt.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnWidthInference

/// Infer one width per column from header and body text lengths.
///
/// The header defines the column count; extra row cells are ignored and missing
/// ones count as empty. Without a header the widest row defines the count.
/// Returns an empty list when autofit is disabled.
pub fn compute_column_widths(
    header: &[String],
    rows: &[Vec<EnumCellValue>],
    policy: &SpecAutofitPolicy,
) -> Vec<usize> {
    let (if_use_header, if_use_body) = match policy.rule_columns {
        EnumAutofitColumnsRule::None => return vec![],
        EnumAutofitColumnsRule::Header => (true, false),
        EnumAutofitColumnsRule::Body => (false, true),
        EnumAutofitColumnsRule::All => (true, true),
    };

    let n_cols = if header.is_empty() {
        rows.iter().map(Vec::len).max().unwrap_or(0)
    } else {
        header.len()
    };

    let mut l_len_by_col = vec![0usize; n_cols];
    if if_use_header {
        for (n_idx_col, c_name) in header.iter().enumerate() {
            l_len_by_col[n_idx_col] = usize::max(l_len_by_col[n_idx_col], c_name.chars().count());
        }
    }
    if if_use_body {
        for row in rows {
            for (n_idx_col, value) in row.iter().take(n_cols).enumerate() {
                let n_len = derive_cell_text(value).chars().count();
                l_len_by_col[n_idx_col] = usize::max(l_len_by_col[n_idx_col], n_len);
            }
        }
    }

    l_len_by_col
        .into_iter()
        .map(|n_len| usize::min(policy.width_cell_max, n_len + policy.width_cell_padding))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IndexCasts

pub fn cast_row_num(value: usize) -> ExcelWriterResult<u32> {
    u32::try_from(value).map_err(|_| ExcelWriterError::RowIndexOverflow(value))
}

pub fn cast_col_num(value: usize) -> ExcelWriterResult<u16> {
    u16::try_from(value).map_err(|_| ExcelWriterError::ColumnIndexOverflow(value))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::conf::N_INTEGER_TEXT_THRESHOLD;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_normalize_rounds_and_collapses_integral_reals() {
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(2.5), 3),
            EnumCellValue::Real(2.5)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(3.0), 3),
            EnumCellValue::Integer(3)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(1.23456), 3),
            EnumCellValue::Real(1.235)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(6.99996), 3),
            EnumCellValue::Integer(7)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(-4.0001), 2),
            EnumCellValue::Integer(-4)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(0.4), 0),
            EnumCellValue::Integer(0)
        );
    }

    #[test]
    fn test_normalize_passes_through_non_numeric_values() {
        let date = ymd(2024, 3, 1);
        assert_eq!(
            normalize_for_display(EnumCellValue::Date(date), 3),
            EnumCellValue::Date(date)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Text("abc".to_string()), 3),
            EnumCellValue::Text("abc".to_string())
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Text("2.5".to_string()), 3),
            EnumCellValue::Text("2.5".to_string())
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Boolean(true), 3),
            EnumCellValue::Boolean(true)
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Blank, 3),
            EnumCellValue::Blank
        );
        assert!(matches!(
            normalize_for_display(EnumCellValue::Real(f64::NAN), 3),
            EnumCellValue::Real(x) if x.is_nan()
        ));
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(f64::INFINITY), 3),
            EnumCellValue::Real(f64::INFINITY)
        );
    }

    #[test]
    fn test_normalize_integral_real_beyond_i64_becomes_digit_text() {
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(1e20), 3),
            EnumCellValue::Text("100000000000000000000".to_string())
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(-1e19), 0),
            EnumCellValue::Text("-10000000000000000000".to_string())
        );
        assert_eq!(
            normalize_for_display(EnumCellValue::Real(9.007_199_254_740_992e15), 3),
            EnumCellValue::Integer(9_007_199_254_740_992)
        );
    }

    #[test]
    fn test_normalize_coerces_integer_text() {
        assert_eq!(
            normalize_for_display(EnumCellValue::Text(" 42 ".to_string()), 3),
            EnumCellValue::Integer(42)
        );
    }

    #[test]
    fn test_plan_cell_write_precedence() {
        let threshold = N_INTEGER_TEXT_THRESHOLD;

        assert_eq!(
            plan_cell_write(&EnumCellValue::Integer(42), threshold),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Integer,
                payload: EnumCellPayload::Number(42.0),
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Integer(999_999_999_999_999), threshold).fmt_key,
            EnumFmtKey::Integer
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Integer(1_000_000_000_000_000), threshold),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Data,
                payload: EnumCellPayload::Text("1000000000000000".to_string()),
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Real(2.5), threshold),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Float,
                payload: EnumCellPayload::Text("2.5".to_string()),
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Text("x".to_string()), threshold).fmt_key,
            EnumFmtKey::Data
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Blank, threshold),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Data,
                payload: EnumCellPayload::Blank,
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Boolean(false), threshold).payload,
            EnumCellPayload::Boolean(false)
        );
    }

    #[test]
    fn test_plan_cell_write_integral_real_at_threshold_is_data_text() {
        assert_eq!(
            plan_cell_write(&EnumCellValue::Real(1e20), N_INTEGER_TEXT_THRESHOLD),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Data,
                payload: EnumCellPayload::Text("100000000000000000000".to_string()),
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Real(3.0), N_INTEGER_TEXT_THRESHOLD),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Float,
                payload: EnumCellPayload::Text("3.0".to_string()),
            }
        );
        assert_eq!(
            plan_cell_write(&EnumCellValue::Real(f64::INFINITY), N_INTEGER_TEXT_THRESHOLD).fmt_key,
            EnumFmtKey::Float
        );
    }

    #[test]
    fn test_plan_cell_write_dates_keep_calendar_values() {
        let date = ymd(2024, 1, 1);
        assert_eq!(
            plan_cell_write(&EnumCellValue::Date(date), N_INTEGER_TEXT_THRESHOLD),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Date,
                payload: EnumCellPayload::Date(date),
            }
        );

        let datetime = date.and_hms_opt(12, 0, 0).expect("valid time");
        assert_eq!(
            plan_cell_write(&EnumCellValue::Timestamp(datetime), N_INTEGER_TEXT_THRESHOLD),
            SpecCellWrite {
                fmt_key: EnumFmtKey::Timestamp,
                payload: EnumCellPayload::DateTime(datetime),
            }
        );
    }

    #[test]
    fn test_derive_cell_text() {
        assert_eq!(derive_cell_text(&EnumCellValue::Real(3.0)), "3.0");
        assert_eq!(derive_cell_text(&EnumCellValue::Real(2.5)), "2.5");
        assert_eq!(derive_cell_text(&EnumCellValue::Integer(-12)), "-12");
        assert_eq!(derive_cell_text(&EnumCellValue::Blank), "");
        assert_eq!(derive_cell_text(&EnumCellValue::Boolean(true)), "True");
        assert_eq!(
            derive_cell_text(&EnumCellValue::Date(ymd(2024, 5, 17))),
            "2024-05-17"
        );
        assert_eq!(
            derive_cell_text(&EnumCellValue::Timestamp(
                ymd(2024, 5, 17).and_hms_opt(8, 30, 0).expect("valid time")
            )),
            "2024-05-17 08:30:00"
        );
    }

    #[test]
    fn test_compute_column_widths_uses_header_and_body() {
        let header = vec!["id".to_string(), "amount".to_string()];
        let rows = vec![
            vec![EnumCellValue::Integer(1), EnumCellValue::Real(2.5)],
            vec![EnumCellValue::Integer(2), EnumCellValue::Integer(3)],
        ];

        assert_eq!(
            compute_column_widths(&header, &rows, &SpecAutofitPolicy::default()),
            vec![3, 7]
        );
    }

    #[test]
    fn test_compute_column_widths_caps_long_text() {
        let header = vec!["note".to_string()];
        let rows = vec![vec![EnumCellValue::Text("x".repeat(200))]];

        assert_eq!(
            compute_column_widths(&header, &rows, &SpecAutofitPolicy::default()),
            vec![45]
        );
    }

    #[test]
    fn test_compute_column_widths_clamps_ragged_rows_to_header() {
        let header = vec!["a".to_string(), "bb".to_string(), "c".to_string()];
        let rows = vec![
            vec![EnumCellValue::Text("abcd".to_string())],
            vec![
                EnumCellValue::Blank,
                EnumCellValue::Blank,
                EnumCellValue::Blank,
                EnumCellValue::Text("ignored extra cell".to_string()),
            ],
        ];

        assert_eq!(
            compute_column_widths(&header, &rows, &SpecAutofitPolicy::default()),
            vec![5, 3, 2]
        );
    }

    #[test]
    fn test_compute_column_widths_without_header_uses_widest_row() {
        let rows = vec![
            vec![EnumCellValue::Integer(7)],
            vec![EnumCellValue::Integer(10), EnumCellValue::Text("xyz".to_string())],
        ];

        assert_eq!(
            compute_column_widths(&[], &rows, &SpecAutofitPolicy::default()),
            vec![3, 4]
        );
    }

    #[test]
    fn test_compute_column_widths_respects_rule() {
        let header = vec!["h".to_string()];
        let rows = vec![vec![EnumCellValue::Text("long body".to_string())]];

        let policy_header = SpecAutofitPolicy {
            rule_columns: EnumAutofitColumnsRule::Header,
            ..Default::default()
        };
        assert_eq!(compute_column_widths(&header, &rows, &policy_header), vec![2]);

        let policy_none = SpecAutofitPolicy {
            rule_columns: EnumAutofitColumnsRule::None,
            ..Default::default()
        };
        assert!(compute_column_widths(&header, &rows, &policy_none).is_empty());
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(sanitize_sheet_name(&"n".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_cast_index_overflow() {
        assert_eq!(cast_col_num(3).ok(), Some(3u16));
        assert!(matches!(
            cast_col_num(70_000),
            Err(ExcelWriterError::ColumnIndexOverflow(70_000))
        ));
    }
}
