//! XLSX constants and default preset factories.

use std::collections::BTreeMap;

use crate::spec::{EnumFmtKey, SpecCellFormat, SpecUniformStyle};

/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Default number of decimal digits kept by ingestion-time rounding.
pub const N_PRECISION_DEFAULT: usize = 3;
/// Integers at or above this magnitude are written as text.
pub const N_INTEGER_TEXT_THRESHOLD: f64 = 1e15;
/// Upper bound for inferred column widths.
pub const N_WIDTH_COL_MAX: usize = 45;
/// Padding added to the longest cell text of a column.
pub const N_WIDTH_COL_PADDING: usize = 1;
/// Frozen pane anchor (row, column): header row and first column stay visible.
pub const TUP_FREEZE_CELL: (usize, usize) = (1, 1);

/// Font face applied to every palette format.
pub const C_FONT_NAME_DEFAULT: &str = "Arial";
/// Font size applied to every palette format.
pub const N_FONT_SIZE_DEFAULT: i64 = 10;

/// Number format of timestamp cells.
pub const C_NUM_FORMAT_TIMESTAMP: &str = "yyyy-m-d h:mm;@";
/// Number format of date cells.
pub const C_NUM_FORMAT_DATE: &str = "yyyy-mm-dd";

/// Unstyled palette entry for `key`, before the uniform styling pass.
fn derive_palette_base(key: EnumFmtKey) -> SpecCellFormat {
    let with_border = |spec: SpecCellFormat| SpecCellFormat {
        border: Some(1),
        ..spec
    };

    match key {
        EnumFmtKey::Header => SpecCellFormat {
            bold: Some(true),
            align: Some("center".to_string()),
            ..Default::default()
        },
        EnumFmtKey::Data => SpecCellFormat::default(),
        EnumFmtKey::Integer => SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        },
        EnumFmtKey::Float => SpecCellFormat {
            num_format: Some("0.00".to_string()),
            ..Default::default()
        },
        EnumFmtKey::Timestamp => SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_TIMESTAMP.to_string()),
            ..Default::default()
        },
        EnumFmtKey::Center => with_border(SpecCellFormat {
            align: Some("center".to_string()),
            ..Default::default()
        }),
        EnumFmtKey::Date => with_border(SpecCellFormat {
            num_format: Some(C_NUM_FORMAT_DATE.to_string()),
            align: Some("left".to_string()),
            ..Default::default()
        }),
        EnumFmtKey::Left => with_border(SpecCellFormat {
            align: Some("left".to_string()),
            ..Default::default()
        }),
        EnumFmtKey::Percentage => with_border(SpecCellFormat {
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        }),
        EnumFmtKey::Border => with_border(SpecCellFormat::default()),
        EnumFmtKey::BorderDecimal => with_border(SpecCellFormat {
            num_format: Some("0.00".to_string()),
            ..Default::default()
        }),
    }
}

/// Build the fixed format palette.
///
/// Every entry is overlaid with `style` (font face, font size, vertical
/// centering, text wrap); this function is the only palette constructor.
pub fn derive_default_palette(style: &SpecUniformStyle) -> BTreeMap<EnumFmtKey, SpecCellFormat> {
    let fmt_uniform = SpecCellFormat {
        font_name: Some(style.font_name.clone()),
        font_size: Some(style.font_size),
        valign: Some("vcenter".to_string()),
        text_wrap: Some(true),
        ..Default::default()
    };

    EnumFmtKey::ALL
        .iter()
        .map(|key| (*key, derive_palette_base(*key).merge(&fmt_uniform)))
        .collect()
}
