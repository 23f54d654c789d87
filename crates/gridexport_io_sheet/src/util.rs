//! Stateless helpers shared by the builders and writers.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::conf::{N_LEN_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::spec::{EnumCellValue, ExportError, Result, SpecTabularDocument};

////////////////////////////////////////////////////////////////////////////////
// #region CellValueConversion

/// Render a cell value as plain text (CSV cells, template output).
pub fn convert_cell_value_to_text(value: &EnumCellValue) -> String {
    match value {
        EnumCellValue::None => String::new(),
        EnumCellValue::Boolean(val) => if *val { "TRUE" } else { "FALSE" }.to_string(),
        EnumCellValue::Integer(val) => val.to_string(),
        EnumCellValue::Number(val) => val.to_string(),
        EnumCellValue::String(val) => val.clone(),
        EnumCellValue::Date(val) => val.format("%Y-%m-%d").to_string(),
        EnumCellValue::DateTime(val) => val.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// Excel 1900-system serial day number of `date`.
///
/// Dates before 1900-03-01 come out one higher than Excel's, which counts a
/// 1900-02-29 that never existed.
pub fn convert_date_to_excel_serial(date: NaiveDate) -> f64 {
    // 1899-12-30 absorbs Excel's phantom 1900-02-29.
    let Some(date_epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return 0.0;
    };
    (date - date_epoch).num_days() as f64
}

/// Excel 1900-system serial number (day plus day fraction) of `datetime`.
pub fn convert_datetime_to_excel_serial(datetime: NaiveDateTime) -> f64 {
    let n_seconds = f64::from(datetime.num_seconds_from_midnight())
        + f64::from(datetime.nanosecond()) / 1_000_000_000.0;
    convert_date_to_excel_serial(datetime.date()) + n_seconds / 86_400.0
}

/// Longest prefix of `text` that fits an Excel cell, cut on a character boundary.
pub fn truncate_cell_text(text: &str) -> &str {
    let mut n_units = 0;
    for (n_idx_byte, chr) in text.char_indices() {
        n_units += chr.len_utf16();
        if n_units > N_LEN_CELL_TEXT_MAX {
            return &text[..n_idx_byte];
        }
    }
    text
}

/// Cap string cells at Excel's cell text limit; other values pass through.
pub fn clamp_cell_value(value: EnumCellValue) -> EnumCellValue {
    match value {
        EnumCellValue::String(val) if val.len() > N_LEN_CELL_TEXT_MAX => {
            EnumCellValue::String(truncate_cell_text(&val).to_string())
        }
        other => other,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Labels

/// Derive a human-readable label from a field name.
///
/// `FirstName` -> `First Name`, `HTMLTitle` -> `HTML Title`, `Author.Name` -> `Author Name`.
pub fn derive_label_from_field_name(name: &str) -> String {
    let l_chars: Vec<char> = name.chars().collect();
    let mut c_label = String::with_capacity(name.len() + 4);

    for (n_idx, chr) in l_chars.iter().copied().enumerate() {
        if chr == '.' || chr == '_' {
            if !c_label.ends_with(' ') && !c_label.is_empty() {
                c_label.push(' ');
            }
            continue;
        }
        if n_idx > 0 && chr.is_uppercase() {
            let chr_prev = l_chars[n_idx - 1];
            let if_after_lower = chr_prev.is_lowercase() || chr_prev.is_ascii_digit();
            let if_acronym_end = chr_prev.is_uppercase()
                && l_chars
                    .get(n_idx + 1)
                    .is_some_and(|chr_next| chr_next.is_lowercase());
            if (if_after_lower || if_acronym_end) && !c_label.ends_with(' ') {
                c_label.push(' ');
            }
        }
        c_label.push(chr);
    }

    c_label.trim().to_string()
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
    c_name = c_name.trim().trim_matches('\'').to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    let c_name: String = c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect();
    c_name.trim_end().trim_end_matches('\'').to_string()
}

/// Fail when the document does not fit a worksheet of the given size.
pub fn validate_grid_limits(
    doc: &SpecTabularDocument,
    n_rows_max: usize,
    n_cols_max: usize,
    format_name: &str,
) -> Result<()> {
    if doc.height() > n_rows_max {
        return Err(ExportError::LimitExceeded(format!(
            "{format_name}: {} rows > {n_rows_max}",
            doc.height()
        )));
    }
    if doc.width() > n_cols_max {
        return Err(ExportError::LimitExceeded(format!(
            "{format_name}: {} columns > {n_cols_max}",
            doc.width()
        )));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnWidth

/// Estimate displayed width units for one cell value.
pub fn estimate_width_len(value: &EnumCellValue) -> usize {
    match value {
        EnumCellValue::None => 0,
        EnumCellValue::Date(_) => 10,
        EnumCellValue::DateTime(_) => 19,
        _ => estimate_unicode_string_width(&convert_cell_value_to_text(value)),
    }
}

/// Estimate displayed width of text; wide glyphs count 1.6 units.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

/// Content-fitted width per column over header and body, clamped to `[n_min, n_max]`.
pub fn derive_autofit_widths(
    doc: &SpecTabularDocument,
    n_min: usize,
    n_max: usize,
    n_pad: usize,
) -> Vec<usize> {
    let mut l_widths: Vec<usize> = doc
        .header
        .iter()
        .map(|c_text| estimate_unicode_string_width(c_text))
        .collect();
    for row in &doc.rows {
        for (n_idx_col, value) in row.iter().enumerate().take(l_widths.len()) {
            l_widths[n_idx_col] = usize::max(l_widths[n_idx_col], estimate_width_len(value));
        }
    }
    l_widths
        .into_iter()
        .map(|n_width| usize::min(n_max, usize::max(n_min, n_width + n_pad)))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
