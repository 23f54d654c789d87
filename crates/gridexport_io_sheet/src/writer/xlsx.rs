//! XLSX writer kernel: tabular document to an Excel 2007 workbook in memory.

use rust_xlsxwriter::{DocProperties, Format, Workbook, Worksheet};

use crate::conf::{
    C_NUM_FORMAT_DATE, C_NUM_FORMAT_DATETIME, N_NCOLS_XLSX_MAX, N_NROWS_XLSX_MAX,
};
use crate::spec::{EnumCellValue, ExportError, Result, SpecTabularDocument};
use crate::util::{
    convert_date_to_excel_serial, convert_datetime_to_excel_serial, derive_autofit_widths,
    truncate_cell_text, validate_grid_limits,
};

const N_WIDTH_CELL_MIN: usize = 6;
const N_WIDTH_CELL_MAX: usize = 80;
const N_WIDTH_CELL_PAD: usize = 2;

/// Write `doc` as a single-sheet XLSX workbook and return its bytes.
pub fn write_xlsx_bytes(doc: &SpecTabularDocument) -> Result<Vec<u8>> {
    validate_grid_limits(doc, N_NROWS_XLSX_MAX, N_NCOLS_XLSX_MAX, "xlsx")?;

    let mut workbook = Workbook::new();
    let properties = DocProperties::new()
        .set_author(&doc.properties.creator)
        .set_title(&doc.properties.title)
        .set_comment(&doc.properties.description);
    workbook.set_properties(&properties);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&doc.properties.sheet_name)?;
    write_sheet(worksheet, doc)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_sheet(worksheet: &mut Worksheet, doc: &SpecTabularDocument) -> Result<()> {
    let presentation = &doc.presentation;
    let fmt_header = derive_header_format(presentation.if_bold_header);
    let fmt_date = Format::new().set_num_format(C_NUM_FORMAT_DATE);
    let fmt_datetime = Format::new().set_num_format(C_NUM_FORMAT_DATETIME);

    for (n_idx_col, c_text) in doc.header.iter().enumerate() {
        worksheet.write_string_with_format(
            0,
            cast_col_num(n_idx_col)?,
            truncate_cell_text(c_text),
            &fmt_header,
        )?;
    }

    for (n_idx_row, row) in doc.rows.iter().enumerate() {
        let n_row = cast_row_num(n_idx_row + 1)?;
        for (n_idx_col, value) in row.iter().enumerate() {
            let n_col = cast_col_num(n_idx_col)?;
            match value {
                EnumCellValue::None => {}
                EnumCellValue::Boolean(val) => {
                    worksheet.write_boolean(n_row, n_col, *val)?;
                }
                EnumCellValue::Integer(val) => {
                    worksheet.write_number(n_row, n_col, *val as f64)?;
                }
                EnumCellValue::Number(val) => {
                    worksheet.write_number(n_row, n_col, *val)?;
                }
                EnumCellValue::String(val) => {
                    worksheet.write_string(n_row, n_col, truncate_cell_text(val))?;
                }
                EnumCellValue::Date(val) => {
                    worksheet.write_number_with_format(
                        n_row,
                        n_col,
                        convert_date_to_excel_serial(*val),
                        &fmt_date,
                    )?;
                }
                EnumCellValue::DateTime(val) => {
                    worksheet.write_number_with_format(
                        n_row,
                        n_col,
                        convert_datetime_to_excel_serial(*val),
                        &fmt_datetime,
                    )?;
                }
            }
        }
    }

    if doc.width() == 0 {
        return Ok(());
    }

    if presentation.if_autofilter {
        worksheet.autofilter(0, 0, 0, cast_col_num(doc.width() - 1)?)?;
    }
    if presentation.row_freeze > 0 || presentation.col_freeze > 0 {
        worksheet.set_freeze_panes(
            cast_row_num(presentation.row_freeze)?,
            cast_col_num(presentation.col_freeze)?,
        )?;
    }
    if presentation.if_autofit_columns {
        let l_widths =
            derive_autofit_widths(doc, N_WIDTH_CELL_MIN, N_WIDTH_CELL_MAX, N_WIDTH_CELL_PAD);
        for (n_idx_col, n_width) in l_widths.into_iter().enumerate() {
            worksheet.set_column_width(cast_col_num(n_idx_col)?, n_width as f64)?;
        }
    }

    Ok(())
}

fn derive_header_format(if_bold: bool) -> Format {
    if if_bold {
        Format::new().set_bold()
    } else {
        Format::new()
    }
}

fn cast_row_num(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ExportError::LimitExceeded(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| ExportError::LimitExceeded(format!("column index overflow: {value}")))
}
