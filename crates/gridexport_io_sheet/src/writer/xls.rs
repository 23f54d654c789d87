//! XLS writer kernel: tabular document to a BIFF8 workbook in an OLE2 container.
//!
//! The workbook stream holds one globals substream (fonts, XFs, the sheet
//! directory, the hidden `_FilterDatabase` name and the shared string table)
//! followed by one worksheet substream.

use std::collections::HashMap;
use std::io::{Cursor, Write};

use crate::conf::{N_NCOLS_XLS_MAX, N_NROWS_XLS_MAX};
use crate::spec::{EnumCellValue, ExportError, Result, SpecTabularDocument};
use crate::util::{
    convert_date_to_excel_serial, convert_datetime_to_excel_serial, derive_autofit_widths,
    truncate_cell_text, validate_grid_limits,
};

const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_CODEPAGE: u16 = 0x0042;
const RECORD_WINDOW1: u16 = 0x003D;
const RECORD_FONT: u16 = 0x0031;
const RECORD_XF: u16 = 0x00E0;
const RECORD_STYLE: u16 = 0x0293;
const RECORD_BOUNDSHEET: u16 = 0x0085;
const RECORD_SUPBOOK: u16 = 0x01AE;
const RECORD_EXTERNSHEET: u16 = 0x0017;
const RECORD_NAME: u16 = 0x0018;
const RECORD_SST: u16 = 0x00FC;
const RECORD_EXTSST: u16 = 0x00FF;
const RECORD_CONTINUE: u16 = 0x003C;
const RECORD_COLINFO: u16 = 0x007D;
const RECORD_AUTOFILTERINFO: u16 = 0x009D;
const RECORD_DIMENSIONS: u16 = 0x0200;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_BOOLERR: u16 = 0x0205;
const RECORD_LABELSST: u16 = 0x00FD;
const RECORD_WINDOW2: u16 = 0x023E;
const RECORD_PANE: u16 = 0x0041;

const BOF_VERSION_BIFF8: u16 = 0x0600;
const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
const BOF_DT_WORKSHEET: u16 = 0x0010;

/// Largest record payload; longer data continues in CONTINUE records.
const N_LEN_RECORD_DATA_MAX: usize = 8224;
const N_CODEPAGE_UTF16: u16 = 1200;

const XF_FLAG_LOCKED: u16 = 0x0001;
const XF_FLAG_STYLE: u16 = 0x0004;
const COLOR_AUTOMATIC: u16 = 0x7FFF;

/// Cell XF indices following the 16 style XFs.
const N_XF_GENERAL: u16 = 16;
const N_XF_HEADER: u16 = 17;
const N_XF_DATE: u16 = 18;
const N_XF_DATETIME: u16 = 19;

/// Built-in number formats `m/d/yy` and `m/d/yy h:mm`.
const N_FMT_BUILTIN_DATE: u16 = 14;
const N_FMT_BUILTIN_DATETIME: u16 = 22;

/// Font index of the bold header font; BIFF has no font index 4.
const N_FONT_BOLD: u16 = 5;

const N_WIDTH_CELL_MIN: usize = 6;
const N_WIDTH_CELL_MAX: usize = 80;
const N_WIDTH_CELL_PAD: usize = 2;

////////////////////////////////////////////////////////////////////////////////
// #region Entry

/// Write `doc` as a single-sheet XLS (Excel 97-2003) workbook and return its bytes.
pub fn write_xls_bytes(doc: &SpecTabularDocument) -> Result<Vec<u8>> {
    validate_grid_limits(doc, N_NROWS_XLS_MAX, N_NCOLS_XLS_MAX, "xls")?;
    let v_workbook = build_workbook_stream(doc)?;
    wrap_compound_file(&v_workbook)
}

/// Put a BIFF8 workbook stream into an OLE2 compound file as `Workbook`.
fn wrap_compound_file(v_workbook: &[u8]) -> Result<Vec<u8>> {
    // Version 3 (512-byte sectors), as Excel writes it.
    let mut ole =
        cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new()))?;
    {
        let mut stream = ole.create_stream("Workbook")?;
        stream.write_all(v_workbook)?;
        stream.flush()?;
    }
    ole.flush()?;
    Ok(ole.into_inner().into_inner())
}

fn build_workbook_stream(doc: &SpecTabularDocument) -> Result<Vec<u8>> {
    let mut sst = SharedStringTable::default();
    let v_sheet = build_sheet_stream(doc, &mut sst)?;

    let mut globals = Vec::<u8>::new();
    push_record(&mut globals, RECORD_BOF, &bof(BOF_DT_WORKBOOK_GLOBALS));
    push_record(&mut globals, RECORD_CODEPAGE, &N_CODEPAGE_UTF16.to_le_bytes());
    push_record(&mut globals, RECORD_WINDOW1, &window1());

    for _ in 0..4 {
        push_record(&mut globals, RECORD_FONT, &font("Arial", false));
    }
    push_record(&mut globals, RECORD_FONT, &font("Arial", true));

    for _ in 0..16 {
        push_record(&mut globals, RECORD_XF, &xf_record(0, 0, true));
    }
    let n_font_header = if doc.presentation.if_bold_header {
        N_FONT_BOLD
    } else {
        0
    };
    push_record(&mut globals, RECORD_XF, &xf_record(0, 0, false));
    push_record(&mut globals, RECORD_XF, &xf_record(n_font_header, 0, false));
    push_record(&mut globals, RECORD_XF, &xf_record(0, N_FMT_BUILTIN_DATE, false));
    push_record(&mut globals, RECORD_XF, &xf_record(0, N_FMT_BUILTIN_DATETIME, false));

    // Built-in "Normal" style bound to XF 0.
    push_record(&mut globals, RECORD_STYLE, &[0x00, 0x80, 0x00, 0xFF]);

    let n_pos_boundsheet = globals.len();
    let mut boundsheet = Vec::<u8>::new();
    boundsheet.extend_from_slice(&0u32.to_le_bytes()); // lbPlyPos, patched below
    boundsheet.extend_from_slice(&0u16.to_le_bytes()); // visible worksheet
    write_short_unicode_string(&mut boundsheet, &doc.properties.sheet_name);
    push_record(&mut globals, RECORD_BOUNDSHEET, &boundsheet);

    if doc.presentation.if_autofilter && doc.width() > 0 {
        push_record(&mut globals, RECORD_SUPBOOK, &supbook_internal_workbook(1));
        push_record(&mut globals, RECORD_EXTERNSHEET, &externsheet_single_sheet(0));
        let rgce = ptg_area3d(0, 0, 0, 0, cast_col_num(doc.width() - 1)?);
        push_record(&mut globals, RECORD_NAME, &filter_database_name_record(1, &rgce));
    }

    let n_pos_sst = globals.len();
    let (l_sst_records, l_bucket_positions) = build_sst_records(&sst);
    let mut n_pos_record = n_pos_sst;
    let mut l_record_starts = Vec::with_capacity(l_sst_records.len());
    for (n_idx, v_payload) in l_sst_records.iter().enumerate() {
        l_record_starts.push(n_pos_record);
        let n_record_id = if n_idx == 0 { RECORD_SST } else { RECORD_CONTINUE };
        push_record(&mut globals, n_record_id, v_payload);
        n_pos_record = globals.len();
    }
    push_record(
        &mut globals,
        RECORD_EXTSST,
        &extsst_record(sst.l_strings.len(), &l_bucket_positions, &l_record_starts),
    );

    push_record(&mut globals, RECORD_EOF, &[]);

    let n_offset_sheet = u32::try_from(globals.len())
        .map_err(|_| ExportError::LimitExceeded("xls: workbook globals too large".to_string()))?;
    globals[n_pos_boundsheet + 4..n_pos_boundsheet + 8]
        .copy_from_slice(&n_offset_sheet.to_le_bytes());

    globals.extend_from_slice(&v_sheet);
    Ok(globals)
}

fn build_sheet_stream(doc: &SpecTabularDocument, sst: &mut SharedStringTable) -> Result<Vec<u8>> {
    let presentation = &doc.presentation;
    let n_width = doc.width();
    let mut sheet = Vec::<u8>::new();
    push_record(&mut sheet, RECORD_BOF, &bof(BOF_DT_WORKSHEET));

    if presentation.if_autofit_columns {
        let l_widths =
            derive_autofit_widths(doc, N_WIDTH_CELL_MIN, N_WIDTH_CELL_MAX, N_WIDTH_CELL_PAD);
        for (n_idx_col, n_width_col) in l_widths.into_iter().enumerate() {
            let n_col = cast_col_num(n_idx_col)?;
            let n_cx = u16::try_from(n_width_col * 256).unwrap_or(u16::MAX);
            push_record(&mut sheet, RECORD_COLINFO, &colinfo_record(n_col, n_cx));
        }
    }

    if presentation.if_autofilter && n_width > 0 {
        push_record(
            &mut sheet,
            RECORD_AUTOFILTERINFO,
            &cast_col_num(n_width)?.to_le_bytes(),
        );
    }

    push_record(
        &mut sheet,
        RECORD_DIMENSIONS,
        &dimensions(doc.height(), cast_col_num(n_width)?),
    );

    for (n_idx_col, c_text) in doc.header.iter().enumerate() {
        let n_isst = sst.intern(c_text);
        push_record(
            &mut sheet,
            RECORD_LABELSST,
            &label_sst_cell(0, cast_col_num(n_idx_col)?, N_XF_HEADER, n_isst),
        );
    }

    for (n_idx_row, row) in doc.rows.iter().enumerate() {
        let n_row = cast_row_num(n_idx_row + 1)?;
        for (n_idx_col, value) in row.iter().enumerate() {
            let n_col = cast_col_num(n_idx_col)?;
            match value {
                EnumCellValue::None => {}
                EnumCellValue::Boolean(val) => {
                    push_record(
                        &mut sheet,
                        RECORD_BOOLERR,
                        &boolerr_cell(n_row, n_col, N_XF_GENERAL, *val),
                    );
                }
                EnumCellValue::Integer(val) => {
                    push_record(
                        &mut sheet,
                        RECORD_NUMBER,
                        &number_cell(n_row, n_col, N_XF_GENERAL, *val as f64),
                    );
                }
                EnumCellValue::Number(val) => {
                    push_record(
                        &mut sheet,
                        RECORD_NUMBER,
                        &number_cell(n_row, n_col, N_XF_GENERAL, *val),
                    );
                }
                EnumCellValue::String(val) => {
                    let n_isst = sst.intern(val);
                    push_record(
                        &mut sheet,
                        RECORD_LABELSST,
                        &label_sst_cell(n_row, n_col, N_XF_GENERAL, n_isst),
                    );
                }
                EnumCellValue::Date(val) => {
                    push_record(
                        &mut sheet,
                        RECORD_NUMBER,
                        &number_cell(n_row, n_col, N_XF_DATE, convert_date_to_excel_serial(*val)),
                    );
                }
                EnumCellValue::DateTime(val) => {
                    push_record(
                        &mut sheet,
                        RECORD_NUMBER,
                        &number_cell(
                            n_row,
                            n_col,
                            N_XF_DATETIME,
                            convert_datetime_to_excel_serial(*val),
                        ),
                    );
                }
            }
        }
    }

    let n_row_freeze = cast_row_num(presentation.row_freeze)?;
    let n_col_freeze = cast_col_num(presentation.col_freeze)?;
    let if_frozen = n_width > 0 && (n_row_freeze > 0 || n_col_freeze > 0);
    push_record(&mut sheet, RECORD_WINDOW2, &window2(if_frozen));
    if if_frozen {
        push_record(
            &mut sheet,
            RECORD_PANE,
            &pane(
                n_col_freeze,
                n_row_freeze,
                n_row_freeze,
                n_col_freeze,
                derive_active_pane(n_row_freeze, n_col_freeze),
            ),
        );
    }

    push_record(&mut sheet, RECORD_EOF, &[]);
    Ok(sheet)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SharedStrings

/// Unique strings in first-use order plus the total reference count.
#[derive(Debug, Default)]
struct SharedStringTable {
    l_strings: Vec<String>,
    dict_index: HashMap<String, u32>,
    n_total: u32,
}

impl SharedStringTable {
    fn intern(&mut self, text: &str) -> u32 {
        self.n_total += 1;
        if let Some(n_idx) = self.dict_index.get(text) {
            return *n_idx;
        }
        let n_idx = self.l_strings.len() as u32;
        self.l_strings.push(text.to_string());
        self.dict_index.insert(text.to_string(), n_idx);
        n_idx
    }
}

/// Position of a string start: record index and offset inside its payload.
type PosString = (usize, usize);

/// Split the SST into an SST payload plus CONTINUE payloads.
///
/// Strings are stored uncompressed (UTF-16LE). A string split across records
/// repeats its option byte at the start of the continuation. Also returns the
/// start position of every `dsst`-th string for EXTSST.
fn build_sst_records(sst: &SharedStringTable) -> (Vec<Vec<u8>>, Vec<PosString>) {
    let n_dsst = derive_extsst_bucket_size(sst.l_strings.len());
    let mut l_records: Vec<Vec<u8>> = Vec::new();
    let mut l_bucket_positions: Vec<PosString> = Vec::new();

    let mut v_current = Vec::<u8>::with_capacity(N_LEN_RECORD_DATA_MAX);
    v_current.extend_from_slice(&sst.n_total.to_le_bytes());
    v_current.extend_from_slice(&(sst.l_strings.len() as u32).to_le_bytes());

    for (n_idx, c_text) in sst.l_strings.iter().enumerate() {
        let l_units: Vec<u16> = truncate_cell_text(c_text).encode_utf16().collect();

        // Header and first char must share a record.
        let n_len_min = if l_units.is_empty() { 3 } else { 5 };
        if v_current.len() + n_len_min > N_LEN_RECORD_DATA_MAX {
            l_records.push(std::mem::take(&mut v_current));
        }
        if n_idx % n_dsst == 0 {
            l_bucket_positions.push((l_records.len(), v_current.len()));
        }

        v_current.extend_from_slice(&(l_units.len() as u16).to_le_bytes());
        v_current.push(0x01);

        let mut l_rest = l_units.as_slice();
        while !l_rest.is_empty() {
            let n_room_units = (N_LEN_RECORD_DATA_MAX - v_current.len()) / 2;
            if n_room_units == 0 {
                l_records.push(std::mem::take(&mut v_current));
                v_current.push(0x01);
                continue;
            }
            let (l_head, l_tail) = l_rest.split_at(usize::min(n_room_units, l_rest.len()));
            for n_unit in l_head {
                v_current.extend_from_slice(&n_unit.to_le_bytes());
            }
            l_rest = l_tail;
        }
    }
    l_records.push(v_current);

    (l_records, l_bucket_positions)
}

/// Strings per EXTSST bucket; at most 128 buckets.
fn derive_extsst_bucket_size(n_strings: usize) -> usize {
    usize::max(8, n_strings.div_ceil(128))
}

fn extsst_record(
    n_strings: usize,
    l_bucket_positions: &[PosString],
    l_record_starts: &[usize],
) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(2 + 8 * l_bucket_positions.len());
    out.extend_from_slice(&(derive_extsst_bucket_size(n_strings) as u16).to_le_bytes());
    for &(n_idx_record, n_offset) in l_bucket_positions {
        let n_start = l_record_starts.get(n_idx_record).copied().unwrap_or_default();
        let n_cb_offset = 4 + n_offset;
        out.extend_from_slice(&((n_start + n_cb_offset) as u32).to_le_bytes()); // ib
        out.extend_from_slice(&(n_cb_offset as u16).to_le_bytes()); // cbOffset
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

fn bof(dt: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&BOF_VERSION_BIFF8.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out[4..6].copy_from_slice(&0x0DBBu16.to_le_bytes()); // build
    out[6..8].copy_from_slice(&0x07CCu16.to_le_bytes()); // year
    out
}

fn window1() -> [u8; 18] {
    let mut out = [0u8; 18];
    out[4..6].copy_from_slice(&0x3A5Cu16.to_le_bytes()); // dx
    out[6..8].copy_from_slice(&0x23BEu16.to_le_bytes()); // dy
    out[8..10].copy_from_slice(&0x0038u16.to_le_bytes()); // show tabs and scrollbars
    out[14..16].copy_from_slice(&1u16.to_le_bytes()); // cTabSel
    out[16..18].copy_from_slice(&600u16.to_le_bytes()); // wTabRatio
    out
}

fn window2(if_frozen: bool) -> [u8; 18] {
    let mut out = [0u8; 18];
    let mut grbit: u16 = 0x02B6;
    if if_frozen {
        grbit |= 0x0008 | 0x0100; // fFrozen, fFrozenNoSplit
    }
    out[0..2].copy_from_slice(&grbit.to_le_bytes());
    out[6..8].copy_from_slice(&0x0040u16.to_le_bytes()); // gridline color
    out
}

fn pane(x: u16, y: u16, rw_top: u16, col_left: u16, pnn_act: u16) -> [u8; 10] {
    let mut out = [0u8; 10];
    out[0..2].copy_from_slice(&x.to_le_bytes());
    out[2..4].copy_from_slice(&y.to_le_bytes());
    out[4..6].copy_from_slice(&rw_top.to_le_bytes());
    out[6..8].copy_from_slice(&col_left.to_le_bytes());
    out[8..10].copy_from_slice(&pnn_act.to_le_bytes());
    out
}

/// Active pane after freezing: bottom-right, top-right or bottom-left.
fn derive_active_pane(n_row_freeze: u16, n_col_freeze: u16) -> u16 {
    match (n_row_freeze > 0, n_col_freeze > 0) {
        (true, true) => 0,
        (false, true) => 1,
        _ => 2,
    }
}

fn font(name: &str, if_bold: bool) -> Vec<u8> {
    let mut out = Vec::<u8>::new();
    out.extend_from_slice(&200u16.to_le_bytes()); // 10pt
    out.extend_from_slice(&0u16.to_le_bytes()); // option flags
    out.extend_from_slice(&COLOR_AUTOMATIC.to_le_bytes());
    let n_weight: u16 = if if_bold { 700 } else { 400 };
    out.extend_from_slice(&n_weight.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // escapement
    out.extend_from_slice(&[0, 0, 0, 0]); // underline, family, charset, reserved
    write_short_unicode_string(&mut out, name);
    out
}

fn xf_record(font_idx: u16, fmt_idx: u16, is_style_xf: bool) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[0..2].copy_from_slice(&font_idx.to_le_bytes());
    out[2..4].copy_from_slice(&fmt_idx.to_le_bytes());
    let flags: u16 = XF_FLAG_LOCKED | if is_style_xf { XF_FLAG_STYLE | 0xFFF0 } else { 0 };
    out[4..6].copy_from_slice(&flags.to_le_bytes());
    out[6] = 0x20; // General, bottom aligned
    out[9] = if is_style_xf { 0x00 } else { 0x3F };
    // Pattern colors: system foreground and background.
    out[18..20].copy_from_slice(&(0x0040u16 | (0x0041u16 << 7)).to_le_bytes());
    out
}

fn supbook_internal_workbook(n_sheets: u16) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[0..2].copy_from_slice(&n_sheets.to_le_bytes());
    out[2..4].copy_from_slice(&0x0401u16.to_le_bytes());
    out
}

fn externsheet_single_sheet(sheet_index: u16) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&1u16.to_le_bytes()); // cXTI
    out[2..4].copy_from_slice(&0u16.to_le_bytes()); // iSupBook
    out[4..6].copy_from_slice(&sheet_index.to_le_bytes());
    out[6..8].copy_from_slice(&sheet_index.to_le_bytes());
    out
}

fn ptg_area3d(ixti: u16, row1: u16, row2: u16, col1: u16, col2: u16) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(11);
    out.push(0x3B);
    out.extend_from_slice(&ixti.to_le_bytes());
    out.extend_from_slice(&row1.to_le_bytes());
    out.extend_from_slice(&row2.to_le_bytes());
    out.extend_from_slice(&col1.to_le_bytes());
    out.extend_from_slice(&col2.to_le_bytes());
    out
}

/// Hidden built-in `_FilterDatabase` name scoped to sheet `itab` (1-based).
fn filter_database_name_record(itab: u16, rgce: &[u8]) -> Vec<u8> {
    const NAME_FLAG_HIDDEN: u16 = 0x0001;
    const NAME_FLAG_BUILTIN: u16 = 0x0020;
    const NAME_BUILTIN_FILTER_DATABASE: u8 = 0x0D;

    let mut out = Vec::<u8>::new();
    out.extend_from_slice(&(NAME_FLAG_HIDDEN | NAME_FLAG_BUILTIN).to_le_bytes());
    out.push(0); // chKey
    out.push(1); // cch
    out.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // ixals
    out.extend_from_slice(&itab.to_le_bytes());
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.push(0); // fHighByte
    out.push(NAME_BUILTIN_FILTER_DATABASE);
    out.extend_from_slice(rgce);
    out
}

fn colinfo_record(col: u16, cx: u16) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..2].copy_from_slice(&col.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&cx.to_le_bytes());
    out[6..8].copy_from_slice(&N_XF_GENERAL.to_le_bytes());
    out
}

fn dimensions(n_rows: usize, n_cols: u16) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[4..8].copy_from_slice(&(n_rows as u32).to_le_bytes()); // last row + 1
    out[10..12].copy_from_slice(&n_cols.to_le_bytes()); // last col + 1
    out
}

fn number_cell(row: u16, col: u16, xf: u16, v: f64) -> [u8; 14] {
    let mut out = [0u8; 14];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out[6..14].copy_from_slice(&v.to_le_bytes());
    out
}

fn boolerr_cell(row: u16, col: u16, xf: u16, v: bool) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out[6] = u8::from(v);
    out
}

fn label_sst_cell(row: u16, col: u16, xf: u16, isst: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    out[0..2].copy_from_slice(&row.to_le_bytes());
    out[2..4].copy_from_slice(&col.to_le_bytes());
    out[4..6].copy_from_slice(&xf.to_le_bytes());
    out[6..10].copy_from_slice(&isst.to_le_bytes());
    out
}

/// ShortXLUnicodeString, stored uncompressed.
fn write_short_unicode_string(out: &mut Vec<u8>, s: &str) {
    let l_units: Vec<u16> = s.encode_utf16().take(u8::MAX as usize).collect();
    out.push(l_units.len() as u8);
    out.push(0x01);
    for n_unit in l_units {
        out.extend_from_slice(&n_unit.to_le_bytes());
    }
}

fn cast_row_num(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| ExportError::LimitExceeded(format!("xls: row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| ExportError::LimitExceeded(format!("xls: column index overflow: {value}")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    /// `(record id, record start)` for every record of a BIFF stream.
    fn read_records(v_stream: &[u8]) -> Vec<(u16, usize)> {
        let mut l_records = Vec::new();
        let mut n_pos = 0;
        while n_pos + 4 <= v_stream.len() {
            let n_id = u16::from_le_bytes([v_stream[n_pos], v_stream[n_pos + 1]]);
            let n_len = u16::from_le_bytes([v_stream[n_pos + 2], v_stream[n_pos + 3]]) as usize;
            l_records.push((n_id, n_pos));
            n_pos += 4 + n_len;
        }
        l_records
    }

    fn read_record_ids(v_stream: &[u8]) -> Vec<u16> {
        read_records(v_stream).into_iter().map(|(n_id, _)| n_id).collect()
    }

    fn doc() -> SpecTabularDocument {
        let mut doc = SpecTabularDocument {
            header: vec!["ID".to_string(), "Name".to_string()],
            rows: vec![
                vec![EnumCellValue::Integer(1), EnumCellValue::from("Ann")],
                vec![EnumCellValue::Integer(2), EnumCellValue::Boolean(true)],
            ],
            ..Default::default()
        };
        doc.properties.sheet_name = "Members".to_string();
        doc
    }

    #[test]
    fn test_write_xls_bytes_is_ole2_with_workbook_stream() {
        let v_bytes = write_xls_bytes(&doc()).expect("write xls");
        assert_eq!(&v_bytes[..8], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);

        let mut ole = cfb::CompoundFile::open(Cursor::new(v_bytes)).expect("open cfb");
        assert_eq!(ole.version(), cfb::Version::V3);
        let mut v_stream = Vec::new();
        ole.open_stream("Workbook")
            .expect("Workbook stream")
            .read_to_end(&mut v_stream)
            .expect("read stream");
        assert_eq!(&v_stream[..2], &RECORD_BOF.to_le_bytes());
    }

    #[test]
    fn test_boundsheet_points_at_sheet_bof() {
        let v_stream = build_workbook_stream(&doc()).expect("stream");
        let l_ids = read_record_ids(&v_stream);
        assert_eq!(l_ids.iter().filter(|id| **id == RECORD_BOF).count(), 2);
        assert!(l_ids.contains(&RECORD_NAME));
        assert!(l_ids.contains(&RECORD_PANE));

        let (_, n_pos) = read_records(&v_stream)
            .into_iter()
            .find(|(n_id, _)| *n_id == RECORD_BOUNDSHEET)
            .expect("boundsheet");
        let n_offset = u32::from_le_bytes([
            v_stream[n_pos + 4],
            v_stream[n_pos + 5],
            v_stream[n_pos + 6],
            v_stream[n_pos + 7],
        ]) as usize;
        assert_eq!(&v_stream[n_offset + 4..n_offset + 8], &bof(BOF_DT_WORKSHEET)[..4]);
    }

    #[test]
    fn test_shared_strings_are_deduplicated() {
        let mut sst = SharedStringTable::default();
        assert_eq!(sst.intern("a"), 0);
        assert_eq!(sst.intern("b"), 1);
        assert_eq!(sst.intern("a"), 0);
        assert_eq!(sst.n_total, 3);
        assert_eq!(sst.l_strings.len(), 2);
    }

    #[test]
    fn test_long_strings_continue_across_records() {
        let mut sst = SharedStringTable::default();
        for chr in ['x', 'y', 'z'] {
            sst.intern(&chr.to_string().repeat(5000));
        }
        let (l_records, l_buckets) = build_sst_records(&sst);

        assert!(l_records.len() > 1);
        assert!(l_records.iter().all(|v| v.len() <= N_LEN_RECORD_DATA_MAX));
        assert!(l_records[1..].iter().all(|v| v[0] == 0x01));
        assert_eq!(l_buckets, vec![(0, 8)]);

        let n_len_total: usize = l_records.iter().map(Vec::len).sum();
        let n_len_continuations = l_records.len() - 1;
        assert_eq!(n_len_total, 8 + 3 * (3 + 10_000) + n_len_continuations);
    }

    #[test]
    fn test_header_only_document_has_no_data_cells() {
        let mut doc = doc();
        doc.rows.clear();
        let v_stream = build_workbook_stream(&doc).expect("stream");
        let l_ids = read_record_ids(&v_stream);
        assert_eq!(l_ids.iter().filter(|id| **id == RECORD_LABELSST).count(), 2);
        assert!(!l_ids.contains(&RECORD_NUMBER));
    }

    #[test]
    fn test_too_many_rows_fails() {
        let mut doc = doc();
        doc.rows = vec![vec![EnumCellValue::Integer(1)]; N_NROWS_XLS_MAX];
        assert!(matches!(write_xls_bytes(&doc), Err(ExportError::LimitExceeded(_))));
    }
}
