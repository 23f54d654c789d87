//! Format writers: one in-memory document to the bytes of one wire format.

pub mod csv;
pub mod xls;
pub mod xlsx;

use crate::conf::EnumExportFormat;
use crate::spec::{Result, SpecTabularDocument};

/// Serialize `doc` as `format`.
///
/// Cell values and their order are preserved; presentation metadata that the
/// format cannot express (CSV) is ignored.
pub fn write_document(doc: &SpecTabularDocument, format: EnumExportFormat) -> Result<Vec<u8>> {
    match format {
        EnumExportFormat::Xlsx => xlsx::write_xlsx_bytes(doc),
        EnumExportFormat::Xls => xls::write_xls_bytes(doc),
        EnumExportFormat::Csv => csv::write_csv_bytes(doc),
    }
}
