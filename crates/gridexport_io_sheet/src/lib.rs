//! `gridexport_io_sheet` v1:
//! Admin grid export kernel (XLSX, legacy XLS, CSV).
//!
//! Pipeline mirrors the grid export flow:
//! - `conf`   : constants, format registry and default presets
//! - `spec`   : specs/models/options and the error type
//! - `record` : host capabilities (record, record type, grid) plus in-memory hosts
//! - `select` : field selection (column map resolution)
//! - `row`    : row materialization
//! - `sheet`  : tabular document assembly
//! - `writer` : per-format writer kernels
//! - `action` : grid-facing export action
//! - `frame`  : polars `DataFrame` as a grid
//! - `util`   : pure helper functions
pub mod action;
pub mod conf;
pub mod frame;
pub mod record;
pub mod row;
pub mod select;
pub mod sheet;
pub mod spec;
pub mod util;
pub mod writer;

pub use action::{
    ExportButton, collect_viewable_records, derive_export_response, export_record, write_export,
};
pub use conf::{
    C_FIELD_KEY_ID, EnumExportFormat, N_NCOLS_XLS_MAX, N_NCOLS_XLSX_MAX, N_NROWS_XLS_MAX,
    N_NROWS_XLSX_MAX,
};
pub use frame::{FrameGrid, FrameRecord, FrameSchema};
pub use record::{ExportGrid, ExportRecord, ExportSchema, MemoryGrid, MemoryRecord, MemorySchema};
pub use row::materialize_row;
pub use select::resolve_field_map;
pub use sheet::build_tabular_document;
pub use spec::{
    EnumCellSource, EnumCellValue, ExportError, Result, SpecButtonEntry, SpecButtonGroup,
    SpecDocumentProperties, SpecExportDefaults, SpecExportOptions, SpecExportResponse,
    SpecFieldEntry, SpecFieldMap, SpecFieldOverrides, SpecSheetPresentation, SpecTabularDocument,
};
pub use writer::write_document;
