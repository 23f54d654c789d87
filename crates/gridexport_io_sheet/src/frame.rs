//! polars `DataFrame` as an export record list.
//!
//! Columns are the persisted attributes; each row is one record. The frame is
//! shared between records, so a grid over a large frame does not copy data.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};

use crate::record::{ExportGrid, ExportRecord, ExportSchema};
use crate::spec::{EnumCellValue, Result};
use crate::util::derive_label_from_field_name;

/// Decode a polars IPC payload into a `DataFrame`.
pub fn read_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame> {
    Ok(IpcReader::new(Cursor::new(v_ipc_df)).finish()?)
}

/// Map one polars value to a cell value.
///
/// Unsigned values beyond `i64` become numbers; types without a native cell
/// representation are rendered as text.
pub fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt16(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt32(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::UInt64(val) => match i64::try_from(val) {
            Ok(n_val) => EnumCellValue::Integer(n_val),
            Err(_) => EnumCellValue::Number(val as f64),
        },
        AnyValue::Int8(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int16(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int32(val) => EnumCellValue::Integer(i64::from(val)),
        AnyValue::Int64(val) => EnumCellValue::Integer(val),
        AnyValue::Float32(val) => EnumCellValue::Number(f64::from(val)),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region FrameSchema

/// Record type of a frame: its column names plus display names.
#[derive(Debug, Clone, Default)]
pub struct FrameSchema {
    singular_name: String,
    plural_name: String,
    l_fields: Vec<String>,
    dict_labels: BTreeMap<String, String>,
}

impl FrameSchema {
    /// Describe `frame`'s columns under the given display names.
    pub fn from_frame(
        frame: &DataFrame,
        singular_name: impl Into<String>,
        plural_name: impl Into<String>,
    ) -> Self {
        Self {
            singular_name: singular_name.into(),
            plural_name: plural_name.into(),
            l_fields: frame
                .get_column_names_str()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
            dict_labels: BTreeMap::new(),
        }
    }

    /// Override the label of `field`.
    pub fn with_label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.dict_labels.insert(field.into(), label.into());
        self
    }
}

impl ExportSchema for FrameSchema {
    fn database_fields(&self) -> Vec<String> {
        self.l_fields.clone()
    }

    fn singular_name(&self) -> String {
        self.singular_name.clone()
    }

    fn plural_name(&self) -> String {
        self.plural_name.clone()
    }

    fn field_label(&self, field: &str) -> String {
        self.dict_labels
            .get(field)
            .cloned()
            .unwrap_or_else(|| derive_label_from_field_name(field))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FrameRecord

/// One row of a shared frame.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    frame: Arc<DataFrame>,
    n_row: usize,
}

impl FrameRecord {
    /// Row `n_row` of `frame`.
    pub fn new(frame: Arc<DataFrame>, n_row: usize) -> Self {
        Self { frame, n_row }
    }
}

impl ExportRecord for FrameRecord {
    fn has_field(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    fn get_field(&self, name: &str) -> EnumCellValue {
        self.frame
            .column(name)
            .and_then(|col| col.get(self.n_row))
            .map(derive_cell_value_from_any_value)
            .unwrap_or_default()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FrameGrid

/// Grid over all rows of a frame, in frame order.
#[derive(Debug, Clone)]
pub struct FrameGrid {
    frame: Arc<DataFrame>,
    schema: FrameSchema,
    user_name: Option<String>,
}

impl FrameGrid {
    /// Grid over `frame` with the given display names.
    pub fn new(
        frame: DataFrame,
        singular_name: impl Into<String>,
        plural_name: impl Into<String>,
    ) -> Self {
        let schema = FrameSchema::from_frame(&frame, singular_name, plural_name);
        Self {
            frame: Arc::new(frame),
            schema,
            user_name: None,
        }
    }

    /// Grid over a polars IPC payload.
    pub fn from_ipc_bytes(
        v_ipc_df: &[u8],
        singular_name: impl Into<String>,
        plural_name: impl Into<String>,
    ) -> Result<Self> {
        let frame = read_dataframe_from_ipc_bytes(v_ipc_df)?;
        Ok(Self::new(frame, singular_name, plural_name))
    }

    /// Set the exporting user's name.
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    /// Replace the schema (e.g. to add labels).
    pub fn with_schema(mut self, schema: FrameSchema) -> Self {
        self.schema = schema;
        self
    }
}

impl ExportGrid for FrameGrid {
    type Record = FrameRecord;
    type Schema = FrameSchema;

    fn schema(&self) -> &FrameSchema {
        &self.schema
    }

    fn list_unpaginated(&self) -> Vec<FrameRecord> {
        (0..self.frame.height())
            .map(|n_row| FrameRecord::new(Arc::clone(&self.frame), n_row))
            .collect()
    }

    fn current_user_name(&self) -> Option<String> {
        self.user_name.clone()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use polars::prelude::{IpcWriter, SerWriter, df};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::conf::EnumExportFormat;
    use crate::select::resolve_field_map;
    use crate::sheet::build_tabular_document;
    use crate::spec::SpecFieldOverrides;
    use crate::writer::write_document;

    fn frame() -> DataFrame {
        df!(
            "ID" => [1i64, 2],
            "Name" => ["Ann", "Bob"],
            "Score" => [Some(1.5f64), None],
            "Active" => [true, false]
        )
        .expect("frame")
    }

    #[test]
    fn test_frame_record_reads_typed_cells() {
        let grid = FrameGrid::new(frame(), "Member", "Members");
        let l_records = grid.list_unpaginated();
        assert_eq!(l_records.len(), 2);
        assert_eq!(l_records[0].get_field("ID"), EnumCellValue::Integer(1));
        assert_eq!(l_records[0].get_field("Score"), EnumCellValue::Number(1.5));
        assert_eq!(l_records[1].get_field("Score"), EnumCellValue::None);
        assert_eq!(l_records[1].get_field("Active"), EnumCellValue::Boolean(false));
        assert_eq!(l_records[1].get_field("Missing"), EnumCellValue::None);
        assert!(!l_records[1].has_field("Missing"));
    }

    #[test]
    fn test_frame_columns_become_field_map() {
        let grid = FrameGrid::new(frame(), "Member", "Members");
        let l_records = grid.list_unpaginated();
        let map =
            resolve_field_map(l_records.first(), grid.schema(), &SpecFieldOverrides::default());
        assert_eq!(map.keys(), vec!["ID", "Name", "Score", "Active"]);
    }

    #[test]
    fn test_replaced_schema_labels_the_header() {
        let df = frame();
        let schema =
            FrameSchema::from_frame(&df, "Member", "Members").with_label("Score", "Rating");
        let grid = FrameGrid::new(df, "Member", "Members").with_schema(schema);
        let l_records = grid.list_unpaginated();
        let map =
            resolve_field_map(l_records.first(), grid.schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document(&l_records, grid.schema(), &map, true, None);
        assert_eq!(doc.header, vec!["ID", "Name", "Rating", "Active"]);
    }

    #[test]
    fn test_from_ipc_bytes_exports_csv() {
        let mut df = frame();
        let mut v_ipc = Vec::new();
        IpcWriter::new(&mut v_ipc).finish(&mut df).expect("write ipc");

        let grid = FrameGrid::from_ipc_bytes(&v_ipc, "Member", "Members").expect("read ipc");
        let l_records = grid.list_unpaginated();
        let map =
            resolve_field_map(l_records.first(), grid.schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document(&l_records, grid.schema(), &map, false, None);
        let v_csv = write_document(&doc, EnumExportFormat::Csv).expect("csv");

        assert_eq!(
            String::from_utf8(v_csv).expect("utf8"),
            "ID,Name,Score,Active\n1,Ann,1.5,TRUE\n2,Bob,,FALSE\n"
        );
    }

    #[test]
    fn test_unsigned_overflow_becomes_number() {
        assert_eq!(
            derive_cell_value_from_any_value(AnyValue::UInt64(u64::MAX)),
            EnumCellValue::Number(u64::MAX as f64)
        );
    }
}
