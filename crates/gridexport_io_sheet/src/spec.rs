//! Shared export models, options and the crate error type.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Scalar value of one cell, as read from a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/null value; the cell is left empty.
    #[default]
    None,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Number(f64),
    /// Text value.
    String(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for EnumCellValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for EnumCellValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Zoned datetimes keep their wall-clock time in the stored offset.
impl From<DateTime<FixedOffset>> for EnumCellValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value.naive_local())
    }
}

impl From<NaiveDateTime> for EnumCellValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T> From<Option<T>> for EnumCellValue
where
    T: Into<EnumCellValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldMap

/// How a cell value is obtained from a record for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumCellSource {
    /// Readable attribute with this name.
    Attribute(String),
    /// Zero-argument accessor with this name (`get<Field>`).
    Accessor(String),
    /// Field-reference expression rendered as raw text.
    Template(String),
}

/// One export column: output key and the source field it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldEntry {
    /// Export column key (raw header text).
    pub key: String,
    /// Source field name or field-reference expression.
    pub field: String,
    /// Value source resolved against a sample record; looked up per row when `None`.
    pub source: Option<EnumCellSource>,
}

/// Ordered export column map with unique keys.
///
/// Insertion order is the left-to-right column order of the output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFieldMap {
    entries: Vec<SpecFieldEntry>,
}

impl SpecFieldMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(key, field)` pairs; a repeated key keeps its first position.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (key, field) in pairs {
            map.insert(key, field);
        }
        map
    }

    /// Build a map where each key reads the field of the same name.
    pub fn from_names<N>(names: impl IntoIterator<Item = N>) -> Self
    where
        N: Into<String>,
    {
        Self::from_pairs(names.into_iter().map(|name| {
            let c_name: String = name.into();
            (c_name.clone(), c_name)
        }))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no columns.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Column keys in order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.key.as_str()).collect()
    }

    /// First column key.
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.key.as_str())
    }

    /// Entry for `key`.
    pub fn get(&self, key: &str) -> Option<&SpecFieldEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// Entries in column order.
    pub fn iter(&self) -> std::slice::Iter<'_, SpecFieldEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, SpecFieldEntry> {
        self.entries.iter_mut()
    }

    /// Set `key` to read `field`; an existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, field: impl Into<String>) {
        let c_key = key.into();
        let c_field = field.into();
        match self.position(&c_key) {
            Some(n_idx) => {
                self.entries[n_idx].field = c_field;
                self.entries[n_idx].source = None;
            }
            None => self.entries.push(SpecFieldEntry {
                key: c_key,
                field: c_field,
                source: None,
            }),
        }
    }

    /// Put `key` first; an existing entry with the same key is shadowed.
    pub fn prepend(&mut self, key: impl Into<String>, field: impl Into<String>) {
        let c_key = key.into();
        if let Some(n_idx) = self.position(&c_key) {
            self.entries.remove(n_idx);
        }
        self.entries.insert(
            0,
            SpecFieldEntry {
                key: c_key,
                field: field.into(),
                source: None,
            },
        );
    }

    /// Remove `key`; returns the removed entry.
    pub fn remove(&mut self, key: &str) -> Option<SpecFieldEntry> {
        self.position(key).map(|n_idx| self.entries.remove(n_idx))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }
}

impl<'a> IntoIterator for &'a SpecFieldMap {
    type Item = &'a SpecFieldEntry;
    type IntoIter = std::slice::Iter<'a, SpecFieldEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Field selection overrides for one export.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecFieldOverrides {
    /// Replaces default field discovery entirely when set.
    pub custom_fields: Option<Vec<String>>,
    /// Appended to whatever discovery produced.
    pub custom_add_fields: Option<Vec<String>>,
    /// Removed from the final map (applied last).
    pub remove_fields: Option<Vec<String>>,
}

/// Process-wide export defaults, supplied once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SpecExportDefaults {
    /// Use human-readable field labels in the header row.
    #[serde(rename = "UseLabelsAsHeaders", default)]
    pub use_labels_as_headers: bool,
}

impl SpecExportDefaults {
    /// Parse defaults from a JSON object such as `{"UseLabelsAsHeaders": true}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Per-call export options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportOptions {
    /// Overrides the process-wide label mode when set.
    pub use_labels_as_headers: Option<bool>,
    /// Field selection overrides.
    pub overrides: SpecFieldOverrides,
}

impl SpecExportOptions {
    /// Effective label mode: per-call value, else the process-wide default.
    pub fn resolve_use_labels_as_headers(&self, defaults: &SpecExportDefaults) -> bool {
        self.use_labels_as_headers
            .unwrap_or(defaults.use_labels_as_headers)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DocumentSpecification

/// Presentation metadata handed to the writers with the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetPresentation {
    /// Bold header row.
    pub if_bold_header: bool,
    /// Autofilter across the header row.
    pub if_autofilter: bool,
    /// Number of frozen rows.
    pub row_freeze: usize,
    /// Number of frozen columns.
    pub col_freeze: usize,
    /// Size every column to its content.
    pub if_autofit_columns: bool,
}

impl Default for SpecSheetPresentation {
    fn default() -> Self {
        Self {
            if_bold_header: true,
            if_autofilter: true,
            row_freeze: 1,
            col_freeze: 1,
            if_autofit_columns: true,
        }
    }
}

/// Workbook metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecDocumentProperties {
    /// Name of the exporting user; empty when unknown.
    pub creator: String,
    /// Document title.
    pub title: String,
    /// Document description.
    pub description: String,
    /// Worksheet name (already sanitized).
    pub sheet_name: String,
}

/// In-memory grid: one header row plus one data row per record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecTabularDocument {
    /// Workbook metadata.
    pub properties: SpecDocumentProperties,
    /// Presentation metadata.
    pub presentation: SpecSheetPresentation,
    /// Header row text, one entry per column.
    pub header: Vec<String>,
    /// Data rows in list order.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecTabularDocument {
    /// Column count.
    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Row count including the header row.
    pub fn height(&self) -> usize {
        1 + self.rows.len()
    }

    /// Cell at 1-based `(row, col)`; row 1 is the header.
    pub fn cell(&self, row: usize, col: usize) -> Option<EnumCellValue> {
        if row == 0 || col == 0 {
            return None;
        }
        if row == 1 {
            return self
                .header
                .get(col - 1)
                .map(|text| EnumCellValue::String(text.clone()));
        }
        self.rows.get(row - 2)?.get(col - 1).cloned()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Response

/// Bytes plus HTTP headers produced by one export action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportResponse {
    /// `Content-Type` header value.
    pub content_type: String,
    /// `Content-Disposition` header value.
    pub content_disposition: String,
    /// Attachment filename.
    pub file_name: String,
    /// Serialized document.
    pub body: Vec<u8>,
}

impl SpecExportResponse {
    /// Header pairs to set on the HTTP response.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type.clone()),
            ("Content-Disposition", self.content_disposition.clone()),
        ]
    }
}

/// One entry of the export split button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecButtonEntry {
    /// Grid action name posted by the button.
    pub action_name: String,
    /// Button text.
    pub label: String,
    /// CSS class keeping the host from loading the download over AJAX.
    pub extra_class: String,
}

/// Split button rendered into the grid's target fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecButtonGroup {
    /// Fragment name the host renders the button into.
    pub target_fragment: String,
    /// Split button title.
    pub label: String,
    /// Icon hint for the host's button renderer.
    pub icon: String,
    /// Entries in display order.
    pub entries: Vec<SpecButtonEntry>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Unknown format token; a caller bug, not a runtime condition.
    #[error("Unsupported export format: {0:?}")]
    InvalidFormat(String),

    /// Grid exceeds the target format's row/column limits.
    #[error("Excel limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DataFrame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias using [`ExportError`].
pub type Result<T> = std::result::Result<T, ExportError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_insert_keeps_position_of_existing_key() {
        let mut map = SpecFieldMap::from_names(["Name", "Email"]);
        map.insert("Name", "Title");
        assert_eq!(map.keys(), vec!["Name", "Email"]);
        assert_eq!(map.get("Name").map(|e| e.field.as_str()), Some("Title"));
    }

    #[test]
    fn test_field_map_prepend_shadows_existing_key() {
        let mut map = SpecFieldMap::from_names(["Name", "ID", "Email"]);
        map.prepend("ID", "ID");
        assert_eq!(map.keys(), vec!["ID", "Name", "Email"]);
    }

    #[test]
    fn test_document_cell_is_one_based_with_header_first() {
        let doc = SpecTabularDocument {
            header: vec!["ID".to_string(), "Name".to_string()],
            rows: vec![vec![EnumCellValue::Integer(7), EnumCellValue::from("Ann")]],
            ..Default::default()
        };
        assert_eq!(doc.height(), 2);
        assert_eq!(doc.cell(1, 2), Some(EnumCellValue::from("Name")));
        assert_eq!(doc.cell(2, 1), Some(EnumCellValue::Integer(7)));
        assert_eq!(doc.cell(0, 1), None);
        assert_eq!(doc.cell(3, 1), None);
    }

    #[test]
    fn test_zoned_datetime_keeps_wall_clock_time() {
        let datetime = DateTime::parse_from_rfc3339("2024-06-01T09:15:00+02:00").expect("rfc3339");
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|date| date.and_hms_opt(9, 15, 0))
            .expect("datetime");
        assert_eq!(EnumCellValue::from(datetime), EnumCellValue::DateTime(expected));
    }

    #[test]
    fn test_defaults_from_json() {
        let defaults = SpecExportDefaults::from_json_str(r#"{"UseLabelsAsHeaders": true}"#)
            .expect("parse defaults");
        assert!(defaults.use_labels_as_headers);
        assert!(!SpecExportDefaults::from_json_str("{}").expect("parse").use_labels_as_headers);
        assert!(SpecExportDefaults::from_json_str("[").is_err());
    }

    #[test]
    fn test_per_call_option_overrides_default() {
        let defaults = SpecExportDefaults {
            use_labels_as_headers: true,
        };
        let mut options = SpecExportOptions::default();
        assert!(options.resolve_use_labels_as_headers(&defaults));
        options.use_labels_as_headers = Some(false);
        assert!(!options.resolve_use_labels_as_headers(&defaults));
    }
}
