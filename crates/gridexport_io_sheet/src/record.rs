//! Host capabilities required from records, record types and grids.
//!
//! The host framework owns filtering, sorting, permissions and persistence. The
//! exporter only inspects records through these traits.

use std::collections::BTreeMap;

use crate::spec::{EnumCellValue, SpecFieldMap};
use crate::util::{convert_cell_value_to_text, derive_label_from_field_name};

////////////////////////////////////////////////////////////////////////////////
// #region Traits

/// One structured record being exported.
pub trait ExportRecord {
    /// Whether `name` is a readable attribute.
    fn has_field(&self, name: &str) -> bool;

    /// Read attribute `name`; [`EnumCellValue::None`] when absent.
    fn get_field(&self, name: &str) -> EnumCellValue;

    /// Whether a zero-argument accessor called `accessor` exists (e.g. `getName`).
    fn has_accessor(&self, _accessor: &str) -> bool {
        false
    }

    /// Call zero-argument accessor `accessor`.
    fn call_accessor(&self, _accessor: &str) -> EnumCellValue {
        EnumCellValue::None
    }

    /// Record-provided export columns; `None` when the record has no opinion.
    fn export_fields(&self) -> Option<SpecFieldMap> {
        None
    }

    /// Related record reachable through `name` (used by template rendering).
    fn related(&self, _name: &str) -> Option<Box<dyn ExportRecord + '_>> {
        None
    }

    /// View permission; `None` when the record exposes no permission check.
    fn can_view(&self) -> Option<bool> {
        None
    }

    /// Render the field-reference expression `expr` as raw text.
    ///
    /// The default walks a dotted path (`Author.Name`) through [`Self::related`]
    /// and renders the final attribute or accessor value. Unresolvable paths
    /// render as an empty string.
    fn render_template(&self, expr: &str) -> String {
        let c_expr = expr.trim().trim_start_matches('$');
        let c_expr = c_expr.strip_suffix(".RAW").unwrap_or(c_expr);
        match c_expr.split_once('.') {
            Some((c_head, c_rest)) => self
                .related(c_head)
                .map(|record| record.render_template(c_rest))
                .unwrap_or_default(),
            None => convert_cell_value_to_text(&read_direct_value(self, c_expr)),
        }
    }
}

/// Record type: schema and display metadata shared by all records of a list.
pub trait ExportSchema {
    /// Schema-declared persisted attributes, in declaration order.
    fn database_fields(&self) -> Vec<String>;

    /// Whether records of this type expose attribute `name`.
    fn has_field(&self, name: &str) -> bool {
        self.database_fields().iter().any(|field| field == name)
    }

    /// Whether records of this type expose zero-argument accessor `accessor`.
    fn has_accessor(&self, _accessor: &str) -> bool {
        false
    }

    /// Type-level export columns, consulted when no sample record exists.
    fn export_fields(&self) -> Option<SpecFieldMap> {
        None
    }

    /// Singular display name.
    fn singular_name(&self) -> String;

    /// Plural display name; also the attachment filename stem.
    fn plural_name(&self) -> String;

    /// Human-readable label for `field`.
    fn field_label(&self, field: &str) -> String {
        derive_label_from_field_name(field)
    }
}

/// Grid state the export action reads its list from.
pub trait ExportGrid {
    /// Record type of the list.
    type Record: ExportRecord;
    /// Record type metadata.
    type Schema: ExportSchema;

    /// Metadata of the grid's model type.
    fn schema(&self) -> &Self::Schema;

    /// Records after the host's filter and sort components, without pagination.
    fn list_unpaginated(&self) -> Vec<Self::Record>;

    /// Display name of the user running the export.
    fn current_user_name(&self) -> Option<String> {
        None
    }
}

/// Read `name` as attribute first, then as `get<name>` accessor.
pub(crate) fn read_direct_value<R: ExportRecord + ?Sized>(record: &R, name: &str) -> EnumCellValue {
    if record.has_field(name) {
        return record.get_field(name);
    }
    let c_accessor = derive_accessor_name(name);
    if record.has_accessor(&c_accessor) {
        return record.call_accessor(&c_accessor);
    }
    EnumCellValue::None
}

/// Accessor name looked up for field `name`.
pub fn derive_accessor_name(name: &str) -> String {
    format!("{}{name}", crate::conf::C_ACCESSOR_PREFIX)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemoryRecord

/// Accessor callback of a [`MemoryRecord`].
pub type FnAccessor = fn(&MemoryRecord) -> EnumCellValue;

/// Record backed by an ordered attribute map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    dict_fields: BTreeMap<String, EnumCellValue>,
    dict_accessors: BTreeMap<String, FnAccessor>,
    dict_related: BTreeMap<String, MemoryRecord>,
    export_fields: Option<SpecFieldMap>,
    can_view: Option<bool>,
}

impl MemoryRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set attribute `name`.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<EnumCellValue>) -> Self {
        self.dict_fields.insert(name.into(), value.into());
        self
    }

    /// Register zero-argument accessor `accessor` (e.g. `getFullName`).
    pub fn with_accessor(mut self, accessor: impl Into<String>, func: FnAccessor) -> Self {
        self.dict_accessors.insert(accessor.into(), func);
        self
    }

    /// Attach related record `name`.
    pub fn with_related(mut self, name: impl Into<String>, record: MemoryRecord) -> Self {
        self.dict_related.insert(name.into(), record);
        self
    }

    /// Provide the record's own export columns.
    pub fn with_export_fields(mut self, fields: SpecFieldMap) -> Self {
        self.export_fields = Some(fields);
        self
    }

    /// Attach a view permission result.
    pub fn with_can_view(mut self, can_view: bool) -> Self {
        self.can_view = Some(can_view);
        self
    }
}

impl ExportRecord for MemoryRecord {
    fn has_field(&self, name: &str) -> bool {
        self.dict_fields.contains_key(name)
    }

    fn get_field(&self, name: &str) -> EnumCellValue {
        self.dict_fields.get(name).cloned().unwrap_or_default()
    }

    fn has_accessor(&self, accessor: &str) -> bool {
        self.dict_accessors.contains_key(accessor)
    }

    fn call_accessor(&self, accessor: &str) -> EnumCellValue {
        self.dict_accessors
            .get(accessor)
            .map(|func| func(self))
            .unwrap_or_default()
    }

    fn export_fields(&self) -> Option<SpecFieldMap> {
        self.export_fields.clone()
    }

    fn related(&self, name: &str) -> Option<Box<dyn ExportRecord + '_>> {
        self.dict_related
            .get(name)
            .map(|record| Box::new(record.clone()) as Box<dyn ExportRecord>)
    }

    fn can_view(&self) -> Option<bool> {
        self.can_view
    }
}

/// Record type described by a field list and display names.
#[derive(Debug, Clone, Default)]
pub struct MemorySchema {
    singular_name: String,
    plural_name: String,
    l_fields: Vec<String>,
    l_accessors: Vec<String>,
    dict_labels: BTreeMap<String, String>,
}

impl MemorySchema {
    /// Create a schema with display names and persisted fields.
    pub fn new<N>(
        singular_name: impl Into<String>,
        plural_name: impl Into<String>,
        fields: impl IntoIterator<Item = N>,
    ) -> Self
    where
        N: Into<String>,
    {
        Self {
            singular_name: singular_name.into(),
            plural_name: plural_name.into(),
            l_fields: fields.into_iter().map(Into::into).collect(),
            l_accessors: Vec::new(),
            dict_labels: BTreeMap::new(),
        }
    }

    /// Declare zero-argument accessor `accessor` on records of this type.
    pub fn with_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.l_accessors.push(accessor.into());
        self
    }

    /// Override the label of `field`.
    pub fn with_label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.dict_labels.insert(field.into(), label.into());
        self
    }
}

impl ExportSchema for MemorySchema {
    fn database_fields(&self) -> Vec<String> {
        self.l_fields.clone()
    }

    fn has_accessor(&self, accessor: &str) -> bool {
        self.l_accessors.iter().any(|c_name| c_name == accessor)
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

/// Grid over an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    /// Model type metadata.
    pub schema: MemorySchema,
    /// Records in display order.
    pub records: Vec<MemoryRecord>,
    /// Exporting user.
    pub user_name: Option<String>,
}

impl ExportGrid for MemoryGrid {
    type Record = MemoryRecord;
    type Schema = MemorySchema;

    fn schema(&self) -> &MemorySchema {
        &self.schema
    }

    fn list_unpaginated(&self) -> Vec<MemoryRecord> {
        self.records.clone()
    }

    fn current_user_name(&self) -> Option<String> {
        self.user_name.clone()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn full_name(record: &MemoryRecord) -> EnumCellValue {
        match (record.get_field("First"), record.get_field("Last")) {
            (EnumCellValue::String(c_first), EnumCellValue::String(c_last)) => {
                EnumCellValue::String(format!("{c_first} {c_last}"))
            }
            _ => EnumCellValue::None,
        }
    }

    #[test]
    fn test_render_template_reads_attribute_and_accessor() {
        let record = MemoryRecord::new()
            .with_field("First", "Ada")
            .with_field("Last", "Lovelace")
            .with_accessor("getFullName", full_name);

        assert_eq!(record.render_template("First"), "Ada");
        assert_eq!(record.render_template("$FullName.RAW"), "Ada Lovelace");
        assert_eq!(record.render_template("Missing"), "");
    }

    #[test]
    fn test_render_template_walks_related_records() {
        let author = MemoryRecord::new().with_field("Name", "Grace");
        let record = MemoryRecord::new().with_related("Author", author);

        assert_eq!(record.render_template("Author.Name"), "Grace");
        assert_eq!(record.render_template("Editor.Name"), "");
    }

    #[test]
    fn test_schema_label_override_and_fallback() {
        let schema = MemorySchema::new("Member", "Members", ["FirstName", "Email"])
            .with_label("Email", "E-mail address");
        assert_eq!(schema.field_label("Email"), "E-mail address");
        assert_eq!(schema.field_label("FirstName"), "First Name");
        assert!(schema.has_field("Email"));
        assert!(!schema.has_field("Surname"));
    }
}
