//! Sheet building: record list plus field map to an in-memory tabular document.

use crate::conf::derive_default_sheet_presentation;
use crate::record::{ExportRecord, ExportSchema};
use crate::row::materialize_row;
use crate::spec::{SpecDocumentProperties, SpecFieldMap, SpecTabularDocument};
use crate::util::{clamp_cell_value, sanitize_sheet_name, truncate_cell_text};

/// Header text per column: the schema's label in label mode, else the raw key.
pub fn derive_header_row<S>(
    field_map: &SpecFieldMap,
    schema: &S,
    if_use_labels: bool,
) -> Vec<String>
where
    S: ExportSchema + ?Sized,
{
    field_map
        .iter()
        .map(|entry| {
            let c_text = if if_use_labels {
                schema.field_label(&entry.key)
            } else {
                entry.key.clone()
            };
            truncate_cell_text(&c_text).to_string()
        })
        .collect()
}

/// Workbook metadata for an export of `schema` records by `creator`.
pub fn derive_document_properties<S>(schema: &S, creator: Option<&str>) -> SpecDocumentProperties
where
    S: ExportSchema + ?Sized,
{
    let c_singular = schema.singular_name();
    let c_plural = schema.plural_name();
    SpecDocumentProperties {
        creator: creator.unwrap_or_default().to_string(),
        title: format!("{c_singular} export"),
        description: format!("List of {c_plural} exported"),
        sheet_name: sanitize_sheet_name(&c_plural, "_"),
    }
}

/// Build the document: one header row and one data row per record, in list order.
///
/// Text longer than Excel's cell limit is cut to the limit here, so every format
/// carries the same values.
///
/// Presentation (bold filtered header, frozen first row and column, fitted
/// columns) is attached as metadata for the writers.
pub fn build_tabular_document<R, S>(
    records: &[R],
    schema: &S,
    field_map: &SpecFieldMap,
    if_use_labels: bool,
    creator: Option<&str>,
) -> SpecTabularDocument
where
    R: ExportRecord,
    S: ExportSchema + ?Sized,
{
    SpecTabularDocument {
        properties: derive_document_properties(schema, creator),
        presentation: derive_default_sheet_presentation(),
        header: derive_header_row(field_map, schema, if_use_labels),
        rows: records
            .iter()
            .map(|record| {
                materialize_row(record, field_map)
                    .into_iter()
                    .map(clamp_cell_value)
                    .collect()
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::conf::N_LEN_CELL_TEXT_MAX;
    use crate::record::{MemoryRecord, MemorySchema};
    use crate::select::resolve_field_map;
    use crate::spec::{EnumCellValue, SpecFieldOverrides};

    fn schema() -> MemorySchema {
        MemorySchema::new("Member", "Members", ["Name", "Email"]).with_label("Email", "E-mail")
    }

    fn records() -> Vec<MemoryRecord> {
        (1..=3)
            .map(|n_idx| {
                MemoryRecord::new()
                    .with_field("ID", n_idx)
                    .with_field("Name", format!("User {n_idx}"))
                    .with_field("Email", format!("u{n_idx}@example.com"))
            })
            .collect()
    }

    #[test]
    fn test_three_records_give_header_plus_three_rows() {
        let l_records = records();
        let map = resolve_field_map(l_records.first(), &schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document(&l_records, &schema(), &map, false, None);

        assert_eq!(doc.height(), 4);
        assert_eq!(doc.width(), 3);
        assert_eq!(doc.header, vec!["ID", "Name", "Email"]);
        assert_eq!(doc.cell(4, 2), Some(EnumCellValue::from("User 3")));
    }

    #[test]
    fn test_label_mode_uses_schema_labels() {
        let l_records = records();
        let map = resolve_field_map(l_records.first(), &schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document(&l_records, &schema(), &map, true, None);
        assert_eq!(doc.header, vec!["ID", "Name", "E-mail"]);
    }

    #[test]
    fn test_empty_list_gives_header_only() {
        let map =
            resolve_field_map::<MemoryRecord, _>(None, &schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document::<MemoryRecord, _>(&[], &schema(), &map, false, None);
        assert_eq!(doc.height(), 1);
        assert_eq!(doc.header, vec!["ID", "Name", "Email"]);
        assert!(doc.rows.is_empty());
    }

    #[test]
    fn test_long_text_is_cut_to_cell_limit() {
        let l_records = vec![
            MemoryRecord::new()
                .with_field("ID", 1)
                .with_field("Name", "x".repeat(40_000)),
        ];
        let map = resolve_field_map(l_records.first(), &schema(), &SpecFieldOverrides::default());
        let doc = build_tabular_document(&l_records, &schema(), &map, false, None);
        assert_eq!(
            doc.cell(2, 2),
            Some(EnumCellValue::String("x".repeat(N_LEN_CELL_TEXT_MAX)))
        );
    }

    #[test]
    fn test_document_properties() {
        let props = derive_document_properties(&schema(), Some("Admin"));
        assert_eq!(props.creator, "Admin");
        assert_eq!(props.title, "Member export");
        assert_eq!(props.description, "List of Members exported");
        assert_eq!(props.sheet_name, "Members");
    }
}
