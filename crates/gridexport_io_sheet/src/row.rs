//! Row materialization: one record to one ordered list of cell values.

use crate::record::ExportRecord;
use crate::select::derive_cell_source;
use crate::spec::{EnumCellSource, EnumCellValue, SpecFieldMap};

/// Read one cell value of `record` through `source`.
///
/// Attribute and accessor values pass through unmodified; template sources
/// become the rendered text.
pub fn read_cell_value<R>(record: &R, source: &EnumCellSource) -> EnumCellValue
where
    R: ExportRecord + ?Sized,
{
    match source {
        EnumCellSource::Attribute(c_name) => record.get_field(c_name),
        EnumCellSource::Accessor(c_accessor) => record.call_accessor(c_accessor),
        EnumCellSource::Template(c_expr) => EnumCellValue::String(record.render_template(c_expr)),
    }
}

/// Produce the cell values of `record`, one per `field_map` entry, in column order.
///
/// Entries without a bound source are looked up against this record.
pub fn materialize_row<R>(record: &R, field_map: &SpecFieldMap) -> Vec<EnumCellValue>
where
    R: ExportRecord + ?Sized,
{
    field_map
        .iter()
        .map(|entry| match &entry.source {
            Some(source) => read_cell_value(record, source),
            None => read_cell_value(record, &derive_cell_source(record, &entry.field)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::record::MemoryRecord;
    use crate::select::bind_cell_sources;

    fn shout(record: &MemoryRecord) -> EnumCellValue {
        match record.get_field("Name") {
            EnumCellValue::String(c_name) => EnumCellValue::String(c_name.to_uppercase()),
            _ => EnumCellValue::None,
        }
    }

    #[test]
    fn test_values_pass_through_unmodified() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).expect("date");
        let record = MemoryRecord::new()
            .with_field("ID", 9)
            .with_field("Score", 1.25)
            .with_field("Active", false)
            .with_field("Joined", date)
            .with_field("Note", EnumCellValue::None);
        let map = SpecFieldMap::from_names(["ID", "Score", "Active", "Joined", "Note"]);

        assert_eq!(
            materialize_row(&record, &map),
            vec![
                EnumCellValue::Integer(9),
                EnumCellValue::Number(1.25),
                EnumCellValue::Boolean(false),
                EnumCellValue::Date(date),
                EnumCellValue::None,
            ]
        );
    }

    #[test]
    fn test_accessor_and_template_fallback() {
        let author = MemoryRecord::new().with_field("Name", "Rosalind");
        let record = MemoryRecord::new()
            .with_field("Name", "ann")
            .with_accessor("getShout", shout)
            .with_related("Author", author);
        let mut map = SpecFieldMap::from_pairs([
            ("Shout", "Shout"),
            ("Author", "Author.Name"),
            ("Missing", "Nope"),
        ]);
        bind_cell_sources(&mut map, &record);

        assert_eq!(
            materialize_row(&record, &map),
            vec![
                EnumCellValue::from("ANN"),
                EnumCellValue::from("Rosalind"),
                EnumCellValue::from(""),
            ]
        );
    }

    #[test]
    fn test_unbound_entries_are_resolved_per_record() {
        let record = MemoryRecord::new().with_field("Name", "Zed");
        let map = SpecFieldMap::from_pairs([("Label", "Name")]);
        assert_eq!(materialize_row(&record, &map), vec![EnumCellValue::from("Zed")]);
    }
}
