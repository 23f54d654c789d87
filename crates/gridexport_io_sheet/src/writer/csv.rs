//! CSV writer: header row plus one line per record, comma separated.

use csv::{Terminator, WriterBuilder};

use crate::spec::{Result, SpecTabularDocument};
use crate::util::convert_cell_value_to_text;

/// Write `doc` as CSV and return its bytes.
///
/// Fields containing the delimiter, quotes or line breaks are quoted; lines end
/// with `\n`. Presentation metadata has no CSV form and is ignored.
pub fn write_csv_bytes(doc: &SpecTabularDocument) -> Result<Vec<u8>> {
    let mut csv_writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    csv_writer.write_record(&doc.header)?;
    for row in &doc.rows {
        csv_writer.write_record(row.iter().map(convert_cell_value_to_text))?;
    }

    csv_writer.flush()?;
    csv_writer.into_inner().map_err(|err| err.into_error().into())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::EnumCellValue;

    #[test]
    fn test_write_csv_bytes_quotes_only_when_needed() {
        let doc = SpecTabularDocument {
            header: vec!["ID".to_string(), "Name".to_string(), "Joined".to_string()],
            rows: vec![
                vec![
                    EnumCellValue::Integer(1),
                    EnumCellValue::from("Smith, Ann"),
                    EnumCellValue::Date(NaiveDate::from_ymd_opt(2022, 1, 31).expect("date")),
                ],
                vec![
                    EnumCellValue::Integer(2),
                    EnumCellValue::from("say \"hi\""),
                    EnumCellValue::None,
                ],
            ],
            ..Default::default()
        };
        let v_bytes = write_csv_bytes(&doc).expect("write csv");
        assert_eq!(
            String::from_utf8(v_bytes).expect("utf8"),
            "ID,Name,Joined\n1,\"Smith, Ann\",2022-01-31\n2,\"say \"\"hi\"\"\",\n"
        );
    }

    #[test]
    fn test_header_only_document() {
        let doc = SpecTabularDocument {
            header: vec!["ID".to_string()],
            ..Default::default()
        };
        assert_eq!(write_csv_bytes(&doc).expect("write csv"), b"ID\n".to_vec());
    }
}
