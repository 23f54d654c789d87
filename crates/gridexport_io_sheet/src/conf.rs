//! Export constants, format registry and default preset factories.

use std::str::FromStr;

use crate::spec::{ExportError, SpecSheetPresentation};

/// Excel 2007+ worksheet maximum row count.
pub const N_NROWS_XLSX_MAX: usize = 1_048_576;
/// Excel 2007+ worksheet maximum column count.
pub const N_NCOLS_XLSX_MAX: usize = 16_384;
/// BIFF8 worksheet maximum row count.
pub const N_NROWS_XLS_MAX: usize = 65_536;
/// BIFF8 worksheet maximum column count.
pub const N_NCOLS_XLS_MAX: usize = 256;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text limit, in UTF-16 code units.
pub const N_LEN_CELL_TEXT_MAX: usize = 32_767;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Key of the identifier column pinned first in every field map.
pub const C_FIELD_KEY_ID: &str = "ID";
/// Prefix of zero-argument accessors looked up for a field name.
pub const C_ACCESSOR_PREFIX: &str = "get";

/// Default HTML fragment the export button is rendered into.
pub const C_TARGET_FRAGMENT_DEFAULT: &str = "before";
/// Label of the split button holding the three export actions.
pub const C_BUTTON_GROUP_LABEL: &str = "Export";

/// Number format used for date cells in XLSX output.
pub const C_NUM_FORMAT_DATE: &str = "yyyy-mm-dd";
/// Number format used for datetime cells in XLSX output.
pub const C_NUM_FORMAT_DATETIME: &str = "yyyy-mm-dd hh:mm:ss";

/// Output wire format of one export call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumExportFormat {
    /// Excel 2007 Open XML workbook.
    Xlsx,
    /// Excel 97-2003 BIFF8 workbook.
    Xls,
    /// Comma-separated values.
    Csv,
}

impl EnumExportFormat {
    /// All formats in button order.
    pub const ALL: [EnumExportFormat; 3] = [Self::Xlsx, Self::Xls, Self::Csv];

    /// MIME type sent as `Content-Type`.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
            Self::Csv => "text/csv",
        }
    }

    /// File extension used in the attachment filename.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Csv => "csv",
        }
    }

    /// Grid action name routed to this format.
    pub fn action_name(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsxexport",
            Self::Xls => "xlsexport",
            Self::Csv => "csvexport",
        }
    }

    /// Handler name registered for the action's URL sub-route.
    pub fn handler_name(self) -> &'static str {
        match self {
            Self::Xlsx => "handleXlsx",
            Self::Xls => "handleXls",
            Self::Csv => "handleCsv",
        }
    }

    /// Button label shown in the split button.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Xlsx => "Export to Excel (XLSX)",
            Self::Xls => "Export to Excel (XLS)",
            Self::Csv => "Export to CSV",
        }
    }

    /// Look up the format bound to a grid action name.
    pub fn from_action_name(action_name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|fmt| fmt.action_name() == action_name)
    }
}

impl FromStr for EnumExportFormat {
    type Err = ExportError;

    /// Accepts extensions, the long format tokens and the legacy writer names.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "xlsx-2007" | "excel2007" => Ok(Self::Xlsx),
            "xls" | "xls-legacy" | "excel5" => Ok(Self::Xls),
            "csv" => Ok(Self::Csv),
            _ => Err(ExportError::InvalidFormat(value.to_string())),
        }
    }
}

/// Build the sheet presentation applied to every export.
pub fn derive_default_sheet_presentation() -> SpecSheetPresentation {
    SpecSheetPresentation::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_accepts_extensions_and_writer_names() {
        assert_eq!("xlsx".parse::<EnumExportFormat>().ok(), Some(EnumExportFormat::Xlsx));
        assert_eq!(
            "Excel5".parse::<EnumExportFormat>().ok(),
            Some(EnumExportFormat::Xls)
        );
        assert_eq!(
            "xls-legacy".parse::<EnumExportFormat>().ok(),
            Some(EnumExportFormat::Xls)
        );
        assert_eq!(" CSV ".parse::<EnumExportFormat>().ok(), Some(EnumExportFormat::Csv));
    }

    #[test]
    fn test_format_parse_rejects_unknown_token() {
        let err = "ods".parse::<EnumExportFormat>().unwrap_err();
        assert!(matches!(err, ExportError::InvalidFormat(ref c) if c == "ods"));
    }

    #[test]
    fn test_action_names_map_back_to_formats() {
        for fmt in EnumExportFormat::ALL {
            assert_eq!(EnumExportFormat::from_action_name(fmt.action_name()), Some(fmt));
        }
        assert_eq!(EnumExportFormat::from_action_name("pdfexport"), None);
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(EnumExportFormat::Xls.mime_type(), "application/vnd.ms-excel");
        assert_eq!(EnumExportFormat::Csv.mime_type(), "text/csv");
        assert!(EnumExportFormat::Xlsx.mime_type().ends_with("spreadsheetml.sheet"));
    }
}
