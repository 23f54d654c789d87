//! Export action: grid state to an attachment response.
//!
//! [`ExportButton`] is the component a host grid mounts. It publishes three
//! actions (one per format), collects the grid's unpaginated list, drops records
//! the current user cannot view, and runs field selection, sheet building and
//! serialization in sequence.

use log::{info, warn};

use crate::conf::{C_BUTTON_GROUP_LABEL, C_TARGET_FRAGMENT_DEFAULT, EnumExportFormat};
use crate::record::{ExportGrid, ExportRecord, ExportSchema};
use crate::select::resolve_field_map;
use crate::sheet::build_tabular_document;
use crate::spec::{
    Result, SpecButtonEntry, SpecButtonGroup, SpecExportDefaults, SpecExportOptions,
    SpecExportResponse, SpecFieldOverrides,
};
use crate::writer::write_document;

const C_BUTTON_EXTRA_CLASS: &str = "no-ajax";
const C_BUTTON_ICON: &str = "download-csv";

////////////////////////////////////////////////////////////////////////////////
// #region ExportButton

/// Grid component offering XLSX, XLS and CSV downloads of the grid's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportButton {
    /// Fragment the split button is rendered into.
    pub target_fragment: String,
    /// Per-button label mode; `None` falls back to `defaults`.
    pub use_labels_as_headers: Option<bool>,
    /// Field selection overrides applied to every export.
    pub overrides: SpecFieldOverrides,
    /// Process-wide defaults.
    pub defaults: SpecExportDefaults,
}

impl Default for ExportButton {
    fn default() -> Self {
        Self::new(C_TARGET_FRAGMENT_DEFAULT)
    }
}

impl ExportButton {
    /// Create a button rendered into `target_fragment`.
    pub fn new(target_fragment: impl Into<String>) -> Self {
        Self {
            target_fragment: target_fragment.into(),
            use_labels_as_headers: None,
            overrides: SpecFieldOverrides::default(),
            defaults: SpecExportDefaults::default(),
        }
    }

    /// Replace the process-wide defaults.
    pub fn with_defaults(mut self, defaults: SpecExportDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the field selection overrides.
    pub fn with_overrides(mut self, overrides: SpecFieldOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Set the label mode; `None` restores the default.
    pub fn set_use_labels_as_headers(&mut self, value: Option<bool>) -> &mut Self {
        self.use_labels_as_headers = value;
        self
    }

    /// Effective label mode.
    pub fn use_labels_as_headers(&self) -> bool {
        self.options().resolve_use_labels_as_headers(&self.defaults)
    }

    /// Action names this component handles.
    pub fn actions(&self) -> Vec<&'static str> {
        EnumExportFormat::ALL
            .into_iter()
            .map(EnumExportFormat::action_name)
            .collect()
    }

    /// URL sub-routes: action name to handler name.
    pub fn url_handlers(&self) -> Vec<(&'static str, &'static str)> {
        EnumExportFormat::ALL
            .into_iter()
            .map(|fmt| (fmt.action_name(), fmt.handler_name()))
            .collect()
    }

    /// Split button description for the host's renderer.
    pub fn buttons(&self) -> SpecButtonGroup {
        SpecButtonGroup {
            target_fragment: self.target_fragment.clone(),
            label: C_BUTTON_GROUP_LABEL.to_string(),
            icon: C_BUTTON_ICON.to_string(),
            entries: EnumExportFormat::ALL
                .into_iter()
                .map(|fmt| SpecButtonEntry {
                    action_name: fmt.action_name().to_string(),
                    label: fmt.button_label().to_string(),
                    extra_class: C_BUTTON_EXTRA_CLASS.to_string(),
                })
                .collect(),
        }
    }

    /// Dispatch a grid action; `Ok(None)` when the action is not an export.
    pub fn handle_action<G>(
        &self,
        grid: &G,
        action_name: &str,
    ) -> Result<Option<SpecExportResponse>>
    where
        G: ExportGrid,
    {
        match EnumExportFormat::from_action_name(action_name) {
            Some(format) => self.export(grid, format).map(Some),
            None => Ok(None),
        }
    }

    /// Export the grid's whole visible list as `format`.
    pub fn export<G>(&self, grid: &G, format: EnumExportFormat) -> Result<SpecExportResponse>
    where
        G: ExportGrid,
    {
        let l_records = collect_viewable_records(grid);
        let c_creator = grid.current_user_name();
        write_export(
            &l_records,
            grid.schema(),
            format,
            &self.options(),
            &self.defaults,
            c_creator.as_deref(),
        )
    }

    fn options(&self) -> SpecExportOptions {
        SpecExportOptions {
            use_labels_as_headers: self.use_labels_as_headers,
            overrides: self.overrides.clone(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Export

/// Unpaginated grid list without the records the user may not view.
pub fn collect_viewable_records<G>(grid: &G) -> Vec<G::Record>
where
    G: ExportGrid,
{
    let l_records = grid.list_unpaginated();
    let n_total = l_records.len();
    let l_viewable: Vec<G::Record> = l_records
        .into_iter()
        .filter(|record| record.can_view().unwrap_or(true))
        .collect();
    if l_viewable.len() < n_total {
        warn!(
            "{} of {n_total} records filtered out by view permission",
            n_total - l_viewable.len()
        );
    }
    l_viewable
}

/// Export `records` of type `schema` as `format`.
///
/// The field map is resolved from the first record, or from `schema` when the
/// list is empty, so an empty list still produces a header row.
pub fn write_export<R, S>(
    records: &[R],
    schema: &S,
    format: EnumExportFormat,
    options: &SpecExportOptions,
    defaults: &SpecExportDefaults,
    creator: Option<&str>,
) -> Result<SpecExportResponse>
where
    R: ExportRecord,
    S: ExportSchema + ?Sized,
{
    let field_map = resolve_field_map(records.first(), schema, &options.overrides);
    let if_use_labels = options.resolve_use_labels_as_headers(defaults);
    let doc = build_tabular_document(records, schema, &field_map, if_use_labels, creator);
    let body = write_document(&doc, format)?;

    info!(
        "exported {} {} as {} ({} columns, {} bytes)",
        records.len(),
        doc.properties.sheet_name,
        format.extension(),
        doc.width(),
        body.len()
    );
    Ok(derive_export_response(&schema.plural_name(), format, body))
}

/// Export a single record as a one-row document.
pub fn export_record<R, S>(
    record: R,
    schema: &S,
    format: EnumExportFormat,
    options: &SpecExportOptions,
    defaults: &SpecExportDefaults,
    creator: Option<&str>,
) -> Result<SpecExportResponse>
where
    R: ExportRecord,
    S: ExportSchema + ?Sized,
{
    write_export(&[record], schema, format, options, defaults, creator)
}

/// Attach `body` with content type and `attachment; filename="<plural>.<ext>"`.
pub fn derive_export_response(
    plural_name: &str,
    format: EnumExportFormat,
    body: Vec<u8>,
) -> SpecExportResponse {
    let c_stem: String = plural_name
        .chars()
        .filter(|chr| !matches!(chr, '"' | '\r' | '\n'))
        .collect();
    let file_name = format!("{c_stem}.{}", format.extension());
    SpecExportResponse {
        content_type: format.mime_type().to_string(),
        content_disposition: format!("attachment; filename=\"{file_name}\""),
        file_name,
        body,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::record::{MemoryGrid, MemoryRecord, MemorySchema};

    fn grid() -> MemoryGrid {
        MemoryGrid {
            schema: MemorySchema::new("Member", "Members", ["Name", "Email"]),
            records: vec![
                MemoryRecord::new()
                    .with_field("ID", 1)
                    .with_field("Name", "Ann")
                    .with_field("Email", "ann@example.com"),
                MemoryRecord::new()
                    .with_field("ID", 2)
                    .with_field("Name", "Bob")
                    .with_field("Email", "bob@example.com")
                    .with_can_view(false),
                MemoryRecord::new()
                    .with_field("ID", 3)
                    .with_field("Name", "Cy")
                    .with_field("Email", "cy@example.com")
                    .with_can_view(true),
            ],
            user_name: Some("Admin".to_string()),
        }
    }

    #[test]
    fn test_actions_and_url_handlers() {
        let button = ExportButton::default();
        assert_eq!(button.actions(), vec!["xlsxexport", "xlsexport", "csvexport"]);
        assert_eq!(
            button.url_handlers(),
            vec![
                ("xlsxexport", "handleXlsx"),
                ("xlsexport", "handleXls"),
                ("csvexport", "handleCsv"),
            ]
        );
    }

    #[test]
    fn test_buttons_render_into_target_fragment() {
        let group = ExportButton::new("buttons-before-left").buttons();
        assert_eq!(group.target_fragment, "buttons-before-left");
        assert_eq!(group.label, "Export");
        let l_labels: Vec<&str> = group.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            l_labels,
            vec!["Export to Excel (XLSX)", "Export to Excel (XLS)", "Export to CSV"]
        );
        assert_eq!(ExportButton::default().target_fragment, "before");
    }

    #[test]
    fn test_csv_export_filters_unviewable_records() {
        let response = ExportButton::default()
            .handle_action(&grid(), "csvexport")
            .expect("export")
            .expect("handled");

        assert_eq!(response.content_type, "text/csv");
        assert_eq!(response.content_disposition, "attachment; filename=\"Members.csv\"");
        assert_eq!(
            String::from_utf8(response.body).expect("utf8"),
            "ID,Name,Email\n1,Ann,ann@example.com\n3,Cy,cy@example.com\n"
        );
    }

    #[test]
    fn test_unknown_action_is_not_handled() {
        let response = ExportButton::default()
            .handle_action(&grid(), "pdfexport")
            .expect("no error");
        assert!(response.is_none());
    }

    #[test]
    fn test_label_mode_from_defaults_and_button_override() {
        let mut button = ExportButton::default().with_defaults(SpecExportDefaults {
            use_labels_as_headers: true,
        });
        assert!(button.use_labels_as_headers());

        let mut grid = grid();
        grid.schema = grid.schema.clone().with_label("Email", "E-mail");
        grid.records.truncate(1);
        let response = button.export(&grid, EnumExportFormat::Csv).expect("export");
        assert_eq!(
            String::from_utf8(response.body).expect("utf8"),
            "ID,Name,E-mail\n1,Ann,ann@example.com\n"
        );

        button.set_use_labels_as_headers(Some(false));
        assert!(!button.use_labels_as_headers());
    }

    #[test]
    fn test_overrides_apply_to_button_exports() {
        let button = ExportButton::default().with_overrides(SpecFieldOverrides {
            remove_fields: Some(vec!["Email".to_string()]),
            ..Default::default()
        });
        let response = button.export(&grid(), EnumExportFormat::Csv).expect("export");
        assert_eq!(
            String::from_utf8(response.body).expect("utf8"),
            "ID,Name\n1,Ann\n3,Cy\n"
        );
    }

    #[test]
    fn test_empty_grid_exports_header_only() {
        let mut grid = grid();
        grid.records.clear();
        let response = ExportButton::default()
            .export(&grid, EnumExportFormat::Csv)
            .expect("export");
        assert_eq!(response.body, b"ID,Name,Email\n".to_vec());
    }

    #[test]
    fn test_export_record_wraps_single_record() {
        let record = MemoryRecord::new().with_field("ID", 7).with_field("Name", "Dee");
        let schema = MemorySchema::new("Member", "Members", ["Name"]);
        let response = export_record(
            record,
            &schema,
            EnumExportFormat::Xls,
            &SpecExportOptions::default(),
            &SpecExportDefaults::default(),
            None,
        )
        .expect("export");
        assert_eq!(response.content_type, "application/vnd.ms-excel");
        assert_eq!(response.file_name, "Members.xls");
    }

    #[test]
    fn test_filename_strips_header_breaking_chars() {
        let response =
            derive_export_response("Bad \"Names\"\r\n", EnumExportFormat::Xlsx, Vec::new());
        assert_eq!(response.file_name, "Bad Names.xlsx");
        assert_eq!(
            response.headers()[1],
            ("Content-Disposition", "attachment; filename=\"Bad Names.xlsx\"".to_string())
        );
    }
}
