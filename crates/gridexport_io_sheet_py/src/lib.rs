use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use gridexport_io_sheet::action::{ExportButton as RsExportButton, write_export};
use gridexport_io_sheet::conf::EnumExportFormat;
use gridexport_io_sheet::frame::{FrameGrid, FrameRecord};
use gridexport_io_sheet::record::{ExportGrid, ExportRecord, ExportSchema};
use gridexport_io_sheet::spec::{
    EnumCellValue, ExportError, SpecExportDefaults, SpecExportOptions, SpecExportResponse,
    SpecFieldMap, SpecFieldOverrides,
};
use gridexport_io_sheet::util::derive_label_from_field_name;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyBytes, PyDict, PyList};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "gridexport.sheet.export.v1";

////////////////////////////////////////////////////////////////////////////////
// #region PythonHost

/// Python object (or `dict`) seen as an export record.
///
/// Attributes are non-callable members or dict items; accessors are callable
/// members such as `getName`.
struct PyRecord<'py> {
    obj: Bound<'py, PyAny>,
}

impl<'py> PyRecord<'py> {
    fn new(obj: Bound<'py, PyAny>) -> Self {
        Self { obj }
    }

    fn read_member(&self, name: &str) -> Option<Bound<'py, PyAny>> {
        if let Ok(dict) = self.obj.downcast::<PyDict>() {
            return dict.get_item(name).ok().flatten();
        }
        if !self.obj.hasattr(name).unwrap_or(false) {
            return None;
        }
        self.obj.getattr(name).ok()
    }
}

impl ExportRecord for PyRecord<'_> {
    fn has_field(&self, name: &str) -> bool {
        self.read_member(name)
            .is_some_and(|val| !val.is_callable())
    }

    fn get_field(&self, name: &str) -> EnumCellValue {
        self.read_member(name)
            .filter(|val| !val.is_callable())
            .map(|val| derive_cell_value_from_py(&val))
            .unwrap_or_default()
    }

    fn has_accessor(&self, accessor: &str) -> bool {
        self.read_member(accessor)
            .is_some_and(|val| val.is_callable())
    }

    fn call_accessor(&self, accessor: &str) -> EnumCellValue {
        self.read_member(accessor)
            .and_then(|val| val.call0().ok())
            .map(|val| derive_cell_value_from_py(&val))
            .unwrap_or_default()
    }

    fn export_fields(&self) -> Option<SpecFieldMap> {
        let obj_fields = read_member_value(&self.obj, "excel_export_fields").ok()??;
        parse_field_map(&obj_fields).ok()
    }

    fn related(&self, name: &str) -> Option<Box<dyn ExportRecord + '_>> {
        let val = read_member_value(&self.obj, name).ok()??;
        if is_scalar(&val) {
            return None;
        }
        Some(Box::new(PyRecord::new(val)))
    }

    fn can_view(&self) -> Option<bool> {
        match read_member_value(&self.obj, "can_view") {
            Ok(Some(val)) => Some(val.is_truthy().unwrap_or(false)),
            Ok(None) => None,
            Err(_) => Some(false),
        }
    }
}

/// Python record type: names, persisted fields and optional labels.
///
/// Reads `database_fields`, `singular_name`, `plural_name` and, when present,
/// `field_label(field)` and `excel_export_fields`. Members may be plain values
/// or zero-argument callables.
struct PySchema<'py> {
    obj: Bound<'py, PyAny>,
    l_fields: Vec<String>,
    singular_name: String,
    plural_name: String,
}

impl<'py> PySchema<'py> {
    fn from_object(obj: Bound<'py, PyAny>) -> PyResult<Self> {
        let l_fields = match read_member_value(&obj, "database_fields")? {
            Some(val) => parse_field_names(&val)?,
            None => Vec::new(),
        };
        let singular_name = extract_required_member::<String>(&obj, "singular_name")?;
        let plural_name = extract_required_member::<String>(&obj, "plural_name")?;
        Ok(Self {
            obj,
            l_fields,
            singular_name,
            plural_name,
        })
    }
}

impl ExportSchema for PySchema<'_> {
    fn database_fields(&self) -> Vec<String> {
        self.l_fields.clone()
    }

    fn export_fields(&self) -> Option<SpecFieldMap> {
        let obj_fields = read_member_value(&self.obj, "excel_export_fields").ok()??;
        parse_field_map(&obj_fields).ok()
    }

    fn singular_name(&self) -> String {
        self.singular_name.clone()
    }

    fn plural_name(&self) -> String {
        self.plural_name.clone()
    }

    fn field_label(&self, field: &str) -> String {
        self.obj
            .call_method1("field_label", (field,))
            .and_then(|val| val.extract::<String>())
            .unwrap_or_else(|_| derive_label_from_field_name(field))
    }
}

/// Already filtered and sorted list handed over by the Python grid.
struct PyGrid<'py> {
    schema: PySchema<'py>,
    l_records: Vec<Bound<'py, PyAny>>,
    user_name: Option<String>,
}

impl<'py> ExportGrid for PyGrid<'py> {
    type Record = PyRecord<'py>;
    type Schema = PySchema<'py>;

    fn schema(&self) -> &PySchema<'py> {
        &self.schema
    }

    fn list_unpaginated(&self) -> Vec<PyRecord<'py>> {
        self.l_records.iter().cloned().map(PyRecord::new).collect()
    }

    fn current_user_name(&self) -> Option<String> {
        self.user_name.clone()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportButton

#[pyclass(name = "ExportButton")]
struct PyExportButton {
    inner: RsExportButton,
}

#[pymethods]
impl PyExportButton {
    #[new]
    #[pyo3(signature = (
        target_fragment = "before",
        use_labels_as_headers = None,
        custom_fields = None,
        custom_add_fields = None,
        remove_fields = None,
        defaults_json = None
    ))]
    fn new(
        target_fragment: &str,
        use_labels_as_headers: Option<bool>,
        custom_fields: Option<Vec<String>>,
        custom_add_fields: Option<Vec<String>>,
        remove_fields: Option<Vec<String>>,
        defaults_json: Option<&str>,
    ) -> PyResult<Self> {
        let defaults = match defaults_json {
            Some(c_json) => SpecExportDefaults::from_json_str(c_json).map_err(map_export_error)?,
            None => SpecExportDefaults::default(),
        };
        let mut inner = RsExportButton::new(target_fragment)
            .with_defaults(defaults)
            .with_overrides(SpecFieldOverrides {
                custom_fields,
                custom_add_fields,
                remove_fields,
            });
        inner.set_use_labels_as_headers(use_labels_as_headers);
        Ok(Self { inner })
    }

    #[getter]
    fn target_fragment(&self) -> String {
        self.inner.target_fragment.clone()
    }

    #[getter]
    fn get_use_labels_as_headers(&self) -> bool {
        self.inner.use_labels_as_headers()
    }

    #[setter]
    fn set_use_labels_as_headers(&mut self, value: Option<bool>) {
        self.inner.set_use_labels_as_headers(value);
    }

    fn actions(&self) -> Vec<&'static str> {
        self.inner.actions()
    }

    fn url_handlers(&self) -> Vec<(&'static str, &'static str)> {
        self.inner.url_handlers()
    }

    fn buttons<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let group = self.inner.buttons();
        let l_entries = PyList::empty(py);
        for entry in &group.entries {
            let dict_entry = PyDict::new(py);
            dict_entry.set_item("action_name", &entry.action_name)?;
            dict_entry.set_item("label", &entry.label)?;
            dict_entry.set_item("extra_class", &entry.extra_class)?;
            l_entries.append(dict_entry)?;
        }

        let dict_group = PyDict::new(py);
        dict_group.set_item("target_fragment", &group.target_fragment)?;
        dict_group.set_item("label", &group.label)?;
        dict_group.set_item("icon", &group.icon)?;
        dict_group.set_item("entries", l_entries)?;
        Ok(dict_group)
    }

    /// Run `action_name` over `records`; `None` when it is not an export action.
    #[pyo3(signature = (records, schema, action_name, user_name = None))]
    fn handle_action<'py>(
        &self,
        py: Python<'py>,
        records: Vec<Bound<'py, PyAny>>,
        schema: Bound<'py, PyAny>,
        action_name: &str,
        user_name: Option<String>,
    ) -> PyResult<Option<Bound<'py, PyDict>>> {
        let grid = PyGrid {
            schema: PySchema::from_object(schema)?,
            l_records: records,
            user_name,
        };
        match self
            .inner
            .handle_action(&grid, action_name)
            .map_err(map_export_error)?
        {
            Some(response) => Ok(Some(create_response_dict(py, &response)?)),
            None => Ok(None),
        }
    }

    #[pyo3(signature = (records, schema, format, user_name = None))]
    fn export<'py>(
        &self,
        py: Python<'py>,
        records: Vec<Bound<'py, PyAny>>,
        schema: Bound<'py, PyAny>,
        format: &str,
        user_name: Option<String>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let format = parse_export_format(format)?;
        let grid = PyGrid {
            schema: PySchema::from_object(schema)?,
            l_records: records,
            user_name,
        };
        let response = self.inner.export(&grid, format).map_err(map_export_error)?;
        create_response_dict(py, &response)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Functions

/// Export a polars IPC payload (e.g. `df.write_ipc(None).getvalue()`).
#[pyfunction]
#[pyo3(signature = (
    ipc_bytes,
    singular_name,
    plural_name,
    format,
    use_labels_as_headers = false,
    remove_fields = None,
    creator = None
))]
#[allow(clippy::too_many_arguments)]
fn export_ipc_bytes<'py>(
    py: Python<'py>,
    ipc_bytes: &[u8],
    singular_name: &str,
    plural_name: &str,
    format: &str,
    use_labels_as_headers: bool,
    remove_fields: Option<Vec<String>>,
    creator: Option<&str>,
) -> PyResult<Bound<'py, PyDict>> {
    let format = parse_export_format(format)?;
    let grid = FrameGrid::from_ipc_bytes(ipc_bytes, singular_name, plural_name)
        .map_err(map_export_error)?;
    let l_records: Vec<FrameRecord> = grid.list_unpaginated();
    let options = SpecExportOptions {
        use_labels_as_headers: Some(use_labels_as_headers),
        overrides: SpecFieldOverrides {
            remove_fields,
            ..Default::default()
        },
    };
    let response = write_export(
        &l_records,
        grid.schema(),
        format,
        &options,
        &SpecExportDefaults::default(),
        creator,
    )
    .map_err(map_export_error)?;
    create_response_dict(py, &response)
}

/// Format tokens and their MIME types.
#[pyfunction]
fn supported_formats() -> Vec<(&'static str, &'static str)> {
    EnumExportFormat::ALL
        .into_iter()
        .map(|fmt| (fmt.extension(), fmt.mime_type()))
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Conversion

fn derive_cell_value_from_py(val: &Bound<'_, PyAny>) -> EnumCellValue {
    if val.is_none() {
        return EnumCellValue::None;
    }
    if let Ok(v) = val.extract::<bool>() {
        return EnumCellValue::Boolean(v);
    }
    if let Ok(v) = val.extract::<i64>() {
        return EnumCellValue::Integer(v);
    }
    if let Ok(v) = val.extract::<f64>() {
        return EnumCellValue::Number(v);
    }
    if let Ok(v) = val.extract::<NaiveDateTime>() {
        return EnumCellValue::DateTime(v);
    }
    // Aware datetimes; a `datetime` is also a `date`, so this runs first.
    if let Ok(v) = val.extract::<DateTime<FixedOffset>>() {
        return EnumCellValue::from(v);
    }
    if let Ok(v) = val.extract::<NaiveDate>() {
        return EnumCellValue::Date(v);
    }
    if let Ok(v) = val.extract::<String>() {
        return EnumCellValue::String(v);
    }
    val.str()
        .map(|c_text| EnumCellValue::String(c_text.to_string()))
        .unwrap_or_default()
}

fn is_scalar(val: &Bound<'_, PyAny>) -> bool {
    val.is_none()
        || val.extract::<bool>().is_ok()
        || val.extract::<f64>().is_ok()
        || val.extract::<String>().is_ok()
}

fn parse_export_format(format: &str) -> PyResult<EnumExportFormat> {
    format.parse::<EnumExportFormat>().map_err(map_export_error)
}

fn parse_field_names(obj: &Bound<'_, PyAny>) -> PyResult<Vec<String>> {
    if let Ok(dict) = obj.downcast::<PyDict>() {
        return dict.keys().extract::<Vec<String>>();
    }
    obj.extract::<Vec<String>>()
}

/// `dict[key, field]` keeps pairs; a plain sequence maps each name to itself.
fn parse_field_map(obj: &Bound<'_, PyAny>) -> PyResult<SpecFieldMap> {
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut l_pairs = Vec::with_capacity(dict.len());
        for (key, field) in dict.iter() {
            l_pairs.push((key.extract::<String>()?, field.extract::<String>()?));
        }
        return Ok(SpecFieldMap::from_pairs(l_pairs));
    }
    Ok(SpecFieldMap::from_names(obj.extract::<Vec<String>>()?))
}

/// Member value; callables are invoked without arguments.
fn read_member_value<'py>(
    obj: &Bound<'py, PyAny>,
    name: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    let val = if let Ok(dict) = obj.downcast::<PyDict>() {
        dict.get_item(name)?
    } else if obj.hasattr(name)? {
        Some(obj.getattr(name)?)
    } else {
        None
    };
    match val {
        Some(val) if val.is_callable() => Ok(Some(val.call0()?)),
        Some(val) if val.is_none() => Ok(None),
        other => Ok(other),
    }
}

fn extract_required_member<T>(obj: &Bound<'_, PyAny>, name: &str) -> PyResult<T>
where
    for<'a> T: FromPyObject<'a>,
{
    match read_member_value(obj, name)? {
        Some(val) => val.extract::<T>(),
        None => Err(PyValueError::new_err(format!(
            "Record type is missing `{name}`."
        ))),
    }
}

fn create_response_dict<'py>(
    py: Python<'py>,
    response: &SpecExportResponse,
) -> PyResult<Bound<'py, PyDict>> {
    let dict_response = PyDict::new(py);
    dict_response.set_item("file_name", &response.file_name)?;
    dict_response.set_item("content_type", &response.content_type)?;
    dict_response.set_item("content_disposition", &response.content_disposition)?;
    dict_response.set_item("headers", response.headers())?;
    dict_response.set_item("body", PyBytes::new(py, &response.body))?;
    Ok(dict_response)
}

fn map_export_error(err: ExportError) -> PyErr {
    match err {
        ExportError::InvalidFormat(_) | ExportError::Config(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[pymodule]
fn _gridexport_io_sheet_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyExportButton>()?;
    module.add_function(wrap_pyfunction!(export_ipc_bytes, module)?)?;
    module.add_function(wrap_pyfunction!(supported_formats, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    Ok(())
}
