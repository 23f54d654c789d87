//! Field selection: which columns an export has and where each value comes from.

use log::debug;

use crate::conf::C_FIELD_KEY_ID;
use crate::record::{ExportRecord, ExportSchema, derive_accessor_name};
use crate::spec::{EnumCellSource, SpecFieldMap, SpecFieldOverrides};

/// Resolve the ordered export column map for a homogeneous list.
///
/// `sample` is the first record of the list. When the list is empty the record
/// type's `schema` answers the capability checks instead, so an empty list still
/// yields a header row.
///
/// Order of operations:
/// 1. `custom_fields` replaces discovery (names the sample cannot read are dropped);
/// 2. otherwise the record's own export fields;
/// 3. otherwise the schema's persisted fields;
/// 4. `custom_add_fields` are appended;
/// 5. `ID` is pinned first;
/// 6. `remove_fields` are dropped.
pub fn resolve_field_map<R, S>(
    sample: Option<&R>,
    schema: &S,
    overrides: &SpecFieldOverrides,
) -> SpecFieldMap
where
    R: ExportRecord + ?Sized,
    S: ExportSchema + ?Sized,
{
    let if_is_readable = |name: &str| match sample {
        Some(record) => {
            record.has_field(name) || record.has_accessor(&derive_accessor_name(name))
        }
        None => schema.has_field(name) || schema.has_accessor(&derive_accessor_name(name)),
    };

    let mut field_map = if let Some(l_custom_fields) = &overrides.custom_fields {
        let mut map = SpecFieldMap::new();
        for c_name in l_custom_fields {
            if if_is_readable(c_name) {
                map.insert(c_name.as_str(), c_name.as_str());
            } else {
                debug!("custom field {c_name:?} is not readable; skipped");
            }
        }
        map
    } else if let Some(map) = sample
        .and_then(|record| record.export_fields())
        .or_else(|| sample.is_none().then(|| schema.export_fields()).flatten())
    {
        map
    } else {
        SpecFieldMap::from_names(schema.database_fields())
    };

    if let Some(l_custom_add_fields) = &overrides.custom_add_fields {
        for c_name in l_custom_add_fields {
            if if_is_readable(c_name) {
                field_map.insert(c_name.as_str(), c_name.as_str());
            } else {
                debug!("custom add field {c_name:?} is not readable; skipped");
            }
        }
    }

    field_map.prepend(C_FIELD_KEY_ID, C_FIELD_KEY_ID);

    if let Some(l_remove_fields) = &overrides.remove_fields {
        for c_name in l_remove_fields {
            field_map.remove(c_name);
        }
    }

    if let Some(record) = sample {
        bind_cell_sources(&mut field_map, record);
    }

    debug!("resolved export fields: {:?}", field_map.keys());
    field_map
}

/// Decide, once per field, how `record` yields its value.
///
/// Attribute wins over accessor; anything else is rendered as a template.
pub fn derive_cell_source<R>(record: &R, field: &str) -> EnumCellSource
where
    R: ExportRecord + ?Sized,
{
    if record.has_field(field) {
        return EnumCellSource::Attribute(field.to_string());
    }
    let c_accessor = derive_accessor_name(field);
    if record.has_accessor(&c_accessor) {
        return EnumCellSource::Accessor(c_accessor);
    }
    EnumCellSource::Template(field.to_string())
}

/// Bind every entry's value source against a representative record.
pub fn bind_cell_sources<R>(field_map: &mut SpecFieldMap, record: &R)
where
    R: ExportRecord + ?Sized,
{
    for entry in field_map.iter_mut() {
        entry.source = Some(derive_cell_source(record, &entry.field));
    }
}
