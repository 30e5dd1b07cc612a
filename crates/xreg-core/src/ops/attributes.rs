use serde_json::{json, Map, Value};
use xreg_core_types::attrs::{CREATEDAT, EPOCH, MODIFIEDAT, TAGS};

use super::context::normalize_timestamp;
use crate::catalog::ModelCatalog;
use crate::commands::WriteMode;
use crate::errors::{RegistryError, Result};
use crate::model::props::is_valid_attr_name;
use crate::model::EntityRecord;

/// Apply client attributes to one entity's props
///
/// Everything is validated before the first change so a rejected write
/// leaves `record` untouched. In `Replace` mode every visible attribute not
/// supplied is dropped, except the server-managed ones and `preserve`.
///
/// # Errors
///
/// Returns `InvalidData` for illegal names or values, `InvalidExtension`
/// for attributes the model does not define.
pub fn write_attributes(
    model: &dyn ModelCatalog,
    record: &mut dyn EntityRecord,
    attrs: &Map<String, Value>,
    mode: WriteMode,
    preserve: &[&str],
) -> Result<()> {
    let path = record.path().clone();
    for (name, value) in attrs {
        if name == TAGS {
            if !(value.is_object() || value.is_null()) {
                return Err(RegistryError::invalid_data(
                    "Attribute \"tags\" must be a map of strings",
                ));
            }
            continue;
        }
        if !is_valid_attr_name(name) {
            return Err(RegistryError::invalid_data(format!(
                "Invalid attribute name \"{}\"",
                name
            )));
        }
        if !value.is_null() {
            model.validate(&path, name, value)?;
        }
    }

    let props = record.props_mut();
    if mode == WriteMode::Replace {
        let mut keep = vec![EPOCH, CREATEDAT, MODIFIEDAT];
        keep.extend_from_slice(preserve);
        props.retain_visible(&keep);
    }
    for (name, value) in attrs {
        match name.as_str() {
            TAGS => match value.as_object() {
                Some(tags) => props.replace_tags(tags)?,
                None => props.clear_tags(),
            },
            CREATEDAT => {
                if let Some(ts) = value.as_str() {
                    props.set(CREATEDAT, json!(normalize_timestamp(ts)?));
                }
            }
            MODIFIEDAT | EPOCH => {}
            _ => props.set(name.clone(), value.clone()),
        }
    }
    Ok(())
}
