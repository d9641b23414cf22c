use super::{ExportError, ExportOptions};
use crate::sdf::{Layer, Path, Value, Variability};

pub const DISPLAY_GROUP: &str = "ui:displayGroup";
pub const DISPLAY_NAME: &str = "ui:displayName";
pub const ORDER: &str = "ui:order";

/// Author the UI grouping attributes on an exported prim.
///
/// Each attribute is only created when the prim doesn't carry it already.
/// The display name is the prim's name in the exported layer.
pub fn stamp_ui_metadata(layer: &mut Layer, prim: &Path, options: &ExportOptions) -> Result<(), ExportError> {
    if !layer.has_spec(prim) {
        return Err(ExportError::Precondition(format!("no prim spec at {prim} to stamp")));
    }

    let attributes = [
        (DISPLAY_GROUP, "token", Value::Token(options.display_group.clone())),
        (DISPLAY_NAME, "token", Value::Token(prim.name().to_owned())),
        (ORDER, "int", Value::Int(options.order)),
    ];
    for (name, type_name, value) in attributes {
        if layer.has_spec(&prim.append_property(name)?) {
            continue;
        }
        layer.create_attribute(prim, name, type_name, Variability::Varying, Some(value))?;
    }
    Ok(())
}
