use std::collections::HashMap;

use crate::sdf::schema::{ChildrenKey, FieldKey};
use crate::sdf::{self, Layer, ListOp, Spec, SpecType, Value};

use super::quote;

const INDENT: &str = "    ";

/// Prim metadata written first, in this order. Everything else follows
/// sorted by key.
const PRIM_METADATA_ORDER: &[FieldKey] = &[
    FieldKey::Documentation,
    FieldKey::Active,
    FieldKey::Hidden,
    FieldKey::Instanceable,
    FieldKey::Kind,
    FieldKey::ApiSchemas,
    FieldKey::References,
    FieldKey::Payload,
    FieldKey::InheritPaths,
    FieldKey::Specializes,
    FieldKey::VariantSelection,
    FieldKey::VariantSetNames,
];

const LAYER_METADATA_ORDER: &[FieldKey] = &[
    FieldKey::Documentation,
    FieldKey::DefaultPrim,
    FieldKey::UpAxis,
    FieldKey::MetersPerUnit,
    FieldKey::StartTimeCode,
    FieldKey::EndTimeCode,
    FieldKey::FramesPerSecond,
    FieldKey::TimeCodesPerSecond,
    FieldKey::CustomLayerData,
];

/// Fields that are part of a declaration rather than its metadata block.
const PROPERTY_FIELDS: &[FieldKey] = &[
    FieldKey::TypeName,
    FieldKey::Custom,
    FieldKey::Variability,
    FieldKey::Default,
    FieldKey::TimeSamples,
    FieldKey::ConnectionPaths,
    FieldKey::TargetPaths,
];

/// Serializes a [`Layer`] to `.usda` text.
///
/// Output is deterministic: children follow their authored order and
/// unordered fields are sorted by name.
pub struct TextWriter<'a> {
    layer: &'a Layer,
    out: String,
}

impl<'a> TextWriter<'a> {
    pub fn new(layer: &'a Layer) -> Self {
        Self {
            layer,
            out: String::new(),
        }
    }

    pub fn write(mut self) -> String {
        self.out.push_str("#usda 1.0\n");

        let layer = self.layer;
        let root_path = sdf::Path::abs_root();
        if let Some(root) = layer.get(&root_path) {
            self.write_layer_metadata(root);
            for name in root.children(ChildrenKey::PrimChildren) {
                let Ok(path) = root_path.append_child(name) else {
                    log::warn!("Skipping prim with invalid name {name:?}");
                    continue;
                };
                self.out.push('\n');
                self.write_prim(&path, 0);
            }
        }

        self.out
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn write_layer_metadata(&mut self, root: &Spec) {
        let mut entries = Vec::new();

        if let Some(comment) = root.get(FieldKey::Comment).and_then(Value::as_text) {
            entries.push(quote(comment));
        }
        for key in LAYER_METADATA_ORDER {
            let Some(value) = root.get(key) else { continue };
            let text = match key {
                FieldKey::Documentation => format!("doc = {}", format_untyped(value, 1)),
                FieldKey::DefaultPrim | FieldKey::UpAxis => match value.as_text() {
                    Some(text) => format!("{} = {}", key.as_str(), quote(text)),
                    None => continue,
                },
                _ => format!("{} = {}", key.as_str(), format_value(value, false, 1)),
            };
            entries.push(text);
        }
        entries.extend(self.remaining_fields(root, 1, |name| {
            name == FieldKey::Comment.as_str()
                || name == FieldKey::SubLayers.as_str()
                || name == FieldKey::SubLayerOffsets.as_str()
                || LAYER_METADATA_ORDER.iter().any(|key| key.as_str() == name)
        }));

        let sublayers = root
            .get(FieldKey::SubLayers)
            .and_then(Value::as_text_vec)
            .unwrap_or_default();
        let offsets = match root.get(FieldKey::SubLayerOffsets) {
            Some(Value::LayerOffsetVec(offsets)) => offsets.as_slice(),
            _ => &[],
        };
        if !sublayers.is_empty() {
            let mut text = String::from("subLayers = [\n");
            for (index, sublayer) in sublayers.iter().enumerate() {
                text.push_str(INDENT);
                text.push_str(INDENT);
                text.push_str(&format_asset(sublayer));
                if let Some(offset) = offsets.get(index).filter(|offset| !offset.is_identity()) {
                    text.push(' ');
                    text.push_str(&format_layer_offset(offset));
                }
                if index + 1 < sublayers.len() {
                    text.push(',');
                }
                text.push('\n');
            }
            text.push_str(INDENT);
            text.push(']');
            entries.push(text);
        }

        if entries.is_empty() {
            return;
        }
        self.line(0, "(");
        for entry in entries {
            self.line(1, &entry);
        }
        self.line(0, ")");
    }

    // Generic `name = value` entries for the fields `skip` doesn't claim.
    fn remaining_fields(&self, spec: &Spec, indent: usize, skip: impl Fn(&str) -> bool) -> Vec<String> {
        let mut names: Vec<&String> = spec
            .fields
            .keys()
            .filter(|name| !skip(name) && !ChildrenKey::is_children_field(name))
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| format!("{name} = {}", format_untyped(&spec.fields[name], indent)))
            .collect()
    }

    fn write_prim(&mut self, path: &sdf::Path, indent: usize) {
        let layer = self.layer;
        let Some(spec) = layer.get(path) else {
            log::warn!("Missing spec for {path}");
            return;
        };

        let specifier = spec.specifier().unwrap_or_default();
        let header = match spec.type_name() {
            Some(type_name) if !type_name.is_empty() => {
                format!("{} {type_name} {}", specifier.as_str(), quote(path.name()))
            }
            _ => format!("{} {}", specifier.as_str(), quote(path.name())),
        };

        let metadata = self.prim_metadata(spec, indent + 1);
        if metadata.is_empty() {
            self.line(indent, &header);
        } else {
            self.line(indent, &format!("{header} ("));
            for entry in &metadata {
                self.line(indent + 1, entry);
            }
            self.line(indent, ")");
        }

        self.line(indent, "{");
        self.write_body(path, spec, indent + 1);
        self.line(indent, "}");
    }

    fn write_body(&mut self, path: &sdf::Path, spec: &Spec, indent: usize) {
        let layer = self.layer;
        let mut wrote_something = false;

        for name in spec.children(ChildrenKey::PropertyChildren) {
            let Ok(property_path) = path.append_property(name) else {
                log::warn!("Skipping property with invalid name {name:?} on {path}");
                continue;
            };
            if let Some(property) = layer.get(&property_path) {
                self.write_property(name, property, indent);
                wrote_something = true;
            }
        }

        for set in spec.children(ChildrenKey::VariantSetChildren) {
            if wrote_something {
                self.out.push('\n');
            }
            self.write_variant_set(path, set, indent);
            wrote_something = true;
        }

        for name in spec.children(ChildrenKey::PrimChildren) {
            let Ok(child) = path.append_child(name) else {
                log::warn!("Skipping prim with invalid name {name:?} under {path}");
                continue;
            };
            if wrote_something {
                self.out.push('\n');
            }
            self.write_prim(&child, indent);
            wrote_something = true;
        }
    }

    fn prim_metadata(&self, spec: &Spec, indent: usize) -> Vec<String> {
        let mut entries = Vec::new();

        for key in PRIM_METADATA_ORDER {
            let Some(value) = spec.get(key) else { continue };
            match (key, value) {
                (FieldKey::Documentation, value) => entries.push(format!("doc = {}", format_untyped(value, indent))),
                (FieldKey::Kind, value) => {
                    if let Some(kind) = value.as_text() {
                        entries.push(format!("kind = {}", quote(kind)));
                    }
                }
                (FieldKey::ApiSchemas, Value::TokenListOp(op)) => entries.extend(list_op_lines("apiSchemas", op, |s| quote(s))),
                (FieldKey::References, Value::ReferenceListOp(op)) => {
                    entries.extend(list_op_lines("references", op, format_reference))
                }
                (FieldKey::Payload, Value::PayloadListOp(op)) => entries.extend(list_op_lines("payload", op, format_payload)),
                (FieldKey::InheritPaths, Value::PathListOp(op)) => {
                    entries.extend(list_op_lines("inherits", op, |p| format!("<{p}>")))
                }
                (FieldKey::Specializes, Value::PathListOp(op)) => {
                    entries.extend(list_op_lines("specializes", op, |p| format!("<{p}>")))
                }
                (FieldKey::VariantSelection, Value::VariantSelectionMap(selections)) => {
                    entries.push(format!("variants = {}", format_variant_selections(selections, indent)));
                }
                (FieldKey::VariantSetNames, Value::StringListOp(op) | Value::TokenListOp(op)) => {
                    entries.extend(list_op_lines("variantSets", op, |s| quote(s)))
                }
                (key, value) => entries.push(format!("{} = {}", key.as_str(), format_untyped(value, indent))),
            }
        }

        entries.extend(self.remaining_fields(spec, indent, |name| {
            name == FieldKey::Specifier.as_str()
                || name == FieldKey::TypeName.as_str()
                || PRIM_METADATA_ORDER.iter().any(|key| key.as_str() == name)
        }));
        entries
    }

    fn property_metadata(&self, spec: &Spec, indent: usize) -> Vec<String> {
        let mut entries = Vec::new();
        if let Some(doc) = spec.get(FieldKey::Documentation) {
            entries.push(format!("doc = {}", format_untyped(doc, indent)));
        }
        entries.extend(self.remaining_fields(spec, indent, |name| {
            name == FieldKey::Documentation.as_str() || PROPERTY_FIELDS.iter().any(|key| key.as_str() == name)
        }));
        entries
    }

    fn write_property(&mut self, name: &str, spec: &Spec, indent: usize) {
        let custom = matches!(spec.get(FieldKey::Custom), Some(Value::Bool(true)));
        let metadata = self.property_metadata(spec, indent + 1);

        match spec.ty {
            SpecType::Relationship => {
                let declaration = format!("{}rel {name}", if custom { "custom " } else { "" });
                let targets = match spec.get(FieldKey::TargetPaths) {
                    Some(Value::PathListOp(op)) => Some(op),
                    _ => None,
                };

                match targets {
                    Some(op) if op.explicit => {
                        let line = format!("{declaration} = {}", format_list(&op.explicit_items, |p| format!("<{p}>")));
                        self.write_with_metadata(indent, line, &metadata);
                    }
                    Some(op) => {
                        if !metadata.is_empty() {
                            self.write_with_metadata(indent, declaration.clone(), &metadata);
                        }
                        for line in list_op_lines(&declaration, op, |p| format!("<{p}>")) {
                            self.line(indent, &line);
                        }
                    }
                    None => self.write_with_metadata(indent, declaration, &metadata),
                }
            }
            _ => {
                let type_name = spec
                    .get(FieldKey::TypeName)
                    .and_then(Value::as_text)
                    .map(str::to_owned)
                    .or_else(|| spec.get(FieldKey::Default).map(|v| v.type_name_hint().to_owned()))
                    .unwrap_or_default();
                let is_array = type_name.ends_with("[]");
                let uniform = matches!(
                    spec.get(FieldKey::Variability),
                    Some(Value::Variability(sdf::Variability::Uniform))
                );
                let declaration = format!(
                    "{}{}{type_name} {name}",
                    if custom { "custom " } else { "" },
                    if uniform { "uniform " } else { "" },
                );

                let samples = match spec.get(FieldKey::TimeSamples) {
                    Some(Value::TimeSamples(samples)) => Some(samples),
                    _ => None,
                };
                let connections = match spec.get(FieldKey::ConnectionPaths) {
                    Some(Value::PathListOp(op)) => Some(op),
                    _ => None,
                };

                match spec.get(FieldKey::Default) {
                    Some(value) => {
                        let line = format!("{declaration} = {}", format_value(value, is_array, indent));
                        self.write_with_metadata(indent, line, &metadata);
                    }
                    None if !metadata.is_empty() || (samples.is_none() && connections.is_none()) => {
                        self.write_with_metadata(indent, declaration.clone(), &metadata);
                    }
                    None => {}
                }

                if let Some(samples) = samples {
                    self.line(indent, &format!("{declaration}.timeSamples = {{"));
                    for (time, value) in samples {
                        self.line(
                            indent + 1,
                            &format!("{}: {},", format_f64(*time), format_value(value, is_array, indent + 1)),
                        );
                    }
                    self.line(indent, "}");
                }

                if let Some(op) = connections {
                    for line in list_op_lines(&format!("{declaration}.connect"), op, |p| format!("<{p}>")) {
                        self.line(indent, &line);
                    }
                }
            }
        }
    }

    fn write_with_metadata(&mut self, indent: usize, line: String, metadata: &[String]) {
        if metadata.is_empty() {
            self.line(indent, &line);
            return;
        }
        self.line(indent, &format!("{line} ("));
        for entry in metadata {
            self.line(indent + 1, entry);
        }
        self.line(indent, ")");
    }

    fn write_variant_set(&mut self, prim_path: &sdf::Path, set: &str, indent: usize) {
        let Ok(set_path) = prim_path.append_variant_selection(set, "") else {
            log::warn!("Skipping variant set with invalid name {set:?} on {prim_path}");
            return;
        };
        let layer = self.layer;
        let Some(set_spec) = layer.get(&set_path) else {
            return;
        };

        self.line(indent, &format!("variantSet {} = {{", quote(set)));
        for variant in set_spec.children(ChildrenKey::VariantChildren) {
            let Ok(variant_path) = prim_path.append_variant_selection(set, variant) else {
                continue;
            };
            let Some(variant_spec) = layer.get(&variant_path) else {
                continue;
            };

            let metadata = self.prim_metadata(variant_spec, indent + 2);
            if metadata.is_empty() {
                self.line(indent + 1, &format!("{} {{", quote(variant)));
            } else {
                self.line(indent + 1, &format!("{} (", quote(variant)));
                for entry in &metadata {
                    self.line(indent + 2, entry);
                }
                self.line(indent + 1, ") {");
            }
            self.write_body(&variant_path, variant_spec, indent + 2);
            self.line(indent + 1, "}");
        }
        self.line(indent, "}");
    }
}

fn list_op_lines<T: Clone + PartialEq>(name: &str, op: &ListOp<T>, item: impl Fn(&T) -> String) -> Vec<String> {
    if op.explicit {
        return vec![format!("{name} = {}", format_list(&op.explicit_items, &item))];
    }
    [
        ("delete", &op.deleted_items),
        ("add", &op.added_items),
        ("prepend", &op.prepended_items),
        ("append", &op.appended_items),
        ("reorder", &op.ordered_items),
    ]
    .into_iter()
    .filter(|(_, items)| !items.is_empty())
    .map(|(prefix, items)| format!("{prefix} {name} = {}", format_list(items, &item)))
    .collect()
}

fn format_list<T>(items: &[T], item: impl Fn(&T) -> String) -> String {
    let parts: Vec<String> = items.iter().map(item).collect();
    format!("[{}]", parts.join(", "))
}

fn format_asset(path: &str) -> String {
    if path.contains('@') {
        format!("@@@{path}@@@")
    } else {
        format!("@{path}@")
    }
}

fn format_layer_offset(offset: &sdf::LayerOffset) -> String {
    format!(
        "(offset = {}; scale = {})",
        format_f64(offset.offset),
        format_f64(offset.scale)
    )
}

fn format_arc(asset_path: &str, prim_path: &sdf::Path, offset: Option<&sdf::LayerOffset>) -> String {
    let mut out = String::new();
    if !asset_path.is_empty() {
        out.push_str(&format_asset(asset_path));
    }
    if !prim_path.is_empty() {
        out.push_str(&format!("<{prim_path}>"));
    }
    if let Some(offset) = offset.filter(|offset| !offset.is_identity()) {
        out.push(' ');
        out.push_str(&format_layer_offset(offset));
    }
    out
}

fn format_reference(reference: &sdf::Reference) -> String {
    format_arc(&reference.asset_path, &reference.prim_path, Some(&reference.layer_offset))
}

fn format_payload(payload: &sdf::Payload) -> String {
    format_arc(&payload.asset_path, &payload.prim_path, payload.layer_offset.as_ref())
}

fn format_variant_selections(selections: &HashMap<String, String>, indent: usize) -> String {
    let mut names: Vec<&String> = selections.keys().collect();
    names.sort();

    let mut out = String::from("{\n");
    for name in names {
        push_indent(&mut out, indent + 1);
        out.push_str(&format!("string {name} = {}\n", quote(&selections[name])));
    }
    push_indent(&mut out, indent);
    out.push('}');
    out
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str(INDENT);
    }
}

pub(super) fn format_f64(value: f64) -> String {
    if value.is_nan() {
        "nan".into()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.into()
    } else {
        value.to_string()
    }
}

fn format_f32(value: f32) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        format_f64(f64::from(value))
    }
}

// Untyped numbers keep a decimal point so they read back as doubles.
fn format_untyped_f64(value: f64) -> String {
    let text = format_f64(value);
    if text.contains(['.', 'e', 'n', 'i']) {
        text
    } else {
        format!("{text}.0")
    }
}

fn tuples<T>(values: &[T], arity: usize, is_array: bool, item: impl Fn(&T) -> String) -> String {
    let groups: Vec<String> = values
        .chunks(arity.max(1))
        .map(|chunk| {
            let parts: Vec<String> = chunk.iter().map(&item).collect();
            format!("({})", parts.join(", "))
        })
        .collect();
    if is_array {
        format!("[{}]", groups.join(", "))
    } else {
        groups.into_iter().next().unwrap_or_else(|| "()".into())
    }
}

fn matrices(values: &[f64], size: usize, is_array: bool) -> String {
    let groups: Vec<String> = values
        .chunks(size * size)
        .map(|matrix| {
            let rows: Vec<String> = matrix
                .chunks(size)
                .map(|row| {
                    let parts: Vec<String> = row.iter().map(|v| format_f64(*v)).collect();
                    format!("({})", parts.join(", "))
                })
                .collect();
            format!("( {} )", rows.join(", "))
        })
        .collect();
    if is_array {
        format!("[{}]", groups.join(", "))
    } else {
        groups.into_iter().next().unwrap_or_else(|| "()".into())
    }
}

fn scalars<T>(values: &[T], item: impl Fn(&T) -> String) -> String {
    format_list(values, item)
}

/// Format a typed value, as written after `type name =`.
pub(super) fn format_value(value: &Value, is_array: bool, indent: usize) -> String {
    let arity = value.tuple_arity();
    match value {
        Value::Bool(v) => v.to_string(),
        Value::BoolVec(v) => scalars(v, |b| b.to_string()),
        Value::Uchar(v) => v.to_string(),
        Value::UcharVec(v) => scalars(v, |x| x.to_string()),
        Value::Int(v) => v.to_string(),
        Value::IntVec(v) => scalars(v, |x| x.to_string()),
        Value::Uint(v) => v.to_string(),
        Value::UintVec(v) => scalars(v, |x| x.to_string()),
        Value::Int64(v) => v.to_string(),
        Value::Int64Vec(v) => scalars(v, |x| x.to_string()),
        Value::Uint64(v) => v.to_string(),
        Value::Uint64Vec(v) => scalars(v, |x| x.to_string()),
        Value::Half(v) => format_f32(v.to_f32()),
        Value::HalfVec(v) => scalars(v, |x| format_f32(x.to_f32())),
        Value::Float(v) => format_f32(*v),
        Value::FloatVec(v) => scalars(v, |x| format_f32(*x)),
        Value::Double(v) => format_f64(*v),
        Value::DoubleVec(v) => scalars(v, |x| format_f64(*x)),

        Value::Vec2i(v) | Value::Vec3i(v) | Value::Vec4i(v) => tuples(v, arity, is_array, |x| x.to_string()),
        Value::Vec2h(v) | Value::Vec3h(v) | Value::Vec4h(v) | Value::Quath(v) => {
            tuples(v, arity, is_array, |x| format_f32(x.to_f32()))
        }
        Value::Vec2f(v) | Value::Vec3f(v) | Value::Vec4f(v) | Value::Quatf(v) => {
            tuples(v, arity, is_array, |x| format_f32(*x))
        }
        Value::Vec2d(v) | Value::Vec3d(v) | Value::Vec4d(v) | Value::Quatd(v) => {
            tuples(v, arity, is_array, |x| format_f64(*x))
        }
        Value::Matrix2d(v) => matrices(v, 2, is_array),
        Value::Matrix3d(v) => matrices(v, 3, is_array),
        Value::Matrix4d(v) => matrices(v, 4, is_array),

        Value::String(s) | Value::Token(s) => quote(s),
        Value::StringVec(v) | Value::TokenVec(v) => scalars(v, |s| quote(s)),
        Value::AssetPath(s) => format_asset(s),
        Value::AssetPathVec(v) => scalars(v, |s| format_asset(s)),

        Value::Dictionary(dict) => format_dictionary(dict, indent),
        Value::Specifier(s) => s.as_str().to_owned(),
        Value::Variability(sdf::Variability::Uniform) => "uniform".into(),
        Value::Variability(sdf::Variability::Varying) => "varying".into(),
        Value::ValueBlock => "None".into(),

        Value::TimeSamples(_)
        | Value::PathListOp(_)
        | Value::ReferenceListOp(_)
        | Value::PayloadListOp(_)
        | Value::TokenListOp(_)
        | Value::StringListOp(_)
        | Value::VariantSelectionMap(_)
        | Value::LayerOffsetVec(_) => {
            log::warn!("Value {value:?} has no inline text form");
            "None".into()
        }
    }
}

/// Format a metadata value that is read back without a declared type.
fn format_untyped(value: &Value, indent: usize) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::Float(v) => format_untyped_f64(f64::from(*v)),
        Value::Double(v) => format_untyped_f64(*v),
        Value::TokenVec(v) | Value::StringVec(v) => scalars(v, |s| quote(s)),
        other => format_value(other, other.type_name_hint().ends_with("[]"), indent),
    }
}

fn format_dictionary(dict: &HashMap<String, Value>, indent: usize) -> String {
    let mut keys: Vec<&String> = dict.keys().collect();
    keys.sort();

    let mut out = String::from("{\n");
    for key in keys {
        let value = &dict[key];
        let type_name = value.type_name_hint();
        if type_name.is_empty() {
            log::warn!("Skipping dictionary entry {key:?}: no text form for {value:?}");
            continue;
        }
        let key_text = if sdf::is_valid_identifier(key) {
            key.clone()
        } else {
            quote(key)
        };
        push_indent(&mut out, indent + 1);
        out.push_str(&format!(
            "{type_name} {key_text} = {}\n",
            format_value(value, type_name.ends_with("[]"), indent + 1)
        ));
    }
    push_indent(&mut out, indent);
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::Specifier;

    fn round_trip(layer: &Layer) -> Layer {
        let text = layer.export_to_string();
        Layer::from_string("round_trip.usda", &text).unwrap_or_else(|err| panic!("{err:#}\n{text}"))
    }

    #[test]
    fn write_layer_metadata() {
        let mut layer = Layer::new("meta.usda");
        layer.set_default_prim("World");
        layer.set_up_axis("Z");
        layer
            .set_field(&sdf::Path::abs_root(), FieldKey::MetersPerUnit, 0.01)
            .unwrap();

        let text = layer.export_to_string();
        assert!(text.starts_with("#usda 1.0\n(\n"));
        assert!(text.contains("    defaultPrim = \"World\"\n"));
        assert!(text.contains("    upAxis = \"Z\"\n"));

        let reread = round_trip(&layer);
        assert_eq!(reread.default_prim(), Some("World"));
        assert_eq!(reread.up_axis(), Some("Z"));
        assert_eq!(
            reread.field(&sdf::Path::abs_root(), FieldKey::MetersPerUnit),
            Some(&Value::Double(0.01))
        );
    }

    #[test]
    fn write_prims_and_properties() {
        let mut layer = Layer::new("prims.usda");
        let world = sdf::path("/World").unwrap();
        layer.define_prim(&world, Specifier::Def, "Xform").unwrap();
        layer
            .create_attribute(
                &world,
                "xformOp:translate",
                "double3",
                sdf::Variability::Varying,
                Some(Value::Vec3d(vec![1.0, 2.5, -3.0])),
            )
            .unwrap();
        layer
            .create_attribute(
                &world,
                "xformOpOrder",
                "token[]",
                sdf::Variability::Uniform,
                Some(Value::TokenVec(vec!["xformOp:translate".into()])),
            )
            .unwrap();
        let mesh = sdf::path("/World/Mesh").unwrap();
        layer.define_prim(&mesh, Specifier::Def, "Mesh").unwrap();
        layer
            .create_attribute(
                &mesh,
                "points",
                "point3f[]",
                sdf::Variability::Varying,
                Some(Value::Vec3f(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0])),
            )
            .unwrap();

        let text = layer.export_to_string();
        assert!(text.contains("def Xform \"World\"\n{\n"));
        assert!(text.contains("    double3 xformOp:translate = (1, 2.5, -3)\n"));
        assert!(text.contains("    uniform token[] xformOpOrder = [\"xformOp:translate\"]\n"));
        assert!(text.contains("        point3f[] points = [(0, 0, 0), (1, 0, 0)]\n"));

        let reread = round_trip(&layer);
        let points = sdf::path("/World/Mesh.points").unwrap();
        assert_eq!(
            reread.field(&points, FieldKey::Default),
            Some(&Value::Vec3f(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0]))
        );
        assert_eq!(
            reread.get(&world).unwrap().children(ChildrenKey::PrimChildren),
            ["Mesh"]
        );
    }

    #[test]
    fn write_arcs_variants_and_samples() {
        let text = r#"#usda 1.0
(
    defaultPrim = "Asset"
)

def Xform "Asset" (
    doc = "an asset"
    prepend references = [@./part.usda@</Part> (offset = 5; scale = 1)]
    variants = {
        string lod = "high"
    }
    prepend variantSets = ["lod"]
    customData = {
        int priority = 3
        string "ns:label" = "x"
    }
)
{
    custom float weight = 2 (
        doc = "how heavy"
    )
    float weight.timeSamples = {
        0: 1,
        24: 3.5,
    }
    color3f inputs:color.connect = [</Asset/Shader.outputs:rgb>]
    prepend rel proxy = [</Asset/Proxy>]
    matrix4d xformOp:transform = ( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (4, 5, 6, 1) )

    variantSet "lod" = {
        "high" {
            def Mesh "Detail"
            {
            }
        }
        "low" (
            kind = "component"
        ) {
        }
    }
}
"#;
        let layer = Layer::from_string("source.usda", text).unwrap();
        let reread = round_trip(&layer);
        let again = round_trip(&reread);

        assert_eq!(reread.export_to_string(), again.export_to_string());

        let asset = sdf::path("/Asset").unwrap();
        for path in layer.traverse(&sdf::Path::abs_root()) {
            assert!(reread.has_spec(&path), "{path} lost in round trip");
        }

        let weight = sdf::path("/Asset.weight").unwrap();
        assert_eq!(reread.field(&weight, FieldKey::Default), Some(&Value::Float(2.0)));
        assert_eq!(reread.field(&weight, FieldKey::Custom), Some(&Value::Bool(true)));
        match reread.field(&weight, FieldKey::TimeSamples) {
            Some(Value::TimeSamples(samples)) => assert_eq!(samples.len(), 2),
            other => panic!("unexpected time samples {other:?}"),
        }

        let references = reread
            .field(&asset, FieldKey::References)
            .and_then(|v| v.try_as_reference_list_op_ref())
            .unwrap();
        assert_eq!(references.prepended_items[0].layer_offset.offset, 5.0);

        let matrix = sdf::path("/Asset.xformOp:transform").unwrap();
        assert_eq!(
            reread.field(&matrix, FieldKey::Default),
            layer.field(&matrix, FieldKey::Default)
        );

        let custom_data = reread
            .field(&asset, FieldKey::CustomData)
            .and_then(|v| v.try_as_dictionary_ref())
            .unwrap();
        assert_eq!(custom_data.get("priority"), Some(&Value::Int(3)));
        assert!(custom_data.contains_key("ns:label"));
    }

    #[test]
    fn untyped_doubles_keep_decimal_point() {
        assert_eq!(format_untyped_f64(2.0), "2.0");
        assert_eq!(format_untyped_f64(0.25), "0.25");
        assert_eq!(format_untyped_f64(f64::INFINITY), "inf");
    }
}
