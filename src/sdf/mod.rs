//! Scene description foundations: paths, values, specs and layers.

use std::borrow::Cow;
use std::collections::HashMap;

use anyhow::Result;

mod copy;
mod layer;
mod list_op;
mod path;
pub mod schema;
mod value;

pub use copy::{copy_spec, copy_spec_with_remap};
pub use layer::Layer;
pub use list_op::ListOp;
pub use path::{is_valid_identifier, is_valid_property_name, Path};
pub use value::{TimeSampleMap, Value};

use schema::{ChildrenKey, FieldKey};

/// Shorthand for [`Path::new`].
#[inline]
pub fn path(path: &str) -> Result<Path> {
    Path::new(path)
}

/// Kind of object a spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecType {
    Attribute,
    Relationship,
    Prim,
    PseudoRoot,
    VariantSet,
    Variant,
}

impl SpecType {
    pub fn is_property(self) -> bool {
        matches!(self, SpecType::Attribute | SpecType::Relationship)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

/// Time offset and scale applied to an arc or sublayer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
        }
    }
}

impl LayerOffset {
    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }
}

/// Reference arc.
///
/// An empty `asset_path` makes the reference internal to the layer stack.
/// An empty `prim_path` targets the referenced layer's default prim.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    pub asset_path: String,
    pub prim_path: Path,
    pub layer_offset: LayerOffset,
}

impl Reference {
    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

/// Payload arc.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub asset_path: String,
    pub prim_path: Path,
    pub layer_offset: Option<LayerOffset>,
}

impl Payload {
    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

/// A single spec: its type and authored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub ty: SpecType,
    pub fields: HashMap<String, Value>,
}

impl Spec {
    pub fn new(ty: SpecType) -> Self {
        Self {
            ty,
            fields: HashMap::new(),
        }
    }

    #[inline]
    pub fn add(&mut self, key: impl AsRef<str>, value: impl Into<Value>) {
        self.fields.insert(key.as_ref().to_owned(), value.into());
    }

    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.fields.get(key.as_ref())
    }

    #[inline]
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Value> {
        self.fields.remove(key.as_ref())
    }

    #[inline]
    pub fn has(&self, key: impl AsRef<str>) -> bool {
        self.fields.contains_key(key.as_ref())
    }

    /// Names stored in a children field.
    pub fn children(&self, key: ChildrenKey) -> &[String] {
        match self.fields.get(key.as_str()) {
            Some(Value::TokenVec(names)) => names,
            _ => &[],
        }
    }

    pub fn specifier(&self) -> Option<Specifier> {
        match self.fields.get(FieldKey::Specifier.as_str()) {
            Some(Value::Specifier(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.fields
            .get(FieldKey::TypeName.as_str())
            .and_then(Value::as_text)
    }

    /// True if the spec holds nothing but (empty) child lists and the
    /// bookkeeping fields every prim carries.
    pub fn is_inert(&self) -> bool {
        self.fields.iter().all(|(key, value)| match value {
            Value::TokenVec(names) if ChildrenKey::is_children_field(key) => names.is_empty(),
            Value::Specifier(Specifier::Over) => key == FieldKey::Specifier.as_str(),
            _ => false,
        })
    }
}

/// Read access to scene description data.
pub trait AbstractData {
    /// Returns true if there is a spec at `path`.
    fn has_spec(&self, path: &Path) -> bool;

    /// Returns true if the spec at `path` has a value for `field`.
    fn has_field(&self, path: &Path, field: &str) -> bool;

    /// Returns the type of the spec at `path`.
    fn spec_type(&self, path: &Path) -> Option<SpecType>;

    /// Returns the value of `field` on the spec at `path`.
    fn get(&self, path: &Path, field: &str) -> Result<Cow<'_, Value>>;

    /// Returns the field names authored on the spec at `path`.
    fn list(&self, path: &Path) -> Option<Vec<String>>;
}
