//! Layer stacks: a root layer and its sublayers.
//!
//! Sublayers are composed at the layer level, strongest first. The root
//! layer is the strongest; each sublayer's own sublayers follow it directly.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::sdf::{schema::ChildrenKey, schema::FieldKey, Layer, Path as SdfPath, Spec, Specifier, Value};

/// An ordered stack of layers, strongest first.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Load a layer from disk together with all of its sublayers.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = path
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize path: {}", path.display()))?;
        let root = Layer::open(&canonical)?;
        Self::from_layer(root)
    }

    /// Build a stack on top of an already loaded root layer.
    ///
    /// Relative sublayer paths resolve against the root layer's directory,
    /// or the working directory for anonymous layers.
    pub fn from_layer(root: Layer) -> Result<Self> {
        let mut visited = HashSet::new();
        if let Some(real_path) = root.real_path() {
            visited.insert(real_path.to_path_buf());
        }

        let mut layers = Vec::new();
        Self::collect(root, &mut visited, &mut layers)?;
        log::debug!("Opened layer stack of {} layers", layers.len());
        Ok(Self { layers })
    }

    fn collect(layer: Layer, visited: &mut HashSet<PathBuf>, out: &mut Vec<Layer>) -> Result<()> {
        let base_dir = layer
            .real_path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let sublayers = layer.sublayer_paths();
        out.push(layer);

        for sublayer in sublayers {
            let Some(resolved) = resolve_sublayer_path(&sublayer, &base_dir) else {
                log::warn!("Skipping unresolvable sublayer {sublayer}");
                continue;
            };
            // Cycles are cut at the second visit.
            if !visited.insert(resolved.clone()) {
                log::debug!("Sublayer {} already in stack", resolved.display());
                continue;
            }
            let layer = Layer::open(&resolved)
                .with_context(|| format!("Failed to open sublayer {}", resolved.display()))?;
            Self::collect(layer, visited, out)?;
        }
        Ok(())
    }

    pub fn root_layer(&self) -> &Layer {
        &self.layers[0]
    }

    pub fn root_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[0]
    }

    /// All layers, strongest first.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Collapse the stack into a single layer.
    ///
    /// Stronger fields win. Child lists are merged, list ops are composed and
    /// dictionaries are merged key by key. Variant sets and composition arcs
    /// are kept as authored.
    pub fn flatten(&self) -> Layer {
        let mut specs: HashMap<SdfPath, Spec> = HashMap::new();

        for layer in self.layers.iter().rev() {
            for (path, spec) in layer.specs() {
                match specs.get_mut(path) {
                    Some(existing) if existing.ty == spec.ty => compose_fields(spec, existing),
                    _ => {
                        specs.insert(path.clone(), spec.clone());
                    }
                }
            }
        }

        if let Some(root) = specs.get_mut(&SdfPath::abs_root()) {
            root.remove(FieldKey::SubLayers);
            root.remove(FieldKey::SubLayerOffsets);
        }

        let identifier = format!("{}.flattened", self.root_layer().identifier());
        Layer::from_specs(identifier, specs)
    }
}

/// Resolve a sublayer asset path relative to the directory of its layer.
fn resolve_sublayer_path(sublayer_path: &str, base_dir: &Path) -> Option<PathBuf> {
    let clean_path = sublayer_path.trim_matches('@').trim();
    if clean_path.is_empty() {
        return None;
    }

    let candidate = Path::new(clean_path);
    let resolved = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    resolved.canonicalize().ok()
}

/// Compose the fields of `stronger` over `weaker`, in place.
pub(crate) fn compose_fields(stronger: &Spec, weaker: &mut Spec) {
    for (key, value) in &stronger.fields {
        let Some(existing) = weaker.fields.get_mut(key) else {
            weaker.fields.insert(key.clone(), value.clone());
            continue;
        };

        let composed = match (value, &*existing) {
            // An `over` doesn't demote a weaker `def` or `class`.
            (Value::Specifier(Specifier::Over), Value::Specifier(_)) => continue,
            (Value::TokenVec(strong), Value::TokenVec(weak)) if ChildrenKey::is_children_field(key) => {
                let mut names = strong.clone();
                names.extend(weak.iter().filter(|name| !strong.contains(name)).cloned());
                Value::TokenVec(names)
            }
            (Value::PathListOp(strong), Value::PathListOp(weak)) => Value::PathListOp(strong.compose_over(weak)),
            (Value::ReferenceListOp(strong), Value::ReferenceListOp(weak)) => {
                Value::ReferenceListOp(strong.compose_over(weak))
            }
            (Value::PayloadListOp(strong), Value::PayloadListOp(weak)) => {
                Value::PayloadListOp(strong.compose_over(weak))
            }
            (Value::TokenListOp(strong), Value::TokenListOp(weak)) => Value::TokenListOp(strong.compose_over(weak)),
            (Value::StringListOp(strong), Value::StringListOp(weak)) => {
                Value::StringListOp(strong.compose_over(weak))
            }
            (Value::Dictionary(_), Value::Dictionary(_)) => {
                let mut merged = value.clone();
                merged.merge_dictionary(existing);
                merged
            }
            (Value::VariantSelectionMap(strong), Value::VariantSelectionMap(weak)) => {
                let mut merged = weak.clone();
                merged.extend(strong.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::VariantSelectionMap(merged)
            }
            _ => value.clone(),
        };
        *existing = composed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf;
    use std::fs;

    #[test]
    fn compose_single_layer() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root_path = temp_dir.path().join("root.usda");

        fs::write(
            &root_path,
            r#"#usda 1.0
(
    defaultPrim = "World"
)

def Xform "World" {
    double3 xformOp:translate = (1, 2, 3)
}
"#,
        )
        .unwrap();

        let stack = LayerStack::open(&root_path).unwrap();
        assert_eq!(stack.layers().len(), 1);

        let flat = stack.flatten();
        assert!(flat.has_spec(&SdfPath::abs_root()));
        assert!(flat.has_spec(&sdf::path("/World").unwrap()));
        assert_eq!(flat.default_prim(), Some("World"));
    }

    #[test]
    fn stronger_layer_wins() {
        let temp_dir = tempfile::tempdir().unwrap();

        fs::write(
            temp_dir.path().join("sublayer.usda"),
            r#"#usda 1.0

def Xform "Shared" {
    double3 xformOp:translate = (10, 20, 30)
    string comment = "from sublayer"
}

def Xform "FromSublayer" {
}
"#,
        )
        .unwrap();

        let root_path = temp_dir.path().join("root.usda");
        fs::write(
            &root_path,
            r#"#usda 1.0
(
    subLayers = [
        @./sublayer.usda@
    ]
)

over "Shared" {
    double3 xformOp:translate = (1, 2, 3)
}
"#,
        )
        .unwrap();

        let stack = LayerStack::open(&root_path).unwrap();
        assert_eq!(stack.layers().len(), 2);

        let flat = stack.flatten();
        let shared = sdf::path("/Shared").unwrap();
        let translate = flat
            .field(&sdf::path("/Shared.xformOp:translate").unwrap(), FieldKey::Default)
            .unwrap();
        assert_eq!(translate, &Value::Vec3d(vec![1.0, 2.0, 3.0]));

        // Child lists from both layers survive.
        let properties = flat.get(&shared).unwrap().children(ChildrenKey::PropertyChildren);
        assert_eq!(properties, ["xformOp:translate", "comment"]);
        assert!(flat.has_spec(&sdf::path("/Shared.comment").unwrap()));

        let roots = flat.get(&SdfPath::abs_root()).unwrap().children(ChildrenKey::PrimChildren);
        assert_eq!(roots, ["Shared", "FromSublayer"]);
        assert!(flat.sublayer_paths().is_empty());
    }

    #[test]
    fn list_ops_compose_across_layers() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("weak.usda"),
            r#"#usda 1.0
def "Prim" (
    references = </A>
)
{
}
"#,
        )
        .unwrap();
        let root_path = temp_dir.path().join("root.usda");
        fs::write(
            &root_path,
            r#"#usda 1.0
(
    subLayers = [@weak.usda@]
)
over "Prim" (
    prepend references = </B>
)
{
}
"#,
        )
        .unwrap();

        let flat = LayerStack::open(&root_path).unwrap().flatten();
        let references = flat
            .field(&sdf::path("/Prim").unwrap(), FieldKey::References)
            .and_then(|v| v.try_as_reference_list_op_ref())
            .unwrap();
        let targets: Vec<String> = references
            .apply_operations(&[])
            .iter()
            .map(|r| r.prim_path.to_string())
            .collect();
        assert_eq!(targets, ["/B", "/A"]);
    }

    #[test]
    fn circular_sublayers_are_cut() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layer_a = temp_dir.path().join("layer_a.usda");

        fs::write(
            &layer_a,
            r#"#usda 1.0
(
    subLayers = [
        @./layer_b.usda@
    ]
)

def Xform "FromA" {}
"#,
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("layer_b.usda"),
            r#"#usda 1.0
(
    subLayers = [
        @./layer_a.usda@
    ]
)

def Xform "FromB" {}
"#,
        )
        .unwrap();

        let stack = LayerStack::open(&layer_a).unwrap();
        assert_eq!(stack.layers().len(), 2);

        let flat = stack.flatten();
        assert!(flat.has_spec(&sdf::path("/FromA").unwrap()));
        assert!(flat.has_spec(&sdf::path("/FromB").unwrap()));
    }

    #[test]
    fn nested_sublayers_keep_strength_order() {
        let temp_dir = tempfile::tempdir().unwrap();

        fs::write(
            temp_dir.path().join("deep.usda"),
            "#usda 1.0\n\ndef Xform \"Deep\" {\n    string source = \"deep\"\n}\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("middle.usda"),
            "#usda 1.0\n(\n    subLayers = [@./deep.usda@]\n)\n\nover \"Deep\" {\n    string source = \"middle\"\n}\n",
        )
        .unwrap();
        let root_path = temp_dir.path().join("root.usda");
        fs::write(
            &root_path,
            "#usda 1.0\n(\n    subLayers = [@./middle.usda@]\n)\n\ndef Xform \"Root\" {}\n",
        )
        .unwrap();

        let stack = LayerStack::open(&root_path).unwrap();
        assert_eq!(stack.layers().len(), 3);

        let flat = stack.flatten();
        assert!(flat.has_spec(&sdf::path("/Root").unwrap()));
        assert_eq!(
            flat.field(&sdf::path("/Deep.source").unwrap(), FieldKey::Default),
            Some(&Value::String("middle".into()))
        );
        assert_eq!(
            flat.get(&sdf::path("/Deep").unwrap()).unwrap().specifier(),
            Some(sdf::Specifier::Def)
        );
    }

    #[test]
    fn missing_sublayer_is_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root_path = temp_dir.path().join("root.usda");
        fs::write(
            &root_path,
            "#usda 1.0\n(\n    subLayers = [@./missing.usda@]\n)\n\ndef \"Only\" {}\n",
        )
        .unwrap();

        let stack = LayerStack::open(&root_path).unwrap();
        assert_eq!(stack.layers().len(), 1);
    }
}
