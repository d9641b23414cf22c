use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path as FsPath, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};

use super::schema::{ChildrenKey, FieldKey};
use super::{AbstractData, Path, Spec, SpecType, Specifier, Value, Variability};
use crate::{usda, usdz};

/// A layer: an addressable collection of specs.
///
/// Layers are edited in memory. Nothing touches the file system until
/// [`Layer::save`] or [`Layer::export`] is called.
#[derive(Debug, Clone)]
pub struct Layer {
    identifier: String,
    real_path: Option<PathBuf>,
    specs: HashMap<Path, Spec>,
}

impl Layer {
    /// Create an empty anonymous layer.
    pub fn new(identifier: impl Into<String>) -> Self {
        let mut specs = HashMap::new();
        specs.insert(Path::abs_root(), Spec::new(SpecType::PseudoRoot));
        Self {
            identifier: identifier.into(),
            real_path: None,
            specs,
        }
    }

    /// Create an empty layer that [`Layer::save`] writes to `path`.
    pub fn create_new(path: impl AsRef<FsPath>) -> Self {
        let path = path.as_ref();
        let mut layer = Self::new(path.display().to_string());
        layer.real_path = Some(path.to_path_buf());
        layer
    }

    /// Build a layer from already parsed specs.
    pub fn from_specs(identifier: impl Into<String>, mut specs: HashMap<Path, Spec>) -> Self {
        specs
            .entry(Path::abs_root())
            .or_insert_with(|| Spec::new(SpecType::PseudoRoot));
        Self {
            identifier: identifier.into(),
            real_path: None,
            specs,
        }
    }

    /// Parse a layer from `.usda` text.
    pub fn from_string(identifier: impl Into<String>, text: &str) -> Result<Self> {
        let identifier = identifier.into();
        let specs = usda::parse(text).with_context(|| format!("Failed to parse layer {identifier}"))?;
        Ok(Self::from_specs(identifier, specs))
    }

    /// Read a layer from disk. Text (`.usda`, `.usd`) and packaged (`.usdz`)
    /// documents are supported.
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let specs = match extension.as_str() {
            "usdz" => {
                let mut archive = usdz::Archive::open(path)?;
                let root = archive
                    .find_root_layer()
                    .with_context(|| format!("No USD layer found in {}", path.display()))?;
                archive.read(&root)?
            }
            "usdc" => bail!("Binary crate files are not supported: {}", path.display()),
            _ => {
                let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
                if bytes.starts_with(b"PXR-USDC") {
                    bail!("Binary crate files are not supported: {}", path.display());
                }
                let text = String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))?;
                usda::parse(&text).with_context(|| format!("Failed to parse USDA: {}", path.display()))?
            }
        };

        let mut layer = Self::from_specs(path.display().to_string(), specs);
        layer.real_path = Some(path.to_path_buf());
        Ok(layer)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// File backing this layer, if any.
    pub fn real_path(&self) -> Option<&FsPath> {
        self.real_path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.len() <= 1
    }

    pub fn specs(&self) -> impl Iterator<Item = (&Path, &Spec)> {
        self.specs.iter()
    }

    pub fn into_specs(self) -> HashMap<Path, Spec> {
        self.specs
    }

    #[inline]
    pub fn has_spec(&self, path: &Path) -> bool {
        self.specs.contains_key(path)
    }

    #[inline]
    pub fn get(&self, path: &Path) -> Option<&Spec> {
        self.specs.get(path)
    }

    #[inline]
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Spec> {
        self.specs.get_mut(path)
    }

    /// Field value authored on the spec at `path`.
    pub fn field(&self, path: &Path, key: impl AsRef<str>) -> Option<&Value> {
        self.specs.get(path).and_then(|spec| spec.get(key))
    }

    /// Author a field on an existing spec.
    pub fn set_field(&mut self, path: &Path, key: impl AsRef<str>, value: impl Into<Value>) -> Result<()> {
        let spec = self
            .specs
            .get_mut(path)
            .with_context(|| format!("No spec at {path}"))?;
        spec.add(key, value);
        Ok(())
    }

    pub fn clear_field(&mut self, path: &Path, key: impl AsRef<str>) -> Option<Value> {
        self.specs.get_mut(path).and_then(|spec| spec.remove(key))
    }

    /// Create a spec at `path` and register it with its parent.
    ///
    /// The parent spec must already exist. An existing spec of the same type
    /// is returned as is.
    pub fn create_spec(&mut self, path: &Path, ty: SpecType) -> Result<&mut Spec> {
        match self.specs.get(path).map(|spec| spec.ty) {
            Some(existing) => ensure!(
                existing == ty,
                "Spec at {path} already exists as {existing:?}, requested {ty:?}"
            ),
            None => {
                if let Some((parent, key, name)) = registration(path)? {
                    let parent_spec = self
                        .specs
                        .get_mut(&parent)
                        .with_context(|| format!("Can't create {path}: no parent spec at {parent}"))?;
                    add_child_name(parent_spec, key, &name);
                }
                self.specs.insert(path.clone(), Spec::new(ty));
            }
        }

        self.specs
            .get_mut(path)
            .ok_or_else(|| anyhow!("Spec at {path} vanished"))
    }

    /// Make sure a prim spec exists at `path`, creating `over` prims for any
    /// missing ancestor (and variant set / variant specs for variant
    /// selections along the way).
    pub fn create_prim_in_layer(&mut self, path: &Path) -> Result<()> {
        ensure!(
            path.is_prim_path() || (path.is_prim_variant_selection_path() && !path.is_variant_set_path()),
            "{path} is not a prim or variant path"
        );

        let mut chain = Vec::new();
        let mut cursor = Some(path.clone());
        while let Some(current) = cursor {
            if current.is_absolute_root() {
                break;
            }
            cursor = current.parent();
            chain.push(current);
        }

        for current in chain.into_iter().rev() {
            if self.has_spec(&current) {
                continue;
            }
            if let Some((set, _)) = current.variant_selection() {
                let prim = current.parent().context("Variant path without a prim")?;
                let set_path = prim.append_variant_selection(set, "")?;
                if !self.has_spec(&set_path) {
                    self.create_spec(&set_path, SpecType::VariantSet)?;
                }
                self.create_spec(&current, SpecType::Variant)?;
            } else {
                let spec = self.create_spec(&current, SpecType::Prim)?;
                spec.add(FieldKey::Specifier, Specifier::Over);
            }
        }
        Ok(())
    }

    /// Define (or redefine) a prim with the given specifier and type name.
    pub fn define_prim(&mut self, path: &Path, specifier: Specifier, type_name: &str) -> Result<&mut Spec> {
        self.create_prim_in_layer(path)?;
        let spec = self
            .specs
            .get_mut(path)
            .with_context(|| format!("No prim spec at {path}"))?;
        spec.add(FieldKey::Specifier, specifier);
        if !type_name.is_empty() {
            spec.add(FieldKey::TypeName, Value::Token(type_name.to_owned()));
        }
        Ok(spec)
    }

    /// Remove the spec at `path` together with everything below it.
    pub fn remove_spec(&mut self, path: &Path) -> Result<()> {
        ensure!(!path.is_absolute_root(), "Can't remove the pseudo-root");
        ensure!(self.has_spec(path), "No spec at {path}");

        if let Some((parent, key, name)) = registration(path)? {
            if let Some(parent_spec) = self.specs.get_mut(&parent) {
                remove_child_name(parent_spec, key, &name);
            }
        }
        self.specs.retain(|candidate, _| !candidate.has_prefix(path));
        Ok(())
    }

    /// Drop every spec below `path` and every field on it, keeping the spec
    /// itself registered with its parent.
    pub fn clear_spec(&mut self, path: &Path) -> Result<&mut Spec> {
        ensure!(self.has_spec(path), "No spec at {path}");
        self.specs
            .retain(|candidate, _| candidate == path || !candidate.has_prefix(path));
        let spec = self
            .specs
            .get_mut(path)
            .ok_or_else(|| anyhow!("Spec at {path} vanished"))?;
        spec.fields.clear();
        Ok(spec)
    }

    /// Create an attribute spec on an existing prim.
    pub fn create_attribute(
        &mut self,
        prim_path: &Path,
        name: &str,
        type_name: &str,
        variability: Variability,
        default: Option<Value>,
    ) -> Result<Path> {
        let path = prim_path.append_property(name)?;
        let spec = self.create_spec(&path, SpecType::Attribute)?;
        spec.add(FieldKey::TypeName, Value::Token(type_name.to_owned()));
        spec.add(FieldKey::Custom, false);
        spec.add(FieldKey::Variability, variability);
        if let Some(value) = default {
            spec.add(FieldKey::Default, value);
        }
        Ok(path)
    }

    /// Remove a property spec if it exists. Returns whether it did.
    pub fn remove_property(&mut self, prim_path: &Path, name: &str) -> Result<bool> {
        let path = prim_path.append_property(name)?;
        if !self.has_spec(&path) {
            return Ok(false);
        }
        self.remove_spec(&path)?;
        Ok(true)
    }

    /// Paths of the direct child specs of `path`: properties, variant sets,
    /// variants and prims, in authored order.
    pub fn child_paths(&self, path: &Path) -> Vec<Path> {
        let Some(spec) = self.specs.get(path) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        if spec.ty == SpecType::VariantSet {
            if let (Some(prim), Some((set, _))) = (path.parent(), path.variant_selection()) {
                out.extend(
                    spec.children(ChildrenKey::VariantChildren)
                        .iter()
                        .filter_map(|variant| prim.append_variant_selection(set, variant).ok()),
                );
            }
            return out;
        }

        out.extend(
            spec.children(ChildrenKey::PropertyChildren)
                .iter()
                .filter_map(|name| path.append_property(name).ok()),
        );
        out.extend(
            spec.children(ChildrenKey::VariantSetChildren)
                .iter()
                .filter_map(|set| path.append_variant_selection(set, "").ok()),
        );
        out.extend(
            spec.children(ChildrenKey::PrimChildren)
                .iter()
                .filter_map(|name| path.append_child(name).ok()),
        );

        out.retain(|child| self.specs.contains_key(child));
        out
    }

    /// Every spec path at or below `root`, parents before children.
    pub fn traverse(&self, root: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(path) = stack.pop() {
            if !self.specs.contains_key(&path) {
                continue;
            }
            let children = self.child_paths(&path);
            out.push(path);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    fn pseudo_root(&self) -> Option<&Spec> {
        self.specs.get(&Path::abs_root())
    }

    fn pseudo_root_mut(&mut self) -> &mut Spec {
        self.specs
            .entry(Path::abs_root())
            .or_insert_with(|| Spec::new(SpecType::PseudoRoot))
    }

    pub fn default_prim(&self) -> Option<&str> {
        self.pseudo_root()
            .and_then(|spec| spec.get(FieldKey::DefaultPrim))
            .and_then(Value::as_text)
    }

    pub fn set_default_prim(&mut self, name: &str) {
        self.pseudo_root_mut()
            .add(FieldKey::DefaultPrim, Value::Token(name.to_owned()));
    }

    pub fn up_axis(&self) -> Option<&str> {
        self.pseudo_root()
            .and_then(|spec| spec.get(FieldKey::UpAxis))
            .and_then(Value::as_text)
    }

    pub fn set_up_axis(&mut self, axis: &str) {
        self.pseudo_root_mut()
            .add(FieldKey::UpAxis, Value::Token(axis.to_owned()));
    }

    /// Sublayer asset paths authored on the pseudo-root, strongest first.
    pub fn sublayer_paths(&self) -> Vec<String> {
        self.pseudo_root()
            .and_then(|spec| spec.get(FieldKey::SubLayers))
            .and_then(Value::as_text_vec)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Serialize to `.usda` text.
    pub fn export_to_string(&self) -> String {
        usda::TextWriter::new(self).write()
    }

    /// Write the layer back to the file it was created for.
    pub fn save(&self) -> Result<()> {
        let path = self
            .real_path
            .as_deref()
            .with_context(|| format!("Layer {} has no file to save to", self.identifier))?;
        self.export(path)
    }

    /// Write the layer to `path`.
    ///
    /// The text is written to a temporary file next to `path` and renamed
    /// into place, so readers never see a partial document.
    pub fn export(&self, path: impl AsRef<FsPath>) -> Result<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        ensure!(
            matches!(extension.as_str(), "usd" | "usda"),
            "Can't write {}: only text layers (.usd, .usda) are supported",
            path.display()
        );

        let text = self.export_to_string();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => FsPath::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        file.write_all(text.as_bytes())
            .context("Failed to write layer contents")?;
        file.as_file()
            .sync_all()
            .context("Failed to flush layer contents")?;
        file.persist(path)
            .map_err(|err| err.error)
            .with_context(|| format!("Failed to move layer into place at {}", path.display()))?;

        Ok(())
    }
}

/// Parent spec, children field and child name `path` is registered under.
fn registration(path: &Path) -> Result<Option<(Path, ChildrenKey, String)>> {
    if path.is_absolute_root() {
        return Ok(None);
    }
    let parent = path.parent().with_context(|| format!("{path} has no parent"))?;

    if path.is_property_path() {
        return Ok(Some((parent, ChildrenKey::PropertyChildren, path.name().to_owned())));
    }
    if let Some((set, selection)) = path.variant_selection() {
        if selection.is_empty() {
            return Ok(Some((parent, ChildrenKey::VariantSetChildren, set.to_owned())));
        }
        let set_path = parent.append_variant_selection(set, "")?;
        return Ok(Some((set_path, ChildrenKey::VariantChildren, selection.to_owned())));
    }
    Ok(Some((parent, ChildrenKey::PrimChildren, path.name().to_owned())))
}

fn add_child_name(spec: &mut Spec, key: ChildrenKey, name: &str) {
    let entry = spec
        .fields
        .entry(key.as_str().to_owned())
        .or_insert_with(|| Value::TokenVec(Vec::new()));
    match entry {
        Value::TokenVec(names) => {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
        other => *other = Value::TokenVec(vec![name.to_owned()]),
    }
}

fn remove_child_name(spec: &mut Spec, key: ChildrenKey, name: &str) {
    if let Some(Value::TokenVec(names)) = spec.fields.get_mut(key.as_str()) {
        names.retain(|n| n != name);
    }
}

impl AbstractData for Layer {
    fn has_spec(&self, path: &Path) -> bool {
        self.specs.contains_key(path)
    }

    fn has_field(&self, path: &Path, field: &str) -> bool {
        self.specs.get(path).is_some_and(|spec| spec.has(field))
    }

    fn spec_type(&self, path: &Path) -> Option<SpecType> {
        self.specs.get(path).map(|spec| spec.ty)
    }

    fn get(&self, path: &Path, field: &str) -> Result<Cow<'_, Value>> {
        self.field(path, field)
            .map(Cow::Borrowed)
            .with_context(|| format!("No field {field} on {path}"))
    }

    fn list(&self, path: &Path) -> Option<Vec<String>> {
        self.specs
            .get(path)
            .map(|spec| spec.fields.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf;

    #[test]
    fn create_prim_in_layer_adds_overs() {
        let mut layer = Layer::new("test");
        let path = sdf::path("/World/Props/Chair").unwrap();
        layer.create_prim_in_layer(&path).unwrap();

        let world = layer.get(&sdf::path("/World").unwrap()).unwrap();
        assert_eq!(world.specifier(), Some(Specifier::Over));
        assert_eq!(world.children(ChildrenKey::PrimChildren), ["Props"]);
        assert_eq!(
            layer.get(&Path::abs_root()).unwrap().children(ChildrenKey::PrimChildren),
            ["World"]
        );
        assert!(layer.has_spec(&path));
    }

    #[test]
    fn create_prim_inside_variant() {
        let mut layer = Layer::new("test");
        let path = sdf::path("/Chair{lod=high}Mesh").unwrap();
        layer.create_prim_in_layer(&path).unwrap();

        let chair = sdf::path("/Chair").unwrap();
        assert_eq!(layer.get(&chair).unwrap().children(ChildrenKey::VariantSetChildren), ["lod"]);
        let set = layer.get(&sdf::path("/Chair{lod=}").unwrap()).unwrap();
        assert_eq!(set.ty, SpecType::VariantSet);
        assert_eq!(set.children(ChildrenKey::VariantChildren), ["high"]);
        assert_eq!(
            layer.spec_type(&sdf::path("/Chair{lod=high}").unwrap()),
            Some(SpecType::Variant)
        );
    }

    #[test]
    fn create_variant_in_layer() {
        let mut layer = Layer::new("test");
        let variant = sdf::path("/Copy{lod=high}").unwrap();
        layer.create_prim_in_layer(&variant).unwrap();

        assert_eq!(layer.get(&sdf::path("/Copy").unwrap()).unwrap().specifier(), Some(Specifier::Over));
        assert_eq!(layer.spec_type(&variant), Some(SpecType::Variant));
        assert_eq!(
            layer.spec_type(&sdf::path("/Copy{lod=}").unwrap()),
            Some(SpecType::VariantSet)
        );

        assert!(layer.create_prim_in_layer(&sdf::path("/Copy{lod=}").unwrap()).is_err());
        assert!(layer.create_prim_in_layer(&sdf::path("/Copy.size").unwrap()).is_err());
    }

    #[test]
    fn create_spec_requires_parent() {
        let mut layer = Layer::new("test");
        assert!(layer
            .create_spec(&sdf::path("/Missing/Child").unwrap(), SpecType::Prim)
            .is_err());
    }

    #[test]
    fn remove_spec_drops_subtree() {
        let mut layer = Layer::new("test");
        let chair = sdf::path("/World/Chair").unwrap();
        layer.define_prim(&chair, Specifier::Def, "Xform").unwrap();
        layer
            .create_attribute(&chair, "size", "double", Variability::Varying, Some(Value::Double(1.0)))
            .unwrap();

        layer.remove_spec(&chair).unwrap();
        assert!(!layer.has_spec(&chair));
        assert!(!layer.has_spec(&sdf::path("/World/Chair.size").unwrap()));
        assert!(layer
            .get(&sdf::path("/World").unwrap())
            .unwrap()
            .children(ChildrenKey::PrimChildren)
            .is_empty());
    }

    #[test]
    fn traverse_is_preorder() {
        let mut layer = Layer::new("test");
        let a = sdf::path("/A").unwrap();
        layer.define_prim(&a, Specifier::Def, "").unwrap();
        layer.define_prim(&sdf::path("/A/B").unwrap(), Specifier::Def, "").unwrap();
        layer
            .create_attribute(&a, "x", "int", Variability::Varying, None)
            .unwrap();
        layer.define_prim(&sdf::path("/A{v=one}C").unwrap(), Specifier::Def, "").unwrap();

        let paths: Vec<String> = layer.traverse(&a).iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, ["/A", "/A.x", "/A{v=}", "/A{v=one}", "/A{v=one}C", "/A/B"]);
    }

    #[test]
    fn layer_metadata() {
        let mut layer = Layer::new("test");
        assert_eq!(layer.default_prim(), None);
        layer.set_default_prim("World");
        layer.set_up_axis("Z");
        assert_eq!(layer.default_prim(), Some("World"));
        assert_eq!(layer.up_axis(), Some("Z"));
    }

    #[test]
    fn export_rejects_binary_extension() {
        let dir = tempfile::tempdir().unwrap();
        let layer = Layer::new("test");
        assert!(layer.export(dir.path().join("out.usdc")).is_err());
        assert!(!dir.path().join("out.usdc").exists());
    }

    #[test]
    fn export_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.usda");

        let mut layer = Layer::create_new(&path);
        layer.define_prim(&sdf::path("/World").unwrap(), Specifier::Def, "Xform").unwrap();
        layer.set_default_prim("World");
        assert!(!path.exists());
        layer.save().unwrap();

        let reopened = Layer::open(&path).unwrap();
        assert_eq!(reopened.default_prim(), Some("World"));
        assert!(reopened.has_spec(&sdf::path("/World").unwrap()));
    }
}
