use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path as FsPath;

use anyhow::{ensure, Context, Result};

use crate::composition::{compose_fields, LayerStack};
use crate::sdf::schema::{ChildrenKey, FieldKey};
use crate::sdf::{Layer, Path, Spec, SpecType, Value};

use super::PopulationMask;

/// Time at which attribute values are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeCode {
    /// The authored default, ignoring time samples.
    #[default]
    Default,
    At(f64),
}

/// Composed view of a layer stack.
///
/// Opinions come from the layers of the stack and from the selected variants
/// of each prim. Layers are stronger than variants authored in them, and a
/// prim's own site is stronger than its variants. References, payloads,
/// inherits and specializes are kept as authored and not traversed.
#[derive(Debug, Clone)]
pub struct Stage {
    layers: LayerStack,
    mask: Option<PopulationMask>,
}

impl Stage {
    /// Open a stage on a layer file and its sublayers.
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        let layers = LayerStack::open(path)?;
        Ok(Self { layers, mask: None })
    }

    pub fn from_layer(layer: Layer) -> Result<Self> {
        let layers = LayerStack::from_layer(layer)?;
        Ok(Self { layers, mask: None })
    }

    /// Open a stage that only populates the prims `mask` includes.
    pub fn open_masked(layer: Layer, mask: PopulationMask) -> Result<Self> {
        let layers = LayerStack::from_layer(layer)?;
        Ok(Self {
            layers,
            mask: Some(mask),
        })
    }

    pub fn layer_stack(&self) -> &LayerStack {
        &self.layers
    }

    pub fn root_layer(&self) -> &Layer {
        self.layers.root_layer()
    }

    /// The root layer, where variant selections made through the stage are
    /// authored.
    pub fn root_layer_mut(&mut self) -> &mut Layer {
        self.layers.root_layer_mut()
    }

    pub fn mask(&self) -> Option<&PopulationMask> {
        self.mask.as_ref()
    }

    fn layer_metadata(&self, key: FieldKey) -> Option<&Value> {
        let root = Path::abs_root();
        self.layers
            .layers()
            .iter()
            .find_map(|layer| layer.field(&root, key))
    }

    pub fn up_axis(&self) -> Option<&str> {
        self.layer_metadata(FieldKey::UpAxis).and_then(Value::as_text)
    }

    pub fn default_prim(&self) -> Option<&str> {
        self.layer_metadata(FieldKey::DefaultPrim)
            .and_then(Value::as_text)
    }

    fn any_spec(&self, path: &Path) -> bool {
        self.layers.layers().iter().any(|layer| layer.has_spec(path))
    }

    // Specs authored at `sites`, strongest first.
    fn opinions<'a>(&'a self, sites: &'a [Path]) -> impl Iterator<Item = &'a Spec> + 'a {
        sites.iter().flat_map(move |site| {
            self.layers
                .layers()
                .iter()
                .filter_map(move |layer| layer.get(site))
        })
    }

    /// Namespace locations contributing opinions to the prim at `path`,
    /// strongest first: the prim path itself, then the selected variants.
    ///
    /// `/Model/Geom` with `lod = "high"` selected on `/Model` yields
    /// `/Model/Geom` and `/Model{lod=high}Geom`.
    pub fn prim_sites(&self, path: &Path) -> Vec<Path> {
        if path.is_absolute_root() {
            return vec![path.clone()];
        }
        let Some(parent) = path.parent() else {
            return Vec::new();
        };

        let mut sites: Vec<Path> = self
            .prim_sites(&parent)
            .iter()
            .filter_map(|site| site.append_child(path.name()).ok())
            .filter(|site| self.any_spec(site))
            .collect();

        // Variants may nest, so selections found inside a variant are
        // expanded as well.
        let mut index = 0;
        while index < sites.len() {
            let site = sites[index].clone();
            let sets: Vec<String> = self
                .opinions(std::slice::from_ref(&site))
                .flat_map(|spec| spec.children(ChildrenKey::VariantSetChildren).to_vec())
                .collect();
            for set in sets {
                let Some(selection) = self.selection_in(&sites, &set) else {
                    continue;
                };
                let Ok(variant) = site.append_variant_selection(&set, &selection) else {
                    continue;
                };
                if self.any_spec(&variant) && !sites.contains(&variant) {
                    sites.push(variant);
                }
            }
            index += 1;
        }

        sites
    }

    // Strongest authored selection for `set` across `sites`. An empty
    // selection explicitly selects nothing.
    fn selection_in(&self, sites: &[Path], set: &str) -> Option<String> {
        for spec in self.opinions(sites) {
            if let Some(Value::VariantSelectionMap(map)) = spec.get(FieldKey::VariantSelection) {
                if let Some(selection) = map.get(set) {
                    return (!selection.is_empty()).then(|| selection.clone());
                }
            }
        }
        None
    }

    /// True if a prim is populated at `path`: authored somewhere in the
    /// stack, inside the mask, and not below an inactive ancestor.
    pub fn has_prim(&self, path: &Path) -> bool {
        if path.is_absolute_root() {
            return true;
        }
        if !path.is_prim_path() || path.contains_variant_selection() {
            return false;
        }
        if let Some(mask) = &self.mask {
            if !mask.includes(path) {
                return false;
            }
        }
        let Some(parent) = path.parent() else {
            return false;
        };
        self.has_prim(&parent) && self.is_active(&parent) && !self.prim_sites(path).is_empty()
    }

    /// Strongest opinion for a prim field.
    pub fn prim_field(&self, path: &Path, key: impl AsRef<str>) -> Option<&Value> {
        let sites = self.prim_sites(path);
        let key = key.as_ref();
        for site in &sites {
            for layer in self.layers.layers() {
                if let Some(value) = layer.field(site, key) {
                    return Some(value);
                }
            }
        }
        None
    }

    pub fn prim_type_name(&self, path: &Path) -> Option<&str> {
        self.prim_field(path, FieldKey::TypeName)
            .and_then(Value::as_text)
            .filter(|name| !name.is_empty())
    }

    /// Prims are active unless an opinion says otherwise.
    pub fn is_active(&self, path: &Path) -> bool {
        !matches!(self.prim_field(path, FieldKey::Active), Some(Value::Bool(false)))
    }

    /// Populated child prims in composed order.
    pub fn children(&self, path: &Path) -> Vec<Path> {
        if !self.is_active(path) {
            return Vec::new();
        }

        let sites = self.prim_sites(path);
        let mut names: Vec<String> = Vec::new();
        for spec in self.opinions(&sites) {
            for name in spec.children(ChildrenKey::PrimChildren) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }

        names
            .iter()
            .filter_map(|name| path.append_child(name).ok())
            .filter(|child| self.has_prim(child))
            .collect()
    }

    /// Every populated prim below `path`, parents first.
    pub fn descendants(&self, path: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        let mut stack: Vec<Path> = self.children(path).into_iter().rev().collect();
        while let Some(prim) = stack.pop() {
            stack.extend(self.children(&prim).into_iter().rev());
            out.push(prim);
        }
        out
    }

    /// Names of the properties authored on the prim in any contributing site.
    pub fn property_names(&self, path: &Path) -> Vec<String> {
        let sites = self.prim_sites(path);
        let mut names: Vec<String> = Vec::new();
        for spec in self.opinions(&sites) {
            for name in spec.children(ChildrenKey::PropertyChildren) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Strongest opinion for a property field.
    pub fn property_field(&self, prim: &Path, name: &str, key: impl AsRef<str>) -> Option<&Value> {
        let key = key.as_ref();
        for site in self.property_sites(prim, name) {
            for layer in self.layers.layers() {
                if let Some(value) = layer.field(&site, key) {
                    return Some(value);
                }
            }
        }
        None
    }

    fn property_sites(&self, prim: &Path, name: &str) -> Vec<Path> {
        self.prim_sites(prim)
            .iter()
            .filter_map(|site| site.append_property(name).ok())
            .collect()
    }

    /// Resolve an attribute value.
    ///
    /// The strongest spec holding a default or time samples wins. Time
    /// samples are held: the value at `time` is the last sample at or before
    /// it, or the first sample for earlier times. A value block resolves to
    /// `None`.
    pub fn attribute_value(&self, prim: &Path, name: &str, time: TimeCode) -> Option<Value> {
        let sites = self.property_sites(prim, name);
        for spec in self.opinions(&sites) {
            if spec.ty != SpecType::Attribute {
                continue;
            }
            if let (TimeCode::At(time), Some(Value::TimeSamples(samples))) = (time, spec.get(FieldKey::TimeSamples)) {
                if let Some(value) = held_sample(samples, time) {
                    return unblocked(value);
                }
            }
            if let Some(value) = spec.get(FieldKey::Default) {
                return unblocked(value);
            }
        }
        None
    }

    /// Variant sets of the prim, in authored order.
    pub fn variant_set_names(&self, path: &Path) -> Vec<String> {
        let sites = self.prim_sites(path);
        let mut names: Vec<String> = Vec::new();
        for spec in self.opinions(&sites) {
            let listed = match spec.get(FieldKey::VariantSetNames) {
                Some(Value::TokenListOp(op)) | Some(Value::StringListOp(op)) => op.flatten(),
                _ => Vec::new(),
            };
            for name in spec.children(ChildrenKey::VariantSetChildren).iter().chain(&listed) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Variants authored in `set` on the prim.
    pub fn variant_names(&self, path: &Path, set: &str) -> Vec<String> {
        let set_sites: Vec<Path> = self
            .prim_sites(path)
            .iter()
            .filter_map(|site| site.append_variant_selection(set, "").ok())
            .collect();

        let mut names: Vec<String> = Vec::new();
        for spec in self.opinions(&set_sites) {
            for name in spec.children(ChildrenKey::VariantChildren) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Currently active selection of `set`, if any.
    pub fn variant_selection(&self, path: &Path, set: &str) -> Option<String> {
        self.selection_in(&self.prim_sites(path), set)
    }

    // Selection authored in the root layer, without composition.
    fn authored_selection(&self, path: &Path, set: &str) -> Option<String> {
        match self.root_layer().field(path, FieldKey::VariantSelection) {
            Some(Value::VariantSelectionMap(map)) => map.get(set).cloned(),
            _ => None,
        }
    }

    /// Author a variant selection in the root layer.
    pub fn set_variant_selection(&mut self, path: &Path, set: &str, selection: &str) -> Result<()> {
        ensure!(self.has_prim(path), "No prim at {path}");

        let layer = self.root_layer_mut();
        layer.create_prim_in_layer(path)?;
        let spec = layer
            .get_mut(path)
            .with_context(|| format!("No prim spec at {path}"))?;

        let mut map = match spec.remove(FieldKey::VariantSelection) {
            Some(Value::VariantSelectionMap(map)) => map,
            _ => HashMap::new(),
        };
        map.insert(set.to_owned(), selection.to_owned());
        spec.add(FieldKey::VariantSelection, Value::VariantSelectionMap(map));
        log::trace!("Selected {set}={selection} on {path}");
        Ok(())
    }

    /// Remove the root layer's selection for `set`, if authored.
    pub fn clear_variant_selection(&mut self, path: &Path, set: &str) {
        let Some(spec) = self.root_layer_mut().get_mut(path) else {
            return;
        };
        if let Some(Value::VariantSelectionMap(map)) = spec.fields.get_mut(FieldKey::VariantSelection.as_str()) {
            map.remove(set);
            if map.is_empty() {
                spec.remove(FieldKey::VariantSelection);
            }
        }
    }

    /// Select a variant until the returned guard is dropped.
    ///
    /// The selection is authored in the root layer. Dropping the guard puts
    /// back whatever the root layer held before, including removing prim
    /// specs that only existed to hold the selection.
    pub fn select_variant(&mut self, path: &Path, set: &str, selection: &str) -> Result<VariantSelectionGuard<'_>> {
        let previous = self.authored_selection(path, set);

        let mut created = Vec::new();
        let mut cursor = Some(path.clone());
        while let Some(current) = cursor {
            if current.is_absolute_root() || self.root_layer().has_spec(&current) {
                break;
            }
            cursor = current.parent();
            created.push(current);
        }

        self.set_variant_selection(path, set, selection)?;
        Ok(VariantSelectionGuard {
            stage: self,
            prim: path.clone(),
            set: set.to_owned(),
            previous,
            created,
        })
    }

    /// Compose the populated stage into a single layer.
    ///
    /// Variant opinions are folded into the prims that select them and the
    /// variant sets themselves are dropped. Layer metadata other than
    /// sublayers is kept. Inactive prims are written without their children.
    pub fn flatten(&self) -> Result<Layer> {
        let root = Path::abs_root();
        let mut out = Layer::new(format!("{}.flat", self.root_layer().identifier()));

        let mut metadata = Spec::new(SpecType::PseudoRoot);
        for layer in self.layers.layers().iter().rev() {
            if let Some(spec) = layer.get(&root) {
                compose_fields(spec, &mut metadata);
            }
        }
        if let Some(spec) = out.get_mut(&root) {
            spec.fields.extend(metadata.fields.into_iter().filter(|(key, _)| {
                !ChildrenKey::is_children_field(key)
                    && key != FieldKey::SubLayers.as_str()
                    && key != FieldKey::SubLayerOffsets.as_str()
            }));
        }

        let mut count = 0;
        for prim in self.descendants(&root) {
            self.flatten_prim(&prim, &mut out)
                .with_context(|| format!("Failed to flatten {prim}"))?;
            count += 1;
        }
        log::debug!("Flattened stage into {count} prims");
        Ok(out)
    }

    fn flatten_prim(&self, path: &Path, out: &mut Layer) -> Result<()> {
        let sites = self.prim_sites(path);
        let mut composed = Spec::new(SpecType::Prim);
        for site in sites.iter().rev() {
            for layer in self.layers.layers().iter().rev() {
                match layer.get(site) {
                    Some(spec) if matches!(spec.ty, SpecType::Prim | SpecType::Variant) => {
                        compose_fields(spec, &mut composed)
                    }
                    _ => {}
                }
            }
        }

        let spec = out.create_spec(path, SpecType::Prim)?;
        spec.fields.extend(composed.fields.into_iter().filter(|(key, _)| {
            !ChildrenKey::is_children_field(key)
                && key != FieldKey::VariantSelection.as_str()
                && key != FieldKey::VariantSetNames.as_str()
        }));

        for name in self.property_names(path) {
            self.flatten_property(path, &name, out)?;
        }
        Ok(())
    }

    fn flatten_property(&self, prim: &Path, name: &str, out: &mut Layer) -> Result<()> {
        let sites = self.property_sites(prim, name);
        let opinions: Vec<&Spec> = self.opinions(&sites).collect();
        let Some(strongest) = opinions.first() else {
            return Ok(());
        };
        let ty = strongest.ty;

        let mut composed = Spec::new(ty);
        for spec in opinions.iter().rev().filter(|spec| spec.ty == ty) {
            compose_fields(spec, &mut composed);
        }

        // Values don't compose: the strongest spec holding one provides both
        // its default and its samples.
        composed.remove(FieldKey::Default);
        composed.remove(FieldKey::TimeSamples);
        let valued = opinions
            .iter()
            .filter(|spec| spec.ty == ty)
            .find(|spec| spec.has(FieldKey::Default) || spec.has(FieldKey::TimeSamples));
        if let Some(valued) = valued {
            for key in [FieldKey::Default, FieldKey::TimeSamples] {
                if let Some(value) = valued.get(key) {
                    composed.add(key, value.clone());
                }
            }
        }

        for key in [FieldKey::ConnectionPaths, FieldKey::TargetPaths] {
            if let Some(Value::PathListOp(op)) = composed.get(key) {
                let op = op.map(Path::strip_variant_selections);
                composed.add(key, Value::PathListOp(op));
            }
        }

        let path = prim.append_property(name)?;
        let spec = out.create_spec(&path, ty)?;
        spec.fields = composed.fields;
        Ok(())
    }
}

fn held_sample(samples: &[(f64, Value)], time: f64) -> Option<&Value> {
    samples
        .iter()
        .rev()
        .find(|(sample_time, _)| *sample_time <= time)
        .or_else(|| samples.first())
        .map(|(_, value)| value)
}

fn unblocked(value: &Value) -> Option<Value> {
    match value {
        Value::ValueBlock => None,
        value => Some(value.clone()),
    }
}

/// A temporary variant selection. See [`Stage::select_variant`].
///
/// The guard derefs to the stage so the selected composition can be read
/// while it is alive.
pub struct VariantSelectionGuard<'s> {
    stage: &'s mut Stage,
    prim: Path,
    set: String,
    previous: Option<String>,
    created: Vec<Path>,
}

impl Deref for VariantSelectionGuard<'_> {
    type Target = Stage;

    fn deref(&self) -> &Stage {
        self.stage
    }
}

impl Drop for VariantSelectionGuard<'_> {
    fn drop(&mut self) {
        match &self.previous {
            Some(selection) => {
                if let Err(err) = self.stage.set_variant_selection(&self.prim, &self.set, selection) {
                    log::warn!("Failed to restore {}={selection} on {}: {err:#}", self.set, self.prim);
                }
            }
            None => self.stage.clear_variant_selection(&self.prim, &self.set),
        }

        // `created` runs from the prim up to the first existing ancestor.
        let layer = self.stage.root_layer_mut();
        for path in &self.created {
            if layer.get(path).is_some_and(Spec::is_inert) {
                if let Err(err) = layer.remove_spec(path) {
                    log::warn!("Failed to remove {path}: {err:#}");
                }
            }
        }
    }
}
