//! Extraction of selected prims into a new, self-contained layer.
//!
//! [`export_prims`] runs the whole pipeline: the selection is deduplicated,
//! the stage flattened down to what the selection needs, every selected prim
//! copied (together with the prims it references from elsewhere) under a new
//! name, re-centered when several transformable prims are exported at once,
//! stamped with UI grouping attributes, and given back its variant sets.
//! The layer is written once at the end.
//!
//! [`host`] wraps the pipeline in the save workflow around it: destination
//! naming, default directories, recent files and save notifications.

use std::path::{Path as FsPath, PathBuf};

use thiserror::Error;

use crate::sdf::{Layer, Path, Specifier};
use crate::usd::{Stage, TimeCode};

mod copier;
mod dedup;
mod flatten;
pub mod host;
mod normalize;
mod references;
mod ui;
mod variants;

pub use copier::{copy_external_dependencies, copy_prim, next_free_path};
pub use dedup::remove_descendant_paths;
pub use flatten::flatten_selection;
pub use normalize::{apply_offset, compute_offsets, Offsets};
pub use references::{collect_external_references, collect_reference_closure};
pub use ui::{stamp_ui_metadata, DISPLAY_GROUP, DISPLAY_NAME, ORDER};
pub use variants::replicate_variants;

/// File extensions an exported layer can be written with.
pub const EXPORT_EXTENSIONS: &[&str] = &["usd", "usda"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Composition(#[from] anyhow::Error),

    #[error("failed to write {}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("can't export to .{0} files, use .usd or .usda")]
    UnsupportedFormat(String),

    #[error("nothing selected to export")]
    EmptySelection,

    #[error("no prim at {0}")]
    PrimNotFound(Path),

    /// A step found the output layer in a state an earlier step should have
    /// prevented.
    #[error("export precondition violated: {0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;

/// Tunables of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Value of `ui:displayGroup` on exported prims.
    pub display_group: String,
    /// Value of `ui:order` on exported prims.
    pub order: i32,
    /// Name of the prim grouping a multi-prim export.
    pub container_name: String,
    /// Time at which transforms and bounds are evaluated.
    pub time: TimeCode,
    /// Purposes contributing to bounds.
    pub purposes: Vec<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            display_group: "Material Graphs".into(),
            order: 1024,
            container_name: "Root".into(),
            time: TimeCode::Default,
            purposes: vec!["default".into()],
        }
    }
}

/// What an export wrote where.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub destination: PathBuf,
    pub default_prim: String,
    pub prims: Vec<ExportedPrim>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportedPrim {
    pub source: Path,
    pub destination: Path,
    /// Offset container holding the prim's re-centered transform.
    pub container: Option<Path>,
    /// Referenced prims copied alongside, at their source paths.
    pub external_dependencies: Vec<Path>,
    pub variant_sets: usize,
}

/// Export `prims` of `stage` into a new layer at `destination`.
///
/// A single prim lands at the layer root under its own name, with its
/// transform as authored. Several prims are grouped under a
/// `options.container_name` Xform; each transformable one gets an offset
/// container carrying its world transform relative to the centroid of the
/// selection's combined bounds, while the prim itself is reset to the
/// identity. Names already taken in the output get a numeric suffix.
///
/// Variant selections on `stage` are switched while variants are copied and
/// always put back before returning.
pub fn export_prims(stage: &mut Stage, prims: &[Path], destination: &FsPath, options: &ExportOptions) -> Result<ExportReport> {
    check_extension(destination)?;

    let prims = remove_descendant_paths(prims);
    if prims.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    if let Some(missing) = prims.iter().find(|prim| !stage.has_prim(prim)) {
        return Err(ExportError::PrimNotFound(missing.clone()));
    }
    log::info!("Exporting {} prim(s) to {}", prims.len(), destination.display());

    let flat = flatten_selection(stage, &prims)?;

    let root = if prims.len() > 1 {
        Some(Path::abs_root().append_child(&options.container_name)?)
    } else {
        None
    };
    let offsets = match root {
        Some(_) => compute_offsets(stage, &prims, options)?,
        None => Offsets::none(prims.len()),
    };

    let mut out = Layer::create_new(destination);
    if let Some(axis) = flat.up_axis() {
        out.set_up_axis(axis);
    }
    if let Some(root) = &root {
        out.define_prim(root, Specifier::Def, "Xform")?;
    }

    let mut exported = Vec::with_capacity(prims.len());
    for (prim, offset) in prims.iter().zip(offsets.transforms) {
        let dependencies = collect_reference_closure(&flat, prim);
        let external_dependencies = copy_external_dependencies(&flat, &mut out, &dependencies)?;

        let name = prim.name();
        let (container, target) = match (&root, offset) {
            (Some(root), Some(offset)) => {
                let container = next_free_path(&out, &root.append_child(name)?)?;
                out.define_prim(&container, Specifier::Def, "Xform")?;
                let target = container.append_child(name)?;
                copy_prim(&flat, prim, &mut out, &target)?;
                apply_offset(&mut out, &container, &target, &offset)?;
                (Some(container), target)
            }
            (Some(root), None) => {
                let target = next_free_path(&out, &root.append_child(name)?)?;
                copy_prim(&flat, prim, &mut out, &target)?;
                (None, target)
            }
            (None, _) => {
                let target = next_free_path(&out, &Path::abs_root().append_child(name)?)?;
                copy_prim(&flat, prim, &mut out, &target)?;
                (None, target)
            }
        };

        stamp_ui_metadata(&mut out, &target, options)?;
        let variant_sets = replicate_variants(stage, prim, &mut out, &target)?;

        exported.push(ExportedPrim {
            source: prim.clone(),
            destination: target,
            container,
            external_dependencies,
            variant_sets,
        });
    }

    let default_prim = match (&root, exported.first()) {
        (Some(root), _) => root.name().to_owned(),
        (None, Some(first)) => first.destination.name().to_owned(),
        (None, None) => return Err(ExportError::EmptySelection),
    };
    out.set_default_prim(&default_prim);

    out.export(destination).map_err(|source| ExportError::Serialization {
        path: destination.to_path_buf(),
        source,
    })?;
    log::info!("Wrote {} with default prim {default_prim}", destination.display());

    Ok(ExportReport {
        destination: destination.to_path_buf(),
        default_prim,
        prims: exported,
    })
}

fn check_extension(destination: &FsPath) -> Result<()> {
    let extension = destination
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    if EXPORT_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ExportError::UnsupportedFormat(extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf;

    #[test]
    fn only_text_layers_are_written() {
        assert!(check_extension(FsPath::new("out.usda")).is_ok());
        assert!(check_extension(FsPath::new("dir/OUT.USD")).is_ok());
        assert!(matches!(
            check_extension(FsPath::new("out.usdc")),
            Err(ExportError::UnsupportedFormat(ext)) if ext == "usdc"
        ));
        assert!(matches!(
            check_extension(FsPath::new("out")),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn selection_is_validated_before_writing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let destination = temp_dir.path().join("out.usda");
        let layer = Layer::from_string("scene.usda", "#usda 1.0\n\ndef Xform \"World\" {\n}\n").unwrap();
        let mut stage = Stage::from_layer(layer).unwrap();

        let err = export_prims(&mut stage, &[], &destination, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::EmptySelection));

        let missing = sdf::path("/World/Missing").unwrap();
        let err = export_prims(&mut stage, &[missing.clone()], &destination, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::PrimNotFound(path) if path == missing));
        assert!(!destination.exists());
    }
}
