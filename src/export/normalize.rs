use anyhow::Result;
use glam::{DMat4, DVec3};

use super::{ExportError, ExportOptions};
use crate::geom::{is_xformable_prim, set_common_transform, BBox3d, BBoxCache};
use crate::sdf::{Layer, Path};
use crate::usd::Stage;

/// World transforms of the selected prims, re-expressed relative to the
/// centroid of their combined bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Offsets {
    pub centroid: DVec3,
    /// One entry per selected prim; `None` for prims without a transform.
    pub transforms: Vec<Option<DMat4>>,
}

impl Offsets {
    /// No offsets at all: every prim is placed as authored.
    pub fn none(count: usize) -> Self {
        Self {
            centroid: DVec3::ZERO,
            transforms: vec![None; count],
        }
    }
}

/// Compute the centroid-relative transform of each selected prim.
///
/// Bounds and transforms are evaluated at `options.time` for the purposes in
/// `options.purposes`. Only the translation is offset by the centroid. When
/// nothing contributes a bound the centroid is the origin.
pub fn compute_offsets(stage: &Stage, prims: &[Path], options: &ExportOptions) -> Result<Offsets> {
    let mut cache = BBoxCache::new(stage, options.time, options.purposes.iter().cloned());

    let mut bound = BBox3d::EMPTY;
    let mut transforms = Vec::with_capacity(prims.len());
    for prim in prims {
        if !is_xformable_prim(stage, prim) {
            log::trace!("{prim} has no transform, placing it without an offset");
            transforms.push(None);
            continue;
        }
        bound = bound.combine(&cache.compute_world_bound(prim)?);
        transforms.push(Some(cache.world_transform(prim)?));
    }

    let centroid = bound.centroid();
    for transform in transforms.iter_mut().flatten() {
        let translation = transform.w_axis.truncate() - centroid;
        transform.w_axis = translation.extend(transform.w_axis.w);
    }

    log::debug!("Selection centroid at {centroid}");
    Ok(Offsets { centroid, transforms })
}

/// Move a copied prim's transform onto its offset container: the container
/// gets `offset`, the prim itself the identity.
pub fn apply_offset(layer: &mut Layer, container: &Path, prim: &Path, offset: &DMat4) -> Result<(), ExportError> {
    for path in [container, prim] {
        if !layer.has_spec(path) {
            return Err(ExportError::Precondition(format!(
                "no spec at {path} to author a transform on"
            )));
        }
    }
    set_common_transform(layer, container, offset)?;
    set_common_transform(layer, prim, &DMat4::IDENTITY)?;
    Ok(())
}
