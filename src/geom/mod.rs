//! Transforms and bounds of geometry prims.

mod bbox;
mod xform;

pub use bbox::{BBox3d, BBoxCache};
pub use xform::{
    compute_local_to_world_transform, compute_local_transform, factor_transform, set_common_transform,
    FactoredTransform, XformOp, XformOpType, XFORM_OP_ORDER,
};

use crate::sdf::Path;
use crate::usd::Stage;

/// Prim types with extents, and so a spatial bound.
pub const BOUNDABLE_TYPES: &[&str] = &[
    "Mesh",
    "Points",
    "BasisCurves",
    "NurbsCurves",
    "HermiteCurves",
    "NurbsPatch",
    "TetMesh",
    "PointInstancer",
    "Sphere",
    "Cube",
    "Cylinder",
    "Cylinder_1",
    "Cone",
    "Capsule",
    "Capsule_1",
    "Plane",
    "SkelRoot",
    "Volume",
    "CylinderLight",
    "DiskLight",
    "RectLight",
    "SphereLight",
    "PortalLight",
];

/// Prim types with a spatial transform, beyond the boundable ones.
const XFORM_ONLY_TYPES: &[&str] = &[
    "Xform",
    "Camera",
    "Skeleton",
    "DistantLight",
    "DomeLight",
    "DomeLight_1",
    "GeometryLight",
];

pub fn is_boundable(type_name: &str) -> bool {
    BOUNDABLE_TYPES.contains(&type_name)
}

pub fn is_xformable(type_name: &str) -> bool {
    is_boundable(type_name) || XFORM_ONLY_TYPES.contains(&type_name)
}

/// True if the prim at `path` has a transformable type.
pub fn is_xformable_prim(stage: &Stage, path: &Path) -> bool {
    stage.prim_type_name(path).is_some_and(is_xformable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xformable_types() {
        assert!(is_xformable("Xform"));
        assert!(is_xformable("Mesh"));
        assert!(is_boundable("Sphere"));
        assert!(!is_boundable("Xform"));
        assert!(!is_xformable("Scope"));
        assert!(!is_xformable("Material"));
        assert!(!is_xformable(""));
    }
}
