use std::collections::HashMap;

use anyhow::Result;
use glam::{DMat4, DVec3};

use super::xform::compute_local_transform;
use crate::sdf::{Path, Value};
use crate::usd::{Stage, TimeCode};

const DEFAULT_PURPOSE: &str = "default";

/// Axis-aligned 3D bounding box with double precision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox3d {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox3d {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    pub const fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bbox = Self::EMPTY;
        for point in points {
            bbox.expand_by_point(point);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_by_point(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Smallest box holding both boxes. Empty boxes are ignored.
    pub fn combine(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Center of the box, or the origin for an empty box.
    pub fn centroid(&self) -> DVec3 {
        if self.is_empty() {
            return DVec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            return DVec3::ZERO;
        }
        self.max - self.min
    }

    /// Axis-aligned box around the eight transformed corners.
    pub fn transform(&self, matrix: &DMat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = (0..8).map(|i| {
            DVec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        });
        Self::from_points(corners.map(|corner| matrix.transform_point3(corner)))
    }
}

impl Default for BBox3d {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Computes world-space bounds of prim subtrees at one time code.
///
/// World transforms are cached per prim, so bounding several prims under
/// the same ancestors walks each ancestor once.
pub struct BBoxCache<'s> {
    stage: &'s Stage,
    time: TimeCode,
    purposes: Vec<String>,
    world_transforms: HashMap<Path, DMat4>,
}

impl<'s> BBoxCache<'s> {
    pub fn new<S: Into<String>>(stage: &'s Stage, time: TimeCode, purposes: impl IntoIterator<Item = S>) -> Self {
        Self {
            stage,
            time,
            purposes: purposes.into_iter().map(Into::into).collect(),
            world_transforms: HashMap::new(),
        }
    }

    /// World bound of `prim` and everything below it.
    ///
    /// Inactive and invisible prims contribute nothing, nor do prims whose
    /// purpose isn't included.
    pub fn compute_world_bound(&mut self, prim: &Path) -> Result<BBox3d> {
        if !self.stage.has_prim(prim) {
            return Ok(BBox3d::EMPTY);
        }

        // Visibility and purpose are inherited from ancestors.
        let mut purpose = DEFAULT_PURPOSE.to_owned();
        let mut ancestors: Vec<Path> = Vec::new();
        let mut cursor = prim.parent();
        while let Some(path) = cursor {
            if path.is_absolute_root() {
                break;
            }
            cursor = path.parent();
            ancestors.push(path);
        }
        for ancestor in ancestors.iter().rev() {
            if self.is_invisible(ancestor) {
                return Ok(BBox3d::EMPTY);
            }
            purpose = self.inherited_purpose(ancestor, purpose);
        }

        let mut bound = BBox3d::EMPTY;
        let mut stack = vec![(prim.clone(), purpose)];
        while let Some((path, parent_purpose)) = stack.pop() {
            if !self.stage.is_active(&path) || self.is_invisible(&path) {
                continue;
            }
            let purpose = self.inherited_purpose(&path, parent_purpose);
            if !self.purposes.contains(&purpose) {
                continue;
            }

            if let Some(extent) = self.local_extent(&path) {
                let world = self.world_transform(&path)?;
                bound = bound.combine(&extent.transform(&world));
            }
            stack.extend(
                self.stage
                    .children(&path)
                    .into_iter()
                    .map(|child| (child, purpose.clone())),
            );
        }

        log::trace!("World bound of {prim}: {bound:?}");
        Ok(bound)
    }

    /// Local-to-world transform, cached.
    pub fn world_transform(&mut self, prim: &Path) -> Result<DMat4> {
        if prim.is_absolute_root() {
            return Ok(DMat4::IDENTITY);
        }
        if let Some(cached) = self.world_transforms.get(prim) {
            return Ok(*cached);
        }

        let (local, resets) = compute_local_transform(self.stage, prim, self.time)?;
        let world = match prim.parent() {
            Some(parent) if !resets => self.world_transform(&parent)? * local,
            _ => local,
        };
        self.world_transforms.insert(prim.clone(), world);
        Ok(world)
    }

    fn is_invisible(&self, prim: &Path) -> bool {
        matches!(
            self.stage.attribute_value(prim, "visibility", self.time),
            Some(Value::Token(visibility)) if visibility == "invisible"
        )
    }

    // A non-default purpose applies to the whole subtree below it.
    fn inherited_purpose(&self, prim: &Path, parent_purpose: String) -> String {
        if parent_purpose != DEFAULT_PURPOSE {
            return parent_purpose;
        }
        match self.stage.attribute_value(prim, "purpose", self.time) {
            Some(Value::Token(purpose)) => purpose,
            _ => parent_purpose,
        }
    }

    fn scalar(&self, prim: &Path, name: &str, fallback: f64) -> f64 {
        self.stage
            .attribute_value(prim, name, self.time)
            .and_then(|value| value.to_f64())
            .unwrap_or(fallback)
    }

    /// Extent of the prim in its own space: the authored `extent`, or one
    /// computed from the prim's points or its implicit shape.
    pub fn local_extent(&self, prim: &Path) -> Option<BBox3d> {
        let type_name = self.stage.prim_type_name(prim)?;
        if !super::is_boundable(type_name) {
            return None;
        }

        if let Some(extent) = self
            .stage
            .attribute_value(prim, "extent", self.time)
            .and_then(|value| value.to_f64_vec())
            .filter(|values| values.len() == 6)
        {
            return Some(BBox3d::new(
                DVec3::from_slice(&extent[0..3]),
                DVec3::from_slice(&extent[3..6]),
            ));
        }

        let axis = || match self.stage.attribute_value(prim, "axis", self.time) {
            Some(Value::Token(axis)) => axis,
            _ => "Z".to_owned(),
        };

        let half = match type_name {
            "Sphere" => DVec3::splat(self.scalar(prim, "radius", 1.0)),
            "Cube" => DVec3::splat(self.scalar(prim, "size", 2.0) * 0.5),
            "Cylinder" | "Cylinder_1" | "Cone" | "Capsule" | "Capsule_1" => {
                let capsule = type_name.starts_with("Capsule");
                let (radius_fallback, height_fallback) = if capsule { (0.5, 1.0) } else { (1.0, 2.0) };
                let radius = self.scalar(prim, "radius", radius_fallback);
                let mut along = self.scalar(prim, "height", height_fallback) * 0.5;
                // Hemispherical caps extend past the height.
                if capsule {
                    along += radius;
                }
                along_axis(&axis(), along, DVec3::splat(radius))
            }
            "Plane" => {
                let width = self.scalar(prim, "width", 2.0) * 0.5;
                let length = self.scalar(prim, "length", 2.0) * 0.5;
                match axis().as_str() {
                    "X" => DVec3::new(0.0, length, width),
                    "Y" => DVec3::new(width, 0.0, length),
                    _ => DVec3::new(width, length, 0.0),
                }
            }
            _ => {
                let points = self
                    .stage
                    .attribute_value(prim, "points", self.time)
                    .and_then(|value| value.to_f64_vec())?;
                let bbox = BBox3d::from_points(points.chunks_exact(3).map(DVec3::from_slice));
                return (!bbox.is_empty()).then_some(bbox);
            }
        };
        Some(BBox3d::new(-half, half))
    }
}

// Half extents of a shape spanning `along` on `axis` and `across` elsewhere.
fn along_axis(axis: &str, along: f64, across: DVec3) -> DVec3 {
    match axis {
        "X" => DVec3::new(along, across.y, across.z),
        "Y" => DVec3::new(across.x, along, across.z),
        _ => DVec3::new(across.x, across.y, along),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{self, Layer};

    const EPSILON: f64 = 1e-9;

    fn stage(text: &str) -> Stage {
        Stage::from_layer(Layer::from_string("bounds.usda", text).unwrap()).unwrap()
    }

    fn path(text: &str) -> Path {
        sdf::path(text).unwrap()
    }

    #[test]
    fn combine_ignores_empty() {
        let unit = BBox3d::new(DVec3::ZERO, DVec3::ONE);
        assert_eq!(BBox3d::EMPTY.combine(&unit), unit);
        assert_eq!(unit.combine(&BBox3d::EMPTY), unit);
        assert_eq!(BBox3d::EMPTY.centroid(), DVec3::ZERO);

        let other = BBox3d::new(DVec3::splat(2.0), DVec3::splat(4.0));
        let both = unit.combine(&other);
        assert_eq!(both, BBox3d::new(DVec3::ZERO, DVec3::splat(4.0)));
        assert_eq!(both.centroid(), DVec3::splat(2.0));
    }

    #[test]
    fn transform_keeps_box_axis_aligned() {
        let bbox = BBox3d::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
        let rotated = bbox.transform(&DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2));
        assert!(rotated.min.abs_diff_eq(DVec3::new(-2.0, -1.0, -3.0), EPSILON));
        assert!(rotated.max.abs_diff_eq(DVec3::new(2.0, 1.0, 3.0), EPSILON));
    }

    #[test]
    fn implicit_shapes_and_points() {
        let stage = stage(
            r#"#usda 1.0
def Sphere "Ball" {
    double radius = 2
}
def Cube "Box" {
}
def Cylinder "Can" {
    uniform token axis = "X"
    double height = 4
    double radius = 1
}
def Mesh "Tri" {
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 3, -1)]
}
def Mesh "Authored" {
    float3[] extent = [(-1, -1, -1), (5, 5, 5)]
    point3f[] points = [(0, 0, 0)]
}
def Xform "Group" {
}
"#,
        );
        let cache = BBoxCache::new(&stage, TimeCode::Default, ["default"]);
        let extent = |p| cache.local_extent(&path(p));

        assert_eq!(extent("/Ball"), Some(BBox3d::new(DVec3::splat(-2.0), DVec3::splat(2.0))));
        assert_eq!(extent("/Box"), Some(BBox3d::new(DVec3::splat(-1.0), DVec3::ONE)));
        assert_eq!(
            extent("/Can"),
            Some(BBox3d::new(DVec3::new(-2.0, -1.0, -1.0), DVec3::new(2.0, 1.0, 1.0)))
        );
        assert_eq!(
            extent("/Tri"),
            Some(BBox3d::new(DVec3::new(0.0, 0.0, -1.0), DVec3::new(1.0, 3.0, 0.0)))
        );
        assert_eq!(
            extent("/Authored"),
            Some(BBox3d::new(DVec3::splat(-1.0), DVec3::splat(5.0)))
        );
        assert_eq!(extent("/Group"), None);
    }

    #[test]
    fn world_bound_filters_subtree() {
        let stage = stage(
            r#"#usda 1.0
def Xform "Model" {
    double3 xformOp:translate = (10, 0, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Sphere "Visible" {
    }
    def Sphere "Invisible" {
        token visibility = "invisible"
        double radius = 100
    }
    def Sphere "Proxy" {
        uniform token purpose = "proxy"
        double radius = 100
    }
    def Xform "Off" (
        active = false
    )
    {
        def Sphere "Inside" {
            double radius = 100
        }
    }
}
"#,
        );

        let mut cache = BBoxCache::new(&stage, TimeCode::Default, ["default"]);
        let bound = cache.compute_world_bound(&path("/Model")).unwrap();
        assert!(bound.min.abs_diff_eq(DVec3::new(9.0, -1.0, -1.0), EPSILON));
        assert!(bound.max.abs_diff_eq(DVec3::new(11.0, 1.0, 1.0), EPSILON));
        assert!(bound.centroid().abs_diff_eq(DVec3::new(10.0, 0.0, 0.0), EPSILON));

        let mut with_proxy = BBoxCache::new(&stage, TimeCode::Default, ["default", "proxy"]);
        let bound = with_proxy.compute_world_bound(&path("/Model")).unwrap();
        assert!(bound.max.abs_diff_eq(DVec3::new(110.0, 100.0, 100.0), EPSILON));

        assert!(cache.compute_world_bound(&path("/Model/Invisible")).unwrap().is_empty());
        assert!(cache.compute_world_bound(&path("/Missing")).unwrap().is_empty());
    }
}
