//! Xform op stacks.
//!
//! Matrices follow glam's column vector convention. USD stores row-major
//! matrices for row vectors, which is the same memory layout, so a
//! `matrix4d` value maps onto `DMat4::from_cols_array` unchanged.

use anyhow::{bail, ensure, Context, Result};
use glam::{DMat4, DQuat, DVec3, EulerRot};

use crate::sdf::schema::ChildrenKey;
use crate::sdf::{Layer, Path, Value, Variability};
use crate::usd::{Stage, TimeCode};

pub const XFORM_OP_ORDER: &str = "xformOpOrder";

const XFORM_OP_PREFIX: &str = "xformOp:";
const INVERT_PREFIX: &str = "!invert!";
const RESET_XFORM_STACK: &str = "!resetXformStack!";

/// Transform operation type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XformOpType {
    Translate,
    Scale,
    RotateX,
    RotateY,
    RotateZ,
    RotateXYZ,
    RotateXZY,
    RotateYXZ,
    RotateYZX,
    RotateZXY,
    RotateZYX,
    Orient,
    Transform,
}

impl XformOpType {
    fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "translate" => Self::Translate,
            "scale" => Self::Scale,
            "rotateX" => Self::RotateX,
            "rotateY" => Self::RotateY,
            "rotateZ" => Self::RotateZ,
            "rotateXYZ" => Self::RotateXYZ,
            "rotateXZY" => Self::RotateXZY,
            "rotateYXZ" => Self::RotateYXZ,
            "rotateYZX" => Self::RotateYZX,
            "rotateZXY" => Self::RotateZXY,
            "rotateZYX" => Self::RotateZYX,
            "orient" => Self::Orient,
            "transform" => Self::Transform,
            _ => return None,
        };
        Some(op)
    }

    /// Matrix of this op for the authored `values`.
    fn matrix(self, values: &[f64]) -> Result<DMat4> {
        let expected = match self {
            Self::RotateX | Self::RotateY | Self::RotateZ => 1,
            Self::Orient => 4,
            Self::Transform => 16,
            _ => 3,
        };
        ensure!(
            values.len() == expected,
            "{self:?} expects {expected} components, got {}",
            values.len()
        );

        let rx = || DMat4::from_rotation_x(values[0].to_radians());
        let ry = || DMat4::from_rotation_y(values[1].to_radians());
        let rz = || DMat4::from_rotation_z(values[2].to_radians());

        // `rotateABC` rotates about A first, then B, then C.
        let matrix = match self {
            Self::Translate => DMat4::from_translation(DVec3::from_slice(values)),
            Self::Scale => DMat4::from_scale(DVec3::from_slice(values)),
            Self::RotateX => DMat4::from_rotation_x(values[0].to_radians()),
            Self::RotateY => DMat4::from_rotation_y(values[0].to_radians()),
            Self::RotateZ => DMat4::from_rotation_z(values[0].to_radians()),
            Self::RotateXYZ => rz() * ry() * rx(),
            Self::RotateXZY => ry() * rz() * rx(),
            Self::RotateYXZ => rz() * rx() * ry(),
            Self::RotateYZX => rx() * rz() * ry(),
            Self::RotateZXY => ry() * rx() * rz(),
            Self::RotateZYX => rx() * ry() * rz(),
            Self::Orient => {
                // Real part first.
                let quat = DQuat::from_xyzw(values[1], values[2], values[3], values[0]);
                DMat4::from_quat(quat.normalize())
            }
            Self::Transform => DMat4::from_cols_slice(values),
        };
        Ok(matrix)
    }
}

/// One entry of `xformOpOrder`.
#[derive(Clone, Debug, PartialEq)]
pub struct XformOp {
    pub op_type: XformOpType,
    /// Attribute holding the op value, e.g. `xformOp:translate:pivot`.
    pub attribute: String,
    pub inverse: bool,
}

impl XformOp {
    /// Parse an `xformOpOrder` entry.
    pub fn parse(entry: &str) -> Result<Self> {
        let (inverse, attribute) = match entry.strip_prefix(INVERT_PREFIX) {
            Some(attribute) => (true, attribute),
            None => (false, entry),
        };
        let op_name = attribute
            .strip_prefix(XFORM_OP_PREFIX)
            .and_then(|rest| rest.split(':').next())
            .with_context(|| format!("Not an xform op: {entry:?}"))?;
        let op_type = XformOpType::from_name(op_name).with_context(|| format!("Unknown xform op type: {op_name:?}"))?;

        Ok(Self {
            op_type,
            attribute: attribute.to_owned(),
            inverse,
        })
    }
}

// Ops that apply after the last `!resetXformStack!`, and whether one was found.
fn xform_ops(stage: &Stage, prim: &Path, time: TimeCode) -> Result<(Vec<XformOp>, bool)> {
    let order = match stage.attribute_value(prim, XFORM_OP_ORDER, time) {
        Some(Value::TokenVec(order)) => order,
        Some(other) => bail!("{prim}.{XFORM_OP_ORDER} is not a token array: {other:?}"),
        None => return Ok((Vec::new(), false)),
    };

    let mut ops = Vec::with_capacity(order.len());
    let mut resets = false;
    for entry in &order {
        if entry == RESET_XFORM_STACK {
            ops.clear();
            resets = true;
            continue;
        }
        ops.push(XformOp::parse(entry).with_context(|| format!("Invalid xformOpOrder on {prim}"))?);
    }
    Ok((ops, resets))
}

/// Local transform of a prim from its ordered xform ops.
///
/// Returns the matrix and whether the prim ignores its parent's transform.
pub fn compute_local_transform(stage: &Stage, prim: &Path, time: TimeCode) -> Result<(DMat4, bool)> {
    let (ops, resets) = xform_ops(stage, prim, time)?;

    let mut local = DMat4::IDENTITY;
    for op in ops {
        let values = stage
            .attribute_value(prim, &op.attribute, time)
            .and_then(|value| value.to_f64_vec())
            .with_context(|| format!("{prim} has no numeric value for {}", op.attribute))?;
        let mut matrix = op.op_type.matrix(&values)?;
        if op.inverse {
            matrix = matrix.inverse();
        }
        // The first op in the order is the outermost.
        local *= matrix;
    }
    Ok((local, resets))
}

/// Concatenated transform from the prim's local space to world space.
pub fn compute_local_to_world_transform(stage: &Stage, prim: &Path, time: TimeCode) -> Result<DMat4> {
    let mut world = DMat4::IDENTITY;
    let mut cursor = Some(prim.clone());
    while let Some(path) = cursor {
        if path.is_absolute_root() {
            break;
        }
        let (local, resets) = compute_local_transform(stage, &path, time)?;
        world = local * world;
        if resets {
            break;
        }
        cursor = path.parent();
    }
    Ok(world)
}

/// Translate, rotate and scale components of an affine matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FactoredTransform {
    pub translate: DVec3,
    /// `rotateXYZ` angles in degrees.
    pub rotate: DVec3,
    pub scale: DVec3,
}

/// Decompose `matrix` so that `translate * rotateXYZ * scale` rebuilds it.
///
/// Shear is lost. Negative scale is folded into the X axis.
pub fn factor_transform(matrix: &DMat4) -> FactoredTransform {
    let (scale, rotation, translate) = matrix.to_scale_rotation_translation();
    let (z, y, x) = rotation.to_euler(EulerRot::ZYX);
    FactoredTransform {
        translate,
        rotate: DVec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()),
        scale,
    }
}

/// Replace the xform ops authored on a prim spec with a single
/// translate / rotateXYZ / scale stack equal to `matrix`.
pub fn set_common_transform(layer: &mut Layer, prim: &Path, matrix: &DMat4) -> Result<()> {
    let spec = layer
        .get(prim)
        .with_context(|| format!("No prim spec at {prim} to set a transform on"))?;

    let stale: Vec<String> = spec
        .children(ChildrenKey::PropertyChildren)
        .iter()
        .filter(|name| name.starts_with(XFORM_OP_PREFIX) || name.as_str() == XFORM_OP_ORDER)
        .cloned()
        .collect();
    for name in &stale {
        layer.remove_property(prim, name)?;
    }

    let FactoredTransform {
        translate,
        rotate,
        scale,
    } = factor_transform(matrix);

    layer.create_attribute(
        prim,
        "xformOp:translate",
        "double3",
        Variability::Varying,
        Some(Value::Vec3d(translate.to_array().to_vec())),
    )?;
    layer.create_attribute(
        prim,
        "xformOp:rotateXYZ",
        "float3",
        Variability::Varying,
        Some(Value::Vec3f(rotate.as_vec3().to_array().to_vec())),
    )?;
    layer.create_attribute(
        prim,
        "xformOp:scale",
        "float3",
        Variability::Varying,
        Some(Value::Vec3f(scale.as_vec3().to_array().to_vec())),
    )?;
    layer.create_attribute(
        prim,
        XFORM_OP_ORDER,
        "token[]",
        Variability::Uniform,
        Some(Value::TokenVec(
            ["xformOp:translate", "xformOp:rotateXYZ", "xformOp:scale"]
                .map(str::to_owned)
                .to_vec(),
        )),
    )?;
    Ok(())
}
