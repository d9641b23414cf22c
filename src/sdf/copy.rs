use anyhow::{bail, ensure, Context, Result};

use super::schema::{ChildrenKey, FieldKey};
use super::{Layer, Path, SpecType, Value};

/// Deep copy the spec at `src_path` in `src` to `dst_path` in `dst`.
///
/// Everything below the source spec (properties, child prims, variant sets
/// and variants) travels with it. Paths stored in fields that point inside
/// the copied subtree are rewritten to the destination; paths pointing
/// elsewhere are kept as authored. An existing destination spec is replaced.
pub fn copy_spec(src: &Layer, src_path: &Path, dst: &mut Layer, dst_path: &Path) -> Result<()> {
    copy_spec_with_remap(src, src_path, dst, dst_path, (src_path, dst_path))
}

/// Like [`copy_spec`], with an explicit `(from, to)` prefix mapping for path
/// valued fields. Used when the copied spec lives in a different namespace
/// than the paths it stores, e.g. a variant whose contents target the
/// composed prim path.
pub fn copy_spec_with_remap(
    src: &Layer,
    src_path: &Path,
    dst: &mut Layer,
    dst_path: &Path,
    remap: (&Path, &Path),
) -> Result<()> {
    let src_spec = src
        .get(src_path)
        .with_context(|| format!("Nothing to copy: no spec at {src_path}"))?;
    let dst_ty = destination_type(src_spec.ty, dst_path)?;

    match dst.get(dst_path).map(|spec| spec.ty) {
        Some(existing) => {
            ensure!(
                existing == dst_ty,
                "Can't copy {src_path} ({:?}) over {dst_path} ({existing:?})",
                src_spec.ty
            );
            dst.clear_spec(dst_path)?;
        }
        None => {
            dst.create_spec(dst_path, dst_ty)
                .with_context(|| format!("Unable to create copy destination {dst_path}"))?;
        }
    }

    copy_fields(src, src_path, dst, dst_path, dst_ty, remap)?;

    for child in src.child_paths(src_path) {
        let Some(dst_child) = child.replace_prefix(src_path, dst_path) else {
            continue;
        };
        copy_subtree(src, &child, dst, &dst_child, remap)?;
    }

    Ok(())
}

fn copy_subtree(src: &Layer, src_path: &Path, dst: &mut Layer, dst_path: &Path, remap: (&Path, &Path)) -> Result<()> {
    let Some(ty) = src.get(src_path).map(|spec| spec.ty) else {
        return Ok(());
    };
    dst.create_spec(dst_path, ty)?;
    copy_fields(src, src_path, dst, dst_path, ty, remap)?;

    for child in src.child_paths(src_path) {
        if let Some(dst_child) = child.replace_prefix(src_path, dst_path) {
            copy_subtree(src, &child, dst, &dst_child, remap)?;
        }
    }
    Ok(())
}

// Prim contents may be copied into a variant and back.
fn destination_type(src_ty: SpecType, dst_path: &Path) -> Result<SpecType> {
    let ty = match src_ty {
        SpecType::Prim | SpecType::Variant => {
            if dst_path.is_prim_variant_selection_path() && !dst_path.is_variant_set_path() {
                SpecType::Variant
            } else if dst_path.is_prim_path() {
                SpecType::Prim
            } else {
                bail!("{dst_path} can't hold prim contents");
            }
        }
        SpecType::PseudoRoot => {
            ensure!(dst_path.is_absolute_root(), "Pseudo-root can only be copied to /");
            SpecType::PseudoRoot
        }
        other => other,
    };
    Ok(ty)
}

fn copy_fields(
    src: &Layer,
    src_path: &Path,
    dst: &mut Layer,
    dst_path: &Path,
    dst_ty: SpecType,
    remap: (&Path, &Path),
) -> Result<()> {
    let Some(src_spec) = src.get(src_path) else {
        return Ok(());
    };

    let fields: Vec<(String, Value)> = src_spec
        .fields
        .iter()
        .filter(|(key, _)| !ChildrenKey::is_children_field(key))
        .filter(|(key, _)| {
            // Variants have no specifier or type of their own.
            dst_ty != SpecType::Variant
                || (key.as_str() != FieldKey::Specifier.as_str() && key.as_str() != FieldKey::TypeName.as_str())
        })
        .map(|(key, value)| (key.clone(), remap_value(value, remap)))
        .collect();

    let dst_spec = dst
        .get_mut(dst_path)
        .with_context(|| format!("Copy destination {dst_path} missing"))?;
    for (key, value) in fields {
        dst_spec.fields.insert(key, value);
    }
    Ok(())
}

fn remap_path(path: &Path, (from, to): (&Path, &Path)) -> Path {
    path.replace_prefix(from, to).unwrap_or_else(|| path.clone())
}

fn remap_value(value: &Value, remap: (&Path, &Path)) -> Value {
    match value {
        Value::PathListOp(op) => Value::PathListOp(op.map(|p| remap_path(p, remap))),
        Value::ReferenceListOp(op) => Value::ReferenceListOp(op.map(|reference| {
            let mut reference = reference.clone();
            if reference.is_internal() && !reference.prim_path.is_empty() {
                reference.prim_path = remap_path(&reference.prim_path, remap);
            }
            reference
        })),
        Value::PayloadListOp(op) => Value::PayloadListOp(op.map(|payload| {
            let mut payload = payload.clone();
            if payload.is_internal() && !payload.prim_path.is_empty() {
                payload.prim_path = remap_path(&payload.prim_path, remap);
            }
            payload
        })),
        other => other.clone(),
    }
}
