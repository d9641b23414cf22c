use std::collections::HashMap;

use anyhow::Context;

use super::ExportError;
use crate::sdf::schema::FieldKey;
use crate::sdf::{self, Layer, ListOp, Path, Value};
use crate::usd::Stage;

/// Replay the variant sets of the source subtree at `src_root` onto its copy
/// at `dst_root` in `out`.
///
/// Every prim of the subtree is paired with its copy by relative path. For
/// each variant set on a source prim, every variant is selected in turn and
/// its content copied into the matching variant of the destination prim.
/// The destination then selects what the source had selected. Source
/// selections are restored as each variant is done with.
///
/// Returns the number of variant sets replicated.
pub fn replicate_variants(stage: &mut Stage, src_root: &Path, out: &mut Layer, dst_root: &Path) -> Result<usize, ExportError> {
    // Variant specs are selection independent, only which site holds them
    // isn't.
    let source = stage.layer_stack().flatten();

    let mut pairs = vec![(src_root.clone(), dst_root.clone())];
    for prim in stage.descendants(src_root) {
        let relative = prim.make_relative_path(src_root)?;
        let copy = dst_root.append_path(&relative)?;
        pairs.push((prim, copy));
    }

    let mut replicated = 0;
    for (src, dst) in &pairs {
        let sets = stage.variant_set_names(src);
        if sets.is_empty() {
            continue;
        }
        if !out.has_spec(dst) {
            return Err(ExportError::Precondition(format!(
                "no copy of {src} at {dst} to replicate variants onto"
            )));
        }

        for set in &sets {
            replicate_set(stage, &source, src, out, dst, set)?;
            replicated += 1;
        }
    }

    log::debug!("Replicated {replicated} variant sets from {src_root} to {dst_root}");
    Ok(replicated)
}

fn replicate_set(stage: &mut Stage, source: &Layer, src: &Path, out: &mut Layer, dst: &Path, set: &str) -> Result<(), ExportError> {
    let active = stage.variant_selection(src, set);

    for variant in stage.variant_names(src, set) {
        let guard = stage.select_variant(src, set, &variant)?;

        let site = guard
            .prim_sites(src)
            .iter()
            .filter_map(|site| site.append_variant_selection(set, &variant).ok())
            .find(|site| source.has_spec(site));
        let Some(site) = site else {
            log::trace!("{src}{{{set}={variant}}} has no authored content");
            continue;
        };

        let target = dst.append_variant_selection(set, &variant)?;
        out.create_prim_in_layer(&target)?;
        sdf::copy_spec_with_remap(source, &site, out, &target, (src, dst))
            .with_context(|| format!("Failed to copy variant {site} to {target}"))?;
        log::trace!("Copied variant {site} to {target}");
    }

    let spec = out
        .get_mut(dst)
        .ok_or_else(|| ExportError::Precondition(format!("copy at {dst} vanished")))?;

    let mut names = match spec.remove(FieldKey::VariantSetNames) {
        Some(Value::StringListOp(op)) | Some(Value::TokenListOp(op)) => op,
        _ => ListOp::default(),
    };
    if !names.iter().any(|name| name == set) {
        names.prepended_items.push(set.to_owned());
    }
    spec.add(FieldKey::VariantSetNames, Value::StringListOp(names));

    if let Some(selection) = active {
        let mut map = match spec.remove(FieldKey::VariantSelection) {
            Some(Value::VariantSelectionMap(map)) => map,
            _ => HashMap::new(),
        };
        map.insert(set.to_owned(), selection);
        spec.add(FieldKey::VariantSelection, Value::VariantSelectionMap(map));
    }
    Ok(())
}
