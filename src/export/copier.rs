use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};

use crate::sdf::{self, Layer, Path};

/// Highest numeric suffix tried before giving up on a name.
const MAX_SUFFIX: u32 = 9999;

/// `path` itself if nothing is authored there in `layer`, otherwise the first
/// free sibling named `<name>_01`, `<name>_02`, ...
///
/// A trailing `_NN` on the requested name is treated as a suffix, so asking
/// for `Chair_01` when it's taken yields `Chair_02`.
pub fn next_free_path(layer: &Layer, path: &Path) -> Result<Path> {
    if !layer.has_spec(path) {
        return Ok(path.clone());
    }

    let parent = path
        .parent()
        .with_context(|| format!("{path} has no parent to allocate a sibling under"))?;
    let base = strip_numeric_suffix(path.name());

    for suffix in 1..=MAX_SUFFIX {
        let candidate = parent.append_child(&format!("{base}_{suffix:02}"))?;
        if !layer.has_spec(&candidate) {
            return Ok(candidate);
        }
    }
    bail!("No free name left for {path}")
}

fn strip_numeric_suffix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((base, digits))
            if !base.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

/// Copy prims the exported subtree depends on into `out` at their original
/// paths, creating `over` ancestors as needed.
///
/// Paths missing from `source` are skipped with a warning.
pub fn copy_external_dependencies(source: &Layer, out: &mut Layer, dependencies: &BTreeSet<Path>) -> Result<Vec<Path>> {
    let mut copied = Vec::with_capacity(dependencies.len());
    for path in dependencies {
        if !source.has_spec(path) {
            log::warn!("Referenced prim {path} not found, skipping");
            continue;
        }
        copy_prim(source, path, out, path)
            .with_context(|| format!("Failed to copy referenced prim {path}"))?;
        copied.push(path.clone());
    }
    Ok(copied)
}

/// Copy the prim at `src` in `source` to `dst` in `out`, with its whole
/// subtree.
pub fn copy_prim(source: &Layer, src: &Path, out: &mut Layer, dst: &Path) -> Result<()> {
    out.create_prim_in_layer(dst)?;
    sdf::copy_spec(source, src, out, dst)?;
    log::debug!("Copied {src} to {dst}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::schema::FieldKey;
    use crate::sdf::{Specifier, Value};

    fn path(text: &str) -> Path {
        sdf::path(text).unwrap()
    }

    #[test]
    fn free_path_is_returned_as_is() {
        let layer = Layer::new("out.usda");
        assert_eq!(next_free_path(&layer, &path("/Chair")).unwrap(), path("/Chair"));
    }

    #[test]
    fn taken_names_get_numbered() {
        let mut layer = Layer::new("out.usda");
        layer.define_prim(&path("/Root/Chair"), Specifier::Def, "Xform").unwrap();
        assert_eq!(
            next_free_path(&layer, &path("/Root/Chair")).unwrap(),
            path("/Root/Chair_01")
        );

        layer.define_prim(&path("/Root/Chair_01"), Specifier::Def, "Xform").unwrap();
        assert_eq!(
            next_free_path(&layer, &path("/Root/Chair")).unwrap(),
            path("/Root/Chair_02")
        );
        assert_eq!(
            next_free_path(&layer, &path("/Root/Chair_01")).unwrap(),
            path("/Root/Chair_02")
        );
    }

    #[test]
    fn suffix_detection() {
        assert_eq!(strip_numeric_suffix("Chair_01"), "Chair");
        assert_eq!(strip_numeric_suffix("Chair_"), "Chair_");
        assert_eq!(strip_numeric_suffix("_01"), "_01");
        assert_eq!(strip_numeric_suffix("Chair_v2"), "Chair_v2");
        assert_eq!(strip_numeric_suffix("Chair"), "Chair");
    }

    #[test]
    fn dependencies_keep_their_paths() {
        let source = Layer::from_string(
            "source.usda",
            r#"#usda 1.0

def Scope "Looks" {
    def Material "Steel" {
        token outputs:surface
    }
}
"#,
        )
        .unwrap();
        let mut out = Layer::new("out.usda");
        let dependencies: BTreeSet<Path> = [path("/Looks/Steel"), path("/Looks/Missing")].into();

        let copied = copy_external_dependencies(&source, &mut out, &dependencies).unwrap();

        assert_eq!(copied, vec![path("/Looks/Steel")]);
        assert_eq!(
            out.field(&path("/Looks"), FieldKey::Specifier),
            Some(&Value::Specifier(Specifier::Over))
        );
        assert_eq!(
            out.field(&path("/Looks/Steel"), FieldKey::TypeName),
            Some(&Value::Token("Material".into()))
        );
        assert!(out.has_spec(&path("/Looks/Steel.outputs:surface")));
    }
}
