use anyhow::{Context, Result};

use super::references::collect_external_references;
use crate::sdf::{Layer, Path};
use crate::usd::{PopulationMask, Stage};

/// Flatten the parts of `stage` needed to export `prims` into one standalone
/// layer.
///
/// The layer stack is collapsed first, then a stage masked to the selection
/// is opened on the result and flattened, with the selected variants folded
/// in. Prims that the selection references from outside its subtrees are
/// added to the mask, as they are copied next to the exported prims.
pub fn flatten_selection(stage: &Stage, prims: &[Path]) -> Result<Layer> {
    let collapsed = stage.layer_stack().flatten();

    let mut mask = PopulationMask::new(prims.iter().cloned());
    loop {
        let mut dependencies = Vec::new();
        for root in mask.paths() {
            dependencies.extend(
                collect_external_references(&collapsed, root)
                    .into_iter()
                    .filter(|target| !mask.includes_subtree(target)),
            );
        }
        if dependencies.is_empty() {
            break;
        }
        for target in dependencies {
            log::debug!("Adding reference target {target} to the population mask");
            mask.add(target);
        }
    }

    let masked = Stage::open_masked(collapsed, mask).context("Failed to open masked stage")?;
    masked.flatten().context("Failed to flatten masked stage")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{self, schema::FieldKey, Value};
    use std::fs;

    #[test]
    fn masked_flatten_keeps_selection_and_dependencies() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("materials.usda"),
            r#"#usda 1.0

def Scope "Looks" {
    def Material "Steel" {
        token outputs:surface
    }
}
"#,
        )
        .unwrap();
        let root = temp_dir.path().join("scene.usda");
        fs::write(
            &root,
            r#"#usda 1.0
(
    subLayers = [@./materials.usda@]
    upAxis = "Z"
)

def Xform "World" {
    def Xform "Chair" (
        prepend references = </Looks/Steel>
    )
    {
        double width = 1
    }
    def Xform "Table" {
    }
}

over "Looks" {
    over "Steel" {
        token info:id = "steel"
    }
}
"#,
        )
        .unwrap();

        let stage = Stage::open(&root).unwrap();
        let flat = flatten_selection(&stage, &[sdf::path("/World/Chair").unwrap()]).unwrap();

        let path = |p| sdf::path(p).unwrap();
        assert!(flat.has_spec(&path("/World")));
        assert!(flat.has_spec(&path("/World/Chair.width")));
        assert!(!flat.has_spec(&path("/World/Table")));
        assert_eq!(flat.up_axis(), Some("Z"));
        assert!(flat.sublayer_paths().is_empty());

        // The reference target survives the mask with opinions from both layers.
        assert_eq!(
            flat.field(&path("/Looks/Steel"), FieldKey::TypeName),
            Some(&Value::Token("Material".into()))
        );
        assert!(flat.has_spec(&path("/Looks/Steel.info:id")));
        assert!(flat.has_spec(&path("/Looks/Steel.outputs:surface")));
    }
}
