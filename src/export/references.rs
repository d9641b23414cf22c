use std::collections::BTreeSet;

use crate::sdf::schema::FieldKey;
use crate::sdf::{Layer, Path, SpecType, Value};

/// Internal reference targets of the subtree at `root` that point outside
/// of it.
///
/// Every prim spec at or below `root` is visited and its references list op
/// resolved. References to other assets and to a default prim (no prim
/// path) are not namespace dependencies and are skipped.
pub fn collect_external_references(layer: &Layer, root: &Path) -> BTreeSet<Path> {
    let mut external = BTreeSet::new();

    for path in layer.traverse(root) {
        if path.is_property_path() || path.is_absolute_root() {
            continue;
        }
        let Some(spec) = layer.get(&path) else {
            continue;
        };
        if !matches!(spec.ty, SpecType::Prim | SpecType::Variant) {
            continue;
        }
        let Some(Value::ReferenceListOp(references)) = spec.get(FieldKey::References) else {
            continue;
        };

        for reference in references.flatten() {
            if !reference.is_internal() || reference.prim_path.is_empty() {
                continue;
            }
            if !reference.prim_path.has_prefix(root) {
                external.insert(reference.prim_path);
            }
        }
    }

    external
}

/// Every prim outside `root` that the subtree depends on, following the
/// references of each dependency in turn. Targets below another target are
/// folded into it.
pub fn collect_reference_closure(layer: &Layer, root: &Path) -> BTreeSet<Path> {
    let mut found: BTreeSet<Path> = BTreeSet::new();
    let mut pending: Vec<Path> = collect_external_references(layer, root).into_iter().collect();

    while let Some(target) = pending.pop() {
        if target.has_prefix(root) || found.iter().any(|known| target.has_prefix(known)) {
            continue;
        }
        pending.extend(collect_external_references(layer, &target));
        found.insert(target);
    }

    let found: Vec<Path> = found.into_iter().collect();
    Path::remove_descendant_paths(&found).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf;

    const LAYER: &str = r#"#usda 1.0

def Xform "Library" {
    def Material "Steel" {
    }
    def Material "Wood" {
    }
}

def Xform "Chair" (
    prepend references = </Library/Steel>
)
{
    def Mesh "Seat" (
        references = [</Library/Wood>, </Chair/Leg>, @other.usda@</Props/Cushion>, @other.usda@]
    )
    {
    }
    def Mesh "Leg" (
        prepend references = </Library/Wood>
        delete references = </Library/Steel>
    )
    {
    }
}
"#;

    #[test]
    fn collects_targets_outside_subtree() {
        let layer = Layer::from_string("refs.usda", LAYER).unwrap();
        let external = collect_external_references(&layer, &sdf::path("/Chair").unwrap());

        let expected: BTreeSet<Path> = ["/Library/Steel", "/Library/Wood"]
            .iter()
            .map(|p| sdf::path(p).unwrap())
            .collect();
        assert_eq!(external, expected);
    }

    #[test]
    fn closure_follows_chains() {
        let layer = Layer::from_string(
            "chain.usda",
            r#"#usda 1.0

def Xform "Shared" {
    def Material "Mat" (
        references = </World/Chair>
    )
    {
    }
}

def Xform "Library" {
    def Xform "Base" (
        prepend references = </Shared/Mat>
    )
    {
    }
    def Xform "Leg" (
        prepend references = </Shared>
    )
    {
    }
}

def Xform "World" {
    def Xform "Chair" (
        prepend references = [</Library/Base>, </Library/Leg>]
    )
    {
    }
}
"#,
        )
        .unwrap();

        let chair = sdf::path("/World/Chair").unwrap();
        assert_eq!(collect_external_references(&layer, &chair).len(), 2);

        // /Shared/Mat folds into /Shared; the reference back to /World/Chair stays out.
        let expected: BTreeSet<Path> = ["/Library/Base", "/Library/Leg", "/Shared"]
            .iter()
            .map(|p| sdf::path(p).unwrap())
            .collect();
        assert_eq!(collect_reference_closure(&layer, &chair), expected);
    }

    #[test]
    fn internal_targets_are_not_external() {
        let layer = Layer::from_string("refs.usda", LAYER).unwrap();
        let external = collect_external_references(&layer, &sdf::path("/Library").unwrap());
        assert!(external.is_empty());
    }
}
