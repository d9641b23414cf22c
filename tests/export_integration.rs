//! Integration tests for prim export.

use std::path::PathBuf;

use glam::DMat4;
use usd_export::export::{compute_offsets, export_prims, ExportError, ExportOptions, ExportReport};
use usd_export::geom::compute_local_to_world_transform;
use usd_export::sdf::schema::FieldKey;
use usd_export::sdf::{self, Path, Value};
use usd_export::usd::{Stage, TimeCode};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn open_scene() -> Stage {
    Stage::open(fixture_path("scene.usda")).expect("Failed to open scene")
}

fn path(text: &str) -> Path {
    sdf::path(text).unwrap()
}

fn export(stage: &mut Stage, prims: &[&str], file_name: &str) -> (tempfile::TempDir, ExportReport, Stage) {
    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join(file_name);
    let prims: Vec<Path> = prims.iter().map(|p| path(p)).collect();

    let report = export_prims(stage, &prims, &destination, &ExportOptions::default()).expect("Export failed");
    let exported = Stage::open(&destination).expect("Failed to reopen export");
    (temp_dir, report, exported)
}

fn default_value(stage: &Stage, prim: &str, name: &str) -> Option<Value> {
    stage.attribute_value(&path(prim), name, TimeCode::Default)
}

#[test]
fn test_single_prim_round_trip() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Table"], "table.usda");

    assert_eq!(report.default_prim, "Table");
    assert_eq!(exported.default_prim(), Some("Table"));
    assert_eq!(exported.up_axis(), Some("Z"));
    assert_eq!(exported.children(&Path::abs_root()), vec![path("/Table")]);

    // Stronger root layer opinion wins over the sublayer, weaker ones survive.
    assert_eq!(default_value(&exported, "/Table", "width"), Some(Value::Double(2.5)));
    assert_eq!(
        default_value(&exported, "/Table", "info:source"),
        Some(Value::Token("library".into()))
    );
    assert!(exported.has_prim(&path("/Table/Top")));

    // A single prim keeps its transform as authored.
    assert_eq!(
        default_value(&exported, "/Table", "xformOp:translate"),
        Some(Value::Vec3d(vec![6.0, 2.0, 1.0]))
    );

    assert_eq!(
        default_value(&exported, "/Table", "ui:displayGroup"),
        Some(Value::Token("Material Graphs".into()))
    );
    assert_eq!(
        default_value(&exported, "/Table", "ui:displayName"),
        Some(Value::Token("Table".into()))
    );
    assert_eq!(default_value(&exported, "/Table", "ui:order"), Some(Value::Int(1024)));
}

#[test]
fn test_descendants_of_selected_prims_are_dropped() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Table/Top", "/World/Table"], "table.usda");

    assert_eq!(report.prims.len(), 1);
    assert_eq!(report.prims[0].source, path("/World/Table"));
    // One prim left, so no container.
    assert!(!exported.has_prim(&path("/Root")));
    assert!(exported.has_prim(&path("/Table/Top")));
}

#[test]
fn test_multi_select_is_centered_on_combined_bounds() {
    let mut stage = open_scene();
    let selection = [path("/World/Chair"), path("/World/Table")];
    let offsets = compute_offsets(&stage, &selection, &ExportOptions::default()).unwrap();

    let (_dir, report, exported) = export(&mut stage, &["/World/Chair", "/World/Table"], "props.usda");
    assert_eq!(report.default_prim, "Root");
    assert_eq!(exported.prim_type_name(&path("/Root")), Some("Xform"));

    // Chair spans x [-4.5, -3.5], Table [4, 8]; y [-0.5, 3]; z [-0.5, 2].
    assert!((offsets.centroid.x - 1.75).abs() < 1e-9);
    assert!((offsets.centroid.y - 1.25).abs() < 1e-9);
    assert!((offsets.centroid.z - 0.75).abs() < 1e-9);

    for prim in &report.prims {
        let container = prim.container.as_ref().expect("Transformable prims get a container");
        assert_eq!(container.parent(), Some(path("/Root")));
        assert_eq!(prim.destination.parent().as_ref(), Some(container));

        let original = compute_local_to_world_transform(&stage, &prim.source, TimeCode::Default).unwrap();
        let moved = compute_local_to_world_transform(&exported, &prim.destination, TimeCode::Default).unwrap();
        let restored = moved.w_axis.truncate() + offsets.centroid;
        assert!(
            restored.abs_diff_eq(original.w_axis.truncate(), 1e-6),
            "{} moved from {:?} to {:?}",
            prim.source,
            original.w_axis,
            restored
        );
        for axis in 0..3 {
            assert!(moved.col(axis).abs_diff_eq(original.col(axis), 1e-5));
        }

        let (local, _) = usd_export::geom::compute_local_transform(&exported, &prim.destination, TimeCode::Default).unwrap();
        assert!(local.abs_diff_eq(DMat4::IDENTITY, 1e-6));
    }
}

#[test]
fn test_name_collisions_get_suffixes() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Chair", "/Props/Chair"], "chairs.usda");

    let destinations: Vec<Path> = report.prims.iter().map(|p| p.destination.clone()).collect();
    assert_eq!(destinations, vec![path("/Root/Chair/Chair"), path("/Root/Chair_01/Chair")]);
    assert_eq!(exported.prim_type_name(&path("/Root/Chair_01/Chair")), Some("Sphere"));
    assert_eq!(
        default_value(&exported, "/Root/Chair_01/Chair", "ui:displayName"),
        Some(Value::Token("Chair".into()))
    );
}

#[test]
fn test_untransformable_prims_sit_directly_under_root() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Table", "/World/Looks"], "mixed.usda");

    let looks = &report.prims[1];
    assert_eq!(looks.container, None);
    assert_eq!(looks.destination, path("/Root/Looks"));
    assert!(exported.has_prim(&path("/Root/Looks/Varnish")));
    assert!(exported.property_names(&path("/Root/Looks")).iter().all(|name| !name.starts_with("xformOp")));
}

#[test]
fn test_external_references_are_carried_along() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Chair"], "chair.usda");

    // Chair -> ChairBase -> Oak -> Grain; every link of the chain comes along.
    let mut dependencies = report.prims[0].external_dependencies.clone();
    dependencies.sort();
    let mut expected = vec![path("/Library/ChairBase"), path("/Materials/Grain"), path("/Materials/Oak")];
    expected.sort();
    assert_eq!(dependencies, expected);
    assert_eq!(
        default_value(&exported, "/Materials/Oak", "info:species"),
        Some(Value::Token("oak".into()))
    );
    assert_eq!(default_value(&exported, "/Materials/Grain", "scale"), Some(Value::Double(4.0)));
    assert_eq!(exported.prim_type_name(&path("/Library/ChairBase")), Some("Xform"));
    assert_eq!(
        default_value(&exported, "/Library/ChairBase", "legHeight"),
        Some(Value::Double(0.45))
    );
    assert!(exported.has_prim(&path("/Library/ChairBase/Leg")));

    // The reference still resolves inside the exported layer.
    match exported.prim_field(&path("/Chair"), FieldKey::References) {
        Some(Value::ReferenceListOp(references)) => {
            let targets: Vec<Path> = references.flatten().into_iter().map(|r| r.prim_path).collect();
            assert_eq!(targets, vec![path("/Library/ChairBase")]);
        }
        other => panic!("Expected references on /Chair, found {other:?}"),
    }
}

#[test]
fn test_variant_sets_are_replicated() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Model"], "model.usda");

    let model = path("/Model");
    assert_eq!(report.prims[0].variant_sets, 1);
    assert_eq!(exported.variant_set_names(&model), vec!["lod".to_owned()]);
    assert_eq!(
        exported.variant_names(&model, "lod"),
        vec!["high".to_owned(), "low".to_owned()]
    );
    assert_eq!(exported.variant_selection(&model, "lod").as_deref(), Some("high"));
    assert_eq!(exported.prim_type_name(&path("/Model/Body")), Some("Mesh"));

    // The source selection is untouched.
    assert_eq!(
        stage.variant_selection(&path("/World/Model"), "lod").as_deref(),
        Some("high")
    );
}

#[test]
fn test_variant_sets_on_descendants_are_replicated() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Table"], "table.usda");

    let top = path("/Table/Top");
    assert_eq!(report.prims[0].variant_sets, 1);
    assert_eq!(exported.variant_set_names(&top), vec!["finish".to_owned()]);
    assert_eq!(
        exported.variant_names(&top, "finish"),
        vec!["gloss".to_owned(), "matte".to_owned()]
    );
    assert_eq!(exported.variant_selection(&top, "finish").as_deref(), Some("matte"));
    assert!(exported.root_layer().has_spec(&path("/Table/Top{finish=gloss}Coat")));
    assert_eq!(default_value(&exported, "/Table/Top", "roughness"), Some(Value::Double(0.8)));

    assert_eq!(
        stage.variant_selection(&path("/World/Table/Top"), "finish").as_deref(),
        Some("matte")
    );
}

#[test]
fn test_variant_sets_survive_multi_select() {
    let mut stage = open_scene();
    let (_dir, report, exported) = export(&mut stage, &["/World/Model", "/World/Table"], "props.usda");

    let model = report.prims.iter().find(|p| p.source == path("/World/Model")).unwrap();
    assert_eq!(model.destination, path("/Root/Model/Model"));
    assert_eq!(model.variant_sets, 1);
    assert_eq!(exported.variant_set_names(&model.destination), vec!["lod".to_owned()]);
    assert_eq!(
        exported.variant_selection(&model.destination, "lod").as_deref(),
        Some("high")
    );
    assert!(exported.root_layer().has_spec(&path("/Root/Model/Model{lod=low}Body")));

    let table = report.prims.iter().find(|p| p.source == path("/World/Table")).unwrap();
    let top = table.destination.append_child("Top").unwrap();
    assert_eq!(top, path("/Root/Table/Table/Top"));
    assert_eq!(table.variant_sets, 1);
    assert_eq!(
        exported.variant_names(&top, "finish"),
        vec!["gloss".to_owned(), "matte".to_owned()]
    );
    assert_eq!(exported.variant_selection(&top, "finish").as_deref(), Some("matte"));
}

#[test]
fn test_binary_destinations_are_rejected_up_front() {
    let mut stage = open_scene();
    let temp_dir = tempfile::tempdir().unwrap();
    let destination = temp_dir.path().join("props.usdc");

    let result = export_prims(&mut stage, &[path("/World/Table")], &destination, &ExportOptions::default());
    assert!(matches!(result, Err(ExportError::UnsupportedFormat(ext)) if ext == "usdc"));
    assert!(!destination.exists());
}

#[test]
fn test_source_file_is_not_modified() {
    let before = std::fs::read_to_string(fixture_path("scene.usda")).unwrap();
    let mut stage = open_scene();
    let _ = export(&mut stage, &["/World/Model", "/World/Chair"], "both.usda");
    let after = std::fs::read_to_string(fixture_path("scene.usda")).unwrap();
    assert_eq!(before, after);
}
