mod composition;
mod error;
mod hierarchy;
mod metadata;
mod token_ops;
mod value;

use logos::Logos;
use std::iter::Peekable;
use std::ops::Range;

use crate::usda::token::Token;

pub use error::SourceLocation;

/// Parser translates a list of tokens into structured data.
pub struct Parser<'a> {
    iter: Peekable<logos::SpannedIter<'a, Token<'a>>>,
    source: &'a str,
    last_span: Option<Range<usize>>,
}

impl<'a> Parser<'a> {
    /// Create a new parser from source text.
    pub fn new(data: &'a str) -> Self {
        Self {
            iter: Token::lexer(data).spanned().peekable(),
            source: data,
            last_span: None,
        }
    }

    /// Location of the last token read, where a failed parse stopped.
    pub fn location(&self) -> Option<SourceLocation> {
        let span = self.last_span.as_ref()?;
        SourceLocation::locate(self.source, span.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{self, schema::ChildrenKey, schema::FieldKey};

    fn parse(text: &str) -> std::collections::HashMap<sdf::Path, sdf::Spec> {
        Parser::new(text).parse().unwrap()
    }

    #[test]
    fn parse_empty_array() {
        let mut parser = Parser::new("[]");
        let array = parser.parse_array::<u32>().unwrap();
        assert!(array.is_empty());
    }

    #[test]
    fn parse_tuple() {
        let mut parser = Parser::new("(1, 2, 3)");
        let result = parser.parse_tuple::<u32>(3).unwrap();
        assert_eq!(result, vec![1_u32, 2, 3]);

        assert!(Parser::new("(1, 2)").parse_tuple::<u32>(3).is_err());
    }

    #[test]
    fn parse_array_of_tuples() {
        let mut parser = Parser::new("[(1, 2), (3, 4),]");
        let result = parser.parse_tuples::<u32>(2, true).unwrap();
        assert_eq!(result, vec![1_u32, 2, 3, 4]);
    }

    #[test]
    fn parse_pseudo_root() {
        let mut parser = Parser::new(
            r#"
            #usda 1.0
            (
                "exported layer"
                doc = """test string"""

                upAxis = "Y"
                metersPerUnit = 0.01

                defaultPrim = "World"
            )
            "#,
        );

        let pseudo_root = parser.read_pseudo_root().unwrap();

        assert_eq!(
            pseudo_root.get(FieldKey::Documentation).and_then(|v| v.try_as_string_ref()).unwrap(),
            "test string"
        );
        assert_eq!(
            pseudo_root.get(FieldKey::Comment).and_then(|v| v.try_as_string_ref()).unwrap(),
            "exported layer"
        );
        assert_eq!(
            pseudo_root.get(FieldKey::UpAxis).and_then(|v| v.try_as_token_ref()).unwrap(),
            "Y"
        );
        assert_eq!(pseudo_root.get(FieldKey::MetersPerUnit), Some(&sdf::Value::Double(0.01)));
    }

    #[test]
    fn parse_dictionary_with_quoted_namespace_keys() {
        let mut parser = Parser::new(
            r#"
#usda 1.0
(
    customLayerData = {
        dictionary renderSettings = {
            bool "rtx:raytracing:fractionalCutoutOpacity" = 1
            token "rtx:rendermode" = "PathTracing"
        }
    }
)
"#,
        );

        let pseudo_root = parser.read_pseudo_root().unwrap();
        let dict = match pseudo_root.get(FieldKey::CustomLayerData) {
            Some(sdf::Value::Dictionary(dict)) => dict,
            other => panic!("customLayerData parsed as unexpected value: {other:?}"),
        };

        let render_settings = match dict.get("renderSettings") {
            Some(sdf::Value::Dictionary(d)) => d,
            other => panic!("renderSettings parsed as unexpected value: {other:?}"),
        };

        assert_eq!(
            render_settings.get("rtx:raytracing:fractionalCutoutOpacity"),
            Some(&sdf::Value::Bool(true))
        );
        assert!(render_settings.contains_key("rtx:rendermode"));
    }

    #[test]
    fn parse_prim_hierarchy() {
        let specs = parse(
            r#"#usda 1.0
def Xform "World" (
    kind = "assembly"
)
{
    double3 xformOp:translate = (1, 2, 3)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Box"
    {
        int[] faceVertexCounts = [4, 4]
        point3f[] points = [(0, 0, 0), (1, 0, 0)]
    }

    over "Lamp"
    {
    }
}
"#,
        );

        let root = &specs[&sdf::Path::abs_root()];
        assert_eq!(root.children(ChildrenKey::PrimChildren), ["World"]);

        let world = &specs[&sdf::path("/World").unwrap()];
        assert_eq!(world.specifier(), Some(sdf::Specifier::Def));
        assert_eq!(world.type_name(), Some("Xform"));
        assert_eq!(world.get(FieldKey::Kind), Some(&sdf::Value::Token("assembly".into())));
        assert_eq!(world.children(ChildrenKey::PrimChildren), ["Box", "Lamp"]);
        assert_eq!(
            world.children(ChildrenKey::PropertyChildren),
            ["xformOp:translate", "xformOpOrder"]
        );

        let translate = &specs[&sdf::path("/World.xformOp:translate").unwrap()];
        assert_eq!(
            translate.get(FieldKey::Default),
            Some(&sdf::Value::Vec3d(vec![1.0, 2.0, 3.0]))
        );
        let order = &specs[&sdf::path("/World.xformOpOrder").unwrap()];
        assert_eq!(order.get(FieldKey::Variability), Some(&sdf::Value::Variability(sdf::Variability::Uniform)));

        let points = &specs[&sdf::path("/World/Box.points").unwrap()];
        assert_eq!(points.get(FieldKey::TypeName), Some(&sdf::Value::Token("point3f[]".into())));

        let lamp = &specs[&sdf::path("/World/Lamp").unwrap()];
        assert_eq!(lamp.specifier(), Some(sdf::Specifier::Over));
        assert_eq!(lamp.type_name(), None);
    }

    #[test]
    fn parse_connections_and_time_samples_share_a_spec() {
        let specs = parse(
            r#"#usda 1.0
def Material "Mat"
{
    token outputs:surface.connect = </Mat/Shader.outputs:surface>
    float inputs:roughness = 0.5
    float inputs:roughness.timeSamples = {
        10: 1,
        0: 0.25,
    }
    rel material:binding = </Mat>
    prepend rel proxyPrim = [</A>, </B>]

    def Shader "Shader"
    {
        token outputs:surface
    }
}
"#,
        );

        let mat = &specs[&sdf::path("/Mat").unwrap()];
        assert_eq!(
            mat.children(ChildrenKey::PropertyChildren),
            ["outputs:surface", "inputs:roughness", "material:binding", "proxyPrim"]
        );

        let surface = &specs[&sdf::path("/Mat.outputs:surface").unwrap()];
        let connections = surface
            .get(FieldKey::ConnectionPaths)
            .and_then(|v| v.try_as_path_list_op_ref())
            .expect("connection paths");
        assert_eq!(
            connections.explicit_items,
            vec![sdf::path("/Mat/Shader.outputs:surface").unwrap()]
        );
        assert!(specs.keys().all(|path| !path.to_string().ends_with(".connect")));

        let roughness = &specs[&sdf::path("/Mat.inputs:roughness").unwrap()];
        assert_eq!(roughness.get(FieldKey::Default), Some(&sdf::Value::Float(0.5)));
        let samples = roughness
            .get(FieldKey::TimeSamples)
            .and_then(|v| v.try_as_time_samples_ref())
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], (0.0, sdf::Value::Float(0.25)));

        let binding = &specs[&sdf::path("/Mat.material:binding").unwrap()];
        assert_eq!(binding.ty, sdf::SpecType::Relationship);
        let proxy = &specs[&sdf::path("/Mat.proxyPrim").unwrap()];
        let targets = proxy.get(FieldKey::TargetPaths).and_then(|v| v.try_as_path_list_op_ref()).unwrap();
        assert_eq!(targets.prepended_items.len(), 2);
        assert!(!targets.explicit);
    }

    #[test]
    fn parse_variant_sets() {
        let specs = parse(
            r#"#usda 1.0
def Xform "Asset" (
    variants = {
        string lod = "high"
    }
    prepend variantSets = "lod"
)
{
    variantSet "lod" = {
        "high" {
            def Mesh "Detail"
            {
            }
        }
        "low" (
            kind = "component"
        ) {
            double radius = 1
        }
    }
}
"#,
        );

        let asset = &specs[&sdf::path("/Asset").unwrap()];
        assert_eq!(asset.children(ChildrenKey::VariantSetChildren), ["lod"]);
        let selection = asset
            .get(FieldKey::VariantSelection)
            .and_then(|v| v.try_as_variant_selection_map_ref())
            .unwrap();
        assert_eq!(selection["lod"], "high");

        let set = &specs[&sdf::path("/Asset{lod=}").unwrap()];
        assert_eq!(set.ty, sdf::SpecType::VariantSet);
        assert_eq!(set.children(ChildrenKey::VariantChildren), ["high", "low"]);

        let high = &specs[&sdf::path("/Asset{lod=high}").unwrap()];
        assert_eq!(high.ty, sdf::SpecType::Variant);
        assert_eq!(high.children(ChildrenKey::PrimChildren), ["Detail"]);
        assert!(specs.contains_key(&sdf::path("/Asset{lod=high}Detail").unwrap()));

        let low = &specs[&sdf::path("/Asset{lod=low}").unwrap()];
        assert_eq!(low.get(FieldKey::Kind), Some(&sdf::Value::Token("component".into())));
        assert!(specs.contains_key(&sdf::path("/Asset{lod=low}.radius").unwrap()));
    }

    #[test]
    fn parse_references_and_payloads() {
        let specs = parse(
            r#"#usda 1.0
def "Marble" (
    prepend references = @./marble.usda@</Marble> (offset = 10; scale = 2)
)
{
}

def "Internal" (
    references = </Marble>
)
{
}

def "Sphere" (
    payload = @./sphere.usda@
)
{
}
"#,
        );

        let marble = &specs[&sdf::path("/Marble").unwrap()];
        let references = marble
            .get(FieldKey::References)
            .and_then(|v| v.try_as_reference_list_op_ref())
            .unwrap();
        let reference = &references.prepended_items[0];
        assert_eq!(reference.asset_path, "./marble.usda");
        assert_eq!(reference.prim_path, sdf::path("/Marble").unwrap());
        assert_eq!(reference.layer_offset.offset, 10.0);
        assert_eq!(reference.layer_offset.scale, 2.0);

        let internal = &specs[&sdf::path("/Internal").unwrap()];
        let references = internal
            .get(FieldKey::References)
            .and_then(|v| v.try_as_reference_list_op_ref())
            .unwrap();
        assert!(references.explicit);
        assert!(references.explicit_items[0].is_internal());

        let sphere = &specs[&sdf::path("/Sphere").unwrap()];
        let payloads = sphere.get(FieldKey::Payload).and_then(|v| v.try_as_payload_list_op_ref()).unwrap();
        assert_eq!(payloads.explicit_items[0].asset_path, "./sphere.usda");
        assert!(payloads.explicit_items[0].prim_path.is_empty());
    }

    #[test]
    fn reject_missing_magic() {
        assert!(Parser::new("def \"A\" {}").parse().is_err());
    }
}
