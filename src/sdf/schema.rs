//! Well known field names.
//!
//! See <https://openusd.org/dev/api/sdf_page_front.html>

/// Field keys stored on specs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Active,
    ApiSchemas,
    AssetInfo,
    Comment,
    ConnectionPaths,
    Custom,
    CustomData,
    CustomLayerData,
    Default,
    DefaultPrim,
    Documentation,
    EndTimeCode,
    FramesPerSecond,
    Hidden,
    InheritPaths,
    Instanceable,
    Kind,
    MetersPerUnit,
    Payload,
    References,
    Specializes,
    Specifier,
    StartTimeCode,
    SubLayers,
    SubLayerOffsets,
    TargetPaths,
    TimeCodesPerSecond,
    TimeSamples,
    TypeName,
    UpAxis,
    Variability,
    VariantSelection,
    VariantSetNames,
}

impl FieldKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Active => "active",
            FieldKey::ApiSchemas => "apiSchemas",
            FieldKey::AssetInfo => "assetInfo",
            FieldKey::Comment => "comment",
            FieldKey::ConnectionPaths => "connectionPaths",
            FieldKey::Custom => "custom",
            FieldKey::CustomData => "customData",
            FieldKey::CustomLayerData => "customLayerData",
            FieldKey::Default => "default",
            FieldKey::DefaultPrim => "defaultPrim",
            FieldKey::Documentation => "documentation",
            FieldKey::EndTimeCode => "endTimeCode",
            FieldKey::FramesPerSecond => "framesPerSecond",
            FieldKey::Hidden => "hidden",
            FieldKey::InheritPaths => "inheritPaths",
            FieldKey::Instanceable => "instanceable",
            FieldKey::Kind => "kind",
            FieldKey::MetersPerUnit => "metersPerUnit",
            FieldKey::Payload => "payload",
            FieldKey::References => "references",
            FieldKey::Specializes => "specializes",
            FieldKey::Specifier => "specifier",
            FieldKey::StartTimeCode => "startTimeCode",
            FieldKey::SubLayers => "subLayers",
            FieldKey::SubLayerOffsets => "subLayerOffsets",
            FieldKey::TargetPaths => "targetPaths",
            FieldKey::TimeCodesPerSecond => "timeCodesPerSecond",
            FieldKey::TimeSamples => "timeSamples",
            FieldKey::TypeName => "typeName",
            FieldKey::UpAxis => "upAxis",
            FieldKey::Variability => "variability",
            FieldKey::VariantSelection => "variantSelection",
            FieldKey::VariantSetNames => "variantSetNames",
        }
    }
}

impl AsRef<str> for FieldKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Fields listing the children of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildrenKey {
    PrimChildren,
    PropertyChildren,
    VariantSetChildren,
    VariantChildren,
}

impl ChildrenKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChildrenKey::PrimChildren => "primChildren",
            ChildrenKey::PropertyChildren => "properties",
            ChildrenKey::VariantSetChildren => "variantSetChildren",
            ChildrenKey::VariantChildren => "variantChildren",
        }
    }

    pub const ALL: [ChildrenKey; 4] = [
        ChildrenKey::PrimChildren,
        ChildrenKey::PropertyChildren,
        ChildrenKey::VariantSetChildren,
        ChildrenKey::VariantChildren,
    ];

    pub fn is_children_field(name: &str) -> bool {
        Self::ALL.iter().any(|key| key.as_str() == name)
    }
}

impl AsRef<str> for ChildrenKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
