use std::collections::HashMap;

use half::f16;
use strum::EnumTryAs;

use super::{LayerOffset, ListOp, Path, Payload, Reference, Specifier, Variability};

/// Time samples in authoring order, `(time, value)`.
pub type TimeSampleMap = Vec<(f64, Value)>;

/// Field value.
///
/// Tuple types (`float3`, `matrix4d`, ...) store their components flat; an
/// array of tuples is the concatenation of its elements. The attribute's
/// `typeName` tells a scalar tuple from a one element array.
#[derive(Debug, Clone, PartialEq, EnumTryAs)]
pub enum Value {
    Bool(bool),
    BoolVec(Vec<bool>),

    Uchar(u8),
    UcharVec(Vec<u8>),
    Int(i32),
    IntVec(Vec<i32>),
    Uint(u32),
    UintVec(Vec<u32>),
    Int64(i64),
    Int64Vec(Vec<i64>),
    Uint64(u64),
    Uint64Vec(Vec<u64>),

    Half(f16),
    HalfVec(Vec<f16>),
    Float(f32),
    FloatVec(Vec<f32>),
    Double(f64),
    DoubleVec(Vec<f64>),

    Vec2i(Vec<i32>),
    Vec3i(Vec<i32>),
    Vec4i(Vec<i32>),
    Vec2h(Vec<f16>),
    Vec3h(Vec<f16>),
    Vec4h(Vec<f16>),
    Vec2f(Vec<f32>),
    Vec3f(Vec<f32>),
    Vec4f(Vec<f32>),
    Vec2d(Vec<f64>),
    Vec3d(Vec<f64>),
    Vec4d(Vec<f64>),

    /// Quaternions, real part first.
    Quath(Vec<f16>),
    Quatf(Vec<f32>),
    Quatd(Vec<f64>),

    /// Row-major matrices.
    Matrix2d(Vec<f64>),
    Matrix3d(Vec<f64>),
    Matrix4d(Vec<f64>),

    String(String),
    StringVec(Vec<String>),
    Token(String),
    TokenVec(Vec<String>),
    AssetPath(String),
    AssetPathVec(Vec<String>),

    Dictionary(HashMap<String, Value>),
    TimeSamples(TimeSampleMap),

    Specifier(Specifier),
    Variability(Variability),

    PathListOp(ListOp<Path>),
    ReferenceListOp(ListOp<Reference>),
    PayloadListOp(ListOp<Payload>),
    TokenListOp(ListOp<String>),
    StringListOp(ListOp<String>),

    VariantSelectionMap(HashMap<String, String>),
    LayerOffsetVec(Vec<LayerOffset>),

    /// Explicitly authored `None` blocking weaker opinions.
    ValueBlock,
}

impl Value {
    /// Numeric components as `f64`, for scalars, tuples and numeric arrays.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        fn cast<T: Copy + Into<f64>>(values: &[T]) -> Vec<f64> {
            values.iter().map(|v| (*v).into()).collect()
        }
        fn cast_half(values: &[f16]) -> Vec<f64> {
            values.iter().map(|v| v.to_f64()).collect()
        }

        let out = match self {
            Value::Uchar(v) => vec![f64::from(*v)],
            Value::Int(v) => vec![f64::from(*v)],
            Value::Uint(v) => vec![f64::from(*v)],
            Value::Int64(v) => vec![*v as f64],
            Value::Uint64(v) => vec![*v as f64],
            Value::Half(v) => vec![v.to_f64()],
            Value::Float(v) => vec![f64::from(*v)],
            Value::Double(v) => vec![*v],

            Value::UcharVec(v) => cast(v),
            Value::IntVec(v) | Value::Vec2i(v) | Value::Vec3i(v) | Value::Vec4i(v) => cast(v),
            Value::UintVec(v) => cast(v),
            Value::Int64Vec(v) => v.iter().map(|x| *x as f64).collect(),
            Value::Uint64Vec(v) => v.iter().map(|x| *x as f64).collect(),

            Value::HalfVec(v) | Value::Vec2h(v) | Value::Vec3h(v) | Value::Vec4h(v) | Value::Quath(v) => cast_half(v),
            Value::FloatVec(v) | Value::Vec2f(v) | Value::Vec3f(v) | Value::Vec4f(v) | Value::Quatf(v) => cast(v),
            Value::DoubleVec(v)
            | Value::Vec2d(v)
            | Value::Vec3d(v)
            | Value::Vec4d(v)
            | Value::Quatd(v)
            | Value::Matrix2d(v)
            | Value::Matrix3d(v)
            | Value::Matrix4d(v) => v.clone(),

            _ => return None,
        };
        Some(out)
    }

    /// Single scalar as `f64`.
    pub fn to_f64(&self) -> Option<f64> {
        match self.to_f64_vec() {
            Some(values) if values.len() == 1 => values.first().copied(),
            _ => None,
        }
    }

    /// Token or string content.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Token(s) | Value::String(s) | Value::AssetPath(s) => Some(s),
            _ => None,
        }
    }

    /// Token or string array content.
    pub fn as_text_vec(&self) -> Option<&[String]> {
        match self {
            Value::TokenVec(v) | Value::StringVec(v) | Value::AssetPathVec(v) => Some(v),
            _ => None,
        }
    }

    /// Number of components of one element of this value's tuple type.
    pub fn tuple_arity(&self) -> usize {
        match self {
            Value::Vec2i(_) | Value::Vec2h(_) | Value::Vec2f(_) | Value::Vec2d(_) => 2,
            Value::Vec3i(_) | Value::Vec3h(_) | Value::Vec3f(_) | Value::Vec3d(_) => 3,
            Value::Vec4i(_) | Value::Vec4h(_) | Value::Vec4f(_) | Value::Vec4d(_) => 4,
            Value::Quath(_) | Value::Quatf(_) | Value::Quatd(_) => 4,
            Value::Matrix2d(_) => 4,
            Value::Matrix3d(_) => 9,
            Value::Matrix4d(_) => 16,
            _ => 1,
        }
    }

    /// Scalar type name matching this value, used where no `typeName` is
    /// authored (dictionary entries).
    pub fn type_name_hint(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::BoolVec(_) => "bool[]",
            Value::Uchar(_) => "uchar",
            Value::UcharVec(_) => "uchar[]",
            Value::Int(_) => "int",
            Value::IntVec(_) => "int[]",
            Value::Uint(_) => "uint",
            Value::UintVec(_) => "uint[]",
            Value::Int64(_) => "int64",
            Value::Int64Vec(_) => "int64[]",
            Value::Uint64(_) => "uint64",
            Value::Uint64Vec(_) => "uint64[]",
            Value::Half(_) => "half",
            Value::HalfVec(_) => "half[]",
            Value::Float(_) => "float",
            Value::FloatVec(_) => "float[]",
            Value::Double(_) => "double",
            Value::DoubleVec(_) => "double[]",
            Value::Vec2i(v) => pick(v.len(), 2, "int2", "int2[]"),
            Value::Vec3i(v) => pick(v.len(), 3, "int3", "int3[]"),
            Value::Vec4i(v) => pick(v.len(), 4, "int4", "int4[]"),
            Value::Vec2h(v) => pick(v.len(), 2, "half2", "half2[]"),
            Value::Vec3h(v) => pick(v.len(), 3, "half3", "half3[]"),
            Value::Vec4h(v) => pick(v.len(), 4, "half4", "half4[]"),
            Value::Vec2f(v) => pick(v.len(), 2, "float2", "float2[]"),
            Value::Vec3f(v) => pick(v.len(), 3, "float3", "float3[]"),
            Value::Vec4f(v) => pick(v.len(), 4, "float4", "float4[]"),
            Value::Vec2d(v) => pick(v.len(), 2, "double2", "double2[]"),
            Value::Vec3d(v) => pick(v.len(), 3, "double3", "double3[]"),
            Value::Vec4d(v) => pick(v.len(), 4, "double4", "double4[]"),
            Value::Quath(v) => pick(v.len(), 4, "quath", "quath[]"),
            Value::Quatf(v) => pick(v.len(), 4, "quatf", "quatf[]"),
            Value::Quatd(v) => pick(v.len(), 4, "quatd", "quatd[]"),
            Value::Matrix2d(v) => pick(v.len(), 4, "matrix2d", "matrix2d[]"),
            Value::Matrix3d(v) => pick(v.len(), 9, "matrix3d", "matrix3d[]"),
            Value::Matrix4d(v) => pick(v.len(), 16, "matrix4d", "matrix4d[]"),
            Value::String(_) => "string",
            Value::StringVec(_) => "string[]",
            Value::Token(_) => "token",
            Value::TokenVec(_) => "token[]",
            Value::AssetPath(_) => "asset",
            Value::AssetPathVec(_) => "asset[]",
            Value::Dictionary(_) => "dictionary",
            _ => "",
        }
    }

    /// Merge `weaker` into this dictionary, recursing into nested dictionaries.
    /// Keys already present win.
    pub fn merge_dictionary(&mut self, weaker: &Value) {
        let (Value::Dictionary(strong), Value::Dictionary(weak)) = (self, weaker) else {
            return;
        };
        for (key, weak_value) in weak {
            match strong.get_mut(key) {
                Some(existing) => existing.merge_dictionary(weak_value),
                None => {
                    strong.insert(key.clone(), weak_value.clone());
                }
            }
        }
    }
}

fn pick(len: usize, arity: usize, scalar: &'static str, array: &'static str) -> &'static str {
    if len == arity {
        scalar
    } else {
        array
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Specifier> for Value {
    fn from(value: Specifier) -> Self {
        Value::Specifier(value)
    }
}

impl From<Variability> for Value {
    fn from(value: Variability) -> Self {
        Value::Variability(value)
    }
}
