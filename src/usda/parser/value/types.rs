use anyhow::{bail, Result};
use std::str::FromStr;

use crate::usda::token::Token;

/// Element type of numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    Uchar,
    Int,
    Uint,
    Int64,
    Uint64,
    Half,
    Float,
    Double,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Self> {
        let scalar = match name {
            "bool" => Scalar::Bool,
            "uchar" => Scalar::Uchar,
            "int" => Scalar::Int,
            "uint" => Scalar::Uint,
            "int64" => Scalar::Int64,
            "uint64" => Scalar::Uint64,
            "half" => Scalar::Half,
            "float" => Scalar::Float,
            "double" | "timecode" => Scalar::Double,
            _ => return None,
        };
        Some(scalar)
    }

    fn from_precision(suffix: &str) -> Option<Self> {
        match suffix {
            "h" => Some(Scalar::Half),
            "f" => Some(Scalar::Float),
            "d" => Some(Scalar::Double),
            _ => None,
        }
    }
}

/// Value types understood by the text parser.
///
/// Role types (`point3f`, `color4d`, `texCoord2h`, ...) map onto the tuple
/// type they are stored as. Matrix arrays are read as one flat list.
///
/// See
/// - <https://openusd.org/dev/api/_usd__page__datatypes.html#Usd_Basic_Datatypes>
/// - <https://openusd.org/dev/api/_usd__page__datatypes.html#Usd_Roles>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Number(Scalar),
    NumberVec(Scalar),
    /// Fixed-size tuple such as `int2` or `color3f`.
    Tuple(Scalar, usize),
    TupleVec(Scalar, usize),
    Quat(Scalar),
    QuatVec(Scalar),
    Matrix(usize),

    String,
    StringVec,
    Token,
    TokenVec,
    Asset,
    AssetVec,

    Dictionary,
}

impl Type {
    pub const DOUBLE: Type = Type::Number(Scalar::Double);

    fn pick(array: bool, single: Type, vec: Type) -> Type {
        if array {
            vec
        } else {
            single
        }
    }
}

impl FromStr for Type {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        let (base, array) = match name.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (name, false),
        };

        let ty = match base {
            "string" => Type::pick(array, Type::String, Type::StringVec),
            "token" => Type::pick(array, Type::Token, Type::TokenVec),
            "asset" => Type::pick(array, Type::Asset, Type::AssetVec),
            "dictionary" if !array => Type::Dictionary,
            "matrix2d" => Type::Matrix(2),
            "matrix3d" => Type::Matrix(3),
            "matrix4d" | "frame4d" => Type::Matrix(4),
            _ => {
                if let Some(scalar) = Scalar::from_name(base) {
                    Type::pick(array, Type::Number(scalar), Type::NumberVec(scalar))
                } else if let Some(scalar) = base.strip_prefix("quat").and_then(Scalar::from_precision) {
                    Type::pick(array, Type::Quat(scalar), Type::QuatVec(scalar))
                } else if let Some((scalar, dimension)) = tuple_type(base) {
                    Type::pick(array, Type::Tuple(scalar, dimension), Type::TupleVec(scalar, dimension))
                } else {
                    bail!("Unsupported data type: {name}");
                }
            }
        };
        Ok(ty)
    }
}

/// `int3`, `half2`, `double4`, or a role name like `normal3f`.
fn tuple_type(name: &str) -> Option<(Scalar, usize)> {
    let digit = name.find(|c: char| c.is_ascii_digit())?;
    let (prefix, rest) = name.split_at(digit);
    let dimension = rest[..1].parse::<usize>().ok()?;
    let suffix = &rest[1..];

    let (scalar, allowed): (Scalar, &[usize]) = match (prefix, suffix) {
        ("int" | "half" | "float" | "double", "") => (Scalar::from_name(prefix)?, &[2, 3, 4]),
        ("point" | "normal" | "vector", precision) => (Scalar::from_precision(precision)?, &[3]),
        ("color", precision) => (Scalar::from_precision(precision)?, &[3, 4]),
        ("texCoord", precision) => (Scalar::from_precision(precision)?, &[2, 3]),
        _ => return None,
    };
    allowed.contains(&dimension).then_some((scalar, dimension))
}

/// Source text of keyword tokens, for places where keywords are valid names
/// (attribute names, dictionary keys, metadata keys).
pub fn keyword_lexeme(token: &Token) -> Option<&'static str> {
    let lexeme = match token {
        Token::Def => "def",
        Token::Over => "over",
        Token::Class => "class",
        Token::VariantSet => "variantSet",
        Token::Rel => "rel",
        Token::Add => "add",
        Token::Append => "append",
        Token::Delete => "delete",
        Token::Prepend => "prepend",
        Token::Reorder => "reorder",
        Token::Custom => "custom",
        Token::Uniform => "uniform",
        Token::Varying => "varying",
        Token::None => "None",
        Token::Doc => "doc",
        Token::SubLayers => "subLayers",
        Token::Offset => "offset",
        Token::Scale => "scale",
        Token::Kind => "kind",
        Token::References => "references",
        Token::Payload => "payload",
        Token::Inherits => "inherits",
        Token::Specializes => "specializes",
        Token::Variants => "variants",
        Token::VariantSets => "variantSets",
        Token::CustomData => "customData",
        Token::Dictionary => "dictionary",
        Token::Inf => "inf",
        _ => return None,
    };
    Some(lexeme)
}
