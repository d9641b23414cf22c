pub mod arrays;
pub mod primitives;
pub mod types;

use anyhow::{bail, Result};

use crate::sdf::Value;
use crate::usda::token::Token;
pub use types::{Scalar, Type};

/// Value parsing dispatcher.
impl<'a> super::Parser<'a> {
    /// Decode a value of the declared type. `None` is a value block for any type.
    pub(super) fn parse_value(&mut self, ty: Type) -> Result<Value> {
        if self.eat(Token::None)? {
            return Ok(Value::ValueBlock);
        }

        let value = match ty {
            Type::Number(scalar) => self.parse_number(scalar)?,
            Type::NumberVec(scalar) => self.parse_number_array(scalar)?,
            Type::Tuple(scalar, dimension) => self.parse_vector(scalar, dimension, false)?,
            Type::TupleVec(scalar, dimension) => self.parse_vector(scalar, dimension, true)?,
            Type::Quat(scalar) => self.parse_quat(scalar, false)?,
            Type::QuatVec(scalar) => self.parse_quat(scalar, true)?,
            Type::Matrix(dimension) => {
                let values = self.parse_matrix_value(dimension)?;
                match dimension {
                    2 => Value::Matrix2d(values),
                    3 => Value::Matrix3d(values),
                    4 => Value::Matrix4d(values),
                    _ => bail!("Unsupported matrix size {dimension}"),
                }
            }

            Type::String => Value::String(self.fetch_str()?),
            Type::Token => Value::Token(self.fetch_str()?),
            Type::StringVec => Value::StringVec(self.parse_string_array()?),
            Type::TokenVec => Value::TokenVec(self.parse_string_array()?),
            Type::Asset => Value::AssetPath(self.parse_asset_path()?),
            Type::AssetVec => Value::AssetPathVec(self.parse_asset_path_array()?),

            Type::Dictionary => self.parse_dictionary()?,
        };

        Ok(value)
    }

    fn parse_number(&mut self, scalar: Scalar) -> Result<Value> {
        let value = match scalar {
            Scalar::Bool => Value::Bool(self.parse_bool()?),
            Scalar::Uchar => Value::Uchar(self.parse_token()?),
            Scalar::Int => Value::Int(self.parse_token()?),
            Scalar::Uint => Value::Uint(self.parse_token()?),
            Scalar::Int64 => Value::Int64(self.parse_token()?),
            Scalar::Uint64 => Value::Uint64(self.parse_token()?),
            Scalar::Half => Value::Half(self.parse_token()?),
            Scalar::Float => Value::Float(self.parse_token()?),
            Scalar::Double => Value::Double(self.parse_token()?),
        };
        Ok(value)
    }

    fn parse_number_array(&mut self, scalar: Scalar) -> Result<Value> {
        let value = match scalar {
            Scalar::Bool => Value::BoolVec(self.parse_bool_array()?),
            Scalar::Uchar => Value::UcharVec(self.parse_array()?),
            Scalar::Int => Value::IntVec(self.parse_array()?),
            Scalar::Uint => Value::UintVec(self.parse_array()?),
            Scalar::Int64 => Value::Int64Vec(self.parse_array()?),
            Scalar::Uint64 => Value::Uint64Vec(self.parse_array()?),
            Scalar::Half => Value::HalfVec(self.parse_array()?),
            Scalar::Float => Value::FloatVec(self.parse_array()?),
            Scalar::Double => Value::DoubleVec(self.parse_array()?),
        };
        Ok(value)
    }

    /// Single tuples and tuple arrays share a variant; arrays are stored flat.
    fn parse_vector(&mut self, scalar: Scalar, dimension: usize, array: bool) -> Result<Value> {
        let value = match (scalar, dimension) {
            (Scalar::Int, 2) => Value::Vec2i(self.parse_tuples(2, array)?),
            (Scalar::Int, 3) => Value::Vec3i(self.parse_tuples(3, array)?),
            (Scalar::Int, 4) => Value::Vec4i(self.parse_tuples(4, array)?),
            (Scalar::Half, 2) => Value::Vec2h(self.parse_tuples(2, array)?),
            (Scalar::Half, 3) => Value::Vec3h(self.parse_tuples(3, array)?),
            (Scalar::Half, 4) => Value::Vec4h(self.parse_tuples(4, array)?),
            (Scalar::Float, 2) => Value::Vec2f(self.parse_tuples(2, array)?),
            (Scalar::Float, 3) => Value::Vec3f(self.parse_tuples(3, array)?),
            (Scalar::Float, 4) => Value::Vec4f(self.parse_tuples(4, array)?),
            (Scalar::Double, 2) => Value::Vec2d(self.parse_tuples(2, array)?),
            (Scalar::Double, 3) => Value::Vec3d(self.parse_tuples(3, array)?),
            (Scalar::Double, 4) => Value::Vec4d(self.parse_tuples(4, array)?),
            _ => bail!("Unsupported tuple type {scalar:?}{dimension}"),
        };
        Ok(value)
    }

    fn parse_quat(&mut self, scalar: Scalar, array: bool) -> Result<Value> {
        let value = match scalar {
            Scalar::Half => Value::Quath(self.parse_tuples(4, array)?),
            Scalar::Float => Value::Quatf(self.parse_tuples(4, array)?),
            Scalar::Double => Value::Quatd(self.parse_tuples(4, array)?),
            _ => bail!("Unsupported quaternion type {scalar:?}"),
        };
        Ok(value)
    }
}
