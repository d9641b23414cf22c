use anyhow::{anyhow, bail, ensure, Context, Result};
use std::any::type_name;
use std::borrow::Cow;
use std::fmt::Debug;
use std::str::FromStr;

use crate::sdf;
use crate::usda::{token::Token, unescape};

/// Scalars, strings, asset paths, and sublayer lists.
impl<'a> super::super::Parser<'a> {
    /// Read one token as `T`. Quoted strings are unescaped first, `inf` may
    /// carry a sign.
    pub(in crate::usda::parser) fn parse_token<T: FromStr>(&mut self) -> Result<T>
    where
        <T as FromStr>::Err: Debug,
    {
        let text: Cow<'_, str> = match self.fetch_next()? {
            Token::Number(s) | Token::Identifier(s) | Token::NamespacedIdentifier(s) => Cow::Borrowed(s),
            Token::String(s) => unescape(s),
            Token::Inf => Cow::Borrowed("inf"),
            Token::Punctuation(sign @ ('-' | '+')) => {
                let next = self.fetch_next()?;
                ensure!(matches!(next, Token::Inf), "Expected 'inf' after '{sign}', got {next:?}");
                Cow::Borrowed(if sign == '-' { "-inf" } else { "inf" })
            }
            other => bail!("Expected a number, identifier, or string, got {other:?}"),
        };

        text.parse::<T>()
            .map_err(|err| anyhow!("Failed to parse {} from '{text}': {err:?}", type_name::<T>()))
    }

    /// Parse USD's flexible boolean literal forms (identifiers, numeric, or string).
    pub(in crate::usda::parser) fn parse_bool(&mut self) -> Result<bool> {
        let token = self.fetch_next()?;
        match token {
            Token::Identifier(value) | Token::String(value) => match value {
                "true" => Ok(true),
                "false" => Ok(false),
                other => bail!("Unexpected literal for bool: {other}"),
            },
            Token::Number(value) => {
                let parsed = value.parse::<f64>().context("Unable to parse numeric bool")?;
                ensure!(
                    parsed == 0.0 || parsed == 1.0,
                    "Numeric bool literals must be 0 or 1, got {value}"
                );
                Ok(parsed == 1.0)
            }
            other => bail!("Unexpected token for bool literal: {other:?}"),
        }
    }

    pub(in crate::usda::parser) fn parse_bool_array(&mut self) -> Result<Vec<bool>> {
        let mut out = Vec::new();
        self.parse_array_fn(|this| {
            out.push(this.parse_bool()?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Parse an array of quoted strings or tokens.
    pub(in crate::usda::parser) fn parse_string_array(&mut self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.parse_array_fn(|this| {
            out.push(this.fetch_str()?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Parse an asset path reference.
    pub(in crate::usda::parser) fn parse_asset_path(&mut self) -> Result<String> {
        let token = self.fetch_next()?;
        token
            .clone()
            .try_as_asset_ref()
            .map(|value| value.to_owned())
            .ok_or_else(|| anyhow!("Asset reference expected, got {token:?}"))
    }

    /// Parse an array of asset paths.
    pub(in crate::usda::parser) fn parse_asset_path_array(&mut self) -> Result<Vec<String>> {
        let mut result = Vec::new();
        self.parse_array_fn(|this| {
            result.push(this.parse_asset_path()?);
            Ok(())
        })?;
        Ok(result)
    }

    /// Parse `subLayers` entries along with their optional `(offset/scale)` metadata.
    pub(in crate::usda::parser) fn parse_sublayers(&mut self) -> Result<(sdf::Value, sdf::Value)> {
        let mut sublayers = Vec::new();
        let mut sublayer_offsets = Vec::new();

        self.parse_array_fn(|this| {
            sublayers.push(this.parse_asset_path()?);

            let mut layer_offset = sdf::LayerOffset::default();
            if this.is_next(Token::Punctuation('(')) {
                this.parse_reference_layer_offset(&mut layer_offset)
                    .context("Unable to parse sublayer offset")?;
            }
            sublayer_offsets.push(layer_offset);
            Ok(())
        })?;

        debug_assert_eq!(sublayers.len(), sublayer_offsets.len());

        Ok((
            sdf::Value::AssetPathVec(sublayers),
            sdf::Value::LayerOffsetVec(sublayer_offsets),
        ))
    }
}
