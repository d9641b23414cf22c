use anyhow::{anyhow, bail, Context, Result};

use crate::sdf;
use crate::usda::token::Token;

use super::value::types::Type;

/// Composition arc parsing functions.
impl<'a> super::Parser<'a> {
    /// Parse a reference arc: `@asset@</Prim> (offset = 1; scale = 2)`, or an
    /// internal one, `</Prim>`.
    pub(super) fn parse_reference(&mut self) -> Result<sdf::Reference> {
        let (asset_path, prim_path) = self.parse_arc_target().context("Invalid reference")?;

        let mut reference = sdf::Reference {
            asset_path,
            prim_path,
            layer_offset: sdf::LayerOffset::default(),
        };

        if self.is_next(Token::Punctuation('(')) {
            self.parse_reference_layer_offset(&mut reference.layer_offset)
                .context("Unable to parse reference layer offset")?;
        }

        Ok(reference)
    }

    /// Parse a payload arc (asset path and/or prim path, optional layer offset).
    pub(super) fn parse_payload(&mut self) -> Result<sdf::Payload> {
        let (asset_path, prim_path) = self.parse_arc_target().context("Invalid payload")?;

        let mut payload = sdf::Payload {
            asset_path,
            prim_path,
            layer_offset: None,
        };

        if self.is_next(Token::Punctuation('(')) {
            let mut layer_offset = sdf::LayerOffset::default();
            self.parse_reference_layer_offset(&mut layer_offset)
                .context("Unable to parse payload layer offset")?;
            payload.layer_offset = Some(layer_offset);
        }

        Ok(payload)
    }

    // `@asset@`, `@asset@</Path>` or `</Path>`.
    fn parse_arc_target(&mut self) -> Result<(String, sdf::Path)> {
        let mut asset_path = String::new();
        if matches!(self.peek_next(), Some(Ok(Token::AssetRef(..)))) {
            asset_path = self.parse_asset_path()?;
        }

        let prim_path = if matches!(self.peek_next(), Some(Ok(Token::PathRef(..)))) {
            self.parse_path_reference()?
        } else {
            sdf::Path::default()
        };

        if asset_path.is_empty() && prim_path.is_empty() {
            bail!("Expected an asset or a prim path, got {:?}", self.peek_next());
        }
        Ok((asset_path, prim_path))
    }

    /// Parse `(offset = ...; scale = ...)` blocks attached to references or sublayers.
    pub(super) fn parse_reference_layer_offset(&mut self, layer_offset: &mut sdf::LayerOffset) -> Result<()> {
        self.parse_seq_fn(';', |this, _index| {
            let token = this.fetch_next()?;
            this.ensure_pun('=')?;
            let value = this.parse_value(Type::DOUBLE)?;
            let value = value.try_as_double().context("Expected a number")?;

            match token {
                Token::Offset => layer_offset.offset = value,
                Token::Scale => layer_offset.scale = value,
                unexpected => bail!("Unexpected token in layer offset: {unexpected:?}"),
            }

            Ok(())
        })
    }

    /// Parse a list-op friendly sequence of references.
    pub(super) fn parse_reference_list(&mut self) -> Result<Vec<sdf::Reference>> {
        self.parse_one_or_many(Self::parse_reference)
    }

    /// Parse a list-op friendly sequence of payloads.
    pub(super) fn parse_payload_list(&mut self) -> Result<Vec<sdf::Payload>> {
        self.parse_one_or_many(Self::parse_payload)
    }

    /// Parse a single `<...>` path or a `[<...>, ...]` list, as used by
    /// inherits, specializes, relationship targets and connections.
    pub(super) fn parse_path_list(&mut self) -> Result<Vec<sdf::Path>> {
        if self.eat(Token::None)? {
            return Ok(Vec::new());
        }
        self.parse_one_or_many(Self::parse_path_reference)
    }

    /// Parses a single `<...>` path reference token into an `sdf::Path`.
    pub(super) fn parse_path_reference(&mut self) -> Result<sdf::Path> {
        let token = self.fetch_next()?;
        let path_str = token
            .clone()
            .try_as_path_ref()
            .ok_or_else(|| anyhow!("Path reference expected, got {token:?}"))?;
        sdf::Path::new(path_str)
    }

    /// Parse a list of tokens (used for various list-op metadata).
    pub(super) fn parse_token_list(&mut self) -> Result<Vec<String>> {
        if self.is_next(Token::Punctuation('[')) {
            self.parse_string_array()
        } else {
            Ok(vec![self.fetch_str()?])
        }
    }

    fn parse_one_or_many<T>(&mut self, mut read: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        if self.eat(Token::None)? {
            return Ok(Vec::new());
        }
        if !self.is_next(Token::Punctuation('[')) {
            return Ok(vec![read(self)?]);
        }
        let mut out = Vec::new();
        self.parse_array_fn(|this| {
            out.push(read(this)?);
            Ok(())
        })?;
        Ok(out)
    }

    /// Build a ListOp from an optional list operation token and items.
    pub(super) fn apply_list_op<T: Default + Clone + PartialEq>(
        &mut self,
        op: Option<Token<'a>>,
        items: Vec<T>,
    ) -> Result<sdf::ListOp<T>> {
        let mut list = sdf::ListOp::default();

        match op {
            None => {
                list.explicit = true;
                list.explicit_items = items;
            }
            Some(Token::Prepend) => list.prepended_items = items,
            Some(Token::Append) => list.appended_items = items,
            Some(Token::Add) => list.added_items = items,
            Some(Token::Delete) => list.deleted_items = items,
            Some(Token::Reorder) => list.ordered_items = items,
            other => bail!("Unsupported list op: {other:?}"),
        }

        Ok(list)
    }
}
