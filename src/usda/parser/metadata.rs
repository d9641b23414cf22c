use anyhow::{bail, ensure, Context, Result};
use std::collections::HashMap;

use crate::sdf;
use crate::sdf::schema::FieldKey;
use crate::usda::token::Token;

use super::value::types::{keyword_lexeme, Type};

/// Store a list op under `key`, folding it into an op authored earlier in
/// the same block.
pub(super) fn store_list_op<T: Clone + PartialEq>(
    spec: &mut sdf::Spec,
    key: &str,
    list_op: sdf::ListOp<T>,
    unwrap: fn(sdf::Value) -> Option<sdf::ListOp<T>>,
    wrap: fn(sdf::ListOp<T>) -> sdf::Value,
) {
    let merged = match spec.remove(key).and_then(unwrap) {
        Some(mut earlier) => {
            earlier.absorb(list_op);
            earlier
        }
        None => list_op,
    };
    spec.add(key, wrap(merged));
}

/// Metadata and dictionary parsing functions.
impl<'a> super::Parser<'a> {
    /// Parse a variant selection map `{ string variantName = "selectedVariant" }`.
    pub(super) fn parse_variant_selection_map(&mut self) -> Result<HashMap<String, String>> {
        self.ensure_pun('{').context("Variant selection must start with {")?;

        let mut selections = HashMap::new();

        loop {
            if self.eat(Token::Punctuation('}'))? {
                break;
            }

            let type_token = self.fetch_next()?;
            match type_token {
                Token::Identifier("string") => {}
                other => bail!("Expected 'string' type in variant selection, got: {other:?}"),
            }

            let name_token = self.fetch_next()?;
            let name = match name_token.as_name().or_else(|| keyword_lexeme(&name_token)) {
                Some(name) => name.to_owned(),
                None => bail!("Expected variant set name identifier, got: {name_token:?}"),
            };

            self.ensure_pun('=')?;
            let value = self.fetch_str().context("Expected variant selection value")?;
            selections.insert(name, value);

            self.eat_separator()?;
        }

        Ok(selections)
    }

    // Optional `,` or `;` between entries.
    fn eat_separator(&mut self) -> Result<()> {
        if !self.eat(Token::Punctuation(','))? {
            self.eat(Token::Punctuation(';'))?;
        }
        Ok(())
    }

    /// Parse the metadata block attached to a property and stash entries on the spec.
    pub(super) fn parse_property_metadata(&mut self, spec: &mut sdf::Spec) -> Result<()> {
        self.ensure_pun('(')?;

        loop {
            if self.eat(Token::Punctuation(')'))? {
                break;
            }

            // A bare string is the property's documentation.
            if let Some(Ok(Token::String(_))) = self.peek_next() {
                let doc = self.fetch_str()?;
                spec.add(FieldKey::Documentation, sdf::Value::String(doc));
                self.eat_separator()?;
                continue;
            }

            let name_token = self.fetch_next()?;
            let name = match name_token {
                Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
                Token::Doc => FieldKey::Documentation.as_str(),
                other => keyword_lexeme(&other)
                    .with_context(|| format!("Unexpected property metadata name token: {other:?}"))?,
            };

            self.ensure_pun('=')?;
            let value = if name == FieldKey::Documentation.as_str() {
                sdf::Value::String(self.fetch_str()?)
            } else {
                self.parse_metadata_value()
                    .with_context(|| format!("Unable to parse property metadata value for {name}"))?
            };
            spec.fields.insert(name.to_owned(), value);

            self.eat_separator()?;
        }

        Ok(())
    }

    /// Parse an untyped metadata value: string, identifier, number, array of
    /// those, or a dictionary.
    pub(super) fn parse_metadata_value(&mut self) -> Result<sdf::Value> {
        if self.is_next(Token::Punctuation('[')) {
            let mut values = Vec::new();
            self.parse_array_fn(|this| {
                let entry = this.fetch_next()?;
                let value = match entry {
                    Token::String(v) => crate::usda::unescape(v).into_owned(),
                    Token::Identifier(v) | Token::NamespacedIdentifier(v) | Token::Number(v) => v.to_owned(),
                    other => bail!("Unsupported metadata array element: {other:?}"),
                };
                values.push(value);
                Ok(())
            })?;
            return Ok(sdf::Value::TokenVec(values));
        }

        if self.is_next(Token::Punctuation('{')) {
            return self.parse_dictionary();
        }

        let token = self.fetch_next()?;
        match token {
            Token::String(value) => Ok(sdf::Value::String(crate::usda::unescape(value).into_owned())),
            Token::Identifier("true") => Ok(sdf::Value::Bool(true)),
            Token::Identifier("false") => Ok(sdf::Value::Bool(false)),
            Token::Identifier(value) | Token::NamespacedIdentifier(value) => Ok(sdf::Value::Token(value.to_owned())),
            Token::AssetRef(value) => Ok(sdf::Value::AssetPath(value.to_owned())),
            Token::Number(raw) => {
                if let Ok(int) = raw.parse::<i64>() {
                    Ok(sdf::Value::Int64(int))
                } else {
                    let float = raw
                        .parse::<f64>()
                        .with_context(|| format!("Unable to parse numeric metadata value: {raw}"))?;
                    Ok(sdf::Value::Double(float))
                }
            }
            other => bail!("Unsupported metadata value token: {other:?}"),
        }
    }

    /// Parse a dictionary value from `{` to `}`.
    ///
    /// Entries are typed, `string name = "value"` or `dictionary sub = { ... }`.
    pub(super) fn parse_dictionary(&mut self) -> Result<sdf::Value> {
        self.ensure_pun('{').context("Dictionary must start with {")?;

        let mut dict = HashMap::new();

        loop {
            if self.eat(Token::Punctuation('}'))? {
                break;
            }

            let type_token = self.fetch_next()?;
            let ty = match type_token {
                Token::Dictionary => Some(Type::Dictionary),
                Token::Identifier(name) => name.parse::<Type>().ok(),
                _ => None,
            };

            // Untyped entries fall back to untyped metadata values.
            let key_token = if ty.is_some() { self.fetch_next()? } else { type_token };
            let key = match key_token {
                Token::Identifier(s) | Token::NamespacedIdentifier(s) => s.to_owned(),
                Token::String(s) => crate::usda::unescape(s).into_owned(),
                other => keyword_lexeme(&other)
                    .map(str::to_owned)
                    .with_context(|| format!("Expected dictionary key, got: {other:?}"))?,
            };

            self.ensure_pun('=')?;
            let value = match ty {
                Some(ty) => self
                    .parse_value(ty)
                    .with_context(|| format!("Unable to parse dictionary value for {key}"))?,
                None => self.parse_metadata_value()?,
            };
            dict.insert(key, value);

            self.eat_separator()?;
        }

        Ok(sdf::Value::Dictionary(dict))
    }

    /// Parse prim metadata up to the closing `)`.
    pub(super) fn read_prim_metadata(&mut self, spec: &mut sdf::Spec) -> Result<()> {
        loop {
            if self.eat(Token::Punctuation(')'))? {
                break;
            }

            let token = self.fetch_next()?;
            if let Token::String(doc) = token {
                spec.add(
                    FieldKey::Documentation,
                    sdf::Value::String(crate::usda::unescape(doc).into_owned()),
                );
            } else {
                self.read_prim_metadata_entry(token, spec)
                    .context("Unable to parse prim metadata entry")?;
            }
            self.eat_separator()?;
        }

        Ok(())
    }

    /// Parse a single prim metadata assignment, honoring list ops for supported fields.
    pub(super) fn read_prim_metadata_entry(&mut self, token: Token<'a>, spec: &mut sdf::Spec) -> Result<()> {
        let (list_op, name_token) = match token {
            Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => {
                let name = self.fetch_next()?;
                (Some(token), name)
            }
            _ => (None, token),
        };

        let name = match name_token {
            Token::Identifier(s) | Token::NamespacedIdentifier(s) => s,
            Token::Kind => FieldKey::Kind.as_str(),
            Token::References => FieldKey::References.as_str(),
            Token::Payload => FieldKey::Payload.as_str(),
            Token::Inherits => FieldKey::InheritPaths.as_str(),
            Token::Specializes => FieldKey::Specializes.as_str(),
            Token::Variants => FieldKey::VariantSelection.as_str(),
            Token::VariantSets => FieldKey::VariantSetNames.as_str(),
            Token::CustomData => FieldKey::CustomData.as_str(),
            Token::Doc => FieldKey::Documentation.as_str(),
            other => bail!("Unexpected metadata name token: {other:?}"),
        };

        self.ensure_pun('=')?;

        let supports_list_op = [
            FieldKey::ApiSchemas.as_str(),
            FieldKey::References.as_str(),
            FieldKey::Payload.as_str(),
            FieldKey::InheritPaths.as_str(),
            FieldKey::Specializes.as_str(),
            FieldKey::VariantSetNames.as_str(),
        ]
        .contains(&name);
        ensure!(
            list_op.is_none() || supports_list_op,
            "{name} metadata does not support list ops"
        );

        match name {
            n if n == FieldKey::Active.as_str()
                || n == FieldKey::Hidden.as_str()
                || n == FieldKey::Instanceable.as_str() =>
            {
                let value = self.parse_bool().with_context(|| format!("Unable to parse {n} flag"))?;
                spec.add(n, sdf::Value::Bool(value));
            }
            n if n == FieldKey::ApiSchemas.as_str() => {
                let values = self.parse_token_list().context("Unable to parse apiSchemas list")?;
                let list_op = self.apply_list_op(list_op, values)?;
                store_list_op(spec, n, list_op, sdf::Value::try_as_token_list_op, sdf::Value::TokenListOp);
            }
            n if n == FieldKey::References.as_str() => {
                let references = self.parse_reference_list().context("Unable to parse references")?;
                let list_op = self.apply_list_op(list_op, references)?;
                store_list_op(
                    spec,
                    n,
                    list_op,
                    sdf::Value::try_as_reference_list_op,
                    sdf::Value::ReferenceListOp,
                );
            }
            n if n == FieldKey::Payload.as_str() => {
                let payloads = self.parse_payload_list().context("Unable to parse payloads")?;
                let list_op = self.apply_list_op(list_op, payloads)?;
                store_list_op(spec, n, list_op, sdf::Value::try_as_payload_list_op, sdf::Value::PayloadListOp);
            }
            n if n == FieldKey::InheritPaths.as_str() || n == FieldKey::Specializes.as_str() => {
                let paths = self
                    .parse_path_list()
                    .with_context(|| format!("Unable to parse {n} paths"))?;
                let list_op = self.apply_list_op(list_op, paths)?;
                store_list_op(spec, n, list_op, sdf::Value::try_as_path_list_op, sdf::Value::PathListOp);
            }
            n if n == FieldKey::Kind.as_str() => {
                let value = self.fetch_str().context("Unable to parse kind metadata")?;
                spec.add(FieldKey::Kind, sdf::Value::Token(value));
            }
            n if n == FieldKey::Documentation.as_str() => {
                let value = self.fetch_str().context("Unable to parse doc metadata")?;
                spec.add(FieldKey::Documentation, sdf::Value::String(value));
            }
            n if n == FieldKey::VariantSelection.as_str() => {
                let selections = self
                    .parse_variant_selection_map()
                    .context("Unable to parse variant selections")?;
                spec.add(FieldKey::VariantSelection, sdf::Value::VariantSelectionMap(selections));
            }
            n if n == FieldKey::VariantSetNames.as_str() => {
                let names = self.parse_token_list().context("Unable to parse variantSets")?;
                let list_op = self.apply_list_op(list_op, names)?;
                store_list_op(spec, n, list_op, sdf::Value::try_as_string_list_op, sdf::Value::StringListOp);
            }
            other => {
                let value = self
                    .parse_metadata_value()
                    .with_context(|| format!("Unable to parse prim metadata: {other}"))?;
                spec.fields.insert(other.to_owned(), value);
            }
        }

        Ok(())
    }
}
