use anyhow::{anyhow, bail, ensure, Context, Result};
use std::collections::HashMap;

use crate::sdf;
use crate::sdf::schema::{ChildrenKey, FieldKey};
use crate::usda::token::Token;

use super::metadata::store_list_op;
use super::value::types::{keyword_lexeme, Type};

type SpecMap = HashMap<sdf::Path, sdf::Spec>;

/// Names collected while reading a prim or variant body.
#[derive(Default)]
struct BodyContents {
    children: Vec<String>,
    properties: Vec<String>,
    variant_sets: Vec<String>,
}

impl BodyContents {
    fn store(self, spec: &mut sdf::Spec) {
        for (key, names) in [
            (ChildrenKey::PrimChildren, self.children),
            (ChildrenKey::PropertyChildren, self.properties),
            (ChildrenKey::VariantSetChildren, self.variant_sets),
        ] {
            if !names.is_empty() {
                spec.add(key, sdf::Value::TokenVec(names));
            }
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_owned());
    }
}

/// Hierarchy parsing functions for prims, properties and variant sets.
impl<'a> super::Parser<'a> {
    /// Parse tokens to specs.
    /// Walks the entire token stream, seeding the pseudo root and recursing through every prim.
    pub fn parse(&mut self) -> Result<SpecMap> {
        let mut data = HashMap::new();
        let root_path = sdf::Path::abs_root();

        let mut pseudo_root = self.read_pseudo_root().context("Unable to parse pseudo root")?;
        let mut root_children = Vec::new();

        while self.peek_next().is_some() {
            let name = self.read_prim(&root_path, &mut data)?;
            push_unique(&mut root_children, &name);
        }

        if !root_children.is_empty() {
            pseudo_root.add(ChildrenKey::PrimChildren, sdf::Value::TokenVec(root_children));
        }
        data.insert(root_path, pseudo_root);
        Ok(data)
    }

    /// Parse the file header/pseudo-root to populate layer-level metadata before prim traversal.
    pub(super) fn read_pseudo_root(&mut self) -> Result<sdf::Spec> {
        let first = self.fetch_next()?;
        let version = first
            .clone()
            .try_as_magic()
            .ok_or_else(|| anyhow!("Text file must start with magic token, got {first:?}"))?;
        ensure!(version == "1.0", "File must start with '#usda 1.0', got: {version:?}");

        let mut root = sdf::Spec::new(sdf::SpecType::PseudoRoot);

        if !self.eat(Token::Punctuation('('))? {
            return Ok(root);
        }

        const KNOWN_PROPS: &[(&str, Type)] = &[
            (FieldKey::DefaultPrim.as_str(), Type::Token),
            (FieldKey::UpAxis.as_str(), Type::Token),
            (FieldKey::StartTimeCode.as_str(), Type::DOUBLE),
            (FieldKey::EndTimeCode.as_str(), Type::DOUBLE),
            (FieldKey::FramesPerSecond.as_str(), Type::DOUBLE),
            (FieldKey::TimeCodesPerSecond.as_str(), Type::DOUBLE),
            (FieldKey::MetersPerUnit.as_str(), Type::DOUBLE),
            (FieldKey::CustomLayerData.as_str(), Type::Dictionary),
        ];

        loop {
            let next = self.fetch_next().context("Unable to fetch next pseudo root property")?;

            match next {
                Token::Punctuation(')') => break,
                Token::String(comment) => {
                    let comment = crate::usda::unescape(comment).into_owned();
                    root.add(FieldKey::Comment, sdf::Value::String(comment));
                }
                Token::Doc => {
                    self.ensure_pun('=')?;
                    let value = self.fetch_str()?;
                    root.add(FieldKey::Documentation, sdf::Value::String(value));
                }
                Token::SubLayers => {
                    self.ensure_pun('=')?;
                    let (sublayers, sublayer_offsets) = self.parse_sublayers().context("Unable to parse subLayers")?;
                    root.add(FieldKey::SubLayers, sublayers);
                    root.add(FieldKey::SubLayerOffsets, sublayer_offsets);
                }
                Token::Identifier(name) | Token::NamespacedIdentifier(name) => {
                    self.ensure_pun('=')?;
                    let value = match KNOWN_PROPS.iter().find(|(known, _)| *known == name) {
                        Some((_, ty)) => self.parse_value(*ty),
                        None => self.parse_metadata_value(),
                    }
                    .with_context(|| format!("Unable to parse layer metadata {name}"))?;
                    root.add(name, value);
                }
                _ => bail!("Unexpected token {next:?}"),
            }
        }

        Ok(root)
    }

    /// Parse a prim declaration, capture its metadata, and recursively traverse nested prims/props.
    /// Returns the prim's name.
    pub(super) fn read_prim(&mut self, parent_path: &sdf::Path, data: &mut SpecMap) -> Result<String> {
        let mut spec = sdf::Spec::new(sdf::SpecType::Prim);

        let specifier = match self.fetch_next().context("Unable to read prim specifier")? {
            Token::Def => sdf::Specifier::Def,
            Token::Over => sdf::Specifier::Over,
            Token::Class => sdf::Specifier::Class,
            other => bail!("Unexpected prim specifier: {other:?}"),
        };
        spec.add(FieldKey::Specifier, specifier);

        // Optional type name, then the quoted prim name.
        let mut name_token = self.fetch_next()?;
        if let Some(prim_type) = name_token.as_name() {
            spec.add(FieldKey::TypeName, sdf::Value::Token(prim_type.to_owned()));
            name_token = self.fetch_next()?;
        }
        let name = name_token
            .clone()
            .try_as_string()
            .ok_or_else(|| anyhow!("Unexpected token {name_token:?} (want prim name)"))?;
        let prim_path = parent_path
            .append_child(name)
            .with_context(|| format!("Invalid prim name {name:?} under {parent_path}"))?;

        if self.eat(Token::Punctuation('('))? {
            self.read_prim_metadata(&mut spec)
                .with_context(|| format!("Unable to parse metadata of {prim_path}"))?;
        }

        let contents = self
            .read_prim_body(&prim_path, data)
            .with_context(|| format!("Unable to parse {prim_path}"))?;
        contents.store(&mut spec);

        data.insert(prim_path, spec);
        Ok(name.to_owned())
    }

    /// Parse `{ ... }` holding properties, variant sets and child prims.
    fn read_prim_body(&mut self, prim_path: &sdf::Path, data: &mut SpecMap) -> Result<BodyContents> {
        self.ensure_pun('{')?;

        let mut contents = BodyContents::default();
        loop {
            match self.peek_token().context("Unexpected end of prim body")? {
                Token::Punctuation('}') => {
                    self.fetch_next()?;
                    break;
                }
                Token::Def | Token::Over | Token::Class => {
                    let name = self.read_prim(prim_path, data)?;
                    push_unique(&mut contents.children, &name);
                }
                Token::VariantSet => {
                    self.fetch_next()?;
                    let set = self
                        .read_variant_set(prim_path, data)
                        .context("Unable to read variant set")?;
                    push_unique(&mut contents.variant_sets, &set);
                }
                _ => {
                    self.read_property(prim_path, &mut contents.properties, data)
                        .context("Unable to read property")?;
                }
            }
        }

        Ok(contents)
    }

    /// Parse an attribute or relationship declaration.
    ///
    /// The default value, `.timeSamples` and `.connect` lines of one
    /// attribute all land on the same spec.
    pub(super) fn read_property(
        &mut self,
        prim_path: &sdf::Path,
        properties: &mut Vec<String>,
        data: &mut SpecMap,
    ) -> Result<()> {
        let list_op = match self.peek_token()? {
            Token::Add | Token::Append | Token::Delete | Token::Prepend | Token::Reorder => Some(self.fetch_next()?),
            _ => None,
        };

        // `reorder nameChildren = [...]` and `reorder properties = [...]`
        // only affect ordering; authored order is kept instead.
        if matches!(self.peek_token()?, Token::Identifier("nameChildren" | "properties")) {
            self.fetch_next()?;
            self.ensure_pun('=')?;
            self.parse_token_list()?;
            return Ok(());
        }

        let custom = self.eat(Token::Custom)?;
        let variability = if self.eat(Token::Uniform)? {
            sdf::Variability::Uniform
        } else {
            self.eat(Token::Varying)?;
            sdf::Variability::Varying
        };

        if self.eat(Token::Rel)? {
            return self.read_relationship(prim_path, list_op, custom, properties, data);
        }

        let type_token = self.fetch_next()?;
        let type_name = type_token
            .as_name()
            .ok_or_else(|| anyhow!("Expected attribute type, got {type_token:?}"))?;
        let data_type: Type = type_name.parse()?;

        let name_token = self.fetch_next()?;
        let full_name = name_token
            .as_name()
            .or_else(|| keyword_lexeme(&name_token))
            .ok_or_else(|| anyhow!("Unexpected token type for attribute name: {name_token:?}"))?;

        let (name, suffix) = match full_name.rsplit_once('.') {
            Some((name, suffix @ ("connect" | "timeSamples"))) => (name, Some(suffix)),
            _ => (full_name, None),
        };

        let path = prim_path.append_property(name)?;
        push_unique(properties, name);

        let spec = data
            .entry(path.clone())
            .or_insert_with(|| sdf::Spec::new(sdf::SpecType::Attribute));
        ensure!(
            spec.ty == sdf::SpecType::Attribute,
            "{path} is declared both as attribute and relationship"
        );
        spec.add(FieldKey::TypeName, sdf::Value::Token(type_name.to_owned()));
        if custom || !spec.has(FieldKey::Custom) {
            spec.add(FieldKey::Custom, custom);
        }
        if variability == sdf::Variability::Uniform || !spec.has(FieldKey::Variability) {
            spec.add(FieldKey::Variability, variability);
        }

        match suffix {
            Some("connect") => {
                self.ensure_pun('=')?;
                let targets = self.parse_path_list().context("Unable to parse connection targets")?;
                let list_op = self.apply_list_op(list_op, targets)?;
                store_list_op(
                    spec,
                    FieldKey::ConnectionPaths.as_str(),
                    list_op,
                    sdf::Value::try_as_path_list_op,
                    sdf::Value::PathListOp,
                );
            }
            Some(_) => {
                ensure!(list_op.is_none(), "List ops are not valid on time samples");
                self.ensure_pun('=')?;
                let samples = self
                    .parse_time_samples(data_type)
                    .context("Unable to parse time samples")?;
                spec.add(FieldKey::TimeSamples, sdf::Value::TimeSamples(samples));
            }
            None => {
                ensure!(list_op.is_none(), "List ops are only valid on connections and relationships");
                if self.is_next(Token::Punctuation('(')) {
                    self.parse_property_metadata(spec)
                        .context("Unable to parse attribute metadata")?;
                }
                if self.eat(Token::Punctuation('='))? {
                    let value = self
                        .parse_value(data_type)
                        .with_context(|| format!("Unable to parse value of {path}"))?;
                    spec.add(FieldKey::Default, value);
                }
            }
        }

        if self.is_next(Token::Punctuation('(')) {
            self.parse_property_metadata(spec)
                .context("Unable to parse attribute metadata")?;
        }

        Ok(())
    }

    /// Parse a relationship declaration with optional targets and metadata.
    fn read_relationship(
        &mut self,
        prim_path: &sdf::Path,
        list_op: Option<Token<'a>>,
        custom: bool,
        properties: &mut Vec<String>,
        data: &mut SpecMap,
    ) -> Result<()> {
        let name_token = self.fetch_next()?;
        let name = name_token
            .as_name()
            .or_else(|| keyword_lexeme(&name_token))
            .ok_or_else(|| anyhow!("Unexpected token in relationship declaration: {name_token:?}"))?;

        let path = prim_path.append_property(name)?;
        push_unique(properties, name);

        let spec = data
            .entry(path.clone())
            .or_insert_with(|| sdf::Spec::new(sdf::SpecType::Relationship));
        ensure!(
            spec.ty == sdf::SpecType::Relationship,
            "{path} is declared both as attribute and relationship"
        );
        if custom || !spec.has(FieldKey::Custom) {
            spec.add(FieldKey::Custom, custom);
        }
        spec.add(FieldKey::Variability, sdf::Variability::Varying);

        if self.is_next(Token::Punctuation('(')) {
            self.parse_property_metadata(spec)
                .context("Unable to parse relationship metadata")?;
        }

        if self.eat(Token::Punctuation('='))? {
            let targets = self
                .parse_path_list()
                .context("Unable to parse relationship targets")?;
            let list_op = self.apply_list_op(list_op, targets)?;
            store_list_op(
                spec,
                FieldKey::TargetPaths.as_str(),
                list_op,
                sdf::Value::try_as_path_list_op,
                sdf::Value::PathListOp,
            );
        } else {
            ensure!(list_op.is_none(), "List op on {path} without targets");
        }

        if self.is_next(Token::Punctuation('(')) {
            self.parse_property_metadata(spec)
                .context("Unable to parse relationship metadata")?;
        }

        Ok(())
    }

    /// Parse time samples in the format `{ time: value, time: value, ... }`.
    ///
    /// ```text
    /// double3 xformOp:translate.timeSamples = {
    ///     0: (0, 0, 0),
    ///     100: (100, 0, 0),
    /// }
    /// ```
    pub(super) fn parse_time_samples(&mut self, data_type: Type) -> Result<sdf::TimeSampleMap> {
        self.ensure_pun('{').context("Time samples must start with {")?;

        let mut samples = Vec::new();

        loop {
            if self.eat(Token::Punctuation('}'))? {
                break;
            }

            let time_token = self.fetch_next()?;
            let time = match time_token {
                Token::Number(n) => n
                    .parse::<f64>()
                    .with_context(|| format!("Unable to parse time sample time: {n}"))?,
                other => bail!("Expected number for time sample time, got: {other:?}"),
            };

            self.ensure_pun(':').context("Expected ':' after time in time sample")?;
            let value = self.parse_value(data_type)?;
            samples.push((time, value));

            self.eat(Token::Punctuation(','))?;
        }

        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(samples)
    }

    /// Parse a variantSet block within a prim. Returns the set name.
    ///
    /// Syntax: `variantSet "name" = { "variant1" { ... } "variant2" { ... } }`
    pub(super) fn read_variant_set(&mut self, prim_path: &sdf::Path, data: &mut SpecMap) -> Result<String> {
        let name_token = self.fetch_next()?;
        let set_name = name_token
            .clone()
            .try_as_string()
            .ok_or_else(|| anyhow!("Expected variant set name string, got {name_token:?}"))?;

        self.ensure_pun('=').context("Expected '=' after variant set name")?;
        self.ensure_pun('{').context("Expected '{' to start variant set block")?;

        let set_path = prim_path.append_variant_selection(set_name, "")?;
        let mut variant_names = Vec::new();

        loop {
            if self.eat(Token::Punctuation('}'))? {
                break;
            }

            let variant_token = self.fetch_next()?;
            let variant_name = variant_token
                .clone()
                .try_as_string()
                .ok_or_else(|| anyhow!("Expected variant name string, got {variant_token:?}"))?;
            push_unique(&mut variant_names, variant_name);

            let variant_path = prim_path.append_variant_selection(set_name, variant_name)?;
            let mut variant_spec = sdf::Spec::new(sdf::SpecType::Variant);

            if self.eat(Token::Punctuation('('))? {
                self.read_prim_metadata(&mut variant_spec)
                    .context("Unable to parse variant metadata")?;
            }

            let contents = self
                .read_prim_body(&variant_path, data)
                .with_context(|| format!("Unable to parse variant {variant_path}"))?;
            contents.store(&mut variant_spec);
            data.insert(variant_path, variant_spec);
        }

        let set_spec = data
            .entry(set_path)
            .or_insert_with(|| sdf::Spec::new(sdf::SpecType::VariantSet));
        let mut all_names = set_spec.children(ChildrenKey::VariantChildren).to_vec();
        for name in &variant_names {
            push_unique(&mut all_names, name);
        }
        set_spec.add(ChildrenKey::VariantChildren, sdf::Value::TokenVec(all_names));

        Ok(set_name.to_owned())
    }
}
