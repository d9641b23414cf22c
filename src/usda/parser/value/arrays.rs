use anyhow::{bail, ensure, Context, Result};
use std::fmt::Debug;
use std::str::FromStr;

use crate::usda::token::Token;

/// Array, tuple, and matrix literals.
impl<'a> super::super::Parser<'a> {
    /// Read a list enclosed in `open`/`close` with elements separated by
    /// `separator`. A trailing separator is accepted.
    fn parse_delimited(
        &mut self,
        (open, close): (char, char),
        separator: char,
        mut read_element: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        self.ensure_pun(open).with_context(|| format!("Expected '{open}'"))?;

        let mut index = 0;
        while !self.eat(Token::Punctuation(close))? {
            read_element(self, index).with_context(|| format!("Unable to read element {index}"))?;
            index += 1;

            match self.fetch_next()? {
                Token::Punctuation(c) if c == close => break,
                Token::Punctuation(c) if c == separator => {}
                t => bail!("Expected '{separator}' or '{close}' after element {}, got {t:?}", index - 1),
            }
        }
        Ok(())
    }

    /// `[a, b, ...]`
    pub(in crate::usda::parser) fn parse_array_fn(
        &mut self,
        mut read_element: impl FnMut(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.parse_delimited(('[', ']'), ',', |this, _| read_element(this))
    }

    /// `(a, b)`, or `(offset = 1; scale = 2)` with `;` as the delimiter.
    pub(in crate::usda::parser) fn parse_seq_fn(
        &mut self,
        delim: char,
        read_element: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        self.parse_delimited(('(', ')'), delim, read_element)
    }

    /// `(a, b, ...)` with exactly `dimension` elements.
    pub(in crate::usda::parser) fn parse_tuple<T>(&mut self, dimension: usize) -> Result<Vec<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        let mut items = Vec::with_capacity(dimension);
        self.parse_seq_fn(',', |this, _| {
            items.push(this.parse_token::<T>()?);
            Ok(())
        })?;
        ensure!(
            items.len() == dimension,
            "Expected a tuple of {dimension} elements, got {}",
            items.len()
        );
        Ok(items)
    }

    pub(in crate::usda::parser) fn parse_array<T>(&mut self) -> Result<Vec<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        let mut items = Vec::new();
        self.parse_array_fn(|this| {
            items.push(this.parse_token::<T>()?);
            Ok(())
        })?;
        Ok(items)
    }

    /// One tuple, or with `array` a list of them. Either way the elements are
    /// returned flat: `[(1, 2), (3, 4)]` reads as `[1, 2, 3, 4]`.
    pub(in crate::usda::parser) fn parse_tuples<T>(&mut self, dimension: usize, array: bool) -> Result<Vec<T>>
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        if !array {
            return self.parse_tuple(dimension);
        }
        let mut items = Vec::new();
        self.parse_array_fn(|this| {
            items.extend(this.parse_tuple::<T>(dimension)?);
            Ok(())
        })?;
        Ok(items)
    }

    /// A `matrixNd` literal in row-major order, or an array of them concatenated.
    pub(in crate::usda::parser) fn parse_matrix_value(&mut self, dimension: usize) -> Result<Vec<f64>> {
        let array = self.is_next(Token::Punctuation('['));
        let mut values = Vec::new();
        let mut read_matrix = |this: &mut Self| -> Result<()> {
            let mut rows = 0;
            this.parse_seq_fn(',', |this, _| {
                values.extend(this.parse_tuple::<f64>(dimension)?);
                rows += 1;
                Ok(())
            })?;
            ensure!(rows == dimension, "matrix{dimension}d literal must have {dimension} rows, got {rows}");
            Ok(())
        };

        if array {
            self.parse_array_fn(read_matrix)?;
        } else {
            read_matrix(self)?;
        }
        Ok(values)
    }
}
