use anyhow::{anyhow, bail, ensure, Context, Result};

use crate::usda::{token::Token, unescape};

type LexResult<'source> = std::result::Result<Token<'source>, ()>;

/// Token stream operations.
impl<'a> super::Parser<'a> {
    /// Fetch the next token from the stream and update the last span.
    #[inline]
    pub(super) fn fetch_next(&mut self) -> Result<Token<'a>> {
        let (token, span) = self.iter.next().context("Unexpected end of tokens")?;
        self.last_span = Some(span);
        token.map_err(|_| anyhow!("Unrecognized input"))
    }

    /// Peek at the next token without consuming it.
    #[inline]
    pub(super) fn peek_next(&mut self) -> Option<&LexResult<'a>> {
        self.iter.peek().map(|(token, _)| token)
    }

    /// Peek at the next token, failing at the end of input or on a lexer error.
    pub(super) fn peek_token(&mut self) -> Result<Token<'a>> {
        match self.peek_next() {
            Some(Ok(token)) => Ok(token.clone()),
            Some(Err(_)) => Err(anyhow!("Unrecognized input")),
            None => Err(anyhow!("Unexpected end of tokens")),
        }
    }

    /// Check if the next token matches the expected token.
    #[inline]
    pub(super) fn is_next(&mut self, expected: Token) -> bool {
        matches!(self.peek_next(), Some(Ok(t)) if *t == expected)
    }

    /// Consume the next token if it matches.
    pub(super) fn eat(&mut self, expected: Token) -> Result<bool> {
        if self.is_next(expected) {
            self.fetch_next()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Consume the next token, failing unless it is `expected`.
    pub(super) fn ensure_next(&mut self, expected: Token) -> Result<()> {
        let token = self.fetch_next()?;
        ensure!(token == expected, "Expected {expected:?}, got {token:?}");
        Ok(())
    }

    /// Ensure the next token is a specific punctuation character.
    #[inline]
    pub(super) fn ensure_pun(&mut self, value: char) -> Result<()> {
        self.ensure_next(Token::Punctuation(value))
            .with_context(|| format!("'{value}' expected"))
    }

    /// Next token as an unescaped string literal.
    pub(super) fn fetch_str(&mut self) -> Result<String> {
        match self.fetch_next()? {
            Token::String(raw) => Ok(unescape(raw).into_owned()),
            other => bail!("Expected a string, got {other:?}"),
        }
    }
}
