//! Lexer for the text format.

use logos::Logos;
use strum::EnumTryAs;

#[derive(Logos, Debug, Clone, PartialEq, EnumTryAs)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token<'source> {
    /// `#usda 1.0` header, carrying the version.
    #[regex(r"#usda[ \t]+[0-9]+\.[0-9]+[^\n]*", |lex| lex.slice()[5..].split_whitespace().next(), priority = 20)]
    Magic(&'source str),

    #[token("def")]
    Def,
    #[token("over")]
    Over,
    #[token("class")]
    Class,
    #[token("variantSet")]
    VariantSet,
    #[token("rel")]
    Rel,

    #[token("add")]
    Add,
    #[token("append")]
    Append,
    #[token("delete")]
    Delete,
    #[token("prepend")]
    Prepend,
    #[token("reorder")]
    Reorder,

    #[token("custom")]
    Custom,
    #[token("uniform")]
    Uniform,
    #[token("varying")]
    Varying,
    #[token("None")]
    None,

    #[token("doc")]
    Doc,
    #[token("subLayers")]
    SubLayers,
    #[token("offset")]
    Offset,
    #[token("scale")]
    Scale,
    #[token("kind")]
    Kind,
    #[token("references")]
    References,
    #[token("payload")]
    Payload,
    #[token("inherits")]
    Inherits,
    #[token("specializes")]
    Specializes,
    #[token("variants")]
    Variants,
    #[token("variantSets")]
    VariantSets,
    #[token("customData")]
    CustomData,
    #[token("dictionary")]
    Dictionary,
    #[token("inf")]
    Inf,

    /// String contents without the surrounding quotes. Escapes are kept as
    /// written; see [`super::unescape`].
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| trim_quotes(lex.slice(), 1))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| trim_quotes(lex.slice(), 1))]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| trim_quotes(lex.slice(), 3))]
    String(&'source str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(\[\]|\.connect|\.timeSamples)?")]
    Identifier(&'source str),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(:[A-Za-z_][A-Za-z0-9_]*)+(\.connect|\.timeSamples)?")]
    NamespacedIdentifier(&'source str),

    #[regex(r"[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?")]
    Number(&'source str),

    /// `<...>` path, without the angle brackets.
    #[regex(r"<[^<>\n]*>", |lex| trim_quotes(lex.slice(), 1))]
    PathRef(&'source str),

    /// `@...@` or `@@@...@@@` asset path, without the delimiters.
    #[regex(r"@[^@\n]*@", |lex| trim_quotes(lex.slice(), 1))]
    #[regex(r"@@@([^@]|@[^@]|@@[^@])*@@@", |lex| trim_quotes(lex.slice(), 3))]
    AssetRef(&'source str),

    #[regex(r"[\(\)\[\]\{\}=,;:\-+&]", |lex| lex.slice().chars().next())]
    Punctuation(char),
}

impl<'source> Token<'source> {
    /// Name-like slice of identifier tokens.
    pub fn as_name(&self) -> Option<&'source str> {
        match self {
            Token::Identifier(s) | Token::NamespacedIdentifier(s) => Some(s),
            _ => None,
        }
    }
}

fn trim_quotes(slice: &str, width: usize) -> &str {
    &slice[width..slice.len() - width]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> Vec<Token<'_>> {
        Token::lexer(text).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn header_and_comments() {
        assert_eq!(
            lex("#usda 1.0\n# comment\ndef"),
            vec![Token::Magic("1.0"), Token::Def]
        );
    }

    #[test]
    fn prim_declaration() {
        assert_eq!(
            lex(r#"def Xform "World" ( kind = "group" ) {}"#),
            vec![
                Token::Def,
                Token::Identifier("Xform"),
                Token::String("World"),
                Token::Punctuation('('),
                Token::Kind,
                Token::Punctuation('='),
                Token::String("group"),
                Token::Punctuation(')'),
                Token::Punctuation('{'),
                Token::Punctuation('}'),
            ]
        );
    }

    #[test]
    fn attribute_names_and_values() {
        assert_eq!(
            lex("uniform token[] xformOpOrder = [\"xformOp:translate\"]"),
            vec![
                Token::Uniform,
                Token::Identifier("token[]"),
                Token::Identifier("xformOpOrder"),
                Token::Punctuation('='),
                Token::Punctuation('['),
                Token::String("xformOp:translate"),
                Token::Punctuation(']'),
            ]
        );
        assert_eq!(
            lex("color3f inputs:diffuseColor.connect = </Mat/Tex.outputs:rgb>"),
            vec![
                Token::Identifier("color3f"),
                Token::NamespacedIdentifier("inputs:diffuseColor.connect"),
                Token::Punctuation('='),
                Token::PathRef("/Mat/Tex.outputs:rgb"),
            ]
        );
    }

    #[test]
    fn numbers_and_assets() {
        assert_eq!(
            lex("(-1.5, 2e3, .5) @./a.usda@ @@@b@@@"),
            vec![
                Token::Punctuation('('),
                Token::Number("-1.5"),
                Token::Punctuation(','),
                Token::Number("2e3"),
                Token::Punctuation(','),
                Token::Number(".5"),
                Token::Punctuation(')'),
                Token::AssetRef("./a.usda"),
                Token::AssetRef("b"),
            ]
        );
    }

    #[test]
    fn strings() {
        assert_eq!(lex(r#""a \"b\"""#), vec![Token::String(r#"a \"b\""#)]);
        assert_eq!(lex("\"\"\"multi\nline\"\"\""), vec![Token::String("multi\nline")]);
        assert_eq!(lex("'single'"), vec![Token::String("single")]);
    }
}
