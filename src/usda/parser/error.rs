use std::fmt;

/// Where in the source text a parse error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    pub line_text: String,
}

impl SourceLocation {
    /// Locate byte `offset` of `source`. Offsets past the end point at the
    /// last character.
    pub fn locate(source: &str, offset: usize) -> Option<Self> {
        if source.is_empty() {
            return None;
        }

        let mut offset = offset.min(source.len());
        if offset == source.len() {
            offset -= 1;
        }
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }

        let before = &source[..offset];
        let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
        let line_end = source[offset..].find('\n').map_or(source.len(), |pos| offset + pos);

        Some(Self {
            line: before.matches('\n').count() + 1,
            column: source[line_start..offset].chars().count() + 1,
            line_text: source[line_start..line_end].trim_end_matches('\r').to_owned(),
        })
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tabs are kept so the caret lines up in a terminal.
        let indent: String = self
            .line_text
            .chars()
            .take(self.column - 1)
            .map(|ch| if ch == '\t' { '\t' } else { ' ' })
            .collect();
        write!(
            f,
            "line {} column {}\n{}\n{indent}^",
            self.line, self.column, self.line_text
        )
    }
}
