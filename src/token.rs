/// Source location for error reporting.
///
/// Tokens created by editing a document rather than by the lexer carry
/// the default span (line 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    /// Byte offset from the start of the file.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Token kinds produced by the shell-assignment lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Leading run of spaces and tabs.
    Indent,
    /// Comment (`# ...`), including its newline.
    Comment,
    /// Whitespace run containing at least one `;` or newline.
    Separator,
    /// `name=value`, optionally prefixed by `export ` or `local `.
    Assignment {
        /// Keyword prefix exactly as written (`""`, `"export "`, ...).
        prefix: String,
        name: String,
        /// Fully unquoted value.
        value: String,
    },
}

/// A single token with its kind, raw source text, and location.
///
/// Concatenating the `text` of every token of a document reproduces the
/// source byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Build a separator token that is not backed by source text.
    #[must_use]
    pub fn separator(text: &str) -> Self {
        Self {
            kind: TokenKind::Separator,
            text: text.to_string(),
            span: Span::default(),
        }
    }

    #[must_use]
    pub const fn is_separator(&self) -> bool {
        matches!(self.kind, TokenKind::Separator)
    }

    #[must_use]
    pub const fn is_comment(&self) -> bool {
        matches!(self.kind, TokenKind::Comment)
    }

    /// Whether this token assigns the variable `name`.
    #[must_use]
    pub fn assigns(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Assignment { name: n, .. } if n == name)
    }
}
