use std::fmt;

use crate::quote::{self, QuoteError};
use crate::token::{Span, Token, TokenKind};

/// Classifies a lexer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    /// Byte that cannot start any token.
    UnexpectedCharacter(char),
    /// A second assignment on the same statement, e.g. `A=1 B=2`.
    MissingSeparator,
    /// A value that is not plain quoted text.
    Quoting(QuoteError),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(ch) => {
                write!(f, "unexpected character: {ch:?}")
            }
            Self::MissingSeparator => {
                write!(f, "expected newline or ';' before assignment")
            }
            Self::Quoting(err) => write!(f, "{err}"),
        }
    }
}

/// Error produced during lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {}, column {}", span.line, span.column)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

/// Tokenize the contents of a shell-assignment file.
///
/// Concatenating the `text` of the returned tokens yields `input`.
///
/// # Errors
///
/// Returns `LexError` on anything other than comments, separators,
/// indentation, and one literal assignment per statement.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).tokenize()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        // Set after an assignment until a separator or comment is seen.
        let mut want_separator = false;

        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];

            if let Some(len) = comment_len(rest) {
                tokens.push(self.take(TokenKind::Comment, len));
                want_separator = false;
            } else if let Some(len) = separator_len(rest) {
                tokens.push(self.take(TokenKind::Separator, len));
                want_separator = false;
            } else if let Some(len) = indent_len(rest) {
                tokens.push(self.take(TokenKind::Indent, len));
            } else if let Some(head) = assignment_head(rest) {
                if want_separator {
                    return Err(self.error(LexErrorKind::MissingSeparator));
                }
                tokens.push(self.read_assignment(&head)?);
                want_separator = true;
            } else {
                let kind = match quote::diagnose(rest) {
                    QuoteError::UnexpectedCharacter(ch) => LexErrorKind::UnexpectedCharacter(ch),
                    err => LexErrorKind::Quoting(err),
                };
                return Err(self.error(kind));
            }
        }

        Ok(tokens)
    }

    const fn span(&self) -> Span {
        Span {
            offset: self.pos,
            line: self.line,
            column: self.col,
        }
    }

    const fn error(&self, kind: LexErrorKind) -> LexError {
        LexError {
            kind,
            span: self.span(),
        }
    }

    fn advance(&mut self, len: usize) {
        for ch in self.input[self.pos..self.pos + len].chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += len;
    }

    fn take(&mut self, kind: TokenKind, len: usize) -> Token {
        let span = self.span();
        let text = self.input[self.pos..self.pos + len].to_string();
        self.advance(len);
        Token { kind, text, span }
    }

    fn read_assignment(&mut self, head: &AssignmentHead<'a>) -> Result<Token, LexError> {
        let span = self.span();
        let start = self.pos;
        self.advance(head.len);

        let value_start = self.pos;
        loop {
            let rest = &self.input[self.pos..];
            match quote::scan_fragment(rest) {
                Ok(Some(len)) => self.advance(len),
                Ok(None) => break,
                Err(err) => return Err(self.error(LexErrorKind::Quoting(err))),
            }
        }

        let value = quote::unquote(&self.input[value_start..self.pos]).map_err(|err| LexError {
            kind: LexErrorKind::Quoting(err),
            span,
        })?;

        Ok(Token {
            kind: TokenKind::Assignment {
                prefix: head.prefix.to_string(),
                name: head.name.to_string(),
                value,
            },
            text: self.input[start..self.pos].to_string(),
            span,
        })
    }
}

/// `# ...` through the end of the line, newline included when present.
fn comment_len(rest: &str) -> Option<usize> {
    if !rest.starts_with('#') {
        return None;
    }
    Some(rest.find('\n').map_or(rest.len(), |nl| nl + 1))
}

/// Maximal run of blanks, `;`, and line breaks containing `;` or `\n`.
fn separator_len(rest: &str) -> Option<usize> {
    let len = rest
        .bytes()
        .take_while(|b| matches!(b, b' ' | b'\t' | b';' | b'\n' | b'\r'))
        .count();
    rest[..len]
        .bytes()
        .any(|b| b == b';' || b == b'\n')
        .then_some(len)
}

fn indent_len(rest: &str) -> Option<usize> {
    let len = rest.bytes().take_while(|b| matches!(b, b' ' | b'\t')).count();
    (len > 0).then_some(len)
}

/// The `[export |local ]name=` part of an assignment.
struct AssignmentHead<'a> {
    prefix: &'a str,
    name: &'a str,
    /// Bytes up to and including `=` and any trailing line continuations.
    len: usize,
}

fn assignment_head(rest: &str) -> Option<AssignmentHead<'_>> {
    let prefix_len = ["export", "local"]
        .iter()
        .find_map(|keyword| {
            let after = rest.strip_prefix(keyword)?;
            let blanks = indent_len(after)?;
            Some(keyword.len() + blanks)
        })
        .unwrap_or(0);

    let body = &rest[prefix_len..];
    let bytes = body.as_bytes();
    if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        return None;
    }
    let name_len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();

    let mut pos = name_len + continuation_len(&body[name_len..]);
    if bytes.get(pos) != Some(&b'=') {
        return None;
    }
    pos += 1;
    pos += continuation_len(&body[pos..]);

    Some(AssignmentHead {
        prefix: &rest[..prefix_len],
        name: &body[..name_len],
        len: prefix_len + pos,
    })
}

/// Length of a run of backslash-newline line continuations.
fn continuation_len(rest: &str) -> usize {
    let mut len = 0;
    while rest[len..].starts_with("\\\n") {
        len += 2;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("should tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn assignment(name: &str, value: &str) -> TokenKind {
        TokenKind::Assignment {
            prefix: String::new(),
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn simple_assignment() {
        let tokens = tokenize("FOO=bar\n").expect("should tokenize");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, assignment("FOO", "bar"));
        assert_eq!(tokens[0].text, "FOO=bar");
        assert_eq!(tokens[1].kind, TokenKind::Separator);
    }

    #[test]
    fn comment_indent_separator() {
        assert_eq!(
            kinds("# header\n  A=1 ; B=2\n\n"),
            vec![
                TokenKind::Comment,
                TokenKind::Indent,
                assignment("A", "1"),
                TokenKind::Separator,
                assignment("B", "2"),
                TokenKind::Separator,
            ]
        );
    }

    #[test]
    fn trailing_comment_after_value() {
        assert_eq!(
            kinds("A=1 # note\n"),
            vec![assignment("A", "1"), TokenKind::Indent, TokenKind::Comment]
        );
    }

    #[test]
    fn comment_at_eof_without_newline() {
        let tokens = tokenize("A=1\n# end").expect("should tokenize");
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[2].text, "# end");
    }

    #[test]
    fn empty_value() {
        assert_eq!(
            kinds("A=\nB=2"),
            vec![assignment("A", ""), TokenKind::Separator, assignment("B", "2")]
        );
    }

    #[test]
    fn export_prefix_is_kept() {
        let tokens = tokenize("export LANG='C'\n").expect("should tokenize");
        assert_eq!(
            tokens[0].kind,
            TokenKind::Assignment {
                prefix: "export ".to_string(),
                name: "LANG".to_string(),
                value: "C".to_string(),
            }
        );
        assert_eq!(tokens[0].text, "export LANG='C'");
    }

    #[test]
    fn continuation_around_equals() {
        let tokens = tokenize("A\\\n=\\\nx\n").expect("should tokenize");
        assert_eq!(tokens[0].kind, assignment("A", "x"));
    }

    #[test]
    fn two_assignments_on_one_statement() {
        let err = tokenize("A=1 B=2\n").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::MissingSeparator);
        assert_eq!(err.span.offset, 4);
    }

    #[test]
    fn command_substitution_is_an_error() {
        let err = tokenize("FOO=$(rm -rf /)").unwrap_err();
        assert_eq!(
            err.kind,
            LexErrorKind::Quoting(QuoteError::CommandSubstitution)
        );
        assert_eq!(err.span.offset, 4);
    }

    #[test]
    fn bare_word_is_an_error() {
        let err = tokenize("A=1\nrc-update add foo\n").unwrap_err();
        assert_eq!(err.kind, LexErrorKind::UnexpectedCharacter('r'));
        assert_eq!(err.span.line, 2);
        assert_eq!(err.span.column, 1);
    }

    #[test]
    fn unterminated_quote_position() {
        let err = tokenize("A=1\nB=\"open\n").unwrap_err();
        assert_eq!(
            err.kind,
            LexErrorKind::Quoting(QuoteError::UnterminatedDoubleQuote)
        );
        assert_eq!(err.span.line, 2);
        assert_eq!(err.span.column, 3);
    }

    #[test]
    fn span_tracking() {
        let tokens = tokenize("A=1\n  B=2").expect("should tokenize");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "\n  ");
        assert!(tokens[1].is_separator());
        assert_eq!(tokens[2].span.line, 2);
        assert_eq!(tokens[2].span.column, 3);
        assert_eq!(tokens[2].span.offset, 6);
    }
}
