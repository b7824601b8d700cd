//! Shell quoting primitives.
//!
//! A value span in a shell-assignment file is a concatenation of
//! fragments, each of which is single-quoted, double-quoted, or an
//! unquoted run with backslash escapes. Only literal text is accepted:
//! `$(...)` and backticks are rejected because sourcing such a file would
//! run commands, and bare `$NAME` expansion is rejected because its value
//! cannot be known without a shell. The literal sequence `${` is allowed.

/// Why a value could not be scanned or unquoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    #[error("unterminated single-quoted string")]
    UnterminatedSingleQuote,
    #[error("unterminated double-quoted string")]
    UnterminatedDoubleQuote,
    #[error("command substitution is not allowed")]
    CommandSubstitution,
    #[error("parameter expansion is not supported")]
    UnsupportedExpansion,
    #[error("unexpected character: {0:?}")]
    UnexpectedCharacter(char),
}

/// Quote `value` so that [`unquote`] returns it unchanged.
///
/// The whole value is wrapped in single quotes; an embedded single quote
/// closes the quoting, is emitted as `"'"`, and reopens it.
///
/// ```
/// use settingsd_config::quote::{quote, unquote};
///
/// assert_eq!(quote("a b"), "'a b'");
/// assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
/// assert_eq!(unquote(&quote("it's")).unwrap(), "it's");
/// ```
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Unquote a raw value span into its logical string.
///
/// # Errors
///
/// Returns `QuoteError` on unterminated quotes, command substitution,
/// parameter expansion, or any character that cannot appear unquoted.
pub fn unquote(raw: &str) -> Result<String, QuoteError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while !rest.is_empty() {
        let Some(len) = scan_fragment(rest)? else {
            return Err(diagnose(rest));
        };
        let (fragment, tail) = rest.split_at(len);
        unquote_fragment(fragment, &mut out);
        rest = tail;
    }
    Ok(out)
}

/// Length in bytes of the value fragment at the start of `input`.
///
/// Returns `Ok(None)` when `input` does not start with a fragment
/// (end of input, whitespace, or a shell metacharacter).
///
/// # Errors
///
/// Returns `QuoteError` when a quoted fragment is opened but is
/// unterminated or contains a disallowed construct.
pub fn scan_fragment(input: &str) -> Result<Option<usize>, QuoteError> {
    match input.as_bytes().first() {
        None => Ok(None),
        Some(b'\'') => scan_single_quoted(input).map(Some),
        Some(b'"') => scan_double_quoted(input).map(Some),
        Some(_) => Ok(scan_unquoted(input)),
    }
}

/// Classify why no fragment or token could start at `rest`.
#[must_use]
pub fn diagnose(rest: &str) -> QuoteError {
    let bytes = rest.as_bytes();
    match bytes.first() {
        Some(b'`') => QuoteError::CommandSubstitution,
        Some(b'$') if bytes.get(1) == Some(&b'(') => QuoteError::CommandSubstitution,
        Some(b'$') => QuoteError::UnsupportedExpansion,
        _ => QuoteError::UnexpectedCharacter(rest.chars().next().unwrap_or('\0')),
    }
}

fn scan_single_quoted(input: &str) -> Result<usize, QuoteError> {
    input[1..]
        .find('\'')
        .map(|end| end + 2)
        .ok_or(QuoteError::UnterminatedSingleQuote)
}

fn scan_double_quoted(input: &str) -> Result<usize, QuoteError> {
    let mut chars = input.char_indices().skip(1).peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' => return Ok(i + 1),
            '\\' => {
                if chars.next().is_none() {
                    break;
                }
            }
            '`' => return Err(QuoteError::CommandSubstitution),
            '$' => match chars.peek() {
                Some((_, '{')) => {
                    chars.next();
                }
                Some((_, '(')) => return Err(QuoteError::CommandSubstitution),
                _ => return Err(QuoteError::UnsupportedExpansion),
            },
            _ => {}
        }
    }
    Err(QuoteError::UnterminatedDoubleQuote)
}

const fn is_metachar(byte: u8) -> bool {
    matches!(
        byte,
        b'"' | b'\'' | b'`' | b'$' | b'|' | b'&' | b'<' | b'>' | b';'
    ) || byte.is_ascii_whitespace()
        || byte == 0x0b
}

fn scan_unquoted(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => {
                pos += 1;
                if let Some(next) = input[pos..].chars().next() {
                    pos += next.len_utf8();
                }
            }
            b'$' if bytes.get(pos + 1) == Some(&b'{') => pos += 2,
            byte if is_metachar(byte) => break,
            _ => pos += 1,
        }
    }
    (pos > 0).then_some(pos)
}

fn unquote_fragment(fragment: &str, out: &mut String) {
    if let Some(inner) = fragment.strip_prefix('\'') {
        out.push_str(&inner[..inner.len() - 1]);
    } else if let Some(inner) = fragment.strip_prefix('"') {
        let inner = &inner[..inner.len() - 1];
        let mut chars = inner.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.peek() {
                Some('\n') => {
                    chars.next();
                }
                Some(&escaped @ ('"' | '`' | '$' | '\\')) => {
                    out.push(escaped);
                    chars.next();
                }
                _ => out.push('\\'),
            }
        }
    } else {
        let mut chars = fragment.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('\n') => {}
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        }
    }
}
