//! Editable model of a shell-assignment settings file.
//!
//! A [`ShellConfig`] keeps every token of the source file, so that
//! serializing an unmodified document reproduces it byte for byte and
//! an edit only touches the assignment it is about.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::lexer::tokenize;
use crate::quote::quote;
use crate::token::{Span, Token, TokenKind};
use crate::{Error, fs};

/// A parsed shell-assignment file bound to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    path: PathBuf,
    tokens: Vec<Token>,
}

/// One variable to write with [`set_and_save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update<'a> {
    pub name: &'a str,
    /// Existing spelling to rewrite instead, if the file uses it.
    pub alt_name: Option<&'a str>,
    pub value: &'a str,
}

impl<'a> Update<'a> {
    #[must_use]
    pub const fn new(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            alt_name: None,
            value,
        }
    }

    #[must_use]
    pub const fn or_alias(mut self, alt_name: &'a str) -> Self {
        self.alt_name = Some(alt_name);
        self
    }
}

impl ShellConfig {
    /// Read and tokenize the file at `path`.
    ///
    /// A file that does not exist yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and
    /// `Error::Shell` if it is not a plain assignment file.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::read_optional(path)? {
            Some(source) => Self::from_source(path, &source),
            None => Ok(Self::empty(path)),
        }
    }

    /// Tokenize `source` as the contents of `path` without reading it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Shell` if `source` is not a plain assignment file.
    pub fn from_source(path: impl AsRef<Path>, source: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let tokens = tokenize(source).map_err(|source| Error::Shell {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            tokens,
        })
    }

    /// A document with no content for `path`.
    #[must_use]
    pub fn empty(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            tokens: Vec::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True if the file was absent or had no content at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The value of `name`. Later assignments override earlier ones.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.iter().rev().find_map(|token| match &token.kind {
            TokenKind::Assignment { name: n, value, .. } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `name` to `value`, rewriting its last assignment in place as
    /// `name='value'`. A prefix such as `export` is not kept.
    ///
    /// If the variable is not assigned anywhere, a new assignment is
    /// appended when `add_if_unset` is true. Returns whether the document
    /// now assigns `value` to `name`.
    pub fn set(&mut self, name: &str, value: &str, add_if_unset: bool) -> bool {
        if let Some(token) = self.tokens.iter_mut().rev().find(|t| t.assigns(name)) {
            if let TokenKind::Assignment {
                prefix,
                value: current,
                ..
            } = &mut token.kind
            {
                token.text = format!("{name}={}", quote(value));
                prefix.clear();
                value.clone_into(current);
            }
            return true;
        }

        if !add_if_unset {
            return false;
        }

        if self.needs_separator() {
            self.tokens.push(Token::separator("\n"));
        }
        self.tokens.push(Token {
            kind: TokenKind::Assignment {
                prefix: String::new(),
                name: name.to_string(),
                value: value.to_string(),
            },
            text: format!("{name}={}", quote(value)),
            span: Span::default(),
        });
        self.tokens.push(Token::separator("\n"));
        true
    }

    /// Remove every assignment of `name`.
    ///
    /// Each removal also drops one neighbouring separator so that no empty
    /// statement is left behind: the following one if there is one,
    /// otherwise the preceding one.
    pub fn clear(&mut self, name: &str) {
        let mut i = 0;
        while i < self.tokens.len() {
            if !self.tokens[i].assigns(name) {
                i += 1;
                continue;
            }
            self.tokens.remove(i);
            if self.tokens.get(i).is_some_and(Token::is_separator) {
                self.tokens.remove(i);
            } else if i > 0 && self.tokens[i - 1].is_separator() {
                self.tokens.remove(i - 1);
                i -= 1;
            }
        }
    }

    /// The document as file contents.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    /// Atomically write the document back to its path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written; the previous
    /// contents are then left in place.
    pub fn save(&self) -> Result<(), Error> {
        fs::write_atomic(&self.path, self.serialize().as_bytes())
    }

    /// Whether an appended assignment would run into the last token.
    fn needs_separator(&self) -> bool {
        match self.tokens.last() {
            None => false,
            Some(last) if last.is_separator() => false,
            Some(last) if last.is_comment() => !last.text.ends_with('\n'),
            Some(_) => true,
        }
    }
}

impl fmt::Display for ShellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(&token.text)?;
        }
        Ok(())
    }
}

/// Read a single variable from the file at `path`.
///
/// # Errors
///
/// Returns the errors of [`ShellConfig::parse`].
pub fn source_var(path: impl AsRef<Path>, name: &str) -> Result<Option<String>, Error> {
    Ok(ShellConfig::parse(path)?.get(name).map(str::to_string))
}

/// Read several variables from the file at `path` with a single parse.
///
/// # Errors
///
/// Returns the errors of [`ShellConfig::parse`].
pub fn source_vars(path: impl AsRef<Path>, names: &[&str]) -> Result<Vec<Option<String>>, Error> {
    let config = ShellConfig::parse(path)?;
    Ok(names
        .iter()
        .map(|name| config.get(name).map(str::to_string))
        .collect())
}

/// Apply `updates` to the file at `path` and save it.
///
/// An update with an `alt_name` rewrites whichever of the two spellings
/// the file already uses, preferring `name`, and appends `name` when
/// neither is present.
///
/// # Errors
///
/// Returns the errors of [`ShellConfig::parse`] and [`ShellConfig::save`].
pub fn set_and_save(path: impl AsRef<Path>, updates: &[Update<'_>]) -> Result<(), Error> {
    let mut config = ShellConfig::parse(path)?;
    for update in updates {
        let rewritten = config.set(update.name, update.value, false)
            || update
                .alt_name
                .is_some_and(|alt| config.set(alt, update.value, false));
        if !rewritten {
            config.set(update.name, update.value, true);
        }
    }
    config.save()
}
