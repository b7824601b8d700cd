//! Editor for the keyboard `InputClass` section of an Xorg conf.d file.
//!
//! Every line is classified and kept verbatim. Only `Option "Xkb..."`
//! lines inside the keyboard section are ever rewritten, inserted, or
//! removed, and a keyboard section is appended if there is none.

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::{Error, fs};

/// The four XKB options kept in a keyboard section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XkbOption {
    Layout,
    Model,
    Variant,
    Options,
}

impl XkbOption {
    /// All options, in the order new lines are inserted.
    pub const ALL: [Self; 4] = [Self::Layout, Self::Model, Self::Variant, Self::Options];

    /// Option name as written in the file, e.g. `XkbLayout`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Layout => "XkbLayout",
            Self::Model => "XkbModel",
            Self::Variant => "XkbVariant",
            Self::Options => "XkbOptions",
        }
    }
}

impl fmt::Display for XkbOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    InputClass,
    Other,
}

/// Classification of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    SectionStart(SectionKind),
    EndSection,
    MatchIsKeyboard,
    Xkb { option: XkbOption, value: String },
    Unknown,
}

/// A line of the file, without its newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorgLine {
    pub kind: LineKind,
    pub text: String,
}

/// XKB settings read from, or to be written to, a keyboard section.
///
/// For [`XorgKeyboardConfig::set_xkb`], `None` leaves a field untouched
/// and `Some("")` removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XkbSettings {
    pub layout: Option<String>,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub options: Option<String>,
}

impl XkbSettings {
    #[must_use]
    pub const fn get(&self, option: XkbOption) -> Option<&String> {
        match option {
            XkbOption::Layout => self.layout.as_ref(),
            XkbOption::Model => self.model.as_ref(),
            XkbOption::Variant => self.variant.as_ref(),
            XkbOption::Options => self.options.as_ref(),
        }
    }

    /// Check that every value can be written between double quotes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` naming the first value that
    /// contains `"` or a line break.
    pub fn validate(&self) -> Result<(), Error> {
        let bad = XkbOption::ALL.into_iter().find_map(|option| {
            self.get(option)
                .filter(|value| value.contains(['"', '\n', '\r']))
                .map(|value| (option, value))
        });
        match bad {
            Some((option, value)) => Err(Error::InvalidArgument(format!(
                "{option} value may not contain quotes or line breaks: {value:?}"
            ))),
            None => Ok(()),
        }
    }

    const fn slot(&mut self, option: XkbOption) -> &mut Option<String> {
        match option {
            XkbOption::Layout => &mut self.layout,
            XkbOption::Model => &mut self.model,
            XkbOption::Variant => &mut self.variant,
            XkbOption::Options => &mut self.options,
        }
    }
}

/// Classifies an Xorg parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XorgErrorKind {
    /// `Section` while another section is still open.
    NestedSection,
    /// `EndSection`, `MatchIsKeyboard`, or an XKB option with no open section.
    OutsideSection,
    /// End of file inside a section.
    UnterminatedSection,
}

impl fmt::Display for XorgErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedSection => write!(f, "section opened inside another section"),
            Self::OutsideSection => write!(f, "statement outside of any section"),
            Self::UnterminatedSection => write!(f, "section is never closed"),
        }
    }
}

/// Error produced while classifying an Xorg config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}")]
pub struct XorgError {
    pub kind: XorgErrorKind,
    pub line: usize,
}

/// A parsed Xorg conf.d file bound to its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorgKeyboardConfig {
    path: PathBuf,
    lines: Vec<XorgLine>,
    /// Index of the `Section "InputClass"` line of the keyboard section.
    keyboard_section: Option<usize>,
}

impl XorgKeyboardConfig {
    /// Read and classify the file at `path`.
    ///
    /// A file that does not exist yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Xorg`
    /// if its sections are nested, unbalanced, or unterminated.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let source = fs::read_optional(path)?.unwrap_or_default();
        Self::from_source(path, &source)
    }

    /// Classify `source` as the contents of `path` without reading it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Xorg` if sections are nested, unbalanced, or
    /// unterminated.
    pub fn from_source(path: impl AsRef<Path>, source: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let (lines, keyboard_section) = classify(source).map_err(|source| Error::Xorg {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            keyboard_section,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lines(&self) -> &[XorgLine] {
        &self.lines
    }

    /// Whether the file has an `InputClass` section matching keyboards.
    #[must_use]
    pub const fn has_keyboard_section(&self) -> bool {
        self.keyboard_section.is_some()
    }

    /// XKB settings of the keyboard section; the last line of each kind wins.
    #[must_use]
    pub fn get_xkb(&self) -> XkbSettings {
        let mut settings = XkbSettings::default();
        if let Some(range) = self.section_body() {
            for line in &self.lines[range] {
                if let LineKind::Xkb { option, value } = &line.kind {
                    *settings.slot(*option) = Some(value.clone());
                }
            }
        }
        settings
    }

    /// Write XKB settings into the keyboard section.
    ///
    /// Fields set to `None` are left alone. A non-empty value rewrites the
    /// existing option lines of its kind, or is inserted before
    /// `EndSection` if there are none; an empty value deletes them.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument`, leaving the document unchanged,
    /// if [`XkbSettings::validate`] rejects `settings`.
    pub fn set_xkb(&mut self, settings: &XkbSettings) -> Result<(), Error> {
        settings.validate()?;
        let start = match self.keyboard_section {
            Some(start) => start,
            None => self.append_keyboard_section(),
        };

        let mut found = Vec::new();
        let mut i = start + 1;
        while i < self.lines.len() && self.lines[i].kind != LineKind::EndSection {
            let LineKind::Xkb { option, .. } = self.lines[i].kind else {
                i += 1;
                continue;
            };
            let Some(value) = settings.get(option) else {
                i += 1;
                continue;
            };
            found.push(option);
            if value.is_empty() {
                self.lines.remove(i);
            } else {
                set_value(&mut self.lines[i], option, value);
                i += 1;
            }
        }

        // `i` now indexes the section's EndSection line.
        for option in XkbOption::ALL {
            if found.contains(&option) {
                continue;
            }
            if let Some(value) = settings.get(option).filter(|v| !v.is_empty()) {
                self.lines.insert(
                    i,
                    XorgLine {
                        kind: LineKind::Xkb {
                            option,
                            value: value.clone(),
                        },
                        text: format!("        Option \"{option}\" \"{value}\""),
                    },
                );
                i += 1;
            }
        }
        Ok(())
    }

    /// The document as file contents, one newline per line.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    /// Atomically write the document back to its path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    pub fn save(&self) -> Result<(), Error> {
        fs::write_atomic(&self.path, self.serialize().as_bytes())
    }

    /// Lines strictly between the keyboard section's start and end.
    fn section_body(&self) -> Option<Range<usize>> {
        let start = self.keyboard_section? + 1;
        let len = self.lines[start..]
            .iter()
            .position(|line| line.kind == LineKind::EndSection)?;
        Some(start..start + len)
    }

    fn append_keyboard_section(&mut self) -> usize {
        let start = self.lines.len();
        self.lines.extend([
            XorgLine {
                kind: LineKind::SectionStart(SectionKind::InputClass),
                text: "Section \"InputClass\"".to_string(),
            },
            XorgLine {
                kind: LineKind::Unknown,
                text: "        Identifier \"keyboard-all\"".to_string(),
            },
            XorgLine {
                kind: LineKind::MatchIsKeyboard,
                text: "        MatchIsKeyboard \"on\"".to_string(),
            },
            XorgLine {
                kind: LineKind::EndSection,
                text: "EndSection".to_string(),
            },
        ]);
        self.keyboard_section = Some(start);
        start
    }
}

impl fmt::Display for XorgKeyboardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn classify(source: &str) -> Result<(Vec<XorgLine>, Option<usize>), XorgError> {
    let mut lines = Vec::new();
    let mut keyboard_section = None;
    // (index of the Section line, kind, seen MatchIsKeyboard)
    let mut open: Option<(usize, SectionKind, bool)> = None;

    let body = source.strip_suffix('\n').unwrap_or(source);
    let raw_lines = if source.is_empty() {
        Vec::new()
    } else {
        body.split('\n').collect()
    };

    for (index, text) in raw_lines.into_iter().enumerate() {
        let error = |kind| XorgError {
            kind,
            line: index + 1,
        };
        let kind = classify_line(text);

        match &kind {
            LineKind::SectionStart(section) => {
                if open.is_some() {
                    return Err(error(XorgErrorKind::NestedSection));
                }
                open = Some((index, *section, false));
            }
            LineKind::EndSection => {
                let Some((start, section, keyboard)) = open.take() else {
                    return Err(error(XorgErrorKind::OutsideSection));
                };
                if keyboard && section == SectionKind::InputClass {
                    keyboard_section = Some(start);
                }
            }
            LineKind::MatchIsKeyboard => match open.as_mut() {
                Some((_, _, keyboard)) => *keyboard = true,
                None => return Err(error(XorgErrorKind::OutsideSection)),
            },
            LineKind::Xkb { .. } if open.is_none() => {
                return Err(error(XorgErrorKind::OutsideSection));
            }
            _ => {}
        }

        lines.push(XorgLine {
            kind,
            text: text.to_string(),
        });
    }

    if open.is_some() {
        return Err(XorgError {
            kind: XorgErrorKind::UnterminatedSection,
            line: lines.len(),
        });
    }

    Ok((lines, keyboard_section))
}

/// Classify one line; the first matching rule wins.
fn classify_line(text: &str) -> LineKind {
    let line = text.trim_start();

    if line.starts_with('#') {
        return LineKind::Comment;
    }
    if let Some(rest) = keyword(line, "Section") {
        if let Some((name, _)) = skip_blanks(rest).and_then(quoted) {
            return if name.eq_ignore_ascii_case("InputClass") {
                LineKind::SectionStart(SectionKind::InputClass)
            } else {
                LineKind::SectionStart(SectionKind::Other)
            };
        }
    }
    if keyword(line, "EndSection").is_some() {
        return LineKind::EndSection;
    }
    if let Some(rest) = keyword(line, "MatchIsKeyboard") {
        if match_is_keyboard(rest) {
            return LineKind::MatchIsKeyboard;
        }
    }
    if let Some((option, range)) = match_option(text) {
        return LineKind::Xkb {
            option,
            value: text[range].to_string(),
        };
    }
    LineKind::Unknown
}

/// Value of `MatchIsKeyboard` counts as true unless it is false-like.
fn match_is_keyboard(rest: &str) -> bool {
    if rest.trim().is_empty() {
        return true;
    }
    let Some((value, _)) = skip_blanks(rest).and_then(quoted) else {
        return false;
    };
    !["0", "off", "false", "no"]
        .iter()
        .any(|f| value.eq_ignore_ascii_case(f))
}

/// Match `Option "Xkb..." "value"`, returning the byte range of `value`
/// within `text`.
fn match_option(text: &str) -> Option<(XkbOption, Range<usize>)> {
    let line = text.trim_start();
    let rest = skip_blanks(keyword(line, "Option")?)?;
    let (name, rest) = quoted(rest)?;
    let option = XkbOption::ALL
        .into_iter()
        .find(|o| name.eq_ignore_ascii_case(o.name()))?;
    let rest = skip_blanks(rest)?;
    let (value, _) = quoted(rest)?;
    let start = text.len() - rest.len() + 1;
    Some((option, start..start + value.len()))
}

fn set_value(line: &mut XorgLine, option: XkbOption, value: &str) {
    if let Some((_, range)) = match_option(&line.text) {
        line.text.replace_range(range, value);
    }
    line.kind = LineKind::Xkb {
        option,
        value: value.to_string(),
    };
}

/// Strip a case-insensitive `word` from the start of `line`. The word
/// must end the line or be followed by a blank or a comment.
fn keyword<'a>(line: &'a str, word: &str) -> Option<&'a str> {
    let head = line.get(..word.len())?;
    let rest = &line[word.len()..];
    let bounded = rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '#');
    (head.eq_ignore_ascii_case(word) && bounded).then_some(rest)
}

/// Skip at least one blank.
fn skip_blanks(s: &str) -> Option<&str> {
    let rest = s.trim_start();
    (rest.len() < s.len()).then_some(rest)
}

/// Split a leading `"..."` into its contents and the remainder.
fn quoted(s: &str) -> Option<(&str, &str)> {
    let inner = s.strip_prefix('"')?;
    let end = inner.find('"')?;
    Some((&inner[..end], &inner[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYBOARD: &str = "\
Section \"InputClass\"
        Identifier \"keyboard-all\"
        MatchIsKeyboard \"on\"
        Option \"XkbLayout\" \"us\"
        Option \"XkbModel\" \"pc105\"
EndSection
";

    fn doc(source: &str) -> XorgKeyboardConfig {
        XorgKeyboardConfig::from_source("/test/30-keyboard.conf", source).expect("parse failed")
    }

    fn error(source: &str) -> XorgError {
        match XorgKeyboardConfig::from_source("/test/x.conf", source).unwrap_err() {
            Error::Xorg { source, .. } => source,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify_line("  # c"), LineKind::Comment);
        assert_eq!(
            classify_line("section \"inputclass\""),
            LineKind::SectionStart(SectionKind::InputClass)
        );
        assert_eq!(
            classify_line("Section \"ServerLayout\""),
            LineKind::SectionStart(SectionKind::Other)
        );
        assert_eq!(classify_line("\tEndSection"), LineKind::EndSection);
        assert_eq!(classify_line("MatchIsKeyboard"), LineKind::MatchIsKeyboard);
        assert_eq!(classify_line("MatchIsKeyboard \"yes\""), LineKind::MatchIsKeyboard);
        assert_eq!(classify_line("MatchIsKeyboard \"off\""), LineKind::Unknown);
        assert_eq!(
            classify_line("  Option  \"xkblayout\"\t\"de,us\"  # two"),
            LineKind::Xkb {
                option: XkbOption::Layout,
                value: "de,us".to_string()
            }
        );
        assert_eq!(classify_line("Option \"XkbRules\" \"evdev\""), LineKind::Unknown);
        assert_eq!(classify_line("Identifier \"x\""), LineKind::Unknown);
    }

    #[test]
    fn get_xkb_from_keyboard_section() {
        let d = doc(KEYBOARD);
        let xkb = d.get_xkb();
        assert_eq!(xkb.layout.as_deref(), Some("us"));
        assert_eq!(xkb.model.as_deref(), Some("pc105"));
        assert_eq!(xkb.variant, None);
        assert_eq!(xkb.options, None);
    }

    #[test]
    fn round_trip_unmodified() {
        assert_eq!(doc(KEYBOARD).serialize(), KEYBOARD);
    }

    #[test]
    fn missing_final_newline_is_normalized() {
        let d = doc("# just a comment");
        assert_eq!(d.serialize(), "# just a comment\n");
    }

    #[test]
    fn rewrite_in_place_keeps_trailing_text() {
        let mut d = doc(
            "Section \"InputClass\"\n\
             \tMatchIsKeyboard\n\
             \tOption \"XkbLayout\" \"us\" # primary\n\
             EndSection\n",
        );
        d.set_xkb(&XkbSettings {
            layout: Some("de".to_string()),
            ..XkbSettings::default()
        })
        .expect("set");
        assert_eq!(d.lines()[2].text, "\tOption \"XkbLayout\" \"de\" # primary");
        assert_eq!(d.get_xkb().layout.as_deref(), Some("de"));
    }

    #[test]
    fn empty_value_deletes_and_none_keeps() {
        let mut d = doc(KEYBOARD);
        d.set_xkb(&XkbSettings {
            model: Some(String::new()),
            ..XkbSettings::default()
        })
        .expect("set");
        let xkb = d.get_xkb();
        assert_eq!(xkb.layout.as_deref(), Some("us"));
        assert_eq!(xkb.model, None);
        assert!(!d.serialize().contains("XkbModel"));
    }

    #[test]
    fn insert_before_end_section_in_fixed_order() {
        let mut d = doc(KEYBOARD);
        d.set_xkb(&XkbSettings {
            options: Some("grp:alt_shift_toggle".to_string()),
            variant: Some("nodeadkeys".to_string()),
            ..XkbSettings::default()
        })
        .expect("set");
        let texts: Vec<_> = d.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            &texts[5..],
            [
                "        Option \"XkbVariant\" \"nodeadkeys\"",
                "        Option \"XkbOptions\" \"grp:alt_shift_toggle\"",
                "EndSection",
            ]
        );
    }

    #[test]
    fn synthesizes_section_when_missing() {
        let mut d = doc("Section \"Device\"\n\tDriver \"intel\"\nEndSection\n");
        assert!(!d.has_keyboard_section());
        d.set_xkb(&XkbSettings {
            layout: Some("us".to_string()),
            ..XkbSettings::default()
        })
        .expect("set");
        assert_eq!(
            d.serialize(),
            "Section \"Device\"\n\tDriver \"intel\"\nEndSection\n\
             Section \"InputClass\"\n\
             \x20       Identifier \"keyboard-all\"\n\
             \x20       MatchIsKeyboard \"on\"\n\
             \x20       Option \"XkbLayout\" \"us\"\n\
             EndSection\n"
        );
    }

    #[test]
    fn keywords_need_a_word_boundary() {
        assert_eq!(classify_line("EndSectionFoo \"x\""), LineKind::Unknown);
        assert_eq!(classify_line("  EndSection # done"), LineKind::EndSection);
        assert_eq!(classify_line("SectionX \"InputClass\""), LineKind::Unknown);
        assert_eq!(classify_line("MatchIsKeyboardish"), LineKind::Unknown);
        assert_eq!(classify_line("\tMatchIsKeyboard"), LineKind::MatchIsKeyboard);
    }

    #[test]
    fn quote_in_value_is_refused() {
        let mut d = doc(KEYBOARD);
        let err = d
            .set_xkb(&XkbSettings {
                model: Some("pc105".to_string()),
                layout: Some("a\"b".to_string()),
                ..XkbSettings::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(d.serialize(), KEYBOARD);
    }

    #[test]
    fn last_keyboard_section_wins() {
        let d = doc(
            "Section \"InputClass\"\nMatchIsKeyboard\nOption \"XkbLayout\" \"us\"\nEndSection\n\
             Section \"InputClass\"\nMatchIsKeyboard\nOption \"XkbLayout\" \"fr\"\nEndSection\n\
             Section \"InputClass\"\nOption \"XkbLayout\" \"xx\"\nEndSection\n",
        );
        assert_eq!(d.get_xkb().layout.as_deref(), Some("fr"));
    }

    #[test]
    fn options_outside_keyboard_section_are_ignored() {
        let d = doc("Section \"InputClass\"\n\tOption \"XkbLayout\" \"us\"\nEndSection\n");
        assert_eq!(d.get_xkb(), XkbSettings::default());
    }

    #[test]
    fn section_errors() {
        assert_eq!(
            error("Section \"InputClass\"\nSection \"Device\"\nEndSection\n"),
            XorgError {
                kind: XorgErrorKind::NestedSection,
                line: 2
            }
        );
        assert_eq!(error("EndSection\n").kind, XorgErrorKind::OutsideSection);
        assert_eq!(error("MatchIsKeyboard\n").kind, XorgErrorKind::OutsideSection);
        assert_eq!(
            error("Option \"XkbModel\" \"pc105\"\n").kind,
            XorgErrorKind::OutsideSection
        );
        assert_eq!(
            error("Section \"InputClass\"\n\tMatchIsKeyboard\n").kind,
            XorgErrorKind::UnterminatedSection
        );
    }
}
