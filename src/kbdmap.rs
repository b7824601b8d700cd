//! Conversion table between console keymaps and X11 keyboard settings.
//!
//! The table is a whitespace-separated text file with five columns per
//! line: console keymap, X11 layout, model, variant, and options. A `-`
//! in the last three columns stands for an empty value.

use std::path::Path;

use crate::xorg::XkbSettings;
use crate::{Error, fs};

/// One row of the keyboard model map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardMapEntry {
    pub console_keymap: String,
    pub x11_layout: String,
    pub x11_model: String,
    pub x11_variant: String,
    pub x11_options: String,
}

impl KeyboardMapEntry {
    /// The X11 side of the entry, with every field set.
    #[must_use]
    pub fn xkb_settings(&self) -> XkbSettings {
        XkbSettings {
            layout: Some(self.x11_layout.clone()),
            model: Some(self.x11_model.clone()),
            variant: Some(self.x11_variant.clone()),
            options: Some(self.x11_options.clone()),
        }
    }

    /// How far this entry is from the given X11 settings; 0 is an exact
    /// match.
    ///
    /// A layout set disjoint from the entry's adds 10000, each layout in
    /// only one of the two sets adds 100, a different variant adds 10, and
    /// a different model or disjoint options each add 1. Options that are
    /// empty on both sides count as matching.
    #[must_use]
    pub fn x11_score(&self, layout: &str, model: &str, variant: &str, options: &str) -> u32 {
        let (layout_ok, layout_mismatch) = set_equal(layout, &self.x11_layout);
        // Two empty option sets share no element but still agree.
        let options_ok = set_equal(options, &self.x11_options).0
            || (options.is_empty() && self.x11_options.is_empty());
        10000 * u32::from(!layout_ok)
            + 100 * layout_mismatch
            + u32::from(model != self.x11_model)
            + 10 * u32::from(variant != self.x11_variant)
            + u32::from(!options_ok)
    }
}

/// A table line that does not have five fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed entry at line {line}: {text:?}")]
pub struct MapError {
    pub line: usize,
    pub text: String,
}

/// Load the table at `path`. A missing file yields an empty table.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read and
/// `Error::KeyboardMap` if a data line is malformed.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<KeyboardMapEntry>, Error> {
    let path = path.as_ref();
    let Some(source) = fs::read_optional(path)? else {
        return Ok(Vec::new());
    };
    parse_map(&source).map_err(|source| Error::KeyboardMap {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse table contents. Blank lines and `#` comment lines are skipped;
/// fields past the fifth are ignored.
///
/// # Errors
///
/// Returns `MapError` for the first data line with fewer than five fields.
pub fn parse_map(source: &str) -> Result<Vec<KeyboardMapEntry>, MapError> {
    let mut entries = Vec::new();
    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().take(5).collect();
        let [keymap, layout, model, variant, options] = fields[..] else {
            return Err(MapError {
                line: index + 1,
                text: line.to_string(),
            });
        };
        entries.push(KeyboardMapEntry {
            console_keymap: keymap.to_string(),
            x11_layout: layout.to_string(),
            x11_model: dash_empty(model),
            x11_variant: dash_empty(variant),
            x11_options: dash_empty(options),
        });
    }
    Ok(entries)
}

fn dash_empty(field: &str) -> String {
    if field == "-" {
        String::new()
    } else {
        field.to_string()
    }
}

/// Compare two comma-delimited sets.
///
/// Returns whether they share at least one element, and how many
/// elements are in only one of them. An empty string is the empty set.
///
/// ```
/// use settingsd_config::kbdmap::set_equal;
///
/// assert_eq!(set_equal("us,de", "de"), (true, 1));
/// assert_eq!(set_equal("us", "fr"), (false, 2));
/// assert_eq!(set_equal("", ""), (false, 0));
/// ```
#[must_use]
pub fn set_equal(a: &str, b: &str) -> (bool, u32) {
    let left = split_set(a);
    let right = split_set(b);
    let mut common = false;
    let mut mismatches = 0;
    for (this, other) in [(&left, &right), (&right, &left)] {
        for item in this {
            if other.contains(item) {
                common = true;
            } else {
                mismatches += 1;
            }
        }
    }
    (common, mismatches)
}

fn split_set(s: &str) -> Vec<&str> {
    if s.is_empty() {
        Vec::new()
    } else {
        s.split(',').collect()
    }
}

/// The first entry for console keymap `keymap`.
#[must_use]
pub fn find_by_console_keymap<'a>(
    entries: &'a [KeyboardMapEntry],
    keymap: &str,
) -> Option<&'a KeyboardMapEntry> {
    entries.iter().find(|entry| entry.console_keymap == keymap)
}

/// The entry closest to the given X11 settings, with its score.
///
/// Only entries whose layout set shares an element with `layout` are
/// candidates. The lowest score wins and ties go to the earliest entry.
#[must_use]
pub fn find_best_by_x11<'a>(
    entries: &'a [KeyboardMapEntry],
    layout: &str,
    model: &str,
    variant: &str,
    options: &str,
) -> Option<(&'a KeyboardMapEntry, u32)> {
    let mut best: Option<(&KeyboardMapEntry, u32)> = None;
    for entry in entries {
        if !set_equal(layout, &entry.x11_layout).0 {
            continue;
        }
        let score = entry.x11_score(layout, model, variant, options);
        if best.is_none_or(|(_, lowest)| score < lowest) {
            best = Some((entry, score));
        }
    }
    best
}
