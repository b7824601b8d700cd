//! Checks applied to values before they are written to settings files.

/// Longest static hostname accepted, as `HOST_NAME_MAX` on Linux.
pub const HOST_NAME_MAX: usize = 64;

/// Locale variables kept in the locale file, in the order they are written.
pub const LOCALE_VARIABLES: [&str; 13] = [
    "LANG",
    "LC_CTYPE",
    "LC_NUMERIC",
    "LC_TIME",
    "LC_COLLATE",
    "LC_MONETARY",
    "LC_MESSAGES",
    "LC_PAPER",
    "LC_NAME",
    "LC_ADDRESS",
    "LC_TELEPHONE",
    "LC_MEASUREMENT",
    "LC_IDENTIFICATION",
];

/// Whether `name` is 1 to [`HOST_NAME_MAX`] characters from
/// `[A-Za-z0-9_.-]`.
///
/// ```
/// use settingsd_config::validate::hostname_is_valid;
///
/// assert!(hostname_is_valid("build-01.example"));
/// assert!(!hostname_is_valid(""));
/// assert!(!hostname_is_valid("two words"));
/// ```
#[must_use]
pub fn hostname_is_valid(name: &str) -> bool {
    (1..=HOST_NAME_MAX).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Whether `name` uses only `[A-Za-z0-9_.@-]`. The empty name is valid.
#[must_use]
pub fn locale_name_is_valid(name: &str) -> bool {
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'@' | b'-'))
}

/// Whether `name` looks like a zoneinfo name such as `Europe/Berlin`:
/// relative, made of `[A-Za-z0-9_+-]` components joined by `/`.
#[must_use]
pub fn timezone_is_valid(name: &str) -> bool {
    !name.is_empty()
        && name.split('/').all(|part| {
            !part.is_empty()
                && part != "."
                && part != ".."
                && part
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-' | b'.'))
        })
}
