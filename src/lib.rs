//! Round-trip editors for shell-style and Xorg keyboard settings files.
//!
//! Legacy system settings live in small files that administrators also
//! edit by hand: shell-assignment files such as `/etc/conf.d/hostname`,
//! and the keyboard section of an Xorg conf.d file. The editors in this
//! crate change only the values they are asked to change and reproduce
//! every other byte of the file.
//!
//! # Quick start
//!
//! ## Edit a shell-assignment file
//!
//! ```
//! use settingsd_config::ShellConfig;
//!
//! let input = "# Set to the hostname of this machine\nhostname=\"localhost\"\n";
//! let mut doc = ShellConfig::from_source("/etc/conf.d/hostname", input).unwrap();
//! assert_eq!(doc.get("hostname"), Some("localhost"));
//! assert_eq!(doc.serialize(), input);
//!
//! doc.set("hostname", "box1", false);
//! assert_eq!(
//!     doc.serialize(),
//!     "# Set to the hostname of this machine\nhostname='box1'\n"
//! );
//! ```
//!
//! ## Convert between console and X11 keyboards
//!
//! ```
//! use settingsd_config::kbdmap::{find_best_by_x11, parse_map};
//!
//! let table = parse_map("de de pc105 - -\nus us pc105 - -\n").unwrap();
//! let (entry, score) = find_best_by_x11(&table, "us", "pc105", "", "").unwrap();
//! assert_eq!(entry.console_keymap, "us");
//! assert_eq!(score, 0);
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod config;
pub mod document;
pub mod fs;
pub mod kbdmap;
pub mod lexer;
pub mod quote;
pub mod settings;
pub mod token;
pub mod validate;
pub mod xorg;

use std::io;
use std::path::PathBuf;

pub use config::Config;
pub use document::{ShellConfig, Update, set_and_save, source_var, source_vars};
pub use kbdmap::{KeyboardMapEntry, MapError};
pub use lexer::{LexError, LexErrorKind, tokenize};
pub use quote::QuoteError;
pub use settings::{Authorizer, Caller, Settings};
pub use token::{Span, Token, TokenKind};
pub use xorg::{XkbOption, XkbSettings, XorgError, XorgErrorKind, XorgKeyboardConfig};

/// Unified error type for every file and settings operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("{}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    /// A shell-assignment file could not be tokenized.
    #[error("{}: {source}", path.display())]
    Shell { path: PathBuf, source: LexError },
    /// An Xorg config file has broken sections.
    #[error("{}: {source}", path.display())]
    Xorg { path: PathBuf, source: XorgError },
    /// The keyboard model map has a malformed line.
    #[error("{}: {source}", path.display())]
    KeyboardMap { path: PathBuf, source: MapError },
    /// The daemon configuration file is unusable.
    #[error("{}: {message}", path.display())]
    Config {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("settings are read-only")]
    ReadOnly,
    #[error("not authorized for {action}")]
    NotAuthorized { action: String },
}
