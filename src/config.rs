//! Daemon configuration: where each settings file lives.
//!
//! The configuration file is a key file with one `[settings]` group:
//!
//! ```text
//! [settings]
//! localefile=/etc/env.d/02locale
//! keymapfile=/etc/conf.d/keymaps
//! xkbdlayoutfile=/etc/X11/xorg.conf.d/30-keyboard.conf
//! ```
//!
//! Keys that are not given keep their compiled-in default.

use std::path::{Path, PathBuf};

use ini::Ini;
use serde::Deserialize;
use serde::de::value::{Error as DeError, MapDeserializer};

use crate::{Error, fs};

pub const DEFAULT_CONFIG_FILE: &str = "/etc/settingsd.conf";

const GROUP: &str = "settings";

const KEYS: [&str; 6] = [
    "localefile",
    "keymapfile",
    "xkbdlayoutfile",
    "kbdmodelmap",
    "hostnamefile",
    "machineinfofile",
];

/// The `[settings]` group as written in the file.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct SettingsGroup {
    localefile: PathBuf,
    keymapfile: PathBuf,
    xkbdlayoutfile: PathBuf,
    kbdmodelmap: PathBuf,
    hostnamefile: PathBuf,
    machineinfofile: PathBuf,
}

impl Default for SettingsGroup {
    fn default() -> Self {
        let config = Config::default();
        Self {
            localefile: config.locale_file,
            keymapfile: config.keymap_file,
            xkbdlayoutfile: config.xorg_keyboard_file,
            kbdmodelmap: config.keyboard_map_file,
            hostnamefile: config.hostname_file,
            machineinfofile: config.machine_info_file,
        }
    }
}

/// Paths of every file the settings layer reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub locale_file: PathBuf,
    pub keymap_file: PathBuf,
    pub xorg_keyboard_file: PathBuf,
    pub keyboard_map_file: PathBuf,
    pub hostname_file: PathBuf,
    pub machine_info_file: PathBuf,
    /// Kernel view of the running hostname. Not configurable.
    pub kernel_hostname_file: PathBuf,
    /// DMI chassis type, used to guess an icon name. Not configurable.
    pub chassis_type_file: PathBuf,
    /// Holds `clock="UTC"` or `clock="local"`. Not configurable.
    pub hwclock_file: PathBuf,
    /// Zone name, e.g. `Europe/Berlin`. Not configurable.
    pub timezone_file: PathBuf,
    /// Copy of the zone's data file. Not configurable.
    pub localtime_file: PathBuf,
    /// Where zone data files are looked up by name. Not configurable.
    pub zoneinfo_dir: PathBuf,
    /// Refuse every change.
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale_file: PathBuf::from("/etc/env.d/02locale"),
            keymap_file: PathBuf::from("/etc/conf.d/keymaps"),
            xorg_keyboard_file: PathBuf::from("/etc/X11/xorg.conf.d/30-keyboard.conf"),
            keyboard_map_file: PathBuf::from("/usr/share/settingsd/kbd-model-map"),
            hostname_file: PathBuf::from("/etc/conf.d/hostname"),
            machine_info_file: PathBuf::from("/etc/machine-info"),
            kernel_hostname_file: PathBuf::from("/proc/sys/kernel/hostname"),
            chassis_type_file: PathBuf::from("/sys/class/dmi/id/chassis_type"),
            hwclock_file: PathBuf::from("/etc/conf.d/hwclock"),
            timezone_file: PathBuf::from("/etc/timezone"),
            localtime_file: PathBuf::from("/etc/localtime"),
            zoneinfo_dir: PathBuf::from("/usr/share/zoneinfo"),
            read_only: false,
        }
    }
}

impl Config {
    /// Load the configuration at `path`, or the defaults if it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config`
    /// if it is malformed, lacks a `[settings]` group, or sets none of
    /// the known keys.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        match fs::read_optional(path)? {
            Some(source) => Self::from_source(path, &source),
            None => Ok(Self::default()),
        }
    }

    /// Like [`Config::load`], but a missing file is an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file does not exist, plus the errors
    /// of [`Config::load`].
    pub fn load_required(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let Some(source) = fs::read_optional(path)? else {
            return Err(config_error(path, None, "configuration file not found"));
        };
        Self::from_source(path, &source)
    }

    /// Parse key file contents read from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` as for [`Config::load`].
    pub fn from_source(path: impl AsRef<Path>, source: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let ini = Ini::load_from_str(source)
            .map_err(|e| config_error(path, Some(e.line), &e.msg))?;
        let Some(group) = ini.section(Some(GROUP)) else {
            return Err(config_error(path, None, "no [settings] group"));
        };
        if !group.iter().any(|(key, _)| KEYS.contains(&key)) {
            return Err(config_error(path, None, "no settings file configured"));
        }

        let files = SettingsGroup::deserialize(MapDeserializer::<_, DeError>::new(group.iter()))
            .map_err(|e| config_error(path, None, &e.to_string()))?;
        Ok(Self {
            locale_file: files.localefile,
            keymap_file: files.keymapfile,
            xorg_keyboard_file: files.xkbdlayoutfile,
            keyboard_map_file: files.kbdmodelmap,
            hostname_file: files.hostnamefile,
            machine_info_file: files.machineinfofile,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

fn config_error(path: &Path, line: Option<usize>, message: &str) -> Error {
    Error::Config {
        path: path.to_path_buf(),
        line,
        message: message.to_string(),
    }
}
