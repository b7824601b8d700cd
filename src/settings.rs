//! Locale, keyboard, hostname, and clock settings on top of the file
//! editors.
//!
//! Each backing file has its own lock, and every read-modify-write of a
//! file happens with that lock held. Keyboard conversion touches both the
//! keymap file and the Xorg file; it always takes the keymap lock first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::Config;
use crate::document::{ShellConfig, Update, set_and_save, source_var, source_vars};
use crate::kbdmap::{self, KeyboardMapEntry};
use crate::quote::unquote;
use crate::validate::{
    LOCALE_VARIABLES, hostname_is_valid, locale_name_is_valid, timezone_is_valid,
};
use crate::xorg::{XkbSettings, XorgKeyboardConfig};
use crate::{Error, fs};

pub const ACTION_SET_LOCALE: &str = "org.freedesktop.locale1.set-locale";
pub const ACTION_SET_KEYBOARD: &str = "org.freedesktop.locale1.set-keyboard";
pub const ACTION_SET_HOSTNAME: &str = "org.freedesktop.hostname1.set-hostname";
pub const ACTION_SET_STATIC_HOSTNAME: &str = "org.freedesktop.hostname1.set-static-hostname";
pub const ACTION_SET_MACHINE_INFO: &str = "org.freedesktop.hostname1.set-machine-info";
pub const ACTION_SET_TIMEZONE: &str = "org.freedesktop.timedate1.set-timezone";
pub const ACTION_SET_LOCAL_RTC: &str = "org.freedesktop.timedate1.set-local-rtc";

/// Written to a locale file that is absent or empty before the first save.
pub const LOCALE_HEADER: &str =
    "# Configuration file for eselect\n# This file has been automatically generated\n";

/// Decides whether a caller may perform an action.
pub trait Authorizer {
    /// Returns `Ok(false)` to deny. `allow_interaction` says whether the
    /// caller is willing to answer an authentication prompt.
    fn authorize(&self, subject: &str, action: &str, allow_interaction: bool)
    -> Result<bool, Error>;
}

/// Allows every action; file permissions are the only check.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(
        &self,
        _subject: &str,
        _action: &str,
        _allow_interaction: bool,
    ) -> Result<bool, Error> {
        Ok(true)
    }
}

/// Who is asking for a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
    pub allow_interaction: bool,
}

impl Caller {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            allow_interaction: false,
        }
    }

    #[must_use]
    pub const fn interactive(mut self, allow_interaction: bool) -> Self {
        self.allow_interaction = allow_interaction;
        self
    }
}

#[derive(Debug, Default)]
struct Locks {
    hostname: Mutex<()>,
    static_hostname: Mutex<()>,
    machine_info: Mutex<()>,
    locale: Mutex<()>,
    keymap: Mutex<()>,
    xorg: Mutex<()>,
    clock: Mutex<()>,
}

fn lock(mutex: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The guarded data is `()`, so a poisoned lock is still usable.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Settings service over the files named in a [`Config`].
#[derive(Debug)]
pub struct Settings<A> {
    config: Config,
    authorizer: A,
    locks: Locks,
}

impl<A: Authorizer> Settings<A> {
    #[must_use]
    pub fn new(config: Config, authorizer: A) -> Self {
        Self {
            config,
            authorizer,
            locks: Locks::default(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    fn check(&self, caller: &Caller, action: &str) -> Result<(), Error> {
        if self.config.read_only {
            return Err(Error::ReadOnly);
        }
        if self
            .authorizer
            .authorize(&caller.subject, action, caller.allow_interaction)?
        {
            Ok(())
        } else {
            tracing::info!(subject = %caller.subject, action, "not authorized");
            Err(Error::NotAuthorized {
                action: action.to_string(),
            })
        }
    }

    // ---- locale ----

    /// The locale as `NAME=value` entries, for each variable that is set.
    pub fn locale(&self) -> Result<Vec<String>, Error> {
        let _guard = lock(&self.locks.locale);
        let values = source_vars(&self.config.locale_file, &LOCALE_VARIABLES)?;
        Ok(format_locale(&values))
    }

    /// Replace the locale with `entries`, each `NAME=value`.
    ///
    /// Variables not mentioned are removed from the file. Returns the new
    /// locale in the form of [`Settings::locale`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an unknown variable or a value
    /// that is not a plain locale name, plus authorization and file errors.
    pub fn set_locale<S: AsRef<str>>(
        &self,
        caller: &Caller,
        entries: &[S],
    ) -> Result<Vec<String>, Error> {
        self.check(caller, ACTION_SET_LOCALE)?;
        let _guard = lock(&self.locks.locale);

        let mut values: [Option<String>; LOCALE_VARIABLES.len()] = Default::default();
        for entry in entries {
            let entry = entry.as_ref();
            let (index, value) = parse_locale_entry(entry).ok_or_else(|| {
                Error::InvalidArgument(format!("invalid locale variable name or value: {entry:?}"))
            })?;
            values[index] = Some(value);
        }

        let path = &self.config.locale_file;
        let mut doc = ShellConfig::parse(path)?;
        if doc.is_empty() {
            doc = ShellConfig::from_source(path, LOCALE_HEADER)?;
        }
        for (name, value) in LOCALE_VARIABLES.iter().zip(&values) {
            match value {
                Some(value) => {
                    doc.set(name, value, true);
                }
                None => doc.clear(name),
            }
        }
        doc.save()?;
        tracing::debug!(path = %path.display(), "locale saved");

        Ok(format_locale(&values))
    }

    // ---- keyboard ----

    /// The console keymap, if one is configured.
    pub fn vconsole_keymap(&self) -> Result<Option<String>, Error> {
        let _guard = lock(&self.locks.keymap);
        source_var(&self.config.keymap_file, "keymap")
    }

    /// The X11 keyboard settings.
    pub fn x11_keyboard(&self) -> Result<XkbSettings, Error> {
        let _guard = lock(&self.locks.xorg);
        Ok(XorgKeyboardConfig::parse(&self.config.xorg_keyboard_file)?.get_xkb())
    }

    /// Set the console keymap.
    ///
    /// With `convert`, the X11 settings are also rewritten from the first
    /// table entry for `keymap`, unless they already match it exactly.
    pub fn set_vconsole_keyboard(
        &self,
        caller: &Caller,
        keymap: &str,
        convert: bool,
    ) -> Result<(), Error> {
        self.check(caller, ACTION_SET_KEYBOARD)?;
        let _keymap_guard = lock(&self.locks.keymap);
        let _xorg_guard = convert.then(|| lock(&self.locks.xorg));

        let entry = if convert {
            let entries = kbdmap::load(&self.config.keyboard_map_file)?;
            kbdmap::find_by_console_keymap(&entries, keymap).cloned()
        } else {
            None
        };

        set_and_save(&self.config.keymap_file, &[Update::new("keymap", keymap)])?;
        tracing::debug!(path = %self.config.keymap_file.display(), keymap, "console keymap saved");

        if !convert {
            return Ok(());
        }
        let Some(entry) = entry else {
            tracing::warn!(
                "no conversion entry for console keymap '{}' in {}",
                keymap,
                self.config.keyboard_map_file.display()
            );
            return Ok(());
        };

        let mut xorg = XorgKeyboardConfig::parse(&self.config.xorg_keyboard_file)?;
        if score_against(&entry, &xorg.get_xkb()) > 0 {
            xorg.set_xkb(&entry.xkb_settings())?;
            xorg.save()?;
            tracing::debug!(
                path = %self.config.xorg_keyboard_file.display(),
                layout = %entry.x11_layout,
                "X11 keyboard converted from console keymap"
            );
        }
        Ok(())
    }

    /// Write X11 keyboard settings; see [`XorgKeyboardConfig::set_xkb`].
    ///
    /// With `convert`, the console keymap is also set from the table entry
    /// closest to the resulting settings, including fields left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for a value containing `"` or a
    /// line break, plus authorization and file errors.
    pub fn set_x11_keyboard(
        &self,
        caller: &Caller,
        settings: &XkbSettings,
        convert: bool,
    ) -> Result<(), Error> {
        self.check(caller, ACTION_SET_KEYBOARD)?;
        let _keymap_guard = convert.then(|| lock(&self.locks.keymap));
        let _xorg_guard = lock(&self.locks.xorg);

        let entries = if convert {
            kbdmap::load(&self.config.keyboard_map_file)?
        } else {
            Vec::new()
        };

        let mut xorg = XorgKeyboardConfig::parse(&self.config.xorg_keyboard_file)?;
        xorg.set_xkb(settings)?;
        xorg.save()?;
        tracing::debug!(path = %self.config.xorg_keyboard_file.display(), "X11 keyboard saved");

        if !convert {
            return Ok(());
        }
        let current = xorg.get_xkb();
        let best = kbdmap::find_best_by_x11(
            &entries,
            field(current.layout.as_ref()),
            field(current.model.as_ref()),
            field(current.variant.as_ref()),
            field(current.options.as_ref()),
        );
        let Some((entry, _)) = best else {
            tracing::warn!(
                "no conversion entry for X11 layout '{}' in {}",
                field(current.layout.as_ref()),
                self.config.keyboard_map_file.display()
            );
            return Ok(());
        };

        set_and_save(
            &self.config.keymap_file,
            &[Update::new("keymap", &entry.console_keymap)],
        )?;
        tracing::debug!(keymap = %entry.console_keymap, "console keymap converted from X11 layout");
        Ok(())
    }

    // ---- hostname ----

    /// The running system's hostname.
    pub fn hostname(&self) -> Result<String, Error> {
        let _guard = lock(&self.locks.hostname);
        self.read_kernel_hostname()
    }

    /// Set the running system's hostname.
    ///
    /// An invalid name is replaced by the current hostname, or by
    /// `localhost` if that is invalid too. Returns the name set.
    pub fn set_hostname(&self, caller: &Caller, name: &str) -> Result<String, Error> {
        self.check(caller, ACTION_SET_HOSTNAME)?;
        let _guard = lock(&self.locks.hostname);

        let name = if hostname_is_valid(name) {
            name.to_string()
        } else {
            let current = self.read_kernel_hostname()?;
            if hostname_is_valid(&current) {
                current
            } else {
                "localhost".to_string()
            }
        };

        let path = &self.config.kernel_hostname_file;
        std::fs::write(path, name.as_bytes()).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        tracing::info!(hostname = %name, "hostname set");
        Ok(name)
    }

    fn read_kernel_hostname(&self) -> Result<String, Error> {
        Ok(fs::read_optional(&self.config.kernel_hostname_file)?
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default())
    }

    /// The configured hostname: `hostname`, else `HOSTNAME`, else
    /// `localhost`.
    pub fn static_hostname(&self) -> Result<String, Error> {
        let _guard = lock(&self.locks.static_hostname);
        let doc = ShellConfig::parse(&self.config.hostname_file)?;
        Ok(doc
            .get("hostname")
            .or_else(|| doc.get("HOSTNAME"))
            .unwrap_or("localhost")
            .to_string())
    }

    /// Set the configured hostname. An invalid name is saved as
    /// `localhost`. Returns the name saved.
    pub fn set_static_hostname(&self, caller: &Caller, name: &str) -> Result<String, Error> {
        self.check(caller, ACTION_SET_STATIC_HOSTNAME)?;
        let _guard = lock(&self.locks.static_hostname);

        let name = if hostname_is_valid(name) { name } else { "localhost" };
        set_and_save(
            &self.config.hostname_file,
            &[Update::new("hostname", name).or_alias("HOSTNAME")],
        )?;
        tracing::info!(hostname = name, "static hostname saved");
        Ok(name.to_string())
    }

    /// `PRETTY_HOSTNAME` from machine-info, or empty.
    pub fn pretty_hostname(&self) -> Result<String, Error> {
        self.machine_info("PRETTY_HOSTNAME")
    }

    pub fn set_pretty_hostname(&self, caller: &Caller, name: &str) -> Result<(), Error> {
        self.set_machine_info(caller, "PRETTY_HOSTNAME", name)
    }

    /// `ICON_NAME` from machine-info, or a name guessed from the chassis
    /// type.
    pub fn icon_name(&self) -> Result<String, Error> {
        let icon = self.machine_info("ICON_NAME")?;
        if !icon.is_empty() {
            return Ok(icon);
        }
        let chassis = fs::read_optional(&self.config.chassis_type_file).unwrap_or_else(|err| {
            tracing::debug!("{err}");
            None
        });
        Ok(guess_icon_name(chassis.as_deref()).to_string())
    }

    pub fn set_icon_name(&self, caller: &Caller, name: &str) -> Result<(), Error> {
        self.set_machine_info(caller, "ICON_NAME", name)
    }

    fn machine_info(&self, name: &str) -> Result<String, Error> {
        let _guard = lock(&self.locks.machine_info);
        Ok(source_var(&self.config.machine_info_file, name)?.unwrap_or_default())
    }

    fn set_machine_info(&self, caller: &Caller, name: &str, value: &str) -> Result<(), Error> {
        self.check(caller, ACTION_SET_MACHINE_INFO)?;
        let _guard = lock(&self.locks.machine_info);
        set_and_save(&self.config.machine_info_file, &[Update::new(name, value)])?;
        tracing::info!(variable = name, value, "machine info saved");
        Ok(())
    }

    // ---- clock ----

    /// The configured timezone name, or empty if none is set.
    ///
    /// A warning is logged when the local time file no longer matches the
    /// zone's data file.
    pub fn timezone(&self) -> Result<String, Error> {
        let _guard = lock(&self.locks.clock);
        let name = fs::read_optional(&self.config.timezone_file)?
            .and_then(|s| s.lines().next().map(|line| line.trim().to_string()))
            .unwrap_or_default();

        if timezone_is_valid(&name) {
            let zone = self.config.zoneinfo_dir.join(&name);
            let localtime = fs::read_bytes_optional(&self.config.localtime_file)?;
            if localtime.is_none() || localtime != fs::read_bytes_optional(&zone)? {
                tracing::warn!(
                    "{} and {} differ; {} may be out of sync with {}",
                    self.config.localtime_file.display(),
                    zone.display(),
                    self.config.localtime_file.display(),
                    self.config.timezone_file.display()
                );
            }
        }
        Ok(name)
    }

    /// Set the timezone: write its name and copy its zone data over the
    /// local time file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for a malformed name or one with no
    /// zone data, plus authorization and file errors. Nothing is written
    /// in either case.
    pub fn set_timezone(&self, caller: &Caller, name: &str) -> Result<(), Error> {
        self.check(caller, ACTION_SET_TIMEZONE)?;
        if !timezone_is_valid(name) {
            return Err(Error::InvalidArgument(format!("invalid timezone: {name:?}")));
        }
        let _guard = lock(&self.locks.clock);

        let zone = self.config.zoneinfo_dir.join(name);
        let Some(data) = fs::read_bytes_optional(&zone)? else {
            return Err(Error::InvalidArgument(format!("unknown timezone: {name:?}")));
        };
        fs::write_atomic(&self.config.timezone_file, format!("{name}\n").as_bytes())?;
        fs::write_atomic(&self.config.localtime_file, &data)?;
        tracing::info!(timezone = name, "timezone set");
        Ok(())
    }

    /// Whether the hardware clock keeps local time rather than UTC.
    pub fn local_rtc(&self) -> Result<bool, Error> {
        let _guard = lock(&self.locks.clock);
        Ok(source_var(&self.config.hwclock_file, "clock")?.as_deref() == Some("local"))
    }

    /// Record whether the hardware clock keeps local time.
    ///
    /// UTC is the default, so an unset `clock` stays unset when `local`
    /// is false.
    pub fn set_local_rtc(&self, caller: &Caller, local: bool) -> Result<(), Error> {
        self.check(caller, ACTION_SET_LOCAL_RTC)?;
        let _guard = lock(&self.locks.clock);

        let path = &self.config.hwclock_file;
        if local || source_var(path, "clock")?.is_some() {
            let clock = if local { "local" } else { "UTC" };
            set_and_save(path, &[Update::new("clock", clock)])?;
            tracing::info!(clock, "hardware clock mode saved");
        }
        Ok(())
    }
}

/// Icon name for a DMI chassis type (SMBIOS 2.7.1, section 7.4.1).
#[must_use]
pub fn guess_icon_name(chassis_type: Option<&str>) -> &'static str {
    let Some(kind) = chassis_type.and_then(|s| s.trim().parse::<u32>().ok()) else {
        return "computer";
    };
    match kind {
        0x3..=0x7 => "computer-desktop",
        0x9 | 0xA | 0xE => "computer-laptop",
        0x11 | 0x17 | 0x1C | 0x1D => "computer-server",
        _ => "computer",
    }
}

/// Split `NAME=value`, returning the index of NAME in
/// [`LOCALE_VARIABLES`] and the unquoted value.
fn parse_locale_entry(entry: &str) -> Option<(usize, String)> {
    let (name, raw) = entry.split_once('=')?;
    let index = LOCALE_VARIABLES.iter().position(|v| *v == name)?;
    let value = unquote(raw).ok()?;
    locale_name_is_valid(&value).then_some((index, value))
}

fn format_locale(values: &[Option<String>]) -> Vec<String> {
    LOCALE_VARIABLES
        .iter()
        .zip(values)
        .filter_map(|(name, value)| value.as_ref().map(|v| format!("{name}={v}")))
        .collect()
}

fn field(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

fn score_against(entry: &KeyboardMapEntry, current: &XkbSettings) -> u32 {
    entry.x11_score(
        field(current.layout.as_ref()),
        field(current.model.as_ref()),
        field(current.variant.as_ref()),
        field(current.options.as_ref()),
    )
}
