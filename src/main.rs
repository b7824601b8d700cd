//! CLI tool to inspect and edit settings files without disturbing their
//! formatting.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use settingsd_config::config::{Config, DEFAULT_CONFIG_FILE};
use settingsd_config::settings::AllowAll;
use settingsd_config::{
    Caller, Error, Settings, ShellConfig, XkbSettings, XorgKeyboardConfig, kbdmap,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "settingsctl", version, about = "Edit system settings files in place")]
struct Cli {
    /// Enable debug messages
    #[arg(long, global = true)]
    debug: bool,

    /// Settings daemon configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Read settings but refuse to change them
    #[arg(long, global = true)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the value of a variable in a shell-assignment file
    Get { file: PathBuf, name: String },
    /// Set a variable in a shell-assignment file
    Set {
        file: PathBuf,
        name: String,
        value: String,
        /// Fail instead of appending when the variable is not assigned
        #[arg(long)]
        no_add: bool,
    },
    /// Remove every assignment of a variable
    Unset { file: PathBuf, name: String },
    /// Check that shell-assignment files parse and round-trip exactly
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the XKB options of an Xorg keyboard file
    Xkb { file: PathBuf },
    /// Change XKB options in an Xorg keyboard file; an empty value removes one
    XkbSet {
        file: PathBuf,
        #[command(flatten)]
        xkb: XkbArgs,
    },
    /// Find the X11 settings for a console keymap
    ToX11 {
        #[arg(long, value_name = "FILE")]
        map: PathBuf,
        keymap: String,
    },
    /// Find the console keymap closest to X11 settings
    ToConsole {
        #[arg(long, value_name = "FILE")]
        map: PathBuf,
        #[arg(long)]
        layout: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long, default_value = "")]
        variant: String,
        #[arg(long, default_value = "")]
        options: String,
    },
    /// Print locale, keyboard, hostname, and clock settings
    Status,
    /// Replace the system locale, e.g. `LANG=de_DE.UTF-8`
    SetLocale { entries: Vec<String> },
    /// Set the console keymap
    SetKeymap {
        keymap: String,
        /// Also update the X11 keyboard settings
        #[arg(long)]
        convert: bool,
    },
    /// Set the X11 keyboard
    SetX11Keyboard {
        #[command(flatten)]
        xkb: XkbArgs,
        /// Also update the console keymap
        #[arg(long)]
        convert: bool,
    },
    /// Set the static hostname
    SetHostname { name: String },
    /// Set the pretty hostname
    SetPrettyHostname { name: String },
    /// Set the icon name
    SetIconName { name: String },
    /// Set the timezone, e.g. `Europe/Berlin`
    SetTimezone { name: String },
    /// Choose whether the hardware clock keeps local time or UTC
    SetLocalRtc {
        #[arg(action = clap::ArgAction::Set)]
        local: bool,
    },
}

#[derive(Args, Debug)]
struct XkbArgs {
    #[arg(long)]
    layout: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    variant: Option<String>,
    #[arg(long)]
    options: Option<String>,
}

impl From<XkbArgs> for XkbSettings {
    fn from(args: XkbArgs) -> Self {
        Self {
            layout: args.layout,
            model: args.model,
            variant: args.variant,
            options: args.options,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr at `info`, or `debug` with `--debug`; `RUST_LOG` wins.
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Returns `Ok(false)` when the command ran but found a problem.
fn run(cli: Cli) -> Result<bool, Error> {
    let Cli {
        config,
        read_only,
        command,
        ..
    } = cli;
    let open = || open_settings(config.as_deref(), read_only);
    let caller = Caller::new(whoami());

    match command {
        Command::Get { file, name } => {
            let doc = ShellConfig::parse(&file)?;
            match doc.get(&name) {
                Some(value) => {
                    println!("{value}");
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Command::Set {
            file,
            name,
            value,
            no_add,
        } => {
            let mut doc = ShellConfig::parse(&file)?;
            if !doc.set(&name, &value, !no_add) {
                eprintln!("{}: {name} is not set", file.display());
                return Ok(false);
            }
            doc.save()?;
            Ok(true)
        }
        Command::Unset { file, name } => {
            let mut doc = ShellConfig::parse(&file)?;
            doc.clear(&name);
            doc.save()?;
            Ok(true)
        }
        Command::Check { files } => Ok(files.iter().fold(true, |ok, path| check(path) && ok)),
        Command::Xkb { file } => {
            print_xkb(&XorgKeyboardConfig::parse(&file)?.get_xkb());
            Ok(true)
        }
        Command::XkbSet { file, xkb } => {
            let mut doc = XorgKeyboardConfig::parse(&file)?;
            doc.set_xkb(&xkb.into())?;
            doc.save()?;
            Ok(true)
        }
        Command::ToX11 { map, keymap } => {
            let entries = kbdmap::load(&map)?;
            let Some(entry) = kbdmap::find_by_console_keymap(&entries, &keymap) else {
                eprintln!("{}: no entry for console keymap '{keymap}'", map.display());
                return Ok(false);
            };
            print_xkb(&entry.xkb_settings());
            Ok(true)
        }
        Command::ToConsole {
            map,
            layout,
            model,
            variant,
            options,
        } => {
            let entries = kbdmap::load(&map)?;
            let best = kbdmap::find_best_by_x11(&entries, &layout, &model, &variant, &options);
            let Some((entry, score)) = best else {
                eprintln!("{}: no entry for X11 layout '{layout}'", map.display());
                return Ok(false);
            };
            tracing::debug!(score, "best console keymap match");
            println!("{}", entry.console_keymap);
            Ok(true)
        }
        Command::Status => {
            let settings = open()?;
            for entry in settings.locale()? {
                println!("locale: {entry}");
            }
            if let Some(keymap) = settings.vconsole_keymap()? {
                println!("keymap: {keymap}");
            }
            print_xkb(&settings.x11_keyboard()?);
            println!("static hostname: {}", settings.static_hostname()?);
            println!("pretty hostname: {}", settings.pretty_hostname()?);
            println!("icon name: {}", settings.icon_name()?);
            println!("timezone: {}", settings.timezone()?);
            println!("RTC in local time: {}", settings.local_rtc()?);
            Ok(true)
        }
        Command::SetLocale { entries } => {
            for entry in open()?.set_locale(&caller, &entries)? {
                println!("{entry}");
            }
            Ok(true)
        }
        Command::SetKeymap { keymap, convert } => {
            open()?.set_vconsole_keyboard(&caller, &keymap, convert)?;
            Ok(true)
        }
        Command::SetX11Keyboard { xkb, convert } => {
            open()?.set_x11_keyboard(&caller, &xkb.into(), convert)?;
            Ok(true)
        }
        Command::SetHostname { name } => {
            println!("{}", open()?.set_static_hostname(&caller, &name)?);
            Ok(true)
        }
        Command::SetPrettyHostname { name } => {
            open()?.set_pretty_hostname(&caller, &name)?;
            Ok(true)
        }
        Command::SetIconName { name } => {
            open()?.set_icon_name(&caller, &name)?;
            Ok(true)
        }
        Command::SetTimezone { name } => {
            open()?.set_timezone(&caller, &name)?;
            Ok(true)
        }
        Command::SetLocalRtc { local } => {
            open()?.set_local_rtc(&caller, local)?;
            Ok(true)
        }
    }
}

fn open_settings(path: Option<&Path>, read_only: bool) -> Result<Settings<AllowAll>, Error> {
    let config = match path {
        Some(path) => Config::load_required(path)?,
        None => Config::load(DEFAULT_CONFIG_FILE)?,
    };
    Ok(Settings::new(config.read_only(read_only), AllowAll))
}

fn check(path: &Path) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return false;
        }
    };
    match ShellConfig::from_source(path, &content) {
        Ok(doc) if doc.serialize() == content => {
            let names = doc
                .tokens()
                .iter()
                .filter(|t| matches!(t.kind, settingsd_config::TokenKind::Assignment { .. }))
                .count();
            eprintln!("{}: valid ({names} assignment(s))", path.display());
            true
        }
        Ok(_) => {
            eprintln!("{}: does not round-trip", path.display());
            false
        }
        Err(e) => {
            eprintln!("{e}");
            false
        }
    }
}

fn print_xkb(xkb: &XkbSettings) {
    for (label, value) in [
        ("layout", &xkb.layout),
        ("model", &xkb.model),
        ("variant", &xkb.variant),
        ("options", &xkb.options),
    ] {
        if let Some(value) = value {
            println!("{label}: {value}");
        }
    }
}

fn whoami() -> String {
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}
