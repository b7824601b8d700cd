//! File access shared by every document type.
//!
//! Reads treat a missing file as "no content" rather than an error.
//! Writes are atomic: the new contents go to a temporary file in the
//! destination directory, which is synced and then renamed over the
//! destination, so readers see either the old file or the new one.

use std::fs;
use std::io::{self, Write as _};
use std::path::Path;

use crate::Error;

/// Mode given to files that did not exist before the first save.
pub const DEFAULT_MODE: u32 = 0o644;

/// Read `path` as UTF-8 text, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns `Error::Io` for any failure other than the file being absent,
/// including contents that are not valid UTF-8.
pub fn read_optional(path: &Path) -> Result<Option<String>, Error> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read `path` as raw bytes, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns `Error::Io` for any failure other than the file being absent.
pub fn read_bytes_optional(path: &Path) -> Result<Option<Vec<u8>>, Error> {
    match fs::read(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Atomically replace `path` with `contents`.
///
/// The permission bits of an existing destination are carried over;
/// a new file gets [`DEFAULT_MODE`]. On failure the temporary file is
/// removed and the destination is left untouched.
///
/// # Errors
///
/// Returns `Error::Io` if the temporary file cannot be created, written,
/// synced, or renamed into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let prefix = path
        .file_name()
        .map_or_else(|| ".tmp".to_string(), |name| format!(".{}.", name.to_string_lossy()));

    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(dir)
        .map_err(io_err)?;

    tmp.write_all(contents).map_err(io_err)?;
    set_mode(tmp.as_file(), path).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &fs::File, destination: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt as _;

    let mode = match fs::metadata(destination) {
        Ok(meta) => meta.permissions().mode() & 0o7777,
        Err(err) if err.kind() == io::ErrorKind::NotFound => DEFAULT_MODE,
        Err(err) => return Err(err),
    };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _destination: &Path) -> io::Result<()> {
    Ok(())
}
