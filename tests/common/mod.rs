#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use settingsd_config::{ShellConfig, XorgKeyboardConfig};
use tempfile::TempDir;

/// Parse `input` as a shell-assignment file and assert it serializes back
/// unchanged.
pub fn roundtrip(input: &str) {
    let doc = ShellConfig::from_source("/test/conf", input).expect("parse failed");
    let output = doc.serialize();
    assert_eq!(
        output, input,
        "round-trip mismatch:\n--- expected ---\n{input}\n--- got ---\n{output}"
    );
}

/// Same as [`roundtrip`] for Xorg keyboard files, which always end in a
/// newline.
pub fn xorg_roundtrip(input: &str) {
    let doc = XorgKeyboardConfig::from_source("/test/30-keyboard.conf", input)
        .expect("parse failed");
    let output = doc.serialize();
    assert_eq!(
        output, input,
        "round-trip mismatch:\n--- expected ---\n{input}\n--- got ---\n{output}"
    );
}

/// A temporary directory with helpers to seed and read files in it.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `contents` to `name`, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("seed directory");
        }
        fs::write(&path, contents).expect("seed file");
        path
    }

    pub fn read(&self, name: &str) -> String {
        read(&self.path(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    /// Names of every entry in the directory, sorted.
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("{}: {e}", path.display()))
}
