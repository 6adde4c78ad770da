//! Raw counter sources: text-attribute readers over sysfs-style files.
//!
//! Collectors never touch `std::fs` directly; they go through the
//! [`RawSource`] trait so tests can point the whole pipeline at a tempdir
//! tree. `write_text` exists for clear-on-read counters that reset via a
//! write-back.

use ks_common::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Abstract text-attribute reader/writer.
pub trait RawSource: Send + Sync {
    fn read_text(&self, path: &str) -> Result<String>;
    fn write_text(&self, path: &str, contents: &str) -> Result<()>;
}

/// [`RawSource`] over the real filesystem, rooted at a prefix.
///
/// With the default root `/` absolute paths resolve unchanged; tests root
/// the source at a tempdir and keep using production path strings.
#[derive(Debug, Clone)]
pub struct SysfsSource {
    root: PathBuf,
}

impl SysfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let relative = Path::new(path)
            .strip_prefix("/")
            .unwrap_or_else(|_| Path::new(path));
        self.root.join(relative)
    }
}

impl Default for SysfsSource {
    fn default() -> Self {
        Self::new("/")
    }
}

impl RawSource for SysfsSource {
    fn read_text(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.resolve(path))
            .map_err(|e| Error::source_unavailable(path, e))
    }

    fn write_text(&self, path: &str, contents: &str) -> Result<()> {
        fs::write(self.resolve(path), contents).map_err(|e| Error::SourceWriteFailed {
            path: path.to_string(),
            source: e,
        })
    }
}

/// Read a whole attribute file and parse it as a single integer.
///
/// Accepts an optional `0x` hex prefix, matching what kernel drivers
/// expose for some registers.
pub fn read_int(source: &dyn RawSource, path: &str) -> Result<i64> {
    let contents = source.read_text(path)?;
    parse_int(path, &contents)
}

fn parse_int(path: &str, contents: &str) -> Result<i64> {
    let trimmed = contents.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<i64>()
    };
    parsed.map_err(|_| Error::malformed(path, format!("expected integer, got {trimmed:?}")))
}

/// In-memory [`RawSource`] for unit tests across the crate.
#[cfg(test)]
pub(crate) mod fake {
    use super::RawSource;
    use ks_common::{Error, Result};
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MapSource {
        files: Mutex<HashMap<String, String>>,
    }

    impl MapSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, path: &str, contents: &str) -> Self {
            self.files
                .get_mut()
                .unwrap()
                .insert(path.to_string(), contents.to_string());
            self
        }

        pub fn set(&self, path: &str, contents: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), contents.to_string());
        }

        pub fn contents(&self, path: &str) -> Option<String> {
            self.files.lock().unwrap().get(path).cloned()
        }
    }

    impl RawSource for MapSource {
        fn read_text(&self, path: &str) -> Result<String> {
            self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
                Error::source_unavailable(path, io::Error::from(io::ErrorKind::NotFound))
            })
        }

        fn write_text(&self, path: &str, contents: &str) -> Result<()> {
            let mut files = self.files.lock().unwrap();
            if !files.contains_key(path) {
                return Err(Error::SourceWriteFailed {
                    path: path.to_string(),
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }
            files.insert(path.to_string(), contents.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> (TempDir, SysfsSource) {
        let dir = TempDir::new().unwrap();
        let source = SysfsSource::new(dir.path());
        (dir, source)
    }

    #[test]
    fn reads_through_root_prefix() {
        let (dir, source) = tree();
        let node = dir.path().join("sys/class/misc/counter");
        fs::create_dir_all(node.parent().unwrap()).unwrap();
        fs::write(&node, "42\n").unwrap();

        let text = source.read_text("/sys/class/misc/counter").unwrap();
        assert_eq!(text.trim(), "42");
        assert_eq!(read_int(&source, "/sys/class/misc/counter").unwrap(), 42);
    }

    #[test]
    fn missing_path_is_source_unavailable() {
        let (_dir, source) = tree();
        let err = source.read_text("/sys/absent").unwrap_err();
        assert_eq!(err.category(), ks_common::ErrorCategory::Source);
    }

    #[test]
    fn write_back_round_trips() {
        let (dir, source) = tree();
        let node = dir.path().join("reset");
        fs::write(&node, "7").unwrap();

        source.write_text("/reset", "0").unwrap();
        assert_eq!(fs::read_to_string(&node).unwrap(), "0");
    }

    #[test]
    fn parses_hex_and_decimal() {
        assert_eq!(parse_int("p", "0x1f\n").unwrap(), 31);
        assert_eq!(parse_int("p", " 17 ").unwrap(), 17);
        assert!(parse_int("p", "banana").is_err());
    }
}
