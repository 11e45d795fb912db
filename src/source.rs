//! Turning a locator into font bytes.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::ReadError;

/// Something that can hand over the complete contents of a font file.
///
/// Implementations buffer the whole resource; readers seek freely within
/// the returned bytes.
pub trait FontSource {
    fn open(&self, locator: &str) -> Result<Bytes, ReadError>;
}

/// Reads fonts from the local file system.
///
/// Relative locators are resolved against `base` when one is set, and
/// against the working directory otherwise. `file://` locators are accepted;
/// any other URL scheme is not supported.
#[derive(Clone, Debug, Default)]
pub struct FileSystemSource {
    base: Option<PathBuf>,
}

impl FileSystemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    /// The path `locator` refers to.
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, ReadError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(ReadError::InvalidArgument("empty font locator".into()));
        }
        let path = match locator.strip_prefix("file://") {
            Some(path) => path,
            None if locator.contains("://") => {
                return Err(ReadError::NotSupported("non-file font locators"));
            }
            None => locator,
        };
        let path = Path::new(path);
        Ok(match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl FontSource for FileSystemSource {
    fn open(&self, locator: &str) -> Result<Bytes, ReadError> {
        let path = self.resolve(locator)?;
        log::debug!("reading '{}'", path.display());
        std::fs::read(&path)
            .map(Bytes::from)
            .map_err(|source| ReadError::Io { path, source })
    }
}

/// In-memory fonts keyed by locator.
impl FontSource for std::collections::HashMap<String, Bytes> {
    fn open(&self, locator: &str) -> Result<Bytes, ReadError> {
        self.get(locator).cloned().ok_or_else(|| ReadError::Unreadable {
            source_name: locator.to_string(),
            reason: "no such font".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locators_resolve_against_the_base() {
        let source = FileSystemSource::with_base("/fonts");
        assert_eq!(source.resolve("a.ttf").unwrap(), Path::new("/fonts/a.ttf"));
        assert_eq!(source.resolve("/abs/b.otf").unwrap(), Path::new("/abs/b.otf"));
        assert_eq!(
            source.resolve("file:///abs/c.woff").unwrap(),
            Path::new("/abs/c.woff")
        );
        assert_eq!(FileSystemSource::new().resolve("d.ttf").unwrap(), Path::new("d.ttf"));
    }

    #[test]
    fn bad_locators_fail_before_io() {
        let source = FileSystemSource::new();
        assert!(matches!(source.resolve("  "), Err(ReadError::InvalidArgument(_))));
        assert!(matches!(
            source.open("https://example.com/a.ttf"),
            Err(ReadError::NotSupported(_))
        ));
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.bin"), b"abcd").unwrap();
        let source = FileSystemSource::with_base(dir.path());
        assert_eq!(source.open("x.bin").unwrap(), Bytes::from_static(b"abcd"));
        assert!(matches!(source.open("missing.bin"), Err(ReadError::Io { .. })));
    }

    #[test]
    fn in_memory_sources() {
        let mut fonts = std::collections::HashMap::new();
        fonts.insert("a".to_string(), Bytes::from_static(b"wOFF"));
        assert_eq!(fonts.open("a").unwrap().len(), 4);
        assert!(matches!(fonts.open("b"), Err(ReadError::Unreadable { .. })));
    }
}
