//! Entry points: read one container by locator, or every container in a
//! directory.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::ReadError;
use crate::source::{FileSystemSource, FontSource};
use crate::typeface::{FontFormat, TypefaceFont, TypefaceInfo, TypefaceReference};
use crate::version::try_detect_version;

/// Options for [`TypefaceReader::scan_directory`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// File name patterns separated by `|`, e.g. `*.ttf|*.otf`. Blank
    /// matches every file.
    pub pattern: String,
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Report unreadable files as [`TypefaceInfo::unknown`] entries instead
    /// of stopping at the first one.
    pub capture_errors: bool,
}

impl DirectoryScan {
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn capture_errors(mut self, capture: bool) -> Self {
        self.capture_errors = capture;
        self
    }

    fn patterns(&self) -> Result<Vec<Pattern>, ReadError> {
        self.pattern
            .split('|')
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
            .map(|pattern| Pattern::new(pattern).map_err(ReadError::from))
            .collect()
    }
}

/// Describe every face in `data`, choosing the reader from its magic number.
pub fn read_info_from_bytes(data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
    let Some(reader) = try_detect_version(data) else {
        return Err(ReadError::UnsupportedFormat(format!(
            "'{label}' is not a recognised font container"
        )));
    };
    reader.read_info(data, label)
}

/// Fully decode the face of `data` matching `target`, or its first face.
pub fn read_font_from_bytes(
    data: &Bytes,
    target: Option<&TypefaceReference>,
    label: &str,
) -> Result<TypefaceFont, ReadError> {
    let Some(reader) = try_detect_version(data) else {
        return Err(ReadError::UnsupportedFormat(format!(
            "'{label}' is not a recognised font container"
        )));
    };
    reader.read_full(data, target, label)
}

/// Reads typefaces through a [`FontSource`].
#[derive(Clone, Debug, Default)]
pub struct TypefaceReader<S = FileSystemSource> {
    source: S,
}

impl TypefaceReader<FileSystemSource> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: FontSource> TypefaceReader<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn read_info(&self, locator: &str) -> Result<TypefaceInfo, ReadError> {
        let data = self.source.open(locator)?;
        read_info_from_bytes(&data, locator)
    }

    /// Like [`read_info`](Self::read_info), but a failure is returned as
    /// [`TypefaceInfo::unknown`] carrying the error message.
    pub fn try_read_info(&self, locator: &str) -> TypefaceInfo {
        self.read_info(locator).unwrap_or_else(|err| {
            log::warn!("could not read '{locator}': {err}");
            TypefaceInfo::unknown(locator, FontFormat::Unknown, err.to_string())
        })
    }

    pub fn read_font(
        &self,
        locator: &str,
        target: Option<&TypefaceReference>,
    ) -> Result<TypefaceFont, ReadError> {
        let data = self.source.open(locator)?;
        read_font_from_bytes(&data, target, locator)
    }

    pub fn try_read_font(
        &self,
        locator: &str,
        target: Option<&TypefaceReference>,
    ) -> Option<TypefaceFont> {
        self.read_font(locator, target)
            .inspect_err(|err| log::warn!("could not read '{locator}': {err}"))
            .ok()
    }

    /// Describe the files of `dir` one at a time, in file name order.
    ///
    /// Files are read straight from disk whatever the reader's source.
    /// Without `capture_errors` the iterator ends after yielding the first
    /// error.
    pub fn scan_directory(
        &self,
        dir: impl AsRef<Path>,
        scan: &DirectoryScan,
    ) -> Result<DirectoryScanIter, ReadError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(ReadError::InvalidArgument("empty directory path".into()));
        }
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(if scan.recurse { usize::MAX } else { 1 })
            .sort_by_file_name();
        Ok(DirectoryScanIter {
            walker: walker.into_iter(),
            patterns: scan.patterns()?,
            capture_errors: scan.capture_errors,
            finished: false,
        })
    }

    /// [`scan_directory`](Self::scan_directory), collected.
    pub fn read_directory_info(
        &self,
        dir: impl AsRef<Path>,
        scan: &DirectoryScan,
    ) -> Result<Vec<TypefaceInfo>, ReadError> {
        self.scan_directory(dir, scan)?.collect()
    }

    pub fn try_read_directory_info(
        &self,
        dir: impl AsRef<Path>,
        scan: &DirectoryScan,
    ) -> Option<Vec<TypefaceInfo>> {
        let dir = dir.as_ref();
        self.read_directory_info(dir, scan)
            .inspect_err(|err| log::warn!("could not scan '{}': {err}", dir.display()))
            .ok()
    }
}

/// Iterator returned by [`TypefaceReader::scan_directory`].
pub struct DirectoryScanIter {
    walker: walkdir::IntoIter,
    patterns: Vec<Pattern>,
    capture_errors: bool,
    finished: bool,
}

impl DirectoryScanIter {
    fn wanted(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(name, options))
    }

    fn fail(&mut self, label: String, err: ReadError) -> Option<Result<TypefaceInfo, ReadError>> {
        if self.capture_errors {
            log::warn!("skipping '{label}': {err}");
            Some(Ok(TypefaceInfo::unknown(label, FontFormat::Unknown, err.to_string())))
        } else {
            self.finished = true;
            Some(Err(err))
        }
    }
}

fn read_file_info(path: PathBuf) -> Result<TypefaceInfo, ReadError> {
    let label = path.display().to_string();
    let data = std::fs::read(&path)
        .map(Bytes::from)
        .map_err(|source| ReadError::Io { path, source })?;
    read_info_from_bytes(&data, &label)
}

impl Iterator for DirectoryScanIter {
    type Item = Result<TypefaceInfo, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let label = err
                        .path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default();
                    return self.fail(label, err.into());
                }
            };
            if !entry.file_type().is_file() || !self.wanted(entry.path()) {
                continue;
            }
            let path = entry.into_path();
            let label = path.display().to_string();
            return match read_file_info(path) {
                Ok(info) => Some(Ok(info)),
                Err(err) => self.fail(label, err),
            };
        }
    }
}
