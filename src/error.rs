use std::path::PathBuf;

use font_types::Tag;

/// Errors produced while reading font containers or measuring text.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("attempted to read past the end of the font data")]
    OutOfBounds,

    #[error("malformed font data: {0}")]
    Malformed(String),

    #[error("failed to read '{tag}' table: {source}")]
    Table {
        tag: Tag,
        #[source]
        source: Box<ReadError>,
    },

    #[error("missing required table(s): {}", join_tags(.0))]
    MissingTables(Vec<Tag>),

    #[error("unknown table tag '{0}'")]
    UnknownTable(Tag),

    #[error("unsupported font format: {0}")]
    UnsupportedFormat(String),

    #[error("{0} is not supported")]
    NotSupported(&'static str),

    #[error("failed to decompress '{tag}' table: {reason}")]
    Decompression { tag: Tag, reason: String },

    #[error("{stage}: expected {expected} bytes but found {actual}")]
    LengthMismatch {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("resolved typeface '{found}' does not match requested '{expected}'")]
    FaceMismatch { expected: String, found: String },

    #[error("no typeface matching '{0}'")]
    FaceNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("'{source_name}' could not be read: {reason}")]
    Unreadable { source_name: String, reason: String },

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl From<bytes::TryGetError> for ReadError {
    fn from(_value: bytes::TryGetError) -> Self {
        Self::OutOfBounds
    }
}

impl ReadError {
    /// Attach the tag of the table being decoded when this error was raised.
    ///
    /// Errors that already carry a tag are returned unchanged so that nested
    /// dependency reads report the innermost table.
    pub fn in_table(self, tag: Tag) -> Self {
        match self {
            err @ ReadError::Table { .. } => err,
            err => ReadError::Table {
                tag,
                source: Box::new(err),
            },
        }
    }
}

fn join_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("'{tag}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn usize_will_overflow(a: usize, b: usize) -> bool {
    a.checked_add(b).is_none()
}

pub(crate) fn u32_will_overflow(a: u32, b: u32) -> bool {
    a.checked_add(b).is_none()
}

#[cfg(not(feature = "debug"))]
mod regular {
    macro_rules! bail {
        ($($msg:tt)*) => {
            return Err($crate::error::ReadError::Malformed(format!($($msg)*)))
        };
    }
    pub(crate) use bail;

    macro_rules! bail_if {
        ($cond: expr) => {
            if $cond {
                return Err($crate::error::ReadError::Malformed(
                    stringify!($cond).to_string(),
                ));
            }
        };
        ($cond: expr, $($msg:tt)*) => {
            if $cond {
                return Err($crate::error::ReadError::Malformed(format!($($msg)*)));
            }
        };
    }
    pub(crate) use bail_if;
}
#[cfg(not(feature = "debug"))]
pub(crate) use regular::*;

#[cfg(feature = "debug")]
mod debug {
    macro_rules! bail {
        ($($msg:tt)*) => {
            panic!($($msg)*)
        };
    }
    pub(crate) use bail;

    macro_rules! bail_if {
        ($cond: expr) => {
            if $cond {
                panic!("{}", stringify!($cond))
            }
        };
        ($cond: expr, $($msg:tt)*) => {
            if $cond {
                panic!($($msg)*);
            }
        };
    }
    pub(crate) use bail_if;
}
#[cfg(feature = "debug")]
pub(crate) use debug::*;
