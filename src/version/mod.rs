//! Container readers, chosen by the magic number at the start of the data.
//!
//! Every reader offers the same two operations: a cheap `read_info` that
//! decodes only what's needed to describe each face, and a `read_full` that
//! decodes every table of one face.

pub mod collection;
pub mod sfnt;
pub mod woff;
pub mod woff2;

use bytes::Bytes;
use font_types::Tag;

use crate::error::ReadError;
use crate::sfnt::{
    CFF_FLAVOR, COLLECTION_TAG, TRUE_FLAVOR, TRUETYPE_FLAVOR, TYP1_FLAVOR, WOFF_SIGNATURE,
    WOFF2_SIGNATURE,
};
use crate::table_tags::{HEAD, NAME, OS2};
use crate::tables::{TableFactory, TableSet};
use crate::typeface::{FontFormat, TypefaceFont, TypefaceInfo, TypefaceReference};

/// One reader per container kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionReader {
    /// `0x00010000`, `true` or `typ1`.
    TrueType(Tag),
    /// `OTTO`
    OpenTypeCff,
    /// `ttcf`
    Collection,
    /// `wOFF`
    Woff,
    /// `wOF2`
    Woff2,
}

/// Pick a reader from the first four bytes of `data`.
pub fn try_detect_version(data: &[u8]) -> Option<VersionReader> {
    let magic: [u8; 4] = data.get(..4)?.try_into().ok()?;
    let reader = match Tag::new(&magic) {
        tag @ (TRUETYPE_FLAVOR | TRUE_FLAVOR | TYP1_FLAVOR) => VersionReader::TrueType(tag),
        CFF_FLAVOR => VersionReader::OpenTypeCff,
        COLLECTION_TAG => VersionReader::Collection,
        WOFF_SIGNATURE => VersionReader::Woff,
        WOFF2_SIGNATURE => VersionReader::Woff2,
        _ => return None,
    };
    log::debug!("detected {} container", reader.format());
    Some(reader)
}

impl VersionReader {
    pub fn format(self) -> FontFormat {
        match self {
            VersionReader::TrueType(_) => FontFormat::TrueType,
            VersionReader::OpenTypeCff => FontFormat::OpenTypeCff,
            VersionReader::Collection => FontFormat::Collection,
            VersionReader::Woff => FontFormat::Woff,
            VersionReader::Woff2 => FontFormat::Woff2,
        }
    }

    /// Describe every face in `data`.
    ///
    /// Containers whose faces lack the tables needed to describe them give
    /// [`TypefaceInfo::unknown`] rather than an error.
    pub fn read_info(self, data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
        match self {
            VersionReader::TrueType(_) | VersionReader::OpenTypeCff => sfnt::read_info(data, label),
            VersionReader::Collection => collection::read_info(data, label),
            VersionReader::Woff => woff::read_info(data, label),
            VersionReader::Woff2 => woff2::read_info(data, label),
        }
    }

    /// Fully decode the face matching `target`, or the first face when no
    /// target is given.
    pub fn read_full(
        self,
        data: &Bytes,
        target: Option<&TypefaceReference>,
        label: &str,
    ) -> Result<TypefaceFont, ReadError> {
        match self {
            VersionReader::TrueType(_) | VersionReader::OpenTypeCff => {
                sfnt::read_full(data, target, label)
            }
            VersionReader::Collection => collection::read_full(data, target, label),
            VersionReader::Woff => woff::read_full(data, target, label),
            VersionReader::Woff2 => woff2::read_full(data, target, label),
        }
    }
}

/// The required table set for an sfnt version.
pub(crate) fn factory_for_flavor(flavor: Tag) -> TableFactory {
    match flavor {
        CFF_FLAVOR | TYP1_FLAVOR => TableFactory::cff(),
        _ => TableFactory::truetype(),
    }
}

pub(crate) fn format_for_flavor(flavor: Tag) -> FontFormat {
    match flavor {
        CFF_FLAVOR => FontFormat::OpenTypeCff,
        _ => FontFormat::TrueType,
    }
}

/// Decode just the tables [`TypefaceReference::describe`] looks at.
pub(crate) fn materialize_info_tables(tables: &mut TableSet) -> Result<(), ReadError> {
    let mut factory = TableFactory::lenient();
    for tag in [HEAD, NAME, OS2] {
        tables.materialize(tag, &mut factory)?;
    }
    Ok(())
}

/// Decode every table of a face and check the required ones are present.
pub(crate) fn materialize_face(
    tables: &mut TableSet,
    mut factory: TableFactory,
) -> Result<TypefaceReference, ReadError> {
    tables.materialize_all(&mut factory)?;
    factory.validate_required_tables()?;
    tables.warn_on_checksum_mismatch();
    TypefaceReference::describe(tables).map_err(ReadError::Malformed)
}

/// The decoded face must carry the family name it was resolved by.
pub(crate) fn check_family(
    resolved: &TypefaceReference,
    target: Option<&TypefaceReference>,
) -> Result<(), ReadError> {
    match target {
        Some(target) if target.family_name != resolved.family_name => {
            Err(ReadError::FaceMismatch {
                expected: target.family_name.clone(),
                found: resolved.family_name.clone(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_numbers() {
        assert_eq!(
            try_detect_version(&[0, 1, 0, 0, 0, 9]),
            Some(VersionReader::TrueType(TRUETYPE_FLAVOR))
        );
        assert_eq!(
            try_detect_version(b"true"),
            Some(VersionReader::TrueType(TRUE_FLAVOR))
        );
        assert_eq!(try_detect_version(b"OTTO"), Some(VersionReader::OpenTypeCff));
        assert_eq!(try_detect_version(b"ttcf"), Some(VersionReader::Collection));
        assert_eq!(try_detect_version(b"wOFF"), Some(VersionReader::Woff));
        assert_eq!(try_detect_version(b"wOF2"), Some(VersionReader::Woff2));
        assert_eq!(try_detect_version(b"woFF"), None);
        assert_eq!(try_detect_version(b"OT"), None);
    }

    #[test]
    fn family_must_match_target() {
        let resolved = TypefaceReference {
            family_name: "Sample".into(),
            ..Default::default()
        };
        let other = TypefaceReference {
            family_name: "Other".into(),
            ..Default::default()
        };
        assert!(check_family(&resolved, None).is_ok());
        assert!(check_family(&resolved, Some(&resolved)).is_ok());
        assert!(matches!(
            check_family(&resolved, Some(&other)),
            Err(ReadError::FaceMismatch { .. })
        ));
    }
}
