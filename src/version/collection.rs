//! TrueType Collections: several faces sharing one buffer, each with its own
//! table directory.

use bytes::Bytes;
use font_types::Tag;

use crate::buffer::FontReader;
use crate::error::{ReadError, bail, bail_if};
use crate::sfnt::{COLLECTION_TAG, COLLECTION_VERSION_1, COLLECTION_VERSION_2};
use crate::typeface::{FontFormat, TypefaceFont, TypefaceInfo, TypefaceReference};

use super::sfnt::read_table_set;
use super::{check_family, factory_for_flavor, materialize_face, materialize_info_tables};

/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#ttc-header>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionHeader {
    pub version: u32,
    /// Offset of each face's table directory from the start of the file.
    pub offsets: Vec<u32>,
    /// `(ulDsigTag, ulDsigLength, ulDsigOffset)`, version 2.0 only.
    pub dsig: Option<(Tag, u32, u32)>,
}

impl CollectionHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let tag = input.read_tag()?;
        bail_if!(tag != COLLECTION_TAG, "bad collection tag '{tag}'");
        let version = input.read_u32()?;
        bail_if!(
            version != COLLECTION_VERSION_1 && version != COLLECTION_VERSION_2,
            "unknown collection version {version:#010x}"
        );
        let num_fonts = input.read_u32()?;
        bail_if!(num_fonts == 0, "collection has no fonts");
        // each offset takes 4 bytes, so a count the data can't hold is corrupt
        bail_if!(
            num_fonts as usize > input.remaining_as_slice().len() / 4,
            "collection claims {num_fonts} fonts"
        );

        let offsets = (0..num_fonts)
            .map(|_| input.read_u32())
            .collect::<Result<Vec<_>, _>>()?;
        let dsig = if version == COLLECTION_VERSION_2 {
            let dsig_tag = input.read_u32()?;
            let length = input.read_u32()?;
            let offset = input.read_u32()?;
            (dsig_tag != 0).then(|| (Tag::from_u32(dsig_tag), length, offset))
        } else {
            None
        };

        Ok(Self {
            version,
            offsets,
            dsig,
        })
    }

    pub fn num_fonts(&self) -> usize {
        self.offsets.len()
    }
}

/// Describe every face that can be described.
///
/// Faces that can't be are left out and their reasons collected in
/// `error_message`; only when no face is left does this give the unknown
/// sentinel.
pub fn read_info(data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
    let header = CollectionHeader::parse(data)?;
    let mut faces = Vec::with_capacity(header.num_fonts());
    let mut failures = Vec::new();
    for (index, &offset) in header.offsets.iter().enumerate() {
        let (_, mut tables) = read_table_set(data, offset as usize)?;
        materialize_info_tables(&mut tables)?;
        match TypefaceReference::describe(&tables) {
            Ok(face) => faces.push(face),
            Err(reason) => {
                log::warn!("'{label}' face {index} can't be described: {reason}");
                failures.push(format!("face {index}: {reason}"));
            }
        }
    }
    if faces.is_empty() {
        return Ok(TypefaceInfo::unknown(
            label,
            FontFormat::Collection,
            failures.join("; "),
        ));
    }
    let mut info = TypefaceInfo::new(label, FontFormat::Collection, faces);
    if !failures.is_empty() {
        info.error_message = Some(failures.join("; "));
    }
    Ok(info)
}

/// Decode the face matching `target` exactly, or face 0 without a target.
pub fn read_full(
    data: &Bytes,
    target: Option<&TypefaceReference>,
    label: &str,
) -> Result<TypefaceFont, ReadError> {
    let header = CollectionHeader::parse(data)?;
    for (face_index, &offset) in header.offsets.iter().enumerate() {
        let (flavor, mut tables) = read_table_set(data, offset as usize)?;
        if let Some(target) = target {
            materialize_info_tables(&mut tables)?;
            if TypefaceReference::describe(&tables).ok().as_ref() != Some(target) {
                continue;
            }
        }
        log::debug!("resolved face {face_index} of '{label}'");

        let reference = materialize_face(&mut tables, factory_for_flavor(flavor))?;
        check_family(&reference, target)?;
        return Ok(TypefaceFont {
            source: label.to_string(),
            format: FontFormat::Collection,
            reference,
            flavor,
            face_index,
            tables,
            payload: data.clone(),
        });
    }

    match target {
        Some(target) => Err(ReadError::FaceNotFound(target.to_string())),
        None => bail!("collection has no fonts"),
    }
}
