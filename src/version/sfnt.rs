//! Single-face sfnt containers: TrueType and CFF flavoured OpenType.

use bytes::Bytes;
use font_types::Tag;

use crate::buffer::FontReader;
use crate::error::ReadError;
use crate::tables::{TableSet, read_directory};
use crate::typeface::{TypefaceFont, TypefaceInfo, TypefaceReference};

use super::{check_family, factory_for_flavor, format_for_flavor, materialize_face, materialize_info_tables};

/// Read the table directory that starts at `offset`, returning the sfnt
/// version alongside the face's tables.
///
/// Table offsets are relative to the start of `data`, which is how both
/// plain fonts and collections store them.
pub fn read_table_set(data: &Bytes, offset: usize) -> Result<(Tag, TableSet), ReadError> {
    let mut input = FontReader::new_at(data, offset)?;
    let flavor = input.read_tag()?;
    let num_tables = input.read_u16()?;
    input.skip(6)?; // searchRange, entrySelector, rangeShift
    let records = read_directory(&mut input, num_tables)?;
    let tables = TableSet::from_directory(data, records)?;
    Ok((flavor, tables))
}

pub fn read_info(data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
    let (flavor, mut tables) = read_table_set(data, 0)?;
    materialize_info_tables(&mut tables)?;
    let format = format_for_flavor(flavor);
    Ok(match TypefaceReference::describe(&tables) {
        Ok(face) => TypefaceInfo::new(label, format, vec![face]),
        Err(reason) => TypefaceInfo::unknown(label, format, reason),
    })
}

pub fn read_full(
    data: &Bytes,
    target: Option<&TypefaceReference>,
    label: &str,
) -> Result<TypefaceFont, ReadError> {
    let (flavor, mut tables) = read_table_set(data, 0)?;
    let reference = materialize_face(&mut tables, factory_for_flavor(flavor))?;
    check_family(&reference, target)?;
    Ok(TypefaceFont {
        source: label.to_string(),
        format: format_for_flavor(flavor),
        reference,
        flavor,
        face_index: 0,
        tables,
        payload: data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfnt::CFF_FLAVOR;
    use crate::test_helpers::{FontBuilder, sample_font};
    use crate::typeface::{FontFormat, FontWeight};
    use pretty_assertions::assert_eq;

    #[test]
    fn info_and_full_reads_agree() {
        let data = Bytes::from(sample_font("Sample", 400));
        let info = read_info(&data, "sample.ttf").unwrap();
        assert_eq!(info.format, FontFormat::TrueType);
        assert_eq!(info.faces.len(), 1);
        assert_eq!(info.faces[0].family_name, "Sample");

        let font = read_full(&data, Some(&info.faces[0]), "sample.ttf").unwrap();
        assert_eq!(font.reference(), &info.faces[0]);
        assert_eq!(font.payload(), &data);
        assert_eq!(font.units_per_em(), Some(1000));
    }

    #[test]
    fn wrong_family_is_rejected() {
        let data = Bytes::from(sample_font("Sample", 400));
        let target = TypefaceReference {
            family_name: "Elsewhere".into(),
            weight: FontWeight::NORMAL,
            ..Default::default()
        };
        assert!(matches!(
            read_full(&data, Some(&target), "sample.ttf"),
            Err(ReadError::FaceMismatch { .. })
        ));
    }

    #[test]
    fn cff_fonts_need_fewer_tables() {
        let sfnt = Bytes::from(sample_font("Sample", 400));
        let (_, truetype_tables) = read_table_set(&sfnt, 0).unwrap();
        let mut builder = FontBuilder::with_flavor(CFF_FLAVOR);
        for entry in truetype_tables.entries() {
            if entry.tag() != crate::table_tags::POST {
                builder = builder.table(&entry.tag().to_be_bytes(), entry.data.to_vec());
            }
        }
        let data = Bytes::from(builder.build());
        let font = read_full(&data, None, "sample.otf").unwrap();
        assert_eq!(font.format(), FontFormat::OpenTypeCff);
        assert_eq!(font.flavor(), CFF_FLAVOR);

        // the same tables under a TrueType header are missing 'post'
        let mut data = data.to_vec();
        data[..4].copy_from_slice(&[0, 1, 0, 0]);
        assert!(matches!(
            read_full(&Bytes::from(data), None, "sample.ttf"),
            Err(ReadError::MissingTables(tags)) if tags == vec![crate::table_tags::POST]
        ));
    }

    #[test]
    fn apple_post_table_reads_fully() {
        let sfnt = Bytes::from(sample_font("Sample", 400));
        let (_, tables) = read_table_set(&sfnt, 0).unwrap();
        let mut builder = FontBuilder::truetype();
        for entry in tables.entries() {
            let mut data = entry.data.to_vec();
            if entry.tag() == crate::table_tags::POST {
                data.truncate(32);
                data[..4].copy_from_slice(&[0, 4, 0, 0]);
            }
            builder = builder.table(&entry.tag().to_be_bytes(), data);
        }
        let data = Bytes::from(builder.build());
        let font = read_full(&data, None, "apple.ttf").unwrap();
        assert_eq!(font.family_name(), "Sample");
        assert_eq!(font.glyph_name(2), None);
        assert_eq!(font.glyph_id('A').unwrap(), 34);
    }

    #[test]
    fn truncated_directory_fails() {
        let data = Bytes::from(sample_font("Sample", 400));
        let truncated = data.slice(..20);
        assert!(read_info(&truncated, "short.ttf").is_err());
    }
}
