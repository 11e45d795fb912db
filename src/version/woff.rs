//! WOFF 1.0: an sfnt whose tables are individually zlib compressed.

use bytes::Bytes;

use crate::error::ReadError;
use crate::table_tags::{HEAD, NAME, OS2};
use crate::tables::{TableRecord, TableSet};
use crate::typeface::{FontFormat, TypefaceFont, TypefaceInfo, TypefaceReference};
use crate::woff::decompress_woff1::{DecodedTable, Woff1File, decompress_z, expected_sfnt_size};

use super::{check_family, factory_for_flavor, materialize_face, materialize_info_tables};

fn table_set(tables: Vec<DecodedTable>) -> TableSet {
    TableSet::from_tables(tables.into_iter().map(|table| {
        let record = TableRecord {
            tag: table.tag,
            checksum: table.checksum,
            offset: table.woff_offset,
            length: table.data.len() as u32,
        };
        (record, Bytes::from(table.data))
    }))
}

/// Only `head`, `name` and `OS/2` are inflated.
pub fn read_info(data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
    let woff = Woff1File::parse(data)?;
    let decoded = woff.decode_tables(|tag| matches!(tag, HEAD | NAME | OS2), &mut decompress_z)?;
    let mut tables = table_set(decoded);
    materialize_info_tables(&mut tables)?;
    Ok(match TypefaceReference::describe(&tables) {
        Ok(face) => TypefaceInfo::new(label, FontFormat::Woff, vec![face]),
        Err(reason) => TypefaceInfo::unknown(label, FontFormat::Woff, reason),
    })
}

pub fn read_full(
    data: &Bytes,
    target: Option<&TypefaceReference>,
    label: &str,
) -> Result<TypefaceFont, ReadError> {
    let woff = Woff1File::parse(data)?;
    let declared = woff.header.total_sfnt_size as usize;
    let expected = expected_sfnt_size(woff.directory.iter().map(|entry| &entry.orig_length));
    if declared != expected {
        return Err(ReadError::LengthMismatch {
            stage: "WOFF totalSfntSize",
            expected,
            actual: declared,
        });
    }

    let decoded = woff.decode_tables(|_| true, &mut decompress_z)?;
    let mut tables = table_set(decoded);
    let reference = materialize_face(&mut tables, factory_for_flavor(woff.header.flavor))?;
    check_family(&reference, target)?;
    Ok(TypefaceFont {
        source: label.to_string(),
        format: FontFormat::Woff,
        reference,
        flavor: woff.export_flavor(),
        face_index: 0,
        tables,
        payload: data.clone(),
    })
}

#[cfg(all(test, feature = "z"))]
mod tests {
    use super::*;
    use crate::test_helpers::{build_woff, sample_font};
    use crate::woff::decompress_woff1::decompress_woff1;
    use pretty_assertions::assert_eq;

    #[test]
    fn woff_and_sfnt_describe_the_same_face() {
        let sfnt = Bytes::from(sample_font("Sample", 400));
        let woff = Bytes::from(build_woff(&sfnt, true));

        let woff_info = read_info(&woff, "sample.woff").unwrap();
        let sfnt_info = crate::version::sfnt::read_info(&sfnt, "sample.ttf").unwrap();
        assert_eq!(woff_info.format, FontFormat::Woff);
        assert_eq!(woff_info.faces, sfnt_info.faces);

        // decompress, re-export and read again
        let exported = Bytes::from(decompress_woff1(&woff).unwrap());
        let exported_info = crate::version::sfnt::read_info(&exported, "sample.ttf").unwrap();
        assert_eq!(exported_info.faces, woff_info.faces);
    }

    #[test]
    fn full_read_exports_the_decompressed_tables() {
        let sfnt = Bytes::from(sample_font("Sample", 400));
        let woff = Bytes::from(build_woff(&sfnt, true));
        let font = read_full(&woff, None, "sample.woff").unwrap();
        assert_eq!(font.format(), FontFormat::Woff);
        assert_eq!(font.payload(), &woff);
        assert_eq!(font.to_sfnt(), decompress_woff1(&woff).unwrap());
    }

    #[test]
    fn wrong_total_size_is_fatal() {
        let mut woff = build_woff(&sample_font("Sample", 400), true);
        let declared = u32::from_be_bytes(woff[16..20].try_into().unwrap());
        woff[16..20].copy_from_slice(&(declared - 4).to_be_bytes());
        assert!(matches!(
            read_full(&Bytes::from(woff), None, "bad.woff"),
            Err(ReadError::LengthMismatch { .. })
        ));
    }
}
