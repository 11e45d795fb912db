//! WOFF 2.0, read by decompressing to an sfnt (or collection) and handing
//! that to the matching reader.

use bytes::Bytes;

use crate::error::ReadError;
use crate::typeface::{FontFormat, TypefaceFont, TypefaceInfo, TypefaceReference};

#[cfg(feature = "brotli")]
fn decompress(data: &Bytes) -> Result<Bytes, ReadError> {
    crate::woff::woff2::decompress_woff2(data).map(Bytes::from)
}

#[cfg(not(feature = "brotli"))]
fn decompress(_data: &Bytes) -> Result<Bytes, ReadError> {
    Err(ReadError::NotSupported(
        "WOFF2 (crate built without the `brotli` feature)",
    ))
}

pub fn read_info(data: &Bytes, label: &str) -> Result<TypefaceInfo, ReadError> {
    let sfnt = match decompress(data) {
        Ok(sfnt) => sfnt,
        Err(err @ ReadError::NotSupported(_)) => {
            return Ok(TypefaceInfo::unknown(label, FontFormat::Woff2, err.to_string()));
        }
        Err(err) => return Err(err),
    };
    let mut info = match super::try_detect_version(&sfnt) {
        Some(super::VersionReader::Collection) => super::collection::read_info(&sfnt, label)?,
        _ => super::sfnt::read_info(&sfnt, label)?,
    };
    info.format = FontFormat::Woff2;
    Ok(info)
}

/// The face keeps the WOFF2 bytes as its payload; its tables point into
/// the decompressed sfnt.
pub fn read_full(
    data: &Bytes,
    target: Option<&TypefaceReference>,
    label: &str,
) -> Result<TypefaceFont, ReadError> {
    let sfnt = decompress(data)?;
    let mut font = match super::try_detect_version(&sfnt) {
        Some(super::VersionReader::Collection) => {
            super::collection::read_full(&sfnt, target, label)?
        }
        _ => super::sfnt::read_full(&sfnt, target, label)?,
    };
    font.format = FontFormat::Woff2;
    font.payload = data.clone();
    Ok(font)
}

#[cfg(all(test, feature = "brotli"))]
mod tests {
    use super::*;
    use crate::sfnt::COLLECTION_VERSION_1;
    use crate::test_helpers::{build_collection, build_woff2, sample_font};
    use pretty_assertions::assert_eq;

    #[test]
    fn woff2_describes_like_the_source_font() {
        let sfnt = Bytes::from(sample_font("Sample", 400));
        let woff2 = Bytes::from(build_woff2(&sfnt, &[]));
        let info = read_info(&woff2, "sample.woff2").unwrap();
        let sfnt_info = crate::version::sfnt::read_info(&sfnt, "sample.ttf").unwrap();
        assert_eq!(info.format, FontFormat::Woff2);
        assert_eq!(info.faces, sfnt_info.faces);

        let font = read_full(&woff2, Some(&info.faces[0]), "sample.woff2").unwrap();
        assert_eq!(font.format(), FontFormat::Woff2);
        assert_eq!(font.payload(), &woff2);
        assert_eq!(font.glyph_id('A').unwrap(), 34);
    }

    #[test]
    fn collections_inside_woff2() {
        let ttc = build_collection(
            &[sample_font("Sample", 400), sample_font("Sample", 700)],
            COLLECTION_VERSION_1,
        );
        let woff2 = Bytes::from(build_woff2(&ttc, &[]));
        let info = read_info(&woff2, "pair.woff2").unwrap();
        assert_eq!(info.faces.len(), 2);
        let bold = read_full(&woff2, Some(&info.faces[1]), "pair.woff2").unwrap();
        assert_eq!(bold.face_index(), 1);
    }
}
