//! The [name](https://docs.microsoft.com/en-us/typography/opentype/spec/name) table

use crate::buffer::FontReader;
use crate::error::{ReadError, bail};

/// Well known name identifiers.
pub mod name_id {
    pub const COPYRIGHT: u16 = 0;
    pub const FAMILY: u16 = 1;
    pub const SUBFAMILY: u16 = 2;
    pub const UNIQUE_ID: u16 = 3;
    pub const FULL_NAME: u16 = 4;
    pub const VERSION: u16 = 5;
    pub const POSTSCRIPT_NAME: u16 = 6;
    pub const TYPOGRAPHIC_FAMILY: u16 = 16;
    pub const TYPOGRAPHIC_SUBFAMILY: u16 = 17;
}

pub const PLATFORM_UNICODE: u16 = 0;
pub const PLATFORM_MACINTOSH: u16 = 1;
pub const PLATFORM_WINDOWS: u16 = 3;

const WINDOWS_ENGLISH_US: u16 = 0x0409;
const MAC_ENGLISH: u16 = 0;

/// A decoded name record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub value: String,
}

/// The naming table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamingTable {
    pub format: u16,
    pub records: Vec<NameRecord>,
    /// Format 1 language tags, referenced by language ids from 0x8000.
    pub lang_tags: Vec<String>,
}

impl NamingTable {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let format = input.read_u16()?;
        if format > 1 {
            bail!("unknown name table format {format}");
        }
        let count = input.read_u16()?;
        let storage_offset = input.read_u16()? as usize;

        let mut raw_records = Vec::with_capacity(count as usize);
        for _ in 0..count {
            raw_records.push((
                input.read_u16()?, // platform
                input.read_u16()?, // encoding
                input.read_u16()?, // language
                input.read_u16()?, // name id
                input.read_u16()? as usize, // length
                input.read_u16()? as usize, // offset
            ));
        }

        let mut lang_tag_ranges = Vec::new();
        if format == 1 {
            let lang_tag_count = input.read_u16()?;
            for _ in 0..lang_tag_count {
                lang_tag_ranges.push((input.read_u16()? as usize, input.read_u16()? as usize));
            }
        }

        let mut records = Vec::with_capacity(raw_records.len());
        for (platform_id, encoding_id, language_id, name_id, length, offset) in raw_records {
            let mut storage = FontReader::new(data);
            let decoded = storage
                .seek(storage_offset + offset)
                .and_then(|_| decode_name(&mut storage, platform_id, encoding_id, length));
            match decoded {
                Ok(value) => records.push(NameRecord {
                    platform_id,
                    encoding_id,
                    language_id,
                    name_id,
                    value,
                }),
                // a bad record shouldn't cost us every other name in the font
                Err(_) => log::warn!(
                    "skipping name record {name_id} ({platform_id}, {encoding_id}): string out of bounds"
                ),
            }
        }

        let mut lang_tags = Vec::with_capacity(lang_tag_ranges.len());
        for (length, offset) in lang_tag_ranges {
            let mut storage = FontReader::new_at(data, storage_offset + offset)?;
            lang_tags.push(storage.read_utf16be_string(length)?);
        }

        Ok(Self {
            format,
            records,
            lang_tags,
        })
    }

    /// Best value for `name_id`, preferring US English Windows records, then
    /// any Windows record, then Unicode, then Macintosh English, then anything.
    pub fn get(&self, name_id: u16) -> Option<&str> {
        let candidates = || self.records.iter().filter(move |r| r.name_id == name_id);
        let rank = |record: &NameRecord| match (record.platform_id, record.language_id) {
            (PLATFORM_WINDOWS, WINDOWS_ENGLISH_US) => 0,
            (PLATFORM_WINDOWS, _) => 1,
            (PLATFORM_UNICODE, _) => 2,
            (PLATFORM_MACINTOSH, MAC_ENGLISH) => 3,
            _ => 4,
        };
        candidates()
            .filter(|record| !record.value.is_empty())
            .min_by_key(|record| rank(record))
            .map(|record| record.value.as_str())
    }

    /// The typographic family name if present, otherwise the legacy family name.
    pub fn family_name(&self) -> Option<&str> {
        self.get(name_id::TYPOGRAPHIC_FAMILY)
            .or_else(|| self.get(name_id::FAMILY))
    }

    pub fn subfamily_name(&self) -> Option<&str> {
        self.get(name_id::TYPOGRAPHIC_SUBFAMILY)
            .or_else(|| self.get(name_id::SUBFAMILY))
    }

    pub fn full_name(&self) -> Option<&str> {
        self.get(name_id::FULL_NAME)
    }

    pub fn postscript_name(&self) -> Option<&str> {
        self.get(name_id::POSTSCRIPT_NAME)
    }
}

fn decode_name(
    input: &mut FontReader<'_>,
    platform_id: u16,
    encoding_id: u16,
    length: usize,
) -> Result<String, ReadError> {
    match (platform_id, encoding_id) {
        (PLATFORM_UNICODE, _) | (PLATFORM_WINDOWS, _) => input.read_utf16be_string(length),
        (PLATFORM_MACINTOSH, 0) => {
            let bytes = input.read_bytes(length)?;
            Ok(bytes.iter().map(|&b| mac_roman_to_char(b)).collect())
        }
        _ => input.read_ascii_string(length),
    }
}

/// Decode one byte of the Macintosh Roman encoding.
pub fn mac_roman_to_char(byte: u8) -> char {
    if byte < 0x80 {
        byte as char
    } else {
        MAC_ROMAN_HIGH[(byte - 0x80) as usize]
    }
}

#[rustfmt::skip]
static MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ',
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];
