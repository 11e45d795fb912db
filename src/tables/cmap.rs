//! The [cmap](https://docs.microsoft.com/en-us/typography/opentype/spec/cmap) table

use crate::buffer::FontReader;
use crate::error::{ReadError, bail_if};
use crate::tables::name::{PLATFORM_MACINTOSH, PLATFORM_UNICODE, PLATFORM_WINDOWS};

const WINDOWS_SYMBOL: u16 = 0;
const WINDOWS_UNICODE_BMP: u16 = 1;
const WINDOWS_UNICODE_FULL: u16 = 10;
const MAC_ROMAN: u16 = 0;

/// Symbol fonts map their characters into the private use area at U+F0xx.
const SYMBOL_OFFSET: u32 = 0xF000;

/// One `{platformId, encodingId, subtableOffset}` record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
    /// Index into [`CharacterMap::subtables`]. Records sharing an offset share a subtable.
    pub subtable_index: usize,
}

/// The character to glyph index mapping table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterMap {
    pub version: u16,
    pub records: Vec<EncodingRecord>,
    pub subtables: Vec<CmapSubtable>,
}

/// A decoded cmap subtable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CmapSubtable {
    Format0(Format0),
    Format2(Format2),
    Format4(Format4),
    Format6(Format6),
    Format12(Format12),
    /// A subtable in a format this crate does not decode.
    Unsupported { format: u16 },
}

/// Byte encoding table: a 256 entry array of glyph ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format0 {
    pub language: u16,
    pub glyph_ids: Vec<u8>,
}

/// High-byte mapping through table, used for legacy CJK encodings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format2 {
    pub language: u16,
    pub sub_header_keys: Vec<u16>,
    pub sub_headers: Vec<SubHeader>,
    pub glyph_ids: Vec<u16>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubHeader {
    pub first_code: u16,
    pub entry_count: u16,
    pub id_delta: i16,
    pub id_range_offset: u16,
}

/// Segment mapping to delta values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format4 {
    pub language: u16,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
    pub end_codes: Vec<u16>,
    pub start_codes: Vec<u16>,
    pub id_deltas: Vec<i16>,
    pub id_range_offsets: Vec<u16>,
    pub glyph_ids: Vec<u16>,
}

/// Trimmed table mapping: a dense run of glyph ids starting at `first_code`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format6 {
    pub language: u16,
    pub first_code: u16,
    pub glyph_ids: Vec<u16>,
}

/// Segmented coverage over the full Unicode range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format12 {
    pub language: u32,
    pub groups: Vec<SequentialMapGroup>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

impl CharacterMap {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let version = input.read_u16()?;
        let num_tables = input.read_u16()?;

        let mut records: Vec<EncodingRecord> = Vec::with_capacity(num_tables as usize);
        let mut subtables = Vec::new();
        let mut subtable_offsets: Vec<u32> = Vec::new();
        for _ in 0..num_tables {
            let platform_id = input.read_u16()?;
            let encoding_id = input.read_u16()?;
            let offset = input.read_u32()?;
            let subtable_index = match subtable_offsets.iter().position(|o| *o == offset) {
                Some(index) => index,
                None => {
                    subtables.push(CmapSubtable::parse(data, offset as usize)?);
                    subtable_offsets.push(offset);
                    subtables.len() - 1
                }
            };
            records.push(EncodingRecord {
                platform_id,
                encoding_id,
                offset,
                subtable_index,
            });
        }

        Ok(Self {
            version,
            records,
            subtables,
        })
    }

    /// The subtable used for character lookup, with the record that selected it.
    ///
    /// Preference order: Windows full repertoire, Unicode, Windows BMP, Windows
    /// symbol, Macintosh Roman. Subtables that cannot be used for lookup are
    /// passed over when a better one exists.
    pub fn preferred_subtable(&self) -> Option<(&EncodingRecord, &CmapSubtable)> {
        let rank = |record: &EncodingRecord| match (record.platform_id, record.encoding_id) {
            (PLATFORM_WINDOWS, WINDOWS_UNICODE_FULL) => 0,
            (PLATFORM_UNICODE, encoding) if encoding != 5 => 1,
            (PLATFORM_WINDOWS, WINDOWS_UNICODE_BMP) => 2,
            (PLATFORM_WINDOWS, WINDOWS_SYMBOL) => 3,
            (PLATFORM_MACINTOSH, MAC_ROMAN) => 4,
            _ => 5,
        };
        self.records
            .iter()
            .filter(|record| rank(record) < 5)
            .map(|record| (record, &self.subtables[record.subtable_index]))
            .filter(|(_, subtable)| !matches!(subtable, CmapSubtable::Unsupported { .. }))
            .min_by_key(|(record, _)| rank(record))
    }

    /// Glyph id for `ch`, or 0 when the character is not mapped.
    ///
    /// Control and invisible format characters always map to glyph 0.
    pub fn map_char(&self, ch: char) -> Result<u16, ReadError> {
        if is_control_or_format(ch) {
            return Ok(0);
        }
        let Some((record, subtable)) = self.preferred_subtable() else {
            return Ok(0);
        };
        let code = ch as u32;
        if record.platform_id == PLATFORM_MACINTOSH {
            return subtable.map(mac_roman_code(ch).unwrap_or(0) as u32);
        }
        let glyph_id = subtable.map(code)?;
        if glyph_id == 0
            && record.platform_id == PLATFORM_WINDOWS
            && record.encoding_id == WINDOWS_SYMBOL
            && code <= 0xFF
        {
            return subtable.map(code + SYMBOL_OFFSET);
        }
        Ok(glyph_id)
    }
}

fn is_control_or_format(ch: char) -> bool {
    ch.is_control()
        || matches!(
            ch,
            '\u{AD}'
                | '\u{200B}'..='\u{200F}'
                | '\u{2028}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{FEFF}'
        )
}

/// Reverse Macintosh Roman lookup, for fonts that only carry a (1, 0) subtable.
pub(crate) fn mac_roman_code(ch: char) -> Option<u8> {
    if (ch as u32) < 0x80 {
        return Some(ch as u8);
    }
    (0x80..=0xFFu8).find(|&b| crate::tables::name::mac_roman_to_char(b) == ch)
}

impl CmapSubtable {
    fn parse(data: &[u8], offset: usize) -> Result<Self, ReadError> {
        let mut input = FontReader::new_at(data, offset)?;
        let format = input.read_u16()?;
        Ok(match format {
            0 => Self::Format0(Format0::parse(&mut input)?),
            2 => Self::Format2(Format2::parse(&mut input)?),
            4 => Self::Format4(Format4::parse(&mut input)?),
            6 => Self::Format6(Format6::parse(&mut input)?),
            12 => Self::Format12(Format12::parse(&mut input)?),
            format => {
                log::debug!("cmap subtable format {format} is not decoded");
                Self::Unsupported { format }
            }
        })
    }

    pub fn format(&self) -> u16 {
        match self {
            Self::Format0(_) => 0,
            Self::Format2(_) => 2,
            Self::Format4(_) => 4,
            Self::Format6(_) => 6,
            Self::Format12(_) => 12,
            Self::Unsupported { format } => *format,
        }
    }

    /// Glyph id for a character code in this subtable's encoding. 0 means
    /// unmapped.
    pub fn map(&self, code: u32) -> Result<u16, ReadError> {
        match self {
            Self::Format0(table) => Ok(table.map(code)),
            Self::Format4(table) => Ok(table.map(code)),
            Self::Format6(table) => Ok(table.map(code)),
            Self::Format12(table) => Ok(table.map(code)),
            Self::Format2(_) => Err(ReadError::NotSupported("cmap format 2 lookup")),
            Self::Unsupported { .. } => Err(ReadError::NotSupported("cmap subtable format")),
        }
    }
}

impl Format0 {
    fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        let _length = input.read_u16()?;
        let language = input.read_u16()?;
        let glyph_ids = input.read_bytes(256)?.to_vec();
        Ok(Self {
            language,
            glyph_ids,
        })
    }

    pub fn map(&self, code: u32) -> u16 {
        self.glyph_ids.get(code as usize).copied().unwrap_or(0) as u16
    }
}

impl Format2 {
    fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        let length = input.read_u16()? as usize;
        let language = input.read_u16()?;
        let mut sub_header_keys = Vec::with_capacity(256);
        for _ in 0..256 {
            sub_header_keys.push(input.read_u16()?);
        }
        // keys are byte offsets into the sub header array, 8 bytes per entry
        let n_sub_headers = sub_header_keys.iter().map(|key| key / 8).max().unwrap_or(0) + 1;
        let mut sub_headers = Vec::with_capacity(n_sub_headers as usize);
        for _ in 0..n_sub_headers {
            sub_headers.push(SubHeader {
                first_code: input.read_u16()?,
                entry_count: input.read_u16()?,
                id_delta: input.read_i16()?,
                id_range_offset: input.read_u16()?,
            });
        }
        let consumed = 6 + 512 + 8 * n_sub_headers as usize;
        let n_glyph_ids = length.saturating_sub(consumed) / 2;
        let mut glyph_ids = Vec::with_capacity(n_glyph_ids);
        for _ in 0..n_glyph_ids {
            glyph_ids.push(input.read_u16()?);
        }
        Ok(Self {
            language,
            sub_header_keys,
            sub_headers,
            glyph_ids,
        })
    }
}

impl Format4 {
    fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        let length = input.read_u16()? as usize;
        let language = input.read_u16()?;
        let seg_count_x2 = input.read_u16()?;
        bail_if!(seg_count_x2 % 2 != 0, "cmap format 4 segCountX2 is odd");
        let seg_count = (seg_count_x2 / 2) as usize;
        let search_range = input.read_u16()?;
        let entry_selector = input.read_u16()?;
        let range_shift = input.read_u16()?;

        let read_u16s = |input: &mut FontReader<'_>, n: usize| -> Result<Vec<u16>, ReadError> {
            (0..n).map(|_| input.read_u16()).collect()
        };
        let end_codes = read_u16s(input, seg_count)?;
        let _reserved_pad = input.read_u16()?;
        let start_codes = read_u16s(input, seg_count)?;
        let id_deltas = read_u16s(input, seg_count)?
            .into_iter()
            .map(|delta| delta as i16)
            .collect();
        let id_range_offsets = read_u16s(input, seg_count)?;

        // the glyph id array fills the rest of the subtable
        let header_size = 16 + 8 * seg_count;
        let available = input.remaining_as_slice().len() / 2;
        let n_glyph_ids = (length.saturating_sub(header_size) / 2).min(available);
        let glyph_ids = read_u16s(input, n_glyph_ids)?;

        Ok(Self {
            language,
            search_range,
            entry_selector,
            range_shift,
            end_codes,
            start_codes,
            id_deltas,
            id_range_offsets,
            glyph_ids,
        })
    }

    pub fn seg_count(&self) -> usize {
        self.end_codes.len()
    }

    /// Find the first segment whose end code is at or above `code`.
    ///
    /// Follows the searchRange/entrySelector scheme: the window starts at the
    /// largest power of two that fits in the segment count, jumps to the tail
    /// of the array when the code lies beyond it, then halves once per
    /// entrySelector step.
    fn find_segment(&self, code: u16) -> Option<usize> {
        let seg_count = self.seg_count();
        if seg_count == 0 {
            return None;
        }
        // recomputed rather than trusted; fonts in the wild get these wrong
        let entry_selector = seg_count.ilog2();
        let mut range = 1usize << entry_selector;
        let mut index = 0;
        if code > self.end_codes[range - 1] {
            index = seg_count - range;
        }
        for _ in 0..entry_selector {
            range >>= 1;
            if code > self.end_codes[index + range - 1] {
                index += range;
            }
        }
        (code <= self.end_codes[index]).then_some(index)
    }

    pub fn map(&self, code: u32) -> u16 {
        let Ok(code) = u16::try_from(code) else {
            return 0;
        };
        let Some(index) = self.find_segment(code) else {
            return 0;
        };
        let start_code = self.start_codes[index];
        if code < start_code {
            return 0;
        }
        let delta = self.id_deltas[index];
        let range_offset = self.id_range_offsets[index] as usize;
        if range_offset == 0 {
            return (code as i32 + delta as i32) as u16;
        }
        // idRangeOffset is a byte offset from its own position in the
        // idRangeOffset array into glyphIdArray, which directly follows it.
        let glyph_index =
            (range_offset / 2 + (code - start_code) as usize).checked_sub(self.seg_count() - index);
        match glyph_index.and_then(|i| self.glyph_ids.get(i)) {
            Some(0) | None => 0,
            Some(&glyph_id) => (glyph_id as i32 + delta as i32) as u16,
        }
    }
}

impl Format6 {
    fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        let _length = input.read_u16()?;
        let language = input.read_u16()?;
        let first_code = input.read_u16()?;
        let entry_count = input.read_u16()?;
        let glyph_ids = (0..entry_count)
            .map(|_| input.read_u16())
            .collect::<Result<_, _>>()?;
        Ok(Self {
            language,
            first_code,
            glyph_ids,
        })
    }

    pub fn map(&self, code: u32) -> u16 {
        code.checked_sub(self.first_code as u32)
            .and_then(|index| self.glyph_ids.get(index as usize))
            .copied()
            .unwrap_or(0)
    }
}

impl Format12 {
    fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        let _reserved = input.read_u16()?;
        let _length = input.read_u32()?;
        let language = input.read_u32()?;
        let num_groups = input.read_u32()?;
        bail_if!(
            num_groups as usize > input.remaining_as_slice().len() / 12,
            "cmap format 12 group count {num_groups} exceeds table"
        );
        let mut groups = Vec::with_capacity(num_groups as usize);
        for _ in 0..num_groups {
            groups.push(SequentialMapGroup {
                start_char_code: input.read_u32()?,
                end_char_code: input.read_u32()?,
                start_glyph_id: input.read_u32()?,
            });
        }
        Ok(Self { language, groups })
    }

    pub fn map(&self, code: u32) -> u16 {
        let index = self.groups.partition_point(|group| group.end_char_code < code);
        match self.groups.get(index) {
            // glyph ids past u16 are unmapped
            Some(group) if group.start_char_code <= code => group
                .start_glyph_id
                .checked_add(code - group.start_char_code)
                .and_then(|glyph_id| u16::try_from(glyph_id).ok())
                .unwrap_or(0),
            _ => 0,
        }
    }
}
