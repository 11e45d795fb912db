//! The [OS/2](https://docs.microsoft.com/en-us/typography/opentype/spec/os2) table

use font_types::Tag;

use crate::buffer::FontReader;
use crate::error::ReadError;

/// Bits of the `fsSelection` field.
pub mod selection {
    pub const ITALIC: u16 = 1 << 0;
    pub const UNDERSCORE: u16 = 1 << 1;
    pub const NEGATIVE: u16 = 1 << 2;
    pub const OUTLINED: u16 = 1 << 3;
    pub const STRIKEOUT: u16 = 1 << 4;
    pub const BOLD: u16 = 1 << 5;
    pub const REGULAR: u16 = 1 << 6;
    pub const USE_TYPO_METRICS: u16 = 1 << 7;
    pub const WWS: u16 = 1 << 8;
    pub const OBLIQUE: u16 = 1 << 9;
}

/// Size of a version 0 table that includes the typographic metrics.
const V0_SIZE: usize = 78;
/// Apple's original version 0 table stops before the typographic metrics.
const V0_SHORT_SIZE: usize = 68;

/// The OS/2 and Windows metrics table.
///
/// Fields introduced by later versions are `None` when the table declares an
/// earlier version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Os2 {
    pub version: u16,
    pub x_avg_char_width: i16,
    pub weight_class: u16,
    pub width_class: u16,
    /// Embedding licensing rights (`fsType`).
    pub fs_type: u16,
    pub subscript_x_size: i16,
    pub subscript_y_size: i16,
    pub subscript_x_offset: i16,
    pub subscript_y_offset: i16,
    pub superscript_x_size: i16,
    pub superscript_y_size: i16,
    pub superscript_x_offset: i16,
    pub superscript_y_offset: i16,
    pub strikeout_size: i16,
    pub strikeout_position: i16,
    pub family_class: i16,
    pub panose: [u8; 10],
    pub unicode_range: [u32; 4],
    pub vendor_id: Tag,
    pub fs_selection: u16,
    pub first_char_index: u16,
    pub last_char_index: u16,
    /// `None` for the short Apple version 0 layout.
    pub typo_metrics: Option<TypoMetrics>,
    /// Version 1 and later.
    pub code_page_range: Option<[u32; 2]>,
    /// Version 2 and later.
    pub extended: Option<Os2Extended>,
    /// Version 5 and later: `(lower, upper)` in TWIPs.
    pub optical_point_size: Option<(u16, u16)>,
}

/// The typographic and Windows vertical metrics present in every full table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypoMetrics {
    pub typo_ascender: i16,
    pub typo_descender: i16,
    pub typo_line_gap: i16,
    pub win_ascent: u16,
    pub win_descent: u16,
}

/// Fields added in version 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Os2Extended {
    pub x_height: i16,
    pub cap_height: i16,
    pub default_char: u16,
    pub break_char: u16,
    pub max_context: u16,
}

impl Os2 {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let version = input.read_u16()?;
        let x_avg_char_width = input.read_i16()?;
        let weight_class = input.read_u16()?;
        let width_class = input.read_u16()?;
        let fs_type = input.read_u16()?;
        let subscript_x_size = input.read_i16()?;
        let subscript_y_size = input.read_i16()?;
        let subscript_x_offset = input.read_i16()?;
        let subscript_y_offset = input.read_i16()?;
        let superscript_x_size = input.read_i16()?;
        let superscript_y_size = input.read_i16()?;
        let superscript_x_offset = input.read_i16()?;
        let superscript_y_offset = input.read_i16()?;
        let strikeout_size = input.read_i16()?;
        let strikeout_position = input.read_i16()?;
        let family_class = input.read_i16()?;
        let mut panose = [0u8; 10];
        panose.copy_from_slice(input.read_bytes(10)?);
        let unicode_range = [
            input.read_u32()?,
            input.read_u32()?,
            input.read_u32()?,
            input.read_u32()?,
        ];
        let vendor_id = input.read_tag()?;
        let fs_selection = input.read_u16()?;
        let first_char_index = input.read_u16()?;
        let last_char_index = input.read_u16()?;

        let typo_metrics = if version == 0 && data.len() < V0_SIZE {
            if data.len() != V0_SHORT_SIZE {
                log::warn!("OS/2 version 0 table has unexpected length {}", data.len());
            }
            None
        } else {
            Some(TypoMetrics {
                typo_ascender: input.read_i16()?,
                typo_descender: input.read_i16()?,
                typo_line_gap: input.read_i16()?,
                win_ascent: input.read_u16()?,
                win_descent: input.read_u16()?,
            })
        };

        let code_page_range = if version >= 1 {
            Some([input.read_u32()?, input.read_u32()?])
        } else {
            None
        };

        let extended = if version >= 2 {
            Some(Os2Extended {
                x_height: input.read_i16()?,
                cap_height: input.read_i16()?,
                default_char: input.read_u16()?,
                break_char: input.read_u16()?,
                max_context: input.read_u16()?,
            })
        } else {
            None
        };

        let optical_point_size = if version >= 5 {
            Some((input.read_u16()?, input.read_u16()?))
        } else {
            None
        };

        Ok(Self {
            version,
            x_avg_char_width,
            weight_class,
            width_class,
            fs_type,
            subscript_x_size,
            subscript_y_size,
            subscript_x_offset,
            subscript_y_offset,
            superscript_x_size,
            superscript_y_size,
            superscript_x_offset,
            superscript_y_offset,
            strikeout_size,
            strikeout_position,
            family_class,
            panose,
            unicode_range,
            vendor_id,
            fs_selection,
            first_char_index,
            last_char_index,
            typo_metrics,
            code_page_range,
            extended,
            optical_point_size,
        })
    }

    /// Whether the font asks for the typographic metrics to be used for line
    /// spacing. The bit is only defined from version 4 onwards.
    pub fn use_typo_metrics(&self) -> bool {
        self.version >= 4
            && self.typo_metrics.is_some()
            && self.fs_selection & selection::USE_TYPO_METRICS != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Os2Params, os2_table};

    #[test]
    fn version_4_fields() {
        let params = Os2Params {
            version: 4,
            weight: 700,
            width: 3,
            fs_type: 0x0008,
            fs_selection: selection::BOLD | selection::USE_TYPO_METRICS,
            ..Default::default()
        };
        let os2 = Os2::parse(&os2_table(&params)).unwrap();
        assert_eq!(os2.version, 4);
        assert_eq!(os2.weight_class, 700);
        assert_eq!(os2.width_class, 3);
        assert_eq!(os2.fs_type, 0x0008);
        assert_eq!(os2.vendor_id, Tag::new(b"TEST"));
        let typo = os2.typo_metrics.unwrap();
        assert_eq!((typo.typo_ascender, typo.typo_descender), (750, -250));
        assert!(os2.code_page_range.is_some());
        assert_eq!(os2.extended.unwrap().x_height, 500);
        assert!(os2.optical_point_size.is_none());
        assert!(os2.use_typo_metrics());
    }

    #[test]
    fn fields_past_declared_version_are_not_read() {
        let params = Os2Params {
            version: 1,
            ..Default::default()
        };
        // version 1 table followed by junk that must not be interpreted
        let mut data = os2_table(&params);
        data.extend_from_slice(&[0xFF; 14]);
        let os2 = Os2::parse(&data).unwrap();
        assert!(os2.code_page_range.is_some());
        assert!(os2.extended.is_none());
        assert!(!os2.use_typo_metrics());
    }

    #[test]
    fn typo_bit_ignored_before_version_4() {
        let params = Os2Params {
            version: 3,
            fs_selection: selection::USE_TYPO_METRICS,
            ..Default::default()
        };
        let os2 = Os2::parse(&os2_table(&params)).unwrap();
        assert!(!os2.use_typo_metrics());
    }

    #[test]
    fn short_version_0() {
        let params = Os2Params {
            version: 0,
            ..Default::default()
        };
        let data = os2_table(&params);
        assert_eq!(data.len(), 78);
        let os2 = Os2::parse(&data[..68]).unwrap();
        assert!(os2.typo_metrics.is_none());
        assert!(Os2::parse(&data[..60]).is_err());
    }

    #[test]
    fn truncated_version_2_fails() {
        let params = Os2Params {
            version: 2,
            ..Default::default()
        };
        let data = os2_table(&params);
        assert_eq!(data.len(), 96);
        assert!(Os2::parse(&data[..90]).is_err());
    }
}
