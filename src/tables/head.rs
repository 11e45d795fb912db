//! The [head](https://docs.microsoft.com/en-us/typography/opentype/spec/head) table

use font_types::{Fixed, LongDateTime};

use crate::buffer::FontReader;
use crate::error::{ReadError, bail_if};

/// Value of the `magicNumber` field of a well formed font.
pub const MAGIC_NUMBER: u32 = 0x5F0F3CF5;

/// Style bits of the `macStyle` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacStyle(u16);

impl MacStyle {
    pub const BOLD: u16 = 1 << 0;
    pub const ITALIC: u16 = 1 << 1;
    pub const UNDERLINE: u16 = 1 << 2;
    pub const OUTLINE: u16 = 1 << 3;
    pub const SHADOW: u16 = 1 << 4;
    pub const CONDENSED: u16 = 1 << 5;
    pub const EXTENDED: u16 = 1 << 6;

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }
}

/// The font header table.
#[derive(Clone, Debug, PartialEq)]
pub struct FontHeader {
    pub version: (u16, u16),
    pub font_revision: Fixed,
    pub checksum_adjustment: u32,
    pub magic_number: u32,
    pub flags: u16,
    /// Design units per em, valid range 16..=16384.
    pub units_per_em: u16,
    pub created: LongDateTime,
    pub modified: LongDateTime,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: MacStyle,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
    /// 0 for short (`Offset16`) loca offsets, 1 for long (`Offset32`).
    pub index_to_loc_format: i16,
    pub glyph_data_format: i16,
}

impl FontHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let header = Self {
            version: input.read_version16()?,
            font_revision: input.read_fixed()?,
            checksum_adjustment: input.read_u32()?,
            magic_number: input.read_u32()?,
            flags: input.read_u16()?,
            units_per_em: input.read_u16()?,
            created: input.read_long_datetime()?,
            modified: input.read_long_datetime()?,
            x_min: input.read_i16()?,
            y_min: input.read_i16()?,
            x_max: input.read_i16()?,
            y_max: input.read_i16()?,
            mac_style: MacStyle::from_bits(input.read_u16()?),
            lowest_rec_ppem: input.read_u16()?,
            font_direction_hint: input.read_i16()?,
            index_to_loc_format: input.read_i16()?,
            glyph_data_format: input.read_i16()?,
        };

        // Plenty of shipping fonts get this wrong, so it is not treated as fatal.
        if header.magic_number != MAGIC_NUMBER {
            log::warn!(
                "head magic number is {:#010x}, expected {MAGIC_NUMBER:#010x}",
                header.magic_number
            );
        }
        bail_if!(header.units_per_em == 0, "head unitsPerEm is zero");

        Ok(header)
    }

    /// The font revision as a float, e.g. `1.5`.
    pub fn revision(&self) -> f64 {
        self.font_revision.to_bits() as f64 / 65536.0
    }

    pub fn created_unix_secs(&self) -> i64 {
        crate::buffer::apple_to_unix_secs(self.created)
    }

    pub fn modified_unix_secs(&self) -> i64 {
        crate::buffer::apple_to_unix_secs(self.modified)
    }
}
