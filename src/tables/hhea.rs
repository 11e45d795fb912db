//! The [hhea](https://docs.microsoft.com/en-us/typography/opentype/spec/hhea) table

use crate::buffer::FontReader;
use crate::error::ReadError;

/// The horizontal header table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HorizontalHeader {
    pub version: (u16, u16),
    /// Typographic ascent, in font units.
    pub ascender: i16,
    /// Typographic descent, in font units. Usually negative.
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub metric_data_format: i16,
    /// Number of long metric entries at the start of `hmtx`.
    pub number_of_h_metrics: u16,
}

impl HorizontalHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let version = input.read_version16()?;
        let ascender = input.read_i16()?;
        let descender = input.read_i16()?;
        let line_gap = input.read_i16()?;
        let advance_width_max = input.read_u16()?;
        let min_left_side_bearing = input.read_i16()?;
        let min_right_side_bearing = input.read_i16()?;
        let x_max_extent = input.read_i16()?;
        let caret_slope_rise = input.read_i16()?;
        let caret_slope_run = input.read_i16()?;
        let caret_offset = input.read_i16()?;
        input.skip(8)?; // reserved
        let metric_data_format = input.read_i16()?;
        let number_of_h_metrics = input.read_u16()?;

        Ok(Self {
            version,
            ascender,
            descender,
            line_gap,
            advance_width_max,
            min_left_side_bearing,
            min_right_side_bearing,
            x_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            metric_data_format,
            number_of_h_metrics,
        })
    }
}
