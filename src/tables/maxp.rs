//! The [maxp](https://docs.microsoft.com/en-us/typography/opentype/spec/maxp) table

use crate::buffer::FontReader;
use crate::error::{ReadError, bail};

const VERSION_0_5: u32 = 0x00005000;
const VERSION_1_0: u32 = 0x00010000;

/// The maximum profile table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaximumProfile {
    pub version: u32,
    pub num_glyphs: u16,
    /// Only present in version 1.0 tables (fonts with TrueType outlines).
    pub truetype: Option<TrueTypeLimits>,
}

/// The version 1.0 fields of `maxp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrueTypeLimits {
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_zones: u16,
    pub max_twilight_points: u16,
    pub max_storage: u16,
    pub max_function_defs: u16,
    pub max_instruction_defs: u16,
    pub max_stack_elements: u16,
    pub max_size_of_instructions: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

impl MaximumProfile {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let version = input.read_u32()?;
        let num_glyphs = input.read_u16()?;
        let truetype = match version {
            VERSION_0_5 => None,
            VERSION_1_0 => Some(TrueTypeLimits {
                max_points: input.read_u16()?,
                max_contours: input.read_u16()?,
                max_composite_points: input.read_u16()?,
                max_composite_contours: input.read_u16()?,
                max_zones: input.read_u16()?,
                max_twilight_points: input.read_u16()?,
                max_storage: input.read_u16()?,
                max_function_defs: input.read_u16()?,
                max_instruction_defs: input.read_u16()?,
                max_stack_elements: input.read_u16()?,
                max_size_of_instructions: input.read_u16()?,
                max_component_elements: input.read_u16()?,
                max_component_depth: input.read_u16()?,
            }),
            other => bail!("unknown maxp version {other:#010x}"),
        };
        Ok(Self {
            version,
            num_glyphs,
            truetype,
        })
    }
}
