//! Reconstruction of the `hmtx` table from the WOFF2 transformed format, in
//! which left side bearings equal to the glyph's `xMin` are omitted.
//!
//! <https://www.w3.org/TR/WOFF2/#hmtx_table_format>

use bytes::{Buf, BufMut};

use crate::error::{ReadError, bail_if};

#[derive(Debug)]
pub struct HmtxData {
    num_glyphs: u16,
    num_hmetrics: u16,
    advance_widths: Vec<u16>,
    lsbs: Vec<i16>,
}

/// Decode a WOFF2 transformed hmtx table.
///
/// `x_mins` holds one entry per glyph, as produced by the glyf decoder.
pub fn decode_hmtx_table(
    input: &mut impl Buf,
    num_glyphs: u16,
    num_hmetrics: u16,
    x_mins: &[i16],
) -> Result<HmtxData, ReadError> {
    let hmtx_flags: u8 = input.try_get_u8()?;
    let has_proportional_lsbs: bool = (hmtx_flags & 1) == 0;
    let has_monospace_lsbs: bool = (hmtx_flags & 2) == 0;

    bail_if!(
        (hmtx_flags & 0xFC) != 0,
        "Illegal hmtx flags; bits 2-7 must be 0"
    );

    // you say you transformed but there is little evidence of it
    bail_if!(has_proportional_lsbs && has_monospace_lsbs);

    bail_if!(
        x_mins.len() != num_glyphs as usize,
        "glyf has {} glyphs, maxp says {num_glyphs}",
        x_mins.len()
    );

    // num_glyphs 0 is OK if there is no 'glyf' but cannot then xform 'hmtx'.
    bail_if!(num_hmetrics > num_glyphs);

    // "...only one entry need be in the array, but that entry is required."
    // <https://www.microsoft.com/typography/otspec/hmtx.htm>
    bail_if!(num_hmetrics < 1);

    let mut advance_widths: Vec<u16> = Vec::with_capacity(num_hmetrics as usize);
    for _ in 0..num_hmetrics {
        advance_widths.push(input.try_get_u16()?);
    }

    // proportional and monospace bearings share one list
    let mut lsbs: Vec<i16> = Vec::with_capacity(num_glyphs as usize);
    for i in 0..num_hmetrics {
        lsbs.push(match has_proportional_lsbs {
            true => input.try_get_i16()?,
            false => x_mins[i as usize],
        });
    }
    for i in num_hmetrics..num_glyphs {
        lsbs.push(match has_monospace_lsbs {
            true => input.try_get_i16()?,
            false => x_mins[i as usize],
        });
    }

    Ok(HmtxData {
        num_glyphs,
        num_hmetrics,
        advance_widths,
        lsbs,
    })
}

/// Serialize decoded metrics as a plain hmtx table.
pub fn generate_hmtx_table(hmtx_data: &HmtxData) -> Vec<u8> {
    let num_glyphs = hmtx_data.num_glyphs as usize;
    let num_hmetrics = hmtx_data.num_hmetrics as usize;

    let mut hmtx_table: Vec<u8> = Vec::with_capacity(2 * num_glyphs + 2 * num_hmetrics);
    for i in 0..num_glyphs {
        if i < num_hmetrics {
            hmtx_table.put_u16(hmtx_data.advance_widths[i]);
        }
        hmtx_table.put_i16(hmtx_data.lsbs[i]);
    }
    hmtx_table
}
