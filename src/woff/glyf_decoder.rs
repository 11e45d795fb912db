//! Reconstruction of the `glyf` and `loca` tables from the WOFF2 transformed
//! glyph format.
//!
//! <https://www.w3.org/TR/WOFF2/#glyf_table_format>

use arrayvec::ArrayVec;
use bytes::{Buf, BufMut};

use crate::Round4;
use crate::error::{ReadError, bail_if, u32_will_overflow, usize_will_overflow};
use crate::sfnt::compute_checksum;
use crate::variable_length::BufVariableExt as _;

// simple glyph flags
const GLYF_ON_CURVE: u8 = 1 << 0;
const GLYF_X_SHORT: u8 = 1 << 1;
const GLYF_Y_SHORT: u8 = 1 << 2;
const GLYF_REPEAT: u8 = 1 << 3;
const GLYF_THIS_X_IS_SAME: u8 = 1 << 4;
const GLYF_THIS_Y_IS_SAME: u8 = 1 << 5;
const OVERLAP_SIMPLE: u8 = 1 << 6;

const NUM_SUB_STREAMS: usize = 7;
const FLAG_OVERLAP_SIMPLE_BITMAP: u16 = 1 << 0;
// 98% of Google Fonts have no glyph above 5k bytes. Largest glyph ever observed was 72k bytes
const DEFAULT_GLYPH_BUF_SIZE: usize = 5120;

const FLAG_ARG_1_AND_2_ARE_WORDS: u16 = 1 << 0;
const FLAG_WE_HAVE_A_SCALE: u16 = 1 << 3;
const FLAG_MORE_COMPONENTS: u16 = 1 << 5;
const FLAG_WE_HAVE_AN_X_AND_Y_SCALE: u16 = 1 << 6;
const FLAG_WE_HAVE_A_TWO_BY_TWO: u16 = 1 << 7;
const FLAG_WE_HAVE_INSTRUCTIONS: u16 = 1 << 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
    pub on_curve: bool,
}

/// Output of [`decode_glyf_table`].
#[derive(Debug)]
pub struct GlyfAndLocaData {
    /// The number of glyphs in the glyf table
    pub num_glyphs: u16,
    /// loca index format
    pub index_format: u16,
    /// The x_min of the bounding box of each glyph, 0 for empty glyphs.
    /// Used to reconstruct the hmtx table.
    pub x_mins: Vec<i16>,
    /// Encoded OpenType "glyf" table
    pub glyf_table: Vec<u8>,
    pub glyf_checksum: u32,
    /// Encoded OpenType "loca" table
    pub loca_table: Vec<u8>,
    pub loca_checksum: u32,
}

/// Decode a WOFF2 transformed glyf table into plain `glyf` and `loca` tables.
pub fn decode_glyf_table(data: &[u8]) -> Result<GlyfAndLocaData, ReadError> {
    GlyfDecoder::new(data)?.decode()
}

struct GlyfDecoder<'a> {
    n_contour_stream: &'a [u8],
    n_points_stream: &'a [u8],
    flag_stream: &'a [u8],
    glyph_stream: &'a [u8],
    composite_stream: &'a [u8],
    bbox_bitmap: &'a [u8],
    bbox_stream: &'a [u8],
    instruction_stream: &'a [u8],
    overlap_bitmap: Option<&'a [u8]>,
    glyph_buf: Vec<u8>,

    num_glyphs: u16,
    index_format: u16,
}

impl<'a> GlyfDecoder<'a> {
    fn new(data: &'a [u8]) -> Result<GlyfDecoder<'a>, ReadError> {
        let mut input = data;
        let _reserved: u16 = input.try_get_u16()?;
        let flags: u16 = input.try_get_u16()?;
        let has_overlap_bitmap: bool = (flags & FLAG_OVERLAP_SIMPLE_BITMAP) != 0;
        let num_glyphs = input.try_get_u16()?;
        let index_format = input.try_get_u16()?;

        let mut offset: usize = (2 + NUM_SUB_STREAMS) * 4;
        bail_if!(offset > data.len(), "transformed glyf header truncated");

        // Invariant from here on: data.len() >= offset
        let mut substreams: ArrayVec<&[u8], NUM_SUB_STREAMS> = ArrayVec::new();
        for _ in 0..NUM_SUB_STREAMS {
            let substream_size: usize = input.try_get_u32()? as usize;
            bail_if!(
                substream_size > data.len() - offset,
                "glyf substream of {substream_size} bytes overruns table"
            );
            substreams.push(&data[offset..(offset + substream_size)]);
            offset += substream_size;
        }

        // Safe because num_glyphs is bounded
        let bitmap_length: usize = ((num_glyphs as usize + 31) >> 5) << 2;
        bail_if!(bitmap_length > substreams[5].len(), "bbox bitmap truncated");
        let (bbox_bitmap, bbox_stream) = substreams[5].split_at(bitmap_length);

        let overlap_bitmap = if has_overlap_bitmap {
            let overlap_bitmap_length = (num_glyphs as usize + 7) >> 3;
            bail_if!(
                overlap_bitmap_length > data.len() - offset,
                "overlap bitmap truncated"
            );
            Some(&data[offset..(offset + overlap_bitmap_length)])
        } else {
            None
        };

        Ok(GlyfDecoder {
            n_contour_stream: substreams[0],
            n_points_stream: substreams[1],
            flag_stream: substreams[2],
            glyph_stream: substreams[3],
            composite_stream: substreams[4],
            bbox_bitmap,
            bbox_stream,
            instruction_stream: substreams[6],
            overlap_bitmap,
            glyph_buf: Vec::with_capacity(DEFAULT_GLYPH_BUF_SIZE),
            num_glyphs,
            index_format,
        })
    }

    fn decode(mut self) -> Result<GlyfAndLocaData, ReadError> {
        let mut glyf_checksum: u32 = 0;
        let mut glyf_table: Vec<u8> = Vec::with_capacity(self.num_glyphs as usize * 12);
        let mut loca_values: Vec<u32> = Vec::with_capacity(self.num_glyphs as usize + 1);
        let mut x_mins: Vec<i16> = Vec::with_capacity(self.num_glyphs as usize);

        for i in 0..(self.num_glyphs as usize) {
            loca_values.push(glyf_table.len() as u32);

            let n_contours: i16 = self.n_contour_stream.try_get_i16()?;
            let glyph_has_bbox = bit_is_set(self.bbox_bitmap, i);

            self.glyph_buf.clear();
            if n_contours == -1 {
                bail_if!(!glyph_has_bbox, "composite glyph {i} has no explicit bbox");
                self.decode_composite_glyph()?;
            } else if n_contours > 0 {
                // same indexing as the bbox bitmap, different bitmap
                let has_overlap_bit = self
                    .overlap_bitmap
                    .is_some_and(|bitmap| bit_is_set(bitmap, i));
                self.decode_simple_glyph(n_contours, glyph_has_bbox, has_overlap_bit)?;
            } else {
                bail_if!(n_contours < -1, "glyph {i} has {n_contours} contours");
                bail_if!(glyph_has_bbox, "empty glyph {i} has a bbox");
            }

            // x_min lives at bytes 2..4 of the glyph header; hmtx may need it
            let x_min = match self.glyph_buf.get(2..4) {
                Some(&[hi, lo]) => i16::from_be_bytes([hi, lo]),
                _ => 0,
            };
            x_mins.push(x_min);

            glyf_checksum = glyf_checksum.wrapping_add(compute_checksum(&self.glyph_buf));
            glyf_table.extend_from_slice(&self.glyph_buf);
            glyf_table.resize(Round4!(glyf_table.len()), 0);
        }

        // loca[n] is the length of the glyf table
        loca_values.push(glyf_table.len() as u32);
        bail_if!(
            self.index_format == 0 && glyf_table.len() > 0x1FFFF,
            "glyf table too large for short loca offsets"
        );
        let loca_table = generate_loca_table(&loca_values, self.index_format);
        let loca_checksum = compute_checksum(&loca_table);

        Ok(GlyfAndLocaData {
            num_glyphs: self.num_glyphs,
            index_format: self.index_format,
            x_mins,
            glyf_table,
            glyf_checksum,
            loca_table,
            loca_checksum,
        })
    }

    fn decode_composite_glyph(&mut self) -> Result<(), ReadError> {
        // Measure on a copy so the bytes counted can then be copied verbatim
        let mut lookahead = self.composite_stream;
        let (composite_size, have_instructions) = compute_size_of_composite(&mut lookahead)?;

        let instruction_size: u16 = if have_instructions {
            self.glyph_stream.try_get_variable_255_u16()?
        } else {
            0
        };

        self.glyph_buf
            .reserve(12 + composite_size + instruction_size as usize);

        self.glyph_buf.put_i16(-1);
        self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        self.composite_stream
            .try_read_bytes_into(composite_size, &mut self.glyph_buf)?;

        if have_instructions {
            self.glyph_buf.put_u16(instruction_size);
            self.instruction_stream
                .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;
        }

        Ok(())
    }

    fn decode_simple_glyph(
        &mut self,
        n_contours: i16,
        glyph_has_bbox: bool,
        has_overlap_bit: bool,
    ) -> Result<(), ReadError> {
        let n_contours = n_contours as usize;

        let mut n_points_vec: Vec<u16> = Vec::with_capacity(n_contours);
        let mut total_n_points: u32 = 0;
        for _ in 0..n_contours {
            let n_points_contour: u16 = self.n_points_stream.try_get_variable_255_u16()?;
            n_points_vec.push(n_points_contour);
            bail_if!(u32_will_overflow(total_n_points, n_points_contour as u32));
            total_n_points += n_points_contour as u32;
        }
        let flag_size: usize = total_n_points as usize;
        bail_if!(flag_size > self.flag_stream.len(), "flag stream truncated");

        let mut points = Vec::with_capacity(flag_size);
        let triplet_bytes_consumed =
            decode_triplet(&self.flag_stream[..flag_size], self.glyph_stream, &mut points)?;
        self.flag_stream.advance(flag_size);
        self.glyph_stream.advance(triplet_bytes_consumed);

        let instruction_size: u16 = self.glyph_stream.try_get_variable_255_u16()?;
        bail_if!(total_n_points >= (1 << 27));

        self.glyph_buf.reserve(
            12 + 2 * n_contours + 5 * (total_n_points as usize) + (instruction_size as usize),
        );

        self.glyph_buf.put_i16(n_contours as i16);
        if glyph_has_bbox {
            self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        } else {
            write_bbox(&points, &mut self.glyph_buf);
        }

        let mut end_point: i32 = -1;
        for contour in n_points_vec {
            end_point += contour as i32;
            bail_if!(end_point >= 65536, "contour end point overflows");
            self.glyph_buf.put_u16(end_point as u16);
        }

        self.glyph_buf.put_u16(instruction_size);
        self.instruction_stream
            .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;

        write_glyph_points(&points, has_overlap_bit, &mut self.glyph_buf);

        Ok(())
    }
}

/// Bit `index` of a most-significant-bit-first bitmap.
fn bit_is_set(bitmap: &[u8], index: usize) -> bool {
    bitmap
        .get(index >> 3)
        .is_some_and(|byte| byte & (0x80 >> (index & 7)) != 0)
}

/// Append the flag and coordinate arrays of a simple glyph.
fn write_glyph_points(points: &[Point], has_overlap_bit: bool, dst: &mut impl BufMut) {
    // Flags are buffered until it is known whether the next one repeats them
    let mut last_flag: Option<u8> = None;
    let mut repeat_count: u8 = 0;
    let mut last_x: i32 = 0;
    let mut last_y: i32 = 0;

    for (i, point) in points.iter().enumerate() {
        let mut flag: u8 = 0;
        if point.on_curve {
            flag |= GLYF_ON_CURVE;
        }
        if has_overlap_bit && i == 0 {
            flag |= OVERLAP_SIMPLE;
        }

        let dx: i32 = point.x - last_x;
        if dx == 0 {
            flag |= GLYF_THIS_X_IS_SAME;
        } else if dx > -256 && dx < 256 {
            flag |= GLYF_X_SHORT | (if dx > 0 { GLYF_THIS_X_IS_SAME } else { 0 });
        }

        let dy: i32 = point.y - last_y;
        if dy == 0 {
            flag |= GLYF_THIS_Y_IS_SAME;
        } else if dy > -256 && dy < 256 {
            flag |= GLYF_Y_SHORT | (if dy > 0 { GLYF_THIS_Y_IS_SAME } else { 0 });
        }

        match last_flag {
            // a repeat count has to fit in one byte
            Some(previous) if previous == flag && repeat_count < 255 => repeat_count += 1,
            Some(previous) => {
                put_flag(dst, previous, repeat_count);
                repeat_count = 0;
            }
            None => {}
        }

        last_x = point.x;
        last_y = point.y;
        last_flag = Some(flag);
    }
    if let Some(previous) = last_flag {
        put_flag(dst, previous, repeat_count);
    }

    let mut last_x = 0;
    for point in points {
        let dx: i32 = point.x - last_x;
        if dx == 0 {
            // implied by the flag
        } else if dx > -256 && dx < 256 {
            dst.put_u8(dx.unsigned_abs() as u8);
        } else {
            // will always fit for valid input, but overflow is harmless
            dst.put_i16(dx as i16)
        }
        last_x = point.x;
    }

    let mut last_y = 0;
    for point in points {
        let dy: i32 = point.y - last_y;
        if dy == 0 {
            // implied by the flag
        } else if dy > -256 && dy < 256 {
            dst.put_u8(dy.unsigned_abs() as u8);
        } else {
            dst.put_i16(dy as i16)
        }
        last_y = point.y;
    }
}

fn put_flag(dst: &mut impl BufMut, flag: u8, repeat_count: u8) {
    if repeat_count > 0 {
        dst.put_u8(flag | GLYF_REPEAT);
        dst.put_u8(repeat_count);
    } else {
        dst.put_u8(flag);
    }
}

/// Compute the bounding box of the coordinates and append it as
/// `xMin, yMin, xMax, yMax`.
fn write_bbox(points: &[Point], dst: &mut impl BufMut) {
    let (mut x_min, mut y_min, mut x_max, mut y_max) = match points.first() {
        Some(first) => (first.x, first.y, first.x, first.y),
        None => (0, 0, 0, 0),
    };
    for &Point { x, y, .. } in points.iter().skip(1) {
        x_min = x.min(x_min);
        x_max = x.max(x_max);
        y_min = y.min(y_min);
        y_max = y.max(y_max);
    }

    dst.put_i16(x_min as i16);
    dst.put_i16(y_min as i16);
    dst.put_i16(x_max as i16);
    dst.put_i16(y_max as i16);
}

fn compute_size_of_composite(composite_stream: &mut impl Buf) -> Result<(usize, bool), ReadError> {
    let mut bytes_read: usize = 0;
    let mut we_have_instructions: bool = false;
    let mut flags: u16 = FLAG_MORE_COMPONENTS;
    while flags & FLAG_MORE_COMPONENTS != 0 {
        flags = composite_stream.try_get_u16()?;
        we_have_instructions |= (flags & FLAG_WE_HAVE_INSTRUCTIONS) != 0;
        let mut arg_size: usize = 2; // glyph index
        if flags & FLAG_ARG_1_AND_2_ARE_WORDS != 0 {
            arg_size += 4;
        } else {
            arg_size += 2;
        }
        if flags & FLAG_WE_HAVE_A_SCALE != 0 {
            arg_size += 2;
        } else if flags & FLAG_WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            arg_size += 4;
        } else if flags & FLAG_WE_HAVE_A_TWO_BY_TWO != 0 {
            arg_size += 8;
        }
        if composite_stream.remaining() < arg_size {
            return Err(ReadError::OutOfBounds);
        }
        composite_stream.advance(arg_size);

        // 2 bytes for the flags + arg_size
        bytes_read += 2 + arg_size
    }

    Ok((bytes_read, we_have_instructions))
}

/// Decode the point triplets for `flags_in` from `in_`, returning the number
/// of bytes of `in_` consumed.
fn decode_triplet(flags_in: &[u8], in_: &[u8], result: &mut Vec<Point>) -> Result<usize, ReadError> {
    #[inline(always)]
    fn with_sign(flag: i32, baseval: i32) -> i32 {
        // Precondition: 0 <= baseval < 65536 (to avoid integer overflow)
        if (flag & 1) != 0 { baseval } else { -baseval }
    }

    #[inline(always)]
    fn safe_add(a: i32, b: i32) -> Result<i32, ReadError> {
        a.checked_add(b)
            .ok_or_else(|| ReadError::Malformed("glyph coordinate overflows".into()))
    }

    let mut x: i32 = 0;
    let mut y: i32 = 0;

    bail_if!(flags_in.len() > in_.len(), "glyph stream shorter than flag stream");

    let mut triplet_index: usize = 0;

    for &flag in flags_in {
        let on_curve: bool = (flag >> 7) == 0;
        let flag = (flag & 0x7f) as i32;

        let n_data_bytes: usize = if flag < 84 {
            1
        } else if flag < 120 {
            2
        } else if flag < 124 {
            3
        } else {
            4
        };

        bail_if!(
            usize_will_overflow(triplet_index, n_data_bytes)
                || (triplet_index + n_data_bytes) > in_.len()
        );

        let dx: i32;
        let dy: i32;
        if flag < 10 {
            dx = 0;
            dy = with_sign(flag, ((flag & 14) << 7) + in_[triplet_index] as i32);
        } else if flag < 20 {
            dx = with_sign(flag, (((flag - 10) & 14) << 7) + in_[triplet_index] as i32);
            dy = 0;
        } else if flag < 84 {
            let b0: i32 = flag - 20;
            let b1: i32 = in_[triplet_index] as i32;
            dx = with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4));
            dy = with_sign(flag >> 1, 1 + ((b0 & 0x0c) << 2) + (b1 & 0x0f));
        } else if flag < 120 {
            let b0: i32 = flag - 84;
            dx = with_sign(flag, 1 + ((b0 / 12) << 8) + in_[triplet_index] as i32);
            dy = with_sign(
                flag >> 1,
                1 + (((b0 % 12) >> 2) << 8) + in_[triplet_index + 1] as i32,
            );
        } else if flag < 124 {
            let b2: i32 = in_[triplet_index + 1] as i32;
            dx = with_sign(flag, ((in_[triplet_index] as i32) << 4) + (b2 >> 4));
            dy = with_sign(
                flag >> 1,
                ((b2 & 0x0f) << 8) + in_[triplet_index + 2] as i32,
            );
        } else {
            dx = with_sign(
                flag,
                ((in_[triplet_index] as i32) << 8) + in_[triplet_index + 1] as i32,
            );
            dy = with_sign(
                flag >> 1,
                ((in_[triplet_index + 2] as i32) << 8) + in_[triplet_index + 3] as i32,
            );
        }
        triplet_index += n_data_bytes;
        x = safe_add(x, dx)?;
        y = safe_add(y, dy)?;

        result.push(Point { x, y, on_curve });
    }

    Ok(triplet_index)
}

/// Generate a loca table given a slice of loca offsets and an index format
///
/// See <https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6loca.html>
fn generate_loca_table(loca_values: &[u32], index_format: u16) -> Vec<u8> {
    let offset_size: usize = if index_format != 0 { 4 } else { 2 };
    let mut loca_content: Vec<u8> = Vec::with_capacity(loca_values.len() * offset_size);
    if index_format != 0 {
        for &value in loca_values {
            // loca long version. The actual local offset is stored.
            loca_content.put_u32(value);
        }
    } else {
        for &value in loca_values {
            // loca short version. The actual local offset divided by 2 is stored.
            loca_content.put_u16((value >> 1) as u16);
        }
    }
    loca_content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TransformedGlyf, transformed_glyf_table};

    #[test]
    fn simple_glyph_round_trip() {
        let data = transformed_glyf_table(&TransformedGlyf {
            n_contours: vec![0, 1],
            n_points: vec![3],
            flags: vec![1, 11, 86],
            glyphs: vec![0, 100, 99, 99, 0],
            ..Default::default()
        });
        let decoded = decode_glyf_table(&data).unwrap();
        assert_eq!(decoded.num_glyphs, 2);

        #[rustfmt::skip]
        let expected_glyph: &[u8] = &[
            0, 1,                   // numberOfContours
            0, 0, 0, 0, 0, 100, 0, 100, // bbox
            0, 2,                   // endPtsOfContours
            0, 0,                   // instructionLength
            0x31, 0x33, 0x27,       // flags
            100, 100,               // x deltas
            100,                    // y deltas
        ];
        assert_eq!(decoded.glyf_table, expected_glyph);
        assert_eq!(decoded.loca_table, vec![0, 0, 0, 0, 0, 10]);
        assert_eq!(decoded.x_mins, vec![0, 0]);
        assert_eq!(decoded.glyf_checksum, compute_checksum(expected_glyph));
    }

    #[test]
    fn repeated_flags_are_packed() {
        let points: Vec<Point> = (0..4)
            .map(|i| Point {
                x: i * 10,
                y: 0,
                on_curve: true,
            })
            .collect();
        let mut out = Vec::new();
        write_glyph_points(&points, false, &mut out);
        // first point is (0, 0), the rest share one flag
        assert_eq!(out, vec![0x31, 0x33 | GLYF_REPEAT, 2, 10, 10, 10]);
    }

    #[test]
    fn composite_glyph_copies_streams() {
        let data = transformed_glyf_table(&TransformedGlyf {
            n_contours: vec![-1],
            // one component: word args, no more components
            composites: vec![0x00, 0x01, 0x00, 0x02, 0x00, 0x10, 0x00, 0x20],
            bbox_bitmap: vec![0x80, 0, 0, 0],
            bboxes: vec![0xFF, 0xF6, 0, 0, 0, 50, 0, 60],
            ..Default::default()
        });
        let decoded = decode_glyf_table(&data).unwrap();
        assert_eq!(&decoded.glyf_table[..2], &[0xFF, 0xFF]);
        assert_eq!(decoded.glyf_table.len(), 20);
        assert_eq!(decoded.x_mins, vec![-10]);
    }

    #[test]
    fn composite_without_bbox_is_rejected() {
        let data = transformed_glyf_table(&TransformedGlyf {
            n_contours: vec![-1],
            composites: vec![0x00, 0x01, 0x00, 0x02, 0x00, 0x10, 0x00, 0x20],
            ..Default::default()
        });
        assert!(decode_glyf_table(&data).is_err());
    }

    #[test]
    fn truncated_composite_is_rejected() {
        let data = transformed_glyf_table(&TransformedGlyf {
            n_contours: vec![-1],
            composites: vec![0x00, 0x01, 0x00, 0x02],
            bbox_bitmap: vec![0x80, 0, 0, 0],
            bboxes: vec![0; 8],
            ..Default::default()
        });
        assert!(decode_glyf_table(&data).is_err());
    }
}
