//! The legacy [kern](https://docs.microsoft.com/en-us/typography/opentype/spec/kern) table
//!
//! Both the Microsoft (version 0) and Apple (version 1.0) layouts are read.
//! Only format 0 subtables, ordered pair lists, are decoded; other formats are
//! kept as opaque entries.

use crate::buffer::FontReader;
use crate::error::{ReadError, bail_if};

/// A kerning pair value, in font units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernPair {
    pub left: u16,
    pub right: u16,
    pub value: i16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernSubtable {
    pub format: u8,
    pub horizontal: bool,
    pub cross_stream: bool,
    /// Minimum-value subtables, skipped when computing adjustments.
    pub minimum: bool,
    /// Sorted by `(left, right)`. Empty for formats other than 0.
    pub pairs: Vec<KernPair>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Kerning {
    pub version: u32,
    pub subtables: Vec<KernSubtable>,
}

impl Kerning {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let first = input.read_u16()?;
        let (version, n_tables) = if first == 0 {
            (0, input.read_u16()? as u32)
        } else {
            // Apple: 32 bit version 1.0 followed by a 32 bit table count
            let minor = input.read_u16()?;
            bail_if!(first != 1 || minor != 0, "unknown kern version {first}.{minor}");
            (0x0001_0000, input.read_u32()?)
        };

        let mut subtables = Vec::new();
        for _ in 0..n_tables {
            let start = input.offset();
            let subtable = if version == 0 {
                let _sub_version = input.read_u16()?;
                let length = input.read_u16()? as usize;
                let coverage = input.read_u16()?;
                let format = (coverage >> 8) as u8;
                let entry = KernSubtable {
                    format,
                    horizontal: coverage & 0x1 != 0,
                    minimum: coverage & 0x2 != 0,
                    cross_stream: coverage & 0x4 != 0,
                    pairs: Vec::new(),
                };
                (entry, length)
            } else {
                let length = input.read_u32()? as usize;
                let coverage = input.read_u16()?;
                let _tuple_index = input.read_u16()?;
                let entry = KernSubtable {
                    format: (coverage & 0xFF) as u8,
                    horizontal: coverage & 0x8000 == 0,
                    cross_stream: coverage & 0x4000 != 0,
                    minimum: false,
                    pairs: Vec::new(),
                };
                (entry, length)
            };
            let (mut subtable, length) = subtable;
            if subtable.format == 0 {
                subtable.pairs = read_pairs(&mut input)?;
            } else {
                log::debug!("kern subtable format {} is not decoded", subtable.format);
            }
            subtables.push(subtable);
            // the MS header length field is 16 bits and overflows on large
            // subtables, so only seek when it lands past what was read
            let end = start + length;
            if end > input.offset() && end <= data.len() {
                input.seek(end)?;
            }
        }

        Ok(Self { version, subtables })
    }

    /// Horizontal adjustment between two glyphs, summed over every
    /// horizontal, non cross-stream subtable.
    pub fn kerning(&self, left: u16, right: u16) -> i16 {
        self.subtables
            .iter()
            .filter(|s| s.horizontal && !s.cross_stream && !s.minimum)
            .filter_map(|s| {
                s.pairs
                    .binary_search_by_key(&(left, right), |p| (p.left, p.right))
                    .ok()
                    .map(|index| s.pairs[index].value)
            })
            .fold(0i16, |acc, value| acc.saturating_add(value))
    }
}

fn read_pairs(input: &mut FontReader<'_>) -> Result<Vec<KernPair>, ReadError> {
    let n_pairs = input.read_u16()?;
    let _search_range = input.read_u16()?;
    let _entry_selector = input.read_u16()?;
    let _range_shift = input.read_u16()?;
    let mut pairs = Vec::with_capacity(n_pairs as usize);
    for _ in 0..n_pairs {
        pairs.push(KernPair {
            left: input.read_u16()?,
            right: input.read_u16()?,
            value: input.read_i16()?,
        });
    }
    // lookups rely on ordering; not every font gets it right
    if !pairs.is_sorted_by_key(|p| (p.left, p.right)) {
        log::warn!("kern pairs are not sorted");
        pairs.sort_by_key(|p| (p.left, p.right));
    }
    Ok(pairs)
}
