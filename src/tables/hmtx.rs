//! The [hmtx](https://docs.microsoft.com/en-us/typography/opentype/spec/hmtx) table

use crate::buffer::FontReader;
use crate::error::{ReadError, bail_if};

/// A long horizontal metric record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HMetric {
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

/// The horizontal metrics table.
///
/// The `hhea` table supplies the number of long records and `maxp` the total
/// glyph count; glyphs past the long records share the last advance width and
/// take their bearing from `left_side_bearings`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HorizontalMetrics {
    pub h_metrics: Vec<HMetric>,
    pub left_side_bearings: Vec<i16>,
}

impl HorizontalMetrics {
    /// Parse with the long record count from `hhea`. When `num_glyphs` is not
    /// known every remaining pair of bytes is taken as a trailing bearing.
    pub fn parse(
        data: &[u8],
        number_of_h_metrics: u16,
        num_glyphs: Option<u16>,
    ) -> Result<Self, ReadError> {
        // "...only one entry need be in the array, but that entry is required."
        bail_if!(number_of_h_metrics == 0, "hhea numberOfHMetrics is zero");

        let mut input = FontReader::new(data);
        let mut h_metrics = Vec::with_capacity(number_of_h_metrics as usize);
        for _ in 0..number_of_h_metrics {
            h_metrics.push(HMetric {
                advance_width: input.read_u16()?,
                left_side_bearing: input.read_i16()?,
            });
        }

        let n_bearings = match num_glyphs {
            Some(num_glyphs) => num_glyphs.saturating_sub(number_of_h_metrics) as usize,
            None => input.remaining_as_slice().len() / 2,
        };
        let mut left_side_bearings = Vec::with_capacity(n_bearings);
        for _ in 0..n_bearings {
            left_side_bearings.push(input.read_i16()?);
        }

        Ok(Self {
            h_metrics,
            left_side_bearings,
        })
    }

    /// Number of glyphs described by this table.
    pub fn len(&self) -> usize {
        self.h_metrics.len() + self.left_side_bearings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.h_metrics.is_empty()
    }

    /// Metrics for `glyph_id`. Glyph ids past the end of the table are
    /// clamped to the last entry.
    pub fn metric(&self, glyph_id: u16) -> HMetric {
        let index = glyph_id as usize;
        let Some(last) = self.h_metrics.last().copied() else {
            return HMetric::default();
        };
        if let Some(metric) = self.h_metrics.get(index) {
            return *metric;
        }
        let left_side_bearing = self
            .left_side_bearings
            .get(index - self.h_metrics.len())
            .or(self.left_side_bearings.last())
            .copied()
            .unwrap_or(last.left_side_bearing);
        HMetric {
            advance_width: last.advance_width,
            left_side_bearing,
        }
    }

    pub fn advance_width(&self, glyph_id: u16) -> u16 {
        self.metric(glyph_id).advance_width
    }

    pub fn left_side_bearing(&self, glyph_id: u16) -> i16 {
        self.metric(glyph_id).left_side_bearing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::BeBuffer;

    fn sample() -> Vec<u8> {
        BeBuffer::new()
            .push(500u16)
            .push(10i16)
            .push(600u16)
            .push(-5i16)
            .push(7i16)
            .push(8i16)
            .into_vec()
    }

    #[test]
    fn long_and_short_records() {
        let hmtx = HorizontalMetrics::parse(&sample(), 2, Some(4)).unwrap();
        assert_eq!(hmtx.len(), 4);
        assert_eq!(hmtx.metric(0), HMetric { advance_width: 500, left_side_bearing: 10 });
        assert_eq!(hmtx.metric(1), HMetric { advance_width: 600, left_side_bearing: -5 });
        // trailing glyphs repeat the last advance
        assert_eq!(hmtx.metric(3), HMetric { advance_width: 600, left_side_bearing: 8 });
    }

    #[test]
    fn out_of_range_glyphs_clamp() {
        let hmtx = HorizontalMetrics::parse(&sample(), 2, Some(4)).unwrap();
        assert_eq!(hmtx.metric(1000), HMetric { advance_width: 600, left_side_bearing: 8 });

        let hmtx = HorizontalMetrics::parse(&sample()[..8], 2, Some(2)).unwrap();
        assert_eq!(hmtx.metric(9), HMetric { advance_width: 600, left_side_bearing: -5 });
    }

    #[test]
    fn glyph_count_inferred_without_maxp() {
        let hmtx = HorizontalMetrics::parse(&sample(), 2, None).unwrap();
        assert_eq!(hmtx.left_side_bearings, vec![7, 8]);
    }

    #[test]
    fn truncated_table_fails() {
        assert!(HorizontalMetrics::parse(&sample()[..6], 2, None).is_err());
        assert!(HorizontalMetrics::parse(&sample(), 0, None).is_err());
    }
}
