//! Fitting a run of text into a width using a face's horizontal metrics.
//!
//! All accumulation is done in integer font units; conversion to output
//! units (points, pixels, whatever `em_size` is expressed in) happens once
//! at the end of a measurement.

use std::collections::HashMap;

use crate::error::ReadError;
use crate::table_tags::{CMAP, HEAD, HHEA, HMTX};
use crate::tables::cmap::CharacterMap;
use crate::tables::hhea::HorizontalHeader;
use crate::tables::hmtx::{HMetric, HorizontalMetrics};
use crate::tables::os2::Os2;
use crate::typeface::TypefaceFont;

const SPACE: char = ' ';
const HYPHEN: char = '-';

/// Which table supplies ascender, descender and line gap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontUnits {
    /// OS/2 typographic metrics when the font sets `USE_TYPO_METRICS`,
    /// otherwise `hhea`.
    #[default]
    UseFontPreference,
    /// Always `hhea`.
    UseHeadMetrics,
    /// OS/2 typographic metrics whenever the font has them.
    UseTypographicMetrics,
}

/// Options for a single measurement. Spacing is in output units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TypeMeasureOptions {
    /// Added to every character other than a space.
    pub character_spacing: Option<f64>,
    /// Added to every space.
    pub word_spacing: Option<f64>,
    pub break_on_word_boundaries: bool,
    pub ignore_starting_white_space: bool,
    pub break_on_hyphens: bool,
    pub font_units: FontUnits,
}

impl TypeMeasureOptions {
    pub fn word_boundaries(mut self, enabled: bool) -> Self {
        self.break_on_word_boundaries = enabled;
        self
    }

    pub fn hyphens(mut self, enabled: bool) -> Self {
        self.break_on_hyphens = enabled;
        self
    }

    pub fn ignore_starting_white_space(mut self, enabled: bool) -> Self {
        self.ignore_starting_white_space = enabled;
        self
    }

    pub fn spacing(mut self, character: Option<f64>, word: Option<f64>) -> Self {
        self.character_spacing = character;
        self.word_spacing = word;
        self
    }

    pub fn font_units(mut self, font_units: FontUnits) -> Self {
        self.font_units = font_units;
        self
    }
}

/// Result of [`TypefaceMetrics::measure_line`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineSize {
    pub required_width: f64,
    pub required_height: f64,
    /// Number of characters, counted from `first_character`, that fit.
    pub chars_fitted: usize,
    /// Index of the first measured character, after any skipped leading
    /// white space.
    pub first_character: usize,
    /// The line was cut back to a space or hyphen.
    pub on_word_boundary: bool,
}

/// Measures text against one face.
///
/// Advances are cached per character, so a measurer is used through
/// `&mut self` and can't be shared between threads without a lock.
#[derive(Debug)]
pub struct TypefaceMetrics<'a> {
    units_per_em: u16,
    cmap: &'a CharacterMap,
    hmtx: &'a HorizontalMetrics,
    hhea: &'a HorizontalHeader,
    os2: Option<&'a Os2>,
    advances: HashMap<char, HMetric>,
}

impl<'a> TypefaceMetrics<'a> {
    pub(crate) fn new(font: &'a TypefaceFont) -> Result<Self, ReadError> {
        let tables = font.tables();
        let (Some(head), Some(cmap), Some(hmtx), Some(hhea)) =
            (tables.head(), tables.cmap(), tables.hmtx(), tables.hhea())
        else {
            let missing = [
                (HEAD, tables.head().is_none()),
                (CMAP, tables.cmap().is_none()),
                (HMTX, tables.hmtx().is_none()),
                (HHEA, tables.hhea().is_none()),
            ];
            return Err(ReadError::MissingTables(
                missing
                    .into_iter()
                    .filter_map(|(tag, missing)| missing.then_some(tag))
                    .collect(),
            ));
        };
        Ok(Self {
            units_per_em: head.units_per_em,
            cmap,
            hmtx,
            hhea,
            os2: tables.os2(),
            advances: HashMap::new(),
        })
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// `(ascender, descender, line_gap)` in font units for `font_units`.
    pub fn vertical_metrics(&self, font_units: FontUnits) -> (i16, i16, i16) {
        let typo = self.os2.and_then(|os2| os2.typo_metrics.as_ref());
        let use_typo = match font_units {
            FontUnits::UseFontPreference => self.os2.is_some_and(Os2::use_typo_metrics),
            FontUnits::UseHeadMetrics => false,
            FontUnits::UseTypographicMetrics => {
                if typo.is_none() {
                    log::debug!("no OS/2 typographic metrics, using hhea");
                }
                true
            }
        };
        match typo {
            Some(typo) if use_typo => (typo.typo_ascender, typo.typo_descender, typo.typo_line_gap),
            _ => (self.hhea.ascender, self.hhea.descender, self.hhea.line_gap),
        }
    }

    /// `(ascender - descender + line_gap)` scaled to `em_size`.
    pub fn line_height(&self, em_size: f64, options: TypeMeasureOptions) -> f64 {
        let (ascender, descender, line_gap) = self.vertical_metrics(options.font_units);
        let units = ascender as i32 - descender as i32 + line_gap as i32;
        self.to_output(units as i64, em_size)
    }

    pub fn ascent(&self, em_size: f64, options: TypeMeasureOptions) -> f64 {
        let (ascender, _, _) = self.vertical_metrics(options.font_units);
        self.to_output(ascender as i64, em_size)
    }

    /// Distance below the baseline, as a positive number for typical fonts.
    pub fn descent(&self, em_size: f64, options: TypeMeasureOptions) -> f64 {
        let (_, descender, _) = self.vertical_metrics(options.font_units);
        self.to_output(-(descender as i64), em_size)
    }

    /// Metrics of the glyph `ch` maps to.
    pub fn char_metric(&mut self, ch: char) -> Result<HMetric, ReadError> {
        if let Some(metric) = self.advances.get(&ch) {
            return Ok(*metric);
        }
        let glyph_id = self.cmap.map_char(ch)?;
        let metric = self.hmtx.metric(glyph_id);
        self.advances.insert(ch, metric);
        Ok(metric)
    }

    /// Fit as much of `text`, starting at character `start_offset`, as
    /// possible into `available_width`.
    pub fn measure_line(
        &mut self,
        text: &str,
        start_offset: usize,
        em_size: f64,
        available_width: f64,
        options: TypeMeasureOptions,
    ) -> Result<LineSize, ReadError> {
        validate_size("em size", em_size, false)?;
        validate_size("available width", available_width, true)?;
        let chars: Vec<char> = text.chars().collect();
        if start_offset > chars.len() {
            return Err(ReadError::InvalidArgument(format!(
                "start offset {start_offset} is past the end of a {} character string",
                chars.len()
            )));
        }

        let required_height = self.line_height(em_size, options);
        let mut first = start_offset;
        if options.ignore_starting_white_space {
            while first < chars.len() && chars[first].is_whitespace() {
                first += 1;
            }
        }
        if first == chars.len() {
            return Ok(LineSize {
                required_height,
                first_character: first,
                ..Default::default()
            });
        }

        let total_units = (available_width * self.units_per_em as f64 / em_size).floor() as i64;
        let (character_spacing, word_spacing) = self.spacing_units(em_size, options);

        let mut width: i64 = 0;
        let mut count: usize = 0;
        let mut last_break: Option<(usize, i64)> = None;
        let mut fitted_all = true;

        for (index, &ch) in chars[first..].iter().enumerate() {
            let metric = self.char_metric(ch)?;
            let mut advance = metric.advance_width as i64;
            if index == 0 {
                advance -= metric.left_side_bearing as i64;
            }
            advance += if ch == SPACE {
                word_spacing
            } else {
                character_spacing
            };

            if ch == SPACE {
                last_break = Some((count, width));
            }
            if width + advance > total_units {
                fitted_all = false;
                break;
            }
            width += advance;
            count += 1;
            if ch == HYPHEN && options.break_on_hyphens {
                last_break = Some((count, width));
            }
        }

        let mut on_word_boundary = false;
        if !fitted_all && options.break_on_word_boundaries {
            if let Some((break_count, break_width)) = last_break {
                count = break_count;
                width = break_width;
                on_word_boundary = true;
            }
        }

        Ok(LineSize {
            required_width: self.to_output(width, em_size),
            required_height,
            chars_fitted: count,
            first_character: first,
            on_word_boundary,
        })
    }

    /// [`measure_line`](Self::measure_line), logging the error instead of
    /// returning it.
    pub fn try_measure_line(
        &mut self,
        text: &str,
        start_offset: usize,
        em_size: f64,
        available_width: f64,
        options: TypeMeasureOptions,
    ) -> Option<LineSize> {
        self.measure_line(text, start_offset, em_size, available_width, options)
            .inspect_err(|err| log::warn!("could not measure {text:?}: {err}"))
            .ok()
    }

    /// Width of the whole of `text`, with no line breaking.
    pub fn measure_width(
        &mut self,
        text: &str,
        em_size: f64,
        options: TypeMeasureOptions,
    ) -> Result<f64, ReadError> {
        validate_size("em size", em_size, false)?;
        let (character_spacing, word_spacing) = self.spacing_units(em_size, options);
        let mut width: i64 = 0;
        for (index, ch) in text.chars().enumerate() {
            let metric = self.char_metric(ch)?;
            width += metric.advance_width as i64;
            if index == 0 {
                width -= metric.left_side_bearing as i64;
            }
            width += if ch == SPACE {
                word_spacing
            } else {
                character_spacing
            };
        }
        Ok(self.to_output(width, em_size))
    }

    fn spacing_units(&self, em_size: f64, options: TypeMeasureOptions) -> (i64, i64) {
        let to_units =
            |spacing: Option<f64>| (spacing.unwrap_or(0.0) * self.units_per_em as f64 / em_size).round() as i64;
        (
            to_units(options.character_spacing),
            to_units(options.word_spacing),
        )
    }

    fn to_output(&self, units: i64, em_size: f64) -> f64 {
        units as f64 * em_size / self.units_per_em as f64
    }
}

fn validate_size(what: &str, value: f64, allow_zero: bool) -> Result<(), ReadError> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if valid {
        Ok(())
    } else {
        Err(ReadError::InvalidArgument(format!("{what} must be positive, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_typeface;
    use pretty_assertions::assert_eq;

    const TEXT: &str = "This is the text to measure";

    #[test]
    fn whole_line_fits() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let size = metrics
            .measure_line(TEXT, 0, 12.0, 1000.0, TypeMeasureOptions::default())
            .unwrap();
        assert_eq!(size.chars_fitted, TEXT.len());
        assert!(!size.on_word_boundary);
        assert_eq!(size.required_width, TEXT.len() as f64 * 400.0 * 12.0 / 1000.0);
    }

    #[test]
    fn mid_word_cut_and_rollback() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let size = metrics
            .measure_line(TEXT, 0, 12.0, 90.0, TypeMeasureOptions::default())
            .unwrap();
        assert_eq!(size.chars_fitted, 18);
        assert!(!size.on_word_boundary);

        let options = TypeMeasureOptions::default().word_boundaries(true);
        let size = metrics.measure_line(TEXT, 0, 12.0, 90.0, options).unwrap();
        assert_eq!(size.chars_fitted, 16);
        assert!(size.on_word_boundary);
        assert_eq!(size.required_width, 16.0 * 400.0 * 12.0 / 1000.0);
    }

    #[test]
    fn non_breaking_spaces_glue_words() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default().word_boundaries(true);

        let glued = TEXT.replacen("text ", "text\u{a0}", 1);
        let size = metrics.measure_line(&glued, 0, 12.0, 90.0, options).unwrap();
        assert_eq!(size.chars_fitted, 11);
        assert!(size.on_word_boundary);

        let no_spaces = TEXT.replace(' ', "\u{a0}");
        let size = metrics.measure_line(&no_spaces, 0, 12.0, 90.0, options).unwrap();
        assert_eq!(size.chars_fitted, 18);
        assert!(!size.on_word_boundary);
    }

    #[test]
    fn hyphens_stay_with_the_first_fragment() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let text = "well-known words";
        // 10 characters of room: the space that doesn't fit is a break
        let options = TypeMeasureOptions::default().word_boundaries(true);
        let size = metrics.measure_line(text, 0, 10.0, 40.0, options).unwrap();
        assert_eq!(size.chars_fitted, 10);
        assert!(size.on_word_boundary);

        // 9 characters of room and nowhere to break
        let size = metrics.measure_line(text, 0, 10.0, 36.0, options).unwrap();
        assert_eq!(size.chars_fitted, 9);
        assert!(!size.on_word_boundary);

        let size = metrics
            .measure_line(text, 0, 10.0, 36.0, options.hyphens(true))
            .unwrap();
        assert_eq!(size.chars_fitted, 5);
        assert!(size.on_word_boundary);
    }

    #[test]
    fn first_character_bearing_is_subtracted() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        // 'A' has a 50 unit left side bearing
        let width = metrics
            .measure_width("AA", 10.0, TypeMeasureOptions::default())
            .unwrap();
        assert_eq!(width, 750.0 * 10.0 / 1000.0);

        // 350 units is exactly one 'A' when it starts the line
        let size = metrics
            .measure_line("AA", 0, 10.0, 3.5, TypeMeasureOptions::default())
            .unwrap();
        assert_eq!(size.chars_fitted, 1);

        let size = metrics
            .measure_line("AA", 0, 10.0, 3.4, TypeMeasureOptions::default())
            .unwrap();
        assert_eq!(size.chars_fitted, 0);
    }

    #[test]
    fn spacing_is_added_per_character() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default().spacing(Some(1.0), Some(2.0));
        // at em 10, 1.0 is 100 units and 2.0 is 200 units
        let width = metrics.measure_width("a b", 10.0, options).unwrap();
        assert_eq!(width, (500.0 + 600.0 + 500.0) * 10.0 / 1000.0);
    }

    #[test]
    fn leading_white_space_is_skipped() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default().ignore_starting_white_space(true);
        let size = metrics.measure_line("   abc", 0, 10.0, 100.0, options).unwrap();
        assert_eq!(size.first_character, 3);
        assert_eq!(size.chars_fitted, 3);

        let size = metrics.measure_line("abc   ", 3, 10.0, 100.0, options).unwrap();
        assert_eq!(size.first_character, 6);
        assert_eq!(size.chars_fitted, 0);
        assert_eq!(size.required_width, 0.0);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default();
        assert_eq!(metrics.try_measure_line("abc", 4, 10.0, 100.0, options), None);
        assert_eq!(
            metrics.try_measure_line("abc", 0, 10.0, 100.0, options),
            metrics.measure_line("abc", 0, 10.0, 100.0, options).ok()
        );
        assert!(matches!(
            metrics.measure_line("abc", 4, 10.0, 100.0, options),
            Err(ReadError::InvalidArgument(_))
        ));
        assert!(metrics.measure_line("abc", 0, 0.0, 100.0, options).is_err());
        assert!(metrics.measure_line("abc", 0, 10.0, f64::NAN, options).is_err());
    }

    #[test]
    fn width_monotonicity_and_idempotence() {
        let font = sample_typeface();
        let mut metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default().word_boundaries(true);
        let mut previous = 0;
        for width in 0..120 {
            let size = metrics.measure_line(TEXT, 0, 12.0, width as f64, options).unwrap();
            let again = metrics.measure_line(TEXT, 0, 12.0, width as f64, options).unwrap();
            assert_eq!(size, again);
            assert!(size.chars_fitted >= previous);
            previous = size.chars_fitted;
        }
    }

    #[test]
    fn line_height_sources() {
        let font = sample_typeface();
        let metrics = font.metrics().unwrap();
        let options = TypeMeasureOptions::default();
        // hhea: 800, -200, 100
        assert_eq!(metrics.line_height(10.0, options), 11.0);
        assert_eq!(metrics.ascent(10.0, options), 8.0);
        assert_eq!(metrics.descent(10.0, options), 2.0);
        // OS/2 typo: 750, -250, 0
        let typo = options.font_units(FontUnits::UseTypographicMetrics);
        assert_eq!(metrics.line_height(10.0, typo), 10.0);
        let hhea = options.font_units(FontUnits::UseHeadMetrics);
        assert_eq!(metrics.line_height(10.0, hhea), 11.0);
    }
}
