//! The two result shapes of a read: [`TypefaceInfo`], a cheap descriptor of
//! every face in a container, and [`TypefaceFont`], one fully decoded face.

use std::fmt;

use bytes::Bytes;
use font_types::Tag;

use crate::error::ReadError;
use crate::measure::{LineSize, TypeMeasureOptions, TypefaceMetrics};
use crate::sfnt::{self, SfntTable};
use crate::table_tags::CMAP;
use crate::tables::TableSet;
use crate::tables::head::{FontHeader, MacStyle};
use crate::tables::hhea::HorizontalHeader;
use crate::tables::hmtx::HMetric;
use crate::tables::os2::{Os2, selection};

/// The container a face was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FontFormat {
    TrueType,
    OpenTypeCff,
    Collection,
    Woff,
    Woff2,
    Unknown,
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FontFormat::TrueType => "TrueType",
            FontFormat::OpenTypeCff => "OpenType (CFF)",
            FontFormat::Collection => "TrueType Collection",
            FontFormat::Woff => "WOFF",
            FontFormat::Woff2 => "WOFF2",
            FontFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// `usWeightClass`, 1 to 1000.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: FontWeight = FontWeight(100);
    pub const EXTRA_LIGHT: FontWeight = FontWeight(200);
    pub const LIGHT: FontWeight = FontWeight(300);
    pub const NORMAL: FontWeight = FontWeight(400);
    pub const MEDIUM: FontWeight = FontWeight(500);
    pub const SEMI_BOLD: FontWeight = FontWeight(600);
    pub const BOLD: FontWeight = FontWeight(700);
    pub const EXTRA_BOLD: FontWeight = FontWeight(800);
    pub const BLACK: FontWeight = FontWeight(900);
}

impl Default for FontWeight {
    fn default() -> Self {
        FontWeight::NORMAL
    }
}

/// `usWidthClass`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontWidth {
    UltraCondensed = 1,
    ExtraCondensed = 2,
    Condensed = 3,
    SemiCondensed = 4,
    #[default]
    Normal = 5,
    SemiExpanded = 6,
    Expanded = 7,
    ExtraExpanded = 8,
    UltraExpanded = 9,
}

impl FontWidth {
    /// Out of range classes are read as `Normal`.
    pub fn from_class(class: u16) -> Self {
        match class {
            1 => FontWidth::UltraCondensed,
            2 => FontWidth::ExtraCondensed,
            3 => FontWidth::Condensed,
            4 => FontWidth::SemiCondensed,
            6 => FontWidth::SemiExpanded,
            7 => FontWidth::Expanded,
            8 => FontWidth::ExtraExpanded,
            9 => FontWidth::UltraExpanded,
            _ => FontWidth::Normal,
        }
    }
}

/// Embedding permissions from the OS/2 `fsType` field.
///
/// An empty set means installable embedding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontRestrictions(u16);

impl FontRestrictions {
    pub const INSTALLABLE: FontRestrictions = FontRestrictions(0);
    pub const RESTRICTED: FontRestrictions = FontRestrictions(0x0002);
    pub const PREVIEW_AND_PRINT: FontRestrictions = FontRestrictions(0x0004);
    pub const EDITABLE: FontRestrictions = FontRestrictions(0x0008);
    pub const NO_SUBSETTING: FontRestrictions = FontRestrictions(0x0100);
    pub const BITMAP_ONLY: FontRestrictions = FontRestrictions(0x0200);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: FontRestrictions) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_installable(self) -> bool {
        self.0 & 0x000F == 0
    }
}

/// Style bits in the layout of the OS/2 `fsSelection` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontSelection(u16);

impl FontSelection {
    pub const ITALIC: FontSelection = FontSelection(selection::ITALIC);
    pub const UNDERSCORE: FontSelection = FontSelection(selection::UNDERSCORE);
    pub const NEGATIVE: FontSelection = FontSelection(selection::NEGATIVE);
    pub const OUTLINED: FontSelection = FontSelection(selection::OUTLINED);
    pub const STRIKEOUT: FontSelection = FontSelection(selection::STRIKEOUT);
    pub const BOLD: FontSelection = FontSelection(selection::BOLD);
    pub const REGULAR: FontSelection = FontSelection(selection::REGULAR);
    pub const USE_TYPO_METRICS: FontSelection = FontSelection(selection::USE_TYPO_METRICS);
    pub const WWS: FontSelection = FontSelection(selection::WWS);
    pub const OBLIQUE: FontSelection = FontSelection(selection::OBLIQUE);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: FontSelection) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: FontSelection) -> Self {
        Self(self.0 | other.0)
    }

    /// Selection bits derived from a `head.macStyle` field, for fonts
    /// without an OS/2 table.
    pub fn from_mac_style(style: MacStyle) -> Self {
        let mut bits = 0;
        if style.contains(MacStyle::BOLD) {
            bits |= selection::BOLD;
        }
        if style.contains(MacStyle::ITALIC) {
            bits |= selection::ITALIC;
        }
        if style.contains(MacStyle::UNDERLINE) {
            bits |= selection::UNDERSCORE;
        }
        if style.contains(MacStyle::OUTLINE) {
            bits |= selection::OUTLINED;
        }
        if bits == 0 {
            bits = selection::REGULAR;
        }
        Self(bits)
    }
}

/// Identifies one face: the descriptor returned by enumeration and the key
/// used to resolve that face again for full decoding.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypefaceReference {
    pub family_name: String,
    pub weight: FontWeight,
    pub width: FontWidth,
    pub restrictions: FontRestrictions,
    pub selections: FontSelection,
}

impl TypefaceReference {
    /// Describe a face from its decoded `head`, `name` and `OS/2` tables.
    ///
    /// Returns the reason the face can't be described when `head` is
    /// missing or when both `OS/2` and `name` are.
    pub fn describe(tables: &TableSet) -> Result<Self, String> {
        let Some(head) = tables.head() else {
            return Err("font has no 'head' table".into());
        };
        let name = tables.name();
        let os2 = tables.os2();
        if name.is_none() && os2.is_none() {
            return Err("font has neither an 'OS/2' nor a 'name' table".into());
        }

        let family_name = name
            .and_then(|name| name.family_name())
            .unwrap_or_default()
            .to_string();

        Ok(match os2 {
            Some(os2) => Self::from_os2(family_name, os2),
            None => Self::from_head(family_name, head),
        })
    }

    fn from_os2(family_name: String, os2: &Os2) -> Self {
        Self {
            family_name,
            weight: FontWeight(os2.weight_class),
            width: FontWidth::from_class(os2.width_class),
            restrictions: FontRestrictions::from_bits(os2.fs_type),
            selections: FontSelection::from_bits(os2.fs_selection),
        }
    }

    fn from_head(family_name: String, head: &FontHeader) -> Self {
        let style = head.mac_style;
        let width = if style.contains(MacStyle::CONDENSED) {
            FontWidth::Condensed
        } else if style.contains(MacStyle::EXTENDED) {
            FontWidth::Expanded
        } else {
            FontWidth::Normal
        };
        Self {
            family_name,
            weight: FontWeight::NORMAL,
            width,
            restrictions: FontRestrictions::INSTALLABLE,
            selections: FontSelection::from_mac_style(style),
        }
    }

    pub fn is_bold(&self) -> bool {
        self.selections.contains(FontSelection::BOLD) || self.weight >= FontWeight::BOLD
    }

    pub fn is_italic(&self) -> bool {
        self.selections.contains(FontSelection::ITALIC)
            || self.selections.contains(FontSelection::OBLIQUE)
    }
}

impl fmt::Display for TypefaceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family_name, self.weight.0)?;
        if self.is_italic() {
            f.write_str(" italic")?;
        }
        if self.width != FontWidth::Normal {
            write!(f, " {:?}", self.width)?;
        }
        Ok(())
    }
}

/// Every face found in one container.
///
/// An unreadable container is represented by [`TypefaceInfo::unknown`]: no
/// faces and a populated `error_message`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypefaceInfo {
    pub source: String,
    pub format: FontFormat,
    pub faces: Vec<TypefaceReference>,
    /// Also set alongside `faces` when some faces of a collection could not
    /// be described.
    pub error_message: Option<String>,
}

impl TypefaceInfo {
    pub fn new(source: impl Into<String>, format: FontFormat, faces: Vec<TypefaceReference>) -> Self {
        Self {
            source: source.into(),
            format,
            faces,
            error_message: None,
        }
    }

    /// The sentinel for a container that could not be described.
    pub fn unknown(source: impl Into<String>, format: FontFormat, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            format,
            faces: Vec::new(),
            error_message: Some(reason.into()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.faces.is_empty() && self.error_message.is_some()
    }
}

/// One fully decoded face.
///
/// Owns its tables and the bytes of the container it came from; faces of a
/// collection share that buffer.
#[derive(Debug)]
pub struct TypefaceFont {
    pub(crate) source: String,
    pub(crate) format: FontFormat,
    pub(crate) reference: TypefaceReference,
    /// sfnt version used when the face is written back out.
    pub(crate) flavor: Tag,
    pub(crate) face_index: usize,
    pub(crate) tables: TableSet,
    pub(crate) payload: Bytes,
}

impl TypefaceFont {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> FontFormat {
        self.format
    }

    pub fn reference(&self) -> &TypefaceReference {
        &self.reference
    }

    pub fn family_name(&self) -> &str {
        &self.reference.family_name
    }

    /// Index of this face within its container, 0 unless it's a collection.
    pub fn face_index(&self) -> usize {
        self.face_index
    }

    pub fn flavor(&self) -> Tag {
        self.flavor
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    /// The container exactly as it was read.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn head(&self) -> Option<&FontHeader> {
        self.tables.head()
    }

    pub fn hhea(&self) -> Option<&HorizontalHeader> {
        self.tables.hhea()
    }

    pub fn os2(&self) -> Option<&Os2> {
        self.tables.os2()
    }

    pub fn units_per_em(&self) -> Option<u16> {
        self.head().map(|head| head.units_per_em)
    }

    pub fn num_glyphs(&self) -> Option<u16> {
        self.tables
            .maxp()
            .map(|maxp| maxp.num_glyphs)
            .or_else(|| self.tables.hmtx().map(|hmtx| hmtx.len() as u16))
    }

    /// `hhea` ascender, descender and line gap, in font units.
    pub fn hhea_metrics(&self) -> Option<(i16, i16, i16)> {
        self.hhea()
            .map(|hhea| (hhea.ascender, hhea.descender, hhea.line_gap))
    }

    /// OS/2 typographic ascender, descender and line gap, in font units.
    pub fn typo_metrics(&self) -> Option<(i16, i16, i16)> {
        let typo = self.os2()?.typo_metrics.as_ref()?;
        Some((typo.typo_ascender, typo.typo_descender, typo.typo_line_gap))
    }

    /// Glyph for `ch` from the preferred character map, 0 when unmapped.
    pub fn glyph_id(&self, ch: char) -> Result<u16, ReadError> {
        let Some(cmap) = self.tables.cmap() else {
            return Err(ReadError::MissingTables(vec![CMAP]));
        };
        cmap.map_char(ch)
    }

    /// Horizontal metrics of `glyph_id`, clamped to the last entry.
    pub fn glyph_metric(&self, glyph_id: u16) -> Option<HMetric> {
        self.tables.hmtx().map(|hmtx| hmtx.metric(glyph_id))
    }

    /// Kerning adjustment between two glyphs, 0 when there is no `kern`
    /// table. Measurement does not apply kerning.
    pub fn kerning(&self, left: u16, right: u16) -> i16 {
        self.tables
            .kern()
            .map_or(0, |kern| kern.kerning(left, right))
    }

    pub fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        self.tables.post()?.glyph_name(glyph_id)
    }

    /// Measurement over this face. Fails if any table measurement depends
    /// on is missing.
    pub fn metrics(&self) -> Result<TypefaceMetrics<'_>, ReadError> {
        TypefaceMetrics::new(self)
    }

    /// Measure one line with a fresh measurer.
    pub fn measure_line(
        &self,
        text: &str,
        start_offset: usize,
        em_size: f64,
        available_width: f64,
        options: TypeMeasureOptions,
    ) -> Result<LineSize, ReadError> {
        self.metrics()?
            .measure_line(text, start_offset, em_size, available_width, options)
    }

    /// Write this face out as a standalone sfnt built from its decoded
    /// tables, with fresh offsets.
    pub fn to_sfnt(&self) -> Vec<u8> {
        let tables: Vec<SfntTable<'_>> = self
            .tables
            .entries()
            .map(|entry| SfntTable {
                tag: entry.tag(),
                checksum: entry.record.checksum,
                data: &entry.data,
            })
            .collect();
        sfnt::write_sfnt(self.flavor, &tables)
    }
}
