//! The [post](https://docs.microsoft.com/en-us/typography/opentype/spec/post) table

use font_types::Fixed;

use crate::buffer::FontReader;
use crate::error::ReadError;

/// The PostScript table.
#[derive(Clone, Debug, PartialEq)]
pub struct PostScript {
    pub version: (u16, u16),
    pub italic_angle: Fixed,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: bool,
    pub min_mem_type42: u32,
    pub max_mem_type42: u32,
    pub min_mem_type1: u32,
    pub max_mem_type1: u32,
    pub glyph_names: GlyphNames,
}

/// Glyph naming data carried by the table version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GlyphNames {
    /// Version 1.0: the standard Macintosh ordering.
    Standard,
    /// Version 2.0: indices into the standard names, or past 257 into `names`.
    Indexed {
        glyph_name_index: Vec<u16>,
        names: Vec<String>,
    },
    /// Version 2.5: signed offsets from the standard ordering.
    Offsets(Vec<i8>),
    /// Version 3.0 and unknown versions carry no names.
    #[default]
    None,
}

impl PostScript {
    pub fn parse(data: &[u8]) -> Result<Self, ReadError> {
        let mut input = FontReader::new(data);
        let version = input.read_version16()?;
        let italic_angle = input.read_fixed()?;
        let underline_position = input.read_i16()?;
        let underline_thickness = input.read_i16()?;
        let is_fixed_pitch = input.read_u32()? != 0;
        let min_mem_type42 = input.read_u32()?;
        let max_mem_type42 = input.read_u32()?;
        let min_mem_type1 = input.read_u32()?;
        let max_mem_type1 = input.read_u32()?;

        let glyph_names = match version {
            (1, 0) => GlyphNames::Standard,
            (2, 0) => {
                let num_glyphs = input.read_u16()?;
                let glyph_name_index = (0..num_glyphs)
                    .map(|_| input.read_u16())
                    .collect::<Result<Vec<_>, _>>()?;
                let n_custom = glyph_name_index
                    .iter()
                    .filter(|&&index| index as usize >= STANDARD_NAMES.len())
                    .map(|&index| index as usize - STANDARD_NAMES.len() + 1)
                    .max()
                    .unwrap_or(0);
                let mut names = Vec::with_capacity(n_custom);
                while names.len() < n_custom && !input.is_empty() {
                    names.push(input.read_pascal_string()?);
                }
                GlyphNames::Indexed {
                    glyph_name_index,
                    names,
                }
            }
            // 2.5 is stored as 0x00025000
            (2, 0x5000) => {
                let num_glyphs = input.read_u16()?;
                let offsets = (0..num_glyphs)
                    .map(|_| input.read_i8())
                    .collect::<Result<Vec<_>, _>>()?;
                GlyphNames::Offsets(offsets)
            }
            (3, 0) => GlyphNames::None,
            // 4.0 (Apple) and anything newer
            (major, minor) => {
                log::debug!("post table version {major}.{minor:#06x} carries no glyph names");
                GlyphNames::None
            }
        };

        Ok(Self {
            version,
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
            min_mem_type42,
            max_mem_type42,
            min_mem_type1,
            max_mem_type1,
            glyph_names,
        })
    }

    pub fn italic_angle_degrees(&self) -> f64 {
        self.italic_angle.to_bits() as f64 / 65536.0
    }

    /// The PostScript name of `glyph_id`, if the table carries one.
    pub fn glyph_name(&self, glyph_id: u16) -> Option<&str> {
        let gid = glyph_id as usize;
        match &self.glyph_names {
            GlyphNames::Standard => STANDARD_NAMES.get(gid).copied(),
            GlyphNames::Indexed {
                glyph_name_index,
                names,
            } => {
                let index = *glyph_name_index.get(gid)? as usize;
                match index.checked_sub(STANDARD_NAMES.len()) {
                    None => Some(STANDARD_NAMES[index]),
                    Some(custom) => names.get(custom).map(String::as_str),
                }
            }
            GlyphNames::Offsets(offsets) => {
                let offset = *offsets.get(gid)? as isize;
                let index = (gid as isize).checked_add(offset)?;
                STANDARD_NAMES.get(usize::try_from(index).ok()?).copied()
            }
            GlyphNames::None => None,
        }
    }
}

/// The 258 glyph names of the standard Macintosh glyph ordering.
#[rustfmt::skip]
pub static STANDARD_NAMES: [&str; 258] = [
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl", "numbersign",
    "dollar", "percent", "ampersand", "quotesingle", "parenleft", "parenright", "asterisk",
    "plus", "comma", "hyphen", "period", "slash", "zero", "one", "two", "three", "four",
    "five", "six", "seven", "eight", "nine", "colon", "semicolon", "less", "equal",
    "greater", "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K",
    "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z",
    "bracketleft", "backslash", "bracketright", "asciicircum", "underscore", "grave",
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q",
    "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde", "Adieresis", "Aring", "Ccedilla", "Eacute", "Ntilde", "Odieresis",
    "Udieresis", "aacute", "agrave", "acircumflex", "adieresis", "atilde", "aring",
    "ccedilla", "eacute", "egrave", "ecircumflex", "edieresis", "iacute", "igrave",
    "icircumflex", "idieresis", "ntilde", "oacute", "ograve", "ocircumflex", "odieresis",
    "otilde", "uacute", "ugrave", "ucircumflex", "udieresis", "dagger", "degree", "cent",
    "sterling", "section", "bullet", "paragraph", "germandbls", "registered", "copyright",
    "trademark", "acute", "dieresis", "notequal", "AE", "Oslash", "infinity", "plusminus",
    "lessequal", "greaterequal", "yen", "mu", "partialdiff", "summation", "product", "pi",
    "integral", "ordfeminine", "ordmasculine", "Omega", "ae", "oslash", "questiondown",
    "exclamdown", "logicalnot", "radical", "florin", "approxequal", "Delta",
    "guillemotleft", "guillemotright", "ellipsis", "nonbreakingspace", "Agrave", "Atilde",
    "Otilde", "OE", "oe", "endash", "emdash", "quotedblleft", "quotedblright", "quoteleft",
    "quoteright", "divide", "lozenge", "ydieresis", "Ydieresis", "fraction", "currency",
    "guilsinglleft", "guilsinglright", "fi", "fl", "daggerdbl", "periodcentered",
    "quotesinglbase", "quotedblbase", "perthousand", "Acircumflex", "Ecircumflex",
    "Aacute", "Edieresis", "Egrave", "Iacute", "Icircumflex", "Idieresis", "Igrave",
    "Oacute", "Ocircumflex", "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave",
    "dotlessi", "circumflex", "tilde", "macron", "breve", "dotaccent", "ring", "cedilla",
    "hungarumlaut", "ogonek", "caron", "Lslash", "lslash", "Scaron", "scaron", "Zcaron",
    "zcaron", "brokenbar", "Eth", "eth", "Yacute", "yacute", "Thorn", "thorn", "minus",
    "multiply", "onesuperior", "twosuperior", "threesuperior", "onehalf", "onequarter",
    "threequarters", "franc", "Gbreve", "gbreve", "Idotaccent", "Scedilla", "scedilla",
    "Cacute", "cacute", "Ccaron", "ccaron", "dcroat",
];
