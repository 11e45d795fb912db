//! WOFF 1.0 and WOFF 2.0 headers and table directories.

use std::ops::{Deref, DerefMut};

use bytes::Buf;
use font_types::Tag;

use crate::error::{ReadError, bail, bail_if, usize_will_overflow};
use crate::sfnt::{COLLECTION_TAG, COLLECTION_VERSION_1, COLLECTION_VERSION_2, WOFF_SIGNATURE, WOFF2_SIGNATURE};
use crate::table_tags::{GLYF, HEAD, HHEA, HMTX, KNOWN_TABLE_TAGS, LOCA};
use crate::variable_length::BufVariableExt;

pub const WOFF1_HEADER_SIZE: usize = 44;
pub const WOFF2_HEADER_SIZE: usize = 48;
pub const WOFF1_ENTRY_SIZE: usize = 20;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WoffVersion {
    Woff1 = 1,
    Woff2 = 2,
}

/// WOFF header that can represent either a WOFF1 or WOFF2 header
///
/// <https://www.w3.org/TR/WOFF/#WOFFHeader>,
/// <https://www.w3.org/TR/WOFF2/#woff20Header>
#[derive(Clone, Debug)]
pub struct WoffHeader {
    // Not stored in the file; derived from the signature.
    pub woff_version: WoffVersion,
    /// `wOFF` or `wOF2`
    pub signature: Tag,
    /// The "sfnt version" of the input font.
    pub flavor: Tag,
    /// Total size of the WOFF file.
    pub length: u32,
    /// Number of entries in directory of font tables.
    pub num_tables: u16,
    /// Reserved; set to 0.
    pub reserved: u16,
    /// Total size needed for the uncompressed font data, including the sfnt header, directory, and font tables (including padding).
    pub total_sfnt_size: u32,
    /// (WOFF2 only) Total length of the compressed data block.
    pub total_compressed_size: u32,
    pub major_version: u16,
    pub minor_version: u16,
    /// Offset to metadata block, from beginning of WOFF file.
    pub meta_offset: u32,
    /// Length of compressed metadata block.
    pub meta_length: u32,
    /// Uncompressed size of metadata block.
    pub meta_orig_length: u32,
    /// Offset to private data block, from beginning of WOFF file.
    pub priv_offset: u32,
    /// Length of private data block.
    pub priv_length: u32,
}

impl WoffHeader {
    pub fn parse(input: &mut impl Buf) -> Result<Self, ReadError> {
        let input_len = input.remaining();
        let input_len_u32 = u32::try_from(input_len).unwrap_or(u32::MAX);

        let signature = Tag::from_u32(input.try_get_u32()?);
        let woff_version = match signature {
            WOFF_SIGNATURE => WoffVersion::Woff1,
            WOFF2_SIGNATURE => WoffVersion::Woff2,
            other => bail!("bad WOFF signature '{other}'"),
        };

        let header = Self {
            woff_version,
            signature,
            flavor: Tag::from_u32(input.try_get_u32()?),
            length: input.try_get_u32()?,
            num_tables: input.try_get_u16()?,
            reserved: input.try_get_u16()?,
            total_sfnt_size: input.try_get_u32()?,
            // totalCompressedSize field only exists in WOFF2 headers
            total_compressed_size: match woff_version {
                WoffVersion::Woff1 => 0,
                WoffVersion::Woff2 => input.try_get_u32()?,
            },
            major_version: input.try_get_u16()?,
            minor_version: input.try_get_u16()?,
            meta_offset: input.try_get_u32()?,
            meta_length: input.try_get_u32()?,
            meta_orig_length: input.try_get_u32()?,
            priv_offset: input.try_get_u32()?,
            priv_length: input.try_get_u32()?,
        };

        bail_if!(
            header.length != input_len_u32,
            "WOFF header length {} does not match file size {input_len}",
            header.length
        );
        bail_if!(header.num_tables == 0, "WOFF has no tables");
        bail_if!(header.reserved != 0, "WOFF reserved field is not zero");
        if header.meta_offset != 0 {
            bail_if!(
                header.meta_offset >= input_len_u32
                    || input_len_u32 - header.meta_offset < header.meta_length,
                "WOFF metadata block out of bounds"
            );
        }
        if header.priv_offset != 0 {
            bail_if!(
                header.priv_offset >= input_len_u32
                    || input_len_u32 - header.priv_offset < header.priv_length,
                "WOFF private data block out of bounds"
            );
        }

        Ok(header)
    }

    pub fn is_collection(&self) -> bool {
        self.flavor == COLLECTION_TAG
    }
}

/// A table directory along with the number of bytes it occupies in the file.
#[derive(Clone, Debug)]
pub struct TableDirectory<T> {
    pub tables: Vec<T>,
    /// Size of the table directory (in the WOFF) in bytes
    pub size: usize,
}

pub type Woff1TableDirectory = TableDirectory<Woff1TableDirectoryEntry>;
pub type Woff2TableDirectory = TableDirectory<Woff2TableDirectoryEntry>;

impl<T> Deref for TableDirectory<T> {
    type Target = Vec<T>;
    fn deref(&self) -> &Self::Target {
        &self.tables
    }
}

impl<T> DerefMut for TableDirectory<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tables
    }
}

/// <https://www.w3.org/TR/WOFF/#TableDirectory>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Woff1TableDirectoryEntry {
    pub tag: Tag,
    /// Offset of the table data from the start of the WOFF file.
    pub offset: u32,
    pub comp_length: u32,
    pub orig_length: u32,
    pub orig_checksum: u32,
}

impl Woff1TableDirectoryEntry {
    pub fn parse(input: &mut impl Buf) -> Result<Self, ReadError> {
        let entry = Self {
            tag: Tag::from_u32(input.try_get_u32()?),
            offset: input.try_get_u32()?,
            comp_length: input.try_get_u32()?,
            orig_length: input.try_get_u32()?,
            orig_checksum: input.try_get_u32()?,
        };
        bail_if!(
            entry.comp_length > entry.orig_length,
            "'{}' compressed length {} exceeds original length {}",
            entry.tag,
            entry.comp_length,
            entry.orig_length
        );
        Ok(entry)
    }

    /// Tables whose compressed length equals their original length are
    /// stored verbatim.
    pub fn is_compressed(&self) -> bool {
        self.comp_length != self.orig_length
    }

    pub fn data_as_slice<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], ReadError> {
        let start = self.offset as usize;
        start
            .checked_add(self.comp_length as usize)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| ReadError::Malformed("WOFF table data out of bounds".into()).in_table(self.tag))
    }
}

impl Woff1TableDirectory {
    pub fn parse(input: &mut impl Buf, num_tables: usize) -> Result<Self, ReadError> {
        let mut tables = Vec::with_capacity(num_tables);
        for _ in 0..num_tables {
            tables.push(Woff1TableDirectoryEntry::parse(input)?);
        }
        Ok(Self {
            tables,
            size: num_tables * WOFF1_ENTRY_SIZE,
        })
    }
}

impl Woff2TableDirectory {
    pub fn parse(input: &mut impl Buf, num_tables: usize) -> Result<Self, ReadError> {
        let initial_remaining = input.remaining();

        // Tables in the CompressedFontData field of the WOFF are stored directly after each other
        // in the order they specified in the header. So we can determine the offset for each table
        // by adding up the lengths of each table (which are stored in the directory entries).
        //
        // <https://www.w3.org/TR/WOFF2/#table_format>
        let mut offset_in_woff: usize = 0;

        let mut tables = Vec::with_capacity(num_tables);
        for _ in 0..num_tables {
            let mut table = Woff2TableDirectoryEntry::parse(input)?;
            table.woff_offset = u32::try_from(offset_in_woff).map_err(|_| {
                ReadError::Malformed("WOFF2 table data exceeds 4GiB".into()).in_table(table.tag)
            })?;

            bail_if!(usize_will_overflow(
                offset_in_woff,
                table.woff_length as usize
            ));
            offset_in_woff += table.woff_length as usize;

            tables.push(table);
        }

        // The directory is variable length, so its size is whatever was consumed
        let size_of_directory = initial_remaining - input.remaining();

        Ok(Self {
            tables,
            size: size_of_directory,
        })
    }

    /// Total size of all table data in the decompressed stream.
    pub fn uncompressed_size(&self) -> usize {
        self.tables
            .last()
            .map(|t| t.woff_offset as usize + t.woff_length as usize)
            .unwrap_or(0)
    }
}

/// <https://www.w3.org/TR/WOFF2/#table_dir_format>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Woff2TableDirectoryEntry {
    pub tag: Tag,
    /// 2 bits representing the transformation version of the table
    pub format: u8,
    /// Length of original table. Informational for transformed tables.
    pub orig_length: u32,
    /// Offset of the table within the decompressed stream (computed)
    pub woff_offset: u32,
    /// Length of the table within the decompressed stream: `transformLength`
    /// for transformed tables, `origLength` otherwise.
    pub woff_length: u32,
}

impl Woff2TableDirectoryEntry {
    /// Whether the table has been transformed
    ///
    /// For 'glyf' and 'loca' transformation version 0 is the glyph transform
    /// and version 3 the null transform. 'hmtx' is transformed by version 1.
    /// Every other table is only transformed by a non-zero version.
    pub fn is_transformed(&self) -> bool {
        match self.tag {
            GLYF | LOCA => self.format == 0,
            HMTX => self.format == 1,
            _ => self.format != 0,
        }
    }

    pub fn data_as_slice<'a>(&self, data: &'a [u8]) -> Result<&'a [u8], ReadError> {
        let start = self.woff_offset as usize;
        start
            .checked_add(self.woff_length as usize)
            .and_then(|end| data.get(start..end))
            .ok_or_else(|| ReadError::Malformed("WOFF2 table data out of bounds".into()).in_table(self.tag))
    }

    pub fn parse(input: &mut impl Buf) -> Result<Self, ReadError> {
        let flags = input.try_get_u8()?;
        let (known_tag, format) = Self::parse_flags(flags);
        // the tag only follows the flags when it isn't a known one
        let tag = match known_tag {
            Some(tag) => tag,
            None => Tag::from_u32(input.try_get_u32()?),
        };
        let orig_length = input.try_get_variable_128_u32()?;

        let mut entry = Self {
            tag,
            format,
            orig_length,
            woff_offset: 0, // Set in TableDirectory parse function
            woff_length: orig_length,
        };
        if entry.is_transformed() {
            entry.woff_length = input.try_get_variable_128_u32()?;
            bail_if!(
                entry.tag == LOCA && entry.woff_length != 0,
                "transformed loca has a non-zero length"
            );
        } else {
            bail_if!(
                entry.format != 0 && !matches!(entry.tag, GLYF | LOCA),
                "unknown transform {} for '{}'",
                entry.format,
                entry.tag
            );
        }

        Ok(entry)
    }

    /// Parse flags field into "known tag" and "format"
    ///
    /// Bits [0..5] index the "known tag" table, 63 meaning an explicit tag
    /// follows. Bits 6 and 7 hold the transformation version (0-3).
    pub fn parse_flags(flags: u8) -> (Option<Tag>, u8) {
        const TAG_MASK: u8 = 0b00111111;
        const FORMAT_MASK: u8 = 0b11000000;
        let tag_bits = flags & TAG_MASK;
        let format = (flags & FORMAT_MASK) >> 6;
        let tag = KNOWN_TABLE_TAGS.get(tag_bits as usize).copied();
        (tag, format)
    }
}

/// <https://www.w3.org/TR/WOFF2/#collection_dir_format>
#[derive(Clone, Debug)]
pub struct CollectionDirectory {
    /// The version of the TTC header in the original font.
    pub version: u32,
    pub fonts: Vec<CollectionDirectoryEntry>,
}

impl CollectionDirectory {
    pub fn parse(
        input: &mut impl Buf,
        table_directory: &Woff2TableDirectory,
    ) -> Result<Self, ReadError> {
        let version = input.try_get_u32()?;
        let num_fonts = input.try_get_variable_255_u16()?;

        bail_if!(
            version != COLLECTION_VERSION_1 && version != COLLECTION_VERSION_2,
            "unknown collection version {version:#010x}"
        );
        bail_if!(num_fonts == 0, "collection has no fonts");

        let mut fonts = Vec::with_capacity(num_fonts as usize);
        for i in 0..num_fonts {
            fonts.push(CollectionDirectoryEntry::parse(input, table_directory, i)?);
        }

        Ok(Self { version, fonts })
    }

    /// A one-font directory so single fonts and collections share the
    /// reconstruction logic.
    pub fn for_single_font(flavor: Tag, table_directory: &Woff2TableDirectory) -> Self {
        let table_indices: Vec<u16> = (0..(table_directory.len() as u16)).collect();
        let mut entry = CollectionDirectoryEntry {
            flavor,
            table_indices,
            head_idx: None,
            hhea_idx: None,
            glyf_idx: None,
            loca_idx: None,
        };
        for (table_index, table) in table_directory.iter().enumerate() {
            entry.note_table(table.tag, table_index as u16);
        }
        Self {
            version: COLLECTION_VERSION_1, // ignored for single fonts
            fonts: vec![entry],
        }
    }

    /// Re-order each font's tables into tag order, as an sfnt directory requires.
    pub fn sort_tables_within_each_font(&mut self, tables: &Woff2TableDirectory) {
        for font in &mut self.fonts {
            font.table_indices
                .sort_by_cached_key(|idx| tables[*idx as usize].tag);
        }
    }

    /// Size of the collection header.
    pub fn collection_header_size(&self) -> usize {
        crate::sfnt::collection_header_size(self.version, self.fonts.len() as u32)
    }

    /// Size of every table directory, not counting the collection header.
    pub fn table_directories_size(&self) -> usize {
        self.fonts
            .iter()
            .map(CollectionDirectoryEntry::table_directory_size)
            .sum()
    }
}

/// <https://www.w3.org/TR/WOFF2/#collection_dir_format>
#[derive(Clone, Debug)]
pub struct CollectionDirectoryEntry {
    /// The "sfnt version" of the font
    pub flavor: Tag,
    /// Indices into the shared table directory of the tables this font uses.
    pub table_indices: Vec<u16>,

    // tables that need random access during reconstruction
    pub head_idx: Option<u16>,
    pub hhea_idx: Option<u16>,
    pub glyf_idx: Option<u16>,
    pub loca_idx: Option<u16>,
}

impl CollectionDirectoryEntry {
    pub fn parse(
        input: &mut impl Buf,
        tables: &Woff2TableDirectory,
        font_index: u16,
    ) -> Result<Self, ReadError> {
        let num_tables = input.try_get_variable_255_u16()?;
        let flavor = Tag::from_u32(input.try_get_u32()?);

        bail_if!(num_tables == 0, "collection font {font_index} has no tables");

        let mut entry = Self {
            flavor,
            table_indices: Vec::with_capacity(num_tables as usize),
            head_idx: None,
            hhea_idx: None,
            glyf_idx: None,
            loca_idx: None,
        };
        for _ in 0..num_tables {
            let table_index = input.try_get_variable_255_u16()?;
            let Some(table) = tables.get(table_index as usize) else {
                bail!("collection font {font_index} references missing table {table_index}");
            };
            entry.note_table(table.tag, table_index);
            entry.table_indices.push(table_index);
        }

        // If we have both glyf and loca make sure they are consecutive
        // Reject if we only have one
        match (entry.glyf_idx, entry.loca_idx) {
            (Some(glyf_idx), Some(loca_idx)) => {
                bail_if!(
                    glyf_idx > loca_idx || loca_idx - glyf_idx != 1,
                    "TTC font {font_index} has non-consecutive glyf/loca"
                );
            }
            (Some(_), None) | (None, Some(_)) => {
                bail!("TTC font {font_index} has only one of glyf/loca")
            }
            (None, None) => {}
        };

        Ok(entry)
    }

    fn note_table(&mut self, tag: Tag, table_index: u16) {
        match tag {
            HEAD => self.head_idx = Some(table_index),
            HHEA => self.hhea_idx = Some(table_index),
            GLYF => self.glyf_idx = Some(table_index),
            LOCA => self.loca_idx = Some(table_index),
            _ => {}
        }
    }

    pub fn num_tables(&self) -> usize {
        self.table_indices.len()
    }

    /// The size required for a table directory for this font
    pub fn table_directory_size(&self) -> usize {
        crate::sfnt::SFNT_HEADER_SIZE + (crate::sfnt::SFNT_ENTRY_SIZE * self.num_tables())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable_length::BufMutVariableExt;
    use bytes::BufMut;

    #[test]
    fn transform_versions() {
        let entry = |tag: &[u8; 4], format| Woff2TableDirectoryEntry {
            tag: Tag::new(tag),
            format,
            orig_length: 0,
            woff_offset: 0,
            woff_length: 0,
        };
        assert!(entry(b"glyf", 0).is_transformed());
        assert!(!entry(b"glyf", 3).is_transformed());
        assert!(entry(b"loca", 0).is_transformed());
        assert!(entry(b"hmtx", 1).is_transformed());
        assert!(!entry(b"hmtx", 0).is_transformed());
        assert!(!entry(b"cmap", 0).is_transformed());
    }

    #[test]
    fn woff2_directory_lengths() {
        let mut data = Vec::new();
        // cmap, null transform: only origLength
        data.put_u8(0);
        data.put_variable_128_u32(300);
        // glyf, transformed: origLength then transformLength
        data.put_u8(10);
        data.put_variable_128_u32(1000);
        data.put_variable_128_u32(400);
        // loca, transformed, transformLength 0
        data.put_u8(11);
        data.put_variable_128_u32(60);
        data.put_variable_128_u32(0);
        // explicit tag, null transform
        data.put_u8(63);
        data.put_slice(b"ZZZZ");
        data.put_variable_128_u32(8);

        let mut input = &data[..];
        let directory = Woff2TableDirectory::parse(&mut input, 4).unwrap();
        assert!(input.is_empty());
        assert_eq!(directory.size, data.len());
        let lengths: Vec<_> = directory.iter().map(|t| (t.woff_offset, t.woff_length)).collect();
        assert_eq!(lengths, vec![(0, 300), (300, 400), (700, 0), (700, 8)]);
        assert_eq!(directory[3].tag, Tag::new(b"ZZZZ"));
        assert_eq!(directory.uncompressed_size(), 708);
    }

    #[test]
    fn woff2_offsets_past_u32_are_rejected() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.put_u8(63);
            data.put_slice(b"ZZZZ");
            data.put_variable_128_u32(u32::MAX);
        }
        let mut input = &data[..];
        // the third table would start at 2 * u32::MAX
        assert!(Woff2TableDirectory::parse(&mut input, 3).is_err());

        let mut input = &data[..];
        let directory = Woff2TableDirectory::parse(&mut input, 2).unwrap();
        assert_eq!(directory[1].woff_offset, u32::MAX);
        assert!(directory[1].data_as_slice(&[0; 16]).is_err());
    }

    #[test]
    fn header_signatures_and_bounds() {
        let mut data = Vec::new();
        data.put_slice(b"wOFF");
        data.put_u32(0x00010000);
        data.put_u32(44);
        data.put_u16(1);
        data.put_u16(0);
        data.put_u32(100);
        data.put_u16(1);
        data.put_u16(0);
        data.put_u32(0);
        data.put_u32(0);
        data.put_u32(0);
        data.put_u32(0);
        data.put_u32(0);
        let header = WoffHeader::parse(&mut &data[..]).unwrap();
        assert_eq!(header.woff_version, WoffVersion::Woff1);
        assert_eq!(header.total_sfnt_size, 100);

        // private block past the end of the file
        let mut bad = data.clone();
        bad[36..40].copy_from_slice(&40u32.to_be_bytes());
        bad[40..44].copy_from_slice(&8u32.to_be_bytes());
        assert!(WoffHeader::parse(&mut &bad[..]).is_err());

        // the lowercase 'o' signature is not WOFF
        let mut bad = data.clone();
        bad[..4].copy_from_slice(b"woFF");
        assert!(WoffHeader::parse(&mut &bad[..]).is_err());
    }
}
