//! Builders for the font data used in tests.

use bytes::{BufMut, Bytes};
use font_types::{Scalar, Tag};

use crate::Round4;
use crate::buffer::{APPLE_TO_UNIX_EPOCH_SECS, FontReader};
use crate::sfnt::{
    COLLECTION_TAG, SfntTable, TRUETYPE_FLAVOR, WOFF_SIGNATURE, WOFF2_SIGNATURE,
    collection_header_size, table_checksum, write_sfnt,
};
use crate::table_tags::{GLYF, KNOWN_TABLE_TAGS, LOCA};
use crate::tables::head::MAGIC_NUMBER;
use crate::tables::name::name_id;
use crate::tables::os2::selection;
use crate::typeface::TypefaceFont;
use crate::variable_length::BufMutVariableExt;

/// A convenience type for generating a buffer of big-endian bytes.
#[derive(Debug, Clone, Default)]
pub struct BeBuffer {
    data: Vec<u8>,
}

impl BeBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Write any scalar to this buffer.
    pub fn push(mut self, item: impl Scalar) -> Self {
        self.data.extend(item.to_raw().as_ref());
        self
    }

    /// Write multiple scalars into the buffer
    pub fn extend<T: Scalar>(mut self, iter: impl IntoIterator<Item = T>) -> Self {
        for item in iter {
            self.data.extend(item.to_raw().as_ref());
        }
        self
    }

    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// A 54 byte `head` table created at the Unix epoch.
pub fn head_table(units_per_em: u16, mac_style: u16) -> Vec<u8> {
    BeBuffer::new()
        .push(0x0001_0000u32) // version
        .push(0x0001_8000u32) // fontRevision 1.5
        .push(0u32) // checkSumAdjustment
        .push(MAGIC_NUMBER)
        .push(0u16) // flags
        .push(units_per_em)
        .push(APPLE_TO_UNIX_EPOCH_SECS) // created
        .push(APPLE_TO_UNIX_EPOCH_SECS) // modified
        .extend([-50i16, -200, 1000, 900]) // bbox
        .push(mac_style)
        .push(8u16) // lowestRecPPEM
        .push(2i16) // fontDirectionHint
        .push(0i16) // indexToLocFormat
        .push(0i16) // glyphDataFormat
        .into_vec()
}

pub fn hhea_table(ascender: i16, descender: i16, line_gap: i16, num_h_metrics: u16) -> Vec<u8> {
    BeBuffer::new()
        .push(0x0001_0000u32)
        .extend([ascender, descender, line_gap])
        .push(1000u16) // advanceWidthMax
        .extend([0i16, 0, 1000]) // minLeftSideBearing, minRightSideBearing, xMaxExtent
        .extend([1i16, 0, 0]) // caretSlopeRise, caretSlopeRun, caretOffset
        .extend([0i16; 4])
        .push(0i16) // metricDataFormat
        .push(num_h_metrics)
        .into_vec()
}

/// Version 0.5 (CFF) or 1.0 (TrueType) `maxp`.
pub fn maxp_table(num_glyphs: u16, truetype: bool) -> Vec<u8> {
    if !truetype {
        return BeBuffer::new().push(0x0000_5000u32).push(num_glyphs).into_vec();
    }
    BeBuffer::new()
        .push(0x0001_0000u32)
        .push(num_glyphs)
        .extend([64u16, 4, 0, 0]) // points, contours, composite points and contours
        .push(2u16) // maxZones
        .extend([0u16; 8])
        .into_vec()
}

/// The `OS/2` fields tests care about. Everything else is zero.
#[derive(Clone, Debug)]
pub struct Os2Params {
    pub version: u16,
    pub weight: u16,
    pub width: u16,
    pub fs_type: u16,
    pub fs_selection: u16,
    pub typo_ascender: i16,
    pub typo_descender: i16,
    pub typo_line_gap: i16,
    pub x_height: i16,
}

impl Default for Os2Params {
    fn default() -> Self {
        Self {
            version: 4,
            weight: 400,
            width: 5,
            fs_type: 0,
            fs_selection: selection::REGULAR,
            typo_ascender: 750,
            typo_descender: -250,
            typo_line_gap: 0,
            x_height: 500,
        }
    }
}

/// An `OS/2` table laid out for `params.version`: 78 bytes for version 0,
/// 86 for version 1, 96 for versions 2 to 4 and 100 for version 5.
pub fn os2_table(params: &Os2Params) -> Vec<u8> {
    let mut buf = BeBuffer::new()
        .push(params.version)
        .push(400i16) // xAvgCharWidth
        .push(params.weight)
        .push(params.width)
        .push(params.fs_type)
        .extend([0i16; 10]) // sub/superscript and strikeout
        .push(0i16) // sFamilyClass
        .bytes(&[0; 10]) // panose
        .extend([0u32; 4]) // ulUnicodeRange
        .bytes(b"TEST")
        .push(params.fs_selection)
        .push(0x20u16)
        .push(0xA0u16)
        .extend([params.typo_ascender, params.typo_descender, params.typo_line_gap])
        .extend([900u16, 250]); // usWinAscent, usWinDescent
    if params.version >= 1 {
        buf = buf.extend([1u32, 0]);
    }
    if params.version >= 2 {
        buf = buf
            .push(params.x_height)
            .push(700i16) // sCapHeight
            .extend([0u16, 0x20, 2]);
    }
    if params.version >= 5 {
        buf = buf.extend([0u16, 0xFFFE]);
    }
    buf.into_vec()
}

/// One `name` record.
#[derive(Clone, Debug)]
pub struct NameEntry {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub value: String,
}

impl NameEntry {
    /// Macintosh Roman, English.
    pub fn mac(name_id: u16, value: &str) -> Self {
        Self {
            platform_id: 1,
            encoding_id: 0,
            language_id: 0,
            name_id,
            value: value.to_string(),
        }
    }

    /// Windows Unicode BMP, US English.
    pub fn windows(name_id: u16, value: &str) -> Self {
        Self {
            platform_id: 3,
            encoding_id: 1,
            language_id: 0x409,
            name_id,
            value: value.to_string(),
        }
    }

    fn encode(&self) -> Vec<u8> {
        if self.platform_id == 1 {
            self.value
                .chars()
                .map(|ch| crate::tables::cmap::mac_roman_code(ch).unwrap_or(b'?'))
                .collect()
        } else {
            self.value
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect()
        }
    }
}

/// A format 0 `name` table with records in the order given.
pub fn name_table(entries: &[NameEntry]) -> Vec<u8> {
    let storage_offset = 6 + 12 * entries.len();
    let mut records = BeBuffer::new()
        .push(0u16)
        .push(entries.len() as u16)
        .push(storage_offset as u16);
    let mut storage = Vec::new();
    for entry in entries {
        let encoded = entry.encode();
        records = records
            .extend([entry.platform_id, entry.encoding_id, entry.language_id, entry.name_id])
            .push(encoded.len() as u16)
            .push(storage.len() as u16);
        storage.extend(encoded);
    }
    records.bytes(&storage).into_vec()
}

/// A format 4 subtable, including its format field.
///
/// `segments` are `(start, end, idDelta)` ranges. Each `(code, glyph)` in
/// `indirect` becomes a single character segment resolved through
/// glyphIdArray. The closing 0xFFFF segment is added.
pub fn format4_subtable(segments: &[(u16, u16, i16)], indirect: &[(u16, u16)]) -> Vec<u8> {
    let mut all: Vec<(u16, u16, i16, Option<u16>)> = segments
        .iter()
        .map(|&(start, end, delta)| (start, end, delta, None))
        .chain(indirect.iter().map(|&(code, glyph)| (code, code, 0, Some(glyph))))
        .collect();
    all.push((0xFFFF, 0xFFFF, 1, None));
    all.sort_by_key(|segment| segment.1);

    let seg_count = all.len();
    let mut glyph_ids: Vec<u16> = Vec::new();
    let mut range_offsets: Vec<u16> = Vec::with_capacity(seg_count);
    for (index, segment) in all.iter().enumerate() {
        match segment.3 {
            Some(glyph) => {
                range_offsets.push((2 * (seg_count - index + glyph_ids.len())) as u16);
                glyph_ids.push(glyph);
            }
            None => range_offsets.push(0),
        }
    }

    let entry_selector = seg_count.ilog2();
    let search_range = 2u16 << entry_selector;
    let length = 16 + 8 * seg_count + 2 * glyph_ids.len();
    BeBuffer::new()
        .push(4u16)
        .push(length as u16)
        .push(0u16) // language
        .push((seg_count * 2) as u16)
        .push(search_range)
        .push(entry_selector as u16)
        .push((seg_count * 2) as u16 - search_range)
        .extend(all.iter().map(|segment| segment.1))
        .push(0u16) // reservedPad
        .extend(all.iter().map(|segment| segment.0))
        .extend(all.iter().map(|segment| segment.2))
        .extend(range_offsets)
        .extend(glyph_ids)
        .into_vec()
}

/// `cmap` with Unicode and Windows BMP records sharing one format 4
/// subtable: ' '..='~' map to glyphs 1..=95 and U+00A0 to glyph 96.
pub fn cmap_table() -> Vec<u8> {
    let subtable = format4_subtable(&[(0x20, 0x7E, 1 - 0x20)], &[(0xA0, 96)]);
    BeBuffer::new()
        .push(0u16)
        .push(2u16)
        .extend([0u16, 3])
        .push(20u32)
        .extend([3u16, 1])
        .push(20u32)
        .bytes(&subtable)
        .into_vec()
}

/// Version 2.0 `post`: glyph 0 is `.notdef`, glyph 1 `space`, then one
/// glyph per custom name.
pub fn post_table(custom_names: &[&str]) -> Vec<u8> {
    let mut buf = BeBuffer::new()
        .push(0x0002_0000u32)
        .push(0u32) // italicAngle
        .push(-100i16)
        .push(50i16)
        .extend([0u32; 5])
        .push(2 + custom_names.len() as u16)
        .extend([0u16, 3])
        .extend((0..custom_names.len() as u16).map(|i| 258 + i));
    for name in custom_names {
        buf = buf.push(name.len() as u8).bytes(name.as_bytes());
    }
    buf.into_vec()
}

/// Microsoft style `kern` with one horizontal format 0 subtable.
pub fn kern_table(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
    let mut buf = BeBuffer::new()
        .push(0u16)
        .push(1u16)
        .push(0u16)
        .push((14 + 6 * pairs.len()) as u16)
        .push(0x0001u16) // coverage: horizontal, format 0
        .push(pairs.len() as u16)
        .extend([0u16, 0, 0]);
    for &(left, right, value) in pairs {
        buf = buf.push(left).push(right).push(value);
    }
    buf.into_vec()
}

/// The streams of a WOFF2 transformed `glyf` table.
#[derive(Clone, Debug, Default)]
pub struct TransformedGlyf {
    pub index_format: u16,
    pub n_contours: Vec<i16>,
    pub n_points: Vec<u16>,
    pub flags: Vec<u8>,
    pub glyphs: Vec<u8>,
    pub composites: Vec<u8>,
    /// Zero filled to the required size when empty.
    pub bbox_bitmap: Vec<u8>,
    pub bboxes: Vec<u8>,
    pub instructions: Vec<u8>,
}

pub fn transformed_glyf_table(glyf: &TransformedGlyf) -> Vec<u8> {
    let num_glyphs = glyf.n_contours.len();
    let mut n_contours = Vec::new();
    for &count in &glyf.n_contours {
        n_contours.put_i16(count);
    }
    let mut n_points = Vec::new();
    for &count in &glyf.n_points {
        n_points.put_variable_255_u16(count);
    }
    let mut bbox = if glyf.bbox_bitmap.is_empty() {
        vec![0; ((num_glyphs + 31) >> 5) << 2]
    } else {
        glyf.bbox_bitmap.clone()
    };
    bbox.extend_from_slice(&glyf.bboxes);

    let streams: [&[u8]; 7] = [
        &n_contours,
        &n_points,
        &glyf.flags,
        &glyf.glyphs,
        &glyf.composites,
        &bbox,
        &glyf.instructions,
    ];
    let mut out = BeBuffer::new()
        .push(0u16) // reserved
        .push(0u16) // optionFlags
        .push(num_glyphs as u16)
        .push(glyf.index_format)
        .extend(streams.iter().map(|stream| stream.len() as u32));
    for stream in streams {
        out = out.bytes(stream);
    }
    out.into_vec()
}

/// Assembles an sfnt. Table data is laid out in insertion order.
#[derive(Clone, Debug)]
pub struct FontBuilder {
    flavor: Tag,
    tables: Vec<(Tag, Vec<u8>)>,
}

impl FontBuilder {
    pub fn truetype() -> Self {
        Self::with_flavor(TRUETYPE_FLAVOR)
    }

    pub fn with_flavor(flavor: Tag) -> Self {
        Self {
            flavor,
            tables: Vec::new(),
        }
    }

    pub fn table(mut self, tag: &[u8; 4], data: Vec<u8>) -> Self {
        self.tables.push((Tag::new(tag), data));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let tables: Vec<SfntTable<'_>> = self
            .tables
            .iter()
            .map(|(tag, data)| SfntTable {
                tag: *tag,
                checksum: table_checksum(*tag, data),
                data,
            })
            .collect();
        write_sfnt(self.flavor, &tables)
    }
}

/// A complete TrueType face with 97 glyphs, all 400 units wide, mapping
/// ' '..='~' and U+00A0. Glyph 34 ('A') has a 50 unit left side bearing.
/// Weights of 700 and above are marked bold.
pub fn sample_font(family: &str, weight: u16) -> Vec<u8> {
    let bold = weight >= 700;
    let mut hmtx = BeBuffer::new();
    for glyph in 0..97u16 {
        hmtx = hmtx.push(400u16).push(if glyph == 34 { 50i16 } else { 0 });
    }
    FontBuilder::truetype()
        .table(b"head", head_table(1000, if bold { 1 } else { 0 }))
        .table(b"hhea", hhea_table(800, -200, 100, 97))
        .table(b"maxp", maxp_table(97, true))
        .table(
            b"OS/2",
            os2_table(&Os2Params {
                weight,
                fs_selection: if bold { selection::BOLD } else { selection::REGULAR },
                ..Default::default()
            }),
        )
        .table(b"hmtx", hmtx.into_vec())
        .table(b"cmap", cmap_table())
        .table(b"kern", kern_table(&[(34, 55, -80)]))
        .table(
            b"name",
            name_table(&[
                NameEntry::mac(name_id::FAMILY, family),
                NameEntry::windows(name_id::FAMILY, family),
                NameEntry::windows(name_id::SUBFAMILY, if bold { "Bold" } else { "Regular" }),
            ]),
        )
        .table(b"post", post_table(&["uni00A0"]))
        .build()
}

/// [`sample_font`] fully decoded.
pub fn sample_typeface() -> TypefaceFont {
    let data = Bytes::from(sample_font("Sample", 400));
    crate::version::sfnt::read_full(&data, None, "sample.ttf").unwrap()
}

struct SfntDirectoryEntry<'a> {
    tag: Tag,
    checksum: u32,
    offset: u32,
    data: &'a [u8],
}

fn sfnt_directory(data: &[u8], start: usize) -> (Tag, Vec<SfntDirectoryEntry<'_>>) {
    let mut input = FontReader::new_at(data, start).unwrap();
    let flavor = input.read_tag().unwrap();
    let num_tables = input.read_u16().unwrap();
    input.skip(6).unwrap();
    let entries = (0..num_tables)
        .map(|_| {
            let tag = input.read_tag().unwrap();
            let checksum = input.read_u32().unwrap();
            let offset = input.read_u32().unwrap();
            let length = input.read_u32().unwrap() as usize;
            SfntDirectoryEntry {
                tag,
                checksum,
                offset,
                data: &data[offset as usize..offset as usize + length],
            }
        })
        .collect();
    (flavor, entries)
}

/// Wrap standalone sfnts in a collection, rebasing their table offsets.
pub fn build_collection(fonts: &[Vec<u8>], version: u32) -> Vec<u8> {
    let header_size = collection_header_size(version, fonts.len() as u32);
    let mut out = BeBuffer::new()
        .bytes(&COLLECTION_TAG.to_be_bytes())
        .push(version)
        .push(fonts.len() as u32)
        .into_vec();
    out.resize(header_size, 0);

    for (index, font) in fonts.iter().enumerate() {
        let base = out.len();
        let mut offset_field = &mut out[12 + 4 * index..];
        offset_field.put_u32(base as u32);

        out.extend_from_slice(font);
        out.resize(Round4!(out.len()), 0);
        let num_tables = u16::from_be_bytes([font[4], font[5]]) as usize;
        for table in 0..num_tables {
            let field = base + 12 + 16 * table + 8;
            let offset = u32::from_be_bytes(out[field..field + 4].try_into().unwrap());
            out[field..field + 4].copy_from_slice(&(offset + base as u32).to_be_bytes());
        }
    }
    out
}

/// WOFF 1.0 wrapper around `sfnt`. Tables are zlib compressed when
/// `compress` is set and that makes them smaller, and stored otherwise.
pub fn build_woff(sfnt: &[u8], compress: bool) -> Vec<u8> {
    use flate2::{Compression, write::ZlibEncoder};
    use std::io::Write as _;

    let (flavor, mut entries) = sfnt_directory(sfnt, 0);
    entries.sort_by_key(|entry| entry.offset);

    let num_tables = entries.len();
    let mut offset = 44 + 20 * num_tables;
    let mut directory = Vec::new();
    let mut data = Vec::new();
    for entry in &entries {
        let stored = if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(entry.data).unwrap();
            let compressed = encoder.finish().unwrap();
            if compressed.len() < entry.data.len() {
                compressed
            } else {
                entry.data.to_vec()
            }
        } else {
            entry.data.to_vec()
        };
        directory.push((entry.tag, offset, stored.len(), entry.data.len(), entry.checksum));
        data.extend_from_slice(&stored);
        data.resize(Round4!(data.len()), 0);
        offset = 44 + 20 * num_tables + data.len();
    }
    directory.sort_by_key(|entry| entry.0);

    let lengths: Vec<u32> = entries.iter().map(|entry| entry.data.len() as u32).collect();
    let total_sfnt_size = crate::woff::decompress_woff1::expected_sfnt_size(&lengths);
    let length = 44 + 20 * num_tables + data.len();
    let mut out = BeBuffer::new()
        .bytes(&WOFF_SIGNATURE.to_be_bytes())
        .bytes(&flavor.to_be_bytes())
        .push(length as u32)
        .push(num_tables as u16)
        .push(0u16)
        .push(total_sfnt_size as u32)
        .extend([1u16, 0])
        .extend([0u32; 5]);
    for (tag, offset, comp_length, orig_length, checksum) in directory {
        out = out
            .bytes(&tag.to_be_bytes())
            .extend([offset as u32, comp_length as u32, orig_length as u32, checksum]);
    }
    out.bytes(&data).into_vec()
}

/// Brotli stream of uncompressed meta-blocks.
fn brotli_stored(data: &[u8]) -> Vec<u8> {
    const CHUNK: usize = 1 << 15;
    let mut out = Vec::with_capacity(data.len() + 8);
    if data.is_empty() {
        // WBITS=16, ISLAST, ISLASTEMPTY
        out.push(0b110);
        return out;
    }
    for (index, chunk) in data.chunks(CHUNK).enumerate() {
        let mlen = (chunk.len() - 1) as u32;
        // the first meta-block follows the single WBITS=16 bit
        let header = if index == 0 {
            (mlen << 4) | (1 << 20)
        } else {
            (mlen << 3) | (1 << 19)
        };
        out.extend_from_slice(&header.to_le_bytes()[..3]);
        out.extend_from_slice(chunk);
    }
    // ISLAST, ISLASTEMPTY
    out.push(0b11);
    out
}

/// WOFF 2.0 wrapper around an sfnt or collection. The Brotli stream holds
/// uncompressed meta-blocks.
///
/// Tables named in `transformed` are flagged as transformed; their sfnt data
/// must already be in transformed form (a transformed `loca` is emitted
/// empty).
pub fn build_woff2(font: &[u8], transformed: &[&[u8; 4]]) -> Vec<u8> {
    let is_transformed = |tag: Tag| transformed.iter().any(|t| Tag::new(t) == tag);

    let (flavor, fonts): (Tag, Vec<(Tag, Vec<SfntDirectoryEntry<'_>>)>) =
        if font[..4] == COLLECTION_TAG.to_be_bytes() {
            let header = crate::version::collection::CollectionHeader::parse(font).unwrap();
            let fonts = header
                .offsets
                .iter()
                .map(|&offset| sfnt_directory(font, offset as usize))
                .collect();
            (COLLECTION_TAG, fonts)
        } else {
            let (flavor, entries) = sfnt_directory(font, 0);
            (flavor, vec![(flavor, entries)])
        };

    let mut directory = Vec::new();
    let mut stream = Vec::new();
    let mut font_indices: Vec<(Tag, Vec<u16>)> = Vec::new();
    let mut num_tables: u16 = 0;
    for (font_flavor, mut entries) in fonts {
        entries.sort_by_key(|entry| entry.tag);
        // loca directly follows glyf
        if let Some(loca) = entries.iter().position(|entry| entry.tag == LOCA) {
            let loca = entries.remove(loca);
            let after_glyf = entries
                .iter()
                .position(|entry| entry.tag == GLYF)
                .map_or(entries.len(), |i| i + 1);
            entries.insert(after_glyf, loca);
        }

        let mut indices = Vec::new();
        for entry in entries {
            let transform = is_transformed(entry.tag);
            let format: u8 = match (entry.tag, transform) {
                (GLYF | LOCA, true) => 0,
                (GLYF | LOCA, false) => 3,
                (_, true) => 1,
                (_, false) => 0,
            };
            match KNOWN_TABLE_TAGS.iter().position(|known| *known == entry.tag) {
                Some(known) => directory.put_u8(known as u8 | (format << 6)),
                None => {
                    directory.put_u8(63 | (format << 6));
                    directory.put_slice(&entry.tag.to_be_bytes());
                }
            }
            directory.put_variable_128_u32(entry.data.len() as u32);
            let data = if transform && entry.tag == LOCA { &[][..] } else { entry.data };
            if transform {
                directory.put_variable_128_u32(data.len() as u32);
            }
            stream.extend_from_slice(data);
            indices.push(num_tables);
            num_tables += 1;
        }
        font_indices.push((font_flavor, indices));
    }

    if flavor == COLLECTION_TAG {
        directory.put_u32(crate::sfnt::COLLECTION_VERSION_1);
        directory.put_variable_255_u16(font_indices.len() as u16);
        for (font_flavor, indices) in &font_indices {
            directory.put_variable_255_u16(indices.len() as u16);
            directory.put_slice(&font_flavor.to_be_bytes());
            for &index in indices {
                directory.put_variable_255_u16(index);
            }
        }
    }

    let compressed = brotli_stored(&stream);
    let length = 48 + directory.len() + compressed.len();
    BeBuffer::new()
        .bytes(&WOFF2_SIGNATURE.to_be_bytes())
        .bytes(&flavor.to_be_bytes())
        .push(length as u32)
        .push(num_tables)
        .push(0u16)
        .push(font.len() as u32)
        .push(compressed.len() as u32)
        .extend([1u16, 0])
        .extend([0u32; 5])
        .bytes(&directory)
        .bytes(&compressed)
        .into_vec()
}
