//! Shared sfnt container definitions: magic numbers, checksums and the table
//! directory writer used when re-exporting a face as a standalone font.

use bytes::BufMut;
use font_types::Tag;

use crate::Round4;

/// `0x00010000`, the sfnt version of TrueType outlines.
pub const TRUETYPE_FLAVOR: Tag = Tag::new(&[0, 1, 0, 0]);
/// Apple's TrueType sfnt version.
pub const TRUE_FLAVOR: Tag = Tag::new(b"true");
/// Old style PostScript font housed in a sfnt wrapper.
pub const TYP1_FLAVOR: Tag = Tag::new(b"typ1");
/// OpenType with CFF outlines.
pub const CFF_FLAVOR: Tag = Tag::new(b"OTTO");
/// TrueType Collection ID string.
pub const COLLECTION_TAG: Tag = Tag::new(b"ttcf");
pub const WOFF_SIGNATURE: Tag = Tag::new(b"wOFF");
pub const WOFF2_SIGNATURE: Tag = Tag::new(b"wOF2");

pub const SFNT_HEADER_SIZE: usize = 12;
pub const SFNT_ENTRY_SIZE: usize = 16;

pub const COLLECTION_VERSION_1: u32 = 0x00010000;
pub const COLLECTION_VERSION_2: u32 = 0x00020000;

/// The whole-font checksum of a valid font, from which `checkSumAdjustment`
/// is subtracted.
pub const CHECKSUM_MAGIC: u32 = 0xB1B0AFBA;

/// Size of the collection header. 0 if version indicates this isn't a
/// collection. Ref http://www.microsoft.com/typography/otspec/otff.htm,
/// True Type Collections
pub fn collection_header_size(header_version: u32, num_fonts: u32) -> usize {
    let mut size: usize = 0;
    if header_version == COLLECTION_VERSION_2 {
        size += 12; // ulDsig{Tag,Length,Offset}
    }
    if header_version == COLLECTION_VERSION_1 || header_version == COLLECTION_VERSION_2 {
        size += 12   // TTCTag, Version, numFonts
      + 4 * (num_fonts as usize); // OffsetTable[numFonts]
    }
    size
}

/// Compute the sfnt checksum of `buf`: the wrapping sum of its big-endian
/// u32 words.
pub fn compute_checksum(buf: &[u8]) -> u32 {
    let mut checksum: u32 = 0;
    let mut iter = buf.chunks_exact(4);
    for chunk in &mut iter {
        checksum = checksum.wrapping_add(u32::from_be_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3],
        ]));
    }

    // Treat size not aligned on 4 as if it were padded to 4 with 0's
    let remainder = iter.remainder();
    let mut last = [0u8; 4];
    last[..remainder.len()].copy_from_slice(remainder);
    checksum.wrapping_add(u32::from_be_bytes(last))
}

/// Checksum of a table as recorded in the table directory. For `head` the
/// `checkSumAdjustment` field is counted as zero.
pub fn table_checksum(tag: Tag, data: &[u8]) -> u32 {
    let checksum = compute_checksum(data);
    if tag == crate::table_tags::HEAD && data.len() >= 12 {
        let adjustment = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        checksum.wrapping_sub(adjustment)
    } else {
        checksum
    }
}

/// Binary search helper fields of a table directory with `num_tables`
/// entries: `(searchRange, entrySelector, rangeShift)`.
pub fn search_params(num_tables: u16) -> (u16, u16, u16) {
    let mut max_pow2: u16 = 0;
    while 1u32 << (max_pow2 + 1) <= (num_tables as u32) {
        max_pow2 += 1;
    }
    let entry_selector = max_pow2;
    let search_range = ((1u32 << max_pow2) << 4) as u16;
    let range_shift = (((num_tables as u32) << 4).saturating_sub(search_range as u32)) as u16;
    (search_range, entry_selector, range_shift)
}

/// Writes an OpenType table directory header
///
/// <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#table-directory>
pub fn write_table_directory_header(output: &mut impl BufMut, flavor: Tag, num_tables: u16) {
    let (search_range, entry_selector, range_shift) = search_params(num_tables);
    output.put_slice(&flavor.to_be_bytes()); // sfnt version
    output.put_u16(num_tables);
    output.put_u16(search_range);
    output.put_u16(entry_selector);
    output.put_u16(range_shift);
}

/// One table to be written by [`write_sfnt`].
#[derive(Clone, Copy, Debug)]
pub struct SfntTable<'a> {
    pub tag: Tag,
    pub checksum: u32,
    pub data: &'a [u8],
}

/// Assemble a standalone sfnt from decoded tables.
///
/// The directory is written in tag order. Table data is laid out in the order
/// of `tables`, each padded to a 4-byte boundary, with the directory slots
/// reserved up front and backpatched once each table's offset is known.
pub fn write_sfnt(flavor: Tag, tables: &[SfntTable<'_>]) -> Vec<u8> {
    let num_tables = tables.len();
    let mut directory_order: Vec<usize> = (0..num_tables).collect();
    directory_order.sort_by_key(|&index| tables[index].tag);

    let data_size: usize = tables.iter().map(|t| Round4!(t.data.len())).sum();
    let mut out: Vec<u8> =
        Vec::with_capacity(SFNT_HEADER_SIZE + SFNT_ENTRY_SIZE * num_tables + data_size);
    write_table_directory_header(&mut out, flavor, num_tables as u16);

    // Reserve space for the directory entries
    let directory_start = out.len();
    out.resize(directory_start + SFNT_ENTRY_SIZE * num_tables, 0);

    for (slot, &index) in directory_order.iter().enumerate() {
        let table = &tables[index];
        let mut entry = &mut out[directory_start + slot * SFNT_ENTRY_SIZE..];
        entry.put_slice(&table.tag.to_be_bytes());
        entry.put_u32(table.checksum);
    }

    for (index, table) in tables.iter().enumerate() {
        let table_offset = out.len();
        out.extend_from_slice(table.data);
        out.resize(Round4!(out.len()), 0);

        let slot = directory_order
            .iter()
            .position(|&i| i == index)
            .unwrap_or_default();
        let mut entry = &mut out[directory_start + slot * SFNT_ENTRY_SIZE + 8..];
        entry.put_u32(table_offset as u32);
        entry.put_u32(table.data.len() as u32);
    }

    out
}
