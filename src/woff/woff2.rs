//! WOFF 2.0 decoding: one Brotli stream holding every table, with `glyf`,
//! `loca` and optionally `hmtx` in transformed form.

use std::collections::HashMap;
use std::error::Error;

use bytes::{Buf as _, BufMut};
use font_types::Tag;

use crate::Round4;
use crate::error::{ReadError, bail, bail_if};
use crate::sfnt::{CHECKSUM_MAGIC, COLLECTION_VERSION_2, compute_checksum, write_table_directory_header};
use crate::table_tags::{GLYF, HEAD, HMTX, LOCA};
use crate::woff::glyf_decoder::decode_glyf_table;
use crate::woff::headers::{
    CollectionDirectory, CollectionDirectoryEntry, Woff2TableDirectory, Woff2TableDirectoryEntry,
    WoffHeader, WoffVersion,
};
use crate::woff::hmtx_decoder::{decode_hmtx_table, generate_hmtx_table};

/// Signature of a Brotli decompression function: `(compressed, size_hint)`.
pub type BrotliFn<'a> = dyn FnMut(&[u8], usize) -> Result<Vec<u8>, Box<dyn Error>> + 'a;

// Over 14k test fonts the max compression ratio seen to date was ~20.
// >100 suggests you wrote a bad uncompressed size.
const MAX_PLAUSIBLE_COMPRESSION_RATIO: f32 = 100.0;

#[cfg(feature = "brotli")]
pub(crate) fn decompress_brotli(
    compressed_data: &[u8],
    size_hint: usize,
) -> Result<Vec<u8>, Box<dyn Error>> {
    use brotli_decompressor::DecompressorWriter;
    use std::io::Write as _;

    let mut output: Vec<u8> = Vec::with_capacity(size_hint);
    let mut decompressor = DecompressorWriter::new(&mut output, 4096);
    decompressor.write_all(compressed_data)?;
    decompressor.close()?;
    drop(decompressor);
    Ok(output)
}

/// Decompress a WOFF2 file into an sfnt, or a TrueType collection when the
/// WOFF2 holds several fonts.
#[cfg(feature = "brotli")]
pub fn decompress_woff2(raw_woff_data: &[u8]) -> Result<Vec<u8>, ReadError> {
    decompress_woff2_with_brotli(raw_woff_data, &mut decompress_brotli)
}

/// Decompress a WOFF2 file using a custom Brotli decompressor passed as a closure
pub fn decompress_woff2_with_brotli(
    raw_woff_data: &[u8],
    decompress_brotli: &mut BrotliFn<'_>,
) -> Result<Vec<u8>, ReadError> {
    // `input` is advanced by the parsing functions, `raw_woff_data` keeps
    // the whole file.
    let mut input = raw_woff_data;

    // Parse header, table directory and collection directory
    let header = WoffHeader::parse(&mut input)?;
    bail_if!(
        header.woff_version != WoffVersion::Woff2,
        "expected a WOFF 2.0 file, found signature '{}'",
        header.signature
    );
    bail_if!(header.total_sfnt_size < 1, "WOFF2 declares an empty sfnt");

    let table_directory = Woff2TableDirectory::parse(&mut input, header.num_tables as usize)?;
    let mut collection_directory = if header.is_collection() {
        CollectionDirectory::parse(&mut input, &table_directory)?
    } else {
        CollectionDirectory::for_single_font(header.flavor, &table_directory)
    };

    // Re-order tables in output (OTSpec) order
    collection_directory.sort_tables_within_each_font(&table_directory);
    let num_fonts = collection_directory.fonts.len();

    let compression_ratio: f32 = (header.total_sfnt_size as f32) / (raw_woff_data.len() as f32);
    bail_if!(
        compression_ratio > MAX_PLAUSIBLE_COMPRESSION_RATIO,
        "implausible compression ratio {compression_ratio:.1}"
    );

    // Decompress data with brotli decoder
    let Some(compressed_data) = input.get(..header.total_compressed_size as usize) else {
        bail!(
            "compressed stream of {} bytes extends past end of file",
            header.total_compressed_size
        );
    };
    let decompressed_data = decompress_brotli(compressed_data, header.total_sfnt_size as usize)
        .map_err(|err| ReadError::Decompression {
            tag: header.signature,
            reason: err.to_string(),
        })?;
    let expected_size = table_directory.uncompressed_size();
    if decompressed_data.len() != expected_size {
        return Err(ReadError::LengthMismatch {
            stage: "brotli stream",
            expected: expected_size,
            actual: decompressed_data.len(),
        });
    }
    log::debug!(
        "decompressed {} bytes of WOFF2 table data for {num_fonts} font(s)",
        decompressed_data.len()
    );

    let mut out: Vec<u8> = Vec::with_capacity(header.total_sfnt_size as usize);

    // The header is written up front as a placeholder and copied back once
    // every table entry has been filled in.
    let mut out_header = generate_header(&header, &table_directory, &collection_directory);
    out.extend_from_slice(&out_header.data);

    let mut state = ReconstructionState {
        table_metadata: vec![None; header.num_tables as usize],
        glyf_info: HashMap::new(),
    };
    for (font_idx, font_entry) in collection_directory.fonts.iter().enumerate() {
        reconstruct_font(
            &decompressed_data,
            &table_directory,
            font_entry,
            &mut out_header,
            &mut state,
            &mut out,
            font_idx,
        )?;
    }

    out[..out_header.data.len()].copy_from_slice(&out_header.data);

    Ok(out)
}

fn iter_tables_for_font<'a>(
    font_entry: &'a CollectionDirectoryEntry,
    tables: &'a Woff2TableDirectory,
) -> impl Iterator<Item = (usize, &'a Woff2TableDirectoryEntry)> {
    font_entry
        .table_indices
        .iter()
        .map(|table_idx| (*table_idx as usize, &tables[*table_idx as usize]))
}

/// Per-file bookkeeping shared by every font of a collection.
struct ReconstructionState {
    /// Where each table was written. Index corresponds to the table's index
    /// within the table directory.
    table_metadata: Vec<Option<TableMetadata>>,
    /// `(num_glyphs, x_mins)` by glyf table index, for hmtx reconstruction.
    glyf_info: HashMap<usize, (u16, Vec<i16>)>,
}

fn reconstruct_font(
    woff_data: &[u8],
    tables: &Woff2TableDirectory,
    font_entry: &CollectionDirectoryEntry,
    out_header: &mut HeaderData,
    state: &mut ReconstructionState,
    out: &mut Vec<u8>,
    font_idx: usize,
) -> Result<(), ReadError> {
    let glyf_idx = font_entry.glyf_idx.map(|idx| idx as usize);
    let loca_idx = font_entry.loca_idx.map(|idx| idx as usize);
    let hhea_idx = font_entry.hhea_idx.map(|idx| idx as usize);

    // 'glyf' without 'loca' doesn't make sense
    match (glyf_idx, loca_idx) {
        (Some(glyf_idx), Some(loca_idx)) => {
            bail_if!(
                tables[glyf_idx].is_transformed() != tables[loca_idx].is_transformed(),
                "cannot transform just one of glyf/loca"
            );
        }
        (Some(_), None) | (None, Some(_)) => bail!("cannot have just one of glyf/loca"),
        (None, None) => {}
    }

    // Sum of this font's table directory before any entries were filled in
    let mut font_checksum: u32 = out_header.font_infos[font_idx].header_checksum;

    // Read and store "num_hmetrics" from "hhea" table and then used to reconstruct "hmtx"
    let num_hmetrics = match hhea_idx {
        Some(hhea_idx) => Some(read_num_hmetrics(tables[hhea_idx].data_as_slice(woff_data)?)?),
        None => None,
    };

    // Tables within each font have already been sorted in tag order, so
    // 'glyf' is always reconstructed before 'hmtx'.
    for (table_idx, table) in iter_tables_for_font(font_entry, tables) {
        let metadata = if let Some(metadata) = state.table_metadata[table_idx] {
            // Already written, either by an earlier font of a collection or,
            // for 'loca', alongside 'glyf'. Only the latter can happen in the
            // first font.
            bail_if!(
                font_idx == 0 && table.tag != LOCA,
                "'{}' table appears twice in the first font",
                table.tag
            );
            metadata
        }
        // Any table which does not need to be transformed
        else if !table.is_transformed() {
            let table_data = table.data_as_slice(woff_data)?;
            let checksum_adjustment = if table.tag == HEAD {
                let Some(field) = table_data.get(8..12) else {
                    bail!("'head' table is only {} bytes", table_data.len());
                };
                u32::from_be_bytes([field[0], field[1], field[2], field[3]])
            } else {
                0
            };
            let checksum = compute_checksum(table_data).wrapping_sub(checksum_adjustment);

            let metadata = TableMetadata {
                dst_offset: out.len() as u32,
                dst_length: table.woff_length,
                checksum,
            };
            state.table_metadata[table_idx] = Some(metadata);

            out.extend_from_slice(table_data);
            out.resize(Round4!(out.len()), 0);

            metadata
        }
        // glyf table (also process loca table)
        else if table.tag == GLYF {
            let Some(loca_idx) = loca_idx else {
                bail!("transformed 'glyf' without 'loca'");
            };

            let raw_glyf_table_data = table.data_as_slice(woff_data)?;
            let glyf_and_loca_data =
                decode_glyf_table(raw_glyf_table_data).map_err(|err| err.in_table(GLYF))?;

            // Write glyf table
            let glyf_dest_offset = out.len();
            out.extend_from_slice(&glyf_and_loca_data.glyf_table);
            out.resize(Round4!(out.len()), 0);
            let glyf_metadata = TableMetadata {
                checksum: glyf_and_loca_data.glyf_checksum,
                dst_offset: glyf_dest_offset as u32,
                dst_length: glyf_and_loca_data.glyf_table.len() as u32,
            };
            state.table_metadata[table_idx] = Some(glyf_metadata);

            // Write loca table
            let loca_dest_offset = out.len();
            out.extend_from_slice(&glyf_and_loca_data.loca_table);
            out.resize(Round4!(out.len()), 0);
            let loca_metadata = TableMetadata {
                checksum: glyf_and_loca_data.loca_checksum,
                dst_offset: loca_dest_offset as u32,
                dst_length: glyf_and_loca_data.loca_table.len() as u32,
            };
            state.table_metadata[loca_idx] = Some(loca_metadata);

            state.glyf_info.insert(
                table_idx,
                (glyf_and_loca_data.num_glyphs, glyf_and_loca_data.x_mins),
            );

            glyf_metadata
        } else if table.tag == HMTX {
            let Some((num_glyphs, x_mins)) = glyf_idx.and_then(|idx| state.glyf_info.get(&idx))
            else {
                bail!("transformed 'hmtx' requires a transformed 'glyf'");
            };
            let Some(num_hmetrics) = num_hmetrics else {
                bail!("transformed 'hmtx' requires 'hhea'");
            };

            let mut raw_hmtx_table_data = table.data_as_slice(woff_data)?;
            let hmtx_data =
                decode_hmtx_table(&mut raw_hmtx_table_data, *num_glyphs, num_hmetrics, x_mins)
                    .map_err(|err| err.in_table(HMTX))?;
            let hmtx_table = generate_hmtx_table(&hmtx_data);

            let dest_offset = out.len();
            out.extend_from_slice(&hmtx_table);
            out.resize(Round4!(out.len()), 0);
            let hmtx_metadata = TableMetadata {
                checksum: compute_checksum(&hmtx_table),
                dst_offset: dest_offset as u32,
                dst_length: hmtx_table.len() as u32,
            };
            state.table_metadata[table_idx] = Some(hmtx_metadata);

            hmtx_metadata
        } else {
            // loca is written with glyf, and headers reject other transforms
            bail!("unexpected transformed '{}' table", table.tag)
        };

        font_checksum = font_checksum.wrapping_add(metadata.checksum);

        // update the table entry with real values. We replaced 0's, so update checksum.
        out_header.update_table_entry(font_idx, table.tag, metadata);
        font_checksum = font_checksum.wrapping_add(metadata.header_checksum_contribution());
    }

    // Update 'head' checkSumAdjustment. We already set it to 0 and summed font.
    //
    // <https://learn.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums>
    let checksum_adjustment = CHECKSUM_MAGIC.wrapping_sub(font_checksum);
    if let Some(head_table_idx) = font_entry.head_idx {
        let Some(head_metadata) = state.table_metadata[head_table_idx as usize] else {
            bail!("'head' table was not written");
        };
        let mut writer = &mut out[head_metadata.dst_offset as usize + 8..];
        writer.put_u32(checksum_adjustment);
    }

    Ok(())
}

// Get numberOfHMetrics, https://www.microsoft.com/typography/otspec/hhea.htm
fn read_num_hmetrics(mut hhea_data: &[u8]) -> Result<u16, ReadError> {
    bail_if!(hhea_data.len() < 36, "'hhea' table is only {} bytes", hhea_data.len());
    hhea_data.advance(34); // Skip 34 to reach 'hhea' numberOfHMetrics
    Ok(hhea_data.try_get_u16()?)
}

#[derive(Clone, Debug, Default)]
struct FontInfo {
    /// Checksum of this font's table directory as currently written.
    header_checksum: u32,
    /// Offset of each table's directory entry within the header.
    table_entry_by_tag: HashMap<Tag, usize>,
}

struct HeaderData {
    data: Vec<u8>,
    font_infos: Vec<FontInfo>,
}

#[derive(Clone, Copy, Debug, Default)]
struct TableMetadata {
    checksum: u32,
    dst_offset: u32,
    dst_length: u32,
}

impl TableMetadata {
    fn header_checksum_contribution(&self) -> u32 {
        self.checksum
            .wrapping_add(self.dst_offset)
            .wrapping_add(self.dst_length)
    }
}

impl HeaderData {
    /// Update the table entry with real values.
    fn update_table_entry(&mut self, font_idx: usize, tag: Tag, metadata: TableMetadata) {
        let info = &mut self.font_infos[font_idx];
        let Some(&table_entry_offset) = info.table_entry_by_tag.get(&tag) else {
            return;
        };
        let mut out = &mut self.data[(table_entry_offset + 4)..];
        out.put_u32(metadata.checksum);
        out.put_u32(metadata.dst_offset);
        out.put_u32(metadata.dst_length);

        info.header_checksum = info
            .header_checksum
            .wrapping_add(metadata.header_checksum_contribution());
    }
}

fn generate_header(
    header: &WoffHeader,
    tables: &Woff2TableDirectory,
    collection_directory: &CollectionDirectory,
) -> HeaderData {
    let num_fonts = collection_directory.fonts.len();
    let header_size = if header.is_collection() {
        collection_directory.collection_header_size()
    } else {
        0
    };
    let mut output: Vec<u8> =
        Vec::with_capacity(header_size + collection_directory.table_directories_size());
    let mut font_infos: Vec<FontInfo> = vec![FontInfo::default(); num_fonts];

    if header.is_collection() {
        output.put_slice(&header.flavor.to_be_bytes()); // TAG TTCTag
        output.put_u32(collection_directory.version); // FIXED Version
        output.put_u32(num_fonts as u32); // ULONG numFonts

        let mut table_directory_offset = header_size as u32;
        for font in collection_directory.fonts.iter() {
            output.put_u32(table_directory_offset);
            table_directory_offset += font.table_directory_size() as u32;
        }

        // space for DSIG fields for header v2
        if collection_directory.version == COLLECTION_VERSION_2 {
            output.put_u32(0); // ULONG ulDsigTag
            output.put_u32(0); // ULONG ulDsigLength
            output.put_u32(0); // ULONG ulDsigOffset
        }
    }

    // One table directory per font, each with zeroed entries
    for (font, info) in collection_directory.fonts.iter().zip(font_infos.iter_mut()) {
        let start_offset = output.len();
        write_table_directory_header(&mut output, font.flavor, font.num_tables() as u16);

        for &table_index in &font.table_indices {
            let tag = tables[table_index as usize].tag;
            info.table_entry_by_tag.insert(tag, output.len());
            output.put_slice(&tag.to_be_bytes());
            output.put_u32(0);
            output.put_u32(0);
            output.put_u32(0);
        }

        info.header_checksum = compute_checksum(&output[start_offset..]);
    }

    HeaderData {
        data: output,
        font_infos,
    }
}
