use std::error::Error;

use font_types::Tag;

use crate::Round4;
use crate::error::{ReadError, bail_if};
use crate::sfnt::{self, CFF_FLAVOR, SFNT_ENTRY_SIZE, SFNT_HEADER_SIZE, SfntTable, TRUE_FLAVOR};
use crate::woff::headers::{Woff1TableDirectory, Woff1TableDirectoryEntry, WoffHeader, WoffVersion};

/// Signature of a zlib inflate function: `(compressed, expected_len)`.
pub type InflateFn<'a> = dyn FnMut(&[u8], usize) -> Result<Vec<u8>, Box<dyn Error>> + 'a;

/// A table after inflation, still carrying the checksum recorded in the
/// WOFF directory.
#[derive(Clone, Debug)]
pub struct DecodedTable {
    pub tag: Tag,
    pub checksum: u32,
    /// Offset of the table's data within the WOFF file, kept so tables can
    /// be laid out in their original order.
    pub woff_offset: u32,
    pub data: Vec<u8>,
}

/// A parsed WOFF 1.0 header and table directory over the raw file.
#[derive(Clone, Debug)]
pub struct Woff1File<'a> {
    raw: &'a [u8],
    pub header: WoffHeader,
    pub directory: Woff1TableDirectory,
}

impl<'a> Woff1File<'a> {
    pub fn parse(raw_woff_data: &'a [u8]) -> Result<Self, ReadError> {
        // `input` is a view that parsing functions advance; `raw_woff_data`
        // keeps the full file for resolving table offsets.
        let mut input = raw_woff_data;

        let header = WoffHeader::parse(&mut input)?;
        bail_if!(
            header.woff_version != WoffVersion::Woff1,
            "expected a WOFF 1.0 file, found signature '{}'",
            header.signature
        );
        let mut directory = Woff1TableDirectory::parse(&mut input, header.num_tables as usize)?;
        directory.sort_by_key(|t| t.offset);

        Ok(Self {
            raw: raw_woff_data,
            header,
            directory,
        })
    }

    /// The sfnt version the tables are re-exported under: `OTTO` for CFF
    /// flavoured fonts and `true` for everything else.
    pub fn export_flavor(&self) -> Tag {
        match self.header.flavor {
            CFF_FLAVOR => CFF_FLAVOR,
            _ => TRUE_FLAVOR,
        }
    }

    /// Inflate the tables accepted by `filter`, in file order.
    pub fn decode_tables(
        &self,
        mut filter: impl FnMut(Tag) -> bool,
        inflate: &mut InflateFn<'_>,
    ) -> Result<Vec<DecodedTable>, ReadError> {
        self.directory
            .iter()
            .filter(|entry| filter(entry.tag))
            .map(|entry| self.decode_table(entry, inflate))
            .collect()
    }

    fn decode_table(
        &self,
        entry: &Woff1TableDirectoryEntry,
        inflate: &mut InflateFn<'_>,
    ) -> Result<DecodedTable, ReadError> {
        let stored = entry.data_as_slice(self.raw)?;
        let data = if entry.is_compressed() {
            let inflated = inflate(stored, entry.orig_length as usize).map_err(|err| {
                ReadError::Decompression {
                    tag: entry.tag,
                    reason: err.to_string(),
                }
            })?;
            if inflated.len() != entry.orig_length as usize {
                return Err(ReadError::LengthMismatch {
                    stage: "inflated table",
                    expected: entry.orig_length as usize,
                    actual: inflated.len(),
                }
                .in_table(entry.tag));
            }
            log::debug!(
                "inflated '{}' table from {} to {} bytes",
                entry.tag,
                entry.comp_length,
                entry.orig_length
            );
            inflated
        } else {
            stored.to_vec()
        };
        Ok(DecodedTable {
            tag: entry.tag,
            checksum: entry.orig_checksum,
            woff_offset: entry.offset,
            data,
        })
    }
}

/// Assemble decoded tables into an sfnt, checking the result against the
/// size the WOFF header declares.
pub fn write_decoded_sfnt(
    flavor: Tag,
    tables: &[DecodedTable],
    total_sfnt_size: u32,
) -> Result<Vec<u8>, ReadError> {
    let sfnt_tables: Vec<SfntTable<'_>> = tables
        .iter()
        .map(|table| SfntTable {
            tag: table.tag,
            checksum: table.checksum,
            data: &table.data,
        })
        .collect();
    let out = sfnt::write_sfnt(flavor, &sfnt_tables);

    if out.len() != total_sfnt_size as usize {
        return Err(ReadError::LengthMismatch {
            stage: "reconstructed sfnt",
            expected: total_sfnt_size as usize,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Expected sfnt size for a set of tables, as it should appear in a WOFF
/// header's `totalSfntSize`.
pub fn expected_sfnt_size<'t>(lengths: impl IntoIterator<Item = &'t u32>) -> usize {
    let mut num_tables = 0;
    let mut size = 0;
    for &length in lengths {
        num_tables += 1;
        size += Round4!(length as usize);
    }
    SFNT_HEADER_SIZE + SFNT_ENTRY_SIZE * num_tables + size
}

#[cfg(feature = "z")]
pub(crate) fn decompress_z(
    compressed_data: &[u8],
    size_hint: usize,
) -> Result<Vec<u8>, Box<dyn Error>> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut output: Vec<u8> = Vec::with_capacity(size_hint);
    let mut decompressor = Decompress::new(true);
    let status =
        decompressor.decompress_vec(compressed_data, &mut output, FlushDecompress::Finish)?;
    if status != Status::StreamEnd {
        return Err(format!("zlib stream did not end after {} bytes", output.len()).into());
    }
    Ok(output)
}

#[cfg(not(feature = "z"))]
pub(crate) fn decompress_z(
    _compressed_data: &[u8],
    _size_hint: usize,
) -> Result<Vec<u8>, Box<dyn Error>> {
    Err(Box::new(ReadError::NotSupported(
        "zlib decompression (crate built without the `z` feature)",
    )))
}

/// Decompress a WOFF1 file using the built-in zlib decompressor
pub fn decompress_woff1(raw_woff_data: &[u8]) -> Result<Vec<u8>, ReadError> {
    decompress_woff1_with_custom_z(raw_woff_data, &mut decompress_z)
}

/// Decompress a WOFF1 file using a custom zlib decompressor passed as a closure
pub fn decompress_woff1_with_custom_z(
    raw_woff_data: &[u8],
    decompress_z: &mut InflateFn<'_>,
) -> Result<Vec<u8>, ReadError> {
    let woff = Woff1File::parse(raw_woff_data)?;
    let tables = woff.decode_tables(|_| true, decompress_z)?;
    write_decoded_sfnt(woff.export_flavor(), &tables, woff.header.total_sfnt_size)
}
