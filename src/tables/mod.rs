//! The table directory and the typed tables read from it.
//!
//! A [`TableSet`] owns one [`TableEntry`] per tag in the directory. Entries
//! are decoded lazily by a [`TableFactory`] the first time they are asked for
//! and the result is cached in the entry's slot for the life of the set.

pub mod cmap;
pub mod head;
pub mod hhea;
pub mod hmtx;
pub mod kern;
pub mod maxp;
pub mod name;
pub mod os2;
pub mod post;

use std::collections::BTreeSet;

use bytes::Bytes;
use font_types::Tag;

use crate::buffer::FontReader;
use crate::error::ReadError;
use crate::table_tags::{self, KNOWN_TABLE_TAGS};

use self::cmap::CharacterMap;
use self::head::FontHeader;
use self::hhea::HorizontalHeader;
use self::hmtx::HorizontalMetrics;
use self::kern::Kerning;
use self::maxp::MaximumProfile;
use self::name::NamingTable;
use self::os2::Os2;
use self::post::PostScript;

/// A `{tag, checksum, offset, length}` table directory record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    pub fn parse(input: &mut FontReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            tag: input.read_tag()?,
            checksum: input.read_u32()?,
            offset: input.read_u32()?,
            length: input.read_u32()?,
        })
    }
}

/// Read `num_tables` directory records, ordered by file offset.
///
/// A tag that appears more than once keeps its first record.
pub fn read_directory(
    input: &mut FontReader<'_>,
    num_tables: u16,
) -> Result<Vec<TableRecord>, ReadError> {
    let mut records: Vec<TableRecord> = Vec::with_capacity(num_tables as usize);
    for _ in 0..num_tables {
        let record = TableRecord::parse(input)?;
        if records.iter().any(|r| r.tag == record.tag) {
            log::warn!("duplicate '{}' table record ignored", record.tag);
            continue;
        }
        records.push(record);
    }
    records.sort_by_key(|r| r.offset);
    Ok(records)
}

/// The closed set of tables this crate decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    Cmap,
    Head,
    Hhea,
    Hmtx,
    Kern,
    Maxp,
    Name,
    Os2,
    Post,
}

impl TableKind {
    pub fn from_tag(tag: Tag) -> Option<Self> {
        Some(match tag {
            table_tags::CMAP => Self::Cmap,
            table_tags::HEAD => Self::Head,
            table_tags::HHEA => Self::Hhea,
            table_tags::HMTX => Self::Hmtx,
            table_tags::KERN => Self::Kern,
            table_tags::MAXP => Self::Maxp,
            table_tags::NAME => Self::Name,
            table_tags::OS2 => Self::Os2,
            table_tags::POST => Self::Post,
            _ => return None,
        })
    }

    pub fn tag(self) -> Tag {
        match self {
            Self::Cmap => table_tags::CMAP,
            Self::Head => table_tags::HEAD,
            Self::Hhea => table_tags::HHEA,
            Self::Hmtx => table_tags::HMTX,
            Self::Kern => table_tags::KERN,
            Self::Maxp => table_tags::MAXP,
            Self::Name => table_tags::NAME,
            Self::Os2 => table_tags::OS2,
            Self::Post => table_tags::POST,
        }
    }

    /// Tables that must be decoded before this one.
    pub fn dependencies(self) -> &'static [TableKind] {
        match self {
            // long record count from hhea, glyph count from maxp
            Self::Hmtx => &[TableKind::Hhea, TableKind::Maxp],
            _ => &[],
        }
    }
}

/// A decoded table.
#[derive(Clone, Debug)]
pub enum Table {
    Cmap(CharacterMap),
    Head(FontHeader),
    Hhea(HorizontalHeader),
    Hmtx(HorizontalMetrics),
    Kern(Kerning),
    Maxp(MaximumProfile),
    Name(NamingTable),
    Os2(Os2),
    Post(PostScript),
}

impl Table {
    pub fn kind(&self) -> TableKind {
        match self {
            Table::Cmap(_) => TableKind::Cmap,
            Table::Head(_) => TableKind::Head,
            Table::Hhea(_) => TableKind::Hhea,
            Table::Hmtx(_) => TableKind::Hmtx,
            Table::Kern(_) => TableKind::Kern,
            Table::Maxp(_) => TableKind::Maxp,
            Table::Name(_) => TableKind::Name,
            Table::Os2(_) => TableKind::Os2,
            Table::Post(_) => TableKind::Post,
        }
    }
}

/// Decode state of a [`TableEntry`].
#[derive(Clone, Debug, Default)]
pub enum TableSlot {
    #[default]
    Unparsed,
    Parsed(Table),
    /// Present in the directory but not a table this crate decodes.
    Skipped,
    /// Decoding failed; the message is reported again on every access.
    Errored(String),
}

/// One table of a font: its directory record, its bytes and its decode state.
#[derive(Clone, Debug)]
pub struct TableEntry {
    pub record: TableRecord,
    pub data: Bytes,
    pub slot: TableSlot,
}

impl TableEntry {
    pub fn tag(&self) -> Tag {
        self.record.tag
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.slot {
            TableSlot::Parsed(table) => Some(table),
            _ => None,
        }
    }

    /// Whether the bytes match the checksum recorded in the directory.
    pub fn checksum_matches(&self) -> bool {
        crate::sfnt::table_checksum(self.record.tag, &self.data) == self.record.checksum
    }
}

/// Decodes table bytes into [`Table`]s and tracks which required tables
/// have been seen.
#[derive(Clone, Debug)]
pub struct TableFactory {
    required: BTreeSet<Tag>,
    throw_on_unknown_tag: bool,
}

impl TableFactory {
    pub fn new(required: impl IntoIterator<Item = Tag>, throw_on_unknown_tag: bool) -> Self {
        Self {
            required: required.into_iter().collect(),
            throw_on_unknown_tag,
        }
    }

    /// Required set for fonts with TrueType outlines.
    pub fn truetype() -> Self {
        Self::new(
            [
                table_tags::CMAP,
                table_tags::HEAD,
                table_tags::HHEA,
                table_tags::MAXP,
                table_tags::NAME,
                table_tags::OS2,
                table_tags::POST,
            ],
            false,
        )
    }

    /// Required set for OpenType fonts with CFF outlines.
    pub fn cff() -> Self {
        Self::new(
            [
                table_tags::CMAP,
                table_tags::HEAD,
                table_tags::HHEA,
                table_tags::MAXP,
                table_tags::NAME,
            ],
            false,
        )
    }

    /// Nothing required; used by the metadata-only read path.
    pub fn lenient() -> Self {
        Self::new([], false)
    }

    pub fn throw_on_unknown_tag(mut self, throw: bool) -> Self {
        self.throw_on_unknown_tag = throw;
        self
    }

    /// Required tags that have not been successfully read yet.
    pub fn missing(&self) -> impl Iterator<Item = Tag> + '_ {
        self.required.iter().copied()
    }

    /// Count a table decoded by an earlier pass as read.
    pub fn mark_present(&mut self, tag: Tag) {
        self.required.remove(&tag);
    }

    /// Fails naming every required table that was never read.
    pub fn validate_required_tables(&self) -> Result<(), ReadError> {
        if self.required.is_empty() {
            Ok(())
        } else {
            Err(ReadError::MissingTables(self.missing().collect()))
        }
    }

    /// Decode one table. `tables` supplies already decoded dependencies.
    ///
    /// Returns `Ok(None)` for tags that are recognised but not decoded.
    pub fn read_table(
        &mut self,
        record: &TableRecord,
        data: &[u8],
        tables: &TableSet,
    ) -> Result<Option<Table>, ReadError> {
        let tag = record.tag;
        let Some(kind) = TableKind::from_tag(tag) else {
            if self.throw_on_unknown_tag && !KNOWN_TABLE_TAGS.contains(&tag) {
                return Err(ReadError::UnknownTable(tag));
            }
            log::trace!("'{tag}' table is not decoded");
            return Ok(None);
        };

        let table = Self::decode(kind, data, tables).map_err(|err| err.in_table(tag))?;
        log::debug!("decoded '{tag}' table ({} bytes)", data.len());
        self.required.remove(&tag);
        Ok(Some(table))
    }

    fn decode(kind: TableKind, data: &[u8], tables: &TableSet) -> Result<Table, ReadError> {
        Ok(match kind {
            TableKind::Cmap => Table::Cmap(CharacterMap::parse(data)?),
            TableKind::Head => Table::Head(FontHeader::parse(data)?),
            TableKind::Hhea => Table::Hhea(HorizontalHeader::parse(data)?),
            TableKind::Hmtx => {
                let hhea = tables
                    .hhea()
                    .ok_or_else(|| ReadError::Malformed("hmtx without a readable hhea".into()))?;
                let num_glyphs = tables.maxp().map(|maxp| maxp.num_glyphs);
                Table::Hmtx(HorizontalMetrics::parse(
                    data,
                    hhea.number_of_h_metrics,
                    num_glyphs,
                )?)
            }
            TableKind::Kern => Table::Kern(Kerning::parse(data)?),
            TableKind::Maxp => Table::Maxp(MaximumProfile::parse(data)?),
            TableKind::Name => Table::Name(NamingTable::parse(data)?),
            TableKind::Os2 => Table::Os2(Os2::parse(data)?),
            TableKind::Post => Table::Post(PostScript::parse(data)?),
        })
    }
}

/// The tables of one font face, in file offset order.
#[derive(Clone, Debug, Default)]
pub struct TableSet {
    entries: Vec<TableEntry>,
}

macro_rules! typed_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self.get(TableKind::$variant.tag())?.table()? {
                Table::$variant(table) => Some(table),
                _ => None,
            }
        }
    };
}

impl TableSet {
    /// Slice each record's bytes out of `data`, the buffer the directory's
    /// offsets are relative to.
    pub fn from_directory(data: &Bytes, records: Vec<TableRecord>) -> Result<Self, ReadError> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let start = record.offset as usize;
            let end = start
                .checked_add(record.length as usize)
                .filter(|end| *end <= data.len())
                .ok_or_else(|| {
                    ReadError::Malformed(format!(
                        "table extends past end of data ({}+{} > {})",
                        record.offset,
                        record.length,
                        data.len()
                    ))
                    .in_table(record.tag)
                })?;
            entries.push(TableEntry {
                record,
                data: data.slice(start..end),
                slot: TableSlot::Unparsed,
            });
        }
        entries.sort_by_key(|entry| entry.record.offset);
        Ok(Self { entries })
    }

    /// Build from tables whose bytes were produced separately, e.g. by
    /// decompression.
    pub fn from_tables(tables: impl IntoIterator<Item = (TableRecord, Bytes)>) -> Self {
        let mut entries: Vec<TableEntry> = tables
            .into_iter()
            .map(|(record, data)| TableEntry {
                record,
                data,
                slot: TableSlot::Unparsed,
            })
            .collect();
        entries.sort_by_key(|entry| entry.record.offset);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.position(tag).is_some()
    }

    pub fn get(&self, tag: Tag) -> Option<&TableEntry> {
        self.entries.iter().find(|entry| entry.record.tag == tag)
    }

    pub fn raw_data(&self, tag: Tag) -> Option<&Bytes> {
        self.get(tag).map(|entry| &entry.data)
    }

    pub fn entries(&self) -> impl Iterator<Item = &TableEntry> {
        self.entries.iter()
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.iter().map(|entry| entry.record.tag)
    }

    fn position(&self, tag: Tag) -> Option<usize> {
        self.entries.iter().position(|entry| entry.record.tag == tag)
    }

    /// Decode `tag` if it has not been decoded yet, decoding its
    /// dependencies first. Absent tables are not an error.
    pub fn materialize(&mut self, tag: Tag, factory: &mut TableFactory) -> Result<(), ReadError> {
        let Some(index) = self.position(tag) else {
            return Ok(());
        };
        match &self.entries[index].slot {
            TableSlot::Parsed(_) | TableSlot::Skipped => {
                log::trace!("'{tag}' table already decoded");
                factory.mark_present(tag);
                return Ok(());
            }
            TableSlot::Errored(message) => {
                return Err(ReadError::Malformed(message.clone()).in_table(tag));
            }
            TableSlot::Unparsed => {}
        }

        if let Some(kind) = TableKind::from_tag(tag) {
            for dependency in kind.dependencies() {
                self.materialize(dependency.tag(), factory)?;
            }
        }

        let entry = &self.entries[index];
        let record = entry.record;
        let data = entry.data.clone();
        match factory.read_table(&record, &data, self) {
            Ok(table) => {
                self.entries[index].slot = table.map_or(TableSlot::Skipped, TableSlot::Parsed);
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    ReadError::Table { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                self.entries[index].slot = TableSlot::Errored(message);
                Err(err)
            }
        }
    }

    /// Decode every table in file offset order.
    pub fn materialize_all(&mut self, factory: &mut TableFactory) -> Result<(), ReadError> {
        let tags: Vec<Tag> = self.tags().collect();
        for tag in tags {
            self.materialize(tag, factory)?;
        }
        Ok(())
    }

    /// Log every table whose bytes disagree with its directory checksum.
    pub fn warn_on_checksum_mismatch(&self) {
        for entry in &self.entries {
            if !entry.checksum_matches() {
                log::warn!("'{}' table checksum does not match directory", entry.tag());
            }
        }
    }

    typed_accessor!(cmap, Cmap, CharacterMap);
    typed_accessor!(head, Head, FontHeader);
    typed_accessor!(hhea, Hhea, HorizontalHeader);
    typed_accessor!(hmtx, Hmtx, HorizontalMetrics);
    typed_accessor!(kern, Kern, Kerning);
    typed_accessor!(maxp, Maxp, MaximumProfile);
    typed_accessor!(name, Name, NamingTable);
    typed_accessor!(os2, Os2, Os2);
    typed_accessor!(post, Post, PostScript);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FontBuilder, head_table, hhea_table, maxp_table};
    use pretty_assertions::assert_eq;

    fn table_set(font: &[u8]) -> TableSet {
        let data = Bytes::copy_from_slice(font);
        let mut input = FontReader::new(&data);
        input.skip(4).unwrap();
        let num_tables = input.read_u16().unwrap();
        input.skip(6).unwrap();
        let records = read_directory(&mut input, num_tables).unwrap();
        TableSet::from_directory(&data, records).unwrap()
    }

    #[test]
    fn hmtx_pulls_in_its_dependencies() {
        let font = FontBuilder::truetype()
            .table(b"head", head_table(1000, 0))
            .table(b"hmtx", vec![1, 244, 0, 0, 0, 10])
            .table(b"hhea", hhea_table(800, -200, 0, 1))
            .table(b"maxp", maxp_table(2, false))
            .build();
        let mut tables = table_set(&font);
        let mut factory = TableFactory::lenient();
        tables.materialize(table_tags::HMTX, &mut factory).unwrap();

        assert!(tables.hhea().is_some());
        assert!(tables.maxp().is_some());
        assert!(tables.head().is_none());
        let hmtx = tables.hmtx().unwrap();
        assert_eq!(hmtx.advance_width(0), 500);
        assert_eq!(hmtx.left_side_bearing(1), 10);
    }

    #[test]
    fn missing_required_tables_are_reported_together() {
        let font = FontBuilder::truetype()
            .table(b"head", head_table(1000, 0))
            .table(b"hhea", hhea_table(800, -200, 0, 1))
            .build();
        let mut tables = table_set(&font);
        let mut factory = TableFactory::truetype();
        tables.materialize_all(&mut factory).unwrap();
        let err = factory.validate_required_tables().unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required table(s): 'OS/2', 'cmap', 'maxp', 'name', 'post'"
        );
        assert!(TableFactory::cff().missing().all(|tag| tag != table_tags::POST));
    }

    #[test]
    fn decode_errors_carry_the_tag_and_stick() {
        let font = FontBuilder::truetype()
            .table(b"head", head_table(1000, 0)[..20].to_vec())
            .build();
        let mut tables = table_set(&font);
        let mut factory = TableFactory::truetype();
        let err = tables.materialize(table_tags::HEAD, &mut factory).unwrap_err();
        assert!(matches!(err, ReadError::Table { tag, .. } if tag == table_tags::HEAD));
        // the second access reports the cached failure
        let err = tables.materialize(table_tags::HEAD, &mut factory).unwrap_err();
        assert!(err.to_string().contains("'head'"));
        assert!(matches!(tables.get(table_tags::HEAD).unwrap().slot, TableSlot::Errored(_)));
    }

    #[test]
    fn unknown_tags() {
        let font = FontBuilder::truetype()
            .table(b"glyf", vec![0; 4])
            .table(b"ZZZZ", vec![0; 4])
            .build();
        let mut tables = table_set(&font);
        let mut factory = TableFactory::lenient();
        tables.materialize_all(&mut factory).unwrap();
        assert!(matches!(tables.get(table_tags::GLYF).unwrap().slot, TableSlot::Skipped));

        let mut tables = table_set(&font);
        let mut factory = TableFactory::lenient().throw_on_unknown_tag(true);
        let err = tables.materialize_all(&mut factory).unwrap_err();
        assert!(matches!(err, ReadError::UnknownTable(tag) if tag == Tag::new(b"ZZZZ")));
    }

    #[test]
    fn directory_is_offset_ordered_and_bounds_checked() {
        let font = FontBuilder::truetype()
            .table(b"name", vec![0; 8])
            .table(b"cmap", vec![0; 8])
            .build();
        let tables = table_set(&font);
        // the builder lays data out in insertion order
        assert_eq!(
            tables.tags().collect::<Vec<_>>(),
            vec![table_tags::NAME, table_tags::CMAP]
        );
        assert!(tables.entries().all(TableEntry::checksum_matches));

        let data = Bytes::from_static(&[0u8; 16]);
        let record = TableRecord {
            tag: table_tags::CMAP,
            checksum: 0,
            offset: 8,
            length: 12,
        };
        assert!(TableSet::from_directory(&data, vec![record]).is_err());
    }
}
