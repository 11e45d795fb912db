//! Big-endian primitive decoding over a seekable byte slice.

use bytes::Buf;
use font_types::{F2Dot14, Fixed, LongDateTime, Tag};

use crate::error::ReadError;

/// Seconds between the Apple epoch (1904-01-01) and the Unix epoch (1970-01-01).
pub const APPLE_TO_UNIX_EPOCH_SECS: i64 = 2_082_844_800;

// -----------------------------------------------------------------------------
// FontReader
//
// A cursor over borrowed font data. Every read is bounds checked and fails
// with `ReadError::OutOfBounds` rather than panicking; the offset is only
// advanced when the read succeeds.
// -----------------------------------------------------------------------------
#[derive(Clone)]
pub struct FontReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl Buf for FontReader<'_> {
    fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }

    fn chunk(&self) -> &[u8] {
        self.remaining_as_slice()
    }

    fn advance(&mut self, cnt: usize) {
        if self.skip(cnt).is_err() {
            panic!("Tried to advance past the end of the buffer");
        }
    }
}

impl<'a> FontReader<'a> {
    pub fn new(data: &'a [u8]) -> FontReader<'a> {
        FontReader {
            buffer: data,
            offset: 0,
        }
    }

    /// Create a reader positioned at `offset`.
    pub fn new_at(data: &'a [u8], offset: usize) -> Result<FontReader<'a>, ReadError> {
        let mut reader = FontReader::new(data);
        reader.seek(offset)?;
        Ok(reader)
    }

    pub fn skip(&mut self, n_bytes: usize) -> Result<(), ReadError> {
        if n_bytes > self.remaining() {
            return Err(ReadError::OutOfBounds);
        }
        self.offset += n_bytes;
        Ok(())
    }

    /// Move to an absolute position. Seeking to the very end is allowed.
    pub fn seek(&mut self, offset: usize) -> Result<(), ReadError> {
        if offset > self.buffer.len() {
            return Err(ReadError::OutOfBounds);
        }
        self.offset = offset;
        Ok(())
    }

    #[inline(always)]
    fn read_n_bytes<const N: usize>(&mut self) -> Result<[u8; N], ReadError> {
        let bytes: [u8; N] = self
            .buffer
            .get(self.offset..self.offset + N)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(ReadError::OutOfBounds)?;
        self.offset += N;
        Ok(bytes)
    }

    /// Borrow the next `n_bytes` bytes and advance past them.
    pub fn read_bytes(&mut self, n_bytes: usize) -> Result<&'a [u8], ReadError> {
        let end = self
            .offset
            .checked_add(n_bytes)
            .ok_or(ReadError::OutOfBounds)?;
        let bytes = self
            .buffer
            .get(self.offset..end)
            .ok_or(ReadError::OutOfBounds)?;
        self.offset = end;
        Ok(bytes)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.read_n_bytes::<1>()?[0])
    }

    #[inline]
    pub fn read_i8(&mut self) -> Result<i8, ReadError> {
        Ok(self.read_n_bytes::<1>()?[0] as i8)
    }

    #[inline]
    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        Ok(u16::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(i16::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_u24(&mut self) -> Result<u32, ReadError> {
        let bytes = self.read_n_bytes::<3>()?;
        Ok((bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | (bytes[2] as u32))
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        Ok(u32::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32, ReadError> {
        Ok(i32::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        Ok(u64::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64, ReadError> {
        Ok(i64::from_be_bytes(self.read_n_bytes()?))
    }

    #[inline]
    pub fn read_tag(&mut self) -> Result<Tag, ReadError> {
        Ok(Tag::from_be_bytes(self.read_n_bytes()?))
    }

    /// A 16.16 fixed point value: signed integer part followed by an unsigned
    /// fraction in 1/65536 units.
    pub fn read_fixed(&mut self) -> Result<Fixed, ReadError> {
        Ok(Fixed::from_bits(self.read_i32()?))
    }

    /// [`read_fixed`](Self::read_fixed), widened to a float.
    pub fn read_fixed_f64(&mut self) -> Result<f64, ReadError> {
        let integer = self.read_i16()? as f64;
        let fraction = self.read_u16()? as f64 / 65536.0;
        Ok(integer + fraction)
    }

    /// A 2.14 fixed point value.
    pub fn read_f2dot14(&mut self) -> Result<F2Dot14, ReadError> {
        Ok(F2Dot14::from_bits(self.read_i16()?))
    }

    /// A `(major, minor)` pair of 16-bit integers.
    pub fn read_version16(&mut self) -> Result<(u16, u16), ReadError> {
        Ok((self.read_u16()?, self.read_u16()?))
    }

    /// Seconds since 1904-01-01T00:00:00Z.
    pub fn read_long_datetime(&mut self) -> Result<LongDateTime, ReadError> {
        Ok(LongDateTime::new(self.read_i64()?))
    }

    /// `n_bytes` of single byte characters. Bytes above 0x7F are mapped to the
    /// Unicode code point with the same value.
    pub fn read_ascii_string(&mut self, n_bytes: usize) -> Result<String, ReadError> {
        let bytes = self.read_bytes(n_bytes)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    /// `n_bytes` of UTF-16BE text.
    ///
    /// An odd trailing byte is consumed but ignored. Unpaired surrogates are
    /// replaced with U+FFFD.
    pub fn read_utf16be_string(&mut self, n_bytes: usize) -> Result<String, ReadError> {
        let bytes = self.read_bytes(n_bytes)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// A length byte followed by that many single byte characters.
    pub fn read_pascal_string(&mut self) -> Result<String, ReadError> {
        let len = self.read_u8()? as usize;
        self.read_ascii_string(len)
    }

    pub fn remaining_as_slice(&self) -> &'a [u8] {
        &self.buffer[self.offset..]
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Convert a 1904-epoch timestamp into seconds since the Unix epoch.
pub fn apple_to_unix_secs(date: LongDateTime) -> i64 {
    date.as_secs() - APPLE_TO_UNIX_EPOCH_SECS
}
