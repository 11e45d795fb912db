//! Helper functions for woff2 variable length types: 255UInt16 and UIntBase128

use arrayvec::ArrayVec;
use bytes::{Buf, BufMut};

use crate::error::{ReadError, bail_if};

const WORD_CODE: u8 = 253;
const ONE_MORE_BYTE_CODE2: u8 = 254;
const ONE_MORE_BYTE_CODE1: u8 = 255;
const LOWEST_U_CODE: u16 = 253;

/// Extension methods for reading WOFF2 variable length integers from any [`Buf`].
pub trait BufVariableExt: Buf {
    /// Read a `255UInt16`
    ///
    /// Based on section 6.1.1 of the MicroType Express draft spec
    fn try_get_variable_255_u16(&mut self) -> Result<u16, ReadError> {
        let code = self.try_get_u8()?;
        Ok(match code {
            WORD_CODE => self.try_get_u16()?,
            ONE_MORE_BYTE_CODE1 => self.try_get_u8()? as u16 + LOWEST_U_CODE,
            ONE_MORE_BYTE_CODE2 => self.try_get_u8()? as u16 + LOWEST_U_CODE * 2,
            _ => code as u16,
        })
    }

    /// Read a `UIntBase128`
    fn try_get_variable_128_u32(&mut self) -> Result<u32, ReadError> {
        let mut result: u32 = 0;
        for i in 0..5 {
            let code = self.try_get_u8()?;
            // Leading zeros are invalid.
            bail_if!(i == 0 && code == 0x80, "UIntBase128 with leading zeros");
            // If any of the top seven bits are set then we're about to overflow.
            bail_if!(result & 0xfe000000 != 0, "UIntBase128 overflows u32");
            result = (result << 7) | ((code & 0x7f) as u32);
            if code & 0x80 == 0 {
                return Ok(result);
            }
        }
        // Make sure not to exceed the size bound
        Err(ReadError::Malformed(
            "UIntBase128 longer than 5 bytes".to_string(),
        ))
    }

    /// Copy the next `len` bytes onto the end of `out`.
    fn try_read_bytes_into(&mut self, len: usize, out: &mut Vec<u8>) -> Result<(), ReadError> {
        if self.remaining() < len {
            return Err(ReadError::OutOfBounds);
        }
        let start = out.len();
        out.resize(start + len, 0);
        self.copy_to_slice(&mut out[start..]);
        Ok(())
    }
}

impl<T: Buf> BufVariableExt for T {}

fn write_255_u16(value: u16) -> ArrayVec<u8, 3> {
    let mut packed: ArrayVec<u8, 3> = ArrayVec::new();
    if value < 253 {
        packed.push(value as u8);
    } else if value < 506 {
        packed.push(ONE_MORE_BYTE_CODE1);
        packed.push((value - 253) as u8);
    } else if value < 762 {
        packed.push(ONE_MORE_BYTE_CODE2);
        packed.push((value - 506) as u8);
    } else {
        packed.push(WORD_CODE);
        packed.push((value >> 8) as u8);
        packed.push((value & 0xff) as u8);
    }
    packed
}

fn base128_size(mut n: u32) -> usize {
    let mut size: usize = 1;
    while n >= 128 {
        n >>= 7;
        size += 1;
    }
    size
}

/// Extension methods for writing WOFF2 variable length integers.
pub trait BufMutVariableExt: BufMut {
    fn put_variable_255_u16(&mut self, value: u16) {
        self.put_slice(&write_255_u16(value));
    }

    fn put_variable_128_u32(&mut self, value: u32) {
        let size = base128_size(value);
        for i in 0..size {
            let mut b: u8 = ((value >> (7 * (size - i - 1))) & 0x7f) as u8;
            if i < size - 1 {
                b |= 0x80;
            }
            self.put_u8(b);
        }
    }
}

impl<T: BufMut> BufMutVariableExt for T {}
