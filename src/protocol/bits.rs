//! MSB-first bit packing for the handshake header.
//!
//! Bit 0 is the most significant bit of byte 0, bit 8 the most significant
//! bit of byte 1, and so on. Values are written big-endian across byte
//! boundaries, so a 12-bit field starting at bit 4 occupies the low nibble
//! of byte 0 and all of byte 1.

use crate::error::CodecError;

fn bytes_needed(bit_offset: usize, bit_len: usize) -> usize {
    (bit_offset + bit_len).div_ceil(8)
}

/// Read `bit_len` bits (at most 64) starting at `bit_offset`.
pub fn read_bits(buf: &[u8], bit_offset: usize, bit_len: usize) -> Result<u64, CodecError> {
    debug_assert!(bit_len <= 64);
    let needed = bytes_needed(bit_offset, bit_len);
    if needed > buf.len() {
        return Err(CodecError::TruncatedPacket {
            needed,
            available: buf.len(),
        });
    }

    let mut value = 0u64;
    for pos in bit_offset..bit_offset + bit_len {
        let bit = (buf[pos / 8] >> (7 - pos % 8)) & 1;
        value = (value << 1) | bit as u64;
    }
    Ok(value)
}

/// Write the low `bit_len` bits of `value` starting at `bit_offset`,
/// leaving every other bit of `buf` untouched.
pub fn write_bits(
    buf: &mut [u8],
    value: u64,
    bit_offset: usize,
    bit_len: usize,
) -> Result<(), CodecError> {
    debug_assert!(bit_len <= 64);
    if bit_len < 64 && value >> bit_len != 0 {
        return Err(CodecError::FieldOverflow {
            field: "value",
            value,
            width: bit_len,
        });
    }
    let needed = bytes_needed(bit_offset, bit_len);
    if needed > buf.len() {
        return Err(CodecError::TruncatedPacket {
            needed,
            available: buf.len(),
        });
    }

    for i in 0..bit_len {
        let pos = bit_offset + i;
        let mask = 1u8 << (7 - pos % 8);
        if (value >> (bit_len - 1 - i)) & 1 == 1 {
            buf[pos / 8] |= mask;
        } else {
            buf[pos / 8] &= !mask;
        }
    }
    Ok(())
}

/// A named fixed-width field of the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

impl BitField {
    pub const fn new(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
        }
    }

    pub fn max_value(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub fn read(&self, buf: &[u8]) -> Result<u64, CodecError> {
        read_bits(buf, self.offset, self.width)
    }

    pub fn write(&self, buf: &mut [u8], value: u64) -> Result<(), CodecError> {
        if value > self.max_value() {
            return Err(CodecError::FieldOverflow {
                field: self.name,
                value,
                width: self.width,
            });
        }
        write_bits(buf, value, self.offset, self.width)
    }
}
