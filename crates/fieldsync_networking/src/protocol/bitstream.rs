//! # Bit Stream
//!
//! Bit-granular writer and reader. Values are packed least-significant bit
//! first, so a 1-bit boolean costs exactly one bit.

use crate::error::{SyncError, SyncResult};

/// Append-only bit writer over a growable byte buffer.
///
/// The buffer keeps its capacity across [`clear`](Self::clear), so one
/// writer can be reused for every payload of a tick.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    bit_position: usize,
}

impl BitWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            bit_position: 0,
        }
    }

    /// Creates a writer with room for `bytes` bytes.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            bit_position: 0,
        }
    }

    /// Resets the writer, keeping its allocation.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.bit_position = 0;
    }

    /// Discards everything written after the first `bits` bits.
    ///
    /// Used to roll a writer back when an encode fails part way.
    pub fn truncate(&mut self, bits: usize) {
        if bits >= self.bit_position {
            return;
        }
        self.buffer.truncate(bits.div_ceil(8));
        let tail = bits % 8;
        if tail != 0 {
            if let Some(last) = self.buffer.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        self.bit_position = bits;
    }

    /// Number of bits written.
    #[inline]
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.bit_position
    }

    /// Returns the number of bytes written (rounded up).
    #[inline]
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the packed data.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning the packed data.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes the low `bits` bits of `value` (0-32).
    pub fn write_bits(&mut self, value: u32, bits: u8) {
        debug_assert!(bits <= 32);

        let mut value = if bits >= 32 {
            value
        } else {
            value & ((1u32 << bits) - 1)
        };
        let mut remaining = usize::from(bits.min(32));

        while remaining > 0 {
            let byte_idx = self.bit_position / 8;
            let bit_idx = self.bit_position % 8;
            if byte_idx == self.buffer.len() {
                self.buffer.push(0);
            }

            let take = (8 - bit_idx).min(remaining);
            #[allow(clippy::cast_possible_truncation)]
            let chunk = (value & ((1u32 << take) - 1)) as u8;
            self.buffer[byte_idx] |= chunk << bit_idx;

            value >>= take;
            remaining -= take;
            self.bit_position += take;
        }
    }

    /// Writes the low `bits` bits of `value` (0-64).
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_bits_u64(&mut self, value: u64, bits: u8) {
        debug_assert!(bits <= 64);
        let bits = bits.min(64);
        if bits <= 32 {
            self.write_bits(value as u32, bits);
        } else {
            self.write_bits(value as u32, 32);
            self.write_bits((value >> 32) as u32, bits - 32);
        }
    }

    /// Writes a boolean (1 bit).
    #[inline]
    pub fn write_bit(&mut self, value: bool) {
        self.write_bits(u32::from(value), 1);
    }

    /// Writes a `u8` (8 bits).
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(u32::from(value), 8);
    }

    /// Writes a `u16` (16 bits).
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(u32::from(value), 16);
    }

    /// Writes a `u32` (32 bits).
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value, 32);
    }

    /// Writes a `u64` (64 bits).
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write_bits_u64(value, 64);
    }

    /// Writes an `i8` (8 bits, two's complement).
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Writes an `i16` (16 bits, two's complement).
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Writes an `i32` (32 bits, two's complement).
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Writes an `i64` (64 bits, two's complement).
    #[inline]
    #[allow(clippy::cast_sign_loss)]
    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    /// Writes an `f32` bit pattern (32 bits).
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes an `f64` bit pattern (64 bits).
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }
}

/// Read cursor over a received payload.
///
/// Every read checks the remaining length first and fails with
/// [`SyncError::DecodeUnderrun`] without moving the cursor.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_position: usize,
    bit_len: usize,
}

impl<'a> BitReader<'a> {
    /// Creates a reader over every bit of `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
            bit_len: data.len() * 8,
        }
    }

    /// Creates a reader limited to the first `bit_len` bits of `data`.
    #[must_use]
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            bit_position: 0,
            bit_len: bit_len.min(data.len() * 8),
        }
    }

    /// Current cursor position in bits.
    #[inline]
    #[must_use]
    pub const fn bit_position(&self) -> usize {
        self.bit_position
    }

    /// Bits left to read.
    #[inline]
    #[must_use]
    pub const fn remaining_bits(&self) -> usize {
        self.bit_len - self.bit_position
    }

    /// Fails unless at least `bits` bits remain.
    #[inline]
    pub fn ensure(&self, bits: usize) -> SyncResult<()> {
        let remaining = self.remaining_bits();
        if bits > remaining {
            return Err(SyncError::DecodeUnderrun {
                needed: bits,
                remaining,
            });
        }
        Ok(())
    }

    /// Reads `bits` bits (0-32).
    pub fn read_bits(&mut self, bits: u8) -> SyncResult<u32> {
        debug_assert!(bits <= 32);
        let bits = usize::from(bits.min(32));
        self.ensure(bits)?;

        let mut value = 0u32;
        let mut filled = 0usize;
        while filled < bits {
            let byte_idx = self.bit_position / 8;
            let bit_idx = self.bit_position % 8;

            let take = (8 - bit_idx).min(bits - filled);
            let chunk = (u32::from(self.data[byte_idx]) >> bit_idx) & ((1u32 << take) - 1);
            value |= chunk << filled;

            filled += take;
            self.bit_position += take;
        }

        Ok(value)
    }

    /// Reads `bits` bits (0-64).
    pub fn read_bits_u64(&mut self, bits: u8) -> SyncResult<u64> {
        debug_assert!(bits <= 64);
        let bits = bits.min(64);
        self.ensure(usize::from(bits))?;
        if bits <= 32 {
            return Ok(u64::from(self.read_bits(bits)?));
        }
        let low = u64::from(self.read_bits(32)?);
        let high = u64::from(self.read_bits(bits - 32)?);
        Ok(low | (high << 32))
    }

    /// Reads a boolean (1 bit).
    #[inline]
    pub fn read_bit(&mut self) -> SyncResult<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Reads a `u8`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_u8(&mut self) -> SyncResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Reads a `u16`.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_u16(&mut self) -> SyncResult<u16> {
        Ok(self.read_bits(16)? as u16)
    }

    /// Reads a `u32`.
    #[inline]
    pub fn read_u32(&mut self) -> SyncResult<u32> {
        self.read_bits(32)
    }

    /// Reads a `u64`.
    #[inline]
    pub fn read_u64(&mut self) -> SyncResult<u64> {
        self.read_bits_u64(64)
    }

    /// Reads an `i8`.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i8(&mut self) -> SyncResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads an `i16`.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i16(&mut self) -> SyncResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Reads an `i32`.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i32(&mut self) -> SyncResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads an `i64`.
    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    pub fn read_i64(&mut self) -> SyncResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads an `f32` bit pattern.
    #[inline]
    pub fn read_f32(&mut self) -> SyncResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads an `f64` bit pattern.
    #[inline]
    pub fn read_f64(&mut self) -> SyncResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}
