//! Bit-level access to compressed payloads.
//!
//! [`BitCursor`] reads MSB-first fields and exponential-Golomb codes out of
//! a borrowed byte slice, the way video bitstream headers are laid out.
//! [`BitWriter`] is its inverse and is used to build such payloads.
//!
//! Neither type performs any I/O.

use tracing::warn;

use crate::error::BitstreamError;

/// Widest field a single [`BitCursor::read_bits`] call may return.
pub const MAX_READ_BITS: u32 = 32;

/// Longest exp-Golomb prefix whose value still fits in a `u32`.
const MAX_EXP_GOLOMB_PREFIX: u32 = 31;

// ── BitCursor ────────────────────────────────────────────────────

/// Stateful MSB-first reader over a fixed byte buffer.
///
/// Bytes are pulled into a 64-bit accumulator one at a time, only when a
/// read needs more bits than the accumulator currently holds. At all times
///
/// ```text
/// bits_remaining = valid_bits + 8 * (len - offset)
/// ```
///
/// Rejected reads leave the cursor exactly where it was.
#[derive(Debug, Clone)]
pub struct BitCursor<'a> {
    data: &'a [u8],
    /// Next byte to pull into the accumulator.
    offset: usize,
    /// Bits pulled from `data` but not yet consumed (low `valid` bits).
    acc: u64,
    /// Number of meaningful bits in `acc` (0..=39).
    valid: u32,
}

impl<'a> BitCursor<'a> {
    /// Create a cursor positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            acc: 0,
            valid: 0,
        }
    }

    /// Bits left to read. O(1).
    pub fn bits_remaining(&self) -> usize {
        (self.data.len() - self.offset) * 8 + self.valid as usize
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.offset * 8 - self.valid as usize
    }

    /// Index of the byte holding the next unread bit.
    pub fn byte_offset(&self) -> usize {
        self.position() / 8
    }

    /// Whether the next read starts on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.valid % 8 == 0
    }

    /// Read the next `n` bits (0..=32) as an unsigned integer, MSB first.
    ///
    /// `n == 0` returns 0 without touching the buffer.
    pub fn read_bits(&mut self, n: u32) -> Result<u32, BitstreamError> {
        if n > MAX_READ_BITS {
            warn!(requested = n, "cannot read more than {MAX_READ_BITS} bits at a time");
            return Err(BitstreamError::TooManyBits { requested: n });
        }

        let remaining = self.bits_remaining();
        if n as usize > remaining {
            warn!(
                requested = n,
                remaining, "not enough bits remaining in the stream"
            );
            return Err(BitstreamError::Exhausted {
                requested: n,
                remaining,
            });
        }

        if n == 0 {
            return Ok(0);
        }

        while self.valid < n {
            self.acc = (self.acc << 8) | u64::from(self.data[self.offset]);
            self.offset += 1;
            self.valid += 8;
        }

        let value = (self.acc >> (self.valid - n)) & ((1u64 << n) - 1);
        self.valid -= n;
        Ok(value as u32)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool, BitstreamError> {
        self.read_bits(1).map(|b| b == 1)
    }

    /// Skip `n` bits. Fails without moving if fewer remain.
    pub fn skip_bits(&mut self, n: usize) -> Result<(), BitstreamError> {
        let remaining = self.bits_remaining();
        if n > remaining {
            warn!(requested = n, remaining, "cannot skip past end of stream");
            return Err(BitstreamError::Exhausted {
                requested: u32::try_from(n).unwrap_or(u32::MAX),
                remaining,
            });
        }

        let mut left = n;
        while left > 0 {
            let chunk = left.min(MAX_READ_BITS as usize) as u32;
            self.read_bits(chunk)?;
            left -= chunk as usize;
        }
        Ok(())
    }

    /// Read an unsigned exp-Golomb code, `ue(v)`.
    ///
    /// `k` leading zeros, a `1`, then a `k`-bit suffix: the value is
    /// `2^k - 1 + suffix`. On failure the cursor is restored.
    pub fn read_unsigned_exp_golomb(&mut self) -> Result<u32, BitstreamError> {
        let saved = self.checkpoint();
        let result = self.read_unsigned_exp_golomb_inner();
        if result.is_err() {
            self.restore(saved);
        }
        result
    }

    /// Read a signed exp-Golomb code, `se(v)`.
    ///
    /// codeNum 0, 1, 2, 3, 4 maps to 0, 1, -1, 2, -2.
    pub fn read_signed_exp_golomb(&mut self) -> Result<i32, BitstreamError> {
        let code = u64::from(self.read_unsigned_exp_golomb()?) + 1;
        let magnitude = (code >> 1) as i32;
        if code & 1 == 1 {
            Ok(-magnitude)
        } else {
            Ok(magnitude)
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn read_unsigned_exp_golomb_inner(&mut self) -> Result<u32, BitstreamError> {
        let mut leading_zeros = 0u32;
        while !self.read_bit()? {
            leading_zeros += 1;
            if leading_zeros > MAX_EXP_GOLOMB_PREFIX {
                warn!(leading_zeros, "exp-Golomb prefix too long");
                return Err(BitstreamError::ExpGolombOverflow { leading_zeros });
            }
        }

        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u32 << leading_zeros) - 1) + suffix)
    }

    fn checkpoint(&self) -> (usize, u64, u32) {
        (self.offset, self.acc, self.valid)
    }

    fn restore(&mut self, (offset, acc, valid): (usize, u64, u32)) {
        self.offset = offset;
        self.acc = acc;
        self.valid = valid;
    }
}

// ── BitWriter ────────────────────────────────────────────────────

/// MSB-first bit sink producing a byte vector.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    acc: u64,
    /// Bits in `acc` not yet flushed to `data` (0..=7 between calls).
    pending: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bits written so far, including unflushed ones.
    pub fn bit_len(&self) -> usize {
        self.data.len() * 8 + self.pending as usize
    }

    /// Whether the next write starts on a byte boundary.
    pub fn is_byte_aligned(&self) -> bool {
        self.pending == 0
    }

    /// Append the low `n` bits of `value` (0..=32), MSB first.
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<(), BitstreamError> {
        if n > MAX_READ_BITS {
            return Err(BitstreamError::TooManyBits { requested: n });
        }
        if n == 0 {
            return Ok(());
        }

        let masked = u64::from(value) & ((1u64 << n) - 1);
        self.acc = (self.acc << n) | masked;
        self.pending += n;

        while self.pending >= 8 {
            self.pending -= 8;
            self.data.push((self.acc >> self.pending) as u8);
        }
        Ok(())
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<(), BitstreamError> {
        self.write_bits(u32::from(bit), 1)
    }

    /// Append `value` as an unsigned exp-Golomb code.
    ///
    /// `u32::MAX` has no 32-bit-suffix encoding and is rejected.
    pub fn write_unsigned_exp_golomb(&mut self, value: u32) -> Result<(), BitstreamError> {
        let code = u64::from(value) + 1;
        let leading_zeros = 63 - code.leading_zeros();
        if leading_zeros > MAX_EXP_GOLOMB_PREFIX {
            return Err(BitstreamError::ExpGolombOverflow { leading_zeros });
        }

        self.write_bits(0, leading_zeros)?;
        self.write_bit(true)?;
        let suffix = code & ((1u64 << leading_zeros) - 1);
        self.write_bits(suffix as u32, leading_zeros)
    }

    /// Append `value` as a signed exp-Golomb code.
    pub fn write_signed_exp_golomb(&mut self, value: i32) -> Result<(), BitstreamError> {
        let wide = i64::from(value);
        let code = if wide > 0 { 2 * wide - 1 } else { -2 * wide };
        let code = u32::try_from(code)
            .map_err(|_| BitstreamError::ExpGolombOverflow { leading_zeros: 32 })?;
        self.write_unsigned_exp_golomb(code)
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.pending > 0 {
            let pad = 8 - self.pending;
            self.acc <<= pad;
            self.data.push(self.acc as u8);
            self.pending = 0;
        }
    }

    /// Pad to a byte boundary and return the written bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.data
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_bits_msb_first() {
        let data = [0b1010_1100, 0xFF, 0x01];
        let mut cur = BitCursor::new(&data);

        assert_eq!(cur.read_bits(1).unwrap(), 1);
        assert_eq!(cur.read_bits(3).unwrap(), 0b010);
        assert_eq!(cur.read_bits(4).unwrap(), 0b1100);
        assert_eq!(cur.read_bits(12).unwrap(), 0xFF0);
        assert_eq!(cur.read_bits(4).unwrap(), 0x1);
        assert_eq!(cur.bits_remaining(), 0);
    }

    #[test]
    fn read_full_32_bits_across_unaligned_boundary() {
        let data = [0x0F, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut cur = BitCursor::new(&data);
        assert_eq!(cur.read_bits(4).unwrap(), 0x0);
        assert_eq!(cur.read_bits(32).unwrap(), 0xFDEA_DBEE);
        assert_eq!(cur.read_bits(4).unwrap(), 0xF);
    }

    #[test]
    fn bits_remaining_tracks_every_read() {
        let data = [0xA5u8; 16];
        let mut cur = BitCursor::new(&data);
        let mut expected = 128usize;
        for n in [0, 1, 7, 8, 13, 32, 2, 31] {
            cur.read_bits(n).unwrap();
            expected -= n as usize;
            assert_eq!(cur.bits_remaining(), expected);
            assert_eq!(cur.position(), 128 - expected);
        }
    }

    #[test]
    fn zero_bit_read_on_empty_buffer() {
        let mut cur = BitCursor::new(&[]);
        assert_eq!(cur.read_bits(0).unwrap(), 0);
        assert_eq!(cur.bits_remaining(), 0);
    }

    #[test]
    fn too_many_bits_is_rejected_without_advancing() {
        let data = [0xFFu8; 8];
        let mut cur = BitCursor::new(&data);
        cur.read_bits(3).unwrap();
        let before = cur.bits_remaining();

        assert_eq!(
            cur.read_bits(33),
            Err(BitstreamError::TooManyBits { requested: 33 })
        );
        assert_eq!(cur.bits_remaining(), before);
    }

    #[test]
    fn over_read_is_rejected_without_advancing() {
        let data = [0b1100_0000];
        let mut cur = BitCursor::new(&data);
        cur.read_bits(2).unwrap();

        let err = cur.read_bits(7).unwrap_err();
        assert_eq!(
            err,
            BitstreamError::Exhausted {
                requested: 7,
                remaining: 6
            }
        );
        assert_eq!(cur.bits_remaining(), 6);
        assert_eq!(cur.read_bits(6).unwrap(), 0);
    }

    #[test]
    fn unsigned_exp_golomb_reference_codes() {
        // 1 010 011 00100 00101 -> 0 1 2 3 4
        let data = [0b1010_0110, 0b0100_0010, 0b1000_0000];
        let mut cur = BitCursor::new(&data);
        let decoded: Vec<u32> = (0..5)
            .map(|_| cur.read_unsigned_exp_golomb().unwrap())
            .collect();
        assert_eq!(decoded, vec![0, 1, 2, 3, 4]);
        assert_eq!(cur.position(), 17);
    }

    #[test]
    fn signed_exp_golomb_mapping() {
        let data = [0b1010_0110, 0b0100_0010, 0b1000_0000];
        let mut cur = BitCursor::new(&data);
        let decoded: Vec<i32> = (0..5)
            .map(|_| cur.read_signed_exp_golomb().unwrap())
            .collect();
        assert_eq!(decoded, vec![0, 1, -1, 2, -2]);
    }

    #[test]
    fn truncated_exp_golomb_restores_cursor() {
        // six leading zeros need a 6-bit suffix; only one bit follows
        let data = [0b0000_0010, 0b1011_0000];
        let mut cur = BitCursor::new(&data);
        cur.read_bits(8).unwrap();
        cur.read_bits(1).unwrap();

        // 011 0000: k = 1, suffix 1 -> 2
        assert_eq!(cur.read_unsigned_exp_golomb().unwrap(), 2);

        let mut cur = BitCursor::new(&data[..1]);
        assert!(cur.read_unsigned_exp_golomb().is_err());
        assert_eq!(cur.bits_remaining(), 8);
    }

    #[test]
    fn all_zero_stream_overflows_instead_of_spinning() {
        let data = [0u8; 8];
        let mut cur = BitCursor::new(&data);
        assert_eq!(
            cur.read_unsigned_exp_golomb(),
            Err(BitstreamError::ExpGolombOverflow { leading_zeros: 32 })
        );
        assert_eq!(cur.bits_remaining(), 64);
    }

    #[test]
    fn skip_bits_and_alignment() {
        let data = [0x00, 0x80, 0x00];
        let mut cur = BitCursor::new(&data);
        assert!(cur.is_byte_aligned());
        cur.skip_bits(3).unwrap();
        assert!(!cur.is_byte_aligned());
        cur.skip_bits(5).unwrap();
        assert!(cur.is_byte_aligned());
        assert_eq!(cur.byte_offset(), 1);
        assert!(cur.read_bit().unwrap());
        assert!(cur.skip_bits(100).is_err());
        assert_eq!(cur.bits_remaining(), 15);
    }

    #[test]
    fn writer_produces_reference_codes() {
        let mut w = BitWriter::new();
        for v in 0..5 {
            w.write_unsigned_exp_golomb(v).unwrap();
        }
        assert_eq!(w.bit_len(), 17);
        assert_eq!(w.finish(), vec![0b1010_0110, 0b0100_0010, 0b1000_0000]);
    }

    #[test]
    fn writer_signed_codes_decode_back() {
        let values = [0, 1, -1, 2, -2, 1000, -1000, i32::MAX, i32::MIN + 1];
        let mut w = BitWriter::new();
        for v in values {
            w.write_signed_exp_golomb(v).unwrap();
        }
        let bytes = w.finish();
        let mut cur = BitCursor::new(&bytes);
        for v in values {
            assert_eq!(cur.read_signed_exp_golomb().unwrap(), v);
        }
    }

    #[test]
    fn writer_rejects_unencodable_values() {
        let mut w = BitWriter::new();
        assert!(w.write_unsigned_exp_golomb(u32::MAX).is_err());
        assert!(w.write_signed_exp_golomb(i32::MIN).is_err());
        assert!(w.write_bits(0, 33).is_err());
        assert_eq!(w.bit_len(), 0);
    }

    #[test]
    fn largest_unsigned_code_roundtrips() {
        let mut w = BitWriter::new();
        w.write_unsigned_exp_golomb(u32::MAX - 1).unwrap();
        let bytes = w.finish();
        let mut cur = BitCursor::new(&bytes);
        assert_eq!(cur.read_unsigned_exp_golomb().unwrap(), u32::MAX - 1);
    }
}
