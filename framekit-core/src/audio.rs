//! Fixed-capacity raw audio buffers.

use bytes::BytesMut;

/// A block of raw PCM bytes with a fixed capacity.
///
/// `data_size` counts the valid bytes at the front of the buffer; the
/// buffer itself never grows or shrinks after construction.
#[derive(Debug, Clone)]
pub struct RawAudioFrame {
    buffer: BytesMut,
    data_size: usize,
    timestamp_us: u64,
}

impl RawAudioFrame {
    /// Allocate `buffer_size` zeroed bytes with no valid data.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: BytesMut::zeroed(buffer_size),
            data_size: 0,
            timestamp_us: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Number of valid bytes.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// The valid bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.data_size]
    }

    /// The whole buffer, for producers that write in place before calling
    /// [`set_data_size`](Self::set_data_size).
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..]
    }

    /// Mark the first `size` bytes valid, clamped to the capacity.
    pub fn set_data_size(&mut self, size: usize) {
        self.data_size = size.min(self.buffer.len());
    }

    /// Copy as much of `samples` as fits. Returns the number of bytes taken.
    pub fn fill(&mut self, samples: &[u8]) -> usize {
        let n = samples.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&samples[..n]);
        self.data_size = n;
        n
    }

    /// Drop the valid data. Capacity is kept.
    pub fn reset(&mut self) {
        self.data_size = 0;
        self.timestamp_us = 0;
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn set_timestamp_us(&mut self, timestamp_us: u64) {
        self.timestamp_us = timestamp_us;
    }
}
