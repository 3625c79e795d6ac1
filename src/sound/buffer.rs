//! Decoded audio buffers
//!
//! An `AudioBuffer` is the immutable result of decoding one container. It is
//! shared read-only (behind `Arc`) by every instance playing the same sound.

use std::time::Duration;

use super::decoder::{DecodeError, DecodeResult};
use super::formats::{AudioFormat, Encoding};

/// Lowest sample rate playback accepts, in Hz
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Highest sample rate playback accepts, in Hz
pub const MAX_SAMPLE_RATE: u32 = 48_000;

/// Decoded sample data plus the format metadata read from the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub(crate) data: Vec<u8>,
    pub(crate) encoding: Encoding,
    pub(crate) format: AudioFormat,
    pub(crate) channels: u16,
    pub(crate) sample_rate: u32,
    pub(crate) bits_per_sample: u16,
    pub(crate) block_alignment: u16,
    pub(crate) samples_per_block: usize,
    pub(crate) sample_count: usize,
    pub(crate) name: String,
}

impl AudioBuffer {
    /// Raw sample payload of the data chunk
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample frequency in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn block_alignment(&self) -> u16 {
        self.block_alignment
    }

    /// Samples per compressed block; 0 for uncompressed encodings
    pub fn samples_per_block(&self) -> usize {
        self.samples_per_block
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Name the buffer was decoded under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback length of this buffer
    pub fn duration(&self) -> DecodeResult<Duration> {
        sample_duration(self.data.len(), self.sample_rate, self.channels)
    }
}

/// Returns the duration of 16-bit PCM data.
///
/// The rate must lie within `MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE` and the
/// channel count must be 1 or 2. An empty buffer has zero duration.
pub fn sample_duration(size_in_bytes: usize, sample_rate: u32, channels: u16) -> DecodeResult<Duration> {
    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) || !(1..=2).contains(&channels) {
        return Err(DecodeError::InvalidAudioParameters {
            sample_rate,
            channels,
        });
    }

    if size_in_bytes == 0 {
        return Ok(Duration::ZERO);
    }

    let bytes_per_second = sample_rate as f64 * channels as f64 * 16.0 / 8.0;
    Ok(Duration::from_secs_f64(size_in_bytes as f64 / bytes_per_second))
}
