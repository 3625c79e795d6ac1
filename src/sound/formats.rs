//! Audio format definitions for decoded sounds
//!
//! `AudioFormat` is the channel/bit-depth layout handed to the device when a
//! buffer is uploaded. `Encoding` is the codec tag found in the `fmt ` chunk
//! of a wave container.

/// Sample layout of a decoded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    /// 8-bit mono (1 byte per frame)
    Mono8,
    /// 16-bit mono (2 bytes per frame)
    Mono16,
    /// 8-bit stereo (2 bytes per frame)
    Stereo8,
    /// 16-bit stereo (4 bytes per frame)
    Stereo16,
}

impl AudioFormat {
    /// Derive the layout from a channel count and bit depth.
    ///
    /// Any depth other than 8 is treated as 16-bit. Returns `None` for
    /// channel counts other than 1 or 2.
    pub fn from_layout(channels: u16, bits_per_sample: u16) -> Option<Self> {
        match (channels, bits_per_sample == 8) {
            (1, true) => Some(AudioFormat::Mono8),
            (1, false) => Some(AudioFormat::Mono16),
            (2, true) => Some(AudioFormat::Stereo8),
            (2, false) => Some(AudioFormat::Stereo16),
            _ => None,
        }
    }

    /// Returns the number of bytes per sample frame
    pub fn bytes_per_frame(&self) -> usize {
        match self {
            AudioFormat::Mono8 => 1,
            AudioFormat::Stereo8 => 2,
            AudioFormat::Mono16 => 2,
            AudioFormat::Stereo16 => 4,
        }
    }

    /// Returns the number of channels
    pub fn channels(&self) -> u16 {
        match self {
            AudioFormat::Mono8 | AudioFormat::Mono16 => 1,
            AudioFormat::Stereo8 | AudioFormat::Stereo16 => 2,
        }
    }

    /// Returns true if this is a 16-bit format
    pub fn is_16bit(&self) -> bool {
        matches!(self, AudioFormat::Mono16 | AudioFormat::Stereo16)
    }

    /// Returns true if this is a stereo format
    pub fn is_stereo(&self) -> bool {
        matches!(self, AudioFormat::Stereo8 | AudioFormat::Stereo16)
    }
}

/// Codec tag from the `fmt ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Linear PCM (tag 1)
    Pcm,
    /// Microsoft ADPCM (tag 2)
    MsAdpcm,
    /// IEEE float PCM (tag 3)
    IeeeFloat,
    /// IMA/DVI ADPCM (tag 17)
    Ima4,
    /// Anything else; carried through so the decoder can report it
    Other(u16),
}

impl Encoding {
    pub const PCM_TAG: u16 = 1;
    pub const MS_ADPCM_TAG: u16 = 2;
    pub const IEEE_FLOAT_TAG: u16 = 3;
    pub const IMA4_TAG: u16 = 17;

    pub fn from_tag(tag: u16) -> Self {
        match tag {
            Self::PCM_TAG => Encoding::Pcm,
            Self::MS_ADPCM_TAG => Encoding::MsAdpcm,
            Self::IEEE_FLOAT_TAG => Encoding::IeeeFloat,
            Self::IMA4_TAG => Encoding::Ima4,
            other => Encoding::Other(other),
        }
    }

    pub fn tag(&self) -> u16 {
        match self {
            Encoding::Pcm => Self::PCM_TAG,
            Encoding::MsAdpcm => Self::MS_ADPCM_TAG,
            Encoding::IeeeFloat => Self::IEEE_FLOAT_TAG,
            Encoding::Ima4 => Self::IMA4_TAG,
            Encoding::Other(tag) => *tag,
        }
    }

    /// Returns true for the two block-compressed ADPCM encodings
    pub fn is_block_compressed(&self) -> bool {
        matches!(self, Encoding::MsAdpcm | Encoding::Ima4)
    }
}

/// Convert a block alignment in bytes to a sample count per block.
///
/// Only the ADPCM encodings have a block structure; every other encoding
/// yields 0. A byte count too small to hold a block header also yields 0,
/// which makes this usable for the trailing partial block of a data chunk.
pub fn sample_alignment(encoding: Encoding, channels: u16, block_alignment: usize) -> usize {
    let per_channel = match channels {
        1 => block_alignment,
        2 => block_alignment / 2,
        _ => return 0,
    };

    match encoding {
        // 4-byte header per channel, then 8 nibbles per 4-byte word
        Encoding::Ima4 if per_channel >= 4 => (per_channel - 4) / 4 * 8 + 1,
        // 7-byte header per channel holding two samples, then 2 per byte
        Encoding::MsAdpcm if per_channel >= 7 => (per_channel - 7) * 2 + 2,
        _ => 0,
    }
}
