//! Decoder error taxonomy
//!
//! Every failure the container decoder can report. Decoding is all-or-nothing:
//! any of these aborts the decode and nothing is cached.

/// Error type for decoder operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Container or format signature mismatch, or a structurally broken header
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Stream ended before the data chunk was fully read
    #[error("Unexpected end of stream while reading {0}")]
    UnexpectedEof(&'static str),

    /// Channel count has no sample layout
    #[error("Unsupported format: {channels} channel(s) at {bits_per_sample} bits")]
    UnsupportedFormat { channels: u16, bits_per_sample: u16 },

    /// No sample-count rule exists for this encoding tag
    #[error("Unhandled encoding tag {0}")]
    UnhandledEncoding(u16),

    /// Sample rate or channel count outside what playback supports
    #[error("Invalid audio parameters: {sample_rate} Hz, {channels} channel(s)")]
    InvalidAudioParameters { sample_rate: u32, channels: u16 },
}

/// Result type for decoder operations
pub type DecodeResult<T> = Result<T, DecodeError>;
