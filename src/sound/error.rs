//! Engine-level errors
//!
//! Wraps decoder and device failures and adds the errors that only make sense
//! once sounds are cached, pooled and played.

use std::io;

use super::decoder::DecodeError;
use super::device::DeviceError;
use super::instance::SoundState;

/// Error type for playback operations
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Every channel in the pool is in use
    #[error("No playback channel available ({capacity} in use)")]
    ChannelExhausted { capacity: usize },

    /// The asset source could not open the named sound
    #[error("Failed to load sound asset '{name}'")]
    AssetLoadFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Operation not valid from the instance's current state
    #[error("Cannot {op} a sound that is {state:?}")]
    InvalidTransition { op: &'static str, state: SoundState },

    /// The instance already released its channel and cannot play again
    #[error("Sound '{0}' has been disposed")]
    Disposed(String),

    /// A random pick was requested from an empty name list
    #[error("No sound names to choose from")]
    NoSoundNames,
}

impl AudioError {
    /// Returns true if the error came from the container decoder
    pub fn is_decode_error(&self) -> bool {
        matches!(self, AudioError::Decode(_))
    }
}

/// Result type for playback operations
pub type AudioResult<T> = Result<T, AudioError>;
