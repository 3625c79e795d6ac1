//! Audio device binding
//!
//! The engine never talks to audio hardware directly. Everything it needs
//! (channel allocation, buffer upload, per-channel transport and gain) goes
//! through the [`AudioDevice`] trait, which mirrors the small OpenAL-style
//! subset the playback core actually uses.
//!
//! Implementations:
//! - [`NullDevice`](super::null::NullDevice) - silent, driven by a virtual clock
//! - [`RodioDevice`](super::rodio_backend::RodioDevice) - real output via rodio

use super::formats::AudioFormat;

/// Hardware playback channel identifier (an OpenAL "source")
pub type ChannelId = usize;

/// Device-resident sample buffer identifier
pub type BufferHandle = usize;

/// Opaque device failure, passed through the engine unchanged
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid channel {0}")]
    InvalidChannel(ChannelId),

    #[error("Invalid buffer {0}")]
    InvalidBuffer(BufferHandle),

    #[error("Audio backend error: {0}")]
    Backend(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Capabilities the playback core consumes from an audio device.
///
/// Calls may come from any thread; implementations synchronise internally.
pub trait AudioDevice: Send + Sync {
    /// Returns the device name (e.g., "Null", "Rodio")
    fn name(&self) -> &'static str;

    /// Allocate `count` playback channels. Called once, lazily, by the pool.
    fn gen_channels(&self, count: usize) -> DeviceResult<Vec<ChannelId>>;

    /// Upload sample bytes and return a handle channels can be bound to
    fn create_data_buffer(&self, data: &[u8], format: AudioFormat, sample_rate: u32) -> DeviceResult<BufferHandle>;

    /// Release a buffer created by `create_data_buffer`
    fn destroy_data_buffer(&self, buffer: BufferHandle) -> DeviceResult<()>;

    /// Attach a buffer to a channel, replacing whatever was bound before
    fn bind_buffer_to_channel(&self, channel: ChannelId, buffer: BufferHandle) -> DeviceResult<()>;

    fn set_channel_gain(&self, channel: ChannelId, gain: f32) -> DeviceResult<()>;

    fn set_channel_looping(&self, channel: ChannelId, looping: bool) -> DeviceResult<()>;

    /// Start playback, or continue it if the channel is paused
    fn start_channel(&self, channel: ChannelId) -> DeviceResult<()>;

    fn pause_channel(&self, channel: ChannelId) -> DeviceResult<()>;

    /// Stop playback and rewind the channel
    fn stop_channel(&self, channel: ChannelId) -> DeviceResult<()>;

    /// Seconds of audio the channel has played since it was last started
    fn query_elapsed_seconds(&self, channel: ChannelId) -> DeviceResult<f32>;
}
