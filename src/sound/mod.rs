//! Sound playback
//!
//! # Architecture
//!
//! - `wav` decodes RIFF/WAVE containers into an [`AudioBuffer`]
//! - `cache` memoizes decoded buffers and their device uploads per name
//! - `channel_pool` hands out the fixed set of device channels
//! - `instance` drives one playback through Stopped/Playing/Paused
//! - `engine` tracks active sounds, sweeps finished ones, and applies mute
//! - `device` is the seam to the output backend (`null` or `rodio_backend`)

pub mod buffer;
pub mod cache;
pub mod channel_pool;
pub mod decoder;
pub mod device;
pub mod engine;
pub mod error;
pub mod formats;
pub mod instance;
pub mod music;
pub mod null;
pub mod rodio_backend;
pub mod wav;

pub use buffer::{sample_duration, AudioBuffer};
pub use cache::SoundCache;
pub use channel_pool::{ChannelPool, MAX_CHANNELS};
pub use decoder::{DecodeError, DecodeResult};
pub use device::{AudioDevice, BufferHandle, ChannelId, DeviceError, DeviceResult};
pub use engine::{AudioEngine, MuteConfig, MuteType};
pub use error::{AudioError, AudioResult};
pub use formats::{AudioFormat, Encoding};
pub use instance::{Sound, SoundState};
pub use music::{MusicPlayer, NullMusic};
pub use null::NullDevice;
pub use rodio_backend::RodioDevice;
pub use wav::WavDecoder;
