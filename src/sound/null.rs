//! Null (silent) audio device
//!
//! Accepts every call a real device would and tracks channel state, but
//! produces no sound. Time only moves when [`NullDevice::advance`] is called,
//! which makes playback progress fully deterministic. Used for headless runs
//! and throughout the test suite.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::device::{AudioDevice, BufferHandle, ChannelId, DeviceError, DeviceResult};
use super::formats::AudioFormat;

/// Transport state of one null channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug)]
struct NullChannel {
    buffer: Option<BufferHandle>,
    gain: f32,
    looping: bool,
    state: ChannelState,
    /// Virtual time at which the current play segment began
    started_at: Option<f64>,
    /// Seconds accumulated by earlier play segments
    played_before_pause: f64,
}

impl NullChannel {
    fn new() -> Self {
        Self {
            buffer: None,
            gain: 1.0,
            looping: false,
            state: ChannelState::Initial,
            started_at: None,
            played_before_pause: 0.0,
        }
    }

    fn elapsed(&self, now: f64) -> f64 {
        match self.started_at {
            Some(start) => self.played_before_pause + (now - start),
            None => self.played_before_pause,
        }
    }
}

#[derive(Debug)]
struct NullBuffer {
    format: AudioFormat,
    sample_rate: u32,
    size: usize,
}

#[derive(Debug, Default)]
struct NullState {
    next_id: usize,
    clock: f64,
    channels: HashMap<ChannelId, NullChannel>,
    buffers: HashMap<BufferHandle, NullBuffer>,
    fail_starts: bool,
}

impl NullState {
    fn alloc_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn channel(&mut self, id: ChannelId) -> DeviceResult<&mut NullChannel> {
        self.channels.get_mut(&id).ok_or(DeviceError::InvalidChannel(id))
    }
}

/// Silent device with a manually advanced clock
#[derive(Debug, Default)]
pub struct NullDevice {
    state: Mutex<NullState>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the virtual clock forward
    pub fn advance(&self, seconds: f64) {
        self.state.lock().clock += seconds;
    }

    /// Make every subsequent `start_channel` fail (or stop failing)
    pub fn fail_starts(&self, fail: bool) {
        self.state.lock().fail_starts = fail;
    }

    pub fn channel_state(&self, channel: ChannelId) -> Option<ChannelState> {
        self.state.lock().channels.get(&channel).map(|c| c.state)
    }

    pub fn channel_gain(&self, channel: ChannelId) -> Option<f32> {
        self.state.lock().channels.get(&channel).map(|c| c.gain)
    }

    pub fn channel_looping(&self, channel: ChannelId) -> Option<bool> {
        self.state.lock().channels.get(&channel).map(|c| c.looping)
    }

    pub fn bound_buffer(&self, channel: ChannelId) -> Option<BufferHandle> {
        self.state.lock().channels.get(&channel).and_then(|c| c.buffer)
    }

    /// Number of channels allocated through `gen_channels`
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// Number of live data buffers
    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Format and rate a buffer was uploaded with
    pub fn buffer_info(&self, buffer: BufferHandle) -> Option<(AudioFormat, u32, usize)> {
        self.state
            .lock()
            .buffers
            .get(&buffer)
            .map(|b| (b.format, b.sample_rate, b.size))
    }
}

impl AudioDevice for NullDevice {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn gen_channels(&self, count: usize) -> DeviceResult<Vec<ChannelId>> {
        let mut state = self.state.lock();
        let ids: Vec<ChannelId> = (0..count).map(|_| state.alloc_id()).collect();
        for &id in &ids {
            state.channels.insert(id, NullChannel::new());
        }
        Ok(ids)
    }

    fn create_data_buffer(&self, data: &[u8], format: AudioFormat, sample_rate: u32) -> DeviceResult<BufferHandle> {
        let mut state = self.state.lock();
        let id = state.alloc_id();
        state.buffers.insert(
            id,
            NullBuffer {
                format,
                sample_rate,
                size: data.len(),
            },
        );
        Ok(id)
    }

    fn destroy_data_buffer(&self, buffer: BufferHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        state
            .buffers
            .remove(&buffer)
            .map(|_| ())
            .ok_or(DeviceError::InvalidBuffer(buffer))
    }

    fn bind_buffer_to_channel(&self, channel: ChannelId, buffer: BufferHandle) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if !state.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidBuffer(buffer));
        }
        let chan = state.channel(channel)?;
        chan.buffer = Some(buffer);
        chan.state = ChannelState::Initial;
        chan.started_at = None;
        chan.played_before_pause = 0.0;
        Ok(())
    }

    fn set_channel_gain(&self, channel: ChannelId, gain: f32) -> DeviceResult<()> {
        self.state.lock().channel(channel)?.gain = gain;
        Ok(())
    }

    fn set_channel_looping(&self, channel: ChannelId, looping: bool) -> DeviceResult<()> {
        self.state.lock().channel(channel)?.looping = looping;
        Ok(())
    }

    fn start_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        let mut state = self.state.lock();
        if state.fail_starts {
            return Err(DeviceError::Backend("start refused".to_string()));
        }
        let now = state.clock;
        let chan = state.channel(channel)?;
        if chan.buffer.is_none() {
            return Err(DeviceError::Backend(format!("channel {} has no buffer", channel)));
        }
        match chan.state {
            ChannelState::Playing => {}
            ChannelState::Paused => {
                chan.started_at = Some(now);
                chan.state = ChannelState::Playing;
            }
            ChannelState::Initial | ChannelState::Stopped => {
                chan.played_before_pause = 0.0;
                chan.started_at = Some(now);
                chan.state = ChannelState::Playing;
            }
        }
        Ok(())
    }

    fn pause_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        let mut state = self.state.lock();
        let now = state.clock;
        let chan = state.channel(channel)?;
        if chan.state == ChannelState::Playing {
            chan.played_before_pause = chan.elapsed(now);
            chan.started_at = None;
            chan.state = ChannelState::Paused;
        }
        Ok(())
    }

    fn stop_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        let mut state = self.state.lock();
        let chan = state.channel(channel)?;
        chan.state = ChannelState::Stopped;
        chan.started_at = None;
        chan.played_before_pause = 0.0;
        Ok(())
    }

    fn query_elapsed_seconds(&self, channel: ChannelId) -> DeviceResult<f32> {
        let mut state = self.state.lock();
        let now = state.clock;
        Ok(state.channel(channel)?.elapsed(now) as f32)
    }
}
