//! Rodio-based audio device
//!
//! rodio's `OutputStream` is not `Send`, so it lives on a dedicated audio
//! thread together with every sink. [`RodioDevice`] is the thread-safe front:
//! each trait call becomes an [`AudioCmd`] sent over a channel, and the
//! thread replies with the result.
//!
//! Elapsed time is measured with wall-clock `Instant`s rather than by asking
//! the sink, the same way the playback position is estimated for the mixer.
//!
//! Buffers are played as linear PCM. Block-compressed payloads are uploaded
//! unchanged and will not sound right through this device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use super::device::{AudioDevice, BufferHandle, ChannelId, DeviceError, DeviceResult};
use super::formats::AudioFormat;

/// How long a caller waits for the audio thread to answer
const REPLY_TIMEOUT: Duration = Duration::from_millis(100);

/// How long `open` waits for the output stream to come up
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

type Reply<T> = Sender<DeviceResult<T>>;

/// Command sent to the audio thread
enum AudioCmd {
    AddChannels(Vec<ChannelId>),
    CreateBuffer(BufferHandle, PcmBuffer),
    DestroyBuffer(BufferHandle, Reply<()>),
    Bind(ChannelId, BufferHandle, Reply<()>),
    SetGain(ChannelId, f32, Reply<()>),
    SetLooping(ChannelId, bool, Reply<()>),
    Start(ChannelId, Reply<()>),
    Pause(ChannelId, Reply<()>),
    Stop(ChannelId, Reply<()>),
    Elapsed(ChannelId, Reply<f32>),
    Shutdown,
}

/// Sample data converted for rodio
struct PcmBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Vec<i16>,
}

/// Convert raw little-endian payload bytes to signed 16-bit samples
fn to_i16_samples(data: &[u8], format: AudioFormat) -> Vec<i16> {
    if format.is_16bit() {
        data.chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    } else {
        // 8-bit unsigned to 16-bit signed
        data.iter().map(|&b| ((b as i16) - 128) * 256).collect()
    }
}

/// Wall-clock playback position of one channel
#[derive(Debug, Default, Clone, Copy)]
struct ChannelTimer {
    started_at: Option<Instant>,
    played_before_pause: Duration,
}

impl ChannelTimer {
    fn start(&mut self, now: Instant) {
        self.played_before_pause = Duration::ZERO;
        self.started_at = Some(now);
    }

    fn resume(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    fn pause(&mut self, now: Instant) {
        if let Some(start) = self.started_at.take() {
            self.played_before_pause += now.saturating_duration_since(start);
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn elapsed(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(start) => self.played_before_pause + now.saturating_duration_since(start),
            None => self.played_before_pause,
        }
    }
}

#[derive(Default)]
struct ChannelSlot {
    sink: Option<Sink>,
    buffer: Option<BufferHandle>,
    gain: f32,
    looping: bool,
    timer: ChannelTimer,
}

/// Everything owned by the audio thread
struct AudioThread {
    handle: OutputStreamHandle,
    channels: HashMap<ChannelId, ChannelSlot>,
    buffers: HashMap<BufferHandle, PcmBuffer>,
}

impl AudioThread {
    fn channel(&mut self, id: ChannelId) -> DeviceResult<&mut ChannelSlot> {
        self.channels.get_mut(&id).ok_or(DeviceError::InvalidChannel(id))
    }

    fn dispatch(&mut self, cmd: AudioCmd) -> bool {
        match cmd {
            AudioCmd::AddChannels(ids) => {
                for id in ids {
                    self.channels.insert(
                        id,
                        ChannelSlot {
                            gain: 1.0,
                            ..ChannelSlot::default()
                        },
                    );
                }
            }
            AudioCmd::CreateBuffer(id, buffer) => {
                self.buffers.insert(id, buffer);
            }
            AudioCmd::DestroyBuffer(id, reply) => {
                let result = self
                    .buffers
                    .remove(&id)
                    .map(|_| ())
                    .ok_or(DeviceError::InvalidBuffer(id));
                let _ = reply.send(result);
            }
            AudioCmd::Bind(channel, buffer, reply) => {
                let _ = reply.send(self.bind(channel, buffer));
            }
            AudioCmd::SetGain(channel, gain, reply) => {
                let result = self.channel(channel).map(|slot| {
                    slot.gain = gain;
                    if let Some(ref sink) = slot.sink {
                        sink.set_volume(gain);
                    }
                });
                let _ = reply.send(result);
            }
            AudioCmd::SetLooping(channel, looping, reply) => {
                let result = self.channel(channel).map(|slot| slot.looping = looping);
                let _ = reply.send(result);
            }
            AudioCmd::Start(channel, reply) => {
                let _ = reply.send(self.start(channel));
            }
            AudioCmd::Pause(channel, reply) => {
                let result = self.channel(channel).map(|slot| {
                    if let Some(ref sink) = slot.sink {
                        sink.pause();
                    }
                    slot.timer.pause(Instant::now());
                });
                let _ = reply.send(result);
            }
            AudioCmd::Stop(channel, reply) => {
                let result = self.channel(channel).map(|slot| {
                    if let Some(sink) = slot.sink.take() {
                        sink.stop();
                    }
                    slot.timer.reset();
                });
                let _ = reply.send(result);
            }
            AudioCmd::Elapsed(channel, reply) => {
                let result = self
                    .channel(channel)
                    .map(|slot| slot.timer.elapsed(Instant::now()).as_secs_f32());
                let _ = reply.send(result);
            }
            AudioCmd::Shutdown => {
                log::debug!("rodio: shutting down");
                for (_, mut slot) in self.channels.drain() {
                    if let Some(sink) = slot.sink.take() {
                        sink.stop();
                    }
                }
                return false;
            }
        }
        true
    }

    fn bind(&mut self, channel: ChannelId, buffer: BufferHandle) -> DeviceResult<()> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidBuffer(buffer));
        }
        let slot = self.channel(channel)?;
        if let Some(sink) = slot.sink.take() {
            sink.stop();
        }
        slot.buffer = Some(buffer);
        slot.timer.reset();
        Ok(())
    }

    fn start(&mut self, channel: ChannelId) -> DeviceResult<()> {
        let now = Instant::now();
        let slot = self.channels.get_mut(&channel).ok_or(DeviceError::InvalidChannel(channel))?;

        // paused sink: continue where it left off
        if let Some(ref sink) = slot.sink {
            if sink.is_paused() {
                sink.play();
                slot.timer.resume(now);
            }
            return Ok(());
        }

        let buffer_id = slot
            .buffer
            .ok_or_else(|| DeviceError::Backend(format!("channel {} has no buffer", channel)))?;
        let buffer = self.buffers.get(&buffer_id).ok_or(DeviceError::InvalidBuffer(buffer_id))?;

        let sink = Sink::try_new(&self.handle).map_err(|e| DeviceError::Backend(e.to_string()))?;
        sink.set_volume(slot.gain);
        let source = SamplesBuffer::new(buffer.channels, buffer.sample_rate, buffer.samples.clone());
        if slot.looping {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }

        slot.sink = Some(sink);
        slot.timer.start(now);
        Ok(())
    }
}

fn audio_thread_main(rx: Receiver<AudioCmd>, ready: Sender<DeviceResult<()>>) {
    let (stream, handle) = match OutputStream::try_default() {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(DeviceError::Unavailable(e.to_string())));
            return;
        }
    };
    // keep the stream alive for the thread's lifetime
    let _stream = stream;

    let mut state = AudioThread {
        handle,
        channels: HashMap::new(),
        buffers: HashMap::new(),
    };
    let _ = ready.send(Ok(()));
    log::debug!("rodio: audio thread ready");

    while let Ok(cmd) = rx.recv() {
        if !state.dispatch(cmd) {
            break;
        }
    }
    log::debug!("rodio: audio thread exited");
}

/// Audio device backed by the default rodio output
pub struct RodioDevice {
    sender: Mutex<Option<Sender<AudioCmd>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicUsize,
}

impl RodioDevice {
    /// Open the default output device on a new audio thread
    pub fn open() -> DeviceResult<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("soundbank-audio".to_string())
            .spawn(move || audio_thread_main(rx, ready_tx))
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                return Err(DeviceError::Unavailable(
                    "audio thread did not start".to_string(),
                ))
            }
        }

        log::info!("rodio output opened");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            thread: Mutex::new(Some(thread)),
            next_id: AtomicUsize::new(1),
        })
    }

    fn send(&self, cmd: AudioCmd) -> DeviceResult<()> {
        match self.sender.lock().as_ref() {
            Some(sender) => sender
                .send(cmd)
                .map_err(|_| DeviceError::Unavailable("audio thread has exited".to_string())),
            None => Err(DeviceError::Unavailable("device is shut down".to_string())),
        }
    }

    fn request<T>(&self, cmd_fn: impl FnOnce(Reply<T>) -> AudioCmd) -> DeviceResult<T> {
        let (tx, rx) = mpsc::channel();
        self.send(cmd_fn(tx))?;
        rx.recv_timeout(REPLY_TIMEOUT)
            .map_err(|_| DeviceError::Backend("audio thread did not respond".to_string()))?
    }

    fn alloc_ids(&self, count: usize) -> Vec<usize> {
        let first = self.next_id.fetch_add(count, Ordering::Relaxed);
        (first..first + count).collect()
    }

    /// Stop every channel and join the audio thread
    pub fn shutdown(&self) {
        let _ = self.send(AudioCmd::Shutdown);
        self.sender.lock().take();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RodioDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl AudioDevice for RodioDevice {
    fn name(&self) -> &'static str {
        "Rodio"
    }

    fn gen_channels(&self, count: usize) -> DeviceResult<Vec<ChannelId>> {
        let ids = self.alloc_ids(count);
        self.send(AudioCmd::AddChannels(ids.clone()))?;
        Ok(ids)
    }

    fn create_data_buffer(&self, data: &[u8], format: AudioFormat, sample_rate: u32) -> DeviceResult<BufferHandle> {
        let id = self.alloc_ids(1)[0];
        let buffer = PcmBuffer {
            channels: format.channels(),
            sample_rate,
            samples: to_i16_samples(data, format),
        };
        self.send(AudioCmd::CreateBuffer(id, buffer))?;
        Ok(id)
    }

    fn destroy_data_buffer(&self, buffer: BufferHandle) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::DestroyBuffer(buffer, tx))
    }

    fn bind_buffer_to_channel(&self, channel: ChannelId, buffer: BufferHandle) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::Bind(channel, buffer, tx))
    }

    fn set_channel_gain(&self, channel: ChannelId, gain: f32) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::SetGain(channel, gain, tx))
    }

    fn set_channel_looping(&self, channel: ChannelId, looping: bool) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::SetLooping(channel, looping, tx))
    }

    fn start_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::Start(channel, tx))
    }

    fn pause_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::Pause(channel, tx))
    }

    fn stop_channel(&self, channel: ChannelId) -> DeviceResult<()> {
        self.request(|tx| AudioCmd::Stop(channel, tx))
    }

    fn query_elapsed_seconds(&self, channel: ChannelId) -> DeviceResult<f32> {
        self.request(|tx| AudioCmd::Elapsed(channel, tx))
    }
}
