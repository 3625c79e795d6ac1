//! Sound instances
//!
//! A [`Sound`] is one playback of a cached buffer. It holds at most one
//! channel from the pool, and only while Playing, Paused, or Stopped but not
//! yet swept. Instances are shared as `Arc<Sound>` between the engine's
//! registry and the caller; the channel is released by [`Sound::dispose`],
//! which also runs when the last handle drops.
//!
//! ```text
//!            play()              pause()
//!  Stopped ---------> Playing ------------> Paused
//!     ^                |  ^                   |
//!     |   stop() or    |  +-------------------+
//!     +--completion----+       resume()
//!     ^                                       |
//!     +---------------- stop() ---------------+
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::buffer::AudioBuffer;
use super::cache::CachedSound;
use super::channel_pool::ChannelPool;
use super::device::{AudioDevice, ChannelId};
use super::error::{AudioError, AudioResult};

/// Logical playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// The device and channel pool every instance of one engine shares
pub struct PlaybackContext {
    pub(crate) device: Arc<dyn AudioDevice>,
    pub(crate) pool: ChannelPool,
}

impl PlaybackContext {
    pub fn new(device: Arc<dyn AudioDevice>, max_channels: usize) -> Self {
        Self {
            device,
            pool: ChannelPool::new(max_channels),
        }
    }

    pub fn device(&self) -> &dyn AudioDevice {
        self.device.as_ref()
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }
}

impl fmt::Debug for PlaybackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackContext")
            .field("device", &self.device.name())
            .field("pool", &self.pool)
            .finish()
    }
}

type CompletionCallback = Box<dyn FnMut() + Send>;

#[derive(Debug)]
struct SoundInner {
    state: SoundState,
    channel: Option<ChannelId>,
    looping: bool,
    volume: f32,
    master_gain: f32,
    disposed: bool,
}

impl SoundInner {
    fn gain(&self) -> f32 {
        self.master_gain * self.volume
    }
}

/// One playback of a cached sound
pub struct Sound {
    id: u64,
    name: String,
    source: Arc<CachedSound>,
    duration: Duration,
    context: Arc<PlaybackContext>,
    inner: Mutex<SoundInner>,
    on_complete: Mutex<Option<CompletionCallback>>,
}

impl Sound {
    /// Create a stopped instance. Fails if the buffer's parameters give no
    /// valid duration.
    pub fn new(
        id: u64,
        name: &str,
        source: Arc<CachedSound>,
        context: Arc<PlaybackContext>,
        looping: bool,
    ) -> AudioResult<Self> {
        let duration = source.buffer().duration()?;
        Ok(Self {
            id,
            name: name.to_string(),
            source,
            duration,
            context,
            inner: Mutex::new(SoundInner {
                state: SoundState::Stopped,
                channel: None,
                looping,
                volume: 1.0,
                master_gain: 1.0,
                disposed: false,
            }),
            on_complete: Mutex::new(None),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name the sound was requested with
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        self.source.buffer()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> SoundState {
        self.inner.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SoundState::Playing
    }

    /// Channel currently held, if any
    pub fn channel(&self) -> Option<ChannelId> {
        self.inner.lock().channel
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.inner.lock().looping
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    /// Set the callback run when the sweep sees this sound finish.
    ///
    /// It runs at most once. A callback that captures this sound's own
    /// `Arc` keeps it alive until then.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        *self.on_complete.lock() = Some(Box::new(callback));
    }

    /// Start playback at `master_gain`. Valid from Stopped only.
    ///
    /// On any device failure the channel goes back to the pool and the
    /// sound stays Stopped.
    pub fn play(&self, master_gain: f32) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(AudioError::Disposed(self.name.clone()));
        }
        if inner.state != SoundState::Stopped {
            return Err(AudioError::InvalidTransition {
                op: "play",
                state: inner.state,
            });
        }

        let channel = match inner.channel {
            Some(channel) => channel,
            None => {
                let channel = self.context.pool.reserve(self.context.device())?;
                inner.channel = Some(channel);
                channel
            }
        };
        inner.master_gain = master_gain;

        if let Err(e) = self.start_on(channel, inner.gain(), inner.looping) {
            log::warn!("failed to start '{}' on channel {}: {}", self.name, channel, e);
            self.context.pool.release(&mut inner.channel);
            return Err(e);
        }

        inner.state = SoundState::Playing;
        log::debug!("playing '{}' (#{}) on channel {}", self.name, self.id, channel);
        Ok(())
    }

    fn start_on(&self, channel: ChannelId, gain: f32, looping: bool) -> AudioResult<()> {
        let device = self.context.device();
        device.bind_buffer_to_channel(channel, self.source.handle())?;
        device.set_channel_gain(channel, gain)?;
        device.set_channel_looping(channel, looping)?;
        device.start_channel(channel)?;
        Ok(())
    }

    /// Playing -> Paused. The channel stays reserved.
    pub fn pause(&self) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        match (inner.state, inner.channel) {
            (SoundState::Playing, Some(channel)) => {
                self.context.device().pause_channel(channel)?;
                inner.state = SoundState::Paused;
                Ok(())
            }
            (state, _) => Err(AudioError::InvalidTransition { op: "pause", state }),
        }
    }

    /// Paused -> Playing on the same channel
    pub fn resume(&self) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        match (inner.state, inner.channel) {
            (SoundState::Paused, Some(channel)) => {
                self.context.device().start_channel(channel)?;
                inner.state = SoundState::Playing;
                Ok(())
            }
            (state, _) => Err(AudioError::InvalidTransition { op: "resume", state }),
        }
    }

    /// Mark the sound Stopped. The channel is stopped and released by the
    /// next sweep, not here.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != SoundState::Stopped {
            log::debug!("stopping '{}' (#{})", self.name, self.id);
            inner.state = SoundState::Stopped;
        }
    }

    /// Playing, not looping, and the device has played the whole buffer
    pub fn is_complete(&self) -> bool {
        let inner = self.inner.lock();
        if inner.state != SoundState::Playing || inner.looping {
            return false;
        }
        let Some(channel) = inner.channel else {
            return false;
        };

        match self.context.device().query_elapsed_seconds(channel) {
            Ok(elapsed) => elapsed as f64 >= self.duration.as_secs_f64(),
            Err(e) => {
                log::warn!("cannot query '{}' on channel {}: {}", self.name, channel, e);
                false
            }
        }
    }

    /// Run the completion callback once, then move to Stopped.
    ///
    /// No lock is held while the callback runs, so it may call back into
    /// this sound or the engine.
    pub fn complete(&self) {
        let callback = self.on_complete.lock().take();
        if let Some(mut callback) = callback {
            callback();
        }
        self.inner.lock().state = SoundState::Stopped;
        log::debug!("sound complete: {}", self.name);
    }

    /// Seconds played on the held channel; zero when no channel is held
    pub fn current_time(&self) -> AudioResult<f32> {
        let inner = self.inner.lock();
        match inner.channel {
            Some(channel) => Ok(self.context.device().query_elapsed_seconds(channel)?),
            None => Ok(0.0),
        }
    }

    /// Set the instance volume (clamped to 0.0..=1.0)
    pub fn set_volume(&self, volume: f32) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        inner.volume = volume.clamp(0.0, 1.0);
        if let Some(channel) = inner.channel {
            self.context.device().set_channel_gain(channel, inner.gain())?;
        }
        Ok(())
    }

    pub fn set_looping(&self, looping: bool) -> AudioResult<()> {
        let mut inner = self.inner.lock();
        inner.looping = looping;
        if let Some(channel) = inner.channel {
            self.context.device().set_channel_looping(channel, looping)?;
        }
        Ok(())
    }

    /// Apply a new master gain to the held channel
    pub(crate) fn apply_master_gain(&self, master_gain: f32) {
        let mut inner = self.inner.lock();
        inner.master_gain = master_gain;
        if let Some(channel) = inner.channel {
            if let Err(e) = self.context.device().set_channel_gain(channel, inner.gain()) {
                log::warn!("failed to set gain for '{}': {}", self.name, e);
            }
        }
    }

    /// Stop the channel and return it to the pool. Safe to call repeatedly.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.state = SoundState::Stopped;

        if let Some(channel) = inner.channel {
            if let Err(e) = self.context.device().stop_channel(channel) {
                log::warn!("failed to stop channel {} for '{}': {}", channel, self.name, e);
            }
            self.context.pool.release(&mut inner.channel);
        }
        drop(inner);

        self.on_complete.lock().take();
        log::debug!("disposed '{}' (#{})", self.name, self.id);
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sound")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("duration", &self.duration)
            .field("inner", &*self.inner.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::loader::MemoryAssets;
    use crate::sound::cache::SoundCache;
    use crate::sound::null::{ChannelState, NullDevice};
    use crate::sound::wav::test_support::pcm_wav;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        device: Arc<NullDevice>,
        context: Arc<PlaybackContext>,
        cache: SoundCache,
        assets: MemoryAssets,
    }

    impl Fixture {
        fn new(channels: usize) -> Self {
            let device = Arc::new(NullDevice::new());
            let context = Arc::new(PlaybackContext::new(device.clone(), channels));
            // 2.0 seconds: mono 16-bit at 8000 Hz
            let assets = MemoryAssets::new().with("two_seconds", pcm_wav(1, 8000, 16, 32000));
            Self {
                device,
                context,
                cache: SoundCache::new(),
                assets,
            }
        }

        fn sound(&self, looping: bool) -> Sound {
            let source = self
                .cache
                .resolve("two_seconds", &self.assets, self.device.as_ref())
                .unwrap();
            Sound::new(1, "two_seconds", source, Arc::clone(&self.context), looping).unwrap()
        }
    }

    #[test]
    fn test_new_sound_is_stopped() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        assert_eq!(sound.state(), SoundState::Stopped);
        assert_eq!(sound.channel(), None);
        assert_eq!(sound.duration(), Duration::from_secs(2));
        assert_eq!(sound.current_time().unwrap(), 0.0);
    }

    #[test]
    fn test_play_configures_channel() {
        let fx = Fixture::new(2);
        let sound = fx.sound(true);
        sound.set_volume(0.5).unwrap();
        sound.play(0.8).unwrap();

        let channel = sound.channel().unwrap();
        assert_eq!(sound.state(), SoundState::Playing);
        assert!(fx.context.pool().is_in_use(channel));
        assert_eq!(fx.device.channel_state(channel), Some(ChannelState::Playing));
        assert_eq!(fx.device.channel_looping(channel), Some(true));
        assert!((fx.device.channel_gain(channel).unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_play_twice_is_invalid() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        assert!(matches!(
            sound.play(1.0),
            Err(AudioError::InvalidTransition { op: "play", state: SoundState::Playing })
        ));
    }

    #[test]
    fn test_pause_resume_keeps_channel() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        let channel = sound.channel();

        sound.pause().unwrap();
        assert_eq!(sound.state(), SoundState::Paused);
        assert_eq!(sound.channel(), channel);

        sound.resume().unwrap();
        assert_eq!(sound.state(), SoundState::Playing);
        assert_eq!(sound.channel(), channel);
        assert_eq!(fx.context.pool().in_use_count(), 1);
    }

    #[test]
    fn test_invalid_transitions() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        assert!(matches!(
            sound.pause(),
            Err(AudioError::InvalidTransition { op: "pause", state: SoundState::Stopped })
        ));
        assert!(matches!(
            sound.resume(),
            Err(AudioError::InvalidTransition { op: "resume", .. })
        ));

        sound.play(1.0).unwrap();
        assert!(sound.resume().is_err());
    }

    #[test]
    fn test_stop_defers_release() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        let channel = sound.channel().unwrap();

        sound.stop();
        assert_eq!(sound.state(), SoundState::Stopped);
        assert_eq!(sound.channel(), Some(channel));
        assert!(fx.context.pool().is_in_use(channel));

        // stopping again is harmless
        sound.stop();

        sound.dispose();
        assert_eq!(sound.channel(), None);
        assert!(!fx.context.pool().is_in_use(channel));
        assert_eq!(fx.device.channel_state(channel), Some(ChannelState::Stopped));
    }

    #[test]
    fn test_completion_threshold() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();

        fx.device.advance(1.5);
        assert!(!sound.is_complete());
        fx.device.advance(0.25);
        assert!(!sound.is_complete());
        fx.device.advance(0.25);
        assert!(sound.is_complete());
    }

    #[test]
    fn test_looping_never_completes() {
        let fx = Fixture::new(2);
        let sound = fx.sound(true);
        sound.play(1.0).unwrap();
        fx.device.advance(10.0);
        assert!(!sound.is_complete());

        sound.set_looping(false).unwrap();
        assert!(sound.is_complete());
    }

    #[test]
    fn test_paused_never_completes() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        fx.device.advance(1.0);
        sound.pause().unwrap();
        fx.device.advance(5.0);
        assert!(!sound.is_complete());
        assert!((sound.current_time().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_complete_runs_callback_once() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        sound.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sound.play(1.0).unwrap();
        fx.device.advance(2.0);
        assert!(sound.is_complete());
        sound.complete();
        sound.complete();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sound.state(), SoundState::Stopped);
        assert!(!sound.is_complete());
    }

    #[test]
    fn test_play_exhausted_pool() {
        let fx = Fixture::new(1);
        let first = fx.sound(false);
        let second = fx.sound(false);
        first.play(1.0).unwrap();

        assert!(matches!(second.play(1.0), Err(AudioError::ChannelExhausted { capacity: 1 })));
        assert_eq!(second.state(), SoundState::Stopped);
        assert_eq!(second.channel(), None);
    }

    #[test]
    fn test_device_failure_returns_channel() {
        let fx = Fixture::new(1);
        let sound = fx.sound(false);
        fx.device.fail_starts(true);

        assert!(matches!(sound.play(1.0), Err(AudioError::Device(_))));
        assert_eq!(sound.channel(), None);
        assert_eq!(fx.context.pool().in_use_count(), 0);

        fx.device.fail_starts(false);
        sound.play(1.0).unwrap();
    }

    #[test]
    fn test_dispose_idempotent_and_final() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        sound.dispose();
        sound.dispose();
        assert!(sound.is_disposed());
        assert_eq!(fx.context.pool().available_count(), 2);
        assert!(matches!(sound.play(1.0), Err(AudioError::Disposed(_))));
    }

    #[test]
    fn test_drop_releases_channel() {
        let fx = Fixture::new(2);
        {
            let sound = fx.sound(false);
            sound.play(1.0).unwrap();
            assert_eq!(fx.context.pool().in_use_count(), 1);
        }
        assert_eq!(fx.context.pool().in_use_count(), 0);
    }

    #[test]
    fn test_master_gain_applies_to_channel() {
        let fx = Fixture::new(2);
        let sound = fx.sound(false);
        sound.play(1.0).unwrap();
        sound.apply_master_gain(0.0);
        assert_eq!(fx.device.channel_gain(sound.channel().unwrap()), Some(0.0));
    }
}
