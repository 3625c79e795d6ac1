//! Playback registry and mixer facade
//!
//! [`AudioEngine`] owns everything process-wide: the decoded-audio cache, the
//! channel pool, the list of active instances, the voice slot and the mute
//! flags. Construct one and pass it by reference; nothing here is global.
//!
//! The engine does not run on its own. Call [`AudioEngine::update`] once per
//! frame to retire finished sounds.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;

use super::cache::SoundCache;
use super::channel_pool::ChannelPool;
use super::device::AudioDevice;
use super::error::{AudioError, AudioResult};
use super::instance::{PlaybackContext, Sound, SoundState};
use super::music::{MusicPlayer, NullMusic};
use crate::config::EngineConfig;
use crate::resource::loader::AssetSource;

/// Mix category a mute call applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuteType {
    All,
    Sound,
    Music,
    Voice,
}

/// The four independent mute flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuteConfig {
    pub all: bool,
    pub sound: bool,
    pub music: bool,
    pub voice: bool,
}

impl MuteConfig {
    pub fn get(&self, kind: MuteType) -> bool {
        match kind {
            MuteType::All => self.all,
            MuteType::Sound => self.sound,
            MuteType::Music => self.music,
            MuteType::Voice => self.voice,
        }
    }

    pub fn set(&mut self, kind: MuteType, muted: bool) {
        match kind {
            MuteType::All => self.all = muted,
            MuteType::Sound => self.sound = muted,
            MuteType::Music => self.music = muted,
            MuteType::Voice => self.voice = muted,
        }
    }

    fn sound_silenced(&self) -> bool {
        self.all || self.sound
    }

    fn music_silenced(&self) -> bool {
        self.all || self.music
    }
}

#[derive(Debug)]
struct MixState {
    mute: MuteConfig,
    /// Gain applied to every channel, 0.0 while sounds are muted
    master_gain: f32,
    /// Volume requested for the current voice instance
    voice_volume: f32,
}

/// Process-wide playback state for one output device
pub struct AudioEngine {
    config: EngineConfig,
    context: Arc<PlaybackContext>,
    assets: Arc<dyn AssetSource>,
    music: Arc<dyn MusicPlayer>,
    cache: SoundCache,
    /// Active instances in creation order
    registry: Mutex<Vec<Arc<Sound>>>,
    voice: Mutex<Option<Arc<Sound>>>,
    mix: Mutex<MixState>,
    next_id: AtomicU64,
}

impl AudioEngine {
    /// Create an engine with no background music player
    pub fn new(config: EngineConfig, device: Arc<dyn AudioDevice>, assets: Arc<dyn AssetSource>) -> Self {
        let master_gain = config.master_volume.clamp(0.0, 1.0);
        log::info!(
            "audio engine on {} device, {} channels, master volume {:.2}",
            device.name(),
            config.max_channels,
            master_gain
        );

        Self {
            context: Arc::new(PlaybackContext::new(device, config.max_channels)),
            config,
            assets,
            music: Arc::new(NullMusic::new()),
            cache: SoundCache::new(),
            registry: Mutex::new(Vec::new()),
            voice: Mutex::new(None),
            mix: Mutex::new(MixState {
                mute: MuteConfig::default(),
                master_gain,
                voice_volume: 1.0,
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Use `music` for background tracks
    pub fn with_music(mut self, music: Arc<dyn MusicPlayer>) -> Self {
        self.music = music;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device(&self) -> &dyn AudioDevice {
        self.context.device()
    }

    pub fn pool(&self) -> &ChannelPool {
        self.context.pool()
    }

    pub fn cache(&self) -> &SoundCache {
        &self.cache
    }

    /// Number of instances the registry is tracking
    pub fn active_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Snapshot of the tracked instances, in registry order
    pub fn active_sounds(&self) -> Vec<Arc<Sound>> {
        self.registry.lock().clone()
    }

    /// Sweep the registry. Call once per frame.
    ///
    /// Stopped instances are disposed and dropped from the registry. Finished
    /// instances have their completion callback run and become Stopped, so
    /// their channel is released on the following call.
    pub fn update(&self) {
        let snapshot = self.registry.lock().clone();
        let mut retired = Vec::new();

        for sound in &snapshot {
            if sound.state() == SoundState::Stopped {
                sound.dispose();
                retired.push(sound.id());
            } else if sound.is_complete() {
                sound.complete();
            }
        }

        if retired.is_empty() {
            return;
        }

        self.registry.lock().retain(|s| !retired.contains(&s.id()));
        let mut voice = self.voice.lock();
        if voice.as_ref().is_some_and(|v| retired.contains(&v.id())) {
            *voice = None;
        }
        log::debug!("retired {} sound(s)", retired.len());
    }

    /// Play `name` and track it until it stops
    pub fn play_sound(&self, name: &str, looping: bool) -> AudioResult<Arc<Sound>> {
        self.start(name, looping, None)
    }

    /// Play one of `names`, chosen at random
    pub fn play_sound_random(&self, names: &[&str], looping: bool) -> AudioResult<Arc<Sound>> {
        self.play_sound(pick(names)?, looping)
    }

    /// Play `name` once
    pub fn play_one_shot(&self, name: &str) -> AudioResult<Arc<Sound>> {
        self.play_sound(name, false)
    }

    /// Play a voice line in the single voice slot.
    ///
    /// While another voice is still active and `force` is false, that voice
    /// is returned and nothing new starts. Otherwise the current voice is
    /// stopped and `name` takes the slot.
    pub fn play_voice(&self, name: &str, volume: f32, force: bool) -> AudioResult<Arc<Sound>> {
        let mut slot = self.voice.lock();
        if let Some(current) = slot.as_ref() {
            if !force && current.state() != SoundState::Stopped {
                return Ok(Arc::clone(current));
            }
        }

        if let Some(previous) = slot.take() {
            previous.stop();
        }

        let sound = self.start(name, false, Some(volume))?;
        *slot = Some(Arc::clone(&sound));
        Ok(sound)
    }

    /// Voice variant of [`play_sound_random`](Self::play_sound_random)
    pub fn play_voice_random(&self, names: &[&str], volume: f32, force: bool) -> AudioResult<Arc<Sound>> {
        self.play_voice(pick(names)?, volume, force)
    }

    /// Stop the current voice and empty the slot. The channel is released
    /// on the next update.
    pub fn stop_voice(&self) {
        if let Some(voice) = self.voice.lock().take() {
            voice.stop();
        }
    }

    /// The sound in the voice slot, if any
    pub fn current_voice(&self) -> Option<Arc<Sound>> {
        self.voice.lock().clone()
    }

    pub fn play_music(&self, name: &str, looping: bool) -> AudioResult<()> {
        self.music.play(name, looping)
    }

    pub fn stop_music(&self) {
        self.music.stop();
    }

    /// Change whether the current background track repeats
    pub fn set_music_repeating(&self, repeating: bool) {
        self.music.set_repeating(repeating);
    }

    fn start(&self, name: &str, looping: bool, voice_volume: Option<f32>) -> AudioResult<Arc<Sound>> {
        let source = self.cache.resolve(name, self.assets.as_ref(), self.context.device())?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sound = Arc::new(Sound::new(id, name, source, Arc::clone(&self.context), looping)?);

        // held until the sound is registered so a concurrent mute sees it
        let mut mix = self.mix.lock();
        if let Some(volume) = voice_volume {
            mix.voice_volume = volume.clamp(0.0, 1.0);
            let volume = if mix.mute.voice { 0.0 } else { mix.voice_volume };
            sound.set_volume(volume)?;
        }
        sound.play(mix.master_gain)?;
        self.registry.lock().push(Arc::clone(&sound));
        drop(mix);

        Ok(sound)
    }

    /// Set a mute flag and apply it to everything already playing.
    ///
    /// `All` and `Sound` zero the master gain, `All` and `Music` mute the
    /// music player, `Voice` silences the voice slot.
    pub fn mute(&self, kind: MuteType) {
        self.set_mute(kind, true);
    }

    /// Clear a mute flag and restore what it silenced
    pub fn unmute(&self, kind: MuteType) {
        self.set_mute(kind, false);
    }

    pub fn is_muted(&self, kind: MuteType) -> bool {
        self.mix.lock().mute.get(kind)
    }

    /// Current master gain
    pub fn master_volume(&self) -> f32 {
        self.mix.lock().master_gain
    }

    /// Snapshot of all four flags
    pub fn mute_config(&self) -> MuteConfig {
        self.mix.lock().mute
    }

    fn set_mute(&self, kind: MuteType, muted: bool) {
        let voice = self.current_voice();
        let mut mix = self.mix.lock();
        mix.mute.set(kind, muted);
        log::info!("{} {:?}", if muted { "mute" } else { "unmute" }, kind);

        if matches!(kind, MuteType::All | MuteType::Sound) {
            mix.master_gain = if mix.mute.sound_silenced() {
                0.0
            } else {
                self.config.master_volume.clamp(0.0, 1.0)
            };
            for sound in self.registry.lock().iter() {
                sound.apply_master_gain(mix.master_gain);
            }
        }

        if matches!(kind, MuteType::All | MuteType::Music) {
            self.music.set_muted(mix.mute.music_silenced());
        }

        if kind == MuteType::Voice {
            if let Some(voice) = voice {
                let volume = if muted { 0.0 } else { mix.voice_volume };
                if let Err(e) = voice.set_volume(volume) {
                    log::warn!("failed to set voice volume: {}", e);
                }
            }
        }
    }

    /// Stop and dispose every tracked sound, stop music, and drop the cache
    pub fn shutdown(&self) {
        let sounds = std::mem::take(&mut *self.registry.lock());
        self.voice.lock().take();
        for sound in &sounds {
            sound.stop();
            sound.dispose();
        }
        self.music.stop();
        self.cache.clear(self.context.device());
        if !sounds.is_empty() {
            log::info!("audio engine shut down, {} sound(s) released", sounds.len());
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("active", &self.active_count())
            .field("mix", &*self.mix.lock())
            .finish()
    }
}

fn pick<'a>(names: &[&'a str]) -> AudioResult<&'a str> {
    names
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or(AudioError::NoSoundNames)
}
