//! Background music collaborator
//!
//! Music runs outside the channel pool on a player of its own. The engine
//! only forwards play/stop/repeat requests and the music mute switch.

use parking_lot::Mutex;

use super::error::AudioResult;

/// Controls for a single background track
pub trait MusicPlayer: Send + Sync {
    /// Start `name`, replacing whatever track is playing
    fn play(&self, name: &str, repeating: bool) -> AudioResult<()>;

    fn stop(&self);

    fn set_muted(&self, muted: bool);

    fn set_repeating(&self, repeating: bool);

    /// Name of the current track, if one is playing
    fn current_track(&self) -> Option<String>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct NullMusicState {
    track: Option<String>,
    repeating: bool,
    muted: bool,
}

/// Music player that only records what it was asked to do
#[derive(Debug, Default)]
pub struct NullMusic {
    state: Mutex<NullMusicState>,
}

impl NullMusic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    pub fn is_repeating(&self) -> bool {
        self.state.lock().repeating
    }
}

impl MusicPlayer for NullMusic {
    fn play(&self, name: &str, repeating: bool) -> AudioResult<()> {
        let mut state = self.state.lock();
        state.track = Some(name.to_string());
        state.repeating = repeating;
        log::debug!("music: {} (repeat: {})", name, repeating);
        Ok(())
    }

    fn stop(&self) {
        self.state.lock().track = None;
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn set_repeating(&self, repeating: bool) {
        self.state.lock().repeating = repeating;
    }

    fn current_track(&self) -> Option<String> {
        self.state.lock().track.clone()
    }
}
