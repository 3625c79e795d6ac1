// soundbank: sample playback engine with a bounded channel pool

pub mod cli;
pub mod config;
pub mod logging;
pub mod resource;
pub mod sound;

pub use cli::Cli;
pub use config::EngineConfig;
pub use logging::LogLevel;
pub use sound::{AudioEngine, AudioError, MuteType, Sound, SoundState};
