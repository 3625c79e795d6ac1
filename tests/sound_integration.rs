//! Playback engine integration tests
//!
//! Everything runs on the null device, whose clock only moves when the test
//! advances it, and on in-memory or temp-dir assets.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use soundbank::config::EngineConfig;
use soundbank::resource::{FileAssets, MemoryAssets};
use soundbank::sound::{
    AudioEngine, AudioError, MuteType, NullDevice, SoundState, WavDecoder, MAX_CHANNELS,
};
use tempfile::TempDir;

/// Build a PCM WAVE container with a silent payload
fn wav(channels: u16, sample_rate: u32, bits: u16, payload_len: usize) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut fmt = Vec::new();
    fmt.extend_from_slice(&1u16.to_le_bytes());
    fmt.extend_from_slice(&channels.to_le_bytes());
    fmt.extend_from_slice(&sample_rate.to_le_bytes());
    fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&bits.to_le_bytes());

    let mut body = b"WAVE".to_vec();
    body.extend_from_slice(b"LIST");
    body.extend_from_slice(&4u32.to_le_bytes());
    body.extend_from_slice(b"INFO");
    body.extend_from_slice(b"fmt ");
    body.extend_from_slice(&(fmt.len() as u32).to_le_bytes());
    body.extend_from_slice(&fmt);
    body.extend_from_slice(b"data");
    body.extend_from_slice(&(payload_len as u32).to_le_bytes());
    body.extend(std::iter::repeat(0u8).take(payload_len));

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// Engine over a null device with a 2 s clip ("long"), a 0.25 s clip
/// ("short") and two voice lines
fn setup() -> (AudioEngine, Arc<NullDevice>) {
    let device = Arc::new(NullDevice::new());
    let assets = MemoryAssets::new()
        .with("sfx/long", wav(1, 8000, 16, 32000))
        .with("sfx/short", wav(1, 8000, 16, 4000))
        .with("vo/a", wav(1, 8000, 16, 32000))
        .with("vo/b", wav(1, 8000, 16, 32000));
    let engine = AudioEngine::new(EngineConfig::default(), device.clone(), Arc::new(assets));
    (engine, device)
}

#[test]
fn test_decode_reference_clip() {
    let buffer = WavDecoder::new()
        .decode_bytes(&wav(1, 8000, 16, 4000), "ref")
        .unwrap();
    assert_eq!(buffer.sample_count(), 2000);
    assert!((buffer.duration().unwrap().as_secs_f64() - 0.25).abs() < 1e-9);
}

#[test]
fn test_channel_exhaustion() {
    let (engine, _) = setup();
    let mut sounds = Vec::new();
    for _ in 0..MAX_CHANNELS {
        sounds.push(engine.play_sound("sfx/long", true).unwrap());
    }
    assert_eq!(engine.pool().in_use_count(), MAX_CHANNELS);

    let err = engine.play_sound("sfx/long", true).unwrap_err();
    assert!(matches!(err, AudioError::ChannelExhausted { capacity: MAX_CHANNELS }));
    assert_eq!(engine.active_count(), MAX_CHANNELS);

    // freeing one makes room again after the sweep
    sounds[0].stop();
    engine.update();
    assert!(engine.play_sound("sfx/long", true).is_ok());
}

#[test]
fn test_sounds_share_cached_buffer() {
    let (engine, device) = setup();
    let a = engine.play_sound("sfx/long", false).unwrap();
    let b = engine.play_sound("sfx/long", false).unwrap();
    assert!(Arc::ptr_eq(a.buffer(), b.buffer()));
    assert_ne!(a.channel(), b.channel());
    assert_eq!(device.buffer_count(), 1);
    assert_eq!(engine.cache().len(), 1);
}

#[test]
fn test_pause_resume_same_channel() {
    let (engine, device) = setup();
    let sound = engine.play_sound("sfx/long", false).unwrap();
    let channel = sound.channel();

    sound.pause().unwrap();
    device.advance(10.0);
    engine.update();
    assert_eq!(sound.state(), SoundState::Paused);

    sound.resume().unwrap();
    assert_eq!(sound.state(), SoundState::Playing);
    assert_eq!(sound.channel(), channel);
    assert_eq!(engine.pool().in_use_count(), 1);
}

#[test]
fn test_completion_and_deferred_release() {
    let (engine, device) = setup();
    let sound = engine.play_sound("sfx/long", false).unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    sound.on_complete(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    device.advance(1.5);
    engine.update();
    assert_eq!(sound.state(), SoundState::Playing);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    device.advance(0.5);
    engine.update();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(sound.state(), SoundState::Stopped);
    // channel is still held for one more tick
    assert!(sound.channel().is_some());
    assert_eq!(engine.active_count(), 1);

    engine.update();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(sound.channel(), None);
    assert!(sound.is_disposed());
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.pool().in_use_count(), 0);
}

#[test]
fn test_stop_releases_on_next_tick() {
    let (engine, _) = setup();
    let sound = engine.play_sound("sfx/short", true).unwrap();
    sound.stop();
    assert_eq!(engine.pool().in_use_count(), 1);

    engine.update();
    assert_eq!(engine.pool().in_use_count(), 0);
    assert_eq!(engine.active_count(), 0);
}

#[test]
fn test_looping_sound_stays_active() {
    let (engine, device) = setup();
    let sound = engine.play_sound("sfx/short", true).unwrap();
    for _ in 0..10 {
        device.advance(1.0);
        engine.update();
    }
    assert_eq!(sound.state(), SoundState::Playing);
    assert_eq!(engine.active_count(), 1);
}

#[test]
fn test_callback_can_start_new_sound() {
    let (engine, device) = setup();
    let engine = Arc::new(engine);
    let first = engine.play_one_shot("sfx/short").unwrap();

    let chained = Arc::clone(&engine);
    first.on_complete(move || {
        chained.play_one_shot("sfx/short").unwrap();
    });

    device.advance(0.25);
    engine.update();
    assert_eq!(engine.active_count(), 2);

    engine.update();
    assert_eq!(engine.active_count(), 1);
    engine.shutdown();
}

#[test]
fn test_voice_exclusivity() {
    let (engine, _) = setup();
    let a = engine.play_voice("vo/a", 1.0, false).unwrap();
    let again = engine.play_voice("vo/b", 1.0, false).unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(again.name(), "vo/a");

    let b = engine.play_voice("vo/b", 1.0, true).unwrap();
    assert_eq!(b.name(), "vo/b");
    assert_eq!(a.state(), SoundState::Stopped);
    assert!(Arc::ptr_eq(&engine.current_voice().unwrap(), &b));

    engine.update();
    assert_eq!(engine.active_count(), 1);
    assert!(a.is_disposed());
}

#[test]
fn test_voice_slot_frees_after_completion() {
    let (engine, device) = setup();
    engine.play_voice("vo/a", 1.0, false).unwrap();
    device.advance(2.0);
    engine.update();
    engine.update();
    assert!(engine.current_voice().is_none());

    let b = engine.play_voice("vo/b", 1.0, false).unwrap();
    assert_eq!(b.name(), "vo/b");
}

#[test]
fn test_mute_sound_applies_to_existing_and_new() {
    let (engine, device) = setup();
    let before = engine.play_sound("sfx/long", true).unwrap();

    engine.mute(MuteType::Sound);
    assert!(engine.is_muted(MuteType::Sound));
    assert!(!engine.is_muted(MuteType::All));
    assert_eq!(device.channel_gain(before.channel().unwrap()), Some(0.0));

    let during = engine.play_sound("sfx/long", true).unwrap();
    assert_eq!(device.channel_gain(during.channel().unwrap()), Some(0.0));

    // idempotent
    engine.mute(MuteType::Sound);
    assert_eq!(engine.master_volume(), 0.0);

    engine.unmute(MuteType::Sound);
    assert_eq!(engine.master_volume(), 1.0);
    assert_eq!(device.channel_gain(before.channel().unwrap()), Some(1.0));
    assert_eq!(device.channel_gain(during.channel().unwrap()), Some(1.0));
}

#[test]
fn test_instance_volume_scales_master() {
    let device = Arc::new(NullDevice::new());
    let assets = MemoryAssets::new().with("beep", wav(2, 22050, 16, 8820));
    let config = EngineConfig {
        master_volume: 0.5,
        ..EngineConfig::default()
    };
    let engine = AudioEngine::new(config, device.clone(), Arc::new(assets));

    let sound = engine.play_sound("beep", false).unwrap();
    assert_eq!(device.channel_gain(sound.channel().unwrap()), Some(0.5));
    sound.set_volume(0.5).unwrap();
    assert_eq!(device.channel_gain(sound.channel().unwrap()), Some(0.25));
    assert!((sound.duration().as_secs_f64() - 0.1).abs() < 1e-9);
}

#[test]
fn test_file_assets_end_to_end() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("sfx")).unwrap();
    fs::write(temp.path().join("sfx/click.wav"), wav(1, 11025, 8, 1102)).unwrap();

    let device = Arc::new(NullDevice::new());
    let assets = Arc::new(FileAssets::new(temp.path(), "wav"));
    let engine = AudioEngine::new(EngineConfig::default(), device, assets);

    let sound = engine.play_one_shot("sfx/click").unwrap();
    assert_eq!(sound.buffer().sample_count(), 1102);
    assert!(engine.cache().contains("click"));

    let err = engine.play_one_shot("sfx/missing").unwrap_err();
    assert!(matches!(err, AudioError::AssetLoadFailed { .. }));
}

#[test]
fn test_unsupported_rate_is_rejected() {
    let device = Arc::new(NullDevice::new());
    let assets = MemoryAssets::new().with("hifi", wav(2, 96000, 16, 384));
    let engine = AudioEngine::new(EngineConfig::default(), device.clone(), Arc::new(assets));

    let err = engine.play_sound("hifi", false).unwrap_err();
    assert!(matches!(err, AudioError::Decode(_)));
    assert!(engine.cache().is_empty());
    assert_eq!(device.buffer_count(), 0);
    assert_eq!(engine.pool().in_use_count(), 0);
}

#[test]
fn test_dropping_engine_releases_channels() {
    let (engine, device) = setup();
    let sound = engine.play_sound("sfx/long", true).unwrap();
    drop(engine);
    assert!(sound.is_disposed());
    assert_eq!(device.buffer_count(), 0);
}
