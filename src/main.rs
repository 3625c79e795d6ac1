use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use soundbank::cli::{Cli, Command};
use soundbank::config::EngineConfig;
use soundbank::logging::init_logging;
use soundbank::resource::FileAssets;
use soundbank::sound::{AudioEngine, RodioDevice, SoundState, WavDecoder};

/// Engine tick interval while playing from the command line
const FRAME: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_logging(config.log_level);

    match cli.command {
        Command::Info { ref file } => info(file),
        Command::Play {
            ref name,
            looping,
            voice,
            seconds,
            ..
        } => play(config, name, looping, voice, seconds),
    }
}

fn info(path: &Path) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let buffer = WavDecoder::new()
        .decode(BufReader::new(file), &name)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    println!("name:              {}", buffer.name());
    println!("encoding:          {:?} (tag {})", buffer.encoding(), buffer.encoding().tag());
    println!("format:            {:?}", buffer.format());
    println!("channels:          {}", buffer.channels());
    println!("sample rate:       {} Hz", buffer.sample_rate());
    println!("bits per sample:   {}", buffer.bits_per_sample());
    println!("block alignment:   {}", buffer.block_alignment());
    println!("samples per block: {}", buffer.samples_per_block());
    println!("sample count:      {}", buffer.sample_count());
    println!("data bytes:        {}", buffer.len());
    println!("duration:          {:.3} s", buffer.duration()?.as_secs_f64());
    Ok(())
}

fn play(config: EngineConfig, name: &str, looping: bool, voice: bool, seconds: Option<f64>) -> Result<()> {
    if looping && seconds.is_none() {
        anyhow::bail!("--loop needs --seconds to know when to stop");
    }

    let device = Arc::new(RodioDevice::open().context("Failed to open audio output")?);
    let assets = Arc::new(FileAssets::new(&config.content_dir, &config.extension));
    let engine = AudioEngine::new(config, device, assets);

    let sound = if voice {
        engine.play_voice(name, 1.0, true)
    } else {
        engine.play_sound(name, looping)
    }
    .with_context(|| format!("Failed to play '{}'", name))?;

    log::info!("playing '{}' ({:.3} s)", sound.name(), sound.duration().as_secs_f64());

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    loop {
        engine.update();
        if engine.active_count() == 0 {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) && sound.state() != SoundState::Stopped {
            sound.stop();
        }
        thread::sleep(FRAME);
    }

    engine.shutdown();
    Ok(())
}
