use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};
use sotto::audio::capture::{CpalAudioSource, list_devices};
use sotto::cli::{Cli, Commands};
use sotto::config::Config;
use sotto::output::TextOutput;
use sotto::pipeline::{Pipeline, PipelineConfig};
use sotto::stt::RemoteTranscriber;
use sotto::vad::EnergyScorer;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Devices)) {
        return list_audio_devices();
    }
    run(cli)
}

fn list_audio_devices() -> Result<()> {
    let devices = list_devices().context("Failed to enumerate audio devices")?;
    if devices.is_empty() {
        eprintln!("No audio input devices found.");
        return Ok(());
    }

    println!("Available audio input devices:");
    for device in devices {
        println!("  [{}] {}", device.index, device.name);
    }
    println!("\nSelect one with --device <index> or --device <name>.");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?
        .with_env_overrides();
    cli.apply_to(&mut config);
    config.validate()?;

    let api_key = Config::api_key()?;
    let transcriber = Arc::new(RemoteTranscriber::new(&config.transcription, &api_key)?);

    let audio_source = CpalAudioSource::with_sample_rate(
        config.audio.device.as_deref(),
        config.audio.sample_rate,
    )?;

    if !cli.quiet {
        eprintln!("sotto {}", sotto::version_string());
        eprintln!("  model:            {}", config.transcription.model.api_name());
        eprintln!("  vad threshold:    {}", config.detection.vad_threshold);
        eprintln!(
            "  silence timeout:  {}ms",
            config.detection.silence_timeout_ms
        );
        eprintln!("  min speech:       {}ms", config.detection.min_speech_ms);
        eprintln!("  pre-speech:       {}ms", config.detection.pre_speech_ms);
        eprintln!("  auto-paste:       {}", config.output.paste);
        eprintln!(
            "  device:           {}",
            config.audio.device.as_deref().unwrap_or("system default")
        );
        eprintln!("Listening... speak naturally. Press Ctrl+C to stop.");
    }

    let pipeline_config = PipelineConfig {
        quiet: cli.quiet,
        ..PipelineConfig::from_config(&config)
    };

    let handle = Pipeline::new(pipeline_config).start(
        audio_source,
        Box::new(EnergyScorer::default()),
        transcriber,
        TextOutput::system(),
    )?;

    // Block until Ctrl+C, or until a fatal error stops the pipeline from
    // inside (dead device, rejected credentials).
    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("Failed to install signal handler")?;

    loop {
        match interrupt_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if !handle.is_running() {
                    break;
                }
            }
        }
    }

    if !cli.quiet {
        eprintln!("\nShutting down...");
    }
    handle.stop();
    Ok(())
}
