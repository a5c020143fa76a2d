//! Command-line interface for sotto
//!
//! A thin layer over the configuration file: every flag overrides one config
//! field, and the `devices` subcommand lists audio inputs.

use crate::config::{Config, ModelTier};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Always-on voice dictation
#[derive(Parser, Debug)]
#[command(name = "sotto", version, about = "Always-on voice dictation")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress output (transcriptions still apply)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Audio input device (index from `sotto devices`, or exact name)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Transcription model tier: low-cost, balanced, or high-accuracy
    #[arg(long, short = 'm', value_name = "TIER")]
    pub model: Option<ModelTier>,

    /// Language code hint for transcription (e.g. en, de, fr)
    #[arg(long, short = 'l', value_name = "LANG")]
    pub language: Option<String>,

    /// Optional prompt to guide transcription style
    #[arg(long, short = 'p', value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Speech probability threshold (0.0 to 1.0)
    #[arg(long, value_name = "PROB", value_parser = parse_probability)]
    pub vad_threshold: Option<f32>,

    /// Silence that ends an utterance. Examples: 1.5, 1500ms, 2s
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub silence_timeout: Option<u32>,

    /// Minimum speech duration. Examples: 0.5, 300ms
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub min_speech: Option<u32>,

    /// Audio kept before the detected onset. Examples: 0.5, 250ms, 0
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_ms)]
    pub pre_buffer: Option<u32>,

    /// Don't auto-paste, just copy to clipboard
    #[arg(long)]
    pub no_paste: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,
}

impl Cli {
    /// Overlay parsed flags onto a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.audio.device = Some(device.clone());
        }
        if let Some(model) = self.model {
            config.transcription.model = model;
        }
        if let Some(language) = &self.language {
            config.transcription.language = Some(language.clone());
        }
        if let Some(prompt) = &self.prompt {
            config.transcription.prompt = Some(prompt.clone());
        }
        if let Some(threshold) = self.vad_threshold {
            config.detection.vad_threshold = threshold;
        }
        if let Some(timeout) = self.silence_timeout {
            config.detection.silence_timeout_ms = timeout;
        }
        if let Some(min_speech) = self.min_speech {
            config.detection.min_speech_ms = min_speech;
        }
        if let Some(pre_buffer) = self.pre_buffer {
            config.detection.pre_speech_ms = pre_buffer;
        }
        if self.no_paste {
            config.output.paste = false;
        }
    }
}

/// Parse a duration string into milliseconds.
///
/// Bare numbers are seconds (`1.5` → 1500ms); anything else goes through
/// `humantime` (`300ms`, `2s`, `1s 500ms`).
fn parse_duration_ms(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        if !(0.0..=3600.0).contains(&secs) {
            return Err(format!("duration out of range: {}", s));
        }
        return Ok((secs * 1000.0).round() as u32);
    }
    humantime::parse_duration(s)
        .map(|d| d.as_millis().min(u128::from(u32::MAX)) as u32)
        .map_err(|e| e.to_string())
}

/// Parse a probability in [0, 1].
fn parse_probability(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("not a number: {}", s))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("must be between 0.0 and 1.0, got {}", value));
    }
    Ok(value)
}
