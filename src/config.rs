use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub detection: DetectionConfig,
    pub transcription: TranscriptionConfig,
    pub output: OutputConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_samples: usize,
}

/// Utterance detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Speech probability threshold (0.0 to 1.0).
    pub vad_threshold: f32,
    /// Silence duration that ends an utterance.
    pub silence_timeout_ms: u32,
    /// Shorter speech bursts are discarded as noise.
    pub min_speech_ms: u32,
    /// Audio retained before the detected onset.
    pub pre_speech_ms: u32,
}

/// Transcription service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: ModelTier,
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub base_url: String,
}

/// Text output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Simulate a paste keystroke after writing the clipboard.
    pub paste: bool,
}

/// Transcription model tier.
///
/// Tiers map onto the service's model identifiers so the config file stays
/// stable if the service renames its models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ModelTier {
    #[default]
    LowCost,
    Balanced,
    HighAccuracy,
}

impl ModelTier {
    /// Model identifier sent to the transcription service.
    pub fn api_name(self) -> &'static str {
        match self {
            ModelTier::LowCost => "gpt-4o-mini-transcribe",
            ModelTier::Balanced => "whisper-1",
            ModelTier::HighAccuracy => "gpt-4o-transcribe",
        }
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low-cost" => Ok(ModelTier::LowCost),
            "balanced" => Ok(ModelTier::Balanced),
            "high-accuracy" => Ok(ModelTier::HighAccuracy),
            other => Err(format!(
                "unknown model tier '{}' (expected low-cost, balanced, or high-accuracy)",
                other
            )),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_samples: defaults::FRAME_SAMPLES,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            vad_threshold: defaults::VAD_THRESHOLD,
            silence_timeout_ms: defaults::SILENCE_TIMEOUT_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            pre_speech_ms: defaults::PRE_SPEECH_MS,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model: ModelTier::default(),
            language: None,
            prompt: None,
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { paste: true }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.detection.vad_threshold) {
            anyhow::bail!(
                "detection.vad_threshold must be between 0.0 and 1.0, got {}",
                self.detection.vad_threshold
            );
        }
        if self.audio.sample_rate == 0 {
            anyhow::bail!("audio.sample_rate must be positive");
        }
        if self.audio.frame_samples == 0 {
            anyhow::bail!("audio.frame_samples must be positive");
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SOTTO_MODEL → transcription.model
    /// - SOTTO_LANGUAGE → transcription.language
    /// - SOTTO_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SOTTO_MODEL")
            && !model.is_empty()
            && let Ok(tier) = model.parse()
        {
            self.transcription.model = tier;
        }

        if let Ok(language) = std::env::var("SOTTO_LANGUAGE")
            && !language.is_empty()
        {
            self.transcription.language = Some(language);
        }

        if let Ok(device) = std::env::var("SOTTO_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Read the service API key from the environment.
    ///
    /// Checks SOTTO_API_KEY first, then OPENAI_API_KEY. The key is never
    /// stored in the config file.
    pub fn api_key() -> crate::error::Result<String> {
        for var in [defaults::API_KEY_ENV, defaults::API_KEY_ENV_FALLBACK] {
            if let Ok(key) = std::env::var(var)
                && !key.trim().is_empty()
            {
                return Ok(key);
            }
        }
        Err(crate::error::SottoError::ApiKeyMissing(
            defaults::API_KEY_ENV,
        ))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/sotto/config.toml on Linux and the platform
    /// equivalent elsewhere.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sotto")
            .join("config.toml")
    }
}
