//! Default configuration constants for sotto.
//!
//! Shared across the configuration types and the pipeline so tuning values
//! live in exactly one place.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and is what the transcription
/// service expects for voice audio.
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per frame handed to the voice-activity scorer.
///
/// 512 samples at 16kHz is 32ms of audio, the frame size neural VAD models
/// are trained on.
pub const FRAME_SAMPLES: usize = 512;

/// Default voice-activity probability threshold (0.0 to 1.0).
///
/// A frame scoring at or above this is treated as speech.
pub const VAD_THRESHOLD: f32 = 0.5;

/// Default silence duration in milliseconds before an utterance is finalized.
///
/// 1500ms allows for natural pauses mid-sentence without splitting the
/// utterance.
pub const SILENCE_TIMEOUT_MS: u32 = 1500;

/// Minimum accumulated speech in milliseconds for a buffer to count as an
/// utterance. Shorter bursts are treated as noise triggers and discarded.
pub const MIN_SPEECH_MS: u32 = 500;

/// Pre-speech buffer duration in milliseconds.
///
/// Frames kept in a ring while idle and prepended when speech starts.
/// Captures soft onsets (plosives, fricatives) that occur before the score
/// crosses the threshold.
pub const PRE_SPEECH_MS: u32 = 500;

/// Hard cap on the encoded request payload accepted by the transcription
/// service: 25 MB of audio.
pub const MAX_REQUEST_BYTES: usize = 25 * 1024 * 1024;

/// Default base URL of the transcription service.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the service API key.
pub const API_KEY_ENV: &str = "SOTTO_API_KEY";

/// Fallback environment variable for the API key.
pub const API_KEY_ENV_FALLBACK: &str = "OPENAI_API_KEY";
