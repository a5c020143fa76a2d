//! sotto - always-on voice dictation
//!
//! Listens continuously, detects utterance boundaries with a voice-activity
//! scorer, transcribes each utterance remotely, and delivers the text to the
//! clipboard.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod stt;
pub mod vad;

// Core traits (source → process → sink)
pub use audio::source::AudioSource;
pub use output::clipboard::{CommandExecutor, SystemCommandExecutor, TextOutput};
pub use stt::transcriber::Transcriber;
pub use vad::SpeechScorer;

// Pipeline
pub use pipeline::controller::{Pipeline, PipelineConfig, PipelineHandle};

// Error handling
pub use error::{Result, SottoError};

// Config
pub use config::{Config, ModelTier};

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
