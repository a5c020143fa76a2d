//! Error types for sotto.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SottoError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("API key not set: export {0} to use the transcription service")]
    ApiKeyMissing(&'static str),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Clipboard / paste errors
    #[error("Output tool not found: {tool}")]
    OutputToolNotFound { tool: String },

    #[error("Paste permission denied: {message}")]
    PastePermissionDenied { message: String },

    #[error("Clipboard write failed: {message}")]
    ClipboardFailed { message: String },

    #[error("Paste keystroke failed: {message}")]
    PasteFailed { message: String },

    // Pipeline lifecycle
    #[error("Pipeline is already running")]
    AlreadyRunning,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SottoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn config_parse_display() {
        let error = SottoError::ConfigParse {
            message: "invalid TOML syntax".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to parse configuration: invalid TOML syntax"
        );
    }

    #[test]
    fn config_invalid_value_display() {
        let error = SottoError::ConfigInvalidValue {
            key: "vad_threshold".to_string(),
            message: "must be between 0 and 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for vad_threshold: must be between 0 and 1"
        );
    }

    #[test]
    fn api_key_missing_names_variable() {
        let error = SottoError::ApiKeyMissing("SOTTO_API_KEY");
        assert!(error.to_string().contains("SOTTO_API_KEY"));
    }

    #[test]
    fn audio_device_not_found_display() {
        let error = SottoError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn audio_capture_display() {
        let error = SottoError::AudioCapture {
            message: "buffer overflow".to_string(),
        };
        assert_eq!(error.to_string(), "Audio capture failed: buffer overflow");
    }

    #[test]
    fn output_tool_not_found_display() {
        let error = SottoError::OutputToolNotFound {
            tool: "pbcopy".to_string(),
        };
        assert_eq!(error.to_string(), "Output tool not found: pbcopy");
    }

    #[test]
    fn paste_permission_denied_display() {
        let error = SottoError::PastePermissionDenied {
            message: "accessibility access not granted".to_string(),
        };
        assert!(error.to_string().contains("accessibility access"));
    }

    #[test]
    fn already_running_display() {
        assert_eq!(
            SottoError::AlreadyRunning.to_string(),
            "Pipeline is already running"
        );
    }

    #[test]
    fn from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: SottoError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: SottoError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SottoError>();
        assert_sync::<SottoError>();
    }

    #[test]
    fn result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
