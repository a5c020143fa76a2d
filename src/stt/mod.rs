//! Speech-to-text via a remote transcription service.

pub mod remote;
pub mod transcriber;

pub use remote::RemoteTranscriber;
pub use transcriber::{MockTranscriber, TranscribeError, TranscribeRequest, Transcriber};
