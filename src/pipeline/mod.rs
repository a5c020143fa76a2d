//! Continuous dictation pipeline.
//!
//! Each stage runs in its own thread, connected by bounded crossbeam
//! channels for backpressure. Data flows one way: capture → segmenter →
//! transcriber → applier.

pub mod applier;
pub mod cancel;
pub mod controller;
pub mod error;
pub mod segmenter;
pub mod station;
pub mod types;
pub mod worker;

pub use applier::ApplierStation;
pub use cancel::CancelToken;
pub use controller::{Pipeline, PipelineConfig, PipelineHandle};
pub use error::{ErrorReporter, StationError, StderrReporter};
pub use segmenter::SegmenterStation;
pub use station::{Station, StationRunner};
pub use types::{AudioFrame, TranscriptionResult, Utterance};
pub use worker::TranscriptionStation;
