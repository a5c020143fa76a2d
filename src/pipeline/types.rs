//! Data types flowing through the dictation pipeline.

use crate::stt::TranscribeError;

/// A fixed-size frame of raw audio samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sequence: u64) -> Self {
        Self { samples, sequence }
    }

    /// Frame duration in milliseconds at the given sample rate.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u64 * 1000 / sample_rate as u64) as u32
    }
}

/// A finalized span of speech ready for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Sequence number of the first frame in the span.
    pub sequence: u64,
    /// Concatenated PCM samples.
    pub samples: Vec<i16>,
    /// Sample rate of the payload.
    pub sample_rate: u32,
}

impl Utterance {
    /// Build an utterance from buffered frames.
    ///
    /// The frames must be non-empty and in sequence order; the utterance
    /// takes its sequence number from the first frame.
    pub fn from_frames(frames: Vec<AudioFrame>, sample_rate: u32) -> Self {
        debug_assert!(!frames.is_empty());
        let sequence = frames.first().map(|f| f.sequence).unwrap_or(0);
        let samples: Vec<i16> = frames.into_iter().flat_map(|f| f.samples).collect();
        Self {
            sequence,
            samples,
            sample_rate,
        }
    }

    /// Utterance duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// Outcome of transcribing one utterance.
///
/// Failures travel through the pipeline as data so the applier can surface
/// them; they never tear the pipeline down.
#[derive(Debug)]
pub struct TranscriptionResult {
    /// Sequence number of the source utterance.
    pub sequence: u64,
    pub outcome: std::result::Result<String, TranscribeError>,
}

impl TranscriptionResult {
    pub fn text(sequence: u64, text: String) -> Self {
        Self {
            sequence,
            outcome: Ok(text),
        }
    }

    pub fn failed(sequence: u64, error: TranscribeError) -> Self {
        Self {
            sequence,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
