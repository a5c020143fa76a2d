use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// One utterance's audio, handed to a transcriber.
#[derive(Debug, Clone, Copy)]
pub struct TranscribeRequest<'a> {
    /// PCM samples, 16-bit mono.
    pub samples: &'a [i16],
    pub sample_rate: u32,
}

/// Errors a transcription attempt can produce.
///
/// The split drives the worker's policy: retryable errors get bounded
/// retries, `PayloadTooLarge` fails the item immediately, and `Auth` stops
/// the whole pipeline since no retry can fix a rejected credential.
#[derive(Debug, Clone, Error)]
pub enum TranscribeError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("payload too large: {bytes} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { bytes: usize, limit: usize },

    #[error("authentication rejected: {message}")]
    Auth { message: String },

    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("malformed service response: {message}")]
    InvalidResponse { message: String },

    #[error("audio encoding failed: {message}")]
    Encode { message: String },
}

impl TranscribeError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranscribeError::Network { .. } | TranscribeError::QuotaExceeded { .. }
        )
    }

    /// Whether the error invalidates the whole pipeline, not just this item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranscribeError::Auth { .. })
    }
}

/// Trait for transcription backends.
///
/// Implementations hold their own model/language configuration; the pipeline
/// only hands over audio.
pub trait Transcriber: Send + Sync {
    /// Transcribe one utterance to text.
    fn transcribe(&self, request: &TranscribeRequest<'_>)
    -> Result<String, TranscribeError>;

    /// Identifier of the model requests are sent to.
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> so backends can be shared across threads.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(
        &self,
        request: &TranscribeRequest<'_>,
    ) -> Result<String, TranscribeError> {
        (**self).transcribe(request)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock transcriber for testing.
///
/// Returns a fixed response, or a scripted sequence of outcomes; optionally
/// sleeps per call and records each call's start/end instants so tests can
/// assert that calls never overlap.
pub struct MockTranscriber {
    model_name: String,
    response: String,
    script: Mutex<VecDeque<Result<String, TranscribeError>>>,
    delay: Duration,
    spans: Arc<Mutex<Vec<(Instant, Instant)>>>,
}

#[allow(clippy::unwrap_used)]
impl MockTranscriber {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            spans: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fixed response returned when the script is empty.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Queue explicit outcomes returned one per call before the fixed
    /// response kicks in.
    pub fn with_script(
        self,
        outcomes: impl IntoIterator<Item = Result<String, TranscribeError>>,
    ) -> Self {
        self.script.lock().unwrap().extend(outcomes);
        self
    }

    /// Make every call fail with the given error.
    pub fn with_failure(self, error: TranscribeError) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.clear();
            for _ in 0..64 {
                script.push_back(Err(error.clone()));
            }
        }
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// (start, end) instants of every call made so far.
    pub fn spans(&self) -> Arc<Mutex<Vec<(Instant, Instant)>>> {
        self.spans.clone()
    }
}

#[allow(clippy::unwrap_used)]
impl Transcriber for MockTranscriber {
    fn transcribe(
        &self,
        _request: &TranscribeRequest<'_>,
    ) -> Result<String, TranscribeError> {
        let start = Instant::now();
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.response.clone()));
        self.spans.lock().unwrap().push((start, Instant::now()));
        outcome
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
