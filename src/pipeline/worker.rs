//! Transcription station: one utterance, one request, in order.
//!
//! The station is deliberately single-flight. Because it never starts
//! utterance N+1 before N's request resolves, results leave in utterance
//! order and no reorder buffer is needed downstream.

use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{TranscriptionResult, Utterance};
use crate::stt::{TranscribeRequest, Transcriber};
use std::sync::Arc;
use std::time::Duration;

/// Station that transcribes utterances via a `Transcriber` backend.
pub struct TranscriptionStation {
    transcriber: Arc<dyn Transcriber>,
    cancel: CancelToken,
    max_attempts: u32,
    backoff_base: Duration,
    quiet: bool,
}

impl TranscriptionStation {
    pub fn new(transcriber: Arc<dyn Transcriber>, cancel: CancelToken) -> Self {
        Self {
            transcriber,
            cancel,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            quiet: false,
        }
    }

    /// Total attempts per utterance (first try included).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Base delay before the first retry; doubles per attempt.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Suppresses progress output to stderr.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

impl Station for TranscriptionStation {
    type Input = Utterance;
    type Output = TranscriptionResult;

    fn name(&self) -> &'static str {
        "transcriber"
    }

    fn process(
        &mut self,
        utterance: Utterance,
    ) -> Result<Option<TranscriptionResult>, StationError> {
        if !self.quiet {
            eprintln!(
                "sotto: transcribing {}ms of audio with {}...",
                utterance.duration_ms(),
                self.transcriber.model_name()
            );
        }

        let request = TranscribeRequest {
            samples: &utterance.samples,
            sample_rate: utterance.sample_rate,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.transcriber.transcribe(&request) {
                Ok(text) => {
                    return Ok(Some(TranscriptionResult::text(utterance.sequence, text)));
                }
                Err(e) => e,
            };

            if error.is_fatal() {
                // No retry fixes a rejected credential; take the pipeline down.
                return Err(StationError::Fatal(format!(
                    "transcription service rejected credentials: {}",
                    error
                )));
            }

            let may_retry = error.is_retryable()
                && attempt < self.max_attempts
                && !self.cancel.is_cancelled();
            if !may_retry {
                // The failure travels downstream as data, not silence.
                return Ok(Some(TranscriptionResult::failed(utterance.sequence, error)));
            }

            let backoff = self.backoff_base * 2u32.pow(attempt - 1);
            eprintln!(
                "sotto: transcription attempt {} failed ({}), retrying in {:?}",
                attempt, error, backoff
            );
            std::thread::sleep(backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::{ErrorReporter, StationError};
    use crate::pipeline::station::StationRunner;
    use crate::stt::{MockTranscriber, TranscribeError};
    use crossbeam_channel::bounded;

    fn utterance(sequence: u64, frames: usize) -> Utterance {
        Utterance {
            sequence,
            samples: vec![0i16; frames * 512],
            sample_rate: 16000,
        }
    }

    fn station(transcriber: MockTranscriber) -> TranscriptionStation {
        TranscriptionStation::new(Arc::new(transcriber), CancelToken::new())
            .with_backoff(Duration::from_millis(1))
            .with_quiet(true)
    }

    struct NullReporter;
    impl ErrorReporter for NullReporter {
        fn report(&self, _station: &str, _error: &StationError) {}
    }

    #[test]
    fn successful_transcription_keeps_sequence() {
        let mut station = station(MockTranscriber::new("mock").with_response("Hello world"));

        let result = station.process(utterance(42, 20)).unwrap().unwrap();

        assert_eq!(result.sequence, 42);
        assert_eq!(result.outcome.unwrap(), "Hello world");
    }

    #[test]
    fn transient_error_is_retried_then_succeeds() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("recovered")
            .with_script([Err(TranscribeError::Network {
                message: "connection reset".to_string(),
            })]);
        let spans = transcriber.spans();
        let mut station = station(transcriber);

        let result = station.process(utterance(1, 20)).unwrap().unwrap();

        assert_eq!(result.outcome.unwrap(), "recovered");
        assert_eq!(spans.lock().unwrap().len(), 2);
    }

    #[test]
    fn exhausted_retries_produce_failed_result() {
        let transcriber = MockTranscriber::new("mock").with_failure(TranscribeError::Network {
            message: "unreachable".to_string(),
        });
        let spans = transcriber.spans();
        let mut station = station(transcriber);

        let result = station.process(utterance(9, 20)).unwrap().unwrap();

        assert_eq!(result.sequence, 9);
        assert!(matches!(
            result.outcome,
            Err(TranscribeError::Network { .. })
        ));
        // Three attempts with the default settings, no more.
        assert_eq!(spans.lock().unwrap().len(), 3);
    }

    #[test]
    fn payload_too_large_fails_without_retry() {
        let transcriber =
            MockTranscriber::new("mock").with_failure(TranscribeError::PayloadTooLarge {
                bytes: 30_000_000,
                limit: 26_214_400,
            });
        let spans = transcriber.spans();
        let mut station = station(transcriber);

        let result = station.process(utterance(2, 20)).unwrap().unwrap();

        assert!(matches!(
            result.outcome,
            Err(TranscribeError::PayloadTooLarge { .. })
        ));
        assert_eq!(spans.lock().unwrap().len(), 1);
    }

    #[test]
    fn auth_failure_is_fatal() {
        let transcriber = MockTranscriber::new("mock").with_failure(TranscribeError::Auth {
            message: "invalid api key".to_string(),
        });
        let mut station = station(transcriber);

        match station.process(utterance(3, 20)) {
            Err(StationError::Fatal(msg)) => {
                assert!(msg.contains("invalid api key"));
            }
            other => panic!("expected Fatal, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn cancellation_cuts_retries_short() {
        let transcriber = MockTranscriber::new("mock").with_failure(TranscribeError::Network {
            message: "down".to_string(),
        });
        let spans = transcriber.spans();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut station = TranscriptionStation::new(Arc::new(transcriber), cancel)
            .with_backoff(Duration::from_millis(1))
            .with_quiet(true);

        let result = station.process(utterance(4, 20)).unwrap().unwrap();

        assert!(!result.is_success());
        assert_eq!(spans.lock().unwrap().len(), 1);
    }

    #[test]
    fn requests_never_overlap_and_results_stay_ordered() {
        let transcriber = MockTranscriber::new("mock")
            .with_response("ok")
            .with_delay(Duration::from_millis(10));
        let spans = transcriber.spans();
        let station = station(transcriber);

        let (input_tx, input_rx) = bounded(8);
        let (output_tx, output_rx) = bounded(8);
        let runner =
            StationRunner::spawn(station, input_rx, output_tx, Arc::new(NullReporter));

        for sequence in [10, 20, 30] {
            input_tx.send(utterance(sequence, 20)).unwrap();
        }
        drop(input_tx);

        let mut sequences = Vec::new();
        while let Ok(result) = output_rx.recv() {
            sequences.push(result.sequence);
        }
        runner.join().unwrap();

        assert_eq!(sequences, vec![10, 20, 30]);

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "request started before the previous one resolved"
            );
        }
    }
}
