//! Pipeline wiring and lifecycle.
//!
//! Four independently scheduled workers connected by bounded channels:
//! capture pump → segmenter → transcriber → applier. Records move through by
//! ownership transfer; the only shared state is the set-once cancellation
//! token and the read-only configuration.

use crate::audio::framer::FrameAssembler;
use crate::audio::source::AudioSource;
use crate::config::{Config, DetectionConfig};
use crate::defaults;
use crate::error::Result;
use crate::output::clipboard::{CommandExecutor, TextOutput};
use crate::pipeline::applier::ApplierStation;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::error::{ErrorReporter, StationError, StderrReporter};
use crate::pipeline::segmenter::SegmenterStation;
use crate::pipeline::station::StationRunner;
use crate::pipeline::worker::TranscriptionStation;
use crate::stt::Transcriber;
use crate::vad::SpeechScorer;
use crossbeam_channel::{SendTimeoutError, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the assembled pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Utterance detection parameters.
    pub detection: DetectionConfig,
    /// Sample rate of captured audio.
    pub sample_rate: u32,
    /// Samples per frame handed to the scorer.
    pub frame_samples: usize,
    /// Trigger a paste keystroke after each clipboard write.
    pub paste_enabled: bool,
    /// Suppress progress output.
    pub quiet: bool,
    /// Channel capacities. Small enough that backpressure surfaces quickly,
    /// large enough to absorb transcription latency spikes.
    pub frame_buffer: usize,
    pub utterance_buffer: usize,
    pub result_buffer: usize,
    /// How often the pump polls the capture buffer.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            sample_rate: defaults::SAMPLE_RATE,
            frame_samples: defaults::FRAME_SAMPLES,
            paste_enabled: true,
            quiet: false,
            frame_buffer: 64,
            utterance_buffer: 8,
            result_buffer: 16,
            poll_interval: Duration::from_millis(16),
        }
    }
}

impl PipelineConfig {
    /// Derive pipeline settings from the loaded configuration file.
    pub fn from_config(config: &Config) -> Self {
        Self {
            detection: config.detection.clone(),
            sample_rate: config.audio.sample_rate,
            frame_samples: config.audio.frame_samples,
            paste_enabled: config.output.paste,
            ..Self::default()
        }
    }
}

/// Reporter wrapper that cancels the pipeline on any fatal station error.
///
/// This is how a dying stage (auth rejection, dead audio device) signals the
/// controller without a side channel.
struct FatalHook {
    inner: Arc<dyn ErrorReporter>,
    cancel: CancelToken,
}

impl ErrorReporter for FatalHook {
    fn report(&self, station: &str, error: &StationError) {
        self.inner.report(station, error);
        if matches!(error, StationError::Fatal(_)) {
            self.cancel.cancel();
        }
    }
}

/// Handle to a running pipeline.
///
/// `stop` is idempotent and safe to call from any thread. Dropping the handle
/// stops the pipeline too, so threads never outlive their controller.
pub struct PipelineHandle {
    cancel: CancelToken,
    stopped: AtomicBool,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineHandle {
    /// Stops the pipeline and waits for every stage to finish.
    ///
    /// In-flight frames drain through the segmenter; a live utterance buffer
    /// is finalized (or discarded if below the speech minimum); utterances
    /// already queued are still transcribed and applied.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return; // Already stopped
        }

        self.cancel.cancel();

        let mut threads = match self.threads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Returns true until `stop` is called or a fatal error cancels the run.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The assembled dictation pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a pipeline with the default stderr error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(StderrReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the pipeline and begins frame delivery.
    ///
    /// Consuming `self` makes double-start unrepresentable; the returned
    /// handle owns the lifecycle from here.
    ///
    /// # Arguments
    /// * `audio_source` - Microphone (or mock) capture source
    /// * `scorer` - Voice-activity scorer
    /// * `transcriber` - Transcription backend, shared with the worker thread
    /// * `output` - Clipboard/paste delivery
    ///
    /// # Errors
    /// Fails immediately if the audio source cannot start (missing device,
    /// permission denied); that is never retried silently.
    pub fn start<A, E>(
        self,
        mut audio_source: A,
        scorer: Box<dyn SpeechScorer>,
        transcriber: Arc<dyn Transcriber>,
        output: TextOutput<E>,
    ) -> Result<PipelineHandle>
    where
        A: AudioSource + 'static,
        E: CommandExecutor + Send + 'static,
    {
        let cancel = CancelToken::new();
        let reporter: Arc<dyn ErrorReporter> = Arc::new(FatalHook {
            inner: self.error_reporter,
            cancel: cancel.clone(),
        });

        // Device-open failure is fatal and reported before any thread spawns.
        audio_source.start()?;

        let (frame_tx, frame_rx) = bounded(self.config.frame_buffer);
        let (utterance_tx, utterance_rx) = bounded(self.config.utterance_buffer);
        let (result_tx, result_rx) = bounded(self.config.result_buffer);
        // Terminal station: its output side is never used.
        let (done_tx, done_rx) = bounded::<()>(1);
        drop(done_rx);

        let segmenter = SegmenterStation::new(self.config.detection.clone(), scorer)
            .with_sample_rate(self.config.sample_rate)
            .with_quiet(self.config.quiet);

        let worker = TranscriptionStation::new(transcriber, cancel.clone())
            .with_quiet(self.config.quiet);

        let applier = ApplierStation::new(output, self.config.paste_enabled)
            .with_quiet(self.config.quiet);

        let segmenter_runner =
            StationRunner::spawn(segmenter, frame_rx, utterance_tx, reporter.clone());
        let worker_runner =
            StationRunner::spawn(worker, utterance_rx, result_tx, reporter.clone());
        let applier_runner =
            StationRunner::spawn(applier, result_rx, done_tx, reporter.clone());

        // Capture pump: reads the device buffer, slices it into frames, and
        // pushes them downstream. When the queue is full it blocks in bounded
        // slices instead of dropping frames, since dropped frames corrupt
        // utterance boundaries.
        let pump_cancel = cancel.clone();
        let pump_reporter = reporter.clone();
        let frame_samples = self.config.frame_samples;
        let poll_interval = self.config.poll_interval;
        let pump_handle = thread::spawn(move || {
            let mut assembler = FrameAssembler::new(frame_samples);

            'pump: while !pump_cancel.is_cancelled() {
                let samples = match audio_source.read_samples() {
                    Ok(samples) => samples,
                    Err(e) => {
                        pump_reporter.report(
                            "capture",
                            &StationError::Fatal(format!("audio capture failed: {}", e)),
                        );
                        break 'pump;
                    }
                };

                if samples.is_empty() {
                    thread::sleep(poll_interval);
                    continue;
                }

                for frame in assembler.push(&samples) {
                    let mut frame = frame;
                    loop {
                        match frame_tx.send_timeout(frame, Duration::from_millis(100)) {
                            Ok(()) => break,
                            Err(SendTimeoutError::Timeout(returned)) => {
                                if pump_cancel.is_cancelled() {
                                    break 'pump;
                                }
                                frame = returned;
                            }
                            Err(SendTimeoutError::Disconnected(_)) => break 'pump,
                        }
                    }
                }

                thread::sleep(poll_interval);
            }

            let _ = audio_source.stop();
            // frame_tx drops here; the close cascades stage by stage so
            // everything in flight drains before the threads exit.
        });

        let mut threads = vec![pump_handle];
        threads.push(thread::spawn(move || {
            let _ = segmenter_runner.join();
        }));
        threads.push(thread::spawn(move || {
            let _ = worker_runner.join();
        }));
        threads.push(thread::spawn(move || {
            let _ = applier_runner.join();
        }));

        Ok(PipelineHandle {
            cancel,
            stopped: AtomicBool::new(false),
            threads: Mutex::new(threads),
        })
    }
}
