//! Utterance segmentation driven by voice-activity scores.
//!
//! Hysteresis keeps the state machine stable around speech boundaries: a
//! threshold crossing opens an utterance, but only a silence *timeout* closes
//! it, so brief dips below the threshold never fragment a sentence. All
//! timing is logical (frame count × frame duration), never wall clock, so a
//! stalled device cannot wedge the machine mid-utterance.

use crate::config::DetectionConfig;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioFrame, Utterance};
use crate::vad::SpeechScorer;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Active,
    TrailingSilence,
}

/// Station that accumulates scored frames into utterances.
pub struct SegmenterStation {
    scorer: Box<dyn SpeechScorer>,
    config: DetectionConfig,
    sample_rate: u32,
    quiet: bool,

    phase: Phase,
    buffer: Vec<AudioFrame>,
    pre_roll: VecDeque<AudioFrame>,
    pre_roll_ms: u32,
    /// Audio accumulated while `Active`; gates the min-speech check.
    speech_ms: u32,
    /// Trailing silence accumulated since speech last paused.
    silence_ms: u32,

    utterances_emitted: u64,
    bursts_discarded: u64,
}

impl SegmenterStation {
    pub fn new(config: DetectionConfig, scorer: Box<dyn SpeechScorer>) -> Self {
        Self {
            scorer,
            config,
            sample_rate: crate::defaults::SAMPLE_RATE,
            quiet: false,
            phase: Phase::Idle,
            buffer: Vec::new(),
            pre_roll: VecDeque::new(),
            pre_roll_ms: 0,
            speech_ms: 0,
            silence_ms: 0,
            utterances_emitted: 0,
            bursts_discarded: 0,
        }
    }

    /// Sets the sample rate used for logical timing.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Suppresses progress output to stderr.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Utterances emitted so far.
    pub fn utterances_emitted(&self) -> u64 {
        self.utterances_emitted
    }

    /// Speech bursts discarded for being shorter than the minimum.
    pub fn bursts_discarded(&self) -> u64 {
        self.bursts_discarded
    }

    fn begin_utterance(&mut self, frame: AudioFrame, frame_ms: u32) {
        self.buffer = self.pre_roll.drain(..).collect();
        self.pre_roll_ms = 0;
        self.buffer.push(frame);
        self.speech_ms = frame_ms;
        self.silence_ms = 0;
        self.phase = Phase::Active;
        if !self.quiet {
            eprintln!("sotto: speech started");
        }
    }

    fn push_pre_roll(&mut self, frame: AudioFrame, frame_ms: u32) {
        if self.config.pre_speech_ms == 0 {
            return;
        }
        self.pre_roll_ms += frame_ms;
        self.pre_roll.push_back(frame);
        while self.pre_roll_ms > self.config.pre_speech_ms {
            match self.pre_roll.pop_front() {
                Some(evicted) => self.pre_roll_ms -= evicted.duration_ms(self.sample_rate),
                None => break,
            }
        }
    }

    /// Closes the current buffer: emits it as an utterance if enough speech
    /// accumulated, otherwise discards it as a noise trigger. Either way the
    /// machine returns to `Idle` and the scorer's state is cleared.
    fn finalize(&mut self) -> Option<Utterance> {
        let frames = std::mem::take(&mut self.buffer);
        let speech_ms = std::mem::take(&mut self.speech_ms);
        self.silence_ms = 0;
        self.phase = Phase::Idle;
        self.scorer.reset();

        if frames.is_empty() {
            return None;
        }

        if speech_ms < self.config.min_speech_ms {
            self.bursts_discarded += 1;
            if !self.quiet {
                eprintln!(
                    "sotto: discarded {}ms burst (below {}ms minimum)",
                    speech_ms, self.config.min_speech_ms
                );
            }
            return None;
        }

        self.utterances_emitted += 1;
        let utterance = Utterance::from_frames(frames, self.sample_rate);
        if !self.quiet {
            eprintln!(
                "sotto: speech ended ({}ms of audio)",
                utterance.duration_ms()
            );
        }
        Some(utterance)
    }
}

impl Station for SegmenterStation {
    type Input = AudioFrame;
    type Output = Utterance;

    fn name(&self) -> &'static str {
        "segmenter"
    }

    fn process(&mut self, frame: AudioFrame) -> Result<Option<Utterance>, StationError> {
        if frame.samples.is_empty() {
            return Ok(None);
        }

        let score = self.scorer.score(&frame.samples);
        let is_speech = score >= self.config.vad_threshold;
        let frame_ms = frame.duration_ms(self.sample_rate);

        match self.phase {
            Phase::Idle => {
                if is_speech {
                    self.begin_utterance(frame, frame_ms);
                } else {
                    self.push_pre_roll(frame, frame_ms);
                }
            }
            Phase::Active => {
                self.speech_ms += frame_ms;
                self.buffer.push(frame);
                if !is_speech {
                    // The frame that leaves speech is the first silence frame.
                    self.phase = Phase::TrailingSilence;
                    self.silence_ms = frame_ms;
                }
            }
            Phase::TrailingSilence => {
                // Silence frames are retained so natural pauses inside an
                // utterance aren't clipped.
                self.buffer.push(frame);
                if is_speech {
                    self.phase = Phase::Active;
                    self.silence_ms = 0;
                } else {
                    self.silence_ms += frame_ms;
                    if self.silence_ms >= self.config.silence_timeout_ms {
                        return Ok(self.finalize());
                    }
                }
            }
        }

        Ok(None)
    }

    fn flush(&mut self) -> Result<Option<Utterance>, StationError> {
        if self.phase == Phase::Idle {
            return Ok(None);
        }
        Ok(self.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::ScriptedScorer;

    const FRAME: usize = 512; // 32ms at 16kHz
    const TIMEOUT_FRAMES: usize = 47; // ceil(1500ms / 32ms)

    fn config() -> DetectionConfig {
        DetectionConfig {
            vad_threshold: 0.5,
            silence_timeout_ms: 1500,
            min_speech_ms: 500,
            pre_speech_ms: 0,
        }
    }

    fn station(scores: Vec<f32>, config: DetectionConfig) -> SegmenterStation {
        SegmenterStation::new(config, Box::new(ScriptedScorer::new(scores)))
            .with_sample_rate(16000)
            .with_quiet(true)
    }

    fn feed(
        station: &mut SegmenterStation,
        count: usize,
        start_sequence: u64,
    ) -> Vec<Utterance> {
        let mut emitted = Vec::new();
        for i in 0..count {
            let frame = AudioFrame::new(vec![0i16; FRAME], start_sequence + i as u64);
            if let Some(utterance) = station.process(frame).unwrap() {
                emitted.push(utterance);
            }
        }
        emitted
    }

    fn scores(pattern: &[(f32, usize)]) -> Vec<f32> {
        pattern
            .iter()
            .flat_map(|&(score, count)| std::iter::repeat_n(score, count))
            .collect()
    }

    #[test]
    fn idle_silence_emits_nothing() {
        let mut station = station(scores(&[(0.1, 100)]), config());
        assert!(feed(&mut station, 100, 0).is_empty());
        assert_eq!(station.utterances_emitted(), 0);
        assert_eq!(station.bursts_discarded(), 0);
    }

    #[test]
    fn utterance_finalized_after_silence_timeout() {
        // 20 speech frames, then more than enough silence.
        let mut station = station(
            scores(&[(0.9, 20), (0.1, TIMEOUT_FRAMES + 5)]),
            config(),
        );
        let emitted = feed(&mut station, 20 + TIMEOUT_FRAMES + 5, 0);

        assert_eq!(emitted.len(), 1);
        let utterance = &emitted[0];
        // 20 speech frames plus exactly the timeout's worth of trailing silence
        assert_eq!(utterance.samples.len(), (20 + TIMEOUT_FRAMES) * FRAME);
        assert_eq!(utterance.sequence, 0);
        assert_eq!(station.utterances_emitted(), 1);
    }

    #[test]
    fn brief_dip_below_threshold_does_not_fragment() {
        // Silence, speech, a dip one frame short of the timeout, speech again.
        let mut station = station(
            scores(&[
                (0.1, 10),
                (0.9, 20),
                (0.1, TIMEOUT_FRAMES - 1),
                (0.9, 20),
                (0.1, TIMEOUT_FRAMES),
            ]),
            config(),
        );
        let total = 10 + 20 + (TIMEOUT_FRAMES - 1) + 20 + TIMEOUT_FRAMES;
        let emitted = feed(&mut station, total, 0);

        // One utterance spanning both speech runs and the dip between them.
        assert_eq!(emitted.len(), 1);
        let expected_frames = 20 + (TIMEOUT_FRAMES - 1) + 20 + TIMEOUT_FRAMES;
        assert_eq!(emitted[0].samples.len(), expected_frames * FRAME);
        assert_eq!(emitted[0].sequence, 10);
    }

    #[test]
    fn short_burst_is_discarded() {
        // 3 frames of speech is 96ms, below the 500ms minimum.
        let mut station = station(scores(&[(0.9, 3), (0.1, TIMEOUT_FRAMES + 5)]), config());
        let emitted = feed(&mut station, 3 + TIMEOUT_FRAMES + 5, 0);

        assert!(emitted.is_empty());
        assert_eq!(station.bursts_discarded(), 1);
        assert_eq!(station.utterances_emitted(), 0);
    }

    #[test]
    fn utterances_cover_disjoint_frame_ranges() {
        let mut station = station(
            scores(&[
                (0.9, 20),
                (0.1, TIMEOUT_FRAMES),
                (0.9, 20),
                (0.1, TIMEOUT_FRAMES),
            ]),
            config(),
        );
        let emitted = feed(&mut station, 2 * (20 + TIMEOUT_FRAMES), 0);

        assert_eq!(emitted.len(), 2);
        let first_end = emitted[0].sequence + (emitted[0].samples.len() / FRAME) as u64;
        assert!(
            emitted[1].sequence >= first_end,
            "second utterance (seq {}) overlaps first (ends at {})",
            emitted[1].sequence,
            first_end
        );
    }

    #[test]
    fn state_returns_to_idle_after_finalize() {
        let mut station = station(
            scores(&[(0.9, 20), (0.1, TIMEOUT_FRAMES + 10), (0.9, 20)]),
            config(),
        );
        let emitted = feed(&mut station, 20 + TIMEOUT_FRAMES + 10 + 20, 0);

        // One finalized utterance; the extra silence after it stays idle and
        // the new speech run opens a second (unfinalized) buffer.
        assert_eq!(emitted.len(), 1);
        let flushed = station.flush().unwrap();
        assert!(flushed.is_some(), "new speech run should be in progress");
        assert_eq!(
            flushed.unwrap().sequence,
            (20 + TIMEOUT_FRAMES + 10) as u64
        );
    }

    #[test]
    fn flush_emits_utterance_when_minimum_met() {
        let mut station = station(scores(&[(0.9, 20)]), config());
        assert!(feed(&mut station, 20, 0).is_empty());

        let flushed = station.flush().unwrap();
        assert!(flushed.is_some());
        assert_eq!(flushed.unwrap().samples.len(), 20 * FRAME);
        assert_eq!(station.utterances_emitted(), 1);
    }

    #[test]
    fn flush_discards_below_minimum() {
        let mut station = station(scores(&[(0.9, 3)]), config());
        assert!(feed(&mut station, 3, 0).is_empty());

        assert!(station.flush().unwrap().is_none());
        assert_eq!(station.bursts_discarded(), 1);
    }

    #[test]
    fn flush_when_idle_is_noop() {
        let mut station = station(scores(&[(0.1, 5)]), config());
        feed(&mut station, 5, 0);
        assert!(station.flush().unwrap().is_none());
        assert_eq!(station.bursts_discarded(), 0);
    }

    #[test]
    fn pre_roll_prepends_leading_silence() {
        let mut cfg = config();
        cfg.pre_speech_ms = 500;
        // 10 idle frames (320ms, all within the ring), then speech.
        let mut station = station(
            scores(&[(0.1, 10), (0.9, 20), (0.1, TIMEOUT_FRAMES)]),
            cfg,
        );
        let emitted = feed(&mut station, 10 + 20 + TIMEOUT_FRAMES, 0);

        assert_eq!(emitted.len(), 1);
        // All 10 idle frames are prepended, so the span starts at frame 0.
        assert_eq!(emitted[0].sequence, 0);
        assert_eq!(
            emitted[0].samples.len(),
            (10 + 20 + TIMEOUT_FRAMES) * FRAME
        );
    }

    #[test]
    fn pre_roll_ring_is_bounded() {
        let mut cfg = config();
        cfg.pre_speech_ms = 500; // 15 frames of 32ms
        let mut station = station(
            scores(&[(0.1, 40), (0.9, 20), (0.1, TIMEOUT_FRAMES)]),
            cfg,
        );
        let emitted = feed(&mut station, 40 + 20 + TIMEOUT_FRAMES, 0);

        assert_eq!(emitted.len(), 1);
        // Only the last 15 idle frames survive in the ring.
        assert_eq!(emitted[0].sequence, 25);
        assert_eq!(
            emitted[0].samples.len(),
            (15 + 20 + TIMEOUT_FRAMES) * FRAME
        );
    }

    #[test]
    fn pre_roll_disabled_when_zero() {
        let mut station = station(
            scores(&[(0.1, 10), (0.9, 20), (0.1, TIMEOUT_FRAMES)]),
            config(),
        );
        let emitted = feed(&mut station, 10 + 20 + TIMEOUT_FRAMES, 0);

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].sequence, 10);
        assert_eq!(emitted[0].samples.len(), (20 + TIMEOUT_FRAMES) * FRAME);
    }

    #[test]
    fn pre_roll_does_not_count_toward_min_speech() {
        let mut cfg = config();
        cfg.pre_speech_ms = 500;
        // 15 frames of ring audio plus 3 speech frames: still a short burst.
        let mut station = station(
            scores(&[(0.1, 15), (0.9, 3), (0.1, TIMEOUT_FRAMES + 5)]),
            cfg,
        );
        let emitted = feed(&mut station, 15 + 3 + TIMEOUT_FRAMES + 5, 0);

        assert!(emitted.is_empty());
        assert_eq!(station.bursts_discarded(), 1);
    }

    #[test]
    fn scorer_reset_after_each_boundary() {
        let scorer = ScriptedScorer::new(scores(&[
            (0.9, 20),
            (0.1, TIMEOUT_FRAMES),
            (0.9, 3),
            (0.1, TIMEOUT_FRAMES),
        ]));
        let resets = scorer.reset_counter();
        let mut station = SegmenterStation::new(config(), Box::new(scorer))
            .with_sample_rate(16000)
            .with_quiet(true);

        feed(&mut station, 2 * (20 + TIMEOUT_FRAMES), 0);

        // Both the emitted utterance and the discarded burst reset the scorer.
        assert_eq!(station.utterances_emitted(), 1);
        assert_eq!(station.bursts_discarded(), 1);
        assert_eq!(resets.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_frame_is_skipped() {
        let mut station = station(scores(&[(0.9, 5)]), config());
        let result = station.process(AudioFrame::new(Vec::new(), 0)).unwrap();
        assert!(result.is_none());
        // The empty frame never reached the scorer or the buffer.
        assert!(station.flush().unwrap().is_none());
    }

    #[test]
    fn min_speech_satisfied_across_resumed_speech() {
        // Two 10-frame speech runs (320ms each) separated by a short dip:
        // together they clear the 500ms minimum.
        let mut station = station(
            scores(&[(0.9, 10), (0.1, 5), (0.9, 10), (0.1, TIMEOUT_FRAMES)]),
            config(),
        );
        let emitted = feed(&mut station, 10 + 5 + 10 + TIMEOUT_FRAMES, 0);

        assert_eq!(emitted.len(), 1);
        assert_eq!(station.utterances_emitted(), 1);
    }
}
