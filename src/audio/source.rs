use crate::error::{Result, SottoError};
use std::collections::VecDeque;

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever audio has accumulated since the last call.
    ///
    /// Returns 16-bit PCM samples; an empty vector means no new audio yet.
    fn read_samples(&mut self) -> Result<Vec<i16>>;
}

/// Mock audio source for testing.
///
/// Yields a queue of pre-recorded sample batches, one per `read_samples`
/// call, then empty reads forever.
#[derive(Debug, Clone, Default)]
pub struct MockAudioSource {
    started: bool,
    batches: VecDeque<Vec<i16>>,
    fail_start: bool,
}

impl MockAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue batches that successive `read_samples` calls will return.
    pub fn with_batches(batches: impl IntoIterator<Item = Vec<i16>>) -> Self {
        Self {
            started: false,
            batches: batches.into_iter().collect(),
            fail_start: false,
        }
    }

    /// Configure the mock to fail on `start`, like a missing device.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(SottoError::AudioDeviceNotFound {
                device: "mock".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}
