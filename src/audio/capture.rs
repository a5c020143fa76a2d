//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, SottoError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// Suppresses noisy backend probe messages (ALSA/JACK on Linux) that CPAL
/// triggers when enumerating hosts. Harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// An input device visible to the capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub index: usize,
    pub name: String,
}

/// List all available audio input devices.
///
/// A side query only: enumerating never touches a running stream.
///
/// # Errors
/// Returns `SottoError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let devices = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        host.input_devices().map(|iter| iter.collect::<Vec<_>>())
    })
    .map_err(|e| SottoError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    Ok(devices
        .iter()
        .enumerate()
        .filter_map(|(index, device)| {
            device.name().ok().map(|name| AudioDevice { index, name })
        })
        .collect())
}

/// Find a device by selector: a numeric index from `list_devices`, or an
/// exact device name. `None` selects the system default input.
fn find_device(selector: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        let Some(selector) = selector else {
            return host
                .default_input_device()
                .ok_or_else(|| SottoError::AudioDeviceNotFound {
                    device: "default".to_string(),
                });
        };

        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| SottoError::AudioCapture {
                message: format!("Failed to enumerate devices: {}", e),
            })?
            .collect();

        if let Ok(index) = selector.parse::<usize>() {
            return devices
                .into_iter()
                .nth(index)
                .ok_or_else(|| SottoError::AudioDeviceNotFound {
                    device: selector.to_string(),
                });
        }

        devices
            .into_iter()
            .find(|d| d.name().is_ok_and(|name| name == selector))
            .ok_or_else(|| SottoError::AudioDeviceNotFound {
                device: selector.to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is only accessed from a single thread at a time through
/// the Mutex wrapper in CpalAudioSource; its methods are called synchronously.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture implementation backed by CPAL.
///
/// Captures 16-bit PCM mono at the configured rate. Tries the preferred
/// config first (i16, then f32), then falls back to the device's native
/// config with software conversion (channel mixing + resampling).
///
/// A stream error (device unplugged, format renegotiated mid-session) latches
/// a failure flag; the next `read_samples` reports it so the pipeline can
/// shut down rather than wedge on a silent device.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    buffer: Arc<Mutex<Vec<i16>>>,
    failed: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Open a capture source on the selected device.
    ///
    /// # Arguments
    /// * `selector` - Device index or name; `None` for the system default.
    ///
    /// # Errors
    /// Device-not-found and enumeration failures are returned immediately;
    /// they are never retried.
    pub fn new(selector: Option<&str>) -> Result<Self> {
        Self::with_sample_rate(selector, defaults::SAMPLE_RATE)
    }

    /// Open a capture source at a specific sample rate.
    pub fn with_sample_rate(selector: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = find_device(selector)?;

        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            buffer: Arc::new(Mutex::new(Vec::new())),
            failed: Arc::new(AtomicBool::new(false)),
            sample_rate,
        })
    }

    /// Build the audio stream with the configured format.
    ///
    /// Tries in order:
    /// 1. i16/mono at the target rate — zero-copy path
    /// 2. f32/mono at the target rate — for devices that only expose floats
    /// 3. Device default config — native rate/channels with software conversion
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let failed = Arc::clone(&self.failed);
        let err_callback = move |err: cpal::StreamError| {
            eprintln!("sotto: audio stream error: {}", err);
            failed.store(true, Ordering::SeqCst);
        };

        // Try i16/mono at the target rate
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            err_callback.clone(),
            None,
        ) {
            return Ok(stream);
        }

        // Try f32/mono at the target rate
        let buffer = Arc::clone(&self.buffer);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                    );
                }
            },
            err_callback.clone(),
            None,
        ) {
            return Ok(stream);
        }

        // Fallback: capture at the device's native config, convert in software.
        self.build_stream_native(err_callback)
    }

    /// Build a stream using the device's default config, with software channel
    /// mixing and resampling to the target rate.
    fn build_stream_native(
        &self,
        err_callback: impl FnMut(cpal::StreamError) + Send + Clone + 'static,
    ) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| SottoError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "sotto: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let buffer = Arc::clone(&self.buffer);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let converted =
                            mix_to_mono_and_resample(data, native_channels, native_rate, target_rate);
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SottoError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let i16_data: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let converted = mix_to_mono_and_resample(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(&converted);
                        }
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| SottoError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(SottoError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try selecting a different device.",
                    fmt
                ),
            }),
        }
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn mix_to_mono_and_resample(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono: Vec<i16> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        crate::audio::wav::resample(&mono, source_rate, target_rate)
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        {
            let stream_guard = self.stream.lock().map_err(|e| SottoError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if stream_guard.is_some() {
                return Ok(()); // Already started
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| SottoError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        let mut stream_guard = self.stream.lock().map_err(|e| SottoError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *stream_guard = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| SottoError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| SottoError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(SottoError::AudioCapture {
                message: "audio stream reported an error; device needs reopening".to_string(),
            });
        }

        let mut buffer = self.buffer.lock().map_err(|e| SottoError::AudioCapture {
            message: format!("Failed to lock audio buffer: {}", e),
        })?;

        Ok(std::mem::take(&mut *buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_stereo_averages_channels() {
        let stereo = vec![100i16, 300, -200, 200];
        let mono = mix_to_mono_and_resample(&stereo, 2, 16000, 16000);
        assert_eq!(mono, vec![200, 0]);
    }

    #[test]
    fn mix_mono_same_rate_is_identity() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(mix_to_mono_and_resample(&samples, 1, 16000, 16000), samples);
    }

    #[test]
    fn mix_resamples_when_rates_differ() {
        let samples = vec![1000i16; 480];
        let out = mix_to_mono_and_resample(&samples, 1, 48000, 16000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn list_devices_returns_at_least_one_device() {
        let devices = list_devices().unwrap();
        assert!(!devices.is_empty(), "Expected at least one audio device");
        // Indices follow enumeration order (filtered names may leave gaps)
        for pair in devices.windows(2) {
            assert!(pair[0].index < pair[1].index);
        }
    }

    #[test]
    fn create_with_invalid_device_name() {
        let source = CpalAudioSource::new(Some("NonExistentDevice12345"));
        match source {
            Err(SottoError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            Err(SottoError::AudioCapture { .. }) => {
                // Hosts without audio support fail at enumeration instead
            }
            other => panic!("Expected device error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn start_read_stop_cycle() {
        let mut source = CpalAudioSource::new(None).expect("Failed to create audio source");
        source.start().expect("Failed to start");
        std::thread::sleep(std::time::Duration::from_millis(100));
        let _ = source.read_samples().expect("Failed to read samples");
        source.stop().expect("Failed to stop");
    }
}
