//! In-memory WAV encoding for transcription uploads.

use crate::error::{Result, SottoError};
use std::io::Cursor;

/// Encode 16-bit PCM samples as a mono WAV file in memory.
///
/// The transcription service accepts containerized audio only, so each
/// utterance's raw PCM is wrapped in a minimal RIFF/WAV header before upload.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| SottoError::Other(format!(
                "Failed to create WAV writer: {}",
                e
            )))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| SottoError::Other(format!("Failed to write WAV sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| SottoError::Other(format!("Failed to finalize WAV data: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Simple linear interpolation resampling.
///
/// Used when a device only captures at its native rate and the stream is
/// converted in software.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_wav_round_trips_through_hound() {
        let samples = vec![0i16, 1000, -1000, i16::MAX, i16::MIN];
        let bytes = encode_wav(&samples, 16000).unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn encode_wav_empty_input_is_valid_header() {
        let bytes = encode_wav(&[], 16000).unwrap();
        // RIFF header + fmt chunk + empty data chunk = 44 bytes
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }

    #[test]
    fn encode_wav_size_tracks_sample_count() {
        let one_second = vec![0i16; 16000];
        let bytes = encode_wav(&one_second, 16000).unwrap();
        // 44-byte header + 2 bytes per sample
        assert_eq!(bytes.len(), 44 + 32000);
    }

    #[test]
    fn resample_same_rate_is_identity() {
        let samples = vec![1, 2, 3, 4];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_halves_length_when_downsampling_2x() {
        let samples: Vec<i16> = (0..100).collect();
        let out = resample(&samples, 32000, 16000);
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn resample_preserves_constant_signal() {
        let samples = vec![500i16; 480];
        let out = resample(&samples, 48000, 16000);
        assert!(out.iter().all(|&s| s == 500));
    }
}
