//! HTTP client for an OpenAI-compatible transcription endpoint.

use crate::audio::wav::encode_wav;
use crate::config::TranscriptionConfig;
use crate::defaults;
use crate::error::{Result, SottoError};
use crate::stt::transcriber::{TranscribeError, TranscribeRequest, Transcriber};
use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcriber that posts WAV-encoded utterances to `/audio/transcriptions`.
///
/// One blocking request per call; the pipeline's worker serializes calls, so
/// the client needs no connection pooling beyond reqwest's default.
pub struct RemoteTranscriber {
    client: reqwest::blocking::Client,
    url: String,
    model: &'static str,
    language: Option<String>,
    prompt: Option<String>,
    max_payload_bytes: usize,
}

impl RemoteTranscriber {
    /// Build a client for the configured service.
    ///
    /// The key is validated for header use here; whether the service accepts
    /// it only surfaces on the first request.
    pub fn new(config: &TranscriptionConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(SottoError::ApiKeyMissing(defaults::API_KEY_ENV));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                SottoError::Other(format!("Invalid authorization header value: {}", e))
            })?,
        );

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SottoError::Other(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            url: format!("{}/audio/transcriptions", base_url),
            model: config.model.api_name(),
            language: config.language.clone(),
            prompt: config.prompt.clone(),
            max_payload_bytes: defaults::MAX_REQUEST_BYTES,
        })
    }

    #[cfg(test)]
    fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> TranscribeError {
    let message = format!("service returned {}: {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscribeError::Auth { message },
        StatusCode::PAYLOAD_TOO_LARGE => TranscribeError::PayloadTooLarge {
            bytes: 0,
            limit: defaults::MAX_REQUEST_BYTES,
        },
        StatusCode::TOO_MANY_REQUESTS => TranscribeError::QuotaExceeded { message },
        _ => TranscribeError::Network { message },
    }
}

impl Transcriber for RemoteTranscriber {
    fn transcribe(
        &self,
        request: &TranscribeRequest<'_>,
    ) -> std::result::Result<String, TranscribeError> {
        let wav_bytes = encode_wav(request.samples, request.sample_rate).map_err(|e| {
            TranscribeError::Encode {
                message: e.to_string(),
            }
        })?;

        // Reject oversized payloads before uploading; the service would
        // refuse them anyway and the upload itself is the expensive part.
        if wav_bytes.len() > self.max_payload_bytes {
            return Err(TranscribeError::PayloadTooLarge {
                bytes: wav_bytes.len(),
                limit: self.max_payload_bytes,
            });
        }

        let audio_part = Part::bytes(wav_bytes)
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Encode {
                message: format!("Failed to build multipart audio part: {}", e),
            })?;

        let mut form = Form::new()
            .part("file", audio_part)
            .text("model", self.model)
            .text("response_format", "json")
            .text("temperature", "0");

        if let Some(language) = &self.language
            && !language.is_empty()
            && language != "auto"
        {
            form = form.text("language", language.clone());
        }

        if let Some(prompt) = &self.prompt
            && !prompt.is_empty()
        {
            form = form.text("prompt", prompt.clone());
        }

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(|e| TranscribeError::Network {
                message: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(classify_status(status, &body));
        }

        let body: TranscriptionResponse =
            response.json().map_err(|e| TranscribeError::InvalidResponse {
                message: format!("Failed to parse transcription response: {}", e),
            })?;

        Ok(body.text.trim().to_string())
    }

    fn model_name(&self) -> &str {
        self.model
    }
}
