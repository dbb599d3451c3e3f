//! Speech-to-text (STT) processing

use async_trait::async_trait;
use base64::Engine;

use crate::http::{require_url, send_json};
use crate::voice::AudioPayload;
use crate::{Error, Result};

/// Text used when the service answers with a missing or empty `text` field
pub const MISSING_TRANSCRIPT_PLACEHOLDER: &str = "Voice input received";

/// Turns recorded audio into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a capture payload
    ///
    /// # Errors
    ///
    /// Returns `TranscriptionFailed` on network, status or payload errors
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String>;
}

#[derive(serde::Serialize)]
struct TranscribeRequest<'a> {
    audio: &'a str,
}

#[derive(serde::Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for the speech-to-text service
///
/// Sends `{ "audio": <base64> }` and reads `{ "text": ... }`.
#[derive(Debug, Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    url: String,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is blank
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            url: require_url(url.into(), "speech-to-text")?,
        })
    }

    /// Service endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        let audio = base64::engine::general_purpose::STANDARD.encode(&payload.bytes);
        if audio.is_empty() {
            return Err(Error::TranscriptionFailed("empty audio payload".to_string()));
        }

        tracing::debug!(
            audio_bytes = payload.bytes.len(),
            encoded_len = audio.len(),
            "starting transcription"
        );

        let response = send_json(
            self.client.post(&self.url),
            &TranscribeRequest { audio: &audio },
            "speech-to-text",
        )
        .await
        .map_err(|e| Error::TranscriptionFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(Error::TranscriptionFailed(format!(
                "speech-to-text error {}: {}",
                response.status, response.body
            )));
        }

        let result: TranscribeResponse = serde_json::from_str(&response.body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            Error::TranscriptionFailed(format!("malformed response: {e}"))
        })?;

        let transcript = result
            .text
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| MISSING_TRANSCRIPT_PLACEHOLDER.to_string());

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}
