//! Text-to-speech (TTS) processing

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use reqwest::StatusCode;

use crate::http::{require_url, send_json};
use crate::{Error, Result};

/// Default cap on characters sent for synthesis
pub const DEFAULT_MAX_SPEECH_CHARS: usize = 500;

/// Appended to text cut at the character cap
pub const TRUNCATION_MARKER: &str = "...";

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?(```|$)").expect("valid regex"));
static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("valid regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid regex"));
static LINE_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(#{1,6}\s+|>\s?|[-*+]\s+)").expect("valid regex"));
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*{1,3}|__|~~").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip structural markup and cap length so only speakable text is synthesized
///
/// Returns an empty string when nothing speakable is left.
#[must_use]
pub fn sanitize_for_speech(text: &str, max_chars: usize) -> String {
    let text = CODE_FENCE.replace_all(text, " ");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = LINE_MARKUP.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    format!("{}{TRUNCATION_MARKER}", cut.trim_end())
}

/// Synthesizes speech from text
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize text to encoded audio bytes
    ///
    /// # Errors
    ///
    /// Returns `RateLimited` when throttled, `SynthesisFailed` on other
    /// service errors, `DecodeFailed` if the audio cannot be unwrapped
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpeechResponse {
    #[serde(default)]
    audio_content: Option<String>,
}

/// HTTP client for the text-to-speech service
///
/// Sends `{ "text": ... }` and reads `{ "audioContent": <base64> }`.
#[derive(Debug, Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    url: String,
}

impl TextToSpeech {
    /// Create a new TTS client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is blank
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            url: require_url(url.into(), "text-to-speech")?,
        })
    }

    /// Service endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.chars().count(), "generating speech");

        let response = send_json(
            self.client.post(&self.url),
            &SpeechRequest { text },
            "text-to-speech",
        )
        .await
        .map_err(|e| Error::SynthesisFailed(e.to_string()))?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(response.body));
        }

        if !response.is_success() {
            return Err(Error::SynthesisFailed(format!(
                "text-to-speech error {}: {}",
                response.status, response.body
            )));
        }

        let result: SpeechResponse = serde_json::from_str(&response.body)
            .map_err(|e| Error::SynthesisFailed(format!("malformed response: {e}")))?;

        let encoded = result
            .audio_content
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::SynthesisFailed("response has no audioContent".to_string()))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::DecodeFailed(format!("invalid base64 audio: {e}")))?;

        tracing::debug!(audio_bytes = audio.len(), "speech received");
        Ok(audio)
    }
}
