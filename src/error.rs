//! Error types for the MISHARAIZE client

use thiserror::Error;

/// Result type alias for MISHARAIZE operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing, transcribing, chatting or speaking
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The host refused microphone access
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No compatible capture device or format
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Capture stopped without any audio
    #[error("no audio was recorded")]
    EmptyRecording,

    /// Speech-to-text service failure
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Chat completion service failure
    #[error("completion failed: {0}")]
    CompletionFailed(String),

    /// Text-to-speech service failure
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Text-to-speech service rate limited the request (HTTP 429)
    #[error("synthesis rate limited: {0}")]
    RateLimited(String),

    /// Synthesized audio could not be decoded
    #[error("audio decode failed: {0}")]
    DecodeFailed(String),

    /// Output device rejected or aborted playback
    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    /// Audio encoding or device error outside the categories above
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse failure category, used for notifications and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceUnavailable,
    EmptyRecording,
    TranscriptionFailed,
    CompletionFailed,
    SynthesisFailed,
    RateLimited,
    DecodeFailed,
    PlaybackFailed,
    Internal,
}

impl ErrorKind {
    /// Whether this kind belongs to the synthesis family (`RateLimited` included)
    #[must_use]
    pub const fn is_synthesis(self) -> bool {
        matches!(self, Self::SynthesisFailed | Self::RateLimited)
    }
}

/// Plain-language title and description for a user-facing notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub description: &'static str,
}

impl Error {
    /// Failure category of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            Self::EmptyRecording => ErrorKind::EmptyRecording,
            Self::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
            Self::CompletionFailed(_) => ErrorKind::CompletionFailed,
            Self::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::DecodeFailed(_) => ErrorKind::DecodeFailed,
            Self::PlaybackFailed(_) => ErrorKind::PlaybackFailed,
            Self::Config(_)
            | Self::Audio(_)
            | Self::Io(_)
            | Self::Http(_)
            | Self::Serialization(_)
            | Self::Toml(_) => ErrorKind::Internal,
        }
    }

    /// User-facing wording for this error
    #[must_use]
    pub const fn notice(&self) -> Notice {
        let (title, description) = match self.kind() {
            ErrorKind::PermissionDenied => (
                "Microphone error",
                "Could not access microphone. Please allow microphone access and try again.",
            ),
            ErrorKind::DeviceUnavailable => (
                "Microphone error",
                "No microphone found. Please connect a microphone.",
            ),
            ErrorKind::EmptyRecording => (
                "Recording error",
                "No audio was recorded. Please try again.",
            ),
            ErrorKind::TranscriptionFailed => (
                "Speech processing error",
                "Could not process your speech. Please try again.",
            ),
            ErrorKind::CompletionFailed => (
                "Error",
                "Failed to get response from MISHARAIZE. Please try again.",
            ),
            ErrorKind::SynthesisFailed => (
                "TTS error",
                "Failed to generate speech. Please check your connection.",
            ),
            ErrorKind::RateLimited => (
                "TTS rate limited",
                "Too many speech requests. Please wait a moment and try again.",
            ),
            ErrorKind::DecodeFailed => (
                "TTS error",
                "The speech audio could not be decoded.",
            ),
            ErrorKind::PlaybackFailed => (
                "TTS error",
                "Failed to play speech on the output device.",
            ),
            ErrorKind::Internal => ("Error", "Something went wrong. Please try again."),
        };
        Notice { title, description }
    }
}
