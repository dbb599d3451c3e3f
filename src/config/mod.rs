//! Configuration management for the MISHARAIZE client
//!
//! Values resolve env > TOML file > default.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::chat::openai::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL};
use crate::personality::PersonalityMode;
use crate::voice::{CaptureOptions, DEFAULT_MAX_SPEECH_CHARS, SAMPLE_RATE};
use crate::{Error, Result};

use self::file::MisharaizeConfigFile;

/// Base URL of the hosted speech and chat functions
pub const DEFAULT_FUNCTIONS_URL: &str = "https://ftuxzwjwudxtpwqlqurj.functions.supabase.co";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// MISHARAIZE client configuration
#[derive(Debug)]
pub struct Config {
    /// Personality mode at startup
    pub mode: PersonalityMode,

    /// Remote service endpoints
    pub services: ServiceConfig,

    /// Chat completion backend
    pub chat: ChatConfig,

    /// Capture and speech output
    pub voice: VoiceConfig,
}

/// Remote service endpoints
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub stt_url: String,
    pub chat_url: String,
    pub tts_url: String,
    pub request_timeout: Duration,
}

/// Which completion backend answers chat messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatBackend {
    /// Hosted chat function; the service holds the model key
    #[default]
    Hosted,
    /// OpenAI-compatible API called directly
    OpenAi,
}

impl ChatBackend {
    /// Parse from string representation, falling back to `Hosted`
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open-ai" => Self::OpenAi,
            "hosted" | "functions" => Self::Hosted,
            other => {
                tracing::warn!(backend = other, "unknown chat backend, using hosted");
                Self::Hosted
            }
        }
    }
}

impl std::fmt::Display for ChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hosted => write!(f, "hosted"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Chat backend configuration
#[derive(Debug)]
pub struct ChatConfig {
    pub backend: ChatBackend,

    /// Key for the `OpenAI` backend (from `OPENAI_API_KEY`)
    pub openai_api_key: Option<SecretString>,

    pub openai_model: String,

    pub openai_url: String,
}

/// Capture and speech output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speak assistant replies (off unless enabled)
    pub output_enabled: bool,

    /// Character cap applied before synthesis
    pub max_chars: usize,

    /// Microphone hints and sample rate
    pub capture: CaptureOptions,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if the sample rate or character cap is zero
    pub fn from_sources(
        fc: MisharaizeConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mode = env("MISHARAIZE_MODE")
            .or(fc.mode)
            .map(|m| PersonalityMode::from_str(&m))
            .unwrap_or_default();

        // Endpoints (env > toml > functions base)
        let functions_url = env("MISHARAIZE_FUNCTIONS_URL")
            .or(fc.services.functions_url)
            .unwrap_or_else(|| DEFAULT_FUNCTIONS_URL.to_string());
        let functions_url = functions_url.trim_end_matches('/');

        let services = ServiceConfig {
            stt_url: env("MISHARAIZE_STT_URL")
                .or(fc.services.stt_url)
                .unwrap_or_else(|| format!("{functions_url}/speech-to-text")),
            chat_url: env("MISHARAIZE_CHAT_URL")
                .or(fc.services.chat_url)
                .unwrap_or_else(|| format!("{functions_url}/chat-ai")),
            tts_url: env("MISHARAIZE_TTS_URL")
                .or(fc.services.tts_url)
                .unwrap_or_else(|| format!("{functions_url}/text-to-speech")),
            request_timeout: Duration::from_secs(
                parse_env(&env, "MISHARAIZE_REQUEST_TIMEOUT_SECS")
                    .or(fc.services.request_timeout_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };

        let chat = ChatConfig {
            backend: env("MISHARAIZE_CHAT_BACKEND")
                .or(fc.chat.backend)
                .map(|b| ChatBackend::from_str(&b))
                .unwrap_or_default(),
            openai_api_key: env("OPENAI_API_KEY")
                .or(fc.chat.openai_api_key)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            openai_model: env("MISHARAIZE_OPENAI_MODEL")
                .or(fc.chat.openai_model)
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_url: env("MISHARAIZE_OPENAI_URL")
                .or(fc.chat.openai_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
        };

        let defaults = CaptureOptions::default();
        let voice = VoiceConfig {
            output_enabled: env("MISHARAIZE_VOICE_OUTPUT")
                .map(|v| v == "true" || v == "1")
                .or(fc.voice.output)
                .unwrap_or(false),
            max_chars: parse_env(&env, "MISHARAIZE_TTS_MAX_CHARS")
                .or(fc.voice.max_chars)
                .unwrap_or(DEFAULT_MAX_SPEECH_CHARS),
            capture: CaptureOptions {
                sample_rate: parse_env(&env, "MISHARAIZE_SAMPLE_RATE")
                    .or(fc.voice.sample_rate)
                    .unwrap_or(SAMPLE_RATE),
                echo_cancellation: fc
                    .voice
                    .echo_cancellation
                    .unwrap_or(defaults.echo_cancellation),
                noise_suppression: fc
                    .voice
                    .noise_suppression
                    .unwrap_or(defaults.noise_suppression),
            },
        };

        if voice.capture.sample_rate == 0 {
            return Err(Error::Config("sample rate must be non-zero".to_string()));
        }
        if voice.max_chars == 0 {
            return Err(Error::Config(
                "speech character cap must be non-zero".to_string(),
            ));
        }

        tracing::debug!(
            mode = %mode,
            backend = %chat.backend,
            voice_output = voice.output_enabled,
            "configuration resolved"
        );

        Ok(Self {
            mode,
            services,
            chat,
            voice,
        })
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = env(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        tracing::warn!(key, value = %raw, "ignoring unparseable value");
    }
    parsed
}
