//! TOML configuration file loading
//!
//! Supports `~/.config/misharaize/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MisharaizeConfigFile {
    /// Personality mode identifier (e.g. "teacher")
    #[serde(default)]
    pub mode: Option<String>,

    /// Remote service endpoints
    #[serde(default)]
    pub services: ServicesFileConfig,

    /// Chat completion backend
    #[serde(default)]
    pub chat: ChatFileConfig,

    /// Capture and speech output
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Service endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServicesFileConfig {
    /// Base URL the default endpoints hang off
    pub functions_url: Option<String>,
    pub stt_url: Option<String>,
    pub chat_url: Option<String>,
    pub tts_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// Chat backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    /// "hosted" or "openai"
    pub backend: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_url: Option<String>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Speak assistant replies
    pub output: Option<bool>,

    /// Character cap applied before synthesis
    pub max_chars: Option<usize>,

    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MisharaizeConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MisharaizeConfigFile {
    config_file_path().map_or_else(MisharaizeConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> MisharaizeConfigFile {
    if !path.exists() {
        return MisharaizeConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MisharaizeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MisharaizeConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/misharaize/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("misharaize").join("config.toml"))
}
