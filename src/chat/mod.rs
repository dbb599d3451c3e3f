//! Conversation session and chat-completion backends

mod client;
mod message;
pub mod openai;
mod session;

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::config::{ChatBackend, Config};

pub use client::{ChatClient, Completer};
pub use message::{Message, Sender};
pub use openai::OpenAiChat;
pub use session::{Conversation, SessionState};

/// Build the completion backend selected by `config`
///
/// # Errors
///
/// Returns error if the `OpenAI` backend is selected without an API key, or an
/// endpoint is blank
pub fn completer_from_config(
    config: &Config,
    client: reqwest::Client,
) -> Result<Arc<dyn Completer>> {
    match config.chat.backend {
        ChatBackend::Hosted => Ok(Arc::new(ChatClient::new(
            client,
            config.services.chat_url.clone(),
        )?)),
        ChatBackend::OpenAi => {
            let api_key = config.chat.openai_api_key.as_ref().ok_or_else(|| {
                crate::Error::Config(
                    "OPENAI_API_KEY must be set for the openai chat backend".to_string(),
                )
            })?;
            Ok(Arc::new(OpenAiChat::new(
                client,
                config.chat.openai_url.clone(),
                SecretString::from(api_key.expose_secret()),
                config.chat.openai_model.clone(),
            )?))
        }
    }
}
