//! Hosted chat-completion service client

use async_trait::async_trait;

use crate::http::{require_url, send_json};
use crate::personality::PersonalityMode;
use crate::{Error, Result};

/// Produces an assistant reply for one user message
///
/// Backends are stateless per call: only the latest message and the active
/// mode are sent.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Get a reply to `message` in the voice of `mode`
    ///
    /// # Errors
    ///
    /// Returns `CompletionFailed` on network, status or payload errors
    async fn complete(&self, message: &str, mode: PersonalityMode) -> Result<String>;
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    personality_mode: PersonalityMode,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

/// HTTP client for the hosted chat function
///
/// Sends `{ "message", "personalityMode" }` and reads `{ "response" }`; the
/// service maps the mode to its system prompt.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    url: String,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is blank
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            url: require_url(url.into(), "chat")?,
        })
    }

    /// Service endpoint
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Completer for ChatClient {
    async fn complete(&self, message: &str, mode: PersonalityMode) -> Result<String> {
        tracing::debug!(mode = %mode, chars = message.chars().count(), "sending message");

        let response = send_json(
            self.client.post(&self.url),
            &ChatRequest {
                message,
                personality_mode: mode,
            },
            "chat",
        )
        .await
        .map_err(|e| Error::CompletionFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(Error::CompletionFailed(format!(
                "chat error {}: {}",
                response.status, response.body
            )));
        }

        let result: ChatResponse = serde_json::from_str(&response.body)
            .map_err(|e| Error::CompletionFailed(format!("malformed response: {e}")))?;

        let reply = result
            .response
            .ok_or_else(|| Error::CompletionFailed("response field missing".to_string()))?;

        tracing::debug!(chars = reply.chars().count(), "reply received");
        Ok(reply)
    }
}
