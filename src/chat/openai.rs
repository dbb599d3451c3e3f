//! Direct OpenAI-compatible chat completion
//!
//! Used when no hosted chat function is deployed: the personality's system
//! prompt is applied client-side instead.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::chat::Completer;
use crate::http::{require_url, send_json};
use crate::personality::{PersonalityMode, describe};
use crate::{Error, Result};

/// Default chat-completions endpoint
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f32 = 0.8;
const MAX_TOKENS: u32 = 500;

#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [PromptMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct PromptMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completion against an OpenAI-compatible API
#[derive(Debug)]
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiChat {
    /// Create a new OpenAI chat backend
    ///
    /// # Errors
    ///
    /// Returns error if the API key or URL is blank
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for the openai chat backend".to_string(),
            ));
        }

        Ok(Self {
            client,
            url: require_url(url.into(), "OpenAI")?,
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Completer for OpenAiChat {
    async fn complete(&self, message: &str, mode: PersonalityMode) -> Result<String> {
        let system_prompt = describe(mode).completion_prompt();

        let request = CompletionRequest {
            model: &self.model,
            messages: [
                PromptMessage {
                    role: "system",
                    content: &system_prompt,
                },
                PromptMessage {
                    role: "user",
                    content: message,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(model = %self.model, mode = %mode, "requesting chat completion");

        let response = send_json(
            self.client
                .post(&self.url)
                .bearer_auth(self.api_key.expose_secret()),
            &request,
            "openai",
        )
        .await
        .map_err(|e| Error::CompletionFailed(e.to_string()))?;

        if !response.is_success() {
            return Err(Error::CompletionFailed(format!(
                "OpenAI API error {}: {}",
                response.status, response.body
            )));
        }

        let result: CompletionResponse = serde_json::from_str(&response.body)
            .map_err(|e| Error::CompletionFailed(format!("malformed response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::CompletionFailed("no completion choices returned".to_string()))
    }
}
