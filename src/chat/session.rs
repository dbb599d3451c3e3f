//! Conversation session
//!
//! Holds the append-only message log for the active personality and drives
//! one request/response cycle at a time against a [`Completer`].

use crate::chat::{Completer, Message};
use crate::personality::{PersonalityMode, describe};
use crate::Result;

/// Whether a reply is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingReply,
}

/// Ordered log of user and assistant turns
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    mode: PersonalityMode,
    messages: Vec<Message>,
    state: SessionState,
}

impl Conversation {
    /// Start an empty session in `mode`
    #[must_use]
    pub const fn new(mode: PersonalityMode) -> Self {
        Self {
            mode,
            messages: Vec::new(),
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> PersonalityMode {
        self.mode
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Switch personality; history is kept
    pub fn set_mode(&mut self, mode: PersonalityMode) {
        if mode != self.mode {
            tracing::info!(from = %self.mode, to = %mode, "personality mode changed");
            self.mode = mode;
        }
    }

    /// Greet in the current mode if the log is empty
    ///
    /// Returns the greeting when one was added. No network call is made.
    pub fn initialize(&mut self) -> Option<&Message> {
        if !self.messages.is_empty() {
            return None;
        }

        let greeting = Message::assistant(describe(self.mode).greeting);
        tracing::debug!(mode = %self.mode, "session greeted");
        self.messages.push(greeting);
        self.messages.last()
    }

    /// Drop all turns and start over in the current mode
    pub fn reset(&mut self) {
        tracing::debug!(turns = self.messages.len(), "session reset");
        self.messages.clear();
        self.state = SessionState::Idle;
    }

    /// Send one user turn and append the assistant's reply
    ///
    /// Blank input is a no-op returning `Ok(None)`. The user message is
    /// appended before the request goes out; on failure no assistant message
    /// is appended and the session returns to idle.
    ///
    /// # Errors
    ///
    /// Returns `CompletionFailed` from the completer
    pub async fn submit(
        &mut self,
        completer: &dyn Completer,
        text: &str,
    ) -> Result<Option<Message>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.messages.push(Message::user(text));
        self.state = SessionState::AwaitingReply;

        let result = completer.complete(text, self.mode).await;
        self.state = SessionState::Idle;

        match result {
            Ok(reply) => {
                let message = Message::assistant(reply);
                self.messages.push(message.clone());
                Ok(Some(message))
            }
            Err(e) => {
                tracing::warn!(error = %e, mode = %self.mode, "completion failed");
                Err(e)
            }
        }
    }
}
