//! Interaction orchestrator
//!
//! Owns the recorder, the conversation and the speaker, and drives the
//! record -> transcribe -> send -> reply -> speak chain from user actions.
//! The current [`InteractionState`] is published on a watch channel and every
//! failure becomes a [`Notification`]; the orchestrator always ends up back in
//! [`Phase::Idle`] after an error.
//!
//! Synthesis runs on its own task so user actions stay responsive while the
//! assistant is speaking. [`Interaction::speech_update`] reports its progress.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::Result;
use crate::chat::{Completer, Conversation, Message};
use crate::error::{Error, ErrorKind};
use crate::personality::PersonalityMode;
use crate::voice::{
    PlaybackStatus, Recorder, RecordingSession, SpeakOutcome, Speaker, Transcriber,
};

/// What the orchestrator is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Microphone held, audio accumulating
    Listening,
    /// Capture finished, waiting on speech-to-text
    Transcribing,
    /// User message sent, waiting on the completion service
    AwaitingReply,
    /// Synthesizing or playing assistant speech
    Speaking,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Transcribing => "transcribing",
            Self::AwaitingReply => "awaiting-reply",
            Self::Speaking => "speaking",
        };
        f.write_str(s)
    }
}

/// Snapshot of the state the presentation layer renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionState {
    pub phase: Phase,
    pub voice_output_enabled: bool,
}

impl InteractionState {
    /// Microphone is held or its audio is being transcribed
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        matches!(self.phase, Phase::Listening | Phase::Transcribing)
    }

    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        matches!(self.phase, Phase::Speaking)
    }

    /// Why typed text would be refused right now
    #[must_use]
    pub const fn input_blocked_hint(&self) -> Option<&'static str> {
        match self.phase {
            Phase::Idle => None,
            Phase::Listening | Phase::Transcribing => {
                Some("recording in progress; /mic to stop it first")
            }
            Phase::AwaitingReply => Some("still waiting for the last reply"),
            Phase::Speaking => Some("MISHARAIZE is speaking; /voice to stop"),
        }
    }
}

/// Progress of assistant speech, reported by [`Interaction::speech_update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechUpdate {
    /// Synthesis returned; playback started, or the audio was dropped
    Synthesized(SpeakOutcome),
    /// Playback ended
    Settled(PlaybackStatus),
    /// Synthesis or playback failed
    Failed(ErrorKind),
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A transient, non-blocking message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    /// Set for error notifications
    pub error: Option<ErrorKind>,
}

impl Notification {
    fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            title: title.into(),
            description: description.into(),
            error: None,
        }
    }

    fn from_error(err: &Error) -> Self {
        let notice = err.notice();
        Self {
            level: NotificationLevel::Error,
            title: notice.title.to_string(),
            description: notice.description.to_string(),
            error: Some(err.kind()),
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.level, NotificationLevel::Error)
    }
}

/// The services an [`Interaction`] drives
pub struct Services {
    pub recorder: Recorder,
    pub transcriber: Arc<dyn Transcriber>,
    pub completer: Arc<dyn Completer>,
    pub speaker: Speaker,
}

/// Top-level state holder for one chat window
pub struct Interaction {
    recorder: Recorder,
    transcriber: Arc<dyn Transcriber>,
    completer: Arc<dyn Completer>,
    speaker: Arc<Speaker>,
    synthesis: Option<JoinHandle<Result<SpeakOutcome>>>,
    conversation: Conversation,
    recording: Option<RecordingSession>,
    pending_input: String,
    state: watch::Sender<InteractionState>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl Interaction {
    /// Create an orchestrator and the receiving end of its notifications
    #[must_use]
    pub fn new(
        services: Services,
        mode: PersonalityMode,
        voice_output_enabled: bool,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (notifications, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(InteractionState {
            phase: Phase::Idle,
            voice_output_enabled,
        });

        let interaction = Self {
            recorder: services.recorder,
            transcriber: services.transcriber,
            completer: services.completer,
            speaker: Arc::new(services.speaker),
            synthesis: None,
            conversation: Conversation::new(mode),
            recording: None,
            pending_input: String::new(),
            state,
            notifications,
        };

        (interaction, rx)
    }

    /// Watch state changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<InteractionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> InteractionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn mode(&self) -> PersonalityMode {
        self.conversation.mode()
    }

    /// Text waiting in the input field
    #[must_use]
    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    /// Replace the input field
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    /// Greet an empty session, speaking the greeting if voice output is on
    pub fn initialize(&mut self) -> Option<Message> {
        let greeting = self.conversation.initialize().cloned()?;
        if self.state().voice_output_enabled {
            self.speak(greeting.text());
        }
        Some(greeting)
    }

    /// Start recording, or stop and transcribe into the input field
    ///
    /// Transcribed text is placed in the input field but not sent.
    pub async fn toggle_mic(&mut self) {
        match self.phase() {
            Phase::Idle => self.start_listening().await,
            Phase::Listening => self.finish_listening().await,
            phase => tracing::debug!(%phase, "mic toggle ignored"),
        }
    }

    async fn start_listening(&mut self) {
        match self.recorder.start_capture().await {
            Ok(session) => {
                self.recording = Some(session);
                self.set_phase(Phase::Listening);
                self.notify(Notification::info(
                    "Recording started",
                    "MISHARAIZE is listening to you. Speak clearly!",
                ));
            }
            Err(e) => self.fail(&e),
        }
    }

    async fn finish_listening(&mut self) {
        let Some(session) = self.recording.take() else {
            self.set_phase(Phase::Idle);
            return;
        };

        self.set_phase(Phase::Transcribing);
        self.notify(Notification::info(
            "Processing speech",
            "Converting your speech to text...",
        ));

        let payload = match self.recorder.stop_capture(session) {
            Ok(payload) => payload,
            Err(e) => return self.fail(&e),
        };

        tracing::debug!(
            bytes = payload.bytes.len(),
            duration_ms = u64::try_from(payload.duration().as_millis()).unwrap_or(u64::MAX),
            "transcribing capture"
        );

        match self.transcriber.transcribe(&payload).await {
            Ok(text) => {
                self.notify(Notification::info(
                    "Speech recognized",
                    format!("You said: \"{text}\""),
                ));
                self.pending_input = text;
                self.set_phase(Phase::Idle);
            }
            Err(e) => self.fail(&e),
        }
    }

    /// Abandon an in-progress recording without transcribing it
    pub fn cancel_recording(&mut self) {
        if let Some(session) = self.recording.take() {
            session.cancel();
            self.set_phase(Phase::Idle);
        }
    }

    /// Submit the input field
    ///
    /// Refused unless idle; in particular nothing is sent while assistant
    /// speech is playing. Returns the assistant reply on success.
    pub async fn send(&mut self) -> Option<Message> {
        let phase = self.phase();
        if phase != Phase::Idle {
            tracing::debug!(%phase, "send refused");
            return None;
        }

        let text = std::mem::take(&mut self.pending_input);
        if text.trim().is_empty() {
            return None;
        }

        self.set_phase(Phase::AwaitingReply);
        let reply = match self
            .conversation
            .submit(self.completer.as_ref(), &text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.fail(&e);
                return None;
            }
        };
        self.set_phase(Phase::Idle);

        let reply = reply?;
        if self.state().voice_output_enabled {
            self.speak(reply.text());
        }
        Some(reply)
    }

    /// Put `text` in the input field and submit it
    pub async fn send_text(&mut self, text: &str) -> Option<Message> {
        if self.phase() != Phase::Idle {
            tracing::debug!(phase = %self.phase(), "send refused");
            return None;
        }
        self.pending_input = text.to_string();
        self.send().await
    }

    /// Flip voice output; turning it off stops any speech immediately
    ///
    /// Synthesis still in flight is invalidated and its audio never plays.
    pub fn toggle_voice_output(&mut self) -> bool {
        let enabled = !self.state().voice_output_enabled;
        let was_speaking = self.state().is_speaking();

        if !enabled {
            self.speaker.stop();
        }

        self.state.send_modify(|state| {
            state.voice_output_enabled = enabled;
            if !enabled && was_speaking {
                state.phase = Phase::Idle;
            }
        });

        tracing::info!(enabled, "voice output toggled");
        self.notify(if enabled {
            Notification::info("TTS Enabled", "MISHARAIZE will now speak responses")
        } else {
            Notification::info("TTS Disabled", "MISHARAIZE will no longer speak responses")
        });

        enabled
    }

    /// Switch personality; an empty session is greeted in the new mode
    pub fn select_mode(&mut self, mode: PersonalityMode) {
        self.conversation.set_mode(mode);
        if self.conversation.is_empty() {
            self.initialize();
        }
    }

    /// Stop everything and start a fresh conversation in the current mode
    pub fn reset(&mut self) -> Option<Message> {
        self.cancel_recording();
        self.synthesis = None;
        self.speaker.stop();
        self.pending_input.clear();
        self.conversation.reset();
        self.set_phase(Phase::Idle);
        self.initialize()
    }

    /// Wait for the next step of assistant speech
    ///
    /// Resolves when in-flight synthesis returns and again when the playback
    /// it started ends, returning to idle once nothing is left to say. Never
    /// resolves while there is no speech, so it can sit in a `tokio::select!`
    /// next to input handling. Dropping the future loses nothing.
    pub async fn speech_update(&mut self) -> SpeechUpdate {
        if let Some(task) = self.synthesis.as_mut() {
            let joined = task.await;
            self.synthesis = None;
            let result = joined
                .unwrap_or_else(|e| Err(Error::SynthesisFailed(format!("speech task: {e}"))));
            return self.synthesis_finished(result);
        }

        let Some(result) = self.speaker.settled().await else {
            return std::future::pending().await;
        };

        match result {
            Ok(status) => {
                if self.phase() == Phase::Speaking {
                    self.set_phase(Phase::Idle);
                }
                SpeechUpdate::Settled(status)
            }
            Err(e) => {
                self.notify(Notification::from_error(&e));
                if self.phase() == Phase::Speaking {
                    self.set_phase(Phase::Idle);
                }
                SpeechUpdate::Failed(e.kind())
            }
        }
    }

    fn synthesis_finished(&mut self, result: Result<SpeakOutcome>) -> SpeechUpdate {
        let speaking = self.phase() == Phase::Speaking;
        match result {
            Ok(SpeakOutcome::Started) => SpeechUpdate::Synthesized(SpeakOutcome::Started),
            Ok(outcome) => {
                tracing::debug!(?outcome, "nothing to play");
                if speaking {
                    self.set_phase(Phase::Idle);
                }
                SpeechUpdate::Synthesized(outcome)
            }
            Err(e) if speaking => {
                self.fail(&e);
                SpeechUpdate::Failed(e.kind())
            }
            Err(e) => {
                tracing::debug!(error = %e, "speech failed after it was cancelled");
                SpeechUpdate::Failed(e.kind())
            }
        }
    }

    /// Start speaking `text` in the background
    ///
    /// The generation is claimed before the task runs, so a stop issued right
    /// after this call still wins. Any earlier task is detached and its audio
    /// is discarded by the speaker.
    fn speak(&mut self, text: &str) {
        self.set_phase(Phase::Speaking);
        let generation = self.speaker.begin();
        let speaker = Arc::clone(&self.speaker);
        let text = text.to_string();
        self.synthesis = Some(tokio::spawn(async move {
            speaker.speak_as(generation, &text).await
        }));
    }

    fn set_phase(&self, phase: Phase) {
        self.state.send_if_modified(|state| {
            if state.phase == phase {
                return false;
            }
            tracing::trace!(from = %state.phase, to = %phase, "phase changed");
            state.phase = phase;
            true
        });
    }

    /// Report `err` and return to a stable idle state
    fn fail(&mut self, err: &Error) {
        tracing::warn!(error = %err, phase = %self.phase(), "interaction failed");

        if let Some(session) = self.recording.take() {
            session.cancel();
        }

        self.notify(Notification::from_error(err));
        self.set_phase(Phase::Idle);
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::trace!("notification receiver dropped");
        }
    }
}
