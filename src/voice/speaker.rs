//! Speech playback controller
//!
//! Sanitizes assistant text, synthesizes it, decodes the audio and plays it
//! with exclusive ownership of the output: starting new speech stops the
//! previous playback first, and a synthesis result that arrives after a newer
//! request started is discarded instead of played.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::voice::playback::{PlaybackHandle, PlaybackStatus, wait_settled};
use crate::voice::tts::{DEFAULT_MAX_SPEECH_CHARS, Synthesizer, sanitize_for_speech};
use crate::voice::{AudioOutput, decode_audio};
use crate::{Error, Result};

/// What a `speak` call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback started and is now the live handle
    Started,
    /// Nothing speakable after sanitizing
    Skipped,
    /// A newer request (or a stop) overtook this one; its audio was dropped
    Superseded,
}

struct ActivePlayback {
    generation: u64,
    handle: PlaybackHandle,
}

/// Speech playback controller
pub struct Speaker {
    synthesizer: Arc<dyn Synthesizer>,
    output: Arc<dyn AudioOutput>,
    max_chars: usize,
    generation: AtomicU64,
    current: Mutex<Option<ActivePlayback>>,
}

impl Speaker {
    /// Create a speaker over a synthesizer and an output device
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            synthesizer,
            output,
            max_chars: DEFAULT_MAX_SPEECH_CHARS,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Override the character cap applied before synthesis
    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Speak `text`, preempting whatever is playing
    ///
    /// Returns once playback has started; use [`Self::settled`] to wait for it
    /// to end.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisFailed`/`RateLimited`, `DecodeFailed` or
    /// `PlaybackFailed`. No handle is left live on error.
    pub async fn speak(&self, text: &str) -> Result<SpeakOutcome> {
        let generation = self.begin();
        self.speak_as(generation, text).await
    }

    /// Claim a generation for new speech and stop the live playback
    ///
    /// A later `begin`, `speak` or `stop` invalidates the claim.
    pub fn begin(&self) -> u64 {
        self.preempt().0
    }

    /// Speak `text` under a generation claimed with [`Self::begin`]
    ///
    /// Returns `Superseded` without synthesizing if the claim is already stale.
    ///
    /// # Errors
    ///
    /// Same as [`Self::speak`]
    pub async fn speak_as(&self, generation: u64, text: &str) -> Result<SpeakOutcome> {
        if self.is_stale(generation) {
            return Ok(SpeakOutcome::Superseded);
        }

        let spoken = sanitize_for_speech(text, self.max_chars);
        if spoken.is_empty() {
            tracing::debug!("nothing speakable, skipping synthesis");
            return Ok(SpeakOutcome::Skipped);
        }

        tracing::debug!(generation, chars = spoken.chars().count(), "speaking");

        let bytes = self.synthesizer.synthesize(&spoken).await.map_err(|e| {
            tracing::warn!(generation, error = %e, "synthesis failed");
            e
        })?;

        if self.is_stale(generation) {
            tracing::debug!(generation, "discarding superseded synthesis");
            return Ok(SpeakOutcome::Superseded);
        }

        let audio = decode_audio(&bytes)?;
        let handle = self.output.play(audio).await?;

        let mut slot = self.slot();
        if self.is_stale(generation) {
            tracing::debug!(generation, "stopping superseded playback");
            handle.stop();
            return Ok(SpeakOutcome::Superseded);
        }
        let previous = slot.replace(ActivePlayback { generation, handle });
        drop(slot);
        drop(previous);

        Ok(SpeakOutcome::Started)
    }

    /// Stop the live playback and invalidate in-flight synthesis
    ///
    /// Returns whether a playback was stopped.
    pub fn stop(&self) -> bool {
        let (generation, stopped) = self.preempt();
        if stopped {
            tracing::debug!(generation, "playback stopped");
        }
        stopped
    }

    /// Whether a playback handle is live and still playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|active| active.handle.is_playing())
    }

    /// Wait for the live playback to end and release its handle
    ///
    /// Returns `None` if nothing is playing.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackFailed` if the device reported an error
    pub async fn settled(&self) -> Option<Result<PlaybackStatus>> {
        let (generation, status) = {
            let slot = self.slot();
            let active = slot.as_ref()?;
            (active.generation, active.handle.watch())
        };

        let status = wait_settled(status).await;

        let released = {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|a| a.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        drop(released);

        tracing::debug!(generation, ?status, "playback settled");

        Some(match status {
            PlaybackStatus::Failed(reason) => Err(Error::PlaybackFailed(reason)),
            other => Ok(other),
        })
    }

    /// Start a new generation and release the current handle
    fn preempt(&self) -> (u64, bool) {
        let (generation, previous) = {
            let mut slot = self.slot();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, slot.take())
        };
        let stopped = previous.is_some();
        drop(previous);
        (generation, stopped)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActivePlayback>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::voice::{DecodedAudio, PlaybackTicket, samples_to_wav};

    struct WavSynth;

    #[async_trait]
    impl Synthesizer for WavSynth {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            samples_to_wav(&[0.1; 160], 16000)
        }
    }

    #[derive(Default)]
    struct HeldOutput {
        tickets: Mutex<Vec<PlaybackTicket>>,
    }

    #[async_trait]
    impl AudioOutput for HeldOutput {
        async fn play(&self, _audio: DecodedAudio) -> Result<PlaybackHandle> {
            let (handle, ticket) = PlaybackHandle::pair();
            self.tickets.lock().unwrap().push(ticket);
            Ok(handle)
        }
    }

    /// Records the stop flags of earlier clips at each synthesis request
    struct OrderedSynth {
        output: Arc<HeldOutput>,
        seen: Mutex<Vec<Vec<bool>>>,
    }

    #[async_trait]
    impl Synthesizer for OrderedSynth {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            let flags = self
                .output
                .tickets
                .lock()
                .unwrap()
                .iter()
                .map(PlaybackTicket::is_stopped)
                .collect();
            self.seen.lock().unwrap().push(flags);
            WavSynth.synthesize(text).await
        }
    }

    #[tokio::test]
    async fn test_speak_preempts_previous_playback() {
        let output = Arc::new(HeldOutput::default());
        let synth = Arc::new(OrderedSynth {
            output: output.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let speaker = Speaker::new(synth.clone(), output.clone());

        assert_eq!(speaker.speak("first").await.unwrap(), SpeakOutcome::Started);
        assert_eq!(speaker.speak("second").await.unwrap(), SpeakOutcome::Started);

        // first clip was already stopped when the second request went out
        assert_eq!(*synth.seen.lock().unwrap(), vec![vec![], vec![true]]);

        let tickets = output.tickets.lock().unwrap();
        assert!(tickets[0].is_stopped());
        assert!(!tickets[1].is_stopped());
    }

    #[tokio::test]
    async fn test_settled_without_playback_is_none() {
        let speaker = Speaker::new(Arc::new(WavSynth), Arc::new(HeldOutput::default()));
        assert!(speaker.settled().await.is_none());
    }

    #[tokio::test]
    async fn test_markup_only_text_is_skipped() {
        let output = Arc::new(HeldOutput::default());
        let speaker = Speaker::new(Arc::new(WavSynth), output.clone());

        assert_eq!(speaker.speak("<br/>").await.unwrap(), SpeakOutcome::Skipped);
        assert!(output.tickets.lock().unwrap().is_empty());
    }
}
