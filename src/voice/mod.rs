//! Voice processing module
//!
//! Handles microphone capture, speech-to-text, text-to-speech and playback.

mod capture;
mod playback;
mod speaker;
mod stt;
mod tts;

pub use capture::{
    AudioPayload, CaptureOptions, CpalMicrophone, DeviceLease, Microphone, PAYLOAD_MIME,
    Recorder, RecordingSession, SAMPLE_RATE, samples_to_wav,
};
pub use playback::{
    AudioOutput, CpalSpeaker, DecodedAudio, PLAYBACK_SAMPLE_RATE, PlaybackHandle, PlaybackStatus,
    PlaybackTicket, decode_audio, wait_settled,
};
pub use speaker::{SpeakOutcome, Speaker};
pub use stt::{MISSING_TRANSCRIPT_PLACEHOLDER, SpeechToText, Transcriber};
pub use tts::{
    DEFAULT_MAX_SPEECH_CHARS, Synthesizer, TRUNCATION_MARKER, TextToSpeech, sanitize_for_speech,
};
