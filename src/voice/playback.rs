//! Audio playback to speakers

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use tokio::sync::{oneshot, watch};

use crate::{Error, Result};

/// Sample rate for playback when a clip does not carry one (common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often the playback thread checks for completion or stop
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle of one playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Finished,
    Stopped,
    Failed(String),
}

impl PlaybackStatus {
    /// Whether playback has ended one way or another
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Playing)
    }
}

/// Caller side of a playback: stop it or wait for it
///
/// Dropping the handle stops playback.
#[derive(Debug)]
pub struct PlaybackHandle {
    stop: Arc<AtomicBool>,
    status: watch::Receiver<PlaybackStatus>,
}

/// Device side of a playback: observe stop requests, report the outcome
///
/// Dropping the ticket without reporting marks playback finished (or stopped).
#[derive(Debug)]
pub struct PlaybackTicket {
    stop: Arc<AtomicBool>,
    status: watch::Sender<PlaybackStatus>,
}

impl PlaybackHandle {
    /// Create a linked handle and ticket
    #[must_use]
    pub fn pair() -> (Self, PlaybackTicket) {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(PlaybackStatus::Playing);
        (
            Self {
                stop: Arc::clone(&stop),
                status: rx,
            },
            PlaybackTicket { stop, status: tx },
        )
    }

    /// Ask the device to stop
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    /// Whether audio is still playing
    #[must_use]
    pub fn is_playing(&self) -> bool {
        !self.status.borrow().is_settled()
    }

    /// A receiver that can wait for this playback without borrowing the handle
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Wait until playback ends
    pub async fn settled(&self) -> PlaybackStatus {
        wait_settled(self.watch()).await
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Wait on a status receiver until playback ends
pub async fn wait_settled(mut status: watch::Receiver<PlaybackStatus>) -> PlaybackStatus {
    match status.wait_for(PlaybackStatus::is_settled).await {
        Ok(settled) => settled.clone(),
        Err(_) => PlaybackStatus::Stopped,
    }
}

impl PlaybackTicket {
    /// Whether the caller asked to stop
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Report normal completion
    pub fn finish(self) {
        drop(self);
    }

    /// Report a playback failure
    pub fn fail(self, reason: impl Into<String>) {
        self.status.send_replace(PlaybackStatus::Failed(reason.into()));
    }
}

impl Drop for PlaybackTicket {
    fn drop(&mut self) {
        if *self.status.borrow() == PlaybackStatus::Playing {
            let outcome = if self.is_stopped() {
                PlaybackStatus::Stopped
            } else {
                PlaybackStatus::Finished
            };
            self.status.send_replace(outcome);
        }
    }
}

/// Decoded mono audio ready for output
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// An output device that plays one clip at a time
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Begin playing `audio`, returning once output has started
    ///
    /// # Errors
    ///
    /// Returns `PlaybackFailed` if the device rejects playback
    async fn play(&self, audio: DecodedAudio) -> Result<PlaybackHandle>;
}

/// Plays audio to the default output device via cpal
///
/// Each clip plays on its own thread because cpal streams are not `Send`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalSpeaker;

impl CpalSpeaker {
    /// Create a new cpal-backed speaker
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioOutput for CpalSpeaker {
    async fn play(&self, audio: DecodedAudio) -> Result<PlaybackHandle> {
        let (handle, ticket) = PlaybackHandle::pair();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("misharaize-playback".to_string())
            .spawn(move || run_playback(audio, ticket, ready_tx))?;

        ready_rx
            .await
            .map_err(|_| Error::PlaybackFailed("playback thread exited".to_string()))??;

        Ok(handle)
    }
}

/// Thread body: open the device, play until done or stopped, report outcome
fn run_playback(audio: DecodedAudio, ticket: PlaybackTicket, ready: oneshot::Sender<Result<()>>) {
    let duration = audio.duration();
    let sample_count = audio.samples.len();
    let samples = Arc::new(audio.samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let device_error = Arc::new(Mutex::new(None::<String>));

    let stream = match open_output_stream(
        audio.sample_rate,
        Arc::clone(&samples),
        Arc::clone(&position),
        Arc::clone(&finished),
        Arc::clone(&device_error),
    ) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            ticket.fail(e.to_string());
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Poll for completion with timeout
    let start = Instant::now();
    let timeout = duration + Duration::from_millis(500);

    while !finished.load(Ordering::SeqCst) && !ticket.is_stopped() {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    drop(stream);

    let failure = device_error.lock().ok().and_then(|mut e| e.take());
    if let Some(reason) = failure {
        tracing::error!(error = %reason, "audio playback error");
        ticket.fail(reason);
    } else {
        tracing::debug!(
            samples = sample_count,
            played = position.load(Ordering::SeqCst),
            stopped = ticket.is_stopped(),
            "playback complete"
        );
        ticket.finish();
    }
}

/// Open an output stream that plays `samples` from `position`
fn open_output_stream(
    sample_rate: u32,
    samples: Arc<Vec<f32>>,
    position: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    device_error: Arc<Mutex<Option<String>>>,
) -> Result<Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::PlaybackFailed("no output device available".to_string()))?;

    let rate = SampleRate(sample_rate);
    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::PlaybackFailed(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
        .ok_or_else(|| Error::PlaybackFailed("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio playback initialized"
    );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let pos = position.load(Ordering::Relaxed);
                    let sample = if let Some(&s) = samples.get(pos) {
                        position.store(pos + 1, Ordering::Relaxed);
                        s
                    } else {
                        finished.store(true, Ordering::SeqCst);
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            move |err| {
                if let Ok(mut slot) = device_error.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| Error::PlaybackFailed(e.to_string()))?;

    stream
        .play()
        .map_err(|e| Error::PlaybackFailed(e.to_string()))?;

    Ok(stream)
}

/// Decode synthesized speech (MP3, or WAV when the payload is RIFF/WAVE)
///
/// # Errors
///
/// Returns `DecodeFailed` if the payload is malformed or holds no audio
pub fn decode_audio(bytes: &[u8]) -> Result<DecodedAudio> {
    let audio = if is_wav(bytes) {
        decode_wav(bytes)?
    } else {
        decode_mp3(bytes)?
    };

    if audio.samples.is_empty() {
        return Err(Error::DecodeFailed("payload contains no audio frames".to_string()));
    }

    Ok(audio)
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode WAV bytes to mono f32 samples
#[allow(clippy::cast_precision_loss)]
fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::DecodeFailed(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::DecodeFailed(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::DecodeFailed(format!("WAV decode error: {e}")))?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate.is_none() {
                    sample_rate = u32::try_from(frame.sample_rate).ok();
                }

                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::DecodeFailed(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.unwrap_or(PLAYBACK_SAMPLE_RATE),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::samples_to_wav;

    #[test]
    fn test_decode_wav_payload() {
        let wav = samples_to_wav(&[0.0, 0.5, -0.5, 0.25], 22050).unwrap();
        let audio = decode_audio(&wav).unwrap();

        assert_eq!(audio.sample_rate, 22050);
        assert_eq!(audio.samples.len(), 4);
        assert!((audio.samples[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_audio(b"definitely not audio").unwrap_err();
        assert!(matches!(err, Error::DecodeFailed(_)));
    }

    #[test]
    fn test_decode_rejects_empty_wav() {
        let wav = samples_to_wav(&[], 16000).unwrap();
        assert!(matches!(decode_audio(&wav), Err(Error::DecodeFailed(_))));
    }

    #[tokio::test]
    async fn test_ticket_reports_finished() {
        let (handle, ticket) = PlaybackHandle::pair();
        assert!(handle.is_playing());

        ticket.finish();
        assert_eq!(handle.settled().await, PlaybackStatus::Finished);
    }

    #[tokio::test]
    async fn test_stopped_handle_settles_as_stopped() {
        let (handle, ticket) = PlaybackHandle::pair();
        handle.stop();
        assert!(ticket.is_stopped());

        drop(ticket);
        assert_eq!(handle.settled().await, PlaybackStatus::Stopped);
    }

    #[test]
    fn test_dropping_handle_requests_stop() {
        let (handle, ticket) = PlaybackHandle::pair();
        drop(handle);
        assert!(ticket.is_stopped());
    }

    #[tokio::test]
    async fn test_ticket_failure_is_reported() {
        let (handle, ticket) = PlaybackHandle::pair();
        ticket.fail("device lost");
        assert_eq!(
            handle.settled().await,
            PlaybackStatus::Failed("device lost".to_string())
        );
    }
}
