//! Audio capture from microphone
//!
//! [`Recorder`] owns the capture lifecycle: it acquires the microphone through
//! a [`Microphone`] implementation, accumulates the chunks the device delivers
//! and packages them into a single WAV [`AudioPayload`] when stopped. The
//! device is held through a [`DeviceLease`] which releases it on stop, on
//! cancel and on drop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, SupportedStreamConfigRange};
use tokio::sync::{mpsc, oneshot};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// MIME type of encoded capture payloads
pub const PAYLOAD_MIME: &str = "audio/wav";

/// Capture parameters passed to the microphone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Requested sample rate in Hz
    pub sample_rate: u32,

    /// Ask the host for echo cancellation
    pub echo_cancellation: bool,

    /// Ask the host for noise suppression
    pub noise_suppression: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Exclusive hold on a capture device
///
/// Releasing runs the device-specific release action exactly once.
pub struct DeviceLease {
    sample_rate: u32,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DeviceLease {
    /// Create a lease that runs `release` when the device is given back
    pub fn new(sample_rate: u32, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            sample_rate,
            release: Some(Box::new(release)),
        }
    }

    /// Sample rate the device actually delivers
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether the device has been released
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.release.is_none()
    }

    /// Give the device back; later calls are no-ops
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            tracing::debug!("capture device released");
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for DeviceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLease")
            .field("sample_rate", &self.sample_rate)
            .field("released", &self.is_released())
            .finish()
    }
}

/// A capture device that streams mono f32 chunks
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the device and start delivering chunks on `chunks`
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if access is refused, `DeviceUnavailable`
    /// if no compatible device or format exists
    async fn acquire(
        &self,
        options: &CaptureOptions,
        chunks: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<DeviceLease>;
}

/// An in-progress capture
#[derive(Debug)]
pub struct RecordingSession {
    lease: DeviceLease,
    chunks: mpsc::UnboundedReceiver<Vec<f32>>,
    buffer: Vec<f32>,
    chunk_count: usize,
    started_at: Instant,
}

impl RecordingSession {
    /// Move any delivered chunks into the buffer, returning how many arrived
    pub fn collect(&mut self) -> usize {
        let mut received = 0;
        while let Ok(chunk) = self.chunks.try_recv() {
            if chunk.is_empty() {
                continue;
            }
            self.buffer.extend_from_slice(&chunk);
            received += 1;
        }
        self.chunk_count += received;
        received
    }

    /// Samples accumulated so far (call [`Self::collect`] first for fresh data)
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.buffer
    }

    /// Number of non-empty chunks received
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Whether the device is still held
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        !self.lease.is_released()
    }

    /// Sample rate of the captured audio
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.lease.sample_rate()
    }

    /// Time since capture started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Release the device and discard everything captured
    pub fn cancel(mut self) {
        self.lease.release();
        tracing::debug!(chunks = self.chunk_count, "capture cancelled");
    }
}

/// Finalized capture, ready for transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    /// Encoded audio bytes
    pub bytes: Vec<u8>,

    /// MIME type of `bytes`
    pub mime_type: &'static str,

    /// Sample rate of the encoded audio
    pub sample_rate: u32,

    /// Number of mono samples encoded
    pub sample_count: usize,
}

impl AudioPayload {
    /// Encode mono samples as a WAV payload
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self> {
        Ok(Self {
            bytes: samples_to_wav(samples, sample_rate)?,
            mime_type: PAYLOAD_MIME,
            sample_rate,
            sample_count: samples.len(),
        })
    }

    /// Playback length of the payload
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count as f64 / f64::from(self.sample_rate))
    }
}

/// Recording controller
pub struct Recorder {
    microphone: Arc<dyn Microphone>,
    options: CaptureOptions,
}

impl Recorder {
    /// Create a recorder over a microphone
    #[must_use]
    pub fn new(microphone: Arc<dyn Microphone>, options: CaptureOptions) -> Self {
        Self {
            microphone,
            options,
        }
    }

    /// Capture options in use
    #[must_use]
    pub const fn options(&self) -> &CaptureOptions {
        &self.options
    }

    /// Acquire the microphone and begin accumulating audio
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` or `DeviceUnavailable` from the device
    pub async fn start_capture(&self) -> Result<RecordingSession> {
        let (tx, rx) = mpsc::unbounded_channel();

        let lease = self
            .microphone
            .acquire(&self.options, tx)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to acquire microphone");
                e
            })?;

        tracing::debug!(
            sample_rate = lease.sample_rate(),
            echo_cancellation = self.options.echo_cancellation,
            noise_suppression = self.options.noise_suppression,
            "audio capture started"
        );

        Ok(RecordingSession {
            lease,
            chunks: rx,
            buffer: Vec::new(),
            chunk_count: 0,
            started_at: Instant::now(),
        })
    }

    /// Release the microphone and package everything captured
    ///
    /// # Errors
    ///
    /// Returns `EmptyRecording` if no samples arrived, or an audio error if
    /// encoding fails. The device is released in every case.
    pub fn stop_capture(&self, mut session: RecordingSession) -> Result<AudioPayload> {
        session.lease.release();
        session.collect();

        let elapsed = session.elapsed();
        let sample_rate = session.sample_rate();
        let samples = std::mem::take(&mut session.buffer);

        tracing::debug!(
            chunks = session.chunk_count,
            samples = samples.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "audio capture stopped"
        );

        if samples.is_empty() {
            return Err(Error::EmptyRecording);
        }

        AudioPayload::from_samples(&samples, sample_rate)
    }
}

/// Captures audio from the default input device via cpal
///
/// The stream lives on a dedicated thread because cpal streams are not `Send`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    /// Create a new cpal-backed microphone
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn acquire(
        &self,
        options: &CaptureOptions,
        chunks: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<DeviceLease> {
        let (ready_tx, ready_rx) = oneshot::channel::<Result<u32>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let options = options.clone();

        let handle = std::thread::Builder::new()
            .name("misharaize-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream(&options, chunks) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Blocks until the lease drops its sender
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| Error::DeviceUnavailable("capture thread exited".to_string()))??;

        Ok(DeviceLease::new(sample_rate, move || {
            drop(stop_tx);
            if handle.join().is_err() {
                tracing::error!("capture thread panicked");
            }
        }))
    }
}

/// Open and start an input stream that forwards mono chunks
fn open_input_stream(
    options: &CaptureOptions,
    chunks: mpsc::UnboundedSender<Vec<f32>>,
) -> Result<(Stream, u32)> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::DeviceUnavailable("no input device available".to_string()))?;

    let supported: Vec<SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| match e {
            cpal::SupportedStreamConfigsError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
            other => Error::DeviceUnavailable(other.to_string()),
        })?
        .collect();

    let rate = SampleRate(options.sample_rate);
    let fits = |c: &&SupportedStreamConfigRange| {
        c.sample_format() == SampleFormat::F32
            && c.min_sample_rate() <= rate
            && c.max_sample_rate() >= rate
    };

    // Prefer mono, fall back to any channel count and downmix
    let chosen = supported
        .iter()
        .filter(fits)
        .find(|c| c.channels() == 1)
        .or_else(|| supported.iter().find(fits))
        .cloned()
        .ok_or_else(|| Error::DeviceUnavailable("no suitable audio config found".to_string()))?;

    let config = chosen.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    if options.echo_cancellation || options.noise_suppression {
        tracing::debug!("voice processing hints are not exposed by the audio host, capturing raw input");
    }

    tracing::debug!(
        device = %device.name().unwrap_or_default(),
        sample_rate = options.sample_rate,
        channels,
        "audio capture initialized"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = if channels == 1 {
                    data.to_vec()
                } else {
                    downmix(data, channels)
                };
                let _ = chunks.send(mono);
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable
            | cpal::BuildStreamError::StreamConfigNotSupported => {
                Error::DeviceUnavailable(e.to_string())
            }
            cpal::BuildStreamError::BackendSpecific { err } => {
                classify_backend_error(&err.description)
            }
            other => Error::Audio(other.to_string()),
        })?;

    stream.play().map_err(|e| match e {
        cpal::PlayStreamError::BackendSpecific { err } => classify_backend_error(&err.description),
        other => Error::DeviceUnavailable(other.to_string()),
    })?;

    Ok((stream, options.sample_rate))
}

/// Map a host-specific error message to a capture error
fn classify_backend_error(description: &str) -> Error {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        Error::PermissionDenied(description.to_string())
    } else {
        Error::DeviceUnavailable(description.to_string())
    }
}

/// Average interleaved frames down to mono
#[allow(clippy::cast_precision_loss)]
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_backend_error() {
        assert!(matches!(
            classify_backend_error("Access denied by user"),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_backend_error("ALSA function 'snd_pcm_open' failed"),
            Error::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn test_downmix_averages_frames() {
        let stereo = [0.5, -0.5, 1.0, 0.0];
        assert_eq!(downmix(&stereo, 2), vec![0.0, 0.5]);
    }

    #[test]
    fn test_lease_releases_once() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut lease = DeviceLease::new(SAMPLE_RATE, move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        lease.release();
        lease.release();
        drop(lease);

        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_payload_duration() {
        let payload = AudioPayload::from_samples(&vec![0.0; 8000], SAMPLE_RATE).unwrap();
        assert_eq!(payload.mime_type, "audio/wav");
        assert_eq!(payload.duration(), Duration::from_millis(500));
    }
}
