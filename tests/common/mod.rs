//! Shared test utilities
//!
//! In-process fakes for the device and service seams, plus a tiny axum stub
//! server for exercising the HTTP clients.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::sync::{mpsc, watch};

use misharaize::chat::Completer;
use misharaize::interaction::{InteractionState, Services};
use misharaize::voice::{
    AudioOutput, AudioPayload, CaptureOptions, DecodedAudio, DeviceLease, Microphone,
    PlaybackHandle, PlaybackTicket, Recorder, Speaker, Synthesizer, Transcriber, samples_to_wav,
};
use misharaize::{Error, PersonalityMode, Result};

/// How a [`FakeMicrophone`] responds to `acquire`
#[derive(Clone)]
pub enum MicBehavior {
    /// Deliver these chunks immediately
    Chunks(Vec<Vec<f32>>),
    /// Host refuses access
    Deny,
    /// No device present
    Missing,
}

/// Microphone that counts acquisitions and releases
pub struct FakeMicrophone {
    behavior: MicBehavior,
    pub acquired: AtomicUsize,
    pub released: Arc<AtomicUsize>,
}

impl FakeMicrophone {
    pub fn new(behavior: MicBehavior) -> Self {
        Self {
            behavior,
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn speaking() -> Self {
        Self::new(MicBehavior::Chunks(vec![vec![0.2; 1600], vec![-0.2; 1600]]))
    }

    pub fn silent() -> Self {
        Self::new(MicBehavior::Chunks(Vec::new()))
    }

    pub fn releases(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn acquire(
        &self,
        options: &CaptureOptions,
        chunks: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<DeviceLease> {
        match &self.behavior {
            MicBehavior::Deny => Err(Error::PermissionDenied("denied by test".to_string())),
            MicBehavior::Missing => Err(Error::DeviceUnavailable("no input device".to_string())),
            MicBehavior::Chunks(scripted) => {
                self.acquired.fetch_add(1, Ordering::SeqCst);
                for chunk in scripted {
                    let _ = chunks.send(chunk.clone());
                }
                let released = Arc::clone(&self.released);
                Ok(DeviceLease::new(options.sample_rate, move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }))
            }
        }
    }
}

/// Transcriber returning a fixed result
pub struct FakeTranscriber {
    reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        assert!(!payload.bytes.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| Error::TranscriptionFailed("stub failure".to_string()))
    }
}

/// Completer that plays back a script of replies and records requests
#[derive(Default)]
pub struct FakeCompleter {
    replies: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<(String, PersonalityMode)>>,
}

impl FakeCompleter {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        let completer = Self::default();
        completer
            .replies
            .lock()
            .unwrap()
            .push_back(Err(Error::CompletionFailed("chat error 500".to_string())));
        completer
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Completer for FakeCompleter {
    async fn complete(&self, message: &str, mode: PersonalityMode) -> Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((message.to_string(), mode));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::CompletionFailed("script exhausted".to_string())))
    }
}

/// How a [`FakeSynthesizer`] responds
#[derive(Clone, Copy)]
pub enum SynthBehavior {
    Audio,
    RateLimited,
    Garbage,
}

/// Synthesizer that returns WAV audio and records what it saw
pub struct FakeSynthesizer {
    behavior: SynthBehavior,
    /// Texts that take this long to synthesize
    slow: Mutex<Vec<(String, Duration)>>,
    pub texts: Mutex<Vec<String>>,
    /// Whether the orchestrator reported speaking when synthesis was requested
    pub speaking_seen: Mutex<Vec<bool>>,
    /// Stop flags of earlier clips when each synthesis was requested
    pub stops_seen: Mutex<Vec<Vec<bool>>>,
    state: OnceLock<watch::Receiver<InteractionState>>,
    output: OnceLock<Arc<FakeOutput>>,
}

impl FakeSynthesizer {
    pub fn new(behavior: SynthBehavior) -> Self {
        Self {
            behavior,
            slow: Mutex::new(Vec::new()),
            texts: Mutex::new(Vec::new()),
            speaking_seen: Mutex::new(Vec::new()),
            stops_seen: Mutex::new(Vec::new()),
            state: OnceLock::new(),
            output: OnceLock::new(),
        }
    }

    /// Delay synthesis of `text`
    pub fn slow_for(self, text: &str, delay: Duration) -> Self {
        self.slow.lock().unwrap().push((text.to_string(), delay));
        self
    }

    /// Observe orchestrator state from inside `synthesize`
    pub fn observe(&self, state: watch::Receiver<InteractionState>) {
        let _ = self.state.set(state);
    }

    /// Observe the output device's clips from inside `synthesize`
    pub fn observe_output(&self, output: Arc<FakeOutput>) {
        let _ = self.output.set(output);
    }

    pub fn call_count(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.texts.lock().unwrap().push(text.to_string());
        if let Some(state) = self.state.get() {
            self.speaking_seen
                .lock()
                .unwrap()
                .push(state.borrow().is_speaking());
        }
        if let Some(output) = self.output.get() {
            self.stops_seen.lock().unwrap().push(output.stop_flags());
        }

        let delay = self
            .slow
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t == text)
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            SynthBehavior::Audio => samples_to_wav(&[0.1; 1600], 16000),
            SynthBehavior::RateLimited => Err(Error::RateLimited("Too Many Requests".to_string())),
            SynthBehavior::Garbage => Ok(b"definitely not audio".to_vec()),
        }
    }
}

/// Output device that hands each clip's ticket to the test
#[derive(Default)]
pub struct FakeOutput {
    pub tickets: Mutex<Vec<PlaybackTicket>>,
    pub clips: Mutex<Vec<DecodedAudio>>,
}

impl FakeOutput {
    pub fn play_count(&self) -> usize {
        self.clips.lock().unwrap().len()
    }

    /// Stop flag of every clip handed out so far
    pub fn stop_flags(&self) -> Vec<bool> {
        self.tickets
            .lock()
            .unwrap()
            .iter()
            .map(PlaybackTicket::is_stopped)
            .collect()
    }

    /// Whether the ticket of clip `index` was told to stop
    pub fn stopped(&self, index: usize) -> bool {
        self.tickets.lock().unwrap()[index].is_stopped()
    }

    /// Finish the most recent clip as if it played to the end
    pub fn finish_latest(&self) {
        if let Some(ticket) = self.tickets.lock().unwrap().pop() {
            ticket.finish();
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(&self, audio: DecodedAudio) -> Result<PlaybackHandle> {
        let (handle, ticket) = PlaybackHandle::pair();
        self.clips.lock().unwrap().push(audio);
        self.tickets.lock().unwrap().push(ticket);
        Ok(handle)
    }
}

/// The fakes behind one orchestrator
pub struct Rig {
    pub microphone: Arc<FakeMicrophone>,
    pub transcriber: Arc<FakeTranscriber>,
    pub completer: Arc<FakeCompleter>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub output: Arc<FakeOutput>,
}

impl Rig {
    pub fn new(completer: FakeCompleter) -> Self {
        Self {
            microphone: Arc::new(FakeMicrophone::speaking()),
            transcriber: Arc::new(FakeTranscriber::replying("what is rust")),
            completer: Arc::new(completer),
            synthesizer: Arc::new(FakeSynthesizer::new(SynthBehavior::Audio)),
            output: Arc::new(FakeOutput::default()),
        }
    }

    pub fn with_microphone(mut self, microphone: FakeMicrophone) -> Self {
        self.microphone = Arc::new(microphone);
        self
    }

    pub fn with_transcriber(mut self, transcriber: FakeTranscriber) -> Self {
        self.transcriber = Arc::new(transcriber);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: FakeSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    pub fn services(&self) -> Services {
        Services {
            recorder: Recorder::new(self.microphone.clone(), CaptureOptions::default()),
            transcriber: self.transcriber.clone(),
            completer: self.completer.clone(),
            speaker: Speaker::new(self.synthesizer.clone(), self.output.clone()),
        }
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub server");
    let addr = listener.local_addr().expect("stub server has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub server failed");
    });
    format!("http://{addr}")
}

/// Stub endpoint answering every POST to `path` with a fixed status and body
pub async fn stub_endpoint(path: &str, status: StatusCode, body: impl Into<String>) -> String {
    let body: String = body.into();
    let router = Router::new().route(
        path,
        post(move || {
            let body = body.clone();
            async move { (status, body) }
        }),
    );
    format!("{}{path}", serve(router).await)
}

/// Stub endpoint that records each JSON request body
pub async fn recording_endpoint(
    path: &str,
    body: impl Into<String>,
) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
    let body: String = body.into();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let router = Router::new().route(
        path,
        post(move |axum::Json(request): axum::Json<serde_json::Value>| {
            let sink = Arc::clone(&sink);
            let body = body.clone();
            async move {
                sink.lock().unwrap().push(request);
                (StatusCode::OK, body)
            }
        }),
    );
    (format!("{}{path}", serve(router).await), seen)
}

/// HTTP client for stub servers
pub fn client() -> reqwest::Client {
    misharaize::http::build_client(Duration::from_secs(5)).expect("failed to build client")
}
