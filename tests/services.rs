//! Service client integration tests
//!
//! Runs the speech-to-text, chat and text-to-speech clients against local
//! axum stub servers.

use axum::http::StatusCode;
use base64::Engine;
use secrecy::SecretString;
use tokio_test::{assert_err, assert_ok};

use misharaize::chat::{ChatClient, Completer, OpenAiChat};
use misharaize::voice::{
    AudioPayload, MISSING_TRANSCRIPT_PLACEHOLDER, SAMPLE_RATE, SpeechToText, Synthesizer,
    TextToSpeech, Transcriber, samples_to_wav,
};
use misharaize::{Error, ErrorKind, PersonalityMode, describe};

mod common;
use common::{client, recording_endpoint, stub_endpoint};

fn payload() -> AudioPayload {
    AudioPayload::from_samples(&[0.1; 800], SAMPLE_RATE).unwrap()
}

#[tokio::test]
async fn test_transcribe_sends_base64_audio() {
    let (url, seen) = recording_endpoint("/speech-to-text", r#"{"text":"hello there"}"#).await;
    let stt = SpeechToText::new(client(), url).unwrap();
    let payload = payload();

    let text = assert_ok!(stt.transcribe(&payload).await);

    assert_eq!(text, "hello there");
    let request = seen.lock().unwrap()[0].clone();
    let audio = request["audio"].as_str().unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(audio)
        .unwrap();
    assert_eq!(decoded, payload.bytes);
}

#[tokio::test]
async fn test_transcribe_missing_text_uses_placeholder() {
    let url = stub_endpoint("/speech-to-text", StatusCode::OK, "{}").await;
    let stt = SpeechToText::new(client(), url).unwrap();

    let text = stt.transcribe(&payload()).await.unwrap();
    assert_eq!(text, MISSING_TRANSCRIPT_PLACEHOLDER);
}

#[tokio::test]
async fn test_transcribe_empty_text_uses_placeholder() {
    let url = stub_endpoint("/speech-to-text", StatusCode::OK, r#"{"text":""}"#).await;
    let stt = SpeechToText::new(client(), url).unwrap();

    let text = stt.transcribe(&payload()).await.unwrap();
    assert_eq!(text, MISSING_TRANSCRIPT_PLACEHOLDER);
}

#[tokio::test]
async fn test_transcribe_failures() {
    let url = stub_endpoint(
        "/speech-to-text",
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error":"boom"}"#,
    )
    .await;
    let stt = SpeechToText::new(client(), url).unwrap();
    let err = assert_err!(stt.transcribe(&payload()).await);
    assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);

    let url = stub_endpoint("/speech-to-text", StatusCode::OK, "not json").await;
    let stt = SpeechToText::new(client(), url).unwrap();
    let err = assert_err!(stt.transcribe(&payload()).await);
    assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);
}

#[tokio::test]
async fn test_chat_sends_message_and_mode() {
    let (url, seen) = recording_endpoint("/chat-ai", r#"{"response":"hi there"}"#).await;
    let chat = ChatClient::new(client(), url).unwrap();

    let reply = chat
        .complete("hello", PersonalityMode::DarkHacker)
        .await
        .unwrap();

    assert_eq!(reply, "hi there");
    let request = seen.lock().unwrap()[0].clone();
    assert_eq!(request["message"], "hello");
    assert_eq!(request["personalityMode"], "dark-hacker");
}

#[tokio::test]
async fn test_chat_server_error_is_completion_failure() {
    let url = stub_endpoint(
        "/chat-ai",
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error",
    )
    .await;
    let chat = ChatClient::new(client(), url).unwrap();

    let err = assert_err!(chat.complete("hello", PersonalityMode::Default).await);
    assert!(matches!(err, Error::CompletionFailed(_)));
}

#[tokio::test]
async fn test_chat_missing_response_is_completion_failure() {
    let url = stub_endpoint("/chat-ai", StatusCode::OK, r#"{"reply":"wrong field"}"#).await;
    let chat = ChatClient::new(client(), url).unwrap();

    let err = assert_err!(chat.complete("hello", PersonalityMode::Default).await);
    assert_eq!(err.kind(), ErrorKind::CompletionFailed);
}

#[tokio::test]
async fn test_chat_unreachable_is_completion_failure() {
    let chat = ChatClient::new(client(), "http://127.0.0.1:1/chat-ai").unwrap();

    let err = assert_err!(chat.complete("hello", PersonalityMode::Default).await);
    assert_eq!(err.kind(), ErrorKind::CompletionFailed);
}

#[test]
fn test_blank_urls_rejected() {
    assert!(matches!(
        ChatClient::new(client(), "  "),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        TextToSpeech::new(client(), ""),
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_synthesize_decodes_audio_content() {
    let wav = samples_to_wav(&[0.2; 400], 24000).unwrap();
    let body = format!(
        r#"{{"audioContent":"{}"}}"#,
        base64::engine::general_purpose::STANDARD.encode(&wav)
    );
    let (url, seen) = recording_endpoint("/text-to-speech", body).await;
    let tts = TextToSpeech::new(client(), url).unwrap();

    let audio = tts.synthesize("Hello there").await.unwrap();

    assert_eq!(audio, wav);
    assert_eq!(seen.lock().unwrap()[0]["text"], "Hello there");
}

#[tokio::test]
async fn test_synthesize_rate_limited() {
    let url = stub_endpoint(
        "/text-to-speech",
        StatusCode::TOO_MANY_REQUESTS,
        r#"{"error":"Rate limit exceeded"}"#,
    )
    .await;
    let tts = TextToSpeech::new(client(), url).unwrap();

    let err = assert_err!(tts.synthesize("hello").await);
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(err.kind().is_synthesis());
}

#[tokio::test]
async fn test_synthesize_payload_errors() {
    let url = stub_endpoint("/text-to-speech", StatusCode::OK, "{}").await;
    let tts = TextToSpeech::new(client(), url).unwrap();
    let err = assert_err!(tts.synthesize("hello").await);
    assert_eq!(err.kind(), ErrorKind::SynthesisFailed);

    let url = stub_endpoint(
        "/text-to-speech",
        StatusCode::OK,
        r#"{"audioContent":"***not base64***"}"#,
    )
    .await;
    let tts = TextToSpeech::new(client(), url).unwrap();
    let err = assert_err!(tts.synthesize("hello").await);
    assert_eq!(err.kind(), ErrorKind::DecodeFailed);

    let url = stub_endpoint("/text-to-speech", StatusCode::BAD_GATEWAY, "upstream").await;
    let tts = TextToSpeech::new(client(), url).unwrap();
    let err = assert_err!(tts.synthesize("hello").await);
    assert_eq!(err.kind(), ErrorKind::SynthesisFailed);
}

#[tokio::test]
async fn test_openai_applies_personality_prompt() {
    let (url, seen) = recording_endpoint(
        "/v1/chat/completions",
        r#"{"choices":[{"message":{"role":"assistant","content":"Bonjour!"}}]}"#,
    )
    .await;
    let chat = OpenAiChat::new(
        client(),
        url,
        SecretString::from("sk-test"),
        "gpt-4o-mini",
    )
    .unwrap();

    let reply = chat
        .complete("teach me", PersonalityMode::Teacher)
        .await
        .unwrap();

    assert_eq!(reply, "Bonjour!");
    let request = seen.lock().unwrap()[0].clone();
    assert_eq!(request["model"], "gpt-4o-mini");
    assert_eq!(request["max_tokens"], 500);
    assert_eq!(request["messages"][0]["role"], "system");
    assert_eq!(
        request["messages"][0]["content"],
        describe(PersonalityMode::Teacher).completion_prompt()
    );
    assert_eq!(request["messages"][1]["content"], "teach me");
}

#[tokio::test]
async fn test_openai_empty_choices_is_completion_failure() {
    let url = stub_endpoint("/v1/chat/completions", StatusCode::OK, r#"{"choices":[]}"#).await;
    let chat = OpenAiChat::new(client(), url, SecretString::from("sk-test"), "m").unwrap();

    let err = assert_err!(chat.complete("hi", PersonalityMode::Default).await);
    assert_eq!(err.kind(), ErrorKind::CompletionFailed);
}

#[test]
fn test_openai_requires_key() {
    let result = OpenAiChat::new(
        client(),
        "http://127.0.0.1:1/v1/chat/completions",
        SecretString::from("   "),
        "m",
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
