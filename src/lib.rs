//! MISHARAIZE - Voice and text chat with a personality-switchable assistant
//!
//! This library provides the core functionality for the MISHARAIZE client:
//! - Microphone capture and speech-to-text
//! - Conversation sessions against a chat-completion backend
//! - Text-to-speech with exclusive playback
//! - A personality catalog that shapes greetings and system prompts
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Front-end                         │
//! │        REPL  │  mic toggle  │  voice toggle          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Interaction Orchestrator               │
//! │   Recorder  │  Conversation  │  Speaker  │  Notices  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Hosted functions                     │
//! │   speech-to-text  │  chat-ai  │  text-to-speech      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod interaction;
pub mod personality;
pub mod voice;

pub use chat::{Completer, Conversation, Message, Sender};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use interaction::{Interaction, InteractionState, Notification, Phase, Services, SpeechUpdate};
pub use personality::{Personality, PersonalityMode, describe};
