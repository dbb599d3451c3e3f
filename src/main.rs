use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use misharaize::chat::completer_from_config;
use misharaize::http::build_client;
use misharaize::interaction::NotificationLevel;
use misharaize::voice::{
    AudioOutput, AudioPayload, CpalMicrophone, CpalSpeaker, DecodedAudio, PLAYBACK_SAMPLE_RATE,
    Recorder, SpeakOutcome, Speaker, SpeechToText, TextToSpeech, Transcriber, decode_audio,
};
use misharaize::{
    Config, Interaction, Message, Notification, PersonalityMode, Phase, Sender, Services,
    SpeechUpdate, describe,
};

/// MISHARAIZE - Talk or type to a personality-switchable AI assistant
#[derive(Parser)]
#[command(name = "misharaize", version, about)]
struct Cli {
    /// Personality mode (default, romantic, teacher, dark-hacker, comedic)
    #[arg(short, long, env = "MISHARAIZE_MODE", global = true)]
    mode: Option<String>,

    /// Speak assistant replies (overrides config)
    #[arg(long, global = true)]
    voice: Option<bool>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,
    /// List personality modes
    Modes,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Speak text through the text-to-speech service
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Transcribe a WAV file through the speech-to-text service
    Transcribe {
        /// Path to a WAV file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,misharaize=info",
        1 => "info,misharaize=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(mode) = cli.mode.as_deref() {
        config.mode = PersonalityMode::from_str(mode);
    }
    if let Some(voice) = cli.voice {
        config.voice.output_enabled = voice;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(config).await,
        Command::Modes => {
            list_modes(config.mode);
            Ok(())
        }
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::Say { text } => say(&config, &text).await,
        Command::Transcribe { path } => transcribe(&config, &path).await,
    }
}

fn build_services(config: &Config) -> anyhow::Result<Services> {
    let client = build_client(config.services.request_timeout)?;

    let transcriber = SpeechToText::new(client.clone(), config.services.stt_url.clone())?;
    let synthesizer = TextToSpeech::new(client.clone(), config.services.tts_url.clone())?;
    let completer = completer_from_config(config, client)?;

    Ok(Services {
        recorder: Recorder::new(Arc::new(CpalMicrophone::new()), config.voice.capture.clone()),
        transcriber: Arc::new(transcriber),
        completer,
        speaker: Speaker::new(Arc::new(synthesizer), Arc::new(CpalSpeaker::new()))
            .with_max_chars(config.voice.max_chars),
    })
}

enum Event {
    Line(Option<String>),
    Notice(Notification),
    Speech(SpeechUpdate),
}

/// Interactive chat loop
async fn chat(config: Config) -> anyhow::Result<()> {
    let services = build_services(&config)?;
    let (mut interaction, mut notifications) =
        Interaction::new(services, config.mode, config.voice.output_enabled);

    tracing::info!(
        mode = %config.mode,
        backend = %config.chat.backend,
        voice_output = config.voice.output_enabled,
        "starting chat"
    );

    let personality = describe(interaction.mode());
    println!("{} - {}", personality.display_name, personality.description);
    println!("Type a message, or /help for commands.\n");

    if let Some(greeting) = interaction.initialize() {
        print_message(&interaction, &greeting);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line?),
            Some(notice) = notifications.recv() => Event::Notice(notice),
            update = interaction.speech_update() => Event::Speech(update),
        };

        match event {
            Event::Line(None) => break,
            Event::Line(Some(line)) => {
                // keep printing progress notices while the command runs
                let handled = handle_line(&mut interaction, line.trim());
                tokio::pin!(handled);
                let keep_going = loop {
                    tokio::select! {
                        keep_going = &mut handled => break keep_going,
                        Some(notice) = notifications.recv() => print_notification(&notice),
                    }
                };
                if !keep_going {
                    break;
                }
            }
            Event::Notice(notice) => print_notification(&notice),
            Event::Speech(update) => tracing::debug!(?update, "speech update"),
        }
    }

    interaction.cancel_recording();
    Ok(())
}

/// Handle one line of input; returns false to quit
async fn handle_line(interaction: &mut Interaction, line: &str) -> bool {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit" | "/exit", _) => return false,
        ("/help", _) => print_help(),
        ("/mic", _) => {
            interaction.toggle_mic().await;
            if interaction.phase() == Phase::Idle && !interaction.pending_input().is_empty() {
                println!("(press enter to send, or type to replace)");
            }
        }
        ("/voice", _) => {
            interaction.toggle_voice_output();
        }
        ("/mode", name) if !name.trim().is_empty() => {
            let mode = PersonalityMode::from_str(name);
            interaction.select_mode(mode);
            println!("Switched to {}", describe(mode).display_name);
        }
        ("/modes" | "/mode", _) => list_modes(interaction.mode()),
        ("/reset", _) => {
            if let Some(greeting) = interaction.reset() {
                print_message(interaction, &greeting);
            }
        }
        ("", _) => {
            if let Some(reply) = interaction.send().await {
                print_message(interaction, &reply);
            }
        }
        _ => {
            if let Some(hint) = interaction.state().input_blocked_hint() {
                println!("({hint})");
                return true;
            }
            if let Some(reply) = interaction.send_text(line).await {
                print_message(interaction, &reply);
            }
        }
    }
    true
}

fn print_help() {
    println!("Commands:");
    println!("  /mic          start or stop recording");
    println!("  /voice        toggle spoken replies");
    println!("  /mode <name>  switch personality");
    println!("  /modes        list personalities");
    println!("  /reset        start a new conversation");
    println!("  /quit         exit");
}

fn print_message(interaction: &Interaction, message: &Message) {
    let who = match message.sender() {
        Sender::User => "You",
        Sender::Assistant => describe(interaction.mode()).display_name,
    };
    println!("[{}] {who}: {}", message.time_label(), message.text());
}

fn print_notification(notice: &Notification) {
    match notice.level {
        NotificationLevel::Info => println!("* {}: {}", notice.title, notice.description),
        NotificationLevel::Error => eprintln!("! {}: {}", notice.title, notice.description),
    }
}

fn list_modes(active: PersonalityMode) {
    for mode in PersonalityMode::ALL {
        let personality = describe(mode);
        let marker = if mode == active { "*" } else { " " };
        println!(
            "{marker} {:<12} {} - {}",
            mode.as_str(),
            personality.display_name,
            personality.description
        );
    }
}

/// Test microphone input
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let recorder = Recorder::new(Arc::new(CpalMicrophone::new()), config.voice.capture.clone());
    let mut session = recorder.start_capture().await?;

    println!("Sample rate: {} Hz", session.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let start = session.samples().len();
        session.collect();
        let window = &session.samples()[start..];
        let energy = calculate_rms(window);
        let peak = window.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    let payload = recorder.stop_capture(session)?;

    println!("\n---");
    println!(
        "Captured {:.1}s of audio ({} bytes).",
        payload.duration().as_secs_f32(),
        payload.bytes.len()
    );
    println!("If RMS stayed near 0, check that your mic is plugged in and not muted.");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..PLAYBACK_SAMPLE_RATE * 2)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let handle = CpalSpeaker::new()
        .play(DecodedAudio {
            samples,
            sample_rate: PLAYBACK_SAMPLE_RATE,
        })
        .await?;
    let status = handle.settled().await;

    println!("Playback {status:?}. If you heard the tone, your speaker is working!");
    Ok(())
}

/// Speak text through the text-to-speech service
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let client = build_client(config.services.request_timeout)?;
    let synthesizer = TextToSpeech::new(client, config.services.tts_url.clone())?;
    let speaker = Speaker::new(Arc::new(synthesizer), Arc::new(CpalSpeaker::new()))
        .with_max_chars(config.voice.max_chars);

    match speaker.speak(text).await? {
        SpeakOutcome::Started => {
            if let Some(result) = speaker.settled().await {
                result?;
            }
        }
        SpeakOutcome::Skipped => println!("Nothing to say after cleanup."),
        SpeakOutcome::Superseded => {}
    }
    Ok(())
}

/// Transcribe a WAV file through the speech-to-text service
async fn transcribe(config: &Config, path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let decoded = decode_audio(&bytes)?;
    let payload = AudioPayload::from_samples(&decoded.samples, decoded.sample_rate)?;

    tracing::info!(
        path = %path.display(),
        seconds = payload.duration().as_secs_f32(),
        "transcribing file"
    );

    let client = build_client(config.services.request_timeout)?;
    let text = SpeechToText::new(client, config.services.stt_url.clone())?
        .transcribe(&payload)
        .await?;

    println!("{text}");
    Ok(())
}
