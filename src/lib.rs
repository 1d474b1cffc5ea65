//! voxchat: a headless voice chat client.
//!
//! Microphone audio is segmented by voice activity, framed as WAV, and
//! streamed over a WebSocket to a transcription backend; transcriptions
//! come back on the same socket. Text queries go to a chat API over
//! HTTP, and replies can be spoken through a voice synthesis service.

pub mod api;
pub mod audio;
pub mod channel;
pub mod chat;
pub mod settings;
pub mod transcript;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::BackendClient;
use crate::audio::{CaptureOptions, CaptureSession, SegmenterConfig};
use crate::channel::{ChannelConfig, ChannelSession, InboundMessage};
use crate::chat::ChatSession;
use crate::transcript::TranscriptLog;

pub use settings::AppSettings;

/// Queue between the channel task and the main loop.
const INBOUND_QUEUE: usize = 64;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error when a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Run the client until stdin closes, `/quit`, or Ctrl-C.
pub async fn run(settings: AppSettings) -> Result<(), String> {
    info!("Starting voxchat");

    let client = BackendClient::new(&settings.api_base_url, &settings.voice_base_url);
    let mut chat = ChatSession::new(client);
    if let Err(e) = chat.load_voices().await {
        warn!("Could not load voices, speech disabled: {}", e);
    }

    let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let channel = ChannelSession::spawn(ChannelConfig::new(&settings.ws_url), inbound_tx);

    let capture_options = CaptureOptions {
        diarization: settings.diarization,
        segmenter: SegmenterConfig {
            start_frames: settings.vad_start_frames,
            end_silence_frames: settings.vad_end_silence_frames,
            max_segment_ms: settings.max_segment_ms,
        },
    };
    let capture = match CaptureSession::start(capture_options, channel.handle()) {
        Ok(capture) => Some(capture),
        Err(e) => {
            warn!("Microphone unavailable, capture disabled: {}", e);
            None
        }
    };

    let mut transcript = TranscriptLog::new();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut inbound_open = true;

    println!("voxchat ready. Speak, or type a message. Commands: /voices /voice <id> /transcript /history /quit");

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(line.trim(), &mut chat, &transcript).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Stdin closed");
                        break;
                    }
                    Err(e) => {
                        error!("Stdin error: {}", e);
                        break;
                    }
                }
            }
            message = inbound_rx.recv(), if inbound_open => {
                match message {
                    Some(InboundMessage::Transcription { transcription }) => {
                        transcript.append(&transcription);
                        println!("[you said] {}", transcription);
                    }
                    Some(InboundMessage::Error { error }) => {
                        transcript.record_error(&error);
                        eprintln!("[transcription error] {}", error);
                    }
                    None => inbound_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Some(capture) = capture {
        capture.stop().await;
    }
    channel.shutdown().await;
    info!("voxchat stopped");
    Ok(())
}

/// Process one line of input. Returns false when the loop should exit.
async fn handle_line(line: &str, chat: &mut ChatSession, transcript: &TranscriptLog) -> bool {
    match line {
        "" => true,
        "/quit" | "/exit" => false,
        "/voices" => {
            if chat.voices().is_empty() {
                println!("No voices available");
            }
            for voice in chat.voices() {
                let marker = if chat.selected_voice() == Some(voice.voice_id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}  {}", marker, voice.voice_id, voice.name);
            }
            true
        }
        "/transcript" => {
            println!("{}", transcript_view(transcript));
            true
        }
        "/history" => {
            println!("{}", history_view(chat));
            true
        }
        _ if line.starts_with("/voice ") => {
            let id = line["/voice ".len()..].trim();
            if chat.select_voice(id) {
                println!("Voice set to {}", id);
            } else {
                println!("Unknown voice: {}", id);
            }
            true
        }
        _ => {
            ask_and_speak(line, chat).await;
            true
        }
    }
}

/// The accumulated speech transcript, with the last transcription error
/// appended when one was reported.
fn transcript_view(transcript: &TranscriptLog) -> String {
    let mut out = if transcript.has_text() {
        transcript.text().to_string()
    } else {
        "(nothing transcribed yet)".to_string()
    };
    if let Some(error) = transcript.last_error() {
        out.push_str(&format!("\n[last transcription error] {}", error));
    }
    out
}

fn history_view(chat: &ChatSession) -> String {
    let mut out = String::new();
    for message in chat.messages() {
        let who = match message.sender {
            crate::chat::Sender::User => "you",
            crate::chat::Sender::Assistant => "assistant",
        };
        out.push_str(&format!("[{}] {}\n", who, message.text));
    }
    if out.is_empty() {
        out.push_str("(no messages yet)");
    }
    out
}

async fn ask_and_speak(text: &str, chat: &mut ChatSession) {
    let reply = match chat.ask(text).await {
        Ok(reply) => reply,
        Err(e) => {
            eprintln!("[query failed] {}", e);
            return;
        }
    };
    println!("[assistant] {}", reply.text);

    match chat.speak_last().await {
        Ok(Some(url)) => match chat.client().fetch_audio(&url).await {
            Ok(bytes) => info!("Fetched {} bytes of speech audio from {}", bytes.len(), url),
            Err(e) => warn!("Could not fetch speech audio: {}", e),
        },
        Ok(None) => {}
        Err(e) => warn!("Voice synthesis failed: {}", e),
    }
}
