//! Chat conversation state: message history, voice selection, and the
//! request flow against the backend.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::api::{ApiError, BackendClient, SourceNode, Voice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub nodes: Vec<SourceNode>,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(sender: Sender, text: String, nodes: Vec<SourceNode>) -> Self {
        Self {
            sender,
            text,
            nodes,
            at: Utc::now(),
        }
    }
}

/// A chat conversation with the backend, including the voice used to
/// speak assistant replies.
pub struct ChatSession {
    client: BackendClient,
    messages: Vec<ChatMessage>,
    voices: Vec<Voice>,
    selected_voice: Option<String>,
}

impl ChatSession {
    pub fn new(client: BackendClient) -> Self {
        Self {
            client,
            messages: Vec::new(),
            voices: Vec::new(),
            selected_voice: None,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn selected_voice(&self) -> Option<&str> {
        self.selected_voice.as_deref()
    }

    /// Fetch the voice catalog and default to the first entry.
    pub async fn load_voices(&mut self) -> Result<(), ApiError> {
        let voices = self.client.voices().await?;
        self.set_voices(voices);
        Ok(())
    }

    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        self.selected_voice = voices.first().map(|v| v.voice_id.clone());
        if let Some(id) = &self.selected_voice {
            info!("Default voice: {}", id);
        }
        self.voices = voices;
    }

    /// Select a voice by id. Returns false when the id is not in the catalog.
    pub fn select_voice(&mut self, voice_id: &str) -> bool {
        if self.voices.iter().any(|v| v.voice_id == voice_id) {
            self.selected_voice = Some(voice_id.to_string());
            true
        } else {
            warn!("Unknown voice id: {}", voice_id);
            false
        }
    }

    /// Send a user message and record both sides of the exchange.
    /// Returns the assistant's reply.
    pub async fn ask(&mut self, text: &str) -> Result<ChatMessage, ApiError> {
        self.messages
            .push(ChatMessage::new(Sender::User, text.to_string(), Vec::new()));

        let response = self.client.query(text).await?;
        let reply = ChatMessage::new(Sender::Assistant, response.response, response.nodes);
        self.messages.push(reply.clone());
        Ok(reply)
    }

    /// Synthesize speech for the most recent assistant message.
    /// Returns the audio URL, or None when there is nothing to speak
    /// or no voice is selected.
    pub async fn speak_last(&self) -> Result<Option<String>, ApiError> {
        let Some(voice_id) = self.selected_voice.as_deref() else {
            return Ok(None);
        };
        let Some(last) = self
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Assistant)
        else {
            return Ok(None);
        };
        if last.text.is_empty() {
            return Ok(None);
        }

        let url = self.client.generate_voice(&last.text, voice_id).await?;
        Ok(Some(url))
    }
}
