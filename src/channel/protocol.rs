//! Message types for the transcription channel
//!
//! The backend accepts JSON text frames carrying one base64-encoded WAV
//! container each, and replies with self-contained JSON frames holding
//! either a transcription or an error. There is no batching, no message
//! acknowledgement, and no correlation id scheme.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// One outbound audio segment: exactly one WAV container per envelope.
#[derive(Debug, Clone, Serialize)]
pub struct AudioEnvelope {
    /// Base64-encoded WAV container bytes
    #[serde(rename = "audioChunk")]
    pub audio_chunk: String,

    /// Speaker-identification toggle; omitted from the frame when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diarization: Option<bool>,
}

impl AudioEnvelope {
    /// Wrap a WAV container for transmission.
    pub fn from_wav(container: &[u8], diarization: Option<bool>) -> Self {
        Self {
            audio_chunk: STANDARD.encode(container),
            diarization,
        }
    }

    /// Serialize to the JSON text frame sent over the channel.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode the container bytes back out of the envelope.
    pub fn decode_wav(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.audio_chunk)
    }
}

/// Frames received from the backend.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum InboundMessage {
    /// A transcription for one previously sent segment
    Transcription { transcription: String },
    /// A backend-reported failure; surfaced to the caller, does not
    /// change the channel state
    Error { error: String },
}

impl InboundMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, InboundMessage::Error { .. })
    }

    pub fn transcription(&self) -> Option<&str> {
        match self {
            InboundMessage::Transcription { transcription } => Some(transcription),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let envelope = AudioEnvelope::from_wav(b"RIFFdata", Some(true));
        let json = envelope.to_json().unwrap();

        assert!(json.contains("\"audioChunk\":"));
        assert!(json.contains("\"diarization\":true"));
    }

    #[test]
    fn test_diarization_omitted_when_unset() {
        let envelope = AudioEnvelope::from_wav(b"RIFFdata", None);
        let json = envelope.to_json().unwrap();

        assert!(!json.contains("diarization"));
    }

    #[test]
    fn test_base64_round_trip() {
        let container: Vec<u8> = (0u8..=255).collect();
        let envelope = AudioEnvelope::from_wav(&container, None);

        assert_eq!(envelope.decode_wav().unwrap(), container);
    }

    #[test]
    fn test_inbound_transcription_deserialization() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"transcription": "hello there"}"#).unwrap();

        assert_eq!(msg.transcription(), Some("hello there"));
        assert!(!msg.is_error());
    }

    #[test]
    fn test_inbound_error_deserialization() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"error": "model not loaded"}"#).unwrap();

        assert!(msg.is_error());
        assert_eq!(msg.transcription(), None);
    }

    #[test]
    fn test_unknown_frame_is_parse_error() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"status": "ok"}"#);
        assert!(result.is_err());
    }
}
