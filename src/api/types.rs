//! Request/response bodies for the backend REST endpoints

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Answer to a text query, optionally with the source passages the
/// backend retrieved for it.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub nodes: Vec<SourceNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceNode {
    pub text: String,
}

/// One entry of the voice catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateVoiceRequest {
    pub text: String,
    #[serde(rename = "voiceId")]
    pub voice_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateVoiceResponse {
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
}

/// Error body returned by the voice endpoints on non-OK statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_serialization() {
        let body = QueryRequest {
            query: "what is this?".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"query":"what is this?"}"#);
    }

    #[test]
    fn test_query_response_with_nodes() {
        let json = r#"{
            "response": "An answer.",
            "nodes": [{"text": "passage one"}, {"text": "passage two"}]
        }"#;

        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.response, "An answer.");
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.nodes[0].text, "passage one");
    }

    #[test]
    fn test_query_response_nodes_default_empty() {
        let parsed: QueryResponse = serde_json::from_str(r#"{"response": "ok"}"#).unwrap();
        assert!(parsed.nodes.is_empty());
    }

    #[test]
    fn test_voice_deserialization() {
        let json = r#"[{"voice_id": "v1", "name": "Ada"}, {"voice_id": "v2", "name": "Ben"}]"#;
        let voices: Vec<Voice> = serde_json::from_str(json).unwrap();
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].voice_id, "v1");
        assert_eq!(voices[1].name, "Ben");
    }

    #[test]
    fn test_generate_voice_request_field_names() {
        let body = GenerateVoiceRequest {
            text: "hello".to_string(),
            voice_id: "v1".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"voiceId\":\"v1\""));
    }

    #[test]
    fn test_generate_voice_response_field_names() {
        let parsed: GenerateVoiceResponse =
            serde_json::from_str(r#"{"audioUrl": "/output/voice.mp3"}"#).unwrap();
        assert_eq!(parsed.audio_url, "/output/voice.mp3");
    }
}
