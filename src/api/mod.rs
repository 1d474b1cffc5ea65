//! REST client for the chat backend and the voice service.

mod client;
mod types;

pub use client::BackendClient;
pub use types::{
    GenerateVoiceRequest, GenerateVoiceResponse, QueryRequest, QueryResponse, SourceNode, Voice,
};

/// Errors from the backend HTTP APIs.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// Transport-level failure: connect, timeout, DNS
    Network(String),
    /// Non-success status from the server, with its error body
    Api { status: u16, message: String },
    /// Response body did not match the expected shape
    Parse(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Api { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            ApiError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}
