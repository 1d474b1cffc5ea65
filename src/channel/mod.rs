//! Duplex channel to the transcription backend
//!
//! Audio segments travel as JSON text frames carrying one base64 WAV
//! container each; transcriptions and backend errors come back the same
//! way. The session owns the socket lifecycle, including the fixed-delay
//! reconnect loop.
//!
//! # Architecture
//!
//! ```text
//! CaptureSession ──try_send──▶ ChannelSession ◀──ws──▶ backend
//!                                  │
//!                                  ▼
//!                        mpsc<InboundMessage>
//! ```

mod protocol;
mod session;

pub use protocol::{AudioEnvelope, InboundMessage};
pub use session::{
    reduce, ChannelConfig, ChannelHandle, ChannelSession, ChannelState, LifecycleAction,
    LifecycleEvent, RECONNECT_DELAY,
};
