//! Audio capture, speech segmentation, and wire framing

mod capture;
mod session;
mod vad;
mod wav;

pub use capture::{downmix_mono, resample_to, AudioError, CaptureStream, Microphone};
pub use session::{CaptureOptions, CaptureSession};
pub use vad::{SegmentEvent, SegmenterConfig, SpeechSegmenter, VoiceDetector};
pub use wav::{encode_wav, pcm16_from_f32, WireError, WAV_HEADER_LEN, WIRE_SAMPLE_RATE};
