//! Capture session: microphone to channel
//!
//! Bridges the CPAL callback (sync) to the duplex channel. Samples flow
//! through a bounded channel into a blocking worker that downmixes,
//! resamples to the wire rate, and segments on voice-activity edges.
//! Each finished segment is framed and handed to the channel
//! synchronously; every failure along the way is logged and swallowed so
//! the session stays ready for the next segment.
//!
//! # Architecture
//!
//! ```text
//! Audio Thread (sync)            Blocking worker
//! ┌────────────────┐            ┌─────────────────────────┐
//! │ CPAL callback  │──channel──▶│ downmix / resample      │
//! │ try_send(f32)  │            │  ├─ SpeechSegmenter     │
//! └────────────────┘            │  └─ encode + try_send   │
//!                               └─────────────────────────┘
//! ```

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{AudioEnvelope, ChannelHandle};

use super::capture::{downmix_mono, resample_to, AudioError, CaptureStream, Microphone};
use super::vad::{SegmentEvent, SegmenterConfig, SpeechSegmenter};
use super::wav::{encode_wav, WIRE_SAMPLE_RATE};

/// Batches in flight between the audio callback and the worker.
const SAMPLE_QUEUE: usize = 64;

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Request speaker identification on every segment.
    pub diarization: bool,
    pub segmenter: SegmenterConfig,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            diarization: false,
            segmenter: SegmenterConfig::default(),
        }
    }
}

/// A running capture session. Holds the device stream; not `Send`, so it
/// lives with whoever started it.
pub struct CaptureSession {
    stream: CaptureStream,
    worker: tokio::task::JoinHandle<()>,
}

impl CaptureSession {
    /// Acquire the microphone and start segmenting. Device acquisition
    /// happens once here; failure leaves capture off and is the caller's
    /// to report.
    pub fn start(options: CaptureOptions, channel: ChannelHandle) -> Result<Self, AudioError> {
        let microphone = Microphone::open()?;
        let source_rate = microphone.sample_rate();
        let channels = microphone.channels();

        let (tx, mut rx) = mpsc::channel::<Vec<f32>>(SAMPLE_QUEUE);
        let stream = microphone.start(tx)?;

        let segmenter_config = options.segmenter.clone();
        let diarization = options.diarization;

        let worker = tokio::task::spawn_blocking(move || {
            let mut segmenter = SpeechSegmenter::new(segmenter_config);
            let mut segment_id = Uuid::nil();

            while let Some(batch) = rx.blocking_recv() {
                let mono = downmix_mono(&batch, channels);
                let resampled = resample_to(&mono, source_rate, WIRE_SAMPLE_RATE);

                for event in segmenter.push(&resampled) {
                    match event {
                        SegmentEvent::Started => {
                            segment_id = Uuid::new_v4();
                            info!("Speech started (segment {})", segment_id);
                        }
                        SegmentEvent::Ended(samples) => {
                            dispatch_segment(segment_id, &samples, diarization, &channel);
                        }
                    }
                }
            }

            // Capture stopped mid-segment: what was recorded still ships.
            if let Some(samples) = segmenter.flush() {
                dispatch_segment(segment_id, &samples, diarization, &channel);
            }

            debug!("Capture worker exiting");
        });

        Ok(Self { stream, worker })
    }

    /// Stop capturing. The worker drains buffered batches, flushes any
    /// open segment, and exits.
    pub async fn stop(self) {
        self.stream.stop();
        drop(self.stream);
        if let Err(e) = self.worker.await {
            debug!("Capture worker ended abnormally: {}", e);
        }
    }
}

/// Frame one finished segment and hand it to the channel. Failures are
/// logged; the segment is dropped and the session carries on.
fn dispatch_segment(id: Uuid, samples: &[f32], diarization: bool, channel: &ChannelHandle) {
    info!(
        "Speech ended (segment {}, {} samples, {:.2}s)",
        id,
        samples.len(),
        samples.len() as f32 / WIRE_SAMPLE_RATE as f32
    );

    let container = match encode_wav(samples) {
        Ok(container) => container,
        Err(e) => {
            warn!("Dropping segment {}: {}", id, e);
            return;
        }
    };

    let envelope = AudioEnvelope::from_wav(&container, diarization.then_some(true));
    if !channel.try_send(envelope) {
        warn!("Segment {} dropped: channel not open", id);
    }
}
