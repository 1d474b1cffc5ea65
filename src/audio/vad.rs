//! Speech segmentation over a continuous 16 kHz stream
//!
//! Turns the sample stream into discrete segments bounded by
//! voice-activity edges: a run of consecutive voiced frames starts a
//! segment (with a short pre-roll so the onset isn't clipped), a run of
//! silent frames ends it. A segment ceiling force-ends overly long
//! segments; whatever was captured up to that point is still delivered.

use std::collections::VecDeque;

use webrtc_vad::{SampleRate, Vad, VadMode};

use super::wav::{pcm16_from_f32, WIRE_SAMPLE_RATE};

/// WebRTC VAD supports only 10/20/30 ms frames. Use 30 ms to reduce overhead.
pub const FRAME_MS: usize = 30;

/// Samples per VAD frame at the wire rate.
pub const FRAME_LEN: usize = (WIRE_SAMPLE_RATE as usize * FRAME_MS) / 1000;

/// Frame-level classifier seam. The production detector wraps webrtc-vad;
/// tests script their own.
pub trait VoiceDetector {
    fn is_speech(&mut self, frame: &[i16]) -> bool;
}

/// webrtc-vad in aggressive mode, tuned against false positives on
/// non-speech noise.
pub struct WebRtcDetector {
    vad: Vad,
}

impl WebRtcDetector {
    pub fn new() -> Self {
        Self {
            vad: Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, VadMode::Aggressive),
        }
    }
}

impl Default for WebRtcDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceDetector for WebRtcDetector {
    fn is_speech(&mut self, frame: &[i16]) -> bool {
        self.vad.is_voice_segment(frame).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Consecutive voiced frames required to open a segment.
    pub start_frames: usize,
    /// Consecutive silent frames required to close a segment.
    pub end_silence_frames: usize,
    /// Ceiling on a single segment; reaching it force-ends the segment.
    pub max_segment_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            start_frames: 2,
            end_silence_frames: 10,
            max_segment_ms: 10_000,
        }
    }
}

/// Edge events reported by the segmenter.
#[derive(Debug)]
pub enum SegmentEvent {
    Started,
    Ended(Vec<f32>),
}

/// Stateful speech segmenter. Feed it 16 kHz mono samples in arbitrary
/// batch sizes; it buffers partial frames internally.
pub struct SpeechSegmenter {
    detector: Box<dyn VoiceDetector>,
    config: SegmenterConfig,
    max_segment_samples: usize,
    /// Partial-frame accumulator
    pending: Vec<f32>,
    /// Recent frames kept while idle so a segment start includes its onset
    preroll: VecDeque<Vec<f32>>,
    segment: Vec<f32>,
    in_speech: bool,
    speech_run: usize,
    silence_run: usize,
}

impl SpeechSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self::with_detector(config, Box::new(WebRtcDetector::new()))
    }

    pub fn with_detector(config: SegmenterConfig, detector: Box<dyn VoiceDetector>) -> Self {
        let max_segment_samples =
            (WIRE_SAMPLE_RATE as u64 * config.max_segment_ms / 1000) as usize;
        Self {
            detector,
            config,
            max_segment_samples,
            pending: Vec::with_capacity(FRAME_LEN),
            preroll: VecDeque::new(),
            segment: Vec::new(),
            in_speech: false,
            speech_run: 0,
            silence_run: 0,
        }
    }

    /// Whether a segment is currently open.
    pub fn is_active(&self) -> bool {
        self.in_speech
    }

    /// Push a batch of samples, returning any edge events it produced.
    pub fn push(&mut self, samples: &[f32]) -> Vec<SegmentEvent> {
        let mut events = Vec::new();
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= FRAME_LEN {
            let frame: Vec<f32> = self.pending.drain(..FRAME_LEN).collect();
            self.process_frame(frame, &mut events);
        }

        events
    }

    /// Force-end the current segment, if any. Used on explicit stop;
    /// captured audio is not rolled back.
    pub fn flush(&mut self) -> Option<Vec<f32>> {
        self.preroll.clear();
        if self.in_speech {
            let pending = std::mem::take(&mut self.pending);
            self.segment.extend(pending);
            Some(self.take_segment())
        } else {
            self.pending.clear();
            None
        }
    }

    fn process_frame(&mut self, frame: Vec<f32>, events: &mut Vec<SegmentEvent>) {
        let pcm: Vec<i16> = frame.iter().map(|&s| pcm16_from_f32(s)).collect();
        let voiced = self.detector.is_speech(&pcm);

        if self.in_speech {
            self.segment.extend_from_slice(&frame);

            if voiced {
                self.silence_run = 0;
            } else {
                self.silence_run += 1;
                if self.silence_run >= self.config.end_silence_frames {
                    events.push(SegmentEvent::Ended(self.take_segment()));
                    return;
                }
            }

            if self.segment.len() >= self.max_segment_samples {
                events.push(SegmentEvent::Ended(self.take_segment()));
            }
        } else {
            self.preroll.push_back(frame);
            while self.preroll.len() > self.config.start_frames {
                self.preroll.pop_front();
            }

            if voiced {
                self.speech_run += 1;
            } else {
                self.speech_run = 0;
            }

            if self.speech_run >= self.config.start_frames {
                self.in_speech = true;
                self.silence_run = 0;
                self.segment = self.preroll.drain(..).flatten().collect();
                events.push(SegmentEvent::Started);
            }
        }
    }

    fn take_segment(&mut self) -> Vec<f32> {
        self.in_speech = false;
        self.speech_run = 0;
        self.silence_run = 0;
        std::mem::take(&mut self.segment)
    }
}
