//! Microphone capture using CPAL
//!
//! Opens the default input device once and forwards raw sample batches,
//! converted to f32, over a bounded channel. Downmixing and resampling to
//! the 16 kHz mono wire rate happen on the consumer side so the audio
//! callback stays cheap; a full channel drops the batch rather than block
//! the audio thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors that can occur while acquiring or running the capture device.
#[derive(Debug, Clone)]
pub enum AudioError {
    NoInputDevice,
    NoSupportedConfig,
    StreamCreationFailed(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoInputDevice => write!(f, "No audio input device found"),
            AudioError::NoSupportedConfig => write!(f, "No supported audio configuration"),
            AudioError::StreamCreationFailed(e) => {
                write!(f, "Failed to create audio stream: {}", e)
            }
        }
    }
}

impl std::error::Error for AudioError {}

/// Handle to a running input stream.
/// Dropping it stops the callbacks and closes the sample channel.
pub struct CaptureStream {
    _stream: Stream,
    active: Arc<AtomicBool>,
}

impl CaptureStream {
    /// Stop forwarding samples. The stream itself is released on drop.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// The default input device, acquired once and reused across segments.
pub struct Microphone {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl Microphone {
    /// Acquire the default input device and its native configuration.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        info!("Using audio input device: {:?}", device.name());

        let supported_config = device
            .default_input_config()
            .map_err(|_| AudioError::NoSupportedConfig)?;

        info!(
            "Audio config: {} Hz, {} channels, {:?}",
            supported_config.sample_rate().0,
            supported_config.channels(),
            supported_config.sample_format()
        );

        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    /// Native sample rate of the device.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Native channel count of the device (interleaved frames).
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Start capturing into the given channel.
    pub fn start(&self, tx: mpsc::Sender<Vec<f32>>) -> Result<CaptureStream, AudioError> {
        let active = Arc::new(AtomicBool::new(true));

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(tx, active.clone())?,
            SampleFormat::I16 => self.build_stream_i16(tx, active.clone())?,
            SampleFormat::U16 => self.build_stream_u16(tx, active.clone())?,
            _ => return Err(AudioError::NoSupportedConfig),
        };

        stream.play().map_err(|e| {
            AudioError::StreamCreationFailed(format!("Failed to start stream: {}", e))
        })?;

        info!("Capture started");

        Ok(CaptureStream {
            _stream: stream,
            active,
        })
    }

    fn build_stream_f32(
        &self,
        tx: mpsc::Sender<Vec<f32>>,
        active: Arc<AtomicBool>,
    ) -> Result<Stream, AudioError> {
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    forward_batch(&tx, data.to_vec());
                },
                stream_err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))
    }

    fn build_stream_i16(
        &self,
        tx: mpsc::Sender<Vec<f32>>,
        active: Arc<AtomicBool>,
    ) -> Result<Stream, AudioError> {
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    let batch: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                    forward_batch(&tx, batch);
                },
                stream_err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))
    }

    fn build_stream_u16(
        &self,
        tx: mpsc::Sender<Vec<f32>>,
        active: Arc<AtomicBool>,
    ) -> Result<Stream, AudioError> {
        self.device
            .build_input_stream(
                &self.config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    if !active.load(Ordering::SeqCst) {
                        return;
                    }
                    let batch: Vec<f32> = data
                        .iter()
                        .map(|&s| (s as f32 - 32768.0) / 32768.0)
                        .collect();
                    forward_batch(&tx, batch);
                },
                stream_err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamCreationFailed(e.to_string()))
    }
}

fn stream_err_fn(err: cpal::StreamError) {
    warn!("Audio stream error: {}", err);
}

/// Hand a batch to the worker without blocking the audio thread.
fn forward_batch(tx: &mpsc::Sender<Vec<f32>>, batch: Vec<f32>) {
    match tx.try_send(batch) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Sample channel full, dropping batch");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

/// Average interleaved frames down to a single channel.
pub fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample to the target rate.
///
/// Integer ratios use averaging decimation; other ratios fall back to
/// nearest-index picking, which is rough but keeps the wire rate honest
/// for devices at 44.1 kHz.
pub fn resample_to(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == 0 || target_rate == 0 {
        warn!(
            "Invalid sample rate (source: {}, target: {}), returning original",
            source_rate, target_rate
        );
        return samples.to_vec();
    }

    if source_rate == target_rate {
        return samples.to_vec();
    }

    if source_rate % target_rate == 0 {
        let ratio = (source_rate / target_rate) as usize;
        return samples
            .chunks(ratio)
            .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
            .collect();
    }

    let out_len = (samples.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    (0..out_len)
        .map(|i| {
            let idx = (i as u64 * source_rate as u64 / target_rate as u64) as usize;
            samples[idx.min(samples.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let interleaved = vec![0.2, 0.4, 0.6, 0.8];
        let mono = downmix_mono(&interleaved, 2);

        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(downmix_mono(&samples, 1), samples);
    }

    #[test]
    fn test_resample_3x_decimation() {
        // 48 kHz -> 16 kHz averages each triple
        let input = vec![0.0, 0.3, 0.6, 0.9, 0.9, 0.9];
        let output = resample_to(&input, 48_000, 16_000);

        assert_eq!(output.len(), 2);
        assert!((output[0] - 0.3).abs() < 1e-6);
        assert!((output[1] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_resample_same_rate() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_to(&input, 16_000, 16_000), input);
    }

    #[test]
    fn test_resample_non_integer_ratio() {
        // 44.1 kHz -> 16 kHz: length shrinks proportionally
        let input = vec![0.5f32; 441];
        let output = resample_to(&input, 44_100, 16_000);

        assert_eq!(output.len(), 160);
        assert!(output.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_resample_zero_rate_returns_original() {
        let input = vec![0.1, 0.2];
        assert_eq!(resample_to(&input, 0, 16_000), input);
        assert_eq!(resample_to(&input, 48_000, 0), input);
    }
}
