//! WAV wire container for captured speech segments
//!
//! Encodes one finalized segment of f32 samples into an in-memory,
//! uncompressed WAV container: the canonical 44-byte RIFF/WAVE header
//! (PCM, mono, 16 kHz, 16-bit) followed by little-endian PCM16 samples.
//! The container is what goes over the channel, base64-wrapped.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Sample rate of the wire format. Capture resamples to this before encoding.
pub const WIRE_SAMPLE_RATE: u32 = 16_000;

/// Size of the RIFF/WAVE header for a single PCM data chunk.
pub const WAV_HEADER_LEN: usize = 44;

/// Errors that can occur while framing a segment.
#[derive(Debug, Clone)]
pub enum WireError {
    /// A sample was NaN or infinite. The whole buffer is rejected rather
    /// than substituting zero; shipping silently corrupted audio is worse
    /// than dropping the segment.
    NonFiniteSample { index: usize },
    /// The container writer failed (should not happen for in-memory output).
    Format(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::NonFiniteSample { index } => {
                write!(f, "Non-finite sample at index {}", index)
            }
            WireError::Format(e) => write!(f, "Failed to write WAV container: {}", e),
        }
    }
}

impl std::error::Error for WireError {}

/// Encode a finalized segment into a WAV container.
///
/// Output length is exactly `44 + 2 * samples.len()` bytes. An empty
/// segment yields a valid 44-byte header with a zero-length data chunk.
pub fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, WireError> {
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(WireError::NonFiniteSample { index });
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: WIRE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| WireError::Format(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(pcm16_from_f32(sample))
                .map_err(|e| WireError::Format(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| WireError::Format(e.to_string()))?;
    }

    Ok(bytes)
}

/// Clamp a float sample to [-1, 1] and scale to signed 16-bit PCM.
///
/// Negative values scale by 32768 and non-negative by 32767, so the full
/// integer range is reachable on both sides (-1.0 maps to -32768, 1.0 to
/// 32767). Callers must have screened out non-finite values.
pub fn pcm16_from_f32(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pcm16_conversion() {
        assert_eq!(pcm16_from_f32(0.0), 0);
        assert_eq!(pcm16_from_f32(1.0), 32767);
        assert_eq!(pcm16_from_f32(-1.0), -32768);
    }

    #[test]
    fn test_pcm16_clamps_out_of_range() {
        assert_eq!(pcm16_from_f32(1.5), pcm16_from_f32(1.0));
        assert_eq!(pcm16_from_f32(-1.5), pcm16_from_f32(-1.0));
    }

    #[test]
    fn test_container_length() {
        for n in [0usize, 1, 7, 160, 16_000] {
            let samples = vec![0.25f32; n];
            let bytes = encode_wav(&samples).unwrap();
            assert_eq!(bytes.len(), WAV_HEADER_LEN + 2 * n, "N = {}", n);
        }
    }

    #[test]
    fn test_empty_segment_is_valid_header() {
        let bytes = encode_wav(&[]).unwrap();
        assert_eq!(bytes.len(), WAV_HEADER_LEN);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // data chunk size field is the last header word
        assert_eq!(&bytes[40..44], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_header_fields_round_trip() {
        let bytes = encode_wav(&[0.1, -0.1, 0.5]).unwrap();
        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn test_data_chunk_size_matches_payload() {
        let samples = vec![0.5f32; 100];
        let bytes = encode_wav(&samples).unwrap();
        let declared = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
        assert_eq!(declared as usize, 2 * samples.len());
    }

    #[test]
    fn test_samples_written_little_endian() {
        let bytes = encode_wav(&[1.0, -1.0]).unwrap();
        // 32767 = 0x7FFF, -32768 = 0x8000
        assert_eq!(&bytes[44..46], &[0xFF, 0x7F]);
        assert_eq!(&bytes[46..48], &[0x00, 0x80]);
    }

    #[test]
    fn test_clamped_samples_encode_identically() {
        let saturated = encode_wav(&[1.5, -1.5]).unwrap();
        let bounded = encode_wav(&[1.0, -1.0]).unwrap();
        assert_eq!(saturated, bounded);
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = encode_wav(&[0.0, f32::NAN, 0.5]).unwrap_err();
        match err {
            WireError::NonFiniteSample { index } => assert_eq!(index, 1),
            other => panic!("Expected NonFiniteSample, got {:?}", other),
        }

        assert!(encode_wav(&[f32::INFINITY]).is_err());
        assert!(encode_wav(&[f32::NEG_INFINITY]).is_err());
    }
}
