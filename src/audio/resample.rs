//! Sample-rate conversion.
//!
//! Models run at their native rates (EnCodec 24kHz, AudioGen 16kHz) while
//! responses are always 32kHz, so audio is converted at both edges.

use rubato::{FftFixedIn, Resampler};

use crate::error::{ApiError, Result};

/// Input frames per resampler call.
const CHUNK: usize = 1024;

/// Sub-chunks used by the FFT resampler.
const SUB_CHUNKS: usize = 2;

/// Resamples mono audio from `from_rate` to `to_rate`.
///
/// The output has `round(len * to_rate / from_rate)` samples with the
/// resampler delay removed.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(ApiError::internal(format!(
            "Cannot resample between {}Hz and {}Hz",
            from_rate, to_rate
        )));
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| ApiError::internal(format!("Failed to create resampler: {}", e)))?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected + delay + CHUNK);

    let mut chunks = samples.chunks_exact(CHUNK);
    for chunk in &mut chunks {
        let block = [chunk];
        let frames = resampler
            .process(&block[..], None)
            .map_err(|e| ApiError::internal(format!("Resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);
    }

    let rest = chunks.remainder();
    if !rest.is_empty() {
        let block = [rest];
        let frames = resampler
            .process_partial(Some(&block[..]), None)
            .map_err(|e| ApiError::internal(format!("Resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);
    }

    // Flush the delay line
    while out.len() < expected + delay {
        let frames = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(|e| ApiError::internal(format!("Resampling failed: {}", e)))?;
        if frames[0].is_empty() {
            break;
        }
        out.extend_from_slice(&frames[0]);
    }

    let end = (delay + expected).min(out.len());
    let start = delay.min(end);
    Ok(out[start..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let samples = vec![0.1, -0.2, 0.3];
        assert_eq!(resample(&samples, 32000, 32000).unwrap(), samples);
    }

    #[test]
    fn upsampling_doubles_length() {
        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&samples, 16000, 32000).unwrap();
        assert_eq!(out.len(), 32000);
    }

    #[test]
    fn downsampling_keeps_duration() {
        let samples = vec![0.0f32; 32000 + 123];
        let out = resample(&samples, 32000, 24000).unwrap();
        assert_eq!(out.len(), ((32123.0f64) * 0.75).round() as usize);
    }

    #[test]
    fn preserves_low_frequency_tone() {
        let tone: Vec<f32> = (0..24000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 24000.0).sin() * 0.5)
            .collect();
        let out = resample(&tone, 24000, 32000).unwrap();
        let peak = out[4000..28000].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak was {}", peak);
    }
}
