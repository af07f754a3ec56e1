//! Neural codec wrapper (EnCodec, MultiBandDiffusion).
//!
//! Codes cross the ONNX boundary as `[1, 1, K, T]` tensors and leave it as
//! `[codebook][frame]` matrices.

use std::path::Path;

use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::audio::Waveform;
use crate::error::{ApiError, Result};

use super::backend::{codes_shape, AudioCodec, Codes};
use super::session::{extract_f32, extract_i64, load_session, SessionOptions};

/// ONNX codec with an optional encoder.
pub struct OnnxCodec {
    name: &'static str,
    encoder: Option<Session>,
    decoder: Session,
    sample_rate: u32,
}

impl OnnxCodec {
    /// Loads EnCodec from `encodec_encode.onnx` and `encodec_decode.onnx`.
    pub fn load_encodec(model_dir: &Path, sample_rate: u32, options: SessionOptions) -> Result<Self> {
        let encoder = load_session(&model_dir.join("encodec_encode.onnx"), options)?;
        let decoder = load_session(&model_dir.join("encodec_decode.onnx"), options)?;
        Ok(Self {
            name: "encodec",
            encoder: Some(encoder),
            decoder,
            sample_rate,
        })
    }

    /// Loads the decode-only MultiBandDiffusion graph `multiband_decode.onnx`.
    pub fn load_multiband(
        model_dir: &Path,
        sample_rate: u32,
        options: SessionOptions,
    ) -> Result<Self> {
        let decoder = load_session(&model_dir.join("multiband_decode.onnx"), options)?;
        Ok(Self {
            name: "multiband",
            encoder: None,
            decoder,
            sample_rate,
        })
    }

    /// Loads the decoder bundled with a generator (`encodec_decode.onnx`).
    pub fn load_decoder(model_dir: &Path, sample_rate: u32, options: SessionOptions) -> Result<Self> {
        let decoder = load_session(&model_dir.join("encodec_decode.onnx"), options)?;
        Ok(Self {
            name: "encodec",
            encoder: None,
            decoder,
            sample_rate,
        })
    }
}

impl AudioCodec for OnnxCodec {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn encode(&mut self, waveform: &Waveform) -> Result<Codes> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| ApiError::unsupported(self.name, "encoding"))?;

        let samples = waveform.clone().resampled(self.sample_rate)?.samples;
        if samples.is_empty() {
            return Err(ApiError::invalid_audio("no samples to encode"));
        }

        let len = samples.len();
        let input = Tensor::from_array(([1usize, 1, len], samples)).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create audio tensor: {}", e))
        })?;

        let mut outputs = encoder.run(ort::inputs![input]).map_err(|e| {
            ApiError::model_inference_failed(format!("Encoder inference failed: {}", e))
        })?;

        let audio_codes: DynValue = outputs
            .remove("audio_codes")
            .ok_or_else(|| ApiError::model_inference_failed("audio_codes not found in output"))?;

        let (shape, data) = extract_i64(&audio_codes)?;
        codes_from_tensor(&shape, &data)
    }

    fn decode(&mut self, codes: &Codes) -> Result<Waveform> {
        let (codebooks, frames) = codes_shape(codes)?;
        let flat = flatten_codes(codes);

        let input = Tensor::from_array(([1usize, 1, codebooks, frames], flat)).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create code tensor: {}", e))
        })?;

        let mut outputs = self.decoder.run(ort::inputs![input]).map_err(|e| {
            ApiError::model_inference_failed(format!("Audio codec inference failed: {}", e))
        })?;

        let audio_values: DynValue = outputs
            .remove("audio_values")
            .ok_or_else(|| ApiError::model_inference_failed("audio_values not found in output"))?;

        let (_shape, samples) = extract_f32(&audio_values)?;
        Ok(Waveform::new(samples, self.sample_rate))
    }
}

/// Row-major copy of a code matrix.
pub fn flatten_codes(codes: &Codes) -> Vec<i64> {
    codes.iter().flatten().copied().collect()
}

/// Reads `[.., K, T]` codes of the first batch item into `[K][T]`.
pub fn codes_from_tensor(shape: &[usize], data: &[i64]) -> Result<Codes> {
    if shape.len() < 2 {
        return Err(ApiError::model_inference_failed(format!(
            "Expected codes with at least 2 dimensions, got {:?}",
            shape
        )));
    }
    let codebooks = shape[shape.len() - 2];
    let frames = shape[shape.len() - 1];
    if codebooks == 0 || frames == 0 || data.len() < codebooks * frames {
        return Err(ApiError::model_inference_failed(format!(
            "Code tensor {:?} holds no frames",
            shape
        )));
    }
    Ok(data[..codebooks * frames]
        .chunks_exact(frames)
        .map(<[i64]>::to_vec)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_is_codebook_major() {
        let codes = vec![vec![1, 5], vec![2, 6], vec![3, 7], vec![4, 8]];
        assert_eq!(flatten_codes(&codes), vec![1, 5, 2, 6, 3, 7, 4, 8]);
    }

    #[test]
    fn codes_from_4d_tensor() {
        let data: Vec<i64> = (0..8).collect();
        let codes = codes_from_tensor(&[1, 1, 2, 4], &data).unwrap();
        assert_eq!(codes, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn codes_from_tensor_keeps_first_batch_item() {
        let data: Vec<i64> = (0..12).collect();
        let codes = codes_from_tensor(&[2, 2, 3], &data).unwrap();
        assert_eq!(codes, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn codes_from_tensor_rejects_empty() {
        assert!(codes_from_tensor(&[1, 1, 4, 0], &[]).is_err());
        assert!(codes_from_tensor(&[4], &[1, 2, 3, 4]).is_err());
    }
}
