//! Autoregressive token decoder with KV cache.
//!
//! Split architecture: `decoder_model.onnx` runs the first step and returns
//! the initial cache, `decoder_with_past_model.onnx` runs every following
//! step. The batch holds the conditional rows first and the unconditional
//! (zeroed text) rows second, one row per codebook in each half.

use std::borrow::Cow;
use std::path::Path;

use ort::session::{Session, SessionInputValue, SessionOutputs};
use ort::value::{DynValue, Tensor};
use rand::Rng;

use crate::error::{ApiError, Result};
use crate::types::ModelConfig;

use super::backend::{Codes, GenerationParams};
use super::delay_pattern::DelayPattern;
use super::logits::Logits;
use super::session::{load_session, SessionOptions};
use super::text_encoder::TextConditioning;

/// Decoder sessions plus the layout they were exported with.
pub struct Decoder {
    decoder_model: Session,
    decoder_with_past: Session,
    config: ModelConfig,
}

impl Decoder {
    /// Loads `decoder_model.onnx` and `decoder_with_past_model.onnx`.
    pub fn load(model_dir: &Path, config: ModelConfig, options: SessionOptions) -> Result<Self> {
        let decoder_model = load_session(&model_dir.join("decoder_model.onnx"), options)?;
        let decoder_with_past =
            load_session(&model_dir.join("decoder_with_past_model.onnx"), options)?;

        Ok(Self {
            decoder_model,
            decoder_with_past,
            config,
        })
    }

    /// Generates `frames` frames of codes for one prompt.
    ///
    /// Runs `frames + codebooks - 1` decoder steps so the delay pattern
    /// yields exactly `frames` aligned frames.
    pub fn generate(
        &mut self,
        conditioning: TextConditioning,
        frames: usize,
        params: &GenerationParams,
        rng: &mut impl Rng,
    ) -> Result<Codes> {
        let codebooks = self.config.codebooks as usize;
        let num_layers = self.config.num_hidden_layers as usize;
        let pad = self.config.pad_token_id;
        let batch = codebooks * 2;

        let mut pattern = DelayPattern::new(codebooks);
        let total_steps = pattern.steps_for_frames(frames.max(1));

        let encoder_hidden_states = duplicate_with_zeros(&conditioning.hidden_states)?;
        let encoder_attention_mask = duplicate_with_zeros(&conditioning.attention_mask)?;

        let input_ids = Tensor::from_array(([batch, 1], vec![pad; batch]))
            .map_err(|e| ApiError::model_inference_failed(format!("Failed to create input_ids: {}", e)))?;

        let first_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (
                Cow::from("encoder_attention_mask"),
                SessionInputValue::from(encoder_attention_mask.view()),
            ),
            (
                Cow::from("encoder_hidden_states"),
                SessionInputValue::from(encoder_hidden_states.view()),
            ),
            (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
        ];

        let mut outputs = self.decoder_model.run(first_inputs).map_err(|e| {
            ApiError::model_inference_failed(format!("Initial decoder inference failed: {}", e))
        })?;

        pattern.push(&sample_step(&mut outputs, params, rng)?);

        let mut kv_cache: Vec<(String, DynValue)> = Vec::with_capacity(num_layers * 4);
        for j in 0..num_layers {
            for part in ["decoder.key", "decoder.value", "encoder.key", "encoder.value"] {
                let value = take(&mut outputs, &format!("present.{j}.{part}"))?;
                kv_cache.push((format!("past_key_values.{j}.{part}"), value));
            }
        }
        drop(outputs);

        for step in 1..total_steps {
            let next = pattern.next_input(pad);
            let ids: Vec<i64> = next.iter().chain(next.iter()).copied().collect();
            let input_ids = Tensor::from_array(([batch, 1], ids)).map_err(|e| {
                ApiError::model_inference_failed(format!("Failed to create input_ids: {}", e))
            })?;

            let mut inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
                (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
                (
                    Cow::from("encoder_attention_mask"),
                    SessionInputValue::from(encoder_attention_mask.view()),
                ),
            ];
            for (name, value) in &kv_cache {
                inputs.push((Cow::from(name.as_str()), SessionInputValue::from(value.view())));
            }

            let mut outputs = self.decoder_with_past.run(inputs).map_err(|e| {
                ApiError::model_inference_failed(format!(
                    "Decoder step {} failed: {}",
                    step, e
                ))
            })?;

            pattern.push(&sample_step(&mut outputs, params, rng)?);

            // Encoder cross-attention entries never change
            for j in 0..num_layers {
                kv_cache[j * 4].1 = take(&mut outputs, &format!("present.{j}.decoder.key"))?;
                kv_cache[j * 4 + 1].1 = take(&mut outputs, &format!("present.{j}.decoder.value"))?;
            }

            if step % 100 == 0 {
                tracing::trace!(step, total_steps, "decoding");
            }
        }

        let codes = pattern.frames();
        tracing::debug!(frames = codes.first().map_or(0, Vec::len), "decoder finished");
        Ok(codes)
    }
}

/// Takes a named output or fails with the missing name.
fn take(outputs: &mut SessionOutputs<'_>, name: &str) -> Result<DynValue> {
    outputs
        .remove(name)
        .ok_or_else(|| ApiError::model_inference_failed(format!("{} not found in output", name)))
}

/// Guides and samples the `logits` output of one step.
fn sample_step(
    outputs: &mut SessionOutputs<'_>,
    params: &GenerationParams,
    rng: &mut impl Rng,
) -> Result<Vec<i64>> {
    let logits = Logits::from_3d_dyn_value(&take(outputs, "logits")?)?;
    logits.apply_free_guidance(params.cfg_coef)?.sample(params, rng)
}

/// Doubles the batch dimension, filling the new half with zeros.
///
/// Works on f32 and f16 hidden states and on i64 masks.
fn duplicate_with_zeros(tensor: &DynValue) -> Result<DynValue> {
    if let Ok(value) = duplicate_typed::<f32>(tensor) {
        return Ok(value);
    }
    if let Ok(value) = duplicate_typed::<half::f16>(tensor) {
        return Ok(value);
    }
    duplicate_typed::<i64>(tensor)
}

fn duplicate_typed<T>(tensor: &DynValue) -> Result<DynValue>
where
    T: ort::tensor::PrimitiveTensorElementType + Clone + Default + std::fmt::Debug + 'static,
{
    let (shape, data) = tensor.try_extract_tensor::<T>().map_err(|e| {
        ApiError::model_inference_failed(format!("Failed to extract tensor: {}", e))
    })?;

    let mut shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
    if let Some(first) = shape.first_mut() {
        *first *= 2;
    }

    let mut doubled = data.to_vec();
    doubled.resize(data.len() * 2, T::default());

    let value = Tensor::from_array((shape, doubled)).map_err(|e| {
        ApiError::model_inference_failed(format!("Failed to create duplicated tensor: {}", e))
    })?;
    Ok(value.into_dyn())
}
