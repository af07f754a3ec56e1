//! Logits processing for the generator decoders.
//!
//! Classifier-free guidance followed by temperature, nucleus or top-k
//! sampling, one token per codebook row.

use std::fmt::{Debug, Formatter};
use std::ops::Deref;

use ndarray::{s, Array, Array2, Axis, Ix3, IxDyn};
use ort::tensor::ArrayExtensions;
use ort::value::DynValue;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use crate::error::{ApiError, Result};

use super::backend::GenerationParams;
use super::session::extract_f32;

/// Wrapper around 2D logits `[rows, vocab]`.
pub struct Logits(Array2<f32>);

impl Deref for Logits {
    type Target = Array2<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({:?})", self.0.dim())
    }
}

impl From<Array2<f32>> for Logits {
    fn from(arr: Array2<f32>) -> Self {
        Self(arr)
    }
}

impl Logits {
    /// Creates Logits from a `[batch, 1, vocab]` decoder output (f32 or f16).
    pub fn from_3d_dyn_value(value: &DynValue) -> Result<Self> {
        let (shape, data) = extract_f32(value)?;

        let arr = Array::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create array: {}", e))
        })?;
        let arr = arr
            .into_dimensionality::<Ix3>()
            .map_err(|e| ApiError::model_inference_failed(format!("Expected 3D logits: {}", e)))?;

        if arr.dim().1 != 1 {
            return Err(ApiError::model_inference_failed(format!(
                "Expected one decoder position, got {}",
                arr.dim().1
            )));
        }

        Ok(Self(arr.remove_axis(Axis(1))))
    }

    /// Applies classifier-free guidance.
    ///
    /// Conditional rows come first, unconditional rows second:
    /// `guided = uncond + (cond - uncond) * scale`.
    pub fn apply_free_guidance(self, scale: f32) -> Result<Self> {
        let rows = self.0.dim().0;
        if rows % 2 != 0 {
            return Err(ApiError::model_inference_failed(format!(
                "Guidance needs an even number of logit rows, got {}",
                rows
            )));
        }

        let half = rows / 2;
        let cond = self.0.slice(s![0..half, ..]);
        let uncond = self.0.slice(s![half.., ..]);
        Ok(Self((cond.into_owned() - uncond) * scale + uncond))
    }

    /// Samples one token per row according to `params`.
    ///
    /// Temperature 0 picks the most likely token. Otherwise nucleus sampling
    /// applies when `top_p > 0`, else top-k when `top_k > 0`, else the whole
    /// distribution.
    pub fn sample(&self, params: &GenerationParams, rng: &mut impl Rng) -> Result<Vec<i64>> {
        if params.temperature <= 0.0 {
            return Ok(self.argmax());
        }

        let scaled = &self.0 / params.temperature;
        let probs = scaled.softmax(Axis(1));

        probs
            .axis_iter(Axis(0))
            .map(|row| {
                let mut ranked: Vec<(i64, f32)> = row
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| (i as i64, p))
                    .collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

                let keep = if params.top_p > 0.0 {
                    nucleus_len(&ranked, params.top_p)
                } else if params.top_k > 0 {
                    params.top_k.min(ranked.len())
                } else {
                    ranked.len()
                };
                ranked.truncate(keep.max(1));

                let distribution = WeightedIndex::new(ranked.iter().map(|e| e.1)).map_err(|e| {
                    ApiError::model_inference_failed(format!("Invalid token distribution: {}", e))
                })?;
                Ok(ranked[distribution.sample(rng)].0)
            })
            .collect()
    }

    /// Index of the largest logit in each row.
    pub fn argmax(&self) -> Vec<i64> {
        self.0
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i as i64)
                    .unwrap_or(0)
            })
            .collect()
    }
}

/// Number of leading tokens kept by nucleus sampling.
///
/// A token survives while the mass strictly before it is at most `p`, so
/// the token that crosses the threshold is included.
fn nucleus_len(ranked: &[(i64, f32)], p: f32) -> usize {
    let mut cumulative = 0.0f32;
    let mut keep = 0;
    for &(_, prob) in ranked {
        if cumulative > p {
            break;
        }
        cumulative += prob;
        keep += 1;
    }
    keep
}
