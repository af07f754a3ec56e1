//! Exported audio discriminators (MPD, MSD, MS-STFT-D).
//!
//! Each graph takes a `[1, 1, samples]` waveform and returns one
//! `logits.{i}` output per sub-discriminator plus its intermediate
//! activations as `fmap.{i}.{j}`.

use std::collections::BTreeMap;
use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;

use crate::audio::Waveform;
use crate::error::{ApiError, Result};

use super::backend::{Discriminator, DiscriminatorOutput, FeatureTensor};
use super::session::{extract_f32, load_session, SessionOptions};

/// Where a named graph output belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputSlot {
    Logits(usize),
    FeatureMap(usize, usize),
}

fn parse_output_name(name: &str) -> Option<OutputSlot> {
    let mut parts = name.split('.');
    let slot = match (parts.next()?, parts.next(), parts.next()) {
        ("logits", Some(i), None) => OutputSlot::Logits(i.parse().ok()?),
        ("fmap", Some(i), Some(j)) => OutputSlot::FeatureMap(i.parse().ok()?, j.parse().ok()?),
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(slot)
}

/// Groups named tensors into per sub-discriminator logits and feature maps.
///
/// Unrecognised names are ignored. Fails if no logits are present or the
/// sub-discriminator indices have gaps.
pub fn assemble_outputs(named: Vec<(String, FeatureTensor)>) -> Result<DiscriminatorOutput> {
    let mut logits: BTreeMap<usize, FeatureTensor> = BTreeMap::new();
    let mut fmaps: BTreeMap<usize, BTreeMap<usize, FeatureTensor>> = BTreeMap::new();

    for (name, tensor) in named {
        match parse_output_name(&name) {
            Some(OutputSlot::Logits(i)) => {
                logits.insert(i, tensor);
            }
            Some(OutputSlot::FeatureMap(i, j)) => {
                fmaps.entry(i).or_default().insert(j, tensor);
            }
            None => tracing::trace!(output = %name, "ignoring discriminator output"),
        }
    }

    if logits.is_empty() {
        return Err(ApiError::model_inference_failed(
            "discriminator produced no logits outputs",
        ));
    }
    if logits.keys().enumerate().any(|(pos, &i)| pos != i) {
        return Err(ApiError::model_inference_failed(format!(
            "discriminator logits indices are not contiguous: {:?}",
            logits.keys().collect::<Vec<_>>()
        )));
    }

    let count = logits.len();
    let feature_maps = (0..count)
        .map(|i| {
            fmaps
                .remove(&i)
                .map(|layers| layers.into_values().collect())
                .unwrap_or_default()
        })
        .collect();

    Ok(DiscriminatorOutput {
        logits: logits.into_values().collect(),
        feature_maps,
    })
}

/// One discriminator graph.
pub struct OnnxDiscriminator {
    name: &'static str,
    session: Session,
    output_names: Vec<String>,
}

impl OnnxDiscriminator {
    /// Loads `<name>.onnx` from `model_dir`.
    pub fn load(model_dir: &Path, name: &'static str, options: SessionOptions) -> Result<Self> {
        let session = load_session(&model_dir.join(format!("{}.onnx", name)), options)?;
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        if !output_names.iter().any(|n| n.starts_with("logits.")) {
            return Err(ApiError::model_load_failed(format!(
                "{}.onnx has no logits outputs (found {:?})",
                name, output_names
            )));
        }

        Ok(Self {
            name,
            session,
            output_names,
        })
    }
}

impl Discriminator for OnnxDiscriminator {
    fn forward(&mut self, waveform: &Waveform) -> Result<DiscriminatorOutput> {
        if waveform.is_empty() {
            return Err(ApiError::invalid_audio("no samples to analyze"));
        }

        let len = waveform.samples.len();
        let input = Tensor::from_array(([1usize, 1, len], waveform.samples.clone())).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create audio tensor: {}", e))
        })?;

        let mut outputs = self.session.run(ort::inputs![input]).map_err(|e| {
            ApiError::model_inference_failed(format!("{} inference failed: {}", self.name, e))
        })?;

        let mut named = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let value = outputs.remove(name.as_str()).ok_or_else(|| {
                ApiError::model_inference_failed(format!("{} not found in output", name))
            })?;
            let (shape, data) = extract_f32(&value)?;
            named.push((name.clone(), FeatureTensor::new(shape, data)?));
        }

        assemble_outputs(named)
    }
}
