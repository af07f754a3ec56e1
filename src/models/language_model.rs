//! MusicGen / AudioGen text-to-audio pipeline.
//!
//! Both families share the same exported layout: T5 conditioning, a split
//! decoder over four delayed codebooks and an EnCodec decoder. Only the
//! architecture values in `config.json` and the output sample rate differ.

use std::path::Path;

use crate::audio::Waveform;
use crate::error::{ApiError, Result};
use crate::types::ModelConfig;

use super::audio_codec::OnnxCodec;
use super::backend::{AudioCodec, GenerationParams, ModelKind, TextToAudio};
use super::decoder::Decoder;
use super::session::SessionOptions;
use super::text_encoder::TextEncoder;

/// A loaded text-to-audio generator.
pub struct LanguageModel {
    kind: ModelKind,
    text_encoder: TextEncoder,
    decoder: Decoder,
    codec: OnnxCodec,
    config: ModelConfig,
    params: GenerationParams,
}

impl LanguageModel {
    /// Loads every session of a generator from `model_dir`.
    pub fn load(model_dir: &Path, kind: ModelKind, options: SessionOptions) -> Result<Self> {
        let config = load_config(model_dir, kind)?;

        tracing::info!(
            model = %kind,
            layers = config.num_hidden_layers,
            sample_rate = config.sample_rate,
            "loading generator"
        );

        let text_encoder = TextEncoder::load(model_dir, options)?;
        let decoder = Decoder::load(model_dir, config.clone(), options)?;
        let codec = OnnxCodec::load_decoder(model_dir, config.sample_rate, options)?;

        Ok(Self {
            kind,
            text_encoder,
            decoder,
            codec,
            config,
            params: GenerationParams::default(),
        })
    }
}

impl TextToAudio for LanguageModel {
    fn set_generation_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    fn generate(&mut self, prompt: &str) -> Result<Waveform> {
        let frames = self.config.tokens_for_duration(self.params.duration);
        tracing::debug!(model = %self.kind, frames, "generating");

        let conditioning = self.text_encoder.encode(prompt)?;
        let codes =
            self.decoder
                .generate(conditioning, frames, &self.params, &mut rand::thread_rng())?;
        let mut waveform = self.codec.decode(&codes)?;

        // The codec may pad its last frame
        let expected = frames * self.config.samples_per_token();
        if waveform.samples.len() > expected {
            waveform.samples.truncate(expected);
        }
        Ok(waveform)
    }
}

/// Reads `config.json` over the family defaults, if present.
pub fn load_config(model_dir: &Path, kind: ModelKind) -> Result<ModelConfig> {
    let defaults = match kind {
        ModelKind::AudioGen => ModelConfig::audiogen_medium(),
        _ => ModelConfig::musicgen_small(),
    };

    let config_path = model_dir.join("config.json");
    let config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            ApiError::model_load_failed(format!("Failed to read config.json: {}", e))
        })?;
        let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            ApiError::model_load_failed(format!("Failed to parse config.json: {}", e))
        })?;
        defaults.merge_json(&json)
    } else {
        defaults
    };

    if let Some(problem) = config.validate() {
        return Err(ApiError::model_load_failed(format!(
            "Invalid config for {}: {}",
            kind, problem
        )));
    }
    Ok(config)
}
