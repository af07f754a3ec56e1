//! In-process stand-ins for the ONNX models, used by tests.

use crate::audio::Waveform;
use crate::error::{ApiError, Result};

use super::backend::{
    codes_shape, AudioCodec, Codes, Discriminator, DiscriminatorOutput, FeatureTensor,
    GenerationParams, TextToAudio,
};
use super::registry::ModelRegistry;

/// Emits a quiet ramp lasting the requested duration.
pub struct FakeGenerator {
    sample_rate: u32,
    params: GenerationParams,
}

impl FakeGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            params: GenerationParams::default(),
        }
    }
}

impl TextToAudio for FakeGenerator {
    fn set_generation_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    fn generate(&mut self, prompt: &str) -> Result<Waveform> {
        if prompt == "fail" {
            return Err(ApiError::model_inference_failed("fake generator failure"));
        }
        let len = (self.params.duration * self.sample_rate as f32).round() as usize;
        let samples = (0..len).map(|i| (i % 100) as f32 / 1000.0).collect();
        Ok(Waveform::new(samples, self.sample_rate))
    }
}

/// Four codebooks, one frame per `hop` samples; decode emits `hop` samples
/// per frame.
pub struct FakeCodec {
    sample_rate: u32,
    can_encode: bool,
    hop: usize,
}

impl FakeCodec {
    pub fn new(sample_rate: u32, can_encode: bool) -> Self {
        Self {
            sample_rate,
            can_encode,
            hop: (sample_rate / 50) as usize,
        }
    }
}

impl AudioCodec for FakeCodec {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn encode(&mut self, waveform: &Waveform) -> Result<Codes> {
        if !self.can_encode {
            return Err(ApiError::unsupported("fake", "encoding"));
        }
        let waveform = waveform.clone().resampled(self.sample_rate)?;
        let frames = waveform.samples.len().div_ceil(self.hop).max(1);
        Ok((0..4)
            .map(|k| (0..frames).map(|t| ((k * 31 + t) % 2048) as i64).collect())
            .collect())
    }

    fn decode(&mut self, codes: &Codes) -> Result<Waveform> {
        let (_, frames) = codes_shape(codes)?;
        Ok(Waveform::new(vec![0.0; frames * self.hop], self.sample_rate))
    }
}

/// Returns fixed logits and a two-layer feature map.
pub struct FakeDiscriminator {
    logit: f32,
}

impl FakeDiscriminator {
    /// Every logit equals `logit`, so the score is `sigmoid(logit)`.
    pub fn constant(logit: f32) -> Self {
        Self { logit }
    }
}

impl Discriminator for FakeDiscriminator {
    fn forward(&mut self, waveform: &Waveform) -> Result<DiscriminatorOutput> {
        let frames = waveform.samples.len().clamp(1, 8);
        let logits = FeatureTensor::new(vec![1, 1, frames], vec![self.logit; frames])?;
        let fmap = |channels: usize| {
            let data = (0..channels * frames).map(|i| (i / frames) as f32).collect();
            FeatureTensor::new(vec![1, channels, frames], data)
        };
        Ok(DiscriminatorOutput {
            logits: vec![logits],
            feature_maps: vec![vec![fmap(2)?, fmap(4)?]],
        })
    }
}

/// A registry holding every model name the server serves.
pub fn fake_registry() -> ModelRegistry {
    ModelRegistry::new()
        .with_generator("musicgen", Box::new(FakeGenerator::new(32000)))
        .with_generator("audiogen", Box::new(FakeGenerator::new(16000)))
        .with_codec("encodec", Box::new(FakeCodec::new(24000, true)))
        .with_codec("multiband", Box::new(FakeCodec::new(24000, false)))
        .with_discriminator("mpd", Box::new(FakeDiscriminator::constant(2.0)))
        .with_discriminator("msd", Box::new(FakeDiscriminator::constant(0.0)))
        .with_discriminator("msstftd", Box::new(FakeDiscriminator::constant(-2.0)))
}
