//! Model abstraction shared by every backend.
//!
//! The API talks to models only through the three traits here, so each
//! model family can be swapped (ONNX sessions in production, fakes in
//! tests) without touching the handlers.

use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::error::{ApiError, Result};

/// Role a model plays in the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Text to audio.
    Generator,
    /// Audio to codes and back.
    Codec,
    /// Real/fake scoring.
    Discriminator,
}

impl ModelRole {
    /// Returns the string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Generator => "generator",
            ModelRole::Codec => "codec",
            ModelRole::Discriminator => "discriminator",
        }
    }
}

/// Every model the server knows about.
///
/// Each variant is loaded from `<model_dir>/<as_str()>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// MusicGen - text-to-music, 32kHz.
    MusicGen,
    /// AudioGen - text-to-sound, 16kHz.
    AudioGen,
    /// EnCodec 24kHz - neural codec.
    Encodec,
    /// MultiBandDiffusion - decodes EnCodec codes by diffusion.
    MultiBand,
    /// Multi-period discriminator.
    Mpd,
    /// Multi-scale discriminator.
    Msd,
    /// Multi-scale STFT discriminator.
    MsStftD,
}

impl ModelKind {
    /// All kinds in the order they are reported by `/health`.
    pub const ALL: [ModelKind; 7] = [
        ModelKind::MusicGen,
        ModelKind::AudioGen,
        ModelKind::Encodec,
        ModelKind::MultiBand,
        ModelKind::Mpd,
        ModelKind::Msd,
        ModelKind::MsStftD,
    ];

    /// Returns the registry name of the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::MusicGen => "musicgen",
            ModelKind::AudioGen => "audiogen",
            ModelKind::Encodec => "encodec",
            ModelKind::MultiBand => "multiband",
            ModelKind::Mpd => "mpd",
            ModelKind::Msd => "msd",
            ModelKind::MsStftD => "msstftd",
        }
    }

    /// Parses a model kind from its registry name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
    }

    /// Returns the role this model plays.
    pub fn role(&self) -> ModelRole {
        match self {
            ModelKind::MusicGen | ModelKind::AudioGen => ModelRole::Generator,
            ModelKind::Encodec | ModelKind::MultiBand => ModelRole::Codec,
            ModelKind::Mpd | ModelKind::Msd | ModelKind::MsStftD => ModelRole::Discriminator,
        }
    }

    /// Files that must exist in the model directory.
    pub fn required_files(&self) -> &'static [&'static str] {
        match self {
            ModelKind::MusicGen | ModelKind::AudioGen => &[
                "tokenizer.json",
                "text_encoder.onnx",
                "decoder_model.onnx",
                "decoder_with_past_model.onnx",
                "encodec_decode.onnx",
            ],
            ModelKind::Encodec => &["encodec_encode.onnx", "encodec_decode.onnx"],
            ModelKind::MultiBand => &["multiband_decode.onnx"],
            ModelKind::Mpd => &["mpd.onnx"],
            ModelKind::Msd => &["msd.onnx"],
            ModelKind::MsStftD => &["msstftd.onnx"],
        }
    }

    /// Native sample rate used when the model directory has no config.
    pub fn default_sample_rate(&self) -> u32 {
        match self {
            ModelKind::MusicGen => 32000,
            ModelKind::AudioGen => 16000,
            ModelKind::Encodec | ModelKind::MultiBand => 24000,
            ModelKind::Mpd | ModelKind::Msd | ModelKind::MsStftD => 24000,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sampling parameters for a text-to-audio generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Seconds of audio to generate.
    pub duration: f32,
    /// Softmax temperature.
    pub temperature: f32,
    /// Top-k cutoff, 0 disables.
    pub top_k: usize,
    /// Nucleus mass, 0 disables.
    pub top_p: f32,
    /// Classifier-free guidance coefficient.
    pub cfg_coef: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration: 10.0,
            temperature: 1.0,
            top_k: 250,
            top_p: 0.0,
            cfg_coef: 3.0,
        }
    }
}

/// Codec codes laid out as `[codebook][frame]`.
pub type Codes = Vec<Vec<i64>>;

/// Returns `(codebooks, frames)` of a code matrix.
///
/// Fails on an empty matrix, empty rows or rows of different lengths.
pub fn codes_shape(codes: &Codes) -> Result<(usize, usize)> {
    let codebooks = codes.len();
    let frames = codes
        .first()
        .map(|row| row.len())
        .ok_or_else(|| ApiError::invalid_codes("codes must contain at least one codebook"))?;
    if frames == 0 {
        return Err(ApiError::invalid_codes("codes must contain at least one frame"));
    }
    if let Some((idx, row)) = codes.iter().enumerate().find(|(_, row)| row.len() != frames) {
        return Err(ApiError::invalid_codes(format!(
            "codebook {} has {} frames, expected {}",
            idx,
            row.len(),
            frames
        )));
    }
    Ok((codebooks, frames))
}

/// A shaped f32 tensor copied out of a model output.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTensor {
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Row-major values.
    pub data: Vec<f32>,
}

impl FeatureTensor {
    /// Creates a tensor, checking that `data` fills `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ApiError::model_inference_failed(format!(
                "tensor shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }
}

/// Output of one discriminator forward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscriminatorOutput {
    /// Logits of each sub-discriminator.
    pub logits: Vec<FeatureTensor>,
    /// Per sub-discriminator, the feature map of each layer.
    pub feature_maps: Vec<Vec<FeatureTensor>>,
}

/// Text-to-audio generator (MusicGen, AudioGen).
pub trait TextToAudio: Send {
    /// Sets the parameters used by subsequent [`generate`](Self::generate) calls.
    fn set_generation_params(&mut self, params: GenerationParams);

    /// Generates audio for one prompt at the model's native rate.
    fn generate(&mut self, prompt: &str) -> Result<Waveform>;
}

/// Neural audio codec (EnCodec, MultiBandDiffusion).
pub trait AudioCodec: Send {
    /// Native sample rate of the codec.
    fn sample_rate(&self) -> u32;

    /// Encodes mono audio into codes. Input at another rate is resampled.
    fn encode(&mut self, waveform: &Waveform) -> Result<Codes>;

    /// Decodes codes into mono audio at the codec's native rate.
    fn decode(&mut self, codes: &Codes) -> Result<Waveform>;
}

/// Real/fake audio discriminator (MPD, MSD, MS-STFT-D).
pub trait Discriminator: Send {
    /// Runs the discriminator on mono audio.
    fn forward(&mut self, waveform: &Waveform) -> Result<DiscriminatorOutput>;
}
