//! Model layer.
//!
//! Everything the API calls goes through the traits in [`backend`]:
//! - [`TextToAudio`]: MusicGen and AudioGen ([`LanguageModel`])
//! - [`AudioCodec`]: EnCodec and MultiBandDiffusion ([`OnnxCodec`])
//! - [`Discriminator`]: MPD, MSD and MS-STFT-D ([`OnnxDiscriminator`])
//!
//! Loaded models are held by the [`ModelRegistry`].

pub mod audio_codec;
pub mod backend;
pub mod decoder;
pub mod delay_pattern;
pub mod discriminator;
pub mod downloader;
#[cfg(test)]
pub mod fake;
pub mod language_model;
pub mod loader;
pub mod logits;
pub mod registry;
pub mod session;
pub mod text_encoder;

// Re-export commonly used types
pub use audio_codec::OnnxCodec;
pub use backend::{
    codes_shape, AudioCodec, Codes, Discriminator, DiscriminatorOutput, FeatureTensor,
    GenerationParams, ModelKind, ModelRole, TextToAudio,
};
pub use discriminator::OnnxDiscriminator;
pub use downloader::{ensure_models, MODEL_URLS};
pub use language_model::LanguageModel;
pub use loader::{check_models, load_registry};
pub use registry::{ModelRegistry, SharedCodec, SharedDiscriminator, SharedGenerator};
pub use session::SessionOptions;
