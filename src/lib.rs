//! audiocraft-api: a REST API over MusicGen, AudioGen, EnCodec,
//! MultiBandDiffusion and the MPD/MSD/MS-STFT-D discriminators, all run
//! through ONNX Runtime.
//!
//! # Modules
//!
//! - [`api`]: HTTP router, handlers and wire types
//! - [`models`]: ONNX-backed models behind the generation, codec and
//!   discriminator traits
//! - [`generation`]: Validated text-to-audio pipeline
//! - [`analysis`]: Real/fake scoring from discriminator outputs
//! - [`audio`]: Decoding uploads, resampling and WAV rendering
//! - [`config`]: Runtime configuration (ServerConfig, Device)
//! - [`error`]: Error types and codes (ApiError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use audiocraft_api::{api, config::ServerConfig, models::load_registry};
//!
//! let config = ServerConfig::from_env();
//! let registry = load_registry(&config)?;
//! api::serve(&config, registry).await?;
//! ```

pub mod analysis;
pub mod api;
pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use audio::Waveform;
pub use config::{Device, ServerConfig};
pub use error::{ApiError, ErrorCode, Result};
pub use types::{GenerationRequest, ModelConfig};
