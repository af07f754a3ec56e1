//! Core types for the audiocraft API.
//!
//! - [`ModelConfig`]: Decoder architecture parameters of a generative model
//! - [`GenerationRequest`]: Text-to-audio request body

mod config;
mod request;

pub use config::ModelConfig;
pub use request::{GenerationRequest, MAX_PROMPT_CHARS};
