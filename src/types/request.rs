//! Text-to-audio request body.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};
use crate::models::GenerationParams;

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Body of `POST /generate/music` and `POST /generate/audio`.
///
/// Missing fields take the generator defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text prompt describing the audio.
    pub text: String,
    /// Requested length in seconds.
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Softmax temperature; 0 selects the most likely token.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Top-k sampling cutoff; 0 disables it.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Nucleus sampling mass; 0 disables it and top-k applies.
    #[serde(default)]
    pub top_p: f32,
    /// Classifier-free guidance coefficient.
    #[serde(default = "default_cfg_coef")]
    pub cfg_coef: f32,
}

fn default_duration() -> f32 {
    10.0
}

fn default_temperature() -> f32 {
    1.0
}

fn default_top_k() -> usize {
    250
}

fn default_cfg_coef() -> f32 {
    3.0
}

impl GenerationRequest {
    /// Creates a request with default sampling parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            duration: default_duration(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: 0.0,
            cfg_coef: default_cfg_coef(),
        }
    }

    /// Checks the parameters against the accepted ranges.
    pub fn validate(&self, max_duration_sec: f32) -> Result<()> {
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ApiError::invalid_params(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration
            )));
        }
        if self.duration > max_duration_sec {
            return Err(ApiError::invalid_params(format!(
                "duration {}s exceeds the maximum of {}s",
                self.duration, max_duration_sec
            )));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ApiError::invalid_params(format!(
                "temperature must be >= 0, got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ApiError::invalid_params(format!(
                "top_p must be between 0 and 1, got {}",
                self.top_p
            )));
        }
        if !self.cfg_coef.is_finite() {
            return Err(ApiError::invalid_params("cfg_coef must be finite"));
        }
        let chars = self.text.chars().count();
        if chars > MAX_PROMPT_CHARS {
            return Err(ApiError::invalid_params(format!(
                "text too long: {} characters (maximum {})",
                chars, MAX_PROMPT_CHARS
            )));
        }
        Ok(())
    }

    /// Returns the sampling parameters handed to the generator.
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            duration: self.duration,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            cfg_coef: self.cfg_coef,
        }
    }
}
