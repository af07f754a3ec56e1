//! ModelConfig type for the autoregressive generators.
//!
//! MusicGen and AudioGen share one decoder layout; they differ in size,
//! output sample rate and conditioning. These values size the KV cache and
//! convert a requested duration into a token count.

use serde::{Deserialize, Serialize};

/// Number of EnCodec codebooks the delay pattern is built for.
pub const CODEBOOKS: u32 = 4;

/// Configuration parameters for a generator's decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Token vocabulary size per codebook (2048 for both families).
    pub vocab_size: u32,

    /// Number of decoder transformer layers.
    pub num_hidden_layers: u32,

    /// Number of attention heads in each layer.
    pub num_attention_heads: u32,

    /// Decoder hidden size.
    pub d_model: u32,

    /// Key/value dimension per attention head.
    pub d_kv: u32,

    /// Output sample rate of the model's EnCodec decoder in Hz.
    pub sample_rate: u32,

    /// Codec frames per second of audio.
    pub frame_rate: u32,

    /// Number of EnCodec codebooks.
    pub codebooks: u32,

    /// Padding token ID for the decoder.
    pub pad_token_id: i64,
}

impl ModelConfig {
    /// Configuration of facebook/musicgen-small.
    pub fn musicgen_small() -> Self {
        Self {
            vocab_size: 2048,
            num_hidden_layers: 24,
            num_attention_heads: 16,
            d_model: 1024,
            d_kv: 64,
            sample_rate: 32000,
            frame_rate: 50,
            codebooks: CODEBOOKS,
            pad_token_id: 2048,
        }
    }

    /// Configuration of facebook/audiogen-medium.
    pub fn audiogen_medium() -> Self {
        Self {
            vocab_size: 2048,
            num_hidden_layers: 48,
            num_attention_heads: 24,
            d_model: 1536,
            d_kv: 64,
            sample_rate: 16000,
            frame_rate: 50,
            codebooks: CODEBOOKS,
            pad_token_id: 2048,
        }
    }

    /// Overlays values found in an exported `config.json`.
    ///
    /// Reads the `decoder` section (`num_hidden_layers`, `num_attention_heads`,
    /// `hidden_size`, `vocab_size`, `pad_token_id`, `num_codebooks`) and the
    /// `audio_encoder.sampling_rate` field. Missing keys keep their defaults.
    pub fn merge_json(mut self, json: &serde_json::Value) -> Self {
        if let Some(decoder) = json.get("decoder") {
            let get_u32 = |key: &str| {
                decoder
                    .get(key)
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok())
            };
            if let Some(v) = get_u32("num_hidden_layers") {
                self.num_hidden_layers = v;
            }
            if let Some(v) = get_u32("num_attention_heads") {
                self.num_attention_heads = v;
            }
            if let Some(v) = get_u32("hidden_size") {
                self.d_model = v;
            }
            if let Some(v) = get_u32("vocab_size") {
                self.vocab_size = v;
            }
            if let Some(v) = get_u32("num_codebooks") {
                self.codebooks = v;
            }
            if let Some(v) = decoder.get("pad_token_id").and_then(|v| v.as_i64()) {
                self.pad_token_id = v;
            }
            if self.num_attention_heads > 0 {
                self.d_kv = self.d_model / self.num_attention_heads;
            }
        }

        if let Some(rate) = json
            .get("audio_encoder")
            .and_then(|a| a.get("sampling_rate"))
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
        {
            self.sample_rate = rate;
        }

        self
    }

    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.vocab_size == 0 {
            return Some("vocab_size must be > 0".to_string());
        }

        if self.num_hidden_layers == 0 {
            return Some("num_hidden_layers must be > 0".to_string());
        }

        if self.num_attention_heads == 0 {
            return Some("num_attention_heads must be > 0".to_string());
        }

        if self.sample_rate == 0 || self.frame_rate == 0 {
            return Some(format!(
                "sample_rate ({}) and frame_rate ({}) must be > 0",
                self.sample_rate, self.frame_rate
            ));
        }

        if self.codebooks != CODEBOOKS {
            return Some(format!(
                "codebooks must be {}, got {}",
                CODEBOOKS, self.codebooks
            ));
        }

        None
    }

    /// Number of decoder steps needed for `duration_sec` of audio.
    ///
    /// Never less than one.
    pub fn tokens_for_duration(&self, duration_sec: f32) -> usize {
        let tokens = (duration_sec * self.frame_rate as f32).round();
        if tokens.is_finite() && tokens >= 1.0 {
            tokens as usize
        } else {
            1
        }
    }

    /// Audio samples produced per decoder step.
    pub fn samples_per_token(&self) -> usize {
        (self.sample_rate / self.frame_rate.max(1)) as usize
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::musicgen_small()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_defaults_are_valid() {
        assert!(ModelConfig::musicgen_small().validate().is_none());
        assert!(ModelConfig::audiogen_medium().validate().is_none());
        assert_eq!(ModelConfig::musicgen_small().sample_rate, 32000);
        assert_eq!(ModelConfig::audiogen_medium().sample_rate, 16000);
    }

    #[test]
    fn rejects_other_codebook_counts() {
        let mut config = ModelConfig::musicgen_small();
        config.codebooks = 8;
        assert!(config.validate().is_some());
    }

    #[test]
    fn tokens_for_duration() {
        let config = ModelConfig::musicgen_small();
        assert_eq!(config.tokens_for_duration(10.0), 500);
        assert_eq!(config.tokens_for_duration(0.5), 25);
        assert_eq!(config.tokens_for_duration(0.001), 1);
        assert_eq!(config.tokens_for_duration(f32::NAN), 1);
    }

    #[test]
    fn samples_per_token() {
        assert_eq!(ModelConfig::musicgen_small().samples_per_token(), 640);
        assert_eq!(ModelConfig::audiogen_medium().samples_per_token(), 320);
    }

    #[test]
    fn merge_json_overrides_decoder_values() {
        let json = serde_json::json!({
            "decoder": {
                "num_hidden_layers": 48,
                "num_attention_heads": 32,
                "hidden_size": 2048,
                "pad_token_id": 2048
            },
            "audio_encoder": { "sampling_rate": 32000 }
        });
        let config = ModelConfig::musicgen_small().merge_json(&json);
        assert_eq!(config.num_hidden_layers, 48);
        assert_eq!(config.d_model, 2048);
        assert_eq!(config.d_kv, 64);
        assert_eq!(config.vocab_size, 2048);
    }
}
