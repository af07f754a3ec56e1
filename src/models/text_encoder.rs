//! T5 text conditioning shared by MusicGen and AudioGen.

use std::path::Path;

use ort::session::Session;
use ort::value::{DynValue, Tensor};
use tokenizers::Tokenizer;

use crate::error::{ApiError, Result};

use super::session::{load_session, SessionOptions};

/// Tokenizer plus T5 encoder session.
pub struct TextEncoder {
    tokenizer: Tokenizer,
    session: Session,
}

/// Encoder output used to condition the decoder.
pub struct TextConditioning {
    /// `last_hidden_state`, shape `[1, tokens, hidden]`.
    pub hidden_states: DynValue,
    /// All-ones mask, shape `[1, tokens]`.
    pub attention_mask: DynValue,
    /// Number of prompt tokens.
    pub tokens: usize,
}

impl TextEncoder {
    /// Loads `tokenizer.json` and `text_encoder.onnx` from `model_dir`.
    pub fn load(model_dir: &Path, options: SessionOptions) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| ApiError::model_load_failed(format!("Failed to load tokenizer: {}", e)))?;

        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                ApiError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let session = load_session(&model_dir.join("text_encoder.onnx"), options)?;

        Ok(Self { tokenizer, session })
    }

    /// Tokenizes and encodes one prompt.
    pub fn encode(&mut self, text: &str) -> Result<TextConditioning> {
        let ids = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ApiError::model_inference_failed(format!("Tokenization failed: {}", e)))?
            .get_ids()
            .iter()
            .map(|&id| id as i64)
            .collect::<Vec<_>>();

        // An empty prompt still yields the EOS token
        let tokens = ids.len().max(1);
        let ids = if ids.is_empty() { vec![1] } else { ids };

        let input_ids = Tensor::from_array(([1, tokens], ids)).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create input tensor: {}", e))
        })?;
        let attention_mask = Tensor::from_array(([1, tokens], vec![1i64; tokens])).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create attention mask: {}", e))
        })?;

        let mut outputs = self
            .session
            .run(ort::inputs![input_ids, attention_mask])
            .map_err(|e| {
                ApiError::model_inference_failed(format!("Text encoder inference failed: {}", e))
            })?;

        let hidden_states = outputs.remove("last_hidden_state").ok_or_else(|| {
            ApiError::model_inference_failed("last_hidden_state not found in output")
        })?;

        // The session consumed the first mask
        let decoder_mask = Tensor::from_array(([1, tokens], vec![1i64; tokens])).map_err(|e| {
            ApiError::model_inference_failed(format!("Failed to create attention mask: {}", e))
        })?;

        Ok(TextConditioning {
            hidden_states,
            attention_mask: decoder_mask.into_dyn(),
            tokens,
        })
    }
}
