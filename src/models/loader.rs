//! Startup loading of every served model.
//!
//! Models live under `<model_path>/<name>/`. All of them must load for the
//! server to start.

use std::path::Path;

use crate::config::ServerConfig;
use crate::error::{ApiError, ErrorCode, Result};

use super::audio_codec::OnnxCodec;
use super::backend::{ModelKind, ModelRole};
use super::discriminator::OnnxDiscriminator;
use super::language_model::LanguageModel;
use super::registry::ModelRegistry;
use super::session::SessionOptions;

/// Checks that every file `kind` needs exists in `model_dir`.
///
/// The error lists all missing files at once.
pub fn check_models(model_dir: &Path, kind: ModelKind) -> Result<()> {
    let missing: Vec<&str> = kind
        .required_files()
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::ModelNotFound,
            format!(
                "Missing {} files in {}: {}",
                kind,
                model_dir.display(),
                missing.join(", ")
            ),
        ))
    }
}

/// Reads `sampling_rate` from an optional `config.json`.
fn codec_sample_rate(model_dir: &Path, kind: ModelKind) -> Result<u32> {
    let path = model_dir.join("config.json");
    if !path.exists() {
        return Ok(kind.default_sample_rate());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ApiError::model_load_failed(format!("Failed to read config.json: {}", e)))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| ApiError::model_load_failed(format!("Failed to parse config.json: {}", e)))?;
    Ok(json
        .get("sampling_rate")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&rate| rate > 0)
        .unwrap_or_else(|| kind.default_sample_rate()))
}

/// Loads every model named by [`ModelKind::ALL`] into a registry.
pub fn load_registry(config: &ServerConfig) -> Result<ModelRegistry> {
    let options = SessionOptions::new(config.device, config.threads.map(|t| t as usize));

    // Report every missing file before loading anything
    let missing: Vec<String> = ModelKind::ALL
        .iter()
        .filter_map(|&kind| check_models(&config.model_dir(kind.as_str()), kind).err())
        .map(|e| e.message)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::new(ErrorCode::ModelNotFound, missing.join("; ")));
    }

    let mut registry = ModelRegistry::new();
    for kind in ModelKind::ALL {
        let dir = config.model_dir(kind.as_str());
        let name = kind.as_str();
        tracing::info!(
            model = name,
            role = kind.role().as_str(),
            path = %dir.display(),
            "loading model"
        );

        registry = match kind.role() {
            ModelRole::Generator => {
                registry.with_generator(name, Box::new(LanguageModel::load(&dir, kind, options)?))
            }
            ModelRole::Codec => {
                let rate = codec_sample_rate(&dir, kind)?;
                let codec = match kind {
                    ModelKind::MultiBand => OnnxCodec::load_multiband(&dir, rate, options)?,
                    _ => OnnxCodec::load_encodec(&dir, rate, options)?,
                };
                registry.with_codec(name, Box::new(codec))
            }
            ModelRole::Discriminator => registry
                .with_discriminator(name, Box::new(OnnxDiscriminator::load(&dir, name, options)?)),
        };
    }

    tracing::info!(
        models = ?registry.model_names(),
        discriminators = ?registry.discriminator_names(),
        "all models loaded"
    );
    Ok(registry)
}
