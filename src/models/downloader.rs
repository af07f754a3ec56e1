//! Downloads the MusicGen export from HuggingFace.
//!
//! Only MusicGen has a public ONNX export; the other models must be placed
//! in their directories by hand.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{ApiError, ErrorCode, Result};

use super::backend::ModelKind;

/// HuggingFace URLs of the musicgen-small fp16 export.
pub const MODEL_URLS: &[(&str, &str)] = &[
    (
        "config.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/config.json",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/tokenizer.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/encodec_decode.onnx",
    ),
];

/// Files of `dir` that still need downloading, config.json included.
pub fn missing_files(model_dir: &Path) -> Vec<&'static str> {
    MODEL_URLS
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !model_dir.join(name).exists())
        .collect()
}

/// Downloads any missing MusicGen file into `model_dir`.
///
/// A failed `config.json` download is logged and ignored since the family
/// defaults cover it.
pub fn ensure_models(model_dir: &Path) -> Result<()> {
    fs::create_dir_all(model_dir).map_err(|e| {
        ApiError::with_source(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to create model directory {}", model_dir.display()),
            e,
        )
    })?;

    let missing = missing_files(model_dir);
    if missing.is_empty() {
        tracing::info!(model = %ModelKind::MusicGen, "all model files present");
        return Ok(());
    }

    tracing::info!(
        count = missing.len(),
        dir = %model_dir.display(),
        "downloading missing model files, this may take several minutes"
    );

    for file in missing {
        let Some((_, url)) = MODEL_URLS.iter().find(|(name, _)| *name == file) else {
            continue;
        };
        let result = download_file_streaming(url, &model_dir.join(file));
        match result {
            Err(e) if file == "config.json" => {
                tracing::warn!(error = %e, "config.json unavailable, using defaults");
            }
            other => other?,
        }
    }

    tracing::info!("all models downloaded");
    Ok(())
}

/// Streams one file to disk through a `.part` file.
fn download_file_streaming(url: &str, dest: &Path) -> Result<()> {
    let filename = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(file = %filename, "downloading");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            ApiError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    let mut response = client.get(url).send().map_err(|e| {
        ApiError::with_source(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download {}", url),
            e,
        )
    })?;

    if !response.status().is_success() {
        return Err(ApiError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial).map_err(|e| {
        ApiError::with_source(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to create file {}", partial.display()),
            e,
        )
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    let mut last_progress = 0;

    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| {
            ApiError::with_source(ErrorCode::ModelDownloadFailed, "Failed to read response", e)
        })?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            ApiError::with_source(ErrorCode::ModelDownloadFailed, "Failed to write file", e)
        })?;
        downloaded += bytes_read as u64;

        if total_size > 0 {
            let progress = (downloaded * 100 / total_size) as usize;
            if progress >= last_progress + 10 {
                tracing::debug!(file = %filename, progress, "download progress");
                last_progress = progress;
            }
        }
    }

    fs::rename(&partial, dest).map_err(|e| {
        ApiError::model_download_failed(format!("Failed to finish {}: {}", dest.display(), e))
    })?;

    tracing::info!(
        file = %filename,
        size_mb = format!("{:.1}", downloaded as f64 / (1024.0 * 1024.0)),
        "download complete"
    );
    Ok(())
}
