//! ONNX Runtime session helpers shared by every model wrapper.

use std::path::Path;

use half::f16;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::Session;
use ort::value::DynValue;

use crate::config::Device;
use crate::error::{ApiError, Result};

/// How sessions are built: execution device and intra-op thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    /// Execution device.
    pub device: Device,
    /// Intra-op threads; None lets ONNX Runtime decide.
    pub threads: Option<usize>,
}

impl SessionOptions {
    /// Creates options for the given device and thread count.
    pub fn new(device: Device, threads: Option<usize>) -> Self {
        Self { device, threads }
    }
}

/// Returns execution providers in priority order for a device.
///
/// `Auto` tries CUDA, then CoreML, then falls back to CPU. ONNX Runtime
/// skips providers that are unavailable in the current build.
pub fn execution_providers(device: Device) -> Vec<ExecutionProviderDispatch> {
    match device {
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
        Device::Cuda => vec![
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::Metal => vec![
            CoreMLExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::Auto => vec![
            CUDAExecutionProvider::default().build(),
            CoreMLExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ],
    }
}

/// Loads one ONNX graph into a session.
pub fn load_session(path: &Path, options: SessionOptions) -> Result<Session> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if !path.exists() {
        return Err(ApiError::model_not_found(path.display().to_string()));
    }

    let mut builder = Session::builder()
        .map_err(|e| ApiError::model_load_failed(format!("Failed to create session: {}", e)))?
        .with_execution_providers(execution_providers(options.device))
        .map_err(|e| {
            ApiError::model_load_failed(format!("Failed to set execution providers: {}", e))
        })?;

    if let Some(threads) = options.threads {
        builder = builder.with_intra_threads(threads).map_err(|e| {
            ApiError::model_load_failed(format!("Failed to set thread count: {}", e))
        })?;
    }

    let session = builder
        .commit_from_file(path)
        .map_err(|e| ApiError::model_load_failed(format!("Failed to load {}: {}", file_name, e)))?;

    tracing::debug!(model = %file_name, device = %options.device, "session ready");
    Ok(session)
}

/// Copies a float tensor out of a session output, converting f16 to f32.
///
/// Returns `(shape, data)`.
pub fn extract_f32(value: &DynValue) -> Result<(Vec<usize>, Vec<f32>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.to_vec()));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.iter().map(|e| f32::from(*e)).collect()));
    }
    Err(ApiError::model_inference_failed(
        "Output tensor must be f32 or f16",
    ))
}

/// Copies an integer tensor out of a session output as i64.
pub fn extract_i64(value: &DynValue) -> Result<(Vec<usize>, Vec<i64>)> {
    if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.to_vec()));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
        let shape = shape.iter().map(|&d| d as usize).collect();
        return Ok((shape, data.iter().map(|&e| e as i64).collect()));
    }
    Err(ApiError::model_inference_failed(
        "Code tensor must be i64 or i32",
    ))
}
