//! Error types for the audiocraft API.
//!
//! Every failure is an [`ApiError`] carrying an [`ErrorCode`]. The code
//! decides the HTTP status: undecodable uploads are client errors, all
//! other failures surface as internal server errors.

use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error codes returned in the `error_code` field of error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Uploaded bytes could not be decoded as audio.
    /// Trigger: Unknown container, corrupt stream, empty file.
    InvalidAudio,

    /// A request named a model that is not registered for the operation.
    /// Trigger: `model` field not in the registry, or wrong model kind.
    UnknownModel,

    /// The named model does not implement the requested operation.
    /// Trigger: Encoding with a decode-only codec.
    UnsupportedOperation,

    /// Codec codes are empty or not rectangular.
    InvalidCodes,

    /// Generation or analysis parameters are out of range.
    InvalidParams,

    /// ONNX model files not found at expected path.
    ModelNotFound,

    /// Failed to load ONNX model into memory.
    ModelLoadFailed,

    /// Failed to download model from remote source.
    ModelDownloadFailed,

    /// Model inference failed.
    ModelInferenceFailed,

    /// Anything else (task join failures, WAV encoding).
    Internal,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAudio => "INVALID_AUDIO",
            ErrorCode::UnknownModel => "UNKNOWN_MODEL",
            ErrorCode::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ErrorCode::InvalidCodes => "INVALID_CODES",
            ErrorCode::InvalidParams => "INVALID_PARAMS",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAudio => "Uploaded file could not be decoded as audio",
            ErrorCode::UnknownModel => "No model with this name is registered for the operation",
            ErrorCode::UnsupportedOperation => "The model does not support this operation",
            ErrorCode::InvalidCodes => "Codec codes must be a non-empty rectangular matrix",
            ErrorCode::InvalidParams => "Request parameters are out of range",
            ErrorCode::ModelNotFound => "ONNX model files not found at expected path",
            ErrorCode::ModelLoadFailed => "Failed to load ONNX model into memory",
            ErrorCode::ModelDownloadFailed => "Failed to download model from remote source",
            ErrorCode::ModelInferenceFailed => "Model inference failed",
            ErrorCode::Internal => "Internal server error",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidAudio => {
                "Upload a WAV, FLAC, MP3 or OGG/Vorbis file in the `audio_file` field"
            }
            ErrorCode::UnknownModel => {
                "Use one of the names listed by GET /health for this operation"
            }
            ErrorCode::UnsupportedOperation => {
                "Use the `encodec` model for encoding; `multiband` only decodes"
            }
            ErrorCode::InvalidCodes => {
                "Send codes as [[codebook_0 frames...], [codebook_1 frames...], ...] \
                 with every row the same length, as returned by /encode"
            }
            ErrorCode::InvalidParams => {
                "Check duration (> 0 and within the configured maximum), \
                 temperature (>= 0) and top_p (between 0 and 1)"
            }
            ErrorCode::ModelNotFound => {
                "Place the exported ONNX files under <model_dir>/<model name>/, \
                 or start with --download to fetch MusicGen automatically"
            }
            ErrorCode::ModelLoadFailed => {
                "Check available memory, verify model files are not corrupted, \
                 or delete the model directory and re-export"
            }
            ErrorCode::ModelDownloadFailed => {
                "Check internet connection and disk space, \
                 or try again later if HuggingFace is unavailable"
            }
            ErrorCode::ModelInferenceFailed => {
                "Try a shorter duration or smaller input, or run with AUDIOCRAFT_DEVICE=cpu"
            }
            ErrorCode::Internal => "Retry the request; check the server log for details",
        }
    }

    /// Returns the HTTP status this code maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidAudio => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for API operations.
#[derive(Debug)]
pub struct ApiError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    /// Creates a new ApiError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ApiError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Prefixes the message with the failing operation, keeping the code.
    pub fn context(mut self, operation: &str) -> Self {
        self.message = format!("{}: {}", operation, self.message);
        self
    }

    /// Creates an INVALID_AUDIO error.
    pub fn invalid_audio(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidAudio,
            format!("Failed to decode audio: {}", reason.into()),
        )
    }

    /// Creates an UNKNOWN_MODEL error.
    pub fn unknown_model(name: &str, kind: &str) -> Self {
        Self::new(
            ErrorCode::UnknownModel,
            format!("Unknown {} model '{}'", kind, name),
        )
    }

    /// Creates an UNSUPPORTED_OPERATION error.
    pub fn unsupported(name: &str, operation: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedOperation,
            format!("Model '{}' does not support {}", name, operation),
        )
    }

    /// Creates an INVALID_CODES error.
    pub fn invalid_codes(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCodes, reason)
    }

    /// Creates an INVALID_PARAMS error.
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, reason)
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_INFERENCE_FAILED error.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelInferenceFailed,
            format!("Inference failed: {}", reason.into()),
        )
    }

    /// Creates an INTERNAL error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, reason)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub detail: String,
    /// Machine-readable [`ErrorCode`].
    pub error_code: &'static str,
    /// What the caller can do about it.
    pub recovery_hint: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        match &self.source {
            Some(source) => tracing::error!(
                code = %self.code,
                kind = self.code.description(),
                status = status.as_u16(),
                source = %source,
                "{}",
                self.message
            ),
            None => tracing::error!(
                code = %self.code,
                kind = self.code.description(),
                status = status.as_u16(),
                "{}",
                self.message
            ),
        }
        let body = ErrorBody {
            detail: self.message,
            error_code: self.code.as_str(),
            recovery_hint: self.code.recovery_hint(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias using ApiError.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::InvalidAudio.as_str(), "INVALID_AUDIO");
        assert_eq!(ErrorCode::UnknownModel.as_str(), "UNKNOWN_MODEL");
        assert_eq!(ErrorCode::UnsupportedOperation.as_str(), "UNSUPPORTED_OPERATION");
        assert_eq!(ErrorCode::InvalidCodes.as_str(), "INVALID_CODES");
        assert_eq!(ErrorCode::ModelNotFound.as_str(), "MODEL_NOT_FOUND");
        assert_eq!(ErrorCode::ModelInferenceFailed.as_str(), "MODEL_INFERENCE_FAILED");
    }

    #[test]
    fn only_invalid_audio_is_a_client_error() {
        assert_eq!(ErrorCode::InvalidAudio.status(), StatusCode::BAD_REQUEST);
        for code in [
            ErrorCode::UnknownModel,
            ErrorCode::UnsupportedOperation,
            ErrorCode::InvalidCodes,
            ErrorCode::InvalidParams,
            ErrorCode::ModelNotFound,
            ErrorCode::ModelLoadFailed,
            ErrorCode::ModelDownloadFailed,
            ErrorCode::ModelInferenceFailed,
            ErrorCode::Internal,
        ] {
            assert_eq!(code.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", code);
        }
    }

    #[test]
    fn recovery_hints_not_empty() {
        assert!(!ErrorCode::InvalidAudio.recovery_hint().is_empty());
        assert!(!ErrorCode::UnknownModel.recovery_hint().is_empty());
        assert!(!ErrorCode::ModelNotFound.recovery_hint().is_empty());
        assert!(!ErrorCode::Internal.recovery_hint().is_empty());
    }

    #[test]
    fn context_prefixes_message() {
        let err = ApiError::unknown_model("foo", "codec").context("Encoding failed");
        assert_eq!(err.code, ErrorCode::UnknownModel);
        assert_eq!(err.message, "Encoding failed: Unknown codec model 'foo'");
        assert!(err.to_string().contains("UNKNOWN_MODEL"));
    }

    #[test]
    fn source_is_kept() {
        use std::error::Error;

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ApiError::with_source(ErrorCode::ModelDownloadFailed, "write failed", io);
        assert_eq!(err.source().map(|e| e.to_string()), Some("gone".to_string()));
    }

    #[tokio::test]
    async fn response_body_carries_code_and_hint() {
        let response = ApiError::unsupported("multiband", "encoding").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error_code"], "UNSUPPORTED_OPERATION");
        assert_eq!(
            body["recovery_hint"],
            ErrorCode::UnsupportedOperation.recovery_hint()
        );
        assert!(body["detail"].as_str().unwrap().contains("multiband"));
    }
}
