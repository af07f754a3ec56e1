//! HTTP API.
//!
//! Routes:
//! - `POST /generate/music`: MusicGen text-to-music
//! - `POST /generate/audio`: AudioGen text-to-sound
//! - `POST /encode`: audio file to codec codes
//! - `POST /decode`: codec codes to audio
//! - `POST /analyze`: real/fake discriminator scores
//! - `GET /health`: liveness and served model names

pub mod handlers;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{bind, router, serve, AppState, MAX_UPLOAD_BYTES};
pub use types::{AnalysisResponse, AnalyzeQuery, DecodeRequest, EncodeResponse, HealthResponse};
