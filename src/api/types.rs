//! Request and response bodies.
//!
//! `GenerationRequest` lives in [`crate::types`] since the generation
//! pipeline uses it directly.

use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisReport;
use crate::models::Codes;

/// Codec used when a request names none.
pub const DEFAULT_CODEC: &str = "encodec";

fn default_codec() -> String {
    DEFAULT_CODEC.to_string()
}

/// Response of `POST /encode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeResponse {
    /// Codes shaped `[codebook][frame]`.
    pub codes: Codes,
}

/// Body of `POST /decode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeRequest {
    /// Codes shaped `[codebook][frame]`.
    pub codes: Codes,
    /// Codec to decode with.
    #[serde(default = "default_codec")]
    pub model: String,
}

/// Query string of `POST /analyze`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub threshold: Option<f32>,
}

/// Response of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub mpd_score: f32,
    pub msd_score: f32,
    pub msstftd_score: f32,
    pub feature_maps: Vec<Vec<f32>>,
    pub is_real: bool,
}

impl From<AnalysisReport> for AnalysisResponse {
    fn from(report: AnalysisReport) -> Self {
        Self {
            mpd_score: report.mpd_score,
            msd_score: report.msd_score,
            msstftd_score: report.msstftd_score,
            feature_maps: report.feature_maps,
            is_real: report.is_real,
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: Vec<String>,
    pub discriminators: Vec<String>,
}

impl HealthResponse {
    /// A healthy response listing the served names.
    pub fn healthy(models: Vec<String>, discriminators: Vec<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            models,
            discriminators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_request_defaults_to_encodec() {
        let req: DecodeRequest = serde_json::from_str(r#"{"codes": [[1, 2], [3, 4]]}"#).unwrap();
        assert_eq!(req.model, "encodec");
        assert_eq!(req.codes, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn health_reports_crate_version() {
        let health = HealthResponse::healthy(vec![], vec![]);
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, "1.0.0");
    }

    #[test]
    fn analysis_response_field_names() {
        let response = AnalysisResponse {
            mpd_score: 0.1,
            msd_score: 0.2,
            msstftd_score: 0.3,
            feature_maps: vec![vec![1.0]],
            is_real: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        for key in ["mpd_score", "msd_score", "msstftd_score", "feature_maps", "is_real"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
