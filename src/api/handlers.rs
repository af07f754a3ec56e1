//! Route handlers.
//!
//! Handlers parse and validate on the async side, then move all model work
//! onto the blocking pool where the model's mutex is taken with
//! `blocking_lock`. Every error is prefixed with the failed operation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::analysis::{self, AnalysisReport, DEFAULT_THRESHOLD};
use crate::audio::{decode_audio, write_wav_to_buffer, Waveform, SAMPLE_RATE};
use crate::error::{ApiError, Result};
use crate::generation;
use crate::types::GenerationRequest;

use super::server::AppState;
use super::types::{
    AnalysisResponse, AnalyzeQuery, DecodeRequest, EncodeResponse, HealthResponse, DEFAULT_CODEC,
};

/// Multipart field carrying the uploaded file.
const AUDIO_FIELD: &str = "audio_file";

// Extractor results, so rejections flow through `ApiError`
type JsonPayload<T> = std::result::Result<Json<T>, JsonRejection>;
type QueryPayload<T> = std::result::Result<Query<T>, QueryRejection>;
type MultipartPayload = std::result::Result<Multipart, MultipartRejection>;

/// Runs `f` on the blocking pool and flattens the join error.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("task join error: {}", e)))?
}

/// Unwraps a JSON body, turning a rejection into INVALID_PARAMS.
fn json_body<T>(payload: JsonPayload<T>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::invalid_params(format!("invalid JSON body: {}", e.body_text())))
}

fn query_params<T>(query: QueryPayload<T>) -> Result<T> {
    query
        .map(|Query(value)| value)
        .map_err(|e| ApiError::invalid_params(format!("invalid query string: {}", e.body_text())))
}

fn multipart_body(multipart: MultipartPayload) -> Result<Multipart> {
    multipart
        .map_err(|e| ApiError::invalid_audio(format!("invalid multipart body: {}", e.body_text())))
}

/// Renders a waveform as a downloadable WAV.
fn wav_response(waveform: &Waveform, name: &str) -> Result<Response> {
    let bytes = write_wav_to_buffer(&waveform.samples, waveform.sample_rate)?;
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}.wav\"", name))
        .map_err(|e| ApiError::internal(format!("invalid header: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Uploaded file plus any text fields of a multipart form.
#[derive(Default)]
struct UploadForm {
    audio: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::invalid_audio(format!("invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == AUDIO_FIELD {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::invalid_audio(format!("{} read error: {}", AUDIO_FIELD, e))
                })?;
                form.audio = Some(bytes.to_vec());
            } else if !name.is_empty() {
                let text = field.text().await.map_err(|e| {
                    ApiError::invalid_audio(format!("{} read error: {}", name, e))
                })?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    fn take_audio(&mut self) -> Result<Vec<u8>> {
        self.audio
            .take()
            .ok_or_else(|| ApiError::invalid_audio(format!("missing {} field", AUDIO_FIELD)))
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

async fn generate_with(
    state: Arc<AppState>,
    model_name: &'static str,
    request: JsonPayload<GenerationRequest>,
) -> Result<Response> {
    let request = json_body(request)?;
    let model = state.registry.generator(model_name)?;
    let max_duration = state.max_duration_sec;

    let waveform = run_blocking(move || {
        let mut model = model.blocking_lock();
        generation::generate(&mut **model, &request, max_duration)
    })
    .await?;

    wav_response(&waveform, model_name)
}

/// `POST /generate/music`
pub async fn generate_music(
    State(state): State<Arc<AppState>>,
    request: JsonPayload<GenerationRequest>,
) -> Result<Response> {
    generate_with(state, "musicgen", request)
        .await
        .map_err(|e| e.context("music generation failed"))
}

/// `POST /generate/audio`
pub async fn generate_audio(
    State(state): State<Arc<AppState>>,
    request: JsonPayload<GenerationRequest>,
) -> Result<Response> {
    generate_with(state, "audiogen", request)
        .await
        .map_err(|e| e.context("audio generation failed"))
}

/// `POST /encode`
pub async fn encode(
    State(state): State<Arc<AppState>>,
    multipart: MultipartPayload,
) -> Result<Json<EncodeResponse>> {
    encode_upload(state, multipart)
        .await
        .map(Json)
        .map_err(|e| e.context("encoding failed"))
}

async fn encode_upload(
    state: Arc<AppState>,
    multipart: MultipartPayload,
) -> Result<EncodeResponse> {
    let mut form = UploadForm::read(multipart_body(multipart)?).await?;
    let model_name = form.field("model").unwrap_or(DEFAULT_CODEC).to_string();
    let codec = state.registry.codec(&model_name)?;
    let bytes = form.take_audio()?;

    let codes = run_blocking(move || {
        let waveform = decode_audio(&bytes)?;
        let mut codec = codec.blocking_lock();
        tracing::debug!(
            from = waveform.sample_rate,
            to = codec.sample_rate(),
            "encoding upload"
        );
        codec.encode(&waveform)
    })
    .await?;

    tracing::info!(
        model = %model_name,
        codebooks = codes.len(),
        frames = codes.first().map_or(0, Vec::len),
        "encoded"
    );
    Ok(EncodeResponse { codes })
}

/// `POST /decode`
pub async fn decode(
    State(state): State<Arc<AppState>>,
    request: JsonPayload<DecodeRequest>,
) -> Result<Response> {
    decode_codes(state, request)
        .await
        .and_then(|waveform| wav_response(&waveform, "decoded"))
        .map_err(|e| e.context("decoding failed"))
}

async fn decode_codes(
    state: Arc<AppState>,
    request: JsonPayload<DecodeRequest>,
) -> Result<Waveform> {
    let request = json_body(request)?;
    let codec = state.registry.codec(&request.model)?;
    let codes = request.codes;

    let waveform = run_blocking(move || {
        let waveform = codec.blocking_lock().decode(&codes)?;
        waveform.resampled(SAMPLE_RATE)
    })
    .await?;

    tracing::info!(
        model = %request.model,
        seconds = waveform.duration_sec(),
        "decoded"
    );
    Ok(waveform)
}

/// `POST /analyze`
///
/// The threshold may come from the query string or a form field; the form
/// field wins.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    query: QueryPayload<AnalyzeQuery>,
    multipart: MultipartPayload,
) -> Result<Json<AnalysisResponse>> {
    analyze_upload(state, query, multipart)
        .await
        .map(|report| Json(AnalysisResponse::from(report)))
        .map_err(|e| e.context("analysis failed"))
}

async fn analyze_upload(
    state: Arc<AppState>,
    query: QueryPayload<AnalyzeQuery>,
    multipart: MultipartPayload,
) -> Result<AnalysisReport> {
    let query = query_params(query)?;
    let mut form = UploadForm::read(multipart_body(multipart)?).await?;
    let threshold = match form.field("threshold") {
        Some(raw) => raw.parse::<f32>().map_err(|_| {
            ApiError::invalid_params(format!("threshold must be a number, got '{}'", raw))
        })?,
        None => query.threshold.unwrap_or(DEFAULT_THRESHOLD),
    };
    let bytes = form.take_audio()?;

    run_blocking(move || {
        let waveform = decode_audio(&bytes)?;
        analysis::analyze(&state.registry, &waveform, threshold)
    })
    .await
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.registry.model_names(),
        state.registry.discriminator_names(),
    ))
}
