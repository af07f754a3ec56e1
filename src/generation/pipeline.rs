//! Generation pipeline shared by `/generate/music` and `/generate/audio`.

use crate::audio::{Waveform, SAMPLE_RATE};
use crate::error::Result;
use crate::models::TextToAudio;
use crate::types::GenerationRequest;

/// Generates audio for one request at [`SAMPLE_RATE`].
///
/// The request is validated against `max_duration_sec`, its parameters are
/// handed to the model unmodified and the model output is resampled from
/// its native rate.
pub fn generate(
    model: &mut dyn TextToAudio,
    request: &GenerationRequest,
    max_duration_sec: f32,
) -> Result<Waveform> {
    request.validate(max_duration_sec)?;

    tracing::info!(
        prompt = %request.text,
        duration = request.duration,
        temperature = request.temperature,
        top_k = request.top_k,
        top_p = request.top_p,
        cfg_coef = request.cfg_coef,
        "generating"
    );

    model.set_generation_params(request.params());
    let waveform = model.generate(&request.text)?;
    let native_rate = waveform.sample_rate;
    let waveform = waveform.resampled(SAMPLE_RATE)?;

    tracing::info!(
        samples = waveform.samples.len(),
        native_rate,
        seconds = waveform.duration_sec(),
        "generation complete"
    );
    Ok(waveform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::fake::FakeGenerator;

    #[test]
    fn output_is_32khz() {
        let mut model = FakeGenerator::new(32000);
        let mut request = GenerationRequest::new("calm piano");
        request.duration = 1.5;

        let waveform = generate(&mut model, &request, 30.0).unwrap();
        assert_eq!(waveform.sample_rate, SAMPLE_RATE);
        assert_eq!(waveform.samples.len(), 48000);
    }

    #[test]
    fn lower_rate_models_are_resampled() {
        let mut model = FakeGenerator::new(16000);
        let mut request = GenerationRequest::new("dog barking");
        request.duration = 1.0;

        let waveform = generate(&mut model, &request, 30.0).unwrap();
        assert_eq!(waveform.sample_rate, SAMPLE_RATE);
        assert_eq!(waveform.samples.len(), 32000);
    }

    #[test]
    fn rejects_before_generating() {
        let mut model = FakeGenerator::new(32000);
        let mut request = GenerationRequest::new("too long");
        request.duration = 60.0;

        let err = generate(&mut model, &request, 30.0).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }

    #[test]
    fn model_errors_propagate() {
        let mut model = FakeGenerator::new(32000);
        let err = generate(&mut model, &GenerationRequest::new("fail"), 30.0).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelInferenceFailed);
    }
}
