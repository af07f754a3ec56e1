//! Real/fake analysis of uploaded audio.
//!
//! Each discriminator scores the waveform with the mean sigmoid of its first
//! sub-discriminator's logits. The verdict compares the mean of the three
//! scores against a threshold.

use ndarray::{ArrayD, Axis, IxDyn};

use crate::audio::Waveform;
use crate::error::{ApiError, Result};
use crate::models::{DiscriminatorOutput, FeatureTensor, ModelRegistry};

/// Discriminators consulted, in the order their feature maps are reported.
pub const DISCRIMINATORS: [&str; 3] = ["mpd", "msd", "msstftd"];

/// Threshold used when the request does not give one.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Scores, flattened feature maps and verdict for one waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub mpd_score: f32,
    pub msd_score: f32,
    pub msstftd_score: f32,
    /// One entry per layer of every sub-discriminator, mpd first.
    pub feature_maps: Vec<Vec<f32>>,
    pub is_real: bool,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Mean of the logistic function over every element.
pub fn sigmoid_mean(logits: &FeatureTensor) -> Result<f32> {
    if logits.data.is_empty() {
        return Err(ApiError::model_inference_failed("logits tensor is empty"));
    }
    let sum: f64 = logits.data.iter().map(|&x| sigmoid(x) as f64).sum();
    Ok((sum / logits.data.len() as f64) as f32)
}

/// Score of one discriminator: `sigmoid_mean` of its first logits.
pub fn discriminator_score(output: &DiscriminatorOutput) -> Result<f32> {
    let first = output
        .logits
        .first()
        .ok_or_else(|| ApiError::model_inference_failed("discriminator returned no logits"))?;
    sigmoid_mean(first)
}

/// Averages a `[batch, channels, ...]` feature map over channels and
/// flattens the rest. Tensors with fewer than two dimensions are flattened
/// as they are.
pub fn channel_mean_flatten(tensor: &FeatureTensor) -> Result<Vec<f32>> {
    if tensor.shape.len() < 2 {
        return Ok(tensor.data.clone());
    }
    let array = ArrayD::from_shape_vec(IxDyn(&tensor.shape), tensor.data.clone()).map_err(|e| {
        ApiError::model_inference_failed(format!("Invalid feature map shape: {}", e))
    })?;
    Ok(array
        .mean_axis(Axis(1))
        .map(|mean| mean.iter().copied().collect())
        .unwrap_or_default())
}

/// Verdict: the mean score is strictly above `threshold`.
///
/// Any threshold is accepted: `-inf` always passes, `inf` and NaN never do.
pub fn is_real(scores: [f32; 3], threshold: f32) -> bool {
    scores.iter().sum::<f32>() / 3.0 > threshold
}

/// Builds the report from the three discriminator outputs, in
/// [`DISCRIMINATORS`] order.
pub fn build_report(outputs: &[DiscriminatorOutput; 3], threshold: f32) -> Result<AnalysisReport> {
    let scores = [
        discriminator_score(&outputs[0])?,
        discriminator_score(&outputs[1])?,
        discriminator_score(&outputs[2])?,
    ];

    let mut feature_maps = Vec::new();
    for output in outputs {
        for layers in &output.feature_maps {
            for layer in layers {
                feature_maps.push(channel_mean_flatten(layer)?);
            }
        }
    }

    Ok(AnalysisReport {
        mpd_score: scores[0],
        msd_score: scores[1],
        msstftd_score: scores[2],
        feature_maps,
        is_real: is_real(scores, threshold),
    })
}

/// Runs all three discriminators on `waveform`.
///
/// Blocks on each model's lock; call from a blocking context.
pub fn analyze(
    registry: &ModelRegistry,
    waveform: &Waveform,
    threshold: f32,
) -> Result<AnalysisReport> {
    if waveform.is_empty() {
        return Err(ApiError::invalid_audio("no samples to analyze"));
    }

    let [mpd, msd, msstftd] = DISCRIMINATORS.map(|name| registry.discriminator(name));
    let (mpd, msd, msstftd) = (mpd?, msd?, msstftd?);

    let outputs = [
        mpd.blocking_lock().forward(waveform)?,
        msd.blocking_lock().forward(waveform)?,
        msstftd.blocking_lock().forward(waveform)?,
    ];

    let report = build_report(&outputs, threshold)?;
    tracing::info!(
        mpd = report.mpd_score,
        msd = report.msd_score,
        msstftd = report.msstftd_score,
        threshold,
        is_real = report.is_real,
        "analysis complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fake::fake_registry;

    fn tensor(shape: Vec<usize>, data: Vec<f32>) -> FeatureTensor {
        FeatureTensor::new(shape, data).unwrap()
    }

    fn output(logit: f32) -> DiscriminatorOutput {
        DiscriminatorOutput {
            logits: vec![tensor(vec![1, 2], vec![logit; 2]), tensor(vec![1], vec![100.0])],
            feature_maps: vec![vec![tensor(vec![1, 2, 2], vec![1.0, 2.0, 3.0, 4.0])]],
        }
    }

    #[test]
    fn sigmoid_mean_of_zeros_is_half() {
        let t = tensor(vec![3], vec![0.0; 3]);
        assert!((sigmoid_mean(&t).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn sigmoid_mean_averages() {
        let t = tensor(vec![2], vec![50.0, -50.0]);
        assert!((sigmoid_mean(&t).unwrap() - 0.5).abs() < 1e-6);
        assert!(sigmoid_mean(&tensor(vec![0], vec![])).is_err());
    }

    #[test]
    fn score_uses_first_sub_discriminator() {
        assert!((discriminator_score(&output(0.0)).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn channel_mean_over_dim_one() {
        // [1, 2, 2]: channels [1, 2] and [3, 4] average to [2, 3]
        let t = tensor(vec![1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(channel_mean_flatten(&t).unwrap(), vec![2.0, 3.0]);

        let t = tensor(vec![1, 2, 2, 2], (0..8).map(|i| i as f32).collect());
        assert_eq!(channel_mean_flatten(&t).unwrap(), vec![2.0, 3.0, 4.0, 5.0]);

        let flat = tensor(vec![3], vec![1.0, 2.0, 3.0]);
        assert_eq!(channel_mean_flatten(&flat).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn verdict_is_strict() {
        assert!(!is_real([0.5, 0.5, 0.5], 0.5));
        assert!(is_real([0.6, 0.5, 0.5], 0.5));
        assert!(!is_real([0.9, 0.9, 0.9], 0.95));
    }

    #[test]
    fn report_collects_feature_maps_in_order() {
        let outputs = [output(0.0), output(10.0), output(-10.0)];
        let report = build_report(&outputs, 0.5).unwrap();
        assert_eq!(report.feature_maps.len(), 3);
        assert_eq!(report.feature_maps[0], vec![2.0, 3.0]);
        let mean = (report.mpd_score + report.msd_score + report.msstftd_score) / 3.0;
        assert_eq!(report.is_real, mean > 0.5);
    }

    #[test]
    fn analyze_with_registry() {
        let registry = fake_registry();
        let waveform = Waveform::new(vec![0.1; 400], 24000);
        let report = analyze(&registry, &waveform, 0.4).unwrap();

        // sigmoid(2) + sigmoid(0) + sigmoid(-2) averages to exactly 0.5
        let mean = (report.mpd_score + report.msd_score + report.msstftd_score) / 3.0;
        assert!((mean - 0.5).abs() < 1e-5);
        assert!(report.is_real);
        assert!(!analyze(&registry, &waveform, 0.6).unwrap().is_real);
        // Two layers per discriminator
        assert_eq!(report.feature_maps.len(), 6);
    }

    #[test]
    fn verdict_with_non_finite_threshold() {
        assert!(is_real([0.0, 0.0, 0.0], f32::NEG_INFINITY));
        assert!(!is_real([1.0, 1.0, 1.0], f32::INFINITY));
        assert!(!is_real([1.0, 1.0, 1.0], f32::NAN));
    }

    #[test]
    fn analyze_accepts_any_threshold() {
        let registry = fake_registry();
        let waveform = Waveform::new(vec![0.1; 10], 24000);
        assert!(analyze(&registry, &waveform, f32::NEG_INFINITY).unwrap().is_real);
        assert!(!analyze(&registry, &waveform, f32::INFINITY).unwrap().is_real);
        assert!(!analyze(&registry, &waveform, f32::NAN).unwrap().is_real);
    }
}
