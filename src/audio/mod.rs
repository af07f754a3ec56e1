//! Audio input and output.
//!
//! Decodes uploaded audio into mono waveforms, resamples between model
//! rates, and renders WAV responses.

pub mod decode;
pub mod resample;
pub mod wav;

// Re-export commonly used items
pub use decode::{decode_audio, downmix_to_mono};
pub use resample::resample;
pub use wav::{samples_to_duration, write_wav_to_buffer, CHANNELS, SAMPLE_RATE};

/// Mono audio samples with their sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Samples in the range [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Waveform {
    /// Creates a waveform from samples and their rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration in seconds.
    pub fn duration_sec(&self) -> f32 {
        samples_to_duration(self.samples.len(), self.sample_rate)
    }

    /// Returns true if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns this waveform converted to `sample_rate`.
    pub fn resampled(self, sample_rate: u32) -> crate::error::Result<Self> {
        if self.sample_rate == sample_rate {
            return Ok(self);
        }
        let samples = resample(&self.samples, self.sample_rate, sample_rate)?;
        Ok(Self::new(samples, sample_rate))
    }
}
