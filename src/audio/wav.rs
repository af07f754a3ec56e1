//! WAV rendering for audio responses.
//!
//! Writes mono 32-bit float WAV using the hound crate.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{ApiError, Result};

/// Sample rate of every generated or decoded response (32kHz).
pub const SAMPLE_RATE: u32 = 32000;

/// Number of audio channels written (mono).
pub const CHANNELS: u16 = 1;

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Writes audio samples to an in-memory WAV buffer.
///
/// Returns the WAV file contents as a byte vector.
pub fn write_wav_to_buffer(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());

    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec(sample_rate))
            .map_err(|e| ApiError::internal(format!("Failed to create WAV writer: {}", e)))?;

        for sample in samples {
            writer
                .write_sample(*sample)
                .map_err(|e| ApiError::internal(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| ApiError::internal(format!("Failed to finalize WAV buffer: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Calculates the duration of audio in seconds from sample count.
pub fn samples_to_duration(sample_count: usize, sample_rate: u32) -> f32 {
    sample_count as f32 / sample_rate as f32
}
