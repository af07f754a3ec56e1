//! Decoding of uploaded audio files.
//!
//! Probes the container with symphonia, decodes the first audio track to
//! interleaved f32 and downmixes it to mono.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{ApiError, Result};

use super::Waveform;

/// Decodes an uploaded file into a mono waveform at its native sample rate.
///
/// Multi-channel audio is averaged across channels. Every failure is an
/// `INVALID_AUDIO` error.
pub fn decode_audio(bytes: &[u8]) -> Result<Waveform> {
    if bytes.is_empty() {
        return Err(ApiError::invalid_audio("file is empty"));
    }

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| ApiError::invalid_audio(format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ApiError::invalid_audio("no audio track found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ApiError::invalid_audio("unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ApiError::invalid_audio(format!("unsupported codec: {}", e)))?;

    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(ApiError::invalid_audio(format!("read error: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count();
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                mono.extend(downmix_to_mono(buffer.samples(), channels));
            }
            // Corrupt packets are skipped
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(ApiError::invalid_audio(format!("decode error: {}", e))),
        }
    }

    if mono.is_empty() {
        return Err(ApiError::invalid_audio("no samples decoded"));
    }

    Ok(Waveform::new(mono, sample_rate))
}

/// Averages interleaved multi-channel samples into one channel.
///
/// A trailing partial frame is dropped.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
