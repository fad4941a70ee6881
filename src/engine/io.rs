//! WAV file I/O
//!
//! Rendered soundscapes are written as WAV at the buffer's own sample
//! rate: 16- and 24-bit integer PCM, or 32-bit float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{LullError, Result};

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24, or 32 (default: 24)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

impl ExportFormat {
    pub fn new(bit_depth: u16) -> Self {
        ExportFormat { bit_depth }
    }

    /// 16-bit integer PCM
    pub fn cd_quality() -> Self {
        ExportFormat { bit_depth: 16 }
    }

    /// 32-bit float
    pub fn float() -> Self {
        ExportFormat { bit_depth: 32 }
    }

    fn spec(&self, channels: u16, sample_rate: u32) -> Result<WavSpec> {
        let sample_format = match self.bit_depth {
            16 | 24 => SampleFormat::Int,
            32 => SampleFormat::Float,
            other => {
                return Err(LullError::UnsupportedFormat {
                    format: format!("{}-bit audio (only 16, 24, 32 supported)", other),
                })
            }
        };
        Ok(WavSpec {
            channels,
            sample_rate,
            bits_per_sample: self.bit_depth,
            sample_format,
        })
    }
}

fn wav_error(e: hound::Error) -> LullError {
    match e {
        hound::Error::IoError(io) => LullError::Io(io),
        other => LullError::Io(std::io::Error::new(std::io::ErrorKind::Other, other.to_string())),
    }
}

/// Export an AudioBuffer to a WAV file
///
/// # Arguments
/// * `buffer` - The audio buffer to export
/// * `path` - Path where the file will be written
/// * `format` - Bit depth of the written samples
///
/// # Errors
/// * `UnsupportedFormat` - If the bit depth is not 16, 24 or 32
/// * `Io` - If the file cannot be written
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let spec = format.spec(buffer.num_channels() as u16, buffer.sample_rate)?;
    let interleaved = buffer.to_interleaved();

    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(wav_error)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(wav_error)?;
            }
        }
    }

    writer.finalize().map_err(wav_error)?;
    debug!(
        path = %path.display(),
        bit_depth = format.bit_depth,
        frames = buffer.len(),
        "exported WAV"
    );
    Ok(())
}

/// Read a mono or stereo WAV file into a float buffer
///
/// # Errors
/// * `UnsupportedFormat` - If the file has more than two channels
/// * `Io` - If the file cannot be read or is not WAV
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let layout = ChannelLayout::from_count(channels).ok_or_else(|| LullError::UnsupportedFormat {
        format: format!("{}-channel audio (only mono/stereo supported)", channels),
    })?;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(wav_error)?,
        SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_error)?
        }
    };

    let frames = interleaved.len() / channels;
    let mut buffer = AudioBuffer::new(frames, layout, spec.sample_rate);
    for (i, sample) in interleaved.into_iter().enumerate() {
        buffer.samples[i % channels][i / channels] = sample;
    }
    Ok(buffer)
}
