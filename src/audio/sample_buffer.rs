use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use super::frame::StereoFrame;
use crate::error::{LoadError, LoadResult};

/// A decoded, ready-to-play sound at the output's sample rate.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    /// Decode WAV bytes and resample them to `target_rate`. `origin` is only
    /// used to make errors readable.
    pub fn decode_wav(bytes: &[u8], target_rate: u32, origin: &str) -> LoadResult<Self> {
        let decode_err = |e: hound::Error| LoadError::Decode {
            url: origin.to_string(),
            reason: e.to_string(),
        };

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(decode_err)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader // float, just pass it through
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(LoadError::UnsupportedFormat {
                        url: origin.to_string(),
                        format: format!("{}-bit int", spec.bits_per_sample),
                    });
                }
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(decode_err)?
            }
        };

        // mono gets duplicated, anything wider keeps its first two channels
        let frames: Vec<StereoFrame> = if channels == 1 {
            samples.into_iter().map(StereoFrame::mono).collect()
        } else {
            samples
                .chunks_exact(channels)
                .map(|c| StereoFrame { left: c[0], right: c[1] })
                .collect()
        };

        let data = resample_linear(&frames, spec.sample_rate, target_rate);
        Ok(Self { data, sample_rate: target_rate })
    }

    pub fn load_wav(path: &Path, target_rate: u32) -> LoadResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::decode_wav(&bytes, target_rate, &path.display().to_string())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.data.len() as f64 / self.sample_rate as f64)
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    // plain linear interpolation; good enough for one-shot drum hits
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len().saturating_sub(1) {
            out.push(frames.last().copied().unwrap_or_default());
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

/// Build a WAV file in memory. Test fixtures use this instead of checked-in
/// audio files.
#[cfg(test)]
pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
