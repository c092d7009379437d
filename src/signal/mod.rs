//! Signal store: persisted time-domain signals and ground-truth angles.

pub mod framer;

use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use ndarray::Array2;

/// Multichannel time-domain signal as loaded from a WAV file.
#[derive(Debug, Clone)]
pub struct MultichannelSignal {
    /// Samples indexed [channel, sample], normalized to [-1, 1].
    pub data: Array2<f64>,
    pub sample_rate: u32,
}

impl MultichannelSignal {
    pub fn channels(&self) -> usize {
        self.data.dim().0
    }

    pub fn samples(&self) -> usize {
        self.data.dim().1
    }

    /// Load a multichannel WAV file. Integer and float formats are both
    /// normalized to f64.
    pub fn from_wav(path: &Path) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open WAV file {:?}", path))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        ensure!(channels > 0, "WAV file {:?} reports zero channels", path);

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("failed to read float samples from {:?}", path))?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .with_context(|| format!("failed to read integer samples from {:?}", path))?
            }
        };

        let samples = interleaved.len() / channels;
        ensure!(samples > 0, "WAV file {:?} contains no samples", path);
        let data = Array2::from_shape_fn((channels, samples), |(c, s)| {
            interleaved[s * channels + c]
        });

        Ok(Self {
            data,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Load ground-truth source angles (radians, one per line), sorted ascending.
pub fn load_ground_truth(path: &Path) -> Result<Vec<f64>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read ground truth file {:?}", path))?;
    let mut angles = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f64>()
                .with_context(|| format!("invalid ground truth angle {:?} in {:?}", line, path))
        })
        .collect::<Result<Vec<f64>>>()?;
    angles.sort_by(f64::total_cmp);
    Ok(angles)
}
