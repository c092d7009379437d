//! Spectral framer: fixed window/hop STFT over multichannel signals.

use std::f64::consts::TAU;

use anyhow::{ensure, Result};
use ndarray::Array3;
use num_complex::Complex64;
use rustfft::FftPlanner;

use super::MultichannelSignal;
use crate::types::SpectralTensor;

/// Short-time Fourier transform of a multichannel signal.
///
/// Returns a one-sided complex tensor indexed [channel, bin, frame] with
/// `window_size / 2 + 1` bins. Frames are Hann-windowed and advanced by
/// `hop_size` samples; the trailing remainder that does not fill a whole
/// window is not framed.
pub fn frame(
    signal: &MultichannelSignal,
    window_size: usize,
    hop_size: usize,
) -> Result<SpectralTensor> {
    ensure!(window_size >= 2, "FFT window must span at least 2 samples");
    ensure!(hop_size >= 1, "hop size must be at least 1 sample");
    let samples = signal.samples();
    ensure!(
        samples >= window_size,
        "signal has {} samples, shorter than one {}-sample window",
        samples,
        window_size
    );

    let frames = (samples - window_size) / hop_size + 1;
    let bins = window_size / 2 + 1;
    let window = hann(window_size);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(window_size);

    let mut out = Array3::zeros((signal.channels(), bins, frames));
    let mut buffer = vec![Complex64::new(0.0, 0.0); window_size];
    for ch in 0..signal.channels() {
        for f in 0..frames {
            let start = f * hop_size;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex64::new(signal.data[[ch, start + i]] * window[i], 0.0);
            }
            fft.process(&mut buffer);
            for (k, value) in buffer.iter().take(bins).enumerate() {
                out[[ch, k, f]] = *value;
            }
        }
    }

    Ok(out)
}

/// Periodic Hann window.
fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (TAU * i as f64 / size as f64).cos())
        .collect()
}
