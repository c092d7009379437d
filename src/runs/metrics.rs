//! Scoring: frame-averaged spectrum peaks against sorted ground truth.

use std::f64::consts::TAU;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::types::RunRecords;

#[derive(Debug, Serialize)]
pub struct RunMetrics {
    /// Peak angles from the frame-averaged spectrum, radians, ascending.
    pub estimated_angles: Vec<f64>,
    /// Ground-truth angles, radians, ascending.
    pub ground_truth: Vec<f64>,
    /// Mean absolute wrapped angular error over paired angles; absent when
    /// either side is empty.
    pub mean_absolute_error_rad: Option<f64>,
}

/// Score a run and write `metrics.json` into its output directory.
pub fn export_metrics(
    dir: &Path,
    records: &RunRecords,
    grid: &[f64],
    ground_truth: &[f64],
    num_sources: usize,
) -> Result<()> {
    let metrics = score(records, grid, ground_truth, num_sources);
    let data =
        serde_json::to_string_pretty(&metrics).context("failed to serialize run metrics")?;
    let path = dir.join("metrics.json");
    fs::write(&path, data).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

/// Average the per-frame spectra, pick the strongest circular peaks, and
/// compare against the sorted ground truth pairwise.
pub fn score(
    records: &RunRecords,
    grid: &[f64],
    ground_truth: &[f64],
    num_sources: usize,
) -> RunMetrics {
    let mean = mean_spectrum(records, grid.len());
    let mut estimated = peak_angles(&mean, grid, num_sources);
    estimated.sort_by(f64::total_cmp);

    let paired = estimated.len().min(ground_truth.len());
    let mean_absolute_error_rad = if paired == 0 {
        None
    } else {
        let total: f64 = estimated
            .iter()
            .zip(ground_truth)
            .take(paired)
            .map(|(est, truth)| wrapped_error(*est, *truth))
            .sum();
        Some(total / paired as f64)
    };

    RunMetrics {
        estimated_angles: estimated,
        ground_truth: ground_truth.to_vec(),
        mean_absolute_error_rad,
    }
}

fn mean_spectrum(records: &RunRecords, grid_len: usize) -> Vec<f64> {
    let mut mean = vec![0.0; grid_len];
    let mut frames = 0usize;
    for record in records.iter() {
        if record.spectrum.len() != grid_len {
            continue;
        }
        for (slot, value) in mean.iter_mut().zip(record.spectrum.iter()) {
            *slot += value;
        }
        frames += 1;
    }
    if frames > 0 {
        let scale = frames as f64;
        mean.iter_mut().for_each(|v| *v /= scale);
    }
    mean
}

/// Strongest `count` local maxima on the circular spectrum, as grid angles.
fn peak_angles(spectrum: &[f64], grid: &[f64], count: usize) -> Vec<f64> {
    let n = spectrum.len();
    if n < 3 {
        return Vec::new();
    }
    let mut peaks: Vec<(f64, usize)> = (0..n)
        .filter(|&i| {
            let prev = spectrum[(i + n - 1) % n];
            let next = spectrum[(i + 1) % n];
            spectrum[i] >= prev && spectrum[i] >= next && (spectrum[i] > prev || spectrum[i] > next)
        })
        .map(|i| (spectrum[i], i))
        .collect();
    peaks.sort_by(|a, b| b.0.total_cmp(&a.0));
    peaks.into_iter().take(count).map(|(_, i)| grid[i]).collect()
}

/// Absolute angular distance on the circle.
fn wrapped_error(a: f64, b: f64) -> f64 {
    let distance = (a - b).rem_euclid(TAU);
    distance.min(TAU - distance)
}
