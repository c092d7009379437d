//! Per-run persistence: three array dumps keyed by frame order.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::types::RunRecords;

/// Write `decomposed_values.json`, `decomposed_vectors.json`, and
/// `spectra.json` under `dir`, one outer element per analysis frame in
/// insertion order. Called even for failed runs so partial results remain
/// available for post-mortem analysis.
pub fn write_records(dir: &Path, records: &RunRecords) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create run output directory {:?}", dir))?;

    let values: Vec<&Array1<f64>> = records.iter().map(|r| &r.eigenvalues).collect();
    let vectors: Vec<&Array2<Complex64>> = records.iter().map(|r| &r.eigenvectors).collect();
    let spectra: Vec<&Array1<f64>> = records.iter().map(|r| &r.spectrum).collect();

    write_json(&dir.join("decomposed_values.json"), &values)?;
    write_json(&dir.join("decomposed_vectors.json"), &vectors)?;
    write_json(&dir.join("spectra.json"), &spectra)?;
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string(value)
        .with_context(|| format!("failed to serialize {:?}", path))?;
    fs::write(path, data).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
