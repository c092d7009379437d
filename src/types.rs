//! Core types for the doalab estimation pipeline

use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use serde::Serialize;

/// Complex time-frequency representation indexed [channel, frequency-bin, frame].
pub type SpectralTensor = Array3<Complex64>;

/// Default analysis window width in STFT frames.
pub const DEFAULT_FRAME_LENGTH: usize = 100;

/// Default frame lead for the incremental condition. The reference
/// experiment setup uses a 140-frame source offset plus a 90-frame noise
/// tail, values with no documented derivation beyond that setup.
pub const DEFAULT_INCREMENTAL_LEAD: usize = 140 + 90;

/// Default noise-covariance-difference threshold for diff conditions.
pub const DEFAULT_NCM_DIFF: f64 = 0.05;

/// Subspace decomposition method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Standard eigendecomposition of the signal covariance alone.
    Sevd,
    /// Generalized eigendecomposition against a noise covariance.
    Gevd,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Sevd => "SEVD",
            Method::Gevd => "GEVD",
        }
    }
}

/// Which noise reference signal a condition draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseSource {
    Directional,
    Reverberant,
}

impl NoiseSource {
    pub fn suffix(self) -> &'static str {
        match self {
            NoiseSource::Directional => "dir",
            NoiseSource::Reverberant => "rev",
        }
    }
}

/// Noise-handling condition for one run.
///
/// Each variant carries the parameters it needs as typed fields instead of
/// encoding them in a suffix string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// No noise input; valid only with [`Method::Sevd`].
    Baseline,
    /// Directional reference offset by `lead` frames; signal and noise
    /// tensors are pre-trimmed so they stay time-aligned on a shared axis.
    Incremental { lead: usize },
    /// Matched sliding window on the chosen reference.
    Answer(NoiseSource),
    /// Matched sliding window, plus a covariance-difference threshold that
    /// gates re-identification of the source count.
    Diff { source: NoiseSource, threshold: f64 },
    /// The whole noise reference tensor at every position, never re-sliced.
    Stable(NoiseSource),
}

impl Condition {
    pub fn label(self) -> String {
        match self {
            Condition::Baseline => "baseline".to_string(),
            Condition::Incremental { .. } => "incremental".to_string(),
            Condition::Answer(source) => format!("ans_{}", source.suffix()),
            Condition::Diff { source, .. } => format!("diff_{}", source.suffix()),
            Condition::Stable(source) => format!("stable_{}", source.suffix()),
        }
    }
}

/// One (method, condition) run within an experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSpec {
    pub method: Method,
    pub condition: Condition,
}

/// Output directory name for a run, derived purely from its spec.
pub fn run_label(spec: &RunSpec) -> String {
    match spec.method {
        Method::Sevd => spec.method.as_str().to_string(),
        Method::Gevd => format!("{}_{}", spec.method.as_str(), spec.condition.label()),
    }
}

/// Per-frame output of one estimator call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecompositionRecord {
    /// Eigenvalues averaged over the analysis band, sorted descending.
    pub eigenvalues: Array1<f64>,
    /// Eigenvector matrix of the band's centre bin, eigenvectors as columns.
    pub eigenvectors: Array2<Complex64>,
    /// Spatial pseudospectrum over the azimuth grid.
    pub spectrum: Array1<f64>,
}

/// Append-only, insertion-ordered record accumulator for one run.
///
/// Owned by the run and threaded through the driver, so the
/// one-run/one-estimator contract is structural: records survive a failed
/// run for post-mortem persistence.
#[derive(Debug, Default)]
pub struct RunRecords {
    records: Vec<DecompositionRecord>,
}

impl RunRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DecompositionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecompositionRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[DecompositionRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_labels_match_output_directory_convention() {
        let labels: Vec<String> = [
            RunSpec {
                method: Method::Sevd,
                condition: Condition::Baseline,
            },
            RunSpec {
                method: Method::Gevd,
                condition: Condition::Incremental { lead: 230 },
            },
            RunSpec {
                method: Method::Gevd,
                condition: Condition::Answer(NoiseSource::Directional),
            },
            RunSpec {
                method: Method::Gevd,
                condition: Condition::Diff {
                    source: NoiseSource::Reverberant,
                    threshold: 0.05,
                },
            },
            RunSpec {
                method: Method::Gevd,
                condition: Condition::Stable(NoiseSource::Reverberant),
            },
        ]
        .iter()
        .map(run_label)
        .collect();

        assert_eq!(
            labels,
            vec![
                "SEVD",
                "GEVD_incremental",
                "GEVD_ans_dir",
                "GEVD_diff_rev",
                "GEVD_stable_rev",
            ]
        );
    }

    #[test]
    fn records_preserve_insertion_order() {
        let mut records = RunRecords::new();
        for i in 0..3 {
            records.push(DecompositionRecord {
                eigenvalues: Array1::from_elem(2, i as f64),
                eigenvectors: Array2::zeros((2, 2)),
                spectrum: Array1::zeros(4),
            });
        }
        assert_eq!(records.len(), 3);
        let firsts: Vec<f64> = records.iter().map(|r| r.eigenvalues[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0]);
    }
}
