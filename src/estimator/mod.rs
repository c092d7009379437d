//! Subspace DoA estimator: incoherent broadband MUSIC over SEVD or GEVD
//! decompositions.

pub mod array;
pub mod subspace;

use std::f64::consts::{PI, TAU};

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView3};
use num_complex::Complex64;

use crate::error::DoaError;
use crate::types::{DecompositionRecord, Method, RunRecords};

use self::array::ArrayGeometry;
use self::subspace::Decomposition;

/// Per-call estimation request assembled by the driver.
#[derive(Debug, Clone, Copy)]
pub struct LocateRequest {
    /// Analysis band in Hz (inclusive bounds).
    pub freq_range: (f64, f64),
    /// Infer the active source count from the eigenvalue spread.
    pub auto_identify: bool,
    /// Noise-covariance-difference threshold; present only for diff runs.
    pub diff_threshold: Option<f64>,
    /// Frame offset of the signal slice, attached to failures.
    pub frame_offset: usize,
}

/// Seam between the driver and a subspace estimator.
///
/// One implementation instance serves exactly one run; each call must append
/// exactly one record to `records`.
pub trait SourceLocator {
    fn locate(
        &mut self,
        signal: ArrayView3<'_, Complex64>,
        noise: Option<ArrayView3<'_, Complex64>>,
        request: &LocateRequest,
        records: &mut RunRecords,
    ) -> Result<(), DoaError>;
}

/// Incoherent broadband MUSIC estimator.
///
/// Per analysis bin it forms the sample covariance of the signal slice (and
/// noise slice for GEVD), decomposes it, and sums the per-bin MUSIC
/// pseudospectrum over the azimuth grid. Eigenvalues are averaged over the
/// band for the record; the recorded eigenvector matrix is the band's centre
/// bin.
pub struct MusicEstimator {
    method: Method,
    geometry: ArrayGeometry,
    sample_rate: f64,
    nfft: usize,
    num_sources: usize,
    source_noise_thresh: f64,
    grid: Vec<f64>,
    previous_noise_cov: Option<DMatrix<Complex64>>,
    active_sources: usize,
}

impl MusicEstimator {
    pub fn new(
        method: Method,
        geometry: ArrayGeometry,
        sample_rate: f64,
        nfft: usize,
        num_sources: usize,
        source_noise_thresh: f64,
        grid_points: usize,
    ) -> Self {
        let mics = geometry.len();
        let grid = (0..grid_points)
            .map(|i| -PI + TAU * i as f64 / grid_points as f64)
            .collect();
        Self {
            method,
            geometry,
            sample_rate,
            nfft,
            num_sources,
            source_noise_thresh,
            grid,
            previous_noise_cov: None,
            active_sources: num_sources.clamp(1, mics.saturating_sub(1).max(1)),
        }
    }

    /// Azimuth grid (radians) the spatial spectrum is sampled on.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Source count used for the most recent subspace split.
    pub fn active_sources(&self) -> usize {
        self.active_sources
    }

    /// Inclusive bin indices covering the requested band, DC excluded.
    fn band_bins(&self, freq_range: (f64, f64)) -> Result<Vec<usize>, DoaError> {
        let to_bin = |hz: f64| hz * self.nfft as f64 / self.sample_rate;
        let lo = (to_bin(freq_range.0).ceil() as usize).max(1);
        let hi = (to_bin(freq_range.1).floor() as usize).min(self.nfft / 2);
        if lo > hi {
            return Err(DoaError::configuration(format!(
                "frequency range {:?} Hz covers no analysis bin at nfft {} / fs {}",
                freq_range, self.nfft, self.sample_rate
            )));
        }
        Ok((lo..=hi).collect())
    }

    fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate / self.nfft as f64
    }

    /// Decide the source count for this call. Auto-identification runs on
    /// the band-averaged eigenvalues; with a diff threshold it only re-runs
    /// when the noise covariance moved since the previous call.
    fn update_source_count(
        &mut self,
        request: &LocateRequest,
        mean_values: &[f64],
        noise_covs: Option<&[DMatrix<Complex64>]>,
    ) {
        if !request.auto_identify {
            let mics = mean_values.len();
            self.active_sources = self.num_sources.clamp(1, mics - 1);
            return;
        }
        let refresh = match (request.diff_threshold, noise_covs) {
            (Some(threshold), Some(covs)) => {
                let mean_cov = mean_matrix(covs);
                let moved = self
                    .previous_noise_cov
                    .as_ref()
                    .map_or(true, |prev| {
                        subspace::relative_difference(&mean_cov, prev) > threshold
                    });
                self.previous_noise_cov = Some(mean_cov);
                moved
            }
            _ => true,
        };
        if refresh {
            self.active_sources =
                subspace::identify_sources(mean_values, self.source_noise_thresh);
        }
    }

    /// MUSIC pseudospectrum summed over the band's bins.
    fn pseudospectrum(&self, decompositions: &[Decomposition], bins: &[usize]) -> Array1<f64> {
        let mics = self.geometry.len();
        let sources = self.active_sources.min(mics - 1);
        let mut spectrum = Array1::zeros(self.grid.len());
        for (decomposition, &bin) in decompositions.iter().zip(bins) {
            let freq = self.bin_frequency(bin);
            for (g, &azimuth) in self.grid.iter().enumerate() {
                let steering = self.geometry.steering_vector(azimuth, freq);
                let probe: DVector<Complex64> = match &decomposition.whitener {
                    Some(whitener) => whitener * steering,
                    None => steering,
                };
                let scale = probe.norm_squared();
                let mut projection = 0.0;
                for column in sources..mics {
                    let component = decomposition.vectors.column(column).dotc(&probe);
                    projection += component.norm_sqr();
                }
                spectrum[g] += scale / projection.max(f64::MIN_POSITIVE);
            }
        }
        spectrum
    }
}

impl SourceLocator for MusicEstimator {
    fn locate(
        &mut self,
        signal: ArrayView3<'_, Complex64>,
        noise: Option<ArrayView3<'_, Complex64>>,
        request: &LocateRequest,
        records: &mut RunRecords,
    ) -> Result<(), DoaError> {
        let mics = signal.shape()[0];
        if mics != self.geometry.len() {
            return Err(DoaError::configuration(format!(
                "signal has {} channels but the array has {} microphones",
                mics,
                self.geometry.len()
            )));
        }
        if matches!(self.method, Method::Gevd) && noise.is_none() {
            return Err(DoaError::configuration(
                "GEVD estimator invoked without a noise slice",
            ));
        }

        let bins = self.band_bins(request.freq_range)?;
        let noise_covs: Option<Vec<DMatrix<Complex64>>> = noise
            .map(|view| bins.iter().map(|&k| bin_covariance(&view, k)).collect());

        let mut decompositions = Vec::with_capacity(bins.len());
        for (i, &bin) in bins.iter().enumerate() {
            let signal_cov = bin_covariance(&signal, bin);
            let decomposition = match (self.method, noise_covs.as_deref()) {
                (Method::Sevd, _) => subspace::hermitian_eigen(&signal_cov),
                (Method::Gevd, Some(covs)) => subspace::generalized_eigen(&signal_cov, &covs[i])
                    .map_err(|reason| DoaError::decomposition(request.frame_offset, reason))?,
                (Method::Gevd, None) => unreachable!("noise presence checked above"),
            };
            decompositions.push(decomposition);
        }

        let mean_values = mean_eigenvalues(&decompositions, mics);
        self.update_source_count(request, &mean_values, noise_covs.as_deref());
        let spectrum = self.pseudospectrum(&decompositions, &bins);

        let centre = &decompositions[decompositions.len() / 2];
        records.push(DecompositionRecord {
            eigenvalues: Array1::from_vec(mean_values),
            eigenvectors: Array2::from_shape_fn((mics, mics), |(r, c)| {
                centre.vectors[(r, c)]
            }),
            spectrum,
        });
        Ok(())
    }
}

/// Sample covariance of one frequency bin across the slice's frames.
pub fn bin_covariance(tensor: &ArrayView3<'_, Complex64>, bin: usize) -> DMatrix<Complex64> {
    let mics = tensor.shape()[0];
    let frames = tensor.shape()[2];
    let mut covariance = DMatrix::zeros(mics, mics);
    for t in 0..frames {
        let snapshot = DVector::from_fn(mics, |c, _| tensor[[c, bin, t]]);
        covariance += &snapshot * snapshot.adjoint();
    }
    covariance / Complex64::new(frames.max(1) as f64, 0.0)
}

fn mean_matrix(matrices: &[DMatrix<Complex64>]) -> DMatrix<Complex64> {
    let mut sum = matrices[0].clone();
    for matrix in &matrices[1..] {
        sum += matrix;
    }
    sum / Complex64::new(matrices.len() as f64, 0.0)
}

fn mean_eigenvalues(decompositions: &[Decomposition], mics: usize) -> Vec<f64> {
    let mut mean = vec![0.0; mics];
    for decomposition in decompositions {
        for (slot, value) in mean.iter_mut().zip(&decomposition.values) {
            *slot += value;
        }
    }
    let count = decompositions.len().max(1) as f64;
    mean.iter_mut().for_each(|v| *v /= count);
    mean
}
