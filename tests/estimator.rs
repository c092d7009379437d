//! MUSIC estimator behavior: spectra, source identification, the ncm-diff
//! gate, failure semantics, and determinism.

use doalab::driver::{run_locator, SlidingWindow};
use doalab::error::DoaError;
use doalab::estimator::array::ArrayGeometry;
use doalab::estimator::{LocateRequest, MusicEstimator, SourceLocator};
use doalab::policy::prepare_run;
use doalab::types::{Condition, Method, NoiseSource, RunRecords, SpectralTensor};
use ndarray::Array3;
use num_complex::Complex64;

const FS: f64 = 8000.0;
const NFFT: usize = 64;
const BINS: usize = NFFT / 2 + 1;
const MICS: usize = 4;
const RADIUS: f64 = 0.03;
const GRID_POINTS: usize = 90;
const FREQ_RANGE: (f64, f64) = (300.0, 3500.0);

struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    }

    fn next_complex(&mut self) -> Complex64 {
        Complex64::new(self.next_f64(), self.next_f64())
    }
}

fn geometry() -> ArrayGeometry {
    ArrayGeometry::circular(MICS, RADIUS)
}

fn estimator(method: Method, num_sources: usize) -> MusicEstimator {
    MusicEstimator::new(
        method,
        geometry(),
        FS,
        NFFT,
        num_sources,
        100.0,
        GRID_POINTS,
    )
}

fn request(diff_threshold: Option<f64>, frame_offset: usize) -> LocateRequest {
    LocateRequest {
        freq_range: FREQ_RANGE,
        auto_identify: true,
        diff_threshold,
        frame_offset,
    }
}

/// Far-field plane waves from the given azimuths, one independent source
/// signal per azimuth, per bin.
fn plane_wave_tensor(azimuths: &[f64], frames: usize, seed: u64) -> SpectralTensor {
    let geometry = geometry();
    let mut rng = Lcg(seed);
    let mut tensor = Array3::from_elem((MICS, BINS, frames), Complex64::new(0.0, 0.0));
    for &azimuth in azimuths {
        for k in 0..BINS {
            let freq = k as f64 * FS / NFFT as f64;
            let steering = geometry.steering_vector(azimuth, freq);
            for t in 0..frames {
                let source = rng.next_complex();
                for c in 0..MICS {
                    tensor[[c, k, t]] += steering[c] * source;
                }
            }
        }
    }
    tensor
}

fn noise_tensor(frames: usize, seed: u64) -> SpectralTensor {
    let mut rng = Lcg(seed);
    Array3::from_shape_fn((MICS, BINS, frames), |_| rng.next_complex())
}

fn spectrum_peak(records: &RunRecords, grid: &[f64]) -> f64 {
    let record = records.iter().next().expect("one record");
    let (index, _) = record
        .spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .unwrap();
    grid[index]
}

#[test]
fn sevd_spectrum_peaks_at_the_source_azimuth() {
    let azimuth = 0.7;
    let tensor = plane_wave_tensor(&[azimuth], 32, 11);
    let mut music = estimator(Method::Sevd, 1);
    let mut records = RunRecords::new();
    music
        .locate(tensor.view(), None, &request(None, 0), &mut records)
        .unwrap();

    assert_eq!(records.len(), 1);
    let peak = spectrum_peak(&records, music.grid());
    // Grid resolution is 4 degrees; the peak must land on the nearest point.
    assert!(
        (peak - azimuth).abs() < 0.05,
        "peak {peak} too far from {azimuth}"
    );
    assert_eq!(music.active_sources(), 1);
}

#[test]
fn gevd_rejects_a_non_positive_definite_noise_slice() {
    let signal = plane_wave_tensor(&[0.3], 16, 3);
    let zero_noise = Array3::from_elem((MICS, BINS, 16), Complex64::new(0.0, 0.0));
    let mut music = estimator(Method::Gevd, 1);
    let mut records = RunRecords::new();

    let err = music
        .locate(
            signal.view(),
            Some(zero_noise.view()),
            &request(None, 7),
            &mut records,
        )
        .unwrap_err();

    assert!(matches!(err, DoaError::Decomposition { frame: 7, .. }));
    assert!(records.is_empty());
}

#[test]
fn gevd_failure_mid_run_preserves_earlier_records() {
    let signal = plane_wave_tensor(&[0.3], 40, 5);
    // Noise goes silent from frame 8 on; the window starting there has an
    // all-zero covariance and must fail.
    let mut noise = noise_tensor(40, 17);
    for c in 0..MICS {
        for k in 0..BINS {
            for t in 8..40 {
                noise[[c, k, t]] = Complex64::new(0.0, 0.0);
            }
        }
    }

    let prepared = prepare_run(
        Method::Gevd,
        Condition::Answer(NoiseSource::Directional),
        &signal,
        Some(&noise),
        None,
    )
    .unwrap();
    let mut music = estimator(Method::Gevd, 1);
    let mut records = RunRecords::new();
    let err = run_locator(
        &mut music,
        &prepared,
        SlidingWindow::quarter_step(16),
        FREQ_RANGE,
        true,
        &mut records,
    )
    .unwrap_err();

    assert!(matches!(err, DoaError::Decomposition { frame: 8, .. }));
    assert_eq!(records.len(), 2);
}

#[test]
fn ncm_diff_gates_source_reidentification() {
    let noise = noise_tensor(32, 23);
    let one_source = plane_wave_tensor(&[0.4], 32, 29);
    let two_sources = plane_wave_tensor(&[-1.2, 1.9], 32, 31);

    let mut music = estimator(Method::Gevd, 1);
    let mut records = RunRecords::new();

    music
        .locate(
            one_source.view(),
            Some(noise.view()),
            &request(Some(0.05), 0),
            &mut records,
        )
        .unwrap();
    assert_eq!(music.active_sources(), 1);

    // Same noise covariance: the gate holds the count even though the
    // signal now carries two sources.
    music
        .locate(
            two_sources.view(),
            Some(noise.view()),
            &request(Some(0.05), 25),
            &mut records,
        )
        .unwrap();
    assert_eq!(music.active_sources(), 1);

    // Scaling the noise moves its covariance well past the threshold, so
    // identification re-runs and finds both sources.
    let scaled = noise.mapv(|v| v * 3.0);
    music
        .locate(
            two_sources.view(),
            Some(scaled.view()),
            &request(Some(0.05), 50),
            &mut records,
        )
        .unwrap();
    assert_eq!(music.active_sources(), 2);
    assert_eq!(records.len(), 3);
}

#[test]
fn identical_inputs_produce_identical_record_sequences() {
    let signal = plane_wave_tensor(&[0.9], 60, 41);
    let noise = noise_tensor(60, 43);
    let window = SlidingWindow::quarter_step(16);

    let run_once = || {
        let prepared = prepare_run(
            Method::Gevd,
            Condition::Answer(NoiseSource::Directional),
            &signal,
            Some(&noise),
            None,
        )
        .unwrap();
        let mut music = estimator(Method::Gevd, 1);
        let mut records = RunRecords::new();
        run_locator(&mut music, &prepared, window, FREQ_RANGE, true, &mut records).unwrap();
        records
    };

    let first = run_once();
    let second = run_once();
    assert_eq!(first.len(), second.len());
    assert_eq!(first.as_slice(), second.as_slice());
}
