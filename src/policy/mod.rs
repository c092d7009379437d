//! Covariance windowing policy: what noise data the estimator sees, when.

use ndarray::{s, ArrayView3};
use num_complex::Complex64;

use crate::error::DoaError;
use crate::types::{Condition, Method, NoiseSource, SpectralTensor};

/// How the noise input advances relative to the signal window.
#[derive(Debug, Clone)]
pub enum NoisePlan<'a> {
    /// No noise input (SEVD).
    Absent,
    /// Slide the noise view in lockstep with the signal window.
    Sliding(ArrayView3<'a, Complex64>),
    /// Pass the entire noise view unchanged at every position.
    Static(ArrayView3<'a, Complex64>),
}

/// Inputs for one run after the windowing policy has been applied.
#[derive(Debug)]
pub struct PreparedRun<'a> {
    pub signal: ArrayView3<'a, Complex64>,
    pub noise: NoisePlan<'a>,
    /// Covariance-difference threshold; present only for diff conditions.
    pub diff_threshold: Option<f64>,
}

/// Resolve the (method, condition) pair into concrete run inputs.
///
/// All invalid combinations fail here, before any frame is processed.
pub fn prepare_run<'a>(
    method: Method,
    condition: Condition,
    signal: &'a SpectralTensor,
    noise_dir: Option<&'a SpectralTensor>,
    noise_rev: Option<&'a SpectralTensor>,
) -> Result<PreparedRun<'a>, DoaError> {
    match (method, condition) {
        (Method::Sevd, Condition::Baseline) => Ok(PreparedRun {
            signal: signal.view(),
            noise: NoisePlan::Absent,
            diff_threshold: None,
        }),
        (Method::Sevd, other) => Err(DoaError::configuration(format!(
            "SEVD takes no noise input but was paired with condition {}",
            other.label()
        ))),
        (Method::Gevd, Condition::Baseline) => Err(DoaError::configuration(
            "GEVD requires a noise reference but was paired with the baseline condition",
        )),
        (Method::Gevd, Condition::Incremental { lead }) => {
            let noise = require(noise_dir, NoiseSource::Directional)?;
            let signal_frames = signal.shape()[2];
            let noise_frames = noise.shape()[2];
            if lead >= signal_frames || lead >= noise_frames {
                return Err(DoaError::configuration(format!(
                    "incremental lead of {} frames exceeds tensor length (signal {}, noise {})",
                    lead, signal_frames, noise_frames
                )));
            }
            // Drop the signal tail and the noise head so both views share
            // one time-aligned frame axis; the noise at position p then
            // corresponds to original noise frame lead + p.
            let signal = signal.slice(s![.., .., ..signal_frames - lead]);
            let noise = noise.slice(s![.., .., lead..]);
            check_lockstep(&signal, &noise)?;
            Ok(PreparedRun {
                signal,
                noise: NoisePlan::Sliding(noise),
                diff_threshold: None,
            })
        }
        (Method::Gevd, Condition::Answer(source)) => {
            let noise = select(source, noise_dir, noise_rev)?.view();
            let signal = signal.view();
            check_lockstep(&signal, &noise)?;
            Ok(PreparedRun {
                signal,
                noise: NoisePlan::Sliding(noise),
                diff_threshold: None,
            })
        }
        (Method::Gevd, Condition::Diff { source, threshold }) => {
            let noise = select(source, noise_dir, noise_rev)?.view();
            let signal = signal.view();
            check_lockstep(&signal, &noise)?;
            Ok(PreparedRun {
                signal,
                noise: NoisePlan::Sliding(noise),
                diff_threshold: Some(threshold),
            })
        }
        (Method::Gevd, Condition::Stable(source)) => {
            let noise = select(source, noise_dir, noise_rev)?.view();
            Ok(PreparedRun {
                signal: signal.view(),
                noise: NoisePlan::Static(noise),
                diff_threshold: None,
            })
        }
    }
}

fn select<'a>(
    source: NoiseSource,
    noise_dir: Option<&'a SpectralTensor>,
    noise_rev: Option<&'a SpectralTensor>,
) -> Result<&'a SpectralTensor, DoaError> {
    match source {
        NoiseSource::Directional => require(noise_dir, source),
        NoiseSource::Reverberant => require(noise_rev, source),
    }
}

fn require<'a>(
    noise: Option<&'a SpectralTensor>,
    source: NoiseSource,
) -> Result<&'a SpectralTensor, DoaError> {
    noise.ok_or_else(|| {
        DoaError::configuration(format!(
            "GEVD requires the {} noise reference, which is missing",
            source.suffix()
        ))
    })
}

/// A sliding noise reference must cover at least the signal's frame axis.
fn check_lockstep(
    signal: &ArrayView3<'_, Complex64>,
    noise: &ArrayView3<'_, Complex64>,
) -> Result<(), DoaError> {
    if noise.shape()[2] < signal.shape()[2] {
        return Err(DoaError::configuration(format!(
            "sliding noise reference has {} frames but the signal has {}",
            noise.shape()[2],
            signal.shape()[2]
        )));
    }
    Ok(())
}
