//! Run orchestrator: the fixed per-experiment run sequence.

pub mod metrics;
pub mod persist;

use anyhow::{ensure, Context, Result};
use tracing::{error, info};

use crate::config::ArrayConfig;
use crate::driver::{run_locator, SlidingWindow};
use crate::estimator::array::ArrayGeometry;
use crate::estimator::MusicEstimator;
use crate::experiment::Experiment;
use crate::policy::prepare_run;
use crate::signal::framer::frame;
use crate::types::{run_label, Condition, Method, NoiseSource, RunSpec, SpectralTensor, RunRecords};

/// Analysis parameters shared by every run of a batch.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisParams {
    /// FFT window size in samples.
    pub window_size: usize,
    /// FFT hop size in samples.
    pub hop_size: usize,
    /// Analysis band in Hz.
    pub freq_range: (f64, f64),
    /// Eigenvalue ratio separating source and noise subspaces.
    pub source_noise_thresh: f64,
    /// Analysis window width in STFT frames.
    pub frame_length: usize,
    /// Frame lead for the incremental condition.
    pub incremental_lead: usize,
    /// Covariance-difference threshold for diff conditions.
    pub ncm_diff: f64,
}

/// The fixed sequence of eight runs executed per experiment.
pub fn run_sequence(incremental_lead: usize, ncm_diff: f64) -> [RunSpec; 8] {
    use Condition::{Answer, Baseline, Diff, Incremental, Stable};
    use NoiseSource::{Directional, Reverberant};
    [
        RunSpec {
            method: Method::Sevd,
            condition: Baseline,
        },
        RunSpec {
            method: Method::Gevd,
            condition: Incremental {
                lead: incremental_lead,
            },
        },
        RunSpec {
            method: Method::Gevd,
            condition: Answer(Directional),
        },
        RunSpec {
            method: Method::Gevd,
            condition: Answer(Reverberant),
        },
        RunSpec {
            method: Method::Gevd,
            condition: Diff {
                source: Directional,
                threshold: ncm_diff,
            },
        },
        RunSpec {
            method: Method::Gevd,
            condition: Diff {
                source: Reverberant,
                threshold: ncm_diff,
            },
        },
        RunSpec {
            method: Method::Gevd,
            condition: Stable(Directional),
        },
        RunSpec {
            method: Method::Gevd,
            condition: Stable(Reverberant),
        },
    ]
}

/// Execute every run of one experiment. Runs are independent: a failing run
/// is logged and its siblings proceed; the error count is only reported.
pub fn execute_experiment(
    experiment: &Experiment,
    config: &ArrayConfig,
    params: &AnalysisParams,
) -> Result<()> {
    ensure!(
        experiment.source.channels() == config.mic_count,
        "experiment {} has {} channels but the array config declares {} microphones",
        experiment.id,
        experiment.source.channels(),
        config.mic_count
    );

    let x_source = frame(&experiment.source, params.window_size, params.hop_size)
        .with_context(|| format!("experiment {}: failed to frame source", experiment.id))?;
    let x_noise_rev = frame(&experiment.noise_rev, params.window_size, params.hop_size)
        .with_context(|| format!("experiment {}: failed to frame ncm_rev", experiment.id))?;
    let x_noise_dir = frame(&experiment.noise_dir, params.window_size, params.hop_size)
        .with_context(|| format!("experiment {}: failed to frame ncm_dir", experiment.id))?;
    info!(
        experiment = %experiment.id,
        frames = x_source.shape()[2],
        bins = x_source.shape()[1],
        "framed signals"
    );

    let geometry = ArrayGeometry::circular(config.mic_count, config.radius_m);
    let mut failed = 0usize;
    for spec in run_sequence(params.incremental_lead, params.ncm_diff) {
        let label = run_label(&spec);
        match execute_run(
            experiment, config, params, &geometry, &spec, &x_source, &x_noise_dir, &x_noise_rev,
        ) {
            Ok(records) => {
                info!(experiment = %experiment.id, run = %label, records, "run complete");
            }
            Err(err) => {
                failed += 1;
                error!(experiment = %experiment.id, run = %label, error = format!("{err:#}"), "run failed");
            }
        }
    }
    if failed > 0 {
        info!(experiment = %experiment.id, failed, "experiment finished with failed runs");
    }
    Ok(())
}

/// One run end to end: policy, fresh estimator, driver, persistence,
/// scoring. Accumulated records are persisted even when the driver fails.
#[allow(clippy::too_many_arguments)]
fn execute_run(
    experiment: &Experiment,
    config: &ArrayConfig,
    params: &AnalysisParams,
    geometry: &ArrayGeometry,
    spec: &RunSpec,
    x_source: &SpectralTensor,
    x_noise_dir: &SpectralTensor,
    x_noise_rev: &SpectralTensor,
) -> Result<usize> {
    let label = run_label(spec);
    let prepared = prepare_run(
        spec.method,
        spec.condition,
        x_source,
        Some(x_noise_dir),
        Some(x_noise_rev),
    )?;

    let mut estimator = MusicEstimator::new(
        spec.method,
        geometry.clone(),
        experiment.source.sample_rate as f64,
        params.window_size,
        experiment.num_sources,
        params.source_noise_thresh,
        config.grid_points,
    );
    let window = SlidingWindow::quarter_step(params.frame_length);
    let mut records = RunRecords::new();
    let outcome = run_locator(
        &mut estimator,
        &prepared,
        window,
        params.freq_range,
        true,
        &mut records,
    );

    let output_dir = experiment.dir.join(&label);
    persist::write_records(&output_dir, &records)
        .with_context(|| format!("failed to persist records for run {label}"))?;
    outcome?;

    metrics::export_metrics(
        &output_dir,
        &records,
        estimator.grid(),
        &experiment.ground_truth,
        estimator.active_sources(),
    )
    .with_context(|| format!("failed to score run {label}"))?;

    Ok(records.len())
}
