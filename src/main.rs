use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use doalab::config::ArrayConfig;
use doalab::experiment::{enumerate_experiments, Experiment};
use doalab::runs::{execute_experiment, AnalysisParams};
use doalab::types::{DEFAULT_FRAME_LENGTH, DEFAULT_INCREMENTAL_LEAD, DEFAULT_NCM_DIFF};

/// Doalab - batch direction-of-arrival estimation
///
/// Slides an analysis window over STFT tensors of simulated
/// microphone-array recordings and compares noise-covariance estimation
/// strategies (SEVD and GEVD variants) against ground truth.
#[derive(Parser, Debug)]
#[command(name = "doalab")]
#[command(version = "0.1.0")]
#[command(about = "Direction-of-arrival estimation batch runner", long_about = None)]
struct Args {
    /// Root directory containing experiment directories and config.json
    #[arg(value_name = "EXPERIMENTS_ROOT")]
    experiments_root: PathBuf,

    /// Window size for the FFT, in samples
    #[arg(long, default_value_t = 512)]
    window_size: usize,

    /// Hop size for the FFT, in samples
    #[arg(long, default_value_t = 128)]
    hop_size: usize,

    /// Frequency range for DoA estimation, in Hz
    #[arg(long, value_name = "HZ", num_args = 2, default_values_t = [300.0, 3500.0])]
    freq_range: Vec<f64>,

    /// Eigenvalue ratio separating source and noise subspaces
    #[arg(long, default_value_t = 100.0)]
    source_noise_thresh: f64,

    /// Analysis window width, in STFT frames
    #[arg(long, default_value_t = DEFAULT_FRAME_LENGTH)]
    frame_length: usize,

    /// Frame lead of the directional reference for the incremental condition
    #[arg(long, default_value_t = DEFAULT_INCREMENTAL_LEAD)]
    incremental_lead: usize,

    /// Relative covariance change that re-triggers source identification
    #[arg(long, default_value_t = DEFAULT_NCM_DIFF)]
    ncm_diff: f64,
}

impl Args {
    fn validate(&self) -> Result<()> {
        if !self.experiments_root.is_dir() {
            anyhow::bail!(
                "experiments root is not a directory: {:?}",
                self.experiments_root
            );
        }
        if self.window_size < 2 {
            anyhow::bail!("window size must be at least 2, got {}", self.window_size);
        }
        if self.hop_size == 0 || self.hop_size > self.window_size {
            anyhow::bail!(
                "hop size must be in 1..={}, got {}",
                self.window_size,
                self.hop_size
            );
        }
        let (lo, hi) = (self.freq_range[0], self.freq_range[1]);
        if lo < 0.0 || hi <= lo {
            anyhow::bail!("frequency range must satisfy 0 <= low < high, got {lo} {hi}");
        }
        if self.frame_length == 0 {
            anyhow::bail!("analysis window width must be positive");
        }
        if self.source_noise_thresh <= 0.0 {
            anyhow::bail!(
                "source/noise threshold must be positive, got {}",
                self.source_noise_thresh
            );
        }
        if self.ncm_diff <= 0.0 {
            anyhow::bail!("ncm diff threshold must be positive, got {}", self.ncm_diff);
        }
        Ok(())
    }

    fn params(&self) -> AnalysisParams {
        AnalysisParams {
            window_size: self.window_size,
            hop_size: self.hop_size,
            freq_range: (self.freq_range[0], self.freq_range[1]),
            source_noise_thresh: self.source_noise_thresh,
            frame_length: self.frame_length,
            incremental_lead: self.incremental_lead,
            ncm_diff: self.ncm_diff,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    args.validate()
        .context("failed to validate command-line arguments")?;

    let config = ArrayConfig::load(&args.experiments_root.join("config.json"))
        .context("failed to load array configuration")?;
    let params = args.params();

    let dirs = enumerate_experiments(&args.experiments_root)?;
    info!(experiments = dirs.len(), "starting batch");

    // Failures are isolated per experiment: load or processing errors are
    // logged with the experiment identifier and the batch moves on.
    let mut failed = 0usize;
    for dir in &dirs {
        let experiment = match Experiment::load(dir) {
            Ok(experiment) => experiment,
            Err(err) => {
                failed += 1;
                error!(experiment = %dir.display(), error = format!("{err:#}"), "failed to load experiment");
                continue;
            }
        };
        if let Err(err) = execute_experiment(&experiment, &config, &params) {
            failed += 1;
            error!(experiment = %experiment.id, error = format!("{err:#}"), "experiment failed");
        }
    }

    info!(
        processed = dirs.len() - failed,
        failed, "batch complete"
    );
    Ok(())
}
