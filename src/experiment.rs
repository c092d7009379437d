//! Experiment directories: enumeration, id parsing, and signal loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};

use crate::signal::{load_ground_truth, MultichannelSignal};

/// One simulated experiment on disk: a source mixture, two noise
/// references, and the ground-truth angles, all read-only during
/// processing.
#[derive(Debug)]
pub struct Experiment {
    pub id: String,
    pub dir: PathBuf,
    pub source: MultichannelSignal,
    pub noise_rev: MultichannelSignal,
    pub noise_dir: MultichannelSignal,
    /// Ground-truth source angles, radians, ascending.
    pub ground_truth: Vec<f64>,
    /// Voices + ambient sources + the ego-noise source.
    pub num_sources: usize,
}

impl Experiment {
    pub fn load(dir: &Path) -> Result<Self> {
        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("experiment path {:?} has no directory name", dir))?;
        let simulation = dir.join("simulation");

        let source = MultichannelSignal::from_wav(&simulation.join("source.wav"))
            .with_context(|| format!("experiment {id}: failed to load source mixture"))?;
        let noise_rev = MultichannelSignal::from_wav(&simulation.join("ncm_rev.wav"))
            .with_context(|| format!("experiment {id}: failed to load reverberant reference"))?;
        let noise_dir = MultichannelSignal::from_wav(&simulation.join("ncm_dir.wav"))
            .with_context(|| format!("experiment {id}: failed to load directional reference"))?;
        let ground_truth = load_ground_truth(&simulation.join("ans.txt"))
            .with_context(|| format!("experiment {id}: failed to load ground truth"))?;

        for (name, signal) in [("ncm_rev", &noise_rev), ("ncm_dir", &noise_dir)] {
            ensure!(
                signal.channels() == source.channels(),
                "experiment {id}: {name} has {} channels but the source has {}",
                signal.channels(),
                source.channels()
            );
            ensure!(
                signal.sample_rate == source.sample_rate,
                "experiment {id}: {name} sample rate {} differs from source rate {}",
                signal.sample_rate,
                source.sample_rate
            );
        }

        let num_sources = parse_source_count(&id)
            .with_context(|| format!("experiment {id}: unparseable directory name"))?;

        Ok(Self {
            id,
            dir: dir.to_path_buf(),
            source,
            noise_rev,
            noise_dir,
            ground_truth,
            num_sources,
        })
    }
}

/// Experiment directory names encode
/// `height;roughness;material;n_voice;n_ambient;snr_ego;snr_ambient`.
/// The estimator's source count is `n_voice + n_ambient + 1`, the extra
/// source being the array's own ego-noise.
pub fn parse_source_count(id: &str) -> Result<usize> {
    let fields: Vec<&str> = id.split(';').collect();
    ensure!(
        fields.len() >= 5,
        "expected at least 5 ';'-separated fields, found {}",
        fields.len()
    );
    let n_voice: usize = fields[3]
        .parse()
        .with_context(|| format!("voice count field {:?} is not an integer", fields[3]))?;
    let n_ambient: usize = fields[4]
        .parse()
        .with_context(|| format!("ambient count field {:?} is not an integer", fields[4]))?;
    Ok(n_voice + n_ambient + 1)
}

/// Sorted list of experiment directories directly under the root.
pub fn enumerate_experiments(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read experiments root {:?}", root))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {:?}", root))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
