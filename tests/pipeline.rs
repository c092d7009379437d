//! End-to-end batch smoke test through the binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (((self.0 >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0) as f32
    }
}

fn write_noise_wav(path: &Path, channels: u16, samples: usize, seed: u64) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 8000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut rng = Lcg(seed);
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..samples {
        for _ in 0..channels {
            writer.write_sample(0.5 * rng.next_f32()).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn write_experiment(dir: &Path, seed: u64) {
    let simulation = dir.join("simulation");
    fs::create_dir_all(&simulation).unwrap();
    // 256-sample window, 64-sample hop: 2752 samples give 40 STFT frames.
    let samples = 256 + 64 * 39;
    write_noise_wav(&simulation.join("source.wav"), 4, samples, seed);
    write_noise_wav(&simulation.join("ncm_rev.wav"), 4, samples, seed + 1);
    write_noise_wav(&simulation.join("ncm_dir.wav"), 4, samples, seed + 2);
    fs::write(simulation.join("ans.txt"), "-0.5\n1.0\n").unwrap();
}

fn doalab(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("doalab").unwrap();
    cmd.arg(root)
        .args(["--window-size", "256"])
        .args(["--hop-size", "64"])
        .args(["--frame-length", "16"])
        .args(["--incremental-lead", "8"]);
    cmd
}

const RUN_DIRS: [&str; 8] = [
    "SEVD",
    "GEVD_incremental",
    "GEVD_ans_dir",
    "GEVD_ans_rev",
    "GEVD_diff_dir",
    "GEVD_diff_rev",
    "GEVD_stable_dir",
    "GEVD_stable_rev",
];

fn spectra_len(run_dir: &Path) -> usize {
    let raw = fs::read_to_string(run_dir.join("spectra.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    parsed.as_array().unwrap().len()
}

#[test]
fn batch_produces_all_eight_runs() {
    let root = tempfile::tempdir().unwrap();
    fs::write(
        root.path().join("config.json"),
        r#"{"mic_count": 4, "radius_m": 0.05, "grid_points": 72}"#,
    )
    .unwrap();
    let experiment = root.path().join("2;0.1,1.0;brickwork;1;0;8;0");
    write_experiment(&experiment, 101);

    doalab(root.path()).assert().success();

    for run in RUN_DIRS {
        let run_dir = experiment.join(run);
        assert!(run_dir.join("spectra.json").exists(), "missing {run}");
        assert!(
            run_dir.join("decomposed_values.json").exists(),
            "missing values for {run}"
        );
        assert!(
            run_dir.join("metrics.json").exists(),
            "missing metrics for {run}"
        );
    }

    // 40 frames at step 4 (a quarter of the 16-frame window).
    assert_eq!(spectra_len(&experiment.join("SEVD")), 10);
    assert_eq!(spectra_len(&experiment.join("GEVD_ans_dir")), 10);
    // The incremental run drops 8 lead frames: 32 remain.
    assert_eq!(spectra_len(&experiment.join("GEVD_incremental")), 8);
}

#[test]
fn a_broken_experiment_does_not_abort_the_batch() {
    let root = tempfile::tempdir().unwrap();
    fs::write(
        root.path().join("config.json"),
        r#"{"mic_count": 4, "radius_m": 0.05, "grid_points": 72}"#,
    )
    .unwrap();

    // Sorts before the healthy experiment and is missing its ground truth.
    let broken = root.path().join("1;0.1,1.0;brickwork;1;0;8;0");
    write_experiment(&broken, 31);
    fs::remove_file(broken.join("simulation").join("ans.txt")).unwrap();

    let healthy = root.path().join("2;0.1,1.0;brickwork;1;0;8;0");
    write_experiment(&healthy, 37);

    doalab(root.path()).assert().success();

    assert!(healthy.join("SEVD").join("spectra.json").exists());
    assert!(!broken.join("SEVD").exists());
}

#[test]
fn missing_experiments_root_fails_fast() {
    let mut cmd = Command::cargo_bin("doalab").unwrap();
    cmd.arg("/nonexistent/experiments/root")
        .assert()
        .failure()
        .stderr(predicate::str::contains("experiments root"));
}
