use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

fn default_grid_points() -> usize {
    360
}

/// Microphone array description, loaded from `config.json` at the
/// experiments root and shared by every experiment of a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct ArrayConfig {
    /// Number of microphones in the circular array.
    pub mic_count: usize,
    /// Array radius in metres.
    pub radius_m: f64,
    /// Azimuth grid resolution for the spatial spectrum.
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
}

impl ArrayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read array config at {:?}", path))?;
        let config: ArrayConfig = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse array config at {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.mic_count >= 2,
            "array must have at least two microphones, got {}",
            self.mic_count
        );
        ensure!(
            self.radius_m > 0.0,
            "array radius must be positive, got {}",
            self.radius_m
        );
        ensure!(
            self.grid_points >= 8,
            "azimuth grid needs at least 8 points, got {}",
            self.grid_points
        );
        Ok(())
    }
}
