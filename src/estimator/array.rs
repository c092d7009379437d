//! Microphone array geometry and plane-wave steering vectors.

use std::f64::consts::TAU;

use nalgebra::DVector;
use num_complex::Complex64;

/// Speed of sound in air, m/s.
const SPEED_OF_SOUND: f64 = 343.0;

/// Planar microphone array geometry.
#[derive(Debug, Clone)]
pub struct ArrayGeometry {
    positions: Vec<[f64; 2]>,
}

impl ArrayGeometry {
    /// Uniform circular array of `count` microphones with the given radius.
    pub fn circular(count: usize, radius_m: f64) -> Self {
        let positions = (0..count)
            .map(|i| {
                let angle = TAU * i as f64 / count as f64;
                [radius_m * angle.cos(), radius_m * angle.sin()]
            })
            .collect();
        Self { positions }
    }

    pub fn from_positions(positions: Vec<[f64; 2]>) -> Self {
        Self { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Steering vector for a far-field source at `azimuth` (radians) and
    /// `freq_hz`: the per-microphone phase delays of the incoming plane wave.
    pub fn steering_vector(&self, azimuth: f64, freq_hz: f64) -> DVector<Complex64> {
        let (uy, ux) = azimuth.sin_cos();
        DVector::from_iterator(
            self.len(),
            self.positions.iter().map(|p| {
                let delay = (p[0] * ux + p[1] * uy) / SPEED_OF_SOUND;
                let phase = -TAU * freq_hz * delay;
                Complex64::new(phase.cos(), phase.sin())
            }),
        )
    }
}
