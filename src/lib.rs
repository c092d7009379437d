//! Frame-windowed, policy-driven direction-of-arrival estimation.
//!
//! The pipeline slides an analysis window across STFT tensors of simulated
//! microphone-array recordings, selects per run which covariance data acts
//! as "signal" and which as "noise", and drives a subspace estimator
//! frame-by-frame, accumulating decomposition records for scoring.

pub mod config;
pub mod driver;
pub mod error;
pub mod estimator;
pub mod experiment;
pub mod policy;
pub mod runs;
pub mod signal;
pub mod types;
