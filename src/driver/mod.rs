//! DoA estimation driver: the sliding-window loop for one run.

use ndarray::s;

use crate::error::DoaError;
use crate::estimator::{LocateRequest, SourceLocator};
use crate::policy::{NoisePlan, PreparedRun};
use crate::types::RunRecords;

/// Sliding analysis window over the frame axis of a spectral tensor.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    /// Window width in frames.
    pub width: usize,
    /// Advance between analysis positions, in frames.
    pub step: usize,
}

impl SlidingWindow {
    /// Window of `width` frames advanced by a quarter width, the
    /// conventional analysis stride.
    pub fn quarter_step(width: usize) -> Self {
        Self {
            width,
            step: (width / 4).max(1),
        }
    }

    /// Analysis positions for a tensor with `frame_count` frames. The last
    /// window may extend past the end; its slice is clipped, never skipped.
    pub fn positions(&self, frame_count: usize) -> impl Iterator<Item = usize> + '_ {
        (0..frame_count).step_by(self.step)
    }

    /// Number of positions [`Self::positions`] yields, i.e. the expected
    /// record count for a run: `ceil(frame_count / step)`.
    pub fn expected_records(&self, frame_count: usize) -> usize {
        frame_count.div_ceil(self.step)
    }
}

/// Drive one run: slice signal and noise per position and invoke the
/// locator, which appends exactly one record per call to `records`.
///
/// A locate failure stops the loop and is returned as-is; records
/// accumulated up to that point stay in `records` so the caller can persist
/// them for post-mortem analysis.
pub fn run_locator<L: SourceLocator>(
    locator: &mut L,
    run: &PreparedRun<'_>,
    window: SlidingWindow,
    freq_range: (f64, f64),
    auto_identify: bool,
    records: &mut RunRecords,
) -> Result<(), DoaError> {
    let frame_count = run.signal.shape()[2];
    for position in window.positions(frame_count) {
        let end = (position + window.width).min(frame_count);
        let signal = run.signal.slice(s![.., .., position..end]);
        let noise = match &run.noise {
            NoisePlan::Absent => None,
            NoisePlan::Sliding(view) => Some(view.slice(s![.., .., position..end])),
            NoisePlan::Static(view) => Some(view.view()),
        };
        let request = LocateRequest {
            freq_range,
            auto_identify,
            diff_threshold: run.diff_threshold,
            frame_offset: position,
        };
        locator.locate(signal, noise, &request, records)?;
    }
    Ok(())
}
