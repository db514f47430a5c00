//! Two-phase adaptive checkpoint sampling.
//!
//! ## Algorithm
//! 1. **Coarse pass**: probe every `coarse_factor`-th point of the fine grid,
//!    plus the last grid point so the end of the segment is always inspected.
//! 2. **Refinement**: every coarse interval touching a probe that found an
//!    overlap is flagged; each flagged interval is widened by one neighbour
//!    interval on each side, and the widened ranges are re-sampled at every
//!    fine grid point.
//! 3. The final plan is the union of all coarse points and all refined points,
//!    ascending, without duplicates.
//!
//! Checkpoints are handled as indices into the fine grid, so boundary
//! coincidences between the coarse and fine passes de-duplicate exactly.
//!
//! ## Detection guarantee
//! The arrival-time difference of two runners is linear in distance, so the
//! km range where they overlap is a single interval of width
//! `2 * window_min / |pace_a - pace_b|`. Every pair whose interval is at least
//! one coarse step wide contains a coarse probe and is therefore flagged; the
//! neighbour widening then covers the whole interval at fine resolution. In
//! pace terms, pairs closing at up to `2 * window_min / coarse_step_km`
//! min/km are always sampled exactly like a uniform fine scan. Faster-closing
//! pairs may be missed between coarse probes. `coarse_factor = 1` is a
//! uniform fine scan.

use crate::error::{CongestionError, Result};

/// Grid slack for `(end - start) / step` landing just below an integer.
const GRID_EPSILON: f64 = 1e-9;

/// Largest fine grid a segment may be sampled on (10 million checkpoints,
/// about a 100 km segment at 1 cm steps).
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Reject a step so small that the grid over `start_km..=end_km` would exceed
/// [`MAX_GRID_POINTS`].
pub fn check_grid_size(start_km: f64, end_km: f64, step_km: f64) -> Result<()> {
    let points = ((end_km - start_km) / step_km + GRID_EPSILON).floor() + 1.0;
    if !points.is_finite() || points > MAX_GRID_POINTS as f64 {
        return Err(CongestionError::invalid_parameter(
            "step_km",
            step_km,
            &format!(
                "{:.2}-{:.2}km would need more than {} checkpoints",
                start_km, end_km, MAX_GRID_POINTS
            ),
        ));
    }
    Ok(())
}

/// The fine checkpoint grid `start_km + i * step_km` for `i = 0..=last`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepGrid {
    pub start_km: f64,
    pub step_km: f64,
    /// Index of the last grid point
    pub last: usize,
}

impl StepGrid {
    /// Build the grid for an inclusive range. The end point is included when
    /// the range is a whole number of steps.
    pub fn new(start_km: f64, end_km: f64, step_km: f64) -> Self {
        let span = ((end_km - start_km) / step_km + GRID_EPSILON).floor();
        let last = if span.is_finite() && span > 0.0 {
            span as usize
        } else {
            0
        };
        Self {
            start_km,
            step_km,
            last,
        }
    }

    /// Distance of grid point `index`.
    #[inline]
    pub fn km(&self, index: usize) -> f64 {
        self.start_km + index as f64 * self.step_km
    }

    /// Number of grid points (always at least one).
    pub fn point_count(&self) -> usize {
        self.last + 1
    }
}

/// Ordered checkpoints chosen for a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePlan {
    pub grid: StepGrid,
    /// Ascending, unique fine-grid indices
    pub indices: Vec<usize>,
    /// Number of coarse probes
    pub coarse_probes: usize,
    /// Number of coarse probes that found an overlap
    pub flagged_probes: usize,
}

impl SamplePlan {
    /// Checkpoint distances in ascending order.
    pub fn checkpoints(&self) -> impl Iterator<Item = f64> + '_ {
        self.indices.iter().map(move |&i| self.grid.km(i))
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// True when the coarse pass found no overlap anywhere.
    pub fn is_coarse_only(&self) -> bool {
        self.flagged_probes == 0
    }
}

/// Coarse-then-refined checkpoint sampler for one segment.
#[derive(Debug, Clone, Copy)]
pub struct StepSampler {
    grid: StepGrid,
    coarse_factor: usize,
}

impl StepSampler {
    pub fn new(start_km: f64, end_km: f64, step_km: f64, coarse_factor: u32) -> Self {
        Self {
            grid: StepGrid::new(start_km, end_km, step_km),
            coarse_factor: coarse_factor.max(1) as usize,
        }
    }

    pub fn grid(&self) -> StepGrid {
        self.grid
    }

    /// Fine-grid indices probed by the coarse pass.
    pub fn coarse_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..=self.grid.last).step_by(self.coarse_factor).collect();
        if indices.last() != Some(&self.grid.last) {
            indices.push(self.grid.last);
        }
        indices
    }

    /// Run the coarse pass with `probe` and build the final checkpoint plan.
    ///
    /// `probe(km)` must return true when at least one overlapping pair exists
    /// at `km`.
    pub fn plan<F>(&self, mut probe: F) -> SamplePlan
    where
        F: FnMut(f64) -> bool,
    {
        let coarse = self.coarse_indices();
        let flags: Vec<bool> = coarse.iter().map(|&i| probe(self.grid.km(i))).collect();
        let flagged_probes = flags.iter().filter(|&&f| f).count();

        if flagged_probes == 0 || self.coarse_factor == 1 {
            return SamplePlan {
                grid: self.grid,
                indices: coarse,
                coarse_probes: flags.len(),
                flagged_probes,
            };
        }

        // Interval j spans coarse[j]..=coarse[j + 1]
        let intervals = coarse.len().saturating_sub(1);
        let flagged_intervals: Vec<bool> = (0..intervals)
            .map(|j| flags[j] || flags[j + 1])
            .collect();

        let mut selected = vec![false; self.grid.point_count()];
        for &i in &coarse {
            selected[i] = true;
        }
        for j in 0..intervals {
            let widened = flagged_intervals[j]
                || (j > 0 && flagged_intervals[j - 1])
                || flagged_intervals.get(j + 1).copied().unwrap_or(false);
            if widened {
                for flag in &mut selected[coarse[j]..=coarse[j + 1]] {
                    *flag = true;
                }
            }
        }

        let indices = selected
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();

        SamplePlan {
            grid: self.grid,
            indices,
            coarse_probes: flags.len(),
            flagged_probes,
        }
    }
}
