//! Per-segment congestion metrics.
//!
//! Drives the step sampler and the overlap evaluator across one segment and
//! accumulates:
//! - **intensity**: overlapping pairs summed over all checkpoints
//! - **peak congestion**: most distinct runners (A + B) present at one checkpoint
//! - **distinct pairs**: unique (runner A, runner B) pairs seen anywhere
//! - **first overlap**: earliest pair at the first checkpoint with any overlap

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{CongestionError, OptionExt, Result};
use crate::evaluator::{prefilter, SegmentField, SweepBuffers};
use crate::sampler::{check_grid_size, StepSampler};
use crate::{AnalysisConfig, Roster, Segment, StartTimeTable};

/// The first recorded overlap in a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstOverlap {
    /// `min(t_a, t_b)` of the pair, minutes since midnight
    pub time_min: f64,
    /// Checkpoint distance
    pub km: f64,
    pub runner_a: String,
    pub runner_b: String,
}

/// Congestion metrics for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segment: Segment,
    /// Overlapping pairs summed over every checkpoint
    pub intensity: u64,
    /// Distinct runners present at the busiest checkpoint
    pub peak_congestion: usize,
    /// Event A share of the peak
    pub peak_a: usize,
    /// Event B share of the peak
    pub peak_b: usize,
    /// First checkpoint reaching the peak (None when nothing overlaps)
    pub peak_checkpoint_km: Option<f64>,
    /// Unique (runner A, runner B) pairs overlapping at least once
    pub distinct_pairs: usize,
    pub first_overlap: Option<FirstOverlap>,
    /// Full roster size of event A
    pub total_a: usize,
    /// Full roster size of event B
    pub total_b: usize,
    /// Event A runners left after the pre-filter
    pub candidates_a: usize,
    /// Event B runners left after the pre-filter
    pub candidates_b: usize,
    pub checkpoints_evaluated: usize,
    /// Start offsets used (minutes since midnight)
    pub start_a: f64,
    pub start_b: f64,
}

impl SegmentResult {
    pub(crate) fn empty(segment: &Segment, total_a: usize, total_b: usize, start_a: f64, start_b: f64) -> Self {
        Self {
            segment: segment.clone(),
            intensity: 0,
            peak_congestion: 0,
            peak_a: 0,
            peak_b: 0,
            peak_checkpoint_km: None,
            distinct_pairs: 0,
            first_overlap: None,
            total_a,
            total_b,
            candidates_a: 0,
            candidates_b: 0,
            checkpoints_evaluated: 0,
            start_a,
            start_b,
        }
    }

    /// Peak congestion relative to the combined field size.
    ///
    /// `None` when both rosters are empty.
    pub fn peak_ratio(&self) -> Option<f64> {
        let total = self.total_a + self.total_b;
        if total == 0 {
            None
        } else {
            Some(self.peak_congestion as f64 / total as f64)
        }
    }

    /// Intensity per kilometer of segment.
    pub fn intensity_per_km(&self) -> f64 {
        self.intensity as f64 / self.segment.length_km().max(1e-9)
    }

    fn check_invariants(&self) -> Result<()> {
        if self.distinct_pairs as u64 > self.intensity {
            return Err(CongestionError::Computation {
                segment: self.segment.label(),
                message: format!(
                    "distinct pairs {} exceed intensity {}",
                    self.distinct_pairs, self.intensity
                ),
            });
        }
        if self.peak_congestion > self.total_a + self.total_b {
            return Err(CongestionError::Computation {
                segment: self.segment.label(),
                message: format!(
                    "peak congestion {} exceeds field size {}",
                    self.peak_congestion,
                    self.total_a + self.total_b
                ),
            });
        }
        Ok(())
    }
}

/// Compute congestion metrics for one segment.
///
/// Fails with a validation error for a malformed segment or config, and with
/// a configuration error when either event has no runners or no start time.
pub fn analyze_segment(
    segment: &Segment,
    roster: &Roster,
    start_times: &StartTimeTable,
    config: &AnalysisConfig,
) -> Result<SegmentResult> {
    config.validate()?;
    segment.validate()?;
    check_grid_size(segment.start_km, segment.end_km, config.step_km)?;

    let label = segment.label();
    let context = format!("segment {}", label);
    let runners_a = roster
        .event(&segment.event_a)
        .ok_or_missing_event(&segment.event_a, &label)?;
    let runners_b = roster
        .event(&segment.event_b)
        .ok_or_missing_event(&segment.event_b, &label)?;
    let start_a = start_times
        .get(&segment.event_a)
        .ok_or_missing_start(&segment.event_a, &context)?;
    let start_b = start_times
        .get(&segment.event_b)
        .ok_or_missing_start(&segment.event_b, &context)?;

    let (candidates_a, candidates_b) = if config.prefilter {
        prefilter(
            runners_a,
            start_a,
            runners_b,
            start_b,
            segment.start_km,
            segment.end_km,
            config.time_window_seconds,
        )
    } else {
        (runners_a.iter().collect(), runners_b.iter().collect())
    };

    let mut result = SegmentResult::empty(segment, runners_a.len(), runners_b.len(), start_a, start_b);
    result.candidates_a = candidates_a.len();
    result.candidates_b = candidates_b.len();

    let field = SegmentField::new(
        candidates_a,
        start_a,
        candidates_b,
        start_b,
        config.time_window_seconds,
    );
    if field.is_empty() {
        debug!("[Aggregator] {}: no candidate runners after pre-filter", label);
        return Ok(result);
    }

    let mut buffers = SweepBuffers::default();
    let sampler = StepSampler::new(
        segment.start_km,
        segment.end_km,
        config.step_km,
        config.coarse_factor,
    );
    let plan = sampler.plan(|km| field.has_overlap(km, &mut buffers));

    let mut seen_pairs: HashSet<(&str, &str)> = HashSet::new();
    for km in plan.checkpoints() {
        let checkpoint = field.evaluate(km, &mut buffers, |i, j| {
            seen_pairs.insert((
                field.runner_a(i).runner_id.as_str(),
                field.runner_b(j).runner_id.as_str(),
            ));
        });

        result.intensity += checkpoint.pairs;

        if checkpoint.present() > result.peak_congestion {
            result.peak_congestion = checkpoint.present();
            result.peak_a = checkpoint.present_a;
            result.peak_b = checkpoint.present_b;
            result.peak_checkpoint_km = Some(km);
        }

        if result.first_overlap.is_none() {
            if let Some((time_min, i, j)) = checkpoint.earliest {
                result.first_overlap = Some(FirstOverlap {
                    time_min,
                    km,
                    runner_a: field.runner_a(i).runner_id.clone(),
                    runner_b: field.runner_b(j).runner_id.clone(),
                });
            }
        }
    }

    result.distinct_pairs = seen_pairs.len();
    result.checkpoints_evaluated = plan.len();

    debug!(
        "[Aggregator] {}: {} checkpoints ({} coarse, {} flagged), intensity={}, peak={}, pairs={}",
        label,
        plan.len(),
        plan.coarse_probes,
        plan.flagged_probes,
        result.intensity,
        result.peak_congestion,
        result.distinct_pairs
    );

    result.check_invariants()?;
    Ok(result)
}
