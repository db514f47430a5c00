//! Catalogue-wide congestion analysis.
//!
//! Segments are independent pure computations over shared, immutable inputs,
//! so they fan out with no locking. Results are collected in catalogue order
//! and then stably re-sorted, which makes the ranked output identical for any
//! number of workers.

use std::cmp::Ordering;

use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregator::{analyze_segment, SegmentResult};
use crate::error::{OptionExt, Result};
use crate::selector::select_segments;
use crate::{AnalysisConfig, RankBy, Roster, Segment, StartTimeTable};

/// Ranked congestion results for an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub rank_by: RankBy,
    pub time_window_seconds: f64,
    pub step_km: f64,
    /// Results ordered by `rank_by`, most severe first
    pub results: Vec<SegmentResult>,
}

impl AnalysisReport {
    /// True when no segment was analysed (empty catalogue).
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Analyse every selected segment of `catalogue` and rank the results.
///
/// Stops at the first error (in catalogue order): congestion reports are only
/// meaningful as a complete set.
pub fn analyze(
    roster: &Roster,
    start_times: &StartTimeTable,
    catalogue: &[Segment],
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    config.validate()?;

    let selected = select_segments(catalogue, &config.segments)?;
    for segment in &selected {
        segment.validate()?;
        let context = format!("segment {}", segment.label());
        for event in [&segment.event_a, &segment.event_b] {
            start_times.get(event).ok_or_missing_start(event, &context)?;
        }
    }

    info!(
        "[Orchestrator] Analysing {} of {} segments (window={}s, step={}km, coarse x{})",
        selected.len(),
        catalogue.len(),
        config.time_window_seconds,
        config.step_km,
        config.coarse_factor
    );

    let outcomes = run_segments(&selected, roster, start_times, config)?;
    let mut results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
    rank_results(&mut results, config.rank_by);

    info!(
        "[Orchestrator] Ranked {} segments by {}",
        results.len(),
        config.rank_by
    );

    Ok(AnalysisReport {
        rank_by: config.rank_by,
        time_window_seconds: config.time_window_seconds,
        step_km: config.step_km,
        results,
    })
}

/// Sort results by `rank_by`, most severe first.
///
/// The sort is stable: equal keys keep their incoming order. An undefined
/// peak ratio ranks as zero.
pub fn rank_results(results: &mut [SegmentResult], rank_by: RankBy) {
    results.sort_by(|a, b| compare_severity(b, a, rank_by));
}

fn compare_severity(a: &SegmentResult, b: &SegmentResult, rank_by: RankBy) -> Ordering {
    match rank_by {
        RankBy::PeakRatio => a
            .peak_ratio()
            .unwrap_or(0.0)
            .total_cmp(&b.peak_ratio().unwrap_or(0.0)),
        RankBy::Intensity => a.intensity.cmp(&b.intensity),
    }
}

fn run_sequential(
    segments: &[&Segment],
    roster: &Roster,
    start_times: &StartTimeTable,
    config: &AnalysisConfig,
) -> Vec<Result<SegmentResult>> {
    segments
        .iter()
        .map(|segment| analyze_segment(segment, roster, start_times, config))
        .collect()
}

#[cfg(feature = "parallel")]
fn run_segments(
    segments: &[&Segment],
    roster: &Roster,
    start_times: &StartTimeTable,
    config: &AnalysisConfig,
) -> Result<Vec<Result<SegmentResult>>> {
    if config.workers == 1 || segments.len() < 2 {
        info!("[Orchestrator] Using sequential processing");
        return Ok(run_sequential(segments, roster, start_times, config));
    }

    let run = || -> Vec<Result<SegmentResult>> {
        segments
            .par_iter()
            .map(|segment| analyze_segment(segment, roster, start_times, config))
            .collect()
    };

    if config.workers == 0 {
        info!("[Orchestrator] Using PARALLEL processing (rayon global pool)");
        return Ok(run());
    }

    info!(
        "[Orchestrator] Using PARALLEL processing ({} workers)",
        config.workers
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| crate::CongestionError::Computation {
            segment: "*".to_string(),
            message: format!("failed to start worker pool: {}", e),
        })?;
    Ok(pool.install(run))
}

#[cfg(not(feature = "parallel"))]
fn run_segments(
    segments: &[&Segment],
    roster: &Roster,
    start_times: &StartTimeTable,
    config: &AnalysisConfig,
) -> Result<Vec<Result<SegmentResult>>> {
    Ok(run_sequential(segments, roster, start_times, config))
}
