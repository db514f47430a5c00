//! # Run Congestion
//!
//! Course congestion analysis for multi-event road races with staggered starts.
//!
//! Given per-runner pace data and a catalogue of course segments shared by
//! pairs of events, the engine estimates where runners of different events
//! physically co-occupy the course, and how badly.
//!
//! This library provides:
//! - A constant-pace arrival model (distance → minutes since midnight)
//! - Two-phase adaptive checkpoint sampling per segment
//! - Sorted-sweep overlap evaluation between two event rosters
//! - Per-segment congestion metrics (intensity, peak congestion, distinct pairs)
//! - Ranked, optionally parallel, analysis of a whole segment catalogue
//! - Per-step runner density with zone distances and a 0-10 congestion index
//!
//! ## Features
//!
//! - **`parallel`** - Analyse segments concurrently with rayon (default)
//! - **`cli`** - Build the `run-congestion` command-line front end
//!
//! ## Quick Start
//!
//! ```rust
//! use run_congestion::{analyze, AnalysisConfig, Roster, Runner, Segment, StartTimeTable};
//!
//! let roster = Roster::from_runners(vec![
//!     Runner::new("Full", "1001", 5.0, 42.2),
//!     Runner::new("10K", "2001", 6.0, 10.0),
//! ]);
//! let start_times = StartTimeTable::from_iter([("Full", 420.0), ("10K", 420.0)]);
//! let catalogue = vec![Segment::new("Full", "10K", 0.0, 1.0)];
//!
//! let report = analyze(&roster, &start_times, &catalogue, &AnalysisConfig::default()).unwrap();
//! assert_eq!(report.results[0].peak_congestion, 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{CongestionError, ErrorKind, OptionExt, Result};

// Constant-pace arrival model
pub mod arrival;
pub use arrival::{arrival_time, ArrivalModel};

// Two-phase checkpoint sampling
pub mod sampler;
pub use sampler::{check_grid_size, SamplePlan, StepGrid, StepSampler, MAX_GRID_POINTS};

// Per-checkpoint overlap evaluation and per-segment pre-filter
pub mod evaluator;
pub use evaluator::{prefilter, CheckpointOverlap, SegmentField};

// Per-segment metric accumulation
pub mod aggregator;
pub use aggregator::{analyze_segment, FirstOverlap, SegmentResult};

// Segment selectors (`event:start-end`)
pub mod selector;
pub use selector::{select_segments, SegmentSelector};

// Catalogue-wide analysis and ranking
pub mod orchestrator;
pub use orchestrator::{analyze, rank_results, AnalysisReport};

// Text summary and export records
pub mod report;
pub use report::{format_clock, render_segment, render_summary, write_summary_csv, SummaryRecord};

// Runner density, zones and congestion index
pub mod density;
pub use density::{
    analyze_density, compute_density_steps, congestion_index, render_density_block,
    rollup_segment, DensityConfig, DensityRollup, DensitySegment, DensityStep, DensityZone,
    Direction, EventCount, ZoneKm, ZoneThresholds,
};

// CSV roster/segment loading
pub mod loader;
pub use loader::{parse_start_times, read_roster, read_segments};

// ============================================================================
// Core Types
// ============================================================================

/// A single participant.
///
/// `runner_id` is unique within an event only; the same id in two events
/// refers to two different runners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    /// Event label (e.g. "Full", "10K")
    pub event: String,
    /// Bib or other identifier, unique within the event
    pub runner_id: String,
    /// Constant pace in minutes per kilometer
    pub pace_min_per_km: f64,
    /// Total event distance in kilometers
    pub distance_km: f64,
}

impl Runner {
    /// Create a new runner.
    pub fn new(event: &str, runner_id: &str, pace_min_per_km: f64, distance_km: f64) -> Self {
        Self {
            event: event.to_string(),
            runner_id: runner_id.to_string(),
            pace_min_per_km,
            distance_km,
        }
    }

    /// Check that pace and distance are positive finite numbers.
    pub fn is_valid(&self) -> bool {
        self.pace_min_per_km.is_finite()
            && self.pace_min_per_km > 0.0
            && self.distance_km.is_finite()
            && self.distance_km > 0.0
    }
}

/// All runners of an analysis run, grouped by event.
///
/// Load order is preserved within each event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    events: BTreeMap<String, Vec<Runner>>,
}

impl Roster {
    /// Group runners by event.
    pub fn from_runners(runners: Vec<Runner>) -> Self {
        let mut events: BTreeMap<String, Vec<Runner>> = BTreeMap::new();
        for runner in runners {
            events.entry(runner.event.clone()).or_default().push(runner);
        }
        Self { events }
    }

    /// Runners of one event, or `None` if the event has no runners.
    pub fn event(&self, event: &str) -> Option<&[Runner]> {
        self.events.get(event).map(Vec::as_slice)
    }

    /// Event labels in sorted order.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// Total number of runners across all events.
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<Runner> for Roster {
    fn from_iter<I: IntoIterator<Item = Runner>>(iter: I) -> Self {
        Self::from_runners(iter.into_iter().collect())
    }
}

/// Event start offsets in minutes since midnight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartTimeTable {
    offsets: BTreeMap<String, f64>,
}

impl StartTimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the start offset of an event.
    pub fn insert(&mut self, event: &str, minutes_since_midnight: f64) {
        self.offsets.insert(event.to_string(), minutes_since_midnight);
    }

    /// Start offset of an event in minutes since midnight.
    pub fn get(&self, event: &str) -> Option<f64> {
        self.offsets.get(event).copied()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.offsets.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, f64)> for StartTimeTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (event, offset) in iter {
            table.insert(event.as_ref(), offset);
        }
        table
    }
}

/// A stretch of course shared by two events.
///
/// `event_a` is conventionally the earlier starter, but nothing relies on it:
/// arrival times always come from the actual start offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub event_a: String,
    pub event_b: String,
    /// Inclusive start of the shared range (km)
    pub start_km: f64,
    /// Inclusive end of the shared range (km)
    pub end_km: f64,
    /// Free-form label, carried through to output
    pub description: String,
}

impl Segment {
    /// Create a segment without a description.
    pub fn new(event_a: &str, event_b: &str, start_km: f64, end_km: f64) -> Self {
        Self {
            event_a: event_a.to_string(),
            event_b: event_b.to_string(),
            start_km,
            end_km,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// The same segment with event roles exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            event_a: self.event_b.clone(),
            event_b: self.event_a.clone(),
            ..self.clone()
        }
    }

    pub fn length_km(&self) -> f64 {
        self.end_km - self.start_km
    }

    /// Short human-readable label used in errors and logs.
    pub fn label(&self) -> String {
        format!(
            "{} vs {} {:.2}-{:.2}km",
            self.event_a, self.event_b, self.start_km, self.end_km
        )
    }

    /// Check the segment shape: named events and `0 <= start_km < end_km`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, value: String, reason: &str| CongestionError::InvalidSegment {
            segment: self.label(),
            field: field.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.event_a.trim().is_empty() {
            return Err(invalid("event_a", self.event_a.clone(), "must not be empty"));
        }
        if self.event_b.trim().is_empty() {
            return Err(invalid("event_b", self.event_b.clone(), "must not be empty"));
        }
        if !self.start_km.is_finite() || self.start_km < 0.0 {
            return Err(invalid(
                "start_km",
                self.start_km.to_string(),
                "must be a non-negative number",
            ));
        }
        if !self.end_km.is_finite() || self.start_km >= self.end_km {
            return Err(invalid(
                "end_km",
                self.end_km.to_string(),
                "must be greater than start_km",
            ));
        }
        Ok(())
    }
}

/// Ranking key for the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Peak congestion relative to field size (acute bottlenecks)
    #[default]
    PeakRatio,
    /// Cumulative interaction volume
    Intensity,
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankBy::PeakRatio => write!(f, "peak_ratio"),
            RankBy::Intensity => write!(f, "intensity"),
        }
    }
}

impl FromStr for RankBy {
    type Err = CongestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "peak_ratio" => Ok(RankBy::PeakRatio),
            "intensity" => Ok(RankBy::Intensity),
            other => Err(CongestionError::invalid_parameter(
                "rank_by",
                other,
                "expected 'peak_ratio' or 'intensity'",
            )),
        }
    }
}

/// Configuration for a congestion analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Two runners overlap when their arrival times differ by at most this.
    /// Default: 60 seconds
    pub time_window_seconds: f64,

    /// Fine checkpoint spacing in kilometers.
    /// Default: 0.01 km (10 m)
    pub step_km: f64,

    /// Coarse pass spacing as a multiple of `step_km`. 1 disables the coarse
    /// pass (uniform fine scan).
    /// Default: 5
    pub coarse_factor: u32,

    /// Drop runners that cannot overlap anywhere in the segment before
    /// sampling. Never changes results.
    /// Default: true
    pub prefilter: bool,

    /// Ranking key for the report.
    /// Default: peak_ratio
    pub rank_by: RankBy,

    /// Restrict analysis to segments matching these selectors (empty = all).
    pub segments: Vec<SegmentSelector>,

    /// Worker threads for segment fan-out: 0 uses the rayon global pool,
    /// 1 runs sequentially. Ignored without the `parallel` feature.
    /// Default: 0
    pub workers: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 60.0,
            step_km: 0.01,
            coarse_factor: 5,
            prefilter: true,
            rank_by: RankBy::PeakRatio,
            segments: Vec::new(),
            workers: 0,
        }
    }
}

impl AnalysisConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.time_window_seconds.is_finite() || self.time_window_seconds <= 0.0 {
            return Err(CongestionError::invalid_parameter(
                "time_window_seconds",
                self.time_window_seconds,
                "must be a positive number",
            ));
        }
        if !self.step_km.is_finite() || self.step_km <= 0.0 {
            return Err(CongestionError::invalid_parameter(
                "step_km",
                self.step_km,
                "must be a positive number",
            ));
        }
        if self.coarse_factor == 0 {
            return Err(CongestionError::invalid_parameter(
                "coarse_factor",
                self.coarse_factor,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Time window in minutes.
    pub fn time_window_minutes(&self) -> f64 {
        self.time_window_seconds / 60.0
    }

    /// Raise `step_km` to at least `min_step_km`.
    ///
    /// Returns the adjusted config and whether clamping happened, so request
    /// layers with a time budget can warn the caller.
    pub fn with_min_step_km(mut self, min_step_km: f64) -> (Self, bool) {
        if self.step_km < min_step_km {
            self.step_km = min_step_km;
            (self, true)
        } else {
            (self, false)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_groups_by_event() {
        let roster = Roster::from_runners(vec![
            Runner::new("10K", "1", 5.0, 10.0),
            Runner::new("Full", "1", 6.0, 42.2),
            Runner::new("10K", "2", 5.5, 10.0),
        ]);

        assert_eq!(roster.len(), 3);
        let ten_k = roster.event("10K").unwrap();
        assert_eq!(ten_k.len(), 2);
        assert_eq!(ten_k[0].runner_id, "1");
        assert_eq!(ten_k[1].runner_id, "2");
        assert!(roster.event("Half").is_none());
        assert_eq!(roster.events().collect::<Vec<_>>(), vec!["10K", "Full"]);
    }

    #[test]
    fn test_runner_validation() {
        assert!(Runner::new("10K", "1", 5.0, 10.0).is_valid());
        assert!(!Runner::new("10K", "1", 0.0, 10.0).is_valid());
        assert!(!Runner::new("10K", "1", 5.0, -1.0).is_valid());
        assert!(!Runner::new("10K", "1", f64::NAN, 10.0).is_valid());
    }

    #[test]
    fn test_segment_validation() {
        assert!(Segment::new("A", "B", 0.0, 1.0).validate().is_ok());

        let err = Segment::new("A", "B", 2.0, 2.0).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("end_km"));

        let err = Segment::new("A", "B", -1.0, 2.0).validate().unwrap_err();
        assert!(err.to_string().contains("start_km"));

        let err = Segment::new("", "B", 0.0, 2.0).validate().unwrap_err();
        assert!(err.to_string().contains("event_a"));
    }

    #[test]
    fn test_config_validation() {
        assert!(AnalysisConfig::default().validate().is_ok());

        let config = AnalysisConfig {
            step_km: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CongestionError::InvalidParameter { ref field, .. }) if field == "step_km"
        ));

        let config = AnalysisConfig {
            time_window_seconds: -5.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            coarse_factor: 0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_step_clamp() {
        let (config, clamped) = AnalysisConfig::default().with_min_step_km(0.03);
        assert!(clamped);
        assert_eq!(config.step_km, 0.03);

        let (config, clamped) = config.with_min_step_km(0.01);
        assert!(!clamped);
        assert_eq!(config.step_km, 0.03);
    }

    #[test]
    fn test_rank_by_parse() {
        assert_eq!("intensity".parse::<RankBy>().unwrap(), RankBy::Intensity);
        assert_eq!("Peak_Ratio".parse::<RankBy>().unwrap(), RankBy::PeakRatio);
        assert!("density".parse::<RankBy>().is_err());
        assert_eq!(RankBy::PeakRatio.to_string(), "peak_ratio");
    }
}
