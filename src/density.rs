//! Runner density along a course segment.
//!
//! Complements the pairwise overlap metrics with a crowding view: how many
//! runners occupy each step of a segment at once, expressed per square meter
//! of road (areal) and per meter of road (linear).
//!
//! ## Model
//! At every step `km` each event contributes the runners arriving within half
//! a time window after that event's first arrival at `km` (the window is
//! centered on the first arrival, and nobody arrives before it). Counts are
//! summed over the segment's events and divided by the step's road area
//! `step_km * 1000 * width_m`.
//!
//! ## Zones and index
//! Step densities are bucketed into green / amber / red / dark-red zones
//! (default thresholds 1.0, 1.5, 2.0 runners/m²). The 0-10 congestion index
//! combines a peak component (0-5, piecewise linear in peak density) with a
//! duration component (0-3, severity-weighted share of the segment spent in
//! amber, red or dark-red).

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{CongestionError, OptionExt, Result};
use crate::sampler::{check_grid_size, StepGrid};
use crate::{Roster, StartTimeTable};

// ============================================================================
// Segment geometry
// ============================================================================

/// Traffic direction on a segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// One-way traffic
    #[default]
    Uni,
    /// Out-and-back traffic sharing the road
    Bi,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Uni => write!(f, "uni"),
            Direction::Bi => write!(f, "bi"),
        }
    }
}

impl FromStr for Direction {
    type Err = CongestionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uni" => Ok(Direction::Uni),
            "bi" => Ok(Direction::Bi),
            other => Err(CongestionError::invalid_parameter(
                "direction",
                other,
                "expected 'uni' or 'bi'",
            )),
        }
    }
}

/// A stretch of road with a physical width, used by one or two events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensitySegment {
    pub event_a: String,
    /// Second event sharing the road, if any
    pub event_b: Option<String>,
    pub start_km: f64,
    pub end_km: f64,
    /// Usable road width in meters.
    /// Default: 3.0
    pub width_m: f64,
    /// Default: uni
    pub direction: Direction,
}

impl DensitySegment {
    pub fn new(event_a: &str, event_b: Option<&str>, start_km: f64, end_km: f64) -> Self {
        Self {
            event_a: event_a.to_string(),
            event_b: event_b.map(str::to_string),
            start_km,
            end_km,
            width_m: 3.0,
            direction: Direction::Uni,
        }
    }

    pub fn with_width(mut self, width_m: f64) -> Self {
        self.width_m = width_m;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Events whose runners are counted, `event_a` first.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.event_a.as_str()).chain(self.event_b.as_deref())
    }

    pub fn length_km(&self) -> f64 {
        self.end_km - self.start_km
    }

    pub fn label(&self) -> String {
        match &self.event_b {
            Some(b) => format!(
                "{} vs {} {:.2}-{:.2}km",
                self.event_a, b, self.start_km, self.end_km
            ),
            None => format!("{} {:.2}-{:.2}km", self.event_a, self.start_km, self.end_km),
        }
    }

    /// Check named events, `0 <= start_km < end_km` and a positive width.
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
        if let Some(b) = &self.event_b {
            if b.trim().is_empty() || *b == self.event_a {
                return Err(invalid(
                    "event_b",
                    b.clone(),
                    "must be a different, non-empty event",
                ));
            }
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
        if !self.width_m.is_finite() || self.width_m <= 0.0 {
            return Err(invalid(
                "width_m",
                self.width_m.to_string(),
                "must be a positive number",
            ));
        }
        Ok(())
    }
}

/// Parses `EventA,EventB,from,to,width,direction`; `EventB` may be empty.
impl FromStr for DensitySegment {
    type Err = CongestionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            CongestionError::invalid_parameter(
                "density_segment",
                s,
                "expected 'EventA,EventB,from,to,width,direction', e.g. '10K,Half,0.00,2.74,3.0,uni'",
            )
        };

        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [event_a, event_b, start, end, width, direction] = parts[..] else {
            return Err(invalid());
        };
        if event_a.is_empty() {
            return Err(invalid());
        }
        let number = |raw: &str| raw.parse::<f64>().map_err(|_| invalid());

        let segment = DensitySegment::new(
            event_a,
            (!event_b.is_empty()).then_some(event_b),
            number(start)?,
            number(end)?,
        )
        .with_width(number(width)?)
        .with_direction(direction.parse()?);
        segment.validate()?;
        Ok(segment)
    }
}

// ============================================================================
// Configuration and zones
// ============================================================================

/// Density level of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityZone {
    Green,
    Amber,
    Red,
    DarkRed,
}

/// Lower bounds (runners/m²) of the amber, red and dark-red zones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    /// Default: 1.0
    pub amber: f64,
    /// Default: 1.5
    pub red: f64,
    /// Default: 2.0
    pub dark_red: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            amber: 1.0,
            red: 1.5,
            dark_red: 2.0,
        }
    }
}

impl ZoneThresholds {
    /// Zone of an areal density. Each lower bound belongs to its zone.
    pub fn zone(&self, density: f64) -> DensityZone {
        if density < self.amber {
            DensityZone::Green
        } else if density < self.red {
            DensityZone::Amber
        } else if density < self.dark_red {
            DensityZone::Red
        } else {
            DensityZone::DarkRed
        }
    }
}

/// Configuration for a density run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityConfig {
    /// Step length in kilometers.
    /// Default: 0.03 km
    pub step_km: f64,

    /// Full time window; runners within half of it after the first arrival
    /// are counted.
    /// Default: 60 seconds
    pub time_window_seconds: f64,

    pub zones: ZoneThresholds,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            step_km: 0.03,
            time_window_seconds: 60.0,
            zones: ZoneThresholds::default(),
        }
    }
}

impl DensityConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.step_km.is_finite() || self.step_km <= 0.0 {
            return Err(CongestionError::invalid_parameter(
                "step_km",
                self.step_km,
                "must be a positive number",
            ));
        }
        if !self.time_window_seconds.is_finite() || self.time_window_seconds <= 0.0 {
            return Err(CongestionError::invalid_parameter(
                "time_window_seconds",
                self.time_window_seconds,
                "must be a positive number",
            ));
        }
        let z = &self.zones;
        if !(z.amber > 0.0 && z.amber < z.red && z.red < z.dark_red) {
            return Err(CongestionError::invalid_parameter(
                "zones",
                format!("{}/{}/{}", z.amber, z.red, z.dark_red),
                "thresholds must be positive and increasing",
            ));
        }
        Ok(())
    }
}

/// Kilometers of a segment spent in each zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneKm {
    pub green: f64,
    pub amber: f64,
    pub red: f64,
    pub dark_red: f64,
}

impl ZoneKm {
    fn add(&mut self, zone: DensityZone, km: f64) {
        match zone {
            DensityZone::Green => self.green += km,
            DensityZone::Amber => self.amber += km,
            DensityZone::Red => self.red += km,
            DensityZone::DarkRed => self.dark_red += km,
        }
    }
}

/// 0-10 congestion index, rounded to one decimal.
///
/// Peak component (0-5): 0 below 1.0/m², rising linearly to 2 at 1.5/m²,
/// 4 at 2.0/m² and 5 at 3.0/m² (capped). Duration component (0-3):
/// `3 * min(1, 0.4 * amber + 0.8 * red + 1.0 * dark_red)` over zone shares
/// of the segment length.
pub fn congestion_index(
    peak_density: f64,
    share_amber: f64,
    share_red: f64,
    share_dark_red: f64,
) -> f64 {
    let peak = if peak_density < 1.0 {
        0.0
    } else if peak_density < 1.5 {
        2.0 * (peak_density - 1.0) / 0.5
    } else if peak_density < 2.0 {
        2.0 + 2.0 * (peak_density - 1.5) / 0.5
    } else {
        4.0 + (peak_density.min(3.0) - 2.0)
    };
    let peak = peak.clamp(0.0, 5.0);

    let duration = 3.0 * (0.4 * share_amber + 0.8 * share_red + share_dark_red).min(1.0);
    ((peak + duration).min(10.0) * 10.0).round() / 10.0
}

// ============================================================================
// Steps and rollup
// ============================================================================

/// Runners of one event counted at a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCount {
    pub event: String,
    pub count: usize,
}

/// Concurrent runners at one step of a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityStep {
    pub km: f64,
    /// Per-event counts in segment event order
    pub counts: Vec<EventCount>,
    pub combined: usize,
    /// Runners per m² of the step's road area
    pub areal_per_m2: f64,
    /// Runners per meter of the step's length
    pub linear_per_m: f64,
}

/// Segment-level density summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRollup {
    pub segment: DensitySegment,
    /// First step with the highest areal density
    pub peak_km: f64,
    pub peak_counts: Vec<EventCount>,
    pub peak_combined: usize,
    pub peak_step_areal_per_m2: f64,
    pub peak_step_linear_per_m: f64,
    /// Peak count spread over the whole segment area
    pub segment_avg_at_peak_areal_per_m2: f64,
    /// Peak count spread over the whole segment length
    pub segment_avg_at_peak_linear_per_m: f64,
    pub zones_km: ZoneKm,
    /// 0-10, see [`congestion_index`]
    pub congestion_index: f64,
}

/// One event's runners resolved for a segment: start offset and ascending paces.
struct EventPaces<'a> {
    event: &'a str,
    offset: f64,
    paces: Vec<f64>,
}

impl EventPaces<'_> {
    /// Runners arriving within `half_window_seconds` of the first arrival at `km`.
    fn count_at(&self, km: f64, half_window_seconds: f64) -> usize {
        let Some(&fastest) = self.paces.first() else {
            return 0;
        };
        let first = self.offset + km * fastest;
        self.paces.partition_point(|&pace| {
            (self.offset + km * pace - first) * 60.0 <= half_window_seconds
        })
    }
}

/// Count concurrent runners at every step of `segment`.
///
/// Steps follow the checkpoint grid `start_km + i * step_km`. Fails when an
/// event has no runners or no start time.
pub fn compute_density_steps(
    roster: &Roster,
    segment: &DensitySegment,
    start_times: &StartTimeTable,
    config: &DensityConfig,
) -> Result<Vec<DensityStep>> {
    config.validate()?;
    segment.validate()?;
    check_grid_size(segment.start_km, segment.end_km, config.step_km)?;

    let label = segment.label();
    let context = format!("density segment {}", label);
    let mut sides = Vec::new();
    for event in segment.events() {
        let runners = roster.event(event).ok_or_missing_event(event, &label)?;
        let offset = start_times.get(event).ok_or_missing_start(event, &context)?;
        let mut paces: Vec<f64> = runners.iter().map(|r| r.pace_min_per_km).collect();
        paces.sort_by(f64::total_cmp);
        sides.push(EventPaces {
            event,
            offset,
            paces,
        });
    }

    let grid = StepGrid::new(segment.start_km, segment.end_km, config.step_km);
    let half_window = config.time_window_seconds / 2.0;
    let step_m = config.step_km * 1000.0;
    let step_area_m2 = step_m * segment.width_m;

    let steps: Vec<DensityStep> = (0..grid.point_count())
        .map(|i| {
            let km = grid.km(i);
            let counts: Vec<EventCount> = sides
                .iter()
                .map(|side| EventCount {
                    event: side.event.to_string(),
                    count: side.count_at(km, half_window),
                })
                .collect();
            let combined = counts.iter().map(|c| c.count).sum::<usize>();
            DensityStep {
                km,
                counts,
                combined,
                areal_per_m2: combined as f64 / step_area_m2,
                linear_per_m: combined as f64 / step_m,
            }
        })
        .collect();

    debug!("[Density] {}: {} steps", label, steps.len());
    Ok(steps)
}

/// Summarise the steps of one segment: peak, zone distances and index.
pub fn rollup_segment(
    steps: &[DensityStep],
    segment: &DensitySegment,
    config: &DensityConfig,
) -> Result<DensityRollup> {
    let mut peak = steps.first().ok_or_else(|| CongestionError::Computation {
        segment: segment.label(),
        message: "no density steps to roll up".to_string(),
    })?;
    for step in &steps[1..] {
        if step.areal_per_m2 > peak.areal_per_m2 {
            peak = step;
        }
    }

    let mut zones_km = ZoneKm::default();
    for step in steps {
        zones_km.add(config.zones.zone(step.areal_per_m2), config.step_km);
    }

    let length_km = segment.length_km().max(1e-9);
    let length_m = length_km * 1000.0;
    let area_m2 = (length_m * segment.width_m).max(1.0);

    // The index thresholds are fixed on the default zone scale
    let congestion_index = congestion_index(
        peak.areal_per_m2,
        zones_km.amber / length_km,
        zones_km.red / length_km,
        zones_km.dark_red / length_km,
    );

    Ok(DensityRollup {
        segment: segment.clone(),
        peak_km: peak.km,
        peak_counts: peak.counts.clone(),
        peak_combined: peak.combined,
        peak_step_areal_per_m2: peak.areal_per_m2,
        peak_step_linear_per_m: peak.linear_per_m,
        segment_avg_at_peak_areal_per_m2: peak.combined as f64 / area_m2,
        segment_avg_at_peak_linear_per_m: peak.combined as f64 / length_m,
        zones_km,
        congestion_index,
    })
}

/// Compute and roll up density for every segment, in input order.
pub fn analyze_density(
    roster: &Roster,
    start_times: &StartTimeTable,
    segments: &[DensitySegment],
    config: &DensityConfig,
) -> Result<Vec<DensityRollup>> {
    config.validate()?;
    let rollups = segments
        .iter()
        .map(|segment| {
            let steps = compute_density_steps(roster, segment, start_times, config)?;
            rollup_segment(&steps, segment, config)
        })
        .collect::<Result<Vec<_>>>()?;

    info!("[Density] Rolled up {} segments", rollups.len());
    Ok(rollups)
}

/// Text block for one segment rollup.
pub fn render_density_block(rollup: &DensityRollup) -> String {
    let segment = &rollup.segment;
    let zones = &rollup.zones_km;
    let breakdown = rollup
        .peak_counts
        .iter()
        .map(|c| format!("{}={}", c.event, c.count))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = writeln!(out, "Density: {}", segment.label());
    let _ = writeln!(
        out,
        "Segment: width={} m, direction={}",
        segment.width_m, segment.direction
    );
    let _ = writeln!(
        out,
        "Peak concurrent: {} ({}) at {:.2} km",
        rollup.peak_combined, breakdown, rollup.peak_km
    );
    let _ = writeln!(
        out,
        "Density (peak step): {:.2} /m² (linear {:.2} /m)",
        rollup.peak_step_areal_per_m2, rollup.peak_step_linear_per_m
    );
    let _ = writeln!(
        out,
        "Density (segment average at peak): {:.3} /m² (linear {:.3} /m)",
        rollup.segment_avg_at_peak_areal_per_m2, rollup.segment_avg_at_peak_linear_per_m
    );
    let _ = writeln!(
        out,
        "Zones (km): G={:.2}, A={:.2}, R={:.2}, D={:.2}",
        zones.green, zones.amber, zones.red, zones.dark_red
    );
    let _ = writeln!(out, "Index: {:.1}/10", rollup.congestion_index);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Runner};

    fn pack(event: &str, paces: &[f64]) -> Vec<Runner> {
        paces
            .iter()
            .enumerate()
            .map(|(i, &p)| Runner::new(event, &format!("{event}{i}"), p, 10.0))
            .collect()
    }

    #[test]
    fn test_zone_thresholds() {
        let zones = ZoneThresholds::default();
        assert_eq!(zones.zone(0.0), DensityZone::Green);
        assert_eq!(zones.zone(0.99), DensityZone::Green);
        assert_eq!(zones.zone(1.0), DensityZone::Amber);
        assert_eq!(zones.zone(1.49), DensityZone::Amber);
        assert_eq!(zones.zone(1.5), DensityZone::Red);
        assert_eq!(zones.zone(1.99), DensityZone::Red);
        assert_eq!(zones.zone(2.0), DensityZone::DarkRed);
        assert_eq!(zones.zone(7.5), DensityZone::DarkRed);
    }

    #[test]
    fn test_congestion_index_peak_component() {
        assert_eq!(congestion_index(0.5, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(congestion_index(1.25, 0.0, 0.0, 0.0), 1.0);
        assert_eq!(congestion_index(1.75, 0.0, 0.0, 0.0), 3.0);
        assert_eq!(congestion_index(2.5, 0.0, 0.0, 0.0), 4.5);
        // Peak component caps at 3.0/m²
        assert_eq!(congestion_index(9.0, 0.0, 0.0, 0.0), 5.0);
    }

    #[test]
    fn test_congestion_index_duration_component() {
        assert_eq!(congestion_index(1.0, 1.0, 0.0, 0.0), 1.2);
        assert_eq!(congestion_index(0.0, 0.0, 0.5, 0.0), 1.2);
        // Duration share saturates at 1
        assert_eq!(congestion_index(3.5, 0.0, 0.0, 1.0), 8.0);
        assert_eq!(congestion_index(3.5, 1.0, 1.0, 1.0), 8.0);
    }

    #[test]
    fn test_density_steps_count_half_window_after_first_arrival() {
        let roster = Roster::from_runners(pack("X", &[6.0, 5.0, 5.0]));
        let starts = StartTimeTable::from_iter([("X", 420.0)]);
        let segment = DensitySegment::new("X", None, 0.0, 1.0).with_width(2.0);
        let config = DensityConfig {
            step_km: 0.5,
            ..DensityConfig::default()
        };

        let steps = compute_density_steps(&roster, &segment, &starts, &config).unwrap();
        let combined: Vec<usize> = steps.iter().map(|s| s.combined).collect();
        // km 0.5: 6:00 runner is 30 s behind (inside); km 1.0: 60 s behind (outside)
        assert_eq!(combined, vec![3, 3, 2]);
        assert_eq!(steps[0].counts[0].event, "X");
        assert!((steps[0].areal_per_m2 - 3.0 / 1000.0).abs() < 1e-12);
        assert!((steps[0].linear_per_m - 3.0 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_density_steps_two_events() {
        let mut runners = pack("10K", &[5.0, 5.0]);
        runners.extend(pack("Half", &[5.0]));
        let roster = Roster::from_runners(runners);
        let starts = StartTimeTable::from_iter([("10K", 440.0), ("Half", 460.0)]);
        let segment = DensitySegment::new("10K", Some("Half"), 0.0, 0.3);

        let steps =
            compute_density_steps(&roster, &segment, &starts, &DensityConfig::default()).unwrap();
        assert_eq!(steps.len(), 11);
        for step in &steps {
            assert_eq!(step.counts.len(), 2);
            assert_eq!(step.counts[1].event, "Half");
            assert_eq!(step.combined, 3);
        }
    }

    #[test]
    fn test_rollup_quiet_segment() {
        let roster = Roster::from_runners(pack("X", &[6.0, 5.0, 5.0]));
        let starts = StartTimeTable::from_iter([("X", 420.0)]);
        let segment = DensitySegment::new("X", None, 0.0, 1.0).with_width(2.0);
        let config = DensityConfig {
            step_km: 0.5,
            ..DensityConfig::default()
        };

        let steps = compute_density_steps(&roster, &segment, &starts, &config).unwrap();
        let rollup = rollup_segment(&steps, &segment, &config).unwrap();

        // Tie between km 0.0 and 0.5: the first step wins
        assert_eq!(rollup.peak_km, 0.0);
        assert_eq!(rollup.peak_combined, 3);
        assert!((rollup.zones_km.green - 1.5).abs() < 1e-12);
        assert_eq!(rollup.zones_km.dark_red, 0.0);
        assert_eq!(rollup.congestion_index, 0.0);
        assert!((rollup.segment_avg_at_peak_linear_per_m - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_rollup_packed_segment() {
        // 20 runners in a 10 m x 1 m step: 2.0/m² everywhere
        let roster = Roster::from_runners(pack("X", &[5.0; 20]));
        let starts = StartTimeTable::from_iter([("X", 420.0)]);
        let segment = DensitySegment::new("X", None, 0.0, 0.05).with_width(1.0);
        let config = DensityConfig {
            step_km: 0.01,
            ..DensityConfig::default()
        };

        let rollups = analyze_density(&roster, &starts, &[segment], &config).unwrap();
        let rollup = &rollups[0];

        assert_eq!(rollup.peak_combined, 20);
        assert_eq!(rollup.peak_step_areal_per_m2, 2.0);
        assert!((rollup.zones_km.dark_red - 0.06).abs() < 1e-9);
        assert_eq!(rollup.zones_km.green, 0.0);
        assert_eq!(rollup.congestion_index, 7.0);

        let text = render_density_block(rollup);
        assert!(text.contains("Peak concurrent: 20 (X=20) at 0.00 km"));
        assert!(text.contains("Index: 7.0/10"));
    }

    #[test]
    fn test_rollup_without_steps_is_computation_error() {
        let segment = DensitySegment::new("X", None, 0.0, 1.0);
        let err = rollup_segment(&[], &segment, &DensityConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn test_missing_event_and_start_time() {
        let roster = Roster::from_runners(pack("X", &[5.0]));
        let segment = DensitySegment::new("X", Some("Y"), 0.0, 1.0);

        let starts = StartTimeTable::from_iter([("X", 0.0), ("Y", 0.0)]);
        let config = DensityConfig::default();
        let err = compute_density_steps(&roster, &segment, &starts, &config).unwrap_err();
        assert!(matches!(err, CongestionError::MissingEvent { ref event, .. } if event == "Y"));

        let single = DensitySegment::new("X", None, 0.0, 1.0);
        let err = compute_density_steps(&roster, &single, &StartTimeTable::new(), &config)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_parse_density_segment() {
        let segment: DensitySegment = "10K,Half,0.00,2.74,3.0,uni".parse().unwrap();
        assert_eq!(segment.event_b.as_deref(), Some("Half"));
        assert_eq!(segment.end_km, 2.74);
        assert_eq!(segment.direction, Direction::Uni);

        let segment: DensitySegment = "10K, ,2.74,5.80,1.5,BI".parse().unwrap();
        assert!(segment.event_b.is_none());
        assert_eq!(segment.width_m, 1.5);
        assert_eq!(segment.direction, Direction::Bi);
        assert_eq!(segment.events().collect::<Vec<_>>(), vec!["10K"]);
    }

    #[test]
    fn test_parse_density_segment_errors() {
        assert!("10K,Half,0,1,3".parse::<DensitySegment>().is_err());
        assert!("10K,Half,0,1,wide,uni".parse::<DensitySegment>().is_err());
        assert!("10K,Half,0,1,3,sideways".parse::<DensitySegment>().is_err());

        let err = "10K,Half,0,1,0,uni".parse::<DensitySegment>().unwrap_err();
        assert!(matches!(err, CongestionError::InvalidSegment { ref field, .. } if field == "width_m"));

        let err = "10K,10K,0,1,3,uni".parse::<DensitySegment>().unwrap_err();
        assert!(matches!(err, CongestionError::InvalidSegment { ref field, .. } if field == "event_b"));
    }

    #[test]
    fn test_config_validation() {
        assert!(DensityConfig::default().validate().is_ok());
        let config = DensityConfig {
            zones: ZoneThresholds {
                amber: 2.0,
                red: 1.5,
                dark_red: 3.0,
            },
            ..DensityConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
