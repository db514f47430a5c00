//! Constant-pace arrival model.
//!
//! A runner arrives at distance `d` at `start_offset(event) + d * pace`
//! minutes since midnight. Pace is assumed constant over the whole course:
//! no splits, fatigue, drafting or elevation effects are modelled. This is a
//! deliberate simplification and results should be read as a schedule, not a
//! prediction.

use crate::error::{OptionExt, Result};
use crate::{Runner, StartTimeTable};

/// Arrival time of `runner` at `km`, in minutes since midnight.
///
/// Fails with [`crate::CongestionError::MissingStartTime`] when the runner's
/// event has no start offset.
pub fn arrival_time(runner: &Runner, km: f64, start_times: &StartTimeTable) -> Result<f64> {
    let offset = start_times
        .get(&runner.event)
        .ok_or_missing_start(&runner.event, &format!("runner {}", runner.runner_id))?;
    Ok(ArrivalModel::new(offset, runner.pace_min_per_km).at(km))
}

/// A resolved `(start offset, pace)` pair for hot loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalModel {
    /// Event start in minutes since midnight
    pub start_offset: f64,
    /// Minutes per kilometer
    pub pace: f64,
}

impl ArrivalModel {
    pub fn new(start_offset: f64, pace: f64) -> Self {
        Self { start_offset, pace }
    }

    /// Resolve the model for a runner against a start-time table.
    pub fn for_runner(runner: &Runner, start_times: &StartTimeTable) -> Result<Self> {
        let offset = start_times
            .get(&runner.event)
            .ok_or_missing_start(&runner.event, &format!("runner {}", runner.runner_id))?;
        Ok(Self::new(offset, runner.pace_min_per_km))
    }

    /// Arrival time at `km`, in minutes since midnight.
    #[inline]
    pub fn at(&self, km: f64) -> f64 {
        self.start_offset + km * self.pace
    }

    /// Arrival times at both ends of a range: `(at(start_km), at(end_km))`.
    #[inline]
    pub fn span(&self, start_km: f64, end_km: f64) -> (f64, f64) {
        (self.at(start_km), self.at(end_km))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CongestionError, Runner};

    fn table() -> StartTimeTable {
        StartTimeTable::from_iter([("Full", 420.0), ("10K", 440.0)])
    }

    #[test]
    fn test_arrival_time() {
        let runner = Runner::new("10K", "7", 5.5, 10.0);
        let t = arrival_time(&runner, 2.0, &table()).unwrap();
        assert!((t - 451.0).abs() < 1e-9);

        // Start line is the start offset
        assert_eq!(arrival_time(&runner, 0.0, &table()).unwrap(), 440.0);
    }

    #[test]
    fn test_missing_start_time() {
        let runner = Runner::new("Half", "3", 5.0, 21.1);
        let err = arrival_time(&runner, 1.0, &table()).unwrap_err();
        assert!(matches!(
            err,
            CongestionError::MissingStartTime { ref event, .. } if event == "Half"
        ));
        assert!(ArrivalModel::for_runner(&runner, &table()).is_err());
    }

    #[test]
    fn test_monotonic_in_distance() {
        let model = ArrivalModel::new(420.0, 4.25);
        let mut previous = model.at(0.0);
        for i in 1..=500 {
            let t = model.at(i as f64 * 0.1);
            assert!(t > previous);
            previous = t;
        }
    }

    #[test]
    fn test_span() {
        let model = ArrivalModel::new(0.0, 6.0);
        let (lo, hi) = model.span(1.0, 2.5);
        assert_eq!(lo, 6.0);
        assert_eq!(hi, 15.0);
    }
}
