//! Overlap evaluation between two event rosters.
//!
//! Two runners overlap at a checkpoint when their arrival times differ by at
//! most the time window: `|t_a - t_b| * 60 <= time_window_seconds`.
//!
//! ## Sorted sweep
//! All runners of an event share one start offset, so ordering an event's
//! runners by pace orders their arrival times at every `km >= 0`. Each side is
//! sorted once per segment; at a checkpoint the arrival vectors are filled for
//! the whole roster and a two-pointer merge finds, for every A runner, the
//! contiguous run of B runners inside the window. Cost per checkpoint is
//! `O(|A| + |B| + pairs)` rather than `O(|A| * |B|)`.

use crate::arrival::ArrivalModel;
use crate::Runner;

/// Slack (minutes) added to the pre-filter window so rounding never drops a
/// runner that the exact per-checkpoint test would keep.
const PREFILTER_SLACK_MIN: f64 = 1e-9;

/// Keep only runners that can overlap the other event somewhere in
/// `[start_km, end_km]`.
///
/// Runner A is kept iff `[t_a(start) - w, t_a(end) + w]` intersects the hull
/// `[min t_b(start), max t_b(end)]` of event B, and symmetrically for B.
/// Arrival time is monotonic in distance, so a dropped runner has no
/// overlapping pair at any checkpoint of the segment.
pub fn prefilter<'a>(
    runners_a: &'a [Runner],
    offset_a: f64,
    runners_b: &'a [Runner],
    offset_b: f64,
    start_km: f64,
    end_km: f64,
    time_window_seconds: f64,
) -> (Vec<&'a Runner>, Vec<&'a Runner>) {
    let window = time_window_seconds / 60.0 + PREFILTER_SLACK_MIN;

    let hull = |runners: &[Runner], offset: f64| -> Option<(f64, f64)> {
        runners.iter().fold(None, |acc, r| {
            let (lo, hi) = ArrivalModel::new(offset, r.pace_min_per_km).span(start_km, end_km);
            Some(match acc {
                None => (lo, hi),
                Some((min_lo, max_hi)) => (f64::min(min_lo, lo), f64::max(max_hi, hi)),
            })
        })
    };

    let keep = |runners: &'a [Runner], offset: f64, other: Option<(f64, f64)>| -> Vec<&'a Runner> {
        let Some((other_lo, other_hi)) = other else {
            return Vec::new();
        };
        runners
            .iter()
            .filter(|r| {
                let (lo, hi) = ArrivalModel::new(offset, r.pace_min_per_km).span(start_km, end_km);
                hi + window >= other_lo && lo - window <= other_hi
            })
            .collect()
    };

    let hull_a = hull(runners_a, offset_a);
    let hull_b = hull(runners_b, offset_b);
    (
        keep(runners_a, offset_a, hull_b),
        keep(runners_b, offset_b, hull_a),
    )
}

/// One event's runners for a segment, ordered by pace.
#[derive(Debug, Clone)]
struct EventSide<'a> {
    runners: Vec<&'a Runner>,
    paces: Vec<f64>,
    offset: f64,
}

impl<'a> EventSide<'a> {
    fn new(mut runners: Vec<&'a Runner>, offset: f64) -> Self {
        // Stable: equal paces keep roster order
        runners.sort_by(|a, b| a.pace_min_per_km.total_cmp(&b.pace_min_per_km));
        let paces = runners.iter().map(|r| r.pace_min_per_km).collect();
        Self {
            runners,
            paces,
            offset,
        }
    }

    fn fill_times(&self, km: f64, out: &mut Vec<f64>) {
        out.clear();
        out.extend(self.paces.iter().map(|&pace| ArrivalModel::new(self.offset, pace).at(km)));
    }
}

/// Reusable arrival-time buffers for [`SegmentField`] evaluation.
#[derive(Debug, Default, Clone)]
pub struct SweepBuffers {
    times_a: Vec<f64>,
    times_b: Vec<f64>,
}

/// Overlap summary for a single checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointOverlap {
    pub km: f64,
    /// Number of overlapping (A, B) pairs
    pub pairs: u64,
    /// Distinct A runners in at least one pair
    pub present_a: usize,
    /// Distinct B runners in at least one pair
    pub present_b: usize,
    /// Pair with the earliest `min(t_a, t_b)`: `(time, a index, b index)`.
    /// Ties resolve to the first pair in sweep order.
    pub earliest: Option<(f64, usize, usize)>,
}

impl CheckpointOverlap {
    /// Distinct runners from both events present at this checkpoint.
    pub fn present(&self) -> usize {
        self.present_a + self.present_b
    }
}

/// The two (pre-filtered) rosters of a segment, ready for per-checkpoint
/// evaluation.
#[derive(Debug, Clone)]
pub struct SegmentField<'a> {
    side_a: EventSide<'a>,
    side_b: EventSide<'a>,
    time_window_seconds: f64,
}

impl<'a> SegmentField<'a> {
    pub fn new(
        runners_a: Vec<&'a Runner>,
        offset_a: f64,
        runners_b: Vec<&'a Runner>,
        offset_b: f64,
        time_window_seconds: f64,
    ) -> Self {
        Self {
            side_a: EventSide::new(runners_a, offset_a),
            side_b: EventSide::new(runners_b, offset_b),
            time_window_seconds,
        }
    }

    pub fn len_a(&self) -> usize {
        self.side_a.runners.len()
    }

    pub fn len_b(&self) -> usize {
        self.side_b.runners.len()
    }

    /// True when either side has no runners.
    pub fn is_empty(&self) -> bool {
        self.side_a.runners.is_empty() || self.side_b.runners.is_empty()
    }

    /// Runner of event A at sweep index `index`.
    pub fn runner_a(&self, index: usize) -> &'a Runner {
        self.side_a.runners[index]
    }

    /// Runner of event B at sweep index `index`.
    pub fn runner_b(&self, index: usize) -> &'a Runner {
        self.side_b.runners[index]
    }

    /// Cheap probe: does any pair overlap at `km`?
    pub fn has_overlap(&self, km: f64, buffers: &mut SweepBuffers) -> bool {
        self.fill(km, buffers);
        let times_b = &buffers.times_b;
        let mut lo = 0;
        for &ta in &buffers.times_a {
            while lo < times_b.len() && (ta - times_b[lo]) * 60.0 > self.time_window_seconds {
                lo += 1;
            }
            if lo == times_b.len() {
                return false;
            }
            if (times_b[lo] - ta) * 60.0 <= self.time_window_seconds {
                return true;
            }
        }
        false
    }

    /// Evaluate all overlapping pairs at `km`.
    ///
    /// `on_pair(a_index, b_index)` is called once per overlapping pair, in
    /// sweep order; indices resolve through [`Self::runner_a`] and
    /// [`Self::runner_b`].
    pub fn evaluate<F>(&self, km: f64, buffers: &mut SweepBuffers, mut on_pair: F) -> CheckpointOverlap
    where
        F: FnMut(usize, usize),
    {
        self.fill(km, buffers);
        let times_a = &buffers.times_a;
        let times_b = &buffers.times_b;
        let window = self.time_window_seconds;

        let mut result = CheckpointOverlap {
            km,
            pairs: 0,
            present_a: 0,
            present_b: 0,
            earliest: None,
        };

        // Window [lo, hi) of B runners within tolerance of the current A runner.
        // Both bounds only move forward because times_a is non-decreasing.
        let mut lo = 0;
        let mut hi = 0;
        // B runners below this index are already counted as present
        let mut covered = 0;

        for (i, &ta) in times_a.iter().enumerate() {
            while lo < times_b.len() && (ta - times_b[lo]) * 60.0 > window {
                lo += 1;
            }
            hi = hi.max(lo);
            while hi < times_b.len() && (times_b[hi] - ta) * 60.0 <= window {
                hi += 1;
            }
            if hi == lo {
                continue;
            }

            result.present_a += 1;
            result.pairs += (hi - lo) as u64;
            let from = lo.max(covered);
            if hi > from {
                result.present_b += hi - from;
            }
            covered = covered.max(hi);

            // times_b[lo] is the earliest B runner in the window
            let event_time = ta.min(times_b[lo]);
            if result.earliest.map_or(true, |(best, _, _)| event_time < best) {
                result.earliest = Some((event_time, i, lo));
            }

            for j in lo..hi {
                on_pair(i, j);
            }
        }

        result
    }

    fn fill(&self, km: f64, buffers: &mut SweepBuffers) {
        self.side_a.fill_times(km, &mut buffers.times_a);
        self.side_b.fill_times(km, &mut buffers.times_b);
    }
}
