//! Segment selectors.
//!
//! A selector has the form `Event:start-end` (an en dash is accepted in place
//! of the hyphen) and matches every catalogue segment whose `event_a` is
//! `Event` and whose km range intersects `[start, end]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CongestionError, Result};
use crate::Segment;

/// A request to analyse only part of the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSelector {
    pub event: String,
    pub start_km: f64,
    pub end_km: f64,
}

impl SegmentSelector {
    pub fn new(event: &str, start_km: f64, end_km: f64) -> Self {
        Self {
            event: event.to_string(),
            start_km,
            end_km,
        }
    }

    /// Does this selector pick `segment`? Ranges are closed and may be given
    /// in either order.
    pub fn matches(&self, segment: &Segment) -> bool {
        if segment.event_a != self.event {
            return false;
        }
        let (lo, hi) = ordered(self.start_km, self.end_km);
        let (seg_lo, seg_hi) = ordered(segment.start_km, segment.end_km);
        !(hi < seg_lo || seg_hi < lo)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl fmt::Display for SegmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:.2}-{:.2}", self.event, self.start_km, self.end_km)
    }
}

impl FromStr for SegmentSelector {
    type Err = CongestionError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            CongestionError::invalid_parameter(
                "segments",
                s,
                "expected 'Event:start-end', e.g. '10K:5.81-8.10'",
            )
        };

        let normalized = s.replace('–', "-");
        let (event, range) = normalized.split_once(':').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;
        let event = event.trim();
        if event.is_empty() {
            return Err(invalid());
        }
        let start_km: f64 = start.trim().parse().map_err(|_| invalid())?;
        let end_km: f64 = end.trim().parse().map_err(|_| invalid())?;
        if !start_km.is_finite() || !end_km.is_finite() {
            return Err(invalid());
        }

        Ok(Self::new(event, start_km, end_km))
    }
}

/// Restrict `catalogue` to segments matched by any selector.
///
/// No selectors selects the whole catalogue. The result keeps catalogue
/// order and contains each segment once. A selector that matches nothing
/// fails with [`CongestionError::UnmatchedSelector`], listing the valid
/// segments for its event.
pub fn select_segments<'a>(
    catalogue: &'a [Segment],
    selectors: &[SegmentSelector],
) -> Result<Vec<&'a Segment>> {
    if selectors.is_empty() {
        return Ok(catalogue.iter().collect());
    }

    let mut selected = vec![false; catalogue.len()];
    for selector in selectors {
        let mut matched = false;
        for (i, segment) in catalogue.iter().enumerate() {
            if selector.matches(segment) {
                selected[i] = true;
                matched = true;
            }
        }

        if !matched {
            let mut available: Vec<&Segment> = catalogue
                .iter()
                .filter(|s| s.event_a == selector.event)
                .collect();
            available.sort_by(|a, b| a.start_km.total_cmp(&b.start_km));
            return Err(CongestionError::UnmatchedSelector {
                selector: selector.to_string(),
                available: available.into_iter().map(describe).collect(),
            });
        }
    }

    Ok(catalogue
        .iter()
        .zip(selected)
        .filter_map(|(segment, keep)| keep.then_some(segment))
        .collect())
}

fn describe(segment: &Segment) -> String {
    let selector = SegmentSelector::new(&segment.event_a, segment.start_km, segment.end_km);
    if segment.description.is_empty() {
        selector.to_string()
    } else {
        format!("{} ({})", selector, segment.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> Vec<Segment> {
        vec![
            Segment::new("10K", "Half", 0.0, 2.74).with_description("Start to Queen Square"),
            Segment::new("10K", "Half", 5.81, 8.10).with_description("Station Rd out and back"),
            Segment::new("Full", "10K", 29.03, 37.0),
        ]
    }

    #[test]
    fn test_parse_selector() {
        let selector: SegmentSelector = "10K:5.81-8.10".parse().unwrap();
        assert_eq!(selector.event, "10K");
        assert_eq!(selector.start_km, 5.81);
        assert_eq!(selector.end_km, 8.10);

        let selector: SegmentSelector = " Full : 29 – 37 ".parse().unwrap();
        assert_eq!(selector.event, "Full");
        assert_eq!(selector.end_km, 37.0);
    }

    #[test]
    fn test_parse_selector_errors() {
        for bad in ["10K", "10K:5.81", ":1-2", "10K:a-b", "10K:1-inf"] {
            let err = bad.parse::<SegmentSelector>().unwrap_err();
            assert!(
                matches!(err, CongestionError::InvalidParameter { ref field, .. } if field == "segments"),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_select_intersecting() {
        let catalogue = catalogue();
        let selectors = vec!["10K:6.0-7.0".parse().unwrap()];
        let selected = select_segments(&catalogue, &selectors).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].start_km, 5.81);

        // Reversed bounds and touching endpoints still intersect
        let selectors = vec![SegmentSelector::new("10K", 2.74, 0.5)];
        let selected = select_segments(&catalogue, &selectors).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].start_km, 0.0);
    }

    #[test]
    fn test_select_dedups_in_catalogue_order() {
        let catalogue = catalogue();
        let selectors = vec![
            "Full:30-31".parse().unwrap(),
            "10K:0-10".parse().unwrap(),
            "10K:1-2".parse().unwrap(),
        ];
        let selected = select_segments(&catalogue, &selectors).unwrap();
        let starts: Vec<f64> = selected.iter().map(|s| s.start_km).collect();
        assert_eq!(starts, vec![0.0, 5.81, 29.03]);
    }

    #[test]
    fn test_no_selectors_selects_all() {
        let catalogue = catalogue();
        assert_eq!(select_segments(&catalogue, &[]).unwrap().len(), 3);
    }

    #[test]
    fn test_unmatched_selector_lists_valid_ranges() {
        let catalogue = catalogue();
        let selectors = vec!["10K:3.0-4.0".parse().unwrap()];
        let err = select_segments(&catalogue, &selectors).unwrap_err();

        match err {
            CongestionError::UnmatchedSelector { selector, available } => {
                assert_eq!(selector, "10K:3.00-4.00");
                assert_eq!(
                    available,
                    vec![
                        "10K:0.00-2.74 (Start to Queen Square)".to_string(),
                        "10K:5.81-8.10 (Station Rd out and back)".to_string(),
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_event_selector() {
        let catalogue = catalogue();
        let selectors = vec!["Relay:0-1".parse().unwrap()];
        let err = select_segments(&catalogue, &selectors).unwrap_err();
        assert!(matches!(
            err,
            CongestionError::UnmatchedSelector { ref available, .. } if available.is_empty()
        ));
    }
}
