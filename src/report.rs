//! Report rendering and export records.
//!
//! Turns an [`AnalysisReport`] into the ranked text summary, a detailed
//! per-segment block, or flat [`SummaryRecord`] rows for CSV/JSON export.

use std::fmt::Write as _;
use std::io;

use serde::{Deserialize, Serialize};

use crate::aggregator::SegmentResult;
use crate::error::Result;
use crate::orchestrator::AnalysisReport;
use crate::RankBy;

/// Format minutes since midnight as `HH:MM:SS`, rounded to the second.
pub fn format_clock(minutes: f64) -> String {
    let total_seconds = (minutes * 60.0).round().max(0.0) as u64;
    let hours = total_seconds / 3600;
    let mins = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.2}%", r * 100.0),
        None => "n/a".to_string(),
    }
}

/// Format an integer with thousands separators.
fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn range_label(result: &SegmentResult) -> String {
    format!(
        "{:.2}km-{:.2}km",
        result.segment.start_km, result.segment.end_km
    )
}

fn description_suffix(result: &SegmentResult) -> String {
    if result.segment.description.is_empty() {
        String::new()
    } else {
        format!(" ({})", result.segment.description)
    }
}

/// Ranked one-line-per-segment summary.
pub fn render_summary(report: &AnalysisReport) -> String {
    let mut out = String::new();
    if report.is_empty() {
        out.push_str("No segments analysed.\n");
        return out;
    }

    let heading = match report.rank_by {
        RankBy::Intensity => "cumulative intensity",
        RankBy::PeakRatio => "peak congestion ratio (acute bottlenecks)",
    };
    let _ = writeln!(out, "Interaction Intensity Summary - ranked by {}:", heading);

    for (i, result) in report.results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:02}. {} vs {} {}{}: PeakRatio={}, Peak={}, Intensity/km={:.1}, Intensity={}, DistinctPairs={}",
            i + 1,
            result.segment.event_a,
            result.segment.event_b,
            range_label(result),
            description_suffix(result),
            format_ratio(result.peak_ratio()),
            result.peak_congestion,
            result.intensity_per_km(),
            format_count(result.intensity),
            format_count(result.distinct_pairs as u64),
        );
    }
    out
}

/// Detailed block for one segment.
pub fn render_segment(result: &SegmentResult) -> String {
    let segment = &result.segment;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Overlap segment: {:.2} km -> {:.2} km{}",
        segment.start_km,
        segment.end_km,
        description_suffix(result)
    );
    let _ = writeln!(out, "Total in '{}': {} runners", segment.event_a, result.total_a);
    let _ = writeln!(out, "Total in '{}': {} runners", segment.event_b, result.total_b);

    match &result.first_overlap {
        Some(first) => {
            let _ = writeln!(
                out,
                "First overlap at {} at {:.2}km -> {} Bib: {}, {} Bib: {}",
                format_clock(first.time_min),
                first.km,
                segment.event_a,
                first.runner_a,
                segment.event_b,
                first.runner_b
            );
        }
        None => {
            let _ = writeln!(out, "No overlap detected between events in this segment.");
        }
    }

    let _ = writeln!(
        out,
        "Interaction Intensity over segment: {} (cumulative overlap events)",
        format_count(result.intensity)
    );
    let peak_at = result
        .peak_checkpoint_km
        .map(|km| format!(" at {:.2}km", km))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "Peak congestion: {} total runners{} ({} from '{}', {} from '{}')",
        result.peak_congestion, peak_at, result.peak_a, segment.event_a, result.peak_b, segment.event_b
    );
    let _ = writeln!(
        out,
        "Unique Pairs: {} (cross-bib relationships with at least one overlap)",
        format_count(result.distinct_pairs as u64)
    );
    out
}

/// One flat export row per analysed segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub rank: usize,
    pub event_a: String,
    pub event_b: String,
    pub segment: String,
    pub description: String,
    pub intensity: u64,
    pub intensity_per_km: f64,
    pub distinct_pairs: usize,
    pub peak_congestion: usize,
    pub peak_congestion_ratio: Option<f64>,
    pub peak_checkpoint_km: Option<f64>,
    pub total_a: usize,
    pub total_b: usize,
    pub start_a: f64,
    pub start_b: f64,
    pub time_window_seconds: f64,
    pub step_km: f64,
    pub first_overlap_time: String,
    pub first_overlap_km: String,
    pub first_overlap_runner_a: String,
    pub first_overlap_runner_b: String,
}

impl SummaryRecord {
    fn from_result(rank: usize, result: &SegmentResult, report: &AnalysisReport) -> Self {
        let first = result.first_overlap.as_ref();
        Self {
            rank,
            event_a: result.segment.event_a.clone(),
            event_b: result.segment.event_b.clone(),
            segment: range_label(result),
            description: result.segment.description.clone(),
            intensity: result.intensity,
            intensity_per_km: result.intensity_per_km(),
            distinct_pairs: result.distinct_pairs,
            peak_congestion: result.peak_congestion,
            peak_congestion_ratio: result.peak_ratio(),
            peak_checkpoint_km: result.peak_checkpoint_km,
            total_a: result.total_a,
            total_b: result.total_b,
            start_a: result.start_a,
            start_b: result.start_b,
            time_window_seconds: report.time_window_seconds,
            step_km: report.step_km,
            first_overlap_time: first.map(|f| format_clock(f.time_min)).unwrap_or_default(),
            first_overlap_km: first.map(|f| format!("{:.2}", f.km)).unwrap_or_default(),
            first_overlap_runner_a: first.map(|f| f.runner_a.clone()).unwrap_or_default(),
            first_overlap_runner_b: first.map(|f| f.runner_b.clone()).unwrap_or_default(),
        }
    }
}

impl AnalysisReport {
    /// Flat export rows in rank order (rank starts at 1).
    pub fn summary_records(&self) -> Vec<SummaryRecord> {
        self.results
            .iter()
            .enumerate()
            .map(|(i, result)| SummaryRecord::from_result(i + 1, result, self))
            .collect()
    }
}

/// Write summary rows as CSV with a header line.
pub fn write_summary_csv<W: io::Write>(records: &[SummaryRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::FirstOverlap;
    use crate::Segment;

    fn result(intensity: u64, peak: usize) -> SegmentResult {
        let mut r = SegmentResult::empty(
            &Segment::new("10K", "Half", 5.81, 8.1).with_description("Station Rd"),
            800,
            1200,
            440.0,
            460.0,
        );
        r.intensity = intensity;
        r.peak_congestion = peak;
        r.peak_a = peak / 2;
        r.peak_b = peak - peak / 2;
        r.distinct_pairs = 4321;
        r.peak_checkpoint_km = Some(6.2);
        r.first_overlap = Some(FirstOverlap {
            time_min: 480.5,
            km: 5.81,
            runner_a: "1044".to_string(),
            runner_b: "2210".to_string(),
        });
        r
    }

    fn report() -> AnalysisReport {
        AnalysisReport {
            rank_by: RankBy::PeakRatio,
            time_window_seconds: 60.0,
            step_km: 0.03,
            results: vec![result(1_234_567, 100), result(12, 4)],
        }
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00:00");
        assert_eq!(format_clock(420.0), "07:00:00");
        assert_eq!(format_clock(480.5), "08:00:30");
        assert_eq!(format_clock(61.999), "01:02:00");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&report());
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("peak congestion ratio"));
        assert!(lines[1].starts_with("01. 10K vs Half 5.81km-8.10km (Station Rd): PeakRatio=5.00%"));
        assert!(lines[1].contains("Intensity=1,234,567"));
        assert!(lines[1].contains("DistinctPairs=4,321"));
        assert!(lines[2].starts_with("02. "));
    }

    #[test]
    fn test_render_empty_summary() {
        let report = AnalysisReport {
            results: vec![],
            ..report()
        };
        assert_eq!(render_summary(&report), "No segments analysed.\n");
    }

    #[test]
    fn test_render_segment() {
        let text = render_segment(&result(12, 4));
        assert!(text.contains("First overlap at 08:00:30 at 5.81km -> 10K Bib: 1044, Half Bib: 2210"));
        assert!(text.contains("Peak congestion: 4 total runners at 6.20km (2 from '10K', 2 from 'Half')"));

        let mut quiet = result(0, 0);
        quiet.first_overlap = None;
        assert!(render_segment(&quiet).contains("No overlap detected"));
    }

    #[test]
    fn test_summary_records_and_csv() {
        let records = report().summary_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rank, 1);
        assert_eq!(records[0].first_overlap_time, "08:00:30");
        assert_eq!(records[0].peak_congestion_ratio, Some(0.05));

        let mut buf = Vec::new();
        write_summary_csv(&records, &mut buf).unwrap();
        let csv_text = String::from_utf8(buf).unwrap();
        let mut lines = csv_text.lines();
        assert!(lines.next().unwrap().starts_with("rank,event_a,event_b,segment"));
        assert!(lines.next().unwrap().starts_with("1,10K,Half,5.81km-8.10km,Station Rd,1234567,"));
    }

    #[test]
    fn test_summary_records_json() {
        let json = serde_json::to_string(&report().summary_records()).unwrap();
        assert!(json.contains("\"first_overlap_runner_b\":\"2210\""));
    }
}
