//! CSV input loading.
//!
//! Header names are matched case-insensitively after trimming; extra columns
//! are ignored.
//!
//! - Pace CSV: `event, runner_id, pace, distance`
//! - Overlaps CSV: `event, start, end, overlapswith` and optional `description`
//! - Start times: `Event=minutes_since_midnight` strings

use std::collections::HashSet;
use std::io;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{CongestionError, Result};
use crate::{Roster, Runner, Segment, StartTimeTable};

const PACE_FILE: &str = "pace CSV";
const OVERLAPS_FILE: &str = "overlaps CSV";

/// Column positions resolved from a header row.
struct Columns {
    headers: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            headers: headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
        }
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn required(&self, file: &str, name: &str) -> Result<usize> {
        self.optional(name).ok_or_else(|| CongestionError::MissingColumn {
            file: file.to_string(),
            column: name.to_string(),
        })
    }
}

fn field<'r>(record: &'r StringRecord, index: usize) -> &'r str {
    record.get(index).unwrap_or("").trim()
}

fn parse_number(record: &StringRecord, index: usize, name: &str, row: usize) -> Result<f64> {
    let raw = field(record, index);
    raw.parse::<f64>().map_err(|_| {
        CongestionError::invalid_parameter(name, raw, &format!("row {}: not a number", row))
    })
}

fn reader<R: io::Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input)
}

/// Load runners from a pace CSV.
///
/// Every runner must have a non-empty id, unique within its event, and a
/// positive pace and distance.
pub fn read_roster<R: io::Read>(input: R) -> Result<Roster> {
    let mut reader = reader(input);
    let columns = Columns::new(reader.headers()?);
    let event = columns.required(PACE_FILE, "event")?;
    let runner_id = columns.required(PACE_FILE, "runner_id")?;
    let pace = columns.required(PACE_FILE, "pace")?;
    let distance = columns.required(PACE_FILE, "distance")?;

    let mut runners = Vec::new();
    let mut seen = HashSet::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let runner = Runner::new(
            field(&record, event),
            field(&record, runner_id),
            parse_number(&record, pace, "pace", row)?,
            parse_number(&record, distance, "distance", row)?,
        );

        if runner.event.is_empty() {
            return Err(CongestionError::invalid_parameter(
                "event",
                "",
                &format!("row {}: must not be empty", row),
            ));
        }
        if runner.runner_id.is_empty() {
            return Err(CongestionError::invalid_parameter(
                "runner_id",
                "",
                &format!("row {}: must not be empty", row),
            ));
        }
        if !runner.is_valid() {
            let pace_ok = runner.pace_min_per_km.is_finite() && runner.pace_min_per_km > 0.0;
            let (name, value) = if pace_ok {
                ("distance", runner.distance_km)
            } else {
                ("pace", runner.pace_min_per_km)
            };
            return Err(CongestionError::invalid_parameter(
                name,
                value,
                &format!("row {}: must be positive", row),
            ));
        }
        if !seen.insert((runner.event.clone(), runner.runner_id.clone())) {
            return Err(CongestionError::invalid_parameter(
                "runner_id",
                &runner.runner_id,
                &format!("row {}: duplicate runner_id in event {}", row, runner.event),
            ));
        }
        runners.push(runner);
    }

    log::debug!("[Loader] Loaded {} runners", runners.len());
    Ok(Roster::from_runners(runners))
}

/// Load the segment catalogue from an overlaps CSV.
///
/// `event` becomes `event_a` and `overlapswith` becomes `event_b`.
pub fn read_segments<R: io::Read>(input: R) -> Result<Vec<Segment>> {
    let mut reader = reader(input);
    let columns = Columns::new(reader.headers()?);
    let event = columns.required(OVERLAPS_FILE, "event")?;
    let start = columns.required(OVERLAPS_FILE, "start")?;
    let end = columns.required(OVERLAPS_FILE, "end")?;
    let overlaps_with = columns.required(OVERLAPS_FILE, "overlapswith")?;
    let description = columns.optional("description");

    let mut segments = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = i + 2;
        let mut segment = Segment::new(
            field(&record, event),
            field(&record, overlaps_with),
            parse_number(&record, start, "start", row)?,
            parse_number(&record, end, "end", row)?,
        );
        if let Some(index) = description {
            segment.description = field(&record, index).to_string();
        }
        segment.validate()?;
        segments.push(segment);
    }

    log::debug!("[Loader] Loaded {} segments", segments.len());
    Ok(segments)
}

/// Parse `Event=minutes_since_midnight` pairs.
pub fn parse_start_times<S: AsRef<str>>(pairs: &[S]) -> Result<StartTimeTable> {
    let mut table = StartTimeTable::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let invalid = || {
            CongestionError::invalid_parameter(
                "start_times",
                pair,
                "expected Event=minutes_since_midnight",
            )
        };
        let (event, minutes) = pair.split_once('=').ok_or_else(invalid)?;
        let event = event.trim();
        let minutes: f64 = minutes.trim().parse().map_err(|_| invalid())?;
        if event.is_empty() || !minutes.is_finite() {
            return Err(invalid());
        }
        table.insert(event, minutes);
    }
    Ok(table)
}
