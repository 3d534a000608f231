use chrono::{NaiveDate, NaiveTime, Timelike};
use tracing::debug;

use crate::models::{DateRange, RawRecord};

const DAY_FORMATS: [&str; 2] = ["%d/%m/%Y", "%Y-%m-%d"];

/// Parse a record date. Day-first is the export format; ISO dates from the
/// database adapter are accepted too.
pub fn parse_record_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DAY_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Hour of day (0-23) from an `HH:MM[:SS]` string.
pub fn parse_hour(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S") {
        return Some(time.hour());
    }
    if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M") {
        return Some(time.hour());
    }
    value
        .split(':')
        .next()
        .and_then(|hour| hour.trim().parse::<u32>().ok())
        .filter(|hour| *hour < 24)
}

/// Records whose date falls inside `range`, inclusive on both ends.
///
/// No range means nothing is selected, so the result is empty. Records with
/// an unparseable date are dropped.
pub fn filter_by_range(records: &[RawRecord], range: Option<&DateRange>) -> Vec<RawRecord> {
    let Some(range) = range else {
        return Vec::new();
    };

    let mut skipped = 0usize;
    let filtered: Vec<RawRecord> = records
        .iter()
        .filter(|record| match parse_record_date(&record.date) {
            Some(day) => range.contains(day),
            None => {
                skipped += 1;
                false
            }
        })
        .cloned()
        .collect();

    if skipped > 0 {
        debug!(skipped, "records with unparseable dates excluded");
    }
    debug!(kept = filtered.len(), total = records.len(), %range, "filtered records");
    filtered
}
