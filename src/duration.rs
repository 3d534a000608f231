//! `HH:MM:SS` talk-time strings.
//!
//! Parsing is soft: anything malformed counts as zero seconds, matching how
//! blank spreadsheet cells show up in exports.

/// Parse `H:M:S` into seconds. Hours are unbounded, missing trailing
/// components default to zero and malformed input yields 0.
pub fn parse_duration(value: &str) -> u64 {
    let value = value.trim();
    if value.is_empty() {
        return 0;
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return 0;
    }

    let mut components = [0u64; 3];
    for (slot, part) in components.iter_mut().zip(parts.iter()) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.parse::<u64>() {
            Ok(number) => *slot = number,
            Err(_) => return 0,
        }
    }

    let [hours, minutes, seconds] = components;
    hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}

/// Format seconds as `HH:MM:SS`. The hour field grows past two digits.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn add_durations(a: &str, b: &str) -> String {
    format_duration(parse_duration(a).saturating_add(parse_duration(b)))
}

/// Difference clamped at zero, e.g. talk-time still missing for a goal that
/// may already be exceeded.
pub fn remaining_duration(target_seconds: u64, current_seconds: u64) -> String {
    format_duration(target_seconds.saturating_sub(current_seconds))
}

pub fn seconds_to_hours(seconds: u64) -> f64 {
    seconds as f64 / 3600.0
}
