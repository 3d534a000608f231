//! Drill-down for one collaborator: conversion by shift and by weekday.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::filter::{parse_hour, parse_record_date};
use crate::models::RawRecord;
use crate::ranking::rate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootCauseThresholds {
    /// Best shift must beat the worst by this factor.
    pub shift_lift: f64,
    /// Best weekday must beat the team average by this factor.
    pub day_lift_over_team: f64,
    /// Below `team average * training_ratio` training is suggested.
    pub training_ratio: f64,
}

impl Default for RootCauseThresholds {
    fn default() -> Self {
        Self {
            shift_lift: 1.2,
            day_lift_over_team: 1.1,
            training_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TeamAverages {
    pub conversion_rate: f64,
    pub avg_calls_per_day: f64,
    pub avg_talk_time_per_day_seconds: f64,
}

/// Team baselines over `records`; a day counts once however many rows it has.
pub fn team_averages(records: &[RawRecord]) -> TeamAverages {
    let mut calls = 0u64;
    let mut sales = 0u64;
    let mut talk = 0u64;
    let mut days: HashSet<NaiveDate> = HashSet::new();

    for record in records {
        calls = calls.saturating_add(record.total_calls);
        sales = sales.saturating_add(record.sales_by_call);
        talk = talk.saturating_add(parse_duration(&record.talk_time));
        if let Some(day) = parse_record_date(&record.date) {
            days.insert(day);
        }
    }

    let active_days = days.len() as f64;
    TeamAverages {
        conversion_rate: rate(sales, calls),
        avg_calls_per_day: if active_days > 0.0 {
            calls as f64 / active_days
        } else {
            0.0
        },
        avg_talk_time_per_day_seconds: if active_days > 0.0 {
            talk as f64 / active_days
        } else {
            0.0
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    /// 06:00-11:59
    Morning,
    /// 12:00-17:59
    Afternoon,
    /// 18:00-05:59
    Night,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::Morning, Shift::Afternoon, Shift::Night];

    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Night,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Morning => "morning (6h-12h)",
            Self::Afternoon => "afternoon (12h-18h)",
            Self::Night => "night (18h-6h)",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketMetrics {
    pub calls: u64,
    pub sales: u64,
    pub conversion_rate: f64,
}

impl BucketMetrics {
    fn add(&mut self, record: &RawRecord) {
        self.calls = self.calls.saturating_add(record.total_calls);
        self.sales = self.sales.saturating_add(record.sales_by_call);
        self.conversion_rate = rate(self.sales, self.calls);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftBucket {
    pub shift: Shift,
    pub metrics: BucketMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub weekday: Weekday,
    pub records: u32,
    pub metrics: BucketMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Shift,
    Weekday,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub finding: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootCauseReport {
    pub collaborator: String,
    pub total: BucketMetrics,
    pub shifts: Vec<ShiftBucket>,
    /// Records without a usable time of day; they are left out of `shifts`.
    pub untimed_records: usize,
    pub days: Vec<DayBucket>,
    pub patterns: Vec<Pattern>,
    pub suggestions: Vec<String>,
}

/// Break down one collaborator's records. `None` when the collaborator has
/// no records at all.
pub fn analyze_collaborator(
    records: &[RawRecord],
    collaborator: &str,
    team: &TeamAverages,
    thresholds: &RootCauseThresholds,
) -> Option<RootCauseReport> {
    let own: Vec<&RawRecord> = records
        .iter()
        .filter(|r| r.collaborator == collaborator)
        .collect();
    if own.is_empty() {
        return None;
    }

    let mut total = BucketMetrics::default();
    let mut shifts: Vec<ShiftBucket> = Shift::ALL
        .iter()
        .map(|shift| ShiftBucket {
            shift: *shift,
            metrics: BucketMetrics::default(),
        })
        .collect();
    let mut days: Vec<DayBucket> = Vec::new();
    let mut untimed_records = 0usize;

    for record in &own {
        total.add(record);

        match record.time_of_day.as_deref().and_then(parse_hour) {
            Some(hour) => {
                let shift = Shift::from_hour(hour);
                if let Some(bucket) = shifts.iter_mut().find(|b| b.shift == shift) {
                    bucket.metrics.add(record);
                }
            }
            None => untimed_records += 1,
        }

        if let Some(day) = parse_record_date(&record.date) {
            let weekday = day.weekday();
            match days.iter_mut().find(|b| b.weekday == weekday) {
                Some(bucket) => {
                    bucket.records += 1;
                    bucket.metrics.add(record);
                }
                None => {
                    let mut metrics = BucketMetrics::default();
                    metrics.add(record);
                    days.push(DayBucket {
                        weekday,
                        records: 1,
                        metrics,
                    });
                }
            }
        }
    }
    days.sort_by_key(|b| b.weekday.num_days_from_monday());

    let mut patterns = Vec::new();
    if let Some(pattern) = shift_pattern(&shifts, thresholds) {
        patterns.push(pattern);
    }
    if let Some(pattern) = weekday_pattern(&days, team, thresholds) {
        patterns.push(pattern);
    }

    let suggestions = suggestions(&patterns, total.conversion_rate, team, thresholds);

    Some(RootCauseReport {
        collaborator: collaborator.to_string(),
        total,
        shifts,
        untimed_records,
        days,
        patterns,
        suggestions,
    })
}

fn shift_pattern(shifts: &[ShiftBucket], thresholds: &RootCauseThresholds) -> Option<Pattern> {
    let active: Vec<&ShiftBucket> = shifts.iter().filter(|b| b.metrics.calls > 0).collect();
    if active.len() < 2 {
        return None;
    }

    let mut best = active[0];
    let mut worst = active[0];
    for &bucket in &active[1..] {
        if bucket.metrics.conversion_rate > best.metrics.conversion_rate {
            best = bucket;
        }
        if bucket.metrics.conversion_rate < worst.metrics.conversion_rate {
            worst = bucket;
        }
    }

    let best_rate = best.metrics.conversion_rate;
    let worst_rate = worst.metrics.conversion_rate;
    if best.shift == worst.shift || best_rate <= worst_rate * thresholds.shift_lift {
        return None;
    }

    Some(Pattern {
        kind: PatternKind::Shift,
        finding: format!("Best performance in the {}", best.shift.label()),
        detail: format!(
            "Conversion rate {best_rate:.1}% vs {worst_rate:.1}% in the {}",
            worst.shift.label()
        ),
    })
}

fn weekday_pattern(
    days: &[DayBucket],
    team: &TeamAverages,
    thresholds: &RootCauseThresholds,
) -> Option<Pattern> {
    let best = days
        .iter()
        .filter(|b| b.metrics.calls > 0)
        .fold(None, |best: Option<&DayBucket>, bucket| match best {
            Some(current) if current.metrics.conversion_rate >= bucket.metrics.conversion_rate => best,
            _ => Some(bucket),
        })?;

    let best_rate = best.metrics.conversion_rate;
    if best_rate <= 0.0 || best_rate <= team.conversion_rate * thresholds.day_lift_over_team {
        return None;
    }

    Some(Pattern {
        kind: PatternKind::Weekday,
        finding: format!("Best performance on {}", weekday_name(best.weekday)),
        detail: format!(
            "Conversion rate {best_rate:.1}% vs team average {:.1}%",
            team.conversion_rate
        ),
    })
}

fn suggestions(
    patterns: &[Pattern],
    collaborator_rate: f64,
    team: &TeamAverages,
    thresholds: &RootCauseThresholds,
) -> Vec<String> {
    let mut out = Vec::new();
    if patterns.iter().any(|p| p.kind == PatternKind::Shift) {
        out.push("Concentrate calls in the best-performing shift".to_string());
    } else {
        out.push("Review call times to find when leads are most receptive".to_string());
    }
    out.push("Compare scripts and approach with higher-converting collaborators".to_string());
    out.push("Review lead qualification before calling".to_string());
    if collaborator_rate < team.conversion_rate * thresholds.training_ratio {
        out.push("Consider extra training on closing techniques".to_string());
    }
    out
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mondays",
        Weekday::Tue => "Tuesdays",
        Weekday::Wed => "Wednesdays",
        Weekday::Thu => "Thursdays",
        Weekday::Fri => "Fridays",
        Weekday::Sat => "Saturdays",
        Weekday::Sun => "Sundays",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(date: &str, name: &str, time: Option<&str>, calls: u64, sales: u64) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            collaborator: name.to_string(),
            total_calls: calls,
            sales_by_call: sales,
            time_of_day: time.map(str::to_string),
            talk_time: "00:10:00".to_string(),
            ..RawRecord::default()
        }
    }

    #[test]
    fn shifts_follow_six_hour_boundaries() {
        assert_eq!(Shift::from_hour(6), Shift::Morning);
        assert_eq!(Shift::from_hour(11), Shift::Morning);
        assert_eq!(Shift::from_hour(12), Shift::Afternoon);
        assert_eq!(Shift::from_hour(18), Shift::Night);
        assert_eq!(Shift::from_hour(3), Shift::Night);
    }

    #[test]
    fn team_averages_count_distinct_days() {
        let records = vec![
            call("03/03/2025", "Ana", None, 10, 2),
            call("03/03/2025", "Bruno", None, 10, 0),
            call("04/03/2025", "Ana", None, 20, 3),
        ];
        let team = team_averages(&records);
        assert!((team.conversion_rate - 12.5).abs() < 0.001);
        assert!((team.avg_calls_per_day - 20.0).abs() < 0.001);
        assert!((team.avg_talk_time_per_day_seconds - 900.0).abs() < 0.001);
    }

    #[test]
    fn unknown_collaborator_has_no_report() {
        let records = vec![call("03/03/2025", "Ana", Some("09:00"), 10, 2)];
        let team = team_averages(&records);
        assert!(analyze_collaborator(&records, "Zé", &team, &RootCauseThresholds::default()).is_none());
    }

    #[test]
    fn finds_shift_and_weekday_patterns() {
        // 2025-03-03 is a Monday, 2025-03-04 a Tuesday.
        let records = vec![
            call("03/03/2025", "Ana", Some("09:15"), 10, 4),
            call("04/03/2025", "Ana", Some("14:30"), 20, 1),
            call("04/03/2025", "Ana", None, 5, 0),
            call("04/03/2025", "Bruno", Some("10:00"), 30, 3),
        ];
        let team = team_averages(&records);
        let report =
            analyze_collaborator(&records, "Ana", &team, &RootCauseThresholds::default()).unwrap();

        assert_eq!(report.total.calls, 35);
        assert_eq!(report.untimed_records, 1);
        assert_eq!(report.shifts[0].metrics.calls, 10);
        assert_eq!(report.shifts[1].metrics.calls, 20);
        assert_eq!(report.shifts[2].metrics.calls, 0);
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[0].weekday, Weekday::Mon);
        assert_eq!(report.days[1].records, 2);

        let kinds: Vec<PatternKind> = report.patterns.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PatternKind::Shift, PatternKind::Weekday]);
        assert!(report.patterns[0].finding.contains("morning"));
        assert!(report.patterns[1].finding.contains("Mondays"));
        assert_eq!(report.suggestions[0], "Concentrate calls in the best-performing shift");
    }

    #[test]
    fn similar_shifts_are_not_a_pattern() {
        let records = vec![
            call("03/03/2025", "Ana", Some("09:15"), 10, 2),
            call("03/03/2025", "Ana", Some("13:00"), 10, 2),
        ];
        let team = team_averages(&records);
        let report =
            analyze_collaborator(&records, "Ana", &team, &RootCauseThresholds::default()).unwrap();
        assert!(report.patterns.iter().all(|p| p.kind != PatternKind::Shift));
        assert_eq!(
            report.suggestions[0],
            "Review call times to find when leads are most receptive"
        );
    }

    #[test]
    fn huge_counts_saturate() {
        let records = vec![
            call("03/03/2025", "Ana", Some("09:15"), u64::MAX, u64::MAX),
            call("03/03/2025", "Ana", Some("09:45"), u64::MAX, 1),
        ];
        let team = team_averages(&records);
        assert!((team.conversion_rate - 100.0).abs() < 0.001);

        let report =
            analyze_collaborator(&records, "Ana", &team, &RootCauseThresholds::default()).unwrap();
        assert_eq!(report.total.calls, u64::MAX);
        assert_eq!(report.shifts[0].metrics.sales, u64::MAX);
    }

    #[test]
    fn suggests_training_for_low_converters() {
        let records = vec![
            call("03/03/2025", "Ana", Some("09:15"), 20, 0),
            call("03/03/2025", "Bruno", Some("09:15"), 20, 8),
        ];
        let team = team_averages(&records);
        let report =
            analyze_collaborator(&records, "Ana", &team, &RootCauseThresholds::default()).unwrap();
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("closing techniques")));
    }
}
