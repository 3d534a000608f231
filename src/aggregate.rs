use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::duration::parse_duration;
use crate::filter::{filter_by_range, parse_record_date};
use crate::models::{AggregateRecord, DateRange, RawRecord, Totals};

/// Fold records into one accumulator per collaborator.
///
/// Collaborators are keyed by exact name. Output is ordered by total sales
/// descending, then talk-time descending; remaining ties keep first-seen order.
pub fn aggregate(records: &[RawRecord]) -> Vec<AggregateRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut aggregates: Vec<AggregateRecord> = Vec::new();

    for record in records {
        let slot = *index.entry(record.collaborator.as_str()).or_insert_with(|| {
            aggregates.push(AggregateRecord::new(record.collaborator.clone()));
            aggregates.len() - 1
        });
        fold_record(&mut aggregates[slot], record);
    }

    aggregates.sort_by(|a, b| {
        b.total_sales
            .cmp(&a.total_sales)
            .then_with(|| b.talk_time_seconds.cmp(&a.talk_time_seconds))
    });

    debug!(
        records = records.len(),
        collaborators = aggregates.len(),
        "aggregated records"
    );
    aggregates
}

/// Filter then aggregate.
pub fn aggregate_window(records: &[RawRecord], range: Option<&DateRange>) -> Vec<AggregateRecord> {
    aggregate(&filter_by_range(records, range))
}

fn fold_record(entry: &mut AggregateRecord, record: &RawRecord) {
    entry.total_calls = entry.total_calls.saturating_add(record.total_calls);
    entry.outbound_over_60 = entry.outbound_over_60.saturating_add(record.outbound_over_60);
    entry.inbound_over_60 = entry.inbound_over_60.saturating_add(record.inbound_over_60);
    entry.under_60 = entry.under_60.saturating_add(record.under_60);
    entry.ongoing = entry.ongoing.saturating_add(record.ongoing);
    entry.sales_by_call = entry.sales_by_call.saturating_add(record.sales_by_call);
    entry.sales_by_alt_channel = entry.sales_by_alt_channel
        .saturating_add(record.sales_by_alt_channel);
    entry.talk_time_seconds = entry
        .talk_time_seconds
        .saturating_add(parse_duration(&record.talk_time));
    entry.total_sales = entry.sales_by_call.saturating_add(entry.sales_by_alt_channel);
}

pub fn find<'a>(aggregates: &'a [AggregateRecord], collaborator: &str) -> Option<&'a AggregateRecord> {
    aggregates.iter().find(|a| a.collaborator == collaborator)
}

/// Team-wide totals as the field-wise sum of the aggregates.
pub fn totals(aggregates: &[AggregateRecord]) -> Totals {
    let mut totals = Totals {
        collaborators: aggregates.len(),
        ..Totals::default()
    };

    for aggregate in aggregates {
        totals.total_calls = totals.total_calls.saturating_add(aggregate.total_calls);
        totals.outbound_over_60 = totals.outbound_over_60
            .saturating_add(aggregate.outbound_over_60);
        totals.inbound_over_60 = totals.inbound_over_60.saturating_add(aggregate.inbound_over_60);
        totals.under_60 = totals.under_60.saturating_add(aggregate.under_60);
        totals.talk_time_seconds = totals
            .talk_time_seconds
            .saturating_add(aggregate.talk_time_seconds);
        totals.ongoing = totals.ongoing.saturating_add(aggregate.ongoing);
        totals.sales_by_call = totals.sales_by_call.saturating_add(aggregate.sales_by_call);
        totals.sales_by_alt_channel = totals.sales_by_alt_channel
            .saturating_add(aggregate.sales_by_alt_channel);
        totals.total_sales = totals.total_sales.saturating_add(aggregate.total_sales);
    }

    totals
}

/// Totals computed straight from records, without grouping.
pub fn totals_from_records(records: &[RawRecord]) -> Totals {
    let mut names: Vec<&str> = records.iter().map(|r| r.collaborator.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    let mut totals = Totals {
        collaborators: names.len(),
        ..Totals::default()
    };

    for record in records {
        totals.total_calls = totals.total_calls.saturating_add(record.total_calls);
        totals.outbound_over_60 = totals.outbound_over_60.saturating_add(record.outbound_over_60);
        totals.inbound_over_60 = totals.inbound_over_60.saturating_add(record.inbound_over_60);
        totals.under_60 = totals.under_60.saturating_add(record.under_60);
        totals.talk_time_seconds = totals
            .talk_time_seconds
            .saturating_add(parse_duration(&record.talk_time));
        totals.ongoing = totals.ongoing.saturating_add(record.ongoing);
        totals.sales_by_call = totals.sales_by_call.saturating_add(record.sales_by_call);
        totals.sales_by_alt_channel = totals.sales_by_alt_channel
            .saturating_add(record.sales_by_alt_channel);
    }
    totals.total_sales = totals.sales_by_call.saturating_add(totals.sales_by_alt_channel);

    totals
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub sales: u64,
    pub calls: u64,
    pub talk_time_seconds: u64,
}

/// One zero-filled point per day of the range with sales from both channels.
pub fn daily_trend(records: &[RawRecord], range: &DateRange) -> Vec<DailyPoint> {
    let mut points: Vec<DailyPoint> = range
        .from
        .iter_days()
        .take_while(|day| *day <= range.end())
        .map(|date| DailyPoint {
            date,
            sales: 0,
            calls: 0,
            talk_time_seconds: 0,
        })
        .collect();

    for record in records {
        let Some(day) = parse_record_date(&record.date) else {
            continue;
        };
        if !range.contains(day) {
            continue;
        }
        let offset = (day - range.from).num_days() as usize;
        if let Some(point) = points.get_mut(offset) {
            point.sales = point
                .sales
                .saturating_add(record.sales_by_call.saturating_add(record.sales_by_alt_channel));
            point.calls = point.calls.saturating_add(record.total_calls);
            point.talk_time_seconds = point
                .talk_time_seconds
                .saturating_add(parse_duration(&record.talk_time));
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        date: &str,
        collaborator: &str,
        calls: u64,
        sales: u64,
        alt_sales: u64,
        talk_time: &str,
    ) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            collaborator: collaborator.to_string(),
            total_calls: calls,
            sales_by_call: sales,
            sales_by_alt_channel: alt_sales,
            talk_time: talk_time.to_string(),
            ..RawRecord::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn folds_two_rows_of_one_collaborator() {
        let records = vec![
            record("01/03/2025", "Ana", 10, 2, 0, "01:00:00"),
            record("01/03/2025", "Ana", 5, 1, 1, "00:30:00"),
        ];
        let range = DateRange::single_day(day(2025, 3, 1));
        let aggregates = aggregate_window(&records, Some(&range));

        assert_eq!(aggregates.len(), 1);
        let ana = &aggregates[0];
        assert_eq!(ana.total_calls, 15);
        assert_eq!(ana.sales_by_call, 3);
        assert_eq!(ana.sales_by_alt_channel, 1);
        assert_eq!(ana.total_sales, 4);
        assert_eq!(ana.talk_time(), "01:30:00");
    }

    #[test]
    fn orders_by_sales_then_talk_time_then_first_seen() {
        let records = vec![
            record("01/03/2025", "Caio", 3, 1, 0, "05:00:00"),
            record("01/03/2025", "Bia", 3, 1, 0, "01:00:00"),
            record("01/03/2025", "Dora", 3, 1, 0, "01:00:00"),
            record("01/03/2025", "Ana", 3, 2, 1, "00:10:00"),
        ];
        let names: Vec<String> = aggregate(&records)
            .into_iter()
            .map(|a| a.collaborator)
            .collect();
        assert_eq!(names, vec!["Ana", "Caio", "Bia", "Dora"]);
    }

    #[test]
    fn names_are_matched_exactly() {
        let records = vec![
            record("01/03/2025", "Ana", 1, 0, 0, ""),
            record("01/03/2025", "ana ", 1, 0, 0, ""),
        ];
        assert_eq!(aggregate(&records).len(), 2);
    }

    #[test]
    fn aggregate_totals_match_record_totals() {
        let records = vec![
            record("01/03/2025", "Ana", 10, 2, 1, "01:00:00"),
            record("02/03/2025", "Bruno", 7, 0, 3, "00:45:30"),
            record("02/03/2025", "Ana", 4, 1, 0, "bogus"),
            record("03/03/2025", "Caio", 0, 0, 0, ""),
        ];
        let aggregates = aggregate(&records);
        let from_aggregates = totals(&aggregates);
        assert_eq!(from_aggregates, totals_from_records(&records));
        assert_eq!(from_aggregates.total_sales, 7);
        assert_eq!(from_aggregates.collaborators, 3);
        for a in &aggregates {
            assert_eq!(a.total_sales, a.sales_by_call + a.sales_by_alt_channel);
        }
    }

    #[test]
    fn huge_counts_saturate() {
        let row = r#"{"date":"01/03/2025","collaborator":"Ana","totalCalls":1e30,"salesByCall":1e30,"salesByAltChannel":1e30}"#;
        let records = crate::ingest::parse_json_records(&format!("[{row},{row}]")).unwrap();
        assert_eq!(records[0].total_calls, u64::MAX);

        let aggregates = aggregate(&records);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].total_calls, u64::MAX);
        assert_eq!(aggregates[0].total_sales, u64::MAX);

        assert_eq!(totals(&aggregates).total_sales, u64::MAX);
        assert_eq!(totals_from_records(&records).total_calls, u64::MAX);

        let trend = daily_trend(&records, &DateRange::single_day(day(2025, 3, 1)));
        assert_eq!(trend[0].sales, u64::MAX);
        assert_eq!(trend[0].calls, u64::MAX);
    }

    #[test]
    fn daily_trend_is_zero_filled() {
        let records = vec![
            record("01/03/2025", "Ana", 10, 2, 1, "01:00:00"),
            record("03/03/2025", "Ana", 4, 1, 0, "00:30:00"),
            record("09/03/2025", "Ana", 4, 1, 0, "00:30:00"),
        ];
        let range = DateRange::new(day(2025, 3, 1), Some(day(2025, 3, 3)));
        let trend = daily_trend(&records, &range);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].sales, 3);
        assert_eq!(trend[1].calls, 0);
        assert_eq!(trend[2].talk_time_seconds, 1800);
    }
}
