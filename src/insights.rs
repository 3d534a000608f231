//! Heuristic findings over the aggregated window.
//!
//! Rules run in a fixed order and each yields at most one insight; the order
//! is the display order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::duration::seconds_to_hours;
use crate::goals::{start_of_month, TeamGoals};
use crate::models::{AggregateRecord, Insight, InsightKind, Totals};
use crate::ranking::{conversion_rate, rate, top_n_by};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    /// Fraction above the time-proportional talk-time goal that counts as
    /// ahead of pace.
    pub ahead_of_pace_margin: f64,
    /// Collaborators need more calls than this to be compared on conversion.
    pub conversion_min_calls: u64,
    /// Lowest rate below `team average * ratio` is flagged.
    pub conversion_outlier_ratio: f64,
    pub high_volume_min_calls: u64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            ahead_of_pace_margin: 0.05,
            conversion_min_calls: 5,
            conversion_outlier_ratio: 0.5,
            high_volume_min_calls: 10,
        }
    }
}

pub struct InsightInput<'a> {
    pub aggregates: &'a [AggregateRecord],
    pub totals: &'a Totals,
    pub team_goals: Option<&'a TeamGoals>,
    pub today: NaiveDate,
}

pub fn generate_insights(input: &InsightInput<'_>, thresholds: &InsightThresholds) -> Vec<Insight> {
    if input.aggregates.is_empty() {
        return Vec::new();
    }

    let insights: Vec<Insight> = [
        ahead_of_pace(input, thresholds),
        conversion_outlier(input, thresholds),
        strategic_leader(input),
        high_volume_low_yield(input, thresholds),
    ]
    .into_iter()
    .flatten()
    .collect();

    debug!(count = insights.len(), "generated insights");
    insights
}

fn leader<F>(aggregates: &[AggregateRecord], key: F) -> Option<&AggregateRecord>
where
    F: Fn(&AggregateRecord) -> u64,
{
    top_n_by(aggregates, key, 1).into_iter().next()
}

fn ahead_of_pace(input: &InsightInput<'_>, thresholds: &InsightThresholds) -> Option<Insight> {
    let goals = input.team_goals?;
    let end = goals.end_date?;
    if goals.talk_time_seconds == 0 {
        return None;
    }

    let start = start_of_month(end);
    let period_days = (end - start).num_days() + 1;
    let days_passed = (input.today - start).num_days() + 1;
    if days_passed <= 0 || period_days <= 0 {
        return None;
    }

    let share = (days_passed as f64 / period_days as f64).min(1.0);
    let expected = goals.talk_time_seconds as f64 * share;
    let current = input.totals.talk_time_seconds as f64;
    if current <= expected * (1.0 + thresholds.ahead_of_pace_margin) {
        return None;
    }

    let above = (current / expected - 1.0) * 100.0;
    let top = leader(input.aggregates, |a| a.talk_time_seconds)?;
    Some(Insight {
        kind: InsightKind::Positive,
        collaborator: Some(top.collaborator.clone()),
        message: format!(
            "The team is {above:.0}% ahead of the proportional talk-time goal ({:.1}h of {:.1}h expected so far). {} is the largest contributor.",
            seconds_to_hours(input.totals.talk_time_seconds),
            expected / 3600.0,
            top.collaborator
        ),
        value: Some(above),
        drill_down: false,
    })
}

fn conversion_outlier(input: &InsightInput<'_>, thresholds: &InsightThresholds) -> Option<Insight> {
    if input.aggregates.len() < 2 {
        return None;
    }

    let team_rate = rate(input.totals.sales_by_call, input.totals.total_calls);
    if team_rate <= 0.0 {
        return None;
    }

    let lowest = input
        .aggregates
        .iter()
        .filter(|a| a.total_calls > thresholds.conversion_min_calls)
        .map(|a| (a, conversion_rate(a)))
        .fold(None, |lowest: Option<(&AggregateRecord, f64)>, (a, r)| match lowest {
            Some((_, best)) if best <= r => lowest,
            _ => Some((a, r)),
        })?;

    let (collaborator, lowest_rate) = lowest;
    if lowest_rate >= team_rate * thresholds.conversion_outlier_ratio {
        return None;
    }

    Some(Insight {
        kind: InsightKind::Warning,
        collaborator: Some(collaborator.collaborator.clone()),
        message: format!(
            "{}'s conversion rate ({lowest_rate:.1}%) is well below the team average ({team_rate:.1}%).",
            collaborator.collaborator
        ),
        value: Some(lowest_rate),
        drill_down: true,
    })
}

fn strategic_leader(input: &InsightInput<'_>) -> Option<Insight> {
    let top = leader(input.aggregates, |a| a.total_sales)?;
    if top.total_sales == 0 {
        return None;
    }

    let mut message = format!(
        "{} leads total sales with {}. Reviewing their calls and scripts can help train the rest of the team.",
        top.collaborator, top.total_sales
    );

    let by_call = leader(input.aggregates, |a| a.sales_by_call);
    let by_alt = leader(input.aggregates, |a| a.sales_by_alt_channel);
    if let (Some(call), Some(alt)) = (by_call, by_alt) {
        if call.sales_by_call > 0 && alt.sales_by_alt_channel > 0 && call.collaborator != alt.collaborator {
            message.push_str(&format!(
                " By channel, {} leads phone sales ({}) and {} leads WhatsApp sales ({}).",
                call.collaborator, call.sales_by_call, alt.collaborator, alt.sales_by_alt_channel
            ));
        }
    }

    Some(Insight {
        kind: InsightKind::Strategic,
        collaborator: Some(top.collaborator.clone()),
        message,
        value: Some(top.total_sales as f64),
        drill_down: false,
    })
}

fn high_volume_low_yield(input: &InsightInput<'_>, thresholds: &InsightThresholds) -> Option<Insight> {
    if input.aggregates.len() < 2 {
        return None;
    }

    let busiest = leader(input.aggregates, |a| a.total_calls)?;
    let average_sales = input.totals.total_sales as f64 / input.aggregates.len() as f64;
    if busiest.total_calls <= thresholds.high_volume_min_calls
        || busiest.total_sales as f64 >= average_sales
    {
        return None;
    }

    Some(Insight {
        kind: InsightKind::Collaborator,
        collaborator: Some(busiest.collaborator.clone()),
        message: format!(
            "{} has the highest call volume ({}) but sales ({}) are below the team average ({average_sales:.1}). A closing-script adjustment could lift results.",
            busiest.collaborator, busiest.total_calls, busiest.total_sales
        ),
        value: Some(busiest.total_sales as f64),
        drill_down: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::totals;

    fn agg(name: &str, calls: u64, sales: u64, alt: u64, talk: u64) -> AggregateRecord {
        AggregateRecord {
            collaborator: name.to_string(),
            total_calls: calls,
            sales_by_call: sales,
            sales_by_alt_channel: alt,
            total_sales: sales + alt,
            talk_time_seconds: talk,
            ..AggregateRecord::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run(aggregates: &[AggregateRecord], team_goals: Option<&TeamGoals>, today: NaiveDate) -> Vec<Insight> {
        let totals = totals(aggregates);
        let input = InsightInput {
            aggregates,
            totals: &totals,
            team_goals,
            today,
        };
        generate_insights(&input, &InsightThresholds::default())
    }

    #[test]
    fn no_aggregates_no_insights() {
        assert!(run(&[], None, day(2025, 3, 10)).is_empty());
    }

    #[test]
    fn ahead_of_talk_time_pace_names_top_contributor() {
        let aggregates = vec![agg("Ana", 0, 0, 0, 20 * 3600), agg("Bruno", 0, 0, 0, 30 * 3600)];
        // 10 of 31 days passed: expected ~32.3h of a 100h goal, team has 50h.
        let goals = TeamGoals {
            talk_time_seconds: 100 * 3600,
            end_date: Some(day(2025, 3, 31)),
            ..TeamGoals::default()
        };
        let insights = run(&aggregates, Some(&goals), day(2025, 3, 10));
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Positive);
        assert_eq!(insights[0].collaborator.as_deref(), Some("Bruno"));
        assert!(!insights[0].drill_down);
    }

    #[test]
    fn within_margin_is_not_ahead() {
        let aggregates = vec![agg("Ana", 0, 0, 0, 31 * 3600)];
        let goals = TeamGoals {
            talk_time_seconds: 310 * 3600,
            end_date: Some(day(2025, 3, 31)),
            ..TeamGoals::default()
        };
        // Expected exactly 30h, 31h is only 3.3% ahead.
        let insights = run(&aggregates, Some(&goals), day(2025, 3, 3));
        assert!(insights.iter().all(|i| i.kind != InsightKind::Positive));
    }

    #[test]
    fn flags_conversion_outlier_relative_to_team() {
        let aggregates = vec![
            agg("Ana", 20, 6, 0, 0),
            agg("Bruno", 20, 1, 0, 0),
            agg("Caio", 3, 0, 0, 0),
        ];
        let insights = run(&aggregates, None, day(2025, 3, 10));
        let warning = insights
            .iter()
            .find(|i| i.kind == InsightKind::Warning)
            .expect("warning insight");
        // Team 7/43 = 16.3%, Bruno 5% < 8.1%; Caio is under the call floor.
        assert_eq!(warning.collaborator.as_deref(), Some("Bruno"));
        assert!(warning.drill_down);
    }

    #[test]
    fn exactly_half_the_average_is_not_flagged() {
        let aggregates = vec![agg("Ana", 10, 3, 0, 0), agg("Bruno", 10, 1, 0, 0)];
        // Team 20%, Bruno 10% is exactly half.
        let insights = run(&aggregates, None, day(2025, 3, 10));
        assert!(insights.iter().all(|i| i.kind != InsightKind::Warning));
    }

    #[test]
    fn strategic_calls_out_channel_leaders() {
        let aggregates = vec![agg("Ana", 10, 5, 0, 0), agg("Bruno", 10, 1, 3, 0)];
        let insights = run(&aggregates, None, day(2025, 3, 10));
        let strategic = insights
            .iter()
            .find(|i| i.kind == InsightKind::Strategic)
            .expect("strategic insight");
        assert_eq!(strategic.collaborator.as_deref(), Some("Ana"));
        assert!(strategic.message.contains("Bruno leads WhatsApp"));
    }

    #[test]
    fn high_volume_low_yield_needs_call_floor() {
        let busy = vec![agg("Ana", 40, 1, 0, 0), agg("Bruno", 8, 5, 0, 0)];
        let insights = run(&busy, None, day(2025, 3, 10));
        let found = insights
            .iter()
            .find(|i| i.kind == InsightKind::Collaborator)
            .expect("collaborator insight");
        assert_eq!(found.collaborator.as_deref(), Some("Ana"));
        assert!(found.drill_down);

        let quiet = vec![agg("Ana", 10, 0, 0, 0), agg("Bruno", 8, 5, 0, 0)];
        let insights = run(&quiet, None, day(2025, 3, 10));
        assert!(insights.iter().all(|i| i.kind != InsightKind::Collaborator));
    }

    #[test]
    fn rules_keep_display_order() {
        let aggregates = vec![agg("Ana", 40, 1, 0, 80 * 3600), agg("Bruno", 8, 5, 0, 0)];
        let goals = TeamGoals {
            talk_time_seconds: 100 * 3600,
            end_date: Some(day(2025, 3, 31)),
            ..TeamGoals::default()
        };
        let kinds: Vec<InsightKind> = run(&aggregates, Some(&goals), day(2025, 3, 10))
            .into_iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::Positive,
                InsightKind::Warning,
                InsightKind::Strategic,
                InsightKind::Collaborator
            ]
        );
    }
}
