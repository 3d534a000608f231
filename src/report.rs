use std::fmt::Write;

use chrono::NaiveDate;

use crate::achievements::find_achievement;
use crate::dashboard::DashboardView;
use crate::duration::{format_duration, remaining_duration};
use crate::goals::{GoalAnalysis, TeamGoalProgress};
use crate::models::{GoalMetric, InsightKind};
use crate::ranking::{conversion_rate, rank, RankMetric};
use crate::root_cause::{weekday_name, RootCauseReport, TeamAverages};

fn metric_value(metric: GoalMetric, value: f64) -> String {
    match metric {
        GoalMetric::TalkTime => format_duration(value.max(0.0).round() as u64),
        _ => format!("{value:.0}"),
    }
}

fn goal_line(goal: &GoalAnalysis) -> String {
    let pace = match goal.required_pace {
        Some(pace) => format!("{}/day needed", metric_value(goal.metric, pace)),
        None => "window closed".to_string(),
    };
    format!(
        "- {} {}: {} of {} ({:.0}%), projected {} - {} ({})",
        goal.collaborator,
        goal.metric.label().to_lowercase(),
        metric_value(goal.metric, goal.current),
        metric_value(goal.metric, goal.target),
        goal.progress_percent,
        metric_value(goal.metric, goal.projected_end),
        goal.status.label(),
        pace
    )
}

fn team_goal_line(row: &TeamGoalProgress) -> String {
    let remaining = match row.metric {
        GoalMetric::TalkTime => remaining_duration(row.target as u64, row.current as u64),
        _ => format!("{:.0}", row.remaining),
    };
    let pace = row
        .weekly_pace
        .map(|pace| format!(", {}/week", metric_value(row.metric, pace)))
        .unwrap_or_default();
    format!(
        "- {}: {} of {} ({:.0}%), {} remaining{}",
        row.metric.label(),
        metric_value(row.metric, row.current),
        metric_value(row.metric, row.target),
        row.progress_percent,
        remaining,
        pace
    )
}

pub fn build_report(view: &DashboardView, generated_on: NaiveDate) -> String {
    let mut output = String::new();
    let range_label = view
        .range
        .map(|range| range.to_string())
        .unwrap_or_else(|| "no period selected".to_string());

    let _ = writeln!(output, "# Call Performance Report");
    let _ = writeln!(
        output,
        "Period {} ({} records), generated {}",
        range_label,
        view.filtered_records,
        generated_on.format("%d/%m/%Y")
    );
    let _ = writeln!(output);

    let totals = &view.totals;
    let _ = writeln!(output, "## Consolidated Metrics");
    if view.aggregates.is_empty() {
        let _ = writeln!(output, "No activity recorded for this period.");
        return output;
    }
    let _ = writeln!(output, "- Collaborators: {}", totals.collaborators);
    let _ = writeln!(output, "- Total calls: {}", totals.total_calls);
    let _ = writeln!(output, "- Outbound calls +60s: {}", totals.outbound_over_60);
    let _ = writeln!(output, "- Inbound calls +60s: {}", totals.inbound_over_60);
    let _ = writeln!(output, "- Calls -60s: {}", totals.under_60);
    let _ = writeln!(output, "- Talk time: {}", totals.talk_time());
    let _ = writeln!(output, "- Ongoing conversations: {}", totals.ongoing);
    let _ = writeln!(output, "- Sales by call: {}", totals.sales_by_call);
    let _ = writeln!(output, "- Sales by WhatsApp: {}", totals.sales_by_alt_channel);
    let _ = writeln!(output, "- Total sales: {}", totals.total_sales);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Leaderboard");
    for (position, aggregate) in view.aggregates.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} - {} sales ({} call, {} WhatsApp), {} calls, {:.1}% conversion, {} talk time",
            position + 1,
            aggregate.collaborator,
            aggregate.total_sales,
            aggregate.sales_by_call,
            aggregate.sales_by_alt_channel,
            aggregate.total_calls,
            conversion_rate(aggregate),
            aggregate.talk_time()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top 5 by Talk Time");
    for aggregate in rank(&view.aggregates, RankMetric::TalkTime, 5) {
        let _ = writeln!(output, "- {} ({})", aggregate.collaborator, aggregate.talk_time());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top 5 by Ongoing Conversations");
    for aggregate in rank(&view.aggregates, RankMetric::Ongoing, 5) {
        let _ = writeln!(output, "- {} ({})", aggregate.collaborator, aggregate.ongoing);
    }

    if !view.team_goals.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Team Goals");
        for row in &view.team_goals {
            let _ = writeln!(output, "{}", team_goal_line(row));
        }
    }

    if !view.goal_analyses.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Individual Goals");
        for goal in &view.goal_analyses {
            let _ = writeln!(output, "{}", goal_line(goal));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Insights");
    if view.insights.is_empty() {
        let _ = writeln!(output, "Nothing notable in this period.");
    } else {
        for insight in &view.insights {
            let marker = if insight.drill_down { " [drill-down]" } else { "" };
            let _ = writeln!(output, "- **{}**{}: {}", insight.kind.title(), marker, insight.message);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Achievements");
    let mut any_badge = false;
    for aggregate in &view.aggregates {
        let Some(ids) = view.achievements.get(&aggregate.collaborator) else {
            continue;
        };
        if ids.is_empty() {
            continue;
        }
        any_badge = true;
        let names: Vec<&str> = ids
            .iter()
            .map(|id| find_achievement(id).map(|a| a.name).unwrap_or(id.as_str()))
            .collect();
        let _ = writeln!(output, "- {}: {}", aggregate.collaborator, names.join(", "));
    }
    if !any_badge {
        let _ = writeln!(output, "No badges unlocked in this period.");
    }
    for event in &view.newly_unlocked {
        let name = find_achievement(&event.achievement_id)
            .map(|a| a.name)
            .unwrap_or(event.achievement_id.as_str());
        let _ = writeln!(output, "- New: {} unlocked {}", event.collaborator, name);
    }

    if !view.trend.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Daily Trend");
        let _ = writeln!(output, "| Day | Sales | Calls | Talk time |");
        let _ = writeln!(output, "| --- | ---: | ---: | ---: |");
        for point in &view.trend {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                point.date.format("%d/%m"),
                point.sales,
                point.calls,
                format_duration(point.talk_time_seconds)
            );
        }
    }

    output
}

/// Plain-text drill-down for one collaborator.
pub fn build_root_cause(report: &RootCauseReport, team: &TeamAverages) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Root-cause analysis for {}", report.collaborator);
    let _ = writeln!(
        output,
        "Conversion {:.1}% over {} calls (team average {:.1}%, {:.1} calls/day)",
        report.total.conversion_rate,
        report.total.calls,
        team.conversion_rate,
        team.avg_calls_per_day
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "By shift:");
    for bucket in &report.shifts {
        let _ = writeln!(
            output,
            "- {}: {} calls, {} sales, {:.1}%",
            bucket.shift.label(),
            bucket.metrics.calls,
            bucket.metrics.sales,
            bucket.metrics.conversion_rate
        );
    }
    if report.untimed_records > 0 {
        let _ = writeln!(output, "- {} records without a call time", report.untimed_records);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "By weekday:");
    for bucket in &report.days {
        let _ = writeln!(
            output,
            "- {}: {} calls, {} sales, {:.1}% over {} records",
            weekday_name(bucket.weekday),
            bucket.metrics.calls,
            bucket.metrics.sales,
            bucket.metrics.conversion_rate,
            bucket.records
        );
    }

    if !report.patterns.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Patterns:");
        for pattern in &report.patterns {
            let _ = writeln!(output, "- {} ({})", pattern.finding, pattern.detail);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Suggestions:");
    for suggestion in &report.suggestions {
        let _ = writeln!(output, "- {suggestion}");
    }

    output
}

/// One-character tag per insight kind for terminal output.
pub fn insight_marker(kind: InsightKind) -> &'static str {
    match kind {
        InsightKind::Positive => "+",
        InsightKind::Warning => "!",
        InsightKind::Strategic => "*",
        InsightKind::Collaborator => "?",
    }
}
