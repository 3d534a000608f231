//! Goal progress, pace and period-end projection.
//!
//! Everything here is derived from the current value, the target and the
//! window dates. Pace is counted in business days (Monday to Friday, no
//! holiday calendar).

use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::aggregate::find;
use crate::models::{AggregateRecord, Goal, GoalMetric, Totals};

/// Projected end above `target * EXCELLENT_MARGIN` counts as excellent.
pub const EXCELLENT_MARGIN: f64 = 1.1;
/// Projected end at or above `target * AT_RISK_FLOOR` is at risk rather than
/// off track.
pub const AT_RISK_FLOOR: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalStatus {
    Indefinite,
    OffTrack,
    AtRisk,
    Good,
    Excellent,
    Complete,
}

impl GoalStatus {
    /// Ordering used for monotonicity; `None` for goals without a target.
    pub fn tier(&self) -> Option<u8> {
        match self {
            Self::Indefinite => None,
            Self::OffTrack => Some(0),
            Self::AtRisk => Some(1),
            Self::Good => Some(2),
            Self::Excellent => Some(3),
            Self::Complete => Some(4),
        }
    }

    pub fn is_on_track(&self) -> bool {
        matches!(self, Self::Good | Self::Excellent | Self::Complete)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Indefinite => "indefinite",
            Self::OffTrack => "off track",
            Self::AtRisk => "at risk",
            Self::Good => "on track",
            Self::Excellent => "excellent",
            Self::Complete => "complete",
        }
    }
}

/// Reporting window: pace is measured from `start` to `today` and projected
/// over the business days left until `deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalWindow {
    pub start: NaiveDate,
    pub deadline: NaiveDate,
    pub today: NaiveDate,
}

impl GoalWindow {
    pub fn new(start: NaiveDate, deadline: NaiveDate, today: NaiveDate) -> Self {
        Self {
            start,
            deadline,
            today,
        }
    }

    /// Business days from `start` through `today` (capped at the deadline).
    pub fn elapsed_business_days(&self) -> u32 {
        business_days(self.start, self.today.min(self.deadline))
    }

    /// Business days after `today` up to and including the deadline.
    pub fn remaining_business_days(&self) -> u32 {
        match self.today.succ_opt() {
            Some(tomorrow) => business_days(tomorrow, self.deadline),
            None => 0,
        }
    }
}

/// Count of Monday-Friday days in `[start, end]`; 0 when `start > end`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as u32
}

/// Last calendar day of the month containing `day`.
pub fn end_of_month(day: NaiveDate) -> NaiveDate {
    let first = day.with_day(1).unwrap_or(day);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day)
}

pub fn start_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub daily_pace: f64,
    pub projected_end: f64,
}

pub fn project(current: f64, elapsed_business_days: u32, remaining_business_days: u32) -> Projection {
    let daily_pace = if elapsed_business_days == 0 {
        0.0
    } else {
        current / elapsed_business_days as f64
    };
    Projection {
        daily_pace,
        projected_end: current + daily_pace * remaining_business_days as f64,
    }
}

/// First matching rule wins.
pub fn classify(current: f64, target: f64, projected_end: f64) -> GoalStatus {
    if target <= 0.0 {
        GoalStatus::Indefinite
    } else if current >= target {
        GoalStatus::Complete
    } else if projected_end >= target {
        if projected_end > target * EXCELLENT_MARGIN {
            GoalStatus::Excellent
        } else {
            GoalStatus::Good
        }
    } else if projected_end >= target * AT_RISK_FLOOR {
        GoalStatus::AtRisk
    } else {
        GoalStatus::OffTrack
    }
}

/// Per-day amount needed to close the gap. `None` when the gap is open and no
/// business days remain.
pub fn required_pace(remaining: f64, remaining_business_days: u32) -> Option<f64> {
    if remaining <= 0.0 {
        Some(0.0)
    } else if remaining_business_days == 0 {
        None
    } else {
        Some(remaining / remaining_business_days as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalAnalysis {
    pub goal_id: Option<String>,
    pub collaborator: String,
    pub metric: GoalMetric,
    pub current: f64,
    pub target: f64,
    pub progress_percent: f64,
    pub remaining: f64,
    pub elapsed_business_days: u32,
    pub remaining_business_days: u32,
    pub daily_pace: f64,
    pub projected_end: f64,
    pub required_pace: Option<f64>,
    pub status: GoalStatus,
}

fn analyze(
    collaborator: &str,
    metric: GoalMetric,
    target: f64,
    current: f64,
    window: &GoalWindow,
) -> GoalAnalysis {
    let elapsed = window.elapsed_business_days();
    let remaining_days = window.remaining_business_days();
    let projection = project(current, elapsed, remaining_days);
    let remaining = (target - current).max(0.0);

    GoalAnalysis {
        goal_id: None,
        collaborator: collaborator.to_string(),
        metric,
        current,
        target,
        progress_percent: if target > 0.0 {
            current / target * 100.0
        } else {
            0.0
        },
        remaining,
        elapsed_business_days: elapsed,
        remaining_business_days: remaining_days,
        daily_pace: projection.daily_pace,
        projected_end: projection.projected_end,
        required_pace: required_pace(remaining, remaining_days),
        status: classify(current, target, projection.projected_end),
    }
}

pub fn evaluate_goal(goal: &Goal, current: f64, window: &GoalWindow) -> GoalAnalysis {
    GoalAnalysis {
        goal_id: Some(goal.id.clone()),
        ..analyze(&goal.collaborator, goal.metric, goal.target, current, window)
    }
}

/// Analysis of `metric` for a collaborator that may have no goal; a missing
/// goal is reported as indefinite.
pub fn evaluate_metric(
    goals: &[Goal],
    aggregate: &AggregateRecord,
    metric: GoalMetric,
    window: &GoalWindow,
) -> GoalAnalysis {
    let current = metric.current_value(aggregate);
    match goals
        .iter()
        .find(|g| g.collaborator == aggregate.collaborator && g.metric == metric)
    {
        Some(goal) => evaluate_goal(goal, current, window),
        None => analyze(&aggregate.collaborator, metric, 0.0, current, window),
    }
}

/// One analysis per goal, in goal order. Collaborators without activity in
/// the window count as zero.
pub fn evaluate_goals(
    goals: &[Goal],
    aggregates: &[AggregateRecord],
    window: &GoalWindow,
) -> Vec<GoalAnalysis> {
    goals
        .iter()
        .map(|goal| {
            let current = find(aggregates, &goal.collaborator)
                .map(|a| goal.metric.current_value(a))
                .unwrap_or(0.0);
            evaluate_goal(goal, current, window)
        })
        .collect()
}

/// Team-wide period targets, as kept in the shared goal sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamGoals {
    pub sales: f64,
    pub calls: f64,
    pub talk_time_seconds: u64,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamGoalProgress {
    pub metric: GoalMetric,
    pub current: f64,
    pub target: f64,
    /// Capped at 100 for progress bars.
    pub progress_percent: f64,
    pub remaining: f64,
    pub weekly_pace: Option<f64>,
}

/// Whole weeks from `today` to `end`, never less than one.
pub fn weeks_left(today: NaiveDate, end: NaiveDate) -> i64 {
    ((end - today).num_days() / 7).max(1)
}

pub fn team_goal_progress(goals: &TeamGoals, totals: &Totals, today: NaiveDate) -> Vec<TeamGoalProgress> {
    let rows = [
        (GoalMetric::Sales, totals.total_sales as f64, goals.sales),
        (GoalMetric::TotalCalls, totals.total_calls as f64, goals.calls),
        (
            GoalMetric::TalkTime,
            totals.talk_time_seconds as f64,
            goals.talk_time_seconds as f64,
        ),
    ];
    let weeks = goals.end_date.map(|end| weeks_left(today, end) as f64);

    rows.into_iter()
        .map(|(metric, current, target)| {
            let remaining = (target - current).max(0.0);
            TeamGoalProgress {
                metric,
                current,
                target,
                progress_percent: if target > 0.0 {
                    (current / target * 100.0).min(100.0)
                } else {
                    0.0
                },
                remaining,
                weekly_pace: weeks.map(|w| remaining / w),
            }
        })
        .collect()
}
