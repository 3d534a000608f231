//! Whole-snapshot recomputation.
//!
//! The state is an explicit value; `recompute` derives every view from it and
//! keeps nothing between calls. Callers that track achievements across runs
//! feed the previous map back in through `previous_achievements`.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::achievements::{evaluate_achievements, newly_unlocked, AchievementMap, UnlockEvent};
use crate::aggregate::{aggregate, daily_trend, totals, DailyPoint};
use crate::config::DashboardConfig;
use crate::filter::filter_by_range;
use crate::goals::{
    end_of_month, evaluate_goals, team_goal_progress, GoalAnalysis, GoalWindow, TeamGoalProgress,
    TeamGoals,
};
use crate::insights::{generate_insights, InsightInput};
use crate::models::{AggregateRecord, DateRange, Goal, Insight, RawRecord, Totals};

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub raw_records: Vec<RawRecord>,
    pub date_range: Option<DateRange>,
    pub goals: Vec<Goal>,
    pub previous_achievements: AchievementMap,
}

/// Inputs that are not part of the data snapshot.
#[derive(Debug, Clone)]
pub struct RecomputeContext {
    pub today: NaiveDate,
    /// Goal deadline; defaults to the end of `today`'s month.
    pub deadline: Option<NaiveDate>,
    pub team_goals: Option<TeamGoals>,
    pub config: DashboardConfig,
}

impl RecomputeContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            deadline: None,
            team_goals: None,
            config: DashboardConfig::default(),
        }
    }

    pub fn deadline(&self) -> NaiveDate {
        self.deadline.unwrap_or_else(|| end_of_month(self.today))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub range: Option<DateRange>,
    pub filtered_records: usize,
    pub aggregates: Vec<AggregateRecord>,
    pub totals: Totals,
    pub goal_analyses: Vec<GoalAnalysis>,
    pub team_goals: Vec<TeamGoalProgress>,
    pub insights: Vec<Insight>,
    pub achievements: AchievementMap,
    pub newly_unlocked: Vec<UnlockEvent>,
    pub trend: Vec<DailyPoint>,
}

impl DashboardState {
    pub fn recompute(&self, ctx: &RecomputeContext) -> DashboardView {
        let filtered = filter_by_range(&self.raw_records, self.date_range.as_ref());
        let aggregates = aggregate(&filtered);
        let totals = totals(&aggregates);

        let goal_analyses = match self.date_range {
            Some(range) => {
                let window = GoalWindow::new(range.from, ctx.deadline(), ctx.today);
                evaluate_goals(&self.goals, &aggregates, &window)
            }
            None => Vec::new(),
        };

        let team_goals = ctx
            .team_goals
            .as_ref()
            .map(|goals| team_goal_progress(goals, &totals, ctx.today))
            .unwrap_or_default();

        let insights = generate_insights(
            &InsightInput {
                aggregates: &aggregates,
                totals: &totals,
                team_goals: ctx.team_goals.as_ref(),
                today: ctx.today,
            },
            &ctx.config.insights,
        );

        let achievements = evaluate_achievements(&aggregates, &ctx.config.achievements);
        let newly_unlocked = newly_unlocked(&self.previous_achievements, &achievements);

        let trend = self
            .date_range
            .map(|range| daily_trend(&filtered, &range))
            .unwrap_or_default();

        debug!(
            records = filtered.len(),
            collaborators = aggregates.len(),
            insights = insights.len(),
            unlocked = newly_unlocked.len(),
            "dashboard recomputed"
        );

        DashboardView {
            range: self.date_range,
            filtered_records: filtered.len(),
            aggregates,
            totals,
            goal_analyses,
            team_goals,
            insights,
            achievements,
            newly_unlocked,
            trend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::GoalStatus;
    use crate::models::GoalMetric;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: &str, name: &str, calls: u64, sales: u64) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            collaborator: name.to_string(),
            total_calls: calls,
            sales_by_call: sales,
            talk_time: "00:20:00".to_string(),
            ..RawRecord::default()
        }
    }

    fn state() -> DashboardState {
        DashboardState {
            raw_records: vec![
                record("03/03/2025", "Ana", 12, 3),
                record("04/03/2025", "Ana", 10, 2),
                record("04/03/2025", "Bruno", 30, 1),
                record("20/03/2025", "Bruno", 30, 9),
            ],
            date_range: Some(DateRange::new(day(2025, 3, 3), Some(day(2025, 3, 7)))),
            goals: vec![Goal {
                id: "g-ana".to_string(),
                collaborator: "Ana".to_string(),
                metric: GoalMetric::Sales,
                target: 5.0,
            }],
            previous_achievements: AchievementMap::new(),
        }
    }

    #[test]
    fn recompute_runs_the_whole_pipeline() {
        let view = state().recompute(&RecomputeContext::new(day(2025, 3, 5)));

        assert_eq!(view.filtered_records, 3);
        assert_eq!(view.aggregates[0].collaborator, "Ana");
        assert_eq!(view.totals.total_sales, 6);
        assert_eq!(view.goal_analyses[0].status, GoalStatus::Complete);
        assert_eq!(view.trend.len(), 5);
        assert_eq!(view.achievements["Ana"], vec!["sales_machine", "top_seller"]);
        assert_eq!(view.newly_unlocked.len(), 2);
    }

    #[test]
    fn previous_snapshot_suppresses_repeat_unlocks() {
        let ctx = RecomputeContext::new(day(2025, 3, 5));
        let first = state().recompute(&ctx);

        let mut next = state();
        next.previous_achievements = first.achievements.clone();
        let second = next.recompute(&ctx);
        assert!(second.newly_unlocked.is_empty());
        assert_eq!(second.achievements, first.achievements);
    }

    #[test]
    fn no_range_means_empty_view() {
        let mut empty = state();
        empty.date_range = None;
        let view = empty.recompute(&RecomputeContext::new(day(2025, 3, 5)));
        assert!(view.aggregates.is_empty());
        assert!(view.goal_analyses.is_empty());
        assert!(view.insights.is_empty());
        assert!(view.trend.is_empty());
    }
}
