use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::AggregateRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementThresholds {
    pub sales: u64,
    pub calls: u64,
}

impl Default for AchievementThresholds {
    fn default() -> Self {
        Self { sales: 5, calls: 50 }
    }
}

type Predicate = fn(&AggregateRecord, &[AggregateRecord], &AchievementThresholds) -> bool;

pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    predicate: Predicate,
}

impl Achievement {
    pub fn is_met(
        &self,
        collaborator: &AggregateRecord,
        all: &[AggregateRecord],
        thresholds: &AchievementThresholds,
    ) -> bool {
        (self.predicate)(collaborator, all, thresholds)
    }
}

/// Badge catalogue. The sheet-era "iniciador" badge is not listed: its
/// predicate was identical to `top_seller`, so it could only ever unlock
/// alongside it.
pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "sales_machine",
        name: "Sales Machine",
        description: "Reached the sales threshold in the period.",
        predicate: |c, _, t| c.total_sales >= t.sales,
    },
    Achievement {
        id: "steel_voice",
        name: "Voice of Steel",
        description: "Reached the call threshold in the period.",
        predicate: |c, _, t| c.total_calls >= t.calls,
    },
    Achievement {
        id: "top_seller",
        name: "Top of the Hill",
        description: "Had the most sales of the period (ties included).",
        predicate: |c, all, _| {
            let max = all.iter().map(|a| a.total_sales).max().unwrap_or(0);
            max > 0 && c.total_sales == max
        },
    },
];

pub fn find_achievement(id: &str) -> Option<&'static Achievement> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// Collaborator name to unlocked achievement ids.
pub type AchievementMap = BTreeMap<String, Vec<String>>;

/// Every collaborator gets an entry, possibly empty.
pub fn evaluate_achievements(
    aggregates: &[AggregateRecord],
    thresholds: &AchievementThresholds,
) -> AchievementMap {
    aggregates
        .iter()
        .map(|aggregate| {
            let unlocked = ACHIEVEMENTS
                .iter()
                .filter(|a| a.is_met(aggregate, aggregates, thresholds))
                .map(|a| a.id.to_string())
                .collect();
            (aggregate.collaborator.clone(), unlocked)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockEvent {
    pub collaborator: String,
    pub achievement_id: String,
}

/// Achievements in `current` that the same collaborator did not hold in
/// `previous`.
pub fn newly_unlocked(previous: &AchievementMap, current: &AchievementMap) -> Vec<UnlockEvent> {
    let mut events = Vec::new();
    for (collaborator, ids) in current {
        let before = previous.get(collaborator);
        for id in ids {
            if !before.is_some_and(|held| held.contains(id)) {
                events.push(UnlockEvent {
                    collaborator: collaborator.clone(),
                    achievement_id: id.clone(),
                });
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(name: &str, calls: u64, sales: u64) -> AggregateRecord {
        AggregateRecord {
            collaborator: name.to_string(),
            total_calls: calls,
            sales_by_call: sales,
            total_sales: sales,
            ..AggregateRecord::default()
        }
    }

    #[test]
    fn tied_leaders_both_get_top_seller() {
        let aggregates = vec![agg("Ana", 10, 5), agg("Bruno", 60, 5), agg("Caio", 5, 1)];
        let map = evaluate_achievements(&aggregates, &AchievementThresholds::default());
        assert_eq!(map["Ana"], vec!["sales_machine", "top_seller"]);
        assert_eq!(map["Bruno"], vec!["sales_machine", "steel_voice", "top_seller"]);
        assert!(map["Caio"].is_empty());
    }

    #[test]
    fn no_top_seller_without_sales() {
        let aggregates = vec![agg("Ana", 1, 0), agg("Bruno", 2, 0)];
        let map = evaluate_achievements(&aggregates, &AchievementThresholds::default());
        assert!(map.values().all(|ids| ids.is_empty()));
    }

    #[test]
    fn thresholds_are_tunable() {
        let aggregates = vec![agg("Ana", 3, 2)];
        let thresholds = AchievementThresholds { sales: 2, calls: 3 };
        let map = evaluate_achievements(&aggregates, &thresholds);
        assert_eq!(map["Ana"], vec!["sales_machine", "steel_voice", "top_seller"]);
    }

    #[test]
    fn diff_reports_only_new_badges() {
        let mut previous = AchievementMap::new();
        previous.insert("Ana".to_string(), vec!["top_seller".to_string()]);

        let mut current = AchievementMap::new();
        current.insert(
            "Ana".to_string(),
            vec!["sales_machine".to_string(), "top_seller".to_string()],
        );
        current.insert("Bruno".to_string(), vec!["steel_voice".to_string()]);

        let events = newly_unlocked(&previous, &current);
        assert_eq!(
            events,
            vec![
                UnlockEvent {
                    collaborator: "Ana".to_string(),
                    achievement_id: "sales_machine".to_string()
                },
                UnlockEvent {
                    collaborator: "Bruno".to_string(),
                    achievement_id: "steel_voice".to_string()
                },
            ]
        );
        assert!(newly_unlocked(&current, &current).is_empty());
    }

    #[test]
    fn catalogue_has_one_badge_per_predicate() {
        let ids: Vec<&str> = ACHIEVEMENTS.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["sales_machine", "steel_voice", "top_seller"]);
        assert!(find_achievement("iniciador").is_none());
    }

    #[test]
    fn ids_resolve_to_definitions() {
        assert_eq!(find_achievement("top_seller").map(|a| a.name), Some("Top of the Hill"));
        assert!(find_achievement("unknown").is_none());
    }
}
