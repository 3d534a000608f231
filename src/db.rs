use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::duration::{format_duration, parse_duration};
use crate::filter::parse_record_date;
use crate::models::{DateRange, Goal, GoalMetric, RawRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn sample(
    date: &str,
    collaborator: &str,
    counts: [u64; 7],
    talk_time: &str,
    time_of_day: &str,
) -> RawRecord {
    let [total_calls, outbound_over_60, inbound_over_60, under_60, ongoing, sales_by_call, sales_by_alt_channel] =
        counts;
    RawRecord {
        date: date.to_string(),
        collaborator: collaborator.to_string(),
        total_calls,
        outbound_over_60,
        inbound_over_60,
        under_60,
        talk_time: talk_time.to_string(),
        ongoing,
        sales_by_call,
        sales_by_alt_channel,
        time_of_day: Some(time_of_day.to_string()),
        channel: Some("call".to_string()),
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let records = vec![
        sample("02/09/2025", "Cauã Amorim", [3, 0, 1, 2, 10, 2, 0], "00:08:07", "09:40"),
        sample("02/09/2025", "Ana Silva", [15, 8, 5, 2, 3, 7, 1], "02:45:12", "14:10"),
        sample("03/09/2025", "Ana Silva", [18, 9, 6, 3, 2, 4, 2], "03:02:40", "10:05"),
        sample("03/09/2025", "Bruno Costa", [42, 12, 4, 26, 6, 1, 0], "01:55:30", "16:20"),
        sample("04/09/2025", "Bruno Costa", [38, 10, 6, 22, 5, 2, 1], "02:10:00", "19:15"),
        sample("04/09/2025", "Cauã Amorim", [9, 3, 2, 4, 8, 3, 2], "00:52:18", "11:30"),
    ];

    let goals = vec![
        Goal {
            id: "seed-goal-ana".to_string(),
            collaborator: "Ana Silva".to_string(),
            metric: GoalMetric::Sales,
            target: 25.0,
        },
        Goal {
            id: "seed-goal-bruno".to_string(),
            collaborator: "Bruno Costa".to_string(),
            metric: GoalMetric::TotalCalls,
            target: 400.0,
        },
    ];

    let outcome = import_records(pool, &records, "seed").await?;
    for goal in &goals {
        save_goal(pool, goal).await?;
    }
    Ok(outcome.inserted)
}

pub async fn fetch_records(pool: &PgPool, range: Option<&DateRange>) -> anyhow::Result<Vec<RawRecord>> {
    let mut query = String::from(
        "SELECT occurred_on, collaborator, total_calls, outbound_over_60, inbound_over_60, \
         under_60, talk_time_seconds, ongoing, sales_by_call, sales_by_alt_channel, \
         time_of_day, channel \
         FROM call_pulse.records",
    );
    if range.is_some() {
        query.push_str(" WHERE occurred_on BETWEEN $1 AND $2");
    }
    query.push_str(" ORDER BY occurred_on, imported_at");

    let mut rows = sqlx::query(&query);
    if let Some(range) = range {
        rows = rows.bind(range.from).bind(range.end());
    }

    let count = |row: &sqlx::postgres::PgRow, column: &str| -> u64 {
        u64::try_from(row.get::<i64, _>(column)).unwrap_or(0)
    };

    let mut records = Vec::new();
    for row in rows.fetch_all(pool).await? {
        let occurred_on: NaiveDate = row.get("occurred_on");
        records.push(RawRecord {
            date: occurred_on.format("%d/%m/%Y").to_string(),
            collaborator: row.get("collaborator"),
            total_calls: count(&row, "total_calls"),
            outbound_over_60: count(&row, "outbound_over_60"),
            inbound_over_60: count(&row, "inbound_over_60"),
            under_60: count(&row, "under_60"),
            talk_time: format_duration(count(&row, "talk_time_seconds")),
            ongoing: count(&row, "ongoing"),
            sales_by_call: count(&row, "sales_by_call"),
            sales_by_alt_channel: count(&row, "sales_by_alt_channel"),
            time_of_day: row.get("time_of_day"),
            channel: row.get("channel"),
        });
    }

    Ok(records)
}

fn as_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A record ready for insertion: date parsed, talk-time in seconds and a
/// `{source}:{row}` key.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub source_key: String,
    pub occurred_on: NaiveDate,
    pub talk_time_seconds: u64,
    pub record: RawRecord,
}

/// Rows with unparseable dates are skipped with a warning; row numbers stay
/// those of the input file.
pub fn prepare_import(records: &[RawRecord], source: &str) -> Vec<ImportRow> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            let Some(occurred_on) = parse_record_date(&record.date) else {
                warn!(row = index + 1, date = %record.date, "skipping record with invalid date");
                return None;
            };
            Some(ImportRow {
                source_key: format!("{source}:{}", index + 1),
                occurred_on,
                talk_time_seconds: parse_duration(&record.talk_time),
                record: record.clone(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Rows from an earlier import of the same source that were dropped.
    pub replaced: u64,
    pub inserted: usize,
}

/// Replace everything previously imported from `source` with `records`, in
/// one transaction. Re-importing an edited export therefore never leaves
/// stale rows behind.
pub async fn import_records(
    pool: &PgPool,
    records: &[RawRecord],
    source: &str,
) -> anyhow::Result<ImportOutcome> {
    let rows = prepare_import(records, source);
    let mut tx = pool.begin().await?;

    let replaced = sqlx::query("DELETE FROM call_pulse.records WHERE source = $1")
        .bind(source)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to clear previous import of {source}"))?
        .rows_affected();

    for row in &rows {
        let record = &row.record;
        sqlx::query(
            r#"
            INSERT INTO call_pulse.records
            (id, source, source_key, occurred_on, collaborator, total_calls, outbound_over_60,
             inbound_over_60, under_60, talk_time_seconds, ongoing, sales_by_call,
             sales_by_alt_channel, time_of_day, channel)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source)
        .bind(&row.source_key)
        .bind(row.occurred_on)
        .bind(&record.collaborator)
        .bind(as_db_count(record.total_calls))
        .bind(as_db_count(record.outbound_over_60))
        .bind(as_db_count(record.inbound_over_60))
        .bind(as_db_count(record.under_60))
        .bind(as_db_count(row.talk_time_seconds))
        .bind(as_db_count(record.ongoing))
        .bind(as_db_count(record.sales_by_call))
        .bind(as_db_count(record.sales_by_alt_channel))
        .bind(record.time_of_day.as_deref())
        .bind(record.channel.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(source, replaced, inserted = rows.len(), "records imported");

    Ok(ImportOutcome {
        replaced,
        inserted: rows.len(),
    })
}

pub async fn fetch_goals(pool: &PgPool) -> anyhow::Result<Vec<Goal>> {
    let rows = sqlx::query(
        "SELECT id, collaborator, metric, target FROM call_pulse.goals ORDER BY collaborator, id",
    )
    .fetch_all(pool)
    .await?;

    let mut goals = Vec::new();
    for row in rows {
        let metric: String = row.get("metric");
        let Some(metric) = GoalMetric::parse(&metric) else {
            warn!(metric = %metric, "skipping goal with unknown metric");
            continue;
        };
        goals.push(Goal {
            id: row.get("id"),
            collaborator: row.get("collaborator"),
            metric,
            target: row.get("target"),
        });
    }

    Ok(goals)
}

pub async fn save_goal(pool: &PgPool, goal: &Goal) -> anyhow::Result<()> {
    anyhow::ensure!(
        goal.target.is_finite() && goal.target > 0.0,
        "goal target must be greater than zero"
    );

    sqlx::query(
        r#"
        INSERT INTO call_pulse.goals (id, collaborator, metric, target)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET collaborator = EXCLUDED.collaborator,
            metric = EXCLUDED.metric,
            target = EXCLUDED.target,
            updated_at = now()
        "#,
    )
    .bind(&goal.id)
    .bind(&goal.collaborator)
    .bind(goal.metric.as_str())
    .bind(goal.target)
    .execute(pool)
    .await
    .with_context(|| format!("failed to save goal {}", goal.id))?;

    Ok(())
}

pub async fn delete_goal(pool: &PgPool, id: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM call_pulse.goals WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, sales: u64) -> RawRecord {
        RawRecord {
            date: date.to_string(),
            collaborator: "Ana".to_string(),
            sales_by_call: sales,
            talk_time: "00:30:00".to_string(),
            ..RawRecord::default()
        }
    }

    #[test]
    fn prepared_rows_keep_file_row_numbers() {
        let records = [row("03/03/2025", 5), row("bad", 1), row("2025-03-04", 2)];
        let rows = prepare_import(&records, "export.csv");
        let keys: Vec<&str> = rows.iter().map(|r| r.source_key.as_str()).collect();
        assert_eq!(keys, vec!["export.csv:1", "export.csv:3"]);
        assert_eq!(rows[0].talk_time_seconds, 1800);
        assert_eq!(rows[1].occurred_on, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    }

    #[test]
    fn reimport_carries_edited_values() {
        let first = prepare_import(&[row("03/03/2025", 5)], "export.csv");
        let second = prepare_import(&[row("03/03/2025", 7)], "export.csv");
        assert_eq!(first[0].source_key, second[0].source_key);
        assert_eq!(second[0].record.sales_by_call, 7);
    }
}
