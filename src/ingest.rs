//! File adapters: record exports, goal lists and the team goal sheet.
//!
//! Validation happens here so the analytics core can assume cleaned input.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::duration::parse_duration;
use crate::error::IngestError;
use crate::filter::parse_record_date;
use crate::goals::TeamGoals;
use crate::models::{Goal, RawRecord};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<RawRecord>),
    One(RawRecord),
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn read_text(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load raw records from a `.csv` or `.json` export.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, IngestError> {
    let records = match extension(path).as_deref() {
        Some("csv") => read_csv_records(path)?,
        Some("json") => parse_json_records(&read_text(path)?).map_err(|source| IngestError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => return Err(IngestError::UnsupportedFormat(path.to_path_buf())),
    };

    let records = drop_anonymous(records);
    info!(count = records.len(), path = %path.display(), "loaded records");
    Ok(records)
}

fn read_csv_records(path: &Path) -> Result<Vec<RawRecord>, IngestError> {
    let csv_error = |source: csv::Error| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(csv_error)?;

    let mut records = Vec::new();
    for result in reader.deserialize::<RawRecord>() {
        records.push(result.map_err(csv_error)?);
    }
    Ok(records)
}

/// A JSON array of records, or a single record object.
pub fn parse_json_records(text: &str) -> Result<Vec<RawRecord>, serde_json::Error> {
    Ok(match serde_json::from_str::<OneOrMany>(text)? {
        OneOrMany::Many(records) => records,
        OneOrMany::One(record) => vec![record],
    })
}

fn drop_anonymous(records: Vec<RawRecord>) -> Vec<RawRecord> {
    let total = records.len();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter(|r| !r.collaborator.trim().is_empty())
        .collect();
    if kept.len() < total {
        warn!(dropped = total - kept.len(), "records without a collaborator were dropped");
    }
    kept
}

/// Load a JSON array of individual goals.
pub fn load_goals(path: &Path) -> Result<Vec<Goal>, IngestError> {
    let goals: Vec<Goal> = serde_json::from_str(&read_text(path)?).map_err(|source| IngestError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let (valid, invalid): (Vec<Goal>, Vec<Goal>) =
        goals.into_iter().partition(|g| g.target.is_finite());
    if !invalid.is_empty() {
        warn!(count = invalid.len(), "goals with non-finite targets ignored");
    }
    Ok(valid)
}

/// Load the two-column `key,value` team goal sheet.
pub fn load_team_goals(path: &Path) -> Result<TeamGoals, IngestError> {
    let csv_error = |source: csv::Error| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut pairs = Vec::new();
    for result in reader.records() {
        let row = result.map_err(csv_error)?;
        if let (Some(key), Some(value)) = (row.get(0), row.get(1)) {
            pairs.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    Ok(team_goals_from_pairs(&pairs))
}

pub fn team_goals_from_pairs(pairs: &[(String, String)]) -> TeamGoals {
    let mut goals = TeamGoals::default();
    for (key, value) in pairs {
        if key.is_empty() || value.is_empty() {
            continue;
        }
        match key.as_str() {
            "meta_vendas" => goals.sales = parse_target(value),
            "meta_ligacoes" => goals.calls = parse_target(value),
            "meta_horas" => goals.talk_time_seconds = parse_duration(value),
            "data_final" => {
                goals.end_date = parse_record_date(value);
                if goals.end_date.is_none() {
                    warn!(value = %value, "team goal end date is not a valid date");
                }
            }
            _ => {}
        }
    }
    goals
}

fn parse_target(value: &str) -> f64 {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn json_accepts_array_or_single_object() {
        let many = parse_json_records(
            r#"[{"date":"01/03/2025","collaborator":"Ana","totalCalls":3},
                {"date":"01/03/2025","collaborator":"Bruno"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].total_calls, 0);

        let one = parse_json_records(r#"{"Data":"01/03/2025","Colaborador":"Ana","Vendas":2}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].sales_by_call, 2);
    }

    #[test]
    fn anonymous_rows_are_dropped() {
        let records = parse_json_records(r#"[{"collaborator":"  "},{"collaborator":"Ana"}]"#).unwrap();
        assert_eq!(drop_anonymous(records).len(), 1);
    }

    #[test]
    fn team_sheet_pairs() {
        let pairs: Vec<(String, String)> = [
            ("meta_vendas", "120"),
            ("meta_ligacoes", "abc"),
            ("meta_horas", "150:30:00"),
            ("data_final", "31/03/2025"),
            ("observacao", "ignored"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let goals = team_goals_from_pairs(&pairs);
        assert_eq!(goals.sales, 120.0);
        assert_eq!(goals.calls, 0.0);
        assert_eq!(goals.talk_time_seconds, 150 * 3600 + 1800);
        assert_eq!(goals.end_date, NaiveDate::from_ymd_opt(2025, 3, 31));
    }

    #[test]
    fn bad_end_date_is_absent() {
        let pairs = vec![("data_final".to_string(), "someday".to_string())];
        assert_eq!(team_goals_from_pairs(&pairs).end_date, None);
    }
}
