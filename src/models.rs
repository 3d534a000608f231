use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::duration::format_duration;

/// One row of call activity for one collaborator on one day (or a single
/// sub-event such as a WhatsApp sale).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRecord {
    /// Calendar day as `dd/mm/yyyy`; kept raw so bad dates are dropped by the
    /// filter instead of failing the load.
    #[serde(alias = "Data")]
    pub date: String,
    #[serde(alias = "Colaborador")]
    pub collaborator: String,
    #[serde(alias = "Total de Chamadas", deserialize_with = "lenient::count")]
    pub total_calls: u64,
    #[serde(
        rename = "outboundOver60",
        alias = "Chamadas Efetuadas + 60",
        deserialize_with = "lenient::count"
    )]
    pub outbound_over_60: u64,
    #[serde(
        rename = "inboundOver60",
        alias = "Chamadas Recebidas + 60",
        deserialize_with = "lenient::count"
    )]
    pub inbound_over_60: u64,
    #[serde(
        rename = "under60",
        alias = "Ligações Menos 60",
        deserialize_with = "lenient::count"
    )]
    pub under_60: u64,
    #[serde(alias = "Horas Faladas", deserialize_with = "lenient::text")]
    pub talk_time: String,
    #[serde(alias = "Conversas em Andamento", deserialize_with = "lenient::count")]
    pub ongoing: u64,
    #[serde(alias = "Vendas", deserialize_with = "lenient::count")]
    pub sales_by_call: u64,
    #[serde(alias = "Vendas WhatsApp", deserialize_with = "lenient::count")]
    pub sales_by_alt_channel: u64,
    #[serde(alias = "Hora da Ligação")]
    pub time_of_day: Option<String>,
    #[serde(alias = "Tipo")]
    pub channel: Option<String>,
}

/// Inclusive calendar-day window. A missing `to` selects a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { from: day, to: None }
    }

    pub fn end(&self) -> NaiveDate {
        self.to.unwrap_or(self.from)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.end()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to {
            Some(to) if to != self.from => write!(
                f,
                "{} - {}",
                self.from.format("%d/%m/%Y"),
                to.format("%d/%m/%Y")
            ),
            _ => write!(f, "{}", self.from.format("%d/%m/%Y")),
        }
    }
}

/// Summed metrics of one collaborator over the filtered window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub collaborator: String,
    pub total_calls: u64,
    pub outbound_over_60: u64,
    pub inbound_over_60: u64,
    pub under_60: u64,
    pub talk_time_seconds: u64,
    pub ongoing: u64,
    pub sales_by_call: u64,
    pub sales_by_alt_channel: u64,
    /// Always `sales_by_call + sales_by_alt_channel`.
    pub total_sales: u64,
}

impl AggregateRecord {
    pub fn new(collaborator: impl Into<String>) -> Self {
        Self {
            collaborator: collaborator.into(),
            ..Self::default()
        }
    }

    pub fn talk_time(&self) -> String {
        format_duration(self.talk_time_seconds)
    }
}

/// Field-wise sums across every collaborator in the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub collaborators: usize,
    pub total_calls: u64,
    pub outbound_over_60: u64,
    pub inbound_over_60: u64,
    pub under_60: u64,
    pub talk_time_seconds: u64,
    pub ongoing: u64,
    pub sales_by_call: u64,
    pub sales_by_alt_channel: u64,
    pub total_sales: u64,
}

impl Totals {
    pub fn talk_time(&self) -> String {
        format_duration(self.talk_time_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalMetric {
    #[serde(rename = "sales", alias = "Vendas")]
    Sales,
    #[serde(rename = "totalCalls", alias = "Total de Chamadas")]
    TotalCalls,
    /// Targets for talk-time are expressed in seconds.
    #[serde(rename = "talkTime", alias = "Horas Faladas")]
    TalkTime,
}

impl GoalMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::TotalCalls => "totalCalls",
            Self::TalkTime => "talkTime",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Sales => "Sales",
            Self::TotalCalls => "Total calls",
            Self::TalkTime => "Talk time",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "sales" | "Vendas" => Some(Self::Sales),
            "totalCalls" | "total-calls" | "Total de Chamadas" => Some(Self::TotalCalls),
            "talkTime" | "talk-time" | "Horas Faladas" => Some(Self::TalkTime),
            _ => None,
        }
    }

    /// Current value of this metric for one collaborator.
    pub fn current_value(&self, aggregate: &AggregateRecord) -> f64 {
        match self {
            Self::Sales => aggregate.total_sales as f64,
            Self::TotalCalls => aggregate.total_calls as f64,
            Self::TalkTime => aggregate.talk_time_seconds as f64,
        }
    }
}

/// A target for one collaborator, owned by whoever manages goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub collaborator: String,
    pub metric: GoalMetric,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Positive,
    Warning,
    Strategic,
    Collaborator,
}

impl InsightKind {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Positive => "Positive highlight",
            Self::Warning => "Attention point",
            Self::Strategic => "Strategic suggestion",
            Self::Collaborator => "Collaborator analysis",
        }
    }
}

/// A derived finding; regenerated on every recomputation, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub collaborator: Option<String>,
    pub message: String,
    pub value: Option<f64>,
    pub drill_down: bool,
}

mod lenient {
    use std::fmt;

    use serde::de::{self, Deserializer, Visitor};

    /// Accepts numbers, numeric strings, blanks and nulls; anything that is
    /// not a non-negative number becomes 0.
    pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CountVisitor)
    }

    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TextVisitor)
    }

    struct CountVisitor;

    impl<'de> Visitor<'de> for CountVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a count")
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<u64, E> {
            Ok(0)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            Ok(u64::try_from(v).unwrap_or(0))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<u64, E> {
            if v.is_finite() && v > 0.0 {
                Ok(v.trunc() as u64)
            } else {
                Ok(0)
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            let v = v.trim();
            if let Ok(n) = v.parse::<u64>() {
                return Ok(n);
            }
            match v.replace(',', ".").parse::<f64>() {
                Ok(f) => self.visit_f64(f),
                Err(_) => Ok(0),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }

        fn visit_none<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<u64, D::Error> {
            deserializer.deserialize_any(CountVisitor)
        }
    }

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, _: bool) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<String, D::Error> {
            deserializer.deserialize_any(TextVisitor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_without_end_is_a_single_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let range = DateRange::single_day(day);
        assert_eq!(range.end(), day);
        assert!(range.contains(day));
        assert!(!range.contains(day.succ_opt().unwrap()));
    }

    #[test]
    fn record_accepts_spreadsheet_headers_and_loose_numbers() {
        let json = r#"{
            "Data": "02/09/2025",
            "Colaborador": "Ana Silva",
            "Total de Chamadas": "15",
            "Chamadas Efetuadas + 60": 8,
            "Ligações Menos 60": null,
            "Horas Faladas": "02:45:12",
            "Vendas": 7.0,
            "Vendas WhatsApp": "n/a"
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.collaborator, "Ana Silva");
        assert_eq!(record.total_calls, 15);
        assert_eq!(record.outbound_over_60, 8);
        assert_eq!(record.inbound_over_60, 0);
        assert_eq!(record.under_60, 0);
        assert_eq!(record.sales_by_call, 7);
        assert_eq!(record.sales_by_alt_channel, 0);
        assert_eq!(record.time_of_day, None);
    }

    #[test]
    fn goal_metric_accepts_both_label_sets() {
        let goal: Goal = serde_json::from_str(
            r#"{"id":"g1","collaborator":"Ana","metric":"Horas Faladas","target":3600}"#,
        )
        .unwrap();
        assert_eq!(goal.metric, GoalMetric::TalkTime);
        assert_eq!(GoalMetric::parse("totalCalls"), Some(GoalMetric::TotalCalls));
        assert_eq!(GoalMetric::parse("revenue"), None);
    }
}
