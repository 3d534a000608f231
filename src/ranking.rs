use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::AggregateRecord;

/// Leaderboard dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RankMetric {
    TotalSales,
    SalesByCall,
    AltChannelSales,
    TotalCalls,
    TalkTime,
    Ongoing,
    ConversionRate,
}

impl RankMetric {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TotalSales => "total sales",
            Self::SalesByCall => "sales by call",
            Self::AltChannelSales => "WhatsApp sales",
            Self::TotalCalls => "total calls",
            Self::TalkTime => "talk time",
            Self::Ongoing => "ongoing conversations",
            Self::ConversionRate => "conversion rate",
        }
    }

    pub fn value(&self, aggregate: &AggregateRecord) -> f64 {
        match self {
            Self::TotalSales => aggregate.total_sales as f64,
            Self::SalesByCall => aggregate.sales_by_call as f64,
            Self::AltChannelSales => aggregate.sales_by_alt_channel as f64,
            Self::TotalCalls => aggregate.total_calls as f64,
            Self::TalkTime => aggregate.talk_time_seconds as f64,
            Self::Ongoing => aggregate.ongoing as f64,
            Self::ConversionRate => conversion_rate(aggregate),
        }
    }
}

/// The `n` items with the highest key, descending. Equal keys keep their
/// input order.
pub fn top_n_by<T, K, F>(items: &[T], key: F, n: usize) -> Vec<&T>
where
    F: Fn(&T) -> K,
    K: PartialOrd,
{
    let mut ranked: Vec<&T> = items.iter().collect();
    ranked.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
    ranked.truncate(n);
    ranked
}

pub fn rank(aggregates: &[AggregateRecord], metric: RankMetric, n: usize) -> Vec<&AggregateRecord> {
    top_n_by(aggregates, |a| metric.value(a), n)
}

/// By-call sales per call, in percent. Zero calls gives 0.
pub fn conversion_rate(aggregate: &AggregateRecord) -> f64 {
    rate(aggregate.sales_by_call, aggregate.total_calls)
}

pub(crate) fn rate(sales: u64, calls: u64) -> f64 {
    if calls == 0 {
        0.0
    } else {
        sales as f64 / calls as f64 * 100.0
    }
}
